//! Batch encoding and decoding.
//!
//! Every item is independent, so with the `parallel` feature (on by default)
//! the work is spread over rayon's thread pool. Results keep input order.

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::delinearizer::{delinearize, delinearize_text, DelinearizeOptions};
use crate::duration::actual_to_fractional;
use crate::error::{CodecError, Diagnostics};
use crate::linearizer::linearize;
use crate::lmx_file::LmxFile;
use crate::model::{MeasureElement, Part, Score};
use crate::splitter::split_to_systems;

/// Linearize each part on its own.
pub fn linearize_parts(parts: &[Part]) -> Vec<(Vec<String>, Diagnostics)> {
    #[cfg(feature = "parallel")]
    {
        parts.par_iter().map(linearize).collect()
    }
    #[cfg(not(feature = "parallel"))]
    {
        parts.iter().map(linearize).collect()
    }
}

/// Delinearize each line of whitespace-separated tokens on its own.
pub fn delinearize_lines(lines: &[String], options: &DelinearizeOptions) -> Vec<(Part, Diagnostics)> {
    #[cfg(feature = "parallel")]
    {
        lines
            .par_iter()
            .map(|line| delinearize_text(line, options))
            .collect()
    }
    #[cfg(not(feature = "parallel"))]
    {
        lines
            .iter()
            .map(|line| delinearize_text(line, options))
            .collect()
    }
}

/// Split every part of a score into systems and linearize each system.
pub fn encode_score(score: &Score) -> (LmxFile, Diagnostics) {
    let systems: Vec<Part> = score
        .parts
        .iter()
        .flat_map(split_to_systems)
        .flat_map(|page| page.systems)
        .map(|system| system.part)
        .collect();

    let mut diagnostics = Diagnostics::new();
    let mut sequences = Vec::with_capacity(systems.len());
    for (tokens, system_diagnostics) in linearize_parts(&systems) {
        diagnostics.extend(system_diagnostics);
        sequences.push(tokens);
    }

    log::debug!(
        "encoded {} parts as {} systems",
        score.parts.len(),
        sequences.len()
    );
    (LmxFile::from_systems(sequences), diagnostics)
}

/// Decode every system of a file and join them into one part.
///
/// Measures are renumbered from 1 and each system after the first starts
/// with a system break, so splitting the result gives the systems back.
pub fn decode_file(file: &LmxFile, options: &DelinearizeOptions) -> (Part, Diagnostics) {
    let lines: Vec<String> = file.systems.iter().map(|tokens| tokens.join(" ")).collect();

    let mut part = Part::new("P1");
    part.name = "Piano".to_string();
    let mut diagnostics = Diagnostics::new();

    for (index, (system, system_diagnostics)) in delinearize_lines(&lines, options).into_iter().enumerate() {
        diagnostics.extend(system_diagnostics);
        let mut measures = system.measures.into_iter();
        if let Some(mut first) = measures.next() {
            first.new_system = index > 0;
            part.measures.push(first);
        }
        part.measures.extend(measures);
    }

    for (i, measure) in part.measures.iter_mut().enumerate() {
        measure.number = i32::try_from(i + 1).unwrap_or(i32::MAX);
    }
    (part, diagnostics)
}

/// Outcome of encoding and decoding one system.
#[derive(Debug)]
pub struct SystemCheck {
    /// 0-based system index across all pages
    pub system: usize,
    /// Number of the system's first measure in the source part
    pub first_measure: Option<i32>,
    pub diagnostics: Diagnostics,
    /// Whether the decoded system matches the source in fractional form
    pub matches: bool,
}

/// Round-trip every system of a part and compare the result with the
/// source, in fractional duration form.
pub fn check_part(part: &Part) -> Result<Vec<SystemCheck>, CodecError> {
    let systems: Vec<Part> = split_to_systems(part)
        .into_iter()
        .flat_map(|page| page.systems)
        .map(|system| system.part)
        .collect();

    #[cfg(feature = "parallel")]
    {
        systems.par_iter().enumerate().map(check_system).collect()
    }
    #[cfg(not(feature = "parallel"))]
    {
        systems.iter().enumerate().map(check_system).collect()
    }
}

fn check_system((index, system): (usize, &Part)) -> Result<SystemCheck, CodecError> {
    let (tokens, mut diagnostics) = linearize(system);

    let mut reference = system.clone();
    actual_to_fractional(&mut reference)?;
    // divisions-only attributes vanish in fractional form
    for measure in &mut reference.measures {
        measure
            .elements
            .retain(|e| !matches!(e, MeasureElement::Attributes(attrs) if attrs.is_empty()));
    }

    let options = DelinearizeOptions {
        keep_fractional_durations: true,
    };
    let (decoded, decode_diagnostics) = delinearize(&tokens, &options);
    diagnostics.extend(decode_diagnostics);

    Ok(SystemCheck {
        system: index,
        first_measure: system.measures.first().map(|m| m.number),
        diagnostics,
        matches: reference.same_content(&decoded),
    })
}
