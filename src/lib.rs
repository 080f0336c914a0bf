//! lmx: Linearized MusicXML codec for piano grand-staff scores.
//!
//! LMX flattens a MusicXML `<part>` into a whitespace-separated token
//! sequence over a closed vocabulary and rebuilds the part from such a
//! sequence, tolerating the defects of machine-predicted input.
//!
//! Supports both uncompressed MusicXML (.musicxml) and compressed MXL (.mxl) files.
//!
//! # Example
//! ```no_run
//! use lmx::{delinearize_text, linearize, parse_file, split_to_systems, DelinearizeOptions};
//!
//! let (score, _) = parse_file("path/to/score.musicxml").unwrap();
//! for page in split_to_systems(&score.parts[0]) {
//!     for system in page.systems {
//!         let (tokens, diagnostics) = linearize(&system.part);
//!         println!("{} ({} diagnostics)", tokens.join(" "), diagnostics.len());
//!
//!         let (part, _) = delinearize_text(&tokens.join(" "), &DelinearizeOptions::default());
//!         println!("decoded {} measures", part.measures.len());
//!     }
//! }
//! ```

pub mod batch;
pub mod delinearizer;
pub mod duration;
pub mod error;
pub mod linearizer;
pub mod lmx_file;
pub mod model;
pub mod mxl;
pub mod parser;
pub mod pitch_alternator;
pub mod splitter;
pub mod vocabulary;
pub mod writer;

use std::path::Path;

pub use batch::{decode_file, delinearize_lines, encode_score, linearize_parts};
pub use delinearizer::{delinearize, delinearize_text, DelinearizeOptions};
pub use duration::{actual_to_fractional, fractional_to_actual};
pub use error::{CodecError, Diagnostic, DiagnosticKind, Diagnostics};
pub use linearizer::linearize;
pub use lmx_file::{Flavor, LmxFile};
pub use model::*;
pub use mxl::parse_mxl;
pub use parser::{parse_musicxml, parse_part_fragment};
pub use pitch_alternator::alternate_pitches;
pub use splitter::{split_to_systems, Page, System};
pub use vocabulary::{classify, Terminal};
pub use writer::{part_to_score, to_musicxml};

/// Parse a MusicXML file from a file path.
/// Automatically detects format based on file extension:
/// - `.musicxml` or `.xml` → uncompressed MusicXML
/// - `.mxl` → compressed MXL (ZIP archive)
pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<(Score, Diagnostics), CodecError> {
    let path = path.as_ref();
    let data = std::fs::read(path)?;

    parse_bytes(&data, path.extension().and_then(|e| e.to_str()))
}

/// Parse MusicXML from raw bytes with an optional format hint.
/// If `extension` is None, tries to auto-detect the format.
pub fn parse_bytes(data: &[u8], extension: Option<&str>) -> Result<(Score, Diagnostics), CodecError> {
    match extension {
        Some("mxl") => parse_mxl(data),
        Some("musicxml") | Some("xml") => parse_musicxml(std::str::from_utf8(data)?),
        _ => {
            // Auto-detect: try as XML first, then as MXL
            if let Ok(xml) = std::str::from_utf8(data) {
                if xml.trim_start().starts_with('<') {
                    return parse_musicxml(xml);
                }
            }
            parse_mxl(data)
        }
    }
}

/// Dump a parsed score as JSON, for inspecting what the codec sees.
pub fn score_to_json(score: &Score) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(score)
}

/// Serialize diagnostics as a JSON array of `{kind, position, message}`.
pub fn diagnostics_to_json(diagnostics: &Diagnostics) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(diagnostics)
}
