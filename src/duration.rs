//! Duration arithmetic shared by the codec passes.
//!
//! A part is either in "actual" form (integer ticks, `<divisions>` present)
//! or in "fractional" form (exact quarter-note counts, no `<divisions>`).
//! The delinearizer produces fractional durations because LMX only knows
//! note types; [`fractional_to_actual`] picks the smallest divisions value
//! that makes every duration integral.

use num_integer::Integer;

use crate::error::CodecError;
use crate::model::{Fraction, MeasureElement, NoteType, Part, TimeModification, TimeSignature};

/// Length of a note in quarter notes from its type, dots and tuplet ratio.
pub fn note_duration(
    note_type: NoteType,
    dots: u8,
    time_modification: Option<TimeModification>,
) -> Fraction {
    let mut duration = note_type.quarter_multiple();
    let mut dot_duration = duration / 2;
    for _ in 0..dots {
        duration += dot_duration;
        dot_duration /= 2;
    }
    if let Some(tm) = time_modification {
        if tm.actual > 0 {
            duration *= Fraction::new(tm.normal as i64, tm.actual as i64);
        }
    }
    duration
}

/// Length of a full measure in quarter notes.
pub fn measure_duration(time: &TimeSignature) -> Fraction {
    Fraction::new(time.beats as i64 * 4, time.beat_type.max(1) as i64)
}

/// Tick count a note is expected to last, rounded to the nearest integer.
///
/// Exporters cap `<divisions>` (MuseScore at 480), so tuplets can produce
/// non-integral tick counts which the exporter rounds. The exact value is
/// returned alongside for error messages.
pub fn expected_ticks(
    note_type: NoteType,
    dots: u8,
    time_modification: Option<TimeModification>,
    divisions: i64,
) -> (i64, Fraction) {
    let exact = note_duration(note_type, dots, time_modification) * divisions;
    (exact.round().to_integer(), exact)
}

/// Split a tick count into note types, greedily from the longest.
///
/// Each type is used at most once, walking the ladder from a maxima
/// (32 quarters) down to a 1024th with exact steps. Returns the types and
/// the ticks left over; a nonzero remainder means the duration has no exact
/// encoding (typically a forward inside a tuplet).
pub fn decompose_ticks(ticks: i64, divisions: i64) -> (Vec<NoteType>, Fraction) {
    let mut remainder = Fraction::from_integer(ticks);
    let zero = Fraction::from_integer(0);
    let mut types = Vec::new();

    for &note_type in NoteType::ALL.iter().rev() {
        if remainder <= zero {
            break;
        }
        let step = note_type.quarter_multiple() * divisions;
        if step > zero && step <= remainder {
            types.push(note_type);
            remainder -= step;
        }
    }

    (types, remainder)
}

/// Convert integer tick durations to quarter-note fractions, dropping every
/// `<divisions>` element.
pub fn actual_to_fractional(part: &mut Part) -> Result<(), CodecError> {
    let mut divisions: Option<i64> = None;

    for measure in &mut part.measures {
        for element in &mut measure.elements {
            let duration = match element {
                MeasureElement::Attributes(attrs) => {
                    if let Some(d) = attrs.divisions.take() {
                        if d <= 0 {
                            return Err(CodecError::Duration(format!(
                                "divisions must be positive, got {d} in measure {}",
                                measure.number
                            )));
                        }
                        divisions = Some(d);
                    }
                    continue;
                }
                MeasureElement::Note(note) => match note.duration.as_mut() {
                    Some(d) => d,
                    None => continue,
                },
                MeasureElement::Backup(backup) => &mut backup.duration,
                MeasureElement::Forward(forward) => &mut forward.duration,
            };
            let d = divisions.ok_or_else(|| {
                CodecError::Duration(format!(
                    "duration in measure {} precedes any <divisions>",
                    measure.number
                ))
            })?;
            *duration /= d;
        }
    }

    Ok(())
}

/// Convert quarter-note fractions to integer ticks. The divisions value is
/// the least common multiple of all duration denominators; it is written
/// into the first measure's head attributes and returned.
pub fn fractional_to_actual(part: &mut Part) -> Result<i64, CodecError> {
    let has_divisions = part.measures.iter().any(|m| {
        m.elements
            .iter()
            .any(|e| matches!(e, MeasureElement::Attributes(a) if a.divisions.is_some()))
    });
    if has_divisions {
        return Err(CodecError::Duration(
            "fractional part should not contain <divisions>".to_string(),
        ));
    }

    let divisions = part
        .durations_mut()
        .map(|d| *d.denom())
        .fold(1i64, |acc, denom| acc.lcm(&denom));

    for duration in part.durations_mut() {
        let ticks = *duration * divisions;
        if !ticks.is_integer() {
            return Err(CodecError::Duration(format!(
                "duration {duration} does not scale to whole ticks at divisions {divisions}"
            )));
        }
        *duration = ticks;
    }

    if let Some(first) = part.measures.first_mut() {
        first.head_attributes_mut().divisions = Some(divisions);
    }

    log::debug!("fractional durations converted with divisions={divisions}");
    Ok(divisions)
}
