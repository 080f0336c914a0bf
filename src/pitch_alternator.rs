//! Infers `<alter>` values for decoded notes.
//!
//! LMX pitch tokens carry only step and octave. The sounding alteration is
//! recovered the way a reader of the engraved page would: an accidental
//! earlier in the measure on the same staff line wins, otherwise the key
//! signature applies. A tie-stop note copies the pitch of the note its tie
//! started from, whatever its own accidental says.
//!
//! Onsets are tracked as exact fractions, so the pass works on parts in
//! either actual or fractional duration form.

use std::collections::HashMap;

use crate::model::{
    Accidental, Fraction, Measure, MeasureElement, Note, NoteContent, Part, Pitch, StartStop, Step,
};

/// Sharps are added to the key signature in this order.
const SHARPS: [Step; 7] = [Step::F, Step::C, Step::G, Step::D, Step::A, Step::E, Step::B];
/// Flats are added to the key signature in this order.
const FLATS: [Step; 7] = [Step::B, Step::E, Step::A, Step::D, Step::G, Step::C, Step::F];

/// Where a note sits on the page: staff, step and octave.
type VisualPitch = (u8, Step, i32);

fn visual_pitch(note: &Note) -> Option<VisualPitch> {
    note.pitch()
        .map(|p| (note.staff.unwrap_or(1), p.step, p.octave))
}

/// Alteration implied by a key signature for a diatonic step.
pub fn key_signature_alteration(fifths: i32, step: Step) -> i32 {
    let count = fifths.unsigned_abs().min(7) as usize;
    if fifths > 0 && SHARPS[..count].contains(&step) {
        1
    } else if fifths < 0 && FLATS[..count].contains(&step) {
        -1
    } else {
        0
    }
}

/// Rewrite the alteration of every pitched note in the part.
pub fn alternate_pitches(part: &mut Part) {
    let mut alternator = PitchAlternator::default();
    for measure in &mut part.measures {
        alternator.process_measure(measure);
    }
}

#[derive(Default)]
struct PitchAlternator {
    // part-scoped
    fifths: i32,
    // measure-scoped
    accidentals: HashMap<VisualPitch, Vec<(Fraction, Accidental)>>,
    tie_starts: HashMap<VisualPitch, Pitch>,
    previous_tie_starts: HashMap<VisualPitch, Pitch>,
}

impl PitchAlternator {
    fn process_measure(&mut self, measure: &mut Measure) {
        self.collect_accidentals(measure);

        // unmatched starts from two measures back expire here
        self.previous_tie_starts = std::mem::take(&mut self.tie_starts);

        let mut onset = Fraction::from_integer(0);
        for element in &mut measure.elements {
            match element {
                MeasureElement::Attributes(attrs) => {
                    if let Some(key) = attrs.key {
                        self.fifths = key.fifths;
                    }
                }
                MeasureElement::Note(note) => {
                    let note_onset = note_onset(note, onset);
                    self.process_note(note, note_onset);
                    self.process_ties(note);
                }
                _ => {}
            }
            advance_onset(element, &mut onset);
        }
    }

    /// Pass 1: every explicit accidental in the measure, by visual pitch,
    /// ordered by onset.
    fn collect_accidentals(&mut self, measure: &Measure) {
        self.accidentals.clear();

        let mut onset = Fraction::from_integer(0);
        for element in &measure.elements {
            if let MeasureElement::Note(note) = element {
                if let (Some(pitch), Some(accidental)) = (visual_pitch(note), note.accidental) {
                    self.accidentals
                        .entry(pitch)
                        .or_default()
                        .push((note_onset(note, onset), accidental));
                }
            }
            advance_onset(element, &mut onset);
        }

        for list in self.accidentals.values_mut() {
            // stable, so simultaneous accidentals keep document order
            list.sort_by(|a, b| a.0.cmp(&b.0));
        }
    }

    /// Pass 2: carried accidental, then key signature, then natural.
    fn process_note(&self, note: &mut Note, onset: Fraction) {
        let Some(key) = visual_pitch(note) else {
            return;
        };

        let carried = self.accidentals.get(&key).and_then(|list| {
            list.iter()
                .take_while(|(at, _)| *at <= onset)
                .last()
                .map(|(_, accidental)| accidental.alteration())
        });
        let alter = carried.unwrap_or_else(|| key_signature_alteration(self.fifths, key.1));

        if let NoteContent::Pitch(pitch) = &mut note.content {
            pitch.alter = alter;
        }
    }

    fn process_ties(&mut self, note: &mut Note) {
        let Some(key) = visual_pitch(note) else {
            return;
        };

        // a note may both stop one tie and start the next
        if note.ties.contains(&StartStop::Stop) {
            let start = self
                .tie_starts
                .remove(&key)
                .or_else(|| self.previous_tie_starts.remove(&key));
            if let Some(start) = start {
                note.content = NoteContent::Pitch(start);
            }
        }

        if note.ties.contains(&StartStop::Start) {
            if let Some(pitch) = note.pitch() {
                self.tie_starts.insert(key, *pitch);
            }
        }
    }
}

/// Onset of a note given the cursor after the previous element. Chord
/// members moved nothing, so they start where the chord's first note did.
fn note_onset(note: &Note, cursor: Fraction) -> Fraction {
    match (note.chord, note.duration) {
        (true, Some(duration)) => cursor - duration,
        _ => cursor,
    }
}

fn advance_onset(element: &MeasureElement, onset: &mut Fraction) {
    match element {
        MeasureElement::Note(note) if !note.chord => {
            if let Some(duration) = note.duration {
                *onset += duration;
            }
        }
        MeasureElement::Backup(backup) => *onset -= backup.duration,
        MeasureElement::Forward(forward) => *onset += forward.duration,
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Attributes, Key, NoteType};

    fn quarter(step: Step, octave: i32) -> Note {
        Note::pitched(step, octave, NoteType::Quarter, Fraction::from_integer(1))
    }

    fn measure_with(key: Option<i32>, notes: Vec<Note>) -> Measure {
        let mut measure = Measure::new(1);
        if let Some(fifths) = key {
            measure.elements.push(MeasureElement::Attributes(Attributes {
                key: Some(Key { fifths }),
                ..Attributes::default()
            }));
        }
        measure
            .elements
            .extend(notes.into_iter().map(MeasureElement::Note));
        measure
    }

    fn alters(part: &Part) -> Vec<i32> {
        part.measures
            .iter()
            .flat_map(|m| m.notes())
            .filter_map(|n| n.pitch().map(|p| p.alter))
            .collect()
    }

    #[test]
    fn key_signature_ladders() {
        assert_eq!(key_signature_alteration(2, Step::F), 1);
        assert_eq!(key_signature_alteration(2, Step::C), 1);
        assert_eq!(key_signature_alteration(2, Step::G), 0);
        assert_eq!(key_signature_alteration(-1, Step::B), -1);
        assert_eq!(key_signature_alteration(-1, Step::E), 0);
        assert_eq!(key_signature_alteration(0, Step::F), 0);
        assert_eq!(key_signature_alteration(7, Step::B), 1);
    }

    #[test]
    fn natural_overrides_key_for_rest_of_measure() {
        let mut natural_f = quarter(Step::F, 4);
        natural_f.accidental = Some(Accidental::Natural);

        let mut part = Part::new("P1");
        part.measures.push(measure_with(
            Some(2),
            vec![
                quarter(Step::F, 4),
                quarter(Step::C, 5),
                natural_f,
                quarter(Step::F, 4),
            ],
        ));
        part.measures.push(measure_with(None, vec![quarter(Step::F, 4)]));

        alternate_pitches(&mut part);
        assert_eq!(alters(&part), vec![1, 1, 0, 0, 1]);
    }

    #[test]
    fn accidental_is_bound_to_staff_and_octave() {
        let mut sharp_g4 = quarter(Step::G, 4);
        sharp_g4.accidental = Some(Accidental::Sharp);
        let mut g4_lower_staff = quarter(Step::G, 4);
        g4_lower_staff.staff = Some(2);

        let mut part = Part::new("P1");
        part.measures.push(measure_with(
            None,
            vec![sharp_g4, quarter(Step::G, 5), g4_lower_staff, quarter(Step::G, 4)],
        ));

        alternate_pitches(&mut part);
        assert_eq!(alters(&part), vec![1, 0, 0, 1]);
    }

    #[test]
    fn tie_stop_copies_start_pitch_across_barline() {
        let mut start = quarter(Step::F, 4);
        start.accidental = Some(Accidental::Sharp);
        start.ties = vec![StartStop::Start];
        let mut stop = quarter(Step::F, 4);
        stop.ties = vec![StartStop::Stop];

        let mut part = Part::new("P1");
        part.measures.push(measure_with(None, vec![start]));
        part.measures.push(measure_with(None, vec![stop, quarter(Step::F, 4)]));

        alternate_pitches(&mut part);
        assert_eq!(alters(&part), vec![1, 1, 0]);
    }

    #[test]
    fn tie_starts_expire_after_following_measure() {
        let mut start = quarter(Step::B, 3);
        start.accidental = Some(Accidental::Flat);
        start.ties = vec![StartStop::Start];
        let mut stop = quarter(Step::B, 3);
        stop.ties = vec![StartStop::Stop];

        let mut part = Part::new("P1");
        part.measures.push(measure_with(None, vec![start]));
        part.measures.push(measure_with(None, vec![quarter(Step::C, 4)]));
        part.measures.push(measure_with(None, vec![stop]));

        alternate_pitches(&mut part);
        assert_eq!(alters(&part), vec![-1, 0, 0]);
    }

    #[test]
    fn chord_members_share_onset_with_accidental() {
        let mut root = quarter(Step::C, 4);
        let mut sharp_e = quarter(Step::E, 4);
        sharp_e.chord = true;
        sharp_e.accidental = Some(Accidental::Sharp);
        root.voice = Some(1);

        let mut part = Part::new("P1");
        part.measures
            .push(measure_with(None, vec![root, sharp_e, quarter(Step::E, 4)]));

        alternate_pitches(&mut part);
        assert_eq!(alters(&part), vec![0, 1, 1]);
    }

    #[test]
    fn running_twice_is_idempotent() {
        let mut sharp_f = quarter(Step::F, 4);
        sharp_f.accidental = Some(Accidental::Sharp);
        sharp_f.ties = vec![StartStop::Start];
        let mut tied_f = quarter(Step::F, 4);
        tied_f.ties = vec![StartStop::Stop];

        let mut part = Part::new("P1");
        part.measures.push(measure_with(
            Some(-3),
            vec![quarter(Step::B, 4), sharp_f, tied_f, quarter(Step::A, 4)],
        ));

        alternate_pitches(&mut part);
        let once = part.clone();
        alternate_pitches(&mut part);
        assert_eq!(part, once);
        assert_eq!(alters(&part), vec![-1, 1, 1, -1]);
    }
}
