//! Linearizer: encodes a part tree into LMX tokens.
//!
//! Measures are walked in document order. Each element becomes a run of
//! tokens around one ROOT token (a note type, `rest:measure`, `time`, a key
//! or a clef). Voice, stem and staff are sticky: they are written only when
//! they change, and forgotten at the start of a measure and at every backup.
//!
//! Encoding never stops on bad input. Anything the vocabulary cannot express
//! or that contradicts the part's own arithmetic is reported as a diagnostic
//! and the rest of the part is still encoded.

use std::collections::BTreeMap;

use crate::duration::{decompose_ticks, expected_ticks, measure_duration};
use crate::error::{DiagnosticKind, Diagnostics};
use crate::model::*;
use crate::vocabulary::{BeamToken, ClefSign, Terminal};

/// Encode a part in actual (integer tick) duration form.
pub fn linearize(part: &Part) -> (Vec<String>, Diagnostics) {
    let mut linearizer = Linearizer::new(&part.id);
    for measure in &part.measures {
        linearizer.process_measure(measure);
    }

    log::debug!(
        "linearized part '{}': {} measures, {} tokens, {} diagnostics",
        part.id,
        part.measures.len(),
        linearizer.tokens.len(),
        linearizer.diagnostics.len()
    );
    (linearizer.tokens, linearizer.diagnostics)
}

/// State living for one part.
#[derive(Debug, Default)]
struct PartState {
    divisions: Option<i64>,
    time: Option<TimeSignature>,
    /// Full measure length in ticks
    measure_duration: Option<Fraction>,
    staves: Option<u8>,
    clefs: BTreeMap<u8, Terminal>,
    fifths: Option<i32>,
}

/// State reset at each measure and, except for the onset, at each backup.
#[derive(Debug, Default)]
struct MeasureState {
    stem: Option<Stem>,
    staff: Option<u8>,
    /// Ticks since the start of the measure
    onset: Fraction,
    voice: Option<u8>,
    previous_duration: Option<Fraction>,
    previous_pitch: Option<Pitch>,
}

struct Linearizer<'a> {
    part_id: &'a str,
    measure_number: i32,
    tokens: Vec<String>,
    diagnostics: Diagnostics,
    part: PartState,
    measure: MeasureState,
}

impl<'a> Linearizer<'a> {
    fn new(part_id: &'a str) -> Self {
        Self {
            part_id,
            measure_number: 0,
            tokens: Vec::new(),
            diagnostics: Diagnostics::new(),
            part: PartState::default(),
            measure: MeasureState::default(),
        }
    }

    fn error(&mut self, kind: DiagnosticKind, message: impl AsRef<str>) {
        let message = format!(
            "[P:{} M:{}] {}",
            self.part_id,
            self.measure_number,
            message.as_ref()
        );
        self.diagnostics.push(kind, None, message);
    }

    /// Append a token, unless its payload lies outside the vocabulary.
    fn emit(&mut self, terminal: Terminal) {
        if terminal.is_valid() {
            self.tokens.push(terminal.to_string());
        } else {
            self.error(
                DiagnosticKind::Lexical,
                format!("Token '{terminal}' is not in the vocabulary."),
            );
        }
    }

    fn process_measure(&mut self, measure: &Measure) {
        self.measure = MeasureState::default();
        self.measure_number = measure.number;

        self.emit(Terminal::Measure);

        for element in &measure.elements {
            match element {
                MeasureElement::Attributes(attrs) => self.process_attributes(attrs),
                MeasureElement::Note(note) => self.process_note(note),
                MeasureElement::Backup(backup) => self.process_backup(backup),
                MeasureElement::Forward(forward) => self.process_forward(forward),
            }
        }
    }

    // ─── Attributes ──────────────────────────────────────────────────

    fn process_attributes(&mut self, attrs: &Attributes) {
        if let Some(divisions) = attrs.divisions {
            if divisions > 0 {
                self.part.divisions = Some(divisions);
            } else {
                self.error(
                    DiagnosticKind::Semantic,
                    format!("<divisions> should be a positive number, got {divisions}"),
                );
            }
        }

        if let Some(key) = attrs.key {
            self.part.fifths = Some(key.fifths);
            self.emit(Terminal::Key(key.fifths));
        }

        if let Some(time) = attrs.time {
            self.process_time(time);
        }

        if let Some(staves) = attrs.staves {
            self.part.staves = Some(staves);
        }

        self.process_clefs(&attrs.clefs);
    }

    fn process_time(&mut self, time: TimeSignature) {
        self.part.time = Some(time);

        self.emit(Terminal::Time);
        self.emit(Terminal::Beats(time.beats));
        self.emit(Terminal::BeatType(time.beat_type));

        match self.part.divisions {
            Some(divisions) => {
                self.part.measure_duration = Some(measure_duration(&time) * divisions);
            }
            None => {
                self.part.measure_duration = None;
                self.error(
                    DiagnosticKind::Semantic,
                    "Time signature should follow <divisions>.",
                );
            }
        }
    }

    fn process_clefs(&mut self, clefs: &[Clef]) {
        let mut to_print = BTreeMap::new();
        for clef in clefs {
            let Some(sign) = ClefSign::from_name(&clef.sign) else {
                self.error(
                    DiagnosticKind::Lexical,
                    format!("Clef sign '{}' is not in the vocabulary.", clef.sign),
                );
                continue;
            };
            let terminal = Terminal::Clef {
                sign,
                line: u8::try_from(clef.line).unwrap_or(0),
            };
            to_print.insert(clef.staff(), terminal);
            self.part.clefs.insert(clef.staff(), terminal);
        }

        // staff numbers only matter on multi-staff parts
        for (staff, terminal) in to_print {
            self.emit(terminal);
            if self.part.staves.is_some() {
                self.emit(Terminal::Staff(staff));
            }
        }
    }

    // ─── Note ────────────────────────────────────────────────────────

    fn process_note(&mut self, note: &Note) {
        let is_grace = note.grace.is_some();

        // prefixes
        if !note.print_object {
            self.emit(Terminal::PrintObjectNo);
        }
        if let Some(grace) = note.grace {
            self.emit(Terminal::Grace);
            if grace.slash {
                self.emit(Terminal::GraceSlash);
            }
        }
        if note.chord {
            self.emit(Terminal::Chord);
        }
        match note.content {
            NoteContent::Rest { .. } => self.emit(Terminal::Rest),
            NoteContent::Pitch(pitch) => match u8::try_from(pitch.octave) {
                Ok(octave) => self.emit(Terminal::Pitch {
                    step: pitch.step,
                    octave,
                }),
                Err(_) => self.error(
                    DiagnosticKind::Lexical,
                    format!("Invalid pitch: {}{}", pitch.step, pitch.octave),
                ),
            },
        }
        if let Some(voice) = note.voice {
            if self.measure.voice != Some(voice) {
                self.emit(Terminal::Voice(voice));
                self.measure.voice = Some(voice);
            }
        }

        // root
        match note.note_type {
            Some(note_type) => self.emit(Terminal::Type(note_type)),
            None if note.is_measure_rest() => self.emit(Terminal::MeasureRest),
            None => self.error(DiagnosticKind::Grammar, "Note does not have <type>."),
        }

        // suffixes
        if let Some(tm) = note.time_modification {
            self.emit(Terminal::TimeModification {
                actual: tm.actual,
                normal: tm.normal,
            });
        }
        for _ in 0..note.dots {
            self.emit(Terminal::Dot);
        }
        if let Some(accidental) = note.accidental {
            self.emit(Terminal::Accidental(accidental));
        }
        if let Some(stem) = note.stem {
            if self.measure.stem != Some(stem) {
                self.emit(Terminal::Stem(stem));
                self.measure.stem = Some(stem);
            }
        }
        if let Some(staff) = note.staff {
            if self.part.staves.is_none() {
                self.error(
                    DiagnosticKind::Grammar,
                    format!("Note on staff {staff} in a part without <staves>."),
                );
            }
            if self.measure.staff != Some(staff) {
                self.emit(Terminal::Staff(staff));
                self.measure.staff = Some(staff);
            }
        }
        for beam in &note.beams {
            let token = match beam.value {
                BeamValue::Begin => BeamToken::Begin,
                BeamValue::End => BeamToken::End,
                BeamValue::ForwardHook => BeamToken::ForwardHook,
                BeamValue::BackwardHook => BeamToken::BackwardHook,
                BeamValue::Continue => continue,
            };
            self.emit(Terminal::Beam(token));
        }
        for &tie in &note.ties {
            self.emit(Terminal::Tied(tie));
        }
        for &tuplet in &note.notations.tuplets {
            self.emit(Terminal::Tuplet(tuplet));
        }
        self.process_extended_notations(&note.notations);

        if note.duration.is_none() && !is_grace {
            self.error(DiagnosticKind::Semantic, "Note lacks duration.");
        }

        self.verify_note_duration(note);
        self.verify_chord(note);

        self.measure.previous_duration = note.duration;
        self.measure.previous_pitch = note.pitch().copied();
        if let (Some(duration), false) = (note.duration, note.chord) {
            self.measure.onset += duration;
        }
    }

    fn process_extended_notations(&mut self, notations: &Notations) {
        for &slur in &notations.slurs {
            self.emit(Terminal::Slur(slur));
        }
        if notations.fermata {
            self.emit(Terminal::Fermata);
        }
        if notations.arpeggiate {
            self.emit(Terminal::Arpeggiate);
        }
        if notations.staccato {
            self.emit(Terminal::Staccato);
        }
        if notations.accent {
            self.emit(Terminal::Accent);
        }
        if notations.strong_accent {
            self.emit(Terminal::StrongAccent);
        }
        if notations.tenuto {
            self.emit(Terminal::Tenuto);
        }
        if let Some(tremolo) = notations.tremolo {
            self.emit(Terminal::TremoloType(tremolo.kind));
            self.emit(Terminal::TremoloMarks(tremolo.marks));
        }
        if notations.trill_mark {
            self.emit(Terminal::TrillMark);
        }
    }

    fn verify_note_duration(&mut self, note: &Note) {
        let Some(duration) = note.duration else {
            return;
        };

        if note.is_measure_rest() {
            if self.part.measure_duration != Some(duration) {
                let expected = self
                    .part
                    .measure_duration
                    .map_or_else(|| "unknown".to_string(), |d| d.to_string());
                self.error(
                    DiagnosticKind::Semantic,
                    format!(
                        "Measure rest does not have expected duration. Expected: {expected} Actual: {duration}"
                    ),
                );
            }
            return;
        }

        let (Some(note_type), Some(divisions)) = (note.note_type, self.part.divisions) else {
            return;
        };
        // exporters round tuplet durations at capped divisions
        let (rounded, exact) =
            expected_ticks(note_type, note.dots, note.time_modification, divisions);
        if Fraction::from_integer(rounded) != duration {
            self.error(
                DiagnosticKind::Semantic,
                format!(
                    "Note does not have expected duration. Expected: {exact} Actual: {duration}"
                ),
            );
        }
    }

    fn verify_chord(&mut self, note: &Note) {
        if !note.chord {
            return;
        }

        if note.duration != self.measure.previous_duration {
            self.error(DiagnosticKind::Semantic, "Chord notes have varying duration.");
        }

        if let (Some(previous), Some(current)) = (self.measure.previous_pitch, note.pitch()) {
            if previous.order() > current.order() {
                self.error(
                    DiagnosticKind::Semantic,
                    "Chord notes must have ascending pitches.",
                );
            }
        }
    }

    // ─── Backup / Forward ────────────────────────────────────────────

    fn process_backup(&mut self, backup: &Backup) {
        self.emit_ladder(Terminal::Backup, backup.duration);

        if backup.duration > self.measure.onset {
            self.error(
                DiagnosticKind::Semantic,
                format!(
                    "Backup of {} exceeds the current onset {}.",
                    backup.duration, self.measure.onset
                ),
            );
        }

        let onset = self.measure.onset - backup.duration;
        self.measure = MeasureState {
            onset,
            ..MeasureState::default()
        };
    }

    fn process_forward(&mut self, forward: &Forward) {
        self.emit_ladder(Terminal::Forward, forward.duration);
        self.measure.onset += forward.duration;
    }

    /// Spell a duration as `marker type` pairs, longest type first.
    fn emit_ladder(&mut self, marker: Terminal, duration: Fraction) {
        let Some(divisions) = self.part.divisions else {
            self.error(
                DiagnosticKind::Semantic,
                format!("<{marker}> should follow <divisions>."),
            );
            return;
        };
        if !duration.is_integer() || duration <= Fraction::from_integer(0) {
            self.error(
                DiagnosticKind::Semantic,
                format!("<{marker}> duration must be a positive tick count, got {duration}."),
            );
            return;
        }

        let (types, remainder) = decompose_ticks(duration.to_integer(), divisions);
        for note_type in types {
            self.emit(marker);
            self.emit(Terminal::Type(note_type));
        }

        if remainder != Fraction::from_integer(0) {
            self.error(
                DiagnosticKind::Semantic,
                format!(
                    "Duration could not be split up to note types for <{marker}>, \
                     most likely a tuplet forward. Duration: {duration} Divisions: {divisions} \
                     Remainder: {remainder}"
                ),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ticks(n: i64) -> Fraction {
        Fraction::from_integer(n)
    }

    fn header(divisions: i64) -> MeasureElement {
        MeasureElement::Attributes(Attributes {
            divisions: Some(divisions),
            ..Attributes::default()
        })
    }

    fn part_of(elements: Vec<MeasureElement>) -> Part {
        let mut measure = Measure::new(1);
        measure.elements = elements;
        let mut part = Part::new("P1");
        part.measures.push(measure);
        part
    }

    #[test]
    fn empty_measure() {
        let (tokens, diagnostics) = linearize(&part_of(vec![]));
        assert_eq!(tokens, vec!["measure"]);
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn quarter_rest() {
        let part = part_of(vec![
            header(4),
            MeasureElement::Note(Note::rest(NoteType::Quarter, ticks(4))),
        ]);
        let (tokens, diagnostics) = linearize(&part);
        assert_eq!(tokens, vec!["measure", "rest", "quarter"]);
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn backup_ladder() {
        let part = part_of(vec![
            header(4),
            MeasureElement::Note(Note::rest(NoteType::Whole, ticks(16))),
            MeasureElement::Backup(Backup { duration: ticks(12) }),
        ]);
        let (tokens, diagnostics) = linearize(&part);
        assert_eq!(
            tokens,
            vec!["measure", "rest", "whole", "backup", "half", "backup", "quarter"]
        );
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn undecomposable_forward_is_reported() {
        let part = part_of(vec![
            header(3),
            MeasureElement::Forward(Forward { duration: ticks(5) }),
        ]);
        let (_, diagnostics) = linearize(&part);
        assert_eq!(diagnostics.count(DiagnosticKind::Semantic), 1);
    }

    #[test]
    fn inexact_forward_is_reported() {
        // a third of a quarter at divisions 480
        let part = part_of(vec![
            header(480),
            MeasureElement::Forward(Forward { duration: ticks(160) }),
        ]);
        let (tokens, diagnostics) = linearize(&part);
        assert_eq!(diagnostics.count(DiagnosticKind::Semantic), 1);
        assert_eq!(tokens[1..3], ["forward", "16th"]);
    }

    #[test]
    fn backup_beyond_onset_is_reported() {
        let part = part_of(vec![
            header(1),
            MeasureElement::Backup(Backup { duration: ticks(1) }),
        ]);
        let (_, diagnostics) = linearize(&part);
        assert_eq!(diagnostics.count(DiagnosticKind::Semantic), 1);
    }

    #[test]
    fn attributes_and_staff_numbered_clefs() {
        let part = part_of(vec![MeasureElement::Attributes(Attributes {
            divisions: Some(2),
            key: Some(Key { fifths: -2 }),
            time: Some(TimeSignature { beats: 3, beat_type: 4 }),
            staves: Some(2),
            clefs: vec![
                Clef { number: Some(2), sign: "F".into(), line: 4 },
                Clef { number: Some(1), sign: "G".into(), line: 2 },
            ],
        })]);
        let (tokens, diagnostics) = linearize(&part);
        assert_eq!(
            tokens,
            vec![
                "measure", "key:fifths:-2", "time", "beats:3", "beat-type:4",
                "clef:G2", "staff:1", "clef:F4", "staff:2",
            ]
        );
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn single_staff_clef_has_no_staff_token() {
        let part = part_of(vec![MeasureElement::Attributes(Attributes {
            clefs: vec![Clef { number: None, sign: "G".into(), line: 2 }],
            ..Attributes::default()
        })]);
        let (tokens, _) = linearize(&part);
        assert_eq!(tokens, vec!["measure", "clef:G2"]);
    }

    #[test]
    fn sticky_voice_stem_and_staff() {
        let mut first = Note::pitched(Step::G, 4, NoteType::Eighth, ticks(1));
        first.voice = Some(1);
        first.stem = Some(Stem::Up);
        first.staff = Some(1);
        first.beams = vec![Beam { number: 1, value: BeamValue::Begin }];
        let mut second = Note::pitched(Step::A, 4, NoteType::Eighth, ticks(1));
        second.voice = Some(1);
        second.stem = Some(Stem::Up);
        second.staff = Some(1);
        second.beams = vec![Beam { number: 1, value: BeamValue::End }];
        let mut lower = Note::pitched(Step::C, 3, NoteType::Quarter, ticks(2));
        lower.voice = Some(5);
        lower.stem = Some(Stem::Up);
        lower.staff = Some(2);

        let part = part_of(vec![
            MeasureElement::Attributes(Attributes {
                divisions: Some(2),
                staves: Some(2),
                ..Attributes::default()
            }),
            MeasureElement::Note(first),
            MeasureElement::Note(second),
            MeasureElement::Backup(Backup { duration: ticks(2) }),
            MeasureElement::Note(lower),
        ]);
        let (tokens, diagnostics) = linearize(&part);
        assert_eq!(
            tokens,
            vec![
                "measure",
                "G4", "voice:1", "eighth", "stem:up", "staff:1", "beam:begin",
                "A4", "eighth", "beam:end",
                "backup", "quarter",
                "C3", "voice:5", "quarter", "stem:up", "staff:2",
            ]
        );
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn chord_checks() {
        let mut lower = Note::pitched(Step::E, 4, NoteType::Quarter, ticks(4));
        lower.chord = true;
        let part = part_of(vec![
            header(4),
            MeasureElement::Note(Note::pitched(Step::G, 4, NoteType::Quarter, ticks(4))),
            MeasureElement::Note(lower),
        ]);
        let (tokens, diagnostics) = linearize(&part);
        assert_eq!(tokens, vec!["measure", "G4", "quarter", "chord", "E4", "quarter"]);
        assert_eq!(diagnostics.count(DiagnosticKind::Semantic), 1);
    }

    #[test]
    fn duration_checks_round_like_exporters() {
        let septuplet = TimeModification { actual: 7, normal: 4 };
        let mut note = Note::pitched(Step::C, 5, NoteType::N16th, ticks(69));
        note.time_modification = Some(septuplet);
        let mut wrong = Note::rest(NoteType::Quarter, ticks(100));
        wrong.voice = Some(1);

        let part = part_of(vec![header(480), MeasureElement::Note(note), MeasureElement::Note(wrong)]);
        let (tokens, diagnostics) = linearize(&part);
        assert_eq!(
            tokens,
            vec!["measure", "C5", "16th", "7in4", "rest", "voice:1", "quarter"]
        );
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn measure_rest_checked_against_time_signature() {
        let mut rest = Note::rest(NoteType::Whole, ticks(3));
        rest.note_type = None;
        rest.content = NoteContent::Rest { measure: true };
        let part = part_of(vec![
            MeasureElement::Attributes(Attributes {
                divisions: Some(1),
                time: Some(TimeSignature { beats: 3, beat_type: 4 }),
                ..Attributes::default()
            }),
            MeasureElement::Note(rest.clone()),
        ]);
        let (tokens, diagnostics) = linearize(&part);
        assert_eq!(
            tokens,
            vec!["measure", "time", "beats:3", "beat-type:4", "rest", "rest:measure"]
        );
        assert!(diagnostics.is_empty());

        rest.duration = Some(ticks(4));
        let mut part = part;
        part.measures[0].elements[1] = MeasureElement::Note(rest);
        let (_, diagnostics) = linearize(&part);
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn notations_in_fixed_order() {
        let mut note = Note::pitched(Step::D, 5, NoteType::Eighth, ticks(1));
        note.time_modification = Some(TimeModification { actual: 3, normal: 2 });
        note.ties = vec![StartStop::Start];
        note.notations = Notations {
            tuplets: vec![StartStop::Start],
            slurs: vec![StartStop::Stop],
            fermata: true,
            staccato: true,
            tremolo: Some(Tremolo { kind: TremoloType::Single, marks: 2 }),
            trill_mark: true,
            ..Notations::default()
        };
        let part = part_of(vec![header(3), MeasureElement::Note(note)]);
        let (tokens, diagnostics) = linearize(&part);
        assert_eq!(
            tokens,
            vec![
                "measure", "D5", "eighth", "3in2", "tied:start", "tuplet:start",
                "slur:stop", "fermata", "staccato", "tremolo:single", "tremolo:2",
                "trill-mark",
            ]
        );
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn out_of_vocabulary_payloads_are_not_emitted() {
        let part = part_of(vec![MeasureElement::Attributes(Attributes {
            divisions: Some(1),
            time: Some(TimeSignature { beats: 40, beat_type: 4 }),
            ..Attributes::default()
        })]);
        let (tokens, diagnostics) = linearize(&part);
        assert_eq!(tokens, vec!["measure", "time", "beat-type:4"]);
        assert_eq!(diagnostics.count(DiagnosticKind::Lexical), 1);
    }
}
