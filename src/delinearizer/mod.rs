//! Delinearizer: decodes LMX tokens back into a part tree.
//!
//! Decoding runs in stages:
//! 1. [`lexer`] classifies terminals, dropping unknown ones.
//! 2. [`grammar`] splits the stream into measures and groups each
//!    measure's tokens into root/prefix/suffix item trees.
//! 3. [`notes`] partitions each item's modifiers into typed fields, from
//!    which attributes, notes, backups and forwards are rebuilt here.
//! 4. [`beams`] restores implied `continue` beams and beam numbers.
//!
//! The input is typically a model prediction, so nothing here aborts: every
//! defect is reported and decoding carries on with a local best guess.

pub mod beams;
pub mod grammar;
pub mod lexer;
pub mod notes;

use serde::{Deserialize, Serialize};

use self::beams::{BeamRequest, BeamState};
use self::grammar::{build_trees, cluster_measures, ItemTree};
use self::lexer::{lex_terminals, Token};
use self::notes::{partition_clef, partition_key, partition_note, partition_skip, partition_time};
use crate::duration::{fractional_to_actual, measure_duration, note_duration};
use crate::error::Diagnostics;
use crate::model::*;
use crate::pitch_alternator::alternate_pitches;
use crate::vocabulary::Terminal;

pub use self::lexer::lex;

/// Options of a single decode call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelinearizeOptions {
    /// Leave durations as quarter-note fractions without `<divisions>`.
    pub keep_fractional_durations: bool,
}

/// Decode pre-split terminals into a part.
pub fn delinearize<S: AsRef<str>>(terminals: &[S], options: &DelinearizeOptions) -> (Part, Diagnostics) {
    let (tokens, mut diagnostics) = lex_terminals(terminals);
    let part = delinearize_tokens(&tokens, options, &mut diagnostics);
    (part, diagnostics)
}

/// Decode whitespace-separated LMX text into a part.
pub fn delinearize_text(text: &str, options: &DelinearizeOptions) -> (Part, Diagnostics) {
    let (tokens, mut diagnostics) = lex(text);
    let part = delinearize_tokens(&tokens, options, &mut diagnostics);
    (part, diagnostics)
}

/// Decode already lexed tokens, appending to an existing diagnostics list.
pub fn delinearize_tokens(tokens: &[Token], options: &DelinearizeOptions, diagnostics: &mut Diagnostics) -> Part {
    let mut part = Part::new("P1");
    let mut delinearizer = Delinearizer::new(diagnostics);

    let clusters = cluster_measures(tokens, delinearizer.diagnostics);
    for (index, cluster) in clusters.iter().enumerate() {
        let number = i32::try_from(index + 1).unwrap_or(i32::MAX);
        part.measures.push(delinearizer.process_measure(number, cluster));
    }

    synthesize_staves(&mut part);
    alternate_pitches(&mut part);

    if !options.keep_fractional_durations {
        if let Err(e) = fractional_to_actual(&mut part) {
            diagnostics.semantic(None, e.to_string());
        }
    }

    log::debug!(
        "delinearized {} tokens into {} measures, {} diagnostics",
        tokens.len(),
        part.measures.len(),
        diagnostics.len()
    );
    part
}

/// State living for one decode call.
#[derive(Debug, Default)]
struct PartState {
    /// Full measure length in quarters, from the last time signature
    measure_duration: Option<Fraction>,
    beams: BeamState,
}

/// Sticky values, reset at each measure and at each backup.
#[derive(Debug, Default)]
struct MeasureState {
    voice: Option<u8>,
    stem: Option<Stem>,
    staff: Option<u8>,
    previous_pitch: Option<Pitch>,
    chord_duration: Option<Fraction>,
}

struct Delinearizer<'d> {
    diagnostics: &'d mut Diagnostics,
    part: PartState,
    measure: MeasureState,
}

impl<'d> Delinearizer<'d> {
    fn new(diagnostics: &'d mut Diagnostics) -> Self {
        Self {
            diagnostics,
            part: PartState::default(),
            measure: MeasureState::default(),
        }
    }

    fn process_measure(&mut self, number: i32, tokens: &[Token]) -> Measure {
        self.measure = MeasureState::default();

        let mut measure = Measure::new(number);
        let mut attributes_run = false;

        for tree in build_trees(tokens, self.diagnostics) {
            if tree.root.terminal.is_attribute_root() {
                // a contiguous run of attribute roots shares one element
                if !attributes_run {
                    measure
                        .elements
                        .push(MeasureElement::Attributes(Attributes::default()));
                    attributes_run = true;
                }
                if let Some(MeasureElement::Attributes(attrs)) = measure.elements.last_mut() {
                    self.process_attributes(&tree, attrs);
                }
                continue;
            }
            attributes_run = false;

            if let Some(element) = self.process_item(&tree) {
                push_merged(&mut measure.elements, element);
            }
        }

        order_chords(&mut measure.elements);
        measure
    }

    // ─── Attributes ──────────────────────────────────────────────────

    fn process_attributes(&mut self, tree: &ItemTree, attrs: &mut Attributes) {
        match tree.root.terminal {
            Terminal::Key(fifths) => {
                partition_key(tree, self.diagnostics);
                if attrs.key.is_some() {
                    self.diagnostics.grammar(
                        Some(tree.root.position),
                        "Additional key signature in one <attributes> element.",
                    );
                } else {
                    attrs.key = Some(Key { fifths });
                }
            }
            Terminal::Time => {
                let (beats, beat_type) = partition_time(tree, self.diagnostics);
                if beats.is_none() {
                    self.diagnostics.grammar(
                        Some(tree.root.position),
                        "Missing beats token from time signature.",
                    );
                }
                if beat_type.is_none() {
                    self.diagnostics.grammar(
                        Some(tree.root.position),
                        "Missing beat type token from time signature.",
                    );
                }
                let time = TimeSignature {
                    beats: beats.unwrap_or(4),
                    beat_type: beat_type.unwrap_or(4),
                };
                self.part.measure_duration = Some(measure_duration(&time));
                attrs.time = Some(time);
            }
            Terminal::Clef { sign, line } => {
                let staff = partition_clef(tree, self.diagnostics);
                attrs.clefs.push(Clef {
                    number: staff,
                    sign: sign.name().to_string(),
                    line: i32::from(line),
                });
            }
            _ => {}
        }
    }

    // ─── Notes, backups and forwards ─────────────────────────────────

    fn process_item(&mut self, tree: &ItemTree) -> Option<MeasureElement> {
        let marker = tree
            .prefixes
            .iter()
            .rev()
            .map(|t| t.terminal)
            .find(|t| matches!(t, Terminal::Backup | Terminal::Forward));

        match marker {
            Some(marker) => self.process_skip(tree, marker),
            None => Some(MeasureElement::Note(self.process_note(tree))),
        }
    }

    fn process_skip(&mut self, tree: &ItemTree, marker: Terminal) -> Option<MeasureElement> {
        let time_modification = partition_skip(tree, marker, self.diagnostics);

        let Terminal::Type(note_type) = tree.root.terminal else {
            self.diagnostics.grammar(
                Some(tree.root.position),
                format!(
                    "'{}' cannot be the root of a {marker} element.",
                    tree.root.terminal
                ),
            );
            return None;
        };
        let duration = note_duration(note_type, 0, time_modification);

        if marker == Terminal::Backup {
            self.measure = MeasureState::default();
            Some(MeasureElement::Backup(Backup { duration }))
        } else {
            Some(MeasureElement::Forward(Forward { duration }))
        }
    }

    fn process_note(&mut self, tree: &ItemTree) -> Note {
        let root = tree.root;
        let n = partition_note(tree, self.diagnostics);

        let (note_type, is_measure_rest) = match root.terminal {
            Terminal::Type(note_type) => (Some(note_type), false),
            _ => (None, true),
        };

        if n.grace_slash && !n.grace {
            self.diagnostics.grammar(
                Some(root.position),
                "Token 'grace:slash' without 'grace'.",
            );
        }

        let content = if n.rest.is_some() || is_measure_rest {
            if let Some((step, octave, position)) = n.pitch {
                self.diagnostics.grammar(
                    Some(position),
                    format!("Unexpected pitch token '{step}{octave}' on a rest."),
                );
            }
            if n.rest.is_none() {
                self.diagnostics
                    .grammar(Some(root.position), "Token 'rest:measure' without 'rest'.");
            }
            NoteContent::Rest {
                measure: is_measure_rest,
            }
        } else if let Some((step, octave, _)) = n.pitch {
            NoteContent::Pitch(Pitch {
                step,
                octave: i32::from(octave),
                alter: 0,
            })
        } else {
            self.diagnostics.grammar(
                Some(root.position),
                "Note has neither a pitch nor a rest token, assuming a rest.",
            );
            NoteContent::Rest { measure: false }
        };

        // sticky values
        if n.voice.is_some() {
            self.measure.voice = n.voice;
        }
        if n.stem.is_some() {
            self.measure.stem = n.stem;
        }
        if n.staff.is_some() {
            self.measure.staff = n.staff;
        }

        if n.chord {
            if let (Some(previous), NoteContent::Pitch(current)) = (self.measure.previous_pitch, &content) {
                if previous.order() > current.order() {
                    self.diagnostics.semantic(
                        Some(root.position),
                        "Chord notes must have ascending pitches.",
                    );
                }
            }
        }
        self.measure.previous_pitch = match content {
            NoteContent::Pitch(pitch) => Some(pitch),
            NoteContent::Rest { .. } => None,
        };

        let duration = if n.grace {
            None
        } else if is_measure_rest {
            if self.part.measure_duration.is_none() {
                self.diagnostics.semantic(
                    Some(root.position),
                    "Measure rest in a measure of unknown duration.",
                );
            }
            self.part.measure_duration
        } else {
            note_type.map(|t| note_duration(t, n.dots, n.time_modification))
        };

        if n.chord {
            if let (Some(head), Some(current)) = (self.measure.chord_duration, duration) {
                if head != current {
                    self.diagnostics.semantic(
                        Some(root.position),
                        format!("Chord note lasts {current}, the chord head lasts {head}."),
                    );
                }
            }
        } else {
            self.measure.chord_duration = duration;
        }

        let beams = self.part.beams.resolve(
            BeamRequest {
                tokens: &n.beams,
                grace: n.grace,
                chord: n.chord,
                beamable: note_type.is_some_and(NoteType::is_beamable),
                position: root.position,
            },
            self.diagnostics,
        );

        let mut notations = n.notations;
        notations.tremolo = match (n.tremolo_type, n.tremolo_marks) {
            (None, None) => None,
            (kind, Some(marks)) => Some(Tremolo {
                kind: kind.unwrap_or(TremoloType::Single),
                marks,
            }),
            (Some(kind), None) => {
                self.diagnostics.grammar(
                    Some(root.position),
                    format!("Tremolo '{}' lacks a marks token.", kind.name()),
                );
                Some(Tremolo { kind, marks: 3 })
            }
        };

        Note {
            print_object: !n.print_object_no,
            grace: n.grace.then_some(Grace {
                slash: n.grace_slash,
            }),
            chord: n.chord,
            content,
            duration,
            ties: n.ties,
            voice: self.measure.voice,
            note_type,
            dots: n.dots,
            accidental: n.accidental,
            time_modification: n.time_modification,
            stem: self.measure.stem,
            staff: self.measure.staff,
            beams,
            notations,
        }
    }
}

/// Append an element, folding a backup into a preceding backup and a
/// forward into a preceding forward.
fn push_merged(elements: &mut Vec<MeasureElement>, element: MeasureElement) {
    match (elements.last_mut(), element) {
        (Some(MeasureElement::Backup(last)), MeasureElement::Backup(next)) => {
            last.duration += next.duration;
        }
        (Some(MeasureElement::Forward(last)), MeasureElement::Forward(next)) => {
            last.duration += next.duration;
        }
        (_, element) => elements.push(element),
    }
}

/// Put every all-pitched chord into ascending pitch order. The chord's
/// beams stay on whichever note ends up first.
fn order_chords(elements: &mut [MeasureElement]) {
    let is_chord_member =
        |e: &MeasureElement| matches!(e, MeasureElement::Note(note) if note.chord);

    let mut start = 0;
    while start < elements.len() {
        let mut end = start + 1;
        while end < elements.len() && is_chord_member(&elements[end]) {
            end += 1;
        }
        if end - start > 1 {
            order_chord(&mut elements[start..end]);
        }
        start = end;
    }
}

fn order_chord(group: &mut [MeasureElement]) {
    let mut orders = Vec::with_capacity(group.len());
    for element in group.iter() {
        match element {
            MeasureElement::Note(Note {
                content: NoteContent::Pitch(pitch),
                ..
            }) => orders.push(pitch.order()),
            _ => return,
        }
    }
    if orders.windows(2).all(|w| w[0] <= w[1]) {
        return;
    }

    let beams = match &mut group[0] {
        MeasureElement::Note(head) => std::mem::take(&mut head.beams),
        _ => Vec::new(),
    };
    group.sort_by_key(|e| match e {
        MeasureElement::Note(note) => note.pitch().map_or(0, Pitch::order),
        _ => 0,
    });
    for (i, element) in group.iter_mut().enumerate() {
        if let MeasureElement::Note(note) = element {
            note.chord = i > 0;
            if i == 0 {
                note.beams = beams.clone();
            }
        }
    }
}

/// Declare the staff count in the first attributes element that numbers
/// its clefs.
fn synthesize_staves(part: &mut Part) {
    let highest = part
        .measures
        .iter()
        .flat_map(|m| &m.elements)
        .filter_map(|e| match e {
            MeasureElement::Attributes(attrs) => Some(attrs),
            _ => None,
        })
        .flat_map(|attrs| attrs.clefs.iter().filter_map(|c| c.number))
        .max();
    let Some(staves) = highest else {
        return;
    };

    let first = part
        .measures
        .iter_mut()
        .flat_map(|m| m.elements.iter_mut())
        .find_map(|e| match e {
            MeasureElement::Attributes(attrs) if attrs.clefs.iter().any(|c| c.number.is_some()) => {
                Some(attrs)
            }
            _ => None,
        });
    if let Some(attrs) = first {
        attrs.staves = Some(staves);
    }
}
