//! Partitioning of measure-item modifiers into typed fields.
//!
//! Every prefix and suffix of an item is visited once and dropped into the
//! field its terminal belongs to. Exclusive fields keep one token and report
//! the rest as additional; prefixes are scanned from the root outwards, so
//! the token closest to the root wins. Tokens the item has no field for are
//! reported as unexpected.

use std::fmt;

use super::grammar::ItemTree;
use super::lexer::Token;
use crate::error::Diagnostics;
use crate::model::{Accidental, Notations, StartStop, Stem, Step, TimeModification, TremoloType};
use crate::vocabulary::{BeamToken, Terminal};

#[derive(Debug, Clone, Copy)]
enum Side {
    Prefix,
    Suffix,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Side::Prefix => "prefix",
            Side::Suffix => "suffix",
        })
    }
}

/// Reports against one item's root.
struct Partition<'a> {
    root: Token,
    diagnostics: &'a mut Diagnostics,
}

impl Partition<'_> {
    fn set<T>(&mut self, slot: &mut Option<T>, value: T, token: &Token, side: Side) {
        if slot.is_some() {
            self.additional(token, side);
        } else {
            *slot = Some(value);
        }
    }

    fn flag(&mut self, flag: &mut bool, token: &Token, side: Side) {
        if *flag {
            self.additional(token, side);
        }
        *flag = true;
    }

    fn additional(&mut self, token: &Token, side: Side) {
        self.diagnostics.grammar(
            Some(token.position),
            format!(
                "Additional {side} token '{}' for the '{}' token.",
                token.terminal, self.root.terminal
            ),
        );
    }

    fn unexpected(&mut self, token: &Token, side: Side) {
        self.diagnostics.grammar(
            Some(token.position),
            format!(
                "Unexpected {side} token '{}' for the '{}' token.",
                token.terminal, self.root.terminal
            ),
        );
    }

    fn reject_all(&mut self, tree: &ItemTree) {
        for token in &tree.prefixes {
            self.unexpected(token, Side::Prefix);
        }
        for token in &tree.suffixes {
            self.unexpected(token, Side::Suffix);
        }
    }
}

/// Modifiers of a note or rest.
#[derive(Debug, Default)]
pub struct NoteTokens {
    pub print_object_no: bool,
    pub grace: bool,
    pub grace_slash: bool,
    pub chord: bool,
    /// Position of the `rest` prefix
    pub rest: Option<usize>,
    /// Step, octave and token position
    pub pitch: Option<(Step, u8, usize)>,
    pub voice: Option<u8>,
    pub time_modification: Option<TimeModification>,
    pub dots: u8,
    pub accidental: Option<Accidental>,
    pub stem: Option<Stem>,
    pub staff: Option<u8>,
    /// Beam tokens with positions, in stream order
    pub beams: Vec<(BeamToken, usize)>,
    pub ties: Vec<StartStop>,
    pub notations: Notations,
    pub tremolo_type: Option<TremoloType>,
    pub tremolo_marks: Option<u8>,
}

pub fn partition_note(tree: &ItemTree, diagnostics: &mut Diagnostics) -> NoteTokens {
    let mut p = Partition {
        root: tree.root,
        diagnostics,
    };
    let mut n = NoteTokens::default();

    for token in tree.prefixes.iter().rev() {
        let side = Side::Prefix;
        match token.terminal {
            Terminal::PrintObjectNo => p.flag(&mut n.print_object_no, token, side),
            Terminal::Grace => p.flag(&mut n.grace, token, side),
            Terminal::GraceSlash => p.flag(&mut n.grace_slash, token, side),
            Terminal::Chord => p.flag(&mut n.chord, token, side),
            Terminal::Rest => p.set(&mut n.rest, token.position, token, side),
            Terminal::Pitch { step, octave } => {
                p.set(&mut n.pitch, (step, octave, token.position), token, side)
            }
            Terminal::Voice(voice) => p.set(&mut n.voice, voice, token, side),
            _ => p.unexpected(token, side),
        }
    }

    for token in &tree.suffixes {
        let side = Side::Suffix;
        let notations = &mut n.notations;
        match token.terminal {
            Terminal::TimeModification { actual, normal } => p.set(
                &mut n.time_modification,
                TimeModification { actual, normal },
                token,
                side,
            ),
            Terminal::Dot => n.dots = n.dots.saturating_add(1),
            Terminal::Accidental(accidental) => p.set(&mut n.accidental, accidental, token, side),
            Terminal::Stem(stem) => p.set(&mut n.stem, stem, token, side),
            Terminal::Staff(staff) => p.set(&mut n.staff, staff, token, side),
            Terminal::Beam(beam) => n.beams.push((beam, token.position)),
            Terminal::Tied(kind) => push_unique(&mut p, &mut n.ties, kind, token),
            Terminal::Tuplet(kind) => push_unique(&mut p, &mut notations.tuplets, kind, token),
            Terminal::Slur(kind) => notations.slurs.push(kind),
            Terminal::Fermata => p.flag(&mut notations.fermata, token, side),
            Terminal::Arpeggiate => p.flag(&mut notations.arpeggiate, token, side),
            Terminal::Staccato => p.flag(&mut notations.staccato, token, side),
            Terminal::Accent => p.flag(&mut notations.accent, token, side),
            Terminal::StrongAccent => p.flag(&mut notations.strong_accent, token, side),
            Terminal::Tenuto => p.flag(&mut notations.tenuto, token, side),
            Terminal::TrillMark => p.flag(&mut notations.trill_mark, token, side),
            Terminal::TremoloType(kind) => p.set(&mut n.tremolo_type, kind, token, side),
            Terminal::TremoloMarks(marks) => p.set(&mut n.tremolo_marks, marks, token, side),
            _ => p.unexpected(token, side),
        }
    }

    n
}

/// Ties and tuplets may start and stop on the same note, but not twice.
fn push_unique(p: &mut Partition<'_>, list: &mut Vec<StartStop>, kind: StartStop, token: &Token) {
    if list.contains(&kind) {
        p.additional(token, Side::Suffix);
    } else {
        list.push(kind);
    }
}

/// Modifiers of a backup or forward. Only the marker prefix and a
/// time-modification suffix belong here.
pub fn partition_skip(tree: &ItemTree, marker: Terminal, diagnostics: &mut Diagnostics) -> Option<TimeModification> {
    let mut p = Partition {
        root: tree.root,
        diagnostics,
    };
    let mut seen_marker = false;
    let mut time_modification = None;

    for token in tree.prefixes.iter().rev() {
        if token.terminal == marker {
            p.flag(&mut seen_marker, token, Side::Prefix);
        } else {
            p.unexpected(token, Side::Prefix);
        }
    }
    for token in &tree.suffixes {
        match token.terminal {
            Terminal::TimeModification { actual, normal } => p.set(
                &mut time_modification,
                TimeModification { actual, normal },
                token,
                Side::Suffix,
            ),
            _ => p.unexpected(token, Side::Suffix),
        }
    }

    time_modification
}

/// `beats:N` and `beat-type:N` of a `time` item.
pub fn partition_time(tree: &ItemTree, diagnostics: &mut Diagnostics) -> (Option<u32>, Option<u32>) {
    let mut p = Partition {
        root: tree.root,
        diagnostics,
    };
    let (mut beats, mut beat_type) = (None, None);

    for token in &tree.prefixes {
        p.unexpected(token, Side::Prefix);
    }
    for token in &tree.suffixes {
        match token.terminal {
            Terminal::Beats(n) => p.set(&mut beats, n, token, Side::Suffix),
            Terminal::BeatType(n) => p.set(&mut beat_type, n, token, Side::Suffix),
            _ => p.unexpected(token, Side::Suffix),
        }
    }

    (beats, beat_type)
}

/// The `staff:N` suffix of a clef item.
pub fn partition_clef(tree: &ItemTree, diagnostics: &mut Diagnostics) -> Option<u8> {
    let mut p = Partition {
        root: tree.root,
        diagnostics,
    };
    let mut staff = None;

    for token in &tree.prefixes {
        p.unexpected(token, Side::Prefix);
    }
    for token in &tree.suffixes {
        match token.terminal {
            Terminal::Staff(n) => p.set(&mut staff, n, token, Side::Suffix),
            _ => p.unexpected(token, Side::Suffix),
        }
    }

    staff
}

/// Key items take no modifiers at all.
pub fn partition_key(tree: &ItemTree, diagnostics: &mut Diagnostics) {
    Partition {
        root: tree.root,
        diagnostics,
    }
    .reject_all(tree);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delinearizer::grammar::build_trees;
    use crate::delinearizer::lexer::lex;
    use crate::error::DiagnosticKind;

    fn tree(text: &str) -> ItemTree {
        let (tokens, _) = lex(text);
        let mut diagnostics = Diagnostics::new();
        let mut trees = build_trees(&tokens, &mut diagnostics);
        assert_eq!(trees.len(), 1);
        trees.remove(0)
    }

    #[test]
    fn note_fields() {
        let tree = tree(
            "grace chord F5 voice:2 eighth 3in2 dot dot sharp stem:down staff:1 \
             beam:begin tied:stop tied:start slur:start fermata tremolo:single tremolo:3",
        );
        let mut diagnostics = Diagnostics::new();
        let n = partition_note(&tree, &mut diagnostics);
        assert!(diagnostics.is_empty(), "{diagnostics:?}");

        assert!(n.grace && n.chord && !n.grace_slash);
        assert_eq!(n.pitch.map(|(s, o, _)| (s, o)), Some((Step::F, 5)));
        assert_eq!(n.voice, Some(2));
        assert_eq!(n.time_modification, Some(TimeModification { actual: 3, normal: 2 }));
        assert_eq!(n.dots, 2);
        assert_eq!(n.accidental, Some(Accidental::Sharp));
        assert_eq!(n.stem, Some(Stem::Down));
        assert_eq!(n.beams.len(), 1);
        assert_eq!(n.ties, vec![StartStop::Stop, StartStop::Start]);
        assert_eq!(n.notations.slurs, vec![StartStop::Start]);
        assert!(n.notations.fermata);
        assert_eq!(n.tremolo_type, Some(TremoloType::Single));
        assert_eq!(n.tremolo_marks, Some(3));
    }

    #[test]
    fn duplicates_keep_closest_prefix_and_first_suffix() {
        let tree = tree("C4 D4 quarter flat sharp");
        let mut diagnostics = Diagnostics::new();
        let n = partition_note(&tree, &mut diagnostics);
        assert_eq!(n.pitch.map(|(s, _, _)| s), Some(Step::D));
        assert_eq!(n.accidental, Some(Accidental::Flat));

        let positions: Vec<Option<usize>> = diagnostics.iter().map(|d| d.position).collect();
        assert_eq!(positions, vec![Some(1), Some(5)]);
        assert!(diagnostics.iter().all(|d| d.message.starts_with("Additional")));
    }

    #[test]
    fn unexpected_modifiers_are_reported() {
        let backup = tree("backup voice:1 half dot");
        let mut diagnostics = Diagnostics::new();
        assert_eq!(partition_skip(&backup, Terminal::Backup, &mut diagnostics), None);
        assert_eq!(diagnostics.count(DiagnosticKind::Grammar), 2);

        let time = tree("time beats:6 beat-type:8 staff:1");
        let mut diagnostics = Diagnostics::new();
        assert_eq!(partition_time(&time, &mut diagnostics), (Some(6), Some(8)));
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn clef_staff() {
        let mut diagnostics = Diagnostics::new();
        assert_eq!(partition_clef(&tree("clef:F4 staff:2"), &mut diagnostics), Some(2));
        assert_eq!(partition_clef(&tree("clef:G2"), &mut diagnostics), None);
        assert!(diagnostics.is_empty());
    }
}
