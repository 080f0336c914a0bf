//! The closed LMX vocabulary.
//!
//! Every token the linearizer may emit and the delinearizer may accept is a
//! [`Terminal`]. A terminal renders to exactly one string and [`classify`]
//! parses exactly the strings that render back to themselves, so anything
//! outside this module's tables is rejected rather than guessed at.
//!
//! Each terminal plays one grammatical [`Role`]: ROOT tokens head a measure
//! item (a note type, `rest:measure`, `time`, a key or a clef), PREFIX tokens
//! precede their root and SUFFIX tokens follow it. `measure` is the only
//! structural delimiter.

use std::fmt;

use crate::model::{Accidental, NoteType, StartStop, Step, Stem, TremoloType};

/// Key signatures from seven flats to seven sharps.
pub const FIFTHS_RANGE: std::ops::RangeInclusive<i32> = -7..=7;
/// Time signature numerators.
pub const BEATS_RANGE: std::ops::RangeInclusive<u32> = 1..=32;
/// Time signature denominators.
pub const BEAT_TYPES: [u32; 7] = [1, 2, 4, 8, 16, 32, 64];
pub const VOICE_RANGE: std::ops::RangeInclusive<u8> = 1..=8;
pub const STAFF_RANGE: std::ops::RangeInclusive<u8> = 1..=3;
pub const OCTAVE_RANGE: std::ops::RangeInclusive<u8> = 0..=9;
/// Both sides of a `{actual}in{normal}` ratio.
pub const TIME_MODIFICATION_RANGE: std::ops::RangeInclusive<u32> = 1..=16;
pub const TREMOLO_MARKS_RANGE: std::ops::RangeInclusive<u8> = 1..=4;

/// Grammatical role of a terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Structural,
    Root,
    Prefix,
    Suffix,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClefSign {
    G,
    F,
    C,
}

impl ClefSign {
    pub fn from_name(name: &str) -> Option<ClefSign> {
        match name.to_ascii_uppercase().as_str() {
            "G" => Some(ClefSign::G),
            "F" => Some(ClefSign::F),
            "C" => Some(ClefSign::C),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ClefSign::G => "G",
            ClefSign::F => "F",
            ClefSign::C => "C",
        }
    }

    /// Staff lines this sign may sit on.
    pub fn lines(self) -> std::ops::RangeInclusive<u8> {
        match self {
            ClefSign::G => 1..=2,
            ClefSign::F => 3..=5,
            ClefSign::C => 1..=5,
        }
    }
}

/// Beam tokens. `continue` is implied and never written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeamToken {
    Begin,
    End,
    ForwardHook,
    BackwardHook,
}

impl BeamToken {
    pub const ALL: [BeamToken; 4] = [
        BeamToken::Begin,
        BeamToken::End,
        BeamToken::ForwardHook,
        BeamToken::BackwardHook,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BeamToken::Begin => "begin",
            BeamToken::End => "end",
            BeamToken::ForwardHook => "forward-hook",
            BeamToken::BackwardHook => "backward-hook",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminal {
    /// `measure`
    Measure,

    // ── attribute roots ──
    /// `key:fifths:N`
    Key(i32),
    /// `time`
    Time,
    /// `clef:G2`
    Clef { sign: ClefSign, line: u8 },

    // ── time signature suffixes ──
    /// `beats:N`
    Beats(u32),
    /// `beat-type:N`
    BeatType(u32),

    // ── note roots ──
    /// `quarter`, `eighth`, ...
    Type(NoteType),
    /// `rest:measure`
    MeasureRest,

    // ── note prefixes ──
    /// `print-object:no`
    PrintObjectNo,
    Grace,
    /// `grace:slash`
    GraceSlash,
    Chord,
    Rest,
    /// `C4`, `F#` is not a thing here: alteration is a suffix
    Pitch { step: Step, octave: u8 },
    /// `voice:N`
    Voice(u8),
    Backup,
    Forward,

    // ── note suffixes ──
    /// `3in2`
    TimeModification { actual: u32, normal: u32 },
    Dot,
    Accidental(Accidental),
    /// `stem:up`
    Stem(Stem),
    /// `staff:N`, also follows clefs
    Staff(u8),
    /// `beam:begin`
    Beam(BeamToken),
    /// `tied:start`
    Tied(StartStop),
    /// `tuplet:start`
    Tuplet(StartStop),

    // ── extended flavor ──
    /// `slur:start`
    Slur(StartStop),
    Fermata,
    Arpeggiate,
    Staccato,
    Accent,
    StrongAccent,
    Tenuto,
    /// `tremolo:single`
    TremoloType(TremoloType),
    /// `tremolo:3`
    TremoloMarks(u8),
    TrillMark,
}

impl Terminal {
    pub fn role(&self) -> Role {
        match self {
            Terminal::Measure => Role::Structural,
            Terminal::Key(_)
            | Terminal::Time
            | Terminal::Clef { .. }
            | Terminal::Type(_)
            | Terminal::MeasureRest => Role::Root,
            Terminal::PrintObjectNo
            | Terminal::Grace
            | Terminal::GraceSlash
            | Terminal::Chord
            | Terminal::Rest
            | Terminal::Pitch { .. }
            | Terminal::Voice(_)
            | Terminal::Backup
            | Terminal::Forward => Role::Prefix,
            _ => Role::Suffix,
        }
    }

    /// Roots that build an `<attributes>` element.
    pub fn is_attribute_root(&self) -> bool {
        matches!(self, Terminal::Key(_) | Terminal::Time | Terminal::Clef { .. })
    }

    /// Roots that build a note, backup or forward.
    pub fn is_note_root(&self) -> bool {
        matches!(self, Terminal::Type(_) | Terminal::MeasureRest)
    }

    /// Tokens only present in the extended flavor.
    pub fn is_extended(&self) -> bool {
        matches!(
            self,
            Terminal::Slur(_)
                | Terminal::Fermata
                | Terminal::Arpeggiate
                | Terminal::Staccato
                | Terminal::Accent
                | Terminal::StrongAccent
                | Terminal::Tenuto
                | Terminal::TremoloType(_)
                | Terminal::TremoloMarks(_)
                | Terminal::TrillMark
        )
    }

    /// Whether the payload lies inside the vocabulary tables. Terminals
    /// built from score data must pass this before being emitted.
    pub fn is_valid(&self) -> bool {
        match *self {
            Terminal::Key(fifths) => FIFTHS_RANGE.contains(&fifths),
            Terminal::Clef { sign, line } => sign.lines().contains(&line),
            Terminal::Beats(beats) => BEATS_RANGE.contains(&beats),
            Terminal::BeatType(beat_type) => BEAT_TYPES.contains(&beat_type),
            Terminal::Pitch { octave, .. } => OCTAVE_RANGE.contains(&octave),
            Terminal::Voice(voice) => VOICE_RANGE.contains(&voice),
            Terminal::Staff(staff) => STAFF_RANGE.contains(&staff),
            Terminal::TimeModification { actual, normal } => {
                TIME_MODIFICATION_RANGE.contains(&actual)
                    && TIME_MODIFICATION_RANGE.contains(&normal)
            }
            Terminal::TremoloMarks(marks) => TREMOLO_MARKS_RANGE.contains(&marks),
            _ => true,
        }
    }
}

impl fmt::Display for Terminal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Terminal::Measure => f.write_str("measure"),
            Terminal::Key(fifths) => write!(f, "key:fifths:{fifths}"),
            Terminal::Time => f.write_str("time"),
            Terminal::Clef { sign, line } => write!(f, "clef:{}{line}", sign.name()),
            Terminal::Beats(beats) => write!(f, "beats:{beats}"),
            Terminal::BeatType(beat_type) => write!(f, "beat-type:{beat_type}"),
            Terminal::Type(note_type) => f.write_str(note_type.name()),
            Terminal::MeasureRest => f.write_str("rest:measure"),
            Terminal::PrintObjectNo => f.write_str("print-object:no"),
            Terminal::Grace => f.write_str("grace"),
            Terminal::GraceSlash => f.write_str("grace:slash"),
            Terminal::Chord => f.write_str("chord"),
            Terminal::Rest => f.write_str("rest"),
            Terminal::Pitch { step, octave } => write!(f, "{step}{octave}"),
            Terminal::Voice(voice) => write!(f, "voice:{voice}"),
            Terminal::Backup => f.write_str("backup"),
            Terminal::Forward => f.write_str("forward"),
            Terminal::TimeModification { actual, normal } => write!(f, "{actual}in{normal}"),
            Terminal::Dot => f.write_str("dot"),
            Terminal::Accidental(accidental) => f.write_str(accidental.name()),
            Terminal::Stem(stem) => write!(f, "stem:{}", stem.name()),
            Terminal::Staff(staff) => write!(f, "staff:{staff}"),
            Terminal::Beam(beam) => write!(f, "beam:{}", beam.name()),
            Terminal::Tied(kind) => write!(f, "tied:{}", kind.name()),
            Terminal::Tuplet(kind) => write!(f, "tuplet:{}", kind.name()),
            Terminal::Slur(kind) => write!(f, "slur:{}", kind.name()),
            Terminal::Fermata => f.write_str("fermata"),
            Terminal::Arpeggiate => f.write_str("arpeggiate"),
            Terminal::Staccato => f.write_str("staccato"),
            Terminal::Accent => f.write_str("accent"),
            Terminal::StrongAccent => f.write_str("strong-accent"),
            Terminal::Tenuto => f.write_str("tenuto"),
            Terminal::TremoloType(kind) => write!(f, "tremolo:{}", kind.name()),
            Terminal::TremoloMarks(marks) => write!(f, "tremolo:{marks}"),
            Terminal::TrillMark => f.write_str("trill-mark"),
        }
    }
}

/// Decode a terminal string. Returns `None` for anything outside the
/// closed vocabulary, including non-canonical spellings like `beats:03`.
pub fn classify(text: &str) -> Option<Terminal> {
    let terminal = parse_terminal(text)?;
    if terminal.is_valid() && terminal.to_string() == text {
        Some(terminal)
    } else {
        None
    }
}

fn parse_terminal(text: &str) -> Option<Terminal> {
    let fixed = match text {
        "measure" => Some(Terminal::Measure),
        "time" => Some(Terminal::Time),
        "rest:measure" => Some(Terminal::MeasureRest),
        "print-object:no" => Some(Terminal::PrintObjectNo),
        "grace" => Some(Terminal::Grace),
        "grace:slash" => Some(Terminal::GraceSlash),
        "chord" => Some(Terminal::Chord),
        "rest" => Some(Terminal::Rest),
        "backup" => Some(Terminal::Backup),
        "forward" => Some(Terminal::Forward),
        "dot" => Some(Terminal::Dot),
        "fermata" => Some(Terminal::Fermata),
        "arpeggiate" => Some(Terminal::Arpeggiate),
        "staccato" => Some(Terminal::Staccato),
        "accent" => Some(Terminal::Accent),
        "strong-accent" => Some(Terminal::StrongAccent),
        "tenuto" => Some(Terminal::Tenuto),
        "trill-mark" => Some(Terminal::TrillMark),
        _ => None,
    };
    if fixed.is_some() {
        return fixed;
    }

    if let Some(note_type) = NoteType::from_name(text) {
        return Some(Terminal::Type(note_type));
    }
    if let Some(accidental) = Accidental::from_name(text) {
        return Some(Terminal::Accidental(accidental));
    }

    if let Some(rest) = text.strip_prefix("key:fifths:") {
        return rest.parse().ok().map(Terminal::Key);
    }
    if let Some(rest) = text.strip_prefix("beats:") {
        return rest.parse().ok().map(Terminal::Beats);
    }
    if let Some(rest) = text.strip_prefix("beat-type:") {
        return rest.parse().ok().map(Terminal::BeatType);
    }
    if let Some(rest) = text.strip_prefix("clef:") {
        let mut chars = rest.chars();
        let sign = ClefSign::from_name(&chars.next()?.to_string())?;
        let line = chars.as_str().parse().ok()?;
        return Some(Terminal::Clef { sign, line });
    }
    if let Some(rest) = text.strip_prefix("voice:") {
        return rest.parse().ok().map(Terminal::Voice);
    }
    if let Some(rest) = text.strip_prefix("staff:") {
        return rest.parse().ok().map(Terminal::Staff);
    }
    if let Some(rest) = text.strip_prefix("stem:") {
        return Stem::from_name(rest).map(Terminal::Stem);
    }
    if let Some(rest) = text.strip_prefix("beam:") {
        return BeamToken::ALL
            .iter()
            .copied()
            .find(|b| b.name() == rest)
            .map(Terminal::Beam);
    }
    if let Some(rest) = text.strip_prefix("tied:") {
        return StartStop::from_name(rest).map(Terminal::Tied);
    }
    if let Some(rest) = text.strip_prefix("tuplet:") {
        return StartStop::from_name(rest).map(Terminal::Tuplet);
    }
    if let Some(rest) = text.strip_prefix("slur:") {
        return StartStop::from_name(rest).map(Terminal::Slur);
    }
    if let Some(rest) = text.strip_prefix("tremolo:") {
        if let Some(kind) = TremoloType::from_name(rest) {
            return Some(Terminal::TremoloType(kind));
        }
        return rest.parse().ok().map(Terminal::TremoloMarks);
    }
    if let Some((actual, normal)) = text.split_once("in") {
        return Some(Terminal::TimeModification {
            actual: actual.parse().ok()?,
            normal: normal.parse().ok()?,
        });
    }

    let mut chars = text.chars();
    let step = Step::from_char(chars.next()?)?;
    let octave = chars.as_str().parse().ok()?;
    Some(Terminal::Pitch { step, octave })
}

/// Every terminal of the closed vocabulary.
pub fn all_terminals() -> Vec<Terminal> {
    use Terminal as T;

    let mut all = vec![T::Measure, T::Time, T::MeasureRest];
    all.extend(FIFTHS_RANGE.map(T::Key));
    for sign in [ClefSign::G, ClefSign::F, ClefSign::C] {
        all.extend(sign.lines().map(|line| T::Clef { sign, line }));
    }
    all.extend(BEATS_RANGE.map(T::Beats));
    all.extend(BEAT_TYPES.iter().copied().map(T::BeatType));
    all.extend(NoteType::ALL.iter().copied().map(T::Type));
    all.extend([
        T::PrintObjectNo,
        T::Grace,
        T::GraceSlash,
        T::Chord,
        T::Rest,
        T::Backup,
        T::Forward,
    ]);
    for octave in OCTAVE_RANGE {
        all.extend(Step::ALL.iter().map(|&step| T::Pitch { step, octave }));
    }
    all.extend(VOICE_RANGE.map(T::Voice));
    for actual in TIME_MODIFICATION_RANGE {
        all.extend(
            TIME_MODIFICATION_RANGE.map(|normal| T::TimeModification { actual, normal }),
        );
    }
    all.push(T::Dot);
    all.extend(Accidental::ALL.iter().copied().map(T::Accidental));
    all.extend(Stem::ALL.iter().copied().map(T::Stem));
    all.extend(STAFF_RANGE.map(T::Staff));
    all.extend(BeamToken::ALL.iter().copied().map(T::Beam));
    for kind in [StartStop::Start, StartStop::Stop] {
        all.extend([T::Tied(kind), T::Tuplet(kind), T::Slur(kind)]);
    }
    all.extend([
        T::Fermata,
        T::Arpeggiate,
        T::Staccato,
        T::Accent,
        T::StrongAccent,
        T::Tenuto,
        T::TrillMark,
    ]);
    all.extend(TremoloType::ALL.iter().copied().map(T::TremoloType));
    all.extend(TREMOLO_MARKS_RANGE.map(T::TremoloMarks));
    all
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_decodes_payloads() {
        assert_eq!(classify("beats:3"), Some(Terminal::Beats(3)));
        assert_eq!(classify("key:fifths:-3"), Some(Terminal::Key(-3)));
        assert_eq!(
            classify("clef:F4"),
            Some(Terminal::Clef { sign: ClefSign::F, line: 4 })
        );
        assert_eq!(
            classify("C4"),
            Some(Terminal::Pitch { step: Step::C, octave: 4 })
        );
        assert_eq!(
            classify("3in2"),
            Some(Terminal::TimeModification { actual: 3, normal: 2 })
        );
        assert_eq!(classify("tremolo:3"), Some(Terminal::TremoloMarks(3)));
        assert_eq!(
            classify("tremolo:single"),
            Some(Terminal::TremoloType(TremoloType::Single))
        );
        assert_eq!(classify("16th"), Some(Terminal::Type(NoteType::N16th)));
        assert_eq!(classify("natural"), Some(Terminal::Accidental(Accidental::Natural)));
    }

    #[test]
    fn classify_rejects_out_of_vocabulary() {
        for text in [
            "xyz", "", "beats:03", "beats:0", "beats:40", "key:fifths:8", "clef:G5",
            "clef:g2", "H4", "C10", "voice:9", "staff:0", "beam:continue", "17in16",
            "tremolo:5", "stem:double", "tied:continue", "Measure",
        ] {
            assert_eq!(classify(text), None, "{text:?} should be rejected");
        }
    }

    #[test]
    fn every_terminal_round_trips_through_its_string() {
        let all = all_terminals();
        for terminal in &all {
            let text = terminal.to_string();
            assert_eq!(classify(&text), Some(*terminal), "{text}");
            assert!(!text.contains(char::is_whitespace));
        }
        let mut texts: Vec<String> = all.iter().map(|t| t.to_string()).collect();
        texts.sort();
        texts.dedup();
        assert_eq!(texts.len(), all.len(), "terminal strings must be unique");
    }

    #[test]
    fn roles_partition_the_vocabulary() {
        assert_eq!(Terminal::Measure.role(), Role::Structural);
        assert_eq!(Terminal::Time.role(), Role::Root);
        assert_eq!(Terminal::MeasureRest.role(), Role::Root);
        assert_eq!(Terminal::Voice(1).role(), Role::Prefix);
        assert_eq!(Terminal::Backup.role(), Role::Prefix);
        assert_eq!(Terminal::Beats(4).role(), Role::Suffix);
        assert_eq!(Terminal::Staff(2).role(), Role::Suffix);
        assert_eq!(Terminal::TrillMark.role(), Role::Suffix);
        assert!(Terminal::Fermata.is_extended());
        assert!(!Terminal::Tied(StartStop::Start).is_extended());
    }
}
