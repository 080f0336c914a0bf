//! Data model for the part trees the codec reads and writes.
//!
//! This is the subset of MusicXML that survives linearization: measure
//! content is an ordered list of [`MeasureElement`]s, exactly as the
//! elements appear inside `<measure>`. Layout, directions, harmony,
//! barlines and lyrics are not represented.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Exact duration. Integer ticks when the part carries `<divisions>`,
/// quarter-note fractions otherwise.
pub type Fraction = num_rational::Rational64;

/// A complete score-partwise document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Score {
    /// Title of the piece
    pub title: Option<String>,
    /// Composer name
    pub composer: Option<String>,
    /// MusicXML version (e.g., "3.1", "4.0")
    pub version: Option<String>,
    /// Musical parts (instruments)
    pub parts: Vec<Part>,
}

/// A musical part (for this codec, a piano grand staff).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Part {
    /// Part identifier (e.g., "P1")
    pub id: String,
    /// Part name from the part-list
    pub name: String,
    /// Ordered list of measures
    pub measures: Vec<Measure>,
}

/// A single measure (bar) of music.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measure {
    /// Measure number
    pub number: i32,
    /// Whether this is an implicit measure (e.g., pickup/anacrusis)
    pub implicit: bool,
    /// Whether this measure starts a new system (line break)
    pub new_system: bool,
    /// Whether this measure starts a new page
    pub new_page: bool,
    /// Content in document order
    pub elements: Vec<MeasureElement>,
}

/// One child of `<measure>` the codec understands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MeasureElement {
    Attributes(Attributes),
    Note(Note),
    Backup(Backup),
    Forward(Forward),
}

/// Musical attributes. Fields are kept in MusicXML's canonical order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attributes {
    /// Divisions per quarter note (determines duration resolution)
    pub divisions: Option<i64>,
    /// Key signature
    pub key: Option<Key>,
    /// Time signature
    pub time: Option<TimeSignature>,
    /// Number of staves in this part (2 for a grand staff)
    pub staves: Option<u8>,
    /// Clefs, ascending by staff number
    pub clefs: Vec<Clef>,
}

/// Key signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Key {
    /// Number of sharps (positive) or flats (negative)
    pub fifths: i32,
}

/// Time signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSignature {
    /// Numerator (e.g., 3 in 3/4)
    pub beats: u32,
    /// Denominator (e.g., 4 in 3/4)
    pub beat_type: u32,
}

/// Clef definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clef {
    /// Staff number from the `number` attribute, if given
    pub number: Option<u8>,
    /// Clef sign: "G" (treble), "F" (bass), "C" (alto/tenor)
    pub sign: String,
    /// Staff line the clef sits on
    pub line: i32,
}

/// Backs the onset cursor up, usually to start another voice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Backup {
    pub duration: Fraction,
}

/// Moves the onset cursor forward without sounding anything.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forward {
    pub duration: Fraction,
}

/// A single note or rest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    /// `print-object="no"` makes this false
    pub print_object: bool,
    pub grace: Option<Grace>,
    /// Whether this note is part of a chord with the previous note
    pub chord: bool,
    pub content: NoteContent,
    /// Duration; grace notes have none
    pub duration: Option<Fraction>,
    /// Tie start/stop events
    pub ties: Vec<StartStop>,
    pub voice: Option<u8>,
    pub note_type: Option<NoteType>,
    pub dots: u8,
    pub accidental: Option<Accidental>,
    pub time_modification: Option<TimeModification>,
    pub stem: Option<Stem>,
    /// Staff number (1-based; for multi-staff parts like piano)
    pub staff: Option<u8>,
    /// Beams ordered by number
    pub beams: Vec<Beam>,
    pub notations: Notations,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoteContent {
    Pitch(Pitch),
    Rest {
        /// `<rest measure="yes"/>`
        measure: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grace {
    pub slash: bool,
}

/// Pitch of a note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pitch {
    pub step: Step,
    /// Octave number (middle C = C4)
    pub octave: i32,
    /// Chromatic alteration in semitones; 0 means no `<alter>`
    pub alter: i32,
}

/// Diatonic step, ordered C to B.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Step {
    C,
    D,
    E,
    F,
    G,
    A,
    B,
}

impl Step {
    pub const ALL: [Step; 7] = [Step::C, Step::D, Step::E, Step::F, Step::G, Step::A, Step::B];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_char(c: char) -> Option<Step> {
        match c {
            'C' => Some(Step::C),
            'D' => Some(Step::D),
            'E' => Some(Step::E),
            'F' => Some(Step::F),
            'G' => Some(Step::G),
            'A' => Some(Step::A),
            'B' => Some(Step::B),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Step::C => 'C',
            Step::D => 'D',
            Step::E => 'E',
            Step::F => 'F',
            Step::G => 'G',
            Step::A => 'A',
            Step::B => 'B',
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Graphic note type, ordered from shortest to longest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum NoteType {
    N1024th,
    N512th,
    N256th,
    N128th,
    N64th,
    N32nd,
    N16th,
    Eighth,
    Quarter,
    Half,
    Whole,
    Breve,
    Long,
    Maxima,
}

impl NoteType {
    /// Shortest to longest.
    pub const ALL: [NoteType; 14] = [
        NoteType::N1024th,
        NoteType::N512th,
        NoteType::N256th,
        NoteType::N128th,
        NoteType::N64th,
        NoteType::N32nd,
        NoteType::N16th,
        NoteType::Eighth,
        NoteType::Quarter,
        NoteType::Half,
        NoteType::Whole,
        NoteType::Breve,
        NoteType::Long,
        NoteType::Maxima,
    ];

    pub fn name(self) -> &'static str {
        match self {
            NoteType::N1024th => "1024th",
            NoteType::N512th => "512th",
            NoteType::N256th => "256th",
            NoteType::N128th => "128th",
            NoteType::N64th => "64th",
            NoteType::N32nd => "32nd",
            NoteType::N16th => "16th",
            NoteType::Eighth => "eighth",
            NoteType::Quarter => "quarter",
            NoteType::Half => "half",
            NoteType::Whole => "whole",
            NoteType::Breve => "breve",
            NoteType::Long => "long",
            NoteType::Maxima => "maxima",
        }
    }

    pub fn from_name(name: &str) -> Option<NoteType> {
        NoteType::ALL.iter().copied().find(|t| t.name() == name)
    }

    /// Length in quarter notes: 1/256 for a 1024th up to 32 for a maxima.
    pub fn quarter_multiple(self) -> Fraction {
        let exponent = self as i32 - NoteType::Quarter as i32;
        if exponent >= 0 {
            Fraction::from_integer(1 << exponent)
        } else {
            Fraction::new(1, 1 << -exponent)
        }
    }

    /// Whether the note type carries a flag (and so can be beamed).
    pub fn is_beamable(self) -> bool {
        self <= NoteType::Eighth
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Accidental {
    Sharp,
    Flat,
    Natural,
    DoubleSharp,
    FlatFlat,
    NaturalSharp,
    NaturalFlat,
}

impl Accidental {
    pub const ALL: [Accidental; 7] = [
        Accidental::Sharp,
        Accidental::Flat,
        Accidental::Natural,
        Accidental::DoubleSharp,
        Accidental::FlatFlat,
        Accidental::NaturalSharp,
        Accidental::NaturalFlat,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Accidental::Sharp => "sharp",
            Accidental::Flat => "flat",
            Accidental::Natural => "natural",
            Accidental::DoubleSharp => "double-sharp",
            Accidental::FlatFlat => "flat-flat",
            Accidental::NaturalSharp => "natural-sharp",
            Accidental::NaturalFlat => "natural-flat",
        }
    }

    pub fn from_name(name: &str) -> Option<Accidental> {
        Accidental::ALL.iter().copied().find(|a| a.name() == name)
    }

    /// Semitone alteration this accidental imposes.
    pub fn alteration(self) -> i32 {
        match self {
            Accidental::Sharp | Accidental::NaturalSharp => 1,
            Accidental::Flat | Accidental::NaturalFlat => -1,
            Accidental::Natural => 0,
            Accidental::DoubleSharp => 2,
            Accidental::FlatFlat => -2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stem {
    Up,
    Down,
    /// MusicXML `<stem>none</stem>`
    NoStem,
}

impl Stem {
    pub const ALL: [Stem; 3] = [Stem::Up, Stem::Down, Stem::NoStem];

    pub fn name(self) -> &'static str {
        match self {
            Stem::Up => "up",
            Stem::Down => "down",
            Stem::NoStem => "none",
        }
    }

    pub fn from_name(name: &str) -> Option<Stem> {
        Stem::ALL.iter().copied().find(|s| s.name() == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StartStop {
    Start,
    Stop,
}

impl StartStop {
    pub fn name(self) -> &'static str {
        match self {
            StartStop::Start => "start",
            StartStop::Stop => "stop",
        }
    }

    pub fn from_name(name: &str) -> Option<StartStop> {
        match name {
            "start" => Some(StartStop::Start),
            "stop" => Some(StartStop::Stop),
            _ => None,
        }
    }
}

/// Beam grouping information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Beam {
    /// Beam level (1 = eighth-note beam, 2 = sixteenth-note beam, etc.)
    pub number: u8,
    pub value: BeamValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BeamValue {
    Begin,
    Continue,
    End,
    ForwardHook,
    BackwardHook,
}

impl BeamValue {
    /// Text content of the `<beam>` element.
    pub fn xml_name(self) -> &'static str {
        match self {
            BeamValue::Begin => "begin",
            BeamValue::Continue => "continue",
            BeamValue::End => "end",
            BeamValue::ForwardHook => "forward hook",
            BeamValue::BackwardHook => "backward hook",
        }
    }

    pub fn from_xml_name(name: &str) -> Option<BeamValue> {
        match name {
            "begin" => Some(BeamValue::Begin),
            "continue" => Some(BeamValue::Continue),
            "end" => Some(BeamValue::End),
            "forward hook" => Some(BeamValue::ForwardHook),
            "backward hook" => Some(BeamValue::BackwardHook),
            _ => None,
        }
    }
}

/// Tuplet rhythm ratio: `actual` notes in the time of `normal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeModification {
    pub actual: u32,
    pub normal: u32,
}

/// The `<notations>` content the codec keeps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notations {
    pub tuplets: Vec<StartStop>,
    pub slurs: Vec<StartStop>,
    pub fermata: bool,
    pub arpeggiate: bool,
    pub staccato: bool,
    pub accent: bool,
    pub strong_accent: bool,
    pub tenuto: bool,
    pub tremolo: Option<Tremolo>,
    pub trill_mark: bool,
}

impl Notations {
    pub fn is_empty(&self) -> bool {
        *self == Notations::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tremolo {
    pub kind: TremoloType,
    /// Number of tremolo marks (1 to 4)
    pub marks: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TremoloType {
    Single,
    Start,
    Stop,
    Unmeasured,
}

impl TremoloType {
    pub const ALL: [TremoloType; 4] = [
        TremoloType::Single,
        TremoloType::Start,
        TremoloType::Stop,
        TremoloType::Unmeasured,
    ];

    pub fn name(self) -> &'static str {
        match self {
            TremoloType::Single => "single",
            TremoloType::Start => "start",
            TremoloType::Stop => "stop",
            TremoloType::Unmeasured => "unmeasured",
        }
    }

    pub fn from_name(name: &str) -> Option<TremoloType> {
        TremoloType::ALL.iter().copied().find(|t| t.name() == name)
    }
}

impl Score {
    /// Create a new empty score.
    pub fn new() -> Self {
        Self {
            title: None,
            composer: None,
            version: None,
            parts: Vec::new(),
        }
    }

    /// Get the total number of measures across all parts.
    pub fn measure_count(&self) -> usize {
        self.parts.first().map_or(0, |p| p.measures.len())
    }
}

impl Default for Score {
    fn default() -> Self {
        Self::new()
    }
}

impl Part {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            measures: Vec::new(),
        }
    }

    /// Compare musical content only, ignoring measure numbers and layout
    /// breaks.
    pub fn same_content(&self, other: &Part) -> bool {
        self.measures.len() == other.measures.len()
            && self
                .measures
                .iter()
                .zip(&other.measures)
                .all(|(a, b)| a.elements == b.elements)
    }

    /// Iterate over every duration-carrying slot in the part.
    pub fn durations_mut(&mut self) -> impl Iterator<Item = &mut Fraction> {
        self.measures
            .iter_mut()
            .flat_map(|m| m.elements.iter_mut())
            .filter_map(|e| match e {
                MeasureElement::Note(note) => note.duration.as_mut(),
                MeasureElement::Backup(backup) => Some(&mut backup.duration),
                MeasureElement::Forward(forward) => Some(&mut forward.duration),
                MeasureElement::Attributes(_) => None,
            })
    }
}

impl Measure {
    pub fn new(number: i32) -> Self {
        Self {
            number,
            implicit: false,
            new_system: false,
            new_page: false,
            elements: Vec::new(),
        }
    }

    /// The `<attributes>` element heading the measure, if any.
    pub fn head_attributes(&self) -> Option<&Attributes> {
        match self.elements.first() {
            Some(MeasureElement::Attributes(attrs)) => Some(attrs),
            _ => None,
        }
    }

    /// The heading `<attributes>`, inserted empty when missing.
    pub fn head_attributes_mut(&mut self) -> &mut Attributes {
        if !matches!(self.elements.first(), Some(MeasureElement::Attributes(_))) {
            self.elements
                .insert(0, MeasureElement::Attributes(Attributes::default()));
        }
        match self.elements.first_mut() {
            Some(MeasureElement::Attributes(attrs)) => attrs,
            _ => unreachable!("head attributes were just inserted"),
        }
    }

    pub fn notes(&self) -> impl Iterator<Item = &Note> {
        self.elements.iter().filter_map(|e| match e {
            MeasureElement::Note(note) => Some(note),
            _ => None,
        })
    }
}

impl Attributes {
    pub fn is_empty(&self) -> bool {
        *self == Attributes::default()
    }
}

impl Clef {
    /// Staff the clef applies to; an unnumbered clef belongs to staff 1.
    pub fn staff(&self) -> u8 {
        self.number.unwrap_or(1)
    }
}

impl Note {
    /// A plain note with no modifiers.
    pub fn pitched(step: Step, octave: i32, note_type: NoteType, duration: Fraction) -> Self {
        Self {
            content: NoteContent::Pitch(Pitch {
                step,
                octave,
                alter: 0,
            }),
            ..Note::rest(note_type, duration)
        }
    }

    /// A plain rest with no modifiers.
    pub fn rest(note_type: NoteType, duration: Fraction) -> Self {
        Self {
            print_object: true,
            grace: None,
            chord: false,
            content: NoteContent::Rest { measure: false },
            duration: Some(duration),
            ties: Vec::new(),
            voice: None,
            note_type: Some(note_type),
            dots: 0,
            accidental: None,
            time_modification: None,
            stem: None,
            staff: None,
            beams: Vec::new(),
            notations: Notations::default(),
        }
    }

    pub fn pitch(&self) -> Option<&Pitch> {
        match &self.content {
            NoteContent::Pitch(pitch) => Some(pitch),
            NoteContent::Rest { .. } => None,
        }
    }

    pub fn is_rest(&self) -> bool {
        matches!(self.content, NoteContent::Rest { .. })
    }

    pub fn is_measure_rest(&self) -> bool {
        matches!(self.content, NoteContent::Rest { measure: true })
    }
}

impl Pitch {
    /// Position in the fixed low-to-high pitch order (C0 = 0, D0 = 1, ...).
    /// Alteration does not participate.
    pub fn order(&self) -> i32 {
        self.octave * 7 + self.step.index() as i32
    }
}
