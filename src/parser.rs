//! MusicXML parser: converts MusicXML XML into the part tree model.
//!
//! Only the element classes the codec can represent are kept. Layout,
//! performance directions, harmony and barlines are skipped silently;
//! anything the codec does not know about is skipped and reported.

use roxmltree::{Document, Node};

use crate::error::{CodecError, Diagnostics};
use crate::model::*;

/// `<measure>` children dropped without a diagnostic. `<print>` is read
/// for its break flags only.
const IGNORED_MEASURE_ELEMENTS: &[&str] = &[
    "direction",
    "harmony",
    "figured-bass",
    "sound",
    "listening",
    "grouping",
    "link",
    "bookmark",
    "barline",
];

/// `<attributes>` children dropped without a diagnostic.
const IGNORED_ATTRIBUTES_ELEMENTS: &[&str] = &[
    "footnote",
    "level",
    "part-symbol",
    "instruments",
    "staff-details",
    "directive",
    "measure-style",
    "transpose",
    "for-part",
];

/// Parse a MusicXML XML string into a Score.
pub fn parse_musicxml(xml: &str) -> Result<(Score, Diagnostics), CodecError> {
    let doc = parse_document(xml)?;
    let root = doc.root_element();

    // Verify this is a score-partwise document
    if root.tag_name().name() != "score-partwise" {
        return Err(CodecError::UnsupportedRoot(
            root.tag_name().name().to_string(),
        ));
    }

    let mut score = Score::new();
    let mut diagnostics = Diagnostics::new();
    score.version = root.attribute("version").map(String::from);

    // Parse top-level elements
    for child in root.children().filter(|n| n.is_element()) {
        match child.tag_name().name() {
            "work" => parse_work(&child, &mut score),
            "identification" => parse_identification(&child, &mut score),
            "part-list" => parse_part_list(&child, &mut score),
            "part" => parse_part(&child, &mut score, &mut diagnostics),
            _ => {}
        }
    }

    Ok((score, diagnostics))
}

/// Parse a bare `<part>` fragment, as produced per system by the splitter.
pub fn parse_part_fragment(xml: &str) -> Result<(Part, Diagnostics), CodecError> {
    let doc = parse_document(xml)?;
    let root = doc.root_element();
    if root.tag_name().name() != "part" {
        return Err(CodecError::UnsupportedRoot(
            root.tag_name().name().to_string(),
        ));
    }

    let mut diagnostics = Diagnostics::new();
    let mut part = Part::new(root.attribute("id").unwrap_or(""));
    parse_measures(&root, &mut part, &mut diagnostics);
    Ok((part, diagnostics))
}

fn parse_document(xml: &str) -> Result<Document<'_>, CodecError> {
    // MusicXML files include a DOCTYPE declaration, so we must allow DTDs
    let options = roxmltree::ParsingOptions {
        allow_dtd: true,
        ..Default::default()
    };
    Ok(Document::parse_with_options(xml, options)?)
}

// ─── Work ────────────────────────────────────────────────────────────

fn parse_work(node: &Node, score: &mut Score) {
    for child in node.children().filter(|n| n.is_element()) {
        if child.tag_name().name() == "work-title" {
            score.title = child.text().map(|t| t.trim().to_string());
        }
    }
}

// ─── Identification ──────────────────────────────────────────────────

fn parse_identification(node: &Node, score: &mut Score) {
    for child in node.children().filter(|n| n.is_element()) {
        if child.tag_name().name() == "creator" && child.attribute("type") == Some("composer") {
            score.composer = child.text().map(|t| t.trim().to_string());
        }
    }
}

// ─── Part List ───────────────────────────────────────────────────────

fn parse_part_list(node: &Node, score: &mut Score) {
    for child in node.children().filter(|n| n.is_element()) {
        if child.tag_name().name() == "score-part" {
            let mut part = Part::new(child.attribute("id").unwrap_or(""));
            for sp_child in child.children().filter(|n| n.is_element()) {
                if sp_child.tag_name().name() == "part-name" {
                    part.name = sp_child.text().unwrap_or("").trim().to_string();
                }
            }
            score.parts.push(part);
        }
    }
}

// ─── Part (measures) ─────────────────────────────────────────────────

fn parse_part(node: &Node, score: &mut Score, diagnostics: &mut Diagnostics) {
    let part_id = node.attribute("id").unwrap_or("").to_string();

    // Find the matching part from the part-list
    let index = match score.parts.iter().position(|p| p.id == part_id) {
        Some(i) => i,
        None => {
            diagnostics.grammar(None, format!("part '{part_id}' is missing from <part-list>"));
            score.parts.push(Part::new(part_id));
            score.parts.len() - 1
        }
    };

    parse_measures(node, &mut score.parts[index], diagnostics);
}

fn parse_measures(node: &Node, part: &mut Part, diagnostics: &mut Diagnostics) {
    for child in node.children().filter(|n| n.is_element()) {
        if child.tag_name().name() == "measure" {
            part.measures.push(parse_measure(&child, diagnostics));
        } else {
            diagnostics.grammar(
                None,
                format!("unexpected <part> element <{}>", child.tag_name().name()),
            );
        }
    }
}

// ─── Measure ─────────────────────────────────────────────────────────

fn parse_measure(node: &Node, diagnostics: &mut Diagnostics) -> Measure {
    let number = node
        .attribute("number")
        .and_then(|n| n.parse::<i32>().ok())
        .unwrap_or(0);

    let mut measure = Measure::new(number);
    measure.implicit = node.attribute("implicit") == Some("yes");

    for child in node.children().filter(|n| n.is_element()) {
        let tag = child.tag_name().name();
        match tag {
            "attributes" => {
                let attrs = parse_attributes(&child, number, diagnostics);
                measure.elements.push(MeasureElement::Attributes(attrs));
            }
            "note" => {
                let note = parse_note(&child, number, diagnostics);
                measure.elements.push(MeasureElement::Note(note));
            }
            "backup" => {
                let duration = parse_duration(&child).unwrap_or_else(|| {
                    diagnostics.grammar(None, format!("measure {number}: <backup> lacks <duration>"));
                    Fraction::from_integer(0)
                });
                measure.elements.push(MeasureElement::Backup(Backup { duration }));
            }
            "forward" => {
                let duration = parse_duration(&child).unwrap_or_else(|| {
                    diagnostics.grammar(None, format!("measure {number}: <forward> lacks <duration>"));
                    Fraction::from_integer(0)
                });
                measure.elements.push(MeasureElement::Forward(Forward { duration }));
            }
            "print" => {
                if child.attribute("new-system") == Some("yes") {
                    measure.new_system = true;
                }
                if child.attribute("new-page") == Some("yes") {
                    measure.new_page = true;
                }
            }
            _ if IGNORED_MEASURE_ELEMENTS.contains(&tag) => {}
            _ => diagnostics.grammar(
                None,
                format!("measure {number}: unexpected <measure> element <{tag}>"),
            ),
        }
    }

    measure
}

// ─── Attributes ──────────────────────────────────────────────────────

fn parse_attributes(node: &Node, measure: i32, diagnostics: &mut Diagnostics) -> Attributes {
    let mut attrs = Attributes::default();

    for child in node.children().filter(|n| n.is_element()) {
        let tag = child.tag_name().name();
        match tag {
            "divisions" => attrs.divisions = parse_number(&child),
            "key" => attrs.key = Some(parse_key(&child)),
            "time" => match parse_time(&child) {
                Some(time) => attrs.time = Some(time),
                None => diagnostics.grammar(
                    None,
                    format!("measure {measure}: unsupported <time> signature"),
                ),
            },
            "staves" => attrs.staves = parse_number(&child),
            "clef" => attrs.clefs.push(parse_clef(&child)),
            _ if IGNORED_ATTRIBUTES_ELEMENTS.contains(&tag) => {}
            _ => diagnostics.grammar(
                None,
                format!("measure {measure}: unexpected <attributes> element <{tag}>"),
            ),
        }
    }

    attrs.clefs.sort_by_key(|c| c.staff());
    attrs
}

fn parse_key(node: &Node) -> Key {
    let fifths = child_element(node, "fifths")
        .and_then(|n| parse_number(&n))
        .unwrap_or(0);
    Key { fifths }
}

fn parse_time(node: &Node) -> Option<TimeSignature> {
    Some(TimeSignature {
        beats: parse_number(&child_element(node, "beats")?)?,
        beat_type: parse_number(&child_element(node, "beat-type")?)?,
    })
}

fn parse_clef(node: &Node) -> Clef {
    let number = node.attribute("number").and_then(|n| n.parse().ok());
    let mut clef = Clef {
        number,
        sign: "G".to_string(),
        line: 2,
    };
    for child in node.children().filter(|n| n.is_element()) {
        match child.tag_name().name() {
            "sign" => {
                clef.sign = child.text().unwrap_or("G").trim().to_string();
            }
            "line" => clef.line = parse_number(&child).unwrap_or(2),
            _ => {}
        }
    }
    clef
}

// ─── Note ────────────────────────────────────────────────────────────

fn parse_note(node: &Node, measure: i32, diagnostics: &mut Diagnostics) -> Note {
    let mut note = Note {
        print_object: node.attribute("print-object") != Some("no"),
        grace: None,
        chord: false,
        content: NoteContent::Rest { measure: false },
        duration: None,
        ties: Vec::new(),
        voice: None,
        note_type: None,
        dots: 0,
        accidental: None,
        time_modification: None,
        stem: None,
        staff: None,
        beams: Vec::new(),
        notations: Notations::default(),
    };
    let mut sounding_ties = Vec::new();
    let mut has_content = false;

    for child in node.children().filter(|n| n.is_element()) {
        let text = child.text().map(str::trim).unwrap_or("");
        match child.tag_name().name() {
            "grace" => {
                note.grace = Some(Grace {
                    slash: child.attribute("slash") == Some("yes"),
                });
            }
            "chord" => note.chord = true,
            "pitch" => {
                note.content = NoteContent::Pitch(parse_pitch(&child, measure, diagnostics));
                has_content = true;
            }
            "rest" => {
                note.content = NoteContent::Rest {
                    measure: child.attribute("measure") == Some("yes"),
                };
                has_content = true;
            }
            "unpitched" => {
                diagnostics.grammar(
                    None,
                    format!("measure {measure}: <unpitched> notes are encoded as rests"),
                );
                has_content = true;
            }
            "duration" => note.duration = parse_duration_text(text),
            "tie" => {
                if let Some(kind) = child.attribute("type").and_then(StartStop::from_name) {
                    sounding_ties.push(kind);
                }
            }
            "voice" => match text.parse() {
                Ok(voice) => note.voice = Some(voice),
                Err(_) => diagnostics.grammar(
                    None,
                    format!("measure {measure}: unsupported voice '{text}'"),
                ),
            },
            "type" => match NoteType::from_name(text) {
                Some(note_type) => note.note_type = Some(note_type),
                None => diagnostics.grammar(
                    None,
                    format!("measure {measure}: unknown note type '{text}'"),
                ),
            },
            "dot" => note.dots = note.dots.saturating_add(1),
            "accidental" => match Accidental::from_name(text) {
                Some(accidental) => note.accidental = Some(accidental),
                None => diagnostics.grammar(
                    None,
                    format!("measure {measure}: unsupported accidental type '{text}'"),
                ),
            },
            "time-modification" => {
                let actual = child_element(&child, "actual-notes").and_then(|n| parse_number(&n));
                let normal = child_element(&child, "normal-notes").and_then(|n| parse_number(&n));
                if let (Some(actual), Some(normal)) = (actual, normal) {
                    note.time_modification = Some(TimeModification { actual, normal });
                }
            }
            "stem" => match Stem::from_name(text) {
                Some(stem) => note.stem = Some(stem),
                None => diagnostics.grammar(
                    None,
                    format!("measure {measure}: unknown stem type '{text}'"),
                ),
            },
            "staff" => note.staff = parse_number(&child),
            "beam" => {
                let number = child
                    .attribute("number")
                    .and_then(|n| n.parse().ok())
                    .unwrap_or(1);
                match BeamValue::from_xml_name(text) {
                    Some(value) => note.beams.push(Beam { number, value }),
                    None => diagnostics.grammar(
                        None,
                        format!("measure {measure}: unknown beam value '{text}'"),
                    ),
                }
            }
            "notations" => parse_notations(&child, &mut note),
            _ => {}
        }
    }

    if !has_content {
        diagnostics.grammar(
            None,
            format!("measure {measure}: <note> has neither <pitch> nor <rest>"),
        );
    }

    // <tied> carries the notation; fall back to the sounding <tie>
    if note.ties.is_empty() {
        note.ties = sounding_ties;
    }
    note.beams.sort_by_key(|b| b.number);
    note
}

fn parse_pitch(node: &Node, measure: i32, diagnostics: &mut Diagnostics) -> Pitch {
    let mut pitch = Pitch {
        step: Step::C,
        octave: 4,
        alter: 0,
    };
    for child in node.children().filter(|n| n.is_element()) {
        let text = child.text().map(str::trim).unwrap_or("");
        match child.tag_name().name() {
            "step" => match text.chars().next().and_then(Step::from_char) {
                Some(step) => pitch.step = step,
                None => diagnostics.grammar(
                    None,
                    format!("measure {measure}: invalid pitch step '{text}'"),
                ),
            },
            "octave" => pitch.octave = parse_number(&child).unwrap_or(4),
            "alter" => match text.parse::<f64>() {
                Ok(alter) if alter.fract() == 0.0 => pitch.alter = alter as i32,
                _ => diagnostics.grammar(
                    None,
                    format!("measure {measure}: microtonal alteration '{text}' is not supported"),
                ),
            },
            _ => {}
        }
    }
    pitch
}

fn parse_notations(node: &Node, note: &mut Note) {
    for child in node.children().filter(|n| n.is_element()) {
        match child.tag_name().name() {
            "tied" => {
                if let Some(kind) = child.attribute("type").and_then(StartStop::from_name) {
                    note.ties.push(kind);
                }
            }
            "tuplet" => {
                if let Some(kind) = child.attribute("type").and_then(StartStop::from_name) {
                    note.notations.tuplets.push(kind);
                }
            }
            // slur continuations carry no information for the codec
            "slur" => {
                if let Some(kind) = child.attribute("type").and_then(StartStop::from_name) {
                    note.notations.slurs.push(kind);
                }
            }
            "fermata" => note.notations.fermata = true,
            "arpeggiate" => note.notations.arpeggiate = true,
            "articulations" => {
                for art in child.children().filter(|n| n.is_element()) {
                    match art.tag_name().name() {
                        "staccato" => note.notations.staccato = true,
                        "accent" => note.notations.accent = true,
                        "strong-accent" => note.notations.strong_accent = true,
                        "tenuto" => note.notations.tenuto = true,
                        _ => {}
                    }
                }
            }
            "ornaments" => {
                for orn in child.children().filter(|n| n.is_element()) {
                    match orn.tag_name().name() {
                        "tremolo" => {
                            let kind = orn
                                .attribute("type")
                                .and_then(TremoloType::from_name)
                                .unwrap_or(TremoloType::Single);
                            let marks = parse_number(&orn).unwrap_or(3);
                            note.notations.tremolo = Some(Tremolo { kind, marks });
                        }
                        "trill-mark" => note.notations.trill_mark = true,
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────

fn child_element<'a, 'input>(node: &Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|n| n.is_element() && n.tag_name().name() == name)
}

fn parse_number<T: std::str::FromStr>(node: &Node) -> Option<T> {
    node.text()?.trim().parse().ok()
}

fn parse_duration(node: &Node) -> Option<Fraction> {
    parse_duration_text(child_element(node, "duration")?.text()?.trim())
}

/// Durations are integer ticks, or `n/d` quarter fractions in fractional
/// parts written by this crate.
fn parse_duration_text(text: &str) -> Option<Fraction> {
    text.parse::<Fraction>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_ordered_measure_content() {
        let (part, diagnostics) = parse_part_fragment(
            r#"<part id="P1">
                <measure number="1">
                    <print new-system="yes"/>
                    <attributes>
                        <divisions>2</divisions>
                        <key><fifths>-1</fifths><mode>major</mode></key>
                        <time><beats>3</beats><beat-type>4</beat-type></time>
                        <staves>2</staves>
                        <clef number="2"><sign>F</sign><line>4</line></clef>
                        <clef number="1"><sign>G</sign><line>2</line></clef>
                    </attributes>
                    <direction><direction-type><words>dolce</words></direction-type></direction>
                    <note>
                        <pitch><step>B</step><alter>-1</alter><octave>4</octave></pitch>
                        <duration>6</duration>
                        <voice>1</voice>
                        <type>half</type>
                        <dot/>
                        <staff>1</staff>
                        <notations><fermata/></notations>
                    </note>
                    <backup><duration>6</duration></backup>
                    <note>
                        <rest measure="yes"/>
                        <duration>6</duration>
                        <voice>5</voice>
                        <staff>2</staff>
                    </note>
                </measure>
            </part>"#,
        )
        .unwrap();

        assert!(diagnostics.is_empty(), "{diagnostics:?}");
        let measure = &part.measures[0];
        assert!(measure.new_system);
        assert_eq!(measure.elements.len(), 4);

        let attrs = measure.head_attributes().unwrap();
        assert_eq!(attrs.divisions, Some(2));
        assert_eq!(attrs.key, Some(Key { fifths: -1 }));
        assert_eq!(attrs.staves, Some(2));
        assert_eq!(attrs.clefs[0].sign, "G");
        assert_eq!(attrs.clefs[1].number, Some(2));

        let MeasureElement::Note(note) = &measure.elements[1] else {
            panic!("expected a note");
        };
        assert_eq!(note.pitch().unwrap().alter, -1);
        assert_eq!(note.dots, 1);
        assert!(note.notations.fermata);
        assert_eq!(note.duration, Some(Fraction::from_integer(6)));

        assert!(matches!(measure.elements[2], MeasureElement::Backup(_)));
        let MeasureElement::Note(rest) = &measure.elements[3] else {
            panic!("expected a rest");
        };
        assert!(rest.is_measure_rest());
        assert_eq!(rest.note_type, None);
    }

    #[test]
    fn reports_unknown_elements() {
        let (_, diagnostics) = parse_part_fragment(
            r#"<part id="P1"><measure number="1">
                <attributes><divisions>1</divisions><mystery/></attributes>
                <spaceship/>
            </measure></part>"#,
        )
        .unwrap();
        assert_eq!(diagnostics.len(), 2);
    }

    #[test]
    fn dot_count_saturates() {
        let dots = "<dot/>".repeat(300);
        let xml = format!(
            r#"<part id="P1"><measure number="1"><note><rest/><duration>1</duration><type>quarter</type>{dots}</note></measure></part>"#
        );
        let (part, _) = parse_part_fragment(&xml).unwrap();
        assert_eq!(part.measures[0].notes().next().map(|n| n.dots), Some(u8::MAX));
    }

    #[test]
    fn rejects_timewise_scores() {
        let err = parse_musicxml("<score-timewise/>").unwrap_err();
        assert!(matches!(err, CodecError::UnsupportedRoot(_)));
    }
}
