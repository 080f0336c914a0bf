//! MusicXML writer for the part tree model.
//!
//! Output is score-partwise MusicXML 4.0. Durations are written as they are
//! stored: integer ticks normally, `n/d` quarter fractions for parts kept in
//! fractional form (readable back by [`crate::parser`], but not by other
//! MusicXML tools).

use crate::model::*;

/// Convert a Score to MusicXML format
pub fn to_musicxml(score: &Score) -> String {
    let mut xml = String::new();

    // XML declaration and doctype
    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    xml.push('\n');
    xml.push_str(r#"<!DOCTYPE score-partwise PUBLIC "-//Recordare//DTD MusicXML 4.0 Partwise//EN" "http://www.musicxml.org/dtds/partwise.dtd">"#);
    xml.push('\n');

    let version = score.version.as_deref().unwrap_or("4.0");
    xml.push_str(&format!("<score-partwise version=\"{}\">\n", escape_xml(version)));

    // Work info (title)
    if let Some(title) = &score.title {
        xml.push_str("  <work>\n");
        xml.push_str(&format!("    <work-title>{}</work-title>\n", escape_xml(title)));
        xml.push_str("  </work>\n");
    }

    // Identification (composer)
    if let Some(composer) = &score.composer {
        xml.push_str("  <identification>\n");
        xml.push_str(&format!(
            "    <creator type=\"composer\">{}</creator>\n",
            escape_xml(composer)
        ));
        xml.push_str("  </identification>\n");
    }

    // Part list
    xml.push_str("  <part-list>\n");
    for part in &score.parts {
        xml.push_str(&format!("    <score-part id=\"{}\">\n", escape_xml(&part.id)));
        xml.push_str(&format!(
            "      <part-name>{}</part-name>\n",
            escape_xml(&part.name)
        ));
        xml.push_str("    </score-part>\n");
    }
    xml.push_str("  </part-list>\n");

    for part in &score.parts {
        xml.push_str(&part_to_xml(part, 1));
    }

    xml.push_str("</score-partwise>\n");
    xml
}

/// Serialize a bare `<part>` element, indented by `depth` levels.
pub fn part_to_xml(part: &Part, depth: usize) -> String {
    let mut w = Writer {
        xml: String::new(),
        depth,
    };
    w.open(&format!("part id=\"{}\"", escape_xml(&part.id)));
    for measure in &part.measures {
        w.measure(measure);
    }
    w.close("part");
    w.xml
}

/// Wrap a lone part (e.g. a decoded system) into a complete score.
pub fn part_to_score(mut part: Part) -> Score {
    if part.name.is_empty() {
        part.name = "Piano".to_string();
    }
    Score {
        title: None,
        composer: None,
        version: Some("4.0".to_string()),
        parts: vec![part],
    }
}

struct Writer {
    xml: String,
    depth: usize,
}

impl Writer {
    fn line(&mut self, content: &str) {
        for _ in 0..self.depth {
            self.xml.push_str("  ");
        }
        self.xml.push_str(content);
        self.xml.push('\n');
    }

    fn open(&mut self, tag: &str) {
        self.line(&format!("<{tag}>"));
        self.depth += 1;
    }

    fn close(&mut self, name: &str) {
        self.depth -= 1;
        self.line(&format!("</{name}>"));
    }

    fn leaf(&mut self, name: &str, text: impl std::fmt::Display) {
        self.line(&format!("<{name}>{text}</{name}>"));
    }

    fn measure(&mut self, measure: &Measure) {
        let mut tag = format!("measure number=\"{}\"", measure.number);
        if measure.implicit {
            tag.push_str(" implicit=\"yes\"");
        }
        self.open(&tag);

        if measure.new_page {
            self.line("<print new-page=\"yes\"/>");
        } else if measure.new_system {
            self.line("<print new-system=\"yes\"/>");
        }

        for element in &measure.elements {
            match element {
                MeasureElement::Attributes(attrs) => self.attributes(attrs),
                MeasureElement::Note(note) => self.note(note),
                MeasureElement::Backup(backup) => {
                    self.open("backup");
                    self.leaf("duration", backup.duration);
                    self.close("backup");
                }
                MeasureElement::Forward(forward) => {
                    self.open("forward");
                    self.leaf("duration", forward.duration);
                    self.close("forward");
                }
            }
        }

        self.close("measure");
    }

    fn attributes(&mut self, attrs: &Attributes) {
        self.open("attributes");
        if let Some(divisions) = attrs.divisions {
            self.leaf("divisions", divisions);
        }
        if let Some(key) = attrs.key {
            self.open("key");
            self.leaf("fifths", key.fifths);
            self.close("key");
        }
        if let Some(time) = attrs.time {
            self.open("time");
            self.leaf("beats", time.beats);
            self.leaf("beat-type", time.beat_type);
            self.close("time");
        }
        if let Some(staves) = attrs.staves {
            self.leaf("staves", staves);
        }
        for clef in &attrs.clefs {
            match clef.number {
                Some(number) => self.open(&format!("clef number=\"{number}\"")),
                None => self.open("clef"),
            }
            self.leaf("sign", escape_xml(&clef.sign));
            self.leaf("line", clef.line);
            self.close("clef");
        }
        self.close("attributes");
    }

    fn note(&mut self, note: &Note) {
        if note.print_object {
            self.open("note");
        } else {
            self.open("note print-object=\"no\"");
        }

        if let Some(grace) = note.grace {
            self.line(if grace.slash { "<grace slash=\"yes\"/>" } else { "<grace/>" });
        }
        if note.chord {
            self.line("<chord/>");
        }

        match note.content {
            NoteContent::Pitch(pitch) => {
                self.open("pitch");
                self.leaf("step", pitch.step);
                if pitch.alter != 0 {
                    self.leaf("alter", pitch.alter);
                }
                self.leaf("octave", pitch.octave);
                self.close("pitch");
            }
            NoteContent::Rest { measure: true } => self.line("<rest measure=\"yes\"/>"),
            NoteContent::Rest { measure: false } => self.line("<rest/>"),
        }

        if let Some(duration) = note.duration {
            self.leaf("duration", duration);
        }
        for tie in &note.ties {
            self.line(&format!("<tie type=\"{}\"/>", tie.name()));
        }
        if let Some(voice) = note.voice {
            self.leaf("voice", voice);
        }
        if let Some(note_type) = note.note_type {
            self.leaf("type", note_type.name());
        }
        for _ in 0..note.dots {
            self.line("<dot/>");
        }
        if let Some(accidental) = note.accidental {
            self.leaf("accidental", accidental.name());
        }
        if let Some(tm) = note.time_modification {
            self.open("time-modification");
            self.leaf("actual-notes", tm.actual);
            self.leaf("normal-notes", tm.normal);
            self.close("time-modification");
        }
        if let Some(stem) = note.stem {
            self.leaf("stem", stem.name());
        }
        if let Some(staff) = note.staff {
            self.leaf("staff", staff);
        }
        for beam in &note.beams {
            self.line(&format!(
                "<beam number=\"{}\">{}</beam>",
                beam.number,
                beam.value.xml_name()
            ));
        }

        if !note.ties.is_empty() || !note.notations.is_empty() {
            self.notations(&note.ties, &note.notations);
        }

        self.close("note");
    }

    fn notations(&mut self, ties: &[StartStop], notations: &Notations) {
        self.open("notations");
        for tie in ties {
            self.line(&format!("<tied type=\"{}\"/>", tie.name()));
        }
        for slur in &notations.slurs {
            self.line(&format!("<slur type=\"{}\"/>", slur.name()));
        }
        for tuplet in &notations.tuplets {
            self.line(&format!("<tuplet type=\"{}\"/>", tuplet.name()));
        }

        if notations.tremolo.is_some() || notations.trill_mark {
            self.open("ornaments");
            if notations.trill_mark {
                self.line("<trill-mark/>");
            }
            if let Some(tremolo) = notations.tremolo {
                self.line(&format!(
                    "<tremolo type=\"{}\">{}</tremolo>",
                    tremolo.kind.name(),
                    tremolo.marks
                ));
            }
            self.close("ornaments");
        }

        let articulations = [
            (notations.accent, "accent"),
            (notations.strong_accent, "strong-accent"),
            (notations.staccato, "staccato"),
            (notations.tenuto, "tenuto"),
        ];
        if articulations.iter().any(|(on, _)| *on) {
            self.open("articulations");
            for (_, name) in articulations.iter().filter(|(on, _)| *on) {
                self.line(&format!("<{name}/>"));
            }
            self.close("articulations");
        }

        if notations.fermata {
            self.line("<fermata/>");
        }
        if notations.arpeggiate {
            self.line("<arpeggiate/>");
        }
        self.close("notations");
    }
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
