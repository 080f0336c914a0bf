//! MXL file handler: reads compressed MusicXML (.mxl) archives.
//!
//! An .mxl file is a ZIP archive containing:
//!   - META-INF/container.xml: declares the root MusicXML file path
//!   - <rootfile>.xml: the actual MusicXML content (e.g., score.xml)
//!   - (optional) other files: images, sounds, etc.

use std::io::{Cursor, Read};
use zip::ZipArchive;

use crate::error::{CodecError, Diagnostics};
use crate::model::Score;
use crate::parser;

type Archive<'a> = ZipArchive<Cursor<&'a [u8]>>;

/// Read and parse a .mxl file from raw bytes.
pub fn parse_mxl(data: &[u8]) -> Result<(Score, Diagnostics), CodecError> {
    let xml = extract_musicxml_from_mxl(data)?;
    parser::parse_musicxml(&xml)
}

/// Extract the MusicXML content string from .mxl bytes.
pub fn extract_musicxml_from_mxl(data: &[u8]) -> Result<String, CodecError> {
    let mut archive = ZipArchive::new(Cursor::new(data))?;

    let root_file_path = match read_container_xml(&mut archive)? {
        Some(path) => path,
        None => find_musicxml_entry(&mut archive)?,
    };
    log::debug!("reading MXL root file '{root_file_path}'");

    let mut root_file = archive.by_name(&root_file_path).map_err(|e| {
        CodecError::Archive(format!("root file '{root_file_path}' not found: {e}"))
    })?;

    let mut xml = String::new();
    root_file.read_to_string(&mut xml)?;
    Ok(xml)
}

/// The rootfile path declared by META-INF/container.xml, if the archive has
/// one.
fn read_container_xml(archive: &mut Archive<'_>) -> Result<Option<String>, CodecError> {
    let container_xml = match archive.by_name("META-INF/container.xml") {
        Ok(mut container_file) => {
            let mut xml = String::new();
            container_file.read_to_string(&mut xml)?;
            xml
        }
        Err(_) => return Ok(None),
    };

    let doc = roxmltree::Document::parse(&container_xml)?;
    doc.descendants()
        .filter(|n| n.tag_name().name() == "rootfile")
        .find_map(|n| n.attribute("full-path"))
        .map(|path| Some(path.to_string()))
        .ok_or_else(|| CodecError::Archive("no rootfile found in container.xml".to_string()))
}

/// Fallback: the first .xml or .musicxml entry outside META-INF.
fn find_musicxml_entry(archive: &mut Archive<'_>) -> Result<String, CodecError> {
    let names: Vec<String> = archive.file_names().map(String::from).collect();

    names
        .iter()
        .find(|name| {
            !name.starts_with("META-INF/")
                && (name.ends_with(".xml") || name.ends_with(".musicxml"))
        })
        .cloned()
        .ok_or_else(|| {
            CodecError::Archive(format!("no MusicXML file found in archive. Files: {names:?}"))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    const SCORE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<score-partwise version="4.0">
  <part-list><score-part id="P1"><part-name>Piano</part-name></score-part></part-list>
  <part id="P1"><measure number="1"/></part>
</score-partwise>"#;

    fn archive(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut buffer);
            for (name, content) in entries {
                let options =
                    SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
                writer.start_file(*name, options).unwrap();
                writer.write_all(content.as_bytes()).unwrap();
            }
            writer.finish().unwrap();
        }
        buffer.into_inner()
    }

    #[test]
    fn reads_rootfile_from_container() {
        let container = r#"<container><rootfiles>
            <rootfile full-path="music/score.xml"/>
        </rootfiles></container>"#;
        let data = archive(&[
            ("META-INF/container.xml", container),
            ("decoy.xml", "<not-a-score/>"),
            ("music/score.xml", SCORE),
        ]);
        let (score, diagnostics) = parse_mxl(&data).unwrap();
        assert!(diagnostics.is_empty());
        assert_eq!(score.parts[0].name, "Piano");
    }

    #[test]
    fn falls_back_to_first_musicxml_entry() {
        let data = archive(&[("cover.png", "png"), ("score.musicxml", SCORE)]);
        let (score, _) = parse_mxl(&data).unwrap();
        assert_eq!(score.measure_count(), 1);
    }

    #[test]
    fn archive_errors() {
        assert!(matches!(parse_mxl(b"not a zip"), Err(CodecError::Archive(_))));
        let data = archive(&[("readme.txt", "hello")]);
        assert!(matches!(parse_mxl(&data), Err(CodecError::Archive(_))));
    }
}
