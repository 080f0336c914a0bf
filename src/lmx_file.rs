//! LMX files: one token sequence per system.
//!
//! ```text
//! version: 1.0
//! flavor: core
//! ---
//! measure key:fifths:0 time beats:4 beat-type:4 ...
//! ---
//! measure ...
//! ```
//!
//! A header exists only when the file contains a `---` line; everything
//! before the first one is `field: value` pairs and every `---` starts a
//! new system. Without any `---`, each non-blank line is a system. `#`
//! starts a comment that runs to the end of the line.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CodecError;
use crate::vocabulary::classify;

pub const LMX_FILE_VERSION: &str = "1.0";

/// Which part of the vocabulary a file uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Flavor {
    /// Notes, attributes, beams, ties and tuplets only
    #[default]
    Core,
    /// Adds slurs, articulations and ornaments
    Extended,
}

impl Flavor {
    pub fn name(self) -> &'static str {
        match self {
            Flavor::Core => "core",
            Flavor::Extended => "extended",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LmxFile {
    pub flavor: Flavor,
    /// Token sequences, one per system
    pub systems: Vec<Vec<String>>,
}

impl LmxFile {
    /// Wrap token sequences, deriving the flavor from the tokens.
    pub fn from_systems(systems: Vec<Vec<String>>) -> Self {
        let extended = systems
            .iter()
            .flatten()
            .filter_map(|t| classify(t))
            .any(|t| t.is_extended());
        Self {
            flavor: if extended { Flavor::Extended } else { Flavor::Core },
            systems,
        }
    }

    pub fn parse(text: &str) -> Result<Self, CodecError> {
        let lines: Vec<&str> = text
            .lines()
            .map(|line| match line.find('#') {
                Some(start) => &line[..start],
                None => line,
            })
            .collect();

        let mut file = LmxFile::default();

        let Some(separator) = lines.iter().position(|l| l.trim() == "---") else {
            file.systems = lines
                .iter()
                .filter(|l| !l.trim().is_empty())
                .map(|l| split_tokens(l))
                .collect();
            return Ok(file);
        };

        for (i, line) in lines[..separator].iter().enumerate() {
            file.read_header_line(i + 1, line)?;
        }

        for line in &lines[separator..] {
            if line.trim() == "---" {
                file.systems.push(Vec::new());
            } else if let Some(system) = file.systems.last_mut() {
                system.extend(split_tokens(line));
            }
        }

        Ok(file)
    }

    fn read_header_line(&mut self, number: usize, line: &str) -> Result<(), CodecError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(());
        }

        let header_error = |message: String| CodecError::Header {
            line: number,
            message,
        };

        let (field, value) = line
            .split_once(':')
            .ok_or_else(|| header_error(format!("expected 'field: value', got '{line}'")))?;
        let value = value.trim();

        match field.trim() {
            "version" => {
                if value != LMX_FILE_VERSION {
                    return Err(header_error(format!("unsupported version '{value}'")));
                }
            }
            "flavor" => {
                self.flavor = match value {
                    "core" => Flavor::Core,
                    "extended" => Flavor::Extended,
                    _ => return Err(header_error(format!("unknown flavor '{value}'"))),
                };
            }
            other => log::debug!("ignoring LMX header field '{other}'"),
        }
        Ok(())
    }
}

fn split_tokens(line: &str) -> Vec<String> {
    line.split_whitespace().map(String::from).collect()
}

impl FromStr for LmxFile {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LmxFile::parse(s)
    }
}

impl fmt::Display for LmxFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "version: {LMX_FILE_VERSION}")?;
        writeln!(f, "flavor: {}", self.flavor.name())?;
        for system in &self.systems {
            writeln!(f, "---")?;
            writeln!(f, "{}", system.join(" "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn header_and_systems() {
        let file = LmxFile::parse(
            "# produced by hand\n\
             version: 1.0\n\
             flavor: extended\n\
             ---\n\
             measure rest quarter # first system\n\
             measure\n\
             ---\n\
             measure C4 quarter fermata\n",
        )
        .unwrap();
        assert_eq!(file.flavor, Flavor::Extended);
        assert_eq!(
            file.systems,
            vec![
                vec!["measure", "rest", "quarter", "measure"],
                vec!["measure", "C4", "quarter", "fermata"],
            ]
        );
    }

    #[test]
    fn headerless_file_has_one_system_per_line() {
        let file = LmxFile::parse("measure rest whole\n\n  measure  \n").unwrap();
        assert_eq!(file.flavor, Flavor::Core);
        assert_eq!(file.systems.len(), 2);
        assert_eq!(file.systems[1], vec!["measure"]);
    }

    #[test]
    fn header_errors() {
        let err = LmxFile::parse("version: 2.0\n---\nmeasure\n").unwrap_err();
        assert!(matches!(err, CodecError::Header { line: 1, .. }));
        assert!(LmxFile::parse("flavor: fancy\n---\n").is_err());
        assert!(LmxFile::parse("\nnonsense\n---\n").is_err());
    }

    #[test]
    fn written_file_parses_back() {
        let file = LmxFile::from_systems(vec![
            vec!["measure".into(), "C4".into(), "quarter".into(), "staccato".into()],
            vec!["measure".into()],
        ]);
        assert_eq!(file.flavor, Flavor::Extended);
        let text = file.to_string();
        assert!(text.starts_with("version: 1.0\nflavor: extended\n---\n"));
        assert_eq!(text.parse::<LmxFile>().unwrap(), file);
    }
}
