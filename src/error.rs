//! Diagnostics and error types.
//!
//! The codec never aborts on malformed input. Linearizing and delinearizing
//! collect [`Diagnostic`]s into a [`Diagnostics`] list owned by the call and
//! hand it back next to the result. Callers that want validation semantics
//! (tests, corpus checks) promote the list into a hard failure with
//! [`Diagnostics::into_result`].
//!
//! [`CodecError`] covers the failures that do stop a call: unreadable XML or
//! archives, malformed LMX file headers and duration conversions that cannot
//! produce integral ticks.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Which stage of the grammar a diagnostic comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticKind {
    /// A terminal outside the closed vocabulary.
    Lexical,
    /// Dangling or duplicate tokens, unknown tree elements.
    Grammar,
    /// Inconsistent durations, chord order, backups and ladders.
    Semantic,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DiagnosticKind::Lexical => "lexical",
            DiagnosticKind::Grammar => "grammar",
            DiagnosticKind::Semantic => "semantic",
        };
        f.write_str(name)
    }
}

/// One recorded defect. `position` is the 1-based token position when the
/// defect is tied to an LMX token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub position: Option<usize>,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.position {
            Some(position) => write!(
                f,
                "[{}] token {}: {}",
                self.kind, position, self.message
            ),
            None => write!(f, "[{}] {}", self.kind, self.message),
        }
    }
}

/// Diagnostics accumulated by a single codec call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a diagnostic and mirror it to the log.
    pub fn push(&mut self, kind: DiagnosticKind, position: Option<usize>, message: impl Into<String>) {
        let diagnostic = Diagnostic {
            kind,
            position,
            message: message.into(),
        };
        log::warn!("{diagnostic}");
        self.items.push(diagnostic);
    }

    pub fn lexical(&mut self, position: usize, message: impl Into<String>) {
        self.push(DiagnosticKind::Lexical, Some(position), message);
    }

    pub fn grammar(&mut self, position: Option<usize>, message: impl Into<String>) {
        self.push(DiagnosticKind::Grammar, position, message);
    }

    pub fn semantic(&mut self, position: Option<usize>, message: impl Into<String>) {
        self.push(DiagnosticKind::Semantic, position, message);
    }

    /// Append all diagnostics of another call.
    pub fn extend(&mut self, other: Diagnostics) {
        self.items.extend(other.items);
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.items.iter()
    }

    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.items.iter().filter(|d| d.kind == kind).count()
    }

    /// Strict mode: any recorded diagnostic becomes an error.
    pub fn into_result(self) -> Result<(), CodecError> {
        match self.items.into_iter().next() {
            None => Ok(()),
            Some(first) => Err(CodecError::Strict(first)),
        }
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("XML parse error: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("Unsupported root element: '{0}'. Only 'score-partwise' is supported.")]
    UnsupportedRoot(String),

    #[error("Failed to read MXL archive: {0}")]
    Archive(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid UTF-8 in MusicXML file: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    /// Malformed LMX file header.
    #[error("LMX header error at line {line}: {message}")]
    Header { line: usize, message: String },

    /// Fractional/actual duration conversion failed.
    #[error("Duration conversion failed: {0}")]
    Duration(String),

    /// A diagnostic promoted by strict mode.
    #[error("{0}")]
    Strict(Diagnostic),
}

impl From<zip::result::ZipError> for CodecError {
    fn from(e: zip::result::ZipError) -> Self {
        CodecError::Archive(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_mode_surfaces_first_diagnostic() {
        let mut diagnostics = Diagnostics::new();
        assert!(diagnostics.clone().into_result().is_ok());

        diagnostics.lexical(3, "Token 'xyz' is not in the vocabulary.");
        diagnostics.semantic(None, "later");
        let err = diagnostics.into_result().unwrap_err();
        assert_eq!(
            err.to_string(),
            "[lexical] token 3: Token 'xyz' is not in the vocabulary."
        );
    }

    #[test]
    fn counts_by_kind() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.grammar(Some(1), "a");
        diagnostics.grammar(None, "b");
        diagnostics.semantic(None, "c");
        assert_eq!(diagnostics.count(DiagnosticKind::Grammar), 2);
        assert_eq!(diagnostics.count(DiagnosticKind::Lexical), 0);
        assert_eq!(diagnostics.len(), 3);
    }
}
