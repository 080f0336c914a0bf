//! Lexer: whitespace-separated terminals into classified tokens.

use crate::error::Diagnostics;
use crate::vocabulary::{classify, Terminal};

/// A classified terminal and its 1-based position in the input stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub terminal: Terminal,
    pub position: usize,
}

/// Split text on whitespace and classify every terminal.
pub fn lex(text: &str) -> (Vec<Token>, Diagnostics) {
    lex_terminals(text.split_whitespace())
}

/// Classify already split terminals. Anything outside the vocabulary is
/// dropped and reported; positions keep counting across dropped terminals.
pub fn lex_terminals<I, S>(terminals: I) -> (Vec<Token>, Diagnostics)
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut tokens = Vec::new();
    let mut diagnostics = Diagnostics::new();

    for (i, text) in terminals.into_iter().enumerate() {
        let text = text.as_ref();
        let position = i + 1;
        match classify(text) {
            Some(terminal) => tokens.push(Token { terminal, position }),
            None => diagnostics.lexical(
                position,
                format!("Token '{text}' is not present in the vocabulary."),
            ),
        }
    }

    (tokens, diagnostics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DiagnosticKind;

    #[test]
    fn unknown_terminal_is_dropped_and_reported() {
        let (tokens, diagnostics) = lex("measure  rest xyz\tquarter\n");
        let positions: Vec<usize> = tokens.iter().map(|t| t.position).collect();
        assert_eq!(positions, vec![1, 2, 4]);
        assert_eq!(tokens[0].terminal, Terminal::Measure);

        let diagnostic = diagnostics.iter().next().unwrap();
        assert_eq!(diagnostic.kind, DiagnosticKind::Lexical);
        assert_eq!(diagnostic.position, Some(3));
    }

    #[test]
    fn empty_input() {
        let (tokens, diagnostics) = lex("   ");
        assert!(tokens.is_empty());
        assert!(diagnostics.is_empty());
    }
}
