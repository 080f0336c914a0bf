//! Measure clustering and the shift-reduce pass that groups tokens into
//! measure items.

use super::lexer::Token;
use crate::error::Diagnostics;
use crate::vocabulary::{Role, Terminal};

/// One ROOT token with the PREFIX tokens before it and the SUFFIX tokens
/// after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemTree {
    pub root: Token,
    pub prefixes: Vec<Token>,
    pub suffixes: Vec<Token>,
}

/// Split the stream on `measure` tokens. The delimiters themselves are
/// dropped; every `measure` opens a cluster, even an empty one.
pub fn cluster_measures(tokens: &[Token], diagnostics: &mut Diagnostics) -> Vec<Vec<Token>> {
    let mut clusters: Vec<Vec<Token>> = Vec::new();
    let mut leading: Vec<Token> = Vec::new();

    for &token in tokens {
        if token.terminal == Terminal::Measure {
            clusters.push(Vec::new());
            continue;
        }
        match clusters.last_mut() {
            Some(cluster) => cluster.push(token),
            None => leading.push(token),
        }
    }

    if let Some(first) = leading.first() {
        diagnostics.grammar(
            Some(first.position),
            format!(
                "There are {} tokens before the first 'measure' token.",
                leading.len()
            ),
        );
    }

    clusters
}

/// Group the tokens of one measure into item trees.
///
/// Prefixes pile up until the next root, which takes them. Suffixes attach
/// to the most recent root. Suffixes before the first root and prefixes
/// after the last one are dangling.
pub fn build_trees(tokens: &[Token], diagnostics: &mut Diagnostics) -> Vec<ItemTree> {
    let mut trees = Vec::new();
    let mut open: Option<ItemTree> = None;
    let mut prefixes: Vec<Token> = Vec::new();

    for &token in tokens {
        match token.terminal.role() {
            Role::Prefix => prefixes.push(token),
            Role::Suffix => match open.as_mut() {
                Some(tree) => tree.suffixes.push(token),
                None => diagnostics.grammar(
                    Some(token.position),
                    format!("Dangling suffix token '{}'.", token.terminal),
                ),
            },
            Role::Root => {
                let shifted = ItemTree {
                    root: token,
                    prefixes: std::mem::take(&mut prefixes),
                    suffixes: Vec::new(),
                };
                if let Some(tree) = open.replace(shifted) {
                    trees.push(tree);
                }
            }
            Role::Structural => diagnostics.grammar(
                Some(token.position),
                format!("Unexpected measure item type '{}'.", token.terminal),
            ),
        }
    }

    trees.extend(open);
    for token in prefixes {
        diagnostics.grammar(
            Some(token.position),
            format!("Dangling prefix token '{}'.", token.terminal),
        );
    }

    trees
}
