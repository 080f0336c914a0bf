//! Beam reconstruction.
//!
//! LMX only writes `begin`, `end` and hooks; `continue` beams and all beam
//! numbers are implied. They are recovered from the number of beams open
//! before each note, tracked separately for grace and regular notes.

use crate::error::Diagnostics;
use crate::model::{Beam, BeamValue};
use crate::vocabulary::BeamToken;

/// What the beam tokens of one note ask for.
#[derive(Debug, Clone, Copy)]
pub struct BeamRequest<'a> {
    /// Beam tokens with their positions, in stream order
    pub tokens: &'a [(BeamToken, usize)],
    pub grace: bool,
    pub chord: bool,
    /// Whether the note type can carry beams at all
    pub beamable: bool,
    /// Position of the note's root token
    pub position: usize,
}

/// Open beam counts per voice class, never negative.
#[derive(Debug, Default)]
pub struct BeamState {
    open: [u8; 2],
    /// Open counts before the current chord's first note
    chord_base: [u8; 2],
}

impl BeamState {
    pub fn open_count(&self, grace: bool) -> u8 {
        self.open[grace as usize]
    }

    /// Compute the beams of one note and advance the state.
    ///
    /// Chord members share the first note's beams; they only get beams when
    /// they carry tokens of their own, and never move the state.
    pub fn resolve(&mut self, request: BeamRequest<'_>, diagnostics: &mut Diagnostics) -> Vec<Beam> {
        let class = request.grace as usize;

        if request.chord {
            if request.tokens.is_empty() {
                return Vec::new();
            }
            let (beams, _) = compute(self.chord_base[class], &request, diagnostics);
            return beams;
        }

        self.chord_base[class] = self.open[class];
        let (beams, open) = compute(self.open[class], &request, diagnostics);
        self.open[class] = open;
        beams
    }
}

fn compute(open: u8, request: &BeamRequest<'_>, diagnostics: &mut Diagnostics) -> (Vec<Beam>, u8) {
    let count = |kind: BeamToken| request.tokens.iter().filter(|(t, _)| *t == kind).count();
    let begins = to_number(count(BeamToken::Begin));
    let mut ends = to_number(count(BeamToken::End));

    if ends > open {
        diagnostics.semantic(
            Some(request.position),
            format!("Closing {ends} beams but only {open} are open."),
        );
        ends = open;
    }

    let kept = open - ends;
    let mut beams = Vec::new();

    if request.beamable {
        beams.extend((1..=kept).map(|number| Beam {
            number,
            value: BeamValue::Continue,
        }));
    }
    beams.extend((kept + 1..=open).map(|number| Beam {
        number,
        value: BeamValue::End,
    }));
    beams.extend((1..=begins).map(|i| Beam {
        number: kept.saturating_add(i),
        value: BeamValue::Begin,
    }));

    let after = kept.saturating_add(begins);
    let mut next = open.max(after);
    for &(token, _) in request.tokens {
        let value = match token {
            BeamToken::ForwardHook => BeamValue::ForwardHook,
            BeamToken::BackwardHook => BeamValue::BackwardHook,
            BeamToken::Begin | BeamToken::End => continue,
        };
        next = next.saturating_add(1);
        beams.push(Beam { number: next, value });
    }

    beams.sort_by_key(|b| b.number);
    (beams, after)
}

fn to_number(count: usize) -> u8 {
    u8::try_from(count).unwrap_or(u8::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use BeamValue::*;

    fn note(state: &mut BeamState, tokens: &[BeamToken]) -> Vec<(u8, BeamValue)> {
        resolve(state, tokens, false, false)
    }

    fn resolve(
        state: &mut BeamState,
        tokens: &[BeamToken],
        grace: bool,
        chord: bool,
    ) -> Vec<(u8, BeamValue)> {
        let tokens: Vec<(BeamToken, usize)> = tokens.iter().map(|&t| (t, 1)).collect();
        let request = BeamRequest {
            tokens: &tokens,
            grace,
            chord,
            beamable: true,
            position: 1,
        };
        let mut diagnostics = Diagnostics::new();
        let beams = state.resolve(request, &mut diagnostics);
        assert!(diagnostics.is_empty());
        beams.into_iter().map(|b| (b.number, b.value)).collect()
    }

    #[test]
    fn eighth_group() {
        let mut state = BeamState::default();
        assert_eq!(note(&mut state, &[BeamToken::Begin]), vec![(1, Begin)]);
        assert_eq!(note(&mut state, &[]), vec![(1, Continue)]);
        assert_eq!(note(&mut state, &[BeamToken::End]), vec![(1, End)]);
        assert_eq!(state.open_count(false), 0);
        assert_eq!(note(&mut state, &[]), vec![]);
    }

    #[test]
    fn sixteenths_under_an_eighth_beam() {
        let mut state = BeamState::default();
        assert_eq!(
            note(&mut state, &[BeamToken::Begin, BeamToken::Begin]),
            vec![(1, Begin), (2, Begin)]
        );
        assert_eq!(note(&mut state, &[BeamToken::End]), vec![(1, Continue), (2, End)]);
        assert_eq!(note(&mut state, &[BeamToken::Begin]), vec![(1, Continue), (2, Begin)]);
        assert_eq!(
            note(&mut state, &[BeamToken::End, BeamToken::End]),
            vec![(1, End), (2, End)]
        );
    }

    #[test]
    fn hooks_take_next_free_number() {
        let mut state = BeamState::default();
        assert_eq!(note(&mut state, &[BeamToken::Begin]), vec![(1, Begin)]);
        assert_eq!(
            note(&mut state, &[BeamToken::End, BeamToken::BackwardHook]),
            vec![(1, End), (2, BackwardHook)]
        );
    }

    #[test]
    fn grace_notes_have_their_own_count() {
        let mut state = BeamState::default();
        note(&mut state, &[BeamToken::Begin]);
        assert_eq!(
            resolve(&mut state, &[BeamToken::Begin], true, false),
            vec![(1, Begin)]
        );
        assert_eq!(state.open_count(false), 1);
        assert_eq!(state.open_count(true), 1);
    }

    #[test]
    fn chord_members_do_not_move_the_state() {
        let mut state = BeamState::default();
        note(&mut state, &[BeamToken::Begin]);
        assert_eq!(resolve(&mut state, &[], false, true), vec![]);
        assert_eq!(
            resolve(&mut state, &[BeamToken::Begin], false, true),
            vec![(1, Begin)]
        );
        assert_eq!(state.open_count(false), 1);
    }

    #[test]
    fn over_closing_is_clamped() {
        let mut state = BeamState::default();
        let tokens = [(BeamToken::End, 7)];
        let request = BeamRequest {
            tokens: &tokens,
            grace: false,
            chord: false,
            beamable: true,
            position: 6,
        };
        let mut diagnostics = Diagnostics::new();
        assert!(state.resolve(request, &mut diagnostics).is_empty());
        assert_eq!(state.open_count(false), 0);
        assert_eq!(diagnostics.iter().next().unwrap().position, Some(6));
    }

    #[test]
    fn long_notes_get_no_fillers() {
        let mut state = BeamState::default();
        note(&mut state, &[BeamToken::Begin]);
        let request = BeamRequest {
            tokens: &[],
            grace: false,
            chord: false,
            beamable: false,
            position: 3,
        };
        let mut diagnostics = Diagnostics::new();
        assert!(state.resolve(request, &mut diagnostics).is_empty());
        assert_eq!(state.open_count(false), 1);
    }
}
