//! Error recovery: candidate search and ranking.
//!
//! When the only live stack version hits an error the parser looks for
//! (a) short sequences of missing tokens after which the lookahead can be
//! consumed, and (b) ways to pop stack entries and skip upcoming tokens so
//! that a resumed state can consume the next token. Candidates are ranked by
//! a [`RecoveryStrategy`] and verified against the lexer before one is
//! committed.

use crate::subtree::{
    ERROR_COST_PER_MISSING_TREE, ERROR_COST_PER_SKIPPED_CHAR, ERROR_COST_PER_SKIPPED_LINE,
    ERROR_COST_PER_SKIPPED_TREE,
};
use crate::symbol::Symbol;
use crate::table::{ParseAction, ParseTable, StateId};
use std::collections::VecDeque;

/// Upper bound on simulated reductions before one token is consumed.
const SIMULATION_LIMIT: usize = 1024;

/// What a recovery candidate would do to the input and the stack.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct RecoveryCandidate {
    /// Zero-width tokens to insert.
    pub missing: usize,
    /// Stack entries to move into an `ERROR` node.
    pub popped: usize,
    /// Upcoming tokens to move into an `ERROR` node.
    pub skipped: usize,
    /// Bytes covered by popped entries and skipped tokens.
    pub skipped_bytes: usize,
    /// Line breaks covered by popped entries and skipped tokens.
    pub skipped_lines: usize,
}

/// Ranks recovery candidates. Lower costs are tried first.
pub trait RecoveryStrategy: Send + Sync {
    fn cost(&self, candidate: &RecoveryCandidate) -> u32;
}

/// The default ranking: a fixed price per missing token, per popped or
/// skipped tree, per skipped byte and per skipped line.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CostRanking;

impl RecoveryStrategy for CostRanking {
    fn cost(&self, c: &RecoveryCandidate) -> u32 {
        ERROR_COST_PER_MISSING_TREE * c.missing as u32
            + ERROR_COST_PER_SKIPPED_TREE * (c.popped + c.skipped) as u32
            + ERROR_COST_PER_SKIPPED_CHAR * c.skipped_bytes as u32
            + ERROR_COST_PER_SKIPPED_LINE * c.skipped_lines as u32
    }
}

/// Runs the reductions `symbol` triggers on a copy of the structural state
/// stack and reports whether it is then shifted (or accepted).
///
/// # Parameters
/// - `table`: The parse table.
/// - `states`: Structural states, bottom up; updated in place.
/// - `symbol`: The terminal to consume.
///
/// # Returns
/// `true` if the terminal is shifted or accepted.
pub(crate) fn simulate(table: &ParseTable, states: &mut Vec<StateId>, symbol: Symbol) -> bool {
    for _ in 0..SIMULATION_LIMIT {
        let Some(&state) = states.last() else {
            return false;
        };
        let action = match table.action(state, symbol) {
            ParseAction::Ambig(ambig) => table.ambig(ambig).first().copied().unwrap_or_default(),
            action => action,
        };
        match action {
            ParseAction::Shift(next) => {
                states.push(next);
                return true;
            }
            ParseAction::Accept => return true,
            ParseAction::Reduce(prod) => {
                let info = table.production(prod);
                let keep = states.len().saturating_sub(info.child_count());
                if keep == 0 {
                    return false;
                }
                states.truncate(keep);
                let Some(next) = states.last().and_then(|s| table.goto(*s, info.lhs)) else {
                    return false;
                };
                states.push(next);
            }
            ParseAction::Error | ParseAction::Goto(_) | ParseAction::Ambig(_) => return false,
        }
    }
    false
}

/// Breadth-first search for the shortest sequence of at most `limit`
/// terminals that, inserted before `lookahead`, lets it be consumed.
///
/// # Returns
/// The inserted symbols and the structural states after the last insertion.
pub(crate) fn missing_tokens(
    table: &ParseTable,
    states: &[StateId],
    lookahead: Symbol,
    limit: usize,
) -> Option<(Vec<Symbol>, Vec<StateId>)> {
    let mut queue = VecDeque::from([(Vec::new(), states.to_vec())]);
    while let Some((sequence, states)) = queue.pop_front() {
        if sequence.len() == limit {
            continue;
        }
        let Some(&top) = states.last() else {
            continue;
        };
        for index in 1..table.terminal_count() {
            let symbol = Symbol(index as u16);
            if table.extras().contains(&symbol) || table.externals().contains(&symbol) {
                continue;
            }
            if table.action(top, symbol) == ParseAction::Error {
                continue;
            }
            let mut after = states.clone();
            if !simulate(table, &mut after, symbol) {
                continue;
            }
            let mut sequence = sequence.clone();
            sequence.push(symbol);
            let mut consumed = after.clone();
            if simulate(table, &mut consumed, lookahead) {
                return Some((sequence, after));
            }
            queue.push_back((sequence, after));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{GrammarDef, blank, choice, lit, seq, sym};
    use crate::language::Language;

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn parens() -> Language {
        let def = GrammarDef::new("parens").rule(
            "a",
            choice([seq([lit("("), sym("a"), lit(")")]), blank()]),
        );
        Language::load(&def).unwrap()
    }

    #[test]
    fn cost_ranking_prices() {
        let candidate = RecoveryCandidate {
            missing: 1,
            popped: 1,
            skipped: 2,
            skipped_bytes: 7,
            skipped_lines: 1,
        };
        assert_eq!(CostRanking.cost(&candidate), 110 + 300 + 7 + 30);
        assert_eq!(CostRanking.cost(&RecoveryCandidate::default()), 0);
    }

    #[test]
    fn simulation_reduces_before_shifting() {
        init_logger();
        let language = parens();
        let table = language.table();
        let open = table.symbol_for_name("(", false).unwrap();
        let close = table.symbol_for_name(")", false).unwrap();
        let mut states = vec![table.start_state()];
        assert!(simulate(table, &mut states, open));
        assert!(simulate(table, &mut states, close));
        assert!(simulate(table, &mut states, Symbol::END));
        let mut fresh = vec![table.start_state()];
        assert!(!simulate(table, &mut fresh, close));
    }

    #[test]
    fn missing_close_paren_is_found() {
        init_logger();
        let language = parens();
        let table = language.table();
        let open = table.symbol_for_name("(", false).unwrap();
        let close = table.symbol_for_name(")", false).unwrap();
        let mut states = vec![table.start_state()];
        assert!(simulate(table, &mut states, open));
        let (sequence, _) = missing_tokens(table, &states, Symbol::END, 2).unwrap();
        assert_eq!(sequence, vec![close]);
        assert!(missing_tokens(table, &states, Symbol::END, 0).is_none());
    }
}
