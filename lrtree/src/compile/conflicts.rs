// Deterministic resolution of colliding table entries.

use super::ConflictPolicy;
use super::items::{Item, ItemSet};
use crate::error::{Conflict, ConflictKind, GrammarError};
use crate::grammar::{Associativity, Grammar};
use crate::symbol::Symbol;
use crate::table::{ParseAction, ProductionId, ResolutionReason, StateId};
use std::collections::BTreeSet;

type Precedence = Option<(i32, Option<Associativity>)>;

/// Everything that could happen on one lookahead in one state.
#[derive(Debug, Default)]
pub(super) struct Candidates {
    pub shift: Option<usize>,
    /// Precedence of every item that shifts the lookahead.
    pub shift_precedence: Vec<Precedence>,
    pub reduces: BTreeSet<usize>,
}

pub(super) struct Outcome {
    /// No action: error entry. More than one: kept for the GLR engine.
    pub kept: Vec<ParseAction>,
    pub discarded: Vec<ParseAction>,
    /// `None` when there was nothing to resolve.
    pub reason: Option<ResolutionReason>,
}

pub(super) struct Resolver<'a> {
    pub grammar: &'a Grammar,
    pub policy: ConflictPolicy,
}

fn reduce_action(prod: usize) -> ParseAction {
    if prod == 0 {
        ParseAction::Accept
    } else {
        ParseAction::Reduce(ProductionId(prod as u32))
    }
}

impl Resolver<'_> {
    /// Precedence of a reduction: the last step's, else the production's,
    /// else that of the rightmost terminal with a token precedence.
    fn reduce_precedence(&self, prod: usize) -> Precedence {
        let p = &self.grammar.productions[prod];
        if let Some(step) = p.steps.last() {
            if let Some(value) = step.precedence {
                return Some((value, step.associativity));
            }
        }
        if let Some(value) = p.precedence {
            return Some((value, p.associativity));
        }
        p.steps
            .iter()
            .rev()
            .find_map(|s| self.grammar.token_precedence.get(&s.symbol).copied())
    }

    pub fn resolve(
        &self,
        state: usize,
        kernel: &ItemSet,
        lookahead: Symbol,
        cand: &Candidates,
    ) -> Result<Outcome, GrammarError> {
        let shift = cand.shift.map(|s| ParseAction::Shift(StateId(s as u32)));
        let all: Vec<ParseAction> = shift
            .into_iter()
            .chain(cand.reduces.iter().map(|&p| reduce_action(p)))
            .collect();
        if all.len() <= 1 {
            return Ok(Outcome {
                kept: all,
                discarded: Vec::new(),
                reason: None,
            });
        }

        let mut reason = None;
        let mut reduces: Vec<usize> = cand.reduces.iter().copied().collect();
        if reduces.len() > 1 {
            let values: Vec<_> = reduces.iter().map(|&p| self.reduce_precedence(p)).collect();
            if values.iter().any(Option::is_some) {
                let value = |p: &Precedence| p.map_or(0, |(v, _)| v);
                let best = values.iter().map(value).max().unwrap_or(0);
                let kept: Vec<usize> = reduces
                    .iter()
                    .zip(&values)
                    .filter(|(_, p)| value(p) == best)
                    .map(|(&r, _)| r)
                    .collect();
                if kept.len() < reduces.len() {
                    reduces = kept;
                    reason = Some(ResolutionReason::Precedence);
                }
            }
        }

        let mut keep_shift = shift.is_some();
        let mut nonassoc = false;
        if keep_shift && !reduces.is_empty() {
            let annotated: Vec<(i32, Option<Associativity>)> =
                cand.shift_precedence.iter().flatten().copied().collect();
            let shift_annotated = !annotated.is_empty();
            let min = annotated.iter().map(|(v, _)| *v).min().unwrap_or(0);
            let max = annotated.iter().map(|(v, _)| *v).max().unwrap_or(0);
            let shift_assoc = annotated.iter().find_map(|(_, a)| *a);
            let mut remaining = Vec::new();
            for r in reduces {
                let rp = self.reduce_precedence(r);
                if rp.is_none() && !shift_annotated {
                    remaining.push(r);
                    continue;
                }
                let (value, assoc) = rp.unwrap_or((0, None));
                if value > max {
                    keep_shift = false;
                    remaining.push(r);
                    reason = Some(ResolutionReason::Precedence);
                } else if value < min {
                    reason = Some(ResolutionReason::Precedence);
                } else if value == min && value == max {
                    match assoc.or(shift_assoc) {
                        Some(Associativity::Left) => {
                            keep_shift = false;
                            remaining.push(r);
                            reason = Some(ResolutionReason::Associativity);
                        }
                        Some(Associativity::Right) => {
                            reason = Some(ResolutionReason::Associativity);
                        }
                        Some(Associativity::NonAssoc) => {
                            keep_shift = false;
                            nonassoc = true;
                            reason = Some(ResolutionReason::NonAssociative);
                        }
                        None => remaining.push(r),
                    }
                } else {
                    remaining.push(r);
                }
            }
            reduces = remaining;
        }

        let kept: Vec<ParseAction> = shift
            .filter(|_| keep_shift)
            .into_iter()
            .chain(reduces.iter().map(|&p| reduce_action(p)))
            .collect();
        if kept.len() <= 1 {
            debug_assert!(reason.is_some() || nonassoc);
            return Ok(self.outcome(&all, kept, reason));
        }

        let involved: BTreeSet<Symbol> = kernel
            .iter()
            .map(|item| self.grammar.productions[item.prod].lhs)
            .chain(reduces.iter().map(|&p| self.grammar.productions[p].lhs))
            .map(|lhs| self.grammar.origin(lhs))
            .collect();
        if self
            .grammar
            .conflicts
            .iter()
            .any(|set| involved.is_subset(set))
        {
            return Ok(self.outcome(&all, kept, Some(ResolutionReason::DeclaredConflict)));
        }

        match self.policy {
            ConflictPolicy::Strict => Err(GrammarError::AmbiguousGrammar(Box::new(
                self.describe(state, kernel, lookahead, &kept),
            ))),
            ConflictPolicy::PreferShift => {
                let first = kept[..1].to_vec();
                Ok(self.outcome(&all, first, Some(ResolutionReason::Policy)))
            }
        }
    }

    fn outcome(
        &self,
        all: &[ParseAction],
        kept: Vec<ParseAction>,
        reason: Option<ResolutionReason>,
    ) -> Outcome {
        let discarded = all.iter().filter(|a| !kept.contains(a)).copied().collect();
        Outcome {
            kept,
            discarded,
            reason,
        }
    }

    fn describe(
        &self,
        state: usize,
        kernel: &ItemSet,
        lookahead: Symbol,
        actions: &[ParseAction],
    ) -> Conflict {
        let kind = if actions.iter().any(|a| matches!(a, ParseAction::Shift(_))) {
            ConflictKind::ShiftReduce
        } else {
            ConflictKind::ReduceReduce
        };
        Conflict {
            state,
            lookahead: self.grammar.display_symbol(lookahead),
            kind,
            actions: actions
                .iter()
                .map(|action| match action {
                    ParseAction::Reduce(p) => {
                        format!("reduce {}", self.grammar.production_display(p.0 as usize))
                    }
                    other => other.to_string(),
                })
                .collect(),
            items: kernel.iter().map(|item| item_display(self.grammar, item)).collect(),
        }
    }
}

/// An item in dotted notation.
pub(super) fn item_display(grammar: &Grammar, item: &Item) -> String {
    let prod = &grammar.productions[item.prod];
    let mut out = format!("{} ->", grammar.symbol_name(prod.lhs));
    for (i, step) in prod.steps.iter().enumerate() {
        if i == item.dot {
            out.push_str(" •");
        }
        out.push(' ');
        out.push_str(&grammar.display_symbol(step.symbol));
    }
    if item.dot == prod.steps.len() {
        out.push_str(" •");
    }
    out
}
