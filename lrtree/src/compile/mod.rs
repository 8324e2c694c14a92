//! The table compiler: grammar in, [`ParseTable`] out.
//!
//! The canonical LR(0) collection is built breadth-first, LALR(1) lookaheads
//! are attached by spontaneous generation and propagation, and every
//! colliding entry is settled by precedence, associativity, a declared
//! conflict set or the [`ConflictPolicy`]. Each decision is recorded in the
//! table. The output depends only on the grammar: compiling the same grammar
//! twice gives byte-identical [`ParseTable::to_bytes`] output.

mod conflicts;
pub(crate) mod items;
mod lookahead;

use crate::error::GrammarError;
use crate::grammar::Grammar;
use crate::symbol::Symbol;
use crate::table::{
    AmbigId, ConflictResolution, LexModeId, LexicalSpec, ParseAction, ParseTable, ProductionId,
    ProductionInfo, StateId,
};
use conflicts::{Candidates, Resolver};
use indexmap::IndexMap;
use items::{construct_automaton, first_sets, productions_by_lhs};
use lookahead::{Lookahead, Sets, kernel_lookaheads};
use std::collections::{BTreeMap, BTreeSet};

/// What to do with a conflict that neither precedence nor a declared
/// conflict set resolves.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ConflictPolicy {
    /// Fail with [`GrammarError::AmbiguousGrammar`].
    #[default]
    Strict,
    /// Keep the shift, or the earliest production when only reductions collide.
    PreferShift,
}

/// Options for [`compile`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CompileOptions {
    pub conflict_policy: ConflictPolicy,
}

impl CompileOptions {
    pub fn conflict_policy(mut self, policy: ConflictPolicy) -> Self {
        self.conflict_policy = policy;
        self
    }
}

/// Compiles a loaded grammar into a parse table.
pub fn compile(grammar: &Grammar, options: &CompileOptions) -> Result<ParseTable, GrammarError> {
    let by_lhs = productions_by_lhs(grammar);
    let automaton = construct_automaton(grammar, &by_lhs);
    let (first, nullable) = first_sets(grammar);
    let sets = Sets {
        grammar,
        by_lhs: &by_lhs,
        first: &first,
        nullable: &nullable,
    };
    let lookaheads = kernel_lookaheads(&automaton, &sets);
    let resolver = Resolver {
        grammar,
        policy: options.conflict_policy,
    };

    let n_sym = grammar.symbols.len();
    let n_states = automaton.kernels.len();
    let mut actions = vec![ParseAction::Error; n_states * n_sym];
    let mut ambigs: Vec<Vec<ParseAction>> = Vec::new();
    let mut fragile = BTreeSet::new();
    let mut breakdown = BTreeMap::new();
    let mut resolutions = Vec::new();

    for state in 0..n_states {
        let kernel: Vec<_> = lookaheads[state]
            .iter()
            .map(|(item, set)| {
                let la = Lookahead {
                    set: set.clone(),
                    propagates: false,
                };
                (*item, la)
            })
            .collect();
        let mut candidates: BTreeMap<Symbol, Candidates> = BTreeMap::new();
        for (&symbol, &target) in &automaton.transitions[state] {
            if grammar.is_terminal(symbol) {
                candidates.entry(symbol).or_default().shift = Some(target);
            } else {
                actions[state * n_sym + symbol.index()] = ParseAction::Goto(StateId(target as u32));
            }
        }
        for (item, la) in sets.closure(&kernel) {
            match item.next(grammar) {
                Some(next) if grammar.is_terminal(next) => {
                    let step = &grammar.productions[item.prod].steps[item.dot];
                    let precedence = step
                        .precedence
                        .map(|value| (value, step.associativity))
                        .or_else(|| grammar.token_precedence.get(&next).copied());
                    candidates
                        .entry(next)
                        .or_default()
                        .shift_precedence
                        .push(precedence);
                }
                Some(_) => {}
                None => {
                    for &t in &la.set {
                        candidates.entry(t).or_default().reduces.insert(item.prod);
                    }
                }
            }
        }

        for (lookahead, cand) in candidates {
            let outcome = resolver.resolve(state, &automaton.kernels[state], lookahead, &cand)?;
            let entry = match outcome.kept.as_slice() {
                [] => ParseAction::Error,
                [single] => *single,
                many => {
                    ambigs.push(many.to_vec());
                    ParseAction::Ambig(AmbigId(ambigs.len() as u32 - 1))
                }
            };
            actions[state * n_sym + lookahead.index()] = entry;
            let Some(reason) = outcome.reason else {
                continue;
            };
            let state_id = StateId(state as u32);
            for &prod in &cand.reduces {
                fragile.insert((state_id, ProductionId(prod as u32)));
            }
            if let Some(target) = cand.shift {
                if !matches!(entry, ParseAction::Shift(_) | ParseAction::Ambig(_)) {
                    breakdown.insert((state_id, lookahead), StateId(target as u32));
                }
            }
            log::trace!(
                "state {state} on {}: kept {entry}, discarded {:?} ({reason:?})",
                grammar.display_symbol(lookahead),
                outcome.discarded
            );
            resolutions.push(ConflictResolution {
                state: state_id,
                lookahead,
                kept: entry,
                discarded: outcome.discarded,
                reason,
            });
        }
    }

    let (lex_modes, state_lex_modes) = lex_modes(grammar, &actions, n_states);

    let table = ParseTable {
        name: grammar.name.clone(),
        symbols: grammar.symbols.clone(),
        terminal_count: grammar.terminal_count,
        start_symbol: grammar.start,
        fields: grammar.fields.clone(),
        productions: grammar
            .productions
            .iter()
            .map(|p| ProductionInfo {
                lhs: p.lhs,
                rhs: p.steps.iter().map(|s| s.symbol).collect(),
                fields: p.steps.iter().map(|s| s.field).collect(),
                dynamic_precedence: p.dynamic_precedence,
            })
            .collect(),
        state_count: n_states,
        actions,
        ambigs,
        fragile,
        breakdown,
        lex_modes,
        state_lex_modes,
        lexical: LexicalSpec {
            tokens: grammar.tokens.clone(),
            skips: grammar.skips.clone(),
            word: grammar.word,
            keywords: grammar.keywords.clone(),
        },
        extras: grammar.extras.clone(),
        externals: grammar.externals.clone(),
        resolutions,
        kernels: automaton
            .kernels
            .iter()
            .map(|kernel| {
                kernel
                    .iter()
                    .map(|item| (ProductionId(item.prod as u32), item.dot as u16))
                    .collect()
            })
            .collect(),
        start_state: StateId(0),
    };
    log::debug!(
        "compiled {}: {} states, {} lex modes, {} resolved conflicts, {} ambiguous entries",
        table.name,
        table.state_count,
        table.lex_modes.len(),
        table.resolutions.len(),
        table.ambigs.len()
    );
    Ok(table)
}

/// Assigns each state the set of terminals it accepts. Mode `0` is the error
/// mode with every terminal; the other modes are numbered by first use.
fn lex_modes(
    grammar: &Grammar,
    actions: &[ParseAction],
    n_states: usize,
) -> (Vec<Vec<Symbol>>, Vec<LexModeId>) {
    let n_sym = grammar.symbols.len();
    let all: Vec<Symbol> = (0..grammar.terminal_count)
        .map(|t| Symbol(t as u16))
        .collect();
    let mut modes: IndexMap<Vec<Symbol>, LexModeId> = IndexMap::new();
    modes.insert(all.clone(), LexModeId::ERROR);
    let mut state_modes = Vec::with_capacity(n_states);
    for state in 0..n_states {
        let valid: Vec<Symbol> = all
            .iter()
            .copied()
            .filter(|t| {
                actions[state * n_sym + t.index()] != ParseAction::Error
                    || grammar.extras.contains(t)
            })
            .collect();
        let next = LexModeId(modes.len() as u16);
        state_modes.push(*modes.entry(valid).or_insert(next));
    }
    (modes.into_keys().collect(), state_modes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConflictKind;
    use crate::grammar::{
        Associativity, GrammarDef, choice, lit, optional, pat, prec_left, repeat, seq, sym,
    };
    use crate::table::ResolutionReason;

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn load(def: &GrammarDef) -> Grammar {
        Grammar::load(def).unwrap()
    }

    fn arith() -> GrammarDef {
        GrammarDef::new("arith")
            .rule(
                "expr",
                choice([
                    sym("number"),
                    prec_left(1, seq([sym("expr"), lit("+"), sym("expr")])),
                    prec_left(2, seq([sym("expr"), lit("*"), sym("expr")])),
                    seq([lit("("), sym("expr"), lit(")")]),
                ]),
            )
            .rule("number", pat("[0-9]+"))
    }

    fn ambiguous() -> GrammarDef {
        GrammarDef::new("ambiguous")
            .rule(
                "expr",
                choice([sym("number"), seq([sym("expr"), lit("+"), sym("expr")])]),
            )
            .rule("number", pat("[0-9]+"))
    }

    #[test]
    fn compilation_is_deterministic() {
        init_logger();
        let g = load(&arith());
        let a = compile(&g, &CompileOptions::default()).unwrap();
        let b = compile(&load(&arith()), &CompileOptions::default()).unwrap();
        assert_eq!(a.to_bytes(), b.to_bytes());
    }

    #[test]
    fn unannotated_conflict_is_ambiguous() {
        init_logger();
        let g = load(&ambiguous());
        match compile(&g, &CompileOptions::default()) {
            Err(GrammarError::AmbiguousGrammar(conflict)) => {
                assert_eq!(conflict.kind, ConflictKind::ShiftReduce);
                assert_eq!(conflict.lookahead, "\"+\"");
                assert_eq!(conflict.actions.len(), 2);
                assert!(conflict.actions[1].starts_with("reduce expr -> expr \"+\" expr"));
                assert!(conflict.items.iter().any(|i| i.ends_with("expr \"+\" expr •")));
            }
            other => panic!("expected a conflict, got {other:?}"),
        }
    }

    #[test]
    fn prefer_shift_policy_records_its_choice() {
        init_logger();
        let g = load(&ambiguous());
        let options = CompileOptions::default().conflict_policy(ConflictPolicy::PreferShift);
        let table = compile(&g, &options).unwrap();
        let res = &table.resolutions()[0];
        assert_eq!(res.reason, ResolutionReason::Policy);
        assert!(matches!(res.kept, ParseAction::Shift(_)));
        assert!(matches!(res.discarded[..], [ParseAction::Reduce(_)]));
    }

    #[test]
    fn precedence_and_associativity_resolve_conflicts() {
        init_logger();
        let g = load(&arith());
        let table = compile(&g, &CompileOptions::default()).unwrap();
        let plus = table.symbol_for_name("+", false).unwrap();
        let times = table.symbol_for_name("*", false).unwrap();
        let reasons: Vec<_> = table
            .resolutions()
            .iter()
            .map(|r| (r.lookahead, r.kept, r.reason))
            .collect();
        // `e + e` followed by `+` reduces (left associative).
        assert!(reasons.iter().any(|(la, kept, reason)| *la == plus
            && matches!(kept, ParseAction::Reduce(_))
            && *reason == ResolutionReason::Associativity));
        // `e + e` followed by `*` shifts (higher precedence).
        assert!(reasons.iter().any(|(la, kept, reason)| *la == times
            && matches!(kept, ParseAction::Shift(_))
            && *reason == ResolutionReason::Precedence));
        for r in table.resolutions() {
            if let ParseAction::Reduce(prod) = r.kept {
                assert!(table.is_fragile(r.state, prod));
            }
            if let ParseAction::Reduce(_) = r.kept {
                assert!(table.next_state(r.state, r.lookahead).is_some());
            }
        }
    }

    #[test]
    fn nonassociative_operators_become_errors() {
        init_logger();
        let def = GrammarDef::new("cmp")
            .rule(
                "expr",
                choice([sym("number"), seq([sym("expr"), lit("<"), sym("expr")])]),
            )
            .rule("number", pat("[0-9]+"))
            .precedence(1, Some(Associativity::NonAssoc), [lit("<")]);
        let table = compile(&load(&def), &CompileOptions::default()).unwrap();
        let res = &table.resolutions()[0];
        assert_eq!(res.reason, ResolutionReason::NonAssociative);
        assert_eq!(res.kept, ParseAction::Error);
        assert_eq!(table.action(res.state, res.lookahead), ParseAction::Error);
    }

    #[test]
    fn declared_conflicts_keep_every_action() {
        init_logger();
        let def = GrammarDef::new("glr")
            .rule("program", repeat(sym("stmt")))
            .rule(
                "stmt",
                choice([seq([lit("return"), optional(sym("value"))]), sym("value")]),
            )
            .rule("value", pat("[a-z]+"))
            .conflict(["stmt"]);
        let table = compile(&load(&def), &CompileOptions::default()).unwrap();
        let value = table.symbol_for_name("value", true).unwrap();
        let res = table
            .resolutions()
            .iter()
            .find(|r| r.lookahead == value)
            .unwrap();
        assert_eq!(res.reason, ResolutionReason::DeclaredConflict);
        let ParseAction::Ambig(ambig) = res.kept else {
            panic!("expected an ambiguous entry, got {}", res.kept);
        };
        let kept = table.ambig(ambig);
        assert!(matches!(kept[0], ParseAction::Shift(_)));
        assert!(matches!(kept[1], ParseAction::Reduce(_)));
        assert!(res.discarded.is_empty());
    }

    #[test]
    fn undeclared_conflict_in_the_same_grammar_fails() {
        init_logger();
        let def = GrammarDef::new("glr")
            .rule("program", repeat(sym("stmt")))
            .rule(
                "stmt",
                choice([seq([lit("return"), optional(sym("value"))]), sym("value")]),
            )
            .rule("value", pat("[a-z]+"));
        assert!(matches!(
            compile(&load(&def), &CompileOptions::default()),
            Err(GrammarError::AmbiguousGrammar(_))
        ));
    }

    #[test]
    fn lex_modes_hold_valid_terminals() {
        init_logger();
        let table = compile(&load(&arith()), &CompileOptions::default()).unwrap();
        let all = table.valid_symbols(LexModeId::ERROR);
        assert_eq!(all.len(), table.terminal_count());
        let start = table.valid_symbols(table.lex_mode(table.start_state()));
        let names: Vec<_> = start.iter().map(|s| table.symbol_name(*s)).collect();
        assert_eq!(names, ["number", "("]);
    }
}
