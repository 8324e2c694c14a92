// LALR(1) lookaheads by spontaneous generation and propagation.

use super::items::{Automaton, Item, first_of};
use crate::grammar::Grammar;
use crate::symbol::Symbol;
use std::collections::{BTreeMap, BTreeSet};

/// Lookahead of an LR(1) closure item: concrete terminals plus a flag telling
/// whether the lookahead of the originating kernel item flows into it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct Lookahead {
    pub set: BTreeSet<Symbol>,
    pub propagates: bool,
}

impl Lookahead {
    fn merge(&mut self, other: &Lookahead) -> bool {
        let before = self.set.len();
        self.set.extend(other.set.iter().copied());
        let flag = other.propagates && !self.propagates;
        self.propagates |= other.propagates;
        flag || self.set.len() != before
    }
}

/// Context shared by the closure computations of one compilation.
pub(crate) struct Sets<'a> {
    pub grammar: &'a Grammar,
    pub by_lhs: &'a [Vec<usize>],
    pub first: &'a [BTreeSet<Symbol>],
    pub nullable: &'a [bool],
}

impl Sets<'_> {
    /// LR(1) closure: `[A -> α • B β, L]` adds `[B -> • γ, FIRST(β L)]`.
    pub fn closure(&self, kernel: &[(Item, Lookahead)]) -> BTreeMap<Item, Lookahead> {
        let mut out: BTreeMap<Item, Lookahead> = BTreeMap::new();
        let mut work = Vec::new();
        for (item, la) in kernel {
            let fresh = !out.contains_key(item);
            if out.entry(*item).or_default().merge(la) || fresh {
                work.push(*item);
            }
        }
        while let Some(item) = work.pop() {
            let Some(next) = item.next(self.grammar) else {
                continue;
            };
            if self.grammar.is_terminal(next) {
                continue;
            }
            let steps = &self.grammar.productions[item.prod].steps;
            let rest = steps[item.dot + 1..].iter().map(|s| s.symbol);
            let (set, nullable) = first_of(rest, self.first, self.nullable);
            let mut derived = Lookahead {
                set,
                propagates: false,
            };
            if nullable {
                let parent = out[&item].clone();
                derived.set.extend(parent.set);
                derived.propagates = parent.propagates;
            }
            for &prod in &self.by_lhs[next.index()] {
                let new_item = Item { prod, dot: 0 };
                let fresh = !out.contains_key(&new_item);
                if out.entry(new_item).or_default().merge(&derived) || fresh {
                    work.push(new_item);
                }
            }
        }
        out
    }
}

/// Computes the lookahead set of every kernel item of every state.
///
/// # Returns
/// One map per state from kernel item to its LALR(1) lookahead terminals.
pub(crate) fn kernel_lookaheads(
    automaton: &Automaton,
    sets: &Sets<'_>,
) -> Vec<BTreeMap<Item, BTreeSet<Symbol>>> {
    let mut lookaheads: Vec<BTreeMap<Item, BTreeSet<Symbol>>> = automaton
        .kernels
        .iter()
        .map(|kernel| kernel.iter().map(|item| (*item, BTreeSet::new())).collect())
        .collect();
    if let Some(start) = lookaheads[0].get_mut(&Item { prod: 0, dot: 0 }) {
        start.insert(Symbol::END);
    }

    let mut edges: BTreeMap<(usize, Item), Vec<(usize, Item)>> = BTreeMap::new();
    for (state, kernel) in automaton.kernels.iter().enumerate() {
        for &kernel_item in kernel {
            let probe = Lookahead {
                set: BTreeSet::new(),
                propagates: true,
            };
            for (item, la) in sets.closure(&[(kernel_item, probe)]) {
                let Some(next) = item.next(sets.grammar) else {
                    continue;
                };
                let target = automaton.transitions[state][&next];
                let moved = item.advance();
                if let Some(entry) = lookaheads[target].get_mut(&moved) {
                    entry.extend(la.set.iter().copied());
                }
                if la.propagates {
                    edges
                        .entry((state, kernel_item))
                        .or_default()
                        .push((target, moved));
                }
            }
        }
    }

    let mut changed = true;
    let mut rounds = 0;
    while changed {
        changed = false;
        rounds += 1;
        for ((state, item), targets) in &edges {
            let source = lookaheads[*state][item].clone();
            for (target, moved) in targets {
                if let Some(entry) = lookaheads[*target].get_mut(moved) {
                    let before = entry.len();
                    entry.extend(source.iter().copied());
                    changed |= entry.len() != before;
                }
            }
        }
    }
    log::trace!("lookahead propagation converged after {rounds} rounds");
    lookaheads
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::items::{construct_automaton, first_sets, productions_by_lhs};
    use crate::grammar::{GrammarDef, choice, lit, pat, seq, sym};

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    // The classic grammar that is LALR(1) but not SLR(1):
    // S -> L = R | R ; L -> * R | id ; R -> L
    fn lalr_only() -> Grammar {
        let def = GrammarDef::new("lalr")
            .rule("s", choice([seq([sym("l"), lit("="), sym("r")]), sym("r")]))
            .rule("l", choice([seq([lit("*"), sym("r")]), sym("id")]))
            .rule("r", sym("l"))
            .rule("id", pat("[a-z]+"));
        Grammar::load(&def).unwrap()
    }

    #[test]
    fn reduce_lookaheads_are_not_follow_sets() {
        init_logger();
        let g = lalr_only();
        let by_lhs = productions_by_lhs(&g);
        let automaton = construct_automaton(&g, &by_lhs);
        let (first, nullable) = first_sets(&g);
        let sets = Sets {
            grammar: &g,
            by_lhs: &by_lhs,
            first: &first,
            nullable: &nullable,
        };
        let lookaheads = kernel_lookaheads(&automaton, &sets);
        let eq = Symbol(g.symbols.iter().position(|s| s.name.as_str() == "=").unwrap() as u16);
        // The state reached on `l` from the start holds `s -> l • = r` and
        // `r -> l •`; the reduction must only be valid at end of input.
        let l = Symbol(g.symbols.iter().position(|s| s.name.as_str() == "l").unwrap() as u16);
        let state = automaton.transitions[0][&l];
        let reduce = lookaheads[state]
            .iter()
            .find(|(item, _)| item.next(&g).is_none())
            .map(|(_, la)| la.clone())
            .unwrap();
        assert_eq!(reduce, BTreeSet::from([Symbol::END]));
        assert!(!reduce.contains(&eq));
    }
}
