// LR(0) item machinery and FIRST/nullable sets over a normalized grammar.

use crate::grammar::Grammar;
use crate::symbol::Symbol;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

/// An LR(0) item: a production index and the dot position within its
/// right-hand side.
///
/// For `expr -> expr "+" expr` partially recognized as `expr -> expr • "+" expr`
/// the item stores the production index and `dot == 1`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub(crate) struct Item {
    pub prod: usize,
    pub dot: usize,
}

impl Item {
    /// The symbol right after the dot, if any.
    #[inline]
    pub fn next(&self, grammar: &Grammar) -> Option<Symbol> {
        grammar.productions[self.prod]
            .steps
            .get(self.dot)
            .map(|s| s.symbol)
    }

    #[inline]
    pub fn advance(&self) -> Item {
        Item {
            prod: self.prod,
            dot: self.dot + 1,
        }
    }
}

/// A set of LR(0) items.
pub(crate) type ItemSet = BTreeSet<Item>;

/// Production indices grouped by left-hand side symbol.
pub(crate) fn productions_by_lhs(grammar: &Grammar) -> Vec<Vec<usize>> {
    let mut by_lhs = vec![Vec::new(); grammar.symbols.len()];
    for (i, prod) in grammar.productions.iter().enumerate() {
        by_lhs[prod.lhs.index()].push(i);
    }
    by_lhs
}

/// Computes the LR(0) closure of a set of items.
///
/// # Parameters
/// - `items`: the kernel items.
/// - `grammar`: the normalized grammar.
/// - `by_lhs`: production indices per left-hand side, from [`productions_by_lhs`].
///
/// # Returns
/// The kernel items plus an item `B -> • γ` for every production of every
/// nonterminal `B` that appears right after a dot.
pub(crate) fn closure(items: &ItemSet, grammar: &Grammar, by_lhs: &[Vec<usize>]) -> ItemSet {
    let mut c = items.clone();
    let mut work: Vec<Item> = items.iter().copied().collect();
    while let Some(item) = work.pop() {
        if let Some(next) = item.next(grammar) {
            if !grammar.is_terminal(next) {
                for &prod in &by_lhs[next.index()] {
                    let new_item = Item { prod, dot: 0 };
                    if c.insert(new_item) {
                        work.push(new_item);
                    }
                }
            }
        }
    }
    c
}

/// The canonical LR(0) collection.
pub(crate) struct Automaton {
    /// Kernel items per state; state `0` holds `start' -> • start`.
    pub kernels: Vec<ItemSet>,
    /// Successor state per symbol, for every state.
    pub transitions: Vec<BTreeMap<Symbol, usize>>,
}

/// Builds the canonical collection breadth-first. Transitions are explored in
/// ascending symbol order, so state numbering depends only on the grammar.
pub(crate) fn construct_automaton(grammar: &Grammar, by_lhs: &[Vec<usize>]) -> Automaton {
    let start = ItemSet::from([Item { prod: 0, dot: 0 }]);
    let mut index: HashMap<ItemSet, usize> = HashMap::from([(start.clone(), 0)]);
    let mut kernels = vec![start];
    let mut transitions = Vec::new();
    let mut queue = VecDeque::from([0]);
    while let Some(state) = queue.pop_front() {
        let mut moved: BTreeMap<Symbol, ItemSet> = BTreeMap::new();
        for item in closure(&kernels[state], grammar, by_lhs) {
            if let Some(next) = item.next(grammar) {
                moved.entry(next).or_default().insert(item.advance());
            }
        }
        let mut edges = BTreeMap::new();
        for (symbol, kernel) in moved {
            let target = match index.get(&kernel) {
                Some(&target) => target,
                None => {
                    let target = kernels.len();
                    index.insert(kernel.clone(), target);
                    kernels.push(kernel);
                    queue.push_back(target);
                    target
                }
            };
            edges.insert(symbol, target);
        }
        if transitions.len() <= state {
            transitions.resize(state + 1, BTreeMap::new());
        }
        transitions[state] = edges;
    }
    transitions.resize(kernels.len(), BTreeMap::new());
    Automaton {
        kernels,
        transitions,
    }
}

/// Computes FIRST sets and nullability for every symbol.
///
/// # Returns
/// A tuple with the FIRST set of each symbol (terminals contain only
/// themselves) and a flag per symbol marking those that derive the empty
/// string.
pub(crate) fn first_sets(grammar: &Grammar) -> (Vec<BTreeSet<Symbol>>, Vec<bool>) {
    let n_sym = grammar.symbols.len();
    let mut first: Vec<BTreeSet<Symbol>> = vec![BTreeSet::new(); n_sym];
    let mut nullable = vec![false; n_sym];
    for t in 0..grammar.terminal_count {
        first[t].insert(Symbol(t as u16));
    }
    let mut changed = true;
    while changed {
        changed = false;
        for prod in &grammar.productions {
            let lhs = prod.lhs.index();
            let mut all_nullable = true;
            for step in &prod.steps {
                let sym = step.symbol.index();
                if sym != lhs {
                    let first_sym = first[sym].clone();
                    for f in first_sym {
                        if first[lhs].insert(f) {
                            changed = true;
                        }
                    }
                }
                if !nullable[sym] {
                    all_nullable = false;
                    break;
                }
            }
            if all_nullable && !nullable[lhs] {
                nullable[lhs] = true;
                changed = true;
            }
        }
    }
    (first, nullable)
}

/// FIRST set and nullability of a symbol sequence.
pub(crate) fn first_of(
    symbols: impl IntoIterator<Item = Symbol>,
    first: &[BTreeSet<Symbol>],
    nullable: &[bool],
) -> (BTreeSet<Symbol>, bool) {
    let mut out = BTreeSet::new();
    for symbol in symbols {
        out.extend(first[symbol.index()].iter().copied());
        if !nullable[symbol.index()] {
            return (out, false);
        }
    }
    (out, true)
}
