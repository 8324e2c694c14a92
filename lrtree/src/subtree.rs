//! Immutable, reference-counted syntax tree nodes.
//!
//! A subtree stores its padding and size relative to its own start, never an
//! absolute offset. Unchanged subtrees are shared between tree versions by
//! cloning the `Arc`.

use crate::lexer::Lexed;
use crate::position::Length;
use crate::symbol::Symbol;
use crate::table::{LexModeId, ParseTable, ProductionId};
use std::sync::Arc;

pub const ERROR_COST_PER_MISSING_TREE: u32 = 110;
pub const ERROR_COST_PER_SKIPPED_TREE: u32 = 100;
pub const ERROR_COST_PER_SKIPPED_CHAR: u32 = 1;
pub const ERROR_COST_PER_SKIPPED_LINE: u32 = 30;
pub const ERROR_COST_PER_RECOVERY: u32 = 500;

pub(crate) type Subtree = Arc<SubtreeData>;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct Flags {
    pub visible: bool,
    pub named: bool,
    pub extra: bool,
    pub missing: bool,
    pub leaf: bool,
    /// The subtree is or contains an `ERROR` or `MISSING` node.
    pub has_error: bool,
    /// The subtree overlaps an edit.
    pub has_changes: bool,
    /// Built while several stack versions were alive, or by a reduction
    /// whose lookahead decided a conflict; never reused.
    pub fragile: bool,
}

#[derive(Clone, Debug)]
pub(crate) struct SubtreeData {
    pub symbol: Symbol,
    pub padding: Length,
    pub size: Length,
    pub lookahead_bytes: usize,
    pub lex_mode: LexModeId,
    pub children: Vec<Subtree>,
    pub production: Option<ProductionId>,
    /// Symbol and lex mode of the first leaf.
    pub first_leaf: (Symbol, LexModeId),
    pub flags: Flags,
    pub error_cost: u32,
    pub dynamic_precedence: i32,
}

impl SubtreeData {
    /// Padding plus size.
    #[inline]
    pub fn total(&self) -> Length {
        self.padding + self.size
    }

    /// Counts towards a production's right-hand side.
    #[inline]
    pub fn is_structural(&self) -> bool {
        !self.flags.extra && self.symbol != Symbol::ERROR
    }

    /// A token, as produced by the lexer.
    pub fn leaf(table: &ParseTable, lexed: &Lexed) -> Subtree {
        let meta = table.symbol_metadata(lexed.symbol);
        let is_error = lexed.symbol == Symbol::ERROR;
        let error_cost = if is_error {
            skipped_cost(lexed.size)
        } else {
            0
        };
        Arc::new(SubtreeData {
            symbol: lexed.symbol,
            padding: lexed.padding,
            size: lexed.size,
            lookahead_bytes: lexed.lookahead_bytes,
            lex_mode: lexed.mode,
            children: Vec::new(),
            production: None,
            first_leaf: (lexed.symbol, lexed.mode),
            flags: Flags {
                visible: meta.visible,
                named: meta.named,
                extra: meta.extra,
                leaf: true,
                has_error: is_error,
                ..Flags::default()
            },
            error_cost,
            dynamic_precedence: 0,
        })
    }

    /// A zero-width token inserted by error recovery.
    pub fn missing(table: &ParseTable, symbol: Symbol, mode: LexModeId) -> Subtree {
        let meta = table.symbol_metadata(symbol);
        Arc::new(SubtreeData {
            symbol,
            padding: Length::ZERO,
            size: Length::ZERO,
            lookahead_bytes: 1,
            lex_mode: mode,
            children: Vec::new(),
            production: None,
            first_leaf: (symbol, mode),
            flags: Flags {
                visible: meta.visible,
                named: meta.named,
                missing: true,
                leaf: true,
                has_error: true,
                ..Flags::default()
            },
            error_cost: ERROR_COST_PER_MISSING_TREE,
            dynamic_precedence: 0,
        })
    }

    /// An interior node over `children`.
    pub fn node(
        table: &ParseTable,
        symbol: Symbol,
        children: Vec<Subtree>,
        production: Option<ProductionId>,
        fragile: bool,
    ) -> Subtree {
        let meta = table.symbol_metadata(symbol);
        let dynamic = production.map_or(0, |p| table.production(p).dynamic_precedence)
            + children.iter().map(|c| c.dynamic_precedence).sum::<i32>();
        let mut node = SubtreeData {
            symbol,
            padding: Length::ZERO,
            size: Length::ZERO,
            lookahead_bytes: 0,
            lex_mode: LexModeId::ERROR,
            children,
            production,
            first_leaf: (symbol, LexModeId::ERROR),
            flags: Flags {
                visible: meta.visible,
                named: meta.named,
                has_error: symbol == Symbol::ERROR,
                fragile,
                ..Flags::default()
            },
            error_cost: 0,
            dynamic_precedence: dynamic,
        };
        node.summarize();
        Arc::new(node)
    }

    /// An `ERROR` node over skipped subtrees. Nested `ERROR` nodes are
    /// flattened into it.
    pub fn error(table: &ParseTable, children: Vec<Subtree>) -> Subtree {
        let mut flat = Vec::with_capacity(children.len());
        for child in children {
            if child.symbol == Symbol::ERROR && !child.flags.leaf {
                flat.extend(child.children.iter().cloned());
            } else {
                flat.push(child);
            }
        }
        SubtreeData::node(table, Symbol::ERROR, flat, None, true)
    }

    /// Recomputes padding, size, lookahead and error summaries from the
    /// children.
    pub fn summarize(&mut self) {
        let Some(first) = self.children.first() else {
            return;
        };
        self.padding = first.padding;
        self.first_leaf = first.first_leaf;
        self.lex_mode = first.lex_mode;
        let is_error = self.symbol == Symbol::ERROR;
        let mut offset = Length::ZERO;
        let mut lookahead_end = 0;
        let mut error_cost = if is_error { ERROR_COST_PER_RECOVERY } else { 0 };
        let mut has_error = is_error;
        for child in &self.children {
            offset = offset + child.total();
            lookahead_end = lookahead_end.max(offset.bytes + child.lookahead_bytes);
            error_cost = error_cost.saturating_add(child.error_cost);
            if is_error && !child.flags.extra {
                error_cost = error_cost.saturating_add(ERROR_COST_PER_SKIPPED_TREE);
                if !child.flags.leaf || child.symbol != Symbol::ERROR {
                    error_cost = error_cost.saturating_add(skipped_cost(child.size));
                }
            }
            has_error |= child.flags.has_error;
        }
        self.size = offset.saturating_sub(self.padding);
        self.lookahead_bytes = lookahead_end.saturating_sub(offset.bytes);
        self.error_cost = error_cost;
        self.flags.has_error = has_error;
    }
}

impl Drop for SubtreeData {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(child) = pending.pop() {
            if let Some(mut data) = Arc::into_inner(child) {
                pending.append(&mut data.children);
            }
        }
    }
}

fn skipped_cost(size: Length) -> u32 {
    let bytes = u32::try_from(size.bytes).unwrap_or(u32::MAX);
    let rows = u32::try_from(size.extent.row).unwrap_or(u32::MAX);
    ERROR_COST_PER_SKIPPED_CHAR
        .saturating_mul(bytes)
        .saturating_add(ERROR_COST_PER_SKIPPED_LINE.saturating_mul(rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::{CompileOptions, compile};
    use crate::grammar::{Grammar, GrammarDef, pat, repeat, sym};
    use crate::position::Point;

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn table() -> ParseTable {
        let def = GrammarDef::new("words")
            .rule("list", repeat(sym("word")))
            .rule("word", pat("[a-z]+"));
        compile(&Grammar::load(&def).unwrap(), &CompileOptions::default()).unwrap()
    }

    fn token(table: &ParseTable, padding: usize, size: usize) -> Subtree {
        let lexed = Lexed {
            symbol: table.symbol_for_name("word", true).unwrap(),
            padding: Length::new(padding, Point::new(0, padding)),
            size: Length::new(size, Point::new(0, size)),
            lookahead_bytes: 1,
            mode: LexModeId(1),
        };
        SubtreeData::leaf(table, &lexed)
    }

    #[test]
    fn node_padding_is_its_first_childs() {
        init_logger();
        let t = table();
        let list = t.symbol_for_name("list", true).unwrap();
        let node = SubtreeData::node(&t, list, vec![token(&t, 2, 3), token(&t, 1, 4)], None, false);
        assert_eq!(node.padding.bytes, 2);
        assert_eq!(node.size.bytes, 8);
        assert_eq!(node.total().bytes, 10);
        assert_eq!(node.lookahead_bytes, 1);
        assert_eq!(node.first_leaf, (Symbol(1), LexModeId(1)));
        assert!(!node.flags.has_error);
    }

    #[test]
    fn error_nodes_flatten_and_cost() {
        init_logger();
        let t = table();
        let inner = SubtreeData::error(&t, vec![token(&t, 0, 2)]);
        let outer = SubtreeData::error(&t, vec![inner, token(&t, 1, 1)]);
        assert_eq!(outer.children.len(), 2);
        assert!(outer.flags.has_error);
        assert_eq!(
            outer.error_cost,
            ERROR_COST_PER_RECOVERY + 2 * ERROR_COST_PER_SKIPPED_TREE + 3
        );
        let missing = SubtreeData::missing(&t, Symbol(1), LexModeId(1));
        assert_eq!(missing.total(), Length::ZERO);
        assert_eq!(missing.error_cost, ERROR_COST_PER_MISSING_TREE);
    }

    #[test]
    fn skipped_cost_saturates_on_huge_spans() {
        init_logger();
        assert_eq!(skipped_cost(Length::new(3, Point::new(1, 0))), 3 + ERROR_COST_PER_SKIPPED_LINE);
        assert_eq!(skipped_cost(Length::new(10, Point::new(200_000_000, 0))), u32::MAX);
        assert_eq!(skipped_cost(Length::new(usize::MAX, Point::new(0, usize::MAX))), u32::MAX);
    }
}
