//! Walking an edited tree for subtrees that can be reused verbatim.

use crate::subtree::Subtree;
use crate::symbol::Symbol;
use crate::table::{ParseAction, ParseTable, StateId};

struct Entry {
    tree: Subtree,
    /// Index in the parent's children.
    child_index: usize,
    /// Absolute byte offset where the tree's padding begins.
    offset: usize,
}

/// A cursor over an old tree that only moves forward.
pub(crate) struct ReuseCursor {
    stack: Vec<Entry>,
}

impl ReuseCursor {
    pub fn new(root: Subtree) -> Self {
        Self {
            stack: vec![Entry {
                tree: root,
                child_index: 0,
                offset: 0,
            }],
        }
    }

    /// Moves past the current tree.
    pub fn advance(&mut self) {
        let Some(entry) = self.stack.pop() else {
            return;
        };
        let offset = entry.offset + entry.tree.total().bytes;
        let mut index = entry.child_index;
        while let Some(parent) = self.stack.last() {
            if let Some(next) = parent.tree.children.get(index + 1) {
                let tree = next.clone();
                self.stack.push(Entry {
                    tree,
                    child_index: index + 1,
                    offset,
                });
                return;
            }
            index = parent.child_index;
            self.stack.pop();
        }
    }

    /// Moves to the first child of the current tree.
    pub fn descend(&mut self) -> bool {
        let Some(entry) = self.stack.last() else {
            return false;
        };
        let Some(first) = entry.tree.children.first() else {
            return false;
        };
        let next = Entry {
            tree: first.clone(),
            child_index: 0,
            offset: entry.offset,
        };
        self.stack.push(next);
        true
    }

    /// Finds the largest old subtree that starts at `position` and can be
    /// pushed in `state`. The cursor stays on it until a later position is
    /// requested, so the caller may still [`descend`](Self::descend) into it.
    pub fn take(&mut self, position: usize, state: StateId, table: &ParseTable) -> Option<Subtree> {
        loop {
            let entry = self.stack.last()?;
            let offset = entry.offset;
            if offset > position {
                return None;
            }
            if offset < position {
                let end = offset + entry.tree.total().bytes;
                if end <= position || !self.descend() {
                    self.advance();
                }
                continue;
            }
            match rejection(&entry.tree, state, table) {
                None => return Some(entry.tree.clone()),
                Some(reason) => {
                    log::trace!(
                        "cannot reuse {} at {}: {}",
                        table.symbol_name(entry.tree.symbol),
                        position,
                        reason
                    );
                    if !self.descend() {
                        self.advance();
                    }
                }
            }
        }
    }
}

fn rejection(tree: &Subtree, state: StateId, table: &ParseTable) -> Option<&'static str> {
    if tree.flags.has_changes {
        return Some("changed");
    }
    if tree.flags.has_error || tree.symbol == Symbol::ERROR {
        return Some("contains an error");
    }
    if tree.flags.fragile {
        return Some("fragile");
    }
    if tree.size.bytes == 0 {
        return Some("empty");
    }
    let (leaf, mode) = tree.first_leaf;
    if mode != table.lex_mode(state) {
        return Some("lexed in another mode");
    }
    let extra = table.symbol_metadata(leaf).extra;
    if !extra && table.action(state, leaf) == ParseAction::Error {
        return Some("first leaf has no action");
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{GrammarDef, lit, pat, repeat, seq, sym};
    use crate::language::Language;
    use crate::parser::Parser;

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[test]
    fn unchanged_tree_is_taken_whole() {
        init_logger();
        let def = GrammarDef::new("items")
            .rule("list", repeat(sym("item")))
            .rule("item", seq([sym("name"), lit(";")]))
            .rule("name", pat("[a-z]+"));
        let language = Language::load(&def).unwrap();
        let tree = Parser::new(&language).parse("ab; cd;", None);
        let table = language.table();
        let mut cursor = ReuseCursor::new(tree.root_subtree().clone());
        let whole = cursor.take(0, table.start_state(), table).unwrap();
        assert!(std::sync::Arc::ptr_eq(&whole, tree.root_subtree()));
        assert!(cursor.descend());
        let first = cursor.take(0, table.start_state(), table).unwrap();
        assert!(!std::sync::Arc::ptr_eq(&first, tree.root_subtree()));
        assert_eq!(first.total().bytes, 7);
        assert!(cursor.take(7, table.start_state(), table).is_none());
    }

    #[test]
    fn changed_trees_are_descended() {
        init_logger();
        let def = GrammarDef::new("items")
            .rule("list", repeat(sym("item")))
            .rule("item", seq([sym("name"), lit(";")]))
            .rule("name", pat("[a-z]+"));
        let language = Language::load(&def).unwrap();
        let text = "ab; cd; ef;";
        let tree = Parser::new(&language).parse(text, None);
        let edited = tree.edit(&crate::edit::InputEdit::replace(text.as_bytes(), 9..9, b"g"));
        let table = language.table();
        let mut cursor = ReuseCursor::new(edited.root_subtree().clone());
        let first = cursor.take(0, table.start_state(), table).unwrap();
        assert_eq!(first.total().bytes, 7);
        assert!(!first.flags.has_changes);
    }
}
