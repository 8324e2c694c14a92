//! Translating text edits into an existing tree.
//!
//! Editing never mutates a tree. Subtrees on the path of an edit are copied
//! with adjusted padding and size and flagged `has_changes`; every other
//! subtree is shared with the original tree.

use crate::position::{Length, Point};
use crate::subtree::{Subtree, SubtreeData};
use crate::tree::Tree;
use std::sync::Arc;

/// A single replacement of `start_byte..old_end_byte` by text ending at
/// `new_end_byte`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct InputEdit {
    pub start_byte: usize,
    pub old_end_byte: usize,
    pub new_end_byte: usize,
    pub start_position: Point,
    pub old_end_position: Point,
    pub new_end_position: Point,
}

impl InputEdit {
    /// The edit that replaces `range` of `old_text` with `new_text`.
    ///
    /// # Parameters
    /// - `old_text`: The text before the edit.
    /// - `range`: Byte range of `old_text` being replaced.
    /// - `new_text`: The replacement.
    ///
    /// # Returns
    /// An edit with byte offsets and row/column points filled in.
    pub fn replace(old_text: &[u8], range: std::ops::Range<usize>, new_text: &[u8]) -> InputEdit {
        let start = Length::of(&old_text[..range.start]);
        let old_end = start + Length::of(&old_text[range.start..range.end]);
        let new_end = start + Length::of(new_text);
        InputEdit {
            start_byte: start.bytes,
            old_end_byte: old_end.bytes,
            new_end_byte: new_end.bytes,
            start_position: start.extent,
            old_end_position: old_end.extent,
            new_end_position: new_end.extent,
        }
    }

    fn start(&self) -> Length {
        Length::new(self.start_byte, self.start_position)
    }

    fn old_end(&self) -> Length {
        Length::new(self.old_end_byte, self.old_end_position)
    }

    fn new_end(&self) -> Length {
        Length::new(self.new_end_byte, self.new_end_position)
    }
}

/// An edit in the coordinates of one subtree (relative to where its padding
/// begins).
#[derive(Clone, Copy, Debug)]
struct RelativeEdit {
    start: Length,
    old_end: Length,
    new_end: Length,
}

impl Tree {
    /// Returns a copy of the tree with `edit` applied to its positions.
    ///
    /// The result is meant to be passed to `Parser::parse` as the old tree.
    pub fn edit(&self, edit: &InputEdit) -> Tree {
        let root = self.root_subtree();
        let old_total = root.total();
        let relative = RelativeEdit {
            start: edit.start(),
            old_end: edit.old_end(),
            new_end: edit.new_end(),
        };
        let mut edited = edit_subtree(root, relative);
        let data = Arc::make_mut(&mut edited);
        data.padding = Length::ZERO;
        data.size = edit.new_end() + old_total.saturating_sub(edit.old_end());
        log::trace!(
            "edit {}..{} -> {}..{}: root {} -> {} bytes",
            edit.start_byte,
            edit.old_end_byte,
            edit.start_byte,
            edit.new_end_byte,
            old_total.bytes,
            data.size.bytes
        );
        Tree::new(edited, self.language().clone(), self.status())
    }
}

/// A subtree being copied, with the children the edit still has to descend
/// into.
struct EditFrame {
    data: SubtreeData,
    pending: std::vec::IntoIter<(usize, RelativeEdit)>,
    active: usize,
}

impl EditFrame {
    fn new(subtree: &Subtree, edit: RelativeEdit) -> Self {
        let mut data = (**subtree).clone();
        let padding = data.padding;
        let total = data.total();
        let pure_insertion = edit.start.bytes == edit.old_end.bytes;

        if edit.old_end.bytes <= padding.bytes {
            data.padding = edit.new_end + (padding - edit.old_end);
        } else if edit.start.bytes < padding.bytes {
            data.size = data.size.saturating_sub(edit.old_end - padding);
            data.padding = edit.new_end;
        } else if edit.start.bytes < total.bytes
            || (edit.start.bytes == total.bytes && pure_insertion)
        {
            data.size = (edit.new_end - padding) + total.saturating_sub(edit.old_end);
        }
        data.flags.has_changes = true;

        let mut edit = edit;
        let mut pending = Vec::new();
        let mut left = Length::ZERO;
        for (i, child) in data.children.iter().enumerate() {
            let right = left + child.total();
            if right.bytes + child.lookahead_bytes < edit.start.bytes {
                left = right;
                continue;
            }
            if left.bytes > edit.old_end.bytes
                || (left.bytes == edit.old_end.bytes && child.size.bytes > 0 && i > 0)
            {
                break;
            }
            pending.push((
                i,
                RelativeEdit {
                    start: edit.start.saturating_sub(left),
                    old_end: edit.old_end.saturating_sub(left),
                    new_end: edit.new_end.saturating_sub(left),
                },
            ));
            // Inserted text belongs to the first child touching the edit;
            // later children only shrink.
            if right.bytes > edit.start.bytes || (right.bytes == edit.start.bytes && pure_insertion)
            {
                edit.new_end = edit.start;
            }
            left = right;
        }
        EditFrame {
            data,
            pending: pending.into_iter(),
            active: 0,
        }
    }
}

/// Copies the path from `subtree` down to every child touched by `edit`.
/// Uses an explicit stack, so arbitrarily deep trees are fine.
fn edit_subtree(subtree: &Subtree, edit: RelativeEdit) -> Subtree {
    let mut path: Vec<EditFrame> = Vec::new();
    let mut current = EditFrame::new(subtree, edit);
    loop {
        if let Some((index, child_edit)) = current.pending.next() {
            current.active = index;
            let child = EditFrame::new(&current.data.children[index], child_edit);
            path.push(std::mem::replace(&mut current, child));
            continue;
        }
        let done = Arc::new(current.data);
        match path.pop() {
            Some(mut parent) => {
                parent.data.children[parent.active] = done;
                current = parent;
            }
            None => return done,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{GrammarDef, blank, choice, lit, pat, repeat, seq, sym};
    use crate::language::Language;
    use crate::parser::Parser;

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn items() -> Language {
        let def = GrammarDef::new("items")
            .rule("list", repeat(sym("item")))
            .rule("item", seq([sym("name"), lit(";")]))
            .rule("name", pat("[a-z]+"));
        Language::load(&def).unwrap()
    }

    #[test]
    fn replace_computes_points() {
        let edit = InputEdit::replace(b"ab\ncd\nef", 4..7, b"X\nYZ");
        assert_eq!(edit.start_byte, 4);
        assert_eq!(edit.old_end_byte, 7);
        assert_eq!(edit.new_end_byte, 8);
        assert_eq!(edit.start_position, Point::new(1, 1));
        assert_eq!(edit.old_end_position, Point::new(2, 1));
        assert_eq!(edit.new_end_position, Point::new(2, 2));
    }

    #[test]
    fn edit_shifts_following_nodes_and_shares_preceding_ones() {
        init_logger();
        let text = "abc; def; ghi;";
        let mut parser = Parser::new(&items());
        let tree = parser.parse(text, None);
        let edit = InputEdit::replace(text.as_bytes(), 6..8, b"xxxx");
        let edited = tree.edit(&edit);
        let old_root = tree.root_node();
        let new_root = edited.root_node();
        assert_eq!(new_root.end_byte(), text.len() + 2);
        assert!(new_root.has_changes());

        let first_old = old_root.named_child(0).unwrap();
        let first_new = new_root.named_child(0).unwrap();
        assert_eq!(first_new.id(), first_old.id());
        assert!(!first_new.has_changes());

        let second = new_root.named_child(1).unwrap();
        assert!(second.has_changes());
        assert_eq!(second.byte_range(), 5..11);

        let third = new_root.named_child(2).unwrap();
        assert_eq!(third.byte_range(), 12..16);
        assert_eq!(third.id(), old_root.named_child(2).unwrap().id());
        // Original tree is untouched.
        assert_eq!(old_root.named_child(2).unwrap().byte_range(), 10..14);
        assert!(!old_root.has_changes());
    }

    #[test]
    fn insertion_in_padding_moves_the_node() {
        init_logger();
        let text = "abc;  def;";
        let mut parser = Parser::new(&items());
        let tree = parser.parse(text, None);
        let edited = tree.edit(&InputEdit::replace(text.as_bytes(), 5..5, b"\n\n"));
        let second = edited.root_node().named_child(1).unwrap();
        assert_eq!(second.byte_range(), 8..12);
        assert_eq!(second.start_position(), Point::new(2, 1));
    }

    #[test]
    fn deeply_nested_trees_are_edited_without_recursion() {
        init_logger();
        let depth = 100_000;
        let def = GrammarDef::new("parens").rule(
            "a",
            choice([seq([lit("("), sym("a"), lit(")")]), blank()]),
        );
        let language = Language::load(&def).unwrap();
        let text = format!("{}{}", "(".repeat(depth), ")".repeat(depth));
        let mut parser = Parser::new(&language);
        let tree = parser.parse(&text, None);
        assert!(!tree.root_node().has_error());

        let edited = tree.edit(&InputEdit::replace(text.as_bytes(), depth..depth, b"()"));
        let root = edited.root_node();
        assert_eq!(root.end_byte(), 2 * depth + 2);
        assert!(root.has_changes());
        assert!(!tree.root_node().has_changes());
    }
}
