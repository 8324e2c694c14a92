//! Syntax trees and the node API.
//!
//! A [`Tree`] owns the root subtree and the [`Language`] it was parsed with.
//! [`Node`]s are cheap views: a subtree reference plus its absolute offset.
//! Hidden subtrees (rules starting with `_` and repetition helpers) are never
//! returned as nodes; their children are spliced into the nearest visible
//! ancestor. Parents are found by descending from the root, so subtrees carry
//! no back pointers and can be shared between tree versions.

use crate::language::Language;
use crate::position::{Length, Point, Range};
use crate::subtree::Subtree;
use crate::symbol::{FieldId, Symbol};
use std::fmt;
use std::sync::Arc;

/// How a parse ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum ParseStatus {
    /// The whole input was parsed (possibly with `ERROR`/`MISSING` nodes).
    #[default]
    Complete,
    /// The cancellation flag was raised or the operation limit was reached;
    /// the unparsed remainder is a trailing `ERROR` node.
    Cancelled,
    /// Error recovery gave up; the remainder is a trailing `ERROR` node.
    RecoveryExhausted,
}

/// An immutable syntax tree.
#[derive(Clone)]
pub struct Tree {
    root: Subtree,
    language: Language,
    status: ParseStatus,
}

impl Tree {
    pub(crate) fn new(root: Subtree, language: Language, status: ParseStatus) -> Self {
        Self {
            root,
            language,
            status,
        }
    }

    pub fn root_node(&self) -> Node<'_> {
        Node {
            tree: self,
            subtree: &self.root,
            offset: Length::ZERO,
        }
    }

    pub fn language(&self) -> &Language {
        &self.language
    }

    pub fn status(&self) -> ParseStatus {
        self.status
    }

    /// Walks the visible nodes starting at the root.
    pub fn walk(&self) -> TreeCursor<'_> {
        self.root_node().walk()
    }

    pub(crate) fn root_subtree(&self) -> &Subtree {
        &self.root
    }
}

impl fmt::Debug for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{Tree {:?} {:?}}}", self.root_node(), self.status)
    }
}

/// A visible node of a [`Tree`].
#[derive(Clone, Copy)]
pub struct Node<'tree> {
    tree: &'tree Tree,
    subtree: &'tree Subtree,
    /// Absolute position where the node's padding begins.
    offset: Length,
}

impl<'tree> Node<'tree> {
    /// Identity of the underlying subtree. Stable across tree versions for
    /// shared subtrees.
    pub fn id(&self) -> usize {
        Arc::as_ptr(self.subtree) as usize
    }

    /// The node's kind: rule name, literal text, or `ERROR`.
    pub fn kind(&self) -> &'tree str {
        self.tree.language.symbol_name(self.subtree.symbol)
    }

    pub fn kind_id(&self) -> Symbol {
        self.subtree.symbol
    }

    pub fn is_named(&self) -> bool {
        self.subtree.flags.named
    }

    pub fn is_extra(&self) -> bool {
        self.subtree.flags.extra
    }

    pub fn is_error(&self) -> bool {
        self.subtree.symbol == Symbol::ERROR
    }

    pub fn is_missing(&self) -> bool {
        self.subtree.flags.missing
    }

    /// The node is, or contains, an `ERROR` or `MISSING` node.
    pub fn has_error(&self) -> bool {
        self.subtree.flags.has_error
    }

    /// The node was touched by an edit and not re-parsed since.
    pub fn has_changes(&self) -> bool {
        self.subtree.flags.has_changes
    }

    fn start(&self) -> Length {
        self.offset + self.subtree.padding
    }

    fn end(&self) -> Length {
        self.start() + self.subtree.size
    }

    pub fn start_byte(&self) -> usize {
        self.start().bytes
    }

    pub fn end_byte(&self) -> usize {
        self.end().bytes
    }

    pub fn byte_range(&self) -> std::ops::Range<usize> {
        self.start_byte()..self.end_byte()
    }

    pub fn start_position(&self) -> Point {
        self.start().extent
    }

    pub fn end_position(&self) -> Point {
        self.end().extent
    }

    pub fn range(&self) -> Range {
        let (start, end) = (self.start(), self.end());
        Range {
            start_byte: start.bytes,
            end_byte: end.bytes,
            start_point: start.extent,
            end_point: end.extent,
        }
    }

    fn visible_children(&self) -> Vec<(Node<'tree>, Option<FieldId>)> {
        let mut out = Vec::new();
        collect_visible(self.tree, self.subtree, self.offset, None, &mut out);
        out
    }

    pub fn child_count(&self) -> usize {
        self.visible_children().len()
    }

    pub fn child(&self, index: usize) -> Option<Node<'tree>> {
        self.visible_children().get(index).map(|(node, _)| *node)
    }

    pub fn children(&self) -> impl ExactSizeIterator<Item = Node<'tree>> + use<'tree> {
        self.visible_children().into_iter().map(|(node, _)| node)
    }

    pub fn named_child_count(&self) -> usize {
        self.named_children().count()
    }

    pub fn named_child(&self, index: usize) -> Option<Node<'tree>> {
        self.named_children().nth(index)
    }

    pub fn named_children(&self) -> impl Iterator<Item = Node<'tree>> + use<'tree> {
        self.children().filter(|node| node.is_named())
    }

    /// The first child labelled with the field.
    pub fn child_by_field_name(&self, name: &str) -> Option<Node<'tree>> {
        self.children_by_field_name(name).into_iter().next()
    }

    pub fn children_by_field_name(&self, name: &str) -> Vec<Node<'tree>> {
        let Some(field) = self.tree.language.field_id(name) else {
            return Vec::new();
        };
        self.visible_children()
            .into_iter()
            .filter(|(_, f)| *f == Some(field))
            .map(|(node, _)| node)
            .collect()
    }

    pub fn field_name_for_child(&self, index: usize) -> Option<&'tree str> {
        let field = self.visible_children().get(index)?.1?;
        Some(self.tree.language.field_name(field))
    }

    fn is_same(&self, other: &Node<'_>) -> bool {
        Arc::ptr_eq(self.subtree, other.subtree) && self.offset.bytes == other.offset.bytes
    }

    /// The nearest visible ancestor. Computed by descending from the root.
    pub fn parent(&self) -> Option<Node<'tree>> {
        let root = self.tree.root_node();
        if self.is_same(&root) {
            return None;
        }
        find_parent(self.tree, root.subtree, root.offset, self, root)
    }

    pub fn next_sibling(&self) -> Option<Node<'tree>> {
        let siblings = self.parent()?.visible_children();
        let index = siblings.iter().position(|(node, _)| node.is_same(self))?;
        siblings.get(index + 1).map(|(node, _)| *node)
    }

    pub fn prev_sibling(&self) -> Option<Node<'tree>> {
        let siblings = self.parent()?.visible_children();
        let index = siblings.iter().position(|(node, _)| node.is_same(self))?;
        index.checked_sub(1).map(|i| siblings[i].0)
    }

    /// The smallest visible node within this one that spans `start..end`.
    pub fn descendant_for_byte_range(&self, start: usize, end: usize) -> Option<Node<'tree>> {
        self.descendant(start, end, false)
    }

    /// The smallest named node within this one that spans `start..end`.
    pub fn named_descendant_for_byte_range(&self, start: usize, end: usize) -> Option<Node<'tree>> {
        self.descendant(start, end, true)
    }

    fn descendant(&self, start: usize, end: usize, named: bool) -> Option<Node<'tree>> {
        if start > end || start < self.start_byte() || end > self.end_byte() {
            return None;
        }
        let mut node = *self;
        let mut last = *self;
        'descend: loop {
            let mut offset = node.offset;
            for child in &node.subtree.children {
                let candidate = Node {
                    tree: self.tree,
                    subtree: child,
                    offset,
                };
                offset = offset + child.total();
                let child_end = offset.bytes;
                if child_end < end {
                    continue;
                }
                let child_start = candidate.start_byte();
                // An empty child may sit exactly at `start`.
                let before = if child_start == child_end {
                    child_end < start
                } else {
                    child_end <= start
                };
                if before {
                    continue;
                }
                if start < child_start {
                    break;
                }
                node = candidate;
                if child.flags.visible && (!named || child.flags.named) {
                    last = candidate;
                }
                continue 'descend;
            }
            return Some(last);
        }
    }

    /// The node's text in `source`.
    pub fn utf8_text<'a>(&self, source: &'a [u8]) -> Result<&'a str, std::str::Utf8Error> {
        std::str::from_utf8(&source[self.start_byte()..self.end_byte()])
    }

    /// The node as an S-expression of its named descendants, with field
    /// labels, `(MISSING ..)` and `(ERROR ..)` nodes.
    pub fn to_sexp(&self) -> String {
        let mut out = String::new();
        self.write_sexp(None, &mut out);
        out
    }

    fn write_sexp(&self, field: Option<&str>, out: &mut String) {
        if let Some(field) = field {
            out.push_str(field);
            out.push_str(": ");
        }
        if self.is_missing() {
            if self.is_named() {
                out.push_str(&format!("(MISSING {})", self.kind()));
            } else {
                out.push_str(&format!("(MISSING {:?})", self.kind()));
            }
            return;
        }
        out.push('(');
        out.push_str(self.kind());
        for (child, field) in self.visible_children() {
            if child.is_named() || child.is_missing() {
                out.push(' ');
                let name = field.map(|f| self.tree.language.field_name(f));
                child.write_sexp(name, out);
            }
        }
        out.push(')');
    }

    pub fn walk(&self) -> TreeCursor<'tree> {
        TreeCursor::new(*self)
    }
}

impl PartialEq for Node<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.is_same(other)
    }
}

impl Eq for Node<'_> {}

impl fmt::Debug for Node<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{Node {} {} - {}}}",
            self.kind(),
            self.start_position(),
            self.end_position()
        )
    }
}

/// Appends the visible nodes under `subtree`, looking through hidden ones. A
/// field on a hidden subtree labels every visible node spliced out of it.
fn collect_visible<'tree>(
    tree: &'tree Tree,
    subtree: &'tree Subtree,
    offset: Length,
    inherited: Option<FieldId>,
    out: &mut Vec<(Node<'tree>, Option<FieldId>)>,
) {
    let fields = subtree
        .production
        .map(|prod| tree.language.table().production(prod).fields.as_slice())
        .unwrap_or(&[]);
    let mut offset = offset;
    let mut structural = 0;
    for child in &subtree.children {
        let mut field = None;
        if child.is_structural() {
            field = fields.get(structural).copied().flatten();
            structural += 1;
        }
        let field = inherited.or(field);
        if child.flags.visible {
            out.push((
                Node {
                    tree,
                    subtree: child,
                    offset,
                },
                field,
            ));
        } else {
            collect_visible(tree, child, offset, field, out);
        }
        offset = offset + child.total();
    }
}

fn find_parent<'tree>(
    tree: &'tree Tree,
    subtree: &'tree Subtree,
    offset: Length,
    target: &Node<'_>,
    visible: Node<'tree>,
) -> Option<Node<'tree>> {
    let target_end = target.offset.bytes + target.subtree.total().bytes;
    let mut offset = offset;
    for child in &subtree.children {
        let node = Node {
            tree,
            subtree: child,
            offset,
        };
        let end = offset.bytes + child.total().bytes;
        if node.is_same(target) {
            return Some(visible);
        }
        if offset.bytes <= target.offset.bytes && target_end <= end && !child.children.is_empty() {
            let next = if child.flags.visible { node } else { visible };
            if let Some(found) = find_parent(tree, child, offset, target, next) {
                return Some(found);
            }
        }
        offset = offset + child.total();
    }
    None
}

struct CursorFrame<'tree> {
    node: Node<'tree>,
    field: Option<FieldId>,
    siblings: Vec<(Node<'tree>, Option<FieldId>)>,
    index: usize,
}

/// A cursor over the visible nodes of a tree, with field names.
pub struct TreeCursor<'tree> {
    stack: Vec<CursorFrame<'tree>>,
}

impl<'tree> TreeCursor<'tree> {
    fn new(node: Node<'tree>) -> Self {
        Self {
            stack: vec![CursorFrame {
                node,
                field: None,
                siblings: Vec::new(),
                index: 0,
            }],
        }
    }

    fn top(&self) -> &CursorFrame<'tree> {
        &self.stack[self.stack.len() - 1]
    }

    pub fn node(&self) -> Node<'tree> {
        self.top().node
    }

    pub fn field_id(&self) -> Option<FieldId> {
        self.top().field
    }

    pub fn field_name(&self) -> Option<&'tree str> {
        let node = self.node();
        self.field_id().map(|f| node.tree.language.field_name(f))
    }

    /// Depth below the node the cursor was created on.
    pub fn depth(&self) -> usize {
        self.stack.len() - 1
    }

    pub fn goto_first_child(&mut self) -> bool {
        let siblings = self.node().visible_children();
        let Some(&(node, field)) = siblings.first() else {
            return false;
        };
        self.stack.push(CursorFrame {
            node,
            field,
            siblings,
            index: 0,
        });
        true
    }

    pub fn goto_next_sibling(&mut self) -> bool {
        let len = self.stack.len();
        if len < 2 {
            return false;
        }
        let frame = &mut self.stack[len - 1];
        let Some(&(node, field)) = frame.siblings.get(frame.index + 1) else {
            return false;
        };
        frame.index += 1;
        frame.node = node;
        frame.field = field;
        true
    }

    pub fn goto_parent(&mut self) -> bool {
        if self.stack.len() < 2 {
            return false;
        }
        self.stack.pop();
        true
    }

    /// Restarts the cursor at `node`.
    pub fn reset(&mut self, node: Node<'tree>) {
        *self = TreeCursor::new(node);
    }
}
