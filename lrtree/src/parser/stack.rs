//! Persistent parse stacks.
//!
//! Each stack version is a singly linked list of frames. Forking a version
//! clones one `Arc`; versions share every frame below the fork point.

use crate::subtree::Subtree;
use crate::table::StateId;
use std::sync::Arc;

pub(crate) struct Link {
    pub state: StateId,
    pub tree: Subtree,
    /// A reused nonterminal not yet confirmed by a successful action.
    pub pending: bool,
    prev: Option<Arc<Link>>,
    depth: usize,
    error_cost: u32,
    dynamic_precedence: i32,
}

impl Drop for Link {
    fn drop(&mut self) {
        let mut prev = self.prev.take();
        while let Some(link) = prev {
            match Arc::try_unwrap(link) {
                Ok(mut link) => prev = link.prev.take(),
                Err(_) => break,
            }
        }
    }
}

#[derive(Clone)]
pub(crate) struct Stack {
    base: StateId,
    top: Option<Arc<Link>>,
}

impl Stack {
    pub fn new(base: StateId) -> Self {
        Self { base, top: None }
    }

    #[inline]
    pub fn state(&self) -> StateId {
        self.top.as_ref().map_or(self.base, |link| link.state)
    }

    pub fn depth(&self) -> usize {
        self.top.as_ref().map_or(0, |link| link.depth)
    }

    /// Sum of the error costs of the trees on the stack.
    pub fn error_cost(&self) -> u32 {
        self.top.as_ref().map_or(0, |link| link.error_cost)
    }

    pub fn dynamic_precedence(&self) -> i32 {
        self.top.as_ref().map_or(0, |link| link.dynamic_precedence)
    }

    pub fn top(&self) -> Option<&Link> {
        self.top.as_deref()
    }

    pub fn push(&mut self, state: StateId, tree: Subtree, pending: bool) {
        let (depth, error_cost, dynamic_precedence) = match &self.top {
            Some(link) => (link.depth, link.error_cost, link.dynamic_precedence),
            None => (0, 0, 0),
        };
        let link = Link {
            state,
            error_cost: error_cost.saturating_add(tree.error_cost),
            dynamic_precedence: dynamic_precedence + tree.dynamic_precedence,
            tree,
            pending,
            prev: self.top.take(),
            depth: depth + 1,
        };
        self.top = Some(Arc::new(link));
    }

    pub fn pop(&mut self) -> Option<(Subtree, bool)> {
        let link = self.top.take()?;
        self.top = link.prev.clone();
        Some((link.tree.clone(), link.pending))
    }

    /// Frames from the top down.
    pub fn iter(&self) -> impl Iterator<Item = &Link> {
        std::iter::successors(self.top.as_deref(), |link| link.prev.as_deref())
    }

    /// Trees from the bottom up.
    pub fn trees(&self) -> Vec<Subtree> {
        let mut trees: Vec<Subtree> = self.iter().map(|link| link.tree.clone()).collect();
        trees.reverse();
        trees
    }

    /// States below each structural frame, bottom up, starting with the base
    /// state. Extras and errors do not change the state and are left out.
    pub fn structural_states(&self) -> Vec<StateId> {
        let mut states: Vec<StateId> = self
            .iter()
            .filter(|link| link.tree.is_structural())
            .map(|link| link.state)
            .collect();
        states.push(self.base);
        states.reverse();
        states
    }

    /// Both stacks hold the same sequence of states.
    pub fn same_states(&self, other: &Stack) -> bool {
        if self.base != other.base || self.depth() != other.depth() {
            return false;
        }
        let (mut a, mut b) = (self.top.as_ref(), other.top.as_ref());
        loop {
            match (a, b) {
                (Some(x), Some(y)) => {
                    if Arc::ptr_eq(x, y) {
                        return true;
                    }
                    if x.state != y.state {
                        return false;
                    }
                    a = x.prev.as_ref();
                    b = y.prev.as_ref();
                }
                (None, None) => return true,
                _ => return false,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::Length;
    use crate::subtree::{Flags, SubtreeData};
    use crate::symbol::Symbol;
    use crate::table::LexModeId;

    fn leaf(error_cost: u32) -> Subtree {
        Arc::new(SubtreeData {
            symbol: Symbol(1),
            padding: Length::ZERO,
            size: Length::ZERO,
            lookahead_bytes: 1,
            lex_mode: LexModeId(1),
            children: Vec::new(),
            production: None,
            first_leaf: (Symbol(1), LexModeId(1)),
            flags: Flags {
                leaf: true,
                visible: true,
                ..Flags::default()
            },
            error_cost,
            dynamic_precedence: 1,
        })
    }

    #[test]
    fn forks_share_frames() {
        let mut a = Stack::new(StateId(0));
        a.push(StateId(1), leaf(0), false);
        a.push(StateId(2), leaf(5), false);
        let mut b = a.clone();
        assert!(a.same_states(&b));
        b.pop();
        b.push(StateId(3), leaf(0), false);
        assert!(!a.same_states(&b));
        b.pop();
        b.push(StateId(2), leaf(0), true);
        assert!(a.same_states(&b));
        assert_eq!(a.error_cost(), 5);
        assert_eq!(b.error_cost(), 0);
        assert_eq!(a.dynamic_precedence(), 2);
        assert_eq!(a.structural_states(), vec![StateId(0), StateId(1), StateId(2)]);
        assert_eq!(b.pop().map(|(_, pending)| pending), Some(true));
        assert_eq!(b.state(), StateId(1));
        assert_eq!(a.depth(), 2);
    }

    #[test]
    fn deep_stacks_drop_without_recursion() {
        let mut stack = Stack::new(StateId(0));
        let tree = leaf(0);
        for i in 0..200_000 {
            stack.push(StateId(i), tree.clone(), false);
        }
        assert_eq!(stack.depth(), 200_000);
        drop(stack);
    }
}
