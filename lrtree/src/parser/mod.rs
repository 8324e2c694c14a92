//! The parse engine.
//!
//! A parse advances one or more stack versions over the token stream. Table
//! entries holding several actions fork versions (up to
//! [`ParseOptions::max_versions`]); versions that reach identical stacks at
//! the same position are merged. When the last live version hits an error it
//! recovers by inserting missing tokens or by popping stack entries and
//! skipping tokens into `ERROR` nodes. With an old tree, unchanged subtrees
//! are pushed whole instead of being re-lexed and re-reduced.
//!
//! # Examples
//!
//! ```rust
//! # use lrtree::{GrammarDef, Language, Parser, lit, pat, repeat, seq, sym};
//! let def = GrammarDef::new("items")
//!     .rule("list", repeat(sym("item")))
//!     .rule("item", seq([sym("name"), lit(";")]))
//!     .rule("name", pat("[a-z]+"));
//! let language = Language::load(&def).unwrap();
//! let mut parser = Parser::new(&language);
//! let tree = parser.parse("ab; cd;", None);
//! assert_eq!(tree.root_node().to_sexp(), "(list (item (name)) (item (name)))");
//! ```

mod recovery;
mod reuse;
mod stack;

pub use recovery::{CostRanking, RecoveryCandidate, RecoveryStrategy};

use crate::edit::InputEdit;
use crate::language::Language;
use crate::lexer::{Lexed, TextInput, remaining_length};
use crate::position::Length;
use crate::subtree::{Subtree, SubtreeData};
use crate::symbol::{Symbol, SymbolKind};
use crate::table::{LexModeId, ParseAction, ParseTable, ProductionId, StateId};
use crate::tree::{ParseStatus, Tree};
use recovery::{missing_tokens, simulate};
use reuse::ReuseCursor;
use stack::Stack;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Limits applied to a parse.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseOptions {
    /// Maximum number of simultaneous stack versions.
    pub max_versions: usize,
    /// Longest sequence of missing tokens considered by one recovery.
    pub max_missing_tokens: usize,
    /// Most upcoming tokens a recovery may skip.
    pub max_skipped_tokens: usize,
    /// Recovery candidates costing more are not considered.
    pub max_recovery_cost: u32,
    /// After this many recoveries the rest of the input becomes one `ERROR`
    /// node.
    pub max_recovery_attempts: usize,
    /// Stops the parse after this many parser actions.
    pub max_operations: Option<usize>,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            max_versions: 6,
            max_missing_tokens: 2,
            max_skipped_tokens: 8,
            max_recovery_cost: 3000,
            max_recovery_attempts: 10_000,
            max_operations: None,
        }
    }
}

impl ParseOptions {
    pub fn max_versions(mut self, n: usize) -> Self {
        self.max_versions = n.max(1);
        self
    }

    pub fn max_missing_tokens(mut self, n: usize) -> Self {
        self.max_missing_tokens = n;
        self
    }

    pub fn max_skipped_tokens(mut self, n: usize) -> Self {
        self.max_skipped_tokens = n;
        self
    }

    pub fn max_recovery_cost(mut self, cost: u32) -> Self {
        self.max_recovery_cost = cost;
        self
    }

    pub fn max_recovery_attempts(mut self, n: usize) -> Self {
        self.max_recovery_attempts = n;
        self
    }

    pub fn max_operations(mut self, n: Option<usize>) -> Self {
        self.max_operations = n;
        self
    }
}

/// Counters for the last parse.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParserStats {
    /// Tokens produced by the lexer.
    pub tokens: usize,
    pub shifts: usize,
    pub reductions: usize,
    /// Table entries with several actions that forked a version.
    pub ambigs: usize,
    /// Subtrees taken over from the old tree.
    pub reused: usize,
    pub recoveries: usize,
}

/// Parses text of one language into syntax trees.
pub struct Parser {
    language: Language,
    options: ParseOptions,
    strategy: Box<dyn RecoveryStrategy>,
    cancellation: Option<Arc<AtomicBool>>,
    stats: ParserStats,
    /// Left-recursive repetition productions and their non-recursive
    /// counterparts.
    repeat_base: HashMap<ProductionId, ProductionId>,
}

impl Parser {
    pub fn new(language: &Language) -> Parser {
        let table = language.table();
        let productions = table.productions();
        let mut repeat_base = HashMap::new();
        for (i, info) in productions.iter().enumerate() {
            let aux = table.symbol_metadata(info.lhs).kind == SymbolKind::Auxiliary;
            if !aux || info.rhs.first() != Some(&info.lhs) {
                continue;
            }
            if let Some(j) = productions
                .iter()
                .position(|p| p.lhs == info.lhs && p.rhs[..] == info.rhs[1..])
            {
                repeat_base.insert(ProductionId(i as u32), ProductionId(j as u32));
            }
        }
        Parser {
            language: language.clone(),
            options: ParseOptions::default(),
            strategy: Box::new(CostRanking),
            cancellation: None,
            stats: ParserStats::default(),
            repeat_base,
        }
    }

    pub fn language(&self) -> &Language {
        &self.language
    }

    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    pub fn set_options(&mut self, options: ParseOptions) {
        self.options = options;
    }

    /// Replaces the ranking of recovery candidates.
    pub fn set_recovery_strategy(&mut self, strategy: impl RecoveryStrategy + 'static) {
        self.strategy = Box::new(strategy);
    }

    /// Polled between parser actions; when set, the parse stops and returns a
    /// partial tree with [`ParseStatus::Cancelled`].
    pub fn set_cancellation_flag(&mut self, flag: Option<Arc<AtomicBool>>) {
        self.cancellation = flag;
    }

    pub fn stats(&self) -> ParserStats {
        self.stats.clone()
    }

    /// Parses `text`. With `old_tree` (already edited to match `text`),
    /// unchanged subtrees are reused.
    pub fn parse(&mut self, text: impl AsRef<[u8]>, old_tree: Option<&Tree>) -> Tree {
        let mut input: &[u8] = text.as_ref();
        self.parse_with(&mut input, old_tree)
    }

    /// Parses text read through `input`.
    pub fn parse_with(&mut self, input: &mut dyn TextInput, old_tree: Option<&Tree>) -> Tree {
        let reuse = match old_tree {
            Some(old) if old.language().ptr_eq(&self.language) => {
                Some(ReuseCursor::new(old.root_subtree().clone()))
            }
            Some(_) => {
                log::debug!("old tree belongs to another language; parsing from scratch");
                None
            }
            None => None,
        };
        let start = self.language.table().start_state();
        let engine = Engine {
            language: self.language.clone(),
            options: &self.options,
            strategy: self.strategy.as_ref(),
            cancellation: self.cancellation.as_deref(),
            repeat_base: &self.repeat_base,
            input,
            versions: vec![Version {
                stack: Stack::new(start),
                position: Length::ZERO,
                lookahead: None,
            }],
            accepted: Vec::new(),
            reuse,
            token_cache: None,
            operations: 0,
            recoveries: 0,
            stats: ParserStats::default(),
        };
        let (tree, stats) = engine.run();
        log::debug!(
            "parsed {} bytes ({:?}): {} tokens, {} shifts, {} reductions, {} ambigs, {} reused, {} recoveries",
            tree.root_node().end_byte(),
            tree.status(),
            stats.tokens,
            stats.shifts,
            stats.reductions,
            stats.ambigs,
            stats.reused,
            stats.recoveries
        );
        self.stats = stats;
        tree
    }

    /// Applies `edit` to `prior` and parses `text` reusing what the edit left
    /// untouched.
    pub fn reparse(&mut self, prior: &Tree, edit: &InputEdit, text: impl AsRef<[u8]>) -> Tree {
        let edited = prior.edit(edit);
        self.parse(text, Some(&edited))
    }
}

#[derive(Clone)]
struct Version {
    stack: Stack,
    /// Absolute end of the last consumed tree.
    position: Length,
    lookahead: Option<Subtree>,
}

struct Accepted {
    trees: Vec<Subtree>,
    /// Padding of the end-of-input token.
    trailing: Length,
    error_cost: u32,
    dynamic_precedence: i32,
}

enum Plan {
    Missing(Vec<Symbol>, StateId),
    PopSkip { popped: usize, skipped: usize },
}

struct Engine<'p, 'i> {
    language: Language,
    options: &'p ParseOptions,
    strategy: &'p dyn RecoveryStrategy,
    cancellation: Option<&'p AtomicBool>,
    repeat_base: &'p HashMap<ProductionId, ProductionId>,
    input: &'i mut dyn TextInput,
    versions: Vec<Version>,
    accepted: Vec<Accepted>,
    reuse: Option<ReuseCursor>,
    token_cache: Option<(usize, LexModeId, Subtree)>,
    operations: usize,
    recoveries: usize,
    stats: ParserStats,
}

impl Engine<'_, '_> {
    fn run(mut self) -> (Tree, ParserStats) {
        let tree = loop {
            if self.cancelled() {
                break self.abort(ParseStatus::Cancelled);
            }
            let Some(index) = self.next_version() else {
                break self.finish();
            };
            if let Some(status) = self.advance(index) {
                break self.abort(status);
            }
            self.condense();
        };
        (tree, self.stats)
    }

    fn cancelled(&mut self) -> bool {
        self.operations += 1;
        if self.cancellation.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
            log::debug!("parse cancelled after {} operations", self.operations);
            return true;
        }
        if self.options.max_operations.is_some_and(|max| self.operations > max) {
            log::debug!("operation limit of {} reached", self.operations - 1);
            return true;
        }
        false
    }

    /// The live version furthest behind.
    fn next_version(&self) -> Option<usize> {
        self.versions
            .iter()
            .enumerate()
            .min_by_key(|(i, v)| (v.position.bytes, *i))
            .map(|(i, _)| i)
    }

    /// Performs one parser action on a version.
    fn advance(&mut self, index: usize) -> Option<ParseStatus> {
        let language = self.language.clone();
        let table = language.table();
        let state = self.versions[index].stack.state();
        let lookahead = match self.versions[index].lookahead.clone() {
            Some(tree) => tree,
            None => {
                let tree = self.next_token(index, state, table);
                self.versions[index].lookahead = Some(tree.clone());
                tree
            }
        };
        if log::log_enabled!(log::Level::Trace) {
            self.dump_version(index, &lookahead);
        }

        if !lookahead.flags.leaf {
            // A reused nonterminal acts like its first leaf until it is shifted.
            let action = match table.actions(state, lookahead.first_leaf.0)[..] {
                [action] => action,
                _ => ParseAction::Error,
            };
            match action {
                ParseAction::Reduce(prod) => {
                    self.reduce(index, prod);
                    return None;
                }
                ParseAction::Shift(_) => {
                    if let Some(next) = table.next_state(state, lookahead.symbol) {
                        log::trace!("Reuse {} -> {}", table.symbol_name(lookahead.symbol), next.0);
                        let version = &mut self.versions[index];
                        version.position = version.position + lookahead.total();
                        version.stack.push(next, lookahead, true);
                        version.lookahead = None;
                        self.stats.reused += 1;
                        return None;
                    }
                }
                _ => {}
            }
            log::trace!("Breakdown lookahead {}", table.symbol_name(lookahead.symbol));
            self.versions[index].lookahead = None;
            if let Some(reuse) = &mut self.reuse {
                if !reuse.descend() {
                    reuse.advance();
                }
            }
            return None;
        }

        let actions = table.actions(state, lookahead.symbol);
        if actions.is_empty() {
            if lookahead.flags.extra {
                log::trace!("Shift extra {}", table.symbol_name(lookahead.symbol));
                self.shift(index, state, lookahead);
                return None;
            }
            return self.handle_error(index);
        }
        if actions.len() > 1 {
            log::trace!("Ambig {:?}", actions);
            self.stats.ambigs += 1;
            for action in &actions[1..] {
                if self.versions.len() >= self.options.max_versions {
                    log::trace!("version limit reached; dropping {action}");
                    break;
                }
                let fork = self.versions[index].clone();
                self.versions.push(fork);
                let last = self.versions.len() - 1;
                self.apply(last, *action, &lookahead);
            }
        }
        self.apply(index, actions[0], &lookahead);
        None
    }

    fn apply(&mut self, index: usize, action: ParseAction, lookahead: &Subtree) {
        match action {
            ParseAction::Shift(next) => {
                log::trace!("Shift {}", next.0);
                self.shift(index, next, lookahead.clone());
            }
            ParseAction::Reduce(prod) => self.reduce(index, prod),
            ParseAction::Accept => self.accept(index),
            ParseAction::Error | ParseAction::Goto(_) | ParseAction::Ambig(_) => {
                log::trace!("unexpected {action} for a terminal");
            }
        }
    }

    fn shift(&mut self, index: usize, state: StateId, tree: Subtree) {
        let version = &mut self.versions[index];
        version.position = version.position + tree.total();
        version.stack.push(state, tree, false);
        version.lookahead = None;
        self.stats.shifts += 1;
    }

    fn reduce(&mut self, index: usize, prod: ProductionId) {
        let language = self.language.clone();
        let table = language.table();
        let info = table.production(prod);
        let fragile = self.versions.len() > 1;
        let version = &mut self.versions[index];
        let state = version.stack.state();
        let fragile = fragile || table.is_fragile(state, prod);

        let mut trailing = Vec::new();
        while version.stack.top().is_some_and(|link| !link.tree.is_structural()) {
            if let Some((tree, _)) = version.stack.pop() {
                trailing.push(tree);
            }
        }
        let mut children = Vec::new();
        let mut count = 0;
        while count < info.child_count() {
            let Some((tree, _)) = version.stack.pop() else {
                break;
            };
            if tree.is_structural() {
                count += 1;
            }
            children.push(tree);
        }
        children.reverse();
        let children = children
            .into_iter()
            .map(|child| {
                if child.symbol != info.lhs {
                    balance(table, self.repeat_base, child)
                } else {
                    child
                }
            })
            .collect();

        let node = SubtreeData::node(table, info.lhs, children, Some(prod), fragile);
        let below = version.stack.state();
        log::trace!("Reduce {} ({})", prod.0, table.symbol_name(info.lhs));
        match table.goto(below, info.lhs) {
            Some(next) => {
                version.stack.push(next, node, false);
                for tree in trailing.into_iter().rev() {
                    version.stack.push(next, tree, false);
                }
            }
            None => {
                log::warn!(
                    "no goto on {} from state {}",
                    table.symbol_name(info.lhs),
                    below.0
                );
                let mut skipped = vec![node];
                skipped.extend(trailing.into_iter().rev());
                version.stack.push(below, SubtreeData::error(table, skipped), false);
            }
        }
        self.stats.reductions += 1;
    }

    fn accept(&mut self, index: usize) {
        log::trace!("Accept");
        let version = self.versions.remove(index);
        let trailing = version.lookahead.map_or(Length::ZERO, |end| end.padding);
        self.accepted.push(Accepted {
            trees: version.stack.trees(),
            trailing,
            error_cost: version.stack.error_cost(),
            dynamic_precedence: version.stack.dynamic_precedence(),
        });
    }

    fn next_token(&mut self, index: usize, state: StateId, table: &ParseTable) -> Subtree {
        let position = self.versions[index].position;
        if self.versions.len() == 1 {
            if let Some(reuse) = &mut self.reuse {
                if let Some(tree) = reuse.take(position.bytes, state, table) {
                    if tree.flags.leaf {
                        self.stats.reused += 1;
                    }
                    return tree;
                }
            }
        }
        self.lex(position, table.lex_mode(state), table)
    }

    fn lex(&mut self, position: Length, mode: LexModeId, table: &ParseTable) -> Subtree {
        if let Some((at, cached_mode, tree)) = &self.token_cache {
            if *at == position.bytes && *cached_mode == mode {
                return tree.clone();
            }
        }
        let scanner = self.language.scanner();
        let lexed = self
            .language
            .lexer()
            .lex(&mut *self.input, position.bytes, mode, scanner);
        self.stats.tokens += 1;
        let tree = SubtreeData::leaf(table, &lexed);
        self.token_cache = Some((position.bytes, mode, tree.clone()));
        tree
    }

    fn handle_error(&mut self, index: usize) -> Option<ParseStatus> {
        if self.versions.len() > 1 || !self.accepted.is_empty() {
            log::trace!("version {index} dropped on error");
            self.versions.remove(index);
            return None;
        }
        if self.breakdown(index) {
            return None;
        }
        self.recoveries += 1;
        self.stats.recoveries += 1;
        if self.recoveries > self.options.max_recovery_attempts {
            log::debug!("giving up after {} recoveries", self.recoveries - 1);
            return Some(ParseStatus::RecoveryExhausted);
        }
        self.recover(index);
        None
    }

    /// Replaces pending reused subtrees on top of the stack by their children.
    fn breakdown(&mut self, index: usize) -> bool {
        let language = self.language.clone();
        let table = language.table();
        let stack = &mut self.versions[index].stack;
        let mut changed = false;
        while stack.top().is_some_and(|link| link.pending) {
            let Some((tree, _)) = stack.pop() else {
                break;
            };
            let mut state = stack.state();
            let mut pushes = Vec::with_capacity(tree.children.len());
            let mut complete = true;
            for child in &tree.children {
                if !child.is_structural() {
                    pushes.push((state, child.clone()));
                    continue;
                }
                match table.next_state(state, child.symbol) {
                    Some(next) => {
                        pushes.push((next, child.clone()));
                        state = next;
                    }
                    None => {
                        complete = false;
                        break;
                    }
                }
            }
            if !complete {
                let state = stack.state();
                let next = table.next_state(state, tree.symbol).unwrap_or(state);
                stack.push(next, tree, false);
                break;
            }
            log::trace!("Breakdown {}", table.symbol_name(tree.symbol));
            for (state, child) in pushes {
                let pending = !child.flags.leaf;
                stack.push(state, child, pending);
            }
            changed = true;
        }
        changed
    }

    /// Recovers the only live version from an error on its lookahead.
    fn recover(&mut self, index: usize) {
        let language = self.language.clone();
        let table = language.table();
        let version = self.versions[index].clone();
        let Some(lookahead) = version.lookahead.clone() else {
            return;
        };
        let structural = version.stack.structural_states();
        let mut plans: Vec<(u32, Plan)> = Vec::new();

        if lookahead.symbol != Symbol::ERROR {
            if let Some((sequence, after)) = missing_tokens(
                table,
                &structural,
                lookahead.symbol,
                self.options.max_missing_tokens,
            ) {
                let candidate = RecoveryCandidate {
                    missing: sequence.len(),
                    ..RecoveryCandidate::default()
                };
                let cost = self.strategy.cost(&candidate);
                if cost <= self.options.max_recovery_cost {
                    let state = after.last().copied().unwrap_or(table.start_state());
                    plans.push((cost, Plan::Missing(sequence, state)));
                }
            }
        }

        let mut tokens = vec![lookahead.clone()];
        let mut position = version.position + lookahead.total();
        while tokens.len() <= self.options.max_skipped_tokens
            && tokens.last().is_some_and(|t| t.symbol != Symbol::END)
        {
            let token = self.lex(position, LexModeId::ERROR, table);
            position = position + token.total();
            tokens.push(token);
        }

        let mut stack = version.stack.clone();
        let mut popped = Length::ZERO;
        for depth in 0..=version.stack.depth() {
            if depth > 0 {
                let Some((tree, _)) = stack.pop() else {
                    break;
                };
                popped = tree.total() + popped;
            }
            let pop_only = RecoveryCandidate {
                popped: depth,
                skipped_bytes: popped.bytes,
                skipped_lines: popped.extent.row,
                ..RecoveryCandidate::default()
            };
            if self.strategy.cost(&pop_only) > self.options.max_recovery_cost {
                break;
            }
            let states = stack.structural_states();
            let mut skipped = Length::ZERO;
            for (j, token) in tokens.iter().enumerate() {
                if j > 0 {
                    skipped = skipped + tokens[j - 1].total();
                }
                if (depth == 0 && j == 0) || token.symbol == Symbol::ERROR {
                    continue;
                }
                let candidate = RecoveryCandidate {
                    popped: depth,
                    skipped: j,
                    skipped_bytes: popped.bytes + skipped.bytes,
                    skipped_lines: popped.extent.row + skipped.extent.row,
                    ..RecoveryCandidate::default()
                };
                let cost = self.strategy.cost(&candidate);
                if cost > self.options.max_recovery_cost {
                    continue;
                }
                let mut simulated = states.clone();
                if simulate(table, &mut simulated, token.symbol) {
                    plans.push((
                        cost,
                        Plan::PopSkip {
                            popped: depth,
                            skipped: j,
                        },
                    ));
                }
            }
        }
        plans.sort_by_key(|(cost, _)| *cost);

        for (cost, plan) in plans {
            match plan {
                Plan::Missing(sequence, state) => {
                    let relexed = self.lex(version.position, table.lex_mode(state), table);
                    if !same_token(&relexed, &lookahead) {
                        continue;
                    }
                    log::trace!(
                        "Recover (cost {cost}): insert missing {:?}",
                        sequence.iter().map(|s| table.symbol_name(*s)).collect::<Vec<_>>()
                    );
                    for symbol in sequence {
                        self.insert_missing(index, symbol, table);
                    }
                    self.versions[index].lookahead = Some(relexed);
                    return;
                }
                Plan::PopSkip { popped, skipped } => {
                    let mut resumed = version.stack.clone();
                    let mut error_children = Vec::new();
                    for _ in 0..popped {
                        if let Some((tree, _)) = resumed.pop() {
                            error_children.push(tree);
                        }
                    }
                    error_children.reverse();
                    let mut at = version.position;
                    for token in &tokens[..skipped] {
                        at = at + token.total();
                        error_children.push(token.clone());
                    }
                    let relexed = self.lex(at, table.lex_mode(resumed.state()), table);
                    if !same_token(&relexed, &tokens[skipped]) {
                        continue;
                    }
                    log::trace!(
                        "Recover (cost {cost}): pop {popped}, skip {skipped}, resume in {}",
                        resumed.state().0
                    );
                    if !error_children.is_empty() {
                        let state = resumed.state();
                        resumed.push(state, SubtreeData::error(table, error_children), false);
                    }
                    let target = &mut self.versions[index];
                    target.stack = resumed;
                    target.position = at;
                    target.lookahead = Some(relexed);
                    return;
                }
            }
        }

        if lookahead.symbol == Symbol::END {
            log::trace!("Recover: nothing consumes end of input; closing the tree");
            self.accept(index);
            return;
        }
        log::trace!("Recover: skip {}", table.symbol_name(lookahead.symbol));
        let state = version.stack.state();
        let target = &mut self.versions[index];
        target.position = target.position + lookahead.total();
        target.stack.push(state, SubtreeData::error(table, vec![lookahead]), false);
        target.lookahead = None;
    }

    /// Pushes a zero-width token, performing the reductions it triggers.
    fn insert_missing(&mut self, index: usize, symbol: Symbol, table: &ParseTable) {
        for _ in 0..1024 {
            let state = self.versions[index].stack.state();
            let action = table.actions(state, symbol).first().copied().unwrap_or_default();
            match action {
                ParseAction::Reduce(prod) => self.reduce(index, prod),
                ParseAction::Shift(next) => {
                    let missing = SubtreeData::missing(table, symbol, table.lex_mode(state));
                    self.versions[index].stack.push(next, missing, false);
                    return;
                }
                _ => return,
            }
        }
    }

    /// Merges versions with identical stacks at the same position and caps
    /// the number of versions.
    fn condense(&mut self) {
        let mut i = 0;
        while i < self.versions.len() {
            let mut j = i + 1;
            while j < self.versions.len() {
                let (a, b) = (&self.versions[i], &self.versions[j]);
                if a.position.bytes == b.position.bytes
                    && a.lookahead.is_some() == b.lookahead.is_some()
                    && a.stack.same_states(&b.stack)
                {
                    if rank(b) < rank(a) {
                        self.versions.swap(i, j);
                    }
                    log::trace!("Merge version {j} into {i}");
                    self.versions.remove(j);
                } else {
                    j += 1;
                }
            }
            i += 1;
        }
        if self.versions.len() > self.options.max_versions {
            self.versions.sort_by_key(rank);
            self.versions.truncate(self.options.max_versions);
        }
    }

    /// The best accepted version as a tree.
    fn finish(&mut self) -> Tree {
        let best = self
            .accepted
            .drain(..)
            .enumerate()
            .min_by_key(|(i, a)| (a.error_cost, -a.dynamic_precedence, *i))
            .map(|(_, a)| a);
        let language = self.language.clone();
        let table = language.table();
        let root = match best {
            Some(accepted) => build_root(table, self.repeat_base, accepted.trees, None, accepted.trailing),
            None => {
                let rest = remaining_length(&mut *self.input, 0);
                build_root(table, self.repeat_base, Vec::new(), None, rest)
            }
        };
        Tree::new(root, language, ParseStatus::Complete)
    }

    /// The best live version's stack followed by the unparsed remainder as
    /// one `ERROR` node.
    fn abort(&mut self, status: ParseStatus) -> Tree {
        let language = self.language.clone();
        let table = language.table();
        let best = self.versions.iter().min_by_key(|v| rank(v)).cloned();
        let (trees, position) = match best {
            Some(version) => (version.stack.trees(), version.position),
            None => (Vec::new(), Length::ZERO),
        };
        let rest = remaining_length(&mut *self.input, position.bytes);
        let tail = (rest.bytes > 0).then(|| {
            let lexed = Lexed {
                symbol: Symbol::ERROR,
                padding: Length::ZERO,
                size: rest,
                lookahead_bytes: 1,
                mode: LexModeId::ERROR,
            };
            SubtreeData::leaf(table, &lexed)
        });
        let root = build_root(table, self.repeat_base, trees, tail, Length::ZERO);
        Tree::new(root, language, status)
    }

    fn dump_version(&self, index: usize, lookahead: &Subtree) {
        let table = self.language.table();
        let version = &self.versions[index];
        let mut frames: Vec<String> = version
            .stack
            .iter()
            .take(16)
            .map(|link| format!("{} <{}>", table.symbol_name(link.tree.symbol), link.state.0))
            .collect();
        frames.reverse();
        log::trace!(
            "v{index} @{}: ... {}  <-  {}",
            version.position.bytes,
            frames.join(" "),
            table.symbol_name(lookahead.symbol)
        );
    }
}

fn rank(version: &Version) -> (u32, i32) {
    (
        version.stack.error_cost(),
        -version.stack.dynamic_precedence(),
    )
}

fn same_token(a: &Subtree, b: &Subtree) -> bool {
    a.symbol == b.symbol && a.size.bytes == b.size.bytes && a.padding.bytes == b.padding.bytes
}

/// The non-recursive production of a left-recursive repetition node.
fn chain_base(
    repeat_base: &HashMap<ProductionId, ProductionId>,
    node: &Subtree,
) -> Option<ProductionId> {
    let base = *repeat_base.get(&node.production?)?;
    let first = node.children.first()?;
    (first.symbol == node.symbol && first.is_structural()).then_some(base)
}

/// Rebuilds a left-leaning chain of repetition nodes as a balanced tree, so
/// that long lists do not produce deep trees.
fn balance(
    table: &ParseTable,
    repeat_base: &HashMap<ProductionId, ProductionId>,
    tree: Subtree,
) -> Subtree {
    if chain_base(repeat_base, &tree).is_none() {
        return tree;
    }
    let symbol = tree.symbol;
    let mut items = Vec::new();
    let mut node = tree;
    while let Some(base) = chain_base(repeat_base, &node) {
        let rest = node.children[1..].to_vec();
        items.push(SubtreeData::node(table, symbol, rest, Some(base), node.flags.fragile));
        let next = node.children[0].clone();
        node = next;
    }
    items.push(node);
    items.reverse();
    while items.len() > 1 {
        let mut level = Vec::with_capacity(items.len().div_ceil(2));
        let mut iter = items.into_iter();
        while let Some(left) = iter.next() {
            match iter.next() {
                Some(right) => {
                    let fragile = left.flags.fragile || right.flags.fragile;
                    level.push(SubtreeData::node(table, symbol, vec![left, right], None, fragile));
                }
                None => level.push(left),
            }
        }
        items = level;
    }
    items.remove(0)
}

/// The root node: always of the start symbol, spanning the whole input.
fn build_root(
    table: &ParseTable,
    repeat_base: &HashMap<ProductionId, ProductionId>,
    trees: Vec<Subtree>,
    tail: Option<Subtree>,
    trailing: Length,
) -> Subtree {
    let start = table.start_symbol();
    let trees: Vec<Subtree> = trees
        .into_iter()
        .map(|tree| balance(table, repeat_base, tree))
        .collect();
    let structural: Vec<usize> = (0..trees.len()).filter(|i| trees[*i].is_structural()).collect();
    let (mut children, production) = match structural[..] {
        [k] if trees[k].symbol == start => {
            let mut children = trees[..k].to_vec();
            children.extend(trees[k].children.iter().cloned());
            children.extend(trees[k + 1..].iter().cloned());
            (children, trees[k].production)
        }
        [] => (trees, None),
        _ => (vec![SubtreeData::error(table, trees)], None),
    };
    children.extend(tail);
    let mut root = SubtreeData::node(table, start, children, production, false);
    let data = Arc::make_mut(&mut root);
    let total = data.total();
    data.padding = Length::ZERO;
    data.size = total + trailing;
    root
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::{CompileOptions, ConflictPolicy};
    use crate::grammar::{
        Grammar, GrammarDef, blank, choice, field, lit, pat, prec_dynamic, prec_left, repeat,
        seq, sym,
    };
    use proptest::prelude::*;

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

    fn arithmetic() -> Language {
        let def = GrammarDef::new("arith")
            .rule("program", repeat(sym("statement")))
            .rule("statement", seq([sym("_expression"), lit(";")]))
            .rule(
                "_expression",
                choice([
                    sym("binary"),
                    sym("number"),
                    sym("identifier"),
                    seq([lit("("), sym("_expression"), lit(")")]),
                ]),
            )
            .rule(
                "binary",
                choice([
                    prec_left(
                        1,
                        seq([
                            field("left", sym("_expression")),
                            field("operator", lit("+")),
                            field("right", sym("_expression")),
                        ]),
                    ),
                    prec_left(
                        2,
                        seq([
                            field("left", sym("_expression")),
                            field("operator", lit("*")),
                            field("right", sym("_expression")),
                        ]),
                    ),
                ]),
            )
            .rule("number", pat("[0-9]+"))
            .rule("identifier", pat("[a-z]+"))
            .rule("comment", pat("//[^\n]*"))
            .extras([sym("comment"), pat("\\s")]);
        Language::load(&def).unwrap()
    }

    fn items() -> Language {
        let def = GrammarDef::new("items")
            .rule("list", repeat(sym("item")))
            .rule("item", seq([sym("name"), lit("="), sym("value"), lit(";")]))
            .rule("name", pat("[a-z]+"))
            .rule("value", pat("[0-9]+"));
        Language::load(&def).unwrap()
    }

    fn max_depth(tree: &Tree) -> usize {
        let mut deepest = 0;
        let mut pending = vec![(tree.root_subtree().clone(), 1)];
        while let Some((node, depth)) = pending.pop() {
            deepest = deepest.max(depth);
            for child in &node.children {
                pending.push((child.clone(), depth + 1));
            }
        }
        deepest
    }

    #[test]
    fn arithmetic_sexp() {
        init_logger();
        let mut parser = Parser::new(&arithmetic());
        let tree = parser.parse("1 + 2 * x;\n(3 + 4) * 5; // done\n", None);
        assert_eq!(tree.status(), ParseStatus::Complete);
        assert_eq!(
            tree.root_node().to_sexp(),
            "(program \
             (statement (binary left: (number) right: (binary left: (number) right: (identifier)))) \
             (statement (binary left: (binary left: (number) right: (number)) right: (number))) \
             (comment))"
        );
        assert!(!tree.root_node().has_error());
        let stats = parser.stats();
        assert_eq!(stats.recoveries, 0);
        assert!(stats.shifts >= 15);
    }

    #[test]
    fn unclosed_paren_gets_one_missing_token() {
        init_logger();
        let mut parser = Parser::new(&parens());
        let tree = parser.parse("(()", None);
        let root = tree.root_node();
        assert_eq!(root.kind(), "a");
        assert_eq!(root.to_sexp(), "(a (a (a)) (MISSING \")\"))");
        assert!(root.has_error());
        assert_eq!(root.byte_range(), 0..3);
        let missing = root.child(2).unwrap();
        assert!(missing.is_missing());
        assert_eq!(missing.byte_range(), 3..3);
        assert_eq!(parser.stats().recoveries, 1);
    }

    #[test]
    fn unexpected_token_is_skipped_into_an_error_node() {
        init_logger();
        let mut parser = Parser::new(&items());
        let text = "a = 1; b = = 2; c = 3;";
        let tree = parser.parse(text, None);
        let root = tree.root_node();
        assert_eq!(root.byte_range(), 0..text.len());
        assert!(root.has_error());
        let sexp = root.to_sexp();
        assert!(sexp.contains("(ERROR"), "{sexp}");
        let names: Vec<_> = root
            .named_children()
            .filter(|n| n.kind() == "item")
            .map(|n| n.child(0).unwrap().utf8_text(text.as_bytes()).unwrap())
            .collect();
        assert_eq!(names.first(), Some(&"a"));
        assert_eq!(names.last(), Some(&"c"));
    }

    #[test]
    fn garbage_bytes_still_span_the_input() {
        init_logger();
        let mut parser = Parser::new(&items());
        let text = b"\xff\xfe a = 1; %%% b";
        let tree = parser.parse(text, None);
        assert_eq!(tree.root_node().byte_range(), 0..text.len());
        assert_eq!(tree.root_node().kind(), "list");
        assert_eq!(tree.status(), ParseStatus::Complete);
    }

    #[test]
    fn empty_input() {
        init_logger();
        let mut parser = Parser::new(&items());
        let tree = parser.parse("  \n", None);
        let root = tree.root_node();
        assert_eq!(root.to_sexp(), "(list)");
        assert_eq!(root.byte_range(), 0..3);
        assert!(!root.has_error());
    }

    #[test]
    fn declared_conflicts_fork_and_merge() {
        init_logger();
        let def = GrammarDef::new("glr")
            .rule("program", repeat(sym("_statement")))
            .rule("_statement", choice([sym("call"), sym("cast")]))
            .rule(
                "call",
                prec_dynamic(1, seq([sym("identifier"), lit("("), sym("identifier"), lit(")"), lit(";")])),
            )
            .rule("cast", seq([sym("type"), lit("("), sym("identifier"), lit(")"), lit(";")]))
            .rule("type", sym("identifier"))
            .rule("identifier", pat("[a-z]+"))
            .conflict(["call", "type"]);
        let language = Language::load(&def).unwrap();
        let mut parser = Parser::new(&language);
        let tree = parser.parse("f(x); g(y);", None);
        assert!(parser.stats().ambigs >= 2);
        assert_eq!(
            tree.root_node().to_sexp(),
            "(program (call (identifier) (identifier)) (call (identifier) (identifier)))"
        );
    }

    #[test]
    fn prefer_shift_policy_parses_dangling_else() {
        init_logger();
        let def = GrammarDef::new("ifs")
            .rule(
                "stmt",
                choice([
                    seq([lit("if"), sym("stmt"), lit("else"), sym("stmt")]),
                    seq([lit("if"), sym("stmt")]),
                    lit("x"),
                ]),
            );
        let grammar = Grammar::load(&def).unwrap();
        let options = CompileOptions::default().conflict_policy(ConflictPolicy::PreferShift);
        let language = Language::compile(&grammar, &options).unwrap();
        let tree = Parser::new(&language).parse("if if x else x", None);
        assert_eq!(tree.root_node().to_sexp(), "(stmt (stmt (stmt) (stmt)))");
    }

    #[test]
    fn cancellation_leaves_a_trailing_error() {
        init_logger();
        let language = items();
        let text = "a = 1; b = 2; c = 3; d = 4;";
        let mut parser = Parser::new(&language);
        parser.set_options(ParseOptions::default().max_operations(Some(10)));
        let tree = parser.parse(text, None);
        assert_eq!(tree.status(), ParseStatus::Cancelled);
        let root = tree.root_node();
        assert_eq!(root.byte_range(), 0..text.len());
        let last = root.child(root.child_count() - 1).unwrap();
        assert!(last.is_error());
        assert_eq!(last.end_byte(), text.len());

        let flag = Arc::new(AtomicBool::new(true));
        parser.set_options(ParseOptions::default());
        parser.set_cancellation_flag(Some(flag.clone()));
        let tree = parser.parse(text, None);
        assert_eq!(tree.status(), ParseStatus::Cancelled);
        assert_eq!(tree.root_node().byte_range(), 0..text.len());
        flag.store(false, Ordering::Relaxed);
        let tree = parser.parse(text, None);
        assert_eq!(tree.status(), ParseStatus::Complete);
    }

    #[test]
    fn recovery_attempts_are_bounded() {
        init_logger();
        let mut parser = Parser::new(&items());
        parser.set_options(ParseOptions::default().max_recovery_attempts(1));
        let text = "= = a = 1; ; ; c = 3;";
        let tree = parser.parse(text, None);
        assert_eq!(tree.status(), ParseStatus::RecoveryExhausted);
        assert_eq!(tree.root_node().byte_range(), 0..text.len());
        assert!(tree.root_node().has_error());
    }

    #[test]
    fn custom_recovery_strategy_is_consulted() {
        struct NeverInsert;
        impl RecoveryStrategy for NeverInsert {
            fn cost(&self, c: &RecoveryCandidate) -> u32 {
                if c.missing > 0 { u32::MAX } else { CostRanking.cost(c) }
            }
        }
        init_logger();
        let mut parser = Parser::new(&parens());
        parser.set_recovery_strategy(NeverInsert);
        let tree = parser.parse("(()", None);
        assert!(!tree.root_node().to_sexp().contains("MISSING"));
        assert!(tree.root_node().to_sexp().contains("ERROR"));
        assert_eq!(tree.root_node().byte_range(), 0..3);
    }

    #[test]
    fn long_lists_are_balanced() {
        init_logger();
        let text: String = (0..10_000).map(|i| format!("v = {i};\n")).collect();
        let mut parser = Parser::new(&items());
        let tree = parser.parse(&text, None);
        assert_eq!(tree.root_node().named_child_count(), 10_000);
        assert!(max_depth(&tree) < 40, "depth {}", max_depth(&tree));
    }

    #[test]
    fn editing_one_item_reuses_its_siblings() {
        init_logger();
        let mut text: String = (0..10_000).map(|i| format!("v = {i};\n")).collect();
        let language = items();
        let mut parser = Parser::new(&language);
        let old = parser.parse(&text, None);
        let full = parser.stats();

        let target = old.root_node().named_child(5_000).unwrap();
        let value = target.named_child(1).unwrap();
        let range = value.byte_range();
        let edit = InputEdit::replace(text.as_bytes(), range.clone(), b"77777");
        text.replace_range(range, "77777");
        let new = parser.reparse(&old, &edit, &text);
        let stats = parser.stats();
        assert!(stats.reused > 0);
        assert!(stats.tokens < full.tokens / 10, "{stats:?}");
        assert_eq!(new.root_node().to_sexp(), Parser::new(&language).parse(&text, None).root_node().to_sexp());

        let old_root = old.root_node();
        let new_root = new.root_node();
        for i in [0, 1, 2_500, 4_999, 5_001, 7_500, 9_999] {
            assert_eq!(
                new_root.named_child(i).unwrap().id(),
                old_root.named_child(i).unwrap().id(),
                "item {i}"
            );
        }
        assert_ne!(
            new_root.named_child(5_000).unwrap().id(),
            old_root.named_child(5_000).unwrap().id()
        );
        let edited = new_root.named_child(5_000).unwrap();
        assert_eq!(edited.named_child(1).unwrap().utf8_text(text.as_bytes()).unwrap(), "77777");
    }

    #[test]
    fn reparse_without_changes_reuses_the_root() {
        init_logger();
        let text = "a = 1; b = 2;";
        let mut parser = Parser::new(&items());
        let old = parser.parse(text, None);
        let again = parser.parse(text, Some(&old));
        assert_eq!(parser.stats().reused, 1);
        assert_eq!(again.root_node().to_sexp(), old.root_node().to_sexp());
        assert_eq!(
            again.root_node().named_child(1).unwrap().id(),
            old.root_node().named_child(1).unwrap().id()
        );
    }

    fn arbitrary_text() -> impl Strategy<Value = Vec<u8>> {
        prop::collection::vec(
            prop_oneof![
                Just(b'a'),
                Just(b'1'),
                Just(b'='),
                Just(b';'),
                Just(b' '),
                Just(b'\n'),
                any::<u8>(),
            ],
            0..64,
        )
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn every_input_yields_a_spanning_tree(text in arbitrary_text()) {
            let mut parser = Parser::new(&items());
            let tree = parser.parse(&text, None);
            let root = tree.root_node();
            prop_assert_eq!(root.kind(), "list");
            prop_assert_eq!(root.byte_range(), 0..text.len());
            prop_assert_eq!(tree.status(), ParseStatus::Complete);
            let mut pending = vec![root];
            while let Some(node) = pending.pop() {
                let mut last = node.start_byte();
                for child in node.children() {
                    prop_assert!(child.start_byte() >= last);
                    prop_assert!(child.end_byte() <= node.end_byte());
                    last = child.end_byte();
                    pending.push(child);
                }
            }
        }

        #[test]
        fn reparse_matches_a_fresh_parse(
            text in arbitrary_text(),
            start in 0usize..64,
            len in 0usize..8,
            insert in arbitrary_text(),
        ) {
            let language = items();
            let mut parser = Parser::new(&language);
            let old = parser.parse(&text, None);
            let start = start.min(text.len());
            let end = (start + len).min(text.len());
            let insert = &insert[..insert.len().min(6)];
            let edit = InputEdit::replace(&text, start..end, insert);
            let mut new_text = text[..start].to_vec();
            new_text.extend_from_slice(insert);
            new_text.extend_from_slice(&text[end..]);
            let incremental = parser.reparse(&old, &edit, &new_text);
            let fresh = Parser::new(&language).parse(&new_text, None);
            prop_assert_eq!(incremental.root_node().byte_range(), 0..new_text.len());
            if !fresh.root_node().has_error() {
                prop_assert_eq!(incremental.root_node().to_sexp(), fresh.root_node().to_sexp());
            }
        }
    }
}
