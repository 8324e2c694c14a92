//! Error types reported when a grammar is loaded or a table is decoded.
//!
//! Parsing itself never fails: lexical and syntax errors are represented as
//! `ERROR` and `MISSING` nodes inside the returned tree. The errors in this
//! module are configuration errors that surface before any text is parsed.
//!
//! # Examples
//!
//! ```rust
//! # use lrtree::{GrammarDef, GrammarError, Language, Malformed, seq, sym};
//! let def = GrammarDef::new("broken").rule("start", seq([sym("missing")]));
//! match Language::load(&def) {
//!     Err(GrammarError::MalformedGrammar(Malformed::UndefinedSymbol { symbol, .. })) => {
//!         assert_eq!(symbol, "missing");
//!     }
//!     other => panic!("unexpected {other:?}"),
//! }
//! ```

use std::fmt;
use thiserror::Error;

/// Errors that prevent a grammar from loading.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GrammarError {
    /// The grammar definition is structurally invalid.
    #[error("malformed grammar: {0}")]
    MalformedGrammar(#[from] Malformed),

    /// A parse-table conflict could not be resolved by precedence,
    /// associativity, a declared conflict set or the conflict policy.
    #[error("ambiguous grammar: {0}")]
    AmbiguousGrammar(Box<Conflict>),

    /// A serialized table is truncated, corrupt or of another format version.
    #[error("invalid parse table: {0}")]
    InvalidTable(String),
}

/// The specific way a grammar definition is malformed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Malformed {
    #[error("grammar has no rules")]
    NoRules,

    #[error("start rule `{0}` is not defined")]
    MissingStartRule(String),

    #[error("rule `{rule}` references undefined symbol `{symbol}`")]
    UndefinedSymbol { rule: String, symbol: String },

    #[error("rule `{0}` is defined more than once")]
    DuplicateRule(String),

    #[error("rule `{0}` has no alternatives")]
    EmptyRule(String),

    #[error("contradictory precedence declarations for token `{0}`")]
    ContradictoryPrecedence(String),

    #[error("invalid pattern for token `{token}`: {message}")]
    InvalidPattern { token: String, message: String },

    #[error("token `{0}` matches the empty string")]
    EmptyToken(String),

    #[error("{directive} refers to unknown symbol `{symbol}`")]
    UnknownSymbol {
        directive: &'static str,
        symbol: String,
    },

    #[error("word token `{0}` must be a lexical rule")]
    InvalidWordToken(String),

    #[error("extra `{0}` must be a token or a pattern")]
    UnsupportedExtra(String),

    #[error("external token `{0}` is also defined as a rule")]
    ExternalRedefined(String),

    #[error("grammar needs {0} symbols, more than a table can address")]
    TooManySymbols(usize),
}

/// Whether the colliding actions include a shift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConflictKind {
    ShiftReduce,
    ReduceReduce,
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictKind::ShiftReduce => f.write_str("shift/reduce"),
            ConflictKind::ReduceReduce => f.write_str("reduce/reduce"),
        }
    }
}

/// An unresolved parse-table conflict, described with symbol names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    /// The state in which the conflict occurs.
    pub state: usize,
    /// The lookahead terminal on which the actions collide.
    pub lookahead: String,
    pub kind: ConflictKind,
    /// The colliding actions, e.g. `shift 12`, `reduce expr -> expr + expr`.
    pub actions: Vec<String>,
    /// The state's kernel items in dotted notation.
    pub items: Vec<String>,
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} conflict in state {} on `{}`: {}",
            self.kind,
            self.state,
            self.lookahead,
            self.actions.join(" | ")
        )?;
        for item in &self.items {
            write!(f, "\n    {item}")?;
        }
        Ok(())
    }
}

/// Non-fatal findings reported while loading a grammar.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GrammarWarning {
    /// The rule cannot be reached from the start rule or the extras.
    UnreachableRule(String),
}

impl fmt::Display for GrammarWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GrammarWarning::UnreachableRule(name) => write!(f, "rule `{name}` is unreachable"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_display_lists_items() {
        let conflict = Conflict {
            state: 4,
            lookahead: "+".into(),
            kind: ConflictKind::ShiftReduce,
            actions: vec!["shift 7".into(), "reduce expr -> expr + expr".into()],
            items: vec!["expr -> expr + expr •".into(), "expr -> expr • + expr".into()],
        };
        let text = GrammarError::AmbiguousGrammar(Box::new(conflict)).to_string();
        assert!(text.starts_with("ambiguous grammar: shift/reduce conflict in state 4 on `+`"));
        assert!(text.contains("\n    expr -> expr • + expr"));
    }

    #[test]
    fn malformed_converts() {
        let err: GrammarError = Malformed::MissingStartRule("module".into()).into();
        assert_eq!(
            err.to_string(),
            "malformed grammar: start rule `module` is not defined"
        );
    }
}
