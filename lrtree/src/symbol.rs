//! Symbol, field and automaton identifiers shared by the grammar model, the
//! compiled table and the syntax tree.

use once_cell::sync::Lazy;
use smartstring::alias::String;
use std::fmt;

/// A grammar symbol: a terminal, an external token or a nonterminal.
///
/// Symbol `0` is always the end-of-input terminal. Terminals come first,
/// followed by external tokens and then nonterminals, so a table row is
/// indexed directly by `Symbol::index`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Symbol(pub u16);

impl Symbol {
    /// End of input.
    pub const END: Symbol = Symbol(0);
    /// Unparseable input consumed during recovery. Never part of a table row.
    pub const ERROR: Symbol = Symbol(u16::MAX);

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl From<Symbol> for usize {
    fn from(symbol: Symbol) -> Self {
        symbol.0 as usize
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}", self.0)
    }
}

/// A field name id. Field ids are assigned in alphabetical order of names.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldId(pub u16);

impl From<FieldId> for usize {
    fn from(field: FieldId) -> Self {
        field.0 as usize
    }
}

/// The class of a symbol.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    /// Matched by the built-in lexer.
    Terminal,
    /// Matched by the language's external scanner.
    External,
    /// Defined by a grammar rule.
    Nonterminal,
    /// Introduced while expanding repetitions, or the augmented start symbol.
    Auxiliary,
}

impl SymbolKind {
    pub fn is_terminal(self) -> bool {
        matches!(self, SymbolKind::Terminal | SymbolKind::External)
    }
}

/// Display and classification data for one symbol.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SymbolMetadata {
    pub name: String,
    pub kind: SymbolKind,
    /// Visible symbols appear as nodes; hidden ones are spliced into their
    /// parent by the node API.
    pub visible: bool,
    /// Named symbols come from rules; anonymous ones are literal tokens.
    pub named: bool,
    /// The symbol is an extra token (for example a comment).
    pub extra: bool,
}

pub(crate) static ERROR_METADATA: Lazy<SymbolMetadata> = Lazy::new(|| SymbolMetadata {
    name: "ERROR".into(),
    kind: SymbolKind::Nonterminal,
    visible: true,
    named: true,
    extra: false,
});
