//! The grammar model: a validated, normalized, immutable grammar.
//!
//! [`Grammar::load`] turns a [`GrammarDef`] into numbered symbols, flat
//! productions (choices and optionals expanded, repetitions turned into hidden
//! left-recursive auxiliary rules), token patterns, and the metadata the table
//! compiler needs: per-step fields and precedence, token precedence, declared
//! conflict sets, extras and keywords.

mod expand;
mod rule;

pub use rule::{
    Associativity, GrammarDef, PrecedenceDecl, Rule, blank, choice, field, lit, optional, pat,
    prec, prec_dynamic, prec_left, prec_right, repeat, repeat1, sep_by, sep_by1, seq, sym, token,
};

use crate::error::{GrammarError, GrammarWarning};
use crate::symbol::{FieldId, Symbol, SymbolKind, SymbolMetadata};
use smartstring::alias::String;
use std::collections::{BTreeMap, BTreeSet};

/// One element of a production's right-hand side.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Step {
    pub symbol: Symbol,
    pub field: Option<FieldId>,
    pub precedence: Option<i32>,
    pub associativity: Option<Associativity>,
}

/// A flat production `lhs -> steps`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Production {
    pub lhs: Symbol,
    pub steps: Vec<Step>,
    /// Precedence of the alternative as a whole; used for empty productions
    /// and when the last step carries none.
    pub precedence: Option<i32>,
    pub associativity: Option<Associativity>,
    pub dynamic_precedence: i32,
}

/// A token matched by the built-in lexer.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TokenDef {
    pub symbol: Symbol,
    /// Regular expression source. Literals are escaped.
    pub pattern: String,
    pub literal: bool,
}

/// A validated grammar. Production `0` is the augmented start production.
#[derive(Clone, Debug)]
pub struct Grammar {
    pub(crate) name: String,
    pub(crate) symbols: Vec<SymbolMetadata>,
    pub(crate) terminal_count: usize,
    pub(crate) start: Symbol,
    pub(crate) productions: Vec<Production>,
    pub(crate) fields: Vec<String>,
    pub(crate) tokens: Vec<TokenDef>,
    pub(crate) skips: Vec<String>,
    pub(crate) extras: Vec<Symbol>,
    pub(crate) externals: Vec<Symbol>,
    pub(crate) word: Option<Symbol>,
    pub(crate) keywords: Vec<(String, Symbol)>,
    pub(crate) conflicts: Vec<BTreeSet<Symbol>>,
    pub(crate) token_precedence: BTreeMap<Symbol, (i32, Option<Associativity>)>,
    /// Auxiliary symbol to the rule it was expanded from.
    pub(crate) aux_origin: BTreeMap<Symbol, Symbol>,
    pub(crate) warnings: Vec<GrammarWarning>,
}

impl Grammar {
    /// Validates and normalizes a grammar definition.
    pub fn load(def: &GrammarDef) -> Result<Grammar, GrammarError> {
        let grammar = expand::normalize(def)?;
        for warning in &grammar.warnings {
            log::warn!("grammar {}: {}", grammar.name, warning);
        }
        log::debug!(
            "loaded grammar {}: {} symbols ({} terminals), {} productions",
            grammar.name,
            grammar.symbols.len(),
            grammar.terminal_count,
            grammar.productions.len()
        );
        Ok(grammar)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn symbols(&self) -> &[SymbolMetadata] {
        &self.symbols
    }

    pub fn symbol_name(&self, symbol: Symbol) -> &str {
        if symbol == Symbol::ERROR {
            return "ERROR";
        }
        &self.symbols[symbol.index()].name
    }

    pub fn symbol_kind(&self, symbol: Symbol) -> SymbolKind {
        self.symbols[symbol.index()].kind
    }

    /// Number of terminal symbols, including end of input and externals.
    pub fn terminal_count(&self) -> usize {
        self.terminal_count
    }

    #[inline]
    pub fn is_terminal(&self, symbol: Symbol) -> bool {
        symbol.index() < self.terminal_count
    }

    /// The user's start rule (the augmented production's only step).
    pub fn start_symbol(&self) -> Symbol {
        self.start
    }

    pub fn productions(&self) -> &[Production] {
        &self.productions
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn tokens(&self) -> &[TokenDef] {
        &self.tokens
    }

    pub fn externals(&self) -> &[Symbol] {
        &self.externals
    }

    pub fn warnings(&self) -> &[GrammarWarning] {
        &self.warnings
    }

    /// The production in `lhs -> a b c` notation.
    pub fn production_display(&self, index: usize) -> std::string::String {
        let prod = &self.productions[index];
        let mut out = format!("{} ->", self.symbol_name(prod.lhs));
        for step in &prod.steps {
            out.push(' ');
            out.push_str(&self.display_symbol(step.symbol));
        }
        out
    }

    /// The symbol name, quoted when it is an anonymous literal.
    pub fn display_symbol(&self, symbol: Symbol) -> std::string::String {
        let meta = &self.symbols[symbol.index()];
        if meta.kind == SymbolKind::Terminal && !meta.named && meta.visible {
            format!("{:?}", meta.name.as_str())
        } else {
            meta.name.to_string()
        }
    }

    /// The rule a symbol belongs to: auxiliary symbols map to their origin.
    pub(crate) fn origin(&self, symbol: Symbol) -> Symbol {
        self.aux_origin.get(&symbol).copied().unwrap_or(symbol)
    }
}
