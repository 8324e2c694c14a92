//! The handle to a compiled grammar.
//!
//! A [`Language`] bundles the immutable parse table, the lexer built from its
//! token patterns and an optional external scanner. Cloning is cheap and the
//! handle is shared by every parser and tree of the language.
//!
//! # Examples
//!
//! ```rust
//! # use lrtree::{GrammarDef, Language, choice, lit, pat, seq, sym};
//! let def = GrammarDef::new("pairs")
//!     .rule("pair", seq([sym("key"), lit("="), sym("key")]))
//!     .rule("key", pat("[a-z]+"));
//! let language = Language::load(&def).unwrap();
//! let bytes = language.to_bytes();
//! let copy = Language::from_bytes(&bytes).unwrap();
//! assert_eq!(copy.symbol_for_name("key", true), language.symbol_for_name("key", true));
//! ```

use crate::compile::{CompileOptions, compile};
use crate::error::{GrammarError, GrammarWarning};
use crate::grammar::{Grammar, GrammarDef};
use crate::lexer::{ExternalScanner, Lexer};
use crate::symbol::{FieldId, Symbol, SymbolMetadata};
use crate::table::{FORMAT_VERSION, ParseTable};
use std::fmt;
use std::sync::Arc;

#[derive(Clone)]
pub struct Language(Arc<LanguageData>);

struct LanguageData {
    table: ParseTable,
    lexer: Lexer,
    scanner: Option<Arc<dyn ExternalScanner>>,
    warnings: Vec<GrammarWarning>,
}

impl Language {
    /// Version of the serialized table format accepted by [`Language::from_bytes`].
    pub const ABI_VERSION: u32 = FORMAT_VERSION;

    /// Loads and compiles a grammar definition with default options.
    pub fn load(def: &GrammarDef) -> Result<Language, GrammarError> {
        Language::compile(&Grammar::load(def)?, &CompileOptions::default())
    }

    /// Compiles a loaded grammar.
    pub fn compile(grammar: &Grammar, options: &CompileOptions) -> Result<Language, GrammarError> {
        let table = compile(grammar, options)?;
        Language::from_table(table, grammar.warnings().to_vec())
    }

    /// Decodes a table produced by [`Language::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Language, GrammarError> {
        Language::from_table(ParseTable::from_bytes(bytes)?, Vec::new())
    }

    fn from_table(table: ParseTable, warnings: Vec<GrammarWarning>) -> Result<Language, GrammarError> {
        let lexer = Lexer::new(&table)?;
        Ok(Language(Arc::new(LanguageData {
            table,
            lexer,
            scanner: None,
            warnings,
        })))
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.0.table.to_bytes()
    }

    /// Returns a copy of the language that consults `scanner` for its external
    /// tokens.
    pub fn with_external_scanner(&self, scanner: impl ExternalScanner + 'static) -> Language {
        Language(Arc::new(LanguageData {
            table: self.0.table.clone(),
            lexer: self.0.lexer.clone(),
            scanner: Some(Arc::new(scanner)),
            warnings: self.0.warnings.clone(),
        }))
    }

    pub fn name(&self) -> &str {
        self.0.table.name()
    }

    pub fn table(&self) -> &ParseTable {
        &self.0.table
    }

    pub(crate) fn lexer(&self) -> &Lexer {
        &self.0.lexer
    }

    pub(crate) fn scanner(&self) -> Option<&dyn ExternalScanner> {
        self.0.scanner.as_deref()
    }

    /// Findings from loading the grammar. Empty for decoded tables.
    pub fn warnings(&self) -> &[GrammarWarning] {
        &self.0.warnings
    }

    pub fn symbol_count(&self) -> usize {
        self.0.table.symbol_count()
    }

    pub fn symbol_name(&self, symbol: Symbol) -> &str {
        self.0.table.symbol_name(symbol)
    }

    pub fn symbol_metadata(&self, symbol: Symbol) -> &SymbolMetadata {
        self.0.table.symbol_metadata(symbol)
    }

    pub fn symbol_for_name(&self, name: &str, named: bool) -> Option<Symbol> {
        self.0.table.symbol_for_name(name, named)
    }

    pub fn field_count(&self) -> usize {
        self.0.table.fields().len()
    }

    pub fn field_name(&self, field: FieldId) -> &str {
        self.0.table.field_name(field)
    }

    pub fn field_id(&self, name: &str) -> Option<FieldId> {
        self.0.table.field_id(name)
    }

    /// Same underlying table and scanner.
    pub fn ptr_eq(&self, other: &Language) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Language")
            .field("name", &self.name())
            .field("symbols", &self.symbol_count())
            .field("states", &self.0.table.state_count())
            .field("external_scanner", &self.0.scanner.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{lit, pat, seq, sym};

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[test]
    fn languages_are_send_and_sync() {
        fn check<T: Send + Sync>() {}
        check::<Language>();
    }

    #[test]
    fn decoded_language_has_the_same_symbols() {
        init_logger();
        let def = GrammarDef::new("assign")
            .rule("assign", seq([sym("name"), lit(":="), sym("name")]))
            .rule("name", pat("[a-z]+"))
            .rule("unused", lit("?"));
        let language = Language::load(&def).unwrap();
        assert_eq!(language.warnings().len(), 1);
        let copy = Language::from_bytes(&language.to_bytes()).unwrap();
        assert_eq!(copy.symbol_count(), language.symbol_count());
        assert_eq!(copy.symbol_for_name(":=", false), language.symbol_for_name(":=", false));
        assert!(copy.warnings().is_empty());
        assert!(!copy.ptr_eq(&language));
        assert_eq!(Language::ABI_VERSION, FORMAT_VERSION);
    }
}
