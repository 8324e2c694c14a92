//! Copyright (c) 2005–2025 IKH Software, Inc.
//!
//! Released under the terms of the GNU Lesser General Public License, version 3.0
//! or (at your option) any later version (LGPL-3.0-or-later).
//!
//! Table-driven, error-tolerant, incremental LR parsing.
//!
//! `lrtree` compiles a grammar written with the rule builders into an LALR(1)
//! [`ParseTable`](table::ParseTable) and parses text with it into concrete
//! syntax trees:
//!  * **Total parsing**: every input yields a tree spanning all of it;
//!    unexpected text becomes `ERROR` nodes and absent tokens become
//!    zero-width `MISSING` nodes.
//!  * **Incremental reparsing**: after an [`InputEdit`], unchanged subtrees
//!    of the old tree are reused and shared with the new one.
//!  * **Declared ambiguity**: table entries of declared conflicts keep every
//!    action and are explored by forking stack versions.
//!
//! # Examples
//!
//! ```rust
//! use lrtree::{GrammarDef, InputEdit, Language, Parser, choice, field, lit, pat, prec_left, repeat, seq, sym};
//!
//! let def = GrammarDef::new("sums")
//!     .rule("program", repeat(sym("statement")))
//!     .rule("statement", seq([sym("_expression"), lit(";")]))
//!     .rule("_expression", choice([sym("sum"), sym("number")]))
//!     .rule(
//!         "sum",
//!         prec_left(1, seq([field("left", sym("_expression")), lit("+"), field("right", sym("_expression"))])),
//!     )
//!     .rule("number", pat("[0-9]+"));
//! let language = Language::load(&def).unwrap();
//! let mut parser = Parser::new(&language);
//!
//! let text = "1 + 2;";
//! let tree = parser.parse(text, None);
//! assert_eq!(
//!     tree.root_node().to_sexp(),
//!     "(program (statement (sum left: (number) right: (number))))"
//! );
//!
//! let edit = InputEdit::replace(text.as_bytes(), 4..5, b"20");
//! let tree = parser.reparse(&tree, &edit, "1 + 20;");
//! let sum = tree.root_node().child(0).unwrap().child(0).unwrap();
//! assert_eq!(sum.child_by_field_name("right").unwrap().byte_range(), 4..6);
//! ```

pub mod compile;
mod edit;
mod error;
pub mod grammar;
mod language;
pub mod lexer;
mod parser;
mod position;
mod subtree;
mod symbol;
pub mod table;
mod tree;

pub use crate::compile::{CompileOptions, ConflictPolicy};
pub use crate::edit::InputEdit;
pub use crate::error::{Conflict, ConflictKind, GrammarError, GrammarWarning, Malformed};
pub use crate::grammar::{
    Associativity, Grammar, GrammarDef, Rule, blank, choice, field, lit, optional, pat, prec,
    prec_dynamic, prec_left, prec_right, repeat, repeat1, sep_by, sep_by1, seq, sym, token,
};
pub use crate::language::Language;
pub use crate::lexer::{ChunkedInput, ExternalScanner, ScanCursor, TextInput, ValidSymbols};
pub use crate::parser::{
    CostRanking, ParseOptions, Parser, ParserStats, RecoveryCandidate, RecoveryStrategy,
};
pub use crate::position::{Length, Point, Range};
pub use crate::subtree::{
    ERROR_COST_PER_MISSING_TREE, ERROR_COST_PER_RECOVERY, ERROR_COST_PER_SKIPPED_CHAR,
    ERROR_COST_PER_SKIPPED_LINE, ERROR_COST_PER_SKIPPED_TREE,
};
pub use crate::symbol::{FieldId, Symbol, SymbolKind, SymbolMetadata};
pub use crate::tree::{Node, ParseStatus, Tree, TreeCursor};
