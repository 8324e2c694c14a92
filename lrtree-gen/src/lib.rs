//! Copyright (c) 2005–2025 IKH Software, Inc.
//!
//! Released under the terms of the GNU Lesser General Public License, version 3.0
//! or (at your option) any later version (LGPL-3.0-or-later).
//!
//! Grammar tooling for `lrtree`.
//!
//! `lrtree-gen` provides:
//!  * **`lrg`**: a reader for `.lrg` grammar files producing
//!    [`lrtree::GrammarDef`] values
//!  * **`dump`**: human-readable listings of compiled parse tables
//!  * **`generate`**: a generator writing a serialized table plus a Rust
//!    module with closed `Kind` and `Field` enums
//!
//! The `lrtree` binary (enabled with the `cli` feature) wraps all three.

pub mod dump;
pub mod generate;
pub mod lrg;

pub use generate::{compile_grammar, generate};
pub use lrg::{load_grammar_file, parse_grammar_str};
