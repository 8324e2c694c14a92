//! Code generation for grammar packages.
//!
//! [`generate`] compiles a `.lrg` grammar and writes two files into an output
//! directory: `{name}.bin`, the serialized parse table, and `{name}.rs`, a
//! module that embeds the table with `include_bytes!` and declares closed
//! `Kind` and `Field` enums for the grammar's symbols and fields.

use crate::{dump, lrg};
use anyhow::{Context, Result};
use lrtree::table::ParseTable;
use lrtree::{CompileOptions, Grammar, Language, SymbolKind};
use std::collections::HashSet;
use std::io::Write;
use std::path::Path;

/// Canonical names for punctuation in anonymous tokens.
pub const SYM_NAMES: &[(char, &str)] = &[
    ('.', "dot"),
    ('-', "minus"),
    ('~', "tilde"),
    ('`', "backtick"),
    ('!', "exclamation"),
    ('@', "at"),
    ('#', "hash"),
    ('$', "dollar"),
    ('%', "percent"),
    ('^', "caret"),
    ('&', "ampersand"),
    ('*', "asterisk"),
    ('+', "plus"),
    ('=', "equals"),
    ('|', "pipe"),
    ('\\', "backslash"),
    ('<', "lessThan"),
    ('>', "greaterThan"),
    ('?', "question"),
    ('/', "slash"),
    (';', "semicolon"),
    ('(', "leftParen"),
    (')', "rightParen"),
    ('[', "leftBrack"),
    (']', "rightBrack"),
    ('{', "leftBrace"),
    ('}', "rightBrace"),
    (',', "comma"),
    ('\'', "singleQuote"),
    ('"', "doubleQuote"),
    (':', "colon"),
];

fn capitalize_first(s: &str) -> String {
    let mut c = s.chars();
    match c.next() {
        None => String::new(),
        Some(first) => first.to_uppercase().collect::<String>() + c.as_str(),
    }
}

/// `_binary_expression` becomes `BinaryExpression`.
fn pascal_case(name: &str) -> String {
    name.split(|c: char| !c.is_ascii_alphanumeric())
        .map(capitalize_first)
        .collect()
}

/// The variant name of an anonymous token: `KwIf` for keywords,
/// `LessThanEquals` for punctuation.
fn token_variant(text: &str) -> String {
    if !text.is_empty() && text.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return format!("Kw{}", pascal_case(text));
    }
    text.chars()
        .map(|c| match SYM_NAMES.iter().find(|(sym, _)| *sym == c) {
            Some((_, name)) => capitalize_first(name),
            None if c.is_ascii_alphanumeric() => c.to_ascii_uppercase().to_string(),
            None => format!("U{:04X}", c as u32),
        })
        .collect()
}

/// Assigns unique variant names, skipping auxiliary symbols.
fn kind_variants(table: &ParseTable) -> Vec<(u16, String)> {
    let mut used = HashSet::new();
    let mut variants = Vec::new();
    for (i, meta) in table.symbols().iter().enumerate() {
        if meta.kind == SymbolKind::Auxiliary {
            continue;
        }
        let mut name = if i == 0 {
            "End".to_string()
        } else if !meta.named && meta.visible {
            token_variant(&meta.name)
        } else {
            pascal_case(&meta.name)
        };
        if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) || name == "Self" {
            name = format!("T{name}");
        }
        if !used.insert(name.clone()) {
            name = format!("{name}{i}");
            used.insert(name.clone());
        }
        variants.push((i as u16, name));
    }
    variants
}

/// Loads a grammar file and compiles it.
pub fn compile_grammar<P: AsRef<Path>>(path: P, options: &CompileOptions) -> Result<Language> {
    let path = path.as_ref();
    let def = lrg::load_grammar_file(path)?;
    let grammar = Grammar::load(&def).with_context(|| format!("in {}", path.display()))?;
    for warning in grammar.warnings() {
        log::warn!("{}: {warning}", path.display());
    }
    Language::compile(&grammar, options).with_context(|| format!("in {}", path.display()))
}

/// Generates `{name}.bin` and `{name}.rs` in `out_dir` from a grammar file.
///
/// # Parameters
/// - `grammar_path`: Path to the `.lrg` grammar.
/// - `out_dir`: Output directory, created if missing.
/// - `name`: Stem of the output file names.
/// - `options`: Table compiler options.
///
/// # Returns
/// Returns `Ok(())` once both files are written.
pub fn generate<P: AsRef<Path>, Q: AsRef<Path>>(
    grammar_path: P,
    out_dir: Q,
    name: &str,
    options: &CompileOptions,
) -> Result<()> {
    let language = compile_grammar(&grammar_path, options)?;
    let out_dir = out_dir.as_ref();
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("cannot create {}", out_dir.display()))?;

    let bin_name = format!("{name}.bin");
    let bin_path = out_dir.join(&bin_name);
    std::fs::write(&bin_path, language.to_bytes())
        .with_context(|| format!("cannot write {}", bin_path.display()))?;

    let rs_path = out_dir.join(format!("{name}.rs"));
    let mut out = std::io::BufWriter::new(
        std::fs::File::create(&rs_path)
            .with_context(|| format!("cannot write {}", rs_path.display()))?,
    );
    write_module(&mut out, language.table(), &bin_name)?;
    out.flush()?;

    log::info!(
        "generated {} ({} states, {} symbols) and {}",
        rs_path.display(),
        language.table().state_count(),
        language.table().symbol_count(),
        bin_path.display()
    );
    Ok(())
}

/// Writes the Rust module for `table`. The module embeds `bin_name`, which
/// must sit next to it.
pub fn write_module<W: Write>(out: &mut W, table: &ParseTable, bin_name: &str) -> Result<()> {
    let mut listing = Vec::new();
    dump::write_table(&mut listing, table)?;
    // Rust block comments nest.
    let listing = String::from_utf8_lossy(&listing)
        .replace("/*", "/ *")
        .replace("*/", "* /");

    writeln!(out, "/*")?;
    writeln!(out, "Produced by lrtree-gen from grammar {}", table.name())?;
    writeln!(
        out,
        "Copyright (c) 2005-2025 IKH Software, Inc. <support@ikhsoftware.com>"
    )?;
    writeln!(out)?;
    write!(out, "{listing}")?;
    writeln!(out, "*/\n")?;

    writeln!(out, "use lrtree::{{GrammarError, Language}};")?;
    writeln!(out)?;
    writeln!(out, "pub const SYMBOL_COUNT: usize = {};", table.symbol_count())?;
    writeln!(out, "pub const FIELD_COUNT: usize = {};", table.fields().len())?;
    writeln!(out, "pub const STATE_COUNT: usize = {};", table.state_count())?;
    writeln!(out)?;
    writeln!(out, "pub static TABLE: &[u8] = include_bytes!({bin_name:?});")?;
    writeln!(out)?;

    let kinds = kind_variants(table);
    write_enum(out, "Kind", "Node kinds of the grammar's symbols.", &kinds, |id| {
        table.symbol_name(lrtree::Symbol(id)).to_string()
    })?;

    let fields: Vec<(u16, String)> = table
        .fields()
        .iter()
        .enumerate()
        .map(|(i, f)| (i as u16, pascal_case(f)))
        .collect();
    if !fields.is_empty() {
        write_enum(out, "Field", "Field names of the grammar.", &fields, |id| {
            table.fields()[id as usize].to_string()
        })?;
    }

    writeln!(out, "/// Decodes the embedded parse table.")?;
    writeln!(out, "pub fn language() -> Result<Language, GrammarError> {{")?;
    writeln!(out, "    Language::from_bytes(TABLE)")?;
    writeln!(out, "}}")?;
    Ok(())
}

fn write_enum<W: Write>(
    out: &mut W,
    name: &str,
    doc: &str,
    variants: &[(u16, String)],
    label: impl Fn(u16) -> String,
) -> Result<()> {
    writeln!(out, "/// {doc}")?;
    writeln!(
        out,
        "#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]\n#[repr(u16)]\npub enum {name} {{"
    )?;
    for (id, variant) in variants {
        writeln!(out, "    {variant} = {id}, // {:?}", label(*id))?;
    }
    writeln!(out, "}}\n")?;

    writeln!(out, "impl From<{name}> for u16 {{")?;
    writeln!(out, "    fn from(value: {name}) -> u16 {{")?;
    writeln!(out, "        value as u16")?;
    writeln!(out, "    }}")?;
    writeln!(out, "}}\n")?;

    writeln!(out, "impl TryFrom<u16> for {name} {{")?;
    writeln!(out, "    type Error = u16;")?;
    writeln!(out)?;
    writeln!(out, "    fn try_from(value: u16) -> Result<Self, u16> {{")?;
    writeln!(out, "        match value {{")?;
    for (id, variant) in variants {
        writeln!(out, "            {id} => Ok({name}::{variant}),")?;
    }
    writeln!(out, "            other => Err(other),")?;
    writeln!(out, "        }}")?;
    writeln!(out, "    }}")?;
    writeln!(out, "}}\n")?;
    Ok(())
}
