//! Human-readable listings of a compiled [`ParseTable`].
//!
//! The listing is a sequence of sections, each introduced by a count line:
//!
//! ```text
//! SYMBOLS,7
//! S,0,end,terminal,hidden
//! ...
//! PRODUCTIONS,4
//! P,0,start' -> program
//! ...
//! STATES,6
//! STATE,0,mode 1
//!   program -> • statement
//!   "a" shift 3
//!   program goto 1
//! ...
//! RESOLUTIONS,1
//! R,4,"+",reduce 2,[shift 5],Associativity
//! ```
//!
//! The same text heads every module written by [`generate`](crate::generate).

use anyhow::Result;
use lrtree::table::{ParseAction, ParseTable, StateId};
use lrtree::{Symbol, SymbolKind};
use std::io::Write;

/// Writes the full listing: symbols, productions, states and conflict
/// resolutions.
///
/// # Parameters
/// - `out`: The output writer (e.g., file, buffer, or stdout).
/// - `table`: The compiled table to describe.
///
/// # Returns
/// Returns `Ok(())` on success or the writer's error.
pub fn write_table<W: Write>(out: &mut W, table: &ParseTable) -> Result<()> {
    write_symbols(out, table)?;
    writeln!(out)?;
    write_productions(out, table)?;
    writeln!(out)?;
    write_states(out, table)?;
    writeln!(out)?;
    write_resolutions(out, table)?;
    Ok(())
}

pub fn write_symbols<W: Write>(out: &mut W, table: &ParseTable) -> Result<()> {
    writeln!(out, "SYMBOLS,{}", table.symbol_count())?;
    for (i, meta) in table.symbols().iter().enumerate() {
        let kind = match meta.kind {
            SymbolKind::Terminal => "terminal",
            SymbolKind::External => "external",
            SymbolKind::Nonterminal => "nonterminal",
            SymbolKind::Auxiliary => "auxiliary",
        };
        write!(
            out,
            "S,{},{},{},{}",
            i,
            table.display_symbol(Symbol(i as u16)),
            kind,
            if meta.visible { "visible" } else { "hidden" }
        )?;
        if meta.extra {
            write!(out, ",extra")?;
        }
        writeln!(out)?;
    }
    Ok(())
}

pub fn write_productions<W: Write>(out: &mut W, table: &ParseTable) -> Result<()> {
    writeln!(out, "PRODUCTIONS,{}", table.productions().len())?;
    for (i, prod) in table.productions().iter().enumerate() {
        write!(out, "P,{},{} ->", i, table.symbol_name(prod.lhs))?;
        for (symbol, field) in prod.rhs.iter().zip(&prod.fields) {
            match field {
                Some(field) => write!(
                    out,
                    " {}:{}",
                    table.field_name(*field),
                    table.display_symbol(*symbol)
                )?,
                None => write!(out, " {}", table.display_symbol(*symbol))?,
            }
        }
        if prod.dynamic_precedence != 0 {
            write!(out, " [dynamic {}]", prod.dynamic_precedence)?;
        }
        writeln!(out)?;
    }
    Ok(())
}

/// Writes every state with its lex mode, kernel items, actions and gotos.
pub fn write_states<W: Write>(out: &mut W, table: &ParseTable) -> Result<()> {
    writeln!(out, "STATES,{}", table.state_count())?;
    for i in 0..table.state_count() {
        let state = StateId(i as u32);
        writeln!(out, "STATE,{},mode {}", i, table.lex_mode(state).0)?;
        for item in table.kernel(state) {
            writeln!(out, "  {}", table.item_display(*item))?;
        }
        for s in 0..table.symbol_count() {
            let symbol = Symbol(s as u16);
            match table.action(state, symbol) {
                ParseAction::Error => {}
                ParseAction::Ambig(ambig) => {
                    let actions: Vec<String> =
                        table.ambig(ambig).iter().map(|a| a.to_string()).collect();
                    writeln!(
                        out,
                        "  {} {} {{{}}}",
                        table.display_symbol(symbol),
                        ParseAction::Ambig(ambig),
                        actions.join(", ")
                    )?;
                }
                action => writeln!(out, "  {} {}", table.display_symbol(symbol), action)?,
            }
        }
    }
    Ok(())
}

pub fn write_resolutions<W: Write>(out: &mut W, table: &ParseTable) -> Result<()> {
    writeln!(out, "RESOLUTIONS,{}", table.resolutions().len())?;
    for r in table.resolutions() {
        let discarded: Vec<String> = r.discarded.iter().map(|a| a.to_string()).collect();
        writeln!(
            out,
            "R,{},{},{},[{}],{:?}",
            r.state.0,
            table.display_symbol(r.lookahead),
            r.kept,
            discarded.join(", "),
            r.reason
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lrtree::{GrammarDef, Language, lit, prec_left, seq, sym};

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn listing(def: &GrammarDef) -> String {
        let language = Language::load(def).unwrap();
        let mut out = Vec::new();
        write_table(&mut out, language.table()).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn listing_has_every_section() {
        init_logger();
        let def = GrammarDef::new("pair")
            .rule("pair", seq([lit("("), sym("atom"), lit(")")]))
            .rule("atom", lrtree::pat("[a-z]+"));
        let text = listing(&def);
        assert!(text.starts_with("SYMBOLS,"));
        assert!(text.contains("P,0,start' -> pair"));
        assert!(text.contains("P,1,pair -> \"(\" atom \")\""));
        assert!(text.contains("STATE,0,mode "));
        assert!(text.contains("  pair -> \"(\" • atom \")\""));
        assert!(text.contains("\"(\" shift "));
        assert!(text.contains("RESOLUTIONS,0"));
    }

    #[test]
    fn resolutions_are_listed() {
        init_logger();
        let def = GrammarDef::new("sums")
            .rule("expr", lrtree::choice([sym("sum"), sym("num")]))
            .rule(
                "sum",
                prec_left(1, seq([lrtree::field("left", sym("expr")), lit("+"), sym("expr")])),
            )
            .rule("num", lrtree::pat("[0-9]+"));
        let text = listing(&def);
        assert!(text.contains("sum -> left:expr \"+\" expr"), "{text}");
        let resolutions = text
            .lines()
            .find(|line| line.starts_with("RESOLUTIONS,"))
            .unwrap();
        assert_ne!(resolutions, "RESOLUTIONS,0");
        assert!(text.contains(",Associativity"));
    }

    #[test]
    fn listing_is_deterministic() {
        let def = GrammarDef::new("list")
            .rule("list", lrtree::repeat(sym("word")))
            .rule("word", lrtree::pat("[a-z]+"));
        assert_eq!(listing(&def), listing(&def));
    }
}
