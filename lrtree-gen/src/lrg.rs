//! Reader for the `.lrg` grammar text format.
//!
//! A grammar file is a sequence of rules and directives, each terminated by
//! `;`:
//!
//! ```text
//! %grammar calc;
//! %extras comment /\s/;
//! %left "+" "-";
//! %left "*" "/";
//!
//! program -> statement* ;
//! statement -> _expression ";" ;
//! _expression -> binary | number | "(" _expression ")" ;
//! binary -> left:_expression op:("+" | "-" | "*" | "/") right:_expression ;
//! number -> /[0-9]+/ ;
//! comment -> /#[^\n]*/ ;
//! ```
//!
//! Rule bodies use `|` for alternatives, juxtaposition for sequences, the
//! postfix operators `*`, `+` and `?`, parentheses, `"literals"`, `/regex/`,
//! `field:expr` and the builtins `blank()`, `token(expr)`, `prec(n, expr)`,
//! `prec_left([n,] expr)`, `prec_right([n,] expr)` and `prec_dynamic(n, expr)`.
//!
//! Directives: `%grammar`, `%start`, `%word`, `%extras`, `%externals`,
//! `%conflicts` (one set per directive) and `%left` / `%right` / `%nonassoc`,
//! which declare token precedence levels in increasing order like yacc.

mod lexer;
mod parser;

use anyhow::{Context, Result, anyhow, bail};
use chumsky::Parser;
use lrtree::GrammarDef;
use parser::{Arg, Item};
use std::path::Path;

/// Parses grammar text into a [`GrammarDef`].
///
/// # Parameters
/// - `source`: The grammar text.
/// - `default_name`: Grammar name used when there is no `%grammar` directive.
///
/// # Returns
/// The definition, or an error with the line and column of the first problem.
pub fn parse_grammar_str(source: &str, default_name: &str) -> Result<GrammarDef> {
    let spanned = lexer::tokenize(source)?;
    let tokens: Vec<lexer::Token> = spanned.iter().map(|(token, _)| token.clone()).collect();
    let offset_of = |index: usize| {
        spanned
            .get(index)
            .map_or(source.len(), |(_, span)| span.start)
    };
    let items = parser::parser()
        .parse(&tokens)
        .into_result()
        .map_err(|errors| {
            let messages: Vec<String> = errors
                .iter()
                .map(|err| {
                    let (line, column) = lexer::line_col(source, offset_of(err.span().start));
                    format!("{line}:{column}: {err}")
                })
                .collect();
            anyhow!(messages.join("\n"))
        })?;

    let mut def = GrammarDef::new(default_name);
    let mut level = 0;
    for item in items {
        match item {
            Item::Rule { name, body } => def = def.rule(&name, body),
            Item::Directive { name, args, at } => {
                let (line, column) = lexer::line_col(source, offset_of(at));
                def = directive(def, &name, &args, &mut level)
                    .with_context(|| format!("{line}:{column}: in %{name}"))?;
            }
        }
    }
    log::debug!(
        "read grammar {}: {} rules, {} precedence levels",
        def.name,
        def.rules.len(),
        level
    );
    Ok(def)
}

/// Reads a grammar file. The file stem names the grammar unless the file has
/// a `%grammar` directive.
pub fn load_grammar_file<P: AsRef<Path>>(path: P) -> Result<GrammarDef> {
    let path = path.as_ref();
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read grammar {}", path.display()))?;
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("grammar");
    parse_grammar_str(&source, stem).with_context(|| format!("in {}", path.display()))
}

fn directive(def: GrammarDef, name: &str, args: &[Arg], level: &mut i32) -> Result<GrammarDef> {
    let names = || -> Result<Vec<&str>> {
        args.iter()
            .map(|arg| match arg {
                Arg::Ident(name) => Ok(name.as_str()),
                other => Err(anyhow!("expected a name, found {other:?}")),
            })
            .collect()
    };
    let single = || -> Result<&str> {
        match names()?[..] {
            [name] => Ok(name),
            _ => bail!("expected exactly one name"),
        }
    };
    let rules = || -> Result<Vec<lrtree::Rule>> {
        args.iter()
            .map(|arg| {
                arg.to_rule()
                    .ok_or_else(|| anyhow!("expected a name, literal or pattern, found {arg:?}"))
            })
            .collect()
    };
    Ok(match name {
        "grammar" => {
            let mut def = def;
            def.name = single()?.into();
            def
        }
        "start" => def.start(single()?),
        "word" => def.word(single()?),
        "extras" => def.extras(rules()?),
        "externals" => def.externals(names()?),
        "conflicts" => def.conflict(names()?),
        "left" | "right" | "nonassoc" => {
            *level += 1;
            def.precedence(*level, parser::associativity(name), rules()?)
        }
        other => bail!("unknown directive %{other}"),
    })
}
