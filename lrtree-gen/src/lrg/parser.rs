use super::lexer::Token;
use chumsky::prelude::*;
use lrtree::grammar as g;
use lrtree::{Associativity, Rule};
use smartstring::alias::String;

/// A top-level declaration of a grammar file.
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    /// `name -> alternatives ;`
    Rule { name: String, body: Rule },
    /// `%name args ;`, with the index of the directive token.
    Directive {
        name: String,
        args: Vec<Arg>,
        at: usize,
    },
}

/// A directive argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Ident(String),
    Str(String),
    Regex(String),
    Int(i32),
}

impl Arg {
    /// The argument as a rule expression, as used by `%extras` and the
    /// precedence directives.
    pub fn to_rule(&self) -> Option<Rule> {
        match self {
            Arg::Ident(name) => Some(g::sym(name)),
            Arg::Str(text) => Some(g::lit(text)),
            Arg::Regex(pattern) => Some(g::pat(pattern)),
            Arg::Int(_) => None,
        }
    }
}

type Extra<'a> = extra::Err<Rich<'a, Token>>;

const BUILTINS: &[&str] = &[
    "blank",
    "token",
    "prec",
    "prec_left",
    "prec_right",
    "prec_dynamic",
];

fn builtin(name: &str, level: Option<i32>, body: Option<Rule>) -> Result<Rule, std::string::String> {
    // An empty argument list parses as a blank expression.
    let body = body.filter(|body| *body != Rule::Blank);
    match (name, level, body) {
        ("blank", None, None) => Ok(g::blank()),
        ("token", None, Some(body)) => Ok(g::token(body)),
        ("prec", Some(n), Some(body)) => Ok(g::prec(n, body)),
        ("prec_left", n, Some(body)) => Ok(g::prec_left(n.unwrap_or(0), body)),
        ("prec_right", n, Some(body)) => Ok(g::prec_right(n.unwrap_or(0), body)),
        ("prec_dynamic", Some(n), Some(body)) => Ok(g::prec_dynamic(n, body)),
        ("blank", ..) => Err("blank() takes no arguments".into()),
        ("token", ..) => Err("token(expr) takes one expression".into()),
        (name, ..) => Err(format!("{name}(n, expr) needs a precedence and an expression")),
    }
}

/// The grammar file parser over the token stream.
pub fn parser<'a>() -> impl Parser<'a, &'a [Token], Vec<Item>, Extra<'a>> {
    let ident = select! { Token::Ident(name) => name }.labelled("identifier");
    let int = select! { Token::Int(n) => n }.labelled("integer");

    let body = recursive(|alternatives| {
        let call = select! { Token::Ident(name) if BUILTINS.contains(&name.as_str()) => name }
            .then_ignore(just(Token::LParen))
            .then(int.then_ignore(just(Token::Comma)).or_not())
            .then(alternatives.clone().or_not())
            .then_ignore(just(Token::RParen))
            .try_map(|((name, level), body), span| {
                builtin(&name, level, body).map_err(|msg| Rich::custom(span, msg))
            });

        let group = alternatives
            .clone()
            .delimited_by(just(Token::LParen), just(Token::RParen));

        let atom = choice((
            call,
            group,
            select! {
                Token::Str(text) => g::lit(&text),
                Token::Regex(pattern) => g::pat(&pattern),
                Token::Ident(name) if !BUILTINS.contains(&name.as_str()) => g::sym(&name),
            }
            .labelled("expression"),
        ));

        let postfix = atom.foldl(
            select! {
                Token::Star => '*',
                Token::Plus => '+',
                Token::Question => '?',
            }
            .repeated(),
            |rule, op| match op {
                '*' => g::repeat(rule),
                '+' => g::repeat1(rule),
                _ => g::optional(rule),
            },
        );

        let element = ident
            .clone()
            .then_ignore(just(Token::Colon))
            .then(postfix.clone())
            .map(|(name, rule)| g::field(&name, rule))
            .or(postfix);

        let sequence = element
            .repeated()
            .collect::<Vec<_>>()
            .map(|mut rules| match rules.len() {
                0 => g::blank(),
                1 => rules.remove(0),
                _ => g::seq(rules),
            });

        sequence
            .separated_by(just(Token::Pipe))
            .at_least(1)
            .collect::<Vec<_>>()
            .map(|mut alternatives| {
                if alternatives.len() == 1 {
                    alternatives.remove(0)
                } else {
                    g::choice(alternatives)
                }
            })
    });

    let rule = ident
        .then_ignore(just(Token::Arrow))
        .then(body)
        .then_ignore(just(Token::Semi).labelled("`;`"))
        .map(|(name, body)| Item::Rule { name, body });

    let arg = select! {
        Token::Ident(name) => Arg::Ident(name),
        Token::Str(text) => Arg::Str(text),
        Token::Regex(pattern) => Arg::Regex(pattern),
        Token::Int(n) => Arg::Int(n),
    };

    let directive = select! { Token::Directive(name) => name }
        .map_with(|name, e| {
            let span: SimpleSpan = e.span();
            (name, span.start)
        })
        .then(arg.repeated().collect::<Vec<_>>())
        .then_ignore(just(Token::Semi).labelled("`;`"))
        .map(|((name, at), args)| Item::Directive { name, args, at });

    choice((directive, rule))
        .repeated()
        .collect::<Vec<_>>()
        .then_ignore(end())
}

/// Associativity named by a precedence directive.
pub fn associativity(directive: &str) -> Option<Associativity> {
    match directive {
        "left" => Some(Associativity::Left),
        "right" => Some(Associativity::Right),
        "nonassoc" => Some(Associativity::NonAssoc),
        _ => None,
    }
}
