//! The grammar definition DSL.
//!
//! A [`GrammarDef`] is plain data describing rules the way a grammar author
//! writes them: nested [`Rule`] expressions built with [`seq`], [`choice`],
//! [`repeat`], [`optional`], [`prec_left`] and friends. It is validated and
//! normalized into a [`Grammar`](super::Grammar) by
//! [`Grammar::load`](super::Grammar::load).
//!
//! # Examples
//!
//! ```rust
//! use lrtree::{GrammarDef, choice, lit, pat, prec_left, seq, sym};
//!
//! let def = GrammarDef::new("arith")
//!     .rule("expr", choice([
//!         sym("number"),
//!         prec_left(1, seq([sym("expr"), lit("+"), sym("expr")])),
//!         prec_left(2, seq([sym("expr"), lit("*"), sym("expr")])),
//!     ]))
//!     .rule("number", pat(r"[0-9]+"));
//! assert_eq!(def.rules.len(), 2);
//! ```

use smartstring::alias::String;

/// How operators of equal precedence group.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Associativity {
    Left,
    Right,
    /// Chaining operators of this precedence is a syntax error.
    NonAssoc,
}

/// A rule body expression.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Rule {
    /// Matches nothing.
    Blank,
    /// An exact string token.
    Literal(String),
    /// A regular-expression token.
    Pattern(String),
    /// A reference to a rule, lexical rule or external token by name.
    Symbol(String),
    Seq(Vec<Rule>),
    Choice(Vec<Rule>),
    /// Zero or more.
    Repeat(Box<Rule>),
    /// One or more.
    Repeat1(Box<Rule>),
    Optional(Box<Rule>),
    /// Static precedence for conflict resolution at compile time.
    Prec {
        value: i32,
        assoc: Option<Associativity>,
        rule: Box<Rule>,
    },
    /// Precedence used to pick between competing parse versions at runtime.
    DynamicPrec { value: i32, rule: Box<Rule> },
    /// Labels the children produced by `rule`.
    Field { name: String, rule: Box<Rule> },
    /// Collapses a lexical expression into a single token.
    Token(Box<Rule>),
}

impl Rule {
    /// Is this rule lexical as a whole (a literal, a pattern or a token)?
    pub fn is_lexical(&self) -> bool {
        matches!(self, Rule::Literal(_) | Rule::Pattern(_) | Rule::Token(_))
    }
}

pub fn blank() -> Rule {
    Rule::Blank
}

pub fn lit(text: &str) -> Rule {
    Rule::Literal(text.into())
}

pub fn pat(pattern: &str) -> Rule {
    Rule::Pattern(pattern.into())
}

pub fn sym(name: &str) -> Rule {
    Rule::Symbol(name.into())
}

pub fn seq(rules: impl IntoIterator<Item = Rule>) -> Rule {
    Rule::Seq(rules.into_iter().collect())
}

pub fn choice(rules: impl IntoIterator<Item = Rule>) -> Rule {
    Rule::Choice(rules.into_iter().collect())
}

pub fn repeat(rule: Rule) -> Rule {
    Rule::Repeat(Box::new(rule))
}

pub fn repeat1(rule: Rule) -> Rule {
    Rule::Repeat1(Box::new(rule))
}

pub fn optional(rule: Rule) -> Rule {
    Rule::Optional(Box::new(rule))
}

pub fn prec(value: i32, rule: Rule) -> Rule {
    Rule::Prec {
        value,
        assoc: None,
        rule: Box::new(rule),
    }
}

pub fn prec_left(value: i32, rule: Rule) -> Rule {
    Rule::Prec {
        value,
        assoc: Some(Associativity::Left),
        rule: Box::new(rule),
    }
}

pub fn prec_right(value: i32, rule: Rule) -> Rule {
    Rule::Prec {
        value,
        assoc: Some(Associativity::Right),
        rule: Box::new(rule),
    }
}

pub fn prec_dynamic(value: i32, rule: Rule) -> Rule {
    Rule::DynamicPrec {
        value,
        rule: Box::new(rule),
    }
}

pub fn field(name: &str, rule: Rule) -> Rule {
    Rule::Field {
        name: name.into(),
        rule: Box::new(rule),
    }
}

pub fn token(rule: Rule) -> Rule {
    Rule::Token(Box::new(rule))
}

/// `rule (sep rule)*`
pub fn sep_by1(sep: Rule, rule: Rule) -> Rule {
    seq([rule.clone(), repeat(seq([sep, rule]))])
}

/// `(rule (sep rule)*)?`
pub fn sep_by(sep: Rule, rule: Rule) -> Rule {
    optional(sep_by1(sep, rule))
}

/// A token precedence declaration, like a yacc `%left` line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PrecedenceDecl {
    pub level: i32,
    pub assoc: Option<Associativity>,
    /// Literals or token names.
    pub tokens: Vec<Rule>,
}

/// A complete grammar definition, before validation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GrammarDef {
    pub name: String,
    /// Rules in definition order. The first rule is the default start rule.
    pub rules: Vec<(String, Rule)>,
    pub start: Option<String>,
    /// Tokens allowed anywhere between other tokens. `None` means whitespace.
    pub extras: Option<Vec<Rule>>,
    /// The identifier-like token used for keyword extraction.
    pub word: Option<String>,
    /// Tokens produced by the external scanner.
    pub externals: Vec<String>,
    /// Sets of rules whose conflicts are resolved at runtime by forking.
    pub conflicts: Vec<Vec<String>>,
    pub precedences: Vec<PrecedenceDecl>,
}

impl GrammarDef {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn rule(mut self, name: &str, rule: Rule) -> Self {
        self.rules.push((name.into(), rule));
        self
    }

    pub fn start(mut self, name: &str) -> Self {
        self.start = Some(name.into());
        self
    }

    pub fn extras(mut self, extras: impl IntoIterator<Item = Rule>) -> Self {
        self.extras = Some(extras.into_iter().collect());
        self
    }

    pub fn word(mut self, name: &str) -> Self {
        self.word = Some(name.into());
        self
    }

    pub fn externals<'a>(mut self, names: impl IntoIterator<Item = &'a str>) -> Self {
        self.externals.extend(names.into_iter().map(String::from));
        self
    }

    pub fn conflict<'a>(mut self, names: impl IntoIterator<Item = &'a str>) -> Self {
        self.conflicts
            .push(names.into_iter().map(String::from).collect());
        self
    }

    pub fn precedence(
        mut self,
        level: i32,
        assoc: Option<Associativity>,
        tokens: impl IntoIterator<Item = Rule>,
    ) -> Self {
        self.precedences.push(PrecedenceDecl {
            level,
            assoc,
            tokens: tokens.into_iter().collect(),
        });
        self
    }
}
