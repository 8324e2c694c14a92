use super::rule::{Associativity, GrammarDef, Rule};
use super::{Grammar, Production, Step, TokenDef};
use crate::error::{GrammarError, GrammarWarning, Malformed};
use crate::lexer::syntax_config;
use crate::symbol::{FieldId, Symbol, SymbolKind, SymbolMetadata};
use indexmap::IndexMap;
use regex_automata::meta;
use smartstring::alias::String;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

const START_NAME: &str = "start'";

/// An expanded alternative: a flat sequence of steps plus the attributes that
/// apply to the alternative as a whole.
#[derive(Clone, Debug, Default)]
struct Alternative {
    steps: Vec<Step>,
    precedence: Option<(i32, Option<Associativity>)>,
    dynamic: i32,
}

impl Alternative {
    fn single(symbol: Symbol) -> Self {
        Alternative {
            steps: vec![Step {
                symbol,
                field: None,
                precedence: None,
                associativity: None,
            }],
            ..Alternative::default()
        }
    }

    fn concat(&self, other: &Alternative) -> Alternative {
        let mut steps = self.steps.clone();
        steps.extend(other.steps.iter().cloned());
        Alternative {
            steps,
            precedence: other.precedence.or(self.precedence),
            dynamic: if other.dynamic != 0 {
                other.dynamic
            } else {
                self.dynamic
            },
        }
    }

    fn into_production(self, lhs: Symbol) -> Production {
        Production {
            lhs,
            steps: self.steps,
            precedence: self.precedence.map(|(value, _)| value),
            associativity: self.precedence.and_then(|(_, assoc)| assoc),
            dynamic_precedence: self.dynamic,
        }
    }
}

/// Compiles `^(?:pattern)$` with the lexer's syntax settings.
pub(crate) fn full_match(pattern: &str) -> Result<meta::Regex, std::string::String> {
    meta::Builder::new()
        .syntax(syntax_config())
        .build(&format!("^(?:{pattern})$"))
        .map_err(|err| err.to_string())
}

/// Regex source for the body of a `token(..)`.
fn token_pattern(rule: &Rule, owner: &str) -> Result<std::string::String, Malformed> {
    Ok(match rule {
        Rule::Blank => std::string::String::new(),
        Rule::Literal(text) => regex_syntax::escape(text),
        Rule::Pattern(pattern) => format!("(?:{pattern})"),
        Rule::Seq(items) => {
            let mut out = std::string::String::new();
            for item in items {
                out.push_str(&token_pattern(item, owner)?);
            }
            out
        }
        Rule::Choice(items) => {
            let parts = items
                .iter()
                .map(|item| token_pattern(item, owner))
                .collect::<Result<Vec<_>, _>>()?;
            format!("(?:{})", parts.join("|"))
        }
        Rule::Repeat(inner) => format!("(?:{})*", token_pattern(inner, owner)?),
        Rule::Repeat1(inner) => format!("(?:{})+", token_pattern(inner, owner)?),
        Rule::Optional(inner) => format!("(?:{})?", token_pattern(inner, owner)?),
        Rule::Prec { rule, .. }
        | Rule::DynamicPrec { rule, .. }
        | Rule::Field { rule, .. }
        | Rule::Token(rule) => token_pattern(rule, owner)?,
        Rule::Symbol(name) => {
            return Err(Malformed::InvalidPattern {
                token: owner.to_string(),
                message: format!("a token cannot reference the symbol `{name}`"),
            });
        }
    })
}

/// Pattern and literal flag of a lexical rule body, `None` for syntactic rules.
fn lexical_pattern(
    rule: &Rule,
    owner: &str,
) -> Result<Option<(std::string::String, Option<String>)>, Malformed> {
    Ok(match rule {
        Rule::Literal(text) => Some((regex_syntax::escape(text), Some(text.clone()))),
        Rule::Pattern(pattern) => Some((pattern.to_string(), None)),
        Rule::Token(inner) => {
            let text = match &**inner {
                Rule::Literal(text) => Some(text.clone()),
                _ => None,
            };
            Some((token_pattern(inner, owner)?, text))
        }
        _ => None,
    })
}

fn push_symbol(
    symbols: &mut Vec<SymbolMetadata>,
    data: SymbolMetadata,
) -> Result<Symbol, Malformed> {
    // u16::MAX is reserved for ERROR
    if symbols.len() >= u16::MAX as usize {
        return Err(Malformed::TooManySymbols(symbols.len() + 1));
    }
    symbols.push(data);
    Ok(Symbol((symbols.len() - 1) as u16))
}

fn metadata(name: &str, kind: SymbolKind, visible: bool, named: bool) -> SymbolMetadata {
    SymbolMetadata {
        name: name.into(),
        kind,
        visible,
        named,
        extra: false,
    }
}

/// Terminal symbols created for literals and patterns used inside rules.
#[derive(Default)]
struct InlineTerminals {
    literals: HashMap<String, Symbol>,
    patterns: HashMap<std::string::String, Symbol>,
    counters: HashMap<String, usize>,
}

impl InlineTerminals {
    fn collect(
        &mut self,
        rule: &Rule,
        owner: &str,
        symbols: &mut Vec<SymbolMetadata>,
        tokens: &mut Vec<TokenDef>,
        literal_texts: &mut BTreeMap<Symbol, String>,
    ) -> Result<(), Malformed> {
        match rule {
            Rule::Literal(text) => self.literal(text, symbols, tokens, literal_texts)?,
            Rule::Pattern(pattern) => self.pattern(pattern.to_string(), owner, symbols, tokens)?,
            Rule::Token(inner) => match &**inner {
                Rule::Literal(text) => self.literal(text, symbols, tokens, literal_texts)?,
                _ => {
                    let pattern = token_pattern(inner, owner)?;
                    self.pattern(pattern, owner, symbols, tokens)?;
                }
            },
            Rule::Seq(items) | Rule::Choice(items) => {
                for item in items {
                    self.collect(item, owner, symbols, tokens, literal_texts)?;
                }
            }
            Rule::Repeat(inner) | Rule::Repeat1(inner) | Rule::Optional(inner) => {
                self.collect(inner, owner, symbols, tokens, literal_texts)?
            }
            Rule::Prec { rule, .. } | Rule::DynamicPrec { rule, .. } | Rule::Field { rule, .. } => {
                self.collect(rule, owner, symbols, tokens, literal_texts)?
            }
            Rule::Blank | Rule::Symbol(_) => {}
        }
        Ok(())
    }

    fn literal(
        &mut self,
        text: &str,
        symbols: &mut Vec<SymbolMetadata>,
        tokens: &mut Vec<TokenDef>,
        literal_texts: &mut BTreeMap<Symbol, String>,
    ) -> Result<(), Malformed> {
        if !self.literals.contains_key(text) {
            let symbol = push_symbol(symbols, metadata(text, SymbolKind::Terminal, true, false))?;
            self.literals.insert(text.into(), symbol);
            literal_texts.insert(symbol, text.into());
            tokens.push(TokenDef {
                symbol,
                pattern: regex_syntax::escape(text).into(),
                literal: true,
            });
        }
        Ok(())
    }

    fn pattern(
        &mut self,
        pattern: std::string::String,
        owner: &str,
        symbols: &mut Vec<SymbolMetadata>,
        tokens: &mut Vec<TokenDef>,
    ) -> Result<(), Malformed> {
        if !self.patterns.contains_key(&pattern) {
            let counter = self.counters.entry(owner.into()).or_insert(0);
            *counter += 1;
            let name = format!("{owner}_token{counter}");
            let symbol = push_symbol(symbols, metadata(&name, SymbolKind::Terminal, false, false))?;
            tokens.push(TokenDef {
                symbol,
                pattern: pattern.as_str().into(),
                literal: false,
            });
            self.patterns.insert(pattern, symbol);
        }
        Ok(())
    }
}

/// Expands rule expressions into flat alternatives, creating auxiliary
/// symbols for repetitions.
struct Expander<'a> {
    by_name: &'a HashMap<String, Symbol>,
    inline: &'a InlineTerminals,
    fields: &'a BTreeMap<String, FieldId>,
    symbols: &'a mut Vec<SymbolMetadata>,
    aux: Vec<(Symbol, Vec<Alternative>)>,
    aux_origin: BTreeMap<Symbol, Symbol>,
    rule: String,
    rule_symbol: Symbol,
    repeat_count: usize,
}

impl Expander<'_> {
    fn begin(&mut self, rule: &str, symbol: Symbol) {
        self.rule = rule.into();
        self.rule_symbol = symbol;
        self.repeat_count = 0;
    }

    fn expand(&mut self, rule: &Rule) -> Result<Vec<Alternative>, Malformed> {
        Ok(match rule {
            Rule::Blank => vec![Alternative::default()],
            Rule::Literal(text) => vec![Alternative::single(self.inline.literals[text.as_str()])],
            Rule::Pattern(pattern) => {
                vec![Alternative::single(self.inline.patterns[pattern.as_str()])]
            }
            Rule::Token(inner) => {
                let symbol = match &**inner {
                    Rule::Literal(text) => self.inline.literals[text.as_str()],
                    _ => self.inline.patterns[&token_pattern(inner, &self.rule)?],
                };
                vec![Alternative::single(symbol)]
            }
            Rule::Symbol(name) => match self.by_name.get(name.as_str()) {
                Some(&symbol) => vec![Alternative::single(symbol)],
                None => {
                    return Err(Malformed::UndefinedSymbol {
                        rule: self.rule.to_string(),
                        symbol: name.to_string(),
                    });
                }
            },
            Rule::Seq(items) => {
                let mut acc = vec![Alternative::default()];
                for item in items {
                    let parts = self.expand(item)?;
                    let mut next = Vec::with_capacity(acc.len() * parts.len());
                    for prefix in &acc {
                        for part in &parts {
                            next.push(prefix.concat(part));
                        }
                    }
                    acc = next;
                }
                acc
            }
            Rule::Choice(items) => {
                let mut alts = Vec::new();
                for item in items {
                    alts.extend(self.expand(item)?);
                }
                alts
            }
            Rule::Optional(inner) => {
                let mut alts = self.expand(inner)?;
                alts.push(Alternative::default());
                alts
            }
            Rule::Repeat1(inner) => match self.repetition(inner)? {
                Some(symbol) => vec![Alternative::single(symbol)],
                None => vec![Alternative::default()],
            },
            Rule::Repeat(inner) => match self.repetition(inner)? {
                Some(symbol) => vec![Alternative::single(symbol), Alternative::default()],
                None => vec![Alternative::default()],
            },
            Rule::Prec { value, assoc, rule } => {
                let mut alts = self.expand(rule)?;
                for alt in &mut alts {
                    for step in &mut alt.steps {
                        if step.precedence.is_none() {
                            step.precedence = Some(*value);
                            step.associativity = *assoc;
                        }
                    }
                    alt.precedence.get_or_insert((*value, *assoc));
                }
                alts
            }
            Rule::DynamicPrec { value, rule } => {
                let mut alts = self.expand(rule)?;
                for alt in &mut alts {
                    if alt.dynamic == 0 {
                        alt.dynamic = *value;
                    }
                }
                alts
            }
            Rule::Field { name, rule } => {
                let id = self.fields[name.as_str()];
                let mut alts = self.expand(rule)?;
                for alt in &mut alts {
                    for step in &mut alt.steps {
                        step.field.get_or_insert(id);
                    }
                }
                alts
            }
        })
    }

    /// `R -> R x | x` for every non-empty alternative `x` of `inner`.
    fn repetition(&mut self, inner: &Rule) -> Result<Option<Symbol>, Malformed> {
        let mut alts = self.expand(inner)?;
        alts.retain(|alt| !alt.steps.is_empty());
        if alts.is_empty() {
            return Ok(None);
        }
        self.repeat_count += 1;
        let name = format!("{}_repeat{}", self.rule, self.repeat_count);
        let symbol = push_symbol(
            self.symbols,
            metadata(&name, SymbolKind::Auxiliary, false, false),
        )?;
        self.aux_origin.insert(symbol, self.rule_symbol);
        let recursive = Alternative::single(symbol);
        let mut prods: Vec<_> = alts.iter().map(|alt| recursive.concat(alt)).collect();
        prods.extend(alts);
        self.aux.push((symbol, prods));
        Ok(Some(symbol))
    }
}

fn collect_fields(rule: &Rule, out: &mut BTreeSet<String>) {
    match rule {
        Rule::Field { name, rule } => {
            out.insert(name.clone());
            collect_fields(rule, out);
        }
        Rule::Seq(items) | Rule::Choice(items) => {
            for item in items {
                collect_fields(item, out);
            }
        }
        Rule::Repeat(inner) | Rule::Repeat1(inner) | Rule::Optional(inner) => {
            collect_fields(inner, out)
        }
        Rule::Prec { rule, .. } | Rule::DynamicPrec { rule, .. } => collect_fields(rule, out),
        Rule::Blank | Rule::Literal(_) | Rule::Pattern(_) | Rule::Symbol(_) | Rule::Token(_) => {}
    }
}

/// Keeps the first of several alternatives with identical symbol sequences.
fn dedup(alts: Vec<Alternative>) -> Vec<Alternative> {
    let mut seen = HashSet::new();
    alts.into_iter()
        .filter(|alt| seen.insert(alt.steps.iter().map(|s| s.symbol).collect::<Vec<_>>()))
        .collect()
}

pub(super) fn normalize(def: &GrammarDef) -> Result<Grammar, GrammarError> {
    if def.rules.is_empty() {
        return Err(Malformed::NoRules.into());
    }
    let mut rules: IndexMap<&str, &Rule> = IndexMap::new();
    for (name, rule) in &def.rules {
        if rules.insert(name.as_str(), rule).is_some() {
            return Err(Malformed::DuplicateRule(name.to_string()).into());
        }
    }
    for name in &def.externals {
        if rules.contains_key(name.as_str()) {
            return Err(Malformed::ExternalRedefined(name.to_string()).into());
        }
    }
    let start_name = def.start.as_deref().unwrap_or(def.rules[0].0.as_str());
    if !rules.contains_key(start_name) {
        return Err(Malformed::MissingStartRule(start_name.to_string()).into());
    }

    let mut symbols = vec![metadata("end", SymbolKind::Terminal, false, false)];
    let mut by_name: HashMap<String, Symbol> = HashMap::new();
    let mut tokens = Vec::new();
    let mut literal_texts = BTreeMap::new();

    for (&name, &rule) in &rules {
        if let Some((pattern, text)) = lexical_pattern(rule, name)? {
            let visible = !name.starts_with('_');
            let symbol = push_symbol(&mut symbols, metadata(name, SymbolKind::Terminal, visible, true))?;
            by_name.insert(name.into(), symbol);
            if let Some(text) = text {
                literal_texts.insert(symbol, text);
            }
            tokens.push(TokenDef {
                symbol,
                pattern: pattern.as_str().into(),
                literal: literal_texts.contains_key(&symbol),
            });
        }
    }

    let mut inline = InlineTerminals::default();
    for (&name, &rule) in &rules {
        if !rule.is_lexical() {
            inline.collect(rule, name, &mut symbols, &mut tokens, &mut literal_texts)?;
        }
    }

    let mut externals = Vec::new();
    for name in &def.externals {
        let visible = !name.starts_with('_');
        let symbol = push_symbol(&mut symbols, metadata(name, SymbolKind::External, visible, true))?;
        by_name.insert(name.clone(), symbol);
        externals.push(symbol);
    }
    let terminal_count = symbols.len();

    let default_extras = [Rule::Pattern(r"\s".into())];
    let mut skips = Vec::new();
    let mut extras = Vec::new();
    for extra in def.extras.as_deref().unwrap_or(&default_extras[..]) {
        match extra {
            Rule::Symbol(name) => match by_name.get(name.as_str()) {
                Some(&symbol) => {
                    symbols[symbol.index()].extra = true;
                    extras.push(symbol);
                }
                None if rules.contains_key(name.as_str()) => {
                    return Err(Malformed::UnsupportedExtra(name.to_string()).into());
                }
                None => {
                    return Err(Malformed::UnknownSymbol {
                        directive: "extras",
                        symbol: name.to_string(),
                    }
                    .into());
                }
            },
            Rule::Pattern(pattern) => skips.push(pattern.clone()),
            Rule::Literal(text) => skips.push(regex_syntax::escape(text).into()),
            Rule::Token(inner) => skips.push(token_pattern(inner, "extras")?.into()),
            other => return Err(Malformed::UnsupportedExtra(format!("{other:?}")).into()),
        }
    }

    let start_nt = push_symbol(&mut symbols, metadata(START_NAME, SymbolKind::Auxiliary, false, false))?;
    let mut syntactic = Vec::new();
    for (&name, &rule) in &rules {
        if !rule.is_lexical() {
            let visible = !name.starts_with('_');
            let symbol =
                push_symbol(&mut symbols, metadata(name, SymbolKind::Nonterminal, visible, true))?;
            by_name.insert(name.into(), symbol);
            syntactic.push((name, rule, symbol));
        }
    }
    let start = by_name[start_name];

    let mut field_names = BTreeSet::new();
    for &(_, rule, _) in &syntactic {
        collect_fields(rule, &mut field_names);
    }
    let fields: BTreeMap<String, FieldId> = field_names
        .iter()
        .enumerate()
        .map(|(i, name)| (name.clone(), FieldId(i as u16)))
        .collect();

    let mut productions = vec![Production {
        lhs: start_nt,
        steps: vec![Step {
            symbol: start,
            field: None,
            precedence: None,
            associativity: None,
        }],
        precedence: None,
        associativity: None,
        dynamic_precedence: 0,
    }];
    let mut expander = Expander {
        by_name: &by_name,
        inline: &inline,
        fields: &fields,
        symbols: &mut symbols,
        aux: Vec::new(),
        aux_origin: BTreeMap::new(),
        rule: String::new(),
        rule_symbol: start_nt,
        repeat_count: 0,
    };
    for &(name, rule, symbol) in &syntactic {
        expander.begin(name, symbol);
        let alts = dedup(expander.expand(rule)?);
        if alts.is_empty() {
            return Err(Malformed::EmptyRule(name.to_string()).into());
        }
        productions.extend(alts.into_iter().map(|alt| alt.into_production(symbol)));
    }
    let aux = std::mem::take(&mut expander.aux);
    let aux_origin = std::mem::take(&mut expander.aux_origin);
    for (symbol, alts) in aux {
        productions.extend(dedup(alts).into_iter().map(|alt| alt.into_production(symbol)));
    }

    for token in &tokens {
        let name = &symbols[token.symbol.index()].name;
        let re = full_match(&token.pattern).map_err(|message| Malformed::InvalidPattern {
            token: name.to_string(),
            message,
        })?;
        if re.is_match("") {
            return Err(Malformed::EmptyToken(name.to_string()).into());
        }
    }
    for skip in &skips {
        full_match(skip).map_err(|message| Malformed::InvalidPattern {
            token: "extras".into(),
            message,
        })?;
    }

    let mut word = None;
    let mut keywords = Vec::new();
    if let Some(name) = &def.word {
        let symbol = match by_name.get(name.as_str()) {
            Some(&symbol) => symbol,
            None => {
                return Err(Malformed::UnknownSymbol {
                    directive: "word",
                    symbol: name.to_string(),
                }
                .into());
            }
        };
        let Some(token) = tokens.iter().find(|t| t.symbol == symbol) else {
            return Err(Malformed::InvalidWordToken(name.to_string()).into());
        };
        let re = full_match(&token.pattern).map_err(|message| Malformed::InvalidPattern {
            token: name.to_string(),
            message,
        })?;
        for (&keyword, text) in &literal_texts {
            if keyword != symbol && re.is_match(text.as_bytes()) {
                keywords.push((text.clone(), keyword));
            }
        }
        word = Some(symbol);
    }

    let mut conflicts = Vec::new();
    for set in &def.conflicts {
        let mut symbols_in_set = BTreeSet::new();
        for name in set {
            match by_name.get(name.as_str()) {
                Some(&symbol) if symbol.index() >= terminal_count => {
                    symbols_in_set.insert(symbol);
                }
                _ => {
                    return Err(Malformed::UnknownSymbol {
                        directive: "conflicts",
                        symbol: name.to_string(),
                    }
                    .into());
                }
            }
        }
        conflicts.push(symbols_in_set);
    }

    let mut token_precedence = BTreeMap::new();
    for decl in &def.precedences {
        for token in &decl.tokens {
            let (symbol, name) = match token {
                Rule::Literal(text) => (
                    literal_texts
                        .iter()
                        .find(|(_, t)| *t == text)
                        .map(|(&symbol, _)| symbol),
                    text.clone(),
                ),
                Rule::Symbol(name) => (
                    by_name
                        .get(name.as_str())
                        .copied()
                        .filter(|s| s.index() < terminal_count),
                    name.clone(),
                ),
                other => (None, format!("{other:?}").into()),
            };
            let Some(symbol) = symbol else {
                return Err(Malformed::UnknownSymbol {
                    directive: "precedence",
                    symbol: name.to_string(),
                }
                .into());
            };
            let entry = (decl.level, decl.assoc);
            if let Some(previous) = token_precedence.insert(symbol, entry) {
                if previous != entry {
                    return Err(Malformed::ContradictoryPrecedence(name.to_string()).into());
                }
            }
        }
    }

    let warnings = unreachable_rules(&rules, &by_name, &productions, start, &extras);

    Ok(Grammar {
        name: def.name.clone(),
        symbols,
        terminal_count,
        start,
        productions,
        fields: field_names.into_iter().collect(),
        tokens,
        skips,
        extras,
        externals,
        word,
        keywords,
        conflicts,
        token_precedence,
        aux_origin,
        warnings,
    })
}

fn unreachable_rules(
    rules: &IndexMap<&str, &Rule>,
    by_name: &HashMap<String, Symbol>,
    productions: &[Production],
    start: Symbol,
    extras: &[Symbol],
) -> Vec<GrammarWarning> {
    let mut by_lhs: BTreeMap<Symbol, Vec<&Production>> = BTreeMap::new();
    for prod in productions {
        by_lhs.entry(prod.lhs).or_default().push(prod);
    }
    let mut reached: BTreeSet<Symbol> = extras.iter().copied().collect();
    let mut queue = VecDeque::from([start]);
    reached.insert(start);
    while let Some(symbol) = queue.pop_front() {
        for prod in by_lhs.get(&symbol).into_iter().flatten() {
            for step in &prod.steps {
                if reached.insert(step.symbol) {
                    queue.push_back(step.symbol);
                }
            }
        }
    }
    rules
        .keys()
        .filter(|name| !reached.contains(&by_name[**name]))
        .map(|name| GrammarWarning::UnreachableRule(name.to_string()))
        .collect()
}
