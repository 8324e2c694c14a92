//! State-restricted, lazy tokenization over a streamed byte source.
//!
//! All token and skip patterns of a language are compiled into one anchored
//! dense DFA with all-matches semantics. A lex call runs the DFA from the
//! current offset and picks the longest match among the patterns valid in the
//! requested lex mode; anonymous extras (skips) are folded into the token's
//! padding. When no built-in pattern applies the language's external scanner
//! is consulted, then the error mode, and finally a single byte is returned
//! as an `ERROR` token.

use crate::error::GrammarError;
use crate::position::Length;
use crate::symbol::Symbol;
use crate::table::{LexModeId, ParseTable};
use regex_automata::{
    Anchored, Input, MatchKind,
    dfa::{Automaton, StartKind, dense},
    nfa::thompson,
    util::{primitives::StateID, syntax},
};
use std::collections::HashMap;

/// Bytes are copied out of the input at most this many at a time.
const FILL: usize = 64;

/// Syntax settings shared by every token pattern: byte-oriented, no Unicode
/// classes, so patterns can match arbitrary (non-UTF-8) input.
pub(crate) fn syntax_config() -> syntax::Config {
    syntax::Config::new().unicode(false).utf8(false)
}

/// A source of text. Text does not need to be materialized in one piece.
pub trait TextInput {
    /// Returns the bytes starting at `offset`. An empty slice means end of
    /// input.
    fn read(&mut self, offset: usize) -> &[u8];
}

impl TextInput for &[u8] {
    fn read(&mut self, offset: usize) -> &[u8] {
        self.get(offset..).unwrap_or_default()
    }
}

impl TextInput for &str {
    fn read(&mut self, offset: usize) -> &[u8] {
        self.as_bytes().get(offset..).unwrap_or_default()
    }
}

impl TextInput for Vec<u8> {
    fn read(&mut self, offset: usize) -> &[u8] {
        self.get(offset..).unwrap_or_default()
    }
}

impl TextInput for std::string::String {
    fn read(&mut self, offset: usize) -> &[u8] {
        self.as_bytes().get(offset..).unwrap_or_default()
    }
}

/// Text produced on demand by a callback that fills a buffer with the chunk
/// starting at a given offset (an empty chunk means end of input).
pub struct ChunkedInput<F> {
    fill: F,
    start: usize,
    chunk: Vec<u8>,
}

impl<F: FnMut(usize, &mut Vec<u8>)> ChunkedInput<F> {
    pub fn new(fill: F) -> Self {
        Self {
            fill,
            start: 0,
            chunk: Vec::new(),
        }
    }
}

impl<F: FnMut(usize, &mut Vec<u8>)> TextInput for ChunkedInput<F> {
    fn read(&mut self, offset: usize) -> &[u8] {
        let cached = offset >= self.start && offset < self.start + self.chunk.len();
        if !cached {
            self.chunk.clear();
            (self.fill)(offset, &mut self.chunk);
            self.start = offset;
        }
        &self.chunk[offset - self.start..]
    }
}

/// The bytes examined by one lex call, starting at the call's offset.
pub(crate) struct Source<'a> {
    input: &'a mut dyn TextInput,
    start: usize,
    bytes: Vec<u8>,
    eof: bool,
}

impl<'a> Source<'a> {
    pub(crate) fn new(input: &'a mut dyn TextInput, start: usize) -> Self {
        Self {
            input,
            start,
            bytes: Vec::new(),
            eof: false,
        }
    }

    /// The byte at absolute offset `pos`, `None` at end of input.
    pub(crate) fn byte(&mut self, pos: usize) -> Option<u8> {
        if pos < self.start {
            return None;
        }
        while pos >= self.start + self.bytes.len() {
            if self.eof {
                return None;
            }
            let chunk = self.input.read(self.start + self.bytes.len());
            if chunk.is_empty() {
                self.eof = true;
                return None;
            }
            let n = chunk.len().min(FILL);
            self.bytes.extend_from_slice(&chunk[..n]);
        }
        Some(self.bytes[pos - self.start])
    }

    /// Bytes in `[from, to)`; both must already have been examined.
    fn slice(&self, from: usize, to: usize) -> &[u8] {
        &self.bytes[from - self.start..to - self.start]
    }

    fn length(&self, from: usize, to: usize) -> Length {
        Length::of(self.slice(from, to))
    }
}

/// The length of the text from `start` to the end of input.
pub(crate) fn remaining_length(input: &mut dyn TextInput, start: usize) -> Length {
    let mut len = Length::ZERO;
    let mut offset = start;
    loop {
        let chunk = input.read(offset);
        if chunk.is_empty() {
            return len;
        }
        for &b in chunk {
            len.advance(b);
        }
        offset += chunk.len();
    }
}

/// The terminals valid in the current lex mode.
#[derive(Clone, Copy, Debug)]
pub struct ValidSymbols<'a> {
    valid: &'a [bool],
    error_mode: bool,
}

impl ValidSymbols<'_> {
    #[inline]
    pub fn contains(&self, symbol: Symbol) -> bool {
        self.valid.get(symbol.index()).copied().unwrap_or(false)
    }

    /// Every terminal is valid: the parser is recovering from an error.
    pub fn is_error_mode(&self) -> bool {
        self.error_mode
    }

    pub fn iter(&self) -> impl Iterator<Item = Symbol> + '_ {
        self.valid
            .iter()
            .enumerate()
            .filter(|(_, v)| **v)
            .map(|(i, _)| Symbol(i as u16))
    }
}

/// Byte cursor handed to an [`ExternalScanner`].
pub struct ScanCursor<'s, 'a> {
    source: &'s mut Source<'a>,
    begin: usize,
    pos: usize,
    end: Option<usize>,
}

impl ScanCursor<'_, '_> {
    /// The byte under the cursor, `None` at end of input.
    pub fn lookahead(&mut self) -> Option<u8> {
        self.source.byte(self.pos)
    }

    /// Moves past the byte under the cursor.
    pub fn advance(&mut self) {
        if self.source.byte(self.pos).is_some() {
            self.pos += 1;
        }
    }

    /// Ends the token at the cursor. Without a call the token ends wherever
    /// the cursor stops.
    pub fn mark_end(&mut self) {
        self.end = Some(self.pos);
    }

    /// Bytes consumed since the token start.
    pub fn position(&self) -> usize {
        self.pos - self.begin
    }

    pub fn at_eof(&mut self) -> bool {
        self.lookahead().is_none()
    }
}

/// A hand-written scanner for the language's external tokens.
pub trait ExternalScanner: Send + Sync {
    /// Scans one token at the cursor. Returning `None`, a symbol that is not
    /// valid, or a zero-length token means no match.
    fn scan(&self, cursor: &mut ScanCursor<'_, '_>, valid: &ValidSymbols<'_>) -> Option<Symbol>;
}

/// One token produced by the lexer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Lexed {
    /// The token's symbol, [`Symbol::END`] at end of input or
    /// [`Symbol::ERROR`] for an unrecognized byte.
    pub symbol: Symbol,
    /// Skipped bytes before the token.
    pub padding: Length,
    pub size: Length,
    /// Bytes past the token end that were examined to produce it.
    pub lookahead_bytes: usize,
    /// The lex mode the token was produced in.
    pub mode: LexModeId,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PatternKind {
    Token { symbol: Symbol, literal: bool },
    Skip,
}

#[derive(Clone, Copy, Debug)]
struct Candidate {
    kind: PatternKind,
    len: usize,
}

impl Candidate {
    /// Longer first, then tokens over skips, literals over patterns, lower
    /// symbols over higher ones.
    fn rank(&self) -> (usize, u8, u8, std::cmp::Reverse<u16>) {
        match self.kind {
            PatternKind::Token { symbol, literal } => (
                self.len,
                1,
                literal as u8,
                std::cmp::Reverse(symbol.0),
            ),
            PatternKind::Skip => (self.len, 0, 0, std::cmp::Reverse(u16::MAX)),
        }
    }
}

struct Run {
    best: Option<Candidate>,
    /// Bytes examined from the run's start; end of input counts as one.
    examined: usize,
}

/// The built-in lexer of a language.
#[derive(Clone)]
pub struct Lexer {
    dfa: dense::DFA<Vec<u32>>,
    start: StateID,
    patterns: Vec<PatternKind>,
    /// Per lex mode, per terminal.
    valid: Vec<Vec<bool>>,
    word: Option<(Symbol, usize)>,
    keywords: HashMap<Vec<u8>, Symbol>,
    externals: Vec<Symbol>,
}

impl Lexer {
    /// Builds the DFA for a table's token and skip patterns.
    pub fn new(table: &ParseTable) -> Result<Lexer, GrammarError> {
        let lexical = table.lexical();
        let mut sources: Vec<&str> = Vec::new();
        let mut patterns = Vec::new();
        let mut word = None;
        for token in &lexical.tokens {
            if lexical.word == Some(token.symbol) {
                word = Some((token.symbol, patterns.len()));
            }
            sources.push(&token.pattern);
            patterns.push(PatternKind::Token {
                symbol: token.symbol,
                literal: token.literal,
            });
        }
        for skip in &lexical.skips {
            sources.push(skip);
            patterns.push(PatternKind::Skip);
        }
        let dfa = dense::Builder::new()
            .configure(
                dense::Config::new()
                    .match_kind(MatchKind::All)
                    .start_kind(StartKind::Anchored),
            )
            .syntax(syntax_config())
            .thompson(thompson::Config::new().utf8(false))
            .build_many(&sources)
            .map_err(|err| GrammarError::InvalidTable(format!("token patterns: {err}")))?;
        let start = dfa
            .start_state_forward(&Input::new(&[] as &[u8]).anchored(Anchored::Yes))
            .map_err(|err| GrammarError::InvalidTable(format!("token patterns: {err}")))?;

        let valid = (0..table.lex_mode_count())
            .map(|mode| {
                let mut row = vec![false; table.terminal_count()];
                for symbol in table.valid_symbols(LexModeId(mode as u16)) {
                    row[symbol.index()] = true;
                }
                row
            })
            .collect();
        let keywords = lexical
            .keywords
            .iter()
            .map(|(text, symbol)| (text.as_bytes().to_vec(), *symbol))
            .collect();
        log::debug!(
            "lexer for {}: {} patterns, {} DFA bytes, {} keywords",
            table.name(),
            patterns.len(),
            dfa.memory_usage(),
            lexical.keywords.len()
        );
        Ok(Lexer {
            dfa,
            start,
            patterns,
            valid,
            word,
            keywords,
            externals: table.externals().to_vec(),
        })
    }

    pub fn valid_symbols(&self, mode: LexModeId) -> ValidSymbols<'_> {
        ValidSymbols {
            valid: &self.valid[mode.0 as usize],
            error_mode: mode == LexModeId::ERROR,
        }
    }

    /// Lexes one token at byte `position` in the given lex mode.
    pub fn lex(
        &self,
        input: &mut dyn TextInput,
        position: usize,
        mode: LexModeId,
        scanner: Option<&dyn ExternalScanner>,
    ) -> Lexed {
        let mut source = Source::new(input, position);
        let mut begin = position;
        let mut examined = position;
        let found = loop {
            let run = self.run(&mut source, begin, mode);
            examined = examined.max(begin + run.examined);
            match run.best {
                Some(Candidate {
                    kind: PatternKind::Skip,
                    len,
                }) => begin += len,
                Some(Candidate {
                    kind: PatternKind::Token { symbol, .. },
                    len,
                }) => break Some((symbol, len)),
                None => break None,
            }
        };
        let padding = source.length(position, begin);
        let finish = |source: &Source<'_>, symbol: Symbol, len: usize, examined: usize, mode: LexModeId| {
            let end = begin + len;
            let lexed = Lexed {
                symbol,
                padding,
                size: source.length(begin, end),
                lookahead_bytes: examined.saturating_sub(end).max(1),
                mode,
            };
            if log::log_enabled!(log::Level::Trace) {
                let text = source.slice(begin, end);
                log::trace!(
                    "lexed {} at {}..{} in mode {}: {:?}",
                    symbol,
                    begin,
                    end,
                    mode.0,
                    match std::str::from_utf8(text) {
                        Ok(s) => s.to_string(),
                        Err(_) => hex::encode(text),
                    }
                );
            }
            lexed
        };

        if let Some((symbol, len)) = found {
            return finish(&source, symbol, len, examined, mode);
        }
        if source.byte(begin).is_none() {
            return finish(&source, Symbol::END, 0, begin + 1, mode);
        }
        if let Some((symbol, len, seen)) = self.scan_external(&mut source, begin, mode, scanner) {
            return finish(&source, symbol, len, examined.max(seen), mode);
        }
        if mode != LexModeId::ERROR {
            let run = self.run(&mut source, begin, LexModeId::ERROR);
            examined = examined.max(begin + run.examined);
            if let Some(Candidate {
                kind: PatternKind::Token { symbol, .. },
                len,
            }) = run.best
            {
                return finish(&source, symbol, len, examined, LexModeId::ERROR);
            }
            if let Some((symbol, len, seen)) =
                self.scan_external(&mut source, begin, LexModeId::ERROR, scanner)
            {
                return finish(&source, symbol, len, examined.max(seen), LexModeId::ERROR);
            }
        }
        finish(&source, Symbol::ERROR, 1, examined, LexModeId::ERROR)
    }

    /// Runs the DFA from `begin` and picks the best eligible match.
    fn run(&self, source: &mut Source<'_>, begin: usize, mode: LexModeId) -> Run {
        let valid = &self.valid[mode.0 as usize];
        let dfa = &self.dfa;
        let mut state = self.start;
        let mut best: Option<Candidate> = None;
        let mut word_len = 0;
        let mut i = 0;
        let examined = loop {
            let (len, eof) = match source.byte(begin + i) {
                Some(b) => {
                    let previous = state;
                    state = dfa.next_state(state, b);
                    i += 1;
                    if dfa.is_special_state(state)
                        && (dfa.is_dead_state(state) || dfa.is_quit_state(state))
                    {
                        // Matches are reported one byte late: a match state
                        // that dies on every byte did not need the last one.
                        let delayed = dfa.is_match_state(previous) && dies_on_any_byte(dfa, previous);
                        break if delayed { i - 1 } else { i };
                    }
                    (i - 1, false)
                }
                None => {
                    state = dfa.next_eoi_state(state);
                    (i, true)
                }
            };
            if len > 0 && dfa.is_match_state(state) {
                for k in 0..dfa.match_len(state) {
                    let pattern = dfa.match_pattern(state, k).as_usize();
                    if self.word.is_some_and(|(_, p)| p == pattern) {
                        word_len = len;
                    }
                    let kind = self.patterns[pattern];
                    let eligible = match kind {
                        PatternKind::Skip => true,
                        PatternKind::Token { symbol, .. } => valid[symbol.index()],
                    };
                    let candidate = Candidate { kind, len };
                    if eligible && best.is_none_or(|b| candidate.rank() > b.rank()) {
                        best = Some(candidate);
                    }
                }
            }
            if eof {
                break i + 1;
            }
        };

        if let Some((word, _)) = self.word {
            let best_len = match best {
                Some(Candidate {
                    kind: PatternKind::Skip,
                    ..
                }) => usize::MAX,
                Some(b) => b.len,
                None => 0,
            };
            if word_len > 0 && word_len >= best_len {
                let keyword = self.keywords.get(source.slice(begin, begin + word_len)).copied();
                let symbol = match keyword {
                    Some(k) if valid[k.index()] => k,
                    _ if valid[word.index()] => word,
                    Some(k) => k,
                    None => word,
                };
                best = Some(Candidate {
                    kind: PatternKind::Token {
                        symbol,
                        literal: keyword == Some(symbol),
                    },
                    len: word_len,
                });
            }
        }
        Run {
            best,
            examined,
        }
    }

    fn scan_external(
        &self,
        source: &mut Source<'_>,
        begin: usize,
        mode: LexModeId,
        scanner: Option<&dyn ExternalScanner>,
    ) -> Option<(Symbol, usize, usize)> {
        let scanner = scanner?;
        let valid = self.valid_symbols(mode);
        if !self.externals.iter().any(|s| valid.contains(*s)) {
            return None;
        }
        let mut cursor = ScanCursor {
            source,
            begin,
            pos: begin,
            end: None,
        };
        let symbol = scanner.scan(&mut cursor, &valid)?;
        let end = cursor.end.unwrap_or(cursor.pos);
        let seen = cursor.pos + 1;
        let len = end - begin;
        if len == 0 || !self.externals.contains(&symbol) || !valid.contains(symbol) {
            return None;
        }
        Some((symbol, len, seen))
    }
}

fn dies_on_any_byte(dfa: &dense::DFA<Vec<u32>>, state: StateID) -> bool {
    (0..=u8::MAX).all(|b| dfa.is_dead_state(dfa.next_state(state, b)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::{CompileOptions, compile};
    use crate::grammar::{Grammar, GrammarDef, choice, lit, pat, repeat, seq, sym};
    use crate::position::Point;

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn table(def: &GrammarDef) -> ParseTable {
        compile(&Grammar::load(def).unwrap(), &CompileOptions::default()).unwrap()
    }

    fn statements() -> GrammarDef {
        GrammarDef::new("stmts")
            .rule("program", repeat(sym("stmt")))
            .rule(
                "stmt",
                choice([
                    seq([lit("if"), sym("ident"), lit("then"), sym("ident")]),
                    seq([sym("ident"), lit("="), sym("number")]),
                    seq([sym("ident"), lit("=="), sym("number")]),
                ]),
            )
            .rule("ident", pat("[a-z]+"))
            .rule("number", pat("[0-9]+"))
            .word("ident")
    }

    fn lex_all(table: &ParseTable, text: &str) -> Vec<(std::string::String, usize, usize)> {
        let lexer = Lexer::new(table).unwrap();
        let mut input = text;
        let mut pos = 0;
        let mut out = Vec::new();
        loop {
            let t = lexer.lex(&mut input, pos, LexModeId::ERROR, None);
            pos += t.padding.bytes + t.size.bytes;
            if t.symbol == Symbol::END {
                return out;
            }
            out.push((table.symbol_name(t.symbol).to_string(), t.padding.bytes, t.size.bytes));
        }
    }

    #[test]
    fn longest_match_wins() {
        init_logger();
        let t = table(&statements());
        let tokens = lex_all(&t, "a == 1 b = 2");
        let names: Vec<_> = tokens.iter().map(|(n, _, _)| n.as_str()).collect();
        assert_eq!(names, ["ident", "==", "number", "ident", "=", "number"]);
        assert_eq!(tokens[1], ("==".to_string(), 1, 2));
    }

    #[test]
    fn keywords_are_extracted_from_words() {
        init_logger();
        let t = table(&statements());
        let names: Vec<_> = lex_all(&t, "if iffy then thenx")
            .into_iter()
            .map(|(n, _, _)| n)
            .collect();
        assert_eq!(names, ["if", "ident", "then", "ident"]);
    }

    #[test]
    fn keyword_in_word_position_is_a_word() {
        init_logger();
        let t = table(&statements());
        let lexer = Lexer::new(&t).unwrap();
        // After `if`, only `ident` is valid: `then` is lexed as an identifier.
        let state = t
            .next_state(t.start_state(), t.symbol_for_name("if", false).unwrap())
            .unwrap();
        let mut input = "then";
        let lexed = lexer.lex(&mut input, 0, t.lex_mode(state), None);
        assert_eq!(t.symbol_name(lexed.symbol), "ident");
    }

    #[test]
    fn padding_tracks_rows_and_columns() {
        init_logger();
        let t = table(&statements());
        let lexer = Lexer::new(&t).unwrap();
        let mut input = "  \n\n   abc";
        let lexed = lexer.lex(&mut input, 0, LexModeId::ERROR, None);
        assert_eq!(lexed.padding, Length::new(7, Point::new(2, 3)));
        assert_eq!(lexed.size, Length::new(3, Point::new(0, 3)));
        assert_eq!(lexed.lookahead_bytes, 1);
    }

    #[test]
    fn lookahead_stops_one_byte_past_the_token() {
        init_logger();
        let t = table(&statements());
        let lexer = Lexer::new(&t).unwrap();
        let mut input = "== 1";
        let lexed = lexer.lex(&mut input, 0, LexModeId::ERROR, None);
        assert_eq!(t.symbol_name(lexed.symbol), "==");
        assert_eq!(lexed.size.bytes, 2);
        assert_eq!(lexed.lookahead_bytes, 1);

        let mut input = "abc; d";
        let lexed = lexer.lex(&mut input, 0, LexModeId::ERROR, None);
        assert_eq!(lexed.size.bytes, 3);
        assert_eq!(lexed.lookahead_bytes, 1);
    }

    #[test]
    fn invalid_tokens_fall_back_to_error_mode() {
        init_logger();
        let t = table(&statements());
        let lexer = Lexer::new(&t).unwrap();
        let mode = t.lex_mode(t.start_state());
        let mut input = "42";
        let lexed = lexer.lex(&mut input, 0, mode, None);
        assert_eq!(t.symbol_name(lexed.symbol), "number");
        assert_eq!(lexed.mode, LexModeId::ERROR);
    }

    #[test]
    fn unknown_bytes_become_single_byte_errors() {
        init_logger();
        let t = table(&statements());
        let tokens = lex_all(&t, "a @@ b");
        assert_eq!(tokens[1], ("ERROR".to_string(), 1, 1));
        assert_eq!(tokens[2], ("ERROR".to_string(), 0, 1));
        assert_eq!(tokens.len(), 4);
        let bytes: &[u8] = &[0xff, b'a'];
        let lexer = Lexer::new(&t).unwrap();
        let mut input = bytes;
        let lexed = lexer.lex(&mut input, 0, LexModeId::ERROR, None);
        assert_eq!(lexed.symbol, Symbol::ERROR);
        assert_eq!(lexed.size.bytes, 1);
    }

    #[test]
    fn end_of_input_keeps_trailing_padding() {
        init_logger();
        let t = table(&statements());
        let lexer = Lexer::new(&t).unwrap();
        let mut input = "a  \n";
        let lexed = lexer.lex(&mut input, 1, LexModeId::ERROR, None);
        assert_eq!(lexed.symbol, Symbol::END);
        assert_eq!(lexed.padding.bytes, 3);
        assert_eq!(lexed.size, Length::ZERO);
    }

    #[test]
    fn chunked_input_matches_contiguous_input() {
        init_logger();
        let t = table(&statements());
        let lexer = Lexer::new(&t).unwrap();
        let text = b"if abc then\n  defgh x = 10";
        let mut chunked = ChunkedInput::new(|offset: usize, buf: &mut Vec<u8>| {
            let end = (offset + 3).min(text.len());
            buf.extend_from_slice(&text[offset.min(end)..end]);
        });
        let mut contiguous: &[u8] = text;
        let mut pos = 0;
        loop {
            let a = lexer.lex(&mut chunked, pos, LexModeId::ERROR, None);
            let b = lexer.lex(&mut contiguous, pos, LexModeId::ERROR, None);
            assert_eq!(a, b);
            pos += a.padding.bytes + a.size.bytes;
            if a.symbol == Symbol::END {
                break;
            }
        }
        assert_eq!(pos, text.len());
    }

    struct Quoted(Symbol);

    impl ExternalScanner for Quoted {
        fn scan(&self, cursor: &mut ScanCursor<'_, '_>, valid: &ValidSymbols<'_>) -> Option<Symbol> {
            let symbol = self.0;
            if !valid.contains(symbol) || cursor.lookahead() != Some(b'\'') {
                return None;
            }
            cursor.advance();
            while let Some(b) = cursor.lookahead() {
                cursor.advance();
                if b == b'\'' {
                    cursor.mark_end();
                    return Some(symbol);
                }
            }
            None
        }
    }

    #[test]
    fn external_scanner_runs_when_no_pattern_matches() {
        init_logger();
        let def = GrammarDef::new("ext")
            .rule("program", repeat(choice([sym("word"), sym("quoted")])))
            .rule("word", pat("[a-z]+"))
            .externals(["quoted"]);
        let t = table(&def);
        let quoted = Quoted(t.symbol_for_name("quoted", true).unwrap());
        let lexer = Lexer::new(&t).unwrap();
        let mut input = "ab 'c d' e";
        let mode = t.lex_mode(t.start_state());
        let first = lexer.lex(&mut input, 0, mode, Some(&quoted));
        assert_eq!(t.symbol_name(first.symbol), "word");
        let second = lexer.lex(&mut input, 2, mode, Some(&quoted));
        assert_eq!(t.symbol_name(second.symbol), "quoted");
        assert_eq!((second.padding.bytes, second.size.bytes), (1, 5));
        let unterminated = lexer.lex(&mut "'abc", 0, mode, Some(&quoted));
        assert_eq!(unterminated.symbol, Symbol::ERROR);
    }
}
