//! The compiled parse table and its binary serialization.
//!
//! A [`ParseTable`] is immutable once built and is shared by every parse of a
//! language. Actions are stored densely, one row per state and one column per
//! symbol (terminals first, then nonterminals), so a lookup is a single index
//! computation.

use crate::error::GrammarError;
use crate::grammar::TokenDef;
use crate::symbol::{ERROR_METADATA, FieldId, Symbol, SymbolKind, SymbolMetadata};
use smartstring::alias::String;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Leading bytes of a serialized table.
pub const MAGIC: &[u8; 4] = b"LRTB";
/// Version of the serialized table layout.
pub const FORMAT_VERSION: u32 = 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct StateId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProductionId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AmbigId(pub u32);

/// A lex mode: the set of terminals the lexer may return in a state.
/// Mode `0` is the error mode, in which every terminal is valid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct LexModeId(pub u16);

impl LexModeId {
    pub const ERROR: LexModeId = LexModeId(0);
}

macro_rules! id_into_usize {
    ($($id:ty),*) => {
        $(impl From<$id> for usize {
            fn from(id: $id) -> Self {
                id.0 as usize
            }
        })*
    };
}

id_into_usize!(StateId, ProductionId, AmbigId, LexModeId);

/// One table entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum ParseAction {
    #[default]
    Error,
    Accept,
    Shift(StateId),
    Reduce(ProductionId),
    /// Several actions kept for a declared conflict; see [`ParseTable::ambig`].
    Ambig(AmbigId),
    Goto(StateId),
}

impl fmt::Display for ParseAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseAction::Error => f.write_str("error"),
            ParseAction::Accept => f.write_str("accept"),
            ParseAction::Shift(state) => write!(f, "shift {}", state.0),
            ParseAction::Reduce(prod) => write!(f, "reduce {}", prod.0),
            ParseAction::Ambig(ambig) => write!(f, "ambig {}", ambig.0),
            ParseAction::Goto(state) => write!(f, "goto {}", state.0),
        }
    }
}

/// What the engine needs to know about a production when reducing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProductionInfo {
    pub lhs: Symbol,
    /// Right-hand side symbols.
    pub rhs: Vec<Symbol>,
    /// Field of each right-hand side step.
    pub fields: Vec<Option<FieldId>>,
    pub dynamic_precedence: i32,
}

impl ProductionInfo {
    #[inline]
    pub fn child_count(&self) -> usize {
        self.rhs.len()
    }
}

/// Why a conflicting table entry was settled the way it was.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResolutionReason {
    /// One side had higher precedence.
    Precedence,
    /// Equal precedence, settled by left or right associativity.
    Associativity,
    /// Equal precedence on a non-associative operator: the entry is an error.
    NonAssociative,
    /// The symbols are listed in a declared conflict set: all actions kept.
    DeclaredConflict,
    /// Settled by `ConflictPolicy::PreferShift`.
    Policy,
}

/// A recorded conflict decision.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConflictResolution {
    pub state: StateId,
    pub lookahead: Symbol,
    pub kept: ParseAction,
    pub discarded: Vec<ParseAction>,
    pub reason: ResolutionReason,
}

/// Token patterns and keyword data driving the built-in lexer.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LexicalSpec {
    pub tokens: Vec<TokenDef>,
    /// Anonymous extras: matched text becomes padding.
    pub skips: Vec<String>,
    pub word: Option<Symbol>,
    pub keywords: Vec<(String, Symbol)>,
}

/// A kernel item: production and dot position.
pub type KernelItem = (ProductionId, u16);

/// The compiled automaton.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseTable {
    pub(crate) name: String,
    pub(crate) symbols: Vec<SymbolMetadata>,
    pub(crate) terminal_count: usize,
    pub(crate) start_symbol: Symbol,
    pub(crate) fields: Vec<String>,
    pub(crate) productions: Vec<ProductionInfo>,
    pub(crate) state_count: usize,
    pub(crate) actions: Vec<ParseAction>,
    pub(crate) ambigs: Vec<Vec<ParseAction>>,
    pub(crate) fragile: BTreeSet<(StateId, ProductionId)>,
    /// Shift targets that lost a conflict; used to break reused subtrees down.
    pub(crate) breakdown: BTreeMap<(StateId, Symbol), StateId>,
    pub(crate) lex_modes: Vec<Vec<Symbol>>,
    pub(crate) state_lex_modes: Vec<LexModeId>,
    pub(crate) lexical: LexicalSpec,
    pub(crate) extras: Vec<Symbol>,
    pub(crate) externals: Vec<Symbol>,
    pub(crate) resolutions: Vec<ConflictResolution>,
    pub(crate) kernels: Vec<Vec<KernelItem>>,
    pub(crate) start_state: StateId,
}

impl ParseTable {
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn symbol_count(&self) -> usize {
        self.symbols.len()
    }

    #[inline]
    pub fn terminal_count(&self) -> usize {
        self.terminal_count
    }

    #[inline]
    pub fn state_count(&self) -> usize {
        self.state_count
    }

    #[inline]
    pub fn is_terminal(&self, symbol: Symbol) -> bool {
        symbol.index() < self.terminal_count
    }

    pub fn start_state(&self) -> StateId {
        self.start_state
    }

    /// The grammar's start rule.
    pub fn start_symbol(&self) -> Symbol {
        self.start_symbol
    }

    pub fn symbol_metadata(&self, symbol: Symbol) -> &SymbolMetadata {
        if symbol == Symbol::ERROR {
            return &ERROR_METADATA;
        }
        &self.symbols[symbol.index()]
    }

    pub fn symbol_name(&self, symbol: Symbol) -> &str {
        &self.symbol_metadata(symbol).name
    }

    /// Looks a named symbol up by name; anonymous symbols by their text.
    pub fn symbol_for_name(&self, name: &str, named: bool) -> Option<Symbol> {
        self.symbols
            .iter()
            .position(|s| s.name.as_str() == name && s.named == named && s.kind != SymbolKind::Auxiliary)
            .map(|i| Symbol(i as u16))
    }

    pub fn symbols(&self) -> &[SymbolMetadata] {
        &self.symbols
    }

    pub fn field_name(&self, field: FieldId) -> &str {
        &self.fields[field.0 as usize]
    }

    pub fn field_id(&self, name: &str) -> Option<FieldId> {
        self.fields
            .iter()
            .position(|f| f.as_str() == name)
            .map(|i| FieldId(i as u16))
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn production(&self, prod: ProductionId) -> &ProductionInfo {
        &self.productions[prod.0 as usize]
    }

    pub fn productions(&self) -> &[ProductionInfo] {
        &self.productions
    }

    /// The table entry for `symbol` in `state`.
    #[inline]
    pub fn action(&self, state: StateId, symbol: Symbol) -> ParseAction {
        if symbol == Symbol::ERROR {
            return ParseAction::Error;
        }
        self.actions[state.0 as usize * self.symbols.len() + symbol.index()]
    }

    /// The actions kept for a declared conflict: the shift (if any) first,
    /// then reductions by ascending production.
    pub fn ambig(&self, ambig: AmbigId) -> &[ParseAction] {
        &self.ambigs[ambig.0 as usize]
    }

    /// The actions for `symbol` in `state` with `Ambig` expanded.
    pub fn actions(&self, state: StateId, symbol: Symbol) -> Vec<ParseAction> {
        match self.action(state, symbol) {
            ParseAction::Error => Vec::new(),
            ParseAction::Ambig(ambig) => self.ambig(ambig).to_vec(),
            action => vec![action],
        }
    }

    pub fn goto(&self, state: StateId, nonterminal: Symbol) -> Option<StateId> {
        match self.action(state, nonterminal) {
            ParseAction::Goto(next) => Some(next),
            _ => None,
        }
    }

    /// The state reached by pushing `symbol` on top of `state`: the goto of a
    /// nonterminal, or the shift of a terminal (including shifts that lost a
    /// conflict, so that reused subtrees can be broken down).
    pub fn next_state(&self, state: StateId, symbol: Symbol) -> Option<StateId> {
        match self.action(state, symbol) {
            ParseAction::Goto(next) | ParseAction::Shift(next) => Some(next),
            ParseAction::Ambig(ambig) => self.ambig(ambig).iter().find_map(|a| match a {
                ParseAction::Shift(next) => Some(*next),
                _ => None,
            }),
            _ => self.breakdown.get(&(state, symbol)).copied(),
        }
    }

    /// The reduction is lookahead-sensitive in this state.
    pub fn is_fragile(&self, state: StateId, prod: ProductionId) -> bool {
        self.fragile.contains(&(state, prod))
    }

    #[inline]
    pub fn lex_mode(&self, state: StateId) -> LexModeId {
        self.state_lex_modes[state.0 as usize]
    }

    /// Terminals valid in a lex mode, ascending.
    pub fn valid_symbols(&self, mode: LexModeId) -> &[Symbol] {
        &self.lex_modes[mode.0 as usize]
    }

    pub fn lex_mode_count(&self) -> usize {
        self.lex_modes.len()
    }

    pub fn lexical(&self) -> &LexicalSpec {
        &self.lexical
    }

    pub fn extras(&self) -> &[Symbol] {
        &self.extras
    }

    pub fn externals(&self) -> &[Symbol] {
        &self.externals
    }

    pub fn resolutions(&self) -> &[ConflictResolution] {
        &self.resolutions
    }

    pub fn kernel(&self, state: StateId) -> &[KernelItem] {
        &self.kernels[state.0 as usize]
    }

    /// A kernel item in dotted notation, e.g. `expr -> expr • "+" expr`.
    pub fn item_display(&self, (prod, dot): KernelItem) -> std::string::String {
        let info = self.production(prod);
        let mut out = format!("{} ->", self.symbol_name(info.lhs));
        for (i, symbol) in info.rhs.iter().enumerate() {
            if i == dot as usize {
                out.push_str(" •");
            }
            out.push(' ');
            out.push_str(&self.display_symbol(*symbol));
        }
        if dot as usize == info.rhs.len() {
            out.push_str(" •");
        }
        out
    }

    /// The symbol name, quoted when it is an anonymous literal.
    pub fn display_symbol(&self, symbol: Symbol) -> std::string::String {
        let meta = self.symbol_metadata(symbol);
        if meta.kind == SymbolKind::Terminal && !meta.named && meta.visible {
            format!("{:?}", meta.name.as_str())
        } else {
            meta.name.to_string()
        }
    }

    /// Serializes the table. Equal tables give identical bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = Writer::default();
        w.bytes(MAGIC);
        w.u32(FORMAT_VERSION);
        w.str(&self.name);

        w.len(self.symbols.len());
        for meta in &self.symbols {
            w.str(&meta.name);
            w.u8(match meta.kind {
                SymbolKind::Terminal => 0,
                SymbolKind::External => 1,
                SymbolKind::Nonterminal => 2,
                SymbolKind::Auxiliary => 3,
            });
            w.u8(meta.visible as u8 | (meta.named as u8) << 1 | (meta.extra as u8) << 2);
        }
        w.len(self.terminal_count);
        w.u16(self.start_symbol.0);

        w.len(self.fields.len());
        for field in &self.fields {
            w.str(field);
        }

        w.len(self.productions.len());
        for info in &self.productions {
            w.u16(info.lhs.0);
            w.i32(info.dynamic_precedence);
            w.len(info.rhs.len());
            for (symbol, field) in info.rhs.iter().zip(&info.fields) {
                w.u16(symbol.0);
                w.u16(field.map_or(u16::MAX, |f| f.0));
            }
        }

        w.len(self.state_count);
        for action in &self.actions {
            w.action(*action);
        }
        w.len(self.ambigs.len());
        for ambig in &self.ambigs {
            w.len(ambig.len());
            for action in ambig {
                w.action(*action);
            }
        }
        w.len(self.fragile.len());
        for (state, prod) in &self.fragile {
            w.u32(state.0);
            w.u32(prod.0);
        }
        w.len(self.breakdown.len());
        for ((state, symbol), next) in &self.breakdown {
            w.u32(state.0);
            w.u16(symbol.0);
            w.u32(next.0);
        }

        w.len(self.lex_modes.len());
        for mode in &self.lex_modes {
            w.symbols(mode);
        }
        for mode in &self.state_lex_modes {
            w.u16(mode.0);
        }

        w.len(self.lexical.tokens.len());
        for token in &self.lexical.tokens {
            w.u16(token.symbol.0);
            w.str(&token.pattern);
            w.u8(token.literal as u8);
        }
        w.len(self.lexical.skips.len());
        for skip in &self.lexical.skips {
            w.str(skip);
        }
        w.u16(self.lexical.word.map_or(u16::MAX, |s| s.0));
        w.len(self.lexical.keywords.len());
        for (text, symbol) in &self.lexical.keywords {
            w.str(text);
            w.u16(symbol.0);
        }
        w.symbols(&self.extras);
        w.symbols(&self.externals);

        w.len(self.resolutions.len());
        for res in &self.resolutions {
            w.u32(res.state.0);
            w.u16(res.lookahead.0);
            w.action(res.kept);
            w.len(res.discarded.len());
            for action in &res.discarded {
                w.action(*action);
            }
            w.u8(match res.reason {
                ResolutionReason::Precedence => 0,
                ResolutionReason::Associativity => 1,
                ResolutionReason::NonAssociative => 2,
                ResolutionReason::DeclaredConflict => 3,
                ResolutionReason::Policy => 4,
            });
        }

        for kernel in &self.kernels {
            w.len(kernel.len());
            for (prod, dot) in kernel {
                w.u32(prod.0);
                w.u16(*dot);
            }
        }
        w.u32(self.start_state.0);
        w.out
    }

    /// Decodes a table written by [`ParseTable::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<ParseTable, GrammarError> {
        let mut r = Reader { bytes, pos: 0 };
        if r.take(4)? != MAGIC {
            return Err(invalid("bad magic"));
        }
        let version = r.u32()?;
        if version != FORMAT_VERSION {
            return Err(invalid(&format!(
                "format version {version}, expected {FORMAT_VERSION}"
            )));
        }
        let name = r.str()?;

        let symbol_count = r.len()?;
        let mut symbols = Vec::with_capacity(symbol_count.min(r.remaining()));
        for _ in 0..symbol_count {
            let name = r.str()?;
            let kind = match r.u8()? {
                0 => SymbolKind::Terminal,
                1 => SymbolKind::External,
                2 => SymbolKind::Nonterminal,
                3 => SymbolKind::Auxiliary,
                other => return Err(invalid(&format!("symbol kind {other}"))),
            };
            let flags = r.u8()?;
            symbols.push(SymbolMetadata {
                name,
                kind,
                visible: flags & 1 != 0,
                named: flags & 2 != 0,
                extra: flags & 4 != 0,
            });
        }
        let terminal_count = r.len()?;
        let start_symbol = r.symbol(symbol_count)?;

        let field_count = r.len()?;
        let mut fields = Vec::with_capacity(field_count.min(r.remaining()));
        for _ in 0..field_count {
            fields.push(r.str()?);
        }

        let prod_count = r.len()?;
        let mut productions = Vec::with_capacity(prod_count.min(r.remaining()));
        for _ in 0..prod_count {
            let lhs = r.symbol(symbol_count)?;
            let dynamic_precedence = r.i32()?;
            let n = r.len()?;
            let mut rhs = Vec::with_capacity(n.min(r.remaining()));
            let mut prod_fields = Vec::with_capacity(n.min(r.remaining()));
            for _ in 0..n {
                rhs.push(r.symbol(symbol_count)?);
                prod_fields.push(match r.u16()? {
                    u16::MAX => None,
                    f if (f as usize) < field_count => Some(FieldId(f)),
                    f => return Err(invalid(&format!("field {f} out of range"))),
                });
            }
            productions.push(ProductionInfo {
                lhs,
                rhs,
                fields: prod_fields,
                dynamic_precedence,
            });
        }

        let state_count = r.len()?;
        let cells = state_count
            .checked_mul(symbol_count)
            .ok_or_else(|| invalid("table too large"))?;
        let mut actions = Vec::with_capacity(cells.min(r.remaining()));
        for _ in 0..cells {
            actions.push(r.action()?);
        }
        let ambig_count = r.len()?;
        let mut ambigs = Vec::with_capacity(ambig_count.min(r.remaining()));
        for _ in 0..ambig_count {
            let n = r.len()?;
            let mut ambig = Vec::with_capacity(n.min(r.remaining()));
            for _ in 0..n {
                ambig.push(r.action()?);
            }
            ambigs.push(ambig);
        }
        let mut fragile = BTreeSet::new();
        for _ in 0..r.len()? {
            fragile.insert((StateId(r.u32()?), ProductionId(r.u32()?)));
        }
        let mut breakdown = BTreeMap::new();
        for _ in 0..r.len()? {
            let key = (StateId(r.u32()?), r.symbol(symbol_count)?);
            breakdown.insert(key, StateId(r.u32()?));
        }

        let mode_count = r.len()?;
        let mut lex_modes = Vec::with_capacity(mode_count.min(r.remaining()));
        for _ in 0..mode_count {
            lex_modes.push(r.symbols(symbol_count)?);
        }
        let mut state_lex_modes = Vec::with_capacity(state_count.min(r.remaining()));
        for _ in 0..state_count {
            let mode = r.u16()?;
            if mode as usize >= mode_count {
                return Err(invalid(&format!("lex mode {mode} out of range")));
            }
            state_lex_modes.push(LexModeId(mode));
        }

        let mut lexical = LexicalSpec::default();
        for _ in 0..r.len()? {
            lexical.tokens.push(TokenDef {
                symbol: r.symbol(symbol_count)?,
                pattern: r.str()?,
                literal: r.u8()? != 0,
            });
        }
        for _ in 0..r.len()? {
            lexical.skips.push(r.str()?);
        }
        lexical.word = match r.u16()? {
            u16::MAX => None,
            s if (s as usize) < symbol_count => Some(Symbol(s)),
            s => return Err(invalid(&format!("symbol {s} out of range"))),
        };
        for _ in 0..r.len()? {
            let text = r.str()?;
            lexical.keywords.push((text, r.symbol(symbol_count)?));
        }
        let extras = r.symbols(symbol_count)?;
        let externals = r.symbols(symbol_count)?;

        let mut resolutions = Vec::new();
        for _ in 0..r.len()? {
            let state = StateId(r.u32()?);
            let lookahead = r.symbol(symbol_count)?;
            let kept = r.action()?;
            let mut discarded = Vec::new();
            for _ in 0..r.len()? {
                discarded.push(r.action()?);
            }
            let reason = match r.u8()? {
                0 => ResolutionReason::Precedence,
                1 => ResolutionReason::Associativity,
                2 => ResolutionReason::NonAssociative,
                3 => ResolutionReason::DeclaredConflict,
                4 => ResolutionReason::Policy,
                other => return Err(invalid(&format!("resolution reason {other}"))),
            };
            resolutions.push(ConflictResolution {
                state,
                lookahead,
                kept,
                discarded,
                reason,
            });
        }

        let mut kernels = Vec::with_capacity(state_count.min(r.remaining()));
        for _ in 0..state_count {
            let mut kernel = Vec::new();
            for _ in 0..r.len()? {
                kernel.push((ProductionId(r.u32()?), r.u16()?));
            }
            kernels.push(kernel);
        }
        let start_state = StateId(r.u32()?);
        if r.remaining() != 0 {
            return Err(invalid("trailing bytes"));
        }

        let table = ParseTable {
            name,
            symbols,
            terminal_count,
            start_symbol,
            fields,
            productions,
            state_count,
            actions,
            ambigs,
            fragile,
            breakdown,
            lex_modes,
            state_lex_modes,
            lexical,
            extras,
            externals,
            resolutions,
            kernels,
            start_state,
        };
        table.validate()?;
        Ok(table)
    }

    /// Checks that every id in the table refers to something that exists.
    fn validate(&self) -> Result<(), GrammarError> {
        if self.terminal_count == 0 || self.terminal_count > self.symbols.len() {
            return Err(invalid("terminal count out of range"));
        }
        if self.start_state.0 as usize >= self.state_count || self.lex_modes.is_empty() {
            return Err(invalid("empty automaton"));
        }
        let check = |action: &ParseAction| -> Result<(), GrammarError> {
            let ok = match *action {
                ParseAction::Error | ParseAction::Accept => true,
                ParseAction::Shift(s) | ParseAction::Goto(s) => (s.0 as usize) < self.state_count,
                ParseAction::Reduce(p) => (p.0 as usize) < self.productions.len(),
                ParseAction::Ambig(a) => (a.0 as usize) < self.ambigs.len(),
            };
            if ok {
                Ok(())
            } else {
                Err(invalid(&format!("dangling action `{action}`")))
            }
        };
        for action in self.actions.iter().chain(self.ambigs.iter().flatten()) {
            check(action)?;
        }
        for ambig in &self.ambigs {
            if ambig.iter().any(|a| matches!(a, ParseAction::Ambig(_))) {
                return Err(invalid("nested ambig entry"));
            }
        }
        for kernel in &self.kernels {
            for (prod, dot) in kernel {
                match self.productions.get(prod.0 as usize) {
                    Some(info) if *dot as usize <= info.rhs.len() => {}
                    _ => return Err(invalid("kernel item out of range")),
                }
            }
        }
        Ok(())
    }
}

fn invalid(message: &str) -> GrammarError {
    GrammarError::InvalidTable(message.to_string())
}

#[derive(Default)]
struct Writer {
    out: Vec<u8>,
}

impl Writer {
    fn bytes(&mut self, bytes: &[u8]) {
        self.out.extend_from_slice(bytes);
    }

    fn u8(&mut self, v: u8) {
        self.out.push(v);
    }

    fn u16(&mut self, v: u16) {
        self.bytes(&v.to_le_bytes());
    }

    fn u32(&mut self, v: u32) {
        self.bytes(&v.to_le_bytes());
    }

    fn i32(&mut self, v: i32) {
        self.bytes(&v.to_le_bytes());
    }

    fn len(&mut self, n: usize) {
        self.u32(n as u32);
    }

    fn str(&mut self, s: &str) {
        self.len(s.len());
        self.bytes(s.as_bytes());
    }

    fn symbols(&mut self, symbols: &[Symbol]) {
        self.len(symbols.len());
        for symbol in symbols {
            self.u16(symbol.0);
        }
    }

    fn action(&mut self, action: ParseAction) {
        let (tag, arg) = match action {
            ParseAction::Error => (0, 0),
            ParseAction::Accept => (1, 0),
            ParseAction::Shift(s) => (2, s.0),
            ParseAction::Reduce(p) => (3, p.0),
            ParseAction::Ambig(a) => (4, a.0),
            ParseAction::Goto(s) => (5, s.0),
        };
        self.u8(tag);
        self.u32(arg);
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], GrammarError> {
        if self.remaining() < n {
            return Err(invalid("unexpected end of data"));
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, GrammarError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, GrammarError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32, GrammarError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn i32(&mut self) -> Result<i32, GrammarError> {
        let b = self.take(4)?;
        Ok(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn len(&mut self) -> Result<usize, GrammarError> {
        Ok(self.u32()? as usize)
    }

    fn str(&mut self) -> Result<String, GrammarError> {
        let n = self.len()?;
        let bytes = self.take(n)?;
        std::str::from_utf8(bytes)
            .map(String::from)
            .map_err(|_| invalid("name is not UTF-8"))
    }

    fn symbol(&mut self, count: usize) -> Result<Symbol, GrammarError> {
        let s = self.u16()?;
        if (s as usize) < count {
            Ok(Symbol(s))
        } else {
            Err(invalid(&format!("symbol {s} out of range")))
        }
    }

    fn symbols(&mut self, count: usize) -> Result<Vec<Symbol>, GrammarError> {
        let n = self.len()?;
        let mut out = Vec::with_capacity(n.min(self.remaining()));
        for _ in 0..n {
            out.push(self.symbol(count)?);
        }
        Ok(out)
    }

    fn action(&mut self) -> Result<ParseAction, GrammarError> {
        let tag = self.u8()?;
        let arg = self.u32()?;
        Ok(match tag {
            0 => ParseAction::Error,
            1 => ParseAction::Accept,
            2 => ParseAction::Shift(StateId(arg)),
            3 => ParseAction::Reduce(ProductionId(arg)),
            4 => ParseAction::Ambig(AmbigId(arg)),
            5 => ParseAction::Goto(StateId(arg)),
            other => return Err(invalid(&format!("action tag {other}"))),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::{CompileOptions, compile};
    use crate::grammar::{Grammar, GrammarDef, choice, lit, pat, prec_left, seq, sym};

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn table() -> ParseTable {
        let def = GrammarDef::new("sum")
            .rule(
                "expr",
                choice([
                    sym("number"),
                    prec_left(1, seq([sym("expr"), lit("+"), sym("expr")])),
                ]),
            )
            .rule("number", pat("[0-9]+"));
        let grammar = Grammar::load(&def).unwrap();
        compile(&grammar, &CompileOptions::default()).unwrap()
    }

    #[test]
    fn bytes_decode_to_an_equal_table() {
        init_logger();
        let table = table();
        let bytes = table.to_bytes();
        assert_eq!(&bytes[..4], MAGIC);
        let decoded = ParseTable::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, table);
        assert_eq!(decoded.to_bytes(), bytes);
    }

    #[test]
    fn truncated_bytes_are_rejected() {
        init_logger();
        let bytes = table().to_bytes();
        for cut in [0, 3, 8, bytes.len() / 2, bytes.len() - 1] {
            assert!(matches!(
                ParseTable::from_bytes(&bytes[..cut]),
                Err(GrammarError::InvalidTable(_))
            ));
        }
    }

    #[test]
    fn oversized_counts_are_rejected() {
        init_logger();
        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        bytes.extend_from_slice(&1u32.to_le_bytes());
        bytes.push(b'x');
        bytes.extend_from_slice(&u32::MAX.to_le_bytes());
        assert!(matches!(
            ParseTable::from_bytes(&bytes),
            Err(GrammarError::InvalidTable(_))
        ));
    }

    #[test]
    fn other_versions_are_rejected() {
        init_logger();
        let mut bytes = table().to_bytes();
        bytes[4] = bytes[4].wrapping_add(1);
        let err = ParseTable::from_bytes(&bytes).unwrap_err();
        assert!(err.to_string().contains("format version"));
    }

    #[test]
    fn next_state_follows_gotos_and_shifts() {
        init_logger();
        let table = table();
        let start = table.start_state();
        let number = table.symbol_for_name("number", true).unwrap();
        let expr = table.symbol_for_name("expr", true).unwrap();
        assert!(matches!(table.action(start, number), ParseAction::Shift(_)));
        assert_eq!(table.next_state(start, expr), table.goto(start, expr));
        assert!(table.goto(start, expr).is_some());
        assert_eq!(table.action(start, Symbol::ERROR), ParseAction::Error);
    }
}
