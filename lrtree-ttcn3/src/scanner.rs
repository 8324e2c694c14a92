//! External scanner for TTCN-3 character strings.
//!
//! A charstring is enclosed in double quotes. A doubled quote (`""`) stands
//! for one quote character and a backslash escapes the next byte. An
//! unterminated string is not a token, so the parser reports it as an error.

use lrtree::{ExternalScanner, ScanCursor, Symbol, ValidSymbols};

/// Scans `charstring` tokens.
#[derive(Debug, Clone, Copy)]
pub struct CharstringScanner {
    charstring: Symbol,
}

impl CharstringScanner {
    pub fn new(charstring: Symbol) -> Self {
        Self { charstring }
    }
}

impl ExternalScanner for CharstringScanner {
    fn scan(&self, cursor: &mut ScanCursor<'_, '_>, valid: &ValidSymbols<'_>) -> Option<Symbol> {
        if !valid.contains(self.charstring) || cursor.lookahead() != Some(b'"') {
            return None;
        }
        cursor.advance();
        loop {
            match cursor.lookahead()? {
                b'"' => {
                    cursor.advance();
                    if cursor.lookahead() != Some(b'"') {
                        cursor.mark_end();
                        return Some(self.charstring);
                    }
                    cursor.advance();
                }
                b'\\' => {
                    cursor.advance();
                    cursor.lookahead()?;
                    cursor.advance();
                }
                _ => cursor.advance(),
            }
        }
    }
}
