use std::fmt;
use std::ops::{Add, Sub};

/// A 0-based row/column position in source text.
///
/// Columns count bytes, not characters, so a point can be derived from a byte
/// stream without decoding it.
#[derive(Debug, Clone, Default, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Point {
    /// 0-based row (line) number.
    pub row: usize,
    /// 0-based byte column within the row.
    pub column: usize,
}

impl Point {
    /// Creates a new `Point`.
    #[inline]
    pub const fn new(row: usize, column: usize) -> Self {
        Self { row, column }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.row, self.column)
    }
}

/// A byte count together with the row/column extent it covers.
///
/// Subtrees store their padding and size as `Length`s relative to their own
/// start, which is what allows an unchanged subtree to be reused at a different
/// absolute offset.
#[derive(Debug, Clone, Default, Copy, PartialEq, Eq, Hash)]
pub struct Length {
    pub bytes: usize,
    pub extent: Point,
}

impl Length {
    pub const ZERO: Length = Length {
        bytes: 0,
        extent: Point { row: 0, column: 0 },
    };

    #[inline]
    pub const fn new(bytes: usize, extent: Point) -> Self {
        Self { bytes, extent }
    }

    /// Advance by consuming the byte `b`.
    #[inline]
    pub fn advance(&mut self, b: u8) {
        self.bytes += 1;
        if b == b'\n' {
            self.extent.row += 1;
            self.extent.column = 0;
        } else {
            self.extent.column += 1;
        }
    }

    /// The length of `bytes`.
    pub fn of(bytes: &[u8]) -> Self {
        let mut len = Length::ZERO;
        for &b in bytes {
            len.advance(b);
        }
        len
    }

    /// `self - other`, clamped to zero when `other` is longer.
    #[inline]
    pub fn saturating_sub(self, other: Length) -> Length {
        if self.bytes > other.bytes {
            self - other
        } else {
            Length::ZERO
        }
    }
}

impl Add for Length {
    type Output = Length;

    fn add(self, rhs: Length) -> Length {
        let extent = if rhs.extent.row > 0 {
            Point::new(self.extent.row + rhs.extent.row, rhs.extent.column)
        } else {
            Point::new(self.extent.row, self.extent.column + rhs.extent.column)
        };
        Length::new(self.bytes + rhs.bytes, extent)
    }
}

impl Sub for Length {
    type Output = Length;

    fn sub(self, rhs: Length) -> Length {
        let extent = if self.extent.row > rhs.extent.row {
            Point::new(self.extent.row - rhs.extent.row, self.extent.column)
        } else {
            Point::new(0, self.extent.column.saturating_sub(rhs.extent.column))
        };
        Length::new(self.bytes.saturating_sub(rhs.bytes), extent)
    }
}

/// A half-open source range: `[start, end)` in bytes and points.
#[derive(Debug, Clone, Default, Copy, PartialEq, Eq, Hash)]
pub struct Range {
    pub start_byte: usize,
    pub end_byte: usize,
    pub start_point: Point,
    pub end_point: Point,
}

impl Range {
    /// Is this range empty (start == end)?
    pub fn is_empty(&self) -> bool {
        self.start_byte == self.end_byte
    }

    /// Does this range contain `other`?
    pub fn contains(&self, other: &Range) -> bool {
        self.start_byte <= other.start_byte && other.end_byte <= self.end_byte
    }

    /// Pretty-print for diagnostics (human-readable).
    #[inline]
    pub fn display(&self) -> String {
        format!(
            "[{}, {}) {} to {}",
            self.start_byte, self.end_byte, self.start_point, self.end_point
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_of_multiline_text() {
        let len = Length::of(b"ab\ncde\nf");
        assert_eq!(len.bytes, 8);
        assert_eq!(len.extent, Point::new(2, 1));
    }

    #[test]
    fn add_is_relative_to_last_row() {
        let a = Length::of(b"abc");
        let b = Length::of(b"de");
        assert_eq!((a + b).extent, Point::new(0, 5));
        let c = Length::of(b"x\nyz");
        assert_eq!((a + c).extent, Point::new(1, 2));
        assert_eq!((a + c).bytes, 7);
    }

    #[test]
    fn sub_inverts_add() {
        let a = Length::of(b"one\ntwo");
        let b = Length::of(b" three\nfour");
        assert_eq!((a + b) - a, b);
        assert_eq!(a.saturating_sub(a + b), Length::ZERO);
    }
}
