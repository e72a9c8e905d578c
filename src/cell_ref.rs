//! Utilities for Excel-style cell references and ranges.
//!
//! Coordinates are 1-based. Column letters use bijective base-26 numbering:
//! there is no zero digit, so `Z` is 26 and `AA` is 27.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::error::GridError;

/// A 1-based grid coordinate: `x` is the column, `y` the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Coord {
    pub x: u32,
    pub y: u32,
}

impl Coord {
    #[must_use]
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// The cell one column to the right.
    #[must_use]
    pub fn right(self) -> Self {
        Self::new(self.x.saturating_add(1), self.y)
    }

    /// The cell one column to the left, if any.
    #[must_use]
    pub fn left(self) -> Option<Self> {
        (self.x > 1).then(|| Self::new(self.x - 1, self.y))
    }

    /// The cell one row up, if any.
    #[must_use]
    pub fn above(self) -> Option<Self> {
        (self.y > 1).then(|| Self::new(self.x, self.y - 1))
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", column_to_letters(self.x), self.y)
    }
}

impl FromStr for Coord {
    type Err = GridError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_cell_ref(s).ok_or_else(|| GridError::CellRef(s.to_string()))
    }
}

/// Convert a 1-based column number to letters: 1 → "A", 28 → "AB".
///
/// Returns an empty string for 0.
#[must_use]
pub fn column_to_letters(col: u32) -> String {
    let mut letters = Vec::new();
    let mut n = col;
    while n > 0 {
        let rem = (n - 1) % 26;
        // rem < 26, always a valid ASCII offset
        letters.push(char::from(b'A' + u8::try_from(rem).unwrap_or(0)));
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// Convert column letters back to a 1-based column number.
///
/// Accepts lower case. Returns `None` for empty input, non-letters or overflow.
#[must_use]
pub fn letters_to_column(letters: &str) -> Option<u32> {
    if letters.is_empty() {
        return None;
    }
    let mut col: u32 = 0;
    for b in letters.bytes() {
        if !b.is_ascii_alphabetic() {
            return None;
        }
        let digit = u32::from(b.to_ascii_uppercase() - b'A') + 1;
        col = col.checked_mul(26)?.checked_add(digit)?;
    }
    Some(col)
}

/// Parse a cell reference like "AB3" (or "$AB$3") into a 1-based coordinate.
#[must_use]
pub fn parse_cell_ref(cell_ref: &str) -> Option<Coord> {
    let cleaned: String = cell_ref.trim().chars().filter(|&c| c != '$').collect();
    let split = cleaned.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = cleaned.split_at(split);
    let x = letters_to_column(letters)?;
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let y: u32 = digits.parse().ok()?;
    if y == 0 {
        return None;
    }
    Some(Coord::new(x, y))
}

/// Parse a range like "A1:B10" (or a single "A1") into `(start, end)`.
#[must_use]
pub fn parse_cell_range(range: &str) -> Option<(Coord, Coord)> {
    if let Some((start, end)) = range.split_once(':') {
        Some((parse_cell_ref(start)?, parse_cell_ref(end)?))
    } else {
        let single = parse_cell_ref(range)?;
        Some((single, single))
    }
}

/// Format a range as "A1:B2"; a single cell is written without a colon.
#[must_use]
pub fn format_range(start: Coord, end: Coord) -> String {
    if start == end {
        start.to_string()
    } else {
        format!("{start}:{end}")
    }
}

/// All coordinates of the rectangle spanned by `start` and `end`, in reading
/// order (row by row, left to right). The first element is the top-left cell.
#[must_use]
pub fn cells_in_range(start: Coord, end: Coord) -> Vec<Coord> {
    let (x0, x1) = (start.x.min(end.x), start.x.max(end.x));
    let (y0, y1) = (start.y.min(end.y), start.y.max(end.y));
    let mut cells = Vec::new();
    for y in y0..=y1 {
        for x in x0..=x1 {
            cells.push(Coord::new(x, y));
        }
    }
    cells
}
