//! Cell address and range types
//!
//! The coordinate codec: conversions between 0-based `(row, col)` positions and
//! Excel-style `"A1"` addresses and `"A1:C10"` ranges.

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Convert a 0-based column index to letters (0 = A, 25 = Z, 26 = AA, ...)
///
/// Uses the bijective base-26 numeral system: there is no zero digit, so the value
/// after `Z` is `AA` rather than `A0`.
///
/// # Examples
/// ```
/// use powersheet_core::column_index_to_letters;
///
/// assert_eq!(column_index_to_letters(0), "A");
/// assert_eq!(column_index_to_letters(26), "AA");
/// assert_eq!(column_index_to_letters(702), "AAA");
/// ```
pub fn column_index_to_letters(index: u32) -> String {
    let mut n = i64::from(index);
    let mut letters = Vec::with_capacity(4);

    while n >= 0 {
        letters.push(b'A' + (n % 26) as u8);
        n = n / 26 - 1;
    }

    letters.iter().rev().map(|&b| char::from(b)).collect()
}

/// Convert column letters to a 0-based index (A = 0, Z = 25, AA = 26, ...)
///
/// Only uppercase `A`-`Z` are accepted.
pub fn letters_to_column_index(letters: &str) -> Result<u32> {
    if letters.is_empty() {
        return Err(Error::InvalidAddress("empty column letters".into()));
    }

    let limit = u64::from(u32::MAX) + 1;
    let mut col: u64 = 0;
    for b in letters.bytes() {
        if !b.is_ascii_uppercase() {
            return Err(Error::InvalidAddress(format!(
                "invalid column letter '{}' in '{}'",
                char::from(b),
                letters
            )));
        }
        col = col * 26 + u64::from(b - b'A' + 1);
        if col > limit {
            return Err(Error::InvalidAddress(format!(
                "column '{}' is out of range",
                letters
            )));
        }
    }

    Ok((col - 1) as u32)
}

/// A cell address (e.g., "A1", "AA12")
///
/// Rows and columns are 0-based internally; the display form uses column letters and a
/// 1-based row number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellAddress {
    /// Row index (0-based internally, 1-based in display)
    pub row: u32,
    /// Column index (0-based, A=0, B=1, ...)
    pub col: u32,
}

impl CellAddress {
    /// Create a new cell address
    pub fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    /// Parse a cell address from A1-style notation
    ///
    /// The text must match `^[A-Z]+[1-9][0-9]*$`.
    ///
    /// # Examples
    /// ```
    /// use powersheet_core::CellAddress;
    ///
    /// let addr = CellAddress::parse("B2").unwrap();
    /// assert_eq!((addr.row, addr.col), (1, 1));
    ///
    /// assert!(CellAddress::parse("A0").is_err());
    /// assert!(CellAddress::parse("a1").is_err());
    /// ```
    pub fn parse(s: &str) -> Result<Self> {
        let split = s
            .bytes()
            .position(|b| !b.is_ascii_uppercase())
            .ok_or_else(|| Error::InvalidAddress(format!("no row number in '{}'", s)))?;

        if split == 0 {
            return Err(Error::InvalidAddress(format!(
                "no column letters in '{}'",
                s
            )));
        }

        let (letters, digits) = s.split_at(split);

        if !digits.bytes().all(|b| b.is_ascii_digit()) || digits.starts_with('0') {
            return Err(Error::InvalidAddress(format!(
                "invalid row number in '{}'",
                s
            )));
        }

        let row_number: u64 = digits
            .parse()
            .map_err(|_| Error::InvalidAddress(format!("invalid row number in '{}'", s)))?;
        let row = u32::try_from(row_number - 1)
            .map_err(|_| Error::InvalidAddress(format!("row out of range in '{}'", s)))?;
        let col = letters_to_column_index(letters)?;

        Ok(Self { row, col })
    }

    /// Column letters of this address ("A", "AA", ...)
    pub fn col_letters(&self) -> String {
        column_index_to_letters(self.col)
    }

    /// 1-based row number as displayed
    pub fn row_number(&self) -> u64 {
        u64::from(self.row) + 1
    }

    /// Format as A1-style string
    pub fn to_a1_string(&self) -> String {
        format!("{}{}", self.col_letters(), self.row_number())
    }

    /// Move by a signed offset, or `None` when the result would leave the grid
    pub fn offset(&self, d_row: i64, d_col: i64) -> Option<CellAddress> {
        let row = u32::try_from(i64::from(self.row) + d_row).ok()?;
        let col = u32::try_from(i64::from(self.col) + d_col).ok()?;
        Some(Self { row, col })
    }

    /// Create a range from this address to another
    pub fn to(&self, other: CellAddress) -> CellRange {
        CellRange::new(*self, other)
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.col_letters(), self.row_number())
    }
}

impl FromStr for CellAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Normalized bounds of a range, inclusive on both ends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RangeBounds {
    pub min_row: u32,
    pub max_row: u32,
    pub min_col: u32,
    pub max_col: u32,
}

/// A range of cells (e.g., "A1:B10")
///
/// `start` and `end` keep the corner order they were created with, so a range dragged
/// from bottom-right to top-left still displays as such. Use [`CellRange::bounds`] for
/// the normalized rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellRange {
    /// First corner (the drag anchor)
    pub start: CellAddress,
    /// Second corner (the drag cursor)
    pub end: CellAddress,
}

impl CellRange {
    /// Create a new cell range from two corners in any order
    pub fn new(start: CellAddress, end: CellAddress) -> Self {
        Self { start, end }
    }

    /// Create a range from row/column indices
    pub fn from_indices(start_row: u32, start_col: u32, end_row: u32, end_col: u32) -> Self {
        Self::new(
            CellAddress::new(start_row, start_col),
            CellAddress::new(end_row, end_col),
        )
    }

    /// Create a single-cell range
    pub fn single(addr: CellAddress) -> Self {
        Self {
            start: addr,
            end: addr,
        }
    }

    /// Parse a range from A1:B10 notation
    ///
    /// Exactly one `:` is required; both endpoints must be valid addresses.
    pub fn parse(s: &str) -> Result<Self> {
        let mut parts = s.split(':');
        let (start, end) = match (parts.next(), parts.next(), parts.next()) {
            (Some(start), Some(end), None) => (start, end),
            (_, None, _) => {
                return Err(Error::InvalidRange(format!("missing ':' in '{}'", s)));
            }
            _ => {
                return Err(Error::InvalidRange(format!("more than one ':' in '{}'", s)));
            }
        };

        let start = CellAddress::parse(start)
            .map_err(|e| Error::InvalidRange(format!("'{}': {}", s, e)))?;
        let end = CellAddress::parse(end)
            .map_err(|e| Error::InvalidRange(format!("'{}': {}", s, e)))?;

        Ok(Self::new(start, end))
    }

    /// Normalized bounds regardless of corner order
    pub fn bounds(&self) -> RangeBounds {
        RangeBounds {
            min_row: self.start.row.min(self.end.row),
            max_row: self.start.row.max(self.end.row),
            min_col: self.start.col.min(self.end.col),
            max_col: self.start.col.max(self.end.col),
        }
    }

    /// The same rectangle with `start` top-left and `end` bottom-right
    pub fn normalized(&self) -> CellRange {
        let b = self.bounds();
        CellRange::from_indices(b.min_row, b.min_col, b.max_row, b.max_col)
    }

    /// Check if a cell is within this range
    pub fn contains(&self, addr: &CellAddress) -> bool {
        let b = self.bounds();
        addr.row >= b.min_row
            && addr.row <= b.max_row
            && addr.col >= b.min_col
            && addr.col <= b.max_col
    }

    /// Get the number of rows in the range
    pub fn row_count(&self) -> u64 {
        let b = self.bounds();
        u64::from(b.max_row - b.min_row) + 1
    }

    /// Get the number of columns in the range
    pub fn col_count(&self) -> u64 {
        let b = self.bounds();
        u64::from(b.max_col - b.min_col) + 1
    }

    /// Get the total number of cells in the range
    pub fn cell_count(&self) -> u64 {
        self.row_count() * self.col_count()
    }

    /// Iterate over all cell addresses in the range (row by row)
    pub fn cells(&self) -> CellRangeIterator {
        let bounds = self.bounds();
        CellRangeIterator {
            bounds,
            current_row: u64::from(bounds.min_row),
            current_col: bounds.min_col,
        }
    }

    /// Format as A1:B10 string
    pub fn to_a1_string(&self) -> String {
        format!("{}:{}", self.start, self.end)
    }
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.start, self.end)
    }
}

impl FromStr for CellRange {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Iterator over cells in a range
pub struct CellRangeIterator {
    bounds: RangeBounds,
    current_row: u64,
    current_col: u32,
}

impl Iterator for CellRangeIterator {
    type Item = CellAddress;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current_row > u64::from(self.bounds.max_row) {
            return None;
        }

        let addr = CellAddress::new(self.current_row as u32, self.current_col);

        // Move to next cell
        if self.current_col >= self.bounds.max_col {
            self.current_col = self.bounds.min_col;
            self.current_row += 1;
        } else {
            self.current_col += 1;
        }

        Some(addr)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let width = u64::from(self.bounds.max_col - self.bounds.min_col) + 1;
        let rows_left = (u64::from(self.bounds.max_row) + 1).saturating_sub(self.current_row);
        let remaining = if rows_left == 0 {
            0
        } else {
            rows_left * width - u64::from(self.current_col - self.bounds.min_col)
        };
        let remaining = usize::try_from(remaining).unwrap_or(usize::MAX);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for CellRangeIterator {}
