//! # powersheet-core
//!
//! Core data structures for the powersheet grid.
//!
//! This crate provides the fundamental types used throughout powersheet:
//! - [`CellAddress`] and [`CellRange`] - the coordinate codec between `(row, col)`
//!   positions and `"A1"` / `"A1:C10"` text
//! - [`Scalar`] and [`CellError`] - the values a cell can hold or compute to
//! - [`CellContent`] - what a user typed: a literal or a formula
//!
//! ## Example
//!
//! ```rust
//! use powersheet_core::{CellAddress, CellRange};
//!
//! let addr = CellAddress::new(11, 26);
//! assert_eq!(addr.to_string(), "AA12");
//! assert_eq!(CellAddress::parse("AA12").unwrap(), addr);
//!
//! let range = CellRange::parse("C10:A1").unwrap();
//! let bounds = range.bounds();
//! assert_eq!((bounds.min_row, bounds.max_row), (0, 9));
//! ```

pub mod cell;
pub mod error;

// Re-exports for convenience
pub use cell::{
    column_index_to_letters, letters_to_column_index, CellAddress, CellContent, CellError,
    CellRange, CellRangeIterator, RangeBounds, Scalar,
};
pub use error::{Error, Result};

/// Marker that turns cell content into a formula
pub const FORMULA_MARKER: char = '=';
