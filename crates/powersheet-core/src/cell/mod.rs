//! Cell-related types and utilities
//!
//! This module contains:
//! - [`CellAddress`] - A cell's location (e.g., "A1")
//! - [`CellRange`] - A range of cells (e.g., "A1:B10")
//! - [`Scalar`] - The value held by, or computed for, a cell
//! - [`CellContent`] - Literal or formula input

mod address;
mod value;

pub use address::{
    column_index_to_letters, letters_to_column_index, CellAddress, CellRange,
    CellRangeIterator, RangeBounds,
};
pub use value::{CellContent, CellError, Scalar};
