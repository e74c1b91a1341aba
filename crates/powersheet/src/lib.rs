//! # powersheet
//!
//! Spreadsheet coordinate and formula binding layer for grids backed by a
//! relational store.
//!
//! - [`FormulaRegistry`] - per-sheet formula cells over isolated evaluation contexts
//! - [`GridEditor`] - selection and edit state machine
//! - [`fill()`] - drag-fill of a formula or value over a range
//! - [`Document`] - open sheets persisted through a [`BackingStore`]
//!
//! ## Example
//!
//! ```rust
//! use powersheet::prelude::*;
//!
//! let mut registry = FormulaRegistry::new();
//! registry.open_sheet("sales", "Sales", vec!["Price".into(), "Qty".into()]);
//! registry
//!     .initialize_sheet("sales", vec![vec![Scalar::Number(10.0), Scalar::Number(3.0)]])
//!     .unwrap();
//!
//! registry
//!     .set_cell("sales", 0, 1, CellContent::parse("=Price*Qty"))
//!     .unwrap();
//! assert_eq!(registry.get_cell_value("sales", 0, 1), Some(Scalar::Number(30.0)));
//! assert_eq!(registry.get_formula("sales", 0, 1).as_deref(), Some("=Price*Qty"));
//! ```

pub mod document;
pub mod editor;
pub mod error;
pub mod fill;
pub mod prelude;
pub mod registry;
pub mod selection;

pub use document::{
    Document, DocumentOptions, FailedWrite, FillReport, LoadOutcome, LoadTicket, SheetLoad,
};
pub use editor::{CommitMove, EditSession, EditorOptions, EditorState, GridEditor, Key, Modifiers};
pub use error::{Error, RegistryError, Result};
pub use fill::{fill, FillOperation};
pub use registry::{CellWrite, FormulaEntry, FormulaRegistry, SetOutcome, Sheet, SheetState};
pub use selection::{Direction, Selection};

// Re-export core types
pub use powersheet_core::{
    column_index_to_letters, letters_to_column_index, CellAddress, CellContent, CellError,
    CellRange, RangeBounds, Scalar,
};

// Re-export formula types
pub use powersheet_formula::{
    resolve_for_display, resolve_for_storage, ContextHandle, EvaluationEngine, FormulaError,
    GridEngine, Resolution, UnknownColumnReference,
};

// Re-export store types
pub use powersheet_store::{
    BackingStore, CellUpdate, HttpStore, MemoryStore, SheetSnapshot, StoreConfig, StoreError,
};
