//! Prelude module - common imports for powersheet users
//!
//! ```rust
//! use powersheet::prelude::*;
//! ```

pub use crate::{
    // Coordinates
    CellAddress,
    CellRange,
    // Cell values
    CellContent,
    CellError,
    Scalar,

    // Registry
    FormulaRegistry,
    SetOutcome,

    // Editing
    Direction,
    EditorOptions,
    GridEditor,
    Key,
    Modifiers,

    // Fill
    FillOperation,

    // Documents and stores
    BackingStore,
    Document,
    DocumentOptions,
    HttpStore,
    MemoryStore,
    StoreConfig,

    // Error types
    Error,
    Result,
};
