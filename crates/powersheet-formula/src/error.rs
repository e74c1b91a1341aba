//! Formula error types

use powersheet_core::CellError;
use thiserror::Error;

/// Result type for formula operations
pub type FormulaResult<T> = std::result::Result<T, FormulaError>;

/// Errors that can occur during formula parsing or evaluation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormulaError {
    /// Formula parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Formula evaluation error
    #[error("Evaluation error: {0}")]
    Evaluation(String),

    /// Invalid argument
    #[error("Invalid argument: {0}")]
    Argument(String),

    /// Unknown function
    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    /// Wrong number of arguments
    #[error("Wrong number of arguments for {function}: expected {expected}, got {actual}")]
    ArgumentCount {
        function: String,
        expected: String,
        actual: usize,
    },

    /// Circular reference
    #[error("Circular reference detected")]
    CircularReference,

    /// Reference to invalid cell
    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    /// Evaluation context handle that was never created or was destroyed
    #[error("Unknown evaluation context: {0}")]
    UnknownContext(u64),

    /// Content handed to a context was not a full rectangle
    #[error("Content is not rectangular: row {row} has {actual} cells, expected {expected}")]
    NotRectangular {
        row: usize,
        expected: usize,
        actual: usize,
    },

    /// Write that would grow a grid past the supported size
    #[error("Sheet cannot grow to {rows} rows by {cols} columns")]
    TooLarge { rows: usize, cols: usize },
}

impl FormulaError {
    /// The in-cell error marker shown for this failure
    pub fn cell_error(&self) -> CellError {
        match self {
            FormulaError::UnknownFunction(_) => CellError::Name,
            FormulaError::CircularReference => CellError::Calc,
            FormulaError::InvalidReference(_)
            | FormulaError::UnknownContext(_)
            | FormulaError::TooLarge { .. } => CellError::Ref,
            FormulaError::Parse(_)
            | FormulaError::Evaluation(_)
            | FormulaError::Argument(_)
            | FormulaError::ArgumentCount { .. }
            | FormulaError::NotRectangular { .. } => CellError::Value,
        }
    }
}
