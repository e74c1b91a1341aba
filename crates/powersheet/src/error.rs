//! Error types for powersheet

use powersheet_formula::FormulaError;
use powersheet_store::StoreError;
use thiserror::Error;

/// Result type alias using [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Misuse of the formula registry
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// No sheet with this id is open
    #[error("Sheet not found: {0}")]
    SheetNotFound(String),

    /// The sheet is open but has not been initialized with content yet
    #[error("Sheet not ready: {0}")]
    NotReady(String),
}

/// Errors surfaced by powersheet
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Malformed address or range
    #[error(transparent)]
    Core(#[from] powersheet_core::Error),

    /// Engine-level failure (never a single formula's evaluation error)
    #[error(transparent)]
    Formula(#[from] FormulaError),

    /// Backing store request failed
    #[error("Persistence failed: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// A grid position has no backing row key or column
    #[error("No backing cell for {address} in sheet '{sheet_id}'")]
    Unmapped { sheet_id: String, address: String },

    /// Column name does not exist in the sheet's schema
    #[error("Unknown column '{0}'")]
    UnknownColumn(String),
}

impl Error {
    /// Check if this is a backing store failure
    pub fn is_persistence_failure(&self) -> bool {
        matches!(self, Error::Store(_))
    }
}
