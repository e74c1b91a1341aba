//! # powersheet-store
//!
//! Access to the relational store behind a sheet: the [`BackingStore`] trait,
//! an HTTP client for the backend API and an in-memory implementation.

pub mod config;
pub mod error;
pub mod http;
pub mod memory;
pub mod models;
pub mod store;

pub use config::{StoreConfig, API_TIMEOUT_ENV, API_URL_ENV};
pub use error::{StoreError, StoreResult};
pub use http::{select_all_sql, HttpStore};
pub use memory::MemoryStore;
pub use models::{
    ColumnInfo, ColumnTypeRequest, FormulaRecord, HealthStatus, SchemaResponse, SheetInfo,
};
pub use store::{BackingStore, CellUpdate, SheetSnapshot};
