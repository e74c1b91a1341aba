//! The backing store interface

use crate::error::StoreResult;
use crate::models::{
    scalar_from_json, scalar_to_json, CellUpdateRequest, ColumnTypeRequest, FormulaRecord,
    HealthStatus, QueryResponse, SchemaResponse, SheetInfo,
};
use powersheet_core::Scalar;
use std::future::Future;

/// A single cell write
#[derive(Debug, Clone, PartialEq)]
pub struct CellUpdate {
    pub table: String,
    /// Row key (value of the table's first column)
    pub row_id: i64,
    pub column: String,
    /// Literal value, or the computed value of a formula
    pub value: Scalar,
    /// Raw formula text when the cell holds a formula
    pub formula: Option<String>,
}

impl CellUpdate {
    /// Wire form of this update
    pub fn to_request(&self) -> CellUpdateRequest {
        CellUpdateRequest {
            table: self.table.clone(),
            row_id: self.row_id,
            column: self.column.clone(),
            value: scalar_to_json(&self.value),
            formula: self.formula.clone(),
        }
    }
}

/// All rows of a table, with the key of each row
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SheetSnapshot {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Scalar>>,
    /// Key of each row, index-aligned with `rows`
    pub row_keys: Vec<i64>,
}

impl SheetSnapshot {
    /// Build a snapshot from rows, deriving row keys
    ///
    /// The first column is the row key when it holds an integer; otherwise the
    /// 1-based row position is used.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Scalar>>) -> Self {
        let row_keys = rows
            .iter()
            .enumerate()
            .map(|(i, row)| row_key(row.first(), i))
            .collect();
        Self {
            columns,
            rows,
            row_keys,
        }
    }

    /// Convert a query result
    pub fn from_query(response: QueryResponse) -> Self {
        let rows = response
            .rows
            .iter()
            .map(|row| row.iter().map(scalar_from_json).collect())
            .collect();
        Self::new(response.columns, rows)
    }

    /// Row index of a row key
    pub fn row_index(&self, row_id: i64) -> Option<usize> {
        self.row_keys.iter().position(|k| *k == row_id)
    }

    /// `(rows, cols)`
    pub fn dimensions(&self) -> (usize, usize) {
        (self.rows.len(), self.columns.len())
    }
}

pub(crate) fn row_key(first: Option<&Scalar>, index: usize) -> i64 {
    match first {
        Some(Scalar::Number(n)) if n.fract() == 0.0 && n.abs() < i64::MAX as f64 => *n as i64,
        Some(Scalar::Text(s)) => s.trim().parse().unwrap_or(index as i64 + 1),
        _ => index as i64 + 1,
    }
}

/// Relational store holding the sheet data
///
/// Methods return `Send` futures so callers can drive them from any tokio runtime.
pub trait BackingStore: Send + Sync {
    /// Column names, types and row count of a table
    fn schema(&self, table: &str) -> impl Future<Output = StoreResult<SchemaResponse>> + Send;

    /// Every row of a table
    fn fetch_rows(&self, table: &str) -> impl Future<Output = StoreResult<SheetSnapshot>> + Send;

    /// Write one cell
    fn update_cell(&self, update: CellUpdate) -> impl Future<Output = StoreResult<()>> + Send;

    /// Formulas persisted for a table
    fn formulas(&self, table: &str)
        -> impl Future<Output = StoreResult<Vec<FormulaRecord>>> + Send;

    /// Insert an empty row at a 0-based position, or at the end
    fn insert_row(
        &self,
        table: &str,
        position: Option<u64>,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    /// Delete a row by key
    fn delete_row(&self, table: &str, row_id: i64) -> impl Future<Output = StoreResult<()>> + Send;

    /// Append a column
    fn insert_column(
        &self,
        table: &str,
        name: &str,
        data_type: &str,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    /// Drop a column
    fn delete_column(&self, table: &str, name: &str)
        -> impl Future<Output = StoreResult<()>> + Send;

    /// Change the SQL type of a column
    fn change_column_type(
        &self,
        request: ColumnTypeRequest,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    /// Sheets known to the backend
    fn list_sheets(&self) -> impl Future<Output = StoreResult<Vec<SheetInfo>>> + Send;

    /// Create a sheet with the given columns and number of empty rows
    fn create_sheet(
        &self,
        name: &str,
        columns: Vec<String>,
        rows: u64,
    ) -> impl Future<Output = StoreResult<SheetInfo>> + Send;

    /// Delete a sheet and its table
    fn delete_sheet(&self, sheet_id: &str) -> impl Future<Output = StoreResult<()>> + Send;

    /// Rename a sheet
    fn rename_sheet(
        &self,
        sheet_id: &str,
        new_name: &str,
    ) -> impl Future<Output = StoreResult<SheetInfo>> + Send;

    /// Backend liveness
    fn health(&self) -> impl Future<Output = StoreResult<HealthStatus>> + Send;
}
