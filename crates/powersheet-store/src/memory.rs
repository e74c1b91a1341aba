//! In-process backing store
//!
//! Holds tables in memory and mirrors the backend's row-key and column-type
//! behavior closely enough for offline use and tests. Failures can be injected
//! per request.

use crate::error::{StoreError, StoreResult};
use crate::models::{ColumnInfo, ColumnTypeRequest, FormulaRecord, HealthStatus, SchemaResponse, SheetInfo};
use crate::store::{row_key, BackingStore, CellUpdate, SheetSnapshot};
use powersheet_core::Scalar;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

type UpdateFilter = Arc<dyn Fn(&CellUpdate) -> bool + Send + Sync>;

#[derive(Debug, Clone, Default)]
struct Table {
    columns: Vec<ColumnInfo>,
    rows: Vec<Vec<Scalar>>,
    /// (row key, column) → formula text
    formulas: BTreeMap<(i64, String), String>,
}

impl Table {
    fn snapshot(&self) -> SheetSnapshot {
        SheetSnapshot::new(
            self.columns.iter().map(|c| c.name.clone()).collect(),
            self.rows.clone(),
        )
    }

    fn column_index(&self, name: &str) -> StoreResult<usize> {
        self.columns
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| StoreError::NotFound(format!("column '{}'", name)))
    }

    fn row_keys(&self) -> impl Iterator<Item = i64> + '_ {
        self.rows
            .iter()
            .enumerate()
            .map(|(i, row)| row_key(row.first(), i))
    }

    fn row_index(&self, row_id: i64) -> StoreResult<usize> {
        self.row_keys()
            .position(|k| k == row_id)
            .ok_or_else(|| StoreError::NotFound(format!("row {}", row_id)))
    }

    fn next_key(&self) -> i64 {
        self.row_keys().max().unwrap_or(0) + 1
    }
}

#[derive(Default)]
struct State {
    tables: BTreeMap<String, Table>,
    sheets: Vec<SheetInfo>,
    updates: Vec<CellUpdate>,
    fail_next: usize,
    fail_updates: Option<UpdateFilter>,
}

impl State {
    fn table(&self, name: &str) -> StoreResult<&Table> {
        self.tables
            .get(name)
            .ok_or_else(|| StoreError::NotFound(format!("table '{}'", name)))
    }

    fn table_mut(&mut self, name: &str) -> StoreResult<&mut Table> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| StoreError::NotFound(format!("table '{}'", name)))
    }

    /// Consume one injected failure, if any are pending
    fn injected_failure(&mut self) -> StoreResult<()> {
        if self.fail_next > 0 {
            self.fail_next -= 1;
            return Err(StoreError::Network("injected failure".to_string()));
        }
        Ok(())
    }

    fn sheet_info(&self, sheet: &SheetInfo) -> SheetInfo {
        let mut info = sheet.clone();
        if let Some(table) = self.tables.get(&sheet.table_name) {
            info.row_count = table.rows.len() as u64;
            info.column_count = table.columns.len() as u64;
        }
        info
    }
}

/// [`BackingStore`] kept in memory
///
/// Cloning shares the same tables.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("MemoryStore")
            .field("tables", &state.tables.keys().collect::<Vec<_>>())
            .field("updates", &state.updates.len())
            .finish()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A panic while holding the lock leaves plain data behind; keep using it
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Add (or replace) a table; the first column is the row key
    pub fn with_table(self, name: &str, columns: &[&str], rows: Vec<Vec<Scalar>>) -> Self {
        self.insert_table(name, columns, rows);
        self
    }

    /// Add (or replace) a table; the first column is the row key
    pub fn insert_table(&self, name: &str, columns: &[&str], rows: Vec<Vec<Scalar>>) {
        let width = columns.len();
        let columns = columns
            .iter()
            .enumerate()
            .map(|(i, c)| ColumnInfo {
                name: c.to_string(),
                data_type: if i == 0 { "INTEGER" } else { "VARCHAR" }.to_string(),
                nullable: i != 0,
            })
            .collect();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, Scalar::Empty);
                row
            })
            .collect();
        let mut state = self.lock();
        state.tables.insert(
            name.to_string(),
            Table {
                columns,
                rows,
                formulas: BTreeMap::new(),
            },
        );
        if !state.sheets.iter().any(|s| s.table_name == name) {
            state.sheets.push(SheetInfo {
                id: name.to_string(),
                name: name.to_string(),
                table_name: name.to_string(),
                row_count: 0,
                column_count: 0,
            });
        }
    }

    /// Current rows of a table
    pub fn snapshot(&self, table: &str) -> Option<SheetSnapshot> {
        self.lock().tables.get(table).map(Table::snapshot)
    }

    /// Stored value of one cell
    pub fn cell(&self, table: &str, row_id: i64, column: &str) -> Option<Scalar> {
        let state = self.lock();
        let table = state.tables.get(table)?;
        let row = table.row_index(row_id).ok()?;
        let col = table.column_index(column).ok()?;
        table.rows.get(row)?.get(col).cloned()
    }

    /// Stored formula of one cell
    pub fn formula(&self, table: &str, row_id: i64, column: &str) -> Option<String> {
        self.lock()
            .tables
            .get(table)?
            .formulas
            .get(&(row_id, column.to_string()))
            .cloned()
    }

    /// Every cell update applied so far, in order
    pub fn updates(&self) -> Vec<CellUpdate> {
        self.lock().updates.clone()
    }

    /// Fail the next `count` requests of any kind
    pub fn fail_next(&self, count: usize) {
        self.lock().fail_next = count;
    }

    /// Fail every cell update matching `filter`
    pub fn fail_updates_where(&self, filter: impl Fn(&CellUpdate) -> bool + Send + Sync + 'static) {
        self.lock().fail_updates = Some(Arc::new(filter));
    }

    /// Stop injecting failures
    pub fn clear_failures(&self) {
        let mut state = self.lock();
        state.fail_next = 0;
        state.fail_updates = None;
    }

    fn apply_update(&self, update: CellUpdate) -> StoreResult<()> {
        let mut state = self.lock();
        state.injected_failure()?;
        if let Some(filter) = &state.fail_updates {
            if filter(&update) {
                return Err(StoreError::Http(500, format!("injected failure for {}", update.column)));
            }
        }
        let table = state.table_mut(&update.table)?;
        let row = table.row_index(update.row_id)?;
        let col = table.column_index(&update.column)?;
        table.rows[row][col] = update.value.clone();
        let key = (update.row_id, update.column.clone());
        match &update.formula {
            Some(formula) => {
                table.formulas.insert(key, formula.clone());
            }
            None => {
                table.formulas.remove(&key);
            }
        }
        state.updates.push(update);
        Ok(())
    }
}

/// Convert a value for a new column type; unconvertible values become empty
fn convert_value(value: &Scalar, new_type: &str, decimal_separator: &str) -> Scalar {
    let numeric = matches!(
        new_type.to_ascii_uppercase().as_str(),
        "DOUBLE" | "FLOAT" | "DECIMAL" | "INTEGER" | "BIGINT"
    );
    if !numeric {
        return match value {
            Scalar::Empty => Scalar::Empty,
            other => Scalar::Text(other.to_string()),
        };
    }
    match value {
        Scalar::Number(n) => Scalar::Number(*n),
        Scalar::Text(s) => {
            let normalized = if decimal_separator == "," {
                s.replace('.', "").replace(',', ".")
            } else {
                s.clone()
            };
            normalized
                .trim()
                .parse::<f64>()
                .map_or(Scalar::Empty, Scalar::Number)
        }
        Scalar::Boolean(b) => Scalar::Number(if *b { 1.0 } else { 0.0 }),
        _ => Scalar::Empty,
    }
}

/// Table name for a sheet title: lowercase ASCII alphanumerics and underscores
fn table_name_for(name: &str) -> String {
    let slug: String = name
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    if slug.is_empty() || slug.starts_with(|c: char| c.is_ascii_digit()) {
        format!("sheet_{}", slug)
    } else {
        slug
    }
}

impl BackingStore for MemoryStore {
    async fn schema(&self, table: &str) -> StoreResult<SchemaResponse> {
        let mut state = self.lock();
        state.injected_failure()?;
        let data = state.table(table)?;
        Ok(SchemaResponse {
            table_name: table.to_string(),
            columns: data.columns.clone(),
            row_count: data.rows.len() as u64,
        })
    }

    async fn fetch_rows(&self, table: &str) -> StoreResult<SheetSnapshot> {
        let mut state = self.lock();
        state.injected_failure()?;
        Ok(state.table(table)?.snapshot())
    }

    async fn update_cell(&self, update: CellUpdate) -> StoreResult<()> {
        self.apply_update(update)
    }

    async fn formulas(&self, table: &str) -> StoreResult<Vec<FormulaRecord>> {
        let mut state = self.lock();
        state.injected_failure()?;
        Ok(state
            .table(table)?
            .formulas
            .iter()
            .map(|((row_id, column), formula)| FormulaRecord {
                row_id: *row_id,
                column: column.clone(),
                formula: formula.clone(),
            })
            .collect())
    }

    async fn insert_row(&self, table: &str, position: Option<u64>) -> StoreResult<()> {
        let mut state = self.lock();
        state.injected_failure()?;
        let data = state.table_mut(table)?;
        let mut row = vec![Scalar::Empty; data.columns.len()];
        if let Some(key) = row.first_mut() {
            *key = Scalar::Number(data.next_key() as f64);
        }
        let at = position.map_or(data.rows.len(), |p| (p as usize).min(data.rows.len()));
        data.rows.insert(at, row);
        Ok(())
    }

    async fn delete_row(&self, table: &str, row_id: i64) -> StoreResult<()> {
        let mut state = self.lock();
        state.injected_failure()?;
        let data = state.table_mut(table)?;
        let row = data.row_index(row_id)?;
        data.rows.remove(row);
        data.formulas.retain(|(key, _), _| *key != row_id);
        Ok(())
    }

    async fn insert_column(&self, table: &str, name: &str, data_type: &str) -> StoreResult<()> {
        let mut state = self.lock();
        state.injected_failure()?;
        let data = state.table_mut(table)?;
        if data.columns.iter().any(|c| c.name == name) {
            return Err(StoreError::Rejected(format!("column '{}' already exists", name)));
        }
        data.columns.push(ColumnInfo {
            name: name.to_string(),
            data_type: data_type.to_string(),
            nullable: true,
        });
        for row in &mut data.rows {
            row.push(Scalar::Empty);
        }
        Ok(())
    }

    async fn delete_column(&self, table: &str, name: &str) -> StoreResult<()> {
        let mut state = self.lock();
        state.injected_failure()?;
        let data = state.table_mut(table)?;
        let col = data.column_index(name)?;
        data.columns.remove(col);
        for row in &mut data.rows {
            if col < row.len() {
                row.remove(col);
            }
        }
        data.formulas.retain(|(_, column), _| column != name);
        Ok(())
    }

    async fn change_column_type(&self, request: ColumnTypeRequest) -> StoreResult<()> {
        let mut state = self.lock();
        state.injected_failure()?;
        let data = state.table_mut(&request.table)?;
        let col = data.column_index(&request.column)?;
        data.columns[col].data_type = request.new_type.clone();
        for row in &mut data.rows {
            if let Some(value) = row.get_mut(col) {
                *value = convert_value(value, &request.new_type, &request.decimal_separator);
            }
        }
        Ok(())
    }

    async fn list_sheets(&self) -> StoreResult<Vec<SheetInfo>> {
        let mut state = self.lock();
        state.injected_failure()?;
        Ok(state.sheets.iter().map(|s| state.sheet_info(s)).collect())
    }

    async fn create_sheet(&self, name: &str, columns: Vec<String>, rows: u64) -> StoreResult<SheetInfo> {
        {
            let mut state = self.lock();
            state.injected_failure()?;
        }
        let base = table_name_for(name);
        let mut table_name = base.clone();
        let mut suffix = 1;
        while self.lock().tables.contains_key(&table_name) {
            suffix += 1;
            table_name = format!("{}_{}", base, suffix);
        }

        let mut header: Vec<&str> = vec!["id"];
        header.extend(columns.iter().map(String::as_str).filter(|c| *c != "id"));
        let data = (1..=rows)
            .map(|key| vec![Scalar::Number(key as f64)])
            .collect();
        self.insert_table(&table_name, &header, data);

        let mut state = self.lock();
        let sheet = state
            .sheets
            .iter_mut()
            .find(|s| s.table_name == table_name)
            .ok_or_else(|| StoreError::NotFound(format!("sheet '{}'", table_name)))?;
        sheet.name = name.to_string();
        let sheet = sheet.clone();
        Ok(state.sheet_info(&sheet))
    }

    async fn delete_sheet(&self, sheet_id: &str) -> StoreResult<()> {
        let mut state = self.lock();
        state.injected_failure()?;
        let index = state
            .sheets
            .iter()
            .position(|s| s.id == sheet_id)
            .ok_or_else(|| StoreError::NotFound(format!("sheet '{}'", sheet_id)))?;
        let sheet = state.sheets.remove(index);
        state.tables.remove(&sheet.table_name);
        Ok(())
    }

    async fn rename_sheet(&self, sheet_id: &str, new_name: &str) -> StoreResult<SheetInfo> {
        let mut state = self.lock();
        state.injected_failure()?;
        let sheet = state
            .sheets
            .iter_mut()
            .find(|s| s.id == sheet_id)
            .ok_or_else(|| StoreError::NotFound(format!("sheet '{}'", sheet_id)))?;
        sheet.name = new_name.to_string();
        let sheet = sheet.clone();
        Ok(state.sheet_info(&sheet))
    }

    async fn health(&self) -> StoreResult<HealthStatus> {
        self.lock().injected_failure()?;
        Ok(HealthStatus {
            status: "healthy".to_string(),
            service: "powersheet memory store".to_string(),
        })
    }
}
