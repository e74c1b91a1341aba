//! Document session: open sheets backed by a store
//!
//! Local state is optimistic. Every edit is applied to the registry first and then
//! written to the [`BackingStore`]; a failed write leaves the edit in place, flags
//! the sheet and returns the failure. [`Document::reconcile`] reloads the sheet from
//! the store.
//!
//! Loads are ticketed per sheet. A newer [`Document::begin_load`] supersedes older
//! tickets, and a snapshot fetched for a superseded ticket is discarded.

use crate::editor::{EditorOptions, GridEditor, Key, Modifiers};
use crate::error::{Error, RegistryError, Result};
use crate::fill::{self, FillOperation};
use crate::registry::{FormulaRegistry, SetOutcome};
use powersheet_core::{CellAddress, CellContent};
use powersheet_formula::{EvaluationEngine, GridEngine};
use powersheet_store::{
    BackingStore, CellUpdate, ColumnTypeRequest, FormulaRecord, SheetSnapshot,
};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Document behavior switches
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentOptions {
    pub editor: EditorOptions,
    /// Reload a sheet right after one of its writes fails
    pub reconcile_on_failure: bool,
}

/// Proof that a load was requested; only the newest ticket of a sheet is applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    sheet_id: String,
    generation: u64,
}

impl LoadTicket {
    pub fn sheet_id(&self) -> &str {
        &self.sheet_id
    }
}

/// Data fetched for one load
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SheetLoad {
    pub snapshot: SheetSnapshot,
    pub formulas: Vec<FormulaRecord>,
}

/// What happened to a fetched snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Applied {
        rows: usize,
        cols: usize,
        /// Formula records replayed into the registry
        formulas: usize,
        /// Formula records naming rows or columns that no longer exist
        skipped: usize,
    },
    /// A newer load was requested for the same sheet
    Superseded,
}

/// A fill cell that was written locally but not persisted
#[derive(Debug, Clone, PartialEq)]
pub struct FailedWrite {
    pub address: CellAddress,
    /// [`Error::Store`] when the store refused the write, [`Error::Unmapped`]
    /// when the cell has no backing row or column
    pub error: Error,
}

/// Result of [`Document::fill`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FillReport {
    /// Every cell written locally, row-major
    pub outcomes: Vec<SetOutcome>,
    /// Cells whose persistence failed; they keep their local value
    pub failures: Vec<FailedWrite>,
}

impl FillReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug)]
struct SheetSession {
    table: String,
    editor: GridEditor,
    row_keys: Vec<i64>,
    load_generation: u64,
    needs_reconcile: bool,
}

/// Open sheets of one user session over a backing store
#[derive(Debug)]
pub struct Document<S: BackingStore, E: EvaluationEngine = GridEngine> {
    store: S,
    registry: FormulaRegistry<E>,
    sessions: BTreeMap<String, SheetSession>,
    options: DocumentOptions,
}

impl<S: BackingStore> Document<S, GridEngine> {
    pub fn new(store: S) -> Self {
        Self::with_options(store, DocumentOptions::default())
    }

    pub fn with_options(store: S, options: DocumentOptions) -> Self {
        Self::with_engine(store, GridEngine::new(), options)
    }
}

impl<S: BackingStore, E: EvaluationEngine> Document<S, E> {
    pub fn with_engine(store: S, engine: E, options: DocumentOptions) -> Self {
        Self {
            store,
            registry: FormulaRegistry::with_engine(engine),
            sessions: BTreeMap::new(),
            options,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn registry(&self) -> &FormulaRegistry<E> {
        &self.registry
    }

    pub fn options(&self) -> &DocumentOptions {
        &self.options
    }

    /// Editor state of an open sheet
    pub fn editor(&self, sheet_id: &str) -> Option<&GridEditor> {
        self.sessions.get(sheet_id).map(|s| &s.editor)
    }

    /// Table backing an open sheet
    pub fn table(&self, sheet_id: &str) -> Option<&str> {
        self.sessions.get(sheet_id).map(|s| s.table.as_str())
    }

    /// Check if a write to the sheet failed since its last load
    pub fn needs_reconcile(&self, sheet_id: &str) -> bool {
        self.sessions
            .get(sheet_id)
            .is_some_and(|s| s.needs_reconcile)
    }

    fn session(&self, sheet_id: &str) -> Result<&SheetSession> {
        self.sessions
            .get(sheet_id)
            .ok_or_else(|| RegistryError::SheetNotFound(sheet_id.to_string()).into())
    }

    fn session_mut(&mut self, sheet_id: &str) -> Result<&mut SheetSession> {
        self.sessions
            .get_mut(sheet_id)
            .ok_or_else(|| RegistryError::SheetNotFound(sheet_id.to_string()).into())
    }

    /// Open a sheet over `table`, load its rows and replay its formulas
    pub async fn open_sheet(&mut self, sheet_id: &str, display_name: &str, table: &str) -> Result<LoadOutcome> {
        self.registry.open_sheet(sheet_id, display_name, Vec::new());
        self.sessions
            .entry(sheet_id.to_string())
            .or_insert_with(|| SheetSession {
                table: table.to_string(),
                editor: GridEditor::new(sheet_id, self.options.editor.clone()),
                row_keys: Vec::new(),
                load_generation: 0,
                needs_reconcile: false,
            })
            .table = table.to_string();
        self.load_sheet(sheet_id).await
    }

    /// Close a sheet and release its evaluation context
    pub fn close_sheet(&mut self, sheet_id: &str) -> bool {
        let had_session = self.sessions.remove(sheet_id).is_some();
        self.registry.close_sheet(sheet_id) || had_session
    }

    /// Request a new load of a sheet, superseding any earlier request
    pub fn begin_load(&mut self, sheet_id: &str) -> Result<LoadTicket> {
        let session = self.session_mut(sheet_id)?;
        session.load_generation += 1;
        Ok(LoadTicket {
            sheet_id: sheet_id.to_string(),
            generation: session.load_generation,
        })
    }

    /// Fetch rows and formulas for a ticket
    pub async fn fetch(&self, ticket: &LoadTicket) -> Result<SheetLoad> {
        let table = self.session(&ticket.sheet_id)?.table.clone();
        let snapshot = self.store.fetch_rows(&table).await?;
        let formulas = self.store.formulas(&table).await?;
        Ok(SheetLoad { snapshot, formulas })
    }

    /// Replace the sheet's content with a fetched load, unless superseded
    pub fn apply_snapshot(&mut self, ticket: &LoadTicket, load: SheetLoad) -> Result<LoadOutcome> {
        let sheet_id = ticket.sheet_id.as_str();
        let session = self.session(sheet_id)?;
        if session.load_generation != ticket.generation {
            debug!(sheet_id, ticket = ticket.generation, current = session.load_generation, "discarding superseded load");
            return Ok(LoadOutcome::Superseded);
        }

        let SheetLoad { snapshot, formulas } = load;
        let (rows, cols) = snapshot.dimensions();
        self.registry
            .set_backing_columns(sheet_id, snapshot.columns.clone())?;
        self.registry
            .initialize_sheet(sheet_id, snapshot.rows.clone())?;

        let mut replayed = 0;
        let mut skipped = 0;
        for record in &formulas {
            let row = snapshot.row_index(record.row_id);
            let col = snapshot.columns.iter().position(|c| *c == record.column);
            let (Some(row), Some(col)) = (row, col) else {
                warn!(sheet_id, row_id = record.row_id, column = %record.column, "skipping formula for missing cell");
                skipped += 1;
                continue;
            };
            self.registry.set_cell_value(
                sheet_id,
                row as u32,
                col as u32,
                CellContent::Formula(record.formula.clone()),
                &snapshot.columns,
            )?;
            replayed += 1;
        }

        let registry = &self.registry;
        let session = self
            .sessions
            .get_mut(sheet_id)
            .ok_or_else(|| RegistryError::SheetNotFound(sheet_id.to_string()))?;
        session.row_keys = snapshot.row_keys;
        session.needs_reconcile = false;
        session.editor.sync_extent(registry);

        info!(sheet_id, rows, cols, formulas = replayed, skipped, "loaded sheet");
        Ok(LoadOutcome::Applied {
            rows,
            cols,
            formulas: replayed,
            skipped,
        })
    }

    /// Load a sheet from the store (last request wins)
    pub async fn load_sheet(&mut self, sheet_id: &str) -> Result<LoadOutcome> {
        let ticket = self.begin_load(sheet_id)?;
        let load = self.fetch(&ticket).await?;
        self.apply_snapshot(&ticket, load)
    }

    /// Overwrite local state with the store's data after failed writes
    pub async fn reconcile(&mut self, sheet_id: &str) -> Result<LoadOutcome> {
        info!(sheet_id, "reconciling sheet with backing store");
        self.load_sheet(sheet_id).await
    }

    /// Backing row key and column name of a grid cell
    fn backing_cell(&self, sheet_id: &str, row: u32, col: u32) -> Result<(i64, String)> {
        let session = self.session(sheet_id)?;
        let unmapped = || Error::Unmapped {
            sheet_id: sheet_id.to_string(),
            address: CellAddress::new(row, col).to_string(),
        };
        let row_id = *session.row_keys.get(row as usize).ok_or_else(unmapped)?;
        let column = self
            .registry
            .backing_columns(sheet_id)
            .and_then(|columns| columns.get(col as usize))
            .ok_or_else(unmapped)?
            .clone();
        Ok((row_id, column))
    }

    fn cell_update(&self, sheet_id: &str, outcome: &SetOutcome) -> Result<CellUpdate> {
        let write = outcome.write();
        let (row_id, column) = self.backing_cell(sheet_id, write.row, write.col)?;
        Ok(CellUpdate {
            table: self.session(sheet_id)?.table.clone(),
            row_id,
            column,
            value: write.value,
            formula: write.formula,
        })
    }

    /// Write one outcome to the store, flagging the sheet on failure
    ///
    /// The outcome is already applied locally, so an unmapped cell flags the
    /// sheet just like a refused write.
    async fn persist(&mut self, sheet_id: &str, outcome: &SetOutcome) -> Result<()> {
        let written = match self.cell_update(sheet_id, outcome) {
            Ok(update) => self.store.update_cell(update).await.map_err(Error::from),
            Err(e) => Err(e),
        };
        match written {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!(sheet_id, address = %outcome.address, error = %e, "cell write failed");
                self.session_mut(sheet_id)?.needs_reconcile = true;
                if self.options.reconcile_on_failure {
                    if let Err(reload) = self.reconcile(sheet_id).await {
                        warn!(sheet_id, error = %reload, "reconciliation failed");
                    }
                }
                Err(e)
            }
        }
    }

    /// Feed a keystroke to a sheet's editor, persisting any commit
    pub async fn handle_key(
        &mut self,
        sheet_id: &str,
        key: Key,
        modifiers: Modifiers,
    ) -> Result<Option<SetOutcome>> {
        let session = self
            .sessions
            .get_mut(sheet_id)
            .ok_or_else(|| RegistryError::SheetNotFound(sheet_id.to_string()))?;
        let outcome = session
            .editor
            .handle_key(&mut self.registry, key, modifiers)?;
        self.persist_outcome(sheet_id, outcome).await
    }

    /// Select a cell, committing an open edit first
    pub async fn click(&mut self, sheet_id: &str, addr: CellAddress) -> Result<Option<SetOutcome>> {
        let session = self
            .sessions
            .get_mut(sheet_id)
            .ok_or_else(|| RegistryError::SheetNotFound(sheet_id.to_string()))?;
        let outcome = session.editor.click(&mut self.registry, addr)?;
        self.persist_outcome(sheet_id, outcome).await
    }

    /// Commit the open edit of a sheet in place (focus loss)
    pub async fn commit_edit(&mut self, sheet_id: &str) -> Result<Option<SetOutcome>> {
        let session = self
            .sessions
            .get_mut(sheet_id)
            .ok_or_else(|| RegistryError::SheetNotFound(sheet_id.to_string()))?;
        let outcome = session.editor.focus_lost(&mut self.registry)?;
        self.persist_outcome(sheet_id, outcome).await
    }

    async fn persist_outcome(&mut self, sheet_id: &str, outcome: Option<SetOutcome>) -> Result<Option<SetOutcome>> {
        if let Some(outcome) = &outcome {
            self.persist(sheet_id, outcome).await?;
        }
        Ok(outcome)
    }

    /// Write content into a cell directly and persist it
    ///
    /// A cell with no backing row or column is refused before anything changes.
    pub async fn set_cell(&mut self, sheet_id: &str, row: u32, col: u32, content: CellContent) -> Result<SetOutcome> {
        self.backing_cell(sheet_id, row, col)?;
        let outcome = self.registry.set_cell(sheet_id, row, col, content)?;
        self.persist(sheet_id, &outcome).await?;
        Ok(outcome)
    }

    /// Drag-fill, then persist every written cell
    ///
    /// Failed writes do not undo other cells; they are listed in the report and the
    /// sheet is flagged for reconciliation.
    pub async fn fill(&mut self, sheet_id: &str, operation: FillOperation) -> Result<FillReport> {
        let columns = self
            .registry
            .backing_columns(sheet_id)
            .ok_or_else(|| RegistryError::SheetNotFound(sheet_id.to_string()))?
            .to_vec();
        let outcomes = fill::fill(&mut self.registry, sheet_id, operation, &columns)?;

        let mut failures = Vec::new();
        for outcome in &outcomes {
            let written = match self.cell_update(sheet_id, outcome) {
                Ok(update) => self.store.update_cell(update).await.map_err(Error::from),
                Err(e) => Err(e),
            };
            if let Err(error) = written {
                warn!(sheet_id, address = %outcome.address, error = %error, "fill write failed");
                failures.push(FailedWrite {
                    address: outcome.address,
                    error,
                });
            }
        }
        if !failures.is_empty() {
            self.session_mut(sheet_id)?.needs_reconcile = true;
        }
        Ok(FillReport { outcomes, failures })
    }

    /// Append a column to the backing table and reload
    pub async fn add_column(&mut self, sheet_id: &str, name: &str, data_type: &str) -> Result<LoadOutcome> {
        let table = self.session(sheet_id)?.table.clone();
        self.store.insert_column(&table, name, data_type).await?;
        self.load_sheet(sheet_id).await
    }

    /// Drop a column from the backing table and reload
    pub async fn drop_column(&mut self, sheet_id: &str, name: &str) -> Result<LoadOutcome> {
        let known = self
            .registry
            .backing_columns(sheet_id)
            .is_some_and(|columns| columns.iter().any(|c| c == name));
        if !known {
            return Err(Error::UnknownColumn(name.to_string()));
        }
        let table = self.session(sheet_id)?.table.clone();
        self.store.delete_column(&table, name).await?;
        self.load_sheet(sheet_id).await
    }

    /// Change a column's type (`decimal_separator` is `.` or `,`) and reload
    pub async fn change_column_type(
        &mut self,
        sheet_id: &str,
        column: &str,
        new_type: &str,
        decimal_separator: &str,
    ) -> Result<LoadOutcome> {
        let table = self.session(sheet_id)?.table.clone();
        self.store
            .change_column_type(ColumnTypeRequest {
                table,
                column: column.to_string(),
                new_type: new_type.to_string(),
                decimal_separator: decimal_separator.to_string(),
            })
            .await?;
        self.load_sheet(sheet_id).await
    }

    /// Insert an empty row at a grid position (or append) and reload
    pub async fn insert_row(&mut self, sheet_id: &str, position: Option<u32>) -> Result<LoadOutcome> {
        let table = self.session(sheet_id)?.table.clone();
        self.store
            .insert_row(&table, position.map(u64::from))
            .await?;
        self.load_sheet(sheet_id).await
    }

    /// Delete the row at a grid position and reload
    pub async fn delete_row(&mut self, sheet_id: &str, row: u32) -> Result<LoadOutcome> {
        let session = self.session(sheet_id)?;
        let row_id = *session
            .row_keys
            .get(row as usize)
            .ok_or_else(|| Error::Unmapped {
                sheet_id: sheet_id.to_string(),
                address: format!("row {}", u64::from(row) + 1),
            })?;
        let table = session.table.clone();
        self.store.delete_row(&table, row_id).await?;
        self.load_sheet(sheet_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use powersheet_core::Scalar;
    use powersheet_store::MemoryStore;

    fn store() -> MemoryStore {
        MemoryStore::new().with_table(
            "sales",
            &["id", "Price", "Qty"],
            vec![vec![
                Scalar::Number(1.0),
                Scalar::Number(10.0),
                Scalar::Number(3.0),
            ]],
        )
    }

    #[tokio::test]
    async fn test_open_and_set_cell() {
        let mut doc = Document::new(store());
        let outcome = doc.open_sheet("s", "Sales", "sales").await.unwrap();
        assert_eq!(
            outcome,
            LoadOutcome::Applied {
                rows: 1,
                cols: 3,
                formulas: 0,
                skipped: 0
            }
        );

        doc.set_cell("s", 0, 1, CellContent::parse("12")).await.unwrap();
        assert_eq!(doc.store().cell("sales", 1, "Price"), Some(Scalar::Number(12.0)));
    }

    #[tokio::test]
    async fn test_unmapped_row_is_error() {
        let mut doc = Document::new(store());
        doc.open_sheet("s", "Sales", "sales").await.unwrap();
        let err = doc
            .set_cell("s", 5, 1, CellContent::parse("1"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Unmapped { .. }));
    }

    #[tokio::test]
    async fn test_unmapped_write_leaves_sheet_untouched() {
        let mut doc = Document::new(store());
        doc.open_sheet("s", "Sales", "sales").await.unwrap();

        for (row, col) in [(5, 1), (0, 7)] {
            let err = doc
                .set_cell("s", row, col, CellContent::parse("=B1*2"))
                .await
                .unwrap_err();
            assert_eq!(
                err,
                Error::Unmapped {
                    sheet_id: "s".into(),
                    address: CellAddress::new(row, col).to_string(),
                }
            );
        }

        let registry = doc.registry();
        assert_eq!(registry.dimensions("s"), Some((1, 3)));
        assert!(registry.get_all_formulas("s").is_empty());
        assert_eq!(registry.get_cell_value("s", 5, 1), None);
        // Nothing diverged, so there is nothing to reconcile
        assert!(!doc.needs_reconcile("s"));
    }

    #[tokio::test]
    async fn test_stale_ticket_is_superseded() {
        let mut doc = Document::new(store());
        doc.open_sheet("s", "Sales", "sales").await.unwrap();

        let first = doc.begin_load("s").unwrap();
        let second = doc.begin_load("s").unwrap();
        let stale = doc.fetch(&first).await.unwrap();
        assert_eq!(doc.apply_snapshot(&first, stale).unwrap(), LoadOutcome::Superseded);

        let fresh = doc.fetch(&second).await.unwrap();
        assert!(matches!(
            doc.apply_snapshot(&second, fresh).unwrap(),
            LoadOutcome::Applied { .. }
        ));
    }
}
