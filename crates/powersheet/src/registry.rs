//! Per-sheet formula registry
//!
//! The registry owns one evaluation context per open sheet and remembers, for every
//! formula cell, what the user typed, what was handed to the engine and the last
//! computed value. Literal cells live only in the engine.

use crate::error::{RegistryError, Result};
use powersheet_core::{CellAddress, CellContent, Scalar};
use powersheet_formula::{
    resolve_for_storage, ContextHandle, EvaluationEngine, FormulaError, GridEngine,
    UnknownColumnReference,
};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Lifecycle of a sheet inside the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetState {
    /// Context allocated, no content loaded yet
    Uninitialized,
    /// Content loaded; cells can be read and written
    Ready,
}

/// A formula cell
#[derive(Debug, Clone, PartialEq)]
pub struct FormulaEntry {
    pub sheet_id: String,
    pub row: u32,
    pub col: u32,
    /// Text as typed, letters or column names
    pub raw_formula: String,
    /// Text submitted to the engine
    pub resolved_formula: String,
    /// Last computed value; errors are `Scalar::Error`
    pub cached_value: Scalar,
}

impl FormulaEntry {
    pub fn address(&self) -> CellAddress {
        CellAddress::new(self.row, self.col)
    }
}

/// What the backing store should receive for one written cell
#[derive(Debug, Clone, PartialEq)]
pub struct CellWrite {
    pub row: u32,
    pub col: u32,
    /// Literal, or computed value of a formula
    pub value: Scalar,
    /// Raw formula text when the cell holds a formula
    pub formula: Option<String>,
}

/// Result of [`FormulaRegistry::set_cell_value`]
#[derive(Debug, Clone, PartialEq)]
pub struct SetOutcome {
    pub address: CellAddress,
    /// Value the cell shows now
    pub value: Scalar,
    /// The stored entry when the content was a formula
    pub entry: Option<FormulaEntry>,
    /// Why the formula could not be evaluated; its value is the matching error
    pub evaluation_failure: Option<FormulaError>,
    /// Identifiers the resolver could not map to a column
    pub unknown_columns: Vec<UnknownColumnReference>,
}

impl SetOutcome {
    /// The persistence write for this change
    pub fn write(&self) -> CellWrite {
        CellWrite {
            row: self.address.row,
            col: self.address.col,
            value: self.value.clone(),
            formula: self.entry.as_ref().map(|e| e.raw_formula.clone()),
        }
    }

    pub fn is_formula(&self) -> bool {
        self.entry.is_some()
    }
}

/// One open sheet
#[derive(Debug, Clone)]
pub struct Sheet {
    sheet_id: String,
    display_name: String,
    context: ContextHandle,
    backing_column_names: Vec<String>,
    state: SheetState,
    formulas: BTreeMap<CellAddress, FormulaEntry>,
}

impl Sheet {
    pub fn id(&self) -> &str {
        &self.sheet_id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Engine context backing this sheet
    pub fn context(&self) -> ContextHandle {
        self.context
    }

    /// Column names, index-aligned with the column letters
    pub fn backing_columns(&self) -> &[String] {
        &self.backing_column_names
    }

    pub fn state(&self) -> SheetState {
        self.state
    }

    /// Formula entries in row-major order
    pub fn formulas(&self) -> impl Iterator<Item = &FormulaEntry> {
        self.formulas.values()
    }
}

/// Registry of open sheets and their formulas
///
/// ```rust
/// use powersheet::{CellContent, FormulaRegistry, Scalar};
///
/// let mut registry = FormulaRegistry::new();
/// registry.open_sheet("sales", "Sales", vec!["Price".into(), "Qty".into()]);
/// registry
///     .initialize_sheet("sales", vec![vec![Scalar::Number(10.0), Scalar::Number(3.0)]])
///     .unwrap();
///
/// let outcome = registry
///     .set_cell("sales", 0, 2, CellContent::parse("=Price*Qty"))
///     .unwrap();
/// assert_eq!(outcome.value, Scalar::Number(30.0));
/// ```
#[derive(Debug)]
pub struct FormulaRegistry<E: EvaluationEngine = GridEngine> {
    engine: E,
    sheets: BTreeMap<String, Sheet>,
}

impl FormulaRegistry<GridEngine> {
    /// Registry backed by the built-in engine
    pub fn new() -> Self {
        Self::with_engine(GridEngine::new())
    }
}

impl Default for FormulaRegistry<GridEngine> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: EvaluationEngine> FormulaRegistry<E> {
    pub fn with_engine(engine: E) -> Self {
        Self {
            engine,
            sheets: BTreeMap::new(),
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Register a sheet and allocate its context
    ///
    /// Opening an already open sheet only refreshes its name and columns.
    pub fn open_sheet(&mut self, sheet_id: &str, display_name: &str, backing_column_names: Vec<String>) {
        if let Some(sheet) = self.sheets.get_mut(sheet_id) {
            sheet.display_name = display_name.to_string();
            sheet.backing_column_names = backing_column_names;
            return;
        }
        let context = self.engine.create_context();
        debug!(sheet_id, %context, "opened sheet");
        self.sheets.insert(
            sheet_id.to_string(),
            Sheet {
                sheet_id: sheet_id.to_string(),
                display_name: display_name.to_string(),
                context,
                backing_column_names,
                state: SheetState::Uninitialized,
                formulas: BTreeMap::new(),
            },
        );
    }

    /// Release a sheet and its context; returns `false` if it was not open
    pub fn close_sheet(&mut self, sheet_id: &str) -> bool {
        match self.sheets.remove(sheet_id) {
            Some(sheet) => {
                self.engine.destroy_context(sheet.context);
                debug!(sheet_id, "closed sheet");
                true
            }
            None => false,
        }
    }

    /// Replace a sheet's content wholesale and mark it ready
    ///
    /// Rows are padded with [`Scalar::Empty`] to a full rectangle at least as wide
    /// as the backing columns. Previous formula entries are dropped. Opens the sheet
    /// first if needed.
    pub fn initialize_sheet(&mut self, sheet_id: &str, content: Vec<Vec<Scalar>>) -> Result<()> {
        if !self.sheets.contains_key(sheet_id) {
            self.open_sheet(sheet_id, sheet_id, Vec::new());
        }
        let sheet = self.sheet_mut(sheet_id)?;
        let width = content
            .iter()
            .map(Vec::len)
            .max()
            .unwrap_or(0)
            .max(sheet.backing_column_names.len());
        let content: Vec<Vec<Scalar>> = content
            .into_iter()
            .map(|mut row| {
                row.resize(width, Scalar::Empty);
                row
            })
            .collect();
        let rows = content.len();
        let context = sheet.context;
        sheet.formulas.clear();
        sheet.state = SheetState::Ready;

        self.engine.load_content(context, content)?;
        debug!(sheet_id, rows, cols = width, "initialized sheet");
        Ok(())
    }

    /// Write user content into a cell
    ///
    /// Formulas are resolved against `backing_column_names`, submitted and cached.
    /// Evaluation failures are reported in the outcome, never as `Err`.
    pub fn set_cell_value<S: AsRef<str>>(
        &mut self,
        sheet_id: &str,
        row: u32,
        col: u32,
        content: CellContent,
        backing_column_names: &[S],
    ) -> Result<SetOutcome> {
        let sheet = self.ready_sheet(sheet_id)?;
        let context = sheet.context;
        let address = CellAddress::new(row, col);

        let outcome = match content {
            CellContent::Literal(value) => {
                self.engine.set_value(context, row, col, value.clone())?;
                self.sheet_mut(sheet_id)?.formulas.remove(&address);
                SetOutcome {
                    address,
                    value,
                    entry: None,
                    evaluation_failure: None,
                    unknown_columns: Vec::new(),
                }
            }
            CellContent::Formula(raw) => {
                let resolution = resolve_for_storage(&raw, backing_column_names, row);
                for unknown in &resolution.unknown {
                    debug!(sheet_id, %address, name = %unknown.name, "unresolved column reference");
                }
                let (value, failure) =
                    match self.engine.submit_formula(context, row, col, &resolution.formula) {
                        Ok(value) => (value, None),
                        Err(e @ FormulaError::TooLarge { .. }) => return Err(e.into()),
                        Err(e) => {
                            warn!(sheet_id, %address, formula = %raw, error = %e, "formula evaluation failed");
                            (Scalar::Error(e.cell_error()), Some(e))
                        }
                    };
                let entry = FormulaEntry {
                    sheet_id: sheet_id.to_string(),
                    row,
                    col,
                    raw_formula: raw,
                    resolved_formula: resolution.formula,
                    cached_value: value.clone(),
                };
                self.sheet_mut(sheet_id)?
                    .formulas
                    .insert(address, entry.clone());
                SetOutcome {
                    address,
                    value,
                    entry: Some(entry),
                    evaluation_failure: failure,
                    unknown_columns: resolution.unknown,
                }
            }
        };

        self.refresh_cached_values(sheet_id)?;
        Ok(outcome)
    }

    /// [`set_cell_value`](Self::set_cell_value) against the sheet's own backing columns
    pub fn set_cell(&mut self, sheet_id: &str, row: u32, col: u32, content: CellContent) -> Result<SetOutcome> {
        let columns = self.sheet(sheet_id)?.backing_column_names.clone();
        self.set_cell_value(sheet_id, row, col, content, &columns)
    }

    /// Pull every formula's current value back from the engine
    fn refresh_cached_values(&mut self, sheet_id: &str) -> Result<()> {
        let sheet = self
            .sheets
            .get_mut(sheet_id)
            .ok_or_else(|| RegistryError::SheetNotFound(sheet_id.to_string()))?;
        for entry in sheet.formulas.values_mut() {
            if let Some(value) = self.engine.read_value(sheet.context, entry.row, entry.col) {
                entry.cached_value = value;
            }
        }
        Ok(())
    }

    /// Value shown in a cell; `None` for an unknown sheet or a cell outside the extent
    pub fn get_cell_value(&self, sheet_id: &str, row: u32, col: u32) -> Option<Scalar> {
        let sheet = self.sheets.get(sheet_id)?;
        if let Some(entry) = sheet.formulas.get(&CellAddress::new(row, col)) {
            return Some(entry.cached_value.clone());
        }
        self.engine.read_value(sheet.context, row, col)
    }

    /// Raw formula text of a cell
    pub fn get_formula(&self, sheet_id: &str, row: u32, col: u32) -> Option<String> {
        self.sheets
            .get(sheet_id)?
            .formulas
            .get(&CellAddress::new(row, col))
            .map(|e| e.raw_formula.clone())
    }

    /// Formula entry of a cell
    pub fn formula_entry(&self, sheet_id: &str, row: u32, col: u32) -> Option<&FormulaEntry> {
        self.sheets
            .get(sheet_id)?
            .formulas
            .get(&CellAddress::new(row, col))
    }

    /// Formula entries inside the sheet's current extent, row-major
    pub fn get_all_formulas(&self, sheet_id: &str) -> Vec<FormulaEntry> {
        let Some(sheet) = self.sheets.get(sheet_id) else {
            return Vec::new();
        };
        let (rows, cols) = self.engine.dimensions(sheet.context).unwrap_or((0, 0));
        sheet
            .formulas
            .values()
            .filter(|e| (e.row as usize) < rows && (e.col as usize) < cols)
            .cloned()
            .collect()
    }

    /// Content as the user would edit it: raw formula, else the literal value
    pub fn edit_text(&self, sheet_id: &str, row: u32, col: u32) -> String {
        self.get_formula(sheet_id, row, col).unwrap_or_else(|| {
            self.get_cell_value(sheet_id, row, col)
                .map(|v| v.to_string())
                .unwrap_or_default()
        })
    }

    /// Replace the backing column list after a schema change
    pub fn set_backing_columns(&mut self, sheet_id: &str, backing_column_names: Vec<String>) -> Result<()> {
        self.sheet_mut(sheet_id)?.backing_column_names = backing_column_names;
        Ok(())
    }

    pub fn rename_sheet(&mut self, sheet_id: &str, display_name: &str) -> Result<()> {
        self.sheet_mut(sheet_id)?.display_name = display_name.to_string();
        Ok(())
    }

    pub fn sheet(&self, sheet_id: &str) -> Result<&Sheet> {
        self.sheets
            .get(sheet_id)
            .ok_or_else(|| RegistryError::SheetNotFound(sheet_id.to_string()).into())
    }

    fn sheet_mut(&mut self, sheet_id: &str) -> Result<&mut Sheet> {
        self.sheets
            .get_mut(sheet_id)
            .ok_or_else(|| RegistryError::SheetNotFound(sheet_id.to_string()).into())
    }

    fn ready_sheet(&self, sheet_id: &str) -> Result<&Sheet> {
        let sheet = self.sheet(sheet_id)?;
        if sheet.state != SheetState::Ready {
            return Err(RegistryError::NotReady(sheet_id.to_string()).into());
        }
        Ok(sheet)
    }

    pub fn sheet_state(&self, sheet_id: &str) -> Option<SheetState> {
        self.sheets.get(sheet_id).map(|s| s.state)
    }

    /// `(rows, cols)` of a sheet's loaded extent
    pub fn dimensions(&self, sheet_id: &str) -> Option<(usize, usize)> {
        self.engine.dimensions(self.sheets.get(sheet_id)?.context)
    }

    pub fn backing_columns(&self, sheet_id: &str) -> Option<&[String]> {
        self.sheets
            .get(sheet_id)
            .map(|s| s.backing_column_names.as_slice())
    }

    /// Ids of open sheets, sorted
    pub fn sheet_ids(&self) -> Vec<String> {
        self.sheets.keys().cloned().collect()
    }
}
