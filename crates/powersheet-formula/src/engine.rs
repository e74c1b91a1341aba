//! Evaluation engine interface and the in-process grid engine
//!
//! An engine owns any number of isolated contexts, one per open sheet. Handles
//! are created and destroyed explicitly; nothing is shared between contexts.

use crate::ast::FormulaExpr;
use crate::dependency::DependencyGraph;
use crate::error::{FormulaError, FormulaResult};
use crate::evaluator::{evaluate, EvaluationContext};
use crate::grid::Grid;
use crate::parser::parse_formula;
use ahash::AHashMap;
use powersheet_core::{CellAddress, Scalar};
use std::fmt;
use tracing::{debug, trace, warn};

/// Opaque handle to one evaluation context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextHandle(u64);

impl ContextHandle {
    /// Raw id, for logging
    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ContextHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx#{}", self.0)
    }
}

/// A formula evaluation engine with isolated per-sheet contexts
pub trait EvaluationEngine {
    /// Allocate a new, empty context
    fn create_context(&mut self) -> ContextHandle;

    /// Release a context; returns `false` if it did not exist
    fn destroy_context(&mut self, ctx: ContextHandle) -> bool;

    /// Replace the whole content of a context with a rectangular grid of literals
    ///
    /// Any formulas previously submitted to the context are dropped.
    fn load_content(&mut self, ctx: ContextHandle, rows: Vec<Vec<Scalar>>) -> FormulaResult<()>;

    /// Write a literal, replacing any formula in that cell
    fn set_value(&mut self, ctx: ContextHandle, row: u32, col: u32, value: Scalar)
        -> FormulaResult<()>;

    /// Store a formula in a cell and return its computed value
    ///
    /// `Err` means the formula could not be evaluated at all (parse error, unknown
    /// function, wrong argument count). The formula is still stored and the cell
    /// holds the matching error value. The one exception is
    /// [`FormulaError::TooLarge`], returned before the context is touched.
    fn submit_formula(
        &mut self,
        ctx: ContextHandle,
        row: u32,
        col: u32,
        formula: &str,
    ) -> FormulaResult<Scalar>;

    /// Current value of a cell; `None` for an unknown context or a cell outside the extent
    fn read_value(&self, ctx: ContextHandle, row: u32, col: u32) -> Option<Scalar>;

    /// Formula text stored in a cell, as submitted
    fn read_formula(&self, ctx: ContextHandle, row: u32, col: u32) -> Option<String>;

    /// `(rows, cols)` of a context
    fn dimensions(&self, ctx: ContextHandle) -> Option<(usize, usize)>;
}

/// A stored formula and its compiled form
#[derive(Debug, Clone)]
struct FormulaCell {
    text: String,
    compiled: FormulaResult<FormulaExpr>,
}

#[derive(Debug, Default)]
struct SheetContext {
    grid: Grid,
    formulas: AHashMap<CellAddress, FormulaCell>,
    graph: DependencyGraph,
}

impl SheetContext {
    /// Evaluate one stored formula against the current grid
    fn evaluate_cell(&self, addr: CellAddress) -> FormulaResult<Scalar> {
        let Some(cell) = self.formulas.get(&addr) else {
            return Ok(self.grid.value(addr));
        };
        let ast = cell.compiled.as_ref().map_err(|e| e.clone())?;
        if self.graph.has_circular_reference(addr) {
            return Err(FormulaError::CircularReference);
        }
        let ctx = EvaluationContext::new(&self.grid, addr.row, addr.col);
        evaluate(ast, &ctx).map(Scalar::from)
    }

    fn store_result(&mut self, addr: CellAddress, result: &FormulaResult<Scalar>) {
        let value = match result {
            Ok(value) => value.clone(),
            Err(e) => Scalar::Error(e.cell_error()),
        };
        // Stored formulas always sit inside the grid
        if let Err(e) = self.grid.set(addr, value) {
            warn!(%addr, error = %e, "dropped result outside the grid");
        }
    }

    /// Recalculate everything downstream of `changed`, or every formula after growth
    fn recalculate(&mut self, changed: CellAddress, grew: bool) {
        let order = if grew {
            self.graph.full_recalc_order()
        } else {
            self.graph.get_recalc_order(&[changed])
        };
        trace!(count = order.len(), "recalculating dependents");
        for addr in order {
            if addr == changed {
                continue;
            }
            let result = self.evaluate_cell(addr);
            self.store_result(addr, &result);
        }
    }
}

/// The built-in engine: one [`Grid`] plus dependency graph per context
#[derive(Debug, Default)]
pub struct GridEngine {
    contexts: AHashMap<ContextHandle, SheetContext>,
    next_id: u64,
}

impl GridEngine {
    /// Create an engine with no contexts
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live contexts
    pub fn context_count(&self) -> usize {
        self.contexts.len()
    }

    fn context_mut(&mut self, ctx: ContextHandle) -> FormulaResult<&mut SheetContext> {
        self.contexts
            .get_mut(&ctx)
            .ok_or(FormulaError::UnknownContext(ctx.0))
    }
}

impl EvaluationEngine for GridEngine {
    fn create_context(&mut self) -> ContextHandle {
        self.next_id += 1;
        let handle = ContextHandle(self.next_id);
        self.contexts.insert(handle, SheetContext::default());
        debug!(%handle, "created evaluation context");
        handle
    }

    fn destroy_context(&mut self, ctx: ContextHandle) -> bool {
        let existed = self.contexts.remove(&ctx).is_some();
        debug!(handle = %ctx, existed, "destroyed evaluation context");
        existed
    }

    fn load_content(&mut self, ctx: ContextHandle, rows: Vec<Vec<Scalar>>) -> FormulaResult<()> {
        let grid = Grid::from_rows(rows)?;
        let sheet = self.context_mut(ctx)?;
        let (r, c) = grid.dimensions();
        sheet.grid = grid;
        sheet.formulas.clear();
        sheet.graph.clear();
        debug!(handle = %ctx, rows = r, cols = c, "loaded content");
        Ok(())
    }

    fn set_value(
        &mut self,
        ctx: ContextHandle,
        row: u32,
        col: u32,
        value: Scalar,
    ) -> FormulaResult<()> {
        let sheet = self.context_mut(ctx)?;
        let addr = CellAddress::new(row, col);
        let grew = sheet.grid.set(addr, value)?;
        sheet.formulas.remove(&addr);
        sheet.graph.clear_precedents(addr);
        sheet.recalculate(addr, grew);
        Ok(())
    }

    fn submit_formula(
        &mut self,
        ctx: ContextHandle,
        row: u32,
        col: u32,
        formula: &str,
    ) -> FormulaResult<Scalar> {
        let sheet = self.context_mut(ctx)?;
        let addr = CellAddress::new(row, col);
        // Make sure the cell exists before evaluating so ranges see the final extent
        let grew = sheet.grid.set(addr, Scalar::Empty)?;
        let compiled = parse_formula(formula);

        match &compiled {
            Ok(ast) => sheet.graph.set_precedents(addr, &ast.references()),
            Err(_) => sheet.graph.set_precedents(addr, &[]),
        }
        sheet.formulas.insert(
            addr,
            FormulaCell {
                text: formula.to_string(),
                compiled,
            },
        );

        let result = sheet.evaluate_cell(addr);
        sheet.store_result(addr, &result);
        sheet.recalculate(addr, grew);

        // A cycle shows as #CALC! like any other computed error
        match result {
            Err(FormulaError::CircularReference) => Ok(Scalar::Error(
                FormulaError::CircularReference.cell_error(),
            )),
            other => other,
        }
    }

    fn read_value(&self, ctx: ContextHandle, row: u32, col: u32) -> Option<Scalar> {
        self.contexts
            .get(&ctx)?
            .grid
            .get(CellAddress::new(row, col))
            .cloned()
    }

    fn read_formula(&self, ctx: ContextHandle, row: u32, col: u32) -> Option<String> {
        self.contexts
            .get(&ctx)?
            .formulas
            .get(&CellAddress::new(row, col))
            .map(|cell| cell.text.clone())
    }

    fn dimensions(&self, ctx: ContextHandle) -> Option<(usize, usize)> {
        self.contexts.get(&ctx).map(|sheet| sheet.grid.dimensions())
    }
}
