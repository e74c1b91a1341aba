//! Formula evaluator
//!
//! Evaluates formula ASTs against a [`Grid`] to produce values.

use crate::ast::{BinaryOperator, FormulaExpr, UnaryOperator};
use crate::error::{FormulaError, FormulaResult};
use crate::functions::FunctionRegistry;
use crate::grid::Grid;
use powersheet_core::{CellAddress, CellError, CellRange, Scalar};
use std::cmp::Ordering;
use std::sync::OnceLock;

/// Global function registry (lazily initialized)
static FUNCTION_REGISTRY: OnceLock<FunctionRegistry> = OnceLock::new();

fn function_registry() -> &'static FunctionRegistry {
    FUNCTION_REGISTRY.get_or_init(FunctionRegistry::new)
}

/// Value types during formula evaluation
#[derive(Debug, Clone, PartialEq)]
pub enum FormulaValue {
    Number(f64),
    String(String),
    Boolean(bool),
    Error(CellError),
    /// Values of a range reference, row-major
    Array(Vec<Vec<FormulaValue>>),
    Empty,
}

impl FormulaValue {
    /// Convert to number, if possible
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FormulaValue::Number(n) => Some(*n),
            FormulaValue::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            FormulaValue::String(s) => s.trim().parse().ok(),
            FormulaValue::Empty => Some(0.0),
            FormulaValue::Error(_) | FormulaValue::Array(_) => None,
        }
    }

    /// Convert to boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FormulaValue::Boolean(b) => Some(*b),
            FormulaValue::Number(n) => Some(*n != 0.0),
            FormulaValue::Empty => Some(false),
            FormulaValue::String(s) if s.eq_ignore_ascii_case("TRUE") => Some(true),
            FormulaValue::String(s) if s.eq_ignore_ascii_case("FALSE") => Some(false),
            _ => None,
        }
    }

    /// Convert to display text
    pub fn as_string(&self) -> String {
        match self {
            FormulaValue::Array(_) => CellError::Value.to_string(),
            other => Scalar::from(other.clone()).to_string(),
        }
    }

    /// Get the error if this is one
    pub fn get_error(&self) -> Option<CellError> {
        match self {
            FormulaValue::Error(e) => Some(*e),
            _ => None,
        }
    }

    /// Iterate every scalar, flattening arrays row by row
    pub fn flatten(&self) -> Box<dyn Iterator<Item = &FormulaValue> + '_> {
        match self {
            FormulaValue::Array(rows) => Box::new(rows.iter().flatten().flat_map(|v| v.flatten())),
            other => Box::new(std::iter::once(other)),
        }
    }
}

impl From<Scalar> for FormulaValue {
    fn from(value: Scalar) -> Self {
        match value {
            Scalar::Empty => FormulaValue::Empty,
            Scalar::Number(n) => FormulaValue::Number(n),
            Scalar::Text(s) => FormulaValue::String(s),
            Scalar::Boolean(b) => FormulaValue::Boolean(b),
            Scalar::Error(e) => FormulaValue::Error(e),
        }
    }
}

impl From<FormulaValue> for Scalar {
    fn from(value: FormulaValue) -> Self {
        match value {
            FormulaValue::Empty => Scalar::Empty,
            FormulaValue::Number(n) if n.is_finite() => Scalar::Number(n),
            FormulaValue::Number(_) => Scalar::Error(CellError::Num),
            FormulaValue::String(s) => Scalar::Text(s),
            FormulaValue::Boolean(b) => Scalar::Boolean(b),
            FormulaValue::Error(e) => Scalar::Error(e),
            // A range cannot be shown in one cell
            FormulaValue::Array(_) => Scalar::Error(CellError::Value),
        }
    }
}

/// Context for formula evaluation
#[derive(Debug, Clone, Copy)]
pub struct EvaluationContext<'a> {
    /// Grid for cell lookups
    pub grid: Option<&'a Grid>,
    /// Row of the cell being evaluated
    pub current_row: u32,
    /// Column of the cell being evaluated
    pub current_col: u32,
}

impl<'a> EvaluationContext<'a> {
    /// Create a new evaluation context
    pub fn new(grid: &'a Grid, row: u32, col: u32) -> Self {
        Self {
            grid: Some(grid),
            current_row: row,
            current_col: col,
        }
    }

    /// Create a simple context without a grid (for testing)
    pub fn simple() -> Self {
        Self {
            grid: None,
            current_row: 0,
            current_col: 0,
        }
    }

    /// Get a cell value; cells outside the grid are empty
    pub fn cell_value(&self, addr: CellAddress) -> FormulaValue {
        match self.grid {
            Some(grid) => grid.value(addr).into(),
            None => FormulaValue::Empty,
        }
    }

    /// Get a range of values as an array, clamped to the grid extent
    pub fn range_values(&self, range: CellRange) -> FormulaValue {
        let Some(grid) = self.grid else {
            return FormulaValue::Array(vec![]);
        };
        let (rows, cols) = grid.dimensions();
        let b = range.bounds();
        if rows == 0 || cols == 0 || b.min_row as usize >= rows || b.min_col as usize >= cols {
            return FormulaValue::Array(vec![]);
        }
        let max_row = (b.max_row as usize).min(rows - 1) as u32;
        let max_col = (b.max_col as usize).min(cols - 1) as u32;

        let values = (b.min_row..=max_row)
            .map(|row| {
                (b.min_col..=max_col)
                    .map(|col| grid.value(CellAddress::new(row, col)).into())
                    .collect()
            })
            .collect();
        FormulaValue::Array(values)
    }
}

/// Evaluate a formula expression
///
/// `Err` means the formula itself is unusable (unknown function, wrong argument
/// count); problems with the data it reads come back as error values.
pub fn evaluate(expr: &FormulaExpr, ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    match expr {
        FormulaExpr::Number(n) => Ok(FormulaValue::Number(*n)),
        FormulaExpr::String(s) => Ok(FormulaValue::String(s.clone())),
        FormulaExpr::Boolean(b) => Ok(FormulaValue::Boolean(*b)),
        FormulaExpr::Error(e) => Ok(FormulaValue::Error(*e)),

        FormulaExpr::CellRef(cell_ref) => Ok(ctx.cell_value(cell_ref.address)),
        FormulaExpr::RangeRef(range_ref) => Ok(ctx.range_values(range_ref.range)),
        // Names should have been resolved to letters before submission
        FormulaExpr::NameRef(_) => Ok(FormulaValue::Error(CellError::Name)),

        FormulaExpr::BinaryOp { op, left, right } => evaluate_binary_op(*op, left, right, ctx),
        FormulaExpr::UnaryOp { op, operand } => evaluate_unary_op(*op, operand, ctx),
        FormulaExpr::Function { name, args } => evaluate_function(name, args, ctx),
    }
}

fn operand_number(value: &FormulaValue) -> Result<f64, CellError> {
    if let Some(e) = value.get_error() {
        return Err(e);
    }
    value.as_number().ok_or(CellError::Value)
}

/// Evaluate a binary operation
fn evaluate_binary_op(
    op: BinaryOperator,
    left: &FormulaExpr,
    right: &FormulaExpr,
    ctx: &EvaluationContext,
) -> FormulaResult<FormulaValue> {
    let left_val = evaluate(left, ctx)?;
    let right_val = evaluate(right, ctx)?;

    if let Some(e) = left_val.get_error().or_else(|| right_val.get_error()) {
        return Ok(FormulaValue::Error(e));
    }

    let arithmetic = |f: fn(f64, f64) -> FormulaValue| -> FormulaValue {
        match (operand_number(&left_val), operand_number(&right_val)) {
            (Ok(l), Ok(r)) => f(l, r),
            (Err(e), _) | (_, Err(e)) => FormulaValue::Error(e),
        }
    };

    let value = match op {
        BinaryOperator::Add => arithmetic(|l, r| FormulaValue::Number(l + r)),
        BinaryOperator::Subtract => arithmetic(|l, r| FormulaValue::Number(l - r)),
        BinaryOperator::Multiply => arithmetic(|l, r| FormulaValue::Number(l * r)),
        BinaryOperator::Divide => arithmetic(|l, r| {
            if r == 0.0 {
                FormulaValue::Error(CellError::Div0)
            } else {
                FormulaValue::Number(l / r)
            }
        }),
        BinaryOperator::Power => arithmetic(|l, r| {
            let result = l.powf(r);
            if result.is_finite() {
                FormulaValue::Number(result)
            } else {
                FormulaValue::Error(CellError::Num)
            }
        }),

        BinaryOperator::Equal => compare(&left_val, &right_val, Ordering::is_eq),
        BinaryOperator::NotEqual => compare(&left_val, &right_val, Ordering::is_ne),
        BinaryOperator::LessThan => compare(&left_val, &right_val, Ordering::is_lt),
        BinaryOperator::LessEqual => compare(&left_val, &right_val, Ordering::is_le),
        BinaryOperator::GreaterThan => compare(&left_val, &right_val, Ordering::is_gt),
        BinaryOperator::GreaterEqual => compare(&left_val, &right_val, Ordering::is_ge),

        BinaryOperator::Concat => match (&left_val, &right_val) {
            (FormulaValue::Array(_), _) | (_, FormulaValue::Array(_)) => {
                FormulaValue::Error(CellError::Value)
            }
            _ => FormulaValue::String(left_val.as_string() + &right_val.as_string()),
        },
    };
    Ok(value)
}

fn compare(left: &FormulaValue, right: &FormulaValue, test: fn(Ordering) -> bool) -> FormulaValue {
    match compare_values(left, right) {
        Some(ordering) => FormulaValue::Boolean(test(ordering)),
        None => FormulaValue::Error(CellError::Value),
    }
}

/// Spreadsheet ordering: numbers < text < booleans, text case-insensitive
fn compare_values(left: &FormulaValue, right: &FormulaValue) -> Option<Ordering> {
    fn rank(v: &FormulaValue) -> u8 {
        match v {
            FormulaValue::Number(_) => 0,
            FormulaValue::String(_) => 1,
            _ => 2,
        }
    }

    // Empty compares as zero against numbers and as "" against text
    let zero = FormulaValue::Number(0.0);
    let blank = FormulaValue::String(String::new());
    let left = match (left, right) {
        (FormulaValue::Empty, FormulaValue::String(_)) => &blank,
        (FormulaValue::Empty, _) => &zero,
        _ => left,
    };
    let right = match (right, left) {
        (FormulaValue::Empty, FormulaValue::String(_)) => &blank,
        (FormulaValue::Empty, _) => &zero,
        _ => right,
    };

    match (left, right) {
        (FormulaValue::Number(l), FormulaValue::Number(r)) => l.partial_cmp(r),
        (FormulaValue::String(l), FormulaValue::String(r)) => {
            Some(l.to_lowercase().cmp(&r.to_lowercase()))
        }
        (FormulaValue::Boolean(l), FormulaValue::Boolean(r)) => Some(l.cmp(r)),
        (FormulaValue::Array(_), _) | (_, FormulaValue::Array(_)) => None,
        (l, r) => Some(rank(l).cmp(&rank(r))),
    }
}

/// Evaluate a unary operation
fn evaluate_unary_op(
    op: UnaryOperator,
    operand: &FormulaExpr,
    ctx: &EvaluationContext,
) -> FormulaResult<FormulaValue> {
    let val = evaluate(operand, ctx)?;
    let n = match operand_number(&val) {
        Ok(n) => n,
        Err(e) => return Ok(FormulaValue::Error(e)),
    };

    Ok(match op {
        UnaryOperator::Negate => FormulaValue::Number(-n),
        UnaryOperator::Percent => FormulaValue::Number(n / 100.0),
    })
}

/// Evaluate a function call
fn evaluate_function(
    name: &str,
    args: &[FormulaExpr],
    ctx: &EvaluationContext,
) -> FormulaResult<FormulaValue> {
    let func = function_registry()
        .get(name)
        .ok_or_else(|| FormulaError::UnknownFunction(name.to_string()))?;

    if args.len() < func.min_args {
        return Err(FormulaError::ArgumentCount {
            function: name.to_string(),
            expected: format!("at least {}", func.min_args),
            actual: args.len(),
        });
    }
    if let Some(max) = func.max_args {
        if args.len() > max {
            return Err(FormulaError::ArgumentCount {
                function: name.to_string(),
                expected: format!("at most {}", max),
                actual: args.len(),
            });
        }
    }

    let evaluated_args = args
        .iter()
        .map(|arg| evaluate(arg, ctx))
        .collect::<FormulaResult<Vec<_>>>()?;

    (func.implementation)(&evaluated_args, ctx)
}
