//! Built-in functions

pub mod logical;
pub mod math;
pub mod text;

use crate::error::FormulaResult;
use crate::evaluator::{EvaluationContext, FormulaValue};
use ahash::AHashMap;
use powersheet_core::CellError;

/// Function implementation signature
pub type FunctionImpl = fn(&[FormulaValue], &EvaluationContext) -> FormulaResult<FormulaValue>;

/// Function definition
#[derive(Clone, Copy)]
pub struct FunctionDef {
    /// Function name (uppercase)
    pub name: &'static str,
    /// Minimum arguments
    pub min_args: usize,
    /// Maximum arguments (None = unlimited)
    pub max_args: Option<usize>,
    /// Implementation
    pub implementation: FunctionImpl,
}

impl FunctionDef {
    const fn new(
        name: &'static str,
        min_args: usize,
        max_args: Option<usize>,
        implementation: FunctionImpl,
    ) -> Self {
        Self {
            name,
            min_args,
            max_args,
            implementation,
        }
    }
}

const BUILTINS: &[FunctionDef] = &[
    // math
    FunctionDef::new("SUM", 1, None, math::fn_sum),
    FunctionDef::new("AVERAGE", 1, None, math::fn_average),
    FunctionDef::new("MIN", 1, None, math::fn_min),
    FunctionDef::new("MAX", 1, None, math::fn_max),
    FunctionDef::new("COUNT", 1, None, math::fn_count),
    FunctionDef::new("COUNTA", 1, None, math::fn_counta),
    FunctionDef::new("ABS", 1, Some(1), math::fn_abs),
    FunctionDef::new("ROUND", 1, Some(2), math::fn_round),
    // logical
    FunctionDef::new("IF", 2, Some(3), logical::fn_if),
    FunctionDef::new("AND", 1, None, logical::fn_and),
    FunctionDef::new("OR", 1, None, logical::fn_or),
    FunctionDef::new("NOT", 1, Some(1), logical::fn_not),
    FunctionDef::new("IFERROR", 2, Some(2), logical::fn_iferror),
    // text
    FunctionDef::new("LEN", 1, Some(1), text::fn_len),
    FunctionDef::new("UPPER", 1, Some(1), text::fn_upper),
    FunctionDef::new("LOWER", 1, Some(1), text::fn_lower),
    FunctionDef::new("CONCATENATE", 1, None, text::fn_concatenate),
    FunctionDef::new("CONCAT", 1, None, text::fn_concatenate),
];

/// Function registry
pub struct FunctionRegistry {
    functions: AHashMap<String, FunctionDef>,
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FunctionRegistry {
    /// Create a new registry with all built-in functions
    pub fn new() -> Self {
        let mut registry = Self {
            functions: AHashMap::with_capacity(BUILTINS.len()),
        };
        for def in BUILTINS {
            registry.register(*def);
        }
        registry
    }

    /// Look up a function by name (case-insensitive)
    pub fn get(&self, name: &str) -> Option<&FunctionDef> {
        self.functions.get(&name.to_uppercase())
    }

    /// Register a function, replacing any previous definition
    pub fn register(&mut self, def: FunctionDef) {
        self.functions.insert(def.name.to_uppercase(), def);
    }

    /// Names of every registered function
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }
}

/// Numbers from function arguments, spreadsheet style
///
/// Direct arguments are coerced (TRUE counts as 1, numeric text parses); cells
/// inside a range only contribute when they hold a number. The first error wins.
pub(crate) fn collect_numbers(args: &[FormulaValue]) -> Result<Vec<f64>, CellError> {
    let mut numbers = Vec::new();
    for arg in args {
        match arg {
            FormulaValue::Error(e) => return Err(*e),
            FormulaValue::Array(_) => {
                for cell in arg.flatten() {
                    match cell {
                        FormulaValue::Number(n) => numbers.push(*n),
                        FormulaValue::Error(e) => return Err(*e),
                        _ => {}
                    }
                }
            }
            FormulaValue::Empty => {}
            other => numbers.push(other.as_number().ok_or(CellError::Value)?),
        }
    }
    Ok(numbers)
}

/// The single scalar argument, arrays rejected
pub(crate) fn scalar_arg(value: &FormulaValue) -> Result<&FormulaValue, CellError> {
    match value {
        FormulaValue::Error(e) => Err(*e),
        FormulaValue::Array(_) => Err(CellError::Value),
        other => Ok(other),
    }
}

/// Lift a per-function result into the evaluator's value type
pub(crate) fn finish(result: Result<FormulaValue, CellError>) -> FormulaResult<FormulaValue> {
    Ok(result.unwrap_or_else(FormulaValue::Error))
}
