//! Text functions

use super::{finish, scalar_arg};
use crate::error::FormulaResult;
use crate::evaluator::{EvaluationContext, FormulaValue};

/// LEN function (characters, not bytes)
pub fn fn_len(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    finish(scalar_arg(&args[0]).map(|v| FormulaValue::Number(v.as_string().chars().count() as f64)))
}

/// UPPER function
pub fn fn_upper(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    finish(scalar_arg(&args[0]).map(|v| FormulaValue::String(v.as_string().to_uppercase())))
}

/// LOWER function
pub fn fn_lower(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    finish(scalar_arg(&args[0]).map(|v| FormulaValue::String(v.as_string().to_lowercase())))
}

/// CONCATENATE / CONCAT function; ranges are joined cell by cell
pub fn fn_concatenate(
    args: &[FormulaValue],
    _ctx: &EvaluationContext,
) -> FormulaResult<FormulaValue> {
    let mut out = String::new();
    for value in args.iter().flat_map(|v| v.flatten()) {
        if let FormulaValue::Error(e) = value {
            return Ok(FormulaValue::Error(*e));
        }
        out.push_str(&value.as_string());
    }
    Ok(FormulaValue::String(out))
}
