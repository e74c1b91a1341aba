//! Logical functions

use super::finish;
use crate::error::FormulaResult;
use crate::evaluator::{EvaluationContext, FormulaValue};
use powersheet_core::CellError;

/// IF function
pub fn fn_if(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let condition = match &args[0] {
        FormulaValue::Error(e) => return Ok(FormulaValue::Error(*e)),
        other => match other.as_bool() {
            Some(b) => b,
            None => return Ok(FormulaValue::Error(CellError::Value)),
        },
    };

    if condition {
        Ok(args[1].clone())
    } else {
        Ok(args.get(2).cloned().unwrap_or(FormulaValue::Boolean(false)))
    }
}

/// Booleans from AND/OR arguments; text and empty cells in ranges are ignored
fn collect_bools(args: &[FormulaValue]) -> Result<Vec<bool>, CellError> {
    let mut bools = Vec::new();
    for arg in args {
        if let FormulaValue::Array(_) = arg {
            for cell in arg.flatten() {
                match cell {
                    FormulaValue::Error(e) => return Err(*e),
                    FormulaValue::Number(_) | FormulaValue::Boolean(_) => {
                        bools.extend(cell.as_bool())
                    }
                    _ => {}
                }
            }
            continue;
        }
        match arg {
            FormulaValue::Error(e) => return Err(*e),
            FormulaValue::Empty => {}
            other => bools.push(other.as_bool().ok_or(CellError::Value)?),
        }
    }
    if bools.is_empty() {
        return Err(CellError::Value);
    }
    Ok(bools)
}

/// AND function
pub fn fn_and(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    finish(collect_bools(args).map(|b| FormulaValue::Boolean(b.iter().all(|x| *x))))
}

/// OR function
pub fn fn_or(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    finish(collect_bools(args).map(|b| FormulaValue::Boolean(b.iter().any(|x| *x))))
}

/// NOT function
pub fn fn_not(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(match &args[0] {
        FormulaValue::Error(e) => FormulaValue::Error(*e),
        other => other
            .as_bool()
            .map(|b| FormulaValue::Boolean(!b))
            .unwrap_or(FormulaValue::Error(CellError::Value)),
    })
}

/// IFERROR function
pub fn fn_iferror(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    if args[0].get_error().is_some() {
        Ok(args[1].clone())
    } else {
        Ok(args[0].clone())
    }
}
