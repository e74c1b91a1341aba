//! Math and aggregate functions

use super::{collect_numbers, finish, scalar_arg};
use crate::error::FormulaResult;
use crate::evaluator::{EvaluationContext, FormulaValue};
use powersheet_core::CellError;

/// SUM function
pub fn fn_sum(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    finish(collect_numbers(args).map(|nums| FormulaValue::Number(nums.iter().sum())))
}

/// AVERAGE function
pub fn fn_average(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    finish(collect_numbers(args).and_then(|nums| {
        if nums.is_empty() {
            return Err(CellError::Div0);
        }
        Ok(FormulaValue::Number(nums.iter().sum::<f64>() / nums.len() as f64))
    }))
}

/// MIN function (0 when nothing numeric is given)
pub fn fn_min(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    finish(collect_numbers(args).map(|nums| {
        FormulaValue::Number(nums.into_iter().reduce(f64::min).unwrap_or(0.0))
    }))
}

/// MAX function (0 when nothing numeric is given)
pub fn fn_max(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    finish(collect_numbers(args).map(|nums| {
        FormulaValue::Number(nums.into_iter().reduce(f64::max).unwrap_or(0.0))
    }))
}

/// COUNT function: numeric values only, errors are skipped
pub fn fn_count(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let count = args
        .iter()
        .flat_map(|v| v.flatten())
        .filter(|v| matches!(v, FormulaValue::Number(_)))
        .count();
    Ok(FormulaValue::Number(count as f64))
}

/// COUNTA function: every non-empty value
pub fn fn_counta(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let count = args
        .iter()
        .flat_map(|v| v.flatten())
        .filter(|v| !matches!(v, FormulaValue::Empty))
        .count();
    Ok(FormulaValue::Number(count as f64))
}

/// ABS function
pub fn fn_abs(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    finish(number_arg(&args[0]).map(|n| FormulaValue::Number(n.abs())))
}

/// ROUND function, half away from zero
pub fn fn_round(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    finish(round(args))
}

fn round(args: &[FormulaValue]) -> Result<FormulaValue, CellError> {
    let n = number_arg(&args[0])?;
    let digits = match args.get(1) {
        Some(d) => number_arg(d)?.trunc() as i32,
        None => 0,
    };
    let rounded = if digits >= 0 {
        let factor = 10f64.powi(digits);
        (n * factor).round() / factor
    } else {
        let factor = 10f64.powi(-digits);
        (n / factor).round() * factor
    };
    if rounded.is_finite() {
        Ok(FormulaValue::Number(rounded))
    } else {
        Err(CellError::Num)
    }
}

fn number_arg(value: &FormulaValue) -> Result<f64, CellError> {
    scalar_arg(value)?.as_number().ok_or(CellError::Value)
}
