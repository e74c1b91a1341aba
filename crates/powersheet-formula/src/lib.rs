//! # powersheet-formula
//!
//! Formula handling for powersheet.
//!
//! This crate provides:
//! - Formula parsing (text → AST) and evaluation (AST → value)
//! - A small built-in function library
//! - [`GridEngine`], an [`EvaluationEngine`] with one isolated context per sheet
//! - The column name resolver that maps backing-table column names to spreadsheet
//!   letters and back
//!
//! ## Example
//!
//! ```rust
//! use powersheet_core::Scalar;
//! use powersheet_formula::{resolve_for_storage, EvaluationEngine, GridEngine};
//!
//! let columns = ["Price", "Qty"];
//! let resolved = resolve_for_storage("=Price*Qty", &columns, 0);
//! assert_eq!(resolved.formula, "=A1*B1");
//!
//! let mut engine = GridEngine::new();
//! let ctx = engine.create_context();
//! engine
//!     .load_content(ctx, vec![vec![Scalar::Number(10.0), Scalar::Number(3.0)]])
//!     .unwrap();
//! let value = engine.submit_formula(ctx, 0, 2, &resolved.formula).unwrap();
//! assert_eq!(value, Scalar::Number(30.0));
//! ```

pub mod ast;
pub mod dependency;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod functions;
pub mod grid;
pub mod parser;
pub mod resolver;

pub use ast::{
    BinaryOperator, CellReference, FormulaExpr, RangeReference, Reference, UnaryOperator,
};
pub use dependency::DependencyGraph;
pub use engine::{ContextHandle, EvaluationEngine, GridEngine};
pub use error::{FormulaError, FormulaResult};
pub use evaluator::{evaluate, EvaluationContext, FormulaValue};
pub use functions::FunctionRegistry;
pub use grid::Grid;
pub use parser::{parse_formula, MAX_EXPRESSION_DEPTH, MAX_FORMULA_LEN, MAX_NESTING};
pub use resolver::{
    resolve_for_display, resolve_for_storage, Resolution, UnknownColumnReference,
};
