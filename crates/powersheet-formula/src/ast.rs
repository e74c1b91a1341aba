//! Formula Abstract Syntax Tree types

use powersheet_core::{CellAddress, CellError, CellRange};

/// Formula expression AST
#[derive(Debug, Clone, PartialEq)]
pub enum FormulaExpr {
    // === Literals ===
    /// Numeric literal
    Number(f64),
    /// String literal
    String(String),
    /// Boolean literal
    Boolean(bool),
    /// Error literal
    Error(CellError),

    // === References ===
    /// Single cell reference
    CellRef(CellReference),
    /// Range reference
    RangeRef(RangeReference),
    /// Bare name that was not resolved to a column before submission
    NameRef(String),

    // === Operators ===
    /// Binary operation
    BinaryOp {
        op: BinaryOperator,
        left: Box<FormulaExpr>,
        right: Box<FormulaExpr>,
    },
    /// Unary operation
    UnaryOp {
        op: UnaryOperator,
        operand: Box<FormulaExpr>,
    },

    // === Function call ===
    Function {
        name: String,
        args: Vec<FormulaExpr>,
    },
}

impl FormulaExpr {
    /// Every cell and range this expression reads, in source order
    pub fn references(&self) -> Vec<Reference> {
        let mut refs = Vec::new();
        self.collect_references(&mut refs);
        refs
    }

    /// Height of the tree, a lone literal or reference being 1
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut stack = vec![(self, 1)];
        while let Some((expr, depth)) = stack.pop() {
            deepest = deepest.max(depth);
            match expr {
                FormulaExpr::BinaryOp { left, right, .. } => {
                    stack.push((left.as_ref(), depth + 1));
                    stack.push((right.as_ref(), depth + 1));
                }
                FormulaExpr::UnaryOp { operand, .. } => stack.push((operand.as_ref(), depth + 1)),
                FormulaExpr::Function { args, .. } => {
                    stack.extend(args.iter().map(|arg| (arg, depth + 1)));
                }
                _ => {}
            }
        }
        deepest
    }

    fn collect_references(&self, refs: &mut Vec<Reference>) {
        match self {
            FormulaExpr::CellRef(cell) => refs.push(Reference::Cell(cell.address)),
            FormulaExpr::RangeRef(range) => refs.push(Reference::Range(range.range)),
            FormulaExpr::BinaryOp { left, right, .. } => {
                left.collect_references(refs);
                right.collect_references(refs);
            }
            FormulaExpr::UnaryOp { operand, .. } => operand.collect_references(refs),
            FormulaExpr::Function { args, .. } => {
                for arg in args {
                    arg.collect_references(refs);
                }
            }
            FormulaExpr::Number(_)
            | FormulaExpr::String(_)
            | FormulaExpr::Boolean(_)
            | FormulaExpr::Error(_)
            | FormulaExpr::NameRef(_) => {}
        }
    }
}

/// A precedent read by a formula
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reference {
    Cell(CellAddress),
    Range(CellRange),
}

/// Cell reference with its absolute markers
#[derive(Debug, Clone, PartialEq)]
pub struct CellReference {
    pub address: CellAddress,
    /// `$` before the row number
    pub row_absolute: bool,
    /// `$` before the column letters
    pub col_absolute: bool,
}

/// Range reference
#[derive(Debug, Clone, PartialEq)]
pub struct RangeReference {
    pub range: CellRange,
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,
    Power,

    // Comparison
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,

    // Text
    Concat,
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Negate,
    Percent,
}
