//! Drag-fill
//!
//! The source's raw formula is copied verbatim: references are not shifted
//! relative to the target cell.

use crate::error::Result;
use crate::registry::{FormulaRegistry, SetOutcome};
use powersheet_core::{CellAddress, CellContent, CellRange, Scalar};
use powersheet_formula::EvaluationEngine;
use tracing::debug;

/// Copy one cell over a rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FillOperation {
    pub source: CellAddress,
    pub target: CellRange,
}

impl FillOperation {
    pub fn new(source: CellAddress, target: CellRange) -> Self {
        Self { source, target }
    }

    /// Cells that will be written, row-major, source excluded
    pub fn targets(&self) -> impl Iterator<Item = CellAddress> + '_ {
        self.target.cells().filter(move |cell| *cell != self.source)
    }
}

/// Content to replicate from the source cell
pub fn source_content<E: EvaluationEngine>(
    registry: &FormulaRegistry<E>,
    sheet_id: &str,
    source: CellAddress,
) -> CellContent {
    match registry.get_formula(sheet_id, source.row, source.col) {
        Some(formula) => CellContent::Formula(formula),
        None => CellContent::Literal(
            registry
                .get_cell_value(sheet_id, source.row, source.col)
                .unwrap_or(Scalar::Empty),
        ),
    }
}

/// Write the source's content into every target cell
///
/// Stops at the first registry error; cells written before it stay written.
pub fn fill<E: EvaluationEngine, S: AsRef<str>>(
    registry: &mut FormulaRegistry<E>,
    sheet_id: &str,
    operation: FillOperation,
    backing_column_names: &[S],
) -> Result<Vec<SetOutcome>> {
    let content = source_content(registry, sheet_id, operation.source);
    let mut outcomes = Vec::new();
    for cell in operation.targets() {
        outcomes.push(registry.set_cell_value(
            sheet_id,
            cell.row,
            cell.col,
            content.clone(),
            backing_column_names,
        )?);
    }
    debug!(
        sheet_id,
        source = %operation.source,
        target = %operation.target,
        cells = outcomes.len(),
        "filled range"
    );
    Ok(outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn registry() -> FormulaRegistry {
        let mut registry = FormulaRegistry::new();
        registry.open_sheet("s", "S", vec!["Price".into(), "Qty".into(), "Total".into()]);
        registry
            .initialize_sheet(
                "s",
                vec![
                    vec![Scalar::Number(10.0), Scalar::Number(3.0), Scalar::Empty],
                    vec![Scalar::Number(4.0), Scalar::Number(5.0), Scalar::Empty],
                    vec![Scalar::Number(2.0), Scalar::Number(2.0), Scalar::Empty],
                ],
            )
            .unwrap();
        registry
    }

    fn at(a1: &str) -> CellAddress {
        CellAddress::parse(a1).unwrap()
    }

    #[test]
    fn test_fill_copies_formula_verbatim() {
        let mut registry = registry();
        let columns = registry.backing_columns("s").unwrap().to_vec();
        registry
            .set_cell("s", 0, 2, CellContent::parse("=A1*B1"))
            .unwrap();

        let op = FillOperation::new(at("C1"), CellRange::parse("C1:C3").unwrap());
        let outcomes = fill(&mut registry, "s", op, &columns).unwrap();

        assert_eq!(outcomes.len(), 2);
        // No relative adjustment: every cell still reads row 1
        for row in 1..3 {
            assert_eq!(registry.get_formula("s", row, 2).as_deref(), Some("=A1*B1"));
            assert_eq!(registry.get_cell_value("s", row, 2), Some(Scalar::Number(30.0)));
        }
    }

    #[test]
    fn test_fill_column_names_resolve_per_row() {
        let mut registry = registry();
        let columns = registry.backing_columns("s").unwrap().to_vec();
        registry
            .set_cell("s", 0, 2, CellContent::parse("=Price*Qty"))
            .unwrap();

        // Dragged upwards: target given bottom-up
        let op = FillOperation::new(at("C1"), CellRange::parse("C3:C1").unwrap());
        let outcomes = fill(&mut registry, "s", op, &columns).unwrap();

        let values: Vec<Scalar> = outcomes.into_iter().map(|o| o.value).collect();
        assert_eq!(values, vec![Scalar::Number(20.0), Scalar::Number(4.0)]);
    }

    #[test]
    fn test_fill_literal_over_rectangle() {
        let mut registry = registry();
        let op = FillOperation::new(at("A1"), CellRange::parse("A1:B2").unwrap());
        let targets: Vec<CellAddress> = op.targets().collect();
        assert_eq!(targets, vec![at("B1"), at("A2"), at("B2")]);

        fill(&mut registry, "s", op, &[] as &[&str]).unwrap();
        assert_eq!(registry.get_cell_value("s", 1, 1), Some(Scalar::Number(10.0)));
        assert!(registry.get_all_formulas("s").is_empty());
    }
}
