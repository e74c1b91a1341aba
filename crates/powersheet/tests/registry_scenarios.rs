//! Registry, resolver and editor working together

use powersheet::prelude::*;
use powersheet::EditorState;
use pretty_assertions::assert_eq;

fn open(registry: &mut FormulaRegistry, sheet_id: &str, columns: &[&str], rows: Vec<Vec<Scalar>>) {
    registry.open_sheet(
        sheet_id,
        sheet_id,
        columns.iter().map(|c| c.to_string()).collect(),
    );
    registry.initialize_sheet(sheet_id, rows).unwrap();
}

fn nums(values: &[f64]) -> Vec<Scalar> {
    values.iter().map(|v| Scalar::Number(*v)).collect()
}

fn permutations(items: &[&'static str]) -> Vec<Vec<&'static str>> {
    if items.len() <= 1 {
        return vec![items.to_vec()];
    }
    let mut result = Vec::new();
    for i in 0..items.len() {
        let mut rest = items.to_vec();
        let head = rest.remove(i);
        for mut tail in permutations(&rest) {
            tail.insert(0, head);
            result.push(tail);
        }
    }
    result
}

/// Columns Price/Qty, row [10, 3], B1 = =Price*Qty
#[test]
fn test_price_times_qty() {
    let mut registry = FormulaRegistry::new();
    open(&mut registry, "orders", &["Price", "Qty"], vec![nums(&[10.0, 3.0])]);

    let columns = vec!["Price".to_string(), "Qty".to_string()];
    let outcome = registry
        .set_cell_value("orders", 0, 1, CellContent::parse("=Price*Qty"), &columns)
        .unwrap();

    assert_eq!(outcome.value, Scalar::Number(30.0));
    assert_eq!(registry.get_cell_value("orders", 0, 1), Some(Scalar::Number(30.0)));
    assert_eq!(registry.get_formula("orders", 0, 1).as_deref(), Some("=Price*Qty"));

    let formulas = registry.get_all_formulas("orders");
    assert_eq!(formulas.len(), 1);
    assert_eq!((formulas[0].row, formulas[0].col), (0, 1));
    assert_eq!(formulas[0].resolved_formula, "=A1*B1");
}

/// `=A-CCC` must read columns A and CCC whatever order the names are listed in
#[test]
fn test_overlapping_column_names_any_order() {
    for order in permutations(&["A", "BB", "CCC"]) {
        // Values follow the column they belong to
        let row: Vec<Scalar> = order
            .iter()
            .map(|name| match *name {
                "A" => Scalar::Number(10.0),
                "BB" => Scalar::Number(20.0),
                _ => Scalar::Number(30.0),
            })
            .collect();

        let mut registry = FormulaRegistry::new();
        open(&mut registry, "s", &order, vec![row]);
        let outcome = registry
            .set_cell_value("s", 0, 3, CellContent::parse("=A-CCC"), &order)
            .unwrap();

        assert_eq!(outcome.value, Scalar::Number(-20.0), "column order {:?}", order);
        assert!(outcome.unknown_columns.is_empty());
    }
}

#[test]
fn test_sheets_are_isolated() {
    let mut registry = FormulaRegistry::new();
    open(&mut registry, "a", &[], vec![nums(&[1.0, 2.0])]);
    open(&mut registry, "b", &[], vec![nums(&[1.0, 2.0])]);

    let before = registry.get_cell_value("b", 0, 0);
    registry
        .set_cell("a", 0, 0, CellContent::parse("=B1*100"))
        .unwrap();
    registry.set_cell("a", 0, 1, CellContent::parse("7")).unwrap();

    assert_eq!(registry.get_cell_value("a", 0, 0), Some(Scalar::Number(700.0)));
    assert_eq!(registry.get_cell_value("b", 0, 0), before);
    assert_eq!(registry.get_cell_value("b", 0, 1), Some(Scalar::Number(2.0)));
    assert!(registry.get_all_formulas("b").is_empty());
}

#[test]
fn test_literal_overwrite_removes_formula() {
    let mut registry = FormulaRegistry::new();
    open(&mut registry, "s", &[], vec![nums(&[1.0, 2.0])]);
    registry.set_cell("s", 0, 1, CellContent::parse("=A1+1")).unwrap();
    assert_eq!(registry.get_all_formulas("s").len(), 1);

    registry.set_cell("s", 0, 1, CellContent::parse("5")).unwrap();
    assert!(registry.get_all_formulas("s").is_empty());
    assert_eq!(registry.get_cell_value("s", 0, 1), Some(Scalar::Number(5.0)));
}

#[test]
fn test_failing_formula_does_not_disturb_siblings() {
    let mut registry = FormulaRegistry::new();
    open(&mut registry, "s", &[], vec![nums(&[4.0, 0.0, 0.0])]);
    registry.set_cell("s", 0, 1, CellContent::parse("=A1*2")).unwrap();

    let outcome = registry
        .set_cell("s", 0, 2, CellContent::parse("=SUM(A1"))
        .unwrap();
    assert!(outcome.evaluation_failure.is_some());
    assert_eq!(outcome.value, Scalar::Error(CellError::Value));

    let div = registry
        .set_cell("s", 0, 0, CellContent::parse("=1/0"))
        .unwrap();
    assert_eq!(div.value, Scalar::Error(CellError::Div0));
    // The dependent picks the error up as a value
    assert_eq!(registry.get_cell_value("s", 0, 1), Some(Scalar::Error(CellError::Div0)));
    assert_eq!(registry.get_all_formulas("s").len(), 3);
}

#[test]
fn test_circular_reference_is_calc_error() {
    let mut registry = FormulaRegistry::new();
    open(&mut registry, "s", &[], vec![nums(&[0.0, 0.0])]);
    registry.set_cell("s", 0, 0, CellContent::parse("=B1+1")).unwrap();
    let outcome = registry
        .set_cell("s", 0, 1, CellContent::parse("=A1+1"))
        .unwrap();
    assert_eq!(outcome.value, Scalar::Error(CellError::Calc));
}

#[test]
fn test_edit_cancel_leaves_cell_unchanged() {
    let mut registry = FormulaRegistry::new();
    open(&mut registry, "s", &["Price", "Qty"], vec![nums(&[10.0, 3.0])]);
    registry
        .set_cell("s", 0, 1, CellContent::parse("=Price*Qty"))
        .unwrap();
    let value_before = registry.get_cell_value("s", 0, 1);
    let formula_before = registry.get_formula("s", 0, 1);

    let mut editor = GridEditor::new("s", EditorOptions::default());
    editor
        .click(&mut registry, CellAddress::new(0, 1))
        .unwrap();
    for c in "=0".chars() {
        editor
            .handle_key(&mut registry, Key::Char(c), Modifiers::NONE)
            .unwrap();
    }
    assert_eq!(editor.state(), EditorState::Editing(CellAddress::new(0, 1)));
    editor
        .handle_key(&mut registry, Key::Escape, Modifiers::NONE)
        .unwrap();

    assert_eq!(registry.get_cell_value("s", 0, 1), value_before);
    assert_eq!(registry.get_formula("s", 0, 1), formula_before);
    assert_eq!(editor.formula_bar(), "=Price*Qty");
}

#[test]
fn test_display_form_round_trip() {
    let columns = ["unit price", "qty"];
    let stored = resolve_for_storage_text("=SUM(qty, unit_price)*2", &columns, 4);
    // unit_price is not a column name and stays as written
    assert_eq!(stored, "=SUM(B5, unit_price)*2");

    let shown = powersheet::resolve_for_display("=B5*2+B6", &columns, 4);
    assert_eq!(shown.formula, "=qty*2+B6");
}

fn resolve_for_storage_text(formula: &str, columns: &[&str], row: u32) -> String {
    powersheet::resolve_for_storage(formula, columns, row).formula
}
