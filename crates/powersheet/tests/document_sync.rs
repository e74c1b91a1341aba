//! Document sessions persisting through the in-memory store

use powersheet::prelude::*;
use powersheet::{CellUpdate, LoadOutcome, RegistryError, SheetLoad, SheetSnapshot, StoreError};
use powersheet_store::FormulaRecord;
use pretty_assertions::assert_eq;

fn sales() -> MemoryStore {
    let n = Scalar::Number;
    MemoryStore::new().with_table(
        "sales",
        &["id", "Price", "Qty", "Total"],
        vec![
            vec![n(1.0), n(10.0), n(3.0), Scalar::Empty],
            vec![n(2.0), n(4.0), n(5.0), Scalar::Empty],
            vec![n(3.0), n(2.0), n(2.0), Scalar::Empty],
        ],
    )
}

async fn opened(store: &MemoryStore) -> Document<MemoryStore> {
    let mut doc = Document::new(store.clone());
    doc.open_sheet("s", "Sales", "sales").await.unwrap();
    doc
}

fn at(a1: &str) -> CellAddress {
    CellAddress::parse(a1).unwrap()
}

#[tokio::test]
async fn test_open_replays_stored_formulas() {
    let store = sales();
    store
        .update_cell(CellUpdate {
            table: "sales".into(),
            row_id: 2,
            column: "Total".into(),
            value: Scalar::Number(20.0),
            formula: Some("=Price*Qty".into()),
        })
        .await
        .unwrap();

    let mut doc = Document::new(store.clone());
    let outcome = doc.open_sheet("s", "Sales", "sales").await.unwrap();
    assert_eq!(
        outcome,
        LoadOutcome::Applied {
            rows: 3,
            cols: 4,
            formulas: 1,
            skipped: 0
        }
    );

    let registry = doc.registry();
    assert_eq!(registry.get_formula("s", 1, 3).as_deref(), Some("=Price*Qty"));
    assert_eq!(registry.get_cell_value("s", 1, 3), Some(Scalar::Number(20.0)));
    assert_eq!(registry.formula_entry("s", 1, 3).unwrap().resolved_formula, "=B2*C2");
}

#[tokio::test]
async fn test_formula_records_for_missing_cells_are_skipped() {
    let store = sales();
    let mut doc = opened(&store).await;

    let ticket = doc.begin_load("s").unwrap();
    let load = SheetLoad {
        snapshot: store.snapshot("sales").unwrap(),
        formulas: vec![
            FormulaRecord {
                row_id: 1,
                column: "Total".into(),
                formula: "=Price+Qty".into(),
            },
            FormulaRecord {
                row_id: 99,
                column: "Total".into(),
                formula: "=1".into(),
            },
            FormulaRecord {
                row_id: 3,
                column: "Removed".into(),
                formula: "=2".into(),
            },
        ],
    };
    let outcome = doc.apply_snapshot(&ticket, load).unwrap();
    assert_eq!(
        outcome,
        LoadOutcome::Applied {
            rows: 3,
            cols: 4,
            formulas: 1,
            skipped: 2
        }
    );
    assert_eq!(doc.registry().get_cell_value("s", 0, 3), Some(Scalar::Number(13.0)));
    assert_eq!(doc.registry().get_all_formulas("s").len(), 1);
}

#[tokio::test]
async fn test_editor_commit_persists_value_and_formula() {
    let store = sales();
    let mut doc = opened(&store).await;

    doc.click("s", at("D1")).await.unwrap();
    for c in "=Price*Qty".chars() {
        let outcome = doc.handle_key("s", Key::Char(c), Modifiers::NONE).await.unwrap();
        assert!(outcome.is_none());
    }
    let outcome = doc
        .handle_key("s", Key::Enter, Modifiers::NONE)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(outcome.value, Scalar::Number(30.0));
    assert_eq!(store.cell("sales", 1, "Total"), Some(Scalar::Number(30.0)));
    assert_eq!(store.formula("sales", 1, "Total").as_deref(), Some("=Price*Qty"));

    let editor = doc.editor("s").unwrap();
    assert_eq!(editor.active_cell(), Some(at("D2")));
    assert!(!editor.is_editing());
}

#[tokio::test]
async fn test_delete_key_clears_stored_formula() {
    let store = sales();
    let mut doc = opened(&store).await;
    doc.set_cell("s", 0, 3, CellContent::parse("=Price*Qty"))
        .await
        .unwrap();
    assert!(store.formula("sales", 1, "Total").is_some());

    doc.click("s", at("D1")).await.unwrap();
    let outcome = doc
        .handle_key("s", Key::Delete, Modifiers::NONE)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(outcome.value, Scalar::Empty);
    assert_eq!(store.formula("sales", 1, "Total"), None);
    assert_eq!(store.cell("sales", 1, "Total"), Some(Scalar::Empty));
    assert_eq!(doc.editor("s").unwrap().active_cell(), Some(at("D1")));
}

#[tokio::test]
async fn test_failed_write_keeps_local_edit_until_reconcile() {
    let store = sales();
    let mut doc = opened(&store).await;

    store.fail_next(1);
    let err = doc
        .set_cell("s", 0, 1, CellContent::parse("99"))
        .await
        .unwrap_err();
    assert!(err.is_persistence_failure());
    assert!(doc.needs_reconcile("s"));

    // Optimistic: the grid shows the edit, the store does not
    assert_eq!(doc.registry().get_cell_value("s", 0, 1), Some(Scalar::Number(99.0)));
    assert_eq!(store.cell("sales", 1, "Price"), Some(Scalar::Number(10.0)));

    doc.reconcile("s").await.unwrap();
    assert!(!doc.needs_reconcile("s"));
    assert_eq!(doc.registry().get_cell_value("s", 0, 1), Some(Scalar::Number(10.0)));
}

#[tokio::test]
async fn test_reconcile_on_failure_reloads_immediately() {
    let store = sales();
    let options = DocumentOptions {
        reconcile_on_failure: true,
        ..DocumentOptions::default()
    };
    let mut doc = Document::with_options(store.clone(), options);
    doc.open_sheet("s", "Sales", "sales").await.unwrap();

    store.fail_updates_where(|update| update.column == "Qty");
    let err = doc
        .set_cell("s", 1, 2, CellContent::parse("50"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Store(StoreError::Http(500, _))));

    assert!(!doc.needs_reconcile("s"));
    assert_eq!(doc.registry().get_cell_value("s", 1, 2), Some(Scalar::Number(5.0)));
}

#[tokio::test]
async fn test_fill_reports_partial_failure() {
    let store = sales();
    let mut doc = opened(&store).await;
    doc.set_cell("s", 0, 3, CellContent::parse("=Price*Qty"))
        .await
        .unwrap();

    store.fail_updates_where(|update| update.row_id == 2);
    let report = doc
        .fill("s", FillOperation::new(at("D1"), CellRange::parse("D1:D3").unwrap()))
        .await
        .unwrap();

    assert_eq!(report.outcomes.len(), 2);
    assert!(!report.is_complete());
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].address, at("D2"));
    assert!(matches!(
        report.failures[0].error,
        Error::Store(StoreError::Http(500, _))
    ));
    assert!(report.failures[0].error.is_persistence_failure());

    // The failed cell keeps its local value; the other one reached the store
    assert_eq!(doc.registry().get_cell_value("s", 1, 3), Some(Scalar::Number(20.0)));
    assert_eq!(store.formula("sales", 2, "Total"), None);
    assert_eq!(store.formula("sales", 3, "Total").as_deref(), Some("=Price*Qty"));
    assert_eq!(store.cell("sales", 3, "Total"), Some(Scalar::Number(4.0)));
    assert!(doc.needs_reconcile("s"));
}

#[tokio::test]
async fn test_fill_past_last_row_reports_unmapped_cells() {
    let store = sales();
    let mut doc = opened(&store).await;
    doc.set_cell("s", 0, 3, CellContent::parse("=Price*Qty"))
        .await
        .unwrap();

    let report = doc
        .fill("s", FillOperation::new(at("D1"), CellRange::parse("D1:D5").unwrap()))
        .await
        .unwrap();

    let failed: Vec<CellAddress> = report.failures.iter().map(|f| f.address).collect();
    assert_eq!(failed, vec![at("D4"), at("D5")]);
    for failure in &report.failures {
        assert!(matches!(&failure.error, Error::Unmapped { sheet_id, .. } if sheet_id == "s"));
        assert!(!failure.error.is_persistence_failure());
    }
    assert_eq!(store.formula("sales", 3, "Total").as_deref(), Some("=Price*Qty"));
    assert!(doc.needs_reconcile("s"));

    doc.reconcile("s").await.unwrap();
    assert_eq!(doc.registry().dimensions("s"), Some((3, 4)));
}

#[tokio::test]
async fn test_column_changes_reload_sheet() {
    let store = sales();
    let mut doc = opened(&store).await;

    let outcome = doc.add_column("s", "Discount", "DOUBLE").await.unwrap();
    assert!(matches!(outcome, LoadOutcome::Applied { cols: 5, .. }));
    assert_eq!(
        doc.registry().backing_columns("s").unwrap().last().map(String::as_str),
        Some("Discount")
    );

    let err = doc.drop_column("s", "Nope").await.unwrap_err();
    assert!(matches!(err, Error::UnknownColumn(name) if name == "Nope"));

    let outcome = doc.drop_column("s", "Discount").await.unwrap();
    assert!(matches!(outcome, LoadOutcome::Applied { cols: 4, .. }));
}

#[tokio::test]
async fn test_formulas_follow_row_keys_across_inserts() {
    let store = sales();
    let mut doc = opened(&store).await;
    doc.set_cell("s", 0, 3, CellContent::parse("=Price*Qty"))
        .await
        .unwrap();

    let outcome = doc.insert_row("s", Some(0)).await.unwrap();
    assert!(matches!(outcome, LoadOutcome::Applied { rows: 4, formulas: 1, .. }));

    // Row key 1 moved down one grid row and its formula with it
    assert_eq!(doc.registry().get_formula("s", 1, 3).as_deref(), Some("=Price*Qty"));
    assert_eq!(doc.registry().get_cell_value("s", 1, 3), Some(Scalar::Number(30.0)));
    assert_eq!(doc.registry().get_cell_value("s", 0, 0), Some(Scalar::Number(4.0)));

    let outcome = doc.delete_row("s", 1).await.unwrap();
    assert!(matches!(outcome, LoadOutcome::Applied { rows: 3, formulas: 0, .. }));
    assert!(doc.registry().get_all_formulas("s").is_empty());
}

#[tokio::test]
async fn test_newer_load_wins() {
    let store = sales();
    let mut doc = opened(&store).await;

    let older = doc.begin_load("s").unwrap();
    let older_load = doc.fetch(&older).await.unwrap();

    store
        .update_cell(CellUpdate {
            table: "sales".into(),
            row_id: 1,
            column: "Price".into(),
            value: Scalar::Number(11.0),
            formula: None,
        })
        .await
        .unwrap();
    let newer = doc.begin_load("s").unwrap();
    let newer_load = doc.fetch(&newer).await.unwrap();

    // Responses arrive out of order
    assert!(matches!(doc.apply_snapshot(&newer, newer_load).unwrap(), LoadOutcome::Applied { .. }));
    assert_eq!(doc.apply_snapshot(&older, older_load).unwrap(), LoadOutcome::Superseded);
    assert_eq!(doc.registry().get_cell_value("s", 0, 1), Some(Scalar::Number(11.0)));
}

#[tokio::test]
async fn test_closed_sheet_is_not_found() {
    let store = sales();
    let mut doc = opened(&store).await;
    assert!(doc.close_sheet("s"));
    assert!(!doc.close_sheet("s"));

    let err = doc
        .set_cell("s", 0, 0, CellContent::parse("1"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Registry(RegistryError::SheetNotFound(_))));
    assert!(doc.editor("s").is_none());
}

#[test]
fn test_snapshot_keys_fall_back_to_position() {
    let snapshot = SheetSnapshot::new(
        vec!["name".into()],
        vec![vec![Scalar::text("a")], vec![Scalar::text("b")]],
    );
    assert_eq!(snapshot.row_keys, vec![1, 2]);
}
