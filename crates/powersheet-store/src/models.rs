//! Wire models of the backend HTTP API
//!
//! Field names follow the backend's camelCase JSON.

use powersheet_core::Scalar;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `GET /schema?table=...`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaResponse {
    pub table_name: String,
    pub columns: Vec<ColumnInfo>,
    pub row_count: u64,
}

impl SchemaResponse {
    /// Column names in table order
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}

/// One column of a table schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    #[serde(default)]
    pub nullable: bool,
}

/// `POST /query`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub sql: String,
    /// Seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

/// Result of `POST /query`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    pub row_count: u64,
    /// Seconds spent in the database
    #[serde(default)]
    pub execution_time: f64,
}

/// `POST /cell/update`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellUpdateRequest {
    pub table: String,
    pub row_id: i64,
    pub column: String,
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
}

/// One persisted formula, as listed by `GET /formulas?table=...`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormulaRecord {
    pub row_id: i64,
    pub column: String,
    pub formula: String,
}

/// A sheet known to the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetInfo {
    pub id: String,
    pub name: String,
    pub table_name: String,
    #[serde(default)]
    pub row_count: u64,
    #[serde(default)]
    pub column_count: u64,
}

/// Generic acknowledgement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

/// `POST /column/insert`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnInsertRequest {
    pub table: String,
    pub column_name: String,
    pub data_type: String,
}

/// `POST /column/type`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnTypeRequest {
    pub table: String,
    pub column: String,
    pub new_type: String,
    pub decimal_separator: String,
}

/// `POST /sheets/create`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSheetRequest {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: u64,
}

/// `PUT /sheets/{id}/rename`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameSheetRequest {
    pub new_name: String,
}

/// `GET /health`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub service: String,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

/// Convert a JSON cell from the backend into a scalar
///
/// Strings are kept as text even when they look like numbers.
pub fn scalar_from_json(value: &Value) -> Scalar {
    match value {
        Value::Null => Scalar::Empty,
        Value::Bool(b) => Scalar::Boolean(*b),
        Value::Number(n) => n.as_f64().map_or(Scalar::Empty, Scalar::Number),
        Value::String(s) => Scalar::Text(s.clone()),
        // Nested values have no cell representation; show them as text
        other => Scalar::Text(other.to_string()),
    }
}

/// Convert a scalar into the JSON the backend stores
///
/// Error values are sent as their display text.
pub fn scalar_to_json(value: &Scalar) -> Value {
    match value {
        Scalar::Empty => Value::Null,
        Scalar::Number(n) => serde_json::Number::from_f64(*n).map_or(Value::Null, Value::Number),
        Scalar::Text(s) => Value::String(s.clone()),
        Scalar::Boolean(b) => Value::Bool(*b),
        Scalar::Error(e) => Value::String(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use powersheet_core::CellError;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_schema_wire_format() {
        let schema: SchemaResponse = serde_json::from_value(json!({
            "tableName": "sales",
            "columns": [
                {"name": "id", "type": "INTEGER", "nullable": false},
                {"name": "Price", "type": "DOUBLE", "nullable": true}
            ],
            "rowCount": 2
        }))
        .unwrap();
        assert_eq!(schema.column_names(), vec!["id", "Price"]);
        assert_eq!(schema.columns[1].data_type, "DOUBLE");
        assert_eq!(schema.row_count, 2);
    }

    #[test]
    fn test_cell_update_wire_format() {
        let request = CellUpdateRequest {
            table: "sales".into(),
            row_id: 7,
            column: "Total".into(),
            value: json!(30.0),
            formula: Some("=Price*Qty".into()),
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "table": "sales",
                "rowId": 7,
                "column": "Total",
                "value": 30.0,
                "formula": "=Price*Qty"
            })
        );

        let literal = CellUpdateRequest {
            formula: None,
            ..request
        };
        assert!(serde_json::to_value(&literal)
            .unwrap()
            .get("formula")
            .is_none());
    }

    #[test]
    fn test_scalar_json_conversion() {
        assert_eq!(scalar_from_json(&Value::Null), Scalar::Empty);
        assert_eq!(scalar_from_json(&json!(3)), Scalar::Number(3.0));
        assert_eq!(scalar_from_json(&json!("10")), Scalar::text("10"));
        assert_eq!(scalar_from_json(&json!(true)), Scalar::Boolean(true));

        assert_eq!(scalar_to_json(&Scalar::Empty), Value::Null);
        assert_eq!(scalar_to_json(&Scalar::Number(f64::NAN)), Value::Null);
        assert_eq!(
            scalar_to_json(&Scalar::Error(CellError::Div0)),
            json!("#DIV/0!")
        );
    }

    #[test]
    fn test_sheet_info_defaults() {
        let info: SheetInfo = serde_json::from_value(json!({
            "id": "s1",
            "name": "Sales",
            "tableName": "sales"
        }))
        .unwrap();
        assert_eq!(info.row_count, 0);
    }
}
