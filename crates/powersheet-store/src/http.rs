//! HTTP client for the backend API

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::models::{
    ColumnInsertRequest, ColumnTypeRequest, CreateSheetRequest, FormulaRecord, HealthStatus,
    QueryRequest, QueryResponse, RenameSheetRequest, SchemaResponse, SheetInfo, SuccessResponse,
};
use crate::store::{BackingStore, CellUpdate, SheetSnapshot};
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;

/// [`BackingStore`] over the backend's JSON API
#[derive(Debug, Clone)]
pub struct HttpStore {
    client: Client,
    config: StoreConfig,
}

impl HttpStore {
    /// Build a client from settings
    pub fn new(config: StoreConfig) -> StoreResult<Self> {
        Url::parse(&config.base_url)
            .map_err(|e| StoreError::Config(format!("invalid base URL '{}': {}", config.base_url, e)))?;
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout)
            .build()
            .map_err(|e| StoreError::Config(e.to_string()))?;
        Ok(Self { client, config })
    }

    /// Client for `base_url` with default settings
    pub fn with_base_url(base_url: impl Into<String>) -> StoreResult<Self> {
        Self::new(StoreConfig::with_base_url(base_url))
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// `{base}/{prefix}/{segment}{suffix}` with `segment` percent-encoded
    fn segment_url(&self, prefix: &str, segment: &str, suffix: &[&str]) -> StoreResult<Url> {
        let mut url = Url::parse(&self.config.endpoint(prefix))
            .map_err(|e| StoreError::Config(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| StoreError::Config(format!("'{}' cannot hold a path", self.config.base_url)))?
            .push(segment)
            .extend(suffix);
        Ok(url)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> StoreResult<T> {
        let response = check_status(request.send().await?).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| StoreError::Parse(e.to_string()))
    }

    async fn send_ack(&self, request: RequestBuilder) -> StoreResult<()> {
        let ack: SuccessResponse = self.send(request).await?;
        if ack.success {
            Ok(())
        } else {
            Err(StoreError::Rejected(
                ack.message.unwrap_or_else(|| "request was not applied".to_string()),
            ))
        }
    }
}

async fn check_status(response: Response) -> StoreResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    tracing::debug!(status = status.as_u16(), %body, "backend request failed");
    Err(match status.as_u16() {
        404 => StoreError::NotFound(detail(&body)),
        400 | 422 => StoreError::Rejected(detail(&body)),
        code => StoreError::Http(code, body),
    })
}

/// Pull `detail` out of an error body, falling back to the raw text
fn detail(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("detail").and_then(|d| d.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

/// `SELECT *` over a table, with the identifier quoted
pub fn select_all_sql(table: &str) -> String {
    format!("SELECT * FROM \"{}\"", table.replace('"', "\"\""))
}

impl BackingStore for HttpStore {
    async fn schema(&self, table: &str) -> StoreResult<SchemaResponse> {
        tracing::trace!(table, "GET /schema");
        self.send(
            self.client
                .get(self.config.endpoint("/schema"))
                .query(&[("table", table)]),
        )
        .await
    }

    async fn fetch_rows(&self, table: &str) -> StoreResult<SheetSnapshot> {
        tracing::trace!(table, "POST /query");
        let request = QueryRequest {
            sql: select_all_sql(table),
            timeout: Some(self.config.timeout.as_secs()),
        };
        let response: QueryResponse = self
            .send(self.client.post(self.config.endpoint("/query")).json(&request))
            .await?;
        Ok(SheetSnapshot::from_query(response))
    }

    async fn update_cell(&self, update: CellUpdate) -> StoreResult<()> {
        tracing::trace!(table = %update.table, row_id = update.row_id, column = %update.column, "POST /cell/update");
        let request = update.to_request();
        self.send_ack(
            self.client
                .post(self.config.endpoint("/cell/update"))
                .json(&request),
        )
        .await
    }

    async fn formulas(&self, table: &str) -> StoreResult<Vec<FormulaRecord>> {
        tracing::trace!(table, "GET /formulas");
        self.send(
            self.client
                .get(self.config.endpoint("/formulas"))
                .query(&[("table", table)]),
        )
        .await
    }

    async fn insert_row(&self, table: &str, position: Option<u64>) -> StoreResult<()> {
        tracing::trace!(table, ?position, "POST /row/insert");
        let mut request = self
            .client
            .post(self.config.endpoint("/row/insert"))
            .query(&[("table", table)]);
        if let Some(position) = position {
            request = request.query(&[("position", position)]);
        }
        self.send_ack(request).await
    }

    async fn delete_row(&self, table: &str, row_id: i64) -> StoreResult<()> {
        tracing::trace!(table, row_id, "DELETE /row");
        let url = self.segment_url("/row", &row_id.to_string(), &[])?;
        self.send_ack(self.client.delete(url).query(&[("table", table)]))
            .await
    }

    async fn insert_column(&self, table: &str, name: &str, data_type: &str) -> StoreResult<()> {
        tracing::trace!(table, name, data_type, "POST /column/insert");
        let request = ColumnInsertRequest {
            table: table.to_string(),
            column_name: name.to_string(),
            data_type: data_type.to_string(),
        };
        self.send_ack(
            self.client
                .post(self.config.endpoint("/column/insert"))
                .json(&request),
        )
        .await
    }

    async fn delete_column(&self, table: &str, name: &str) -> StoreResult<()> {
        tracing::trace!(table, name, "DELETE /column");
        let url = self.segment_url("/column", name, &[])?;
        self.send_ack(self.client.delete(url).query(&[("table", table)]))
            .await
    }

    async fn change_column_type(&self, request: ColumnTypeRequest) -> StoreResult<()> {
        tracing::trace!(table = %request.table, column = %request.column, new_type = %request.new_type, "POST /column/type");
        self.send_ack(
            self.client
                .post(self.config.endpoint("/column/type"))
                .json(&request),
        )
        .await
    }

    async fn list_sheets(&self) -> StoreResult<Vec<SheetInfo>> {
        tracing::trace!("GET /sheets");
        self.send(self.client.get(self.config.endpoint("/sheets")))
            .await
    }

    async fn create_sheet(&self, name: &str, columns: Vec<String>, rows: u64) -> StoreResult<SheetInfo> {
        tracing::trace!(name, rows, "POST /sheets/create");
        let request = CreateSheetRequest {
            name: name.to_string(),
            columns,
            rows,
        };
        self.send(
            self.client
                .post(self.config.endpoint("/sheets/create"))
                .json(&request),
        )
        .await
    }

    async fn delete_sheet(&self, sheet_id: &str) -> StoreResult<()> {
        tracing::trace!(sheet_id, "DELETE /sheets");
        let url = self.segment_url("/sheets", sheet_id, &[])?;
        self.send_ack(self.client.delete(url)).await
    }

    async fn rename_sheet(&self, sheet_id: &str, new_name: &str) -> StoreResult<SheetInfo> {
        tracing::trace!(sheet_id, new_name, "PUT /sheets/rename");
        let url = self.segment_url("/sheets", sheet_id, &["rename"])?;
        let request = RenameSheetRequest {
            new_name: new_name.to_string(),
        };
        self.send(self.client.put(url).json(&request)).await
    }

    async fn health(&self) -> StoreResult<HealthStatus> {
        self.send(self.client.get(self.config.endpoint("/health")))
            .await
    }
}
