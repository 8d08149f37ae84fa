//! HTTP client for the accounting query endpoint.

use std::time::Duration;

use reqwest::{Client, header};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use super::ApiError;
use crate::provider::Environment;
use crate::store::Secret;

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// API minor version sent with every request.
pub const DEFAULT_MINOR_VERSION: u32 = 73;

/// Largest page the query endpoint will return.
pub const MAX_PAGE_SIZE: u32 = 1000;

/// One `QueryResponse` from the endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryPage {
    /// Entity name the rows were returned under, e.g. `Invoice`.
    /// `None` when nothing matched.
    pub entity: Option<String>,

    pub rows: Vec<Value>,

    pub start_position: Option<u64>,

    pub max_results: Option<u64>,

    /// Only present for `SELECT COUNT(*)` statements.
    pub total_count: Option<u64>,
}

impl QueryPage {
    fn from_response(body: Value) -> Result<Self, ApiError> {
        let Some(Value::Object(response)) = body.get("QueryResponse").cloned() else {
            return Err(ApiError::InvalidResponse(
                "response has no QueryResponse object".to_string(),
            ));
        };

        let mut page = QueryPage {
            start_position: number(&response, "startPosition"),
            max_results: number(&response, "maxResults"),
            total_count: number(&response, "totalCount"),
            ..Default::default()
        };

        for (key, value) in response {
            if let Value::Array(rows) = value {
                page.entity = Some(key);
                page.rows = rows;
                break;
            }
        }

        Ok(page)
    }
}

fn number(response: &Map<String, Value>, key: &str) -> Option<u64> {
    response.get(key).and_then(Value::as_u64)
}

/// Client for the query endpoint of one environment.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Debug, Clone)]
pub struct QueryClient {
    client: Client,
    base_url: String,
    minor_version: u32,
}

impl QueryClient {
    /// Create a client for `environment`'s API host.
    pub fn new(environment: Environment, minor_version: u32) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: environment.api_base().to_string(),
            minor_version,
        })
    }

    /// Point the client at another company base URL, e.g. a mock server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        self.base_url = base_url;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn query_url(&self, realm_id: &str) -> String {
        format!(
            "{}{}/query?minorversion={}",
            self.base_url, realm_id, self.minor_version
        )
    }

    /// Run one statement and return the page it produced.
    pub async fn query(
        &self,
        token: &Secret,
        realm_id: &str,
        statement: &str,
    ) -> Result<QueryPage, ApiError> {
        let url = self.query_url(realm_id);
        debug!(realm_id = realm_id, statement = statement, "Running query");

        let response = self
            .client
            .post(&url)
            .bearer_auth(token.expose())
            .header(header::ACCEPT, "application/json")
            .header(header::CONTENT_TYPE, "application/text")
            .body(statement.to_string())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_status(status, &body));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("body is not JSON: {}", e)))?;

        QueryPage::from_response(body)
    }

    /// Run a statement page by page and collect every row.
    ///
    /// `STARTPOSITION`/`MAXRESULTS` clauses are appended to `statement`, so it
    /// must not carry its own. `page_size` is clamped to `1..=1000`. Paging
    /// stops at the first page shorter than `page_size`.
    pub async fn query_all(
        &self,
        token: &Secret,
        realm_id: &str,
        statement: &str,
        page_size: u32,
    ) -> Result<QueryPage, ApiError> {
        let page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        let base = statement.trim().trim_end_matches(';').trim_end();

        let mut all = QueryPage::default();
        let mut start: u64 = 1;

        loop {
            let paged = format!("{} STARTPOSITION {} MAXRESULTS {}", base, start, page_size);
            let page = self.query(token, realm_id, &paged).await?;
            let fetched = page.rows.len();

            if all.entity.is_none() {
                all.entity = page.entity;
            }
            all.rows.extend(page.rows);

            debug!(start = start, fetched = fetched, "Fetched query page");

            if fetched < page_size as usize {
                break;
            }
            start += u64::from(page_size);
        }

        all.start_position = Some(1);
        all.max_results = Some(all.rows.len() as u64);
        Ok(all)
    }
}
