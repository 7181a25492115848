use crate::config::toml_config::SourceConfig;
use crate::domain::model::{
    QuantitySnapshot, ScanSource, TransactionLineRef, UnauthorizedTransfer, WorkOrderRef,
};
use crate::domain::ports::{FieldDirectory, InventoryStore, ValueCount};
use crate::utils::error::{InventoryError, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

/// Platform record store reached over JSON/HTTP.
pub struct HttpInventoryStore {
    client: Client,
    base: Url,
    headers: HashMap<String, String>,
}

#[derive(Debug, Serialize)]
struct RenumberRequest<'a> {
    source: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<&'a str>,
    transaction_id: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    line_id: &'a str,
    from: &'a str,
    to: &'a str,
}

impl HttpInventoryStore {
    pub fn new(endpoint: &str, headers: HashMap<String, String>, timeout: Duration) -> Result<Self> {
        // 確保 join 時保留基底路徑
        let normalized = if endpoint.ends_with('/') {
            endpoint.to_string()
        } else {
            format!("{}/", endpoint)
        };
        let base = Url::parse(&normalized).map_err(|e| InventoryError::InvalidConfigValue {
            field: "source.endpoint".to_string(),
            value: endpoint.to_string(),
            reason: e.to_string(),
        })?;
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base,
            headers,
        })
    }

    pub fn from_config(source: &SourceConfig) -> Result<Self> {
        let endpoint = source
            .endpoint
            .as_deref()
            .ok_or_else(|| InventoryError::MissingConfig {
                field: "source.endpoint".to_string(),
            })?;
        Self::new(
            endpoint,
            source.headers.clone().unwrap_or_default(),
            Duration::from_secs(source.timeout_seconds),
        )
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base.join(path).map_err(|e| InventoryError::Config {
            message: format!("cannot build request url for '{}': {}", path, e),
        })
    }

    fn with_headers(&self, mut request: RequestBuilder) -> RequestBuilder {
        for (key, value) in &self.headers {
            request = request.header(key, value);
        }
        request
    }

    fn source_query(source: &ScanSource) -> Vec<(&'static str, String)> {
        let mut query = vec![("source", source.category().as_str().to_string())];
        if let Some(field_id) = source.field_id() {
            query.push(("field", field_id.to_string()));
        }
        query
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let url = self.url(path)?;
        tracing::debug!("GET {} {:?}", url, query);
        let request = self.with_headers(self.client.get(url).query(query));
        let response = check_status(request.send().await?).await?;
        Ok(response.json().await?)
    }
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(InventoryError::Store {
        status: status.as_u16(),
        message: if body.is_empty() {
            format!("request failed with status {}", status)
        } else {
            body
        },
    })
}

#[async_trait]
impl FieldDirectory for HttpInventoryStore {
    async fn list_candidate_field_ids(&self) -> Result<Vec<String>> {
        self.get_json("fields", &[]).await
    }
}

#[async_trait]
impl InventoryStore for HttpInventoryStore {
    async fn count_by_value(&self, source: &ScanSource) -> Result<Vec<ValueCount>> {
        self.get_json("groups", &Self::source_query(source)).await
    }

    async fn lines_with_value(
        &self,
        source: &ScanSource,
        value: &str,
    ) -> Result<Vec<TransactionLineRef>> {
        let mut query = Self::source_query(source);
        query.push(("value", value.to_string()));
        self.get_json("lines", &query).await
    }

    async fn renumber_line(
        &self,
        source: &ScanSource,
        line: &TransactionLineRef,
        from: &str,
        to: &str,
    ) -> Result<()> {
        let body = RenumberRequest {
            source: source.category().as_str(),
            field: source.field_id(),
            transaction_id: &line.transaction_id,
            line_id: &line.line_id,
            from,
            to,
        };
        let url = self.url("lines/renumber")?;
        tracing::debug!("POST {} ({} -> {} on {})", url, from, to, line.member_label());

        let request = self.with_headers(self.client.post(url).json(&body));
        check_status(request.send().await?).await?;
        Ok(())
    }

    async fn unauthorized_fulfillments(
        &self,
        since: NaiveDate,
        authorization_field: &str,
        approved_value: &str,
    ) -> Result<Vec<UnauthorizedTransfer>> {
        let query = vec![
            ("since", since.format("%Y-%m-%d").to_string()),
            ("field", authorization_field.to_string()),
            ("approved", approved_value.to_string()),
        ];
        self.get_json("fulfillments/unauthorized", &query).await
    }

    async fn open_work_orders(
        &self,
        statuses: &[String],
        on_or_before: NaiveDate,
    ) -> Result<Vec<WorkOrderRef>> {
        let mut query = vec![("before", on_or_before.format("%Y-%m-%d").to_string())];
        query.extend(statuses.iter().map(|s| ("status", s.clone())));
        self.get_json("workorders/open", &query).await
    }

    async fn quantity_snapshots(&self) -> Result<Vec<QuantitySnapshot>> {
        self.get_json("inventory/snapshots", &[]).await
    }
}
