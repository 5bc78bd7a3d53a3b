//! Thin client for the PostgREST-style table API.
//!
//! Every request carries the API key twice (`apikey` header and bearer
//! token) and is bounded by the configured timeout. Filters use the
//! `column=op.value` query syntax, e.g. `("year", "eq.2025".into())`.

use crate::config::RemoteConfig;
use crate::error::{NetworkError, Result};
use reqwest::{Method, RequestBuilder, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, trace};

/// Query parameters as `(column, "op.value")` pairs.
pub type Filter<'a> = [(&'a str, String)];

#[derive(Debug, Clone)]
pub struct RestClient {
    http: reqwest::Client,
    config: RemoteConfig,
}

impl RestClient {
    pub fn new(config: RemoteConfig) -> Result<Self> {
        config.validate()?;
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &RemoteConfig {
        &self.config
    }

    /// Insert one row into `table`.
    pub async fn insert<B>(&self, table: &str, body: &B) -> Result<()>
    where
        B: Serialize + ?Sized,
    {
        trace!(table, "POST");
        let response = self
            .request(Method::POST, table)
            .header("Prefer", "return=minimal")
            .json(body)
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    /// Rows of `table` matching `filter`.
    pub async fn select<T>(&self, table: &str, filter: &Filter<'_>) -> Result<Vec<T>>
    where
        T: DeserializeOwned,
    {
        trace!(table, "GET");
        let response = self
            .request(Method::GET, table)
            .query(filter)
            .send()
            .await?;
        let response = check_status(response).await?;
        let body = response.text().await?;
        let rows: Vec<T> = serde_json::from_str(&body)
            .map_err(|e| NetworkError::invalid_response(format!("{table}: {e}")))?;
        debug!(table, rows = rows.len(), "Fetched rows");
        Ok(rows)
    }

    /// Patch the rows of `table` matching `filter` with `body`.
    pub async fn update<B>(&self, table: &str, filter: &Filter<'_>, body: &B) -> Result<()>
    where
        B: Serialize + ?Sized,
    {
        trace!(table, "PATCH");
        let response = self
            .request(Method::PATCH, table)
            .query(filter)
            .header("Prefer", "return=minimal")
            .json(body)
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    fn request(&self, method: Method, table: &str) -> RequestBuilder {
        self.http
            .request(method, self.config.endpoint(table))
            .header("apikey", &self.config.api_key)
            .bearer_auth(&self.config.api_key)
    }
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(NetworkError::Status {
        status: status.as_u16(),
        body,
    })
}
