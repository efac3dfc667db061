//! # Hosted REST adapters
//!
//! `DataClient` over a PostgREST-compatible endpoint (`/rest/v1/{table}`)
//! and `ObjectStorage` over the matching storage API
//! (`/storage/v1/object/{bucket}/{path}`). Both authenticate with the
//! project's anon key.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use domains::{DataClient, DataError, FetchOptions, ObjectStorage, Row, StorageError};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::SetupError;

/// PostgREST code for "object requested, zero rows returned".
const NO_ROWS: &str = "PGRST116";

#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

fn http_client(api_key: &str, timeout: Duration) -> Result<Client, SetupError> {
    let mut headers = HeaderMap::new();
    let key = HeaderValue::from_str(api_key).map_err(|e| SetupError::Http(e.to_string()))?;
    let bearer = HeaderValue::from_str(&format!("Bearer {api_key}")).map_err(|e| SetupError::Http(e.to_string()))?;
    headers.insert("apikey", key);
    headers.insert(AUTHORIZATION, bearer);
    Client::builder()
        .default_headers(headers)
        .timeout(timeout)
        .build()
        .map_err(|e| SetupError::Http(e.to_string()))
}

pub struct RestDataClient {
    http: Client,
    base_url: String,
}

impl RestDataClient {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, SetupError> {
        Ok(Self {
            http: http_client(api_key, timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    async fn send(&self, table: &str, request: RequestBuilder) -> Result<Response, DataError> {
        let response = request
            .send()
            .await
            .map_err(|e| DataError::backend(table, e))?;
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body: ApiErrorBody = response.json().await.unwrap_or_default();
        warn!(table, %status, code = body.code.as_deref().unwrap_or("-"), "data request failed");
        Err(DataError::backend(
            table,
            body.message.unwrap_or_else(|| status.to_string()),
        ))
    }

    async fn rows(table: &str, response: Response) -> Result<Vec<Row>, DataError> {
        response.json().await.map_err(|e| DataError::Malformed {
            table: table.to_string(),
            message: e.to_string(),
        })
    }
}

fn eq(value: &str) -> String {
    format!("eq.{value}")
}

#[async_trait]
impl DataClient for RestDataClient {
    async fn select(&self, table: &str, options: &FetchOptions) -> Result<Vec<Row>, DataError> {
        let mut query = vec![("select", "*".to_string())];
        if let Some(filter) = &options.filter {
            query.push((filter.column.as_str(), eq(&filter.value)));
        }
        if let Some(order) = &options.order_by {
            let direction = if order.is_ascending() { "asc" } else { "desc" };
            query.push(("order", format!("{}.{direction}", order.column)));
        }
        if let Some(limit) = options.limit {
            query.push(("limit", limit.to_string()));
        }
        debug!(table, ?options, "rest select");
        let response = self
            .send(table, self.http.get(self.table_url(table)).query(&query))
            .await?;
        Self::rows(table, response).await
    }

    async fn select_one(&self, table: &str, id: &str) -> Result<Row, DataError> {
        let response = self
            .http
            .get(self.table_url(table))
            .query(&[("select", "*".to_string()), ("id", eq(id))])
            .header(ACCEPT, "application/vnd.pgrst.object+json")
            .send()
            .await
            .map_err(|e| DataError::backend(table, e))?;

        let status = response.status();
        if status.is_success() {
            return response.json().await.map_err(|e| DataError::Malformed {
                table: table.to_string(),
                message: e.to_string(),
            });
        }
        let body: ApiErrorBody = response.json().await.unwrap_or_default();
        if body.code.as_deref() == Some(NO_ROWS) || status == StatusCode::NOT_ACCEPTABLE {
            return Err(DataError::not_found(table, id));
        }
        warn!(table, id, %status, "document request failed");
        Err(DataError::backend(
            table,
            body.message.unwrap_or_else(|| status.to_string()),
        ))
    }

    async fn insert(&self, table: &str, row: Row) -> Result<Row, DataError> {
        let request = self
            .http
            .post(self.table_url(table))
            .header("Prefer", "return=representation")
            .json(&[row]);
        let response = self.send(table, request).await?;
        Self::rows(table, response)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| DataError::backend(table, "insert returned no row"))
    }

    async fn update(&self, table: &str, id: &str, row: Row) -> Result<(), DataError> {
        let request = self
            .http
            .patch(self.table_url(table))
            .query(&[("id", eq(id))])
            .header("Prefer", "return=representation")
            .json(&row);
        let response = self.send(table, request).await?;
        // A filter that matches nothing is still a 2xx with an empty array.
        if Self::rows(table, response).await?.is_empty() {
            warn!(table, id, "update matched no row");
            return Err(DataError::not_found(table, id));
        }
        Ok(())
    }

    async fn upsert(&self, table: &str, on_conflict: &str, row: Row) -> Result<(), DataError> {
        let request = self
            .http
            .post(self.table_url(table))
            .query(&[("on_conflict", on_conflict)])
            .header("Prefer", "resolution=merge-duplicates")
            .json(&[row]);
        self.send(table, request).await?;
        Ok(())
    }

    async fn delete(&self, table: &str, column: &str, value: &str) -> Result<(), DataError> {
        let request = self.http.delete(self.table_url(table)).query(&[(column, eq(value))]);
        self.send(table, request).await?;
        Ok(())
    }
}

pub struct RestObjectStorage {
    http: Client,
    base_url: String,
}

impl RestObjectStorage {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, SetupError> {
        Ok(Self {
            http: http_client(api_key, timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// `{base}/storage/v1/object/{route..}/{bucket}/{path}` with every
    /// segment percent-encoded.
    fn object_url(&self, route: &[&str], bucket: &str, path: &str) -> Option<Url> {
        let mut url = Url::parse(&self.base_url).ok()?;
        url.path_segments_mut()
            .ok()?
            .pop_if_empty()
            .extend(["storage", "v1", "object"])
            .extend(route)
            .push(bucket)
            .extend(path.split('/'));
        Some(url)
    }
}

#[async_trait]
impl ObjectStorage for RestObjectStorage {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let content_type = content_type
            .parse::<mime::Mime>()
            .unwrap_or(mime::APPLICATION_OCTET_STREAM);
        let failed = |message: String| StorageError::Upload {
            path: path.to_string(),
            message,
        };
        let url = self
            .object_url(&[], bucket, path)
            .ok_or_else(|| failed(format!("base url {} cannot hold a path", self.base_url)))?;

        let response = self
            .http
            .post(url)
            .header(CONTENT_TYPE, content_type.to_string())
            .body(data)
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;
        if !response.status().is_success() {
            let status = response.status();
            let body: ApiErrorBody = response.json().await.unwrap_or_default();
            return Err(failed(body.message.unwrap_or_else(|| status.to_string())));
        }
        debug!(bucket, path, "object uploaded");
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        match self.object_url(&["public"], bucket, path) {
            Some(url) => url.to_string(),
            None => format!("{}/storage/v1/object/public/{}/{}", self.base_url, bucket, path),
        }
    }
}
