//! # In-memory adapters
//!
//! Process-local `DataClient` and `ObjectStorage`. The default backend for
//! development and the fixture behind most tests. Rows live in insertion
//! order per table; nothing survives a restart.

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use domains::{DataClient, DataError, FetchOptions, ObjectStorage, Row, StorageError};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::ordering::{self, key_text};

fn matches_key(row: &Row, column: &str, value: &str) -> bool {
    row.get(column)
        .and_then(key_text)
        .is_some_and(|k| k == value)
}

fn merge(target: &mut Row, patch: Row) {
    for (k, v) in patch {
        target.insert(k, v);
    }
}

#[derive(Debug, Default)]
pub struct MemoryDataClient {
    tables: DashMap<String, Vec<Row>>,
}

impl MemoryDataClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends fixture rows verbatim. Non-object values are skipped.
    pub fn seed<I>(&self, table: &str, rows: I)
    where
        I: IntoIterator<Item = Value>,
    {
        let mut entry = self.tables.entry(table.to_string()).or_default();
        entry.extend(rows.into_iter().filter_map(|v| match v {
            Value::Object(row) => Some(row),
            _ => None,
        }));
    }

    /// Snapshot of a table in insertion order.
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.tables
            .get(table)
            .map(|rows| rows.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl DataClient for MemoryDataClient {
    async fn select(&self, table: &str, options: &FetchOptions) -> Result<Vec<Row>, DataError> {
        let mut rows = self.rows(table);
        if let Some(filter) = &options.filter {
            rows.retain(|r| matches_key(r, &filter.column, &filter.value));
        }
        ordering::apply(&mut rows, options);
        debug!(table, rows = rows.len(), "memory select");
        Ok(rows)
    }

    async fn select_one(&self, table: &str, id: &str) -> Result<Row, DataError> {
        self.tables
            .get(table)
            .and_then(|rows| rows.iter().find(|r| matches_key(r, "id", id)).cloned())
            .ok_or_else(|| DataError::not_found(table, id))
    }

    async fn insert(&self, table: &str, mut row: Row) -> Result<Row, DataError> {
        let mut rows = self.tables.entry(table.to_string()).or_default();
        let id = match row.get("id").and_then(key_text) {
            Some(id) if rows.iter().any(|r| matches_key(r, "id", &id)) => {
                return Err(DataError::backend(table, format!("duplicate key {id}")));
            }
            Some(id) => id,
            None => {
                let id = Uuid::new_v4().to_string();
                row.insert("id".into(), Value::String(id.clone()));
                id
            }
        };
        debug!(table, id = %id, "memory insert");
        rows.push(row.clone());
        Ok(row)
    }

    async fn update(&self, table: &str, id: &str, row: Row) -> Result<(), DataError> {
        let mut rows = self
            .tables
            .get_mut(table)
            .ok_or_else(|| DataError::not_found(table, id))?;
        let target = rows
            .iter_mut()
            .find(|r| matches_key(r, "id", id))
            .ok_or_else(|| DataError::not_found(table, id))?;
        merge(target, row);
        Ok(())
    }

    async fn upsert(&self, table: &str, on_conflict: &str, row: Row) -> Result<(), DataError> {
        let key = row
            .get(on_conflict)
            .and_then(key_text)
            .ok_or_else(|| DataError::Malformed {
                table: table.to_string(),
                message: format!("upsert row has no {on_conflict}"),
            })?;
        let mut rows = self.tables.entry(table.to_string()).or_default();
        match rows.iter_mut().find(|r| matches_key(r, on_conflict, &key)) {
            Some(existing) => merge(existing, row),
            None => rows.push(row),
        }
        Ok(())
    }

    async fn delete(&self, table: &str, column: &str, value: &str) -> Result<(), DataError> {
        if let Some(mut rows) = self.tables.get_mut(table) {
            let before = rows.len();
            rows.retain(|r| !matches_key(r, column, value));
            debug!(table, column, value, removed = before - rows.len(), "memory delete");
        }
        Ok(())
    }
}

/// Object store that keeps uploads in memory and serves URLs under a fixed
/// base.
#[derive(Debug)]
pub struct MemoryObjectStore {
    base_url: String,
    objects: DashMap<(String, String), (Bytes, String)>,
    fail_suffix: Option<String>,
}

impl MemoryObjectStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            objects: DashMap::new(),
            fail_suffix: None,
        }
    }

    /// Makes every upload whose path ends with `suffix` fail.
    pub fn failing_on(mut self, suffix: impl Into<String>) -> Self {
        self.fail_suffix = Some(suffix.into());
        self
    }

    /// `(bucket, path)` of every stored object, sorted.
    pub fn objects(&self) -> Vec<(String, String)> {
        let mut keys: Vec<_> = self.objects.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    pub fn get(&self, bucket: &str, path: &str) -> Option<(Bytes, String)> {
        self.objects
            .get(&(bucket.to_string(), path.to_string()))
            .map(|e| e.value().clone())
    }
}

#[async_trait]
impl ObjectStorage for MemoryObjectStore {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<(), StorageError> {
        if self.fail_suffix.as_deref().is_some_and(|s| path.ends_with(s)) {
            return Err(StorageError::Upload {
                path: path.to_string(),
                message: "rejected by store".into(),
            });
        }
        let key = (bucket.to_string(), path.to_string());
        if self.objects.contains_key(&key) {
            return Err(StorageError::Upload {
                path: path.to_string(),
                message: "object already exists".into(),
            });
        }
        debug!(bucket, path, bytes = data.len(), "memory upload");
        self.objects.insert(key, (data, content_type.to_string()));
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/{}/{}", self.base_url, bucket, path)
    }
}
