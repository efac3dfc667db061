//! # Core Traits (Ports)
//!
//! The hosted services the site depends on, reduced to the narrow
//! request/response contracts the services crate actually uses. Any adapter
//! must implement these traits to be wired into the binary.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;

use crate::errors::{AuthError, DataError, StorageError};
use crate::models::RawSession;

/// A row as the relational service returns it.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Column ordering for a select. Ascending unless stated otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct OrderBy {
    pub column: String,
    pub ascending: Option<bool>,
}

impl OrderBy {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            ascending: Some(true),
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            ascending: Some(false),
        }
    }

    pub fn is_ascending(&self) -> bool {
        self.ascending.unwrap_or(true)
    }
}

/// Equality on one column. Values compare as text, so `7` matches `"7"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ColumnFilter {
    pub column: String,
    pub value: String,
}

/// Options of a collection select.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct FetchOptions {
    pub order_by: Option<OrderBy>,
    pub limit: Option<usize>,
    pub filter: Option<ColumnFilter>,
}

impl FetchOptions {
    pub fn ordered(order_by: OrderBy) -> Self {
        Self {
            order_by: Some(order_by),
            ..Self::default()
        }
    }

    /// Only rows whose `column` equals `value`.
    pub fn matching(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            filter: Some(ColumnFilter {
                column: column.into(),
                value: value.into(),
            }),
            ..Self::default()
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Row-level CRUD against the relational service.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait DataClient: Send + Sync {
    /// `select *` with an optional equality filter, ordering and limit.
    async fn select(&self, table: &str, options: &FetchOptions) -> Result<Vec<Row>, DataError>;

    /// Exactly one row by primary key. Absence is [`DataError::NotFound`].
    async fn select_one(&self, table: &str, id: &str) -> Result<Row, DataError>;

    /// Inserts a row and returns it as stored (with its assigned `id`).
    async fn insert(&self, table: &str, row: Row) -> Result<Row, DataError>;

    async fn update(&self, table: &str, id: &str, row: Row) -> Result<(), DataError>;

    /// Insert-or-update keyed by `on_conflict`, which must be present in `row`.
    async fn upsert(&self, table: &str, on_conflict: &str, row: Row) -> Result<(), DataError>;

    /// Hard delete of every row whose `column` equals `value`.
    async fn delete(&self, table: &str, column: &str, value: &str) -> Result<(), DataError>;
}

/// Object storage contract for uploaded images.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<(), StorageError>;

    /// Public URL of an uploaded object. Pure; performs no request.
    fn public_url(&self, bucket: &str, path: &str) -> String;
}

/// Authentication provider with a continuous session feed.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Current session plus every later change. The first value is observed
    /// immediately by the subscriber.
    fn subscribe(&self) -> watch::Receiver<Option<RawSession>>;

    async fn sign_in(&self, provider: &str) -> Result<(), AuthError>;

    async fn sign_out(&self) -> Result<(), AuthError>;
}

/// Turns a bearer token presented with a request into a session.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait SessionResolver: Send + Sync {
    async fn resolve(&self, token: &str) -> Result<RawSession, AuthError>;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock stuck at one instant, for deterministic upload paths and stamps.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
