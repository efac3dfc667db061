//! # SQLite data client
//!
//! Self-hosted `DataClient`. Every table is stored in one `records` table as
//! JSON text, keyed by `(tbl, id)`. Ordering and key matching go through
//! SQLite's JSON functions; `seq` keeps insertion order for ties.

use std::str::FromStr;

use async_trait::async_trait;
use domains::{DataClient, DataError, FetchOptions, Row};
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row as _;
use tracing::{debug, info};
use uuid::Uuid;

use crate::ordering::key_text;
use crate::SetupError;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS records (
    seq        INTEGER PRIMARY KEY AUTOINCREMENT,
    tbl        TEXT NOT NULL,
    id         TEXT NOT NULL,
    data       TEXT NOT NULL,
    created_at TEXT NOT NULL,
    UNIQUE (tbl, id)
)";

fn json_path(column: &str) -> String {
    format!("$.\"{}\"", column.replace('"', ""))
}

fn backend(table: &str) -> impl Fn(sqlx::Error) -> DataError + '_ {
    move |e| DataError::backend(table, e)
}

fn parse(table: &str, data: &str) -> Result<Row, DataError> {
    serde_json::from_str(data).map_err(|e| DataError::Malformed {
        table: table.to_string(),
        message: e.to_string(),
    })
}

fn encode(table: &str, row: &Row) -> Result<String, DataError> {
    serde_json::to_string(row).map_err(|e| DataError::Malformed {
        table: table.to_string(),
        message: e.to_string(),
    })
}

pub struct SqliteDataClient {
    pool: SqlitePool,
}

impl SqliteDataClient {
    /// Opens (creating if needed) the database at `url` and applies the
    /// schema. An in-memory url gets a single connection so every query
    /// sees the same database.
    pub async fn new(url: &str) -> Result<Self, SetupError> {
        let setup = |e: sqlx::Error| SetupError::Database {
            url: url.to_string(),
            message: e.to_string(),
        };
        let options = SqliteConnectOptions::from_str(url)
            .map_err(setup)?
            .create_if_missing(true);
        let max = if url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max)
            .connect_with(options)
            .await
            .map_err(setup)?;
        sqlx::query(SCHEMA).execute(&pool).await.map_err(setup)?;
        info!(url, "sqlite data client ready");
        Ok(Self { pool })
    }
}

#[async_trait]
impl DataClient for SqliteDataClient {
    async fn select(&self, table: &str, options: &FetchOptions) -> Result<Vec<Row>, DataError> {
        let limit = options
            .limit
            .and_then(|l| i64::try_from(l).ok())
            .unwrap_or(-1);
        let mut sql = String::from("SELECT data FROM records WHERE tbl = ?");
        if options.filter.is_some() {
            sql.push_str(" AND CAST(json_extract(data, ?) AS TEXT) = ?");
        }
        match &options.order_by {
            Some(order) => {
                let direction = if order.is_ascending() { "ASC" } else { "DESC" };
                sql.push_str(&format!(" ORDER BY json_extract(data, ?) {direction}, seq ASC"));
            }
            None => sql.push_str(" ORDER BY seq ASC"),
        }
        sql.push_str(" LIMIT ?");

        let mut query = sqlx::query(&sql).bind(table);
        if let Some(filter) = &options.filter {
            query = query.bind(json_path(&filter.column)).bind(filter.value.as_str());
        }
        if let Some(order) = &options.order_by {
            query = query.bind(json_path(&order.column));
        }
        let rows = query
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(backend(table))?;

        debug!(table, rows = rows.len(), "sqlite select");
        rows.iter()
            .map(|r| parse(table, &r.get::<String, _>("data")))
            .collect()
    }

    async fn select_one(&self, table: &str, id: &str) -> Result<Row, DataError> {
        let row = sqlx::query("SELECT data FROM records WHERE tbl = ? AND id = ?")
            .bind(table)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend(table))?;

        match row {
            Some(r) => parse(table, &r.get::<String, _>("data")),
            None => Err(DataError::not_found(table, id)),
        }
    }

    async fn insert(&self, table: &str, mut row: Row) -> Result<Row, DataError> {
        let id = match row.get("id").and_then(key_text) {
            Some(id) => id,
            None => {
                let id = Uuid::new_v4().to_string();
                row.insert("id".into(), Value::String(id.clone()));
                id
            }
        };
        sqlx::query("INSERT INTO records (tbl, id, data, created_at) VALUES (?, ?, ?, ?)")
            .bind(table)
            .bind(&id)
            .bind(encode(table, &row)?)
            .bind(chrono::Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(backend(table))?;
        debug!(table, id = %id, "sqlite insert");
        Ok(row)
    }

    /// Read-merge-write inside one transaction.
    async fn update(&self, table: &str, id: &str, patch: Row) -> Result<(), DataError> {
        let mut tx = self.pool.begin().await.map_err(backend(table))?;

        let current = sqlx::query("SELECT data FROM records WHERE tbl = ? AND id = ?")
            .bind(table)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(backend(table))?
            .ok_or_else(|| DataError::not_found(table, id))?;
        let mut row = parse(table, &current.get::<String, _>("data"))?;
        row.extend(patch);

        sqlx::query("UPDATE records SET data = ? WHERE tbl = ? AND id = ?")
            .bind(encode(table, &row)?)
            .bind(table)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(backend(table))?;

        tx.commit().await.map_err(backend(table))?;
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
        let mut tx = self.pool.begin().await.map_err(backend(table))?;

        let existing = sqlx::query(
            "SELECT id, data FROM records WHERE tbl = ? \
             AND CAST(json_extract(data, ?) AS TEXT) = ? ORDER BY seq LIMIT 1",
        )
        .bind(table)
        .bind(json_path(on_conflict))
        .bind(&key)
        .fetch_optional(&mut *tx)
        .await
        .map_err(backend(table))?;

        match existing {
            Some(found) => {
                let id: String = found.get("id");
                let mut merged = parse(table, &found.get::<String, _>("data"))?;
                merged.extend(row);
                sqlx::query("UPDATE records SET data = ? WHERE tbl = ? AND id = ?")
                    .bind(encode(table, &merged)?)
                    .bind(table)
                    .bind(id)
                    .execute(&mut *tx)
                    .await
                    .map_err(backend(table))?;
            }
            None => {
                let id = row
                    .get("id")
                    .and_then(key_text)
                    .unwrap_or_else(|| Uuid::new_v4().to_string());
                sqlx::query("INSERT INTO records (tbl, id, data, created_at) VALUES (?, ?, ?, ?)")
                    .bind(table)
                    .bind(id)
                    .bind(encode(table, &row)?)
                    .bind(chrono::Utc::now().to_rfc3339())
                    .execute(&mut *tx)
                    .await
                    .map_err(backend(table))?;
            }
        }

        tx.commit().await.map_err(backend(table))?;
        debug!(table, on_conflict, key = %key, "sqlite upsert");
        Ok(())
    }

    async fn delete(&self, table: &str, column: &str, value: &str) -> Result<(), DataError> {
        let result = sqlx::query(
            "DELETE FROM records WHERE tbl = ? AND CAST(json_extract(data, ?) AS TEXT) = ?",
        )
        .bind(table)
        .bind(json_path(column))
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(backend(table))?;
        debug!(table, column, value, removed = result.rows_affected(), "sqlite delete");
        Ok(())
    }
}
