//! Durable key-value store adapter.
//!
//! [`KvStore`] is the only way the rest of the crate touches persisted state.
//! Reads never fail: an engine error or an undecodable record is logged and
//! reported as absent, so callers fall through to defaults. Writes propagate
//! their errors so restore and import flows can report them.

use std::future::Future;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{Row, SqlitePool};

use super::{DATA_TABLE, FLAGS_TABLE};
use crate::errors::AppError;

/// A single key/value write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KvEntry {
    pub key: String,
    pub value: Value,
}

impl KvEntry {
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }

    /// Serialized size of the record as it will be stored.
    pub fn encoded_len(&self) -> u64 {
        let value_len = serde_json::to_string(&self.value)
            .map(|s| s.len())
            .unwrap_or(0);
        (self.key.len() + value_len) as u64
    }
}

/// Async key-value storage with connection-per-call semantics.
pub trait KvStore: Clone + Send + Sync + 'static {
    fn get(&self, key: &str) -> impl Future<Output = Option<Value>> + Send;

    fn set(&self, key: &str, value: &Value) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Write all entries in one transaction.
    fn set_many(&self, entries: &[KvEntry]) -> impl Future<Output = Result<(), AppError>> + Send;

    fn delete(&self, key: &str) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Remove every record in the namespace, known key or not.
    fn clear_all(&self) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Read a value as a string, accepting numbers stored by older builds.
    fn get_string(&self, key: &str) -> impl Future<Output = Option<String>> + Send {
        async move {
            match self.get(key).await? {
                Value::String(s) => Some(s),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            }
        }
    }
}

/// SQLite-backed [`KvStore`].
///
/// Every call draws its own connection from the pool and hands it back when
/// the statement completes; no connection is held between calls.
#[derive(Clone)]
pub struct SqliteKvStore {
    pool: SqlitePool,
    table: &'static str,
}

impl SqliteKvStore {
    /// Store over the site content table.
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            table: DATA_TABLE,
        }
    }

    /// Store over the local flags table.
    pub fn flags(pool: SqlitePool) -> Self {
        Self {
            pool,
            table: FLAGS_TABLE,
        }
    }

    fn upsert_sql(&self) -> String {
        format!(
            "INSERT INTO {} (key, value, updated_at) VALUES (?, ?, ?) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            self.table
        )
    }
}

impl KvStore for SqliteKvStore {
    async fn get(&self, key: &str) -> Option<Value> {
        let sql = format!("SELECT value FROM {} WHERE key = ?", self.table);
        let row = match sqlx::query(&sql)
            .bind(key)
            .fetch_optional(&self.pool)
            .await
        {
            Ok(row) => row?,
            Err(err) => {
                tracing::warn!("Read of {} failed, treating as absent: {}", key, err);
                return None;
            }
        };

        let raw: String = row.get("value");
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!("Stored value for {} is not valid JSON: {}", key, err);
                None
            }
        }
    }

    async fn set(&self, key: &str, value: &Value) -> Result<(), AppError> {
        let encoded = serde_json::to_string(value)?;
        let now = Utc::now().to_rfc3339();

        sqlx::query(&self.upsert_sql())
            .bind(key)
            .bind(&encoded)
            .bind(&now)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn set_many(&self, entries: &[KvEntry]) -> Result<(), AppError> {
        if entries.is_empty() {
            return Ok(());
        }

        let sql = self.upsert_sql();
        let now = Utc::now().to_rfc3339();

        // Use a transaction for atomicity
        let mut tx = self.pool.begin().await?;

        for entry in entries {
            let encoded = serde_json::to_string(&entry.value)?;
            sqlx::query(&sql)
                .bind(&entry.key)
                .bind(&encoded)
                .bind(&now)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        let sql = format!("DELETE FROM {} WHERE key = ?", self.table);
        sqlx::query(&sql).bind(key).execute(&self.pool).await?;
        Ok(())
    }

    async fn clear_all(&self) -> Result<(), AppError> {
        let sql = format!("DELETE FROM {}", self.table);
        let result = sqlx::query(&sql).execute(&self.pool).await?;
        tracing::info!(
            "Cleared {} records from {}",
            result.rows_affected(),
            self.table
        );
        Ok(())
    }
}
