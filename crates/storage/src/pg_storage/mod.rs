//! PostgreSQL storage backend using sqlx.
//!
//! Split into modular files by domain concern.

#![allow(clippy::absolute_paths, reason = "std paths in error handling are clear")]

mod chapters;
mod characters;
mod chunks;
mod plot;
mod projects;
mod snapshots;

use crate::error::StorageError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};

use super::pg_migrations::run_pg_migrations;

const PG_POOL_MAX_CONNECTIONS: u32 = 8;
const PG_POOL_ACQUIRE_TIMEOUT_SECS: u64 = 30;
const PG_POOL_IDLE_TIMEOUT_SECS: u64 = 600;

#[derive(Clone, Debug)]
pub struct PgStorage {
    pool: PgPool,
}

impl PgStorage {
    /// Connect and apply migrations.
    ///
    /// `embedding_dim` sizes the chunk embedding column on first creation.
    pub async fn new(database_url: &str, embedding_dim: usize) -> Result<Self, StorageError> {
        let pool = PgPoolOptions::new()
            .max_connections(PG_POOL_MAX_CONNECTIONS)
            .acquire_timeout(std::time::Duration::from_secs(PG_POOL_ACQUIRE_TIMEOUT_SECS))
            .idle_timeout(std::time::Duration::from_secs(PG_POOL_IDLE_TIMEOUT_SECS))
            .test_before_acquire(true)
            .connect(database_url)
            .await?;
        run_pg_migrations(&pool, embedding_dim)
            .await
            .map_err(|e| StorageError::Migration(e.to_string()))?;
        tracing::info!(embedding_dim, "PgStorage initialized");
        Ok(Self { pool })
    }
}

/// Chapter numbers and counters are stored as INTEGER.
pub(crate) fn to_db_int(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

pub(crate) fn get_u32(row: &PgRow, column: &str) -> Result<u32, StorageError> {
    let raw: i32 = row.try_get(column)?;
    u32::try_from(raw).map_err(|e| StorageError::corrupt(format!("negative {column}: {raw}"), e))
}

pub(crate) fn to_doc<T: Serialize>(value: &T) -> Result<serde_json::Value, StorageError> {
    Ok(serde_json::to_value(value)?)
}

pub(crate) fn from_doc<T: DeserializeOwned>(
    row: &PgRow,
    column: &str,
    context: &str,
) -> Result<T, StorageError> {
    let value: serde_json::Value = row.try_get(column)?;
    serde_json::from_value(value).map_err(|e| StorageError::corrupt(context.to_owned(), e))
}

pub(crate) fn from_optional_doc<T: DeserializeOwned>(
    row: &PgRow,
    column: &str,
    context: &str,
) -> Result<Option<T>, StorageError> {
    let value: Option<serde_json::Value> = row.try_get(column)?;
    value
        .map(|v| serde_json::from_value(v).map_err(|e| StorageError::corrupt(context.to_owned(), e)))
        .transpose()
}
