//! Read interface over the relational store holding raw lead/sale tables.
//!
//! The engine treats the store purely as a row source: execute query, get
//! rows. Connection handling, pooling and retries belong to the
//! implementation behind this trait.

use async_trait::async_trait;

use roas_core::row::Row;
use roas_core::{RoasError, RoasResult};

#[async_trait]
pub trait RowSource: Send + Sync {
    async fn list_tables(&self) -> RoasResult<Vec<String>>;

    /// Whether `column` exists on `table`. Implementations must distinguish
    /// "column doesn't exist" (Ok(false)) from "query failed" (Err).
    async fn column_exists(&self, table: &str, column: &str) -> RoasResult<bool>;

    async fn query(&self, sql: &str) -> RoasResult<Vec<Row>>;
}

/// Table and column names are interpolated into SQL text (they come from
/// form input in the consuming dashboard), so they are restricted to a safe
/// identifier charset before any query is built.
pub fn validate_identifier(name: &str) -> RoasResult<()> {
    let ok = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if ok {
        Ok(())
    } else {
        Err(RoasError::InvalidInput(format!(
            "invalid identifier `{name}`"
        )))
    }
}
