//! Table gateway: the caller-facing operations.
//!
//! A [`Gateway`] is configuration only. Every operation borrows an
//! [`Executor`] for the duration of one call, compiles exactly one statement
//! and awaits exactly one round trip (the empty-filter guards on update and
//! delete make none).
//!
//! ```ignore
//! let gw = Gateway::new();
//! let conn = PgExecutor::new(pool.get().await?);
//!
//! gw.insert(&conn, "users", &Record::new().with("name", "Alice"), Some("uuid")).await?;
//! let id = gw
//!     .lookup_field(&conn, "uuid", "users", &FilterSpec::new().filter("name", "Alice"))
//!     .await?;
//!
//! let active = gw.count(&conn, "users", &FilterSpec::new().filter("status", "active")).await?;
//! let page = gw
//!     .read(&conn, &QuerySpec::new("users").like("lastname", "smi").limit(20))
//!     .await?
//!     .into_rows();
//! ```

use crate::compile;
use crate::config::GatewayConfig;
use crate::error::{GateError, GateResult};
use crate::executor::Executor;
use crate::ident::Ident;
use crate::query_spec::{FilterSpec, QuerySpec, ResultShape};
use crate::record::Record;
use crate::value::Value;

#[cfg(test)]
mod tests;

/// Outcome of [`Gateway::read`], shaped by the query's [`ResultShape`].
#[derive(Debug, Clone, PartialEq)]
pub enum ReadResult {
    /// Every matched row (`all`); empty when nothing matched.
    Rows(Vec<Record>),
    /// The first matched row (`single`), or `None`.
    Single(Option<Record>),
}

impl ReadResult {
    /// Flatten into a row vector (0 or 1 rows for `Single`).
    pub fn into_rows(self) -> Vec<Record> {
        match self {
            ReadResult::Rows(rows) => rows,
            ReadResult::Single(row) => row.into_iter().collect(),
        }
    }

    /// The single row, or the first of many.
    pub fn into_first(self) -> Option<Record> {
        match self {
            ReadResult::Rows(rows) => rows.into_iter().next(),
            ReadResult::Single(row) => row,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ReadResult::Rows(rows) => rows.len(),
            ReadResult::Single(row) => usize::from(row.is_some()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Generic CRUD over any table.
#[derive(Debug, Clone, Default)]
pub struct Gateway {
    config: GatewayConfig,
}

impl Gateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: GatewayConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    // ==================== Schema ====================

    /// Ordered column names of `table`.
    pub async fn column_names(
        &self,
        conn: &impl Executor,
        table: &str,
    ) -> GateResult<Vec<String>> {
        let table = Ident::parse(table)?;
        conn.column_names(&table).await
    }

    /// A record with every column of `table` set to NULL.
    pub async fn entity_defaults(&self, conn: &impl Executor, table: &str) -> GateResult<Record> {
        Ok(Record::nulls(self.column_names(conn, table).await?))
    }

    // ==================== Reads ====================

    /// Compile `spec` and run it once.
    pub async fn read(&self, conn: &impl Executor, spec: &QuerySpec) -> GateResult<ReadResult> {
        let stmt = compile::select(spec, &self.config)?;
        let rows = conn.fetch(&stmt).await?;
        Ok(match spec.result_shape {
            ResultShape::All => ReadResult::Rows(rows),
            ResultShape::Single => ReadResult::Single(rows.into_iter().next()),
        })
    }

    /// `field` of the first row of `table` matching `filter`.
    pub async fn lookup_field(
        &self,
        conn: &impl Executor,
        field: &str,
        table: &str,
        filter: &FilterSpec,
    ) -> GateResult<Option<Value>> {
        let stmt = compile::lookup(field, table, filter, &self.config)?;
        let rows = conn.fetch(&stmt).await?;
        Ok(rows
            .into_iter()
            .next()
            .and_then(|row| row.into_iter().next())
            .map(|(_, value)| value))
    }

    /// Number of rows of `table` matching `filter` (all rows when empty).
    pub async fn count(
        &self,
        conn: &impl Executor,
        table: &str,
        filter: &FilterSpec,
    ) -> GateResult<i64> {
        let stmt = compile::count(table, filter, &self.config)?;
        let rows = conn.fetch(&stmt).await?;
        rows.first()
            .and_then(|row| row.iter().next())
            .and_then(|(_, value)| value.as_i64())
            .ok_or_else(|| GateError::decode("count", "COUNT(*) returned no integer"))
    }

    // ==================== Writes ====================

    /// Insert one row; `true` when exactly one row was written.
    ///
    /// `identifier` names a column the database fills with a generated UUID
    /// unless `values` already carries it.
    pub async fn insert(
        &self,
        conn: &impl Executor,
        table: &str,
        values: &Record,
        identifier: Option<&str>,
    ) -> GateResult<bool> {
        let stmt = compile::insert(table, values, identifier, &self.config)?;
        Ok(conn.execute(&stmt).await? == 1)
    }

    /// Insert one row and return its `identifier` column in the same round trip.
    pub async fn insert_returning(
        &self,
        conn: &impl Executor,
        table: &str,
        values: &Record,
        identifier: &str,
    ) -> GateResult<Option<Value>> {
        let stmt = compile::insert_returning(table, values, identifier, &self.config)?;
        let rows = conn.fetch(&stmt).await?;
        Ok(rows
            .into_iter()
            .next()
            .and_then(|row| row.into_iter().next())
            .map(|(_, value)| value))
    }

    /// Update matching rows; `true` when at least one row changed.
    ///
    /// An empty filter returns `false` without running anything.
    pub async fn update(
        &self,
        conn: &impl Executor,
        table: &str,
        values: &Record,
        filter: &FilterSpec,
    ) -> GateResult<bool> {
        if filter.is_empty() {
            tracing::warn!(target: "tablegate", table, "UPDATE without a filter skipped");
            return Ok(false);
        }
        let stmt = compile::update(table, values, filter, &self.config)?;
        Ok(conn.execute(&stmt).await? > 0)
    }

    /// Delete matching rows; `true` when at least one row was removed.
    ///
    /// An empty filter returns `false` without running anything.
    pub async fn delete(
        &self,
        conn: &impl Executor,
        table: &str,
        filter: &FilterSpec,
    ) -> GateResult<bool> {
        if filter.is_empty() {
            tracing::warn!(target: "tablegate", table, "DELETE without a filter skipped");
            return Ok(false);
        }
        let stmt = compile::delete(table, filter, &self.config)?;
        Ok(conn.execute(&stmt).await? > 0)
    }
}
