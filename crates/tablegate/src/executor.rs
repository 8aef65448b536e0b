//! Query execution capability.
//!
//! [`Executor`] is the seam between compiled [`Statement`]s and a database. The
//! gateway only ever talks to an executor, which keeps compilation testable
//! without PostgreSQL. [`PgExecutor`] is the production implementation over any
//! [`GenericClient`].

use crate::client::GenericClient;
use crate::compile;
use crate::config::ExecConfig;
use crate::error::{GateError, GateResult};
use crate::ident::Ident;
use crate::record::Record;
use crate::statement::Statement;
use crate::trace;
use std::future::Future;
use tokio_postgres::types::ToSql;

/// Runs compiled statements.
pub trait Executor: Send + Sync {
    /// Run a row-returning statement and normalize every row.
    fn fetch(&self, stmt: &Statement) -> impl Future<Output = GateResult<Vec<Record>>> + Send;

    /// Run a statement and return the number of affected rows.
    fn execute(&self, stmt: &Statement) -> impl Future<Output = GateResult<u64>> + Send;

    /// Ordered column names of `table`.
    ///
    /// The default implementation reads the system catalog through
    /// [`Executor::fetch`]. An unknown table, or any failure of the lookup,
    /// is reported as [`GateError::Schema`].
    fn column_names(&self, table: &Ident) -> impl Future<Output = GateResult<Vec<String>>> + Send {
        async move {
            let stmt = compile::column_names(table);
            let rows = self
                .fetch(&stmt)
                .await
                .map_err(|e| GateError::schema(table.to_string(), e.to_string()))?;

            let columns = rows
                .iter()
                .map(|row| {
                    row.get("column_name")
                        .and_then(|v| v.as_str())
                        .map(str::to_string)
                        .ok_or_else(|| {
                            GateError::schema(table.to_string(), "catalog row without column_name")
                        })
                })
                .collect::<GateResult<Vec<_>>>()?;

            if columns.is_empty() {
                return Err(GateError::schema(
                    table.to_string(),
                    "table does not exist or has no columns",
                ));
            }
            Ok(columns)
        }
    }
}

/// [`Executor`] over a tokio-postgres client, transaction or pooled client.
///
/// ```ignore
/// let (client, connection) = tokio_postgres::connect(url, NoTls).await?;
/// tokio::spawn(connection);
/// let conn = PgExecutor::with_config(client, ExecConfig::new().timeout(Duration::from_secs(5)));
/// let n = Gateway::new().count(&conn, "users", &FilterSpec::new()).await?;
/// ```
#[derive(Debug)]
pub struct PgExecutor<C> {
    client: C,
    config: ExecConfig,
}

impl<C: GenericClient> PgExecutor<C> {
    pub fn new(client: C) -> Self {
        Self::with_config(client, ExecConfig::default())
    }

    pub fn with_config(client: C, config: ExecConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &ExecConfig {
        &self.config
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn into_inner(self) -> C {
        self.client
    }

    /// Execute with timeout if configured.
    async fn with_timeout<T, F>(&self, sql: &str, future: F) -> GateResult<T>
    where
        F: Future<Output = GateResult<T>> + Send,
    {
        match self.config.query_timeout {
            Some(after) => tokio::time::timeout(after, future).await.map_err(|_| {
                if let Some(cancel_token) = self.client.cancel_token() {
                    tokio::spawn(async move {
                        let _ = cancel_token.cancel_query(tokio_postgres::NoTls).await;
                    });
                }
                GateError::Timeout {
                    sql: sql.to_string(),
                    after,
                }
            })?,
            None => future.await,
        }
    }
}

fn bind_params(stmt: &Statement) -> Vec<&(dyn ToSql + Sync)> {
    stmt.params
        .iter()
        .map(|v| v as &(dyn ToSql + Sync))
        .collect()
}

impl<C: GenericClient> Executor for PgExecutor<C> {
    async fn fetch(&self, stmt: &Statement) -> GateResult<Vec<Record>> {
        trace::log_statement(self.config.log_level, self.config.max_sql_length, "fetch", stmt);
        let params = bind_params(stmt);
        let rows = self
            .with_timeout(&stmt.sql, self.client.query(&stmt.sql, &params))
            .await?;
        rows.iter().map(Record::from_row).collect()
    }

    async fn execute(&self, stmt: &Statement) -> GateResult<u64> {
        trace::log_statement(self.config.log_level, self.config.max_sql_length, "execute", stmt);
        let params = bind_params(stmt);
        self.with_timeout(&stmt.sql, self.client.execute(&stmt.sql, &params))
            .await
    }
}
