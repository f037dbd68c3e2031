//! Statement execution against a raw connection or an open transaction.

use async_trait::async_trait;
use tracing::trace;

use crate::error::{DriverError, PgMiddlewareError};
use crate::options::Options;
use crate::results::ResultSet;
use crate::scan::FromRow;
use crate::types::RowValues;

/// The two calls [`Executor`] needs from a driver handle.
///
/// Implemented by raw connections and by open transactions alike; `Executor` never knows
/// which one it holds.
#[async_trait]
pub trait Executable: Send + Sync {
    /// Run a statement that returns no rows and report the affected row count.
    async fn execute(&self, sql: &str, params: &[RowValues]) -> Result<u64, DriverError>;

    /// Run a statement and return its rows in cursor order.
    async fn query(&self, sql: &str, params: &[RowValues]) -> Result<ResultSet, DriverError>;
}

/// Issues statements through a bound [`Executable`] under one set of [`Options`].
///
/// Not meant for concurrent use: an open transaction accepts one statement at a time.
pub struct Executor<'a> {
    target: &'a dyn Executable,
    options: Options,
}

impl<'a> Executor<'a> {
    pub(crate) fn new(target: &'a dyn Executable, options: Options) -> Self {
        Self { target, options }
    }

    #[must_use]
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Execute a statement and return the number of affected rows.
    ///
    /// # Errors
    /// Returns `PgMiddlewareError::Execution` if the driver fails, or
    /// `PgMiddlewareError::Context` if the bound context is cancelled or expired.
    pub async fn exec(&self, sql: &str, params: &[RowValues]) -> Result<u64, PgMiddlewareError> {
        trace!(sql, params = params.len(), "exec");
        self.options
            .context
            .guard(self.target.execute(sql, params))
            .await?
            .map_err(|source| PgMiddlewareError::execution("execute query", source))
    }

    /// Fetch exactly one row and scan it into `T`.
    ///
    /// # Errors
    /// Returns `PgMiddlewareError::RowCount` unless exactly one row comes back,
    /// `PgMiddlewareError::Scan` if the row does not map onto `T`, plus the errors of [`Self::exec`].
    pub async fn get<T: FromRow>(
        &self,
        sql: &str,
        params: &[RowValues],
    ) -> Result<T, PgMiddlewareError> {
        let rows = self.fetch("get one result row", sql, params).await?;
        match rows.rows() {
            [row] => T::from_row(row),
            others => Err(PgMiddlewareError::RowCount {
                found: others.len(),
            }),
        }
    }

    /// Fetch every row, scanning each into `T` in cursor order.
    ///
    /// Zero rows is an empty `Vec`, not an error.
    ///
    /// # Errors
    /// Returns `PgMiddlewareError::Scan` if any row does not map onto `T`, plus the errors of
    /// [`Self::exec`].
    pub async fn select<T: FromRow>(
        &self,
        sql: &str,
        params: &[RowValues],
    ) -> Result<Vec<T>, PgMiddlewareError> {
        let rows = self.fetch("select result rows", sql, params).await?;
        rows.iter().map(T::from_row).collect()
    }

    /// Fetch the untyped result set.
    ///
    /// # Errors
    /// Same as [`Self::exec`].
    pub async fn query_raw(
        &self,
        sql: &str,
        params: &[RowValues],
    ) -> Result<ResultSet, PgMiddlewareError> {
        self.fetch("query", sql, params).await
    }

    async fn fetch(
        &self,
        action: &'static str,
        sql: &str,
        params: &[RowValues],
    ) -> Result<ResultSet, PgMiddlewareError> {
        trace!(sql, params = params.len(), action);
        self.options
            .context
            .guard(self.target.query(sql, params))
            .await?
            .map_err(|source| PgMiddlewareError::execution(action, source))
    }
}
