//! Managed transactions: begin, configure timeouts, run a handler, commit or roll back.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::context::QueryContext;
use crate::error::{DriverError, PgMiddlewareError};
use crate::executor::{Executable, Executor};
use crate::options::{Options, millis};
use crate::types::RowValues;

pub(crate) const TRANSACTION_TIMEOUT_SQL: &str =
    "SET local idle_in_transaction_session_timeout = $1";
pub(crate) const STATEMENT_TIMEOUT_SQL: &str = "SET local statement_timeout = $1";

/// A connection that can open transactions.
pub trait Connection: Executable {
    type Tx<'c>: TransactionHandle
    where
        Self: 'c;

    /// Open a transaction.
    ///
    /// The returned future is always driven to completion: once `BEGIN` may have reached the
    /// server, only a handle can undo it. Implementations may use `ctx` for any waiting done
    /// before `BEGIN` is sent.
    #[allow(clippy::manual_async_fn)]
    fn begin(
        &self,
        ctx: &QueryContext,
    ) -> impl Future<Output = Result<Self::Tx<'_>, DriverError>> + Send;
}

/// An open transaction. Statements go through its [`Executable`] surface.
///
/// Once `commit` succeeds or `rollback` is called, further use is a programmer error and
/// implementations report it rather than touching the session.
pub trait TransactionHandle: Executable {
    #[allow(clippy::manual_async_fn)]
    fn commit(&mut self) -> impl Future<Output = Result<(), DriverError>> + Send;

    #[allow(clippy::manual_async_fn)]
    fn rollback(&mut self) -> impl Future<Output = Result<(), DriverError>> + Send;
}

/// An unopened transaction. Nothing reaches the database until [`Transaction::execute`].
pub struct Transaction<'c, C: Connection> {
    conn: &'c C,
    options: Options,
}

impl<'c, C: Connection> Transaction<'c, C> {
    pub(crate) fn new(conn: &'c C, options: Options) -> Self {
        Self { conn, options }
    }

    #[must_use]
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Replace the context used for every statement of the transaction.
    #[must_use]
    pub fn with_context(mut self, ctx: QueryContext) -> Self {
        self.options.context = ctx;
        self
    }

    /// Set `idle_in_transaction_session_timeout` for this transaction.
    #[must_use]
    pub fn with_transaction_timeout(mut self, timeout: Duration) -> Self {
        self.options.transaction_timeout_ms = millis(timeout);
        self
    }

    /// Set `statement_timeout` for this transaction.
    #[must_use]
    pub fn with_statement_timeout(mut self, timeout: Duration) -> Self {
        self.options.statement_timeout_ms = millis(timeout);
        self
    }

    /// Run `handler` inside a new transaction.
    ///
    /// The transaction is committed when the handler succeeds and rolled back otherwise. The
    /// handler's own error comes back unchanged; failures of the transaction itself are
    /// converted into `E` from [`PgMiddlewareError`]. Rollback failures are logged and never
    /// replace the error being returned.
    ///
    /// ```rust,no_run
    /// use pg_middleware::prelude::*;
    ///
    /// # async fn demo(db: &Db<PgConnection>) -> Result<(), PgMiddlewareError> {
    /// let moved = db
    ///     .tx([with_statement_timeout(std::time::Duration::from_secs(1))])
    ///     .execute(async |ex: &Executor<'_>| {
    ///         let n = ex.exec("DELETE FROM things WHERE id = $1", &[RowValues::Int(123)]).await?;
    ///         ex.exec("INSERT INTO trash (id) VALUES ($1)", &[RowValues::Int(123)]).await?;
    ///         Ok::<_, PgMiddlewareError>(n)
    ///     })
    ///     .await?;
    /// # let _ = moved;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    /// - `TransactionBegin` if the transaction cannot be opened; the handler is not run.
    /// - `TransactionConfig` if a timeout statement fails; the handler is not run.
    /// - `TransactionCommit` if the commit fails.
    /// - the handler's error if the handler fails.
    pub async fn execute<F, T, E>(&self, handler: F) -> Result<T, E>
    where
        F: AsyncFnOnce(&Executor<'_>) -> Result<T, E>,
        E: From<PgMiddlewareError>,
    {
        let ctx = &self.options.context;

        if let Some(ctx_err) = ctx.err() {
            return Err(begin_failed(ctx_err.into()).into());
        }
        // Not raced: a BEGIN abandoned in flight would leave the session inside a transaction.
        let mut tx = match self.conn.begin(ctx).await {
            Ok(tx) => tx,
            Err(source) => {
                return Err(begin_failed(PgMiddlewareError::execution(
                    "begin transaction",
                    source,
                ))
                .into());
            }
        };
        debug!("transaction started");

        if let Err(err) = self.configure(&tx).await {
            rollback_quietly(&mut tx, "timeout configuration failed").await;
            return Err(err.into());
        }

        let outcome = {
            let executor = Executor::new(&tx, self.options.clone());
            handler(&executor).await
        };

        match outcome {
            Ok(value) => match ctx.guard(tx.commit()).await {
                Ok(Ok(())) => {
                    debug!("transaction committed");
                    Ok(value)
                }
                Ok(Err(source)) => {
                    let err = PgMiddlewareError::execution("commit", source);
                    rollback_quietly(&mut tx, "commit failed").await;
                    Err(commit_failed(err).into())
                }
                Err(ctx_err) => {
                    rollback_quietly(&mut tx, "commit interrupted").await;
                    Err(commit_failed(ctx_err.into()).into())
                }
            },
            Err(err) => {
                debug!("transaction aborted: handler returned an error");
                rollback_quietly(&mut tx, "handler failed").await;
                Err(err)
            }
        }
    }

    /// Issue the `SET local` statements for every positive timeout, transaction timeout first.
    async fn configure(&self, tx: &C::Tx<'_>) -> Result<(), PgMiddlewareError> {
        let settings = [
            (
                "idle_in_transaction_session_timeout",
                TRANSACTION_TIMEOUT_SQL,
                self.options.transaction_timeout_ms,
            ),
            (
                "statement_timeout",
                STATEMENT_TIMEOUT_SQL,
                self.options.statement_timeout_ms,
            ),
        ];

        let executor = Executor::new(tx, self.options.clone());
        for (setting, sql, ms) in settings {
            if ms <= 0 {
                continue;
            }
            debug!(setting, ms, "configuring transaction timeout");
            executor
                .exec(sql, &[RowValues::Int(ms)])
                .await
                .map_err(|err| PgMiddlewareError::TransactionConfig {
                    setting,
                    source: Box::new(err),
                })?;
        }
        Ok(())
    }
}

fn begin_failed(err: PgMiddlewareError) -> PgMiddlewareError {
    PgMiddlewareError::TransactionBegin {
        source: Box::new(err),
    }
}

fn commit_failed(err: PgMiddlewareError) -> PgMiddlewareError {
    PgMiddlewareError::TransactionCommit {
        source: Box::new(err),
    }
}

/// Roll back without a context guard so cancelled transactions still get cleaned up.
/// A failure here is logged and dropped.
async fn rollback_quietly<T: TransactionHandle>(tx: &mut T, reason: &'static str) {
    match tx.rollback().await {
        Ok(()) => debug!(reason, "transaction rolled back"),
        Err(err) => warn!(reason, error = %err, "rollback failed"),
    }
}
