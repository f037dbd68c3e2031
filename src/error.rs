use std::error::Error as StdError;

use thiserror::Error;

/// Error type produced by a driver behind [`crate::executor::Executable`].
pub type DriverError = Box<dyn StdError + Send + Sync + 'static>;

/// Raised when the [`crate::context::QueryContext`] bound to a call ends before the call does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ContextError {
    #[error("context cancelled")]
    Cancelled,

    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

#[derive(Debug, Error)]
pub enum PgMiddlewareError {
    /// A statement or query failed in the driver.
    #[error("{action}: {source}")]
    Execution {
        action: &'static str,
        #[source]
        source: DriverError,
    },

    #[error(transparent)]
    Context(#[from] ContextError),

    #[error("Scan error: {0}")]
    Scan(String),

    /// `get` expects exactly one row.
    #[error("expected exactly one row, found {found}")]
    RowCount { found: usize },

    #[error("begin transaction: {source}")]
    TransactionBegin {
        #[source]
        source: Box<PgMiddlewareError>,
    },

    #[error("set {setting}: {source}")]
    TransactionConfig {
        setting: &'static str,
        #[source]
        source: Box<PgMiddlewareError>,
    },

    #[error("commit transaction: {source}")]
    TransactionCommit {
        #[source]
        source: Box<PgMiddlewareError>,
    },

    /// A transaction handle was used after commit or rollback.
    #[error("transaction already finished")]
    TransactionFinished,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),
}

impl PgMiddlewareError {
    /// Walk the `source()` chain (starting at `self`) and return the first error of type `E`.
    ///
    /// This is how callers ask "is this my original error" after the core has wrapped it:
    /// ```rust
    /// use pg_middleware::{ContextError, PgMiddlewareError};
    ///
    /// let err = PgMiddlewareError::TransactionBegin {
    ///     source: Box::new(PgMiddlewareError::Context(ContextError::Cancelled)),
    /// };
    /// assert_eq!(err.find_cause::<ContextError>(), Some(&ContextError::Cancelled));
    /// ```
    #[must_use]
    pub fn find_cause<E: StdError + 'static>(&self) -> Option<&E> {
        let mut current: Option<&(dyn StdError + 'static)> = Some(self);
        while let Some(err) = current {
            if let Some(found) = err.downcast_ref::<E>() {
                return Some(found);
            }
            // Boxed phase sources and transparent context errors hide their concrete type.
            let inner = err
                .downcast_ref::<PgMiddlewareError>()
                .or_else(|| err.downcast_ref::<Box<PgMiddlewareError>>().map(|b| &**b));
            if let Some(inner) = inner {
                if let Some(found) = (inner as &(dyn StdError + 'static)).downcast_ref::<E>() {
                    return Some(found);
                }
                if let PgMiddlewareError::Context(ctx) = inner
                    && let Some(found) = (ctx as &(dyn StdError + 'static)).downcast_ref::<E>()
                {
                    return Some(found);
                }
            }
            current = err.source();
        }
        None
    }

    /// True when the failure was caused by cancellation or an expired deadline.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.find_cause::<ContextError>().is_some()
    }

    pub(crate) fn execution(action: &'static str, source: DriverError) -> Self {
        PgMiddlewareError::Execution { action, source }
    }
}
