//! Per-call configuration for queries and transactions.

use std::time::Duration;

use crate::context::QueryContext;

/// Configuration captured when [`crate::Db::query`] or [`crate::Db::tx`] is called.
///
/// A timeout of `0` means the timeout is not configured. Timeouts only apply to
/// transactions; plain queries ignore them.
#[derive(Debug, Clone, Default)]
pub struct Options {
    pub context: QueryContext,
    /// `idle_in_transaction_session_timeout`, in milliseconds.
    pub transaction_timeout_ms: i64,
    /// `statement_timeout`, in milliseconds.
    pub statement_timeout_ms: i64,
}

impl Options {
    /// Apply `setters` left to right over the default options.
    ///
    /// ```rust
    /// use std::time::Duration;
    /// use pg_middleware::{Options, with_statement_timeout};
    ///
    /// let opts = Options::from_setters([with_statement_timeout(Duration::from_secs(1))]);
    /// assert_eq!(opts.statement_timeout_ms, 1000);
    /// assert_eq!(opts.transaction_timeout_ms, 0);
    /// ```
    #[must_use]
    pub fn from_setters(setters: impl IntoIterator<Item = DbOption>) -> Self {
        let mut options = Options::default();
        for setter in setters {
            setter.apply(&mut options);
        }
        options
    }
}

/// One option setter. Each variant touches exactly one field of [`Options`].
#[derive(Debug, Clone)]
pub enum DbOption {
    Context(QueryContext),
    TransactionTimeout(Duration),
    StatementTimeout(Duration),
}

impl DbOption {
    pub fn apply(self, options: &mut Options) {
        match self {
            DbOption::Context(ctx) => options.context = ctx,
            DbOption::TransactionTimeout(d) => options.transaction_timeout_ms = millis(d),
            DbOption::StatementTimeout(d) => options.statement_timeout_ms = millis(d),
        }
    }
}

/// Set the cancellation/deadline context used for every statement.
#[must_use]
pub fn with_context(ctx: QueryContext) -> DbOption {
    DbOption::Context(ctx)
}

/// Set the idle-in-transaction timeout (ignored by plain queries).
#[must_use]
pub fn with_transaction_timeout(timeout: Duration) -> DbOption {
    DbOption::TransactionTimeout(timeout)
}

/// Set the per-statement timeout inside a transaction (ignored by plain queries).
#[must_use]
pub fn with_statement_timeout(timeout: Duration) -> DbOption {
    DbOption::StatementTimeout(timeout)
}

pub(crate) fn millis(d: Duration) -> i64 {
    i64::try_from(d.as_millis()).unwrap_or(i64::MAX)
}
