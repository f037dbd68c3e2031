//! Convenient imports for common functionality.

pub use crate::context::QueryContext;
pub use crate::db::Db;
pub use crate::error::{ContextError, PgMiddlewareError};
pub use crate::executor::{Executable, Executor};
pub use crate::options::{
    DbOption, Options, with_context, with_statement_timeout, with_transaction_timeout,
};
pub use crate::results::{DbRow, ResultSet};
pub use crate::scan::{FromRow, FromValue};
pub use crate::transaction::{Connection, Transaction, TransactionHandle};
pub use crate::types::RowValues;

#[cfg(feature = "postgres")]
pub use crate::postgres::{PgConnection, PgTransaction, PostgresOptions};
