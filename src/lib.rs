//! Async convenience layer over a Postgres connection.
//!
//! [`Db`] hands out two things:
//! - an [`Executor`] from [`Db::query`] for one-off statements (`exec`, `get`, `select`);
//! - a [`Transaction`] from [`Db::tx`] that runs a handler inside `BEGIN` ... `COMMIT`,
//!   rolling back on any failure and optionally setting `idle_in_transaction_session_timeout`
//!   and `statement_timeout` for the transaction.
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use pg_middleware::prelude::*;
//!
//! struct Thing {
//!     id: i64,
//!     name: String,
//! }
//! pg_middleware::from_row!(Thing { id, name });
//!
//! # async fn demo() -> Result<(), PgMiddlewareError> {
//! let db = PostgresOptions {
//!     host: Some("localhost".into()),
//!     port: Some(5432),
//!     dbname: Some("testing".into()),
//!     user: Some("testuser".into()),
//!     ..Default::default()
//! }
//! .connect()
//! .await?;
//!
//! let things: Vec<Thing> = db.query([]).select("SELECT id, name FROM things", &[]).await?;
//!
//! db.tx([with_statement_timeout(Duration::from_secs(1))])
//!     .execute(async |ex: &Executor<'_>| {
//!         for thing in &things {
//!             ex.exec("DELETE FROM things WHERE id = $1", &[RowValues::Int(thing.id)]).await?;
//!         }
//!         Ok::<_, PgMiddlewareError>(())
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod context;
pub mod db;
pub mod error;
pub mod executor;
pub mod options;
pub mod prelude;
pub mod results;
pub mod scan;
pub mod transaction;
pub mod types;

#[cfg(feature = "postgres")]
pub mod postgres;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use context::QueryContext;
pub use db::Db;
pub use error::{ContextError, DriverError, PgMiddlewareError};
pub use executor::{Executable, Executor};
pub use options::{
    DbOption, Options, with_context, with_statement_timeout, with_transaction_timeout,
};
pub use results::{DbRow, ResultSet};
pub use scan::{FromRow, FromValue};
pub use transaction::{Connection, Transaction, TransactionHandle};
pub use types::RowValues;
