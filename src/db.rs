use crate::executor::Executor;
use crate::options::{DbOption, Options};
use crate::transaction::{Connection, Transaction};

/// Entry point: hands out executors and transactions over one shared connection.
///
/// ```rust,no_run
/// use pg_middleware::prelude::*;
///
/// # async fn demo(client: tokio_postgres::Client) -> Result<(), PgMiddlewareError> {
/// let db = Db::new(PgConnection::new(client));
///
/// let affected = db.query([]).exec("DELETE FROM things WHERE id = $1", &[RowValues::Int(123)]).await?;
/// let count: i64 = db.query([]).get("SELECT count(*) FROM things", &[]).await?;
/// # let _ = (affected, count);
/// # Ok(())
/// # }
/// ```
pub struct Db<C> {
    conn: C,
}

impl<C: Connection> Db<C> {
    pub fn new(conn: C) -> Self {
        Self { conn }
    }

    /// The underlying connection, for work outside this crate's API.
    pub fn conn(&self) -> &C {
        &self.conn
    }

    /// Give back the connection, e.g. to close it.
    pub fn into_inner(self) -> C {
        self.conn
    }

    /// Executor bound directly to the connection (no transaction).
    ///
    /// Timeout options are ignored here; only the context applies.
    pub fn query(&self, options: impl IntoIterator<Item = DbOption>) -> Executor<'_> {
        Executor::new(&self.conn, Options::from_setters(options))
    }

    /// Unopened transaction; see [`Transaction::execute`].
    pub fn tx(&self, options: impl IntoIterator<Item = DbOption>) -> Transaction<'_, C> {
        Transaction::new(&self.conn, Options::from_setters(options))
    }
}
