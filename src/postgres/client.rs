use async_trait::async_trait;
use tokio::sync::{Mutex, MutexGuard};
use tokio_postgres::Client;
use tracing::trace;

use super::params::Params;
use super::query::build_result_set;
use crate::context::QueryContext;
use crate::error::{DriverError, PgMiddlewareError};
use crate::executor::Executable;
use crate::results::ResultSet;
use crate::transaction::{Connection, TransactionHandle};
use crate::types::RowValues;

async fn client_execute(
    client: &Client,
    sql: &str,
    params: &[RowValues],
) -> Result<u64, DriverError> {
    let converted = Params::convert(params);
    Ok(client.execute(sql, converted.as_refs()).await?)
}

async fn client_query(
    client: &Client,
    sql: &str,
    params: &[RowValues],
) -> Result<ResultSet, DriverError> {
    let converted = Params::convert(params);
    let rows = client.query(sql, converted.as_refs()).await?;
    Ok(build_result_set(&rows)?)
}

/// One Postgres session shared by plain statements and transactions.
///
/// A session holds at most one transaction, so transactions take the session lock for their
/// whole life and plain statements take it per statement. A statement issued outside a
/// transaction therefore never lands inside someone else's.
pub struct PgConnection {
    client: Client,
    session: Mutex<()>,
}

impl PgConnection {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self {
            client,
            session: Mutex::new(()),
        }
    }

    /// The raw client. Statements issued on it skip the session lock.
    #[must_use]
    pub fn client(&self) -> &Client {
        &self.client
    }
}

impl From<Client> for PgConnection {
    fn from(client: Client) -> Self {
        Self::new(client)
    }
}

#[async_trait]
impl Executable for PgConnection {
    async fn execute(&self, sql: &str, params: &[RowValues]) -> Result<u64, DriverError> {
        let _session = self.session.lock().await;
        client_execute(&self.client, sql, params).await
    }

    async fn query(&self, sql: &str, params: &[RowValues]) -> Result<ResultSet, DriverError> {
        let _session = self.session.lock().await;
        client_query(&self.client, sql, params).await
    }
}

impl Connection for PgConnection {
    type Tx<'c> = PgTransaction<'c>;

    async fn begin(&self, ctx: &QueryContext) -> Result<PgTransaction<'_>, DriverError> {
        // Waiting for the session is safe to abandon; nothing has been sent yet.
        let session = ctx.guard(self.session.lock()).await?;
        trace!("session acquired");
        self.client.batch_execute("BEGIN").await?;
        Ok(PgTransaction {
            client: &self.client,
            _session: session,
            finished: false,
        })
    }
}

/// Transaction opened with an explicit `BEGIN` on a [`PgConnection`].
///
/// Holds the session lock until dropped. Dropping the handle without finishing it leaves the
/// session inside the transaction; [`crate::Transaction::execute`] always finishes it.
pub struct PgTransaction<'c> {
    client: &'c Client,
    _session: MutexGuard<'c, ()>,
    finished: bool,
}

impl PgTransaction<'_> {
    fn ensure_open(&self) -> Result<(), DriverError> {
        if self.finished {
            Err(Box::new(PgMiddlewareError::TransactionFinished))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl<'c> Executable for PgTransaction<'c> {
    async fn execute(&self, sql: &str, params: &[RowValues]) -> Result<u64, DriverError> {
        self.ensure_open()?;
        client_execute(self.client, sql, params).await
    }

    async fn query(&self, sql: &str, params: &[RowValues]) -> Result<ResultSet, DriverError> {
        self.ensure_open()?;
        client_query(self.client, sql, params).await
    }
}

impl<'c> TransactionHandle for PgTransaction<'c> {
    async fn commit(&mut self) -> Result<(), DriverError> {
        self.ensure_open()?;
        // A failed COMMIT leaves the handle open so the caller can still issue ROLLBACK.
        self.client.batch_execute("COMMIT").await?;
        self.finished = true;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), DriverError> {
        self.ensure_open()?;
        self.finished = true;
        self.client.batch_execute("ROLLBACK").await?;
        Ok(())
    }
}
