//! Scripted in-order mock driver.
//!
//! Each call made through the mock must match the next queued [`Expectation`]; a mismatch
//! fails the call and is reported by [`MockConnection::expectations_were_met`].
//!
//! ```rust
//! use pg_middleware::prelude::*;
//! use pg_middleware::test_utils::mock::{Expectation, MockConnection};
//!
//! # #[tokio::main(flavor = "current_thread")] async fn main() {
//! let mock = MockConnection::new();
//! mock.expect(
//!     Expectation::exec("DELETE FROM things WHERE id = $1")
//!         .params([RowValues::Int(123)])
//!         .rows_affected(1),
//! );
//!
//! let db = Db::new(mock.clone());
//! let n = db.query([]).exec("DELETE FROM things WHERE id = $1", &[RowValues::Int(123)]).await;
//! assert_eq!(n.unwrap(), 1);
//! mock.expectations_were_met().unwrap();
//! # }
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::context::QueryContext;
use crate::error::DriverError;
use crate::executor::Executable;
use crate::results::ResultSet;
use crate::transaction::{Connection, TransactionHandle};
use crate::types::RowValues;

/// Error handed back by the mock when scripted to fail, or when a call is unexpected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct MockDriverError(pub String);

impl MockDriverError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Kind of driver call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Begin,
    Exec,
    Query,
    Commit,
    Rollback,
}

/// A call the mock received, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub struct MockCall {
    pub kind: CallKind,
    pub sql: Option<String>,
    pub params: Vec<RowValues>,
}

impl fmt::Display for MockCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.sql {
            Some(sql) => write!(f, "{:?} {sql:?} {:?}", self.kind, self.params),
            None => write!(f, "{:?}", self.kind),
        }
    }
}

#[derive(Debug, Clone)]
enum Outcome {
    Done,
    RowsAffected(u64),
    Rows(ResultSet),
    Fail(MockDriverError),
}

/// One scripted call and its result.
#[derive(Debug, Clone)]
pub struct Expectation {
    kind: CallKind,
    sql: Option<String>,
    params: Option<Vec<RowValues>>,
    outcome: Outcome,
    delay: Option<Duration>,
}

impl Expectation {
    fn new(kind: CallKind, sql: Option<&str>, outcome: Outcome) -> Self {
        Self {
            kind,
            sql: sql.map(ToString::to_string),
            params: None,
            outcome,
            delay: None,
        }
    }

    #[must_use]
    pub fn begin() -> Self {
        Self::new(CallKind::Begin, None, Outcome::Done)
    }

    /// Statement expected through `execute`; reports 0 affected rows unless told otherwise.
    #[must_use]
    pub fn exec(sql: &str) -> Self {
        Self::new(CallKind::Exec, Some(sql), Outcome::RowsAffected(0))
    }

    /// Statement expected through `query`; returns no rows unless told otherwise.
    #[must_use]
    pub fn query(sql: &str) -> Self {
        Self::new(CallKind::Query, Some(sql), Outcome::Rows(ResultSet::default()))
    }

    #[must_use]
    pub fn commit() -> Self {
        Self::new(CallKind::Commit, None, Outcome::Done)
    }

    #[must_use]
    pub fn rollback() -> Self {
        Self::new(CallKind::Rollback, None, Outcome::Done)
    }

    /// Require exactly these parameters. Without this, any parameters match.
    #[must_use]
    pub fn params(mut self, params: impl IntoIterator<Item = RowValues>) -> Self {
        self.params = Some(params.into_iter().collect());
        self
    }

    #[must_use]
    pub fn rows_affected(mut self, n: u64) -> Self {
        self.outcome = Outcome::RowsAffected(n);
        self
    }

    #[must_use]
    pub fn rows(mut self, rows: ResultSet) -> Self {
        self.outcome = Outcome::Rows(rows);
        self
    }

    #[must_use]
    pub fn error(mut self, err: MockDriverError) -> Self {
        self.outcome = Outcome::Fail(err);
        self
    }

    /// Wait this long before answering.
    #[must_use]
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn matches(&self, call: &MockCall) -> bool {
        self.kind == call.kind
            && self.sql == call.sql
            && self.params.as_ref().is_none_or(|p| *p == call.params)
    }
}

#[derive(Debug, Default)]
struct MockState {
    expectations: VecDeque<Expectation>,
    calls: Vec<MockCall>,
    mismatches: Vec<String>,
}

/// Mock connection sharing one script with every transaction it opens. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MockConnection {
    state: Arc<Mutex<MockState>>,
}

impl MockConnection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the next expected call.
    pub fn expect(&self, expectation: Expectation) -> &Self {
        self.lock().expectations.push_back(expectation);
        self
    }

    /// Every call received so far, including unexpected ones.
    #[must_use]
    pub fn calls(&self) -> Vec<MockCall> {
        self.lock().calls.clone()
    }

    /// # Errors
    /// Describes unexpected calls and expectations that were never consumed.
    pub fn expectations_were_met(&self) -> Result<(), String> {
        let state = self.lock();
        let mut problems = state.mismatches.clone();
        problems.extend(
            state
                .expectations
                .iter()
                .map(|e| format!("expected {:?} {:?} was not called", e.kind, e.sql)),
        );
        if problems.is_empty() {
            Ok(())
        } else {
            Err(problems.join("; "))
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn call(&self, call: MockCall) -> Result<Outcome, DriverError> {
        let expectation = {
            let mut state = self.lock();
            state.calls.push(call.clone());
            let verdict = match state.expectations.front() {
                Some(next) if next.matches(&call) => Ok(()),
                Some(next) => Err(format!(
                    "unexpected call {call}, next expectation is {:?} {:?}",
                    next.kind, next.sql
                )),
                None => Err(format!("unexpected call {call}, no expectations left")),
            };
            match verdict {
                Ok(()) => state.expectations.pop_front(),
                Err(msg) => {
                    state.mismatches.push(msg.clone());
                    return Err(Box::new(MockDriverError(msg)));
                }
            }
        };

        let Some(expectation) = expectation else {
            return Err(Box::new(MockDriverError::new("expectation vanished")));
        };
        if let Some(delay) = expectation.delay {
            tokio::time::sleep(delay).await;
        }
        match expectation.outcome {
            Outcome::Fail(err) => Err(Box::new(err)),
            outcome => Ok(outcome),
        }
    }

    async fn call_execute(&self, sql: &str, params: &[RowValues]) -> Result<u64, DriverError> {
        let outcome = self
            .call(MockCall {
                kind: CallKind::Exec,
                sql: Some(sql.to_string()),
                params: params.to_vec(),
            })
            .await?;
        match outcome {
            Outcome::RowsAffected(n) => Ok(n),
            _ => Ok(0),
        }
    }

    async fn call_query(&self, sql: &str, params: &[RowValues]) -> Result<ResultSet, DriverError> {
        let outcome = self
            .call(MockCall {
                kind: CallKind::Query,
                sql: Some(sql.to_string()),
                params: params.to_vec(),
            })
            .await?;
        match outcome {
            Outcome::Rows(rows) => Ok(rows),
            _ => Ok(ResultSet::default()),
        }
    }

    async fn call_bare(&self, kind: CallKind) -> Result<(), DriverError> {
        self.call(MockCall {
            kind,
            sql: None,
            params: Vec::new(),
        })
        .await
        .map(|_| ())
    }
}

#[async_trait]
impl Executable for MockConnection {
    async fn execute(&self, sql: &str, params: &[RowValues]) -> Result<u64, DriverError> {
        self.call_execute(sql, params).await
    }

    async fn query(&self, sql: &str, params: &[RowValues]) -> Result<ResultSet, DriverError> {
        self.call_query(sql, params).await
    }
}

impl Connection for MockConnection {
    type Tx<'c> = MockTransaction;

    async fn begin(&self, _ctx: &QueryContext) -> Result<MockTransaction, DriverError> {
        self.call_bare(CallKind::Begin).await?;
        Ok(MockTransaction {
            conn: self.clone(),
            finished: false,
        })
    }
}

/// Transaction handed out by [`MockConnection`]. Refuses use after it finishes.
#[derive(Debug)]
pub struct MockTransaction {
    conn: MockConnection,
    finished: bool,
}

impl MockTransaction {
    fn ensure_open(&self) -> Result<(), DriverError> {
        if self.finished {
            Err(Box::new(crate::PgMiddlewareError::TransactionFinished))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Executable for MockTransaction {
    async fn execute(&self, sql: &str, params: &[RowValues]) -> Result<u64, DriverError> {
        self.ensure_open()?;
        self.conn.call_execute(sql, params).await
    }

    async fn query(&self, sql: &str, params: &[RowValues]) -> Result<ResultSet, DriverError> {
        self.ensure_open()?;
        self.conn.call_query(sql, params).await
    }
}

impl TransactionHandle for MockTransaction {
    async fn commit(&mut self) -> Result<(), DriverError> {
        self.ensure_open()?;
        self.conn.call_bare(CallKind::Commit).await?;
        self.finished = true;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), DriverError> {
        self.ensure_open()?;
        self.finished = true;
        self.conn.call_bare(CallKind::Rollback).await
    }
}
