use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use pg_middleware::prelude::*;
use pg_middleware::test_utils::mock::{CallKind, Expectation, MockConnection, MockDriverError};

const DELETE_SQL: &str = "DELETE FROM things WHERE id = $1";
const TX_TIMEOUT_SQL: &str = "SET local idle_in_transaction_session_timeout = $1";
const STMT_TIMEOUT_SQL: &str = "SET local statement_timeout = $1";

fn i_am_error() -> MockDriverError {
    MockDriverError::new("i am error")
}

fn kinds(mock: &MockConnection) -> Vec<CallKind> {
    mock.calls().into_iter().map(|c| c.kind).collect()
}

/// Business error an application might return from its handler.
#[derive(Debug, thiserror::Error)]
enum AppError {
    #[error("thing {0} is locked")]
    Locked(i64),
    #[error(transparent)]
    Db(#[from] PgMiddlewareError),
}

#[tokio::test(flavor = "current_thread")]
async fn commits_when_handler_succeeds() -> Result<(), PgMiddlewareError> {
    let mock = MockConnection::new();
    mock.expect(Expectation::begin())
        .expect(
            Expectation::exec(DELETE_SQL)
                .params([RowValues::Int(123)])
                .rows_affected(1),
        )
        .expect(Expectation::commit());

    let db = Db::new(mock.clone());
    db.tx([])
        .execute(async |ex: &Executor<'_>| {
            ex.exec(DELETE_SQL, &[RowValues::Int(123)]).await?;
            Ok::<_, PgMiddlewareError>(())
        })
        .await?;

    mock.expectations_were_met().unwrap();
    assert!(!kinds(&mock).contains(&CallKind::Rollback));
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn handler_value_is_passed_through() -> Result<(), PgMiddlewareError> {
    let mock = MockConnection::new();
    mock.expect(Expectation::begin())
        .expect(Expectation::exec(DELETE_SQL).rows_affected(4))
        .expect(Expectation::commit());

    let n = Db::new(mock.clone())
        .tx([])
        .execute(async |ex: &Executor<'_>| {
            ex.exec(DELETE_SQL, &[RowValues::Int(1)]).await
        })
        .await?;

    assert_eq!(n, 4);
    mock.expectations_were_met().unwrap();
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn rolls_back_when_handler_fails() {
    let mock = MockConnection::new();
    mock.expect(Expectation::begin())
        .expect(
            Expectation::exec(DELETE_SQL)
                .params([RowValues::Int(123)])
                .error(i_am_error()),
        )
        .expect(Expectation::rollback());

    let err = Db::new(mock.clone())
        .tx([])
        .execute(async |ex: &Executor<'_>| {
            ex.exec(DELETE_SQL, &[RowValues::Int(123)]).await?;
            Ok::<_, PgMiddlewareError>(())
        })
        .await
        .unwrap_err();

    assert!(matches!(err, PgMiddlewareError::Execution { .. }));
    assert_eq!(err.find_cause::<MockDriverError>(), Some(&i_am_error()));
    mock.expectations_were_met().unwrap();
    assert!(!kinds(&mock).contains(&CallKind::Commit));
}

#[tokio::test(flavor = "current_thread")]
async fn business_error_keeps_its_identity() {
    let mock = MockConnection::new();
    mock.expect(Expectation::begin())
        .expect(Expectation::rollback());

    let res = Db::new(mock.clone())
        .tx([])
        .execute(async |_ex: &Executor<'_>| Err::<(), _>(AppError::Locked(7)))
        .await;

    assert!(matches!(res, Err(AppError::Locked(7))));
    mock.expectations_were_met().unwrap();
}

#[tokio::test(flavor = "current_thread")]
async fn business_error_wraps_transaction_failures() {
    let mock = MockConnection::new();
    mock.expect(Expectation::begin().error(i_am_error()));

    let res = Db::new(mock.clone())
        .tx([])
        .execute(async |_ex: &Executor<'_>| Ok::<_, AppError>(()))
        .await;

    assert!(matches!(
        res,
        Err(AppError::Db(PgMiddlewareError::TransactionBegin { .. }))
    ));
}

#[tokio::test(flavor = "current_thread")]
async fn statement_timeout_is_set_before_handler() -> Result<(), PgMiddlewareError> {
    let mock = MockConnection::new();
    mock.expect(Expectation::begin())
        .expect(Expectation::exec(STMT_TIMEOUT_SQL).params([RowValues::Int(1000)]))
        .expect(
            Expectation::exec(DELETE_SQL)
                .params([RowValues::Int(123)])
                .rows_affected(1),
        )
        .expect(Expectation::commit());

    Db::new(mock.clone())
        .tx([with_statement_timeout(Duration::from_secs(1))])
        .execute(async |ex: &Executor<'_>| {
            ex.exec(DELETE_SQL, &[RowValues::Int(123)]).await?;
            Ok::<_, PgMiddlewareError>(())
        })
        .await?;

    mock.expectations_were_met().unwrap();
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn transaction_timeout_is_set_before_handler() -> Result<(), PgMiddlewareError> {
    let mock = MockConnection::new();
    mock.expect(Expectation::begin())
        .expect(Expectation::exec(TX_TIMEOUT_SQL).params([RowValues::Int(1000)]))
        .expect(Expectation::exec(DELETE_SQL).params([RowValues::Int(123)]))
        .expect(Expectation::commit());

    Db::new(mock.clone())
        .tx([with_transaction_timeout(Duration::from_secs(1))])
        .execute(async |ex: &Executor<'_>| {
            ex.exec(DELETE_SQL, &[RowValues::Int(123)]).await?;
            Ok::<_, PgMiddlewareError>(())
        })
        .await?;

    mock.expectations_were_met().unwrap();
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn both_timeouts_transaction_first() -> Result<(), PgMiddlewareError> {
    let mock = MockConnection::new();
    mock.expect(Expectation::begin())
        .expect(Expectation::exec(TX_TIMEOUT_SQL).params([RowValues::Int(5000)]))
        .expect(Expectation::exec(STMT_TIMEOUT_SQL).params([RowValues::Int(250)]))
        .expect(Expectation::commit());

    // Option order does not change statement order.
    Db::new(mock.clone())
        .tx([
            with_statement_timeout(Duration::from_millis(250)),
            with_transaction_timeout(Duration::from_secs(5)),
        ])
        .execute(async |_ex: &Executor<'_>| Ok::<_, PgMiddlewareError>(()))
        .await?;

    mock.expectations_were_met().unwrap();
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn builder_methods_match_option_setters() -> Result<(), PgMiddlewareError> {
    let mock = MockConnection::new();
    mock.expect(Expectation::begin())
        .expect(Expectation::exec(TX_TIMEOUT_SQL).params([RowValues::Int(2000)]))
        .expect(Expectation::exec(STMT_TIMEOUT_SQL).params([RowValues::Int(1500)]))
        .expect(Expectation::commit());

    let db = Db::new(mock.clone());
    let tx = db
        .tx([])
        .with_context(QueryContext::background())
        .with_statement_timeout(Duration::from_millis(1500))
        .with_transaction_timeout(Duration::from_secs(2));
    assert_eq!(tx.options().statement_timeout_ms, 1500);
    assert_eq!(tx.options().transaction_timeout_ms, 2000);

    tx.execute(async |_ex: &Executor<'_>| Ok::<_, PgMiddlewareError>(()))
        .await?;

    mock.expectations_were_met().unwrap();
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn failed_timeout_config_skips_handler() {
    let mock = MockConnection::new();
    mock.expect(Expectation::begin())
        .expect(
            Expectation::exec(STMT_TIMEOUT_SQL)
                .params([RowValues::Int(1000)])
                .error(i_am_error()),
        )
        .expect(Expectation::rollback());

    let called = AtomicBool::new(false);
    let err = Db::new(mock.clone())
        .tx([with_statement_timeout(Duration::from_secs(1))])
        .execute(async |_ex: &Executor<'_>| {
            called.store(true, Ordering::SeqCst);
            Ok::<_, PgMiddlewareError>(())
        })
        .await
        .unwrap_err();

    assert!(!called.load(Ordering::SeqCst));
    assert!(matches!(
        err,
        PgMiddlewareError::TransactionConfig {
            setting: "statement_timeout",
            ..
        }
    ));
    assert!(err.find_cause::<MockDriverError>().is_some());
    mock.expectations_were_met().unwrap();
}

#[tokio::test(flavor = "current_thread")]
async fn failed_transaction_timeout_skips_statement_timeout_and_handler() {
    let mock = MockConnection::new();
    mock.expect(Expectation::begin())
        .expect(
            Expectation::exec(TX_TIMEOUT_SQL)
                .params([RowValues::Int(5000)])
                .error(i_am_error()),
        )
        .expect(Expectation::rollback());

    let called = AtomicBool::new(false);
    let err = Db::new(mock.clone())
        .tx([
            with_transaction_timeout(Duration::from_secs(5)),
            with_statement_timeout(Duration::from_secs(1)),
        ])
        .execute(async |_ex: &Executor<'_>| {
            called.store(true, Ordering::SeqCst);
            Ok::<_, PgMiddlewareError>(())
        })
        .await
        .unwrap_err();

    assert!(!called.load(Ordering::SeqCst));
    assert!(matches!(
        err,
        PgMiddlewareError::TransactionConfig {
            setting: "idle_in_transaction_session_timeout",
            ..
        }
    ));
    let calls = mock.calls();
    assert!(!calls.iter().any(|c| c.sql.as_deref() == Some(STMT_TIMEOUT_SQL)));
    assert_eq!(
        calls.iter().filter(|c| c.kind == CallKind::Rollback).count(),
        1
    );
    mock.expectations_were_met().unwrap();
}

#[tokio::test(flavor = "current_thread")]
async fn failed_begin_skips_handler_and_rollback() {
    let mock = MockConnection::new();
    mock.expect(Expectation::begin().error(i_am_error()));

    let called = AtomicBool::new(false);
    let err = Db::new(mock.clone())
        .tx([])
        .execute(async |_ex: &Executor<'_>| {
            called.store(true, Ordering::SeqCst);
            Ok::<_, PgMiddlewareError>(())
        })
        .await
        .unwrap_err();

    assert!(!called.load(Ordering::SeqCst));
    assert!(matches!(err, PgMiddlewareError::TransactionBegin { .. }));
    assert_eq!(err.find_cause::<MockDriverError>(), Some(&i_am_error()));
    assert_eq!(kinds(&mock), vec![CallKind::Begin]);
    mock.expectations_were_met().unwrap();
}

#[tokio::test(flavor = "current_thread")]
async fn failed_commit_attempts_rollback() {
    let mock = MockConnection::new();
    mock.expect(Expectation::begin())
        .expect(Expectation::commit().error(MockDriverError::new("commit refused")))
        .expect(Expectation::rollback().error(MockDriverError::new("connection gone")));

    let err = Db::new(mock.clone())
        .tx([])
        .execute(async |_ex: &Executor<'_>| Ok::<_, PgMiddlewareError>(()))
        .await
        .unwrap_err();

    assert!(matches!(err, PgMiddlewareError::TransactionCommit { .. }));
    assert_eq!(
        err.find_cause::<MockDriverError>(),
        Some(&MockDriverError::new("commit refused"))
    );
    mock.expectations_were_met().unwrap();
}

#[tokio::test(flavor = "current_thread")]
async fn failed_rollback_keeps_handler_error() {
    let mock = MockConnection::new();
    mock.expect(Expectation::begin())
        .expect(Expectation::rollback().error(MockDriverError::new("connection gone")));

    let res = Db::new(mock.clone())
        .tx([])
        .execute(async |_ex: &Executor<'_>| Err::<(), _>(AppError::Locked(42)))
        .await;

    assert!(matches!(res, Err(AppError::Locked(42))));
    mock.expectations_were_met().unwrap();
}

#[tokio::test(flavor = "current_thread")]
async fn handler_reads_inside_transaction() -> Result<(), PgMiddlewareError> {
    let mock = MockConnection::new();
    mock.expect(Expectation::begin())
        .expect(
            Expectation::query("SELECT count(*) FROM things")
                .rows(ResultSet::from_rows(&["count"], vec![vec![RowValues::Int(2)]])),
        )
        .expect(Expectation::exec("DELETE FROM things").rows_affected(2))
        .expect(Expectation::commit());

    let deleted = Db::new(mock.clone())
        .tx([])
        .execute(async |ex: &Executor<'_>| {
            let before: i64 = ex.get("SELECT count(*) FROM things", &[]).await?;
            let n = ex.exec("DELETE FROM things", &[]).await?;
            assert_eq!(u64::try_from(before).unwrap(), n);
            Ok::<_, PgMiddlewareError>(n)
        })
        .await?;

    assert_eq!(deleted, 2);
    mock.expectations_were_met().unwrap();
    Ok(())
}
