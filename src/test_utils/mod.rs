//! Test support: a scripted mock driver and, with `test-utils-postgres`, an embedded
//! PostgreSQL server.

pub mod mock;

/// Embedded `PostgreSQL` for integration tests
#[cfg(feature = "test-utils-postgres")]
pub mod postgres;
