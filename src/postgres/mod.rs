// PostgreSQL binding over tokio-postgres.
//
// - params: RowValues -> ToSql
// - query: row extraction into ResultSet
// - client: PgConnection session, explicit BEGIN/COMMIT/ROLLBACK transactions
// - config: connection options and connect()

pub mod client;
pub mod config;
pub mod params;
pub mod query;

pub use client::{PgConnection, PgTransaction};
pub use config::PostgresOptions;
pub use params::Params;
pub use query::{build_result_set, extract_value};
