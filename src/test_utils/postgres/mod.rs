/// `PostgreSQL` embedded database functionality
pub mod embedded;

pub use embedded::{EmbeddedPostgres, setup_postgres_embedded, stop_postgres_embedded};
