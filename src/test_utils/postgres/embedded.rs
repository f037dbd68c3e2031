use std::sync::LazyLock;

use postgresql_embedded::PostgreSQL;
use tokio::runtime::Runtime;

use crate::postgres::PostgresOptions;

/// Runtime that owns the embedded server's process handling across test runtimes.
static SHARED_RUNTIME: LazyLock<Runtime> =
    LazyLock::new(|| Runtime::new().expect("Failed to create tokio runtime for test utilities"));

/// A running embedded `PostgreSQL` instance.
pub struct EmbeddedPostgres {
    pub postgresql: PostgreSQL,
    pub port: u16,
    pub database_url: String,
    /// Options that connect to the test database with the embedded credentials.
    pub options: PostgresOptions,
}

/// Start an embedded `PostgreSQL` and create the database `dbname`.
///
/// # Errors
/// Returns an error if the server cannot be set up or started, the database cannot be
/// created, or the post-start connectivity check fails.
pub fn setup_postgres_embedded(
    dbname: &str,
) -> Result<EmbeddedPostgres, Box<dyn std::error::Error>> {
    SHARED_RUNTIME.block_on(async {
        let mut postgresql = PostgreSQL::default();
        postgresql.setup().await?;
        postgresql.start().await?;
        postgresql.create_database(dbname).await?;

        let settings = postgresql.settings();
        let port = settings.port;
        let options = PostgresOptions {
            host: Some(settings.host.clone()),
            port: Some(port),
            dbname: Some(dbname.to_string()),
            user: Some(settings.username.clone()),
            password: Some(settings.password.clone()),
            connect_timeout_secs: Some(10),
        };
        let database_url = format!(
            "postgres://{}:{}@{}:{port}/{dbname}",
            settings.username, settings.password, settings.host
        );

        // Quick connectivity check
        let db = options.connect().await?;
        db.conn().client().batch_execute("SELECT 1").await?;

        Ok(EmbeddedPostgres {
            postgresql,
            port,
            database_url,
            options,
        })
    })
}

/// Stop a previously started embedded `PostgreSQL` instance.
pub fn stop_postgres_embedded(postgres: EmbeddedPostgres) {
    let EmbeddedPostgres { postgresql, .. } = postgres;
    SHARED_RUNTIME.block_on(async move {
        let _ = postgresql.stop().await;
    });
}
