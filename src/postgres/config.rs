use std::time::Duration;

use serde::Deserialize;
use tokio_postgres::NoTls;
use tracing::{debug, error};

use super::client::PgConnection;
use crate::db::Db;
use crate::error::PgMiddlewareError;

/// Connection settings for a single Postgres session.
///
/// Deserialisable, so it can come straight out of an application's config file:
/// ```rust
/// use pg_middleware::postgres::PostgresOptions;
///
/// let opts: PostgresOptions = serde_json::from_str(
///     r#"{"host": "localhost", "port": 5432, "dbname": "testing", "user": "testuser", "password": "secret"}"#,
/// ).unwrap();
/// assert!(opts.validate().is_ok());
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostgresOptions {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub dbname: Option<String>,
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Seconds to wait for the TCP connection.
    #[serde(default)]
    pub connect_timeout_secs: Option<u64>,
}

impl PostgresOptions {
    /// Check that every required field is present.
    ///
    /// # Errors
    /// Returns `PgMiddlewareError::ConfigError` naming the first missing field.
    pub fn validate(&self) -> Result<(), PgMiddlewareError> {
        let required = [
            ("dbname", self.dbname.is_some()),
            ("host", self.host.is_some()),
            ("port", self.port.is_some()),
            ("user", self.user.is_some()),
        ];
        match required.iter().find(|(_, present)| !present) {
            Some((field, _)) => Err(PgMiddlewareError::ConfigError(format!(
                "{field} is required"
            ))),
            None => Ok(()),
        }
    }

    /// Build the tokio-postgres configuration.
    ///
    /// # Errors
    /// Returns `PgMiddlewareError::ConfigError` if a required field is missing.
    pub fn to_tokio_config(&self) -> Result<tokio_postgres::Config, PgMiddlewareError> {
        self.validate()?;

        let mut cfg = tokio_postgres::Config::new();
        if let Some(host) = &self.host {
            cfg.host(host);
        }
        if let Some(port) = self.port {
            cfg.port(port);
        }
        if let Some(dbname) = &self.dbname {
            cfg.dbname(dbname);
        }
        if let Some(user) = &self.user {
            cfg.user(user);
        }
        if let Some(password) = &self.password {
            cfg.password(password);
        }
        if let Some(secs) = self.connect_timeout_secs {
            cfg.connect_timeout(Duration::from_secs(secs));
        }
        Ok(cfg)
    }

    /// Open a connection and wrap it in a [`Db`].
    ///
    /// The connection task is spawned on the current tokio runtime; if it ends with an error
    /// the error is logged.
    ///
    /// # Errors
    /// Returns `PgMiddlewareError::ConfigError` for incomplete options or
    /// `PgMiddlewareError::ConnectionError` if connecting fails.
    pub async fn connect(&self) -> Result<Db<PgConnection>, PgMiddlewareError> {
        let cfg = self.to_tokio_config()?;
        debug!(
            hosts = ?cfg.get_hosts(),
            dbname = ?cfg.get_dbname(),
            user = ?cfg.get_user(),
            "postgres connect start"
        );

        let (client, connection) = cfg.connect(NoTls).await.map_err(|e| {
            PgMiddlewareError::ConnectionError(format!("postgres connect error: {e}"))
        })?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!(error = %e, "postgres connection closed with error");
            }
        });
        debug!("postgres connection established");

        Ok(Db::new(PgConnection::new(client)))
    }
}
