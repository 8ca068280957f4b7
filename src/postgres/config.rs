use std::future::Future;

use bb8::{ManageConnection, Pool};
#[cfg(feature = "tls")]
use openssl::ssl::{SslConnector, SslMethod, SslVerifyMode};
#[cfg(feature = "tls")]
use postgres_openssl::MakeTlsConnector;
use tokio_postgres::{Client, NoTls};

use crate::config::SslMode;
use crate::error::SqlEzError;

/// Transport used for new connections.
#[derive(Clone)]
pub enum PgTls {
    Disabled,
    #[cfg(feature = "tls")]
    OpenSsl(MakeTlsConnector),
}

impl PgTls {
    /// Connector for `mode`, trusting the PEM roots in `root_cert` when given.
    ///
    /// # Errors
    /// Returns `SqlEzError::ConfigError` when the root certificate cannot be loaded, or
    /// when `mode` demands TLS and the crate was built without the `tls` feature.
    #[cfg(feature = "tls")]
    pub fn new(mode: SslMode, root_cert: Option<&str>) -> Result<Self, SqlEzError> {
        if mode == SslMode::Disable {
            return Ok(Self::Disabled);
        }
        let tls_error = |e: openssl::error::ErrorStack| {
            SqlEzError::ConfigError(format!("tls setup error ({}): {e}", mode.as_str()))
        };
        let mut builder = SslConnector::builder(SslMethod::tls()).map_err(tls_error)?;
        if let Some(path) = root_cert {
            builder.set_ca_file(path).map_err(tls_error)?;
        }
        if mode == SslMode::VerifyFull {
            builder.set_verify(SslVerifyMode::PEER);
        } else {
            builder.set_verify(SslVerifyMode::NONE);
        }
        let mut connector = MakeTlsConnector::new(builder.build());
        if mode != SslMode::VerifyFull {
            connector.set_callback(|config, _domain| {
                config.set_verify_hostname(false);
                Ok(())
            });
        }
        Ok(Self::OpenSsl(connector))
    }

    /// Connector for `mode`. Without the `tls` feature only plain connections are possible.
    ///
    /// # Errors
    /// Returns `SqlEzError::ConfigError` for `require` and `verify-full`.
    #[cfg(not(feature = "tls"))]
    pub fn new(mode: SslMode, _root_cert: Option<&str>) -> Result<Self, SqlEzError> {
        match mode {
            SslMode::Disable | SslMode::Prefer => Ok(Self::Disabled),
            SslMode::Require | SslMode::VerifyFull => Err(SqlEzError::ConfigError(format!(
                "sslmode {} needs sql-ez built with the `tls` feature",
                mode.as_str()
            ))),
        }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::Disabled)
    }
}

impl std::fmt::Debug for PgTls {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(if self.is_enabled() { "PgTls::OpenSsl" } else { "PgTls::Disabled" })
    }
}

/// bb8 manager for Postgres clients.
pub struct PgManager {
    config: tokio_postgres::Config,
    tls: PgTls,
}

impl PgManager {
    #[must_use]
    pub fn new(config: tokio_postgres::Config) -> Self {
        Self::with_tls(config, PgTls::Disabled)
    }

    #[must_use]
    pub fn with_tls(config: tokio_postgres::Config, tls: PgTls) -> Self {
        Self { config, tls }
    }

    /// Build a pool from this manager, capped at `pool_size` connections when given.
    ///
    /// # Errors
    /// Returns `SqlEzError::ConnectionError` if the pool cannot be created.
    pub async fn build_pool(self, pool_size: Option<u32>) -> Result<Pool<PgManager>, SqlEzError> {
        let mut builder = Pool::builder();
        if let Some(size) = pool_size {
            builder = builder.max_size(size);
        }
        builder
            .build(self)
            .await
            .map_err(|e| SqlEzError::ConnectionError(format!("postgres pool error: {e}")))
    }
}

impl ManageConnection for PgManager {
    type Connection = Client;
    type Error = tokio_postgres::Error;

    #[allow(clippy::manual_async_fn)]
    fn connect(&self) -> impl Future<Output = Result<Self::Connection, Self::Error>> + Send {
        let cfg = self.config.clone();
        let tls = self.tls.clone();
        async move {
            tracing::debug!(
                hosts = ?cfg.get_hosts(),
                dbname = ?cfg.get_dbname(),
                user = ?cfg.get_user(),
                tls = tls.is_enabled(),
                "postgres connect start"
            );
            let client = match tls {
                PgTls::Disabled => {
                    let (client, connection) = cfg.connect(NoTls).await?;
                    drive_connection(connection);
                    client
                }
                #[cfg(feature = "tls")]
                PgTls::OpenSsl(connector) => {
                    let (client, connection) = cfg.connect(connector).await?;
                    drive_connection(connection);
                    client
                }
            };
            Ok(client)
        }
    }

    #[allow(clippy::manual_async_fn)]
    fn is_valid(
        &self,
        conn: &mut Self::Connection,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send {
        async move { conn.simple_query("SELECT 1").await.map(|_| ()) }
    }

    fn has_broken(&self, conn: &mut Self::Connection) -> bool {
        conn.is_closed()
    }
}

/// Run the connection half on its own task until the client goes away.
fn drive_connection<C>(connection: C)
where
    C: Future<Output = Result<(), tokio_postgres::Error>> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = connection.await
            && !e.is_closed()
        {
            tracing::error!(error = %e, "postgres connection closed with error");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disable_never_builds_a_connector() {
        let tls = PgTls::new(SslMode::Disable, None).unwrap();
        assert!(!tls.is_enabled());
    }

    #[cfg(not(feature = "tls"))]
    #[test]
    fn required_tls_is_rejected_without_the_feature() {
        assert!(!PgTls::new(SslMode::Prefer, None).unwrap().is_enabled());
        let err = PgTls::new(SslMode::Require, None).unwrap_err();
        assert!(matches!(err, SqlEzError::ConfigError(m) if m.contains("require")));
    }

    #[cfg(feature = "tls")]
    #[test]
    fn tls_modes_build_an_openssl_connector() {
        assert!(PgTls::new(SslMode::Require, None).unwrap().is_enabled());
        assert!(PgTls::new(SslMode::VerifyFull, None).unwrap().is_enabled());
    }

    #[cfg(feature = "tls")]
    #[test]
    fn missing_root_cert_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.pem");
        let err = PgTls::new(SslMode::VerifyFull, missing.to_str()).unwrap_err();
        assert!(matches!(err, SqlEzError::ConfigError(_)));
    }
}
