//! Connection settings for the supported backends.
//!
//! Settings can come from serde (any format), from code, or from the standard
//! libpq environment variables via [`ConnectionConfig::from_env`].

use clap::ValueEnum;
use serde::Deserialize;

use crate::error::SqlEzError;

/// Environment variables read by [`ConnectionConfig::from_env`], in reporting order.
pub const PG_ENV_VARS: [&str; 5] = ["PGHOST", "PGUSER", "PGDATABASE", "PGPASSWORD", "PGPORT"];

/// Which backend to connect to, and how.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum ConnectionConfig {
    Postgres(PostgresOptions),
    Sqlite(SqliteOptions),
}

impl ConnectionConfig {
    /// Postgres settings from `PGHOST`, `PGUSER`, `PGDATABASE`, `PGPASSWORD` and `PGPORT`,
    /// plus `PGSSLMODE` when it is set.
    ///
    /// # Errors
    /// Returns `SqlEzError::ConfigError` naming every variable when any of them is unset,
    /// or when `PGPORT` is not a port number.
    pub fn from_env() -> Result<Self, SqlEzError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, SqlEzError> {
        let [Some(host), Some(user), Some(dbname), Some(password), Some(port)] =
            PG_ENV_VARS.map(|name| lookup(name))
        else {
            return Err(SqlEzError::ConfigError(format!(
                "{} environment variables are all required",
                PG_ENV_VARS.join(", ")
            )));
        };
        let ssl = lookup("PGSSLMODE")
            .map(|mode| {
                SslMode::from_str(&mode, true)
                    .map_err(|e| SqlEzError::ConfigError(format!("PGSSLMODE: {e}")))
            })
            .transpose()?;
        let port = port
            .parse::<u16>()
            .map_err(|e| SqlEzError::ConfigError(format!("PGPORT is not a valid port: {e}")))?;

        Ok(ConnectionConfig::Postgres(PostgresOptions {
            host: Some(host),
            port: Some(port),
            user: Some(user),
            password: Some(password),
            dbname: Some(dbname),
            ssl,
            ..PostgresOptions::default()
        }))
    }

    #[must_use]
    pub fn pool_size(&self) -> Option<u32> {
        match self {
            ConnectionConfig::Postgres(opts) => opts.pool_size,
            ConnectionConfig::Sqlite(opts) => opts.pool_size,
        }
    }
}

/// How a Postgres connection negotiates TLS.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SslMode {
    /// Plain TCP only
    #[default]
    Disable,
    /// TLS when the server offers it, plain otherwise
    Prefer,
    /// TLS without certificate checks
    Require,
    /// TLS with the certificate chain and host name checked
    VerifyFull,
}

impl SslMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SslMode::Disable => "disable",
            SslMode::Prefer => "prefer",
            SslMode::Require => "require",
            SslMode::VerifyFull => "verify-full",
        }
    }
}

/// Postgres settings: either a connection URL, or the discrete fields.
///
/// `ssl` overrides any `sslmode` in the URL; `ssl_root_cert` is a PEM file of trusted roots.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PostgresOptions {
    pub url: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub dbname: Option<String>,
    pub pool_size: Option<u32>,
    pub ssl: Option<SslMode>,
    pub ssl_root_cert: Option<String>,
}

impl PostgresOptions {
    #[must_use]
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_pool_size(mut self, pool_size: u32) -> Self {
        self.pool_size = Some(pool_size);
        self
    }

    #[must_use]
    pub fn with_ssl(mut self, ssl: SslMode) -> Self {
        self.ssl = Some(ssl);
        self
    }

    /// The TLS mode to connect with: `ssl` when set, else `require` if the URL asks for it.
    #[cfg(feature = "postgres")]
    #[must_use]
    pub fn ssl_mode(&self, config: &tokio_postgres::Config) -> SslMode {
        self.ssl.unwrap_or(match config.get_ssl_mode() {
            tokio_postgres::config::SslMode::Require => SslMode::Require,
            _ => SslMode::Disable,
        })
    }

    /// Build the driver config, rejecting incomplete settings.
    ///
    /// # Errors
    /// Returns `SqlEzError::ConfigError` for an unparsable URL or a missing field.
    #[cfg(feature = "postgres")]
    pub fn to_pg_config(&self) -> Result<tokio_postgres::Config, SqlEzError> {
        let mut config = match &self.url {
            Some(url) => url
                .parse::<tokio_postgres::Config>()
                .map_err(|e| SqlEzError::ConfigError(format!("invalid postgres url: {e}")))?,
            None => self.config_from_fields()?,
        };
        if let Some(ssl) = self.ssl {
            config.ssl_mode(match ssl {
                SslMode::Disable => tokio_postgres::config::SslMode::Disable,
                SslMode::Prefer => tokio_postgres::config::SslMode::Prefer,
                SslMode::Require | SslMode::VerifyFull => tokio_postgres::config::SslMode::Require,
            });
        }
        Ok(config)
    }

    #[cfg(feature = "postgres")]
    fn config_from_fields(&self) -> Result<tokio_postgres::Config, SqlEzError> {
        let dbname = required(self.dbname.as_deref(), "dbname")?;
        let host = required(self.host.as_deref(), "host")?;
        let port = self
            .port
            .ok_or_else(|| SqlEzError::ConfigError("port is required".to_string()))?;
        let user = required(self.user.as_deref(), "user")?;
        let password = required(self.password.as_deref(), "password")?;

        let mut config = tokio_postgres::Config::new();
        config
            .dbname(dbname)
            .host(host)
            .port(port)
            .user(user)
            .password(password);
        Ok(config)
    }
}

#[cfg(feature = "postgres")]
fn required<'a>(value: Option<&'a str>, field: &str) -> Result<&'a str, SqlEzError> {
    value.ok_or_else(|| SqlEzError::ConfigError(format!("{field} is required")))
}

/// `SQLite` settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SqliteOptions {
    pub db_path: String,
    #[serde(default)]
    pub pool_size: Option<u32>,
}

impl SqliteOptions {
    #[must_use]
    pub fn new(db_path: impl Into<String>) -> Self {
        Self {
            db_path: db_path.into(),
            pool_size: None,
        }
    }

    #[must_use]
    pub fn with_pool_size(mut self, pool_size: u32) -> Self {
        self.pool_size = Some(pool_size);
        self
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn env_requires_all_five_variables() {
        let err = ConnectionConfig::from_lookup(lookup(&[
            ("PGHOST", "localhost"),
            ("PGUSER", "app"),
            ("PGDATABASE", "app"),
            ("PGPORT", "5432"),
        ]))
        .unwrap_err();
        let message = err.to_string();
        for name in PG_ENV_VARS {
            assert!(message.contains(name), "{message}");
        }
    }

    #[test]
    fn env_builds_postgres_options() {
        let config = ConnectionConfig::from_lookup(lookup(&[
            ("PGHOST", "db.internal"),
            ("PGUSER", "app"),
            ("PGDATABASE", "inventory"),
            ("PGPASSWORD", "secret"),
            ("PGPORT", "6543"),
        ]))
        .unwrap();
        let ConnectionConfig::Postgres(opts) = config else {
            panic!("expected postgres options");
        };
        assert_eq!(opts.host.as_deref(), Some("db.internal"));
        assert_eq!(opts.port, Some(6543));
        assert_eq!(opts.dbname.as_deref(), Some("inventory"));
    }

    #[test]
    fn env_rejects_bad_port() {
        let err = ConnectionConfig::from_lookup(lookup(&[
            ("PGHOST", "h"),
            ("PGUSER", "u"),
            ("PGDATABASE", "d"),
            ("PGPASSWORD", "p"),
            ("PGPORT", "not-a-port"),
        ]))
        .unwrap_err();
        assert!(matches!(err, SqlEzError::ConfigError(m) if m.contains("PGPORT")));
    }

    #[test]
    fn deserializes_tagged_backend() {
        let config: ConnectionConfig =
            serde_json::from_str(r#"{"backend":"sqlite","db_path":"/tmp/app.db","pool_size":2}"#)
                .unwrap();
        assert_eq!(
            config,
            ConnectionConfig::Sqlite(SqliteOptions::new("/tmp/app.db").with_pool_size(2))
        );
        assert_eq!(config.pool_size(), Some(2));
    }

    #[cfg(feature = "postgres")]
    #[test]
    fn missing_field_is_named() {
        let opts = PostgresOptions {
            host: Some("localhost".into()),
            port: Some(5432),
            dbname: Some("app".into()),
            password: Some("pw".into()),
            ..PostgresOptions::default()
        };
        let err = opts.to_pg_config().unwrap_err();
        assert!(matches!(err, SqlEzError::ConfigError(m) if m == "user is required"));
    }

    #[cfg(feature = "postgres")]
    #[test]
    fn url_takes_precedence() {
        let config = PostgresOptions::from_url("postgres://app:pw@localhost:5433/app")
            .to_pg_config()
            .unwrap();
        assert_eq!(config.get_ports(), &[5433]);
        assert_eq!(config.get_dbname(), Some("app"));
    }

    #[test]
    fn env_reads_optional_sslmode() {
        let base = [
            ("PGHOST", "h"),
            ("PGUSER", "u"),
            ("PGDATABASE", "d"),
            ("PGPASSWORD", "p"),
            ("PGPORT", "5432"),
        ];
        let ConnectionConfig::Postgres(opts) = ConnectionConfig::from_lookup(lookup(&base)).unwrap()
        else {
            panic!("expected postgres options");
        };
        assert_eq!(opts.ssl, None);

        let mut with_ssl = base.to_vec();
        with_ssl.push(("PGSSLMODE", "verify-full"));
        let ConnectionConfig::Postgres(opts) =
            ConnectionConfig::from_lookup(lookup(&with_ssl)).unwrap()
        else {
            panic!("expected postgres options");
        };
        assert_eq!(opts.ssl, Some(SslMode::VerifyFull));

        with_ssl.pop();
        with_ssl.push(("PGSSLMODE", "sometimes"));
        let err = ConnectionConfig::from_lookup(lookup(&with_ssl)).unwrap_err();
        assert!(matches!(err, SqlEzError::ConfigError(m) if m.contains("PGSSLMODE")));
    }

    #[test]
    fn deserializes_ssl_settings() {
        let config: ConnectionConfig = serde_json::from_str(
            r#"{"backend":"postgres","url":"postgres://db/app","ssl":"verify-full","ssl_root_cert":"/etc/ssl/root.pem"}"#,
        )
        .unwrap();
        let ConnectionConfig::Postgres(opts) = config else {
            panic!("expected postgres options");
        };
        assert_eq!(opts.ssl, Some(SslMode::VerifyFull));
        assert_eq!(opts.ssl_root_cert.as_deref(), Some("/etc/ssl/root.pem"));
    }

    #[cfg(feature = "postgres")]
    #[test]
    fn sslmode_comes_from_url_unless_overridden() {
        let opts = PostgresOptions::from_url("postgres://app:pw@db/app?sslmode=require");
        let config = opts.to_pg_config().unwrap();
        assert_eq!(opts.ssl_mode(&config), SslMode::Require);

        let plain = PostgresOptions::from_url("postgres://app:pw@db/app");
        assert_eq!(plain.ssl_mode(&plain.to_pg_config().unwrap()), SslMode::Disable);

        let overridden = opts.with_ssl(SslMode::Disable);
        let config = overridden.to_pg_config().unwrap();
        assert_eq!(overridden.ssl_mode(&config), SslMode::Disable);
        assert_eq!(
            config.get_ssl_mode(),
            tokio_postgres::config::SslMode::Disable
        );
    }
}
