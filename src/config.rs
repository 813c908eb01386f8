use sqlx::postgres::PgConnectOptions;
use std::{env, fmt, time::Duration};

use crate::error::{Error, Result};

pub const DEFAULT_RAW_DIR: &str = "data/row";
pub const DEFAULT_CLEAN_DIR: &str = "data/clean";
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Credentials for the target database.
#[derive(Clone, PartialEq, Eq)]
pub struct DbConfig {
    pub name: String,
    pub user: String,
    pub password: String,
    pub host: String,
    pub port: u16,
    pub connect_timeout: Duration,
}

impl DbConfig {
    /// Read `DB_NAME`, `DB_USER`, `DB_PASSWORD`, `DB_HOST` and `DB_PORT`.
    /// `DB_CONNECT_TIMEOUT_SECS` is optional.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key).ok_or_else(|| Error::Config(format!("{} is not set", key)))
        };

        let port = required("DB_PORT")?;
        let port = port
            .trim()
            .parse::<u16>()
            .map_err(|e| Error::Config(format!("DB_PORT {:?} is not a port: {}", port, e)))?;

        let connect_timeout = match lookup("DB_CONNECT_TIMEOUT_SECS") {
            Some(secs) => secs
                .trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|e| {
                    Error::Config(format!("DB_CONNECT_TIMEOUT_SECS {:?}: {}", secs, e))
                })?,
            None => DEFAULT_CONNECT_TIMEOUT,
        };

        Ok(Self {
            name: required("DB_NAME")?,
            user: required("DB_USER")?,
            password: required("DB_PASSWORD")?,
            host: required("DB_HOST")?,
            port,
            connect_timeout,
        })
    }

    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.name)
            .username(&self.user)
            .password(&self.password)
    }
}

impl fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbConfig")
            .field("name", &self.name)
            .field("user", &self.user)
            .field("password", &"***")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}
