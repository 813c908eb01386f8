use async_trait::async_trait;
use sqlx::{postgres::PgConnection, ConnectOptions, Connection, Postgres, Transaction};
use std::io::{self, BufRead};
use tracing::{debug, info};

use crate::config::DbConfig;
use crate::error::{Error, Result};

/// One open transaction that CSV data can be copied into.
#[async_trait]
pub trait Session: Send {
    /// Run a `COPY ... FROM STDIN` statement, streaming `source` as its input.
    /// Returns the number of rows the server reports.
    async fn copy_in(
        &mut self,
        statement: &str,
        source: &mut (dyn BufRead + Send),
    ) -> std::result::Result<u64, sqlx::Error>;

    /// Make everything copied so far durable.
    async fn commit(self) -> std::result::Result<(), sqlx::Error>;
}

/// Open one connection with the configured credentials.
pub async fn connect(config: &DbConfig) -> Result<PgConnection> {
    let options = config.connect_options();
    debug!(host = %config.host, port = config.port, db = %config.name, "connecting");
    match tokio::time::timeout(config.connect_timeout, options.connect()).await {
        Ok(Ok(conn)) => {
            info!(host = %config.host, db = %config.name, "connected");
            Ok(conn)
        }
        Ok(Err(e)) => Err(Error::Connection(e)),
        Err(_) => Err(Error::Connection(sqlx::Error::Io(io::Error::new(
            io::ErrorKind::TimedOut,
            format!(
                "no connection to {}:{} after {:?}",
                config.host, config.port, config.connect_timeout
            ),
        )))),
    }
}

/// A transaction on a PostgreSQL connection.
///
/// Dropping it without `commit` rolls back.
pub struct PgSession<'c> {
    tx: Transaction<'c, Postgres>,
}

impl<'c> PgSession<'c> {
    pub async fn begin(conn: &'c mut PgConnection) -> Result<Self> {
        let tx = conn.begin().await.map_err(Error::Connection)?;
        Ok(Self { tx })
    }
}

#[async_trait]
impl Session for PgSession<'_> {
    async fn copy_in(
        &mut self,
        statement: &str,
        source: &mut (dyn BufRead + Send),
    ) -> std::result::Result<u64, sqlx::Error> {
        let mut copy = self.tx.copy_in_raw(statement).await?;
        loop {
            let chunk = match source.fill_buf() {
                Ok(chunk) => chunk,
                Err(e) => {
                    copy.abort(format!("reading input failed: {}", e)).await?;
                    return Err(sqlx::Error::Io(e));
                }
            };
            if chunk.is_empty() {
                break;
            }
            let n = chunk.len();
            copy.send(chunk).await?;
            source.consume(n);
        }
        copy.finish().await
    }

    async fn commit(self) -> std::result::Result<(), sqlx::Error> {
        self.tx.commit().await
    }
}
