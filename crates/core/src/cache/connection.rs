//! Durable store connection.
//!
//! Opening a store sets WAL journaling and brings the schema up to date
//! before the handle is handed out.

use super::migrations;
use crate::Error;
use std::path::Path;
use tokio_rusqlite::Connection;

const PRAGMAS: &str = "PRAGMA journal_mode=WAL;
    PRAGMA synchronous=NORMAL;
    PRAGMA busy_timeout=5000;
    PRAGMA temp_store=MEMORY;";

/// Durable store handle.
///
/// All statements run in order on the connection's background thread, so a
/// single `call` is never interleaved with another. Cloning shares that
/// thread.
#[derive(Clone, Debug)]
pub struct CacheDb {
    pub(crate) conn: Connection,
}

impl CacheDb {
    /// Open (creating if needed) the store at `path`.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path).await.map_err(|e| Error::Storage(e.into()))?;
        let db = Self::prepare(conn).await?;
        tracing::debug!(path = %path.display(), "durable store opened");
        Ok(db)
    }

    /// Private in-memory store, used by tests.
    pub async fn open_in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory().await.map_err(|e| Error::Storage(e.into()))?;
        Self::prepare(conn).await
    }

    async fn prepare(conn: Connection) -> Result<Self, Error> {
        conn.call(|conn| -> Result<(), Error> {
            conn.execute_batch(PRAGMAS)?;
            migrations::run(conn)
        })
        .await?;

        Ok(Self { conn })
    }

    /// Highest applied schema version.
    pub async fn schema_version(&self) -> Result<i64, Error> {
        self.conn.call(|conn| migrations::schema_version(conn)).await.map_err(Error::from)
    }

    /// Break the store so every later read and write fails.
    #[cfg(test)]
    pub(crate) async fn drop_storage_table(&self) {
        self.conn
            .call(|conn| -> Result<(), Error> {
                conn.execute_batch("DROP TABLE storage")?;
                Ok(())
            })
            .await
            .unwrap();
    }
}
