//! Persisted sites map.
//!
//! The whole registry lives under a single storage key as one JSON object
//! mapping sanitized URL to `{data, timestamp, expiresAt}`.

use std::collections::BTreeMap;

use super::connection::CacheDb;
use crate::{CacheEntry, Error};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// Storage key holding the sites map.
pub const SITES_DATA_KEY: &str = "sites_data";

/// Sanitized URL to its current cache entry. The keys are the monitored sites.
pub type SitesData = BTreeMap<String, CacheEntry>;

fn read_sites(conn: &rusqlite::Connection) -> Result<SitesData, Error> {
    let result = conn.query_row("SELECT value FROM storage WHERE key = ?1", params![SITES_DATA_KEY], |row| {
        row.get::<_, String>(0)
    });

    let raw = match result {
        Ok(raw) => raw,
        Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(SitesData::new()),
        Err(e) => return Err(e.into()),
    };

    let values: BTreeMap<String, serde_json::Value> = serde_json::from_str(&raw)?;

    // A damaged entry keeps its site registered but carries no timing
    // fields, so it is treated as expired and probed again.
    let sites = values
        .into_iter()
        .map(|(url, value)| {
            let entry = serde_json::from_value::<CacheEntry>(value).unwrap_or_else(|e| {
                tracing::warn!(url = %url, error = %e, "discarding malformed cache entry");
                CacheEntry { data: Default::default(), timestamp: None, expires_at: None }
            });
            (url, entry)
        })
        .collect();

    Ok(sites)
}

fn write_sites(conn: &rusqlite::Connection, sites: &SitesData) -> Result<(), Error> {
    let raw = serde_json::to_string(sites)?;
    conn.execute(
        "INSERT INTO storage (key, value, updated_at) VALUES (?1, ?2, ?3)
        ON CONFLICT(key) DO UPDATE SET
            value = excluded.value,
            updated_at = excluded.updated_at",
        params![SITES_DATA_KEY, raw, chrono::Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

impl CacheDb {
    /// Load the persisted sites map.
    ///
    /// Returns an empty map if nothing has been stored yet.
    pub async fn load_sites(&self) -> Result<SitesData, Error> {
        self.conn.call(|conn| read_sites(conn)).await.map_err(Error::from)
    }

    /// Replace the persisted sites map.
    pub async fn save_sites(&self, sites: SitesData) -> Result<(), Error> {
        self.conn
            .call(move |conn| write_sites(conn, &sites))
            .await
            .map_err(Error::from)
    }

    /// Read, modify and write the sites map as one unit.
    ///
    /// The closure runs on the database thread inside a transaction. The
    /// map is only written back when the closure returns `Ok`.
    pub async fn update_sites<F, R>(&self, f: F) -> Result<R, Error>
    where
        F: FnOnce(&mut SitesData) -> Result<R, Error> + Send + 'static,
        R: Send + 'static,
    {
        self.conn
            .call(move |conn| -> Result<R, Error> {
                let tx = conn.transaction()?;
                let mut sites = read_sites(&tx)?;
                let result = f(&mut sites)?;
                write_sites(&tx, &sites)?;
                tx.commit()?;
                Ok(result)
            })
            .await
            .map_err(Error::from)
    }
}
