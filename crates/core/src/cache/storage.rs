//! Named cache generations and the responses stored in them.
//!
//! Mirrors the browser cache storage contract: a generation is opened (or
//! created) by name, responses are put and matched by exact URL, and whole
//! generations are deleted by name.

use super::connection::CacheDb;
use super::hash::compute_cache_key;
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// A response as persisted inside one cache generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredResponse {
    pub url: String,
    pub method: String,
    pub status: u16,
    /// `basic`, `cors`, `opaque` or `error`.
    pub response_type: String,
    pub content_type: Option<String>,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub stored_at: String,
}

impl StoredResponse {
    pub fn key(&self) -> String {
        compute_cache_key(&self.method, &self.url)
    }
}

impl CacheDb {
    /// Open the named generation, creating it if it doesn't exist.
    pub async fn open_cache(&self, name: &str) -> Result<(), Error> {
        let name = name.to_string();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO caches (name, created_at) VALUES (?1, ?2)",
                    params![name, now],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Whether a generation with this name exists.
    pub async fn has_cache(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists =
                    conn.query_row("SELECT EXISTS(SELECT 1 FROM caches WHERE name = ?1)", params![name], |row| {
                        row.get(0)
                    })?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)
    }

    /// Names of every generation, oldest first.
    pub async fn cache_names(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM caches ORDER BY created_at ASC, rowid ASC")?;
                let names = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a generation and all of its entries.
    ///
    /// Returns false if no generation had that name.
    pub async fn delete_cache(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute("DELETE FROM caches WHERE name = ?1", params![name])?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete every generation. Returns how many were removed.
    pub async fn clear_caches(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| -> Result<u64, Error> {
                let deleted = conn.execute("DELETE FROM caches", [])?;
                Ok(deleted as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Store a response under its method + URL key in the named generation.
    ///
    /// The generation is created if needed. An existing entry for the same
    /// key is replaced.
    ///
    /// # Errors
    ///
    /// Returns `Error::CacheWrite` when the write fails.
    pub async fn put_entry(&self, cache_name: &str, response: &StoredResponse) -> Result<(), Error> {
        self.write_entry(cache_name, response, true).await
    }

    /// Like [`CacheDb::put_entry`], but never creates the generation.
    ///
    /// Used for opportunistic writes that may race with the generation
    /// being deleted.
    ///
    /// # Errors
    ///
    /// Returns `Error::CacheWrite` when the generation no longer exists or
    /// the write fails.
    pub async fn put_entry_if_open(&self, cache_name: &str, response: &StoredResponse) -> Result<(), Error> {
        self.write_entry(cache_name, response, false).await
    }

    async fn write_entry(&self, cache_name: &str, response: &StoredResponse, create: bool) -> Result<(), Error> {
        let cache_name = cache_name.to_string();
        let response = response.clone();
        let url = response.url.clone();
        let headers_json = serde_json::to_string(&response.headers)
            .map_err(|e| Error::CacheWrite(format!("{url}: failed to encode headers: {e}")))?;

        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                if create {
                    tx.execute(
                        "INSERT OR IGNORE INTO caches (name, created_at) VALUES (?1, ?2)",
                        params![&cache_name, chrono::Utc::now().to_rfc3339()],
                    )?;
                } else {
                    let open: bool = tx.query_row(
                        "SELECT EXISTS(SELECT 1 FROM caches WHERE name = ?1)",
                        params![&cache_name],
                        |row| row.get(0),
                    )?;
                    if !open {
                        return Err(Error::CacheWrite(format!(
                            "{}: cache {cache_name} no longer exists",
                            response.url
                        )));
                    }
                }
                tx.execute(
                    "INSERT INTO cache_entries (
                    cache_name, key, url, method, status, response_type,
                    content_type, headers_json, body, stored_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                ON CONFLICT(cache_name, key) DO UPDATE SET
                    url = excluded.url,
                    status = excluded.status,
                    response_type = excluded.response_type,
                    content_type = excluded.content_type,
                    headers_json = excluded.headers_json,
                    body = excluded.body,
                    stored_at = excluded.stored_at",
                    params![
                        &cache_name,
                        response.key(),
                        &response.url,
                        &response.method,
                        response.status,
                        &response.response_type,
                        &response.content_type,
                        &headers_json,
                        &response.body,
                        &response.stored_at,
                    ],
                )?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(|e| match Error::from(e) {
                Error::Database(db) => Error::CacheWrite(format!("{url}: {db}")),
                other => other,
            })
    }

    /// Look up a response by exact method + URL in the named generation.
    ///
    /// Returns None on a miss, including when the generation doesn't exist.
    pub async fn match_entry(&self, cache_name: &str, method: &str, url: &str) -> Result<Option<StoredResponse>, Error> {
        let cache_name = cache_name.to_string();
        let key = compute_cache_key(method, url);
        self.conn
            .call(move |conn| -> Result<Option<StoredResponse>, Error> {
                let result = conn.query_row(
                    "SELECT url, method, status, response_type, content_type, headers_json, body, stored_at
                     FROM cache_entries WHERE cache_name = ?1 AND key = ?2",
                    params![cache_name, key],
                    |row| {
                        Ok((
                            StoredResponse {
                                url: row.get(0)?,
                                method: row.get(1)?,
                                status: row.get(2)?,
                                response_type: row.get(3)?,
                                content_type: row.get(4)?,
                                headers: Vec::new(),
                                body: row.get(6)?,
                                stored_at: row.get(7)?,
                            },
                            row.get::<_, String>(5)?,
                        ))
                    },
                );

                match result {
                    Ok((mut stored, headers_json)) => {
                        stored.headers = serde_json::from_str(&headers_json).unwrap_or_else(|e| {
                            tracing::warn!(url = %stored.url, "discarding unreadable stored headers: {e}");
                            Vec::new()
                        });
                        Ok(Some(stored))
                    }
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Number of entries held by the named generation.
    pub async fn entry_count(&self, cache_name: &str) -> Result<u64, Error> {
        let cache_name = cache_name.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM cache_entries WHERE cache_name = ?1",
                    params![cache_name],
                    |row| row.get(0),
                )?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}
