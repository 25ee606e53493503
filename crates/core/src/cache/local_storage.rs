//! String key/value flags persisted across sessions.

use super::connection::CacheDb;
use crate::Error;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

impl CacheDb {
    /// Read a stored flag.
    pub async fn get_item(&self, key: &str) -> Result<Option<String>, Error> {
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<Option<String>, Error> {
                match conn.query_row("SELECT value FROM local_storage WHERE key = ?1", params![key], |row| row.get(0))
                {
                    Ok(value) => Ok(Some(value)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Write a flag, replacing any previous value.
    pub async fn set_item(&self, key: &str, value: &str) -> Result<(), Error> {
        let key = key.to_string();
        let value = value.to_string();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO local_storage (key, value, updated_at) VALUES (?1, ?2, ?3)
                     ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                    params![key, value, now],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Remove a flag. Returns false if it wasn't set.
    pub async fn remove_item(&self, key: &str) -> Result<bool, Error> {
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                Ok(conn.execute("DELETE FROM local_storage WHERE key = ?1", params![key])? > 0)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_remove() {
        let db = CacheDb::open_in_memory().await.unwrap();
        assert_eq!(db.get_item("has-visited-site").await.unwrap(), None);

        db.set_item("has-visited-site", "true").await.unwrap();
        assert_eq!(db.get_item("has-visited-site").await.unwrap().as_deref(), Some("true"));

        db.set_item("has-visited-site", "again").await.unwrap();
        assert_eq!(db.get_item("has-visited-site").await.unwrap().as_deref(), Some("again"));

        assert!(db.remove_item("has-visited-site").await.unwrap());
        assert!(!db.remove_item("has-visited-site").await.unwrap());
    }
}
