//! `CacheStore` implementation over the SQLite schema.
//!
//! Entries are addressed by a hash of the normalized request key. The
//! autoincrement `seq` column carries insertion order; an overwrite deletes
//! and re-inserts the row so it moves to the end.

use super::connection::CacheDb;
use super::hash::compute_key_hash;
use super::store::CacheStore;
use crate::Error;
use crate::model::{CachedResponse, RequestKey};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio_rusqlite::rusqlite::{self, OptionalExtension};
use tokio_rusqlite::params;

fn ensure_partition(conn: &rusqlite::Connection, name: &str) -> Result<bool, rusqlite::Error> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO partitions (name, created_at) VALUES (?1, ?2)",
        params![name, Utc::now().to_rfc3339()],
    )?;
    Ok(inserted == 1)
}

#[async_trait::async_trait]
impl CacheStore for CacheDb {
    async fn open(&self, partition: &str) -> Result<bool, Error> {
        let partition = partition.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> { Ok(ensure_partition(conn, &partition)?) })
            .await
            .map_err(Error::from)
    }

    async fn match_entry(&self, partition: &str, key: &RequestKey) -> Result<Option<CachedResponse>, Error> {
        let partition = partition.to_string();
        let key_hash = compute_key_hash(key);
        self.conn
            .call(move |conn| -> Result<Option<CachedResponse>, Error> {
                let row = conn
                    .query_row(
                        "SELECT status, headers_json, body, stored_at FROM entries
                         WHERE partition = ?1 AND key_hash = ?2",
                        params![partition, key_hash],
                        |row| {
                            Ok((
                                row.get::<_, u16>(0)?,
                                row.get::<_, String>(1)?,
                                row.get::<_, Vec<u8>>(2)?,
                                row.get::<_, String>(3)?,
                            ))
                        },
                    )
                    .optional()?;

                let Some((status, headers_json, body, stored_at)) = row else {
                    return Ok(None);
                };

                let headers: Vec<(String, String)> =
                    serde_json::from_str(&headers_json).map_err(|e| Error::CorruptEntry(e.to_string()))?;
                let stored_at = DateTime::parse_from_rfc3339(&stored_at)
                    .map_err(|e| Error::CorruptEntry(e.to_string()))?
                    .with_timezone(&Utc);

                Ok(Some(CachedResponse { status, headers, body: Bytes::from(body), stored_at }))
            })
            .await
            .map_err(Error::from)
    }

    async fn put(&self, partition: &str, key: &RequestKey, response: CachedResponse) -> Result<(), Error> {
        let partition = partition.to_string();
        let key = key.clone();
        let key_hash = compute_key_hash(&key);
        let headers_json = serde_json::to_string(&response.headers).map_err(|e| Error::InvalidInput(e.to_string()))?;

        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                ensure_partition(&tx, &partition)?;
                tx.execute(
                    "DELETE FROM entries WHERE partition = ?1 AND key_hash = ?2",
                    params![partition, key_hash],
                )?;
                tx.execute(
                    "INSERT INTO entries (partition, key_hash, method, url, status, headers_json, body, stored_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![
                        partition,
                        key_hash,
                        key.method,
                        key.url,
                        response.status,
                        headers_json,
                        response.body.as_ref(),
                        response.stored_at.to_rfc3339(),
                    ],
                )?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn delete(&self, partition: &str, key: &RequestKey) -> Result<bool, Error> {
        let partition = partition.to_string();
        let key_hash = compute_key_hash(key);
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute(
                    "DELETE FROM entries WHERE partition = ?1 AND key_hash = ?2",
                    params![partition, key_hash],
                )?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }

    async fn keys(&self, partition: &str) -> Result<Vec<RequestKey>, Error> {
        let partition = partition.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<RequestKey>, Error> {
                let mut stmt = conn.prepare("SELECT method, url FROM entries WHERE partition = ?1 ORDER BY seq ASC")?;
                let keys = stmt
                    .query_map(params![partition], |row| Ok(RequestKey { method: row.get(0)?, url: row.get(1)? }))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(keys)
            })
            .await
            .map_err(Error::from)
    }

    async fn partitions(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM partitions ORDER BY rowid ASC")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    async fn delete_partition(&self, partition: &str) -> Result<bool, Error> {
        let partition = partition.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute("DELETE FROM partitions WHERE name = ?1", params![partition])?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Response;
    use url::Url;

    fn key(path: &str) -> RequestKey {
        RequestKey::get(&Url::parse("https://example.com").unwrap().join(path).unwrap())
    }

    fn cached(body: &'static str) -> CachedResponse {
        CachedResponse::from_response(&Response::new(200, body).with_header("content-type", "text/plain"))
    }

    #[tokio::test]
    async fn test_put_and_match() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let stored = cached("hello");
        db.put("static-v1", &key("/index.html"), stored.clone()).await.unwrap();

        let hit = db.match_entry("static-v1", &key("/index.html")).await.unwrap().unwrap();
        assert_eq!(hit.status, 200);
        assert_eq!(hit.body, "hello");
        assert_eq!(hit.headers, vec![("content-type".to_string(), "text/plain".to_string())]);
        assert_eq!(hit.stored_at.timestamp(), stored.stored_at.timestamp());
    }

    #[tokio::test]
    async fn test_get_missing() {
        let db = CacheDb::open_in_memory().await.unwrap();
        assert!(db.match_entry("static-v1", &key("/")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_creates_partition() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.put("dynamic-v1", &key("/api/notes"), cached("[]")).await.unwrap();
        assert_eq!(db.partitions().await.unwrap(), vec!["dynamic-v1"]);
        assert!(!db.open("dynamic-v1").await.unwrap());
        assert!(db.open("static-v1").await.unwrap());
        assert_eq!(db.partitions().await.unwrap(), vec!["dynamic-v1", "static-v1"]);
    }

    #[tokio::test]
    async fn test_overwrite_moves_key_to_end() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.put("dynamic-v1", &key("/a"), cached("old")).await.unwrap();
        db.put("dynamic-v1", &key("/b"), cached("b")).await.unwrap();
        db.put("dynamic-v1", &key("/a"), cached("new")).await.unwrap();

        assert_eq!(db.keys("dynamic-v1").await.unwrap(), vec![key("/b"), key("/a")]);
        let hit = db.match_entry("dynamic-v1", &key("/a")).await.unwrap().unwrap();
        assert_eq!(hit.body, "new");
    }

    #[tokio::test]
    async fn test_delete_partition_cascades() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.put("static-v1", &key("/"), cached("root")).await.unwrap();
        db.put("static-v2", &key("/"), cached("root2")).await.unwrap();

        assert!(db.delete_partition("static-v1").await.unwrap());
        assert!(!db.delete_partition("static-v1").await.unwrap());
        assert!(db.keys("static-v1").await.unwrap().is_empty());
        assert!(db.match_entry("static-v1", &key("/")).await.unwrap().is_none());
        assert!(db.match_entry("static-v2", &key("/")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_entry() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.put("dynamic-v1", &key("/a"), cached("a")).await.unwrap();
        assert!(db.delete("dynamic-v1", &key("/a")).await.unwrap());
        assert!(!db.delete("dynamic-v1", &key("/a")).await.unwrap());
        assert_eq!(db.partitions().await.unwrap(), vec!["dynamic-v1"]);
    }
}
