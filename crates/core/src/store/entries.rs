//! Entry CRUD operations.
//!
//! Provides functions for creating, reading, and purging cached response
//! entries. All writes use UPSERT semantics: re-fetching a key overwrites
//! the stored response in place and resets its insertion timestamp.

use super::connection::CacheStore;
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::{self, params_from_iter};

/// A cached response entry.
///
/// One row of a cache namespace: the full stored response plus the
/// metadata needed for eviction and ops queries. Age is measured from
/// `inserted_at` only; HTTP freshness headers are not consulted.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct Entry {
    pub key: String,
    pub namespace: String,
    pub method: String,
    pub url: String,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub inserted_at: String,
    pub revision: Option<String>,
}

/// Entry metadata without the body, for listings.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct EntryMeta {
    pub key: String,
    pub namespace: String,
    pub method: String,
    pub url: String,
    pub status: u16,
    pub body_bytes: u64,
    pub inserted_at: String,
    pub revision: Option<String>,
}

/// Aggregate statistics for one namespace.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct NamespaceStats {
    pub namespace: String,
    pub entries: u64,
    pub body_bytes: u64,
    pub oldest: Option<String>,
    pub newest: Option<String>,
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> Result<Entry, rusqlite::Error> {
    let headers_json: String = row.get(5)?;
    Ok(Entry {
        key: row.get(0)?,
        namespace: row.get(1)?,
        method: row.get(2)?,
        url: row.get(3)?,
        status: row.get(4)?,
        headers: serde_json::from_str(&headers_json).unwrap_or_default(),
        body: row.get(6)?,
        inserted_at: row.get(7)?,
        revision: row.get(8)?,
    })
}

const ENTRY_COLUMNS: &str = "key, namespace, method, url, status, headers_json, body, inserted_at, revision";

impl CacheStore {
    /// Insert or update a cached entry.
    ///
    /// Uses UPSERT semantics: inserts if (namespace, key) doesn't exist,
    /// replaces the stored response and insertion timestamp if it does.
    pub async fn upsert_entry(&self, entry: &Entry) -> Result<(), Error> {
        let entry = entry.clone();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let headers_json = serde_json::to_string(&entry.headers).unwrap_or_else(|_| "[]".into());
                conn.execute(
                    "INSERT INTO entries (
                        key, namespace, method, url, status, headers_json, body, inserted_at, revision
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                    ON CONFLICT(namespace, key) DO UPDATE SET
                        method = excluded.method,
                        url = excluded.url,
                        status = excluded.status,
                        headers_json = excluded.headers_json,
                        body = excluded.body,
                        inserted_at = excluded.inserted_at,
                        revision = excluded.revision",
                    params![
                        &entry.key,
                        &entry.namespace,
                        &entry.method,
                        &entry.url,
                        entry.status,
                        &headers_json,
                        &entry.body,
                        &entry.inserted_at,
                        &entry.revision,
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Insert a batch of entries in a single transaction.
    ///
    /// Used by the precache installer: either every entry lands or none
    /// does, so a failed install leaves no partial state behind.
    pub async fn insert_batch(&self, entries: Vec<Entry>) -> Result<(), Error> {
        let batch_size = entries.len();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                for entry in &entries {
                    let headers_json = serde_json::to_string(&entry.headers).unwrap_or_else(|_| "[]".into());
                    tx.execute(
                        "INSERT INTO entries (
                            key, namespace, method, url, status, headers_json, body, inserted_at, revision
                        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                        ON CONFLICT(namespace, key) DO UPDATE SET
                            method = excluded.method,
                            url = excluded.url,
                            status = excluded.status,
                            headers_json = excluded.headers_json,
                            body = excluded.body,
                            inserted_at = excluded.inserted_at,
                            revision = excluded.revision",
                        params![
                            &entry.key,
                            &entry.namespace,
                            &entry.method,
                            &entry.url,
                            entry.status,
                            &headers_json,
                            &entry.body,
                            &entry.inserted_at,
                            &entry.revision,
                        ],
                    )?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)?;
        tracing::debug!(batch_size, "batch committed");
        Ok(())
    }

    /// Get an entry by namespace and key.
    ///
    /// Returns None if the key doesn't exist in the namespace.
    pub async fn get_entry(&self, namespace: &str, key: &str) -> Result<Option<Entry>, Error> {
        let namespace = namespace.to_string();
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<Option<Entry>, Error> {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {ENTRY_COLUMNS} FROM entries WHERE namespace = ?1 AND key = ?2"
                ))?;

                let result = stmt.query_row(params![namespace, key], row_to_entry);

                match result {
                    Ok(e) => Ok(Some(e)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Check whether an entry exists.
    pub async fn contains_entry(&self, namespace: &str, key: &str) -> Result<bool, Error> {
        let namespace = namespace.to_string();
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists: bool = conn
                    .query_row(
                        "SELECT EXISTS(SELECT 1 FROM entries WHERE namespace = ?1 AND key = ?2)",
                        params![namespace, key],
                        |row| row.get(0),
                    )
                    .map_err(Error::from)?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)
    }

    /// Number of entries in a namespace.
    pub async fn count_entries(&self, namespace: &str) -> Result<u64, Error> {
        let namespace = namespace.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM entries WHERE namespace = ?1",
                    params![namespace],
                    |row| row.get(0),
                )?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete entries inserted before the given RFC 3339 cutoff.
    ///
    /// Returns the number of deleted entries.
    pub async fn purge_inserted_before(&self, namespace: &str, cutoff: &str) -> Result<u64, Error> {
        let ns = namespace.to_string();
        let cutoff = cutoff.to_string();
        let deleted = self
            .conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute(
                    "DELETE FROM entries WHERE namespace = ?1 AND inserted_at < ?2",
                    params![ns, cutoff],
                )?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)?;
        if deleted > 0 {
            tracing::debug!(namespace, deleted, "entries purged past age cutoff");
        }
        Ok(deleted)
    }

    /// Delete oldest-inserted entries until count <= max_entries.
    ///
    /// Insertion-order eviction, not access-order LRU: reads never touch
    /// `inserted_at`, so the first entry written is the first to go.
    /// Returns the number of deleted entries.
    pub async fn purge_over_cap(&self, namespace: &str, max_entries: usize) -> Result<u64, Error> {
        let ns = namespace.to_string();
        let max = max_entries as i64;
        let deleted = self
            .conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM entries WHERE namespace = ?1",
                    params![ns],
                    |row| row.get(0),
                )?;
                if count <= max {
                    return Ok(0);
                }

                let to_delete = count - max;
                let deleted = conn.execute(
                    "DELETE FROM entries WHERE rowid IN (
                        SELECT rowid FROM entries WHERE namespace = ?1
                        ORDER BY inserted_at ASC, rowid ASC LIMIT ?2
                    )",
                    params![ns, to_delete],
                )?;
                Ok(deleted as u64)
            })
            .await
            .map_err(Error::from)?;
        if deleted > 0 {
            tracing::debug!(namespace, max_entries, deleted, "oldest entries evicted over cap");
        }
        Ok(deleted)
    }

    /// Delete every entry in a namespace whose key is not in `keys`.
    ///
    /// Used at activation to drop precache entries from prior manifest
    /// generations. Returns the number of deleted entries.
    pub async fn retain_keys(&self, namespace: &str, keys: Vec<String>) -> Result<u64, Error> {
        let ns = namespace.to_string();
        let deleted = self
            .conn
            .call(move |conn| -> Result<u64, Error> {
                if keys.is_empty() {
                    let deleted = conn.execute("DELETE FROM entries WHERE namespace = ?1", params![ns])?;
                    return Ok(deleted as u64);
                }

                let placeholders: Vec<String> = (2..keys.len() + 2).map(|i| format!("?{i}")).collect();
                let sql = format!(
                    "DELETE FROM entries WHERE namespace = ?1 AND key NOT IN ({})",
                    placeholders.join(", ")
                );

                let mut args: Vec<String> = Vec::with_capacity(keys.len() + 1);
                args.push(ns);
                args.extend(keys);

                let deleted = conn.execute(&sql, params_from_iter(args.iter()))?;
                Ok(deleted as u64)
            })
            .await
            .map_err(Error::from)?;
        if deleted > 0 {
            tracing::debug!(namespace, deleted, "entries dropped by key retention");
        }
        Ok(deleted)
    }

    /// Delete every entry in a namespace.
    ///
    /// Returns the number of deleted entries.
    pub async fn purge_namespace(&self, namespace: &str) -> Result<u64, Error> {
        self.retain_keys(namespace, Vec::new()).await
    }

    /// List entry metadata, newest first, optionally scoped to a namespace.
    pub async fn list_entries(&self, namespace: Option<&str>, limit: usize) -> Result<Vec<EntryMeta>, Error> {
        let namespace = namespace.map(str::to_string);
        let limit = limit as i64;
        self.conn
            .call(move |conn| -> Result<Vec<EntryMeta>, Error> {
                let (sql, ns) = match &namespace {
                    Some(ns) => (
                        "SELECT key, namespace, method, url, status, LENGTH(body), inserted_at, revision
                         FROM entries WHERE namespace = ?1
                         ORDER BY inserted_at DESC, rowid DESC LIMIT ?2",
                        Some(ns.clone()),
                    ),
                    None => (
                        "SELECT key, namespace, method, url, status, LENGTH(body), inserted_at, revision
                         FROM entries
                         ORDER BY inserted_at DESC, rowid DESC LIMIT ?1",
                        None,
                    ),
                };

                let mut stmt = conn.prepare(sql)?;
                let map_row = |row: &rusqlite::Row<'_>| -> Result<EntryMeta, rusqlite::Error> {
                    Ok(EntryMeta {
                        key: row.get(0)?,
                        namespace: row.get(1)?,
                        method: row.get(2)?,
                        url: row.get(3)?,
                        status: row.get(4)?,
                        body_bytes: row.get::<_, i64>(5)? as u64,
                        inserted_at: row.get(6)?,
                        revision: row.get(7)?,
                    })
                };

                let rows = match ns {
                    Some(ns) => stmt
                        .query_map(params![ns, limit], map_row)?
                        .collect::<Result<Vec<_>, _>>()?,
                    None => stmt
                        .query_map(params![limit], map_row)?
                        .collect::<Result<Vec<_>, _>>()?,
                };

                Ok(rows)
            })
            .await
            .map_err(Error::from)
    }

    /// Find an entry by exact URL within a namespace.
    ///
    /// Precache entries are keyed by URL+revision, so a URL can match more
    /// than one row there; the newest insertion wins.
    pub async fn find_by_url(&self, namespace: &str, url: &str) -> Result<Option<Entry>, Error> {
        let namespace = namespace.to_string();
        let url = url.to_string();
        self.conn
            .call(move |conn| -> Result<Option<Entry>, Error> {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {ENTRY_COLUMNS} FROM entries WHERE namespace = ?1 AND url = ?2
                     ORDER BY inserted_at DESC, rowid DESC LIMIT 1"
                ))?;

                let result = stmt.query_row(params![namespace, url], row_to_entry);

                match result {
                    Ok(e) => Ok(Some(e)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Per-namespace aggregate statistics.
    pub async fn namespace_stats(&self) -> Result<Vec<NamespaceStats>, Error> {
        self.conn
            .call(move |conn| -> Result<Vec<NamespaceStats>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT namespace, COUNT(*), COALESCE(SUM(LENGTH(body)), 0),
                            MIN(inserted_at), MAX(inserted_at)
                     FROM entries GROUP BY namespace ORDER BY namespace",
                )?;

                let rows = stmt
                    .query_map([], |row| {
                        Ok(NamespaceStats {
                            namespace: row.get(0)?,
                            entries: row.get::<_, i64>(1)? as u64,
                            body_bytes: row.get::<_, i64>(2)? as u64,
                            oldest: row.get(3)?,
                            newest: row.get(4)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;

                Ok(rows)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::entry_key;

    fn make_entry(namespace: &str, url: &str, inserted_at: &str) -> Entry {
        Entry {
            key: entry_key("GET", url, ""),
            namespace: namespace.to_string(),
            method: "GET".to_string(),
            url: url.to_string(),
            status: 200,
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body: b"{\"ok\":true}".to_vec(),
            inserted_at: inserted_at.to_string(),
            revision: None,
        }
    }

    #[tokio::test]
    async fn test_upsert_and_get() {
        let store = CacheStore::open_in_memory().await.unwrap();
        let entry = make_entry("api-cache", "https://example.com/api/courses", "2026-01-01T00:00:00.000000+00:00");

        store.upsert_entry(&entry).await.unwrap();

        let got = store.get_entry("api-cache", &entry.key).await.unwrap().unwrap();
        assert_eq!(got.url, entry.url);
        assert_eq!(got.body, entry.body);
        assert_eq!(got.headers, entry.headers);
    }

    #[tokio::test]
    async fn test_get_missing() {
        let store = CacheStore::open_in_memory().await.unwrap();
        let result = store.get_entry("api-cache", "nonexistent").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_upsert_overwrites_in_place() {
        let store = CacheStore::open_in_memory().await.unwrap();
        let mut entry = make_entry("api-cache", "https://example.com/api/courses", "2026-01-01T00:00:00.000000+00:00");
        store.upsert_entry(&entry).await.unwrap();

        entry.body = b"updated".to_vec();
        entry.inserted_at = "2026-01-02T00:00:00.000000+00:00".to_string();
        store.upsert_entry(&entry).await.unwrap();

        assert_eq!(store.count_entries("api-cache").await.unwrap(), 1);
        let got = store.get_entry("api-cache", &entry.key).await.unwrap().unwrap();
        assert_eq!(got.body, b"updated");
        assert_eq!(got.inserted_at, entry.inserted_at);
    }

    #[tokio::test]
    async fn test_namespaces_are_isolated() {
        let store = CacheStore::open_in_memory().await.unwrap();
        let entry = make_entry("images", "https://example.com/a.png", "2026-01-01T00:00:00.000000+00:00");
        store.upsert_entry(&entry).await.unwrap();

        assert!(store.get_entry("images", &entry.key).await.unwrap().is_some());
        assert!(store.get_entry("webfonts", &entry.key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_purge_over_cap_oldest_first() {
        let store = CacheStore::open_in_memory().await.unwrap();
        for i in 0..6 {
            let entry = make_entry(
                "avatar-presets",
                &format!("https://example.com/preset/{i}"),
                &format!("2026-01-01T00:00:0{i}.000000+00:00"),
            );
            store.upsert_entry(&entry).await.unwrap();
        }

        let deleted = store.purge_over_cap("avatar-presets", 5).await.unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(store.count_entries("avatar-presets").await.unwrap(), 5);

        // The first-inserted entry is the one evicted.
        let oldest_key = entry_key("GET", "https://example.com/preset/0", "");
        assert!(!store.contains_entry("avatar-presets", &oldest_key).await.unwrap());
    }

    #[tokio::test]
    async fn test_purge_over_cap_under_cap_is_noop() {
        let store = CacheStore::open_in_memory().await.unwrap();
        let entry = make_entry("images", "https://example.com/a.png", "2026-01-01T00:00:00.000000+00:00");
        store.upsert_entry(&entry).await.unwrap();

        let deleted = store.purge_over_cap("images", 60).await.unwrap();
        assert_eq!(deleted, 0);
        assert_eq!(store.count_entries("images").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_purge_inserted_before() {
        let store = CacheStore::open_in_memory().await.unwrap();
        store
            .upsert_entry(&make_entry("api-cache", "https://example.com/old", "2026-01-01T00:00:00.000000+00:00"))
            .await
            .unwrap();
        store
            .upsert_entry(&make_entry("api-cache", "https://example.com/new", "2026-01-03T00:00:00.000000+00:00"))
            .await
            .unwrap();

        let deleted = store
            .purge_inserted_before("api-cache", "2026-01-02T00:00:00.000000+00:00")
            .await
            .unwrap();
        assert_eq!(deleted, 1);

        let old_key = entry_key("GET", "https://example.com/old", "");
        assert!(!store.contains_entry("api-cache", &old_key).await.unwrap());
    }

    #[tokio::test]
    async fn test_insert_batch_atomic() {
        let store = CacheStore::open_in_memory().await.unwrap();
        let entries: Vec<Entry> = (0..3)
            .map(|i| make_entry("precache", &format!("https://example.com/asset/{i}"), "2026-01-01T00:00:00.000000+00:00"))
            .collect();

        store.insert_batch(entries).await.unwrap();
        assert_eq!(store.count_entries("precache").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_retain_keys() {
        let store = CacheStore::open_in_memory().await.unwrap();
        let keep = make_entry("precache", "https://example.com/keep", "2026-01-01T00:00:00.000000+00:00");
        let drop = make_entry("precache", "https://example.com/drop", "2026-01-01T00:00:00.000000+00:00");
        store.upsert_entry(&keep).await.unwrap();
        store.upsert_entry(&drop).await.unwrap();

        let deleted = store.retain_keys("precache", vec![keep.key.clone()]).await.unwrap();
        assert_eq!(deleted, 1);
        assert!(store.contains_entry("precache", &keep.key).await.unwrap());
        assert!(!store.contains_entry("precache", &drop.key).await.unwrap());
    }

    #[tokio::test]
    async fn test_retain_keys_empty_clears_namespace() {
        let store = CacheStore::open_in_memory().await.unwrap();
        store
            .upsert_entry(&make_entry("precache", "https://example.com/a", "2026-01-01T00:00:00.000000+00:00"))
            .await
            .unwrap();

        let deleted = store.purge_namespace("precache").await.unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(store.count_entries("precache").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_list_and_stats() {
        let store = CacheStore::open_in_memory().await.unwrap();
        store
            .upsert_entry(&make_entry("images", "https://example.com/a.png", "2026-01-01T00:00:00.000000+00:00"))
            .await
            .unwrap();
        store
            .upsert_entry(&make_entry("api-cache", "https://example.com/api/x", "2026-01-02T00:00:00.000000+00:00"))
            .await
            .unwrap();

        let all = store.list_entries(None, 10).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].namespace, "api-cache"); // newest first

        let scoped = store.list_entries(Some("images"), 10).await.unwrap();
        assert_eq!(scoped.len(), 1);
        assert!(scoped[0].body_bytes > 0);

        let stats = store.namespace_stats().await.unwrap();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].namespace, "api-cache");
        assert_eq!(stats[0].entries, 1);
    }

    #[tokio::test]
    async fn test_find_by_url() {
        let store = CacheStore::open_in_memory().await.unwrap();
        let entry = make_entry("webfonts", "https://fonts.gstatic.com/font.woff2", "2026-01-01T00:00:00.000000+00:00");
        store.upsert_entry(&entry).await.unwrap();

        let found = store
            .find_by_url("webfonts", "https://fonts.gstatic.com/font.woff2")
            .await
            .unwrap();
        assert!(found.is_some());
        assert!(store.find_by_url("webfonts", "https://elsewhere.test/").await.unwrap().is_none());
    }
}
