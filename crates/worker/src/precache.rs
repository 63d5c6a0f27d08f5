//! Precache bootstrap: install-time asset staging and activation purge.
//!
//! Install consumes the build-supplied `{url, revision}` manifest and
//! fetches every asset with bounded concurrency. The batch is committed
//! in a single transaction, so install is all-or-nothing: one failed
//! fetch (transport or non-2xx) abandons the whole generation and the
//! previously active one keeps serving. Activation drops precache
//! entries whose URL+revision is not in the current manifest.

use std::collections::HashMap;
use std::sync::Arc;

use satchel_core::{CacheStore, Entry, Error, PrecacheManifest};
use satchel_core::key::entry_key;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use url::Url;

use crate::clock::Clock;
use crate::fetch::HttpBackend;

/// Namespace holding the precached asset set.
pub const PRECACHE_NAMESPACE: &str = "precache";

/// Resolve a manifest URL, which may be root-relative, against the
/// application origin.
pub fn resolve(base: &Url, raw: &str) -> Result<Url, Error> {
    base.join(raw)
        .map_err(|e| Error::InvalidUrl(format!("manifest url {raw:?}: {e}")))
}

/// Storage key of a precached asset: URL + revision, so a new build of
/// the same URL is a distinct entry until activation purges it.
pub fn asset_key(url: &Url, revision: &str) -> String {
    entry_key("GET", url.as_str(), revision)
}

/// Resolved URL → revision map for the manifest, used for serve-time
/// lookups against the active generation.
pub fn revisions_by_url(manifest: &PrecacheManifest, base: &Url) -> Result<HashMap<String, String>, Error> {
    manifest
        .entries
        .iter()
        .map(|m| Ok((resolve(base, &m.url)?.to_string(), m.revision.clone())))
        .collect()
}

/// Fetch and stage every manifest asset.
///
/// Returns the number of staged entries. On any failure nothing is
/// written: in-flight fetches are abandoned and the staging batch never
/// reaches the store.
pub async fn install(
    store: &CacheStore, backend: Arc<dyn HttpBackend>, clock: &dyn Clock, manifest: &PrecacheManifest, base: &Url,
    concurrency: usize,
) -> Result<u64, Error> {
    if manifest.is_empty() {
        return Ok(0);
    }

    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut tasks: JoinSet<Result<Entry, Error>> = JoinSet::new();

    for asset in &manifest.entries {
        let url = resolve(base, &asset.url)?;
        let revision = asset.revision.clone();
        let backend = Arc::clone(&backend);
        let semaphore = Arc::clone(&semaphore);
        let inserted_at = clock.now_rfc3339();

        tasks.spawn(async move {
            let _permit = semaphore
                .acquire()
                .await
                .map_err(|_| Error::InstallFailure("install aborted".into()))?;

            let resp = backend
                .fetch(&url)
                .await
                .map_err(|e| Error::InstallFailure(e.to_string()))?;

            if !resp.is_success() {
                return Err(Error::InstallFailure(format!("status {} for {}", resp.status, url)));
            }

            Ok(Entry {
                key: asset_key(&url, &revision),
                namespace: PRECACHE_NAMESPACE.to_string(),
                method: "GET".to_string(),
                url: url.to_string(),
                status: resp.status,
                headers: resp.headers,
                body: resp.body.to_vec(),
                inserted_at,
                revision: Some(revision),
            })
        });
    }

    let mut staged = Vec::with_capacity(manifest.len());
    while let Some(joined) = tasks.join_next().await {
        let entry = joined.map_err(|e| Error::InstallFailure(e.to_string()))??;
        staged.push(entry);
    }

    let count = staged.len() as u64;
    store.insert_batch(staged).await?;

    tracing::info!(assets = count, "precache generation staged");
    Ok(count)
}

/// Purge precache entries not present in the current manifest.
///
/// Returns the number of purged prior-generation entries.
pub async fn activate(store: &CacheStore, manifest: &PrecacheManifest, base: &Url) -> Result<u64, Error> {
    let keys = manifest
        .entries
        .iter()
        .map(|m| Ok(asset_key(&resolve(base, &m.url)?, &m.revision)))
        .collect::<Result<Vec<_>, Error>>()?;

    let purged = store.retain_keys(PRECACHE_NAMESPACE, keys).await?;
    if purged > 0 {
        tracing::info!(purged, "stale precache generations purged");
    }
    Ok(purged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::testing::MockBackend;
    use satchel_core::ManifestEntry;

    fn base() -> Url {
        Url::parse("https://app.example.edu").unwrap()
    }

    fn manifest(entries: &[(&str, &str)]) -> PrecacheManifest {
        PrecacheManifest {
            entries: entries
                .iter()
                .map(|(url, revision)| ManifestEntry { url: url.to_string(), revision: revision.to_string() })
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_install_stages_every_asset() {
        let store = CacheStore::open_in_memory().await.unwrap();
        let backend = Arc::new(MockBackend::new());
        let clock = ManualClock::new("2026-01-01T00:00:00Z".parse().unwrap());

        backend.respond("https://app.example.edu/index.html", 200, b"<html>");
        backend.respond("https://app.example.edu/app.js", 200, b"js");

        let m = manifest(&[("/index.html", "r1"), ("/app.js", "r1")]);
        let staged = install(&store, backend, &clock, &m, &base(), 4).await.unwrap();

        assert_eq!(staged, 2);
        assert_eq!(store.count_entries(PRECACHE_NAMESPACE).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_install_is_all_or_nothing() {
        let store = CacheStore::open_in_memory().await.unwrap();
        let backend = Arc::new(MockBackend::new());
        let clock = ManualClock::new("2026-01-01T00:00:00Z".parse().unwrap());

        // 12 assets, one of which 404s: nothing may be retained.
        let mut entries = Vec::new();
        for i in 0..12 {
            let url = format!("/asset/{i}.js");
            if i == 7 {
                backend.respond(&format!("https://app.example.edu{url}"), 404, b"gone");
            } else {
                backend.respond(&format!("https://app.example.edu{url}"), 200, b"ok");
            }
            entries.push((url, "r1".to_string()));
        }
        let m = PrecacheManifest {
            entries: entries
                .into_iter()
                .map(|(url, revision)| ManifestEntry { url, revision })
                .collect(),
        };

        let result = install(&store, backend, &clock, &m, &base(), 4).await;
        assert!(matches!(result, Err(Error::InstallFailure(_))));
        assert_eq!(store.count_entries(PRECACHE_NAMESPACE).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_install_transport_failure_fails_install() {
        let store = CacheStore::open_in_memory().await.unwrap();
        let backend = Arc::new(MockBackend::new());
        let clock = ManualClock::new("2026-01-01T00:00:00Z".parse().unwrap());

        let m = manifest(&[("/unreachable.js", "r1")]);
        let result = install(&store, backend, &clock, &m, &base(), 4).await;
        assert!(matches!(result, Err(Error::InstallFailure(_))));
    }

    #[tokio::test]
    async fn test_activation_purges_prior_generations() {
        let store = CacheStore::open_in_memory().await.unwrap();
        let backend = Arc::new(MockBackend::new());
        let clock = ManualClock::new("2026-01-01T00:00:00Z".parse().unwrap());

        backend.respond("https://app.example.edu/app.js", 200, b"v1");
        let gen1 = manifest(&[("/app.js", "r1")]);
        install(&store, Arc::clone(&backend) as Arc<dyn HttpBackend>, &clock, &gen1, &base(), 4)
            .await
            .unwrap();

        backend.respond("https://app.example.edu/app.js", 200, b"v2");
        let gen2 = manifest(&[("/app.js", "r2")]);
        install(&store, backend, &clock, &gen2, &base(), 4).await.unwrap();

        // Both revisions coexist until activation.
        assert_eq!(store.count_entries(PRECACHE_NAMESPACE).await.unwrap(), 2);

        let purged = activate(&store, &gen2, &base()).await.unwrap();
        assert_eq!(purged, 1);

        let url = Url::parse("https://app.example.edu/app.js").unwrap();
        assert!(store.contains_entry(PRECACHE_NAMESPACE, &asset_key(&url, "r2")).await.unwrap());
        assert!(!store.contains_entry(PRECACHE_NAMESPACE, &asset_key(&url, "r1")).await.unwrap());
    }

    #[tokio::test]
    async fn test_revisions_by_url_resolves_relative_urls() {
        let m = manifest(&[("/index.html", "r1"), ("https://cdn.example.net/lib.js", "r9")]);
        let map = revisions_by_url(&m, &base()).unwrap();
        assert_eq!(map.get("https://app.example.edu/index.html"), Some(&"r1".to_string()));
        assert_eq!(map.get("https://cdn.example.net/lib.js"), Some(&"r9".to_string()));
    }
}
