//! Strategy executors: CacheFirst, NetworkFirst, StaleWhileRevalidate.
//!
//! Each executor operates against one namespace and runs every admitted
//! network response through the same post-fetch pipeline: the namespace's
//! admission filter, then the trailing eviction sweep inside
//! `Namespace::write`.

use std::sync::Arc;

use bytes::Bytes;
use satchel_core::{Entry, Error};
use tokio::task::JoinSet;

use crate::clock::Clock;
use crate::fetch::{BackendResponse, HttpBackend};
use crate::namespace::Namespace;
use crate::request::RequestDescriptor;

/// Where a served response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServedSource {
    Cache,
    Network,
}

/// A response handed back to the intercepted caller.
#[derive(Debug, Clone)]
pub struct Served {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub source: ServedSource,
}

impl Served {
    pub(crate) fn from_entry(entry: Entry) -> Self {
        Self {
            status: entry.status,
            headers: entry.headers,
            body: Bytes::from(entry.body),
            source: ServedSource::Cache,
        }
    }

    pub(crate) fn from_response(resp: &BackendResponse) -> Self {
        Self {
            status: resp.status,
            headers: resp.headers.clone(),
            body: resp.body.clone(),
            source: ServedSource::Network,
        }
    }
}

pub(crate) fn entry_from_response(
    namespace: &str, req: &RequestDescriptor, resp: &BackendResponse, clock: &dyn Clock,
) -> Entry {
    Entry {
        key: req.key(),
        namespace: namespace.to_string(),
        method: req.method.clone(),
        url: req.url.to_string(),
        status: resp.status,
        headers: resp.headers.clone(),
        body: resp.body.to_vec(),
        inserted_at: clock.now_rfc3339(),
        revision: None,
    }
}

/// CacheFirst: a hit is served with no network call at all. A miss goes
/// to the network; the response is stored only if the filter admits it,
/// and is returned to the caller either way. A transport failure with no
/// cached entry propagates.
pub async fn cache_first(
    ns: &Namespace, backend: &dyn HttpBackend, clock: &dyn Clock, req: &RequestDescriptor,
) -> Result<Served, Error> {
    if let Some(entry) = ns.read(&req.key(), clock).await? {
        tracing::debug!(namespace = %ns.name(), url = %req.url, "cache-first hit");
        return Ok(Served::from_entry(entry));
    }

    let resp = backend.fetch(&req.url).await?;

    if ns.filter().admits(resp.status) {
        ns.write(entry_from_response(ns.name(), req, &resp, clock), clock).await?;
    }

    Ok(Served::from_response(&resp))
}

/// NetworkFirst: the network is always tried first, bounded by the
/// backend's own timeout. A transport failure or a filter-rejected status
/// falls back to any cached entry; with no fallback the failure
/// propagates. For navigations that surfaced failure is the caller's
/// generic offline error.
pub async fn network_first(
    ns: &Namespace, backend: &dyn HttpBackend, clock: &dyn Clock, req: &RequestDescriptor,
) -> Result<Served, Error> {
    let failure = match backend.fetch(&req.url).await {
        Ok(resp) if ns.filter().admits(resp.status) => {
            ns.write(entry_from_response(ns.name(), req, &resp, clock), clock).await?;
            return Ok(Served::from_response(&resp));
        }
        Ok(resp) => Error::NetworkFailure(format!("status {} for {}", resp.status, req.url)),
        Err(err) => err,
    };

    match ns.read(&req.key(), clock).await? {
        Some(entry) => {
            tracing::debug!(namespace = %ns.name(), url = %req.url, %failure, "network-first fell back to cache");
            Ok(Served::from_entry(entry))
        }
        None => {
            if req.is_navigation() {
                tracing::debug!(url = %req.url, "offline navigation with no cached fallback");
            }
            Err(failure)
        }
    }
}

/// StaleWhileRevalidate: a hit is returned immediately with no network
/// wait; a background refresh overwrites the entry on an admitted
/// response. Background failures are swallowed, since a response was
/// already handed to the caller. A miss falls back to a foreground fetch
/// whose failure propagates.
///
/// The refresh task lands in `revalidations` so callers (tests, shutdown
/// paths) can await settlement; the served response never depends on it.
pub async fn stale_while_revalidate(
    ns: &Arc<Namespace>, backend: &Arc<dyn HttpBackend>, clock: &Arc<dyn Clock>, req: &RequestDescriptor,
    revalidations: &tokio::sync::Mutex<JoinSet<()>>,
) -> Result<Served, Error> {
    if let Some(entry) = ns.read(&req.key(), clock.as_ref()).await? {
        let ns = Arc::clone(ns);
        let backend = Arc::clone(backend);
        let clock = Arc::clone(clock);
        let req = req.clone();

        revalidations.lock().await.spawn(async move {
            match backend.fetch(&req.url).await {
                Ok(resp) if ns.filter().admits(resp.status) => {
                    let entry = entry_from_response(ns.name(), &req, &resp, clock.as_ref());
                    if let Err(err) = ns.write(entry, clock.as_ref()).await {
                        tracing::debug!(url = %req.url, %err, "revalidation write failed");
                    }
                }
                Ok(resp) => {
                    tracing::debug!(url = %req.url, status = resp.status, "revalidation response not admitted");
                }
                Err(err) => {
                    tracing::debug!(url = %req.url, %err, "background revalidation failed");
                }
            }
        });

        return Ok(Served::from_entry(entry));
    }

    let resp = backend.fetch(&req.url).await?;

    if ns.filter().admits(resp.status) {
        ns.write(entry_from_response(ns.name(), req, &resp, clock.as_ref()), clock.as_ref()).await?;
    }

    Ok(Served::from_response(&resp))
}
