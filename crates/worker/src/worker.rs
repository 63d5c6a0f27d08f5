//! The worker runtime: one explicit object owning the registry, route
//! table, network backend, clock, and lifecycle state.
//!
//! Every outbound request from the embedding application is offered to
//! `Worker::handle`; unmatched requests come back `Unhandled` and proceed
//! to the network untouched. The precache bootstrap and the control
//! channel are independent entry points over the same registry.
//!
//! There is no locking discipline around cache contents: two concurrent
//! CacheFirst misses on one key may both fetch and both write, and the
//! last write wins. That staleness-for-simplicity trade is deliberate.

use std::collections::HashMap;
use std::sync::Arc;

use satchel_core::{CacheStore, Error, PrecacheManifest};
use tokio::task::JoinSet;
use url::Url;

use crate::clock::Clock;
use crate::fetch::HttpBackend;
use crate::namespace::{NamespaceSpec, Registry};
use crate::precache;
use crate::request::{RequestDescriptor, canonicalize};
use crate::routes::{RouteTable, StrategyKind};
use crate::strategy::{self, Served, entry_from_response};

/// Result of offering a request to the worker.
#[derive(Debug)]
pub enum Outcome {
    /// A route matched; this response answers the request.
    Handled(Served),
    /// No route matched; the caller proceeds to the network untouched.
    Unhandled,
}

#[derive(Default)]
struct Lifecycle {
    /// Installed generation not yet in control.
    waiting: Option<PrecacheManifest>,
    /// Resolved URL → revision for the generation in control.
    active: Option<HashMap<String, String>>,
}

/// The worker runtime, constructed once with injected dependencies.
pub struct Worker {
    registry: Registry,
    routes: RouteTable,
    backend: Arc<dyn HttpBackend>,
    clock: Arc<dyn Clock>,
    base: Url,
    precache_concurrency: usize,
    lifecycle: std::sync::Mutex<Lifecycle>,
    revalidations: tokio::sync::Mutex<JoinSet<()>>,
}

impl Worker {
    pub fn new(
        store: CacheStore, routes: RouteTable, namespaces: Vec<NamespaceSpec>, backend: Arc<dyn HttpBackend>,
        clock: Arc<dyn Clock>, base: Url,
    ) -> Self {
        Self {
            registry: Registry::new(store, namespaces),
            routes,
            backend,
            clock,
            base,
            precache_concurrency: 4,
            lifecycle: std::sync::Mutex::new(Lifecycle::default()),
            revalidations: tokio::sync::Mutex::new(JoinSet::new()),
        }
    }

    pub fn with_precache_concurrency(mut self, concurrency: usize) -> Self {
        self.precache_concurrency = concurrency.max(1);
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Install a precache generation: fetch and stage every manifest
    /// asset, all-or-nothing. On success the generation waits for
    /// activation; on failure the store and lifecycle are untouched and
    /// any previously active generation keeps serving.
    pub async fn install(&self, manifest: PrecacheManifest) -> Result<u64, Error> {
        let staged = precache::install(
            self.registry.store(),
            Arc::clone(&self.backend),
            self.clock.as_ref(),
            &manifest,
            &self.base,
            self.precache_concurrency,
        )
        .await?;

        self.lifecycle.lock().unwrap().waiting = Some(manifest);
        Ok(staged)
    }

    /// Take control with the waiting generation: purge precache entries
    /// from prior generations and start answering precache lookups from
    /// the new manifest. A no-op when nothing is waiting.
    pub async fn activate(&self) -> Result<u64, Error> {
        let manifest = match self.lifecycle.lock().unwrap().waiting.take() {
            Some(manifest) => manifest,
            None => return Ok(0),
        };

        let purged = precache::activate(self.registry.store(), &manifest, &self.base).await?;
        let by_url = precache::revisions_by_url(&manifest, &self.base)?;
        self.lifecycle.lock().unwrap().active = Some(by_url);

        tracing::info!(purged, "worker generation activated");
        Ok(purged)
    }

    /// Immediate-activation command: bypass the wait and activate the
    /// installed generation at once.
    pub async fn skip_waiting(&self) -> Result<(), Error> {
        self.activate().await.map(|_| ())
    }

    /// Offer an intercepted request to the dispatcher.
    ///
    /// Precache lookups are answered ahead of route dispatch once a
    /// generation is active. Only GETs are considered; everything else
    /// passes through.
    pub async fn handle(&self, req: &RequestDescriptor) -> Result<Outcome, Error> {
        if req.method != "GET" {
            return Ok(Outcome::Unhandled);
        }

        if let Some(key) = self.precache_key(req) {
            let ns = self.registry.open(precache::PRECACHE_NAMESPACE);
            if let Some(entry) = ns.read(&key, self.clock.as_ref()).await? {
                return Ok(Outcome::Handled(Served::from_entry(entry)));
            }
        }

        let rule = match self.routes.matched(req) {
            Some(rule) => rule,
            None => return Ok(Outcome::Unhandled),
        };

        let ns = self.registry.open(&rule.namespace);
        let served = match rule.strategy {
            StrategyKind::CacheFirst => {
                strategy::cache_first(&ns, self.backend.as_ref(), self.clock.as_ref(), req).await?
            }
            StrategyKind::NetworkFirst => {
                strategy::network_first(&ns, self.backend.as_ref(), self.clock.as_ref(), req).await?
            }
            StrategyKind::StaleWhileRevalidate => {
                strategy::stale_while_revalidate(&ns, &self.backend, &self.clock, req, &self.revalidations).await?
            }
        };

        Ok(Outcome::Handled(served))
    }

    fn precache_key(&self, req: &RequestDescriptor) -> Option<String> {
        let lifecycle = self.lifecycle.lock().unwrap();
        let active = lifecycle.active.as_ref()?;
        let revision = active.get(req.url.as_str())?;
        Some(precache::asset_key(&req.url, revision))
    }

    /// Proactively fetch and store a URL into a namespace, skipping the
    /// fetch entirely when an entry already exists.
    ///
    /// Returns true when a fetch-and-store happened, false for the
    /// existing-entry no-op. This is the only write path not triggered by
    /// an intercepted request.
    pub async fn prime(&self, namespace: &str, url: &str) -> Result<bool, Error> {
        let url = canonicalize(url)?;
        let ns = self.registry.open(namespace);
        let key = satchel_core::key::entry_key("GET", url.as_str(), "");

        if ns.contains(&key).await? {
            tracing::debug!(namespace, %url, "prime skipped, entry exists");
            return Ok(false);
        }

        let resp = self.backend.fetch(&url).await?;
        if !ns.filter().admits(resp.status) {
            return Err(Error::NetworkFailure(format!("status {} for {}", resp.status, url)));
        }

        let req = RequestDescriptor {
            method: "GET".to_string(),
            url,
            destination: crate::request::Destination::Other,
            same_origin: false,
        };
        ns.write(entry_from_response(namespace, &req, &resp, self.clock.as_ref()), self.clock.as_ref()).await?;
        Ok(true)
    }

    /// Await every tracked background revalidation.
    ///
    /// Purely for observability and tests; served responses never depend
    /// on these tasks, and worker teardown is allowed to drop them.
    pub async fn revalidation_settled(&self) {
        let mut tasks = self.revalidations.lock().await;
        while tasks.join_next().await.is_some() {}
    }
}
