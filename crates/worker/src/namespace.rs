//! Cache namespaces and the registry that opens them.
//!
//! A namespace is an isolated, named partition of the persistent store,
//! bound to one admission filter and one eviction policy. Namespaces are
//! opened lazily on first access and persist across worker restarts.
//!
//! Eviction is lazy only: a sweep trails every successful write, and a
//! read drops entries that have outlived `max_age`. There is no
//! background timer.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{Duration, SecondsFormat};
use satchel_core::{CacheStore, Entry, Error};

use crate::clock::Clock;
use crate::filter::CacheableFilter;

/// Per-namespace eviction bounds. Both are optional and independent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExpirationPolicy {
    /// Hard cap on entry count; oldest-inserted entries go first.
    pub max_entries: Option<usize>,
    /// Entries older than this are purged opportunistically.
    pub max_age: Option<Duration>,
}

impl ExpirationPolicy {
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn new(max_entries: Option<usize>, max_age: Option<Duration>) -> Self {
        Self { max_entries, max_age }
    }
}

/// Declared configuration for one namespace.
#[derive(Debug, Clone)]
pub struct NamespaceSpec {
    pub name: String,
    pub policy: ExpirationPolicy,
    pub allowed_statuses: Vec<u16>,
}

impl NamespaceSpec {
    pub fn new(name: &str, policy: ExpirationPolicy) -> Self {
        Self { name: name.to_string(), policy, allowed_statuses: vec![0, 200] }
    }
}

/// An opened namespace: reads, writes, and the trailing eviction sweep.
#[derive(Debug, Clone)]
pub struct Namespace {
    name: String,
    policy: ExpirationPolicy,
    filter: CacheableFilter,
    store: CacheStore,
}

impl Namespace {
    fn from_spec(spec: &NamespaceSpec, store: CacheStore) -> Self {
        Self {
            name: spec.name.clone(),
            policy: spec.policy,
            filter: CacheableFilter::new(spec.allowed_statuses.clone()),
            store,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn filter(&self) -> &CacheableFilter {
        &self.filter
    }

    pub fn policy(&self) -> &ExpirationPolicy {
        &self.policy
    }

    /// Read an entry by key.
    ///
    /// An entry older than `max_age` is treated as a miss; the expired
    /// rows are purged on the way out rather than waiting for the next
    /// write's sweep.
    pub async fn read(&self, key: &str, clock: &dyn Clock) -> Result<Option<Entry>, Error> {
        let entry = match self.store.get_entry(&self.name, key).await? {
            Some(entry) => entry,
            None => return Ok(None),
        };

        if let Some(max_age) = self.policy.max_age {
            let cutoff = age_cutoff(clock, max_age);
            if entry.inserted_at < cutoff {
                let purged = self.store.purge_inserted_before(&self.name, &cutoff).await?;
                tracing::debug!(namespace = %self.name, purged, "expired entry purged on read");
                return Ok(None);
            }
        }

        Ok(Some(entry))
    }

    /// Whether an entry exists for the key.
    pub async fn contains(&self, key: &str) -> Result<bool, Error> {
        self.store.contains_entry(&self.name, key).await
    }

    /// Write an entry and run the trailing eviction sweep.
    pub async fn write(&self, entry: Entry, clock: &dyn Clock) -> Result<(), Error> {
        self.store.upsert_entry(&entry).await?;
        self.sweep(clock).await?;
        Ok(())
    }

    /// Enforce the namespace bounds: age purge first, then the entry cap.
    ///
    /// Returns the number of evicted entries.
    pub async fn sweep(&self, clock: &dyn Clock) -> Result<u64, Error> {
        let mut evicted = 0;

        if let Some(max_age) = self.policy.max_age {
            let cutoff = age_cutoff(clock, max_age);
            evicted += self.store.purge_inserted_before(&self.name, &cutoff).await?;
        }

        if let Some(max_entries) = self.policy.max_entries {
            evicted += self.store.purge_over_cap(&self.name, max_entries).await?;
        }

        if evicted > 0 {
            tracing::debug!(namespace = %self.name, evicted, "eviction sweep");
        }

        Ok(evicted)
    }
}

fn age_cutoff(clock: &dyn Clock, max_age: Duration) -> String {
    (clock.now() - max_age).to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Named, isolated partitions over one shared store.
///
/// Namespaces are opened lazily on first access. Opening a name with no
/// declared spec yields an unbounded namespace with the default filter,
/// matching the underlying storage's behavior of materializing caches on
/// first use.
pub struct Registry {
    store: CacheStore,
    specs: HashMap<String, NamespaceSpec>,
    open: Mutex<HashMap<String, Arc<Namespace>>>,
}

impl Registry {
    pub fn new(store: CacheStore, specs: Vec<NamespaceSpec>) -> Self {
        let specs = specs.into_iter().map(|s| (s.name.clone(), s)).collect();
        Self { store, specs, open: Mutex::new(HashMap::new()) }
    }

    /// Open a namespace by name, creating the handle on first access.
    pub fn open(&self, name: &str) -> Arc<Namespace> {
        let mut open = self.open.lock().unwrap();
        if let Some(ns) = open.get(name) {
            return Arc::clone(ns);
        }

        let ns = match self.specs.get(name) {
            Some(spec) => Namespace::from_spec(spec, self.store.clone()),
            None => Namespace::from_spec(
                &NamespaceSpec::new(name, ExpirationPolicy::unbounded()),
                self.store.clone(),
            ),
        };

        let ns = Arc::new(ns);
        open.insert(name.to_string(), Arc::clone(&ns));
        ns
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }
}
