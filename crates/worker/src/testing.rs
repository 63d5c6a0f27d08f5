//! Shared test fixtures: a canned network backend with fetch counters.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use satchel_core::{Entry, Error};
use url::Url;

use crate::clock::Clock;
use crate::fetch::{BackendResponse, HttpBackend};

pub(crate) fn make_entry(namespace: &str, url: &str, clock: &dyn Clock) -> Entry {
    Entry {
        key: satchel_core::key::entry_key("GET", url, ""),
        namespace: namespace.to_string(),
        method: "GET".to_string(),
        url: url.to_string(),
        status: 200,
        headers: vec![("content-type".to_string(), "application/octet-stream".to_string())],
        body: url.as_bytes().to_vec(),
        inserted_at: clock.now_rfc3339(),
        revision: None,
    }
}

/// Canned responses keyed by URL; unknown URLs fail as transport errors.
/// Every fetch attempt is counted, including failed ones.
pub(crate) struct MockBackend {
    responses: Mutex<HashMap<String, BackendResponse>>,
    fetches: Mutex<HashMap<String, usize>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self { responses: Mutex::new(HashMap::new()), fetches: Mutex::new(HashMap::new()) }
    }

    pub fn respond(&self, url: &str, status: u16, body: &[u8]) {
        self.responses.lock().unwrap().insert(
            url.to_string(),
            BackendResponse {
                status,
                headers: vec![("content-type".to_string(), "application/octet-stream".to_string())],
                body: Bytes::copy_from_slice(body),
            },
        );
    }

    /// Make subsequent fetches of this URL fail at the transport level.
    pub fn go_offline(&self, url: &str) {
        self.responses.lock().unwrap().remove(url);
    }

    pub fn fetch_count(&self, url: &str) -> usize {
        self.fetches.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    pub fn total_fetches(&self) -> usize {
        self.fetches.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl HttpBackend for MockBackend {
    async fn fetch(&self, url: &Url) -> Result<BackendResponse, Error> {
        *self.fetches.lock().unwrap().entry(url.to_string()).or_insert(0) += 1;

        match self.responses.lock().unwrap().get(url.as_str()) {
            Some(resp) => Ok(resp.clone()),
            None => Err(Error::NetworkFailure(format!("connection refused: {url}"))),
        }
    }
}
