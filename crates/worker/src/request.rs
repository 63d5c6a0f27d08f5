//! Intercepted request descriptors.
//!
//! A descriptor carries the request attributes the route predicates see:
//! canonical URL, destination type, and whether the request targets the
//! embedding application's own origin.

use satchel_core::Error;
use serde::{Deserialize, Serialize};
use url::Url;

/// What the requested resource will be used for, mirroring browser
/// request destinations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Destination {
    /// A navigation to a page.
    Document,
    Style,
    Script,
    Image,
    Font,
    Audio,
    Video,
    Other,
}

/// An intercepted outbound request.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub method: String,
    pub url: Url,
    pub destination: Destination,
    pub same_origin: bool,
}

impl RequestDescriptor {
    /// Build a GET descriptor from a raw URL string.
    ///
    /// The URL is canonicalized for consistent cache keys:
    /// 1. Trim leading/trailing whitespace
    /// 2. Default scheme to https:// if missing
    /// 3. Lowercase the host
    /// 4. Remove fragment (#...)
    /// 5. Keep query string intact (do not reorder)
    ///
    /// `app_origin` is the origin the embedding application is served
    /// from; it determines the `same_origin` attribute.
    pub fn get(input: &str, destination: Destination, app_origin: &Url) -> Result<Self, Error> {
        let url = canonicalize(input)?;
        let same_origin = url.origin() == app_origin.origin();
        Ok(Self { method: "GET".to_string(), url, destination, same_origin })
    }

    /// Cache key for this request in a runtime namespace.
    pub fn key(&self) -> String {
        satchel_core::key::entry_key(&self.method, self.url.as_str(), "")
    }

    /// Whether this is a page navigation.
    pub fn is_navigation(&self) -> bool {
        self.destination == Destination::Document
    }
}

/// Canonicalize a URL string for consistent caching.
pub fn canonicalize(input: &str) -> Result<Url, Error> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(Error::InvalidUrl("empty URL".into()));
    }

    let url_str = if trimmed.contains("://") { trimmed.to_string() } else { format!("https://{trimmed}") };

    let mut parsed = Url::parse(&url_str).map_err(|e| Error::InvalidUrl(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(Error::InvalidUrl(format!("unsupported scheme: {scheme}"))),
    }

    if let Some(host) = parsed.host_str() {
        let lowered = host.to_lowercase();
        parsed
            .set_host(Some(&lowered))
            .map_err(|e| Error::InvalidUrl(e.to_string()))?;
    }

    parsed.set_fragment(None);

    Ok(parsed)
}
