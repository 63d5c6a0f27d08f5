//! Precache manifest types.
//!
//! The manifest is computed by the build step that produces the client
//! bundle; this crate only consumes it. Order is preserved as supplied.
//! URLs may be root-relative; the installer resolves them against the
//! application origin.

use serde::{Deserialize, Serialize};

use crate::Error;

/// One precached asset: a URL plus the build revision of its content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ManifestEntry {
    pub url: String,
    pub revision: String,
}

/// An ordered list of assets to install at worker install time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(transparent)]
pub struct PrecacheManifest {
    pub entries: Vec<ManifestEntry>,
}

impl PrecacheManifest {
    /// Parse a manifest from its JSON wire form: an array of
    /// `{url, revision}` objects.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        serde_json::from_str(json).map_err(|e| Error::InvalidInput(format!("invalid precache manifest: {e}")))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_from_json() {
        let json = r#"[
            {"url": "/index.html", "revision": "abc123"},
            {"url": "/app.js", "revision": "def456"}
        ]"#;
        let manifest = PrecacheManifest::from_json(json).unwrap();
        assert_eq!(manifest.len(), 2);
        assert_eq!(manifest.entries[0].url, "/index.html");
        assert_eq!(manifest.entries[1].revision, "def456");
    }

    #[test]
    fn test_manifest_rejects_garbage() {
        assert!(PrecacheManifest::from_json("not json").is_err());
        assert!(PrecacheManifest::from_json(r#"{"url": "x"}"#).is_err());
    }

    #[test]
    fn test_manifest_preserves_order() {
        let json = r#"[{"url": "/b", "revision": "1"}, {"url": "/a", "revision": "1"}]"#;
        let manifest = PrecacheManifest::from_json(json).unwrap();
        assert_eq!(manifest.entries[0].url, "/b");
        assert_eq!(manifest.entries[1].url, "/a");
    }
}
