//! Entry key derivation.

use sha2::{Digest, Sha256};

/// Compute the storage key for a cached response.
///
/// The key covers request identity (method + URL) plus a variant
/// discriminator. For precache entries the variant is the manifest
/// revision, so a new build revision of the same URL gets its own entry;
/// for runtime caches it is empty.
pub fn entry_key(method: &str, url: &str, variant: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    hasher.update(b"\n");
    hasher.update(variant.as_bytes());
    hex::encode(hasher.finalize())
}
