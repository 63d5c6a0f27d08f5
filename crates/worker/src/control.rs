//! Control channel: out-of-band messages from the embedding application.
//!
//! Exactly two message kinds exist, and neither gets an acknowledgement.
//! The handler is a pure function over the tagged message plus the worker;
//! platform adapters (the `satcheld` stdin loop) stay thin.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::worker::Worker;

/// Namespace primed by `CacheAvatarModel`.
pub const AVATAR_MODEL_NAMESPACE: &str = "avatar-models";

/// Wire format: JSON object with a `type` discriminant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type")]
pub enum ControlMessage {
    /// Bypass the multi-tab wait and activate the installed worker
    /// generation at once.
    #[serde(rename = "SKIP_WAITING")]
    SkipWaiting,

    /// Proactively fetch and cache an avatar model, skipping the fetch
    /// when an entry already exists.
    #[serde(rename = "CACHE_AVATAR_MODEL")]
    CacheAvatarModel { url: String },
}

/// Handle one control message.
///
/// Priming failures are logged and discarded; there is no response
/// message defined, so the sender never learns the outcome.
pub async fn handle(worker: &Worker, msg: ControlMessage) {
    match msg {
        ControlMessage::SkipWaiting => {
            if let Err(err) = worker.skip_waiting().await {
                tracing::warn!(%err, "skip-waiting activation failed");
            }
        }
        ControlMessage::CacheAvatarModel { url } => match worker.prime(AVATAR_MODEL_NAMESPACE, &url).await {
            Ok(true) => tracing::debug!(%url, "avatar model primed"),
            Ok(false) => tracing::debug!(%url, "avatar model already cached"),
            Err(err) => tracing::debug!(%url, %err, "avatar model priming failed"),
        },
    }
}
