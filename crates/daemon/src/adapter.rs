//! Stdin control-channel adapter.
//!
//! Reads one JSON control message per line and hands it to the pure
//! handler. Lines that don't parse are logged and skipped; the protocol
//! defines no response message, so nothing is ever written back.

use anyhow::Result;
use satchel_worker::{ControlMessage, Worker, control};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

/// Consume control messages until the input closes.
pub async fn run<R: AsyncRead + Unpin>(worker: &Worker, input: R) -> Result<()> {
    let mut lines = BufReader::new(input).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match serde_json::from_str::<ControlMessage>(line) {
            Ok(msg) => control::handle(worker, msg).await,
            Err(err) => tracing::warn!(%err, "discarding malformed control message"),
        }
    }

    tracing::info!("control channel closed");
    Ok(())
}
