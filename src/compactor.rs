use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::engine::WalRoomStore;

const CHECK_INTERVAL: Duration = Duration::from_secs(10);

/// Background task that rewrites the WAL as a snapshot once enough appends pile up.
pub async fn run_compactor(store: Arc<WalRoomStore>, threshold: u64) {
    let mut interval = tokio::time::interval(CHECK_INTERVAL);
    loop {
        interval.tick().await;
        if let Err(e) = compact_if_due(&store, threshold).await {
            tracing::error!("WAL compaction failed: {e}");
        }
    }
}

/// Compact when at least `threshold` appends happened since the last snapshot.
/// Returns whether a compaction ran.
pub async fn compact_if_due(
    store: &WalRoomStore,
    threshold: u64,
) -> Result<bool, crate::engine::StoreError> {
    let appends = store.appends_since_compact().await?;
    if appends < threshold {
        return Ok(false);
    }
    store.compact().await?;
    info!("compacted WAL after {appends} appends");
    Ok(true)
}
