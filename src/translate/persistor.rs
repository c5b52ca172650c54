//! Periodic durable checkpoint of the persistent translation tier.
//! Every interval the tier is snapshotted under the cache lock and written
//! to the primary and backup locations independently. A failed write leaves
//! the previous on-disk snapshot as the recoverable state.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::cache::TranslationCache;
use super::store::TranslationStore;
use crate::metrics::{metric_names, MetricsRegistry};

/// Start the persist loop. On cancellation it writes one final snapshot
/// before exiting.
pub fn spawn_persist_loop(
    cache: Arc<TranslationCache>,
    store: Arc<TranslationStore>,
    metrics: Arc<MetricsRegistry>,
    interval: Duration,
    shutdown: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        info!(interval_secs = interval.as_secs(), "translation persist loop started");
        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = shutdown.cancelled() => {
                    persist_once(&cache, &store, &metrics);
                    info!("translation persist loop exiting (final flush done)");
                    return;
                }
            }
            persist_once(&cache, &store, &metrics);
        }
    })
}

/// One flush: snapshot the persistent tier, write primary, write backup.
/// Each write failure is logged on its own and does not affect the other.
pub fn persist_once(
    cache: &TranslationCache,
    store: &TranslationStore,
    metrics: &Arc<MetricsRegistry>,
) {
    let span = metrics.span(metric_names::PERSIST_FLUSH);
    let snapshot = cache.persistent_snapshot();

    if let Err(e) = store.save_primary(&snapshot) {
        warn!(error = %e, "primary translation store write failed");
    }
    if let Err(e) = store.save_backup(&snapshot) {
        warn!(error = %e, "backup translation store write failed");
    }

    let elapsed_ms = span.finish();
    debug!(entries = snapshot.len(), elapsed_ms, "translations persisted");
}
