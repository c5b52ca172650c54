//! Background translation population.
//! Jobs come off a bounded queue; a semaphore caps concurrent provider
//! calls and every call carries a hard deadline. Failures are written back
//! as the source text itself (negative cache) so a known-failing key is not
//! fetched again on every lookup.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::cache::{PopulateKey, TranslationCache};
use super::TranslationProvider;
use crate::metrics::{metric_names, MetricsRegistry};

struct PopulateJob {
    request_id: String,
    key: PopulateKey,
    enqueued_at: Instant,
}

/// Sending half of the populate queue. Cheap to clone; held by the
/// foreground translation service.
#[derive(Clone)]
pub struct PopulateQueue {
    tx: mpsc::Sender<PopulateJob>,
}

impl PopulateQueue {
    /// Enqueue a populate job. Never blocks: a full queue drops the trigger
    /// and clears the in-flight entry so a later lookup can re-trigger.
    pub(crate) fn enqueue(&self, key: PopulateKey, cache: &TranslationCache) {
        let job = PopulateJob {
            request_id: Uuid::new_v4().to_string(),
            key,
            enqueued_at: Instant::now(),
        };
        match self.tx.try_send(job) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(job)) => {
                warn!(
                    lang = %job.key.lang,
                    "populate queue full, dropping trigger"
                );
                cache.abort_populate(&job.key);
            }
            Err(mpsc::error::TrySendError::Closed(job)) => {
                warn!("populate queue closed, dropping trigger");
                cache.abort_populate(&job.key);
            }
        }
    }
}

/// Start the populate worker pool. The returned queue feeds it; the join
/// handle resolves once the pool drains after cancellation.
pub fn spawn_populate_workers(
    cache: Arc<TranslationCache>,
    provider: Arc<dyn TranslationProvider>,
    metrics: Arc<MetricsRegistry>,
    queue_depth: usize,
    max_concurrent: usize,
    deadline: Duration,
    shutdown: CancellationToken,
) -> (PopulateQueue, tokio::task::JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel::<PopulateJob>(queue_depth);

    let handle = tokio::spawn(async move {
        let permits = Arc::new(Semaphore::new(max_concurrent));
        info!(workers = max_concurrent, queue_depth, "populate worker pool started");

        loop {
            let job = tokio::select! {
                job = rx.recv() => match job {
                    Some(job) => job,
                    None => break,
                },
                _ = shutdown.cancelled() => break,
            };

            metrics.record(
                metric_names::QUEUE_WAIT_POPULATE,
                job.enqueued_at.elapsed().as_secs_f64() * 1000.0,
            );

            let permit = match Arc::clone(&permits).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            let cache = Arc::clone(&cache);
            let provider = Arc::clone(&provider);
            let metrics = Arc::clone(&metrics);
            tokio::spawn(async move {
                let _permit = permit;
                run_job(job, &cache, provider.as_ref(), &metrics, deadline).await;
            });
        }

        info!("populate worker pool exiting");
    });

    (PopulateQueue { tx }, handle)
}

async fn run_job(
    job: PopulateJob,
    cache: &TranslationCache,
    provider: &dyn TranslationProvider,
    metrics: &MetricsRegistry,
    deadline: Duration,
) {
    let started = Instant::now();
    let outcome = tokio::time::timeout(deadline, provider.translate(&job.key.text, &job.key.lang)).await;

    let translated = match outcome {
        Ok(Ok(translated)) => {
            debug!(
                request_id = %job.request_id,
                lang = %job.key.lang,
                persist = job.key.persist,
                "translation resolved"
            );
            translated
        }
        Ok(Err(e)) => {
            warn!(
                request_id = %job.request_id,
                lang = %job.key.lang,
                error = %e,
                "provider failed, negative-caching source text"
            );
            job.key.text.clone()
        }
        Err(_) => {
            warn!(
                request_id = %job.request_id,
                lang = %job.key.lang,
                deadline_secs = deadline.as_secs(),
                "provider deadline exceeded, negative-caching source text"
            );
            job.key.text.clone()
        }
    };

    cache.store(&job.key, translated);
    metrics.record(
        metric_names::POPULATE_DONE,
        started.elapsed().as_secs_f64() * 1000.0,
    );
}
