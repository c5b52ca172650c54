//! Periodic retirement of expired events.
//! Cycle cadence carries random jitter to desynchronize repeated load on the
//! event store; a failed enumeration backs off without killing the loop, and
//! a single bad record never aborts a cycle.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{format_details, EventStore, LiveEvent, Notifier};
use crate::metrics::{metric_names, MetricsRegistry};

/// Timing and timezone knobs for the sweep loop, built from `AppConfig`.
#[derive(Debug, Clone)]
pub struct SweepConfig {
    pub interval: Duration,
    pub jitter: Duration,
    pub backoff: Duration,
    pub notify_deadline: Duration,
    pub timezone: FixedOffset,
}

/// Counters from one sweep cycle.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepStats {
    pub scanned: usize,
    pub retired: usize,
    pub skipped: usize,
    pub item_failures: usize,
    pub notify_failures: usize,
}

/// Start the sweep loop. Runs until the token is cancelled.
pub fn spawn_sweep_loop(
    store: Arc<dyn EventStore>,
    notifier: Arc<dyn Notifier>,
    metrics: Arc<MetricsRegistry>,
    config: SweepConfig,
    shutdown: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            base_secs = config.interval.as_secs(),
            jitter_secs = config.jitter.as_secs(),
            "event sweep loop started"
        );
        loop {
            let jitter = Duration::from_secs(rand::rng().random_range(0..=config.jitter.as_secs()));
            tokio::select! {
                _ = tokio::time::sleep(config.interval + jitter) => {}
                _ = shutdown.cancelled() => break,
            }

            let span = metrics.span(metric_names::SWEEP_CYCLE);
            let now = Utc::now().with_timezone(&config.timezone);
            match sweep_cycle(&store, &notifier, &metrics, &config, now).await {
                Ok(stats) => {
                    span.finish();
                    if stats.retired > 0 || stats.item_failures > 0 {
                        info!(
                            scanned = stats.scanned,
                            retired = stats.retired,
                            item_failures = stats.item_failures,
                            notify_failures = stats.notify_failures,
                            "sweep cycle done"
                        );
                    } else {
                        debug!(scanned = stats.scanned, "sweep cycle done, nothing expired");
                    }
                }
                Err(e) => {
                    span.finish();
                    warn!(
                        error = %e,
                        backoff_secs = config.backoff.as_secs(),
                        "event enumeration failed, backing off"
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(config.backoff) => {}
                        _ = shutdown.cancelled() => break,
                    }
                }
            }
        }
        info!("event sweep loop exiting");
    })
}

/// One pass over all live events. An `Err` means enumeration itself failed;
/// per-item failures are absorbed into the stats.
pub async fn sweep_cycle(
    store: &Arc<dyn EventStore>,
    notifier: &Arc<dyn Notifier>,
    metrics: &Arc<MetricsRegistry>,
    config: &SweepConfig,
    now: DateTime<FixedOffset>,
) -> Result<SweepStats, String> {
    let store_for_list = Arc::clone(store);
    let events = tokio::task::spawn_blocking(move || store_for_list.list_live_events())
        .await
        .map_err(|e| format!("event listing task panicked: {e}"))??;

    let mut stats = SweepStats::default();
    for event in events {
        stats.scanned += 1;

        let expiry = match expiry_instant(&event, config.timezone) {
            Ok(instant) => instant,
            Err(e) => {
                warn!(event_id = event.id, error = %e, "unparseable event end fields, skipping");
                stats.item_failures += 1;
                continue;
            }
        };

        if expiry > now {
            stats.skipped += 1;
            continue;
        }

        // Authoritative removal first; the notification only describes it.
        let store_for_delete = Arc::clone(store);
        let id = event.id;
        match tokio::task::spawn_blocking(move || store_for_delete.delete_event(id)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(event_id = id, error = %e, "event delete failed, skipping");
                stats.item_failures += 1;
                continue;
            }
            Err(e) => {
                warn!(event_id = id, error = %e, "event delete task panicked, skipping");
                stats.item_failures += 1;
                continue;
            }
        }
        stats.retired += 1;
        debug!(event_id = id, expiry = %expiry, "expired event retired");

        let body = format!(
            "Hey there, your event has ended and has been removed from the listing.\n\n\
             Event details:\n\n{}\n\nThank you!",
            format_details(&event)
        );
        let notify_span = metrics.span(metric_names::NOTIFY_DONE);
        let sent = tokio::time::timeout(
            config.notify_deadline,
            notifier.send_notification(&event.organizer_email, "Event Ended", &body),
        )
        .await;
        notify_span.finish();
        match sent {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(event_id = id, error = %e, "notification failed (deletion stands)");
                stats.notify_failures += 1;
            }
            Err(_) => {
                warn!(event_id = id, "notification timed out (deletion stands)");
                stats.notify_failures += 1;
            }
        }
    }

    Ok(stats)
}

/// Combine an event's end date and end time into one instant in the fixed
/// timezone. Parsed once per event per cycle; any malformed field fails the
/// item, not the cycle.
pub fn expiry_instant(event: &LiveEvent, tz: FixedOffset) -> Result<DateTime<FixedOffset>, String> {
    let date = NaiveDate::parse_from_str(&event.end_date, "%Y-%m-%d")
        .map_err(|e| format!("bad end date {:?}: {e}", event.end_date))?;
    let time = NaiveTime::parse_from_str(&event.end_time, "%H:%M")
        .map_err(|e| format!("bad end time {:?}: {e}", event.end_time))?;
    NaiveDateTime::new(date, time)
        .and_local_timezone(tz)
        .single()
        .ok_or_else(|| "ambiguous local time".to_string())
}
