//! Campline background core: translation caching with durable persistence,
//! admission control, and expired-event sweeping.
//! The web layer holds an [`AppContext`] and calls the foreground handles
//! (`translations`, `gate`); the background loops run until shutdown.

pub mod config;
pub mod events;
pub mod gate;
pub mod metrics;
pub mod notify;
pub mod translate;

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use config::AppConfig;
use events::store::SqliteEventStore;
use events::sweeper::{spawn_sweep_loop, SweepConfig};
use events::{EventStore, Notifier};
use gate::AdmissionGate;
use metrics::MetricsRegistry;
use notify::{DisabledNotifier, HttpMailer};
use translate::cache::TranslationCache;
use translate::persistor::spawn_persist_loop;
use translate::populate::spawn_populate_workers;
use translate::provider::HttpTranslator;
use translate::store::TranslationStore;
use translate::{TranslationProvider, TranslationService};

/// Initialize tracing for binaries embedding the core.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "campline_core=debug".parse().unwrap()),
        )
        .with_target(true)
        .init();
}

/// Handles to the background core. Request handlers call `translations` and
/// `gate`; both complete without ever waiting on the network.
pub struct AppContext {
    pub config: AppConfig,
    pub translations: TranslationService,
    pub gate: Arc<AdmissionGate>,
    pub metrics: Arc<MetricsRegistry>,
    shutdown: CancellationToken,
    loops: Vec<JoinHandle<()>>,
}

impl AppContext {
    /// Wire the real collaborators from config and start every background
    /// loop. A missing mail key degrades to disabled notifications rather
    /// than refusing to start.
    pub fn start(config: AppConfig) -> Result<Self, String> {
        let provider: Arc<dyn TranslationProvider> = Arc::new(
            HttpTranslator::new(config.provider_url.clone()).map_err(|e| e.to_string())?,
        );
        let event_store: Arc<dyn EventStore> =
            Arc::new(SqliteEventStore::open(&config.events_db_path)?);
        let notifier: Arc<dyn Notifier> =
            match HttpMailer::new(config.mail_api_url.clone(), config.mail_from.clone()) {
                Ok(mailer) => Arc::new(mailer),
                Err(e) => {
                    warn!(error = %e, "mail relay unavailable");
                    Arc::new(DisabledNotifier::new())
                }
            };
        Self::start_with(config, provider, event_store, notifier)
    }

    /// Start with injected collaborators (tests, embedding).
    pub fn start_with(
        config: AppConfig,
        provider: Arc<dyn TranslationProvider>,
        event_store: Arc<dyn EventStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, String> {
        let timezone = config.timezone().map_err(|e| e.to_string())?;
        let metrics = Arc::new(MetricsRegistry::new());
        let shutdown = CancellationToken::new();

        let store = Arc::new(TranslationStore::new(
            config.translations_path.clone(),
            config.translations_backup_path.clone(),
        ));
        let cache = Arc::new(TranslationCache::new(
            config.base_lang.clone(),
            config.merged_value_reads,
        ));
        cache.restore_persistent(store.load());

        let (queue, populate_handle) = spawn_populate_workers(
            Arc::clone(&cache),
            provider,
            Arc::clone(&metrics),
            config.populate_queue_depth,
            config.populate_workers,
            config.provider_deadline(),
            shutdown.child_token(),
        );
        let persist_handle = spawn_persist_loop(
            Arc::clone(&cache),
            store,
            Arc::clone(&metrics),
            config.persist_interval(),
            shutdown.child_token(),
        );
        let sweep_handle = spawn_sweep_loop(
            event_store,
            notifier,
            Arc::clone(&metrics),
            SweepConfig {
                interval: config.sweep_interval(),
                jitter: config.sweep_jitter(),
                backoff: config.sweep_backoff(),
                notify_deadline: config.notify_deadline(),
                timezone,
            },
            shutdown.child_token(),
        );

        let translations = TranslationService::new(cache, queue);
        let gate = Arc::new(AdmissionGate::new(config.gate_capacity));

        info!("background core started");
        Ok(Self {
            config,
            translations,
            gate,
            metrics,
            shutdown,
            loops: vec![populate_handle, persist_handle, sweep_handle],
        })
    }

    /// Cancel every background loop and wait for them to finish. The persist
    /// loop writes one final snapshot on its way out.
    pub async fn shutdown(mut self) {
        self.shutdown.cancel();
        for handle in self.loops.drain(..) {
            if let Err(e) = handle.await {
                warn!(error = %e, "background loop join failed");
            }
        }
        info!("background core stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::time::Duration;

    use super::translate::TranslateError;

    struct EchoProvider {
        calls: Mutex<usize>,
    }

    #[async_trait]
    impl TranslationProvider for EchoProvider {
        async fn translate(&self, text: &str, target_lang: &str) -> Result<String, TranslateError> {
            *self.calls.lock() += 1;
            Ok(format!("{text} [{target_lang}]"))
        }
    }

    struct EmptyStore;

    impl EventStore for EmptyStore {
        fn list_live_events(&self) -> Result<Vec<events::LiveEvent>, String> {
            Ok(Vec::new())
        }

        fn delete_event(&self, _id: i64) -> Result<(), String> {
            Ok(())
        }
    }

    fn test_config(dir: &std::path::Path) -> AppConfig {
        AppConfig {
            translations_path: dir.join("translations.json"),
            translations_backup_path: dir.join("translations_backup.json"),
            events_db_path: dir.join("events.db"),
            ..AppConfig::default()
        }
    }

    #[tokio::test]
    async fn context_translates_and_flushes_on_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let store_paths = (
            config.translations_path.clone(),
            config.translations_backup_path.clone(),
        );

        let context = AppContext::start_with(
            config,
            Arc::new(EchoProvider {
                calls: Mutex::new(0),
            }),
            Arc::new(EmptyStore),
            Arc::new(notify::DisabledNotifier::new()),
        )
        .unwrap();

        assert_eq!(context.translations.lookup("Hello", "fr", true), "Hello");
        for _ in 0..100 {
            if context.translations.lookup("Hello", "fr", true) == "Hello [fr]" {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(context.translations.lookup("Hello", "fr", true), "Hello [fr]");

        context.shutdown().await;

        // The final flush persisted the resolved entry to both locations.
        let store = TranslationStore::new(store_paths.0, store_paths.1);
        let reloaded = store.load();
        assert_eq!(reloaded["Hello"]["fr"], "Hello [fr]");
    }

    #[tokio::test]
    async fn seeded_store_serves_without_provider_calls() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());

        let mut seeded = translate::cache::TranslationMap::new();
        seeded.insert(
            "Hello".into(),
            std::collections::HashMap::from([("fr".into(), "Bonjour".into())]),
        );
        TranslationStore::new(
            config.translations_path.clone(),
            config.translations_backup_path.clone(),
        )
        .save_primary(&seeded)
        .unwrap();

        let provider = Arc::new(EchoProvider {
            calls: Mutex::new(0),
        });
        let context = AppContext::start_with(
            config,
            Arc::clone(&provider) as Arc<dyn TranslationProvider>,
            Arc::new(EmptyStore),
            Arc::new(notify::DisabledNotifier::new()),
        )
        .unwrap();

        assert_eq!(context.translations.lookup("Hello", "fr", true), "Bonjour");
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(*provider.calls.lock(), 0);

        context.shutdown().await;
    }

    #[tokio::test]
    async fn gate_is_shared_and_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let otp_cooldown = config.cooldown(gate::GateAction::OtpIssue);

        let context = AppContext::start_with(
            config,
            Arc::new(EchoProvider {
                calls: Mutex::new(0),
            }),
            Arc::new(EmptyStore),
            Arc::new(notify::DisabledNotifier::new()),
        )
        .unwrap();

        let first = context
            .gate
            .check_and_record("1.2.3.4", gate::GateAction::OtpIssue, otp_cooldown);
        assert!(first.is_allowed());
        let second = context
            .gate
            .check_and_record("1.2.3.4", gate::GateAction::OtpIssue, otp_cooldown);
        assert!(!second.is_allowed());
        assert!(second.retry_after() <= otp_cooldown);

        context.shutdown().await;
    }
}
