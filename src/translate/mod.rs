//! Translation subsystem: dual-tier cache, background population, durable
//! persistence. Foreground lookups never wait on the network; missing
//! entries are resolved by the populate worker pool.

pub mod cache;
pub mod persistor;
pub mod populate;
pub mod provider;
pub mod store;

use std::sync::Arc;

use async_trait::async_trait;

use self::cache::TranslationCache;
use self::populate::PopulateQueue;

/// Resolves one missing translation. Implementations must not retry
/// internally; the populate worker treats the first failure as final.
#[async_trait]
pub trait TranslationProvider: Send + Sync {
    async fn translate(&self, text: &str, target_lang: &str) -> Result<String, TranslateError>;
}

#[derive(Debug)]
pub enum TranslateError {
    Api(String),
    Timeout,
    InvalidInput(String),
}

impl std::fmt::Display for TranslateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TranslateError::Api(msg) => write!(f, "API error: {msg}"),
            TranslateError::Timeout => write!(f, "translation timeout"),
            TranslateError::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
        }
    }
}

/// Foreground handle combining the cache with the populate queue.
/// This is what request handlers call; it never blocks and never errors.
#[derive(Clone)]
pub struct TranslationService {
    cache: Arc<TranslationCache>,
    queue: PopulateQueue,
}

impl TranslationService {
    pub fn new(cache: Arc<TranslationCache>, queue: PopulateQueue) -> Self {
        Self { cache, queue }
    }

    /// Serve a translation from the cache, scheduling background population
    /// when the pair has never been resolved. Returns the source text until
    /// a translation lands.
    pub fn lookup(&self, text: &str, lang: &str, persist: bool) -> String {
        let (value, trigger) = self.cache.lookup(text, lang, persist);
        if let Some(key) = trigger {
            self.queue.enqueue(key, &self.cache);
        }
        value
    }

    pub fn cache(&self) -> &Arc<TranslationCache> {
        &self.cache
    }
}
