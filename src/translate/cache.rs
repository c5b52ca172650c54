//! Two-tier translation cache.
//! The persistent tier is flushed to disk by the persist loop; the ephemeral
//! tier is memory-only and vanishes on restart. One lock guards both tiers
//! and the in-flight table; critical sections never touch the network.

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;

/// Source text -> (language code -> translated text).
pub type TranslationMap = HashMap<String, HashMap<String, String>>;

/// Identity of one populate request. Single-flight de-duplication keys on
/// the full triple, so a persistent and an ephemeral fetch for the same pair
/// are distinct requests.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PopulateKey {
    pub text: String,
    pub lang: String,
    pub persist: bool,
}

#[derive(Default)]
struct CacheInner {
    persistent: TranslationMap,
    ephemeral: TranslationMap,
    in_flight: HashSet<PopulateKey>,
}

pub struct TranslationCache {
    inner: Mutex<CacheInner>,
    base_lang: String,
    merged_value_reads: bool,
}

impl TranslationCache {
    pub fn new(base_lang: impl Into<String>, merged_value_reads: bool) -> Self {
        Self {
            inner: Mutex::new(CacheInner::default()),
            base_lang: base_lang.into(),
            merged_value_reads,
        }
    }

    /// Look up a translation. Returns the text to serve plus, when the pair
    /// has never been resolved and no fetch is in flight, the key the caller
    /// must enqueue for population.
    ///
    /// The existence check merges the tiers (an ephemeral record shadows the
    /// whole persistent record for its source text); the value read takes
    /// only the tier selected by `persist` unless `merged_value_reads` is
    /// configured.
    pub fn lookup(&self, text: &str, lang: &str, persist: bool) -> (String, Option<PopulateKey>) {
        if lang.is_empty() || lang == self.base_lang {
            return (text.to_string(), None);
        }

        let mut inner = self.inner.lock();

        let merged_entry = inner.ephemeral.get(text).or_else(|| inner.persistent.get(text));
        let resolved = merged_entry.map_or(false, |langs| langs.contains_key(lang));

        let value = if self.merged_value_reads {
            merged_entry.and_then(|langs| langs.get(lang)).cloned()
        } else {
            let tier = if persist {
                &inner.persistent
            } else {
                &inner.ephemeral
            };
            tier.get(text).and_then(|langs| langs.get(lang)).cloned()
        }
        .unwrap_or_else(|| text.to_string());

        let trigger = if resolved {
            None
        } else {
            let key = PopulateKey {
                text: text.to_string(),
                lang: lang.to_string(),
                persist,
            };
            // Newly inserted means no identical fetch is in flight.
            if inner.in_flight.insert(key.clone()) {
                Some(key)
            } else {
                None
            }
        };

        (value, trigger)
    }

    /// Store a resolved (or negative-cached) translation into the tier the
    /// request selected and clear its in-flight entry. Last writer wins.
    pub fn store(&self, key: &PopulateKey, translated: String) {
        let mut inner = self.inner.lock();
        let tier = if key.persist {
            &mut inner.persistent
        } else {
            &mut inner.ephemeral
        };
        tier.entry(key.text.clone())
            .or_default()
            .insert(key.lang.clone(), translated);
        inner.in_flight.remove(key);
    }

    /// Drop the in-flight entry for a populate request that never got
    /// enqueued, so a later lookup can re-trigger it.
    pub fn abort_populate(&self, key: &PopulateKey) {
        self.inner.lock().in_flight.remove(key);
    }

    /// Clone of the persistent tier, for the persist loop.
    pub fn persistent_snapshot(&self) -> TranslationMap {
        self.inner.lock().persistent.clone()
    }

    /// Replace the persistent tier wholesale (startup seeding from disk).
    pub fn restore_persistent(&self, map: TranslationMap) {
        self.inner.lock().persistent = map;
    }

    pub(crate) fn in_flight_count(&self) -> usize {
        self.inner.lock().in_flight.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> TranslationCache {
        TranslationCache::new("en", false)
    }

    #[test]
    fn base_language_short_circuits() {
        let cache = cache();
        assert_eq!(cache.lookup("Hello", "en", true), ("Hello".into(), None));
        assert_eq!(cache.lookup("Hello", "", true), ("Hello".into(), None));
        assert_eq!(cache.in_flight_count(), 0);
    }

    #[test]
    fn miss_returns_source_and_triggers_once() {
        let cache = cache();
        let (value, trigger) = cache.lookup("Hello", "fr", true);
        assert_eq!(value, "Hello");
        let key = trigger.expect("first miss must trigger population");
        assert_eq!(key.lang, "fr");
        assert!(key.persist);

        // Second lookup during the in-flight window: miss, but no re-trigger.
        let (value, trigger) = cache.lookup("Hello", "fr", true);
        assert_eq!(value, "Hello");
        assert!(trigger.is_none());
        assert_eq!(cache.in_flight_count(), 1);
    }

    #[test]
    fn store_resolves_and_clears_in_flight() {
        let cache = cache();
        let (_, trigger) = cache.lookup("Hello", "fr", true);
        let key = trigger.unwrap();

        cache.store(&key, "Bonjour".into());
        assert_eq!(cache.in_flight_count(), 0);

        let (value, trigger) = cache.lookup("Hello", "fr", true);
        assert_eq!(value, "Bonjour");
        assert!(trigger.is_none());
    }

    #[test]
    fn tiers_are_independent_for_value_reads() {
        let cache = cache();
        cache.store(
            &PopulateKey {
                text: "Hello".into(),
                lang: "fr".into(),
                persist: false,
            },
            "Bonjour".into(),
        );

        // The value sits in the ephemeral tier; a persistent read misses it,
        // and the merged existence check suppresses a new trigger.
        let (value, trigger) = cache.lookup("Hello", "fr", true);
        assert_eq!(value, "Hello");
        assert!(trigger.is_none());

        let (value, _) = cache.lookup("Hello", "fr", false);
        assert_eq!(value, "Bonjour");
    }

    #[test]
    fn merged_value_reads_flag_reads_across_tiers() {
        let cache = TranslationCache::new("en", true);
        cache.store(
            &PopulateKey {
                text: "Hello".into(),
                lang: "fr".into(),
                persist: false,
            },
            "Bonjour".into(),
        );

        let (value, trigger) = cache.lookup("Hello", "fr", true);
        assert_eq!(value, "Bonjour");
        assert!(trigger.is_none());
    }

    #[test]
    fn ephemeral_record_shadows_persistent_record_for_existence() {
        let cache = cache();
        cache.store(
            &PopulateKey {
                text: "Hello".into(),
                lang: "fr".into(),
                persist: true,
            },
            "Bonjour".into(),
        );
        cache.store(
            &PopulateKey {
                text: "Hello".into(),
                lang: "de".into(),
                persist: false,
            },
            "Hallo".into(),
        );

        // The ephemeral record for "Hello" only has "de", and it shadows the
        // persistent record entirely, so "fr" looks unresolved again.
        let (value, trigger) = cache.lookup("Hello", "fr", true);
        assert_eq!(value, "Bonjour");
        assert!(trigger.is_some());
    }

    #[test]
    fn snapshot_and_restore_round_trip() {
        let cache = cache();
        cache.store(
            &PopulateKey {
                text: "नमस्ते".into(),
                lang: "fr".into(),
                persist: true,
            },
            "Bonjour".into(),
        );

        let snapshot = cache.persistent_snapshot();
        assert_eq!(snapshot["नमस्ते"]["fr"], "Bonjour");

        let other = TranslationCache::new("en", false);
        other.restore_persistent(snapshot);
        let (value, trigger) = other.lookup("नमस्ते", "fr", true);
        assert_eq!(value, "Bonjour");
        assert!(trigger.is_none());
    }

    #[test]
    fn last_writer_wins_on_overwrite() {
        let cache = cache();
        let key = PopulateKey {
            text: "Hello".into(),
            lang: "fr".into(),
            persist: true,
        };
        cache.store(&key, "Salut".into());
        cache.store(&key, "Bonjour".into());
        assert_eq!(cache.lookup("Hello", "fr", true).0, "Bonjour");
    }

    #[test]
    fn abort_allows_retrigger() {
        let cache = cache();
        let (_, trigger) = cache.lookup("Hello", "fr", true);
        let key = trigger.unwrap();

        cache.abort_populate(&key);
        assert_eq!(cache.in_flight_count(), 0);

        let (_, trigger) = cache.lookup("Hello", "fr", true);
        assert!(trigger.is_some());
    }
}
