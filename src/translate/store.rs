//! Durable storage for the persistent translation tier.
//! One JSON document per location (primary + backup), fully overwritten on
//! each flush. Human-readable, Unicode kept verbatim.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::cache::TranslationMap;

#[derive(Debug)]
pub enum StoreError {
    Io(std::io::Error),
    Parse(serde_json::Error),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Io(e) => write!(f, "translation store IO error: {e}"),
            StoreError::Parse(e) => write!(f, "translation store parse error: {e}"),
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io(e)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Parse(e)
    }
}

pub struct TranslationStore {
    primary: PathBuf,
    backup: PathBuf,
}

impl TranslationStore {
    pub fn new(primary: PathBuf, backup: PathBuf) -> Self {
        Self { primary, backup }
    }

    /// Load the persisted tier from the primary location. A missing file is
    /// an empty initial state; a malformed one is logged and treated as
    /// empty. Never fatal.
    pub fn load(&self) -> TranslationMap {
        if !self.primary.exists() {
            info!(path = %self.primary.display(), "no translation store yet, starting empty");
            return TranslationMap::new();
        }
        match self.load_strict() {
            Ok(map) => {
                info!(path = %self.primary.display(), entries = map.len(), "translation store loaded");
                map
            }
            Err(e) => {
                warn!(error = %e, "translation store unreadable, starting empty");
                TranslationMap::new()
            }
        }
    }

    fn load_strict(&self) -> Result<TranslationMap, StoreError> {
        let content = std::fs::read_to_string(&self.primary)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save_primary(&self, map: &TranslationMap) -> Result<(), StoreError> {
        write_document(&self.primary, map)
    }

    pub fn save_backup(&self, map: &TranslationMap) -> Result<(), StoreError> {
        write_document(&self.backup, map)
    }

    pub fn primary_path(&self) -> &Path {
        &self.primary
    }

    pub fn backup_path(&self) -> &Path {
        &self.backup
    }
}

fn write_document(path: &Path, map: &TranslationMap) -> Result<(), StoreError> {
    let serialized = serde_json::to_string_pretty(map)?;
    std::fs::write(path, serialized)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn store_in(dir: &Path) -> TranslationStore {
        TranslationStore::new(dir.join("translations.json"), dir.join("translations_backup.json"))
    }

    fn sample_map() -> TranslationMap {
        let mut map = TranslationMap::new();
        map.insert(
            "Hello".into(),
            HashMap::from([("fr".into(), "Bonjour".into()), ("hi".into(), "नमस्ते".into())]),
        );
        map.insert(
            "Tree Plantation".into(),
            HashMap::from([("ja".into(), "植樹".into())]),
        );
        map
    }

    #[test]
    fn round_trip_preserves_unicode_exactly() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        let map = sample_map();

        store.save_primary(&map).unwrap();
        let reloaded = store.load();
        assert_eq!(reloaded, map);
        assert_eq!(reloaded["Hello"]["hi"], "नमस्ते");

        // The document itself stays human-readable: no \u escapes.
        let raw = std::fs::read_to_string(store.primary_path()).unwrap();
        assert!(raw.contains("नमस्ते"));
        assert!(raw.contains("植樹"));
    }

    #[test]
    fn missing_store_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        assert!(store.load().is_empty());
    }

    #[test]
    fn malformed_store_is_empty_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        std::fs::write(store.primary_path(), "{not json").unwrap();
        assert!(store.load().is_empty());
    }

    #[test]
    fn save_overwrites_previous_document() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());

        store.save_primary(&sample_map()).unwrap();
        let mut smaller = TranslationMap::new();
        smaller.insert("Hi".into(), HashMap::from([("fr".into(), "Salut".into())]));
        store.save_primary(&smaller).unwrap();

        let reloaded = store.load();
        assert_eq!(reloaded.len(), 1);
        assert!(!reloaded.contains_key("Hello"));
    }
}
