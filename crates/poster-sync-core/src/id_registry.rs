use poster_sync_models::{MediaType, ValidIdSet};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

use crate::{IdStore, ImportError};

/// Per-session overlay of valid ids
///
/// Holds what the current session has confirmed so reconciliation sees it
/// even before the durable store is synced. `retained` collects ids of items
/// that failed this session: they are protected from orphaning but never
/// written to the durable store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionIdCache {
    valid: ValidIdSet,
    #[serde(default)]
    retained: BTreeMap<MediaType, BTreeSet<String>>,
}

impl SessionIdCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn valid(&self) -> &ValidIdSet {
        &self.valid
    }

    pub fn retained(&self, media_type: MediaType) -> BTreeSet<String> {
        self.retained.get(&media_type).cloned().unwrap_or_default()
    }

    fn retain<I>(&mut self, media_type: MediaType, ids: I)
    where
        I: IntoIterator<Item = String>,
    {
        let mut ids = ids.into_iter().peekable();
        if ids.peek().is_some() {
            self.retained.entry(media_type).or_default().extend(ids);
        }
    }
}

/// Session overlay plus durable store behind one interface
pub struct IdRegistry {
    store: IdStore,
    session: SessionIdCache,
}

impl IdRegistry {
    pub fn new(store: IdStore) -> Self {
        Self::with_session(store, SessionIdCache::new())
    }

    /// Resume with a session carried over from an earlier invocation
    pub fn with_session(store: IdStore, session: SessionIdCache) -> Self {
        Self { store, session }
    }

    pub fn session(&self) -> &SessionIdCache {
        &self.session
    }

    pub fn into_session(self) -> SessionIdCache {
        self.session
    }

    pub fn store(&self) -> &IdStore {
        &self.store
    }

    /// Record ids for one library in both the session and the durable store
    ///
    /// With `replace` the library's entry becomes exactly `ids`; otherwise
    /// they are unioned in with what is already stored. Other libraries are
    /// never touched.
    pub fn store_ids<I, S>(
        &mut self,
        ids: I,
        media_type: MediaType,
        library_id: &str,
        replace: bool,
    ) -> Result<(), ImportError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ids: Vec<String> = ids.into_iter().map(Into::into).collect();
        let mut durable = self.store.load();
        if replace {
            self.session.valid.replace(media_type, library_id, ids.iter().cloned());
            durable.replace(media_type, library_id, ids.iter().cloned());
        } else {
            durable.extend(media_type, library_id, ids.iter().cloned());
            // The session entry stays a superset of the durable one, so a later
            // sync cannot shrink the stored baseline
            let merged = durable.library(media_type, library_id).cloned().unwrap_or_default();
            self.session.valid.extend(media_type, library_id, merged);
        }
        self.store.save(&durable)?;
        debug!(
            "Stored {} {} ids for library {} (replace={})",
            ids.len(),
            media_type,
            library_id,
            replace
        );
        Ok(())
    }

    /// Protect ids of items that failed this session from orphaning
    pub fn retain_failed<I>(&mut self, media_type: MediaType, ids: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.session.retain(media_type, ids);
    }

    /// Union of every library's ids, session and durable store alike
    pub fn all_valid_ids(&self, media_type: MediaType) -> BTreeSet<String> {
        let mut ids = self.store.load().ids_for(media_type);
        ids.extend(self.session.valid.ids_for(media_type));
        ids
    }

    pub fn protected_ids(&self, media_type: MediaType) -> BTreeSet<String> {
        self.session.retained(media_type)
    }

    /// Merged view of the durable store with this session's entries on top
    pub fn snapshot(&self) -> ValidIdSet {
        let mut merged = self.store.load();
        merged.overlay(&self.session.valid);
        merged
    }

    /// Drop stored ids for one library or a whole media type
    pub fn clear(&mut self, media_type: MediaType, library_id: Option<&str>) -> Result<(), ImportError> {
        self.session.valid.clear(media_type, library_id);
        if library_id.is_none() {
            self.session.retained.remove(&media_type);
        }
        let mut durable = self.store.load();
        durable.clear(media_type, library_id);
        self.store.save(&durable)?;
        info!(
            "Cleared {} ids{}",
            media_type,
            library_id
                .map(|id| format!(" for library {}", id))
                .unwrap_or_default()
        );
        Ok(())
    }

    /// Write the session's entries through to the durable store
    pub fn sync(&self) -> Result<(), ImportError> {
        let merged = self.snapshot();
        self.store.save(&merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn registry(dir: &TempDir) -> IdRegistry {
        IdRegistry::new(IdStore::new(dir.path()))
    }

    #[test]
    fn test_union_across_libraries() {
        let temp_dir = TempDir::new().unwrap();
        let mut registry = registry(&temp_dir);

        registry.store_ids(["10", "11"], MediaType::Movie, "A", true).unwrap();
        registry.store_ids(["12", "13"], MediaType::Movie, "B", true).unwrap();

        let all = registry.all_valid_ids(MediaType::Movie);
        let expected: BTreeSet<String> = ["10", "11", "12", "13"].iter().map(|s| s.to_string()).collect();
        assert_eq!(all, expected);
        assert!(registry.all_valid_ids(MediaType::Show).is_empty());
    }

    #[test]
    fn test_replace_only_touches_one_library() {
        let temp_dir = TempDir::new().unwrap();
        let mut registry = registry(&temp_dir);

        registry.store_ids(["1", "2"], MediaType::Movie, "A", true).unwrap();
        registry.store_ids(["3"], MediaType::Movie, "B", true).unwrap();
        registry.store_ids(["2"], MediaType::Movie, "A", true).unwrap();

        let all = registry.all_valid_ids(MediaType::Movie);
        assert!(!all.contains("1"));
        assert!(all.contains("2"));
        assert!(all.contains("3"));

        registry.store_ids(["4"], MediaType::Movie, "B", false).unwrap();
        assert_eq!(
            registry.snapshot().library(MediaType::Movie, "B").map(|s| s.len()),
            Some(2)
        );
    }

    #[test]
    fn test_partial_ids_never_shrink_stored_entry() {
        let temp_dir = TempDir::new().unwrap();
        registry(&temp_dir)
            .store_ids(["1", "2", "3"], MediaType::Movie, "A", true)
            .unwrap();

        // A fresh session that only got through part of the library
        let mut registry = registry(&temp_dir);
        registry.store_ids(["1"], MediaType::Movie, "A", false).unwrap();
        registry.sync().unwrap();

        let stored = registry.store().load();
        assert_eq!(stored.library(MediaType::Movie, "A").map(|s| s.len()), Some(3));
        assert_eq!(
            registry.session().valid().library(MediaType::Movie, "A").map(|s| s.len()),
            Some(3)
        );
    }

    #[test]
    fn test_store_survives_new_session() {
        let temp_dir = TempDir::new().unwrap();
        {
            let mut registry = registry(&temp_dir);
            registry.store_ids(["7"], MediaType::Collection, "C", true).unwrap();
        }
        let registry = registry(&temp_dir);
        assert!(registry.all_valid_ids(MediaType::Collection).contains("7"));
        assert!(registry.session().valid().is_empty());
    }

    #[test]
    fn test_retained_ids_stay_out_of_store() {
        let temp_dir = TempDir::new().unwrap();
        let mut registry = registry(&temp_dir);
        registry.retain_failed(MediaType::Movie, vec!["42".to_string()]);
        registry.sync().unwrap();

        assert!(registry.protected_ids(MediaType::Movie).contains("42"));
        assert!(!registry.all_valid_ids(MediaType::Movie).contains("42"));
        assert!(registry.store().load().is_empty());
    }

    #[test]
    fn test_clear_library_and_type() {
        let temp_dir = TempDir::new().unwrap();
        let mut registry = registry(&temp_dir);
        registry.store_ids(["1"], MediaType::Show, "A", true).unwrap();
        registry.store_ids(["2"], MediaType::Show, "B", true).unwrap();

        registry.clear(MediaType::Show, Some("A")).unwrap();
        assert_eq!(registry.all_valid_ids(MediaType::Show).len(), 1);

        registry.clear(MediaType::Show, None).unwrap();
        assert!(registry.all_valid_ids(MediaType::Show).is_empty());
        assert!(registry.store().load().is_empty());
    }

    #[test]
    fn test_session_round_trips_as_json() {
        let temp_dir = TempDir::new().unwrap();
        let mut registry = registry(&temp_dir);
        registry.store_ids(["5"], MediaType::Season, "S", true).unwrap();
        registry.retain_failed(MediaType::Season, vec!["6".to_string()]);

        let json = serde_json::to_string(registry.session()).unwrap();
        let session: SessionIdCache = serde_json::from_str(&json).unwrap();
        let resumed = IdRegistry::with_session(IdStore::new(temp_dir.path()), session);
        assert!(resumed.protected_ids(MediaType::Season).contains("6"));
        assert!(resumed.session().valid().library(MediaType::Season, "S").is_some());
    }
}
