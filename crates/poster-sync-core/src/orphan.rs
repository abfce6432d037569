//! Orphan reconciliation
//!
//! Files whose item id is no longer on the server get their source tag swapped
//! for the orphan tag. Reconciliation for a media type only happens once every
//! library of that type has been imported in the sweep; the tracker enforces
//! that ordering.

use poster_sync_models::{LibraryType, MediaType};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::filename::normalize_for_match;
use crate::{FilenameCodec, ImportError, RunContext};

/// Unit of reconciliation
///
/// Collections from movie libraries and TV libraries are reconciled apart,
/// other media types reconcile across all libraries of the type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReconcileKey {
    pub media_type: MediaType,
    pub library_type: Option<LibraryType>,
}

impl ReconcileKey {
    pub fn for_run(media_type: MediaType, library_type: LibraryType) -> Self {
        let library_type = match media_type {
            MediaType::Collection => Some(library_type),
            _ => None,
        };
        Self {
            media_type,
            library_type,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReconcilePhase {
    #[default]
    Idle,
    Accumulating,
    Finalizing,
}

/// Per-key state machine: Idle -> Accumulating -> Finalizing -> Idle
///
/// Serializable so a sweep driven one call at a time can carry it along with
/// its `RunState` and `SessionIdCache`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(into = "TrackerState", from = "TrackerState")]
pub struct ReconcileTracker {
    phases: BTreeMap<ReconcileKey, ReconcilePhase>,
    tainted: BTreeSet<ReconcileKey>,
}

/// Wire form of the tracker; struct keys are not valid JSON object keys
#[derive(Serialize, Deserialize)]
struct TrackerState {
    #[serde(default)]
    phases: Vec<(ReconcileKey, ReconcilePhase)>,
    #[serde(default)]
    tainted: Vec<ReconcileKey>,
}

impl From<ReconcileTracker> for TrackerState {
    fn from(tracker: ReconcileTracker) -> Self {
        Self {
            phases: tracker.phases.into_iter().collect(),
            tainted: tracker.tainted.into_iter().collect(),
        }
    }
}

impl From<TrackerState> for ReconcileTracker {
    fn from(state: TrackerState) -> Self {
        Self {
            phases: state.phases.into_iter().collect(),
            tainted: state.tainted.into_iter().collect(),
        }
    }
}

impl ReconcileTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self, key: ReconcileKey) -> ReconcilePhase {
        self.phases.get(&key).copied().unwrap_or_default()
    }

    pub fn begin(&mut self, key: ReconcileKey) {
        let phase = self.phases.entry(key).or_default();
        if *phase == ReconcilePhase::Idle {
            *phase = ReconcilePhase::Accumulating;
        }
    }

    /// A run of this key aborted; its final run must not reconcile
    pub fn taint(&mut self, key: ReconcileKey) {
        self.phases.insert(key, ReconcilePhase::Accumulating);
        self.tainted.insert(key);
    }

    pub fn is_tainted(&self, key: ReconcileKey) -> bool {
        self.tainted.contains(&key)
    }

    /// Close a run; returns true when reconciliation should happen now
    pub fn complete_run(&mut self, key: ReconcileKey, is_last: bool) -> bool {
        if !is_last {
            self.phases.insert(key, ReconcilePhase::Accumulating);
            return false;
        }
        if self.tainted.remove(&key) {
            warn!(
                "Skipping orphan reconciliation for {:?}: an earlier run of this sweep did not finish",
                key
            );
            self.phases.insert(key, ReconcilePhase::Idle);
            return false;
        }
        self.phases.insert(key, ReconcilePhase::Finalizing);
        true
    }

    pub fn finish(&mut self, key: ReconcileKey) {
        self.phases.insert(key, ReconcilePhase::Idle);
    }
}

/// Which files a reconciliation pass may touch
#[derive(Debug, Clone)]
pub struct ReconcileScope {
    pub media_type: MediaType,
    /// Collections only: files marked for the other library type are left alone
    pub library_type: Option<LibraryType>,
    /// Seasons only: limit the pass to one show's files
    pub show_title: Option<String>,
}

impl ReconcileScope {
    pub fn for_key(key: ReconcileKey) -> Self {
        Self {
            media_type: key.media_type,
            library_type: key.library_type,
            show_title: None,
        }
    }

    pub fn for_show(show_title: &str) -> Self {
        Self {
            media_type: MediaType::Season,
            library_type: None,
            show_title: Some(show_title.to_string()),
        }
    }

    fn includes(&self, filename: &str) -> bool {
        if self.media_type == MediaType::Collection {
            // Collections without a type marker are eligible in every pass
            if let (Some(wanted), Some(found)) = (self.library_type, FilenameCodec::decode_library_type(filename)) {
                if wanted != found {
                    return false;
                }
            }
        }
        if self.media_type == MediaType::Season {
            if let Some(show) = &self.show_title {
                // Season files are named "<show> - <season>"; sanitize the prefix the
                // same way so dots inside it survive
                let prefix = normalize_for_match(&format!("{} -", show));
                if !normalize_for_match(filename).starts_with(&prefix) {
                    return false;
                }
            }
        }
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrphanRename {
    pub old_name: String,
    pub new_name: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct OrphanResult {
    pub orphaned: usize,
    /// Orphan candidates that could not be renamed
    pub unmarked: usize,
    pub details: Vec<OrphanRename>,
}

pub struct OrphanReconciler<'a> {
    codec: &'a FilenameCodec,
    dir: &'a Path,
}

impl<'a> OrphanReconciler<'a> {
    pub fn new(codec: &'a FilenameCodec, dir: &'a Path) -> Self {
        Self { codec, dir }
    }

    /// Mark every in-scope source-tagged file whose id is not in `valid`
    ///
    /// Files without a decodable id, files of another server and files that are
    /// already orphaned are left as they are.
    pub fn reconcile(&self, valid: &BTreeSet<String>, scope: &ReconcileScope) -> Result<OrphanResult, ImportError> {
        let mut result = OrphanResult::default();

        let entries = match std::fs::read_dir(self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Poster directory {:?} does not exist, nothing to reconcile", self.dir);
                return Ok(result);
            }
            Err(e) => return Err(ImportError::filesystem(self.dir, e)),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| ImportError::filesystem(self.dir, e))?;
            if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();

        for name in names {
            if !self.codec.has_source_tag(&name) || self.codec.has_orphan_tag(&name) {
                continue;
            }
            if !scope.includes(&name) {
                continue;
            }
            let Some(id) = FilenameCodec::decode_item_id(&name) else {
                continue;
            };
            if valid.contains(&id) {
                continue;
            }
            let Some(new_name) = self.codec.orphan(&name) else {
                continue;
            };

            let new_path = self.dir.join(&new_name);
            if new_path.exists() {
                warn!("Not orphaning {}: {} already exists", name, new_name);
                result.unmarked += 1;
                continue;
            }
            match std::fs::rename(self.dir.join(&name), &new_path) {
                Ok(()) => {
                    debug!("Orphaned {} -> {}", name, new_name);
                    result.orphaned += 1;
                    result.details.push(OrphanRename {
                        old_name: name,
                        new_name,
                    });
                }
                Err(e) => {
                    warn!("Failed to orphan {}: {}", name, e);
                    result.unmarked += 1;
                }
            }
        }

        Ok(result)
    }
}

/// Close one run of `key` and reconcile if it was the designated last one
pub fn finish_run(ctx: &mut RunContext, key: ReconcileKey, is_last: bool) -> Result<Option<OrphanResult>, ImportError> {
    if !ctx.tracker.complete_run(key, is_last) {
        return Ok(None);
    }

    let mut valid = ctx.registry.all_valid_ids(key.media_type);
    valid.extend(ctx.registry.protected_ids(key.media_type));

    let dir = ctx.dirs.dir(key.media_type);
    let outcome = OrphanReconciler::new(&ctx.codec, &dir).reconcile(&valid, &ReconcileScope::for_key(key));
    ctx.tracker.finish(key);
    let result = outcome?;

    info!(
        operation = "reconcile",
        media_type = %key.media_type,
        valid_ids = valid.len(),
        orphaned = result.orphaned,
        unmarked = result.unmarked,
        "Orphan reconciliation finished"
    );
    Ok(Some(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use poster_sync_models::ServerKind;
    use tempfile::TempDir;

    fn ids(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), b"img").unwrap();
    }

    #[test]
    fn test_orphans_missing_ids() {
        let temp_dir = TempDir::new().unwrap();
        let codec = FilenameCodec::new(ServerKind::Plex);
        for id in ["1", "2", "3"] {
            touch(temp_dir.path(), &format!("Movie {} [{}] [[Movies]] **Plex**.jpg", id, id));
        }

        let result = OrphanReconciler::new(&codec, temp_dir.path())
            .reconcile(&ids(&["1", "3"]), &ReconcileScope::for_key(ReconcileKey::for_run(MediaType::Movie, LibraryType::Movie)))
            .unwrap();

        assert_eq!(result.orphaned, 1);
        assert_eq!(result.details[0].old_name, "Movie 2 [2] [[Movies]] **Plex**.jpg");
        assert!(temp_dir.path().join("Movie 2 [2] [[Movies]] **Orphaned**.jpg").exists());
        assert!(temp_dir.path().join("Movie 1 [1] [[Movies]] **Plex**.jpg").exists());
        assert!(temp_dir.path().join("Movie 3 [3] [[Movies]] **Plex**.jpg").exists());
    }

    #[test]
    fn test_leaves_foreign_and_untagged_files() {
        let temp_dir = TempDir::new().unwrap();
        let codec = FilenameCodec::new(ServerKind::Plex);
        touch(temp_dir.path(), "Other [8] [[Movies]] **Jellyfin**.jpg");
        touch(temp_dir.path(), "manual poster.jpg");
        touch(temp_dir.path(), "No Id [[Movies]] **Plex**.jpg");
        touch(temp_dir.path(), "Old [9] [[Movies]] **Orphaned**.jpg");

        let result = OrphanReconciler::new(&codec, temp_dir.path())
            .reconcile(&BTreeSet::new(), &ReconcileScope::for_key(ReconcileKey::for_run(MediaType::Movie, LibraryType::Movie)))
            .unwrap();

        assert_eq!(result.orphaned, 0);
        assert!(temp_dir.path().join("Other [8] [[Movies]] **Jellyfin**.jpg").exists());
        assert!(temp_dir.path().join("No Id [[Movies]] **Plex**.jpg").exists());
    }

    #[test]
    fn test_collection_scope_by_library_type() {
        let temp_dir = TempDir::new().unwrap();
        let codec = FilenameCodec::new(ServerKind::Plex);
        touch(temp_dir.path(), "Alien [1] Collection (Movies) **Plex**.jpg");
        touch(temp_dir.path(), "Trek [2] Collection (TV) **Plex**.jpg");
        touch(temp_dir.path(), "Generic [3] Collection **Plex**.jpg");

        let key = ReconcileKey::for_run(MediaType::Collection, LibraryType::Movie);
        let result = OrphanReconciler::new(&codec, temp_dir.path())
            .reconcile(&BTreeSet::new(), &ReconcileScope::for_key(key))
            .unwrap();

        assert_eq!(result.orphaned, 2);
        assert!(temp_dir.path().join("Generic [3] Collection **Orphaned**.jpg").exists());
        assert!(temp_dir.path().join("Alien [1] Collection (Movies) **Orphaned**.jpg").exists());
        assert!(temp_dir.path().join("Trek [2] Collection (TV) **Plex**.jpg").exists());
    }

    #[test]
    fn test_show_scope_matches_only_that_show() {
        let temp_dir = TempDir::new().unwrap();
        let codec = FilenameCodec::new(ServerKind::Plex);
        touch(temp_dir.path(), "Dark - Season 3 [30] [[TV]] **Plex**.jpg");
        touch(temp_dir.path(), "Dark Matter - Season 1 [40] [[TV]] **Plex**.jpg");

        let result = OrphanReconciler::new(&codec, temp_dir.path())
            .reconcile(&ids(&["31"]), &ReconcileScope::for_show("Dark"))
            .unwrap();

        assert_eq!(result.orphaned, 1);
        assert_eq!(result.details[0].old_name, "Dark - Season 3 [30] [[TV]] **Plex**.jpg");
        assert!(temp_dir.path().join("Dark Matter - Season 1 [40] [[TV]] **Plex**.jpg").exists());
    }

    #[test]
    fn test_show_scope_decodes_entities() {
        let scope = ReconcileScope::for_show("Law &amp; Order: SVU");
        assert!(scope.includes("Law Order SVU - Season 2 [5] [[TV]] **Plex**.jpg"));
        assert!(!scope.includes("Law Order - Season 2 [6] [[TV]] **Plex**.jpg"));
    }

    #[test]
    fn test_show_scope_keeps_trailing_dot() {
        let scope = ReconcileScope::for_show("S.W.A.T.");
        assert!(scope.includes("S.W.A.T. - Season 9 [109] [[TV]] **Plex**.jpg"));
        assert!(!scope.includes("S.W.A.T. Redux - Season 1 [110] [[TV]] **Plex**.jpg"));
    }

    #[test]
    fn test_missing_directory_is_empty_result() {
        let temp_dir = TempDir::new().unwrap();
        let codec = FilenameCodec::new(ServerKind::Plex);
        let dir = temp_dir.path().join("absent");
        let result = OrphanReconciler::new(&codec, &dir)
            .reconcile(&BTreeSet::new(), &ReconcileScope::for_show("x"))
            .unwrap();
        assert_eq!(result.orphaned, 0);
    }

    #[test]
    fn test_tracker_phases() {
        let mut tracker = ReconcileTracker::new();
        let key = ReconcileKey::for_run(MediaType::Movie, LibraryType::Movie);
        assert_eq!(tracker.phase(key), ReconcilePhase::Idle);

        tracker.begin(key);
        assert_eq!(tracker.phase(key), ReconcilePhase::Accumulating);
        assert!(!tracker.complete_run(key, false));
        assert_eq!(tracker.phase(key), ReconcilePhase::Accumulating);

        assert!(tracker.complete_run(key, true));
        assert_eq!(tracker.phase(key), ReconcilePhase::Finalizing);
        tracker.finish(key);
        assert_eq!(tracker.phase(key), ReconcilePhase::Idle);
    }

    #[test]
    fn test_tainted_key_skips_reconciliation() {
        let mut tracker = ReconcileTracker::new();
        let key = ReconcileKey::for_run(MediaType::Show, LibraryType::Show);
        tracker.begin(key);
        tracker.taint(key);
        assert!(tracker.is_tainted(key));
        assert!(!tracker.complete_run(key, true));
        assert!(!tracker.is_tainted(key));
        assert_eq!(tracker.phase(key), ReconcilePhase::Idle);
    }

    #[test]
    fn test_taint_survives_json() {
        let mut tracker = ReconcileTracker::new();
        let movies = ReconcileKey::for_run(MediaType::Movie, LibraryType::Movie);
        let collections = ReconcileKey::for_run(MediaType::Collection, LibraryType::Show);
        tracker.begin(collections);
        tracker.taint(movies);

        let json = serde_json::to_string(&tracker).unwrap();
        let mut resumed: ReconcileTracker = serde_json::from_str(&json).unwrap();
        assert_eq!(resumed.phase(collections), ReconcilePhase::Accumulating);
        assert!(resumed.is_tainted(movies));
        assert!(!resumed.complete_run(movies, true));
    }

    #[test]
    fn test_collection_keys_split_by_library_type() {
        let movies = ReconcileKey::for_run(MediaType::Collection, LibraryType::Movie);
        let tv = ReconcileKey::for_run(MediaType::Collection, LibraryType::Show);
        assert_ne!(movies, tv);
        assert_eq!(
            ReconcileKey::for_run(MediaType::Season, LibraryType::Show),
            ReconcileKey::for_run(MediaType::Season, LibraryType::Movie)
        );
    }
}
