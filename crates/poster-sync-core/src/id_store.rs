use bincode::{deserialize, serialize};
use flate2::{read::GzDecoder, write::GzEncoder, Compression};
use poster_sync_models::ValidIdSet;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::ImportError;

/// Durable valid-id store
///
/// Binary (bincode) with gzip compression. Writes go to a temp file that is
/// renamed over the store, so a crash never leaves a half-written file behind.
pub struct IdStore {
    store_path: PathBuf,
}

impl IdStore {
    pub fn new(id_store_dir: &Path) -> Self {
        Self {
            store_path: id_store_dir.join("valid_ids.bin"),
        }
    }

    pub fn path(&self) -> &Path {
        &self.store_path
    }

    /// Load the store; a missing or unreadable file yields an empty set
    ///
    /// An unreadable file is copied to `valid_ids.bin.bak` before it is ignored,
    /// so the next save does not destroy the evidence.
    pub fn load(&self) -> ValidIdSet {
        if !self.store_path.exists() {
            debug!("Valid id store does not exist yet, starting empty");
            return ValidIdSet::new();
        }

        let data = match std::fs::read(&self.store_path) {
            Ok(data) => data,
            Err(e) => {
                warn!("Failed to read valid id store {:?}: {}. Starting empty.", self.store_path, e);
                return ValidIdSet::new();
            }
        };

        match Self::decode(&data) {
            Ok(ids) => {
                debug!("Loaded valid id store: {} ids", ids.len());
                ids
            }
            Err(e) => {
                let backup_path = self.store_path.with_extension("bin.bak");
                if let Err(backup_err) = std::fs::copy(&self.store_path, &backup_path) {
                    warn!(
                        "Failed to back up unreadable id store: {}. Starting with empty store.",
                        backup_err
                    );
                } else {
                    info!(
                        "Id store unreadable ({}). Backed up to {:?} and starting with empty store.",
                        e, backup_path
                    );
                }
                ValidIdSet::new()
            }
        }
    }

    fn decode(data: &[u8]) -> Result<ValidIdSet, String> {
        let mut decompressed = Vec::new();
        GzDecoder::new(data)
            .read_to_end(&mut decompressed)
            .map_err(|e| e.to_string())?;
        deserialize(&decompressed).map_err(|e| e.to_string())
    }

    pub fn save(&self, ids: &ValidIdSet) -> Result<(), ImportError> {
        let start = std::time::Instant::now();

        let serialized = serialize(ids)
            .map_err(|e| ImportError::Data(format!("failed to encode id store: {}", e)))?;

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(&serialized)
            .map_err(|e| ImportError::filesystem(&self.store_path, e))?;
        let encoded = encoder
            .finish()
            .map_err(|e| ImportError::filesystem(&self.store_path, e))?;

        if let Some(parent) = self.store_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ImportError::filesystem(parent, e))?;
        }

        let temp_path = self.store_path.with_extension("tmp");
        std::fs::write(&temp_path, encoded).map_err(|e| ImportError::filesystem(&temp_path, e))?;
        std::fs::rename(&temp_path, &self.store_path)
            .map_err(|e| ImportError::filesystem(&self.store_path, e))?;

        debug!("Saved valid id store: {} ids in {:?}", ids.len(), start.elapsed());
        Ok(())
    }

    pub fn size(&self) -> u64 {
        std::fs::metadata(&self.store_path)
            .map(|m| m.len())
            .unwrap_or(0)
    }
}
