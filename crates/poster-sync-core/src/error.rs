use poster_sync_sources::SourceError;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::filename::CodecError;

/// Failure of an import, reconciliation or scheduling step
///
/// `Transport` and `Data` abort the current run only, `Filesystem` is recorded
/// per item inside a batch, `Config` aborts the whole sweep before any work.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected data: {0}")]
    Data(String),

    #[error("filesystem error at {}: {source}", .path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl ImportError {
    pub fn filesystem(path: &Path, source: std::io::Error) -> Self {
        ImportError::Filesystem {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Configuration problems stop the sweep; everything else stops one run at most
    pub fn aborts_sweep(&self) -> bool {
        matches!(self, ImportError::Config(_))
    }
}

impl From<SourceError> for ImportError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::Transport { .. } | SourceError::Status { .. } => {
                ImportError::Transport(err.to_string())
            }
            SourceError::Data { .. } => ImportError::Data(err.to_string()),
            SourceError::Config(message) => ImportError::Config(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_error_mapping() {
        let transport: ImportError = SourceError::Status {
            url: "http://plex/library".to_string(),
            status: 503,
        }
        .into();
        assert!(matches!(transport, ImportError::Transport(_)));
        assert!(!transport.aborts_sweep());

        let data: ImportError = SourceError::data("/library/sections", "missing MediaContainer").into();
        assert!(matches!(data, ImportError::Data(_)));

        let config: ImportError = SourceError::Config("no token".to_string()).into();
        assert!(config.aborts_sweep());
    }
}
