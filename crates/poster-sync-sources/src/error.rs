use thiserror::Error;

/// Failure talking to a media server
#[derive(Debug, Error)]
pub enum SourceError {
    /// Network failure, timeout or unreadable body
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    /// Server answered with a non-2xx status
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    /// Response parsed but did not have the expected shape
    #[error("unexpected response from {context}: {message}")]
    Data { context: String, message: String },

    /// Source cannot be built from the current settings
    #[error("source configuration error: {0}")]
    Config(String),
}

impl SourceError {
    pub fn transport(url: &str, err: impl std::fmt::Display) -> Self {
        SourceError::Transport {
            url: url.to_string(),
            message: err.to_string(),
        }
    }

    pub fn data(context: &str, message: impl Into<String>) -> Self {
        SourceError::Data {
            context: context.to_string(),
            message: message.into(),
        }
    }

    /// Transport and status failures are worth retrying on the next sweep
    pub fn is_transport(&self) -> bool {
        matches!(self, SourceError::Transport { .. } | SourceError::Status { .. })
    }
}
