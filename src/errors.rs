use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Failed to reach Slack API: {0}")]
    NetworkError(String),

    #[error("Unexpected response from Slack API: {0}")]
    ProtocolError(String),

    #[error("Failed to parse data: {0}")]
    ParseError(String),

    #[error("Local cache is unreadable: {0}")]
    CacheError(String),

    #[error("No directory entry for user {0}")]
    UnresolvedIdentity(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Run cancelled: {0}")]
    Cancelled(String),

    #[error("Failed to write output: {0}")]
    IoError(String),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),
}

impl From<reqwest::Error> for ArchiveError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            ArchiveError::Timeout(error.to_string())
        } else if error.is_decode() {
            ArchiveError::ParseError(error.to_string())
        } else {
            ArchiveError::NetworkError(error.to_string())
        }
    }
}

impl From<serde_json::Error> for ArchiveError {
    fn from(error: serde_json::Error) -> Self {
        ArchiveError::ParseError(error.to_string())
    }
}

impl From<std::io::Error> for ArchiveError {
    fn from(error: std::io::Error) -> Self {
        ArchiveError::IoError(error.to_string())
    }
}
