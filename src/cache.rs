//! On-disk copy of the raw API data.
//!
//! Two artifacts live in the data directory: `messages.json` and `users.json`.
//! A run uses them only when both are present; the cache is never refreshed.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::core::models::{RawMessage, UserRecord};
use crate::errors::ArchiveError;

pub const MESSAGES_FILE: &str = "messages.json";
pub const USERS_FILE: &str = "users.json";

/// Accept either a bare array or the API envelope it came from.
#[derive(Deserialize)]
#[serde(untagged)]
enum MessagesArtifact {
    Bare(Vec<RawMessage>),
    Envelope { messages: Vec<RawMessage> },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum UsersArtifact {
    Bare(Vec<UserRecord>),
    Envelope { members: Vec<UserRecord> },
}

#[derive(Debug, Clone)]
pub struct LocalCache {
    dir: PathBuf,
}

impl LocalCache {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn messages_path(&self) -> PathBuf {
        self.dir.join(MESSAGES_FILE)
    }

    #[must_use]
    pub fn users_path(&self) -> PathBuf {
        self.dir.join(USERS_FILE)
    }

    /// Load both artifacts, or `None` when either one is missing.
    ///
    /// # Errors
    ///
    /// Returns `CacheError` when an artifact exists but can't be read or parsed.
    pub async fn try_load(&self) -> Result<Option<(Vec<RawMessage>, Vec<UserRecord>)>, ArchiveError> {
        let messages_path = self.messages_path();
        let users_path = self.users_path();

        let raw_messages = read_if_present(&messages_path).await?;
        let raw_users = read_if_present(&users_path).await?;

        let (raw_messages, raw_users) = match (raw_messages, raw_users) {
            (Some(m), Some(u)) => (m, u),
            (None, None) => {
                debug!("No cache artifacts in {}", self.dir.display());
                return Ok(None);
            }
            (Some(_), None) => {
                warn!(
                    "Found {} without {}; treating cache as missing",
                    messages_path.display(),
                    users_path.display()
                );
                return Ok(None);
            }
            (None, Some(_)) => {
                warn!(
                    "Found {} without {}; treating cache as missing",
                    users_path.display(),
                    messages_path.display()
                );
                return Ok(None);
            }
        };

        let messages = match parse_artifact::<MessagesArtifact>(&messages_path, &raw_messages)? {
            MessagesArtifact::Bare(messages) | MessagesArtifact::Envelope { messages } => messages,
        };
        let users = match parse_artifact::<UsersArtifact>(&users_path, &raw_users)? {
            UsersArtifact::Bare(users) | UsersArtifact::Envelope { members: users } => users,
        };

        info!(
            "Loaded {} messages and {} users from {}",
            messages.len(),
            users.len(),
            self.dir.display()
        );
        Ok(Some((messages, users)))
    }

    /// Write both artifacts, creating the data directory if needed.
    ///
    /// # Errors
    ///
    /// Returns `IoError` if the directory or either file can't be written.
    pub async fn persist(&self, messages: &[RawMessage], users: &[UserRecord]) -> Result<(), ArchiveError> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            ArchiveError::IoError(format!("create {}: {e}", self.dir.display()))
        })?;

        write_atomically(&self.messages_path(), &serde_json::to_vec(messages)?).await?;
        write_atomically(&self.users_path(), &serde_json::to_vec(users)?).await?;

        info!(
            "Wrote {} messages and {} users to {}",
            messages.len(),
            users.len(),
            self.dir.display()
        );
        Ok(())
    }
}

async fn read_if_present(path: &Path) -> Result<Option<String>, ArchiveError> {
    match tokio::fs::read_to_string(path).await {
        Ok(contents) => Ok(Some(contents)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(ArchiveError::CacheError(format!("{}: {e}", path.display()))),
    }
}

fn parse_artifact<T: DeserializeOwned>(path: &Path, raw: &str) -> Result<T, ArchiveError> {
    serde_json::from_str(raw)
        .map_err(|e| ArchiveError::CacheError(format!("{}: {e}", path.display())))
}

/// Write to a sibling temp file and rename it into place.
pub(crate) async fn write_atomically(path: &Path, contents: &[u8]) -> Result<(), ArchiveError> {
    let tmp = partial_path(path);
    tokio::fs::write(&tmp, contents)
        .await
        .map_err(|e| ArchiveError::IoError(format!("write {}: {e}", tmp.display())))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| ArchiveError::IoError(format!("rename to {}: {e}", path.display())))
}

/// `history.html` -> `history.html.partial`
pub(crate) fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".partial");
    path.with_file_name(name)
}
