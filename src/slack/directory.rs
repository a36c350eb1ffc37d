use std::collections::HashMap;

use slack_morphism::SlackUserId;
use tracing::{info, warn};

use super::client::SlackApi;
use super::guard::CallGuard;
use crate::core::models::UserRecord;
use crate::errors::ArchiveError;

/// Fetches the workspace member list with a single `users.list` call.
pub struct UserDirectoryFetcher<'a, A: SlackApi + ?Sized> {
    api: &'a A,
    guard: &'a CallGuard,
}

impl<'a, A: SlackApi + ?Sized> UserDirectoryFetcher<'a, A> {
    #[must_use]
    pub fn new(api: &'a A, guard: &'a CallGuard) -> Self {
        Self { api, guard }
    }

    /// # Errors
    ///
    /// Returns the guarded call's error (network, protocol, parse, timeout or cancellation).
    pub async fn fetch_all(&self) -> Result<Vec<UserRecord>, ArchiveError> {
        let response = self.guard.run("users.list", self.api.users_list()).await?;
        info!("Fetched {} users", response.members.len());
        Ok(response.members)
    }
}

/// Users keyed by id, built once per run.
#[derive(Debug, Clone, Default)]
pub struct UserDirectory {
    users: HashMap<SlackUserId, UserRecord>,
}

impl UserDirectory {
    #[must_use]
    pub fn from_records(records: &[UserRecord]) -> Self {
        let mut users = HashMap::with_capacity(records.len());
        for record in records {
            if users.insert(record.id.clone(), record.clone()).is_some() {
                warn!("Duplicate user id {} in directory; keeping the later record", record.id.0);
            }
        }
        Self { users }
    }

    #[must_use]
    pub fn get(&self, id: &SlackUserId) -> Option<&UserRecord> {
        self.users.get(id)
    }

    #[must_use]
    pub fn get_str(&self, id: &str) -> Option<&UserRecord> {
        self.users.get(&SlackUserId(id.to_string()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.users.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user(id: &str, name: &str) -> UserRecord {
        serde_json::from_value(json!({"id": id, "name": name})).unwrap()
    }

    #[test]
    fn test_directory_lookup() {
        let directory = UserDirectory::from_records(&[user("U1", "alice"), user("U2", "bob")]);

        assert_eq!(directory.len(), 2);
        assert_eq!(directory.get_str("U2").map(|u| u.name.as_str()), Some("bob"));
        assert!(directory.get_str("U3").is_none());
    }

    #[test]
    fn test_duplicate_id_keeps_last() {
        let directory = UserDirectory::from_records(&[user("U1", "old"), user("U1", "new")]);

        assert_eq!(directory.len(), 1);
        assert_eq!(directory.get_str("U1").map(|u| u.name.as_str()), Some("new"));
    }
}
