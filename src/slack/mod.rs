//! All Slack-specific functionality

pub mod client;
pub mod directory;
pub mod guard;
pub mod history;

// Re-export main types for convenience
pub use client::{HistoryPage, SlackApi, SlackClient, UsersListResponse};
pub use directory::{UserDirectory, UserDirectoryFetcher};
pub use guard::CallGuard;
pub use history::HistoryFetcher;
