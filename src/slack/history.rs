use slack_morphism::{SlackChannelId, SlackTs};
use tracing::{debug, info};

use super::client::SlackApi;
use super::guard::CallGuard;
use crate::core::models::RawMessage;
use crate::errors::ArchiveError;

/// Walks `conversations.history` backwards from the newest message.
pub struct HistoryFetcher<'a, A: SlackApi + ?Sized> {
    api: &'a A,
    guard: &'a CallGuard,
}

impl<'a, A: SlackApi + ?Sized> HistoryFetcher<'a, A> {
    #[must_use]
    pub fn new(api: &'a A, guard: &'a CallGuard) -> Self {
        Self { api, guard }
    }

    /// Fetch every message in `channel`, in API delivery order (newest first).
    ///
    /// Each follow-up request uses the oldest `ts` of the previous page as an
    /// exclusive upper bound, so pages are requested strictly one after another.
    ///
    /// # Errors
    ///
    /// Any failed page aborts the walk; partial history is never returned. A
    /// `has_more` page whose oldest `ts` is not older than the current cursor
    /// is a `ProtocolError`.
    pub async fn fetch_all(&self, channel: &SlackChannelId) -> Result<Vec<RawMessage>, ArchiveError> {
        let mut messages: Vec<RawMessage> = Vec::new();
        let mut cursor: Option<SlackTs> = None;
        let mut pages = 0usize;

        loop {
            let page = self
                .guard
                .run(
                    "conversations.history",
                    self.api.conversations_history(channel, cursor.as_ref()),
                )
                .await?;
            pages += 1;

            debug!(
                "History page {} for {}: {} messages, has_more={}, latest={:?}",
                pages,
                channel.0,
                page.messages.len(),
                page.has_more,
                cursor.as_ref().map(|ts| ts.0.as_str())
            );

            if !page.has_more {
                messages.extend(page.messages);
                break;
            }

            let next = page
                .messages
                .last()
                .map(|oldest| oldest.ts.clone())
                .ok_or_else(|| {
                    ArchiveError::ProtocolError(format!(
                        "conversations.history page {pages} has has_more=true but no messages"
                    ))
                })?;

            if let Some(latest) = &cursor {
                if ts_key(&next)? >= ts_key(latest)? {
                    return Err(ArchiveError::ProtocolError(format!(
                        "conversations.history page {pages}: cursor did not advance (latest={}, oldest={})",
                        latest.0, next.0
                    )));
                }
            }

            messages.extend(page.messages);
            cursor = Some(next);
        }

        info!(
            "Fetched {} messages from {} in {} pages",
            messages.len(),
            channel.0,
            pages
        );
        Ok(messages)
    }
}

// Orders Slack timestamps numerically: whole seconds, then the fraction
// padded to nanoseconds, so "10" sorts after "9" and "5.1" equals "5.100".
fn ts_key(ts: &SlackTs) -> Result<(u64, u32), ArchiveError> {
    let invalid = || ArchiveError::ParseError(format!("invalid message ts {:?}", ts.0));
    let (secs, frac) = ts.0.split_once('.').unwrap_or((ts.0.as_str(), ""));
    if frac.len() > 9 || !frac.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    let secs = secs.parse::<u64>().map_err(|_| invalid())?;
    let nanos = format!("{frac:0<9}").parse::<u32>().map_err(|_| invalid())?;
    Ok((secs, nanos))
}
