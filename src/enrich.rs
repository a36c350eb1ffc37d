//! Joins raw messages to their authors.

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::core::models::{RawMessage, ResolvedUser, SyntheticUser};
use crate::errors::ArchiveError;
use crate::slack::UserDirectory;

/// Resolve the author of every message, in input order, as the iterator is pulled.
pub fn resolve<'a>(
    messages: &'a [RawMessage],
    directory: &'a UserDirectory,
) -> impl DoubleEndedIterator<Item = (&'a RawMessage, ResolvedUser)> + 'a {
    messages
        .iter()
        .map(move |message| (message, resolve_author(message, directory)))
}

/// Author resolution for a single message.
///
/// File comments are attributed to the commenter, bot posts get a synthetic
/// identity, everything else is looked up by its `user` field.
#[must_use]
pub fn resolve_author(message: &RawMessage, directory: &UserDirectory) -> ResolvedUser {
    let author = if message.is_file_comment() {
        message.comment.as_ref().and_then(|c| c.user.as_ref())
    } else if message.is_bot_message() {
        return ResolvedUser::Synthetic(synthesize_bot(message));
    } else {
        message.user.as_ref()
    };

    match author.and_then(|id| directory.get(id)) {
        Some(record) => ResolvedUser::Directory(record.clone()),
        None => {
            #[cfg(feature = "debug-logs")]
            warn!("Unresolved author for message {:?}", message);

            #[cfg(not(feature = "debug-logs"))]
            warn!(
                "Unresolved author {:?} for message ts={}",
                author.map(|id| id.0.as_str()),
                message.ts.0
            );

            ResolvedUser::Unresolved {
                referenced_id: author.map(|id| id.0.clone()),
            }
        }
    }
}

/// Build the stand-in identity for a `bot_message` post.
#[must_use]
pub fn synthesize_bot(message: &RawMessage) -> SyntheticUser {
    let id = message
        .bot_id
        .as_ref()
        .map(|b| b.0.clone())
        .unwrap_or_default();
    let name = message
        .username
        .clone()
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| id.clone());
    let avatar = message.icons.as_ref().and_then(|i| i.image_48.clone());

    SyntheticUser { id, name, avatar }
}

/// Format a Slack `ts` as an RFC 1123 GMT string, e.g. `Sun, 13 Sep 2020 12:26:40 GMT`.
///
/// Sub-second digits are dropped.
///
/// # Errors
///
/// Returns `ParseError` if `ts` isn't a decimal number of seconds within chrono's range.
pub fn format_timestamp(ts: &str) -> Result<String, ArchiveError> {
    let whole = ts.split('.').next().unwrap_or_default();
    let secs: i64 = whole
        .parse()
        .map_err(|e| ArchiveError::ParseError(format!("timestamp {ts:?}: {e}")))?;

    let time: DateTime<Utc> = DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| ArchiveError::ParseError(format!("timestamp {ts:?} out of range")))?;

    Ok(time.format("%a, %d %b %Y %H:%M:%S GMT").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::UserRecord;
    use serde_json::json;

    fn directory() -> UserDirectory {
        let users: Vec<UserRecord> = serde_json::from_value(json!([
            {"id": "U1", "name": "alice", "real_name": "Alice"},
            {"id": "U2", "name": "bob", "real_name": "Bob"}
        ]))
        .unwrap();
        UserDirectory::from_records(&users)
    }

    fn raw(value: serde_json::Value) -> RawMessage {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_plain_message_uses_user_field() {
        let message = raw(json!({"ts": "1", "user": "U2", "text": "hi"}));
        let user = resolve_author(&message, &directory());
        assert_eq!(user.display_name(), Some("Bob"));
    }

    #[test]
    fn test_file_comment_uses_comment_author() {
        let message = raw(json!({
            "ts": "1", "subtype": "file_comment", "user": "U2",
            "comment": {"id": "Fc1", "user": "U1", "comment": "nice"}, "text": ""
        }));
        let user = resolve_author(&message, &directory());
        assert_eq!(user.id(), Some("U1"));
    }

    #[test]
    fn test_bot_message_is_synthesized_even_without_directory_entry() {
        let message = raw(json!({
            "ts": "1", "subtype": "bot_message", "bot_id": "B42",
            "username": "deploybot", "icons": {"image_48": "https://x/bot.png"}, "text": "done"
        }));

        match resolve_author(&message, &directory()) {
            ResolvedUser::Synthetic(bot) => {
                assert_eq!(bot.id, "B42");
                assert_eq!(bot.name, "deploybot");
                assert_eq!(bot.avatar.as_deref(), Some("https://x/bot.png"));
            }
            other => panic!("Expected Synthetic, got: {other:?}"),
        }
    }

    #[test]
    fn test_bot_without_username_falls_back_to_id() {
        let message = raw(json!({"ts": "1", "subtype": "bot_message", "bot_id": "B7", "text": ""}));
        let bot = synthesize_bot(&message);
        assert_eq!(bot.name, "B7");
        assert_eq!(bot.avatar, None);
    }

    #[test]
    fn test_unknown_user_is_unresolved() {
        let message = raw(json!({"ts": "1", "user": "U404", "text": "?"}));
        assert_eq!(
            resolve_author(&message, &directory()),
            ResolvedUser::Unresolved {
                referenced_id: Some("U404".to_string())
            }
        );

        let anonymous = raw(json!({"ts": "2", "subtype": "channel_topic", "text": "topic"}));
        assert_eq!(
            resolve_author(&anonymous, &directory()),
            ResolvedUser::Unresolved { referenced_id: None }
        );
    }

    #[test]
    fn test_resolve_preserves_order_and_count() {
        let messages = vec![
            raw(json!({"ts": "3", "user": "U1", "text": "c"})),
            raw(json!({"ts": "2", "user": "U9", "text": "b"})),
            raw(json!({"ts": "1", "user": "U2", "text": "a"})),
        ];

        let directory = directory();
        let resolved: Vec<_> = resolve(&messages, &directory).collect();
        let ts: Vec<&str> = resolved.iter().map(|(m, _)| m.ts.0.as_str()).collect();
        assert_eq!(ts, vec!["3", "2", "1"]);
        assert!(!resolved[1].1.is_resolved());
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(
            format_timestamp("1600000000.000200").unwrap(),
            "Sun, 13 Sep 2020 12:26:40 GMT"
        );
        assert_eq!(format_timestamp("0").unwrap(), "Thu, 01 Jan 1970 00:00:00 GMT");
    }

    #[test]
    fn test_format_timestamp_rejects_garbage() {
        assert!(matches!(
            format_timestamp("yesterday"),
            Err(ArchiveError::ParseError(_))
        ));
    }
}
