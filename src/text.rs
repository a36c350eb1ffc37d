//! Rewrites Slack's inline markup into HTML.
//!
//! Two tag forms are handled:
//! - mentions: `<@U123>` or `<@U123|label>`
//! - links: `<https://example.com>` or `<https://example.com|label>`
//!
//! Source: <https://docs.slack.dev/messaging/formatting-message-text/>
//!
//! Everything else, including channel references and `<!here>`, is copied
//! through untouched. Slack already entity-escapes `&`, `<` and `>` in message
//! text, so plain text is not escaped again.

use std::borrow::Cow;
use std::ops::Range;

use regex::{Captures, Regex};

use crate::errors::ArchiveError;
use crate::slack::UserDirectory;

static TAG_RE: std::sync::LazyLock<Regex> = std::sync::LazyLock::new(|| {
    Regex::new(r"<@(?P<user>[^\s|>]+)(?:\|[^>]*)?>|<(?P<link>https?://[^>]+)>")
        .unwrap_or_else(|_| Regex::new(r"$^").expect("fallback regex compiles"))
});

#[derive(Debug, Clone, PartialEq, Eq)]
enum Tag<'t> {
    Mention { user_id: &'t str },
    Link { url: &'t str, label: Option<&'t str> },
}

// Tags in `text`, left to right, one entry per occurrence, with the byte span each one covers.
fn scan(text: &str) -> impl Iterator<Item = (Range<usize>, Tag<'_>)> {
    TAG_RE.captures_iter(text).filter_map(|caps| {
        let span = caps.get(0)?.range();
        tag_from(&caps).map(|tag| (span, tag))
    })
}

fn tag_from<'t>(caps: &Captures<'t>) -> Option<Tag<'t>> {
    if let Some(user) = caps.name("user") {
        return Some(Tag::Mention {
            user_id: user.as_str(),
        });
    }

    caps.name("link").map(|inner| {
        let (url, label) = match inner.as_str().split_once('|') {
            Some((url, label)) => (url, Some(label)),
            None => (inner.as_str(), None),
        };
        Tag::Link { url, label }
    })
}

/// Replace every mention and link tag in `text` with its HTML form.
///
/// Each occurrence is substituted on its own, so a tag repeated in a message
/// yields one independent replacement per occurrence.
///
/// # Errors
///
/// Returns `UnresolvedIdentity` if a mention names a user missing from `directory`.
pub fn rewrite(text: &str, directory: &UserDirectory) -> Result<String, ArchiveError> {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;

    for (span, tag) in scan(text) {
        out.push_str(&text[last..span.start]);
        match tag {
            Tag::Mention { user_id } => {
                let user = directory
                    .get_str(user_id)
                    .ok_or_else(|| ArchiveError::UnresolvedIdentity(user_id.to_string()))?;
                out.push_str(&format!(
                    r#"<span class="tag">{}</span>"#,
                    escape_html(user.display_name())
                ));
            }
            Tag::Link { url, label } => {
                let url = quote_attr(url);
                out.push_str(&format!(
                    r#"<a href="{url}" alt="{}" target="_blank">{url}</a>"#,
                    quote_attr(label.unwrap_or_default())
                ));
            }
        }
        last = span.end;
    }

    out.push_str(&text[last..]);
    Ok(out)
}

/// Escape a raw string for HTML text or attribute context.
#[must_use]
pub fn escape_html(raw: &str) -> Cow<'_, str> {
    if !raw.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(raw);
    }

    let mut out = String::with_capacity(raw.len() + 8);
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    Cow::Owned(out)
}

// Link parts arrive entity-escaped from Slack; only the quote needs care.
fn quote_attr(raw: &str) -> Cow<'_, str> {
    if raw.contains('"') {
        Cow::Owned(raw.replace('"', "&quot;"))
    } else {
        Cow::Borrowed(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::UserRecord;
    use serde_json::json;

    fn directory() -> UserDirectory {
        let users: Vec<UserRecord> = serde_json::from_value(json!([
            {"id": "U1", "name": "alice", "real_name": "Alice"},
            {"id": "U2", "name": "bob"},
            {"id": "U3", "name": "mallory", "real_name": "<b>Mal</b>"}
        ]))
        .unwrap();
        UserDirectory::from_records(&users)
    }

    #[test]
    fn test_scan_tags_in_order() {
        let text = "<@U1> see <https://a.example|A> and <@U2|bob> <https://b.example>";
        let tags: Vec<_> = scan(text).map(|(_, tag)| tag).collect();
        assert_eq!(
            tags,
            vec![
                Tag::Mention { user_id: "U1" },
                Tag::Link {
                    url: "https://a.example",
                    label: Some("A")
                },
                Tag::Mention { user_id: "U2" },
                Tag::Link {
                    url: "https://b.example",
                    label: None
                },
            ]
        );
    }

    #[test]
    fn test_scan_spans_cover_whole_tag() {
        let text = "hi <@U2|bob>!";
        let spans: Vec<_> = scan(text).map(|(span, _)| &text[span]).collect();
        assert_eq!(spans, vec!["<@U2|bob>"]);
    }

    #[test]
    fn test_repeated_mention_replaced_per_occurrence() {
        let out = rewrite("hello <@U1> and <@U1>", &directory()).unwrap();
        assert_eq!(
            out,
            r#"hello <span class="tag">Alice</span> and <span class="tag">Alice</span>"#
        );
    }

    #[test]
    fn test_mention_falls_back_to_username() {
        let out = rewrite("ping <@U2>", &directory()).unwrap();
        assert_eq!(out, r#"ping <span class="tag">bob</span>"#);
    }

    #[test]
    fn test_mention_name_is_escaped() {
        let out = rewrite("<@U3>", &directory()).unwrap();
        assert_eq!(out, r#"<span class="tag">&lt;b&gt;Mal&lt;/b&gt;</span>"#);
    }

    #[test]
    fn test_unknown_mention_fails_message() {
        let err = rewrite("hi <@U1> and <@U404>", &directory()).unwrap_err();
        match err {
            ArchiveError::UnresolvedIdentity(id) => assert_eq!(id, "U404"),
            other => panic!("Expected UnresolvedIdentity, got: {other:?}"),
        }
    }

    #[test]
    fn test_link_with_label() {
        let out = rewrite("<https://example.com|docs>", &directory()).unwrap();
        assert_eq!(
            out,
            r#"<a href="https://example.com" alt="docs" target="_blank">https://example.com</a>"#
        );
    }

    #[test]
    fn test_link_without_label() {
        let out = rewrite("read <https://example.com> now", &directory()).unwrap();
        assert_eq!(
            out,
            r#"read <a href="https://example.com" alt="" target="_blank">https://example.com</a> now"#
        );
    }

    #[test]
    fn test_other_markup_untouched() {
        let text = "&lt;not a tag&gt; <#C123|general> <!here>";
        assert_eq!(rewrite(text, &directory()).unwrap(), text);
    }

    #[test]
    fn test_adjacent_tags_do_not_merge() {
        let out = rewrite("<@U1><@U2>", &directory()).unwrap();
        assert_eq!(
            out,
            r#"<span class="tag">Alice</span><span class="tag">bob</span>"#
        );
    }

    #[test]
    fn test_escape_html_borrows_clean_input() {
        assert!(matches!(escape_html("plain"), Cow::Borrowed("plain")));
        assert_eq!(escape_html(r#"a&"b'"#), "a&amp;&quot;b&#39;");
    }
}
