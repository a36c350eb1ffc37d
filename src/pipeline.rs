//! Sequences one archive run: cache check, fetch on a miss, enrich, rewrite, render.
//!
//! All state for a run lives in [`PipelineContext`], owned by the caller.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use slack_morphism::SlackChannelId;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cache::{LocalCache, partial_path};
use crate::core::config::AppConfig;
use crate::core::models::{EnrichedMessage, RawMessage, ResolvedUser};
use crate::enrich::{format_timestamp, resolve};
use crate::errors::ArchiveError;
use crate::render::Renderer;
use crate::slack::{CallGuard, HistoryFetcher, SlackApi, UserDirectory, UserDirectoryFetcher};
use crate::text::rewrite;

pub const OUTPUT_FILE: &str = "history.html";

#[derive(Debug, Clone)]
pub struct PipelineContext {
    pub channel: SlackChannelId,
    pub cache: LocalCache,
    pub output_path: PathBuf,
    pub renderer: Renderer,
    pub guard: CallGuard,
}

impl PipelineContext {
    #[must_use]
    pub fn from_config(config: &AppConfig, cancel: CancellationToken) -> Self {
        Self {
            channel: SlackChannelId(config.channel_id.clone()),
            cache: LocalCache::new(config.data_dir.clone()),
            output_path: config.data_dir.join(OUTPUT_FILE),
            renderer: Renderer::new(config.render_order),
            guard: CallGuard::new(config.http_timeout, cancel),
        }
    }
}

/// Where a run's raw data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    Cache,
    Network,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub source: DataSource,
    pub messages: usize,
    pub users: usize,
    pub output: PathBuf,
}

/// Run the archive once.
///
/// # Errors
///
/// Any stage failure aborts the run; `history.html` is only written when
/// every message rendered.
pub async fn run<A: SlackApi + ?Sized>(ctx: &PipelineContext, api: &A) -> Result<RunSummary, ArchiveError> {
    let (messages, users, source) = match ctx.cache.try_load().await? {
        Some((messages, users)) => {
            info!("Local files found, proceeding with local data");
            (messages, users, DataSource::Cache)
        }
        None => {
            info!("No local files found, retrieving data from Slack");
            let messages = HistoryFetcher::new(api, &ctx.guard)
                .fetch_all(&ctx.channel)
                .await?;
            let users = UserDirectoryFetcher::new(api, &ctx.guard).fetch_all().await?;
            ctx.cache.persist(&messages, &users).await?;
            (messages, users, DataSource::Network)
        }
    };

    let directory = UserDirectory::from_records(&users);
    if directory.is_empty() && !messages.is_empty() {
        warn!("User directory is empty; user authors will render as unknown");
    }

    if ctx.guard.cancel_token().is_cancelled() {
        return Err(ArchiveError::Cancelled("before rendering".to_string()));
    }

    let summary = RunSummary {
        source,
        messages: messages.len(),
        users: directory.len(),
        output: ctx.output_path.clone(),
    };

    let renderer = ctx.renderer;
    write_document(ctx.output_path.clone(), move |sink| {
        renderer.render(enrich_messages(&messages, &directory), sink)
    })
    .await?;
    info!(
        "HTML file successfully written to {} ({} messages, {} order)",
        ctx.output_path.display(),
        summary.messages,
        ctx.renderer.order()
    );

    Ok(summary)
}

/// Lazily enrich `messages`, one [`EnrichedMessage`] per item, in input order.
///
/// Nothing is computed until the iterator is pulled, and it can be walked
/// from either end.
pub fn enrich_messages<'a>(
    messages: &'a [RawMessage],
    directory: &'a UserDirectory,
) -> impl DoubleEndedIterator<Item = Result<EnrichedMessage, ArchiveError>> + 'a {
    resolve(messages, directory).map(move |(message, user)| enrich_message(message, user, directory))
}

/// Format the time and rewrite the text of one message whose author is already resolved.
///
/// # Errors
///
/// Fails on an unparseable timestamp or a mention of an unknown user.
pub fn enrich_message(
    message: &RawMessage,
    user: ResolvedUser,
    directory: &UserDirectory,
) -> Result<EnrichedMessage, ArchiveError> {
    let time = format_timestamp(&message.ts.0)?;
    let text = rewrite(&message.text, directory).map_err(|e| match e {
        ArchiveError::UnresolvedIdentity(id) => ArchiveError::UnresolvedIdentity(format!(
            "{id} (mentioned in message ts={})",
            message.ts.0
        )),
        other => other,
    })?;
    Ok(EnrichedMessage {
        message: message.clone(),
        user,
        time,
        text,
    })
}

/// Run `render` against `<output>.partial` and rename over `output` once it succeeds.
///
/// # Errors
///
/// Returns `IoError` on any filesystem failure, or whatever `render` returned.
/// In both cases the partial file is removed and `output` is left untouched.
pub async fn write_document<F>(output: PathBuf, render: F) -> Result<(), ArchiveError>
where
    F: FnOnce(BufWriter<File>) -> Result<(), ArchiveError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || write_document_blocking(&output, render))
        .await
        .map_err(|e| ArchiveError::IoError(format!("render task failed: {e}")))?
}

fn write_document_blocking<F>(output: &Path, render: F) -> Result<(), ArchiveError>
where
    F: FnOnce(BufWriter<File>) -> Result<(), ArchiveError>,
{
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| ArchiveError::IoError(format!("create {}: {e}", parent.display())))?;
    }

    let partial = partial_path(output);
    let result = File::create(&partial)
        .map_err(|e| ArchiveError::IoError(format!("create {}: {e}", partial.display())))
        .and_then(|file| render(BufWriter::new(file)));

    match result {
        Ok(()) => std::fs::rename(&partial, output)
            .map_err(|e| ArchiveError::IoError(format!("rename to {}: {e}", output.display()))),
        Err(e) => {
            if let Err(cleanup) = std::fs::remove_file(&partial) {
                warn!("Failed to remove {}: {}", partial.display(), cleanup);
            }
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::UserRecord;
    use crate::render::RenderOrder;
    use serde_json::json;

    #[test]
    fn test_enrich_messages_end_to_end() {
        let messages: Vec<RawMessage> =
            serde_json::from_value(json!([{"ts": "1600000000", "text": "hi <@U1>", "user": "U2"}]))
                .unwrap();
        let users: Vec<UserRecord> = serde_json::from_value(json!([
            {"id": "U1", "name": "alice", "real_name": "Alice"},
            {"id": "U2", "name": "bob", "real_name": "Bob"}
        ]))
        .unwrap();

        let directory = UserDirectory::from_records(&users);
        let enriched: Vec<_> = enrich_messages(&messages, &directory)
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(enriched.len(), 1);
        assert_eq!(enriched[0].user.display_name(), Some("Bob"));
        assert_eq!(enriched[0].text, r#"hi <span class="tag">Alice</span>"#);
        assert_eq!(enriched[0].time, "Sun, 13 Sep 2020 12:26:40 GMT");
    }

    #[test]
    fn test_unresolved_mention_names_message() {
        let messages: Vec<RawMessage> =
            serde_json::from_value(json!([{"ts": "5", "text": "<@U9>", "user": "U1"}])).unwrap();
        let users: Vec<UserRecord> =
            serde_json::from_value(json!([{"id": "U1", "name": "alice"}])).unwrap();

        let directory = UserDirectory::from_records(&users);
        let err = enrich_messages(&messages, &directory)
            .collect::<Result<Vec<_>, _>>()
            .unwrap_err();
        match err {
            ArchiveError::UnresolvedIdentity(msg) => {
                assert!(msg.contains("U9"));
                assert!(msg.contains("ts=5"));
            }
            other => panic!("Expected UnresolvedIdentity, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_write_document_replaces_atomically() {
        let tmp = tempfile::tempdir().unwrap();
        let output = tmp.path().join("out").join(OUTPUT_FILE);
        let message = EnrichedMessage {
            message: serde_json::from_value(json!({"ts": "1", "text": "x"})).unwrap(),
            user: ResolvedUser::Unresolved { referenced_id: None },
            time: "t".to_string(),
            text: "x".to_string(),
        };
        let renderer = Renderer::new(RenderOrder::AsRetrieved);

        write_document(output.clone(), move |sink| renderer.render([Ok(message)], sink))
            .await
            .unwrap();

        assert!(output.exists());
        assert!(!partial_path(&output).exists());
        let html = std::fs::read_to_string(&output).unwrap();
        assert!(html.contains("Unknown user"));
    }

    #[tokio::test]
    async fn test_write_document_failure_leaves_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        // the output's parent is a file, so nothing can be created beneath it
        let blocker = tmp.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();
        let output = blocker.join(OUTPUT_FILE);

        let err = write_document(output.clone(), |_| Ok(())).await.unwrap_err();

        assert!(matches!(err, ArchiveError::IoError(_)));
        assert!(!output.exists());
        assert!(!partial_path(&output).exists());
    }

    #[tokio::test]
    async fn test_render_failure_midway_keeps_previous_document() {
        let tmp = tempfile::tempdir().unwrap();
        let output = tmp.path().join(OUTPUT_FILE);
        std::fs::write(&output, "previous").unwrap();
        let messages: Vec<RawMessage> = serde_json::from_value(json!([
            {"ts": "2", "text": "fine", "user": "U1"},
            {"ts": "1", "text": "<@U404>", "user": "U1"}
        ]))
        .unwrap();
        let users: Vec<UserRecord> =
            serde_json::from_value(json!([{"id": "U1", "name": "alice"}])).unwrap();
        let directory = UserDirectory::from_records(&users);
        let renderer = Renderer::default();

        let err = write_document(output.clone(), move |sink| {
            renderer.render(enrich_messages(&messages, &directory), sink)
        })
        .await
        .unwrap_err();

        assert!(matches!(err, ArchiveError::UnresolvedIdentity(_)));
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "previous");
        assert!(!partial_path(&output).exists());
    }
}
