//! Slack Archive - exports the full history of one Slack channel as a static HTML page.
//!
//! A run goes through these steps:
//! 1. Look for `messages.json` and `users.json` in the data directory
//! 2. If either is missing, page through `conversations.history`, fetch
//!    `users.list`, and save both as the new cache
//! 3. Resolve every message's author (bot posts get a synthetic identity)
//! 4. Rewrite mention and link tags into HTML
//! 5. Stream the messages into `history.html`
//!
//! # Example
//!
//! ```no_run
//! use slack_archive::core::config::AppConfig;
//! use slack_archive::pipeline::{self, PipelineContext};
//! use slack_archive::slack::SlackClient;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     slack_archive::setup_logging();
//!
//!     let config = AppConfig::from_env()?;
//!     let client = SlackClient::from_config(&config)?;
//!     let ctx = PipelineContext::from_config(&config, CancellationToken::new());
//!
//!     let summary = pipeline::run(&ctx, &client).await?;
//!     println!("{} messages written to {}", summary.messages, summary.output.display());
//!     Ok(())
//! }
//! ```

// Module declarations
pub mod cache;
pub mod core;
pub mod enrich;
pub mod errors;
pub mod pipeline;
pub mod render;
pub mod slack;
pub mod text;

pub use errors::ArchiveError;

/// Configure structured logging.
///
/// Honors `RUST_LOG` and defaults to `info`. Safe to call more than once;
/// later calls leave the first subscriber in place.
///
/// # Example
///
/// ```
/// slack_archive::setup_logging();
/// ```
pub fn setup_logging() {
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(true);

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}
