use std::process::ExitCode;

use anyhow::{Context, Result};
use slack_archive::ArchiveError;
use slack_archive::core::config::AppConfig;
use slack_archive::pipeline::{self, PipelineContext};
use slack_archive::slack::SlackClient;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> ExitCode {
    slack_archive::setup_logging();

    match archive().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Archive failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn archive() -> Result<()> {
    let config = AppConfig::from_env().map_err(ArchiveError::ConfigError)?;
    info!(
        "Archiving channel {} into {}",
        config.channel_id,
        config.data_dir.display()
    );

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("Interrupt received, cancelling run");
                on_signal.cancel();
            }
            Err(e) => warn!("Failed to listen for Ctrl-C: {}", e),
        }
    });

    let client = SlackClient::from_config(&config).context("Failed to initialize Slack client")?;
    let ctx = PipelineContext::from_config(&config, cancel);

    let summary = pipeline::run(&ctx, &client).await?;
    info!(
        "Done: {} messages, {} users ({:?}) -> {}",
        summary.messages,
        summary.users,
        summary.source,
        summary.output.display()
    );

    Ok(())
}
