//! Changelog Bot - CLI Entry Point
//!
//! Runs one changelog generation pass: fetch, draft, format, review, publish.

use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use changelog_bot::{cli::Cli, config::Config, pipeline};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "changelog_bot=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    // Load configuration
    let config = Config::from_env()?;
    info!(
        "Loaded configuration: repo={} channel={} model={}",
        config.github_repo, config.slack_channel_id, config.default_model
    );

    let options = pipeline::PipelineOptions {
        days_back: cli.days_back,
        ignore_processed: cli.ignore_processed,
        strip_emojis: cli.strip_emojis,
        draft: !cli.no_draft,
    };

    pipeline::run(config, options).await?;

    Ok(())
}
