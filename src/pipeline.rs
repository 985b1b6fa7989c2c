//! Run orchestration: wire up clients and tools, then execute the four
//! sub-agent roles in order.

use std::sync::Arc;

use anyhow::Context;
use chrono::{Duration, Local};
use tokio::sync::Mutex;

use crate::agent::{build_roles, AgentRunner, RoleParams};
use crate::changelog;
use crate::config::Config;
use crate::github::GithubClient;
use crate::llm::OpenRouterClient;
use crate::slack::{FetchAccumulator, SlackClient};
use crate::tools::{
    AddChangelogFrontmatter, CreateChangelogPr, EditFile, FetchMessagesFromChannel,
    MarkMessagesProcessed, ReadFile, SearchDocs, ToolContext, ToolRegistry, WriteFile,
};

/// Flags threaded from the CLI.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub days_back: i64,
    pub ignore_processed: bool,
    pub strip_emojis: bool,
    pub draft: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            days_back: 14,
            ignore_processed: false,
            strip_emojis: false,
            draft: true,
        }
    }
}

/// Execute one full changelog run.
///
/// Stages run strictly in order; a failed stage aborts the run. A window with
/// no unprocessed updates is a successful no-op: the writer produces no file
/// and the remaining stages are skipped.
pub async fn run(config: Config, options: PipelineOptions) -> anyhow::Result<()> {
    let today = Local::now().date_naive();
    let removed = changelog::cleanup_stale_artifacts(&config.workspace_path, today)
        .context("failed to clean up stale changelog artifacts")?;
    if !removed.is_empty() {
        tracing::info!("Cleaned up {} stale artifact(s)", removed.len());
    }

    let slack = Arc::new(SlackClient::new(config.slack_token.clone()));
    let github = Arc::new(GithubClient::new(
        config.github_token.clone(),
        config.github_repo.clone(),
    ));
    let llm = Arc::new(OpenRouterClient::new(config.api_key.clone()));

    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(FetchMessagesFromChannel::new(
        slack.clone(),
        config.slack_channel_id.clone(),
        config.media.clone(),
    )));
    registry.register(Arc::new(MarkMessagesProcessed::new(
        slack.clone(),
        config.slack_channel_id.clone(),
    )));
    registry.register(Arc::new(AddChangelogFrontmatter));
    registry.register(Arc::new(CreateChangelogPr::new(github.clone())));
    registry.register(Arc::new(ReadFile));
    registry.register(Arc::new(WriteFile));
    registry.register(Arc::new(EditFile));
    if let Some(endpoint) = &config.docs_search_url {
        registry.register(Arc::new(SearchDocs::new(endpoint.clone())));
    }
    let registry = Arc::new(registry);

    let params = RoleParams {
        today,
        window_start: today - Duration::days(options.days_back),
        channel: config.slack_channel_id.clone(),
        days_back: options.days_back,
        ignore_processed: options.ignore_processed,
        strip_emojis: options.strip_emojis,
        draft: options.draft,
    };
    let roles = build_roles(&config, &params);
    let runner = AgentRunner::new(llm, registry, config.max_iterations);

    let accumulator = Arc::new(Mutex::new(FetchAccumulator::new()));
    let today_file = changelog::changelog_path(&config.workspace_path, today);
    let mut reports = Vec::new();

    for role in &roles {
        let ctx = ToolContext::new(
            config.workspace_path.clone(),
            role.permissions.clone(),
            accumulator.clone(),
        );

        let report = runner
            .run_role(role, &ctx)
            .await
            .with_context(|| format!("stage {} failed", role.name))?;
        reports.push(report);

        // The writer produced nothing: an empty window is a deliberate no-op.
        if role.name == "changelog_writer" && !today_file.exists() {
            tracing::info!("No unprocessed updates in the window; nothing to publish");
            println!("No unprocessed updates in the window; nothing to publish.");
            return Ok(());
        }
    }

    println!("\nChangelog run complete:");
    for report in &reports {
        let usage = report
            .usage
            .map(|u| format!("{}+{} tokens", u.prompt_tokens, u.completion_tokens))
            .unwrap_or_else(|| "usage unavailable".to_string());
        println!(
            "  {} ({} iteration(s), {})\n    {}",
            report.role,
            report.iterations,
            usage,
            first_line(&report.response)
        );
    }

    let fetched = accumulator.lock().await;
    if !fetched.is_empty() {
        tracing::info!(
            "Run covered {} source message(s): {}",
            fetched.timestamps().len(),
            fetched.timestamps().join(",")
        );
    }

    Ok(())
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_match_cli_defaults() {
        let options = PipelineOptions::default();
        assert_eq!(options.days_back, 14);
        assert!(!options.ignore_processed);
        assert!(!options.strip_emojis);
        assert!(options.draft);
    }

    #[test]
    fn first_line_of_multiline_response() {
        assert_eq!(first_line("summary\ndetail"), "summary");
        assert_eq!(first_line(""), "");
    }
}
