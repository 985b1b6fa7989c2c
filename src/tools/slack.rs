//! Slack tools: fetch channel messages and mark them processed.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};

use super::{Tool, ToolContext};
use crate::changelog;
use crate::config::MediaConfig;
use crate::slack::{
    fetch_channel_messages, mark_messages_processed, ChannelMessage, FetchOptions, FetchWindow,
    SlackClient,
};

const DEFAULT_DAYS_BACK: i64 = 14;
const TEXT_PREVIEW_LEN: usize = 300;

/// Fetch messages, threads, and media from the configured channel.
pub struct FetchMessagesFromChannel {
    client: Arc<SlackClient>,
    channel: String,
    media: MediaConfig,
}

impl FetchMessagesFromChannel {
    pub fn new(client: Arc<SlackClient>, channel: String, media: MediaConfig) -> Self {
        Self {
            client,
            channel,
            media,
        }
    }
}

#[async_trait]
impl Tool for FetchMessagesFromChannel {
    fn name(&self) -> &str {
        "fetch_messages_from_channel"
    }

    fn description(&self) -> &str {
        "Fetch messages from a Slack channel within a time range. Downloads attached media to the dated staging directory, resolves permalinks, includes thread replies, and reports each message's raw timestamp for the idempotency marker."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "channel_id": {
                    "type": "string",
                    "description": "The Slack channel ID (defaults to the configured channel)"
                },
                "days_back": {
                    "type": "integer",
                    "description": "Number of days back to fetch (default: 14)"
                },
                "ignore_processed": {
                    "type": "boolean",
                    "description": "Include messages already carrying the processed marker (default: false)"
                },
                "strip_emojis": {
                    "type": "boolean",
                    "description": "Remove :emoji: shortcodes from message text (default: false)"
                }
            }
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> anyhow::Result<String> {
        let channel = args["channel_id"]
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| self.channel.clone());
        if channel.is_empty() {
            anyhow::bail!("channel_id is required");
        }

        let days_back = args["days_back"].as_i64().unwrap_or(DEFAULT_DAYS_BACK);
        let options = FetchOptions {
            ignore_processed: args["ignore_processed"].as_bool().unwrap_or(false),
            strip_emojis: args["strip_emojis"].as_bool().unwrap_or(false),
        };

        let now = Utc::now();
        let window = FetchWindow::days_back(days_back, now);
        let media_dir = changelog::media_dir(&ctx.workspace, now.date_naive());

        tracing::info!(
            channel = %channel,
            days_back,
            "Fetching messages from {} to {}",
            window.oldest.format("%Y-%m-%d"),
            window.latest.format("%Y-%m-%d")
        );

        let mut accumulator = ctx.accumulator.lock().await;
        let messages = fetch_channel_messages(
            &self.client,
            &channel,
            &window,
            &options,
            &self.media,
            &media_dir,
            &mut accumulator,
        )
        .await
        .map_err(|e| anyhow::anyhow!("Slack API error: {}", e))?;

        Ok(format_fetch_summary(&messages, &channel, &window))
    }
}

/// Render the fetch result for the agent.
fn format_fetch_summary(
    messages: &[ChannelMessage],
    channel: &str,
    window: &FetchWindow,
) -> String {
    let mut summary = format!(
        "Fetched {} message(s) from channel {}\nTime range: {} to {}\n",
        messages.len(),
        channel,
        window.oldest.format("%Y-%m-%d"),
        window.latest.format("%Y-%m-%d"),
    );

    let mut downloaded = 0;
    let mut skipped = 0;
    let mut failed = 0;
    for record in messages
        .iter()
        .flat_map(|m| m.media.iter().chain(m.replies.iter().flat_map(|r| r.media.iter())))
    {
        use crate::slack::MediaStatus;
        match &record.status {
            MediaStatus::Downloaded => downloaded += 1,
            MediaStatus::Skipped => skipped += 1,
            MediaStatus::Failed(_) => failed += 1,
        }
    }
    summary.push_str(&format!(
        "Media files: {} downloaded, {} skipped (already exist), {} failed\n\n",
        downloaded, skipped, failed
    ));

    if messages.is_empty() {
        summary.push_str("No unprocessed messages in the window.\n");
        return summary;
    }

    for (i, msg) in messages.iter().enumerate() {
        summary.push_str(&format!("Message {}:\n", i + 1));
        summary.push_str(&format!("  ts: {}\n", msg.ts));
        summary.push_str(&format!("  user: {}\n", msg.user));

        let text = if msg.text.len() > TEXT_PREVIEW_LEN {
            let mut end = TEXT_PREVIEW_LEN;
            while !msg.text.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}...", &msg.text[..end])
        } else {
            msg.text.clone()
        };
        summary.push_str(&format!("  text: {}\n", text));
        summary.push_str(&format!(
            "  link: {}\n",
            msg.permalink.as_deref().unwrap_or("N/A")
        ));

        if !msg.media.is_empty() {
            summary.push_str(&format!("  files ({}):\n", msg.media.len()));
            for record in &msg.media {
                let kind = if record.is_image {
                    "image"
                } else if record.is_video {
                    "video"
                } else {
                    "file"
                };
                summary.push_str(&format!(
                    "    [{:?}] {}: {} at {}\n",
                    record.status,
                    kind,
                    record.file_name,
                    record.local_path.display()
                ));
            }
        }

        if !msg.replies.is_empty() {
            let reply_files: usize = msg.replies.iter().map(|r| r.media.len()).sum();
            summary.push_str(&format!(
                "  thread: {} repl{}{}\n",
                msg.replies.len(),
                if msg.replies.len() == 1 { "y" } else { "ies" },
                if reply_files > 0 {
                    format!(", {} file(s)", reply_files)
                } else {
                    String::new()
                }
            ));
        }
        summary.push('\n');
    }

    summary
}

/// Add the processed marker reaction to shipped messages.
pub struct MarkMessagesProcessed {
    client: Arc<SlackClient>,
    channel: String,
}

impl MarkMessagesProcessed {
    pub fn new(client: Arc<SlackClient>, channel: String) -> Self {
        Self { client, channel }
    }
}

#[async_trait]
impl Tool for MarkMessagesProcessed {
    fn name(&self) -> &str {
        "mark_messages_processed"
    }

    fn description(&self) -> &str {
        "Add the processed emoji reaction to Slack messages after successful PR creation."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "channel_id": {
                    "type": "string",
                    "description": "The Slack channel ID (defaults to the configured channel)"
                },
                "message_timestamps": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Message 'ts' values to mark as processed"
                }
            },
            "required": ["message_timestamps"]
        })
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> anyhow::Result<String> {
        let channel = args["channel_id"]
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| self.channel.clone());

        let timestamps: Vec<String> = args["message_timestamps"]
            .as_array()
            .ok_or_else(|| anyhow::anyhow!("message_timestamps must be an array of strings"))?
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect();

        if timestamps.is_empty() {
            return Ok("No timestamps provided; nothing to mark.".to_string());
        }

        let (marked, failed) = mark_messages_processed(&self.client, &channel, &timestamps).await;

        let mut summary = format!(
            "Marked {}/{} message(s) processed in {}\n",
            marked.len(),
            timestamps.len(),
            channel
        );
        for (ts, err) in &failed {
            summary.push_str(&format!("  failed {}: {}\n", ts, err));
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    use crate::slack::{MediaRecord, MediaStatus, ProcessedState};

    fn window() -> FetchWindow {
        let now = DateTime::parse_from_rfc3339("2025-01-15T12:00:00Z")
            .expect("valid time")
            .with_timezone(&Utc);
        FetchWindow::days_back(14, now)
    }

    fn message_with_media() -> ChannelMessage {
        ChannelMessage {
            ts: "1736901000.000100".to_string(),
            user: "U123".to_string(),
            text: "Shipped the new editor".to_string(),
            permalink: Some("https://acme.slack.com/archives/C123/p1736901000000100".to_string()),
            state: ProcessedState::Unprocessed,
            media: vec![MediaRecord {
                original_name: Some("demo.gif".to_string()),
                file_name: "demo_ab12cd34ef56.gif".to_string(),
                local_path: "/ws/docs/updates/media/2025-01-15/demo_ab12cd34ef56.gif".into(),
                mimetype: "image/gif".to_string(),
                size: 1024,
                is_image: true,
                is_video: false,
                status: MediaStatus::Downloaded,
            }],
            replies: vec![],
        }
    }

    #[test]
    fn summary_reports_raw_timestamps_and_counts() {
        let summary = format_fetch_summary(&[message_with_media()], "C123", &window());
        assert!(summary.contains("Fetched 1 message(s) from channel C123"));
        assert!(summary.contains("ts: 1736901000.000100"));
        assert!(summary.contains("1 downloaded, 0 skipped"));
        assert!(summary.contains("demo_ab12cd34ef56.gif"));
    }

    #[test]
    fn summary_truncates_long_text() {
        let mut msg = message_with_media();
        msg.text = "x".repeat(500);
        let summary = format_fetch_summary(&[msg], "C123", &window());
        assert!(summary.contains(&format!("{}...", "x".repeat(300))));
    }

    #[test]
    fn empty_fetch_says_so() {
        let summary = format_fetch_summary(&[], "C123", &window());
        assert!(summary.contains("No unprocessed messages in the window."));
    }
}
