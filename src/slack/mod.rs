//! Slack REST wrappers: channel history, threads, permalinks, and the
//! processed-message marker.
//!
//! The Slack web API is consumed as-is; this module only adds typed message
//! structures, the explicit [`FetchAccumulator`] used for idempotency
//! bookkeeping, and the per-message [`ProcessedState`] derived from reactions.

mod media;

pub use media::{
    derived_file_name, download_message_media, sanitize_media_name, MediaRecord, MediaStatus,
};

use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use thiserror::Error;

use crate::config::MediaConfig;

/// Emoji reaction used as the external processed-flag on source messages.
pub const PROCESSED_REACTION: &str = "white_check_mark";

const SLACK_API_BASE: &str = "https://slack.com/api";

#[derive(Debug, Error)]
pub enum SlackError {
    /// The API answered with `ok: false`.
    #[error("Slack API error in {method}: {error}")]
    Api { method: String, error: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// An attachment descriptor as returned by the Slack API.
#[derive(Debug, Clone, Deserialize)]
pub struct SlackFile {
    #[serde(default)]
    pub id: String,
    pub name: Option<String>,
    pub title: Option<String>,
    pub mimetype: Option<String>,
    pub url_private: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Reaction {
    pub name: String,
    #[serde(default)]
    pub count: u32,
}

/// A raw message from `conversations.history` / `conversations.replies`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawMessage {
    pub ts: String,
    pub user: Option<String>,
    pub text: Option<String>,
    pub thread_ts: Option<String>,
    #[serde(default)]
    pub files: Vec<SlackFile>,
    #[serde(default)]
    pub reactions: Vec<Reaction>,
}

/// Whether a source message already produced a shipped changelog entry.
///
/// The flag lives on the chat platform as an emoji reaction; it is resolved
/// into an explicit state here rather than inferred downstream from free-form
/// reaction lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessedState {
    Unprocessed,
    Processed,
}

impl ProcessedState {
    pub fn from_reactions(reactions: &[Reaction]) -> Self {
        if reactions.iter().any(|r| r.name == PROCESSED_REACTION) {
            ProcessedState::Processed
        } else {
            ProcessedState::Unprocessed
        }
    }

    pub fn is_processed(self) -> bool {
        matches!(self, ProcessedState::Processed)
    }
}

/// A thread reply with its downloaded media.
#[derive(Debug, Clone)]
pub struct ThreadReply {
    pub ts: String,
    pub user: String,
    pub text: String,
    pub permalink: Option<String>,
    pub media: Vec<MediaRecord>,
}

/// A fully processed channel message: permalink resolved, media staged,
/// thread replies attached.
#[derive(Debug, Clone)]
pub struct ChannelMessage {
    pub ts: String,
    pub user: String,
    pub text: String,
    pub permalink: Option<String>,
    pub state: ProcessedState,
    pub media: Vec<MediaRecord>,
    pub replies: Vec<ThreadReply>,
}

/// The time window to fetch, as epoch-second bounds.
#[derive(Debug, Clone, Copy)]
pub struct FetchWindow {
    pub oldest: DateTime<Utc>,
    pub latest: DateTime<Utc>,
}

impl FetchWindow {
    /// Window covering the last `days` days up to `now`.
    pub fn days_back(days: i64, now: DateTime<Utc>) -> Self {
        Self {
            oldest: now - Duration::days(days),
            latest: now,
        }
    }
}

/// Options threaded from the CLI into the fetch.
#[derive(Debug, Clone, Copy, Default)]
pub struct FetchOptions {
    /// Include messages already carrying the processed marker.
    pub ignore_processed: bool,

    /// Remove `:emoji:` shortcodes from message text.
    pub strip_emojis: bool,
}

/// Explicit accumulator for the message timestamps fetched during one run.
///
/// Passed through and returned by the fetch call so idempotency bookkeeping
/// has no process-wide state.
#[derive(Debug, Clone, Default)]
pub struct FetchAccumulator {
    timestamps: Vec<String>,
}

impl FetchAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a fetched message timestamp, keeping first-seen order.
    pub fn record(&mut self, ts: &str) {
        if !self.timestamps.iter().any(|t| t == ts) {
            self.timestamps.push(ts.to_string());
        }
    }

    pub fn timestamps(&self) -> &[String] {
        &self.timestamps
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}

/// Thin client over the Slack web API.
#[derive(Debug, Clone)]
pub struct SlackClient {
    http: reqwest::Client,
    token: String,
    base_url: String,
}

impl SlackClient {
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_base_url(token, SLACK_API_BASE)
    }

    /// Client against a custom API base (used by tests).
    pub fn with_base_url(token: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            token: token.into(),
            base_url: base_url.into(),
        }
    }

    async fn call(
        &self,
        method: &str,
        params: &[(&str, String)],
    ) -> Result<serde_json::Value, SlackError> {
        let url = format!("{}/{}", self.base_url, method);
        let body: serde_json::Value = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .query(params)
            .send()
            .await?
            .json()
            .await?;

        if body["ok"].as_bool() != Some(true) {
            return Err(SlackError::Api {
                method: method.to_string(),
                error: body["error"].as_str().unwrap_or("unknown").to_string(),
            });
        }
        Ok(body)
    }

    /// Fetch channel history bounded by the window.
    pub async fn conversations_history(
        &self,
        channel: &str,
        window: &FetchWindow,
    ) -> Result<Vec<RawMessage>, SlackError> {
        let body = self
            .call(
                "conversations.history",
                &[
                    ("channel", channel.to_string()),
                    ("oldest", format!("{}", window.oldest.timestamp())),
                    ("latest", format!("{}", window.latest.timestamp())),
                ],
            )
            .await?;
        Ok(parse_messages(&body))
    }

    /// Fetch all replies in a thread, excluding the parent message.
    pub async fn conversations_replies(
        &self,
        channel: &str,
        thread_ts: &str,
    ) -> Result<Vec<RawMessage>, SlackError> {
        let body = self
            .call(
                "conversations.replies",
                &[
                    ("channel", channel.to_string()),
                    ("ts", thread_ts.to_string()),
                ],
            )
            .await?;
        Ok(parse_messages(&body)
            .into_iter()
            .filter(|m| m.ts != thread_ts)
            .collect())
    }

    /// Resolve the permanent link for a message.
    pub async fn permalink(&self, channel: &str, ts: &str) -> Result<String, SlackError> {
        let body = self
            .call(
                "chat.getPermalink",
                &[
                    ("channel", channel.to_string()),
                    ("message_ts", ts.to_string()),
                ],
            )
            .await?;
        Ok(body["permalink"].as_str().unwrap_or_default().to_string())
    }

    /// Add a reaction to a message. An `already_reacted` answer is success.
    pub async fn add_reaction(
        &self,
        channel: &str,
        ts: &str,
        emoji: &str,
    ) -> Result<(), SlackError> {
        match self
            .call(
                "reactions.add",
                &[
                    ("channel", channel.to_string()),
                    ("timestamp", ts.to_string()),
                    ("name", emoji.to_string()),
                ],
            )
            .await
        {
            Ok(_) => Ok(()),
            Err(SlackError::Api { ref error, .. }) if error == "already_reacted" => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Download a private file URL. The token rides in the Authorization
    /// header; the URL's own embedded token rotates between requests.
    pub async fn download(&self, url: &str) -> Result<bytes::Bytes, SlackError> {
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.bytes().await?)
    }
}

fn parse_messages(body: &serde_json::Value) -> Vec<RawMessage> {
    body["messages"]
        .as_array()
        .map(|messages| {
            messages
                .iter()
                .filter_map(|m| serde_json::from_value(m.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}

/// Remove `:shortcode:` emojis from message text.
pub fn strip_emoji_shortcodes(text: &str) -> String {
    let re = regex::Regex::new(r":[a-zA-Z0-9_\-\+']+:").expect("valid regex");
    let stripped = re.replace_all(text, "");
    let collapsed = regex::Regex::new(r"  +")
        .expect("valid regex")
        .replace_all(&stripped, " ");
    collapsed.trim().to_string()
}

/// Fetch messages in the window with permalinks, thread replies, staged
/// media, and processed-state resolution.
///
/// Per-message Slack failures are logged and skip that message; the fetch
/// continues. Fetched timestamps are recorded into `accumulator`.
#[allow(clippy::too_many_arguments)]
pub async fn fetch_channel_messages(
    client: &SlackClient,
    channel: &str,
    window: &FetchWindow,
    options: &FetchOptions,
    limits: &MediaConfig,
    media_dir: &Path,
    accumulator: &mut FetchAccumulator,
) -> Result<Vec<ChannelMessage>, SlackError> {
    let raw = client.conversations_history(channel, window).await?;
    let mut messages = Vec::new();

    for msg in raw {
        let state = ProcessedState::from_reactions(&msg.reactions);
        if state.is_processed() && !options.ignore_processed {
            tracing::debug!(ts = %msg.ts, "Skipping already-processed message");
            continue;
        }

        let permalink = match client.permalink(channel, &msg.ts).await {
            Ok(link) => Some(link),
            Err(e) => {
                tracing::warn!(ts = %msg.ts, "Failed to resolve permalink: {}", e);
                None
            }
        };

        let media = download_message_media(client, &msg.files, media_dir, limits).await;

        let mut replies = Vec::new();
        if let Some(thread_ts) = msg.thread_ts.as_deref() {
            match client.conversations_replies(channel, thread_ts).await {
                Ok(raw_replies) => {
                    for reply in raw_replies {
                        let reply_permalink = client.permalink(channel, &reply.ts).await.ok();
                        let reply_media =
                            download_message_media(client, &reply.files, media_dir, limits).await;
                        replies.push(ThreadReply {
                            ts: reply.ts,
                            user: reply.user.unwrap_or_else(|| "unknown".to_string()),
                            text: clean_text(reply.text.as_deref(), options),
                            permalink: reply_permalink,
                            media: reply_media,
                        });
                    }
                }
                Err(e) => {
                    tracing::warn!(ts = %msg.ts, "Failed to fetch thread replies: {}", e);
                }
            }
        }

        accumulator.record(&msg.ts);
        messages.push(ChannelMessage {
            ts: msg.ts,
            user: msg.user.unwrap_or_else(|| "unknown".to_string()),
            text: clean_text(msg.text.as_deref(), options),
            permalink,
            state,
            media,
            replies,
        });
    }

    Ok(messages)
}

fn clean_text(text: Option<&str>, options: &FetchOptions) -> String {
    let text = text.unwrap_or_default();
    if options.strip_emojis {
        strip_emoji_shortcodes(text)
    } else {
        text.to_string()
    }
}

/// Mark messages as processed by adding the marker reaction.
///
/// Returns the timestamps that were marked; failures are collected per
/// message rather than aborting the batch.
pub async fn mark_messages_processed(
    client: &SlackClient,
    channel: &str,
    timestamps: &[String],
) -> (Vec<String>, Vec<(String, SlackError)>) {
    let mut marked = Vec::new();
    let mut failed = Vec::new();

    for ts in timestamps {
        match client.add_reaction(channel, ts, PROCESSED_REACTION).await {
            Ok(()) => marked.push(ts.clone()),
            Err(e) => {
                tracing::warn!(ts = %ts, "Failed to mark message processed: {}", e);
                failed.push((ts.clone(), e));
            }
        }
    }

    (marked, failed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn processed_state_from_reactions() {
        let reactions = vec![
            Reaction {
                name: "tada".to_string(),
                count: 3,
            },
            Reaction {
                name: PROCESSED_REACTION.to_string(),
                count: 1,
            },
        ];
        assert_eq!(
            ProcessedState::from_reactions(&reactions),
            ProcessedState::Processed
        );
        assert_eq!(
            ProcessedState::from_reactions(&reactions[..1]),
            ProcessedState::Unprocessed
        );
        assert_eq!(
            ProcessedState::from_reactions(&[]),
            ProcessedState::Unprocessed
        );
    }

    #[test]
    fn accumulator_dedups_and_keeps_order() {
        let mut acc = FetchAccumulator::new();
        acc.record("2.0");
        acc.record("1.0");
        acc.record("2.0");
        assert_eq!(acc.timestamps(), &["2.0".to_string(), "1.0".to_string()]);
    }

    #[test]
    fn window_spans_requested_days() {
        let now = DateTime::parse_from_rfc3339("2025-01-15T12:00:00Z")
            .expect("valid time")
            .with_timezone(&Utc);
        let window = FetchWindow::days_back(14, now);
        assert_eq!(window.latest, now);
        assert_eq!((window.latest - window.oldest).num_days(), 14);
    }

    #[test]
    fn strips_emoji_shortcodes() {
        assert_eq!(
            strip_emoji_shortcodes("Shipped :rocket: the new editor :tada:"),
            "Shipped the new editor"
        );
        assert_eq!(strip_emoji_shortcodes("no emojis here"), "no emojis here");
        // A lone colon pair with invalid characters is left alone.
        assert_eq!(strip_emoji_shortcodes("a : b : c"), "a : b : c");
    }

    #[test]
    fn raw_message_deserializes_with_defaults() {
        let msg: RawMessage = serde_json::from_value(serde_json::json!({
            "ts": "1736901000.000100",
            "text": "New deploy pipeline is live"
        }))
        .expect("deserialize");
        assert_eq!(msg.ts, "1736901000.000100");
        assert!(msg.files.is_empty());
        assert!(msg.reactions.is_empty());
        assert!(msg.thread_ts.is_none());
    }
}
