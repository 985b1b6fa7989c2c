//! Local changelog artifact model.
//!
//! A changelog is a markdown document keyed by calendar date. The first line
//! is reserved for a machine-readable idempotency marker listing the Slack
//! message timestamps that produced it, so a re-run can skip messages that
//! already shipped.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use regex::Regex;
use thiserror::Error;

/// Directory for changelog documents, relative to the workspace.
pub const CHANGELOG_DIR: &str = "docs/updates";

/// Directory for staged media files, relative to the workspace.
pub const MEDIA_BASE_DIR: &str = "docs/updates/media";

/// Stray draft names some agent runs leave behind.
const STRAY_DRAFT_FILES: &[&str] = &["draft_changelog.md", "changelog_draft.md", "draft.md"];

#[derive(Debug, Error)]
pub enum ChangelogError {
    #[error("date must be in format YYYY-MM-DD, got: {0}")]
    InvalidDate(String),
}

/// Path to the changelog document for a given date.
pub fn changelog_path(workspace: &Path, date: NaiveDate) -> PathBuf {
    workspace
        .join(CHANGELOG_DIR)
        .join(format!("{}.md", date.format("%Y-%m-%d")))
}

/// Path to the dated media staging directory.
pub fn media_dir(workspace: &Path, date: NaiveDate) -> PathBuf {
    workspace
        .join(MEDIA_BASE_DIR)
        .join(date.format("%Y-%m-%d").to_string())
}

/// Render the first-line idempotency marker from source message timestamps.
pub fn render_timestamp_marker(timestamps: &[String]) -> String {
    format!("<!-- slack_timestamps: {} -->", timestamps.join(","))
}

/// Parse the idempotency marker, returning the ordered timestamp list.
///
/// Tolerates arbitrary whitespace inside the comment. Returns `None` when the
/// line is not a marker.
pub fn parse_timestamp_marker(line: &str) -> Option<Vec<String>> {
    let re = Regex::new(r"<!--\s*slack_timestamps:\s*([^>]*?)\s*-->").expect("valid regex");
    let captured = re.captures(line)?;
    let ids = captured[1]
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    Some(ids)
}

/// Prepend documentation frontmatter to trimmed changelog content.
///
/// The `date` must be in `YYYY-MM-DD` form; it is rendered as a long-form
/// title (e.g. `January 15, 2025`).
pub fn build_frontmatter(content: &str, date: &str) -> Result<String, ChangelogError> {
    let parsed = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|_| ChangelogError::InvalidDate(date.to_string()))?;
    let title = parsed.format("%B %d, %Y");

    Ok(format!(
        "---\ntitle: {title}\ndescription: 2 min read\n---\n\n\
         import {{ AuthorCard }} from '/snippets/author-card.mdx';\n\n\
         <AuthorCard/>\n\n{}",
        content.trim()
    ))
}

/// Collect every media filename the changelog body references under the
/// published CDN path for the given date.
pub fn referenced_media(content: &str, date: &str) -> BTreeSet<String> {
    let escaped = regex::escape(date);
    let re = Regex::new(&format!(r#"/images/changelog/{escaped}/([^"\s)]+)"#))
        .expect("valid regex");
    re.captures_iter(content)
        .map(|c| c[1].to_string())
        .collect()
}

/// Extract a `YYYY-MM-DD` (or `YYYY/MM/DD`) date from a changelog-like path.
pub fn parse_date_from_path(path: &str) -> Option<NaiveDate> {
    let re = Regex::new(r"(\d{4})[-/](\d{2})[-/](\d{2})").expect("valid regex");
    let captured = re.captures(path)?;
    NaiveDate::from_ymd_opt(
        captured[1].parse().ok()?,
        captured[2].parse().ok()?,
        captured[3].parse().ok()?,
    )
}

/// Remove today's stale changelog and any stray draft files before a run.
///
/// Returns the paths that were removed.
pub fn cleanup_stale_artifacts(
    workspace: &Path,
    today: NaiveDate,
) -> std::io::Result<Vec<PathBuf>> {
    let mut removed = Vec::new();

    let today_file = changelog_path(workspace, today);
    if today_file.exists() {
        std::fs::remove_file(&today_file)?;
        tracing::info!("Removed existing changelog: {}", today_file.display());
        removed.push(today_file);
    }

    for draft in STRAY_DRAFT_FILES {
        let path = workspace.join(draft);
        if path.exists() {
            std::fs::remove_file(&path)?;
            tracing::info!("Removed stray draft file: {}", path.display());
            removed.push(path);
        }
    }

    Ok(removed)
}
