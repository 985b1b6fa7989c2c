//! End-to-end changelog publish: branch, atomic commit, pull request.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use chrono::{DateTime, NaiveDate, Utc};

use super::{commit_files, merge_changelog_entry, GithubClient, DOCS_JSON_PATH};
use crate::changelog;

const PR_LABELS: &[&str] = &["bot", "automated-pr", "needs-review", "changelog"];

/// Inputs for one publish operation.
#[derive(Debug, Clone, Default)]
pub struct PrRequest {
    /// Local path to the changelog file.
    pub changelog_path: Option<PathBuf>,

    /// Markdown content, read from `changelog_path` when absent.
    pub changelog_content: Option<String>,

    /// Media files to upload; auto-discovered from the dated staging
    /// directory when empty.
    pub media_files: Vec<PathBuf>,

    /// Override date detection (`YYYY-MM-DD`).
    pub date_override: Option<String>,

    /// Custom PR title.
    pub pr_title: Option<String>,

    /// Open as a draft.
    pub draft: bool,
}

/// A successfully opened pull request.
#[derive(Debug, Clone)]
pub struct PrOutcome {
    pub number: u64,
    pub url: String,
    pub branch: String,
    pub commit_sha: String,
    pub files: Vec<String>,
    pub media_count: usize,
}

/// Unique branch name with a timestamp suffix.
pub fn branch_name(prefix: &str, now: DateTime<Utc>) -> String {
    format!("{}/{}", prefix, now.format("%Y%m%d-%H%M%S"))
}

/// Generate the pull request body.
pub fn format_pr_body(date_str: &str, changelog_path: &str, media_count: usize) -> String {
    let media_line = if media_count > 0 {
        format!("- Added {} media files\n", media_count)
    } else {
        String::new()
    };

    format!(
        "This is an auto-generated pull request from the Changelog Bot\n\n\
         ## Summary\n\
         This PR contains an automated changelog for:\n\
         **{date_str}**\n\n\
         ## Changes\n\
         - Added new changelog file: `{changelog_path}`\n\
         {media_line}\
         - Updated docs.json with new changelog entry\n\n\
         ## Review Guidelines\n\
         Please check:\n\
         - [ ] Content accuracy and completeness\n\
         - [ ] Formatting and structure (follows changelog template)\n\
         - [ ] Links and references are valid\n\
         - [ ] Media files are correctly referenced\n\
         - [ ] Sensitive information exposure\n\
         - [ ] Brand voice and tone consistency\n\n\
         ## Note\n\
         This PR is created as a draft to allow for human review before publishing.\n"
    )
}

/// Resolve the changelog date: explicit override, then the changelog path,
/// then today.
fn resolve_date(
    date_override: Option<&str>,
    changelog_path: Option<&Path>,
    today: NaiveDate,
) -> anyhow::Result<NaiveDate> {
    if let Some(raw) = date_override {
        return NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .with_context(|| format!("date_override must be in format YYYY-MM-DD, got: {}", raw));
    }
    if let Some(path) = changelog_path {
        return changelog::parse_date_from_path(&path.to_string_lossy()).with_context(|| {
            format!(
                "could not parse date from path: {} (use date_override)",
                path.display()
            )
        });
    }
    Ok(today)
}

/// Scan the dated staging directory for media files; names the changelog
/// references but the dated directory lacks are additionally looked up across
/// the other dated directories.
fn discover_media(
    staging_base: &Path,
    date_str: &str,
    referenced: &BTreeSet<String>,
) -> Vec<PathBuf> {
    let mut discovered = Vec::new();

    let dated_dir = staging_base.join(date_str);
    if let Ok(dir) = std::fs::read_dir(&dated_dir) {
        for entry in dir.flatten() {
            if entry.path().is_file() {
                discovered.push(entry.path());
            }
        }
    }

    let found: BTreeSet<String> = discovered
        .iter()
        .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .collect();
    let missing: BTreeSet<&String> = referenced.iter().filter(|r| !found.contains(*r)).collect();

    if !missing.is_empty() {
        if let Ok(base) = std::fs::read_dir(staging_base) {
            for date_dir in base.flatten().filter(|e| e.path().is_dir()) {
                if let Ok(dir) = std::fs::read_dir(date_dir.path()) {
                    for entry in dir.flatten().filter(|e| e.path().is_file()) {
                        let name = entry.file_name().to_string_lossy().into_owned();
                        if missing.contains(&name) {
                            discovered.push(entry.path());
                        }
                    }
                }
            }
        }
    }

    discovered.sort();
    discovered.dedup();
    discovered
}

/// Error message when the changelog references media that is not staged
/// locally, or `None` when every reference resolves.
fn validate_media_references(
    referenced: &BTreeSet<String>,
    found: &BTreeSet<String>,
) -> Option<String> {
    let missing: Vec<&String> = referenced.iter().filter(|r| !found.contains(*r)).collect();
    if missing.is_empty() {
        return None;
    }

    let mut listed: Vec<&str> = missing.iter().take(5).map(|s| s.as_str()).collect();
    listed.sort();
    let mut text = listed.join(", ");
    if missing.len() > 5 {
        text.push_str(&format!(" and {} more", missing.len() - 5));
    }
    Some(format!(
        "Changelog references {} media files that don't exist locally: {}. \
         Ensure all referenced media files are downloaded before creating the PR.",
        missing.len(),
        text
    ))
}

/// Create the complete changelog PR: timestamped branch, atomic commit with
/// changelog + media + navigation index, draft pull request, labels.
///
/// The navigation-index update is best-effort; a failure there downgrades to
/// a warning and the commit proceeds without it. A failed commit aborts the
/// workflow before any pull request is opened.
pub async fn create_changelog_pr(
    client: &GithubClient,
    workspace: &Path,
    request: PrRequest,
    today: NaiveDate,
    now: DateTime<Utc>,
) -> anyhow::Result<PrOutcome> {
    let content = match (&request.changelog_content, &request.changelog_path) {
        (Some(content), _) => content.clone(),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read changelog file: {}", path.display()))?,
        (None, None) => bail!("either changelog_path or changelog_content must be provided"),
    };
    if content.trim().is_empty() {
        bail!("changelog content is empty");
    }

    let date = resolve_date(
        request.date_override.as_deref(),
        request.changelog_path.as_deref(),
        today,
    )?;
    let date_str = date.format("%Y-%m-%d").to_string();
    use chrono::Datelike;
    let (year, month, day) = (date.year(), date.month(), date.day());

    let default_branch = client.default_branch().await?;
    let parent_sha = client.ref_sha(&default_branch).await?;
    let branch = branch_name("changelog", now);
    client.create_ref(&branch, &parent_sha).await?;
    tracing::info!(branch = %branch, parent = %parent_sha, "Created changelog branch");

    let referenced = changelog::referenced_media(&content, &date_str);

    let staging_base = workspace.join(changelog::MEDIA_BASE_DIR);
    let media_files = if request.media_files.is_empty() {
        discover_media(&staging_base, &date_str, &referenced)
    } else {
        request.media_files.clone()
    };

    let mut files: BTreeMap<String, Vec<u8>> = BTreeMap::new();
    let mut found = BTreeSet::new();
    let mut media_count = 0usize;
    for local_path in &media_files {
        let bytes = match std::fs::read(local_path) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!("Skipping unreadable media file {}: {}", local_path.display(), e);
                continue;
            }
        };
        let name = match local_path.file_name() {
            Some(name) => name.to_string_lossy().into_owned(),
            None => continue,
        };
        files.insert(
            format!("docs/images/changelog/{}/{}", date_str, name),
            bytes,
        );
        media_count += 1;
        if referenced.contains(&name) {
            found.insert(name);
        }
    }

    if let Some(message) = validate_media_references(&referenced, &found) {
        bail!(message);
    }

    let changelog_remote_path =
        format!("docs/updates/{:04}/{:02}/{:02}/changelog.mdx", year, month, day);
    files.insert(changelog_remote_path.clone(), content.into_bytes());

    // Best-effort: the index update never blocks the primary artifact.
    match client.get_contents(DOCS_JSON_PATH, &default_branch).await {
        Ok(remote) => match String::from_utf8(remote.content) {
            Ok(current) => match merge_changelog_entry(&current, date) {
                Ok(Some(updated)) => {
                    files.insert(DOCS_JSON_PATH.to_string(), updated.into_bytes());
                }
                Ok(None) => {}
                Err(e) => tracing::warn!("Skipping navigation index update: {}", e),
            },
            Err(e) => tracing::warn!("Skipping navigation index update: {}", e),
        },
        Err(e) => tracing::warn!("Skipping navigation index update: {}", e),
    }

    let commit_message = format!("Add changelog for {}", date_str);
    let commit_sha = match commit_files(client, &branch, &files, &commit_message, &parent_sha).await
    {
        Some(sha) => sha,
        None => bail!("no changes were persisted, aborting before PR creation"),
    };

    let title = request
        .pr_title
        .unwrap_or_else(|| format!("[BOT] Changelog: {}", date_str));
    let body = format_pr_body(&date_str, &changelog_remote_path, media_count);
    let pull = client
        .create_pull(&title, &body, &branch, &default_branch, request.draft)
        .await?;

    if let Err(e) = client.add_labels(pull.number, PR_LABELS).await {
        tracing::warn!("Failed to apply PR labels: {}", e);
    }

    Ok(PrOutcome {
        number: pull.number,
        url: pull.html_url,
        branch,
        commit_sha,
        files: files.keys().cloned().collect(),
        media_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("valid date")
    }

    #[test]
    fn branch_name_embeds_timestamp() {
        let now = DateTime::parse_from_rfc3339("2025-01-15T09:30:05Z")
            .expect("valid time")
            .with_timezone(&Utc);
        assert_eq!(branch_name("changelog", now), "changelog/20250115-093005");
    }

    #[test]
    fn resolve_date_prefers_override() {
        let resolved = resolve_date(
            Some("2025-02-01"),
            Some(Path::new("./docs/updates/2025-01-15.md")),
            date("2025-03-01"),
        )
        .expect("valid override");
        assert_eq!(resolved, date("2025-02-01"));
    }

    #[test]
    fn resolve_date_falls_back_to_path_then_today() {
        let from_path = resolve_date(
            None,
            Some(Path::new("./docs/updates/2025-01-15.md")),
            date("2025-03-01"),
        )
        .expect("path date");
        assert_eq!(from_path, date("2025-01-15"));

        let from_today = resolve_date(None, None, date("2025-03-01")).expect("today");
        assert_eq!(from_today, date("2025-03-01"));
    }

    #[test]
    fn resolve_date_rejects_bad_override() {
        assert!(resolve_date(Some("01-15-2025"), None, date("2025-03-01")).is_err());
    }

    #[test]
    fn validate_reports_missing_references() {
        let referenced: BTreeSet<String> = ["a.png".to_string(), "b.png".to_string()].into();
        let found: BTreeSet<String> = ["a.png".to_string()].into();

        let message = validate_media_references(&referenced, &found).expect("missing b.png");
        assert!(message.contains("1 media files"));
        assert!(message.contains("b.png"));

        assert_eq!(validate_media_references(&referenced, &referenced), None);
        assert_eq!(validate_media_references(&BTreeSet::new(), &found), None);
    }

    #[test]
    fn discover_finds_dated_and_cross_date_files() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let base = tmp.path();

        let dated = base.join("2025-01-15");
        std::fs::create_dir_all(&dated).expect("mkdir");
        std::fs::write(dated.join("new_ab12cd34ef56.png"), b"png").expect("write");

        let older = base.join("2025-01-08");
        std::fs::create_dir_all(&older).expect("mkdir");
        std::fs::write(older.join("carried_0011aabbccdd.gif"), b"gif").expect("write");

        let referenced: BTreeSet<String> = [
            "new_ab12cd34ef56.png".to_string(),
            "carried_0011aabbccdd.gif".to_string(),
        ]
        .into();

        let discovered = discover_media(base, "2025-01-15", &referenced);
        let names: BTreeSet<String> = discovered
            .iter()
            .map(|p| p.file_name().expect("name").to_string_lossy().into_owned())
            .collect();
        assert!(names.contains("new_ab12cd34ef56.png"));
        assert!(names.contains("carried_0011aabbccdd.gif"));
    }

    #[test]
    fn pr_body_mentions_media_only_when_present() {
        let with_media = format_pr_body("2025-01-15", "docs/updates/2025/01/15/changelog.mdx", 3);
        assert!(with_media.contains("Added 3 media files"));

        let without = format_pr_body("2025-01-15", "docs/updates/2025/01/15/changelog.mdx", 0);
        assert!(!without.contains("media files\n-"));
        assert!(without.contains("**2025-01-15**"));
    }
}
