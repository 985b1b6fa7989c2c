//! Atomic multi-file remote commit and the single-file upload retry path.
//!
//! A commit is assembled from blob → tree → commit → ref primitives so the
//! branch moves exactly once: other readers of the branch either see none of
//! the files or all of them, never a partial set.

use std::collections::BTreeMap;

use super::{GithubClient, GithubError, RemoteContent, TreeEntry};

/// Bound on optimistic-concurrency retries for the single-file upload path.
const MAX_RETRIES: usize = 3;

/// Create exactly one commit containing every file in `files` and move the
/// branch ref to it.
///
/// Returns the new commit SHA, or `None` when nothing was persisted: an empty
/// file map, or any blob/tree/commit failure. Callers must treat `None` as
/// "no changes exist on the remote" and abort the surrounding workflow.
pub async fn commit_files(
    client: &GithubClient,
    branch: &str,
    files: &BTreeMap<String, Vec<u8>>,
    message: &str,
    parent_sha: &str,
) -> Option<String> {
    if files.is_empty() {
        tracing::warn!("No files to commit");
        return None;
    }

    match try_commit_files(client, branch, files, message, parent_sha).await {
        Ok(sha) => Some(sha),
        Err(e) => {
            tracing::error!("Failed to create commit with {} file(s): {}", files.len(), e);
            None
        }
    }
}

async fn try_commit_files(
    client: &GithubClient,
    branch: &str,
    files: &BTreeMap<String, Vec<u8>>,
    message: &str,
    parent_sha: &str,
) -> Result<String, GithubError> {
    let mut entries = Vec::with_capacity(files.len());
    for (path, content) in files {
        let blob_sha = client.create_blob(content).await?;
        entries.push(TreeEntry::blob(path.clone(), blob_sha));
    }

    let base_tree = client.commit_tree_sha(parent_sha).await?;
    let tree_sha = client.create_tree(&base_tree, &entries).await?;
    let commit_sha = client.create_commit(message, &tree_sha, parent_sha).await?;
    client.update_ref(branch, &commit_sha).await?;

    tracing::info!(
        commit = %commit_sha,
        branch = %branch,
        "Committed {} file(s)",
        files.len()
    );
    Ok(commit_sha)
}

/// What the upload path decided to do for one destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadAction {
    /// Existing remote content already matches; never rewrite it.
    Skip,
    /// Path exists with different content; update against its current SHA.
    Update { sha: String },
    /// Path does not exist yet.
    Create,
}

/// Outcome of [`upload_media_blob`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    Unchanged,
    Created,
    Updated,
}

/// Decide the upload action by comparing the new content against what is
/// already at the destination.
pub fn decide_upload(existing: Option<&RemoteContent>, content: &[u8]) -> UploadAction {
    match existing {
        Some(remote) if remote.content == content => UploadAction::Skip,
        Some(remote) => UploadAction::Update {
            sha: remote.sha.clone(),
        },
        None => UploadAction::Create,
    }
}

/// Upload a single file, tolerating a concurrent writer.
///
/// Identical existing content is a no-op to avoid spurious history churn. A
/// create that loses a race (409) re-fetches the current content/SHA and
/// updates instead of failing, bounded to a small fixed retry count.
pub async fn upload_media_blob(
    client: &GithubClient,
    remote_path: &str,
    content: &[u8],
    message: &str,
    branch: &str,
) -> Result<UploadOutcome, GithubError> {
    let mut last_err: Option<GithubError> = None;

    for attempt in 0..MAX_RETRIES {
        if attempt > 0 {
            tracing::debug!(
                path = %remote_path,
                attempt,
                "Retrying media upload after conflict"
            );
        }

        let existing = match client.get_contents(remote_path, branch).await {
            Ok(remote) => Some(remote),
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(e),
        };

        let action = decide_upload(existing.as_ref(), content);
        let result = match &action {
            UploadAction::Skip => return Ok(UploadOutcome::Unchanged),
            UploadAction::Update { sha } => client
                .put_contents(remote_path, message, content, branch, Some(sha))
                .await
                .map(|_| UploadOutcome::Updated),
            UploadAction::Create => client
                .put_contents(remote_path, message, content, branch, None)
                .await
                .map(|_| UploadOutcome::Created),
        };

        match result {
            Ok(outcome) => return Ok(outcome),
            // Lost a race with a concurrent writer; loop re-fetches the SHA.
            Err(e) if e.is_conflict() => last_err = Some(e),
            Err(e) => return Err(e),
        }
    }

    Err(last_err.unwrap_or(GithubError::Api {
        status: 409,
        message: "upload retries exhausted".to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_file_map_commits_nothing() {
        // The client points nowhere; an empty map must return None before
        // any network call is attempted.
        let client = GithubClient::with_base_url("token", "acme/docs", "http://127.0.0.1:9");
        let files = BTreeMap::new();
        let sha = commit_files(&client, "changelog/x", &files, "msg", "parent").await;
        assert_eq!(sha, None);
    }

    #[tokio::test]
    async fn blob_failure_yields_no_commit_id() {
        // First API call (blob creation) fails against an unroutable base;
        // the helper must swallow it into None, not panic or half-commit.
        let client = GithubClient::with_base_url("token", "acme/docs", "http://127.0.0.1:9");
        let mut files = BTreeMap::new();
        files.insert("docs/a.md".to_string(), b"content".to_vec());
        let sha = commit_files(&client, "changelog/x", &files, "msg", "parent").await;
        assert_eq!(sha, None);
    }

    #[test]
    fn identical_content_is_never_rewritten() {
        let remote = RemoteContent {
            content: b"same bytes".to_vec(),
            sha: "abc123".to_string(),
        };
        assert_eq!(
            decide_upload(Some(&remote), b"same bytes"),
            UploadAction::Skip
        );
    }

    #[test]
    fn changed_content_updates_against_current_sha() {
        let remote = RemoteContent {
            content: b"old bytes".to_vec(),
            sha: "abc123".to_string(),
        };
        assert_eq!(
            decide_upload(Some(&remote), b"new bytes"),
            UploadAction::Update {
                sha: "abc123".to_string()
            }
        );
    }

    #[test]
    fn missing_path_creates() {
        assert_eq!(decide_upload(None, b"bytes"), UploadAction::Create);
    }
}
