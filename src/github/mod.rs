//! GitHub REST wrappers: refs, blobs, trees, commits, contents, and pull
//! requests for the documentation repository.
//!
//! The hosting API's data model is mirrored one-to-one; the only logic this
//! module adds is the atomic multi-file commit builder ([`commit`]), the
//! navigation-index merge ([`navigation`]), and the end-to-end publish
//! operation ([`pr`]).

mod commit;
mod navigation;
mod pr;

pub use commit::{commit_files, decide_upload, upload_media_blob, UploadAction, UploadOutcome};
pub use navigation::{merge_changelog_entry, ChangelogEntry, DOCS_JSON_PATH};
pub use pr::{branch_name, create_changelog_pr, format_pr_body, PrOutcome, PrRequest};

use base64::Engine;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const GITHUB_API_BASE: &str = "https://api.github.com";
const USER_AGENT: &str = concat!("changelog-bot/", env!("CARGO_PKG_VERSION"));

/// Mode for regular (non-executable) blobs in tree entries.
pub const FILE_MODE_REGULAR: &str = "100644";

#[derive(Debug, Error)]
pub enum GithubError {
    /// Non-2xx answer from the API.
    #[error("GitHub API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid response payload: {0}")]
    Payload(String),
}

impl GithubError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, GithubError::Api { status: 404, .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, GithubError::Api { status: 409, .. })
    }
}

/// One entry in a tree creation request.
#[derive(Debug, Clone, Serialize)]
pub struct TreeEntry {
    pub path: String,
    pub mode: &'static str,
    #[serde(rename = "type")]
    pub entry_type: &'static str,
    pub sha: String,
}

impl TreeEntry {
    pub fn blob(path: impl Into<String>, sha: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            mode: FILE_MODE_REGULAR,
            entry_type: "blob",
            sha: sha.into(),
        }
    }
}

/// Decoded file contents plus the SHA needed to update them.
#[derive(Debug, Clone)]
pub struct RemoteContent {
    pub content: Vec<u8>,
    pub sha: String,
}

/// An opened pull request.
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub html_url: String,
}

/// Thin client over the GitHub REST API for one repository.
#[derive(Debug, Clone)]
pub struct GithubClient {
    http: reqwest::Client,
    token: String,
    base_url: String,
    repo: String,
}

impl GithubClient {
    pub fn new(token: impl Into<String>, repo: impl Into<String>) -> Self {
        Self::with_base_url(token, repo, GITHUB_API_BASE)
    }

    /// Client against a custom API base (used by tests).
    pub fn with_base_url(
        token: impl Into<String>,
        repo: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            token: token.into(),
            base_url: base_url.into(),
            repo: repo.into(),
        }
    }

    fn repo_url(&self, path: &str) -> String {
        format!("{}/repos/{}/{}", self.base_url, self.repo, path)
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<serde_json::Value, GithubError> {
        let response = request
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", USER_AGENT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body: serde_json::Value = response.json().await.unwrap_or_default();
            return Err(GithubError::Api {
                status: status.as_u16(),
                message: body["message"].as_str().unwrap_or("unknown").to_string(),
            });
        }

        // 204 No Content and empty bodies decode as null.
        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Ok(serde_json::Value::Null);
        }
        serde_json::from_slice(&bytes).map_err(|e| GithubError::Payload(e.to_string()))
    }

    async fn get_json(&self, path: &str) -> Result<serde_json::Value, GithubError> {
        self.send(self.http.get(self.repo_url(path))).await
    }

    async fn post_json(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, GithubError> {
        self.send(self.http.post(self.repo_url(path)).json(body)).await
    }

    async fn patch_json(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, GithubError> {
        self.send(self.http.patch(self.repo_url(path)).json(body)).await
    }

    async fn put_json(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, GithubError> {
        self.send(self.http.put(self.repo_url(path)).json(body)).await
    }

    /// Default branch of the repository.
    pub async fn default_branch(&self) -> Result<String, GithubError> {
        let body = self.send(self.http.get(format!(
            "{}/repos/{}",
            self.base_url, self.repo
        ))).await?;
        body["default_branch"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| GithubError::Payload("missing default_branch".to_string()))
    }

    /// Head commit SHA of a branch.
    pub async fn ref_sha(&self, branch: &str) -> Result<String, GithubError> {
        let body = self.get_json(&format!("git/ref/heads/{}", branch)).await?;
        body["object"]["sha"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| GithubError::Payload("missing ref object sha".to_string()))
    }

    /// Create a branch ref pointing at a commit.
    pub async fn create_ref(&self, branch: &str, sha: &str) -> Result<(), GithubError> {
        self.post_json(
            "git/refs",
            &serde_json::json!({
                "ref": format!("refs/heads/{}", branch),
                "sha": sha,
            }),
        )
        .await?;
        Ok(())
    }

    /// Fast-forward a branch ref to a commit.
    pub async fn update_ref(&self, branch: &str, sha: &str) -> Result<(), GithubError> {
        self.patch_json(
            &format!("git/refs/heads/{}", branch),
            &serde_json::json!({ "sha": sha }),
        )
        .await?;
        Ok(())
    }

    /// Tree SHA of a commit.
    pub async fn commit_tree_sha(&self, commit_sha: &str) -> Result<String, GithubError> {
        let body = self.get_json(&format!("git/commits/{}", commit_sha)).await?;
        body["tree"]["sha"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| GithubError::Payload("missing commit tree sha".to_string()))
    }

    /// Create a content-addressed blob; returns its SHA.
    pub async fn create_blob(&self, content: &[u8]) -> Result<String, GithubError> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(content);
        let body = self
            .post_json(
                "git/blobs",
                &serde_json::json!({
                    "content": encoded,
                    "encoding": "base64",
                }),
            )
            .await?;
        body["sha"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| GithubError::Payload("missing blob sha".to_string()))
    }

    /// Create a tree layered on `base_tree`; returns its SHA.
    pub async fn create_tree(
        &self,
        base_tree: &str,
        entries: &[TreeEntry],
    ) -> Result<String, GithubError> {
        let body = self
            .post_json(
                "git/trees",
                &serde_json::json!({
                    "base_tree": base_tree,
                    "tree": entries,
                }),
            )
            .await?;
        body["sha"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| GithubError::Payload("missing tree sha".to_string()))
    }

    /// Create a commit object; returns its SHA.
    pub async fn create_commit(
        &self,
        message: &str,
        tree_sha: &str,
        parent_sha: &str,
    ) -> Result<String, GithubError> {
        let body = self
            .post_json(
                "git/commits",
                &serde_json::json!({
                    "message": message,
                    "tree": tree_sha,
                    "parents": [parent_sha],
                }),
            )
            .await?;
        body["sha"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| GithubError::Payload("missing commit sha".to_string()))
    }

    /// Fetch and decode file contents at a ref.
    pub async fn get_contents(
        &self,
        path: &str,
        git_ref: &str,
    ) -> Result<RemoteContent, GithubError> {
        let body = self
            .get_json(&format!(
                "contents/{}?ref={}",
                path,
                urlencoding::encode(git_ref)
            ))
            .await?;
        let sha = body["sha"]
            .as_str()
            .ok_or_else(|| GithubError::Payload("missing content sha".to_string()))?
            .to_string();
        let encoded: String = body["content"]
            .as_str()
            .unwrap_or_default()
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        let content = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| GithubError::Payload(format!("invalid base64 content: {}", e)))?;
        Ok(RemoteContent { content, sha })
    }

    /// Create or update a single file on a branch.
    ///
    /// Pass the current blob `sha` when updating; omit it when creating.
    pub async fn put_contents(
        &self,
        path: &str,
        message: &str,
        content: &[u8],
        branch: &str,
        sha: Option<&str>,
    ) -> Result<(), GithubError> {
        let mut body = serde_json::json!({
            "message": message,
            "content": base64::engine::general_purpose::STANDARD.encode(content),
            "branch": branch,
        });
        if let Some(sha) = sha {
            body["sha"] = serde_json::Value::String(sha.to_string());
        }
        self.put_json(&format!("contents/{}", path), &body).await?;
        Ok(())
    }

    /// Open a pull request.
    pub async fn create_pull(
        &self,
        title: &str,
        body_text: &str,
        head: &str,
        base: &str,
        draft: bool,
    ) -> Result<PullRequest, GithubError> {
        let body = self
            .post_json(
                "pulls",
                &serde_json::json!({
                    "title": title,
                    "body": body_text,
                    "head": head,
                    "base": base,
                    "draft": draft,
                }),
            )
            .await?;
        serde_json::from_value(body).map_err(|e| GithubError::Payload(e.to_string()))
    }

    /// Apply labels to an issue or pull request.
    pub async fn add_labels(&self, number: u64, labels: &[&str]) -> Result<(), GithubError> {
        self.post_json(
            &format!("issues/{}/labels", number),
            &serde_json::json!({ "labels": labels }),
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tree_entry_serializes_with_type_rename() {
        let entry = TreeEntry::blob("docs/updates/changelog.mdx", "abc123");
        let value = serde_json::to_value(&entry).expect("serialize");
        assert_eq!(value["path"], "docs/updates/changelog.mdx");
        assert_eq!(value["mode"], "100644");
        assert_eq!(value["type"], "blob");
        assert_eq!(value["sha"], "abc123");
    }

    #[test]
    fn error_classification() {
        let not_found = GithubError::Api {
            status: 404,
            message: "Not Found".to_string(),
        };
        let conflict = GithubError::Api {
            status: 409,
            message: "Conflict".to_string(),
        };
        assert!(not_found.is_not_found());
        assert!(!not_found.is_conflict());
        assert!(conflict.is_conflict());
        assert!(!conflict.is_not_found());
    }
}
