//! GitHub tools: frontmatter formatting and the changelog publish.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Local, Utc};
use serde_json::{json, Value};

use super::{Tool, ToolContext};
use crate::changelog;
use crate::github::{create_changelog_pr, GithubClient, PrRequest};

/// Produce the documentation frontmatter for a changelog body.
pub struct AddChangelogFrontmatter;

#[async_trait]
impl Tool for AddChangelogFrontmatter {
    fn name(&self) -> &str {
        "add_changelog_frontmatter"
    }

    fn description(&self) -> &str {
        "Add properly formatted frontmatter to changelog content. Returns the full document ready to be written to the changelog file."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "content": {
                    "type": "string",
                    "description": "Raw changelog content, without frontmatter"
                },
                "date": {
                    "type": "string",
                    "description": "Date in format YYYY-MM-DD"
                }
            },
            "required": ["content", "date"]
        })
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> anyhow::Result<String> {
        let content = args["content"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("Missing 'content' argument"))?;
        let date = args["date"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("Missing 'date' argument (format: YYYY-MM-DD)"))?;

        let formatted = changelog::build_frontmatter(content, date)?;
        Ok(formatted)
    }
}

/// Publish the changelog: branch, atomic commit, draft pull request.
pub struct CreateChangelogPr {
    client: Arc<GithubClient>,
}

impl CreateChangelogPr {
    pub fn new(client: Arc<GithubClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for CreateChangelogPr {
    fn name(&self) -> &str {
        "create_changelog_pr"
    }

    fn description(&self) -> &str {
        "Create a complete changelog PR: a new branch, one atomic commit with the changelog, media files, and the updated navigation index, then a pull request. Media files are auto-discovered from the dated staging directory when not passed explicitly."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "changelog_path": {
                    "type": "string",
                    "description": "Local path to the changelog file"
                },
                "changelog_content": {
                    "type": "string",
                    "description": "OR provide markdown content directly"
                },
                "media_files": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Local media file paths (auto-discovered if not provided)"
                },
                "date_override": {
                    "type": "string",
                    "description": "Override date detection (YYYY-MM-DD)"
                },
                "pr_title": {
                    "type": "string",
                    "description": "Custom PR title"
                },
                "draft": {
                    "type": "boolean",
                    "description": "Create as draft PR (default: true)"
                }
            }
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> anyhow::Result<String> {
        if !args["media_files"].is_null() && !args["media_files"].is_array() {
            anyhow::bail!(
                "media_files must be an array of paths, got: {}",
                args["media_files"]
            );
        }

        let request = PrRequest {
            changelog_path: args["changelog_path"]
                .as_str()
                .map(|p| ctx.resolve(p)),
            changelog_content: args["changelog_content"].as_str().map(str::to_string),
            media_files: args["media_files"]
                .as_array()
                .map(|paths| {
                    paths
                        .iter()
                        .filter_map(|p| p.as_str())
                        .map(|p| ctx.resolve(p))
                        .collect::<Vec<PathBuf>>()
                })
                .unwrap_or_default(),
            date_override: args["date_override"].as_str().map(str::to_string),
            pr_title: args["pr_title"].as_str().map(str::to_string),
            draft: args["draft"].as_bool().unwrap_or(true),
        };

        let outcome = create_changelog_pr(
            &self.client,
            &ctx.workspace,
            request,
            Local::now().date_naive(),
            Utc::now(),
        )
        .await?;

        let mut summary = String::from("Successfully created changelog PR\n\n");
        summary.push_str(&format!("Branch: {}\n", outcome.branch));
        summary.push_str(&format!("Commit: {}\n", outcome.commit_sha));
        summary.push_str(&format!(
            "PR #{}: {}\n\n",
            outcome.number, outcome.url
        ));
        summary.push_str(&format!("Files uploaded ({}):\n", outcome.files.len()));
        for path in &outcome.files {
            summary.push_str(&format!("  {}\n", path));
        }
        if outcome.media_count > 0 {
            summary.push_str(&format!("\nMedia files: {}\n", outcome.media_count));
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc as StdArc;

    use tokio::sync::Mutex;

    use crate::agent::{Permission, PermissionSet};
    use crate::slack::FetchAccumulator;

    fn ctx() -> ToolContext {
        ToolContext::new(
            PathBuf::from("/ws"),
            PermissionSet::new(vec![
                Permission::tool("add_changelog_frontmatter"),
                Permission::tool("create_changelog_pr"),
            ]),
            StdArc::new(Mutex::new(FetchAccumulator::new())),
        )
    }

    #[tokio::test]
    async fn frontmatter_tool_formats_content() {
        let out = AddChangelogFrontmatter
            .execute(
                json!({"content": "New editor shipped.", "date": "2025-01-15"}),
                &ctx(),
            )
            .await
            .expect("format");
        assert!(out.starts_with("---\ntitle: January 15, 2025"));
        assert!(out.ends_with("New editor shipped."));
    }

    #[tokio::test]
    async fn frontmatter_tool_rejects_bad_date() {
        let err = AddChangelogFrontmatter
            .execute(json!({"content": "body", "date": "Jan 15"}), &ctx())
            .await
            .expect_err("invalid date");
        assert!(err.to_string().contains("YYYY-MM-DD"));
    }

    #[tokio::test]
    async fn pr_tool_rejects_stringified_media_list() {
        let tool = CreateChangelogPr::new(Arc::new(GithubClient::with_base_url(
            "token",
            "acme/docs",
            "http://127.0.0.1:9",
        )));
        let err = tool
            .execute(
                json!({"changelog_content": "body", "media_files": "[]"}),
                &ctx(),
            )
            .await
            .expect_err("stringified array");
        assert!(err.to_string().contains("must be an array"));
    }
}
