//! Documentation search tool.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{Tool, ToolContext};

const RESULT_LIMIT: usize = 8000;

/// Search the product documentation for relevant pages and anchors.
///
/// Thin wrapper over the configured search endpoint; registered only when an
/// endpoint is configured.
pub struct SearchDocs {
    http: reqwest::Client,
    endpoint: String,
}

impl SearchDocs {
    pub fn new(endpoint: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint,
        }
    }
}

#[async_trait]
impl Tool for SearchDocs {
    fn name(&self) -> &str {
        "search_docs"
    }

    fn description(&self) -> &str {
        "Search the product documentation. Returns matching pages and snippets. Use for finding doc links to reference from changelog entries."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> anyhow::Result<String> {
        let query = args["query"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("Missing 'query' argument"))?;

        let url = format!("{}?q={}", self.endpoint, urlencoding::encode(query));
        let response = self
            .http
            .get(&url)
            .timeout(Duration::from_secs(30))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Documentation search error: HTTP {}", status);
        }

        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(format!("No results found for: {}", query));
        }

        // Truncate if too long.
        if body.len() > RESULT_LIMIT {
            let mut end = RESULT_LIMIT;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            Ok(format!(
                "{}... [results truncated, showing first {} chars]",
                &body[..end],
                RESULT_LIMIT
            ))
        } else {
            Ok(body)
        }
    }
}
