//! Agent-callable tools.
//!
//! Tools wrap the external services (Slack, GitHub, documentation search) and
//! the scoped file operations each role is granted. The registry hands each
//! role only the tool schemas its permission set names, and re-checks the
//! grant at execution time.

mod docs_search;
mod files;
mod github;
mod slack;

pub use docs_search::SearchDocs;
pub use files::{EditFile, ReadFile, WriteFile};
pub use github::{AddChangelogFrontmatter, CreateChangelogPr};
pub use slack::{FetchMessagesFromChannel, MarkMessagesProcessed};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::agent::PermissionSet;
use crate::slack::FetchAccumulator;

/// Per-role execution context handed to every tool call.
pub struct ToolContext {
    /// Local staging directory; relative tool paths resolve against it.
    pub workspace: PathBuf,

    /// The calling role's grants.
    pub permissions: PermissionSet,

    /// Run-scoped accumulator of fetched message timestamps.
    pub accumulator: Arc<Mutex<FetchAccumulator>>,
}

impl ToolContext {
    pub fn new(
        workspace: PathBuf,
        permissions: PermissionSet,
        accumulator: Arc<Mutex<FetchAccumulator>>,
    ) -> Self {
        Self {
            workspace,
            permissions,
            accumulator,
        }
    }

    /// Resolve a tool-supplied path against the workspace.
    pub fn resolve(&self, raw: &str) -> PathBuf {
        resolve_in_workspace(&self.workspace, raw)
    }
}

/// Normalize a raw path and resolve it against the workspace.
pub fn resolve_in_workspace(workspace: &Path, raw: &str) -> PathBuf {
    let path = Path::new(raw);
    if path.is_absolute() {
        return path.to_path_buf();
    }
    let stripped: PathBuf = path
        .components()
        .filter(|c| !matches!(c, std::path::Component::CurDir))
        .collect();
    workspace.join(stripped)
}

/// A tool exposed to the agents.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters_schema(&self) -> Value;

    async fn execute(&self, args: Value, ctx: &ToolContext) -> anyhow::Result<String>;
}

/// Name and description pair for prompt building.
#[derive(Debug, Clone)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
}

/// Registry of all tools, filtered per role at hand-off time.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.push(tool);
    }

    /// Tools the given permission set is allowed to see.
    pub fn list_tools(&self, permissions: &PermissionSet) -> Vec<ToolInfo> {
        self.tools
            .iter()
            .filter(|t| permissions.allows_tool(t.name()))
            .map(|t| ToolInfo {
                name: t.name().to_string(),
                description: t.description().to_string(),
            })
            .collect()
    }

    /// Chat-completions tool schemas for the permitted tools.
    pub fn tool_schemas(&self, permissions: &PermissionSet) -> Vec<Value> {
        self.tools
            .iter()
            .filter(|t| permissions.allows_tool(t.name()))
            .map(|t| {
                serde_json::json!({
                    "type": "function",
                    "function": {
                        "name": t.name(),
                        "description": t.description(),
                        "parameters": t.parameters_schema(),
                    }
                })
            })
            .collect()
    }

    /// Execute a tool by name, re-checking the caller's grant.
    pub async fn execute(
        &self,
        name: &str,
        args: Value,
        ctx: &ToolContext,
    ) -> anyhow::Result<String> {
        if !ctx.permissions.allows_tool(name) {
            anyhow::bail!("Tool '{}' is not permitted for this agent", name);
        }
        let tool = self
            .tools
            .iter()
            .find(|t| t.name() == name)
            .ok_or_else(|| anyhow::anyhow!("Unknown tool: {}", name))?;
        tool.execute(args, ctx).await
    }
}
