//! Tools-in-a-loop runner for one sub-agent role.

use std::sync::Arc;

use crate::llm::{ChatMessage, LlmClient, TokenUsage, ToolCall};
use crate::tools::{ToolContext, ToolRegistry};

use super::prompt::build_system_prompt;
use super::roles::AgentRole;

/// Result of one completed role.
#[derive(Debug, Clone)]
pub struct StageReport {
    pub role: &'static str,
    pub response: String,
    pub iterations: usize,
    pub usage: Option<TokenUsage>,
}

/// Runs each role as a tool-calling loop against the LLM.
pub struct AgentRunner {
    llm: Arc<dyn LlmClient>,
    registry: Arc<ToolRegistry>,
    max_iterations: usize,
}

impl AgentRunner {
    pub fn new(llm: Arc<dyn LlmClient>, registry: Arc<ToolRegistry>, max_iterations: usize) -> Self {
        Self {
            llm,
            registry,
            max_iterations,
        }
    }

    /// Run a role to completion and return its final response.
    ///
    /// The loop ends when the model answers without tool calls; exceeding the
    /// iteration bound is an error.
    pub async fn run_role(
        &self,
        role: &AgentRole,
        ctx: &ToolContext,
    ) -> anyhow::Result<StageReport> {
        tracing::info!(role = role.name, model = %role.model, "Starting agent stage");

        let tool_infos = self.registry.list_tools(&role.permissions);
        let tool_schemas = self.registry.tool_schemas(&role.permissions);
        let system_prompt = build_system_prompt(role, &tool_infos);

        let mut messages = vec![
            ChatMessage::system(system_prompt),
            ChatMessage::user(role.task_prompt.clone()),
        ];
        let mut usage: Option<TokenUsage> = None;

        for iteration in 0..self.max_iterations {
            tracing::debug!(role = role.name, iteration = iteration + 1, "Agent iteration");

            let response = self
                .llm
                .chat_completion(&role.model, &messages, Some(&tool_schemas))
                .await?;

            if let Some(u) = &response.usage {
                usage = Some(match &usage {
                    Some(acc) => acc.add(u),
                    None => *u,
                });
            }

            if let Some(tool_calls) = &response.tool_calls {
                if !tool_calls.is_empty() {
                    messages.push(ChatMessage::assistant(
                        response.content.clone(),
                        Some(tool_calls.clone()),
                    ));

                    for tool_call in tool_calls {
                        let result = self.execute_tool_call(tool_call, ctx).await;
                        let result_str = match result {
                            Ok(output) => output,
                            Err(e) => format!("Error: {}", e),
                        };

                        tracing::info!(
                            role = role.name,
                            tool = %tool_call.function.name,
                            result = %truncate_for_log(&result_str, 400),
                            "Tool call completed"
                        );

                        messages.push(ChatMessage::tool_result(tool_call.id.clone(), result_str));
                    }

                    continue;
                }
            }

            // No tool calls - this is the final response.
            if let Some(content) = response.content {
                tracing::info!(
                    role = role.name,
                    response = %truncate_for_log(&content, 800),
                    "Agent stage finished"
                );
                return Ok(StageReport {
                    role: role.name,
                    response: content,
                    iterations: iteration + 1,
                    usage,
                });
            }

            anyhow::bail!("LLM returned an empty response for role {}", role.name);
        }

        anyhow::bail!(
            "Role {} hit the iteration limit ({}) without completing",
            role.name,
            self.max_iterations
        )
    }

    async fn execute_tool_call(
        &self,
        tool_call: &ToolCall,
        ctx: &ToolContext,
    ) -> anyhow::Result<String> {
        tracing::info!(
            tool = %tool_call.function.name,
            args = %truncate_for_log(&tool_call.function.arguments, 400),
            "Calling tool"
        );
        let args: serde_json::Value =
            serde_json::from_str(&tool_call.function.arguments).unwrap_or(serde_json::Value::Null);
        self.registry
            .execute(&tool_call.function.name, args, ctx)
            .await
    }
}

/// Truncate a string for logging purposes.
fn truncate_for_log(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        let mut end = max_len;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... [truncated]", &s[..end])
    }
}
