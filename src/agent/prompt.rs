//! System prompt templates for the sub-agents.

use super::roles::AgentRole;
use crate::tools::ToolInfo;

/// Build the system prompt for one role with its permitted tools.
pub fn build_system_prompt(role: &AgentRole, tools: &[ToolInfo]) -> String {
    let tool_descriptions = tools
        .iter()
        .map(|t| format!("- **{}**: {}", t.name, t.description))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"You are an expert developer relations professional working as the {name} agent in a changelog pipeline.

## Your Role

{description}.

## Available Tools

You have access to the following tools:
{tool_descriptions}

## Rules

1. **Only use the tools listed above** - other pipeline stages have their own tools; do not ask for them.
2. **Stay inside your file scope** - file tools will reject paths you were not granted.
3. **Verify your work** - re-read files after writing when you can, and report exactly what you produced.
4. **Handle errors gracefully** - if a tool reports an error, explain what went wrong instead of guessing.
5. **Stay focused** - do only what your task describes; no extra files, no extra commentary in the artifact.

When your task is complete, reply with a short summary of what you did. If you need a tool, respond with a tool call."#,
        name = role.name,
        description = role.description,
        tool_descriptions = tool_descriptions,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::PermissionSet;

    #[test]
    fn prompt_lists_tools_and_role() {
        let role = AgentRole {
            name: "changelog_writer",
            description: "Fetch updates from Slack",
            model: "test-model".to_string(),
            permissions: PermissionSet::default(),
            task_prompt: String::new(),
        };
        let tools = vec![ToolInfo {
            name: "fetch_messages_from_channel".to_string(),
            description: "Fetch messages from a Slack channel.".to_string(),
        }];

        let prompt = build_system_prompt(&role, &tools);
        assert!(prompt.contains("changelog_writer"));
        assert!(prompt.contains("**fetch_messages_from_channel**"));
        assert!(prompt.contains("Fetch updates from Slack"));
    }
}
