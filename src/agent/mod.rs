//! Sub-agent roles and the tools-in-a-loop runner.
//!
//! Each role follows the same pattern:
//! 1. Build context with the role's system prompt and task prompt
//! 2. Call the LLM with the tools the role is permitted to use
//! 3. If the LLM requests a tool call, execute it and feed the result back
//! 4. Repeat until the LLM produces a final response or the iteration bound

mod permissions;
mod prompt;
mod roles;
mod runner;

pub use permissions::{Permission, PermissionSet};
pub use prompt::build_system_prompt;
pub use roles::{build_roles, AgentRole, RoleParams};
pub use runner::{AgentRunner, StageReport};
