//! # Changelog Bot
//!
//! An LLM-agent pipeline that turns Slack product updates into documentation
//! changelog pull requests.
//!
//! This library provides:
//! - REST wrappers for the Slack and GitHub APIs (history, permalinks,
//!   reactions, blob/tree/commit/pull-request creation)
//! - A bounded-concurrency media downloader with stable-id deduplication
//! - A set of specialized sub-agents (writer, formatter, reviewer, publisher)
//!   with least-privilege tool and file permissions
//!
//! ## Architecture
//!
//! Each sub-agent follows the "tools in a loop" pattern:
//! 1. Build context with the role's system prompt and task prompt
//! 2. Call the LLM with the tools that role is permitted to use
//! 3. Execute any requested tool calls, feed results back
//! 4. Repeat until the agent produces a final response
//!
//! The pipeline runs the four roles in a fixed order and publishes the result
//! as a single atomic commit plus a draft pull request.
//!
//! ## Example
//!
//! ```rust,ignore
//! use changelog_bot::{config::Config, pipeline};
//!
//! let config = Config::from_env()?;
//! pipeline::run(config, pipeline::PipelineOptions::default()).await?;
//! ```

pub mod agent;
pub mod changelog;
pub mod cli;
pub mod config;
pub mod github;
pub mod llm;
pub mod pipeline;
pub mod slack;
pub mod tools;

pub use config::Config;
