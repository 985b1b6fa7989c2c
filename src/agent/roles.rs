//! The four sub-agent roles and their permission tables.
//!
//! Roles run in a fixed order: the writer drafts from Slack material, the
//! formatter normalizes to the documentation template, the reviewer fixes
//! copy and tone, and the publisher ships the PR and marks the source
//! messages processed.

use chrono::NaiveDate;

use super::permissions::{Permission, PermissionSet};
use crate::changelog;
use crate::config::Config;

/// Parameters threaded from the CLI into the role prompts.
#[derive(Debug, Clone)]
pub struct RoleParams {
    pub today: NaiveDate,
    pub window_start: NaiveDate,
    pub channel: String,
    pub days_back: i64,
    pub ignore_processed: bool,
    pub strip_emojis: bool,
    pub draft: bool,
}

/// A named sub-agent: description, task prompt, model tier, grants.
#[derive(Debug, Clone)]
pub struct AgentRole {
    pub name: &'static str,
    pub description: &'static str,
    pub model: String,
    pub permissions: PermissionSet,
    pub task_prompt: String,
}

/// Build the role list in execution order.
pub fn build_roles(config: &Config, params: &RoleParams) -> Vec<AgentRole> {
    let today_file = changelog::changelog_path(&config.workspace_path, params.today);
    let date = params.today.format("%Y-%m-%d").to_string();
    let today_display = format!("./docs/updates/{}.md", date);

    let mut writer_grants = vec![
        Permission::tool("fetch_messages_from_channel"),
        Permission::write(today_file.clone()),
    ];
    let mut reviewer_grants = vec![
        Permission::read(today_file.clone()),
        Permission::edit(today_file.clone()),
    ];
    if config.docs_search_url.is_some() {
        writer_grants.push(Permission::tool("search_docs"));
        reviewer_grants.push(Permission::tool("search_docs"));
    }

    vec![
        AgentRole {
            name: "changelog_writer",
            description: "Fetch updates from Slack, summarize them, and add relevant links and \
                          context from the documentation",
            model: config.default_model.clone(),
            permissions: PermissionSet::new(writer_grants),
            task_prompt: format!(
                "Create a changelog draft from Slack updates.\n\n\
                 Config:\n\
                 - Time window: {window_start} to {date}\n\
                 - Channel: {channel}\n\n\
                 You MUST write the output to exactly this path: {today_display}\n\
                 Do NOT write to any other file. Do NOT create draft files.\n\n\
                 Steps:\n\
                 1. fetch_messages_from_channel(channel_id=\"{channel}\", days_back={days_back}, \
                 ignore_processed={ignore_processed}, strip_emojis={strip_emojis})\n\
                 2. Write raw content with Slack permalinks per entry to {today_display}\n\
                 3. The first line MUST be: <!-- slack_timestamps: ts1,ts2,ts3 --> using the \
                 timestamps reported by the fetch\n\
                 4. Reference downloaded media with its staged path under \
                 ./docs/updates/media/{date}/\n\n\
                 If the fetch reports no unprocessed messages in the window, write nothing and \
                 reply exactly: NO UPDATES",
                window_start = params.window_start.format("%Y-%m-%d"),
                date = date,
                channel = params.channel,
                days_back = params.days_back,
                ignore_processed = params.ignore_processed,
                strip_emojis = params.strip_emojis,
                today_display = today_display,
            ),
        },
        AgentRole {
            name: "template_formatter",
            description: "Reformat changelog content to match the documentation template",
            model: config.review_model.clone(),
            permissions: PermissionSet::new(vec![
                Permission::read(today_file.clone()),
                Permission::write(today_file.clone()),
                Permission::edit(today_file.clone()),
                Permission::tool("add_changelog_frontmatter"),
            ]),
            task_prompt: format!(
                "Reformat {today_display} to match the changelog template.\n\n\
                 Use the add_changelog_frontmatter tool with date \"{date}\" to produce the \
                 frontmatter, then write the full result back to the same file.\n\n\
                 Key requirements:\n\
                 - Preserve the slack_timestamps comment as the first line after frontmatter\n\
                 - Rewrite staged media paths ./docs/updates/media/{date}/<name> to the \
                 published form /images/changelog/{date}/<name>\n\
                 - Remove all Slack links from the output\n\
                 - Remove H1 headings and horizontal rules",
                today_display = today_display,
                date = date,
            ),
        },
        AgentRole {
            name: "review_and_feedback",
            description: "Review copy, tone, and accuracy, and fix issues in place",
            model: config.review_model.clone(),
            permissions: PermissionSet::new(reviewer_grants),
            task_prompt: format!(
                "Review {today_display} for structure, voice, and accuracy.\n\n\
                 - Verify the template structure: frontmatter, no H1 headings, no horizontal \
                 rules, no Slack links\n\
                 - Verify media references use /images/changelog/{date}/ paths\n\
                 - Fix issues directly with the edit tool; keep the first-line \
                 slack_timestamps comment intact",
                today_display = today_display,
                date = date,
            ),
        },
        AgentRole {
            name: "pr_writer",
            description: "Open the documentation pull request and mark the Slack messages \
                          processed",
            model: config.default_model.clone(),
            permissions: PermissionSet::new(vec![
                Permission::tool("create_changelog_pr"),
                Permission::tool("mark_messages_processed"),
                Permission::read(today_file),
            ]),
            task_prompt: format!(
                "Ship the changelog.\n\n\
                 1. Read {today_display} to get its content\n\
                 2. Call create_changelog_pr with changelog_path=\"{today_display}\" and \
                 draft={draft}; media files are auto-discovered from the staging directory\n\
                 3. After the PR is created, parse the timestamps from the first line \
                 (<!-- slack_timestamps: ts1,ts2,ts3 -->) and call \
                 mark_messages_processed(channel_id=\"{channel}\", message_timestamps=[...])\n\n\
                 If the PR tool reports that nothing was persisted, stop and report the error \
                 instead of marking any message processed.",
                today_display = today_display,
                draft = params.draft,
                channel = params.channel,
            ),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn test_config() -> Config {
        Config::new(
            "xoxb-test".to_string(),
            "C123".to_string(),
            "ghp-test".to_string(),
            "acme/docs".to_string(),
            "sk-test".to_string(),
            PathBuf::from("/ws"),
        )
    }

    fn test_params() -> RoleParams {
        RoleParams {
            today: NaiveDate::from_ymd_opt(2025, 1, 15).expect("valid date"),
            window_start: NaiveDate::from_ymd_opt(2025, 1, 1).expect("valid date"),
            channel: "C123".to_string(),
            days_back: 14,
            ignore_processed: false,
            strip_emojis: false,
            draft: true,
        }
    }

    #[test]
    fn roles_run_in_fixed_order() {
        let roles = build_roles(&test_config(), &test_params());
        let names: Vec<&str> = roles.iter().map(|r| r.name).collect();
        assert_eq!(
            names,
            vec![
                "changelog_writer",
                "template_formatter",
                "review_and_feedback",
                "pr_writer"
            ]
        );
    }

    #[test]
    fn writer_cannot_ship_and_publisher_cannot_write() {
        let roles = build_roles(&test_config(), &test_params());
        let today = PathBuf::from("/ws/docs/updates/2025-01-15.md");

        let writer = &roles[0];
        assert!(writer.permissions.allows_tool("fetch_messages_from_channel"));
        assert!(writer.permissions.allows_write(&today));
        assert!(!writer.permissions.allows_tool("create_changelog_pr"));
        assert!(!writer.permissions.allows_read(&today));

        let publisher = &roles[3];
        assert!(publisher.permissions.allows_tool("create_changelog_pr"));
        assert!(publisher.permissions.allows_tool("mark_messages_processed"));
        assert!(publisher.permissions.allows_read(&today));
        assert!(!publisher.permissions.allows_write(&today));
        assert!(!publisher.permissions.allows_edit(&today));
    }

    #[test]
    fn search_tool_requires_configured_endpoint() {
        let mut config = test_config();
        let roles = build_roles(&config, &test_params());
        assert!(!roles[0].permissions.allows_tool("search_docs"));

        config.docs_search_url = Some("https://docs.example.com/search".to_string());
        let roles = build_roles(&config, &test_params());
        assert!(roles[0].permissions.allows_tool("search_docs"));
        assert!(roles[2].permissions.allows_tool("search_docs"));
        assert!(!roles[1].permissions.allows_tool("search_docs"));
    }

    #[test]
    fn review_models_differ_from_default() {
        let roles = build_roles(&test_config(), &test_params());
        assert_eq!(roles[0].model, roles[3].model);
        assert_eq!(roles[1].model, roles[2].model);
        assert_ne!(roles[0].model, roles[1].model);
    }

    #[test]
    fn prompts_embed_run_parameters() {
        let roles = build_roles(&test_config(), &test_params());
        assert!(roles[0].task_prompt.contains("2025-01-01 to 2025-01-15"));
        assert!(roles[0].task_prompt.contains("C123"));
        assert!(roles[1]
            .task_prompt
            .contains("/images/changelog/2025-01-15/"));
        assert!(roles[3].task_prompt.contains("slack_timestamps"));
    }
}
