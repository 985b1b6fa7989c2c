//! Scoped file tools.
//!
//! Each operation is granted per exact path; anything outside the calling
//! role's scope is rejected before touching the filesystem.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{Tool, ToolContext};

/// Read a file the role was granted.
pub struct ReadFile;

#[async_trait]
impl Tool for ReadFile {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the contents of a file. Only paths granted to this agent are readable."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path to the file, relative to the workspace"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> anyhow::Result<String> {
        let raw = args["path"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("Missing 'path' argument"))?;
        let path = ctx.resolve(raw);

        if !ctx.permissions.allows_read(&path) {
            anyhow::bail!("Read access to {} is not permitted for this agent", raw);
        }

        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", raw, e))?;
        Ok(content)
    }
}

/// Create or overwrite a file the role was granted.
pub struct WriteFile;

#[async_trait]
impl Tool for WriteFile {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write content to a file, creating parent directories as needed. Only paths granted to this agent are writable."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path to the file, relative to the workspace"
                },
                "content": {
                    "type": "string",
                    "description": "The full file content"
                }
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> anyhow::Result<String> {
        let raw = args["path"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("Missing 'path' argument"))?;
        let content = args["content"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("Missing 'content' argument"))?;
        let path = ctx.resolve(raw);

        if !ctx.permissions.allows_write(&path) {
            anyhow::bail!("Write access to {} is not permitted for this agent", raw);
        }

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to create directories for {}: {}", raw, e))?;
        }
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to write {}: {}", raw, e))?;

        Ok(format!("Wrote {} bytes to {}", content.len(), raw))
    }
}

/// Replace an exact string once in a file the role was granted.
pub struct EditFile;

#[async_trait]
impl Tool for EditFile {
    fn name(&self) -> &str {
        "edit_file"
    }

    fn description(&self) -> &str {
        "Replace an exact string in a file with new content. The old string must appear exactly once. Only paths granted to this agent are editable."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path to the file, relative to the workspace"
                },
                "old_string": {
                    "type": "string",
                    "description": "Exact text to replace"
                },
                "new_string": {
                    "type": "string",
                    "description": "Replacement text"
                }
            },
            "required": ["path", "old_string", "new_string"]
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> anyhow::Result<String> {
        let raw = args["path"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("Missing 'path' argument"))?;
        let old_string = args["old_string"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("Missing 'old_string' argument"))?;
        let new_string = args["new_string"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("Missing 'new_string' argument"))?;
        let path = ctx.resolve(raw);

        if !ctx.permissions.allows_edit(&path) {
            anyhow::bail!("Edit access to {} is not permitted for this agent", raw);
        }

        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", raw, e))?;

        let matches = content.matches(old_string).count();
        if matches == 0 {
            anyhow::bail!("old_string not found in {}", raw);
        }
        if matches > 1 {
            anyhow::bail!(
                "old_string appears {} times in {}; provide more context to make it unique",
                matches,
                raw
            );
        }

        let updated = content.replacen(old_string, new_string, 1);
        tokio::fs::write(&path, updated)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to write {}: {}", raw, e))?;

        Ok(format!("Edited {}", raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Arc;

    use tokio::sync::Mutex;

    use crate::agent::{Permission, PermissionSet};
    use crate::slack::FetchAccumulator;

    fn ctx(workspace: PathBuf, grants: Vec<Permission>) -> ToolContext {
        ToolContext::new(
            workspace,
            PermissionSet::new(grants),
            Arc::new(Mutex::new(FetchAccumulator::new())),
        )
    }

    #[tokio::test]
    async fn write_then_read_round_trip() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let workspace = tmp.path().to_path_buf();
        let granted = workspace.join("docs/updates/2025-01-15.md");

        let ctx = ctx(
            workspace,
            vec![
                Permission::write(granted.clone()),
                Permission::read(granted.clone()),
            ],
        );

        let written = WriteFile
            .execute(
                json!({"path": "./docs/updates/2025-01-15.md", "content": "# Updates"}),
                &ctx,
            )
            .await
            .expect("write");
        assert!(written.contains("9 bytes"));

        let read = ReadFile
            .execute(json!({"path": "docs/updates/2025-01-15.md"}), &ctx)
            .await
            .expect("read");
        assert_eq!(read, "# Updates");
    }

    #[tokio::test]
    async fn out_of_scope_paths_are_rejected() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let workspace = tmp.path().to_path_buf();
        let granted = workspace.join("docs/updates/2025-01-15.md");
        std::fs::create_dir_all(granted.parent().expect("parent")).expect("mkdir");
        std::fs::write(workspace.join("docs/updates/secrets.md"), "nope").expect("write");

        let ctx = ctx(workspace, vec![Permission::read(granted)]);

        let err = ReadFile
            .execute(json!({"path": "docs/updates/secrets.md"}), &ctx)
            .await
            .expect_err("denied");
        assert!(err.to_string().contains("not permitted"));

        let err = WriteFile
            .execute(
                json!({"path": "docs/updates/2025-01-15.md", "content": "x"}),
                &ctx,
            )
            .await
            .expect_err("write not granted");
        assert!(err.to_string().contains("not permitted"));
    }

    #[tokio::test]
    async fn edit_requires_unique_match() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let workspace = tmp.path().to_path_buf();
        let granted = workspace.join("note.md");
        std::fs::write(&granted, "alpha beta alpha").expect("write");

        let ctx = ctx(workspace, vec![Permission::edit(granted.clone())]);

        let err = EditFile
            .execute(
                json!({"path": "note.md", "old_string": "alpha", "new_string": "gamma"}),
                &ctx,
            )
            .await
            .expect_err("ambiguous");
        assert!(err.to_string().contains("2 times"));

        EditFile
            .execute(
                json!({"path": "note.md", "old_string": "beta", "new_string": "gamma"}),
                &ctx,
            )
            .await
            .expect("unique edit");
        assert_eq!(
            std::fs::read_to_string(&granted).expect("read"),
            "alpha gamma alpha"
        );
    }
}
