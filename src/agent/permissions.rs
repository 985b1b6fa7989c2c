//! Least-privilege permission grants for the sub-agent roles.
//!
//! A grant is either a named tool or a file operation scoped to one exact
//! path. Each role carries only the grants it needs; the tool registry
//! filters schemas by them and the file tools enforce the path scope.

use std::path::{Path, PathBuf};

/// One grant in a role's permission set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Permission {
    /// Permission to call a named tool.
    Tool(String),
    /// Permission to read one exact file.
    ReadFile(PathBuf),
    /// Permission to create/overwrite one exact file.
    WriteFile(PathBuf),
    /// Permission to edit one exact file in place.
    EditFile(PathBuf),
}

impl Permission {
    pub fn tool(name: impl Into<String>) -> Self {
        Permission::Tool(name.into())
    }

    pub fn read(path: impl Into<PathBuf>) -> Self {
        Permission::ReadFile(path.into())
    }

    pub fn write(path: impl Into<PathBuf>) -> Self {
        Permission::WriteFile(path.into())
    }

    pub fn edit(path: impl Into<PathBuf>) -> Self {
        Permission::EditFile(path.into())
    }
}

/// The full grant table for one role.
#[derive(Debug, Clone, Default)]
pub struct PermissionSet {
    grants: Vec<Permission>,
}

impl PermissionSet {
    pub fn new(grants: Vec<Permission>) -> Self {
        Self { grants }
    }

    pub fn allows_tool(&self, name: &str) -> bool {
        self.grants
            .iter()
            .any(|g| matches!(g, Permission::Tool(n) if n == name))
    }

    pub fn allows_read(&self, path: &Path) -> bool {
        self.grants
            .iter()
            .any(|g| matches!(g, Permission::ReadFile(p) if p == path))
    }

    pub fn allows_write(&self, path: &Path) -> bool {
        self.grants
            .iter()
            .any(|g| matches!(g, Permission::WriteFile(p) if p == path))
    }

    pub fn allows_edit(&self, path: &Path) -> bool {
        self.grants
            .iter()
            .any(|g| matches!(g, Permission::EditFile(p) if p == path))
    }

    pub fn grants(&self) -> &[Permission] {
        &self.grants
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_grants_are_exact() {
        let set = PermissionSet::new(vec![Permission::tool("fetch_messages_from_channel")]);
        assert!(set.allows_tool("fetch_messages_from_channel"));
        assert!(!set.allows_tool("create_changelog_pr"));
    }

    #[test]
    fn file_grants_are_per_operation_and_per_path() {
        let today = PathBuf::from("/ws/docs/updates/2025-01-15.md");
        let other = PathBuf::from("/ws/docs/updates/2025-01-14.md");
        let set = PermissionSet::new(vec![
            Permission::read(today.clone()),
            Permission::edit(today.clone()),
        ]);

        assert!(set.allows_read(&today));
        assert!(set.allows_edit(&today));
        // Edit granted does not imply write.
        assert!(!set.allows_write(&today));
        assert!(!set.allows_read(&other));
    }
}
