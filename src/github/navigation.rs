//! Navigation index (`docs.json`) maintenance.
//!
//! The changelog anchor is always fully regenerated from the union of the
//! entries already present plus the new one: dedup by path, sort strictly
//! descending by date, regroup by month. Nothing outside the changelog anchor
//! is touched.

use chrono::NaiveDate;
use regex::Regex;
use thiserror::Error;

/// Location of the navigation index in the documentation repository.
pub const DOCS_JSON_PATH: &str = "docs/docs.json";

const CHANGELOG_ANCHOR_NAME: &str = "Changelog";
const CHANGELOG_ICON: &str = "clock-rotate-left";
const CHANGELOG_DESCRIPTION: &str = "Latest updates and changes";

#[derive(Debug, Error)]
pub enum NavigationError {
    #[error("invalid docs.json: {0}")]
    Json(#[from] serde_json::Error),
}

/// One changelog page in the navigation index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangelogEntry {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub path: String,
}

impl ChangelogEntry {
    pub fn for_date(date: NaiveDate) -> Self {
        use chrono::Datelike;
        Self {
            year: date.year(),
            month: date.month(),
            day: date.day(),
            path: format!(
                "updates/{:04}/{:02}/{:02}/changelog",
                date.year(),
                date.month(),
                date.day()
            ),
        }
    }

    fn from_page_path(path: &str) -> Option<Self> {
        let re = Regex::new(r"^updates/(\d{4})/(\d{2})/(\d{2})/changelog$").expect("valid regex");
        let captured = re.captures(path)?;
        Some(Self {
            year: captured[1].parse().ok()?,
            month: captured[2].parse().ok()?,
            day: captured[3].parse().ok()?,
            path: path.to_string(),
        })
    }

    /// Group label in the navigation sidebar, e.g. `January 2025`.
    fn group_label(&self) -> String {
        let month_name = NaiveDate::from_ymd_opt(self.year, self.month, 1)
            .map(|d| d.format("%B").to_string())
            .unwrap_or_else(|| format!("{:02}", self.month));
        format!("{} {}", month_name, self.year)
    }
}

/// Merge a new dated entry into the navigation index content.
///
/// Returns the regenerated JSON, or `None` when the document has no changelog
/// anchor to update (the caller then leaves the index out of the commit
/// rather than committing it unchanged). The merge is idempotent: merging a
/// date already present yields exactly one occurrence of its path.
pub fn merge_changelog_entry(
    docs_content: &str,
    date: NaiveDate,
) -> Result<Option<String>, NavigationError> {
    let mut docs: serde_json::Value = serde_json::from_str(docs_content)?;

    let anchors = docs["navigation"]["anchors"].as_array_mut();
    let anchor = match anchors.and_then(|a| {
        a.iter_mut()
            .find(|anchor| anchor["anchor"].as_str() == Some(CHANGELOG_ANCHOR_NAME))
    }) {
        Some(anchor) => anchor,
        None => {
            tracing::warn!("docs.json has no changelog anchor, leaving index untouched");
            return Ok(None);
        }
    };

    let mut entries = collect_entries(anchor);
    entries.push(ChangelogEntry::for_date(date));

    let entries = dedup_and_sort(entries);

    anchor["icon"] = serde_json::Value::String(CHANGELOG_ICON.to_string());
    anchor["description"] = serde_json::Value::String(CHANGELOG_DESCRIPTION.to_string());
    anchor["groups"] = serde_json::Value::Array(group_by_month(&entries));

    Ok(Some(serde_json::to_string_pretty(&docs)?))
}

/// Existing entries inside the changelog anchor. Pages may be plain strings
/// or `{ "page": ... }` objects; anything unrecognized is dropped.
fn collect_entries(anchor: &serde_json::Value) -> Vec<ChangelogEntry> {
    let mut entries = Vec::new();
    let groups = match anchor["groups"].as_array() {
        Some(groups) => groups,
        None => return entries,
    };

    for group in groups {
        let pages = match group["pages"].as_array() {
            Some(pages) => pages,
            None => continue,
        };
        for page in pages {
            let path = match page {
                serde_json::Value::String(s) => s.as_str(),
                serde_json::Value::Object(o) => o.get("page").and_then(|p| p.as_str()).unwrap_or(""),
                _ => continue,
            };
            if let Some(entry) = ChangelogEntry::from_page_path(path) {
                entries.push(entry);
            }
        }
    }
    entries
}

/// Dedup by path (first occurrence wins) and sort strictly descending by
/// (year, month, day).
fn dedup_and_sort(entries: Vec<ChangelogEntry>) -> Vec<ChangelogEntry> {
    let mut unique: Vec<ChangelogEntry> = Vec::with_capacity(entries.len());
    for entry in entries {
        if !unique.iter().any(|e| e.path == entry.path) {
            unique.push(entry);
        }
    }
    unique.sort_by(|a, b| (b.year, b.month, b.day).cmp(&(a.year, a.month, a.day)));
    unique
}

fn group_by_month(entries: &[ChangelogEntry]) -> Vec<serde_json::Value> {
    let mut groups: Vec<(String, Vec<String>)> = Vec::new();
    for entry in entries {
        let label = entry.group_label();
        match groups.last_mut() {
            Some((last_label, pages)) if *last_label == label => pages.push(entry.path.clone()),
            _ => groups.push((label, vec![entry.path.clone()])),
        }
    }

    groups
        .into_iter()
        .map(|(label, pages)| {
            serde_json::json!({
                "group": label,
                "pages": pages,
            })
        })
        .collect()
}
