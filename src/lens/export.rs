//! Export: contact addresses and CSV tables over visible or saved posts
//!
//! Everything here is pure. The host receives an `ExportOutcome` and does the
//! clipboard/file hand-off itself.

use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::OnceLock;

use crate::lens::catalog::FacetCategory;
use crate::lens::index::Post;
use crate::lens::saved::SavedRecord;

pub const NO_VISIBLE_POSTS: &str = "No visible comments to export";
pub const NO_CONTACTS: &str = "No emails found in visible comments";
pub const NO_SAVED_ITEMS: &str = "No saved jobs to export";

/// What an export produced
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum ExportOutcome {
    /// Nothing to export; `message` is informational, not an error
    Empty { message: String },
    Ready { content: String, count: usize, filename: String },
}

impl ExportOutcome {
    fn empty(message: &str) -> Self {
        Self::Empty { message: message.to_string() }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }

    pub fn content(&self) -> Option<&str> {
        match self {
            Self::Ready { content, .. } => Some(content),
            Self::Empty { .. } => None,
        }
    }
}

// =============================================================================
// Contacts
// =============================================================================

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Z|a-z]{2,}\b")
            .unwrap_or_else(|e| panic!("email pattern: {e}"))
    })
}

/// Unique email-shaped strings in first-seen order
///
/// Uniqueness is on the literal match, so `A@x.io` and `a@x.io` are distinct.
pub fn extract_contacts<'a>(posts: impl IntoIterator<Item = &'a Post>) -> Vec<String> {
    let re = email_regex();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut contacts = Vec::new();

    for post in posts {
        for m in re.find_iter(&post.text) {
            if seen.insert(m.as_str()) {
                contacts.push(m.as_str().to_string());
            }
        }
    }
    contacts
}

pub fn export_contacts<'a>(posts: impl IntoIterator<Item = &'a Post>, thread_id: &str) -> ExportOutcome {
    let posts: Vec<&Post> = posts.into_iter().collect();
    if posts.is_empty() {
        return ExportOutcome::empty(NO_VISIBLE_POSTS);
    }

    let contacts = extract_contacts(posts);
    if contacts.is_empty() {
        return ExportOutcome::empty(NO_CONTACTS);
    }
    ExportOutcome::Ready {
        count: contacts.len(),
        content: contacts.join("\n"),
        filename: format!("hn_thread_{}_emails.txt", thread_id),
    }
}

// =============================================================================
// Tables
// =============================================================================

/// Header plus cell extractor
pub type Column<T> = (&'static str, fn(&T) -> String);

/// Quote a field, doubling embedded quotes
pub fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

/// Header row followed by one row per record
pub fn to_table<'a, T: 'a>(records: impl IntoIterator<Item = &'a T>, columns: &[Column<T>]) -> String {
    let header: Vec<String> = columns.iter().map(|(name, _)| quote(name)).collect();
    let mut rows = vec![header.join(",")];

    for record in records {
        let cells: Vec<String> = columns.iter().map(|(_, cell)| quote(&cell(record))).collect();
        rows.push(cells.join(","));
    }
    rows.join("\n")
}

fn yes_no(flag: bool) -> String {
    let label = if flag { "Yes" } else { "No" };
    label.to_string()
}

fn tags(post: &Post, category: FacetCategory) -> String {
    post.tags.facet(category).join(";")
}

pub const POST_COLUMNS: &[Column<Post>] = &[
    ("ID", |p| p.id.clone()),
    ("Author", |p| p.author.clone()),
    ("Age", |p| p.age.clone()),
    ("Remote", |p| yes_no(p.tags.remote)),
    ("Onsite", |p| yes_no(p.tags.onsite)),
    ("Salary", |p| yes_no(p.tags.salary)),
    ("Exclusivity", |p| yes_no(p.tags.exclusive)),
    ("Employment", |p| tags(p, FacetCategory::EmploymentType)),
    ("Seniority", |p| tags(p, FacetCategory::SeniorityLevel)),
    ("Role", |p| tags(p, FacetCategory::RoleType)),
    ("Stack", |p| tags(p, FacetCategory::TechnologyStack)),
    ("Body", |p| p.text.clone()),
];

pub const SAVED_COLUMNS: &[Column<SavedRecord>] = &[
    ("ID", |r| r.id.clone()),
    ("Author", |r| r.author.clone()),
    ("Age", |r| r.age.clone()),
    ("Applied", |r| yes_no(r.applied)),
    ("SavedAt", |r| r.saved_at.to_rfc3339_opts(SecondsFormat::Secs, true)),
    ("URL", |r| r.url.clone()),
    ("Body", |r| r.body.clone()),
];

/// CSV of the visible posts of one thread
pub fn export_posts_csv<'a>(posts: impl IntoIterator<Item = &'a Post>, thread_id: &str) -> ExportOutcome {
    let posts: Vec<&Post> = posts.into_iter().collect();
    if posts.is_empty() {
        return ExportOutcome::empty(NO_VISIBLE_POSTS);
    }
    ExportOutcome::Ready {
        content: to_table(posts.iter().copied(), POST_COLUMNS),
        count: posts.len(),
        filename: format!("hn_thread_{}_filtered.csv", thread_id),
    }
}

/// CSV of saved records, dated by `today`
pub fn export_saved_csv<'a>(records: impl IntoIterator<Item = &'a SavedRecord>, today: DateTime<Utc>) -> ExportOutcome {
    let records: Vec<&SavedRecord> = records.into_iter().collect();
    if records.is_empty() {
        return ExportOutcome::empty(NO_SAVED_ITEMS);
    }
    ExportOutcome::Ready {
        content: to_table(records.iter().copied(), SAVED_COLUMNS),
        count: records.len(),
        filename: format!("hn_saved_jobs_{}.csv", today.format("%Y-%m-%d")),
    }
}
