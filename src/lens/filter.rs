//! FilterConfiguration: immutable snapshot of the filter controls
//!
//! The host snapshots its controls into this value before every resolve call.
//! Serialized field names follow the persisted preference record
//! (`qInclude`, `hideUSOnly`, `stacks`, ...); aliases accept the descriptive
//! names (`include`, `hideExclusiveListings`, `technologyStack`, ...).

use aho_corasick::{AhoCorasick, AhoCorasickBuilder, MatchKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::lens::catalog::FacetCategory;

// =============================================================================
// Types
// =============================================================================

/// How replies inherit visibility
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum ReplyPolicy {
    /// Reply visible iff its top ancestor passed and top-level-only is off
    #[default]
    AncestorGated,
    /// Each post tested on its own; with hide-replies on, a failing post
    /// hides the contiguous run of deeper posts that follows it
    ContiguousSubtree,
}

/// Active filter state
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterConfiguration {
    /// Comma-separated, every term must appear
    #[serde(rename = "qInclude", alias = "include")]
    pub include: String,
    /// Comma-separated, any term hides the post
    #[serde(rename = "qExclude", alias = "exclude")]
    pub exclude: String,
    pub remote: bool,
    pub onsite: bool,
    #[serde(rename = "salary", alias = "hasSalary")]
    pub has_salary: bool,
    pub top_level_only: bool,
    #[serde(rename = "hideUSOnly", alias = "hideExclusiveListings")]
    pub hide_exclusive: bool,
    pub hide_replies: bool,
    #[serde(alias = "technologyStack")]
    pub stacks: BTreeSet<String>,
    #[serde(alias = "employmentType")]
    pub employment_types: BTreeSet<String>,
    #[serde(alias = "seniorityLevel")]
    pub seniorities: BTreeSet<String>,
    #[serde(alias = "roleType")]
    pub role_types: BTreeSet<String>,
    pub reply_policy: ReplyPolicy,
}

impl FilterConfiguration {
    /// Lowercased include terms for matching
    pub fn include_terms(&self) -> Vec<String> {
        parse_terms(&self.include.to_lowercase())
    }

    /// Lowercased exclude terms for matching
    pub fn exclude_terms(&self) -> Vec<String> {
        parse_terms(&self.exclude.to_lowercase())
    }

    /// Include terms as typed, for highlighting
    pub fn highlight_terms(&self) -> Vec<String> {
        parse_terms(&self.include)
    }

    pub fn selection(&self, category: FacetCategory) -> &BTreeSet<String> {
        match category {
            FacetCategory::TechnologyStack => &self.stacks,
            FacetCategory::EmploymentType => &self.employment_types,
            FacetCategory::SeniorityLevel => &self.seniorities,
            FacetCategory::RoleType => &self.role_types,
        }
    }

    pub fn selection_mut(&mut self, category: FacetCategory) -> &mut BTreeSet<String> {
        match category {
            FacetCategory::TechnologyStack => &mut self.stacks,
            FacetCategory::EmploymentType => &mut self.employment_types,
            FacetCategory::SeniorityLevel => &mut self.seniorities,
            FacetCategory::RoleType => &mut self.role_types,
        }
    }

    /// True when no predicate restricts top-level posts
    pub fn is_vacuous(&self) -> bool {
        !self.remote
            && !self.onsite
            && !self.has_salary
            && !self.hide_exclusive
            && FacetCategory::ALL.iter().all(|c| self.selection(*c).is_empty())
            && self.include_terms().is_empty()
            && self.exclude_terms().is_empty()
    }

    /// Human-readable list of every active filter, in control order
    pub fn describe_active(&self) -> Vec<String> {
        let mut active = Vec::new();

        let include = self.include.trim();
        if !include.is_empty() {
            active.push(format!("Include: \"{}\"", include));
        }
        let exclude = self.exclude.trim();
        if !exclude.is_empty() {
            active.push(format!("Exclude: \"{}\"", exclude));
        }

        let toggles = [
            (self.remote, "Remote jobs only"),
            (self.onsite, "Onsite/Hybrid jobs only"),
            (self.has_salary, "Jobs with salary info"),
            (self.top_level_only, "Top-level comments only"),
            (self.hide_exclusive, "Hide US-only jobs"),
            (self.hide_replies, "Hide replies under hidden comments"),
        ];
        active.extend(toggles.iter().filter(|(on, _)| *on).map(|(_, label)| label.to_string()));

        for category in [
            FacetCategory::EmploymentType,
            FacetCategory::SeniorityLevel,
            FacetCategory::RoleType,
            FacetCategory::TechnologyStack,
        ] {
            let selected = self.selection(category);
            if !selected.is_empty() {
                let values: Vec<&str> = selected.iter().map(String::as_str).collect();
                active.push(format!("{}: {}", category.label(), values.join(", ")));
            }
        }

        active
    }

    /// Numbered report of active filters for the host to display
    pub fn active_report(&self) -> String {
        let active = self.describe_active();
        if active.is_empty() {
            return "No filters are currently active.\nShowing all comments.".to_string();
        }
        let lines: Vec<String> = active
            .iter()
            .enumerate()
            .map(|(i, filter)| format!("{}. {}", i + 1, filter))
            .collect();
        format!("Active filters:\n\n{}", lines.join("\n"))
    }
}

/// Split a comma-delimited list, trimming and dropping empty terms
pub fn parse_terms(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

// =============================================================================
// TermSet
// =============================================================================

/// Substring matcher over a fixed list of lowercase terms
///
/// One Aho-Corasick pass answers both "all terms present" and "any term
/// present" regardless of how many terms the user typed.
pub struct TermSet {
    terms: Vec<String>,
    automaton: Option<AhoCorasick>,
}

impl TermSet {
    pub fn new(terms: Vec<String>) -> Self {
        let mut unique: Vec<String> = Vec::with_capacity(terms.len());
        for term in terms {
            if !unique.contains(&term) {
                unique.push(term);
            }
        }

        let automaton = if unique.is_empty() {
            None
        } else {
            match AhoCorasickBuilder::new().match_kind(MatchKind::Standard).build(&unique) {
                Ok(ac) => Some(ac),
                Err(e) => {
                    tracing::warn!(error = %e, "term automaton build failed, using substring scan");
                    None
                }
            }
        };

        Self { terms: unique, automaton }
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    /// Every term occurs in `text` (vacuously true when empty)
    pub fn all_in(&self, text: &str) -> bool {
        if self.terms.is_empty() {
            return true;
        }
        match &self.automaton {
            Some(ac) => {
                let mut seen = vec![false; self.terms.len()];
                let mut remaining = self.terms.len();
                for m in ac.find_overlapping_iter(text) {
                    let slot = &mut seen[m.pattern().as_usize()];
                    if !*slot {
                        *slot = true;
                        remaining -= 1;
                        if remaining == 0 {
                            return true;
                        }
                    }
                }
                false
            }
            None => self.terms.iter().all(|t| text.contains(t.as_str())),
        }
    }

    /// At least one term occurs in `text` (false when empty)
    pub fn any_in(&self, text: &str) -> bool {
        match &self.automaton {
            Some(ac) => ac.is_match(text),
            None => self.terms.iter().any(|t| text.contains(t.as_str())),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
