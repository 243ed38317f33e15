//! VisibilityResolver: (indexed thread, filter snapshot) -> visible posts
//!
//! # Evaluation
//! 1. Depth-0 posts are tested with the top-level predicate: every active
//!    toggle, every non-empty facet selection, every include term, and no
//!    exclude term.
//! 2. Replies inherit visibility through exactly one `ReplyPolicy`, chosen
//!    once per call:
//!    - `AncestorGated`: reply visible iff its top ancestor passed and
//!      top-level-only is off. Orphans (no top ancestor) are tested like
//!      depth-0 posts.
//!    - `ContiguousSubtree`: every post is tested on its own; with
//!      hide-replies on, a failing post hides every strictly deeper post
//!      until a post at its depth or shallower closes the run.
//! 3. The `matched/total` ratio counts depth-0 posts only.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::lens::catalog::FacetCategory;
use crate::lens::filter::{FilterConfiguration, ReplyPolicy, TermSet};
use crate::lens::index::{Post, ThreadIndex};

// =============================================================================
// Types
// =============================================================================

/// Timing and volume for one resolve call
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResolveStats {
    pub resolve_us: u64,
    pub posts_evaluated: usize,
    pub visible_count: usize,
}

/// Outcome of one resolve call
#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Resolution {
    pub policy: ReplyPolicy,
    /// Visible post ids in document order
    pub visible: Vec<String>,
    pub matched_top_level: usize,
    pub total_top_level: usize,
    pub summary: String,
    pub stats: ResolveStats,
    /// Visibility per post, aligned with `ThreadIndex::posts`
    #[serde(skip)]
    flags: Vec<bool>,
    #[serde(skip)]
    visible_set: HashSet<String>,
}

impl Resolution {
    fn new(index: &ThreadIndex, policy: ReplyPolicy, flags: Vec<bool>, matched: usize) -> Self {
        let visible: Vec<String> = index
            .posts()
            .iter()
            .zip(&flags)
            .filter(|(_, &shown)| shown)
            .map(|(p, _)| p.id.clone())
            .collect();
        let total = index.top_level_count();

        Self {
            policy,
            visible_set: visible.iter().cloned().collect(),
            summary: format_summary(matched, total),
            matched_top_level: matched,
            total_top_level: total,
            stats: ResolveStats {
                resolve_us: 0,
                posts_evaluated: flags.len(),
                visible_count: visible.len(),
            },
            visible,
            flags,
        }
    }

    pub fn is_visible(&self, id: &str) -> bool {
        self.visible_set.contains(id)
    }

    /// Visibility of the post at `position` in document order
    pub fn is_visible_at(&self, position: usize) -> bool {
        self.flags.get(position).copied().unwrap_or(false)
    }

    /// Visible posts of `index`, in document order
    pub fn visible_posts<'a>(&'a self, index: &'a ThreadIndex) -> impl Iterator<Item = &'a Post> + 'a {
        index
            .posts()
            .iter()
            .zip(self.flags.iter())
            .filter(|(_, &shown)| shown)
            .map(|(p, _)| p)
    }

    /// Posts hidden by this resolution, in document order
    pub fn hidden_ids<'a>(&'a self, index: &'a ThreadIndex) -> Vec<&'a str> {
        index
            .posts()
            .iter()
            .zip(self.flags.iter())
            .filter(|(_, &shown)| !shown)
            .map(|(p, _)| p.id.as_str())
            .collect()
    }
}

/// `"{matched}/{total} match"`
pub fn format_summary(matched: usize, total: usize) -> String {
    format!("{}/{} match", matched, total)
}

// =============================================================================
// Top-level predicate
// =============================================================================

/// Compiled predicate for one filter snapshot
pub struct TopLevelPredicate<'f> {
    filter: &'f FilterConfiguration,
    include: TermSet,
    exclude: TermSet,
}

impl<'f> TopLevelPredicate<'f> {
    pub fn new(filter: &'f FilterConfiguration) -> Self {
        Self {
            filter,
            include: TermSet::new(filter.include_terms()),
            exclude: TermSet::new(filter.exclude_terms()),
        }
    }

    pub fn passes(&self, post: &Post) -> bool {
        let f = self.filter;
        let tags = &post.tags;

        if f.remote && !tags.remote {
            return false;
        }
        if f.onsite && !tags.onsite {
            return false;
        }
        if f.has_salary && !tags.salary {
            return false;
        }
        // Exclusion toggle inverts: on => flag must be absent
        if f.hide_exclusive && tags.exclusive {
            return false;
        }

        for category in FacetCategory::ALL {
            let selected = f.selection(category);
            if !selected.is_empty() && !tags.facet(category).iter().any(|v| selected.contains(v)) {
                return false;
            }
        }

        if !self.include.all_in(&post.text_lower) {
            return false;
        }
        if self.exclude.any_in(&post.text_lower) {
            return false;
        }

        true
    }
}

// =============================================================================
// VisibilityResolver
// =============================================================================

/// Stateless resolver; every call is a pure function of its inputs
#[derive(Debug, Clone, Copy, Default)]
pub struct VisibilityResolver;

impl VisibilityResolver {
    pub fn new() -> Self {
        Self
    }

    pub fn resolve(&self, index: &ThreadIndex, filter: &FilterConfiguration) -> Resolution {
        let start = instant::Instant::now();
        let predicate = TopLevelPredicate::new(filter);

        let (flags, matched) = match filter.reply_policy {
            ReplyPolicy::AncestorGated => ancestor_gated(index, &predicate, filter.top_level_only),
            ReplyPolicy::ContiguousSubtree => contiguous_subtree(index, &predicate, filter.hide_replies),
        };

        let mut resolution = Resolution::new(index, filter.reply_policy, flags, matched);
        resolution.stats.resolve_us = start.elapsed().as_micros() as u64;

        tracing::debug!(
            policy = ?resolution.policy,
            matched = resolution.matched_top_level,
            total = resolution.total_top_level,
            visible = resolution.stats.visible_count,
            elapsed_us = resolution.stats.resolve_us,
            "thread resolved"
        );
        resolution
    }
}

fn ancestor_gated(index: &ThreadIndex, predicate: &TopLevelPredicate, top_level_only: bool) -> (Vec<bool>, usize) {
    let posts = index.posts();

    let mut passing_tops: HashSet<&str> = HashSet::new();
    let mut matched = 0;
    for post in posts.iter().filter(|p| p.is_top_level()) {
        if predicate.passes(post) {
            passing_tops.insert(post.id.as_str());
            matched += 1;
        }
    }

    let flags = posts
        .iter()
        .map(|post| {
            if post.is_top_level() {
                return passing_tops.contains(post.id.as_str());
            }
            match post.top_ancestor_id.as_deref() {
                Some(top) => !top_level_only && passing_tops.contains(top),
                None => predicate.passes(post),
            }
        })
        .collect();

    (flags, matched)
}

fn contiguous_subtree(index: &ThreadIndex, predicate: &TopLevelPredicate, hide_replies: bool) -> (Vec<bool>, usize) {
    let mut flags = Vec::with_capacity(index.len());
    let mut matched = 0;
    // Depth of the most recent failing post whose subtree is still open
    let mut hidden_from: Option<u32> = None;

    for post in index.posts() {
        if let Some(depth) = hidden_from {
            if post.depth > depth {
                tracing::trace!(id = %post.id, "hidden with failed ancestor subtree");
                flags.push(false);
                continue;
            }
            hidden_from = None;
        }

        let own = predicate.passes(post);
        if own && post.is_top_level() {
            matched += 1;
        }
        if !own && hide_replies {
            hidden_from = Some(post.depth);
        }
        flags.push(own);
    }

    (flags, matched)
}

// =============================================================================
// Tests
// =============================================================================
