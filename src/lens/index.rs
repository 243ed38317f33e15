//! TreeIndexer: document-ordered posts -> indexed, tagged thread
//!
//! The host exposes nesting as an indentation marker, never as parent links.
//! A `DepthProvider` turns that marker into a depth; the indexer then assigns
//! every post the nearest preceding depth-0 post as its top ancestor.
//!
//! Indexes are rebuilt wholesale on every reindex. Existing `Post` records are
//! never patched in place.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

use crate::lens::classify::{Classifier, PostTags};

// =============================================================================
// Input
// =============================================================================

/// One post as read from the host page, in document order
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RawPost {
    pub id: String,
    /// Rendered plain-text body
    #[serde(default)]
    pub text: String,
    /// Raw indentation marker (attribute value or spacer width)
    #[serde(default, deserialize_with = "indent_marker")]
    pub indent: Option<String>,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub age: String,
}

impl RawPost {
    /// Post with a nesting level given directly
    pub fn new(id: &str, depth: u32, text: &str) -> Self {
        Self::with_indent(id, &depth.to_string(), text)
    }

    /// Post with a raw indentation marker
    pub fn with_indent(id: &str, indent: &str, text: &str) -> Self {
        Self {
            id: id.to_string(),
            text: text.to_string(),
            indent: Some(indent.to_string()),
            ..Self::default()
        }
    }

    pub fn by(mut self, author: &str, age: &str) -> Self {
        self.author = author.to_string();
        self.age = age.to_string();
        self
    }
}

/// Accept `"3"`, `3` or `null` for the indent marker
fn indent_marker<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Marker {
        Text(String),
        Number(f64),
    }

    Ok(Option::<Marker>::deserialize(deserializer)?.map(|m| match m {
        Marker::Text(s) => s,
        Marker::Number(n) => n.to_string(),
    }))
}

// =============================================================================
// Depth Providers
// =============================================================================

/// Reads a post's nesting depth from its structural marker
///
/// `None` means the marker is absent or unreadable; the indexer then treats
/// the post as depth 0.
pub trait DepthProvider {
    fn depth(&self, post: &RawPost) -> Option<u32>;
}

impl<F> DepthProvider for F
where
    F: Fn(&RawPost) -> Option<u32>,
{
    fn depth(&self, post: &RawPost) -> Option<u32> {
        self(post)
    }
}

/// Marker is the nesting level (`<td class="ind" indent="2">`)
#[derive(Debug, Clone, Copy, Default)]
pub struct IndentLevel;

impl DepthProvider for IndentLevel {
    fn depth(&self, post: &RawPost) -> Option<u32> {
        parse_marker(post.indent.as_deref()?)
    }
}

/// Marker is a spacer width in pixels, `unit` pixels per level
#[derive(Debug, Clone, Copy)]
pub struct IndentWidth {
    unit: u32,
}

impl IndentWidth {
    pub fn new(unit: u32) -> Self {
        Self { unit: unit.max(1) }
    }
}

impl DepthProvider for IndentWidth {
    fn depth(&self, post: &RawPost) -> Option<u32> {
        parse_marker(post.indent.as_deref()?).map(|px| px / self.unit)
    }
}

/// Leading integer of a marker; `"2"`, `" 2 "`, `"80px"` and `"2.0"` all parse
fn parse_marker(raw: &str) -> Option<u32> {
    let digits: String = raw.trim().chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

// =============================================================================
// Indexed Thread
// =============================================================================

/// One indexed, classified post
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub author: String,
    pub age: String,
    /// Original-case body
    pub text: String,
    /// Lowercase copy used for term matching
    #[serde(skip)]
    pub text_lower: String,
    pub depth: u32,
    /// Nearest preceding depth-0 post; `None` for posts before any top-level post
    pub top_ancestor_id: Option<String>,
    pub tags: PostTags,
}

impl Post {
    pub fn is_top_level(&self) -> bool {
        self.depth == 0
    }

    /// Post that precedes every depth-0 post in the thread
    pub fn is_orphan(&self) -> bool {
        self.top_ancestor_id.is_none()
    }
}

/// Indexed thread in document order
#[derive(Debug, Clone, Default)]
pub struct ThreadIndex {
    posts: Vec<Post>,
    by_id: HashMap<String, usize>,
}

impl ThreadIndex {
    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    pub fn get(&self, id: &str) -> Option<&Post> {
        self.by_id.get(id).map(|&i| &self.posts[i])
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    pub fn top_level(&self) -> impl Iterator<Item = &Post> {
        self.posts.iter().filter(|p| p.is_top_level())
    }

    pub fn top_level_count(&self) -> usize {
        self.top_level().count()
    }
}

/// Builds a ThreadIndex from raw posts
pub struct TreeIndexer<'a> {
    classifier: Classifier<'a>,
    depth: &'a dyn DepthProvider,
}

impl<'a> TreeIndexer<'a> {
    pub fn new(classifier: Classifier<'a>, depth: &'a dyn DepthProvider) -> Self {
        Self { classifier, depth }
    }

    /// Index and classify posts in document order
    pub fn index(&self, raw: &[RawPost]) -> ThreadIndex {
        let start = instant::Instant::now();
        let mut posts = Vec::with_capacity(raw.len());
        let mut by_id = HashMap::with_capacity(raw.len());
        let mut current_top: Option<String> = None;

        for item in raw {
            let depth = self.depth.depth(item).unwrap_or(0);
            if depth == 0 {
                current_top = Some(item.id.clone());
            }

            by_id.insert(item.id.clone(), posts.len());
            posts.push(Post {
                id: item.id.clone(),
                author: item.author.clone(),
                age: item.age.clone(),
                text: item.text.clone(),
                text_lower: item.text.to_lowercase(),
                depth,
                top_ancestor_id: current_top.clone(),
                tags: self.classifier.classify(&item.text),
            });
        }

        let index = ThreadIndex { posts, by_id };
        tracing::debug!(
            posts = index.len(),
            top_level = index.top_level_count(),
            elapsed_us = start.elapsed().as_micros() as u64,
            "thread indexed"
        );
        index
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn index(raw: &[RawPost]) -> ThreadIndex {
        TreeIndexer::new(Classifier::default(), &IndentLevel).index(raw)
    }

    // -------------------------------------------------------------------------
    // Requirement 1: Replies inherit the nearest preceding depth-0 post
    // -------------------------------------------------------------------------
    #[test]
    fn test_top_ancestor_assignment() {
        let thread = index(&[
            RawPost::new("t1", 0, "a"),
            RawPost::new("c1", 1, "b"),
            RawPost::new("c2", 2, "c"),
            RawPost::new("t2", 0, "d"),
            RawPost::new("c3", 1, "e"),
        ]);

        let top: Vec<_> = thread.posts().iter().map(|p| p.top_ancestor_id.as_deref()).collect();
        assert_eq!(top, vec![Some("t1"), Some("t1"), Some("t1"), Some("t2"), Some("t2")]);
    }

    // -------------------------------------------------------------------------
    // Requirement 2: Depth-0 posts are their own top ancestor
    // -------------------------------------------------------------------------
    #[test]
    fn test_top_level_is_own_ancestor() {
        let thread = index(&[RawPost::new("t1", 0, "a")]);
        let post = thread.get("t1").unwrap();
        assert_eq!(post.top_ancestor_id.as_deref(), Some("t1"));
        assert!(post.is_top_level());
    }

    // -------------------------------------------------------------------------
    // Requirement 3: Posts before any depth-0 post have no ancestor
    // -------------------------------------------------------------------------
    #[test]
    fn test_orphan_before_first_top_level() {
        let thread = index(&[RawPost::new("c0", 2, "x"), RawPost::new("t1", 0, "y")]);
        assert!(thread.get("c0").unwrap().is_orphan());
        assert!(!thread.get("t1").unwrap().is_orphan());
    }

    // -------------------------------------------------------------------------
    // Requirement 4: Missing or unreadable markers default to depth 0
    // -------------------------------------------------------------------------
    #[test]
    fn test_missing_marker_is_top_level() {
        let mut no_marker = RawPost::new("a", 0, "x");
        no_marker.indent = None;
        let garbage = RawPost::with_indent("b", "wide", "y");

        let thread = index(&[no_marker, garbage]);
        assert_eq!(thread.get("a").unwrap().depth, 0);
        assert_eq!(thread.get("b").unwrap().depth, 0);
        assert_eq!(thread.top_level_count(), 2);
    }

    #[test]
    fn test_indent_width_provider() {
        let provider = IndentWidth::new(40);
        assert_eq!(provider.depth(&RawPost::with_indent("a", "0", "")), Some(0));
        assert_eq!(provider.depth(&RawPost::with_indent("a", "120", "")), Some(3));
        assert_eq!(provider.depth(&RawPost::with_indent("a", "80px", "")), Some(2));
    }

    #[test]
    fn test_closure_provider_for_synthetic_trees() {
        let depths = |p: &RawPost| -> Option<u32> {
            p.id.strip_prefix('d').and_then(|n| n.parse().ok())
        };
        let thread = TreeIndexer::new(Classifier::default(), &depths)
            .index(&[RawPost::with_indent("d0", "", "x"), RawPost::with_indent("d1", "", "y")]);
        assert_eq!(thread.posts()[1].depth, 1);
        assert_eq!(thread.posts()[1].top_ancestor_id.as_deref(), Some("d0"));
    }

    #[test]
    fn test_posts_are_classified_and_lowercased() {
        let thread = index(&[RawPost::new("t1", 0, "Remote, Go").by("pg", "1 hour ago")]);
        let post = thread.get("t1").unwrap();
        assert_eq!(post.text_lower, "remote, go");
        assert!(post.tags.remote);
        assert_eq!(post.author, "pg");
        assert_eq!(post.age, "1 hour ago");
    }

    #[test]
    fn test_raw_post_accepts_numeric_indent() {
        let post: RawPost = serde_json::from_str(r#"{ "id": "c1", "indent": 2 }"#).unwrap();
        assert_eq!(IndentLevel.depth(&post), Some(2));
        let post: RawPost = serde_json::from_str(r#"{ "id": "c1" }"#).unwrap();
        assert_eq!(post.indent, None);
        assert_eq!(post.author, "");
    }
}
