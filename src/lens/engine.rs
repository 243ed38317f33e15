//! ThreadLens: one thread's index, filter and last resolution
//!
//! Single entry point for the host page. Reindexing rebuilds the whole index;
//! every resolve replaces the previous resolution and pushes the
//! `"{m}/{t} match"` summary to registered listeners.

use crate::config::LensConfig;
use crate::lens::classify::Classifier;
use crate::lens::export::{self, ExportOutcome};
use crate::lens::filter::FilterConfiguration;
use crate::lens::highlight::{Highlighter, MarkerStyle, Span};
use crate::lens::index::{Post, RawPost, ThreadIndex, TreeIndexer};
use crate::lens::resolve::{Resolution, VisibilityResolver};

pub type SummaryListener = Box<dyn FnMut(&str)>;

pub struct ThreadLens {
    config: LensConfig,
    thread_id: String,
    index: ThreadIndex,
    filter: FilterConfiguration,
    last: Option<Resolution>,
    highlighter: Highlighter,
    summary_listeners: Vec<SummaryListener>,
    index_us: u64,
}

impl ThreadLens {
    pub fn new(thread_id: &str, config: LensConfig) -> Self {
        let highlighter = Highlighter::new(MarkerStyle::from(&config));
        Self {
            config,
            thread_id: thread_id.to_string(),
            index: ThreadIndex::default(),
            filter: FilterConfiguration::default(),
            last: None,
            highlighter,
            summary_listeners: Vec::new(),
            index_us: 0,
        }
    }

    pub fn config(&self) -> &LensConfig {
        &self.config
    }

    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    pub fn index(&self) -> &ThreadIndex {
        &self.index
    }

    /// Filter used by the last resolve
    pub fn filter(&self) -> &FilterConfiguration {
        &self.filter
    }

    pub fn last_resolution(&self) -> Option<&Resolution> {
        self.last.as_ref()
    }

    /// Microseconds spent in the last reindex
    pub fn index_us(&self) -> u64 {
        self.index_us
    }

    // ==================== INDEXING ====================

    /// Rebuild the index from the host's current post list
    ///
    /// The previous resolution is dropped; call `resolve` again.
    pub fn reindex(&mut self, raw: &[RawPost]) -> usize {
        let start = instant::Instant::now();
        let depth = self.config.depth_provider();
        self.index = TreeIndexer::new(Classifier::default(), depth.as_ref()).index(raw);
        self.index_us = start.elapsed().as_micros() as u64;
        self.last = None;
        self.index.len()
    }

    // ==================== RESOLUTION ====================

    pub fn resolve(&mut self, filter: FilterConfiguration) -> &Resolution {
        let resolution = VisibilityResolver::new().resolve(&self.index, &filter);
        for listener in self.summary_listeners.iter_mut() {
            listener(&resolution.summary);
        }
        self.filter = filter;
        self.last.insert(resolution)
    }

    /// Reset every control to its default and resolve
    pub fn clear_filter(&mut self) -> &Resolution {
        self.resolve(FilterConfiguration::default())
    }

    pub fn on_summary(&mut self, listener: SummaryListener) {
        self.summary_listeners.push(listener);
    }

    pub fn is_visible(&self, id: &str) -> bool {
        self.last.as_ref().is_some_and(|r| r.is_visible(id))
    }

    /// Visible posts in document order; empty before the first resolve
    pub fn visible_posts(&self) -> Vec<&Post> {
        match &self.last {
            Some(resolution) => resolution.visible_posts(&self.index).collect(),
            None => Vec::new(),
        }
    }

    pub fn describe_active(&self) -> Vec<String> {
        self.filter.describe_active()
    }

    // ==================== HIGHLIGHTING ====================

    /// Include-term spans of a visible post (hidden posts get none)
    pub fn highlights(&self, id: &str) -> Vec<Span> {
        if !self.is_visible(id) {
            return Vec::new();
        }
        match self.index.get(id) {
            Some(post) => self.highlighter.spans(&post.text, &self.filter.highlight_terms()),
            None => Vec::new(),
        }
    }

    /// Escaped, marked-up text of a visible post, safe to assign as HTML
    pub fn render_highlighted(&self, id: &str) -> Option<String> {
        if !self.is_visible(id) {
            return None;
        }
        let post = self.index.get(id)?;
        Some(self.highlighter.render_text(&post.text, &self.filter.highlight_terms()))
    }

    /// Strip stale markers from host markup and re-mark it for the current terms
    pub fn rehighlight(&self, markup: &str) -> String {
        self.highlighter.render(markup, &self.filter.highlight_terms())
    }

    // ==================== EXPORT ====================

    pub fn export_contacts(&self) -> ExportOutcome {
        export::export_contacts(self.visible_posts(), &self.thread_id)
    }

    pub fn export_csv(&self) -> ExportOutcome {
        export::export_posts_csv(self.visible_posts(), &self.thread_id)
    }
}
