//! LensConfig: host-tunable settings
//!
//! Passed to the WASM constructors as a plain JS object. Every field has a
//! default so `null`, `undefined` or a partial object are all accepted.

use serde::{Deserialize, Serialize};

use crate::lens::highlight::MarkerStyle;
use crate::lens::index::{DepthProvider, IndentLevel, IndentWidth};

/// How the host's indentation marker encodes nesting
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum DepthSignal {
    /// Marker is the nesting level itself (`indent="2"`)
    #[default]
    Level,
    /// Marker is a spacer width in pixels (`width="80"`)
    Width,
}

/// Configuration for a ThreadLens instance
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LensConfig {
    /// Per-thread filter preferences are stored under `{prefix}{thread_id}`
    #[serde(default = "default_prefs_key_prefix")]
    pub prefs_key_prefix: String,
    /// Saved items are stored globally under this key
    #[serde(default = "default_saved_key")]
    pub saved_key: String,
    /// Used to derive a saved item's url when the host omits it
    #[serde(default = "default_item_url_base")]
    pub item_url_base: String,
    /// Character budget for saved-item body previews
    #[serde(default = "default_preview_chars")]
    pub preview_chars: usize,
    #[serde(default = "default_highlight_open")]
    pub highlight_open: String,
    #[serde(default = "default_highlight_close")]
    pub highlight_close: String,
    #[serde(default)]
    pub depth_signal: DepthSignal,
    /// Pixels per nesting level when `depth_signal` is `width`
    #[serde(default = "default_indent_unit")]
    pub indent_unit: u32,
}

fn default_prefs_key_prefix() -> String { "prefs:".to_string() }
fn default_saved_key() -> String { "savedJobs".to_string() }
fn default_item_url_base() -> String { "https://news.ycombinator.com/item?id=".to_string() }
fn default_preview_chars() -> usize { 200 }
fn default_highlight_open() -> String { r#"<span class="hnf-highlight">"#.to_string() }
fn default_highlight_close() -> String { "</span>".to_string() }
fn default_indent_unit() -> u32 { 40 }

impl Default for LensConfig {
    fn default() -> Self {
        Self {
            prefs_key_prefix: default_prefs_key_prefix(),
            saved_key: default_saved_key(),
            item_url_base: default_item_url_base(),
            preview_chars: default_preview_chars(),
            highlight_open: default_highlight_open(),
            highlight_close: default_highlight_close(),
            depth_signal: DepthSignal::default(),
            indent_unit: default_indent_unit(),
        }
    }
}

impl LensConfig {
    /// Storage key for one thread's filter preferences
    pub fn prefs_key(&self, thread_id: &str) -> String {
        format!("{}{}", self.prefs_key_prefix, thread_id)
    }

    /// Canonical url for a post id
    pub fn item_url(&self, post_id: &str) -> String {
        format!("{}{}", self.item_url_base, post_id)
    }

    /// Depth provider matching the configured signal
    pub fn depth_provider(&self) -> Box<dyn DepthProvider> {
        match self.depth_signal {
            DepthSignal::Level => Box::new(IndentLevel),
            DepthSignal::Width => Box::new(IndentWidth::new(self.indent_unit)),
        }
    }
}

impl From<&LensConfig> for MarkerStyle {
    fn from(config: &LensConfig) -> Self {
        Self {
            open: config.highlight_open.clone(),
            close: config.highlight_close.clone(),
        }
    }
}
