//! ThreadLens: Thread Classifier + Visibility Engine
//!
//! A Rust/WASM implementation of the hiring-thread lens: classify every post of
//! a threaded discussion, resolve which posts survive the active filters, and
//! keep a small saved-items collection in sync across renderers.
//!
//! # Architecture
//!
//! ## Engine Components
//! - `catalog.rs` - PatternCatalog: Binary flags + multi-valued facets (regex)
//! - `classify.rs` - Classifier: One post's text -> immutable `PostTags`
//! - `index.rs` - TreeIndexer: Document order + depth signal -> top ancestors
//! - `filter.rs` - FilterConfiguration: Immutable snapshot of the filter bar
//! - `resolve.rs` - VisibilityResolver: Ancestor-gated / contiguous-subtree policies
//! - `highlight.rs` - Highlighter: Idempotent include-term spans
//! - `saved.rs` - SavedStore: Persistent saved posts with subscriptions
//! - `persist.rs` - StorageBackend: Key-value persistence boundary
//! - `export.rs` - Contacts + CSV tables
//! - `engine.rs` - ThreadLens: Facade over one thread
//!
//! # Usage (WASM)
//! ```javascript,ignore
//! import init, { ThreadLensHandle } from 'threadlens';
//!
//! await init();
//!
//! const lens = new ThreadLensHandle('40000001', null);
//! lens.reindex([
//!   { id: 't1', indent: '0', text: 'Remote, Go, Senior, $150k', author: 'acme' },
//!   { id: 'c1', indent: '1', text: 'reply to t1' },
//! ]);
//!
//! const result = lens.resolve({ remote: true });
//! console.log(result.summary);   // "1/1 match"
//! console.log(result.visible);   // ["t1", "c1"]
//! ```

pub mod config;
pub mod error;
pub mod lens;
pub mod wasm;

// Public exports - Engine
pub use config::*;
pub use error::*;
pub use lens::*;

use wasm_bindgen::prelude::*;

// When the `wee_alloc` feature is enabled, use `wee_alloc` as the global
// allocator for smaller WASM bundle size.
#[cfg(feature = "wee_alloc")]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

/// Initialize panic hook for better error messages in browser console
#[wasm_bindgen(start)]
pub fn main() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Get version information
#[wasm_bindgen]
pub fn version() -> String {
    format!("threadlens v{}", env!("CARGO_PKG_VERSION"))
}
