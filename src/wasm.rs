//! WASM bindings for the host page
//!
//! - `ThreadLensHandle`: one thread's index, resolve, highlights, exports
//! - `SavedItemsHandle`: the saved-item store, shared by every renderer
//! - `JsStorage`: host object `{ read(key), write(key, value) }` used as the
//!   storage backend. `read` must answer synchronously (the host keeps a
//!   mirror of its async storage); `write` may return a Promise.
//!
//! Highlight offsets crossing this boundary are UTF-16 code units.

use serde::Serialize;
use std::collections::BTreeMap;
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;

use crate::config::LensConfig;
use crate::error::{LensError, Result};
use crate::lens::{
    FilterConfiguration, PrefsStore, RawPost, Resolution, SavedItems, SavedPost, SavedStore, StorageBackend,
    SubscriptionId, ThreadLens, Toggled,
};

// =============================================================================
// Conversions
// =============================================================================

/// Serialize with plain objects for maps so JS sees `{ id: record }`
fn to_js<T: Serialize + ?Sized>(value: &T, context: &str) -> JsValue {
    let serializer = serde_wasm_bindgen::Serializer::json_compatible();
    match value.serialize(&serializer) {
        Ok(v) => v,
        Err(e) => {
            web_sys::console::error_1(&format!("[ThreadLens] {} serialization failed: {:?}", context, e).into());
            JsValue::NULL
        }
    }
}

/// Decode a host value; `null`/`undefined` yields the default
fn from_js<T: serde::de::DeserializeOwned + Default>(value: JsValue, what: &str) -> std::result::Result<T, JsValue> {
    if value.is_null() || value.is_undefined() {
        return Ok(T::default());
    }
    serde_wasm_bindgen::from_value(value).map_err(|e| JsValue::from_str(&format!("Failed to parse {}: {}", what, e)))
}

fn js_err(e: LensError) -> JsValue {
    JsValue::from_str(&e.to_string())
}

// =============================================================================
// Storage
// =============================================================================

#[wasm_bindgen]
extern "C" {
    /// Host key-value storage
    pub type JsStorage;

    #[wasm_bindgen(method, catch)]
    fn read(this: &JsStorage, key: &str) -> std::result::Result<JsValue, JsValue>;

    #[wasm_bindgen(method, catch)]
    fn write(this: &JsStorage, key: &str, value: JsValue) -> std::result::Result<JsValue, JsValue>;
}

/// `StorageBackend` over a host `JsStorage` object
pub struct JsStorageBackend {
    storage: JsStorage,
}

impl JsStorageBackend {
    pub fn new(storage: JsStorage) -> Self {
        Self { storage }
    }
}

impl StorageBackend for JsStorageBackend {
    fn read(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let value = self
            .storage
            .read(key)
            .map_err(|e| LensError::Storage(format!("read {}: {:?}", key, e)))?;
        if value.is_null() || value.is_undefined() {
            return Ok(None);
        }
        serde_wasm_bindgen::from_value(value)
            .map(Some)
            .map_err(|e| LensError::InvalidInput(e.to_string()))
    }

    fn write(&self, key: &str, value: serde_json::Value) -> Result<()> {
        let js_value = value
            .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
            .map_err(|e| LensError::InvalidInput(e.to_string()))?;
        let returned = self
            .storage
            .write(key, js_value)
            .map_err(|e| LensError::Storage(format!("write {}: {:?}", key, e)))?;

        // Async hosts: completion is not awaited by the engine
        if let Ok(promise) = returned.dyn_into::<js_sys::Promise>() {
            let key = key.to_string();
            wasm_bindgen_futures::spawn_local(async move {
                if let Err(e) = JsFuture::from(promise).await {
                    web_sys::console::error_1(&format!("[ThreadLens] write {} rejected: {:?}", key, e).into());
                }
            });
        }
        Ok(())
    }
}

// =============================================================================
// ThreadLensHandle
// =============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsSpan {
    start: usize,
    end: usize,
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ResolveView<'a> {
    #[serde(flatten)]
    resolution: &'a Resolution,
    /// Visible post id -> spans (UTF-16 offsets)
    highlights: BTreeMap<&'a str, Vec<JsSpan>>,
}

#[wasm_bindgen]
pub struct ThreadLensHandle {
    lens: ThreadLens,
    prefs: Option<PrefsStore>,
}

#[wasm_bindgen]
impl ThreadLensHandle {
    #[wasm_bindgen(constructor)]
    pub fn new(thread_id: &str, config: JsValue) -> std::result::Result<ThreadLensHandle, JsValue> {
        let config: LensConfig = from_js(config, "config")?;
        Ok(Self { lens: ThreadLens::new(thread_id, config), prefs: None })
    }

    /// Persist filter preferences to `storage` under this thread's key
    #[wasm_bindgen(js_name = attachStorage)]
    pub fn attach_storage(&mut self, storage: JsStorage) {
        let backend: Rc<dyn StorageBackend> = Rc::new(JsStorageBackend::new(storage));
        self.prefs = Some(PrefsStore::new(backend, self.lens.config(), self.lens.thread_id()));
    }

    /// Stored preferences merged over defaults (defaults without storage)
    #[wasm_bindgen(js_name = loadPrefs)]
    pub fn load_prefs(&self) -> JsValue {
        let filter = self.prefs.as_ref().map(PrefsStore::load).unwrap_or_default();
        to_js(&filter, "filter")
    }

    /// Rebuild the index from `[{ id, text, indent, author, age }]`
    pub fn reindex(&mut self, posts: JsValue) -> std::result::Result<usize, JsValue> {
        let posts: Vec<RawPost> = from_js(posts, "posts")?;
        Ok(self.lens.reindex(&posts))
    }

    /// Resolve with a filter snapshot, persisting it when storage is attached
    pub fn resolve(&mut self, filter: JsValue) -> std::result::Result<JsValue, JsValue> {
        let filter: FilterConfiguration = from_js(filter, "filter")?;
        self.persist(&filter);
        self.lens.resolve(filter);
        Ok(self.resolve_view())
    }

    /// Reset every control and resolve
    #[wasm_bindgen(js_name = clearFilter)]
    pub fn clear_filter(&mut self) -> JsValue {
        self.persist(&FilterConfiguration::default());
        self.lens.clear_filter();
        self.resolve_view()
    }

    #[wasm_bindgen(js_name = isVisible)]
    pub fn is_visible(&self, id: &str) -> bool {
        self.lens.is_visible(id)
    }

    pub fn highlights(&self, id: &str) -> JsValue {
        let spans = match self.lens.index().get(id) {
            Some(post) => utf16_spans(&self.lens, id, &post.text),
            None => Vec::new(),
        };
        to_js(&spans, "highlights")
    }

    #[wasm_bindgen(js_name = renderHighlighted)]
    pub fn render_highlighted(&self, id: &str) -> Option<String> {
        self.lens.render_highlighted(id)
    }

    pub fn rehighlight(&self, markup: &str) -> String {
        self.lens.rehighlight(markup)
    }

    #[wasm_bindgen(js_name = onSummary)]
    pub fn on_summary(&mut self, callback: js_sys::Function) {
        self.lens.on_summary(Box::new(move |summary| {
            if let Err(e) = callback.call1(&JsValue::NULL, &JsValue::from_str(summary)) {
                web_sys::console::error_1(&e);
            }
        }));
    }

    #[wasm_bindgen(js_name = describeActive)]
    pub fn describe_active(&self) -> JsValue {
        to_js(&self.lens.describe_active(), "active filters")
    }

    #[wasm_bindgen(js_name = activeReport)]
    pub fn active_report(&self) -> String {
        self.lens.filter().active_report()
    }

    #[wasm_bindgen(js_name = exportContacts)]
    pub fn export_contacts(&self) -> JsValue {
        to_js(&self.lens.export_contacts(), "contacts")
    }

    #[wasm_bindgen(js_name = exportCsv)]
    pub fn export_csv(&self) -> JsValue {
        to_js(&self.lens.export_csv(), "csv")
    }

    #[wasm_bindgen(js_name = postCount)]
    pub fn post_count(&self) -> usize {
        self.lens.index().len()
    }

    #[wasm_bindgen(js_name = indexMicros)]
    pub fn index_micros(&self) -> f64 {
        self.lens.index_us() as f64
    }

    /// Last failed preferences write, cleared on read
    #[wasm_bindgen(js_name = takeStorageError)]
    pub fn take_storage_error(&mut self) -> Option<String> {
        self.prefs.as_ref().and_then(PrefsStore::take_error)
    }
}

impl ThreadLensHandle {
    fn persist(&self, filter: &FilterConfiguration) {
        if let Some(prefs) = &self.prefs {
            if let Err(e) = prefs.save(filter) {
                web_sys::console::error_1(&format!("[ThreadLens] {}", e).into());
            }
        }
    }

    fn resolve_view(&self) -> JsValue {
        let Some(resolution) = self.lens.last_resolution() else {
            return JsValue::NULL;
        };
        let highlights = if self.lens.filter().highlight_terms().is_empty() {
            BTreeMap::new()
        } else {
            resolution
                .visible_posts(self.lens.index())
                .map(|post| (post.id.as_str(), utf16_spans(&self.lens, &post.id, &post.text)))
                .filter(|(_, spans)| !spans.is_empty())
                .collect()
        };
        to_js(&ResolveView { resolution, highlights }, "resolution")
    }
}

fn utf16_spans(lens: &ThreadLens, id: &str, text: &str) -> Vec<JsSpan> {
    lens.highlights(id)
        .into_iter()
        .map(|span| {
            let (start, end) = span.utf16_range(text);
            JsSpan { start, end, text: span.text }
        })
        .collect()
}

// =============================================================================
// SavedItemsHandle
// =============================================================================

#[wasm_bindgen]
pub struct SavedItemsHandle {
    store: SavedStore,
    preview_chars: usize,
}

#[wasm_bindgen]
impl SavedItemsHandle {
    /// Open the store, reading the current record from `storage`
    #[wasm_bindgen(constructor)]
    pub fn new(storage: JsStorage, config: JsValue) -> std::result::Result<SavedItemsHandle, JsValue> {
        let config: LensConfig = from_js(config, "config")?;
        let store = SavedStore::open(Rc::new(JsStorageBackend::new(storage)), &config);
        Ok(Self { store, preview_chars: config.preview_chars })
    }

    /// Replace contents after a storage change made elsewhere
    ///
    /// Records are decoded one by one; unreadable ones are kept verbatim.
    pub fn hydrate(&mut self, items: JsValue) -> std::result::Result<(), JsValue> {
        let items: serde_json::Value = from_js(items, "saved items")?;
        self.store.hydrate_value(items);
        Ok(())
    }

    /// Save or unsave `{ id, author, age, body, url }`; true when now saved
    pub fn toggle(&mut self, post: JsValue) -> std::result::Result<bool, JsValue> {
        let post: SavedPost = from_js(post, "post")?;
        if post.id.is_empty() {
            return Err(js_err(LensError::InvalidInput("post id is empty".into())));
        }
        Ok(self.store.toggle(&post) == Toggled::Saved)
    }

    #[wasm_bindgen(js_name = setApplied)]
    pub fn set_applied(&mut self, id: &str, applied: bool) -> bool {
        self.store.set_applied(id, applied)
    }

    pub fn remove(&mut self, id: &str) -> bool {
        self.store.remove(id)
    }

    pub fn clear(&mut self) {
        self.store.clear();
    }

    pub fn count(&self) -> usize {
        self.store.count()
    }

    #[wasm_bindgen(js_name = isSaved)]
    pub fn is_saved(&self, id: &str) -> bool {
        self.store.is_saved(id)
    }

    /// `{ count, unapplied, applied }`, newest first
    pub fn view(&self) -> JsValue {
        to_js(&self.store.view(self.preview_chars), "saved view")
    }

    #[wasm_bindgen(js_name = exportCsv)]
    pub fn export_csv(&self) -> JsValue {
        let outcome = crate::lens::export_saved_csv(self.store.items().values(), chrono::Utc::now());
        to_js(&outcome, "saved csv")
    }

    /// Call `callback(items)` after every change; returns an unsubscribe id
    pub fn subscribe(&mut self, callback: js_sys::Function) -> f64 {
        let id = self.store.subscribe(Box::new(move |items: &SavedItems| {
            let snapshot = to_js(items, "saved items");
            if let Err(e) = callback.call1(&JsValue::NULL, &snapshot) {
                web_sys::console::error_1(&e);
            }
        }));
        id.0 as f64
    }

    pub fn unsubscribe(&mut self, id: f64) -> bool {
        self.store.unsubscribe(SubscriptionId(id as u64))
    }

    /// Last persistence failure, cleared on read
    #[wasm_bindgen(js_name = takeStorageError)]
    pub fn take_storage_error(&mut self) -> Option<String> {
        self.store.take_storage_error().map(|e| e.to_string())
    }
}
