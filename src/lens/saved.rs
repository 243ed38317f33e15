//! SavedStore: persistent collection of saved posts
//!
//! Keyed by post id and independent of the current thread: a record stays
//! saved whether or not its post is visible or even present.
//!
//! Every mutation updates memory first, then publishes the new snapshot to
//! all subscribers (inline panel, side panel, ...), then hands the snapshot
//! to the storage backend. Renderers never share the map or poll it.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::rc::Rc;
use unicode_segmentation::UnicodeSegmentation;

use crate::config::LensConfig;
use crate::error::LensError;
use crate::lens::index::Post;
use crate::lens::persist::StorageBackend;

// =============================================================================
// Types
// =============================================================================

/// Snapshot of a saved post
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SavedRecord {
    /// Falls back to the map key when absent
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub age: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub url: String,
    /// Set once, on insertion. RFC 3339 text or epoch milliseconds on read
    #[serde(default, deserialize_with = "saved_at_compat")]
    pub saved_at: DateTime<Utc>,
    #[serde(default)]
    pub applied: bool,
}

fn saved_at_compat<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Stamp {
        Text(String),
        Millis(f64),
    }

    match Stamp::deserialize(deserializer)? {
        Stamp::Text(text) => DateTime::parse_from_rfc3339(&text)
            .map(|t| t.with_timezone(&Utc))
            .map_err(serde::de::Error::custom),
        Stamp::Millis(ms) => Utc
            .timestamp_millis_opt(ms as i64)
            .single()
            .ok_or_else(|| serde::de::Error::custom(format!("savedAt out of range: {}", ms))),
    }
}

/// What the host hands over when the user saves a post
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SavedPost {
    pub id: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub age: String,
    #[serde(default)]
    pub body: String,
    /// Empty means "derive from the id"
    #[serde(default)]
    pub url: String,
}

impl From<&Post> for SavedPost {
    fn from(post: &Post) -> Self {
        Self {
            id: post.id.clone(),
            author: post.author.clone(),
            age: post.age.clone(),
            body: post.text.clone(),
            url: String::new(),
        }
    }
}

/// Whole-store snapshot, ordered by id
pub type SavedItems = BTreeMap<String, SavedRecord>;

/// Result of a toggle
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Toggled {
    Saved,
    Removed,
}

pub type Subscriber = Box<dyn FnMut(&SavedItems)>;

/// Handle returned by `subscribe`; the raw value is stable for the store's lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// One row of a renderer's list
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SavedEntry {
    pub id: String,
    pub author: String,
    pub age: String,
    pub preview: String,
    pub url: String,
    pub saved_at: DateTime<Utc>,
    pub applied: bool,
}

/// Renderer view model: newest first, split by applied status
#[derive(Serialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SavedView {
    pub count: usize,
    pub unapplied: Vec<SavedEntry>,
    pub applied: Vec<SavedEntry>,
}

// =============================================================================
// SavedStore
// =============================================================================

pub struct SavedStore {
    items: SavedItems,
    backend: Rc<dyn StorageBackend>,
    key: String,
    item_url_base: String,
    subscribers: Vec<(SubscriptionId, Subscriber)>,
    next_subscription: u64,
    last_error: Option<LensError>,
    /// Stored entries that failed to decode, written back untouched
    unreadable: Map<String, Value>,
    /// Set when the stored record could not be read at all
    writes_suspended: bool,
}

impl SavedStore {
    /// Empty store writing to `backend` under `config.saved_key`
    pub fn new(backend: Rc<dyn StorageBackend>, config: &LensConfig) -> Self {
        Self {
            items: SavedItems::new(),
            backend,
            key: config.saved_key.clone(),
            item_url_base: config.item_url_base.clone(),
            subscribers: Vec::new(),
            next_subscription: 0,
            last_error: None,
            unreadable: Map::new(),
            writes_suspended: false,
        }
    }

    /// Store populated from the backend's current record
    ///
    /// Records are decoded one by one. Entries that fail to decode are kept
    /// aside and written back verbatim. If the record cannot be read at all,
    /// the session starts empty and writes stay suspended until `hydrate` or
    /// `clear`, so storage is never overwritten with a partial view.
    pub fn open(backend: Rc<dyn StorageBackend>, config: &LensConfig) -> Self {
        let mut store = Self::new(backend, config);
        match store.backend.read(&store.key) {
            Ok(Some(value)) => store.load(value),
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(key = %store.key, error = %e, "saved items unreadable, writes suspended");
                store.writes_suspended = true;
                store.last_error = Some(e);
            }
        }
        store
    }

    fn load(&mut self, value: Value) {
        self.items.clear();
        self.unreadable.clear();
        self.writes_suspended = false;
        if value.is_null() {
            return;
        }

        let entries = match serde_json::from_value::<Map<String, Value>>(value) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(key = %self.key, error = %e, "saved items malformed, writes suspended");
                self.writes_suspended = true;
                self.last_error = Some(e.into());
                return;
            }
        };

        for (id, raw) in entries {
            match serde_json::from_value::<SavedRecord>(raw.clone()) {
                Ok(mut record) => {
                    if record.id.is_empty() {
                        record.id = id.clone();
                    }
                    self.items.insert(id, record);
                }
                Err(e) => {
                    tracing::warn!(id = %id, error = %e, "skipping undecodable saved item");
                    self.unreadable.insert(id, raw);
                }
            }
        }
    }

    // -------------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------------

    pub fn count(&self) -> usize {
        self.items.len()
    }

    pub fn is_saved(&self, id: &str) -> bool {
        self.items.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&SavedRecord> {
        self.items.get(id)
    }

    pub fn items(&self) -> &SavedItems {
        &self.items
    }

    /// Records newest first (ties broken by id)
    pub fn newest_first(&self) -> Vec<&SavedRecord> {
        let mut records: Vec<&SavedRecord> = self.items.values().collect();
        records.sort_by(|a, b| b.saved_at.cmp(&a.saved_at).then_with(|| a.id.cmp(&b.id)));
        records
    }

    /// View model with body previews cut to `preview_chars` characters
    pub fn view(&self, preview_chars: usize) -> SavedView {
        let mut view = SavedView { count: self.count(), ..SavedView::default() };
        for record in self.newest_first() {
            let entry = SavedEntry {
                id: record.id.clone(),
                author: record.author.clone(),
                age: record.age.clone(),
                preview: truncate(&record.body, preview_chars),
                url: record.url.clone(),
                saved_at: record.saved_at,
                applied: record.applied,
            };
            if record.applied {
                view.applied.push(entry);
            } else {
                view.unapplied.push(entry);
            }
        }
        view
    }

    /// Stored entries that could not be decoded this session
    pub fn unreadable_count(&self) -> usize {
        self.unreadable.len()
    }

    pub fn writes_suspended(&self) -> bool {
        self.writes_suspended
    }

    /// Most recent storage failure, if any
    pub fn last_storage_error(&self) -> Option<&LensError> {
        self.last_error.as_ref()
    }

    pub fn take_storage_error(&mut self) -> Option<LensError> {
        self.last_error.take()
    }

    // -------------------------------------------------------------------------
    // Mutations
    // -------------------------------------------------------------------------

    /// Save `post` if absent, otherwise remove it
    pub fn toggle(&mut self, post: &SavedPost) -> Toggled {
        self.toggle_at(post, Utc::now())
    }

    /// `toggle` with an explicit insertion time
    pub fn toggle_at(&mut self, post: &SavedPost, now: DateTime<Utc>) -> Toggled {
        self.unreadable.remove(&post.id);
        let outcome = if self.items.remove(&post.id).is_some() {
            Toggled::Removed
        } else {
            let url = if post.url.is_empty() {
                format!("{}{}", self.item_url_base, post.id)
            } else {
                post.url.clone()
            };
            self.items.insert(
                post.id.clone(),
                SavedRecord {
                    id: post.id.clone(),
                    author: post.author.clone(),
                    age: post.age.clone(),
                    body: post.body.clone(),
                    url,
                    saved_at: now,
                    applied: false,
                },
            );
            Toggled::Saved
        };
        tracing::debug!(id = %post.id, ?outcome, "saved item toggled");
        self.commit();
        outcome
    }

    /// Set the applied flag; returns false (and does nothing) for unknown ids
    pub fn set_applied(&mut self, id: &str, applied: bool) -> bool {
        match self.items.get_mut(id) {
            Some(record) => {
                record.applied = applied;
                self.commit();
                true
            }
            None => false,
        }
    }

    /// Remove one record; returns false for unknown ids
    pub fn remove(&mut self, id: &str) -> bool {
        let dropped = self.unreadable.remove(id).is_some();
        if self.items.remove(id).is_none() && !dropped {
            return false;
        }
        self.commit();
        true
    }

    /// Empty the store and overwrite storage, unreadable entries included
    pub fn clear(&mut self) {
        self.items.clear();
        self.unreadable.clear();
        self.writes_suspended = false;
        self.commit();
    }

    /// Replace contents from storage (startup read or a change made in
    /// another context). Subscribers are notified; nothing is written back.
    pub fn hydrate(&mut self, items: SavedItems) {
        self.items = items;
        self.unreadable.clear();
        self.writes_suspended = false;
        self.notify();
    }

    /// `hydrate` from a raw stored value, decoding record by record
    pub fn hydrate_value(&mut self, value: Value) {
        self.load(value);
        self.notify();
    }

    // -------------------------------------------------------------------------
    // Subscriptions
    // -------------------------------------------------------------------------

    pub fn subscribe(&mut self, subscriber: Subscriber) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.subscribers.push((id, subscriber));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sid, _)| *sid != id);
        self.subscribers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    fn notify(&mut self) {
        for (_, subscriber) in self.subscribers.iter_mut() {
            subscriber(&self.items);
        }
    }

    fn commit(&mut self) {
        self.notify();

        if self.writes_suspended {
            self.last_error = Some(LensError::Storage(format!(
                "{} was not loaded; refusing to overwrite it",
                self.key
            )));
            return;
        }

        let mut value = match serde_json::to_value(&self.items) {
            Ok(v) => v,
            Err(e) => {
                self.last_error = Some(e.into());
                return;
            }
        };
        if let Value::Object(entries) = &mut value {
            for (id, raw) in &self.unreadable {
                entries.entry(id.clone()).or_insert_with(|| raw.clone());
            }
        }
        match self.backend.write(&self.key, value) {
            Ok(()) => self.last_error = None,
            Err(e) => {
                tracing::warn!(key = %self.key, error = %e, "saved items write failed; memory remains authoritative");
                self.last_error = Some(e);
            }
        }
    }
}

/// First `max` grapheme clusters of `text`, with "..." when cut
fn truncate(text: &str, max: usize) -> String {
    let mut graphemes = text.grapheme_indices(true);
    match graphemes.nth(max) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lens::persist::MemoryBackend;
    use crate::error::Result;
    use chrono::TimeZone;
    use serde_json::Value;
    use std::cell::RefCell;

    fn post(id: &str) -> SavedPost {
        SavedPost {
            id: id.to_string(),
            author: "acme".into(),
            age: "2 hours ago".into(),
            body: format!("Body of {}", id),
            url: String::new(),
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn store() -> (Rc<MemoryBackend>, SavedStore) {
        let backend = Rc::new(MemoryBackend::new());
        let store = SavedStore::new(backend.clone(), &LensConfig::default());
        (backend, store)
    }

    struct BrokenBackend;

    impl StorageBackend for BrokenBackend {
        fn read(&self, _key: &str) -> Result<Option<Value>> {
            Ok(None)
        }
        fn write(&self, _key: &str, _value: Value) -> Result<()> {
            Err(LensError::Storage("offline".into()))
        }
    }

    // -------------------------------------------------------------------------
    // Requirement 1: toggle inserts, then removes
    // -------------------------------------------------------------------------
    #[test]
    fn test_toggle_is_self_inverse() {
        let (_, mut store) = store();
        store.toggle_at(&post("a"), at(0));
        let before = store.items().clone();

        assert_eq!(store.toggle_at(&post("b"), at(10)), Toggled::Saved);
        assert_eq!(store.toggle_at(&post("b"), at(20)), Toggled::Removed);
        assert_eq!(store.items(), &before);
    }

    #[test]
    fn test_toggle_derives_url_and_snapshots_fields() {
        let (_, mut store) = store();
        store.toggle_at(&post("42"), at(0));
        let record = store.get("42").unwrap();
        assert_eq!(record.url, "https://news.ycombinator.com/item?id=42");
        assert_eq!(record.author, "acme");
        assert_eq!(record.saved_at, at(0));
        assert!(!record.applied);

        let mut explicit = post("43");
        explicit.url = "https://example.com/43".into();
        store.toggle_at(&explicit, at(1));
        assert_eq!(store.get("43").unwrap().url, "https://example.com/43");
    }

    // -------------------------------------------------------------------------
    // Requirement 2: set_applied mutates existing records only
    // -------------------------------------------------------------------------
    #[test]
    fn test_set_applied() {
        let (backend, mut store) = store();
        store.toggle_at(&post("a"), at(0));
        let writes = backend.write_count();

        assert!(store.set_applied("a", true));
        assert!(store.get("a").unwrap().applied);
        assert!(!store.set_applied("missing", true));
        assert_eq!(backend.write_count(), writes + 1);
        assert_eq!(store.count(), 1);
    }

    #[test]
    fn test_clear_and_remove() {
        let (backend, mut store) = store();
        store.toggle_at(&post("a"), at(0));
        store.toggle_at(&post("b"), at(1));

        assert!(store.remove("a"));
        assert!(!store.remove("a"));
        assert_eq!(store.count(), 1);

        store.clear();
        assert_eq!(store.count(), 0);
        assert_eq!(backend.snapshot("savedJobs"), Some(serde_json::json!({})));
    }

    // -------------------------------------------------------------------------
    // Requirement 3: every mutation persists and notifies all subscribers
    // -------------------------------------------------------------------------
    #[test]
    fn test_two_renderers_see_same_snapshot() {
        let (backend, mut store) = store();
        let inline: Rc<RefCell<Vec<usize>>> = Rc::default();
        let panel: Rc<RefCell<Vec<usize>>> = Rc::default();

        let sink = inline.clone();
        store.subscribe(Box::new(move |items| sink.borrow_mut().push(items.len())));
        let sink = panel.clone();
        let panel_id = store.subscribe(Box::new(move |items| sink.borrow_mut().push(items.len())));

        store.toggle_at(&post("a"), at(0));
        store.toggle_at(&post("b"), at(1));
        store.set_applied("a", true);

        assert_eq!(*inline.borrow(), vec![1, 2, 2]);
        assert_eq!(*panel.borrow(), vec![1, 2, 2]);
        assert_eq!(backend.write_count(), 3);

        assert!(store.unsubscribe(panel_id));
        store.clear();
        assert_eq!(inline.borrow().len(), 4);
        assert_eq!(panel.borrow().len(), 3);
    }

    #[test]
    fn test_persisted_shape_is_keyed_by_id() {
        let (backend, mut store) = store();
        store.toggle_at(&post("a"), at(0));
        let value = backend.snapshot("savedJobs").unwrap();
        assert_eq!(value["a"]["id"], "a");
        assert_eq!(value["a"]["applied"], false);
        assert!(value["a"]["savedAt"].is_string());
    }

    // -------------------------------------------------------------------------
    // Requirement 4: failed writes keep memory authoritative
    // -------------------------------------------------------------------------
    #[test]
    fn test_write_failure_keeps_memory_state() {
        let mut store = SavedStore::new(Rc::new(BrokenBackend), &LensConfig::default());
        assert_eq!(store.toggle_at(&post("a"), at(0)), Toggled::Saved);
        assert!(store.is_saved("a"));
        assert!(matches!(store.last_storage_error(), Some(LensError::Storage(_))));
        assert!(store.take_storage_error().is_some());
        assert!(store.last_storage_error().is_none());
    }

    #[test]
    fn test_open_reads_backend_and_hydrate_does_not_write() {
        let (backend, mut first) = store();
        first.toggle_at(&post("a"), at(0));
        let writes = backend.write_count();

        let mut second = SavedStore::open(backend.clone(), &LensConfig::default());
        assert!(second.is_saved("a"));

        let seen: Rc<RefCell<usize>> = Rc::default();
        let sink = seen.clone();
        second.subscribe(Box::new(move |items| *sink.borrow_mut() = items.len()));
        second.hydrate(SavedItems::new());
        assert_eq!(*seen.borrow(), 0);
        assert_eq!(backend.write_count(), writes);
    }

    #[test]
    fn test_open_with_malformed_record_starts_empty() {
        let backend = Rc::new(MemoryBackend::new());
        backend.write("savedJobs", serde_json::json!(["nope"])).unwrap();
        let mut store = SavedStore::open(backend.clone(), &LensConfig::default());
        assert_eq!(store.count(), 0);
        assert!(store.writes_suspended());
        assert!(matches!(store.last_storage_error(), Some(LensError::Serialization(_))));

        // Saving still works in memory but the stored value is left alone
        store.toggle_at(&post("a"), at(0));
        assert!(store.is_saved("a"));
        assert_eq!(backend.snapshot("savedJobs"), Some(serde_json::json!(["nope"])));
        assert!(matches!(store.last_storage_error(), Some(LensError::Storage(_))));

        store.clear();
        assert!(!store.writes_suspended());
        assert_eq!(backend.snapshot("savedJobs"), Some(serde_json::json!({})));
    }

    // -------------------------------------------------------------------------
    // Requirement 5: one bad record never costs the others
    // -------------------------------------------------------------------------
    #[test]
    fn test_open_decodes_record_by_record() {
        let backend = Rc::new(MemoryBackend::new());
        backend
            .write(
                "savedJobs",
                serde_json::json!({
                    "a": { "id": "a", "body": "kept", "savedAt": "2024-01-01T00:00:00Z" },
                    "b": { "body": "legacy", "savedAt": 1704067200000u64 },
                    "c": { "id": "c", "savedAt": "not a date" },
                }),
            )
            .unwrap();

        let mut store = SavedStore::open(backend.clone(), &LensConfig::default());
        assert_eq!(store.count(), 2);
        assert_eq!(store.get("b").unwrap().id, "b");
        assert_eq!(store.get("b").unwrap().saved_at, store.get("a").unwrap().saved_at);
        assert_eq!(store.unreadable_count(), 1);
        assert!(!store.writes_suspended());

        store.toggle_at(&post("new"), at(0));
        let persisted = backend.snapshot("savedJobs").unwrap();
        let keys: Vec<&str> = persisted.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["a", "b", "c", "new"]);
        assert_eq!(persisted["c"]["savedAt"], "not a date");
    }

    #[test]
    fn test_missing_saved_at_defaults_to_epoch() {
        let record: SavedRecord = serde_json::from_value(serde_json::json!({ "id": "x" })).unwrap();
        assert_eq!(record.saved_at, DateTime::<Utc>::default());
    }

    #[test]
    fn test_read_failure_suspends_writes() {
        struct Unreadable;
        impl StorageBackend for Unreadable {
            fn read(&self, _key: &str) -> Result<Option<Value>> {
                Err(LensError::Storage("locked".into()))
            }
            fn write(&self, _key: &str, _value: Value) -> Result<()> {
                panic!("must not overwrite an unread record");
            }
        }

        let mut store = SavedStore::open(Rc::new(Unreadable), &LensConfig::default());
        assert!(store.writes_suspended());
        store.toggle_at(&post("a"), at(0));
        assert!(store.is_saved("a"));

        store.hydrate_value(serde_json::json!({ "z": { "savedAt": 0 } }));
        assert!(!store.writes_suspended());
        assert!(store.is_saved("z"));
    }

    #[test]
    fn test_hydrate_null_empties_the_store() {
        let (backend, mut store) = store();
        store.toggle_at(&post("a"), at(0));

        store.hydrate_value(Value::Null);
        assert_eq!(store.count(), 0);
        assert!(!store.writes_suspended());

        store.toggle_at(&post("b"), at(1));
        let persisted = backend.snapshot("savedJobs").unwrap();
        assert_eq!(persisted.as_object().map(|m| m.len()), Some(1));
    }

    #[test]
    fn test_view_orders_and_partitions() {
        let (_, mut store) = store();
        store.toggle_at(&post("old"), at(0));
        store.toggle_at(&post("new"), at(100));
        store.toggle_at(&post("mid"), at(50));
        store.set_applied("mid", true);

        let view = store.view(200);
        assert_eq!(view.count, 3);
        let unapplied: Vec<_> = view.unapplied.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(unapplied, vec!["new", "old"]);
        assert_eq!(view.applied[0].id, "mid");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 200), "short");
        assert_eq!(truncate("abcdef", 3), "abc...");
        assert_eq!(truncate("abc", 3), "abc");
        assert_eq!(truncate("héllo wörld", 5), "héllo...");
    }
}
