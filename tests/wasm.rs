//! Browser-side smoke tests for the JS surface
//!
//! Run with `wasm-pack test --headless --chrome`.

#![cfg(target_arch = "wasm32")]

use js_sys::{Array, Object, Reflect};
use threadlens::wasm::ThreadLensHandle;
use wasm_bindgen::JsValue;
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

fn post(id: &str, indent: &str, text: &str) -> JsValue {
    let obj = Object::new();
    Reflect::set(&obj, &"id".into(), &id.into()).unwrap();
    Reflect::set(&obj, &"indent".into(), &indent.into()).unwrap();
    Reflect::set(&obj, &"text".into(), &text.into()).unwrap();
    obj.into()
}

fn field(value: &JsValue, name: &str) -> JsValue {
    Reflect::get(value, &name.into()).unwrap()
}

fn example_lens() -> ThreadLensHandle {
    let mut lens = ThreadLensHandle::new("40000001", JsValue::NULL).unwrap();
    let posts = Array::new();
    posts.push(&post("t1", "0", "Remote, Go, Senior, $150k"));
    posts.push(&post("c1", "1", "reply to t1"));
    posts.push(&post("t2", "0", "Onsite NYC, Python, Junior"));
    assert_eq!(lens.reindex(posts.into()).unwrap(), 3);
    lens
}

#[wasm_bindgen_test]
fn resolve_returns_summary_and_visible_ids() {
    let mut lens = example_lens();
    let filter = Object::new();
    Reflect::set(&filter, &"remote".into(), &JsValue::TRUE).unwrap();

    let result = lens.resolve(filter.into()).unwrap();
    assert_eq!(field(&result, "summary").as_string().unwrap(), "1/2 match");

    let visible = Array::from(&field(&result, "visible"));
    assert_eq!(visible.length(), 2);
    assert!(lens.is_visible("c1"));
    assert!(!lens.is_visible("t2"));
}

#[wasm_bindgen_test]
fn highlights_use_utf16_offsets() {
    let mut lens = ThreadLensHandle::new("1", JsValue::NULL).unwrap();
    let posts = Array::new();
    posts.push(&post("t1", "0", "café remote"));
    lens.reindex(posts.into()).unwrap();

    let filter = Object::new();
    Reflect::set(&filter, &"qInclude".into(), &"remote".into()).unwrap();
    lens.resolve(filter.into()).unwrap();

    let spans = Array::from(&lens.highlights("t1"));
    assert_eq!(spans.length(), 1);
    assert_eq!(field(&spans.get(0), "start").as_f64(), Some(5.0));
}

#[wasm_bindgen_test]
fn empty_export_is_informational() {
    let mut lens = example_lens();
    let filter = Object::new();
    Reflect::set(&filter, &"qInclude".into(), &"nothing-matches".into()).unwrap();
    lens.resolve(filter.into()).unwrap();

    let outcome = lens.export_csv();
    assert_eq!(field(&outcome, "status").as_string().unwrap(), "empty");
}
