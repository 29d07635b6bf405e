//! Browser tests against a real document.
//!
//! Run with `wasm-pack test --headless --chrome`.
#![cfg(target_arch = "wasm32")]

use chrono::Utc;
use wasm_bindgen::JsCast;
use wasm_bindgen_test::*;
use web_sys::{Document, Element};

use webblur::{BlurApplicator, ElementTarget, Rule, generate_selector, hostname_of};

wasm_bindgen_test_configure!(run_in_browser);

fn document() -> Document {
    web_sys::window().unwrap().document().unwrap()
}

fn mount(html: &str) -> Element {
    let document = document();
    let root = document.create_element("div").unwrap();
    root.set_inner_html(html);
    document.body().unwrap().append_child(&root).unwrap();
    root
}

fn blur_styles(document: &Document) -> u32 {
    document.query_selector_all("style[data-webblur]").unwrap().length()
}

#[wasm_bindgen_test]
fn apply_twice_leaves_one_stylesheet() {
    let document = document();
    let rule = Rule::from_selection(
        "Sidebar",
        "example.com",
        vec![ElementTarget::new("#sidebar".to_string(), "DIV", "")],
        Utc::now(),
    );
    let mut applicator = BlurApplicator::new();

    applicator.apply(&document, &[&rule], true, 3);
    let first = applicator.current_css().map(str::to_string);
    applicator.apply(&document, &[&rule], true, 3);

    assert_eq!(blur_styles(&document), 1);
    assert_eq!(applicator.current_css().map(str::to_string), first);
    let text = document
        .query_selector("style[data-webblur]")
        .unwrap()
        .and_then(|style| style.text_content())
        .unwrap_or_default();
    assert!(text.contains("#sidebar"));
    assert!(text.contains("blur(6px)"));

    applicator.apply(&document, &[&rule], false, 3);
    assert_eq!(blur_styles(&document), 0);
}

#[wasm_bindgen_test]
fn selector_prefers_id() {
    let root = mount(r#"<section><p id="ad-banner" class="promo">Buy now</p></section>"#);
    let element = root.query_selector("#ad-banner").unwrap().unwrap();

    assert_eq!(generate_selector(&element, &document()), "#ad-banner");
    root.remove();
}

#[wasm_bindgen_test]
fn selector_falls_back_to_nth_child() {
    let root = mount(r#"<ul class="feed"><li>one</li><li>two</li></ul>"#);
    let element = root.query_selector("li:nth-child(2)").unwrap().unwrap();

    let selector = generate_selector(&element, &document());
    assert_eq!(selector, "ul > li:nth-child(2)");
    assert_eq!(document().query_selector_all(&selector).unwrap().length(), 1);
    root.remove();
}

#[wasm_bindgen_test]
fn selector_ignores_hover_and_pick_marks() {
    let root = mount(r#"<ul><li>one</li><li>two</li></ul>"#);
    let items = root.query_selector_all("li").unwrap();

    let mut selectors = Vec::new();
    for i in 0..items.length() {
        let element: Element = items.item(i).unwrap().dyn_into().unwrap();
        element.class_list().add_2("webblur-highlight", "webblur-selected").unwrap();
        selectors.push(generate_selector(&element, &document()));
    }

    assert_eq!(selectors, vec!["ul > li:nth-child(1)", "ul > li:nth-child(2)"]);
    root.remove();
}

#[wasm_bindgen_test]
fn exported_hostname_of() {
    assert_eq!(hostname_of("https://News.Example.com/path"), "news.example.com");
}
