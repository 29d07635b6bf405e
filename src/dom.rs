/// Thin views over the DOM used by the blur engine
///
/// The selector generator, the applicator and the selection session only
/// talk to the page through these traits. `web_sys` types implement them for
/// the real browser; tests use the in-memory fakes below.
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, Node};

use crate::bridge::describe;
use crate::error::{BlurError, Result};

/// Read-only view of one element.
pub trait ElementView {
    /// Tag name as the DOM reports it (uppercase for HTML documents).
    fn tag(&self) -> String;
    fn element_id(&self) -> String;
    /// Raw `class` attribute, empty when absent.
    fn class_attr(&self) -> String;
    fn attr(&self, name: &str) -> Option<String>;
    fn parent_tag(&self) -> Option<String>;
    /// 1-based position among the parent's element children.
    fn child_position(&self) -> Option<usize>;
    fn text(&self) -> String;
}

/// Page-wide selector evaluation.
pub trait SelectorQuery {
    /// Number of elements `selector` resolves to, `None` if it cannot be evaluated.
    fn count_matches(&self, selector: &str) -> Option<usize>;
}

/// Owner of injected `<style>` nodes.
pub trait StyleHost {
    /// Remove every style node carrying `marker`; returns how many were removed.
    fn remove_styles(&self, marker: &str) -> usize;
    fn insert_style(&self, marker: &str, css: &str) -> Result<()>;
}

impl ElementView for Element {
    fn tag(&self) -> String {
        self.tag_name()
    }

    fn element_id(&self) -> String {
        self.id()
    }

    // SVG elements expose `className` as an object; the attribute is always a string
    fn class_attr(&self) -> String {
        self.get_attribute("class").unwrap_or_default()
    }

    fn attr(&self, name: &str) -> Option<String> {
        self.get_attribute(name)
    }

    fn parent_tag(&self) -> Option<String> {
        self.parent_element().map(|parent| parent.tag_name())
    }

    fn child_position(&self) -> Option<usize> {
        let parent = self.parent_element()?;
        let children = parent.children();
        (0..children.length())
            .find(|&i| children.item(i).as_ref() == Some(self))
            .map(|i| i as usize + 1)
    }

    fn text(&self) -> String {
        self.text_content().unwrap_or_default()
    }
}

impl SelectorQuery for Document {
    fn count_matches(&self, selector: &str) -> Option<usize> {
        self.query_selector_all(selector)
            .ok()
            .map(|list| list.length() as usize)
    }
}

impl StyleHost for Document {
    fn remove_styles(&self, marker: &str) -> usize {
        let Ok(nodes) = self.query_selector_all(&format!("style[{}]", marker)) else {
            return 0;
        };

        let mut removed = 0;
        for i in 0..nodes.length() {
            if let Some(element) = nodes.item(i).and_then(|n| n.dyn_into::<Element>().ok()) {
                element.remove();
                removed += 1;
            }
        }
        removed
    }

    fn insert_style(&self, marker: &str, css: &str) -> Result<()> {
        let style = self
            .create_element("style")
            .map_err(|e| BlurError::dom(describe(&e)))?;
        style
            .set_attribute(marker, "true")
            .map_err(|e| BlurError::dom(describe(&e)))?;
        style.set_text_content(Some(css));

        let parent: Node = match self.head() {
            Some(head) => head.into(),
            None => self
                .document_element()
                .ok_or_else(|| BlurError::dom("document has no root element"))?
                .into(),
        };

        parent
            .append_child(&style)
            .map(|_| ())
            .map_err(|e| BlurError::dom(describe(&e)))
    }
}
