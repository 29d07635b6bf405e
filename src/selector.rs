/// CSS selector generation for picked elements
use crate::dom::{ElementView, SelectorQuery};
use crate::session::{HIGHLIGHT_CLASS, SELECTED_CLASS, SELECTION_MODE_CLASS};

/// A class selector is only kept when it matches at most this many elements.
pub const MAX_CLASS_MATCHES: usize = 5;

const FALLBACK_TAG: &str = "div";

/// Produce a CSS selector that re-identifies `element` on a later visit.
///
/// Algorithm (first tier that yields something usable wins):
/// 1. `#id` when the element has an id
/// 2. `.a.b` from the cleaned class list, if it matches at most 5 elements
/// 3. `img[alt="..."]` / `img[src*="file"]` / `a[href*="segment"]`
/// 4. `parent > tag:nth-child(n)`
/// 5. the bare tag name
///
/// This is a heuristic. If the page changes between picking and replay the
/// selector may hit a different element, or none at all.
pub fn generate_selector<E, Q>(element: &E, page: &Q) -> String
where
    E: ElementView + ?Sized,
    Q: SelectorQuery + ?Sized,
{
    let tag = element.tag().to_lowercase();

    let id = element.element_id();
    if !id.trim().is_empty() {
        return format!("#{}", id.trim());
    }

    if let Some(selector) = class_selector(&element.class_attr()) {
        match page.count_matches(&selector) {
            Some(count) if count <= MAX_CLASS_MATCHES => return selector,
            _ => {}
        }
    }

    if let Some(selector) = tag_heuristic(&tag, element) {
        return selector;
    }

    if tag.is_empty() {
        return FALLBACK_TAG.to_string();
    }

    if let (Some(parent), Some(position)) = (element.parent_tag(), element.child_position()) {
        if !parent.is_empty() {
            return format!("{} > {}:nth-child({})", parent.to_lowercase(), tag, position);
        }
    }

    tag
}

/// Classes the picker itself puts on elements while a session runs.
const PICKER_CLASSES: [&str; 3] = [HIGHLIGHT_CLASS, SELECTED_CLASS, SELECTION_MODE_CLASS];

/// `.a.b` from a raw class attribute, skipping the picker's own marks and
/// tokens that would not survive as plain class selectors (`hover:bg-red`, `2xl`, ...).
fn class_selector(class_attr: &str) -> Option<String> {
    let classes: Vec<&str> = class_attr
        .split_whitespace()
        .filter(|cls| !PICKER_CLASSES.contains(cls))
        .filter(|cls| !cls.contains(':'))
        .filter(|cls| !cls.starts_with(|c: char| c.is_ascii_digit()))
        .collect();

    if classes.is_empty() {
        None
    } else {
        Some(format!(".{}", classes.join(".")))
    }
}

fn tag_heuristic<E: ElementView + ?Sized>(tag: &str, element: &E) -> Option<String> {
    match tag {
        "img" => {
            if let Some(alt) = non_empty_attr(element, "alt") {
                return Some(format!("img[alt=\"{}\"]", escape_attr(&alt)));
            }
            let src = non_empty_attr(element, "src")?;
            last_path_segment(&src).map(|file| format!("img[src*=\"{}\"]", escape_attr(file)))
        }
        "a" => {
            let href = non_empty_attr(element, "href")?;
            last_path_segment(&href).map(|segment| format!("a[href*=\"{}\"]", escape_attr(segment)))
        }
        _ => None,
    }
}

fn non_empty_attr<E: ElementView + ?Sized>(element: &E, name: &str) -> Option<String> {
    element.attr(name).filter(|value| !value.trim().is_empty())
}

/// Last `/`-separated segment of a url, without query string or fragment.
fn last_path_segment(url: &str) -> Option<&str> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/').next().filter(|segment| !segment.is_empty())
}

fn escape_attr(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
