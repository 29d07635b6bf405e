/// Stylesheet synthesis and injection for matched rules
use std::fmt::Write;

use crate::dom::StyleHost;
use crate::rule_data::Rule;

/// Attribute that tags the stylesheet injected by the applicator.
pub const STYLE_MARKER: &str = "data-webblur";

/// What an `apply` call left on the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// No stylesheet is present (blur off, nothing matched, or injection failed).
    Cleared,
    /// A stylesheet is present; lists the ids of rules that contributed targets.
    Applied { used_rule_ids: Vec<String> },
}

impl ApplyOutcome {
    pub fn used_rule_ids(&self) -> &[String] {
        match self {
            ApplyOutcome::Cleared => &[],
            ApplyOutcome::Applied { used_rule_ids } => used_rule_ids,
        }
    }
}

/// Render the blur stylesheet for the given rules.
///
/// Every element target gets a base rule at `2 * intensity` px and a `:hover`
/// rule at half that, so the user can peek at the content.
pub fn render_blur_css(rules: &[&Rule], intensity: u8) -> String {
    let blur_px = u32::from(intensity) * 2;
    let hover_px = blur_px / 2;

    let mut css = String::new();
    for target in rules.iter().flat_map(|rule| rule.elements.iter()) {
        let _ = writeln!(
            css,
            "{sel} {{\n  filter: blur({blur_px}px) !important;\n  transition: filter 0.3s ease !important;\n}}\n{sel}:hover {{\n  filter: blur({hover_px}px) !important;\n}}",
            sel = target.selector,
        );
    }
    css
}

/// Owns the single injected stylesheet of a page.
///
/// Every call starts by removing whatever carries the marker, so applying the
/// same input twice leaves exactly one identical node behind.
#[derive(Debug, Default)]
pub struct BlurApplicator {
    current_css: Option<String>,
}

impl BlurApplicator {
    pub fn new() -> Self {
        BlurApplicator::default()
    }

    /// CSS of the stylesheet currently on the page, if any.
    pub fn current_css(&self) -> Option<&str> {
        self.current_css.as_deref()
    }

    pub fn apply<H: StyleHost + ?Sized>(
        &mut self,
        host: &H,
        matched: &[&Rule],
        blur_enabled: bool,
        intensity: u8,
    ) -> ApplyOutcome {
        host.remove_styles(STYLE_MARKER);
        self.current_css = None;

        if !blur_enabled || matched.is_empty() {
            return ApplyOutcome::Cleared;
        }

        let css = render_blur_css(matched, intensity);
        if css.is_empty() {
            return ApplyOutcome::Cleared;
        }

        if let Err(e) = host.insert_style(STYLE_MARKER, &css) {
            log::warn!("Could not inject blur stylesheet: {}", e);
            return ApplyOutcome::Cleared;
        }

        log::debug!("Applied {} blur rule(s)", matched.len());
        self.current_css = Some(css);

        ApplyOutcome::Applied {
            used_rule_ids: matched
                .iter()
                .filter(|rule| !rule.elements.is_empty())
                .map(|rule| rule.id.clone())
                .collect(),
        }
    }

    /// Remove the stylesheet regardless of settings.
    pub fn clear<H: StyleHost + ?Sized>(&mut self, host: &H) {
        host.remove_styles(STYLE_MARKER);
        self.current_css = None;
    }
}

/// The stylesheet `apply` would produce for this input, without touching the page.
pub fn expected_css(matched: &[&Rule], blur_enabled: bool, intensity: u8) -> Option<String> {
    if !blur_enabled {
        return None;
    }
    Some(render_blur_css(matched, intensity)).filter(|css| !css.is_empty())
}
