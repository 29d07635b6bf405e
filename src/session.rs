/// Interactive element selection state machine
///
/// Inactive -> Selecting -> (Saving | cancelled) -> Inactive
///
/// The session owns the accumulated picks and the currently highlighted
/// element. Everything visible on the page (body flag, control panel, event
/// listeners, highlight and selection marks) belongs to the `SelectionSurface`,
/// which must undo all of it on `exit`.
use chrono::{DateTime, Utc};

use crate::dom::{ElementView, SelectorQuery};
use crate::error::Result;
use crate::rule_data::{ElementTarget, Rule};
use crate::selector::generate_selector;

pub const HIGHLIGHT_CLASS: &str = "webblur-highlight";
pub const SELECTED_CLASS: &str = "webblur-selected";
pub const SELECTION_MODE_CLASS: &str = "webblur-selection-mode";

pub const EMPTY_SELECTION_MESSAGE: &str = "Select at least one element before saving.";

/// Page side of a selection session.
pub trait SelectionSurface {
    type Element: ElementView + Clone + PartialEq;

    /// Set the body flag, show the control panel and attach listeners.
    fn enter(&mut self) -> Result<()>;
    /// Remove listeners, panel, flag and every highlight/selection mark.
    /// Must be safe to call any number of times.
    fn exit(&mut self);
    /// False for the body, the root element and the control panel.
    fn is_pickable(&self, element: &Self::Element) -> bool;
    fn highlight(&mut self, element: &Self::Element);
    fn unhighlight(&mut self, element: &Self::Element);
    fn mark_selected(&mut self, element: &Self::Element);
    fn show_count(&mut self, count: usize);
    /// Ask for a rule name; `None` when the user aborts.
    fn prompt_name(&mut self, suggestion: &str) -> Option<String>;
    fn notify(&mut self, message: &str);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Inactive,
    Selecting,
    Saving,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PickOutcome {
    Added(ElementTarget),
    /// An earlier pick already has this selector.
    Duplicate,
    Ignored,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    NotSelecting,
    NothingSelected,
    NameAborted,
    Saved(Rule),
}

#[derive(Debug)]
pub struct SelectionSession<E> {
    state: SessionState,
    picks: Vec<ElementTarget>,
    highlighted: Option<E>,
}

impl<E> Default for SelectionSession<E> {
    fn default() -> Self {
        SelectionSession {
            state: SessionState::Inactive,
            picks: Vec::new(),
            highlighted: None,
        }
    }
}

impl<E: ElementView + Clone + PartialEq> SelectionSession<E> {
    pub fn new() -> Self {
        SelectionSession::default()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state != SessionState::Inactive
    }

    pub fn picks(&self) -> &[ElementTarget] {
        &self.picks
    }

    /// Enter selection mode, tearing down a running session first.
    pub fn start<S>(&mut self, surface: &mut S) -> Result<()>
    where
        S: SelectionSurface<Element = E>,
    {
        if self.is_active() {
            log::debug!("Restarting selection session");
            self.teardown(surface);
        }

        if let Err(e) = surface.enter() {
            surface.exit();
            return Err(e);
        }

        self.state = SessionState::Selecting;
        surface.show_count(0);
        Ok(())
    }

    pub fn pointer_moved<S>(&mut self, surface: &mut S, element: &E)
    where
        S: SelectionSurface<Element = E>,
    {
        if self.state != SessionState::Selecting || !surface.is_pickable(element) {
            return;
        }
        if self.highlighted.as_ref() == Some(element) {
            return;
        }

        if let Some(previous) = self.highlighted.take() {
            surface.unhighlight(&previous);
        }
        surface.highlight(element);
        self.highlighted = Some(element.clone());
    }

    pub fn clicked<S, Q>(&mut self, surface: &mut S, page: &Q, element: &E) -> PickOutcome
    where
        S: SelectionSurface<Element = E>,
        Q: SelectorQuery + ?Sized,
    {
        if self.state != SessionState::Selecting || !surface.is_pickable(element) {
            return PickOutcome::Ignored;
        }

        let selector = generate_selector(element, page);
        if self.picks.iter().any(|pick| pick.selector == selector) {
            return PickOutcome::Duplicate;
        }

        let target = ElementTarget::new(selector, &element.tag(), &element.text());
        self.picks.push(target.clone());
        surface.mark_selected(element);
        surface.show_count(self.picks.len());

        PickOutcome::Added(target)
    }

    /// Returns true when the key ended the session.
    pub fn key_pressed<S>(&mut self, surface: &mut S, key: &str) -> bool
    where
        S: SelectionSurface<Element = E>,
    {
        if key == "Escape" && self.is_active() {
            self.cancel(surface);
            return true;
        }
        false
    }

    pub fn cancel<S>(&mut self, surface: &mut S)
    where
        S: SelectionSurface<Element = E>,
    {
        self.teardown(surface);
    }

    /// Turn the picks into a rule for `hostname`.
    ///
    /// The session stays in selection mode when nothing is picked or the
    /// name prompt is aborted.
    pub fn save<S>(&mut self, surface: &mut S, hostname: &str, now: DateTime<Utc>) -> SaveOutcome
    where
        S: SelectionSurface<Element = E>,
    {
        if self.state != SessionState::Selecting {
            return SaveOutcome::NotSelecting;
        }

        if self.picks.is_empty() {
            surface.notify(EMPTY_SELECTION_MESSAGE);
            return SaveOutcome::NothingSelected;
        }

        self.state = SessionState::Saving;
        let name = surface
            .prompt_name(&format!("Blur rule for {}", hostname))
            .filter(|name| !name.trim().is_empty());

        let Some(name) = name else {
            self.state = SessionState::Selecting;
            return SaveOutcome::NameAborted;
        };

        let rule = Rule::from_selection(&name, hostname, std::mem::take(&mut self.picks), now);
        self.teardown(surface);

        SaveOutcome::Saved(rule)
    }

    fn teardown<S>(&mut self, surface: &mut S)
    where
        S: SelectionSurface<Element = E>,
    {
        surface.exit();
        self.picks.clear();
        self.highlighted = None;
        self.state = SessionState::Inactive;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::fake::{FakeElement, FakePage};
    use crate::error::BlurError;

    #[derive(Default)]
    struct FakeSurface {
        log: Vec<String>,
        entered: usize,
        exits: usize,
        listeners_attached: bool,
        highlighted: Vec<FakeElement>,
        selected: Vec<FakeElement>,
        count: usize,
        name_reply: Option<String>,
        notices: Vec<String>,
        fail_enter: bool,
    }

    impl SelectionSurface for FakeSurface {
        type Element = FakeElement;

        fn enter(&mut self) -> Result<()> {
            if self.fail_enter {
                return Err(BlurError::dom("no body"));
            }
            assert!(!self.listeners_attached, "listeners attached twice");
            self.entered += 1;
            self.listeners_attached = true;
            self.log.push("enter".into());
            Ok(())
        }

        fn exit(&mut self) {
            self.exits += 1;
            self.listeners_attached = false;
            self.highlighted.clear();
            self.selected.clear();
            self.log.push("exit".into());
        }

        fn is_pickable(&self, element: &FakeElement) -> bool {
            element.tag != "BODY" && element.tag != "HTML"
        }

        fn highlight(&mut self, element: &FakeElement) {
            self.highlighted.push(element.clone());
        }

        fn unhighlight(&mut self, element: &FakeElement) {
            self.highlighted.retain(|e| e != element);
        }

        fn mark_selected(&mut self, element: &FakeElement) {
            self.selected.push(element.clone());
        }

        fn show_count(&mut self, count: usize) {
            self.count = count;
        }

        fn prompt_name(&mut self, _suggestion: &str) -> Option<String> {
            self.name_reply.clone()
        }

        fn notify(&mut self, message: &str) {
            self.notices.push(message.to_string());
        }
    }

    fn started() -> (SelectionSession<FakeElement>, FakeSurface) {
        let mut session = SelectionSession::new();
        let mut surface = FakeSurface::default();
        session.start(&mut surface).unwrap();
        (session, surface)
    }

    #[test]
    fn test_start_enters_selecting() {
        let (session, surface) = started();
        assert_eq!(session.state(), SessionState::Selecting);
        assert!(surface.listeners_attached);
        assert_eq!(surface.count, 0);
    }

    #[test]
    fn test_restart_tears_down_previous_session() {
        let (mut session, mut surface) = started();
        let page = FakePage::default();
        session.clicked(&mut surface, &page, &FakeElement::new("div").with_id("a"));

        session.start(&mut surface).unwrap();

        assert_eq!(surface.log, vec!["enter", "exit", "enter"]);
        assert!(session.picks().is_empty());
        assert_eq!(surface.entered, 2);
    }

    #[test]
    fn test_failed_enter_leaves_session_inactive() {
        let mut session: SelectionSession<FakeElement> = SelectionSession::new();
        let mut surface = FakeSurface {
            fail_enter: true,
            ..Default::default()
        };

        assert!(session.start(&mut surface).is_err());
        assert_eq!(session.state(), SessionState::Inactive);
        assert_eq!(surface.exits, 1);
    }

    #[test]
    fn test_single_highlight() {
        let (mut session, mut surface) = started();
        let a = FakeElement::new("div").with_id("a");
        let b = FakeElement::new("p").with_id("b");

        session.pointer_moved(&mut surface, &a);
        session.pointer_moved(&mut surface, &b);
        session.pointer_moved(&mut surface, &b);

        assert_eq!(surface.highlighted, vec![b]);
    }

    #[test]
    fn test_body_is_not_pickable() {
        let (mut session, mut surface) = started();
        let body = FakeElement::new("body");

        session.pointer_moved(&mut surface, &body);
        let outcome = session.clicked(&mut surface, &FakePage::default(), &body);

        assert!(surface.highlighted.is_empty());
        assert_eq!(outcome, PickOutcome::Ignored);
    }

    #[test]
    fn test_picks_accumulate_and_deduplicate() {
        let (mut session, mut surface) = started();
        let page = FakePage::default();
        let a = FakeElement::new("div").with_id("a").with_text("First block");
        let b = FakeElement::new("span").with_id("b");

        assert!(matches!(session.clicked(&mut surface, &page, &a), PickOutcome::Added(_)));
        assert!(matches!(session.clicked(&mut surface, &page, &b), PickOutcome::Added(_)));
        assert_eq!(session.clicked(&mut surface, &page, &a), PickOutcome::Duplicate);

        let selectors: Vec<&str> = session.picks().iter().map(|p| p.selector.as_str()).collect();
        assert_eq!(selectors, vec!["#a", "#b"]);
        assert_eq!(session.picks()[0].tag_name, "div");
        assert_eq!(session.picks()[0].text_content, "First block");
        assert_eq!(surface.selected.len(), 2);
        assert_eq!(surface.count, 2);
    }

    #[test]
    fn test_hover_marks_do_not_leak_into_selectors() {
        let (mut session, mut surface) = started();
        let page = FakePage::default();
        // What the page shows at click time: the hover class is on the element
        let first = FakeElement::new("li").in_parent("ul", 1).with_class(HIGHLIGHT_CLASS);
        let second = FakeElement::new("li").in_parent("ul", 2).with_class(HIGHLIGHT_CLASS);

        session.pointer_moved(&mut surface, &first);
        assert!(matches!(session.clicked(&mut surface, &page, &first), PickOutcome::Added(_)));
        session.pointer_moved(&mut surface, &second);
        assert!(matches!(session.clicked(&mut surface, &page, &second), PickOutcome::Added(_)));

        let again = first.clone().with_class(&format!("{} {}", HIGHLIGHT_CLASS, SELECTED_CLASS));
        assert_eq!(session.clicked(&mut surface, &page, &again), PickOutcome::Duplicate);

        let selectors: Vec<&str> = session.picks().iter().map(|p| p.selector.as_str()).collect();
        assert_eq!(selectors, vec!["ul > li:nth-child(1)", "ul > li:nth-child(2)"]);
        assert!(selectors.iter().all(|s| !s.contains("webblur")));
    }

    #[test]
    fn test_clicks_ignored_when_inactive() {
        let mut session: SelectionSession<FakeElement> = SelectionSession::new();
        let mut surface = FakeSurface::default();
        let outcome = session.clicked(&mut surface, &FakePage::default(), &FakeElement::new("div"));

        assert_eq!(outcome, PickOutcome::Ignored);
        assert!(session.picks().is_empty());
    }

    #[test]
    fn test_escape_cancels() {
        let (mut session, mut surface) = started();
        session.clicked(&mut surface, &FakePage::default(), &FakeElement::new("div").with_id("a"));

        assert!(!session.key_pressed(&mut surface, "Enter"));
        assert!(session.key_pressed(&mut surface, "Escape"));

        assert_eq!(session.state(), SessionState::Inactive);
        assert!(session.picks().is_empty());
        assert!(!surface.listeners_attached);
        assert!(surface.selected.is_empty());
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let (mut session, mut surface) = started();

        session.cancel(&mut surface);
        session.cancel(&mut surface);
        assert!(!session.key_pressed(&mut surface, "Escape"));

        assert_eq!(session.state(), SessionState::Inactive);
        assert!(!surface.listeners_attached);
    }

    #[test]
    fn test_save_without_picks_stays_selecting() {
        let (mut session, mut surface) = started();

        let outcome = session.save(&mut surface, "example.com", Utc::now());

        assert_eq!(outcome, SaveOutcome::NothingSelected);
        assert_eq!(session.state(), SessionState::Selecting);
        assert_eq!(surface.notices, vec![EMPTY_SELECTION_MESSAGE.to_string()]);
    }

    #[test]
    fn test_aborted_or_blank_name_stays_selecting() {
        let (mut session, mut surface) = started();
        session.clicked(&mut surface, &FakePage::default(), &FakeElement::new("div").with_id("a"));

        assert_eq!(session.save(&mut surface, "example.com", Utc::now()), SaveOutcome::NameAborted);

        surface.name_reply = Some("   ".into());
        assert_eq!(session.save(&mut surface, "example.com", Utc::now()), SaveOutcome::NameAborted);

        assert_eq!(session.state(), SessionState::Selecting);
        assert_eq!(session.picks().len(), 1);
        assert!(surface.listeners_attached);
    }

    #[test]
    fn test_save_builds_rule_and_tears_down() {
        let (mut session, mut surface) = started();
        let page = FakePage::default();
        session.clicked(&mut surface, &page, &FakeElement::new("div").with_id("a"));
        session.clicked(&mut surface, &page, &FakeElement::new("div").with_id("b"));
        surface.name_reply = Some("Sidebar".into());

        let SaveOutcome::Saved(rule) = session.save(&mut surface, "shop.example.com", Utc::now())
        else {
            panic!("expected a saved rule");
        };

        assert_eq!(rule.name, "Sidebar");
        assert_eq!(rule.elements.len(), 2);
        assert_eq!(rule.url_pattern, "shop.example.com");
        assert_eq!(rule.domain, "shop.example.com");
        assert!(rule.enabled);
        assert!(!rule.id.is_empty());

        assert_eq!(session.state(), SessionState::Inactive);
        assert!(!surface.listeners_attached);

        session.cancel(&mut surface);
        assert_eq!(
            session.save(&mut surface, "shop.example.com", Utc::now()),
            SaveOutcome::NotSelecting
        );
    }
}
