/// Content-script runtime
///
/// One `ContentRuntime` exists per page. It owns the working copy of the
/// rules and settings, the injected blur stylesheet (through
/// `BlurApplicator`) and the selection session with its page surface.
/// Browser callbacks reach it through `dispatch`, never through globals.
use std::cell::RefCell;
use std::rc::{Rc, Weak};

use chrono::Utc;
use serde_json::Value;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;
use web_sys::{Document, Element, Event, EventTarget, KeyboardEvent, Node};

use crate::applicator::{BlurApplicator, expected_css};
use crate::bridge::{add_message_listener, describe, from_js};
use crate::dom::StyleHost;
use crate::error::{BlurError, Result};
use crate::matcher::matching_rules;
use crate::messages::Message;
use crate::persistence::{
    ChromeSyncStore, RULES_KEY, RuleRepository, SETTINGS_KEY, decode_rules, decode_settings,
};
use crate::reconciler::{BrowserTimers, DEBOUNCE_MS, MutationWatch, Reconciler};
use crate::rule_data::Rule;
use crate::session::{
    HIGHLIGHT_CLASS, PickOutcome, SELECTED_CLASS, SELECTION_MODE_CLASS, SaveOutcome,
    SelectionSession, SelectionSurface,
};
use crate::settings::{Settings, clamp_intensity};
use crate::storage::StorageData;

const PANEL_ID: &str = "webblur-selection-panel";
const SELECTION_STYLE_MARKER: &str = "data-webblur-selection";
const TOAST_MS: i32 = 3000;
const TOAST_STYLE: &str = "position: fixed; bottom: 20px; right: 20px; z-index: 2147483647; \
     padding: 10px 16px; border-radius: 6px; background: #1f2937; color: #fff; \
     font: 14px/1.4 system-ui, sans-serif; box-shadow: 0 4px 12px rgba(0,0,0,0.25);";

fn selection_css() -> String {
    format!(
        ".{mode}, .{mode} * {{ cursor: crosshair !important; }}\n\
         .{highlight} {{ outline: 2px dashed #3b82f6 !important; outline-offset: 2px !important; }}\n\
         .{selected} {{ outline: 2px solid #ef4444 !important; background-color: rgba(239, 68, 68, 0.1) !important; }}\n\
         #{panel} {{ position: fixed; top: 16px; right: 16px; z-index: 2147483647; display: flex; gap: 8px; \
         align-items: center; padding: 10px 14px; border-radius: 8px; background: #111827; color: #f9fafb; \
         font: 14px/1.4 system-ui, sans-serif; box-shadow: 0 6px 16px rgba(0,0,0,0.3); cursor: default !important; }}\n\
         #{panel} button {{ cursor: pointer !important; border: 0; border-radius: 4px; padding: 4px 10px; font: inherit; }}\n",
        mode = SELECTION_MODE_CLASS,
        highlight = HIGHLIGHT_CLASS,
        selected = SELECTED_CLASS,
        panel = PANEL_ID,
    )
}

/// Run `action` against the runtime if it is still alive and not already borrowed.
fn dispatch(runtime: &Weak<RefCell<ContentRuntime>>, action: impl FnOnce(&mut ContentRuntime)) {
    let Some(runtime) = runtime.upgrade() else {
        return;
    };
    match runtime.try_borrow_mut() {
        Ok(mut runtime) => action(&mut runtime),
        Err(_) => log::debug!("Content runtime busy, dropping event"),
    }
}

fn dom_error(value: JsValue) -> BlurError {
    BlurError::dom(describe(&value))
}

fn event_element(event: &Event) -> Option<Element> {
    event.target()?.dyn_into::<Element>().ok()
}

/// Event listeners attached for the lifetime of one selection session.
struct Listener {
    target: EventTarget,
    event: &'static str,
    capture: bool,
    callback: Closure<dyn FnMut(Event)>,
}

#[derive(Default)]
struct ListenerSet {
    listeners: Vec<Listener>,
}

impl ListenerSet {
    fn add(
        &mut self,
        target: &EventTarget,
        event: &'static str,
        capture: bool,
        callback: Closure<dyn FnMut(Event)>,
    ) -> Result<()> {
        target
            .add_event_listener_with_callback_and_bool(
                event,
                callback.as_ref().unchecked_ref(),
                capture,
            )
            .map_err(dom_error)?;
        self.listeners.push(Listener {
            target: target.clone(),
            event,
            capture,
            callback,
        });
        Ok(())
    }

    fn clear(&mut self) {
        for listener in self.listeners.drain(..) {
            if let Err(e) = listener.target.remove_event_listener_with_callback_and_bool(
                listener.event,
                listener.callback.as_ref().unchecked_ref(),
                listener.capture,
            ) {
                log::debug!("Could not detach {} listener: {}", listener.event, describe(&e));
            }
        }
    }
}

/// The visible half of a selection session on a real page.
pub struct WebSelectionSurface {
    document: Document,
    runtime: Weak<RefCell<ContentRuntime>>,
    panel: Option<Element>,
    count_label: Option<Element>,
    listeners: ListenerSet,
}

impl WebSelectionSurface {
    fn new(document: Document, runtime: Weak<RefCell<ContentRuntime>>) -> Self {
        WebSelectionSurface {
            document,
            runtime,
            panel: None,
            count_label: None,
            listeners: ListenerSet::default(),
        }
    }

    fn button(
        &mut self,
        label: &str,
        background: &str,
        action: fn(&mut ContentRuntime),
    ) -> Result<Element> {
        let button = self.document.create_element("button").map_err(dom_error)?;
        button.set_text_content(Some(label));
        button
            .set_attribute("style", &format!("background: {}; color: #fff;", background))
            .map_err(dom_error)?;

        let runtime = self.runtime.clone();
        let callback = Closure::wrap(Box::new(move |event: Event| {
            event.prevent_default();
            event.stop_propagation();
            dispatch(&runtime, action);
        }) as Box<dyn FnMut(Event)>);
        self.listeners.add(&button, "click", false, callback)?;

        Ok(button)
    }

    fn build_panel(&mut self, body: &Node) -> Result<()> {
        let panel = self.document.create_element("div").map_err(dom_error)?;
        panel.set_id(PANEL_ID);

        let label = self.document.create_element("span").map_err(dom_error)?;
        let save = self.button("Save rule", "#2563eb", ContentRuntime::save_selection)?;
        let cancel = self.button("Cancel", "#6b7280", ContentRuntime::cancel_selection)?;

        panel.append_child(&label).map_err(dom_error)?;
        panel.append_child(&save).map_err(dom_error)?;
        panel.append_child(&cancel).map_err(dom_error)?;
        body.append_child(&panel).map_err(dom_error)?;

        self.panel = Some(panel);
        self.count_label = Some(label);
        Ok(())
    }

    fn attach_page_listeners(&mut self) -> Result<()> {
        let document: EventTarget = self.document.clone().into();

        let runtime = self.runtime.clone();
        let on_move = Closure::wrap(Box::new(move |event: Event| {
            if let Some(element) = event_element(&event) {
                dispatch(&runtime, |rt| rt.pointer_moved(&element));
            }
        }) as Box<dyn FnMut(Event)>);
        self.listeners.add(&document, "mousemove", false, on_move)?;

        // Capture phase so the page never sees clicks meant for picking
        let runtime = self.runtime.clone();
        let on_click = Closure::wrap(Box::new(move |event: Event| {
            let Some(element) = event_element(&event) else {
                return;
            };
            let in_panel = element
                .closest(&format!("#{}", PANEL_ID))
                .ok()
                .flatten()
                .is_some();
            if in_panel {
                return;
            }
            event.prevent_default();
            event.stop_propagation();
            dispatch(&runtime, |rt| rt.element_clicked(&element));
        }) as Box<dyn FnMut(Event)>);
        self.listeners.add(&document, "click", true, on_click)?;

        let runtime = self.runtime.clone();
        let on_key = Closure::wrap(Box::new(move |event: Event| {
            if let Some(key) = event.dyn_ref::<KeyboardEvent>().map(KeyboardEvent::key) {
                dispatch(&runtime, |rt| rt.key_pressed(&key));
            }
        }) as Box<dyn FnMut(Event)>);
        self.listeners.add(&document, "keydown", false, on_key)?;

        Ok(())
    }

    fn strip_class(&self, class: &str) {
        let Ok(marked) = self.document.query_selector_all(&format!(".{}", class)) else {
            return;
        };
        for i in 0..marked.length() {
            if let Some(element) = marked.item(i).and_then(|n| n.dyn_into::<Element>().ok()) {
                set_class(&element, class, false);
            }
        }
    }
}

fn set_class(element: &Element, class: &str, on: bool) {
    let classes = element.class_list();
    let result = if on {
        classes.add_1(class)
    } else {
        classes.remove_1(class)
    };
    if let Err(e) = result {
        log::debug!("Could not update class {}: {}", class, describe(&e));
    }
}

impl SelectionSurface for WebSelectionSurface {
    type Element = Element;

    fn enter(&mut self) -> Result<()> {
        let body = self
            .document
            .body()
            .ok_or_else(|| BlurError::dom("page has no body"))?;

        set_class(&body, SELECTION_MODE_CLASS, true);
        self.document
            .insert_style(SELECTION_STYLE_MARKER, &selection_css())?;
        self.build_panel(&body)?;
        self.attach_page_listeners()
    }

    fn exit(&mut self) {
        self.listeners.clear();
        if let Some(panel) = self.panel.take() {
            panel.remove();
        }
        self.count_label = None;
        self.document.remove_styles(SELECTION_STYLE_MARKER);
        if let Some(body) = self.document.body() {
            set_class(&body, SELECTION_MODE_CLASS, false);
        }
        self.strip_class(HIGHLIGHT_CLASS);
        self.strip_class(SELECTED_CLASS);
    }

    fn is_pickable(&self, element: &Element) -> bool {
        let is_body = self.document.body().is_some_and(|body| {
            let body: &Element = &body;
            body == element
        });
        let is_root = self
            .document
            .document_element()
            .is_some_and(|root| &root == element);
        let in_panel = self.panel.as_ref().is_some_and(|panel| {
            let node: &Node = element;
            panel.contains(Some(node))
        });

        !(is_body || is_root || in_panel)
    }

    fn highlight(&mut self, element: &Element) {
        set_class(element, HIGHLIGHT_CLASS, true);
    }

    fn unhighlight(&mut self, element: &Element) {
        set_class(element, HIGHLIGHT_CLASS, false);
    }

    fn mark_selected(&mut self, element: &Element) {
        set_class(element, SELECTED_CLASS, true);
    }

    fn show_count(&mut self, count: usize) {
        if let Some(label) = &self.count_label {
            label.set_text_content(Some(&selection_count_label(count)));
        }
    }

    fn prompt_name(&mut self, suggestion: &str) -> Option<String> {
        web_sys::window()?
            .prompt_with_message_and_default("Name this blur rule:", suggestion)
            .ok()
            .flatten()
    }

    fn notify(&mut self, message: &str) {
        if let Some(window) = web_sys::window() {
            let _ = window.alert_with_message(message);
        }
    }
}

fn selection_count_label(count: usize) -> String {
    match count {
        1 => "1 element selected".to_string(),
        n => format!("{} elements selected", n),
    }
}

/// New value of `key` in a `chrome.storage.onChanged` change set.
fn changed_value(changes: &Value, key: &str) -> Option<Value> {
    changes
        .get(key)?
        .get("newValue")
        .filter(|value| !value.is_null())
        .cloned()
}

/// When a render writes the working copy back to storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteBack {
    /// Only if usage counters moved.
    OnUsage,
    /// The working copy gained a rule that storage has not seen yet.
    Always,
}

impl WriteBack {
    fn for_message(message: &Message) -> WriteBack {
        match message {
            Message::AddBlurRule { .. } => WriteBack::Always,
            _ => WriteBack::OnUsage,
        }
    }

    fn needed(self, usage_updates: usize) -> bool {
        self == WriteBack::Always || usage_updates > 0
    }
}

/// Automatic re-applies (mutations, tab loads, storage sync) run only when
/// auto blur is on or a stylesheet is already showing.
fn auto_apply_allowed(auto_blur: bool, current_css: Option<&str>) -> bool {
    auto_blur || current_css.is_some()
}

pub struct ContentRuntime {
    hostname: String,
    document: Document,
    data: StorageData,
    settings: Settings,
    applicator: BlurApplicator,
    session: SelectionSession<Element>,
    surface: WebSelectionSurface,
    _watch: Option<MutationWatch>,
}

impl ContentRuntime {
    fn new(
        hostname: String,
        document: Document,
        data: StorageData,
        settings: Settings,
        runtime: Weak<RefCell<ContentRuntime>>,
    ) -> Self {
        ContentRuntime {
            hostname,
            surface: WebSelectionSurface::new(document.clone(), runtime),
            document,
            data,
            settings,
            applicator: BlurApplicator::new(),
            session: SelectionSession::new(),
            _watch: None,
        }
    }

    /// Re-render the stylesheet; returns ids of the rules that contributed.
    fn render(&mut self) -> Vec<String> {
        let matched = matching_rules(&self.data.rules, &self.hostname);
        self.applicator
            .apply(
                &self.document,
                &matched,
                self.settings.blur_enabled,
                self.settings.blur_intensity,
            )
            .used_rule_ids()
            .to_vec()
    }

    pub fn apply(&mut self) {
        self.apply_with(WriteBack::OnUsage);
    }

    fn apply_with(&mut self, write_back: WriteBack) {
        let used = self.render();
        let updated = self.data.record_usage(&used, Utc::now());
        if write_back.needed(updated) {
            self.persist_rules();
        }
    }

    fn reconcile(&mut self) {
        if auto_apply_allowed(self.settings.auto_blur, self.applicator.current_css()) {
            self.apply();
        }
    }

    fn persist_rules(&self) {
        let data = self.data.clone();
        spawn_local(async move {
            if let Err(e) = RuleRepository::new(ChromeSyncStore).save_rules(&data).await {
                log::warn!("Could not persist rules: {}", e);
            }
        });
    }

    pub fn handle_message(&mut self, message: Message) {
        let write_back = WriteBack::for_message(&message);
        match message {
            Message::ToggleBlur { enabled } => {
                self.settings.blur_enabled = enabled;
                self.apply();
            }
            Message::UpdateIntensity { intensity } => {
                self.settings.blur_intensity = clamp_intensity(intensity);
                self.apply();
            }
            Message::UpdateRules { rules } => {
                self.data = StorageData::from_rules(rules);
                self.apply();
            }
            Message::AddBlurRule { rule } => match self.data.add_rule(rule) {
                Ok(_) => self.apply_with(write_back),
                Err(e) => log::warn!("Ignoring rule: {}", e),
            },
            Message::ReapplyRules => self.reconcile(),
            Message::StartElementSelection => self.start_selection(),
            Message::StopElementSelection => self.cancel_selection(),
            Message::StorageChanged { changes } => self.storage_changed(&changes),
        }
    }

    fn storage_changed(&mut self, changes: &Value) {
        if let Some(rules) = changed_value(changes, RULES_KEY) {
            self.data = decode_rules(rules).data;
        }
        if let Some(settings) = changed_value(changes, SETTINGS_KEY) {
            self.settings = decode_settings(settings);
        }

        let matched = matching_rules(&self.data.rules, &self.hostname);
        let expected = expected_css(
            &matched,
            self.settings.blur_enabled,
            self.settings.blur_intensity,
        );
        let current = self.applicator.current_css();

        // Usage counters change on every apply; only a different stylesheet re-applies
        if expected.as_deref() != current
            && auto_apply_allowed(self.settings.auto_blur, current)
        {
            self.apply();
        }
    }

    fn start_selection(&mut self) {
        if let Err(e) = self.session.start(&mut self.surface) {
            log::error!("Could not start element selection: {}", e);
        }
    }

    fn cancel_selection(&mut self) {
        self.session.cancel(&mut self.surface);
    }

    fn pointer_moved(&mut self, element: &Element) {
        self.session.pointer_moved(&mut self.surface, element);
    }

    fn element_clicked(&mut self, element: &Element) {
        let ContentRuntime {
            session,
            surface,
            document,
            ..
        } = self;

        match session.clicked(surface, &*document, element) {
            PickOutcome::Added(target) => log::debug!("Picked {}", target.selector),
            PickOutcome::Duplicate => log::debug!("Element already picked"),
            PickOutcome::Ignored => {}
        }
    }

    fn key_pressed(&mut self, key: &str) {
        if self.session.key_pressed(&mut self.surface, key) {
            log::debug!("Element selection cancelled");
        }
    }

    fn save_selection(&mut self) {
        match self
            .session
            .save(&mut self.surface, &self.hostname, Utc::now())
        {
            SaveOutcome::Saved(rule) => self.rule_saved(rule),
            SaveOutcome::NameAborted => log::debug!("Rule name prompt aborted"),
            SaveOutcome::NothingSelected | SaveOutcome::NotSelecting => {}
        }
    }

    fn rule_saved(&mut self, rule: Rule) {
        let name = rule.name.clone();
        let element_count = rule.elements.len();
        if let Err(e) = self.data.add_rule(rule) {
            log::error!("Could not add rule: {}", e);
            return;
        }
        log::info!("Saved blur rule \"{}\" with {} element(s)", name, element_count);

        self.apply_with(WriteBack::Always);

        if self.settings.show_notifications {
            show_toast(&self.document, &format!("WebBlur rule \"{}\" saved", name));
        }
    }
}

fn show_toast(document: &Document, text: &str) {
    let (Ok(toast), Some(body)) = (document.create_element("div"), document.body()) else {
        return;
    };
    toast.set_text_content(Some(text));
    if toast.set_attribute("style", TOAST_STYLE).is_err() || body.append_child(&toast).is_err() {
        return;
    }

    let remove = Closure::once_into_js(move || toast.remove());
    if let Some(window) = web_sys::window() {
        let _ = window.set_timeout_with_callback_and_timeout_and_arguments_0(
            remove.unchecked_ref(),
            TOAST_MS,
        );
    }
}

fn listen_for_messages(runtime: Rc<RefCell<ContentRuntime>>) {
    let callback = Closure::wrap(Box::new(move |message: JsValue, _sender: JsValue, _respond: JsValue| {
        let message = match from_js::<Value>(message).and_then(Message::parse) {
            Ok(message) => message,
            Err(e) => {
                log::debug!("Ignoring message: {}", e);
                return;
            }
        };
        match runtime.try_borrow_mut() {
            Ok(mut runtime) => runtime.handle_message(message),
            Err(_) => log::warn!("Content runtime busy, dropping message"),
        }
    }) as Box<dyn FnMut(JsValue, JsValue, JsValue)>);

    add_message_listener(&callback);
    // Lives as long as the page
    callback.forget();
}

fn watch_mutations(runtime: &Rc<RefCell<ContentRuntime>>, document: &Document) {
    let Some(body) = document.body() else {
        log::warn!("Page has no body, not watching for changes");
        return;
    };

    let weak = Rc::downgrade(runtime);
    let reapply: Rc<dyn Fn()> = Rc::new(move || dispatch(&weak, ContentRuntime::reconcile));
    let reconciler = Rc::new(Reconciler::new(BrowserTimers, DEBOUNCE_MS, reapply));

    match MutationWatch::observe(&body, reconciler) {
        Ok(watch) => runtime.borrow_mut()._watch = Some(watch),
        Err(e) => log::warn!("Could not observe page mutations: {}", e),
    }
}

/// Load rules and settings, apply them and start listening.
pub async fn start() -> Result<()> {
    let window = web_sys::window().ok_or_else(|| BlurError::dom("no window"))?;
    let document = window
        .document()
        .ok_or_else(|| BlurError::dom("no document"))?;
    let hostname = window.location().hostname().map_err(dom_error)?;

    let repository = RuleRepository::new(ChromeSyncStore);
    let settings = repository.load_settings().await.unwrap_or_else(|e| {
        log::warn!("Could not load settings, using defaults: {}", e);
        Settings::default()
    });
    let data = repository.load_rules().await.unwrap_or_else(|e| {
        log::warn!("Could not load rules: {}", e);
        StorageData::new()
    });
    log::debug!("WebBlur loaded {} rule(s) for {}", data.rules.len(), hostname);

    let runtime = Rc::new_cyclic(|weak| {
        RefCell::new(ContentRuntime::new(
            hostname,
            document.clone(),
            data,
            settings,
            weak.clone(),
        ))
    });

    {
        let mut runtime = runtime.borrow_mut();
        if runtime.settings.auto_blur {
            runtime.apply();
        } else {
            log::info!("Auto blur is off, waiting for an explicit apply");
        }
    }

    watch_mutations(&runtime, &document);
    listen_for_messages(runtime);
    Ok(())
}
