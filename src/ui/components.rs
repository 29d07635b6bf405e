/// Reusable UI components

use chrono::{DateTime, Utc};
use web_sys::HtmlInputElement;
use yew::prelude::*;

use crate::rule_data::Rule;
use crate::settings::{MAX_INTENSITY, MIN_INTENSITY, parse_intensity};

/// Element selectors shown on a rule card before collapsing into "+N more"
pub const PREVIEW_ELEMENTS: usize = 5;

pub fn format_date(date: &DateTime<Utc>) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// First `limit` selectors of a rule and how many were left out
pub fn element_preview(rule: &Rule, limit: usize) -> (Vec<&str>, usize) {
    let shown = rule
        .elements
        .iter()
        .take(limit)
        .map(|target| target.selector.as_str())
        .collect();
    (shown, rule.elements.len().saturating_sub(limit))
}

#[derive(Properties, PartialEq)]
pub struct StatCardProps {
    pub label: AttrValue,
    pub value: String,
}

#[function_component(StatCard)]
pub fn stat_card(props: &StatCardProps) -> Html {
    html! {
        <div class="stat-card">
            <span class="stat-value">{props.value.clone()}</span>
            <span class="stat-label">{props.label.to_string()}</span>
        </div>
    }
}

#[derive(Properties, PartialEq)]
pub struct ToggleSwitchProps {
    pub checked: bool,
    pub onchange: Callback<bool>,
    #[prop_or_default]
    pub label: Option<AttrValue>,
    #[prop_or(false)]
    pub disabled: bool,
}

#[function_component(ToggleSwitch)]
pub fn toggle_switch(props: &ToggleSwitchProps) -> Html {
    let onchange = {
        let onchange = props.onchange.clone();
        Callback::from(move |e: Event| {
            if let Some(input) = e.target_dyn_into::<HtmlInputElement>() {
                onchange.emit(input.checked());
            }
        })
    };

    html! {
        <label class="toggle-switch">
            <input
                type="checkbox"
                checked={props.checked}
                disabled={props.disabled}
                onchange={onchange}
            />
            <span class="toggle-slider"></span>
            if let Some(label) = &props.label {
                <span class="toggle-label">{label.to_string()}</span>
            }
        </label>
    }
}

#[derive(Properties, PartialEq)]
pub struct IntensitySliderProps {
    pub value: u8,
    pub oninput: Callback<u8>,
}

#[function_component(IntensitySlider)]
pub fn intensity_slider(props: &IntensitySliderProps) -> Html {
    let oninput = {
        let oninput = props.oninput.clone();
        Callback::from(move |e: InputEvent| {
            if let Some(input) = e.target_dyn_into::<HtmlInputElement>() {
                oninput.emit(parse_intensity(&input.value()));
            }
        })
    };

    html! {
        <div class="intensity-control">
            <label class="intensity-label">{format!("Blur intensity: {}", props.value)}</label>
            <input
                type="range"
                class="intensity-slider"
                min={MIN_INTENSITY.to_string()}
                max={MAX_INTENSITY.to_string()}
                step="1"
                value={props.value.to_string()}
                oninput={oninput}
            />
            <div class="intensity-scale">
                <span>{"Light"}</span>
                <span>{"Strong"}</span>
            </div>
        </div>
    }
}

#[derive(Properties, PartialEq)]
pub struct RuleCardProps {
    pub rule: Rule,
    pub on_toggle: Callback<String>,
    /// Compact rows only show name, domain and the toggle
    #[prop_or(false)]
    pub compact: bool,
    #[prop_or_default]
    pub on_delete: Option<Callback<String>>,
    #[prop_or_default]
    pub on_rename: Option<Callback<(String, String)>>,
}

#[function_component(RuleCard)]
pub fn rule_card(props: &RuleCardProps) -> Html {
    let rule = &props.rule;
    let editing = use_state(|| false);
    let draft = use_state(|| rule.name.clone());

    let on_toggle = {
        let on_toggle = props.on_toggle.clone();
        let id = rule.id.clone();
        Callback::from(move |_: bool| on_toggle.emit(id.clone()))
    };

    if props.compact {
        return html! {
            <div class="rule-item">
                <div>
                    <div class="rule-name">{rule.name.clone()}</div>
                    <div class="rule-domain">{rule.domain.clone()}</div>
                </div>
                <ToggleSwitch checked={rule.enabled} onchange={on_toggle} />
            </div>
        };
    }

    let on_delete = props.on_delete.clone().map(|on_delete| {
        let id = rule.id.clone();
        Callback::from(move |_: MouseEvent| on_delete.emit(id.clone()))
    });

    let on_start_edit = {
        let editing = editing.clone();
        let draft = draft.clone();
        let name = rule.name.clone();
        Callback::from(move |_: MouseEvent| {
            draft.set(name.clone());
            editing.set(true);
        })
    };

    let on_edit_input = {
        let draft = draft.clone();
        Callback::from(move |e: InputEvent| {
            if let Some(input) = e.target_dyn_into::<HtmlInputElement>() {
                draft.set(input.value());
            }
        })
    };

    let on_save_edit = props.on_rename.clone().map(|on_rename| {
        let editing = editing.clone();
        let draft = draft.clone();
        let id = rule.id.clone();
        Callback::from(move |_: MouseEvent| {
            on_rename.emit((id.clone(), (*draft).clone()));
            editing.set(false);
        })
    });

    let on_cancel_edit = {
        let editing = editing.clone();
        Callback::from(move |_: MouseEvent| editing.set(false))
    };

    let (preview, hidden) = element_preview(rule, PREVIEW_ELEMENTS);

    html! {
        <div class={classes!("rule-card", (!rule.enabled).then_some("rule-card-disabled"))}>
            <div class="rule-header">
                <div class="rule-title-container">
                    if *editing {
                        <div class="rule-title-edit-mode">
                            <input
                                type="text"
                                class="rule-title-input"
                                value={(*draft).clone()}
                                oninput={on_edit_input}
                            />
                            if let Some(on_save_edit) = on_save_edit {
                                <button class="rule-edit-button" onclick={on_save_edit}>{"Save"}</button>
                            }
                            <button class="rule-edit-button" onclick={on_cancel_edit}>{"Cancel"}</button>
                        </div>
                    } else {
                        <h3 class="rule-title">{rule.name.clone()}</h3>
                    }
                    <div class="rule-domain">{format!("🌐 {}", rule.domain)}</div>
                    <div class="rule-meta">
                        <span>{format!("📅 {}", format_date(&rule.created_at))}</span>
                        <span>{format!("🔢 Used {} times", rule.times_used)}</span>
                        <span>{format!("📝 {} elements", rule.elements.len())}</span>
                        if let Some(last_used) = &rule.last_used {
                            <span>{format!("🕒 Last used {}", format_date(last_used))}</span>
                        }
                    </div>
                </div>
                <ToggleSwitch checked={rule.enabled} onchange={on_toggle} />
            </div>

            if !preview.is_empty() {
                <div class="rule-elements">
                    <h4>{"Blurred elements:"}</h4>
                    <div class="element-list">
                        {for preview.iter().map(|selector| html! {
                            <code class="element-tag">{selector.to_string()}</code>
                        })}
                        if hidden > 0 {
                            <span class="element-tag">{format!("+{} more", hidden)}</span>
                        }
                    </div>
                </div>
            }

            <div class="rule-actions">
                if props.on_rename.is_some() && !*editing {
                    <button class="rule-action-button" onclick={on_start_edit}>{"✏️ Rename"}</button>
                }
                if let Some(on_delete) = on_delete {
                    <button class="rule-action-button rule-action-danger" onclick={on_delete}>{"🗑️ Delete"}</button>
                }
            </div>
        </div>
    }
}
