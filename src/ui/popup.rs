/// Popup UI for the WebBlur extension

use patternfly_yew::prelude::*;
use serde_json::json;
use wasm_bindgen_futures::spawn_local;
use yew::prelude::*;

use crate::bridge::{runtime_get_url, tabs_create, to_js};
use crate::domain::hostname_of;
use crate::matcher::rules_for_host;
use crate::messages::{Message, TabInfo, active_tab, send_to_tab};
use crate::persistence::{ChromeSyncStore, RuleRepository};
use crate::settings::Settings;
use crate::storage::StorageData;
use crate::ui::components::{IntensitySlider, RuleCard, ToggleSwitch};

#[derive(Clone, PartialEq)]
enum PopupState {
    Loading,
    Idle,
    Error(String),
}

fn repository() -> RuleRepository<ChromeSyncStore> {
    RuleRepository::new(ChromeSyncStore)
}

fn status_text(settings: &Settings, hostname: Option<&str>) -> String {
    if settings.blur_enabled {
        format!(
            "Blur protection is ON for {}",
            hostname.filter(|h| !h.is_empty()).unwrap_or("this page")
        )
    } else {
        "Blur protection is OFF".to_string()
    }
}

/// Tell the active tab, if there is one.
fn notify_tab(tab: Option<&TabInfo>, message: Message) {
    if let Some(id) = tab.and_then(|tab| tab.id) {
        spawn_local(async move { send_to_tab(id, &message).await });
    }
}

#[function_component(App)]
pub fn app() -> Html {
    let state = use_state(|| PopupState::Loading);
    let settings = use_state(Settings::default);
    let storage = use_state(StorageData::new);
    let tab = use_state(|| None::<TabInfo>);

    // Load the active tab, settings and rules on mount
    {
        let state = state.clone();
        let settings = settings.clone();
        let storage = storage.clone();
        let tab = tab.clone();

        use_effect_with((), move |_| {
            spawn_local(async move {
                tab.set(active_tab().await);

                let repository = repository();
                match (repository.load_settings().await, repository.load_rules().await) {
                    (Ok(loaded_settings), Ok(loaded_rules)) => {
                        settings.set(loaded_settings);
                        storage.set(loaded_rules);
                        state.set(PopupState::Idle);
                    }
                    (Err(e), _) | (_, Err(e)) => {
                        state.set(PopupState::Error(format!("Failed to load: {}", e)));
                    }
                }
            });
            || ()
        });
    }

    let hostname: Option<String> = (*tab)
        .as_ref()
        .and_then(|tab| tab.url.as_deref())
        .map(hostname_of)
        .filter(|host| !host.is_empty());

    // Master switch
    let on_toggle_blur = {
        let settings = settings.clone();
        let tab = tab.clone();
        let state = state.clone();

        Callback::from(move |enabled: bool| {
            let updated = Settings {
                blur_enabled: enabled,
                ..*settings
            };
            settings.set(updated);
            notify_tab((*tab).as_ref(), Message::ToggleBlur { enabled });

            let state = state.clone();
            spawn_local(async move {
                if let Err(e) = repository().save_settings(&updated).await {
                    state.set(PopupState::Error(format!("Failed to save: {}", e)));
                }
            });
        })
    };

    let on_intensity = {
        let settings = settings.clone();
        let tab = tab.clone();
        let state = state.clone();

        Callback::from(move |intensity: u8| {
            let updated = Settings {
                blur_intensity: intensity,
                ..*settings
            };
            settings.set(updated);
            notify_tab((*tab).as_ref(), Message::UpdateIntensity { intensity });

            let state = state.clone();
            spawn_local(async move {
                if let Err(e) = repository().save_settings(&updated).await {
                    state.set(PopupState::Error(format!("Failed to save: {}", e)));
                }
            });
        })
    };

    // Per-rule toggle
    let on_toggle_rule = {
        let storage = storage.clone();
        let tab = tab.clone();
        let state = state.clone();

        Callback::from(move |rule_id: String| {
            let mut new_storage = (*storage).clone();
            if new_storage.toggle_rule(&rule_id).is_none() {
                return;
            }
            storage.set(new_storage.clone());
            notify_tab(
                (*tab).as_ref(),
                Message::UpdateRules {
                    rules: new_storage.rules.clone(),
                },
            );

            let state = state.clone();
            spawn_local(async move {
                if let Err(e) = repository().save_rules(&new_storage).await {
                    state.set(PopupState::Error(format!("Failed to save: {}", e)));
                }
            });
        })
    };

    let on_select_elements = {
        let tab = tab.clone();
        Callback::from(move |_| {
            notify_tab((*tab).as_ref(), Message::StartElementSelection);
            // Close so the page is fully visible while picking
            if let Some(window) = web_sys::window() {
                let _ = window.close();
            }
        })
    };

    let on_open_manager = Callback::from(move |_| {
        spawn_local(async move {
            let properties = match to_js(&json!({"url": runtime_get_url("manager.html")})) {
                Ok(properties) => properties,
                Err(e) => {
                    log::error!("Could not build tab properties: {}", e);
                    return;
                }
            };
            if tabs_create(properties).await.is_err() {
                log::warn!("Could not open the rule manager");
            }
        });
    });

    let is_busy = matches!(*state, PopupState::Loading);
    let can_select = (*tab).as_ref().is_some_and(TabInfo::is_web_page);
    let matching = hostname
        .as_deref()
        .map(|host| rules_for_host(&storage.rules, host))
        .unwrap_or_default();

    html! {
        <div class="padding-20">
            <h1 class="popup-title">{"WebBlur"}</h1>

            {match &*state {
                PopupState::Loading => html! {
                    <div class="loading-text-center">
                        <Spinner />
                        <p class="loading-text">{"Loading rules..."}</p>
                    </div>
                },
                PopupState::Error(err) => html! {
                    <div class="message-top-margin">
                        <Alert r#type={AlertType::Danger} title={"Error"} inline={true}>
                            {err.clone()}
                        </Alert>
                    </div>
                },
                PopupState::Idle => html! {}
            }}

            <div class="master-toggle">
                <ToggleSwitch
                    checked={settings.blur_enabled}
                    onchange={on_toggle_blur}
                    disabled={is_busy}
                />
                <p class="status-text">{status_text(&settings, hostname.as_deref())}</p>
            </div>

            <IntensitySlider value={settings.blur_intensity} oninput={on_intensity} />

            <div class="rules-section">
                <h2 class="section-title">{"Rules for this page"}</h2>
                if hostname.is_none() {
                    <div class="empty-state">{"Cannot detect current domain"}</div>
                } else if matching.is_empty() {
                    <div class="empty-state">{"No rules found for this page"}</div>
                } else {
                    <div class="rules-list">
                        {for matching.iter().map(|rule| html! {
                            <RuleCard
                                key={rule.id.clone()}
                                rule={(*rule).clone()}
                                on_toggle={on_toggle_rule.clone()}
                                compact={true}
                            />
                        })}
                    </div>
                }
            </div>

            <div class="flex-column-gap">
                <Button onclick={on_select_elements} disabled={is_busy || !can_select} variant={ButtonVariant::Primary} block={true}>
                    {"🎯 Select elements to blur"}
                </Button>
                <Button onclick={on_open_manager} variant={ButtonVariant::Secondary} block={true}>
                    {"⚙️ Manage rules"}
                </Button>
            </div>

            <p class="footer-popup">
                {format!("WebBlur v{}", env!("CARGO_PKG_VERSION"))}
            </p>
        </div>
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_text() {
        let on = Settings::default();
        let off = Settings {
            blur_enabled: false,
            ..Settings::default()
        };

        assert_eq!(
            status_text(&on, Some("news.example.com")),
            "Blur protection is ON for news.example.com"
        );
        assert_eq!(status_text(&on, None), "Blur protection is ON for this page");
        assert_eq!(status_text(&on, Some("")), "Blur protection is ON for this page");
        assert_eq!(status_text(&off, Some("news.example.com")), "Blur protection is OFF");
    }
}
