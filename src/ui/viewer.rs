/// Standalone web app: dashboard and site viewer backed by localStorage

use patternfly_yew::prelude::*;
use url::Url;
use wasm_bindgen_futures::spawn_local;
use web_sys::HtmlInputElement;
use yew::prelude::*;

use crate::domain::hostname_of;
use crate::matcher::rules_for_host;
use crate::operations::{RECENT_RULES, recent_rules, rule_stats};
use crate::persistence::{LocalStorageStore, RuleRepository};
use crate::storage::{StorageData, parse_import};
use crate::ui::components::{RuleCard, StatCard, format_date};
use crate::ui::{alert, read_file_text};

/// Prefix that puts web app data under `webblur_rules` / `webblur_settings`
pub const STORAGE_PREFIX: &str = "webblur_";
const DEFAULT_URL: &str = "https://example.com";

#[derive(Clone, PartialEq)]
enum ViewState {
    Loading,
    Idle,
    Error(String),
}

fn repository() -> RuleRepository<LocalStorageStore> {
    RuleRepository::new(LocalStorageStore::new(STORAGE_PREFIX))
}

/// A URL the viewer may open in a new tab: absolute http(s) with a host.
fn openable_url(input: &str) -> Option<String> {
    let parsed = Url::parse(input.trim()).ok()?;
    let is_web = matches!(parsed.scheme(), "http" | "https");
    (is_web && parsed.host_str().is_some()).then(|| parsed.to_string())
}

#[function_component(WebApp)]
pub fn web_app() -> Html {
    let state = use_state(|| ViewState::Loading);
    let storage = use_state(StorageData::new);
    let url = use_state(|| DEFAULT_URL.to_string());

    // Load storage on mount
    {
        let state = state.clone();
        let storage = storage.clone();

        use_effect_with((), move |_| {
            spawn_local(async move {
                match repository().load_rules().await {
                    Ok(data) => {
                        storage.set(data);
                        state.set(ViewState::Idle);
                    }
                    Err(e) => {
                        state.set(ViewState::Error(format!("Failed to load: {}", e)));
                    }
                }
            });
            || ()
        });
    }

    let on_url_input = {
        let url = url.clone();
        Callback::from(move |e: InputEvent| {
            if let Some(input) = e.target_dyn_into::<HtmlInputElement>() {
                url.set(input.value());
            }
        })
    };

    let on_open = {
        let url = url.clone();
        Callback::from(move |_| match openable_url(&url) {
            Some(target) => {
                if let Some(window) = web_sys::window() {
                    let _ = window.open_with_url_and_target(&target, "_blank");
                }
            }
            None => alert("Please enter a valid URL (including https://)"),
        })
    };

    let on_toggle_rule = {
        let storage = storage.clone();
        let state = state.clone();

        Callback::from(move |rule_id: String| {
            let mut new_storage = (*storage).clone();
            if new_storage.toggle_rule(&rule_id).is_none() {
                return;
            }
            storage.set(new_storage.clone());

            let state = state.clone();
            spawn_local(async move {
                if let Err(e) = repository().save_rules(&new_storage).await {
                    state.set(ViewState::Error(format!("Failed to save: {}", e)));
                }
            });
        })
    };

    let on_import = {
        let storage = storage.clone();
        let state = state.clone();

        Callback::from(move |e: Event| {
            let Some(input) = e.target_dyn_into::<HtmlInputElement>() else {
                return;
            };
            let Some(file) = input.files().and_then(|files| files.get(0)) else {
                return;
            };
            input.set_value("");

            let storage = storage.clone();
            let state = state.clone();
            spawn_local(async move {
                let document = match read_file_text(file).await.and_then(|text| parse_import(&text)) {
                    Ok(document) => document,
                    Err(e) => {
                        alert(&format!("Could not import rules: {}", e));
                        return;
                    }
                };

                let mut new_storage = (*storage).clone();
                let summary = new_storage.merge_imported(document.rules);
                let repository = repository();
                let mut result = repository.save_rules(&new_storage).await;
                if let Some(settings) = document.settings.filter(|_| result.is_ok()) {
                    result = repository.save_settings(&settings).await;
                }
                match result {
                    Ok(()) => {
                        log::info!("Imported {} rules into the web app", summary.total());
                        storage.set(new_storage);
                    }
                    Err(e) => state.set(ViewState::Error(format!("Failed to save: {}", e))),
                }
            });
        })
    };

    let hostname = hostname_of(&url);
    let matching = rules_for_host(&storage.rules, &hostname);
    let stats = rule_stats(&storage.rules);
    let recent = recent_rules(&storage.rules, RECENT_RULES);

    html! {
        <div class="container">
            <div class="header">
                <h1 class="main-title">{"WebBlur"}</h1>
                <label class="import-button">
                    {"📤 Import rules"}
                    <input type="file" accept="application/json,.json" class="hidden-input" onchange={on_import} />
                </label>
            </div>

            {match &*state {
                ViewState::Loading => html! {
                    <div class="loading-text-center">
                        <Spinner />
                    </div>
                },
                ViewState::Error(err) => html! {
                    <Alert r#type={AlertType::Danger} title={"Error"} inline={true}>
                        {err.clone()}
                    </Alert>
                },
                ViewState::Idle => html! {}
            }}

            <div class="stats-grid">
                <StatCard label="Total rules" value={stats.total_rules.to_string()} />
                <StatCard label="Active rules" value={stats.active_rules.to_string()} />
                <StatCard label="Sites protected" value={stats.sites_protected.to_string()} />
                <StatCard label="Times applied" value={stats.total_usage.to_string()} />
            </div>

            <div class="stats-container">
                <h2 class="stats-title">{"Recent rules"}</h2>
                if recent.is_empty() {
                    <p class="empty-state-hint">{"No rules yet. Create them with the browser extension."}</p>
                } else {
                    <div class="stats-box">
                        {for recent.iter().map(|rule| html! {
                            <div class="stat-item">
                                <span class="stat-domain">{format!("{} ({})", rule.name, rule.domain)}</span>
                                <span class="stat-count">{format_date(&rule.created_at)}</span>
                            </div>
                        })}
                    </div>
                }
            </div>

            <div class="search-container">
                <input
                    type="url"
                    placeholder="Enter website URL (e.g., https://example.com)"
                    value={(*url).clone()}
                    oninput={on_url_input}
                    class="search-input"
                />
                <Button onclick={on_open} variant={ButtonVariant::Primary}>
                    {"Open in new tab"}
                </Button>
            </div>

            <div class="rules-section">
                <h2 class="section-title">
                    {format!("Rules for {}", if hostname.is_empty() { "this domain" } else { hostname.as_str() })}
                </h2>
                if matching.is_empty() {
                    <div class="empty-state">{"No rules match this site"}</div>
                } else {
                    <div class="rules-list">
                        {for matching.iter().map(|rule| html! {
                            <RuleCard
                                key={rule.id.clone()}
                                rule={(*rule).clone()}
                                on_toggle={on_toggle_rule.clone()}
                            />
                        })}
                    </div>
                }
            </div>
        </div>
    }
}
