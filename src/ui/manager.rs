/// Rule manager page: statistics, rule list, import/export and settings

use chrono::Utc;
use patternfly_yew::prelude::*;
use wasm_bindgen_futures::spawn_local;
use web_sys::{HtmlInputElement, HtmlSelectElement};
use yew::prelude::*;

use crate::domain::{count_rule_domains, get_top_domains};
use crate::error::BlurError;
use crate::operations::{EnabledFilter, RuleSort, filter_and_sort, rule_stats};
use crate::persistence::{ChromeSyncStore, RuleRepository};
use crate::settings::Settings;
use crate::storage::{StorageData, export_filename, parse_import};
use crate::ui::components::{IntensitySlider, RuleCard, StatCard, ToggleSwitch};
use crate::ui::{alert, confirm, download_json, read_file_text};

const TOP_SITES: usize = 5;

#[derive(Clone, PartialEq)]
enum ManagerState {
    Loading,
    Idle,
    Notice(String),
    Error(String),
}

fn repository() -> RuleRepository<ChromeSyncStore> {
    RuleRepository::new(ChromeSyncStore)
}

fn import_error_message(error: &BlurError) -> String {
    if error.is_malformed_input() {
        format!(
            "Invalid file format. Please select a valid WebBlur export file. ({})",
            error
        )
    } else {
        "Error importing file. Please check the file format and try again.".to_string()
    }
}

fn import_prompt(count: usize, with_settings: bool) -> String {
    let settings_note = if with_settings {
        " Your current settings will be replaced."
    } else {
        ""
    };
    format!(
        "This will import {} rules. Existing rules with the same name will be overwritten.{} Continue?",
        count, settings_note
    )
}

/// Save the rule list, reporting failures in the page state.
fn persist_rules(data: StorageData, state: UseStateHandle<ManagerState>) {
    spawn_local(async move {
        if let Err(e) = repository().save_rules(&data).await {
            state.set(ManagerState::Error(format!("Failed to save: {}", e)));
        }
    });
}

#[function_component(RuleManager)]
pub fn rule_manager() -> Html {
    let state = use_state(|| ManagerState::Loading);
    let storage = use_state(StorageData::new);
    let settings = use_state(Settings::default);
    let draft = use_state(Settings::default);
    let search_query = use_state(String::new);
    let filter = use_state(EnabledFilter::default);
    let sort = use_state(RuleSort::default);

    // Load storage on mount
    {
        let state = state.clone();
        let storage = storage.clone();
        let settings = settings.clone();
        let draft = draft.clone();

        use_effect_with((), move |_| {
            spawn_local(async move {
                let repository = repository();
                match (repository.load_rules().await, repository.load_settings().await) {
                    (Ok(data), Ok(loaded)) => {
                        storage.set(data);
                        settings.set(loaded);
                        draft.set(loaded);
                        state.set(ManagerState::Idle);
                    }
                    (Err(e), _) | (_, Err(e)) => {
                        state.set(ManagerState::Error(format!("Failed to load: {}", e)));
                    }
                }
            });
            || ()
        });
    }

    let on_search_input = {
        let search_query = search_query.clone();
        Callback::from(move |e: InputEvent| {
            if let Some(input) = e.target_dyn_into::<HtmlInputElement>() {
                search_query.set(input.value());
            }
        })
    };

    let on_filter_change = {
        let filter = filter.clone();
        Callback::from(move |e: Event| {
            if let Some(select) = e.target_dyn_into::<HtmlSelectElement>() {
                filter.set(EnabledFilter::parse(&select.value()));
            }
        })
    };

    let on_sort_change = {
        let sort = sort.clone();
        Callback::from(move |e: Event| {
            if let Some(select) = e.target_dyn_into::<HtmlSelectElement>() {
                sort.set(RuleSort::parse(&select.value()));
            }
        })
    };

    let on_toggle_rule = {
        let storage = storage.clone();
        let state = state.clone();

        Callback::from(move |rule_id: String| {
            let mut new_storage = (*storage).clone();
            if new_storage.toggle_rule(&rule_id).is_some() {
                storage.set(new_storage.clone());
                persist_rules(new_storage, state.clone());
            }
        })
    };

    let on_delete_rule = {
        let storage = storage.clone();
        let state = state.clone();

        Callback::from(move |rule_id: String| {
            if !confirm("Are you sure you want to delete this rule?") {
                return;
            }
            let mut new_storage = (*storage).clone();
            if new_storage.remove_rule(&rule_id) {
                storage.set(new_storage.clone());
                persist_rules(new_storage, state.clone());
            }
        })
    };

    let on_rename_rule = {
        let storage = storage.clone();
        let state = state.clone();

        Callback::from(move |(rule_id, new_name): (String, String)| {
            let mut new_storage = (*storage).clone();
            match new_storage.rename_rule(&rule_id, new_name) {
                Ok(true) => {
                    storage.set(new_storage.clone());
                    persist_rules(new_storage, state.clone());
                }
                Ok(false) => {}
                Err(e) => state.set(ManagerState::Error(format!("Rename failed: {}", e))),
            }
        })
    };

    let on_export = {
        let storage = storage.clone();
        let settings = settings.clone();
        let state = state.clone();

        Callback::from(move |_| {
            let now = Utc::now();
            let result = storage
                .export(Some(*settings), now)
                .to_json()
                .and_then(|json| download_json(&export_filename(now), &json));
            if let Err(e) = result {
                state.set(ManagerState::Error(format!("Export failed: {}", e)));
            }
        })
    };

    let on_import = {
        let storage = storage.clone();
        let settings = settings.clone();
        let draft = draft.clone();
        let state = state.clone();

        Callback::from(move |e: Event| {
            let Some(input) = e.target_dyn_into::<HtmlInputElement>() else {
                return;
            };
            let Some(file) = input.files().and_then(|files| files.get(0)) else {
                return;
            };
            // Allow picking the same file again
            input.set_value("");

            let storage = storage.clone();
            let settings = settings.clone();
            let draft = draft.clone();
            let state = state.clone();

            spawn_local(async move {
                let document = match read_file_text(file).await.and_then(|text| parse_import(&text)) {
                    Ok(document) => document,
                    Err(e) => {
                        log::warn!("Import rejected: {}", e);
                        alert(&import_error_message(&e));
                        return;
                    }
                };

                if !confirm(&import_prompt(document.rules.len(), document.settings.is_some())) {
                    return;
                }

                let mut new_storage = (*storage).clone();
                let summary = new_storage.merge_imported(document.rules);

                let repository = repository();
                if let Err(e) = repository.save_rules(&new_storage).await {
                    state.set(ManagerState::Error(format!("Failed to save: {}", e)));
                    return;
                }
                if let Some(imported) = document.settings {
                    if let Err(e) = repository.save_settings(&imported).await {
                        state.set(ManagerState::Error(format!("Failed to save settings: {}", e)));
                        return;
                    }
                    settings.set(imported);
                    draft.set(imported);
                }

                storage.set(new_storage);
                state.set(ManagerState::Notice(format!(
                    "Imported {} rules ({} new, {} replaced)",
                    summary.total(),
                    summary.added,
                    summary.replaced
                )));
            });
        })
    };

    let on_clear_all = {
        let storage = storage.clone();
        let settings = settings.clone();
        let draft = draft.clone();
        let state = state.clone();

        Callback::from(move |_| {
            if !confirm("Are you sure you want to delete ALL rules and reset settings? This action cannot be undone.") {
                return;
            }

            let storage = storage.clone();
            let settings = settings.clone();
            let draft = draft.clone();
            let state = state.clone();
            spawn_local(async move {
                match repository().clear_all().await {
                    Ok(()) => {
                        storage.set(StorageData::new());
                        settings.set(Settings::default());
                        draft.set(Settings::default());
                        state.set(ManagerState::Notice("All data has been cleared".to_string()));
                    }
                    Err(e) => state.set(ManagerState::Error(format!("Clear failed: {}", e))),
                }
            });
        })
    };

    // Settings form edits only touch the draft until saved
    let on_draft_enabled = {
        let draft = draft.clone();
        Callback::from(move |blur_enabled: bool| draft.set(Settings { blur_enabled, ..*draft }))
    };
    let on_draft_intensity = {
        let draft = draft.clone();
        Callback::from(move |blur_intensity: u8| draft.set(Settings { blur_intensity, ..*draft }))
    };
    let on_draft_auto_blur = {
        let draft = draft.clone();
        Callback::from(move |auto_blur: bool| draft.set(Settings { auto_blur, ..*draft }))
    };
    let on_draft_notifications = {
        let draft = draft.clone();
        Callback::from(move |show_notifications: bool| {
            draft.set(Settings { show_notifications, ..*draft })
        })
    };

    let on_save_settings = {
        let draft = draft.clone();
        let settings = settings.clone();
        let state = state.clone();

        Callback::from(move |_| {
            let updated = draft.normalized();
            let settings = settings.clone();
            let state = state.clone();
            spawn_local(async move {
                match repository().save_settings(&updated).await {
                    Ok(()) => {
                        settings.set(updated);
                        state.set(ManagerState::Notice("Settings saved".to_string()));
                    }
                    Err(e) => state.set(ManagerState::Error(format!("Failed to save settings: {}", e))),
                }
            });
        })
    };

    let stats = rule_stats(&storage.rules);
    let top_sites = get_top_domains(&count_rule_domains(&storage.rules), TOP_SITES);
    let listed = filter_and_sort(&storage.rules, &search_query, *filter, *sort);
    let is_busy = matches!(*state, ManagerState::Loading);
    let draft_dirty = *draft != *settings;

    html! {
        <div class="container">
            <div class="header">
                <h1 class="main-title">{"WebBlur Rules"}</h1>
                <div class="header-actions">
                    <Button onclick={on_export} disabled={is_busy} variant={ButtonVariant::Secondary}>
                        {"📥 Export"}
                    </Button>
                    <label class="import-button">
                        {"📤 Import"}
                        <input type="file" accept="application/json,.json" class="hidden-input" onchange={on_import} />
                    </label>
                    <Button onclick={on_clear_all} disabled={is_busy} variant={ButtonVariant::Danger}>
                        {"🗑️ Clear all"}
                    </Button>
                </div>
            </div>

            {match &*state {
                ManagerState::Loading => html! {
                    <div class="loading-text-center">
                        <Spinner />
                        <p class="loading-text">{"Loading rules..."}</p>
                    </div>
                },
                ManagerState::Notice(msg) => html! {
                    <Alert r#type={AlertType::Success} title={msg.clone()} inline={true}>
                    </Alert>
                },
                ManagerState::Error(err) => html! {
                    <Alert r#type={AlertType::Danger} title={"Error"} inline={true}>
                        {err.clone()}
                    </Alert>
                },
                ManagerState::Idle => html! {}
            }}

            <div class="stats-grid">
                <StatCard label="Total rules" value={stats.total_rules.to_string()} />
                <StatCard label="Active rules" value={stats.active_rules.to_string()} />
                <StatCard label="Sites protected" value={stats.sites_protected.to_string()} />
                <StatCard label="Times applied" value={stats.total_usage.to_string()} />
            </div>

            if !top_sites.is_empty() {
                <div class="stats-container">
                    <h2 class="stats-title">{"Top sites"}</h2>
                    <div class="stats-box">
                        {for top_sites.iter().map(|(domain, count)| html! {
                            <div class="stat-item">
                                <span class="stat-domain">{domain.clone()}</span>
                                <span class="stat-count">{count.to_string()}</span>
                            </div>
                        })}
                    </div>
                </div>
            }

            <div class="search-container">
                <input
                    type="text"
                    placeholder="Search rules by name or domain..."
                    value={(*search_query).clone()}
                    oninput={on_search_input}
                    class="search-input"
                />
                <select class="filter-select" onchange={on_filter_change}>
                    <option value="all" selected={*filter == EnabledFilter::All}>{"All rules"}</option>
                    <option value="enabled" selected={*filter == EnabledFilter::Enabled}>{"Enabled"}</option>
                    <option value="disabled" selected={*filter == EnabledFilter::Disabled}>{"Disabled"}</option>
                </select>
                <select class="sort-select" onchange={on_sort_change}>
                    <option value="name" selected={*sort == RuleSort::Name}>{"Name"}</option>
                    <option value="domain" selected={*sort == RuleSort::Domain}>{"Domain"}</option>
                    <option value="createdAt" selected={*sort == RuleSort::CreatedAt}>{"Newest"}</option>
                    <option value="timesUsed" selected={*sort == RuleSort::TimesUsed}>{"Most used"}</option>
                </select>
            </div>

            if listed.is_empty() {
                <div class="empty-state">
                    if storage.rules.is_empty() {
                        <p>{"No blur rules yet."}</p>
                        <p class="empty-state-hint">{"Use \"Select elements to blur\" in the popup to create one."}</p>
                    } else {
                        <p>{"No rules match your search."}</p>
                    }
                </div>
            } else {
                <div class="rules-grid">
                    {for listed.iter().map(|rule| html! {
                        <RuleCard
                            key={rule.id.clone()}
                            rule={(*rule).clone()}
                            on_toggle={on_toggle_rule.clone()}
                            on_delete={Some(on_delete_rule.clone())}
                            on_rename={Some(on_rename_rule.clone())}
                        />
                    })}
                </div>
            }

            <div class="settings-panel">
                <h2 class="section-title">{"Settings"}</h2>
                <ToggleSwitch checked={draft.blur_enabled} onchange={on_draft_enabled} label="Enable blur protection" />
                <IntensitySlider value={draft.blur_intensity} oninput={on_draft_intensity} />
                <ToggleSwitch checked={draft.auto_blur} onchange={on_draft_auto_blur} label="Apply rules automatically when a page loads" />
                <ToggleSwitch checked={draft.show_notifications} onchange={on_draft_notifications} label="Show a notification when a rule is saved" />
                <Button onclick={on_save_settings} disabled={is_busy || !draft_dirty} variant={ButtonVariant::Primary}>
                    {"Save settings"}
                </Button>
            </div>

            <div class="footer">
                {format!("{} rules • {} shown", storage.rules.len(), listed.len())}
            </div>
        </div>
    }
}
