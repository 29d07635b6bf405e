/// Extension service worker: install defaults, tab reloads, storage fan-out, context menu
use serde::Deserialize;
use serde_json::{Value, json};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;

use crate::bridge::{
    add_context_menu_listener, add_installed_listener, add_storage_changed_listener,
    add_tab_updated_listener, context_menus_create, from_js, to_js,
};
use crate::messages::{Message, TabInfo, broadcast, send_to_tab};
use crate::persistence::{ChromeSyncStore, RuleRepository};

pub const TOGGLE_MENU_ID: &str = "webblur-toggle";
const SYNC_AREA: &str = "sync";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TabChange {
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MenuClick {
    menu_item_id: Value,
}

/// A tab finished loading a page the content script can run on.
fn is_load_complete(change: &TabChange, tab: &TabInfo) -> bool {
    change.status.as_deref() == Some("complete") && tab.url.is_some()
}

fn is_toggle_click(click: &MenuClick) -> bool {
    click.menu_item_id.as_str() == Some(TOGGLE_MENU_ID)
}

fn toggle_menu() -> Value {
    json!({
        "id": TOGGLE_MENU_ID,
        "title": "Toggle WebBlur Protection",
        "contexts": ["page"],
    })
}

async fn install() {
    log::info!("WebBlur installed");
    if let Err(e) = RuleRepository::new(ChromeSyncStore).install_defaults().await {
        log::error!("Could not write default settings: {}", e);
    }
}

async fn toggle_blur(tab: Option<TabInfo>) {
    let repository = RuleRepository::new(ChromeSyncStore);
    let mut settings = match repository.load_settings().await {
        Ok(settings) => settings,
        Err(e) => {
            log::error!("Could not read settings: {}", e);
            return;
        }
    };

    settings.blur_enabled = !settings.blur_enabled;
    if let Err(e) = repository.save_settings(&settings).await {
        log::error!("Could not save settings: {}", e);
    }

    if let Some(id) = tab.and_then(|tab| tab.id) {
        send_to_tab(
            id,
            &Message::ToggleBlur {
                enabled: settings.blur_enabled,
            },
        )
        .await;
    }
}

fn listen_for_install() {
    let callback = Closure::wrap(Box::new(move |_details: JsValue| {
        match to_js(&toggle_menu()) {
            Ok(menu) => context_menus_create(menu),
            Err(e) => log::error!("Could not build context menu: {}", e),
        }
        spawn_local(install());
    }) as Box<dyn FnMut(JsValue)>);

    add_installed_listener(&callback);
    callback.forget();
}

fn listen_for_tab_loads() {
    let callback = Closure::wrap(Box::new(move |tab_id: i32, change: JsValue, tab: JsValue| {
        let (Ok(change), Ok(tab)) = (from_js::<TabChange>(change), from_js::<TabInfo>(tab)) else {
            return;
        };
        if is_load_complete(&change, &tab) {
            spawn_local(async move { send_to_tab(tab_id, &Message::ReapplyRules).await });
        }
    }) as Box<dyn FnMut(i32, JsValue, JsValue)>);

    add_tab_updated_listener(&callback);
    callback.forget();
}

fn listen_for_storage_changes() {
    let callback = Closure::wrap(Box::new(move |changes: JsValue, area: JsValue| {
        if area.as_string().as_deref() != Some(SYNC_AREA) {
            return;
        }
        match from_js::<Value>(changes) {
            Ok(changes) => spawn_local(async move {
                broadcast(&Message::StorageChanged { changes }).await;
            }),
            Err(e) => log::warn!("Unreadable storage change: {}", e),
        }
    }) as Box<dyn FnMut(JsValue, JsValue)>);

    add_storage_changed_listener(&callback);
    callback.forget();
}

fn listen_for_menu_clicks() {
    let callback = Closure::wrap(Box::new(move |info: JsValue, tab: JsValue| {
        let Ok(click) = from_js::<MenuClick>(info) else {
            return;
        };
        if is_toggle_click(&click) {
            let tab = from_js::<TabInfo>(tab).ok();
            spawn_local(toggle_blur(tab));
        }
    }) as Box<dyn FnMut(JsValue, JsValue)>);

    add_context_menu_listener(&callback);
    callback.forget();
}

/// Register every service worker listener. Chrome requires this to happen
/// synchronously when the worker script starts.
pub fn start() {
    listen_for_install();
    listen_for_tab_loads();
    listen_for_storage_changes();
    listen_for_menu_clicks();
    log::debug!("WebBlur background listeners registered");
}
