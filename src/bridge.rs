/// wasm-bindgen bindings to the chrome.* extension APIs
use serde::Serialize;
use serde::de::DeserializeOwned;
use wasm_bindgen::prelude::*;

use crate::error::Result;

#[wasm_bindgen]
extern "C" {
    // chrome.storage.sync
    #[wasm_bindgen(catch, js_namespace = ["chrome", "storage", "sync"], js_name = get)]
    pub async fn storage_sync_get(keys: JsValue) -> std::result::Result<JsValue, JsValue>;

    #[wasm_bindgen(catch, js_namespace = ["chrome", "storage", "sync"], js_name = set)]
    pub async fn storage_sync_set(items: JsValue) -> std::result::Result<JsValue, JsValue>;

    #[wasm_bindgen(js_namespace = ["chrome", "storage", "onChanged"], js_name = addListener)]
    pub fn add_storage_changed_listener(callback: &Closure<dyn FnMut(JsValue, JsValue)>);

    // chrome.runtime
    #[wasm_bindgen(js_namespace = ["chrome", "runtime", "onMessage"], js_name = addListener)]
    pub fn add_message_listener(callback: &Closure<dyn FnMut(JsValue, JsValue, JsValue)>);

    #[wasm_bindgen(js_namespace = ["chrome", "runtime", "onInstalled"], js_name = addListener)]
    pub fn add_installed_listener(callback: &Closure<dyn FnMut(JsValue)>);

    #[wasm_bindgen(js_namespace = ["chrome", "runtime"], js_name = getURL)]
    pub fn runtime_get_url(path: &str) -> String;

    // chrome.tabs
    #[wasm_bindgen(catch, js_namespace = ["chrome", "tabs"], js_name = query)]
    pub async fn tabs_query(query: JsValue) -> std::result::Result<JsValue, JsValue>;

    #[wasm_bindgen(catch, js_namespace = ["chrome", "tabs"], js_name = sendMessage)]
    pub async fn tabs_send_message(tab_id: i32, message: JsValue) -> std::result::Result<JsValue, JsValue>;

    #[wasm_bindgen(catch, js_namespace = ["chrome", "tabs"], js_name = create)]
    pub async fn tabs_create(properties: JsValue) -> std::result::Result<JsValue, JsValue>;

    #[wasm_bindgen(js_namespace = ["chrome", "tabs", "onUpdated"], js_name = addListener)]
    pub fn add_tab_updated_listener(callback: &Closure<dyn FnMut(i32, JsValue, JsValue)>);

    // chrome.contextMenus
    #[wasm_bindgen(js_namespace = ["chrome", "contextMenus"], js_name = create)]
    pub fn context_menus_create(properties: JsValue);

    #[wasm_bindgen(js_namespace = ["chrome", "contextMenus", "onClicked"], js_name = addListener)]
    pub fn add_context_menu_listener(callback: &Closure<dyn FnMut(JsValue, JsValue)>);
}

/// Best-effort text for a thrown JS value.
pub fn describe(value: &JsValue) -> String {
    value.as_string().unwrap_or_else(|| format!("{:?}", value))
}

/// Serialize into a plain JS object (maps become objects, not `Map`s).
pub fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue> {
    let serializer = serde_wasm_bindgen::Serializer::json_compatible();
    Ok(value.serialize(&serializer)?)
}

pub fn from_js<T: DeserializeOwned>(value: JsValue) -> Result<T> {
    Ok(serde_wasm_bindgen::from_value(value)?)
}
