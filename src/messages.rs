/// Messages exchanged between the extension surfaces
use serde::{Deserialize, Serialize};

use crate::bridge::{describe, from_js, tabs_query, tabs_send_message, to_js};
use crate::error::Result;
use crate::rule_data::Rule;

/// `{ action: "...", ... }` messages routed through `chrome.runtime`/`chrome.tabs`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Message {
    ToggleBlur { enabled: bool },
    UpdateIntensity { intensity: u8 },
    UpdateRules { rules: Vec<Rule> },
    ReapplyRules,
    StartElementSelection,
    StopElementSelection,
    AddBlurRule { rule: Rule },
    StorageChanged { changes: serde_json::Value },
}

impl Message {
    pub fn parse(value: serde_json::Value) -> Result<Message> {
        Ok(serde_json::from_value(value)?)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TabInfo {
    pub id: Option<i32>,
    #[serde(default)]
    pub url: Option<String>,
}

impl TabInfo {
    /// Content scripts only run on regular web pages.
    pub fn is_web_page(&self) -> bool {
        self.url
            .as_deref()
            .is_some_and(|url| url.starts_with("http://") || url.starts_with("https://"))
    }
}

/// Send to one tab. A tab without a content script is not an error worth reporting.
pub async fn send_to_tab(tab_id: i32, message: &Message) {
    let payload = match to_js(message) {
        Ok(payload) => payload,
        Err(e) => {
            log::error!("Could not serialize message: {}", e);
            return;
        }
    };

    if let Err(e) = tabs_send_message(tab_id, payload).await {
        log::debug!("Tab {} did not take message: {}", tab_id, describe(&e));
    }
}

pub async fn query_tabs(query: &serde_json::Value) -> Vec<TabInfo> {
    let query = match to_js(query) {
        Ok(query) => query,
        Err(e) => {
            log::error!("Could not serialize tab query: {}", e);
            return Vec::new();
        }
    };

    match tabs_query(query).await {
        Ok(tabs) => from_js(tabs).unwrap_or_else(|e| {
            log::warn!("Could not read tab list: {}", e);
            Vec::new()
        }),
        Err(e) => {
            log::warn!("Tab query failed: {}", describe(&e));
            Vec::new()
        }
    }
}

pub async fn active_tab() -> Option<TabInfo> {
    query_tabs(&serde_json::json!({"active": true, "currentWindow": true}))
        .await
        .into_iter()
        .next()
}

/// Send to every tab that shows a web page.
pub async fn broadcast(message: &Message) {
    for tab in query_tabs(&serde_json::json!({})).await {
        if let (true, Some(id)) = (tab.is_web_page(), tab.id) {
            send_to_tab(id, message).await;
        }
    }
}
