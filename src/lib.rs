/// WebBlur - Chrome Extension that blurs chosen page elements
/// Built with Rust + WASM + Yew

mod applicator;
mod background;
mod bridge;
mod content;
mod dom;
mod domain;
mod error;
mod matcher;
mod messages;
mod operations;
mod persistence;
mod reconciler;
mod rule_data;
mod selector;
mod session;
mod settings;
mod storage;
pub mod ui;

pub use applicator::{BlurApplicator, render_blur_css};
pub use dom::{ElementView, SelectorQuery, StyleHost};
pub use error::{BlurError, Result};
pub use matcher::{UrlPattern, matching_rules, rule_matches};
pub use rule_data::{ElementTarget, Rule};
pub use selector::generate_selector;
pub use settings::Settings;
pub use storage::{StorageData, parse_import};

use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;

#[cfg(all(test, target_arch = "wasm32"))]
wasm_bindgen_test::wasm_bindgen_test_configure!(run_in_browser);

// Set up panic hook for better error messages in the browser console
#[wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();
    wasm_logger::init(wasm_logger::Config::default());
}

// Re-export hostname extraction for JavaScript access
#[wasm_bindgen]
pub fn hostname_of(url: &str) -> String {
    domain::hostname_of(url)
}

// Content script entry: apply rules to the page and wait for messages
#[wasm_bindgen]
pub fn start_content_script() {
    spawn_local(async {
        if let Err(e) = content::start().await {
            log::error!("WebBlur content script failed to start: {}", e);
        }
    });
}

// Service worker entry
#[wasm_bindgen]
pub fn start_background() {
    background::start();
}

// Start the Yew app for the popup
#[wasm_bindgen]
pub fn start_popup() {
    yew::Renderer::<ui::popup::App>::new().render();
}

// Start the Yew app for the rule manager page
#[wasm_bindgen]
pub fn start_manager() {
    yew::Renderer::<ui::manager::RuleManager>::new().render();
}

// Start the standalone web app
#[wasm_bindgen]
pub fn start_web_app() {
    yew::Renderer::<ui::viewer::WebApp>::new().render();
}
