/// UI module exports
pub mod components;
pub mod manager;
pub mod popup;
pub mod viewer;

use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{Blob, BlobPropertyBag, File, HtmlAnchorElement, Url};

use crate::bridge::describe;
use crate::error::{BlurError, Result};

/// `window.confirm`; false when no window is available.
pub fn confirm(message: &str) -> bool {
    web_sys::window()
        .and_then(|window| window.confirm_with_message(message).ok())
        .unwrap_or(false)
}

pub fn alert(message: &str) {
    if let Some(window) = web_sys::window() {
        let _ = window.alert_with_message(message);
    }
}

/// Offer `text` as a JSON file download.
pub fn download_json(filename: &str, text: &str) -> Result<()> {
    let document = web_sys::window()
        .and_then(|window| window.document())
        .ok_or_else(|| BlurError::dom("no document"))?;

    let parts = js_sys::Array::of1(&text.into());
    let options = BlobPropertyBag::new();
    options.set_type("application/json");
    let blob = Blob::new_with_str_sequence_and_options(&parts, &options)
        .map_err(|e| BlurError::dom(describe(&e)))?;
    let url = Url::create_object_url_with_blob(&blob).map_err(|e| BlurError::dom(describe(&e)))?;

    let link = document
        .create_element("a")
        .map_err(|e| BlurError::dom(describe(&e)))?
        .dyn_into::<HtmlAnchorElement>()
        .map_err(|_| BlurError::dom("anchor element has unexpected type"))?;
    link.set_href(&url);
    link.set_download(filename);
    link.click();

    Url::revoke_object_url(&url).map_err(|e| BlurError::dom(describe(&e)))
}

pub async fn read_file_text(file: File) -> Result<String> {
    let text = JsFuture::from(file.text())
        .await
        .map_err(|e| BlurError::dom(describe(&e)))?;
    text.as_string()
        .ok_or_else(|| BlurError::dom("file contents are not text"))
}
