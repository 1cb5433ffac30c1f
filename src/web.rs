//! Browser glue: the page's switch button, status text and viewport.

use anyhow::{Result, anyhow};
use wasm_bindgen::JsCast;
use wasm_bindgen::closure::Closure;
use web_sys::window;

/// Calls `handler` on every click of the element with id `element_id`.
///
/// The listener lives as long as the page.
pub fn on_click(element_id: &str, handler: impl FnMut() + 'static) -> Result<()> {
    let document = window()
        .and_then(|window| window.document())
        .ok_or_else(|| anyhow!("document not available"))?;
    let element = document
        .get_element_by_id(element_id)
        .ok_or_else(|| {
            anyhow!(
                "no element with id '{}', switching only works with the M key",
                element_id
            )
        })?;

    let closure = Closure::wrap(Box::new(handler) as Box<dyn FnMut()>);
    element
        .add_event_listener_with_callback("click", closure.as_ref().unchecked_ref())
        .map_err(|err| anyhow!("addEventListener failed: {err:?}"))?;
    closure.forget();
    Ok(())
}

/// Replaces the text of the element with id `element_id`.
///
/// Returns false when the page has no such element.
pub fn set_text(element_id: &str, text: &str) -> bool {
    let Some(element) = window()
        .and_then(|window| window.document())
        .and_then(|document| document.get_element_by_id(element_id))
    else {
        return false;
    };
    element.set_text_content(Some(text));
    true
}

pub fn set_title(title: &str) {
    if let Some(document) = window().and_then(|window| window.document()) {
        document.set_title(title);
    }
}

/// Inner size of the browser window in CSS pixels.
pub fn viewport_size() -> Option<(f64, f64)> {
    let window = window()?;
    let width = window.inner_width().ok()?.as_f64()?;
    let height = window.inner_height().ok()?.as_f64()?;
    Some((width, height))
}
