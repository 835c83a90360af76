// WASM utility functions

use crate::timer::Sleeper;
use async_trait::async_trait;
use std::time::Duration;
use wasm_bindgen::JsValue;
use wasm_bindgen_futures::JsFuture;

/// Sleep for the specified number of milliseconds using the browser's setTimeout.
/// Returns immediately when there is no window to schedule on.
pub async fn sleep_ms(milliseconds: u64) {
    let window = match web_sys::window() {
        Some(window) => window,
        None => return,
    };
    let delay = milliseconds.min(i32::MAX as u64) as i32;
    let promise = js_sys::Promise::new(&mut |resolve, _reject| {
        if window
            .set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, delay)
            .is_err()
        {
            let _ = resolve.call0(&JsValue::NULL);
        }
    });
    let _ = JsFuture::from(promise).await;
}

/// `Sleeper` backed by setTimeout
#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserSleeper;

#[async_trait(?Send)]
impl Sleeper for BrowserSleeper {
    async fn sleep(&self, duration: Duration) {
        sleep_ms(duration.as_millis() as u64).await;
    }
}

/// Best-effort text of a thrown JS value
pub fn js_error_text(value: &JsValue) -> String {
    if let Some(text) = value.as_string() {
        return text;
    }
    if let Ok(message) = js_sys::Reflect::get(value, &JsValue::from_str("message")) {
        if let Some(text) = message.as_string() {
            return text;
        }
    }
    format!("{:?}", value)
}
