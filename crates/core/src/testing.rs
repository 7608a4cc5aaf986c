//! Helpers for tests that exercise definitions end to end.

use std::sync::{Arc, Mutex};

use crate::definition::ErrorHook;
use crate::error::AssertionError;
use crate::Response;

/// Failures recorded by [`recording_hook`].
pub type Recorded = Arc<Mutex<Vec<(AssertionError, Response)>>>;

/// An error hook that stores every failure it receives.
pub fn recording_hook() -> (ErrorHook, Recorded) {
    let recorded: Recorded = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&recorded);
    let hook = ErrorHook::new(move |failure| {
        if let Ok(mut entries) = sink.lock() {
            entries.push((failure.error.clone(), failure.response.clone()));
        }
    });
    (hook, recorded)
}

/// JSON response with the given status.
pub fn json_response(status: u16, body: serde_json::Value) -> Response {
    Response::new(
        status,
        [("content-type".to_string(), "application/json".to_string())].into(),
        body.to_string(),
    )
}
