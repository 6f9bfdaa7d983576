use axum::extract::rejection::JsonRejection;
use axum::extract::FromRequest;

use crate::error::WayfareError;

/// `axum::Json` whose rejections render as v1 `invalid_request` envelopes.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(WayfareError))]
pub struct AppJson<T>(pub T);

impl From<JsonRejection> for WayfareError {
    fn from(rejection: JsonRejection) -> Self {
        map_json_rejection(rejection)
    }
}

fn map_json_rejection(rejection: JsonRejection) -> WayfareError {
    match rejection {
        JsonRejection::JsonDataError(err) => {
            let message = err.body_text();
            if let Some(field) = extract_missing_field(&message) {
                WayfareError::validation(format!("Missing required field: {field}"))
            } else {
                WayfareError::validation(format!("Invalid JSON: {message}"))
            }
        }
        JsonRejection::JsonSyntaxError(err) => {
            WayfareError::validation(format!("JSON syntax error: {}", err.body_text()))
        }
        JsonRejection::MissingJsonContentType(_) => {
            WayfareError::validation("Missing `Content-Type: application/json` header")
        }
        JsonRejection::BytesRejection(_) => {
            WayfareError::Internal("Failed to read request body".to_string())
        }
        _ => WayfareError::validation(rejection.body_text()),
    }
}

fn extract_missing_field(message: &str) -> Option<&str> {
    let prefix = "missing field `";
    let start = message.find(prefix)? + prefix.len();
    let remaining = message.get(start..)?;
    let end = remaining.find('`')?;
    remaining.get(..end)
}
