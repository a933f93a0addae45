use crate::error::{BackendError, DraftError};
use crate::notice::Notice;
use serde_json::json;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

#[derive(Debug)]
pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_params(message: impl Into<String>) -> Self {
        Self::new("bad_params", message)
    }

    pub fn with_detail(mut self, key: &str, value: serde_json::Value) -> Self {
        let details = self.details.get_or_insert_with(|| json!({}));
        details[key] = value;
        self
    }

    pub fn from_backend(error: &BackendError, fallback: &str) -> Self {
        let mut out = Self::new(error.code(), error.user_message(fallback));
        if let BackendError::Rejected { status, .. } = error {
            out = out.with_detail("status", json!(status));
        }
        out
    }

    pub fn from_draft(error: DraftError, fallback: &str) -> Self {
        let code = error.code();
        let message = error.to_string();
        match error {
            DraftError::Backend(e) => Self::from_backend(&e, fallback),
            DraftError::Unmarked { students } => {
                Self::new(code, message).with_detail("unmarked", json!(students))
            }
            DraftError::Stale { date } => Self::new(code, message).with_detail("date", json!(date)),
            _ => Self::new(code, message),
        }
    }

    /// Error replies carry a ready-made notice so the surface can show them
    /// like any other transient message.
    pub fn response(self, id: &str) -> serde_json::Value {
        let notice = Notice::error(self.message.clone());
        let HandlerErr {
            code,
            message,
            details,
        } = self.with_detail("notice", json!(notice));
        err(id, code, message, details)
    }
}
