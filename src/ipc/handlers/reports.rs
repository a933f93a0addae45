use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{deferred, get_optional_date};
use crate::ipc::types::{AppState, Reply, Request};
use serde_json::json;
use std::sync::Arc;

const REPORT_FAILED: &str = "Failed to load attendance report";

/// Server-computed summary for a date. The draft's own summary is in every
/// draft view; this one reflects what is saved.
fn handle_report_get(state: &AppState, req: &Request) -> Reply {
    let date = match get_optional_date(&req.params, "date") {
        Ok(v) => v,
        Err(error) => return Reply::Ready(error.response(&req.id)),
    };
    let backend = Arc::clone(&state.backend);
    deferred(req, move || {
        let report = backend
            .report(date)
            .map_err(|e| HandlerErr::from_backend(&e, REPORT_FAILED))?;
        Ok(json!({ "date": date, "report": report }))
    })
}

pub fn try_handle(state: &AppState, req: &Request) -> Option<Reply> {
    match req.method.as_str() {
        "report.get" => Some(handle_report_get(state, req)),
        _ => None,
    }
}
