use crate::ipc::error::ok;
use crate::ipc::types::{lock_draft, AppState, Reply, Request};
use serde_json::json;

fn handle_health(state: &AppState, req: &Request) -> serde_json::Value {
    let draft = lock_draft(&state.draft);
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "backendUrl": state.config.base_url(),
            "today": state.today(),
            "activeDate": draft.active_date(),
            "dirty": draft.is_dirty()
        }),
    )
}

pub fn try_handle(state: &AppState, req: &Request) -> Option<Reply> {
    match req.method.as_str() {
        "health" => Some(Reply::Ready(handle_health(state, req))),
        _ => None,
    }
}
