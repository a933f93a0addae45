use super::handlers;
use super::types::{AppState, Reply, Request};
use crate::ipc::error::err;
use tracing::debug;

pub fn handle_request(state: &AppState, req: Request) -> Reply {
    debug!(id = %req.id, method = %req.method, "dispatch");
    if let Some(reply) = handlers::core::try_handle(state, &req) {
        return reply;
    }
    if let Some(reply) = handlers::attendance::try_handle(state, &req) {
        return reply;
    }
    if let Some(reply) = handlers::students::try_handle(state, &req) {
        return reply;
    }
    if let Some(reply) = handlers::reports::try_handle(state, &req) {
        return reply;
    }

    Reply::Ready(err(
        &req.id,
        "not_implemented",
        format!("unknown method: {}", req.method),
        None,
    ))
}
