use super::error::{ok, HandlerErr};
use super::types::{Reply, Request};
use crate::dates;
use crate::model::AttendanceStatus;
use chrono::NaiveDate;

pub fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn get_optional_str(params: &serde_json::Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn get_required_i64(params: &serde_json::Value, key: &str) -> Result<i64, HandlerErr> {
    let Some(v) = params.get(key) else {
        return Err(HandlerErr::bad_params(format!("missing {}", key)));
    };
    // Surfaces built on JS sometimes send ids as strings.
    v.as_i64()
        .or_else(|| v.as_str().and_then(|s| s.trim().parse::<i64>().ok()))
        .ok_or_else(|| HandlerErr::bad_params(format!("{} must be an integer", key)))
}

pub fn get_bool(params: &serde_json::Value, key: &str, default: bool) -> bool {
    params.get(key).and_then(|v| v.as_bool()).unwrap_or(default)
}

pub fn get_status(params: &serde_json::Value) -> Result<AttendanceStatus, HandlerErr> {
    get_required_str(params, "status")?
        .parse::<AttendanceStatus>()
        .map_err(HandlerErr::bad_params)
}

pub fn get_optional_date(
    params: &serde_json::Value,
    key: &str,
) -> Result<Option<NaiveDate>, HandlerErr> {
    match get_optional_str(params, key) {
        None => Ok(None),
        Some(raw) => dates::parse_date(&raw)
            .map(Some)
            .map_err(HandlerErr::bad_params),
    }
}

pub fn respond(id: &str, result: Result<serde_json::Value, HandlerErr>) -> serde_json::Value {
    match result {
        Ok(value) => ok(id, value),
        Err(error) => error.response(id),
    }
}

pub fn ready(req: &Request, result: Result<serde_json::Value, HandlerErr>) -> Reply {
    Reply::Ready(respond(&req.id, result))
}

/// Runs `work` off the reader thread; the reply is correlated by request id.
pub fn deferred<F>(req: &Request, work: F) -> Reply
where
    F: FnOnce() -> Result<serde_json::Value, HandlerErr> + Send + 'static,
{
    let id = req.id.clone();
    Reply::Deferred(Box::new(move || respond(&id, work())))
}
