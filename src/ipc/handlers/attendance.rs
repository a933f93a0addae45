use crate::backend::AttendanceBackend;
use crate::dates::{self, DateNav};
use crate::draft::{CommitSettled, CommitTicket, LoadTicket};
use crate::error::DraftError;
use crate::export::{export_filename, render_csv};
use crate::ipc::error::{ok, HandlerErr};
use crate::ipc::helpers::{
    deferred, get_bool, get_optional_date, get_optional_str, get_required_i64, get_required_str,
    get_status, ready,
};
use crate::ipc::types::{lock_draft, AppState, Reply, Request, SharedDraft};
use crate::notice::Notice;
use chrono::NaiveDate;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

pub const LOAD_FAILED: &str = "Failed to load attendance";
pub const SAVE_FAILED: &str = "Failed to save attendance";
const EXPORT_FAILED: &str = "Failed to export CSV";

/// Fetches the ticket's date and applies it. Shared by load, navigate,
/// post-commit refresh and the add-student refresh.
pub(crate) fn load_into_draft(
    backend: &dyn AttendanceBackend,
    draft: &SharedDraft,
    ticket: LoadTicket,
) -> Result<serde_json::Value, HandlerErr> {
    let date = ticket.date;
    let fetched = backend.daily(date);
    let mut guard = lock_draft(draft);
    match guard.apply_load(ticket, fetched) {
        Ok(()) => {
            info!(date = %date, rows = guard.entries().len(), "roster loaded");
            Ok(json!({ "draft": guard.view() }))
        }
        Err(e) => {
            warn!(date = %date, error = %e, "roster load not applied");
            Err(HandlerErr::from_draft(e, LOAD_FAILED).with_detail("draft", json!(guard.view())))
        }
    }
}

fn start_load(state: &AppState, req: &Request, date: NaiveDate) -> Reply {
    let ticket = lock_draft(&state.draft).begin_load(date);
    let backend = Arc::clone(&state.backend);
    let draft = Arc::clone(&state.draft);
    deferred(req, move || load_into_draft(backend.as_ref(), &draft, ticket))
}

fn handle_draft_load(state: &AppState, req: &Request) -> Reply {
    match get_optional_date(&req.params, "date") {
        Ok(date) => start_load(state, req, date.unwrap_or_else(|| state.today())),
        Err(error) => Reply::Ready(error.response(&req.id)),
    }
}

fn handle_draft_navigate(state: &AppState, req: &Request) -> Reply {
    let nav = get_required_str(&req.params, "to")
        .and_then(|raw| DateNav::parse(&raw).map_err(HandlerErr::bad_params));
    let nav = match nav {
        Ok(v) => v,
        Err(error) => return Reply::Ready(error.response(&req.id)),
    };
    let active = lock_draft(&state.draft).active_date();
    let date = nav.resolve(active, state.today());
    debug!(from = ?active, to = %date, "navigate");
    start_load(state, req, date)
}

fn draft_view(draft: &SharedDraft) -> Result<serde_json::Value, HandlerErr> {
    Ok(json!({ "draft": lock_draft(draft).view() }))
}

fn draft_set_status(
    draft: &SharedDraft,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_i64(params, "studentId")?;
    let status = get_status(params)?;
    let mut guard = lock_draft(draft);
    if guard.active_date().is_none() {
        return Err(HandlerErr::from_draft(DraftError::NoRoster, SAVE_FAILED));
    }
    let applied = guard.set_status(student_id, status);
    if !applied {
        debug!(student_id, "status change for student not on roster ignored");
    }
    Ok(json!({ "applied": applied, "draft": guard.view() }))
}

fn draft_set_all(
    draft: &SharedDraft,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let status = get_status(params)?;
    let confirmed = get_bool(params, "confirmed", false);
    let mut guard = lock_draft(draft);
    let Some(date) = guard.active_date() else {
        return Err(HandlerErr::from_draft(DraftError::NoRoster, SAVE_FAILED));
    };
    if !confirmed {
        let count = guard.entries().len();
        let prompt = format!(
            "Mark all {} students as {} for {}?",
            count,
            status,
            dates::long_label(date)
        );
        return Err(HandlerErr::new("confirmation_required", prompt)
            .with_detail("count", json!(count))
            .with_detail("status", json!(status))
            .with_detail("date", json!(date)));
    }
    let updated = guard
        .set_all_status(status)
        .map_err(|e| HandlerErr::from_draft(e, SAVE_FAILED))?;
    Ok(json!({
        "updated": updated,
        "notice": Notice::success(format!("All students marked as {} (not saved yet)", status)),
        "draft": guard.view()
    }))
}

fn draft_filter(
    draft: &SharedDraft,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let query = params.get("query").and_then(|v| v.as_str()).unwrap_or("");
    let mut guard = lock_draft(draft);
    guard.set_query(query);
    let rows = guard.filter(query);
    Ok(json!({ "rows": rows, "draft": guard.view() }))
}

fn run_commit(
    backend: &dyn AttendanceBackend,
    draft: &SharedDraft,
    ticket: CommitTicket,
) -> Result<serde_json::Value, HandlerErr> {
    let commit_id = ticket.commit_id.clone();
    let date = ticket.date;
    let sent = ticket.entries.len();
    let saved = backend.save(date, &ticket.entries);
    let saved_ok = saved.is_ok();

    let settled = {
        let mut guard = lock_draft(draft);
        match guard.finish_commit(ticket, saved, Instant::now()) {
            Ok(s) => s,
            Err(e) => {
                warn!(commit_id = %commit_id, date = %date, error = %e, "commit not applied");
                return Err(HandlerErr::from_draft(e, SAVE_FAILED)
                    .with_detail("commitId", json!(commit_id))
                    .with_detail("saved", json!(saved_ok))
                    .with_detail("draft", json!(guard.view())));
            }
        }
    };
    info!(commit_id = %commit_id, date = %date, entries = sent, "commit accepted");

    let saved_msg = format!("Attendance saved for {}", dates::long_label(date));
    let reload = match settled {
        CommitSettled::Reload(reload) => reload,
        CommitSettled::StillDirty => {
            return Ok(json!({
                "committed": true,
                "commitId": commit_id,
                "reloaded": false,
                "notice": Notice::info(format!("{}; newer changes are not saved yet", saved_msg)),
                "draft": lock_draft(draft).view()
            }));
        }
        CommitSettled::LoadPending => {
            return Ok(json!({
                "committed": true,
                "commitId": commit_id,
                "reloaded": false,
                "notice": Notice::success(saved_msg),
                "draft": lock_draft(draft).view()
            }));
        }
    };
    match load_into_draft(backend, draft, reload) {
        Ok(mut result) => {
            result["committed"] = json!(true);
            result["commitId"] = json!(commit_id);
            result["reloaded"] = json!(true);
            result["notice"] = json!(Notice::success(saved_msg));
            Ok(result)
        }
        Err(error) => Ok(json!({
            "committed": true,
            "commitId": commit_id,
            "reloaded": false,
            "notice": Notice::info(format!("{}, but refreshing failed: {}", saved_msg, error.message)),
            "draft": lock_draft(draft).view()
        })),
    }
}

fn handle_draft_commit(state: &AppState, req: &Request) -> Reply {
    let begun = {
        let mut guard = lock_draft(&state.draft);
        guard
            .begin_commit(Instant::now())
            .map_err(|e| (e, guard.view()))
    };
    let ticket = match begun {
        Ok(ticket) => ticket,
        Err((DraftError::NothingToCommit, view)) => {
            return Reply::Ready(ok(
                &req.id,
                json!({
                    "committed": false,
                    "notice": Notice::info("No unsaved changes to save"),
                    "draft": view
                }),
            ));
        }
        Err((e, view)) => {
            debug!(error = %e, "commit refused");
            return Reply::Ready(
                HandlerErr::from_draft(e, SAVE_FAILED)
                    .with_detail("draft", json!(view))
                    .response(&req.id),
            );
        }
    };
    info!(
        commit_id = %ticket.commit_id,
        date = %ticket.date,
        entries = ticket.entries.len(),
        "commit started"
    );
    let backend = Arc::clone(&state.backend);
    let draft = Arc::clone(&state.draft);
    deferred(req, move || run_commit(backend.as_ref(), &draft, ticket))
}

fn draft_export(
    draft: &SharedDraft,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let include_date = get_bool(params, "includeDate", true);
    let (date, rows) = lock_draft(draft)
        .export_snapshot()
        .map_err(|e| HandlerErr::from_draft(e, EXPORT_FAILED))?;
    let filename = export_filename(date);
    let csv = render_csv(&rows, include_date);
    let mut result = json!({
        "filename": filename,
        "rowsExported": rows.len(),
        "csv": csv,
    });

    if let Some(out_path) = get_optional_str(params, "outPath") {
        let mut out = PathBuf::from(&out_path);
        if out.is_dir() {
            out = out.join(&filename);
        }
        if let Some(parent) = out.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                HandlerErr::new("io_failed", e.to_string())
                    .with_detail("path", json!(out_path))
            })?;
        }
        std::fs::write(&out, &csv).map_err(|e| {
            HandlerErr::new("io_failed", e.to_string()).with_detail("path", json!(out_path))
        })?;
        info!(path = %out.display(), rows = rows.len(), "attendance exported");
        result["path"] = json!(out.to_string_lossy());
    }

    result["notice"] = json!(Notice::success(format!("Exported {}", filename)));
    Ok(result)
}

pub fn try_handle(state: &AppState, req: &Request) -> Option<Reply> {
    match req.method.as_str() {
        "draft.load" => Some(handle_draft_load(state, req)),
        "draft.navigate" => Some(handle_draft_navigate(state, req)),
        "draft.view" => Some(ready(req, draft_view(&state.draft))),
        "draft.setStatus" => Some(ready(req, draft_set_status(&state.draft, &req.params))),
        "draft.setAll" => Some(ready(req, draft_set_all(&state.draft, &req.params))),
        "draft.filter" => Some(ready(req, draft_filter(&state.draft, &req.params))),
        "draft.commit" => Some(handle_draft_commit(state, req)),
        "draft.export" => Some(ready(req, draft_export(&state.draft, &req.params))),
        _ => None,
    }
}
