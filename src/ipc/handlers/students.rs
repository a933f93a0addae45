use super::attendance::load_into_draft;
use crate::backend::AttendanceBackend;
use crate::error::DraftError;
use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{deferred, get_optional_date, get_optional_str};
use crate::ipc::types::{lock_draft, AppState, Reply, Request, SharedDraft};
use crate::model::NewStudentRequest;
use crate::notice::Notice;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

const ADD_FAILED: &str = "Failed to add student";
const SEARCH_FAILED: &str = "Failed to search students";

fn parse_new_student(params: &serde_json::Value) -> Result<NewStudentRequest, HandlerErr> {
    let Some(name) = get_optional_str(params, "name") else {
        return Err(HandlerErr::from_draft(
            DraftError::Validation("Please enter a student name".to_string()),
            ADD_FAILED,
        ));
    };
    Ok(NewStudentRequest {
        name,
        creation_date: get_optional_date(params, "creationDate")?,
    })
}

fn add_student(
    backend: &dyn AttendanceBackend,
    draft: &SharedDraft,
    request: NewStudentRequest,
) -> Result<serde_json::Value, HandlerErr> {
    let student = backend
        .add_student(&request)
        .map_err(|e| HandlerErr::from_backend(&e, ADD_FAILED))?;
    info!(student_id = student.id, "student added");
    let notice = Notice::success(format!(
        "Student \"{}\" added successfully! ID: {}",
        student.name, student.id
    ));

    // A clean draft is refreshed so the new student shows up; a dirty one is
    // left alone and the surface is told the roster may be behind.
    let (reload, has_roster) = {
        let mut guard = lock_draft(draft);
        match guard.active_date() {
            Some(date) if !guard.is_dirty() && !guard.commit_pending() => {
                (Some(guard.begin_load(date)), true)
            }
            date => (None, date.is_some()),
        }
    };
    let roster_stale = match reload {
        Some(ticket) => load_into_draft(backend, draft, ticket).is_err(),
        None => has_roster,
    };
    Ok(json!({
        "student": student,
        "rosterStale": roster_stale,
        "notice": notice,
        "draft": lock_draft(draft).view()
    }))
}

fn handle_students_add(state: &AppState, req: &Request) -> Reply {
    let request = match parse_new_student(&req.params) {
        Ok(v) => v,
        Err(error) => return Reply::Ready(error.response(&req.id)),
    };
    let backend = Arc::clone(&state.backend);
    let draft = Arc::clone(&state.draft);
    deferred(req, move || add_student(backend.as_ref(), &draft, request))
}

fn handle_students_search(state: &AppState, req: &Request) -> Reply {
    let name = get_optional_str(&req.params, "name").unwrap_or_default();
    let backend = Arc::clone(&state.backend);
    deferred(req, move || {
        let students = backend
            .search_students(&name)
            .map_err(|e| HandlerErr::from_backend(&e, SEARCH_FAILED))?;
        Ok(json!({ "students": students }))
    })
}

pub fn try_handle(state: &AppState, req: &Request) -> Option<Reply> {
    match req.method.as_str() {
        "students.add" => Some(handle_students_add(state, req)),
        "students.search" => Some(handle_students_search(state, req)),
        _ => None,
    }
}
