use crate::model::Student;
use chrono::NaiveDate;
use thiserror::Error;

/// Failure talking to the attendance backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// No response reached us (connect, timeout, broken body stream).
    #[error("backend unreachable: {0}")]
    Transport(String),

    /// The backend answered with a non-success status.
    #[error("backend rejected request with status {status}")]
    Rejected { status: u16, message: Option<String> },

    /// A success response whose body could not be decoded.
    #[error("malformed backend response: {0}")]
    Malformed(String),
}

impl BackendError {
    pub fn code(&self) -> &'static str {
        match self {
            BackendError::Transport(_) => "transport_failed",
            BackendError::Rejected { .. } => "server_rejected",
            BackendError::Malformed(_) => "bad_response",
        }
    }

    /// Text for the user. The server's own message wins when it sent one.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            BackendError::Transport(_) | BackendError::Malformed(_) => {
                format!("{}. Check the connection and try again.", fallback)
            }
            BackendError::Rejected {
                message: Some(m), ..
            } => m.clone(),
            BackendError::Rejected { message: None, .. } => fallback.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum DraftError {
    #[error("no attendance roster is loaded")]
    NoRoster,

    #[error("no unsaved changes to save")]
    NothingToCommit,

    #[error(
        "Please mark every student before finishing ({} unmarked students: {})",
        .students.len(),
        joined_names(.students)
    )]
    Unmarked { students: Vec<Student> },

    #[error("a save is already in progress")]
    Busy,

    #[error("{0}")]
    Validation(String),

    #[error("result for {date} is no longer current")]
    Stale { date: NaiveDate },

    #[error(transparent)]
    Backend(#[from] BackendError),
}

fn joined_names(students: &[Student]) -> String {
    students
        .iter()
        .map(|s| s.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

impl DraftError {
    pub fn code(&self) -> &'static str {
        match self {
            DraftError::NoRoster => "no_roster",
            DraftError::NothingToCommit => "nothing_to_commit",
            DraftError::Unmarked { .. } => "unmarked_students",
            DraftError::Busy => "busy",
            DraftError::Validation(_) => "validation_failed",
            DraftError::Stale { .. } => "stale",
            DraftError::Backend(e) => e.code(),
        }
    }
}
