use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::NaiveDate;
use serde::Deserialize;

use crate::backend::AttendanceBackend;
use crate::config::Config;
use crate::draft::DraftManager;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Work that must leave the reader thread because it talks to the backend.
pub type Job = Box<dyn FnOnce() -> serde_json::Value + Send + 'static>;

pub enum Reply {
    Ready(serde_json::Value),
    Deferred(Job),
}

pub type SharedDraft = Arc<Mutex<DraftManager>>;

pub struct AppState {
    pub config: Config,
    pub backend: Arc<dyn AttendanceBackend>,
    pub draft: SharedDraft,
}

impl AppState {
    pub fn new(config: Config, backend: Arc<dyn AttendanceBackend>) -> Self {
        let draft = DraftManager::new(config.submit_grace());
        Self {
            config,
            backend,
            draft: Arc::new(Mutex::new(draft)),
        }
    }

    pub fn today(&self) -> NaiveDate {
        self.config.today()
    }
}

/// A panic on a worker must not wedge every later request.
pub fn lock_draft(draft: &Mutex<DraftManager>) -> MutexGuard<'_, DraftManager> {
    draft.lock().unwrap_or_else(PoisonError::into_inner)
}
