//! Client side of the attendance REST API.
//!
//! `AttendanceBackend` is the seam the draft handlers call through;
//! `HttpBackend` is the production implementation over blocking reqwest.
//! Every call is made from a worker thread, never while the draft lock is held.

use crate::config::Config;
use crate::error::BackendError;
use crate::model::{
    AttendanceReport, AttendanceStatus, NewStudentRequest, RosterRow, SaveEntry, SaveRequest,
    Student,
};
use anyhow::Context;
use chrono::NaiveDate;
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

pub trait AttendanceBackend: Send + Sync {
    /// `GET /attendance/daily?date=`
    fn daily(&self, date: NaiveDate) -> Result<Vec<RosterRow>, BackendError>;

    /// `POST /attendance/save`
    fn save(&self, date: NaiveDate, entries: &[SaveEntry]) -> Result<(), BackendError>;

    /// `POST /students`
    fn add_student(&self, request: &NewStudentRequest) -> Result<Student, BackendError>;

    /// Legacy `GET /students/search?name=`
    fn search_students(&self, name: &str) -> Result<Vec<Student>, BackendError>;

    /// Legacy `GET /attendance/report[?date=]`
    fn report(&self, date: Option<NaiveDate>) -> Result<AttendanceReport, BackendError>;
}

#[derive(Debug, Deserialize)]
struct DailyRowWire {
    id: i64,
    name: String,
    #[serde(default)]
    status: Option<String>,
}

impl DailyRowWire {
    fn into_row(self) -> Result<RosterRow, BackendError> {
        let status = match self.status.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(raw.parse::<AttendanceStatus>().map_err(|e| {
                BackendError::Malformed(format!("student {}: {}", self.id, e))
            })?),
        };
        Ok(RosterRow::new(self.id, self.name, status))
    }
}

pub(crate) fn decode_daily(body: &str) -> Result<Vec<RosterRow>, BackendError> {
    let wire: Vec<DailyRowWire> =
        serde_json::from_str(body).map_err(|e| BackendError::Malformed(e.to_string()))?;
    wire.into_iter().map(DailyRowWire::into_row).collect()
}

/// Pulls `message` out of a structured error body, if there is one.
pub(crate) fn rejection_message(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct ErrorBody {
        #[serde(default)]
        message: Option<String>,
    }
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.message)
        .filter(|m| !m.trim().is_empty())
}

pub struct HttpBackend {
    base_url: String,
    client: Client,
}

impl HttpBackend {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            base_url: config.base_url().to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn send(&self, builder: RequestBuilder, what: &str) -> Result<Response, BackendError> {
        let resp = builder.send().map_err(|e| {
            warn!(request = what, error = %e, "backend unreachable");
            BackendError::Transport(e.to_string())
        })?;
        let status = resp.status();
        if status.is_success() {
            debug!(request = what, status = status.as_u16(), "backend ok");
            return Ok(resp);
        }
        let body = resp.text().unwrap_or_default();
        let message = rejection_message(&body);
        warn!(
            request = what,
            status = status.as_u16(),
            message = message.as_deref().unwrap_or(""),
            "backend rejected request"
        );
        Err(BackendError::Rejected {
            status: status.as_u16(),
            message,
        })
    }

    fn body_text(resp: Response) -> Result<String, BackendError> {
        resp.text()
            .map_err(|e| BackendError::Transport(e.to_string()))
    }

    fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, BackendError> {
        let text = Self::body_text(resp)?;
        serde_json::from_str(&text).map_err(|e| BackendError::Malformed(e.to_string()))
    }
}

impl AttendanceBackend for HttpBackend {
    fn daily(&self, date: NaiveDate) -> Result<Vec<RosterRow>, BackendError> {
        let req = self
            .client
            .get(self.url("/attendance/daily"))
            .query(&[("date", date.to_string())]);
        let resp = self.send(req, "attendance.daily")?;
        decode_daily(&Self::body_text(resp)?)
    }

    fn save(&self, date: NaiveDate, entries: &[SaveEntry]) -> Result<(), BackendError> {
        let req = self
            .client
            .post(self.url("/attendance/save"))
            .json(&SaveRequest { date, entries });
        // 201 with an empty body; nothing to decode.
        self.send(req, "attendance.save").map(|_| ())
    }

    fn add_student(&self, request: &NewStudentRequest) -> Result<Student, BackendError> {
        let req = self.client.post(self.url("/students")).json(request);
        let resp = self.send(req, "students.create")?;
        Self::decode(resp)
    }

    fn search_students(&self, name: &str) -> Result<Vec<Student>, BackendError> {
        let req = self
            .client
            .get(self.url("/students/search"))
            .query(&[("name", name)]);
        let resp = self.send(req, "students.search")?;
        Self::decode(resp)
    }

    fn report(&self, date: Option<NaiveDate>) -> Result<AttendanceReport, BackendError> {
        let mut req = self.client.get(self.url("/attendance/report"));
        if let Some(d) = date {
            req = req.query(&[("date", d.to_string())]);
        }
        let resp = self.send(req, "attendance.report")?;
        Self::decode(resp)
    }
}
