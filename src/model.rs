use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttendanceStatus {
    Present,
    Absent,
}

impl AttendanceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AttendanceStatus::Present => "PRESENT",
            AttendanceStatus::Absent => "ABSENT",
        }
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttendanceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PRESENT" => Ok(AttendanceStatus::Present),
            "ABSENT" => Ok(AttendanceStatus::Absent),
            other => Err(format!("unknown attendance status: {:?}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: i64,
    pub name: String,
}

/// One student on the roster for the active date. `status: None` is unset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RosterRow {
    pub id: i64,
    pub name: String,
    pub status: Option<AttendanceStatus>,
}

impl RosterRow {
    pub fn new(id: i64, name: impl Into<String>, status: Option<AttendanceStatus>) -> Self {
        Self {
            id,
            name: name.into(),
            status,
        }
    }

    pub fn student(&self) -> Student {
        Student {
            id: self.id,
            name: self.name.clone(),
        }
    }
}

/// 1-decimal half-up rounding: `floor(10*x + 0.5) / 10`.
pub fn round_off_1_decimal(x: f64) -> f64 {
    ((10.0 * x) + 0.5).floor() / 10.0
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total: usize,
    pub present: usize,
    pub absent: usize,
    pub unmarked: usize,
    pub rate: f64,
}

impl Summary {
    pub fn of<'a, I>(rows: I) -> Summary
    where
        I: IntoIterator<Item = &'a RosterRow>,
    {
        let mut total = 0usize;
        let mut present = 0usize;
        let mut absent = 0usize;
        for row in rows {
            total += 1;
            match row.status {
                Some(AttendanceStatus::Present) => present += 1,
                Some(AttendanceStatus::Absent) => absent += 1,
                None => {}
            }
        }
        let rate = if total > 0 {
            round_off_1_decimal(100.0 * present as f64 / total as f64)
        } else {
            0.0
        };
        Summary {
            total,
            present,
            absent,
            unmarked: total - present - absent,
            rate,
        }
    }
}

/// Server-side summary from the legacy report endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceReport {
    pub total_students: u64,
    pub present_count: u64,
    pub absent_count: u64,
    pub attendance_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveEntry {
    pub student_id: i64,
    pub status: AttendanceStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct SaveRequest<'a> {
    pub date: NaiveDate,
    pub entries: &'a [SaveEntry],
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStudentRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation_date: Option<NaiveDate>,
}
