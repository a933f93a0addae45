use chrono::{Local, NaiveDate};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    let trimmed = raw.trim();
    NaiveDate::parse_from_str(trimmed, DATE_FORMAT)
        .map_err(|_| format!("invalid date {:?}; use YYYY-MM-DD", trimmed))
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// "Friday, January 5, 2024"
pub fn long_label(date: NaiveDate) -> String {
    date.format("%A, %B %-d, %Y").to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateNav {
    Today,
    Previous,
    Next,
    On(NaiveDate),
}

impl DateNav {
    pub fn parse(raw: &str) -> Result<DateNav, String> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "today" => Ok(DateNav::Today),
            "prev" | "previous" => Ok(DateNav::Previous),
            "next" => Ok(DateNav::Next),
            other => parse_date(other).map(DateNav::On),
        }
    }

    /// Previous/next step from the active date, or from today when nothing is loaded.
    pub fn resolve(self, active: Option<NaiveDate>, today: NaiveDate) -> NaiveDate {
        let base = active.unwrap_or(today);
        match self {
            DateNav::Today => today,
            DateNav::Previous => base.pred_opt().unwrap_or(base),
            DateNav::Next => base.succ_opt().unwrap_or(base),
            DateNav::On(d) => d,
        }
    }
}
