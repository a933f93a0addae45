use crate::model::AttendanceStatus;
use chrono::NaiveDate;

pub const CSV_HEADER: &str = "Student ID,Student Name,Attendance Status";
pub const CSV_DATE_COLUMN: &str = "Attendance Date";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRow {
    pub id: i64,
    pub name: String,
    pub status: Option<AttendanceStatus>,
    pub date: NaiveDate,
}

pub fn export_filename(date: NaiveDate) -> String {
    format!("attendance_{}.csv", date)
}

fn csv_quote(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

/// Header plus one line per row, `\n`-joined with no trailing newline.
pub fn render_csv(rows: &[ExportRow], include_date: bool) -> String {
    let mut lines: Vec<String> = Vec::with_capacity(rows.len() + 1);
    if include_date {
        lines.push(format!("{},{}", CSV_HEADER, CSV_DATE_COLUMN));
    } else {
        lines.push(CSV_HEADER.to_string());
    }
    for row in rows {
        let status = row.status.map(|s| s.as_str()).unwrap_or("");
        let mut line = format!("{},{},{}", row.id, csv_quote(&row.name), status);
        if include_date {
            line.push(',');
            line.push_str(&row.date.to_string());
        }
        lines.push(line);
    }
    lines.join("\n")
}
