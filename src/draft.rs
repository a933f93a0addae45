//! The attendance draft: one day's roster staged locally until committed.
//!
//! Backend calls never happen here. Callers take a ticket (`begin_load`,
//! `begin_commit`), release the lock, talk to the backend, then hand the
//! result back (`apply_load`, `finish_commit`). Tickets carry enough state to
//! tell whether the result still belongs to what is on screen.

use crate::dates;
use crate::error::{BackendError, DraftError};
use crate::export::ExportRow;
use crate::model::{AttendanceStatus, RosterRow, SaveEntry, Student, Summary};
use chrono::NaiveDate;
use serde::Serialize;
use std::time::{Duration, Instant};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    pub date: NaiveDate,
    generation: u64,
    /// Set on post-commit reloads: local edits made after this point win.
    edit_seq: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitTicket {
    pub commit_id: String,
    pub date: NaiveDate,
    /// Exactly what is sent; edits after `begin_commit` are not included.
    pub entries: Vec<SaveEntry>,
    generation: u64,
    edit_seq: u64,
}

/// Outcome of a commit the backend accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitSettled {
    /// Buffer is clean; fetch the date again with this ticket.
    Reload(LoadTicket),
    /// Edits landed while the save was in flight; they stay staged.
    StillDirty,
    /// Buffer is clean, but a load started meanwhile will replace it.
    LoadPending,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftView {
    pub date: Option<NaiveDate>,
    pub date_label: Option<String>,
    pub dirty: bool,
    pub commit_pending: bool,
    pub query: String,
    pub rows: Vec<RosterRow>,
    pub total_rows: usize,
    pub summary: Summary,
}

pub struct DraftManager {
    date: Option<NaiveDate>,
    entries: Vec<RosterRow>,
    dirty: bool,
    query: String,
    load_generation: u64,
    /// Generation of the load whose rows are in the buffer.
    applied_generation: u64,
    pending_load: Option<u64>,
    edit_seq: u64,
    pending_commit: Option<String>,
    settled_at: Option<Instant>,
    submit_grace: Duration,
}

fn matches_query(row: &RosterRow, needle: &str) -> bool {
    needle.is_empty()
        || row.name.to_lowercase().contains(needle)
        || row.id.to_string().contains(needle)
}

impl DraftManager {
    pub fn new(submit_grace: Duration) -> Self {
        Self {
            date: None,
            entries: Vec::new(),
            dirty: false,
            query: String::new(),
            load_generation: 0,
            applied_generation: 0,
            pending_load: None,
            edit_seq: 0,
            pending_commit: None,
            settled_at: None,
            submit_grace,
        }
    }

    pub fn active_date(&self) -> Option<NaiveDate> {
        self.date
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn commit_pending(&self) -> bool {
        self.pending_commit.is_some()
    }

    pub fn entries(&self) -> &[RosterRow] {
        &self.entries
    }

    /// Supersedes every earlier load. A commit in flight goes stale only once
    /// this load is applied.
    pub fn begin_load(&mut self, date: NaiveDate) -> LoadTicket {
        self.load_generation += 1;
        self.pending_load = Some(self.load_generation);
        LoadTicket {
            date,
            generation: self.load_generation,
            edit_seq: None,
        }
    }

    /// Replaces the buffer on success. On failure, or when a newer load was
    /// requested meanwhile, the buffer is left exactly as it was.
    pub fn apply_load(
        &mut self,
        ticket: LoadTicket,
        fetched: Result<Vec<RosterRow>, BackendError>,
    ) -> Result<(), DraftError> {
        if ticket.generation != self.load_generation {
            return Err(DraftError::Stale { date: ticket.date });
        }
        self.pending_load = None;
        if ticket.edit_seq.is_some_and(|seq| seq != self.edit_seq) {
            return Err(DraftError::Stale { date: ticket.date });
        }
        let rows = fetched?;
        self.applied_generation = ticket.generation;
        self.date = Some(ticket.date);
        self.entries = rows;
        self.dirty = false;
        self.edit_seq += 1;
        Ok(())
    }

    /// Returns false (and changes nothing) when the student is not on the roster.
    pub fn set_status(&mut self, student_id: i64, status: AttendanceStatus) -> bool {
        let Some(entry) = self.entries.iter_mut().find(|e| e.id == student_id) else {
            return false;
        };
        entry.status = Some(status);
        self.dirty = true;
        self.edit_seq += 1;
        true
    }

    /// Bulk overwrite. Callers must have the user's confirmation first.
    pub fn set_all_status(&mut self, status: AttendanceStatus) -> Result<usize, DraftError> {
        if self.date.is_none() {
            return Err(DraftError::NoRoster);
        }
        for entry in &mut self.entries {
            entry.status = Some(status);
        }
        self.dirty = true;
        self.edit_seq += 1;
        Ok(self.entries.len())
    }

    pub fn unmarked(&self) -> Vec<Student> {
        self.entries
            .iter()
            .filter(|e| e.status.is_none())
            .map(RosterRow::student)
            .collect()
    }

    pub fn begin_commit(&mut self, now: Instant) -> Result<CommitTicket, DraftError> {
        let Some(date) = self.date else {
            return Err(DraftError::NoRoster);
        };
        if self.pending_commit.is_some() {
            return Err(DraftError::Busy);
        }
        if let Some(settled) = self.settled_at {
            if now.saturating_duration_since(settled) < self.submit_grace {
                return Err(DraftError::Busy);
            }
        }
        if !self.dirty {
            return Err(DraftError::NothingToCommit);
        }
        let unmarked = self.unmarked();
        if !unmarked.is_empty() {
            return Err(DraftError::Unmarked { students: unmarked });
        }

        let entries = self
            .entries
            .iter()
            .filter_map(|e| {
                e.status.map(|status| SaveEntry {
                    student_id: e.id,
                    status,
                })
            })
            .collect();
        let commit_id = Uuid::new_v4().to_string();
        self.pending_commit = Some(commit_id.clone());
        Ok(CommitTicket {
            commit_id,
            date,
            entries,
            generation: self.applied_generation,
            edit_seq: self.edit_seq,
        })
    }

    pub fn finish_commit(
        &mut self,
        ticket: CommitTicket,
        saved: Result<(), BackendError>,
        now: Instant,
    ) -> Result<CommitSettled, DraftError> {
        if self.pending_commit.as_deref() == Some(ticket.commit_id.as_str()) {
            self.pending_commit = None;
            self.settled_at = Some(now);
        }
        // Only a load that replaced the buffer makes the result stale; one
        // still in flight or one that failed leaves the committed day on screen.
        if ticket.generation != self.applied_generation || self.date != Some(ticket.date) {
            return Err(DraftError::Stale { date: ticket.date });
        }
        saved?;
        if ticket.edit_seq != self.edit_seq {
            return Ok(CommitSettled::StillDirty);
        }
        self.dirty = false;
        if self.pending_load.is_some() {
            return Ok(CommitSettled::LoadPending);
        }
        let mut reload = self.begin_load(ticket.date);
        reload.edit_seq = Some(self.edit_seq);
        Ok(CommitSettled::Reload(reload))
    }

    /// Pure projection: case-insensitive match on name or id, buffer order kept.
    pub fn filter(&self, query: &str) -> Vec<RosterRow> {
        let needle = query.trim().to_lowercase();
        self.entries
            .iter()
            .filter(|row| matches_query(row, &needle))
            .cloned()
            .collect()
    }

    /// Remembers the query so later views show the same selection.
    pub fn set_query(&mut self, query: &str) {
        self.query = query.trim().to_string();
    }

    pub fn summary(&self) -> Summary {
        Summary::of(&self.entries)
    }

    /// Partial drafts export fine; unset statuses come out empty.
    pub fn export_snapshot(&self) -> Result<(NaiveDate, Vec<ExportRow>), DraftError> {
        let Some(date) = self.date else {
            return Err(DraftError::NoRoster);
        };
        let rows = self
            .entries
            .iter()
            .map(|e| ExportRow {
                id: e.id,
                name: e.name.clone(),
                status: e.status,
                date,
            })
            .collect();
        Ok((date, rows))
    }

    pub fn view(&self) -> DraftView {
        DraftView {
            date: self.date,
            date_label: self.date.map(dates::long_label),
            dirty: self.dirty,
            commit_pending: self.commit_pending(),
            query: self.query.clone(),
            rows: self.filter(&self.query),
            total_rows: self.entries.len(),
            summary: self.summary(),
        }
    }
}
