//! Domain models for daily attendance.

use chrono::NaiveDate;

use super::intake::KidId;

/// Absence reason written when an absence is committed without one
pub const UNSPECIFIED_ABSENCE_REASON: &str = "unspecified";

/// One child's attendance on one date, as confirmed by the server
#[derive(Debug, Clone, PartialEq)]
pub struct AttendanceRecord {
    /// Assigned by the server on first save
    pub attendance_id: Option<i64>,
    pub kid_id: KidId,
    pub attendance_date: NaiveDate,
    pub is_present: Option<bool>,
    pub absence_reason: Option<String>,
    pub reported_by: Option<String>,
}

/// Three-valued presence. `Unknown` is never folded into either of the others.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Presence {
    Present,
    Absent,
    Unknown,
}

impl Presence {
    pub fn from_flag(flag: Option<bool>) -> Self {
        match flag {
            Some(true) => Presence::Present,
            Some(false) => Presence::Absent,
            None => Presence::Unknown,
        }
    }

    /// Value a toggle stores as the pending override. Unknown children
    /// are marked present on first toggle.
    pub fn toggled(&self) -> bool {
        !matches!(self, Presence::Present)
    }
}

/// Present/absent/unknown counts over a set of children
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AttendanceStats {
    pub present: usize,
    pub absent: usize,
    pub unknown: usize,
    pub total: usize,
}

impl AttendanceStats {
    pub fn record(&mut self, presence: Presence) {
        match presence {
            Presence::Present => self.present += 1,
            Presence::Absent => self.absent += 1,
            Presence::Unknown => self.unknown += 1,
        }
        self.total += 1;
    }

    /// Share of known children who are present, as a rounded percentage
    pub fn attendance_rate(&self) -> u8 {
        let known = self.present + self.absent;
        if known == 0 {
            return 0;
        }
        ((self.present as f64 * 100.0) / known as f64).round() as u8
    }
}

/// Outcome of a batch commit that did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// No pending overrides; no request was made
    NothingToSave,
    /// Every pending override was written
    Saved { count: usize },
    /// Operator chose to finish in the full attendance screen; overrides kept
    RedirectedToAttendanceScreen,
    /// Operator backed out; overrides kept
    Cancelled,
}
