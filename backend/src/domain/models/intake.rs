//! Domain models for the intake (onboarding) workflow.

use chrono::{DateTime, Utc};
use shared::{FormStatus, ProcessStatus};
use std::fmt;

/// Server-side identifier of a child
pub type KidId = i64;

/// Identifier of one of the required intake forms
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FormId(pub u32);

impl FormId {
    pub const REGISTRATION: FormId = FormId(1001);
    pub const HEALTH_DECLARATION: FormId = FormId(1002);
    pub const PARENTAL_CONSENT: FormId = FormId(1003);
    pub const IMMUNIZATION_RECORD: FormId = FormId(1004);
    pub const AUTHORIZED_PICKUP: FormId = FormId(1005);

    /// Every form a new child must complete, in display order
    pub const REQUIRED: [FormId; 5] = [
        FormId::REGISTRATION,
        FormId::HEALTH_DECLARATION,
        FormId::PARENTAL_CONSENT,
        FormId::IMMUNIZATION_RECORD,
        FormId::AUTHORIZED_PICKUP,
    ];

    pub fn label(&self) -> &'static str {
        match *self {
            FormId::REGISTRATION => "Registration details",
            FormId::HEALTH_DECLARATION => "Health declaration",
            FormId::PARENTAL_CONSENT => "Parental consent",
            FormId::IMMUNIZATION_RECORD => "Immunization record",
            FormId::AUTHORIZED_PICKUP => "Authorized pickup",
            _ => "Unknown form",
        }
    }

    pub fn is_required(&self) -> bool {
        FormId::REQUIRED.contains(self)
    }
}

impl fmt::Display for FormId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One required document/questionnaire for one child
#[derive(Debug, Clone, PartialEq)]
pub struct IntakeForm {
    pub form_id: FormId,
    pub kid_id: KidId,
    pub status: FormStatus,
    pub last_updated: Option<DateTime<Utc>>,
    pub start_date: Option<DateTime<Utc>>,
}

impl IntakeForm {
    pub fn not_started(kid_id: KidId, form_id: FormId, now: DateTime<Utc>) -> Self {
        Self {
            form_id,
            kid_id,
            status: FormStatus::NotStarted,
            last_updated: Some(now),
            start_date: None,
        }
    }

    /// Timestamp used when ranking forms by recency
    pub fn activity_time(&self) -> Option<DateTime<Utc>> {
        self.last_updated.or(self.start_date)
    }
}

/// A child's intake process together with its ledger
#[derive(Debug, Clone, PartialEq)]
pub struct IntakeProcess {
    pub kid_id: KidId,
    pub status: ProcessStatus,
    pub created_at: DateTime<Utc>,
    pub forms: Vec<IntakeForm>,
}

/// Where a child stands in the intake workflow, derived from the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStage {
    NoProcess,
    Started,
    AllCompleted,
}

/// Per-child progress view. Never persisted; always rebuilt from the forms.
#[derive(Debug, Clone, PartialEq)]
pub struct IntakeSummary {
    pub kid_id: KidId,
    pub total_forms: usize,
    pub completed_forms: usize,
    pub overall_progress: u8,
    pub forms: Vec<IntakeForm>,
    pub last_updated: Option<DateTime<Utc>>,
    pub stage: ProcessStage,
    /// Coarse status last set by an administrator
    pub recorded_status: ProcessStatus,
}

impl IntakeSummary {
    pub fn from_process(process: IntakeProcess) -> Self {
        let mut forms = process.forms;
        forms.sort_by_key(|form| form.form_id);

        let total_forms = forms.len();
        let completed_forms = forms
            .iter()
            .filter(|form| form.status == FormStatus::Completed)
            .count();
        let last_updated = forms.iter().filter_map(IntakeForm::activity_time).max();
        let stage = if total_forms > 0 && completed_forms == total_forms {
            ProcessStage::AllCompleted
        } else {
            ProcessStage::Started
        };

        Self {
            kid_id: process.kid_id,
            total_forms,
            completed_forms,
            overall_progress: progress_percent(completed_forms, total_forms),
            forms,
            last_updated,
            stage,
            recorded_status: process.status,
        }
    }
}

/// `round(100 * completed / total)`, or 0 when there is nothing to complete
pub fn progress_percent(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let completed = completed.min(total);
    ((completed as f64 * 100.0) / total as f64).round() as u8
}
