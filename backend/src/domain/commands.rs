//! Domain-level command and result types.
//!
//! Services take these instead of the wire DTOs so the domain never depends
//! on the remote API's JSON shape.

pub mod intake {
    use chrono::{DateTime, Utc};
    use shared::{FormStatus, ProcessStatus};

    use crate::domain::models::{FormId, IntakeForm, KidId};

    /// Input for changing one form's status in a child's ledger.
    #[derive(Debug, Clone)]
    pub struct MarkFormStatusCommand {
        pub kid_id: KidId,
        pub form_id: FormId,
        pub status: FormStatus,
    }

    /// Result of a status change: the form as it now stands.
    #[derive(Debug, Clone)]
    pub struct MarkFormStatusResult {
        pub form: IntakeForm,
        pub previous_status: FormStatus,
    }

    /// Input for the coarse, administrative process status override.
    #[derive(Debug, Clone)]
    pub struct UpdateProcessStatusCommand {
        pub kid_id: KidId,
        pub status: ProcessStatus,
    }

    /// A child considered for the dashboard and when it was last active.
    #[derive(Debug, Clone)]
    pub struct DashboardKid {
        pub kid_id: KidId,
        pub last_active: Option<DateTime<Utc>>,
    }
}

pub mod parent_access {
    use crate::domain::models::FormId;

    /// Input for requesting a one-time code.
    #[derive(Debug, Clone)]
    pub struct RequestCodeCommand {
        pub form_id: FormId,
        pub phone_number: String,
    }

    /// Input for submitting a received code.
    #[derive(Debug, Clone)]
    pub struct SubmitCodeCommand {
        pub form_id: FormId,
        pub phone_number: String,
        pub code: String,
    }
}
