//! # Storage Traits
//!
//! The console keeps no data of its own: every collection lives behind the
//! remote API. These traits describe the calls the core makes so the domain
//! layer can run against the REST client or the in-memory stand-in.

use async_trait::async_trait;
use shared::{
    AccessLinkResponse, AttendanceRecordDto, CreateAttendanceRequest, FormActionRequest,
    IntakeProcessDto, KidInfoDto, SendCodeRequest, StartProcessRequest, UpdateAttendanceRequest,
    UpdateFormStatusRequest, UpdateProcessStatusRequest, VerifyCodeRequest,
};

/// Failure of a single remote call
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
    #[error("resource not found")]
    NotFound,
    #[error("request rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl ApiError {
    /// True for 4xx rejections, i.e. the server understood and refused.
    /// 408 and 429 are excluded: the same request may succeed later.
    pub fn is_client_rejection(&self) -> bool {
        match self {
            ApiError::NotFound => true,
            ApiError::Rejected { status, .. } => {
                (400..500).contains(status) && !matches!(*status, 408 | 429)
            }
            ApiError::Transport(_) | ApiError::Decode(_) => false,
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Intake processes and their form ledgers
#[async_trait]
pub trait IntakeStorage: Send + Sync {
    /// Fetch every intake process
    async fn list_processes(&self) -> ApiResult<Vec<IntakeProcessDto>>;

    /// Fetch one child's process; `None` when the child has none
    async fn get_process(&self, kid_id: i64) -> ApiResult<Option<IntakeProcessDto>>;

    /// Start a process; the server creates one form record per required form
    async fn start_process(&self, request: &StartProcessRequest) -> ApiResult<IntakeProcessDto>;

    async fn complete_form(&self, request: &FormActionRequest) -> ApiResult<()>;

    async fn send_form_to_parents(&self, request: &FormActionRequest) -> ApiResult<()>;

    /// Set any other per-form status
    async fn update_form_status(&self, request: &UpdateFormStatusRequest) -> ApiResult<()>;

    /// Coarse process status, independent of the forms
    async fn update_process_status(&self, request: &UpdateProcessStatusRequest) -> ApiResult<()>;

    /// Delete a process together with its forms
    async fn delete_process(&self, kid_id: i64) -> ApiResult<()>;
}

/// Token and one-time-code checks for the parent-facing link
#[async_trait]
pub trait ParentAccessStorage: Send + Sync {
    async fn validate_token(&self, token: &str) -> ApiResult<AccessLinkResponse>;

    /// Deliver a fresh code; the server invalidates earlier ones
    async fn send_code(&self, request: &SendCodeRequest) -> ApiResult<()>;

    async fn verify_code(&self, request: &VerifyCodeRequest) -> ApiResult<KidInfoDto>;
}

/// Daily attendance records
#[async_trait]
pub trait AttendanceStorage: Send + Sync {
    /// All records for one date (YYYY-MM-DD)
    async fn list_attendance(&self, date: &str) -> ApiResult<Vec<AttendanceRecordDto>>;

    async fn create_attendance(
        &self,
        request: &CreateAttendanceRequest,
    ) -> ApiResult<AttendanceRecordDto>;

    async fn update_attendance(
        &self,
        attendance_id: i64,
        request: &UpdateAttendanceRequest,
    ) -> ApiResult<AttendanceRecordDto>;
}
