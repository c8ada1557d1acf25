use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of a single intake form in a child's ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FormStatus {
    /// Form record exists but nobody has touched it yet
    NotStarted,
    /// Staff or parent is actively filling the form
    InProgress,
    /// Form link has been sent to the parents and is awaiting their input
    SentToParent,
    /// Form is finished
    Completed,
}

impl FormStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormStatus::NotStarted => "NotStarted",
            FormStatus::InProgress => "InProgress",
            FormStatus::SentToParent => "SentToParent",
            FormStatus::Completed => "Completed",
        }
    }
}

impl fmt::Display for FormStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Coarse, administratively-set status of a whole intake process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessStatus {
    Started,
    InProgress,
    OnHold,
    Completed,
}

impl fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ProcessStatus::Started => "Started",
            ProcessStatus::InProgress => "InProgress",
            ProcessStatus::OnHold => "OnHold",
            ProcessStatus::Completed => "Completed",
        };
        write!(f, "{}", label)
    }
}

/// One intake form as returned by the remote API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntakeFormDto {
    pub form_id: u32,
    pub kid_id: i64,
    pub status: FormStatus,
    /// RFC 3339 timestamp of the last status change
    pub last_updated: String,
    /// RFC 3339 timestamp, absent until the form was first opened
    #[serde(default)]
    pub start_date: Option<String>,
}

/// A child's intake process with its full form ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntakeProcessDto {
    pub kid_id: i64,
    pub status: ProcessStatus,
    /// RFC 3339 timestamp
    pub created_at: String,
    #[serde(default)]
    pub forms: Vec<IntakeFormDto>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartProcessRequest {
    pub kid_id: i64,
}

/// Body shared by the "mark form complete" and "send form to parents" calls
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormActionRequest {
    pub kid_id: i64,
    pub form_id: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFormStatusRequest {
    pub kid_id: i64,
    pub form_id: u32,
    pub status: FormStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProcessStatusRequest {
    pub kid_id: i64,
    pub status: ProcessStatus,
}

/// Response to a parent access token lookup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessLinkResponse {
    pub kid_id: i64,
    pub kid_name: String,
    pub form_id: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendCodeRequest {
    pub form_id: u32,
    pub phone_number: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyCodeRequest {
    pub form_id: u32,
    pub phone_number: String,
    pub code: String,
}

/// Kid details released to a parent once the one-time code checks out
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KidInfoDto {
    pub kid_id: i64,
    pub first_name: String,
    pub last_name: String,
    /// ISO 8601 date (YYYY-MM-DD)
    #[serde(default)]
    pub birth_date: Option<String>,
    #[serde(default)]
    pub class_name: Option<String>,
    pub form_id: u32,
}

/// Attendance record as stored server-side
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecordDto {
    pub attendance_id: i64,
    pub kid_id: i64,
    /// ISO 8601 date (YYYY-MM-DD)
    pub attendance_date: String,
    #[serde(default)]
    pub is_present: Option<bool>,
    #[serde(default)]
    pub absence_reason: Option<String>,
    #[serde(default)]
    pub reported_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAttendanceRequest {
    pub kid_id: i64,
    pub attendance_date: String,
    pub is_present: bool,
    pub absence_reason: Option<String>,
    pub reported_by: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAttendanceRequest {
    pub kid_id: i64,
    pub attendance_date: String,
    pub is_present: bool,
    pub absence_reason: Option<String>,
    pub reported_by: String,
}

/// Structured error payload returned by the remote API.
///
/// Older endpoints put the text under `message`, newer ones under `error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    #[serde(alias = "message")]
    pub error: String,
    #[serde(default)]
    pub code: Option<String>,
}
