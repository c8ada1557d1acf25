//! # In-Memory Storage
//!
//! A process-local stand-in for the remote API. It honours the same server
//! contracts as the real endpoints (one attendance record per kid and date,
//! a fresh code per send, required forms created on process start), records
//! every call it receives, and can be told to fail so the error paths of the
//! domain services can be exercised.

use async_trait::async_trait;
use chrono::Utc;
use log::debug;
use shared::{
    AccessLinkResponse, AttendanceRecordDto, CreateAttendanceRequest, FormActionRequest,
    FormStatus, IntakeProcessDto, KidInfoDto, ProcessStatus, SendCodeRequest,
    StartProcessRequest, UpdateAttendanceRequest, UpdateFormStatusRequest,
    UpdateProcessStatusRequest, VerifyCodeRequest,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::domain::models::{FormId, IntakeForm};
use crate::storage::mappers::IntakeMapper;
use crate::storage::{
    ApiError, ApiResult, AttendanceStorage, IntakeStorage, ParentAccessStorage,
};

#[derive(Default)]
struct MemoryState {
    processes: BTreeMap<i64, IntakeProcessDto>,
    access_links: HashMap<String, AccessLinkResponse>,
    expired_tokens: HashSet<String>,
    kids: HashMap<i64, KidInfoDto>,
    issued_codes: HashMap<(u32, String), String>,
    attendance: Vec<AttendanceRecordDto>,
    next_attendance_id: i64,
    calls: Vec<String>,
    attendance_writes: usize,
    fail_attendance_writes_after: Option<usize>,
    fail_code_delivery: bool,
    throttled: bool,
    unavailable_kids: HashSet<i64>,
}

/// Shared, cloneable in-memory API
#[derive(Clone, Default)]
pub struct InMemoryConnection {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryConnection {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        // A panic while holding the lock only happens inside a failing test
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record_call(&self, call: String) -> MutexGuard<'_, MemoryState> {
        debug!("in-memory api call: {}", call);
        let mut state = self.lock();
        state.calls.push(call);
        state
    }

    /// Every call received so far, oldest first
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    // ---- seeding -------------------------------------------------------

    pub fn insert_process(&self, process: IntakeProcessDto) {
        self.lock().processes.insert(process.kid_id, process);
    }

    pub fn process(&self, kid_id: i64) -> Option<IntakeProcessDto> {
        self.lock().processes.get(&kid_id).cloned()
    }

    /// Register an access link and the kid it unlocks
    pub fn insert_access_link(&self, token: &str, kid: KidInfoDto) {
        let mut state = self.lock();
        state.access_links.insert(
            token.to_string(),
            AccessLinkResponse {
                kid_id: kid.kid_id,
                kid_name: kid.first_name.clone(),
                form_id: kid.form_id,
            },
        );
        state.kids.insert(kid.kid_id, kid);
    }

    pub fn expire_token(&self, token: &str) {
        self.lock().expired_tokens.insert(token.to_string());
    }

    /// Most recent code issued for a form/phone pair
    pub fn last_code_for(&self, form_id: u32, phone_number: &str) -> Option<String> {
        self.lock()
            .issued_codes
            .get(&(form_id, phone_number.to_string()))
            .cloned()
    }

    pub fn insert_attendance(&self, record: AttendanceRecordDto) {
        let mut state = self.lock();
        state.next_attendance_id = state.next_attendance_id.max(record.attendance_id);
        state.attendance.push(record);
    }

    /// Overwrite a record as another session would
    pub fn set_presence(&self, kid_id: i64, date: &str, is_present: Option<bool>) {
        let mut state = self.lock();
        if let Some(record) = state
            .attendance
            .iter_mut()
            .find(|r| r.kid_id == kid_id && r.attendance_date == date)
        {
            record.is_present = is_present;
        }
    }

    pub fn attendance_for(&self, kid_id: i64, date: &str) -> Option<AttendanceRecordDto> {
        self.lock()
            .attendance
            .iter()
            .find(|r| r.kid_id == kid_id && r.attendance_date == date)
            .cloned()
    }

    // ---- failure injection ---------------------------------------------

    /// Let `successes` attendance writes through, then fail every later one
    pub fn fail_attendance_writes_after(&self, successes: usize) {
        let mut state = self.lock();
        state.attendance_writes = 0;
        state.fail_attendance_writes_after = Some(successes);
    }

    pub fn fail_code_delivery(&self, fail: bool) {
        self.lock().fail_code_delivery = fail;
    }

    /// Answer token and code checks with 429 until switched off
    pub fn throttle_parent_access(&self, throttled: bool) {
        self.lock().throttled = throttled;
    }

    /// Make every process lookup for this kid fail with a server error
    pub fn make_kid_unavailable(&self, kid_id: i64) {
        self.lock().unavailable_kids.insert(kid_id);
    }

    fn check_throttle(state: &MemoryState) -> ApiResult<()> {
        if state.throttled {
            return Err(ApiError::Rejected {
                status: 429,
                message: "Too many requests".to_string(),
            });
        }
        Ok(())
    }

    fn check_attendance_write(state: &mut MemoryState) -> ApiResult<()> {
        if let Some(limit) = state.fail_attendance_writes_after {
            if state.attendance_writes >= limit {
                return Err(ApiError::Rejected {
                    status: 500,
                    message: "Attendance service unavailable".to_string(),
                });
            }
        }
        state.attendance_writes += 1;
        Ok(())
    }

    fn set_form_status(state: &mut MemoryState, kid_id: i64, form_id: u32, status: FormStatus) -> ApiResult<()> {
        let process = state.processes.get_mut(&kid_id).ok_or(ApiError::NotFound)?;
        let form = process
            .forms
            .iter_mut()
            .find(|f| f.form_id == form_id)
            .ok_or(ApiError::NotFound)?;
        let now = Utc::now().to_rfc3339();
        if form.start_date.is_none() && status != FormStatus::NotStarted {
            form.start_date = Some(now.clone());
        }
        form.status = status;
        form.last_updated = now;
        Ok(())
    }
}

#[async_trait]
impl IntakeStorage for InMemoryConnection {
    async fn list_processes(&self) -> ApiResult<Vec<IntakeProcessDto>> {
        let state = self.record_call("list_processes".to_string());
        Ok(state.processes.values().cloned().collect())
    }

    async fn get_process(&self, kid_id: i64) -> ApiResult<Option<IntakeProcessDto>> {
        let state = self.record_call(format!("get_process:{}", kid_id));
        if state.unavailable_kids.contains(&kid_id) {
            return Err(ApiError::Rejected {
                status: 503,
                message: "Intake service unavailable".to_string(),
            });
        }
        Ok(state.processes.get(&kid_id).cloned())
    }

    async fn start_process(&self, request: &StartProcessRequest) -> ApiResult<IntakeProcessDto> {
        let mut state = self.record_call(format!("start_process:{}", request.kid_id));
        if state.processes.contains_key(&request.kid_id) {
            return Err(ApiError::Rejected {
                status: 409,
                message: "Process already exists".to_string(),
            });
        }

        let now = Utc::now();
        let process = IntakeProcessDto {
            kid_id: request.kid_id,
            status: ProcessStatus::Started,
            created_at: now.to_rfc3339(),
            forms: FormId::REQUIRED
                .iter()
                .map(|form_id| {
                    IntakeMapper::form_to_dto(&IntakeForm::not_started(request.kid_id, *form_id, now))
                })
                .collect(),
        };
        state.processes.insert(request.kid_id, process.clone());
        Ok(process)
    }

    async fn complete_form(&self, request: &FormActionRequest) -> ApiResult<()> {
        let mut state =
            self.record_call(format!("complete_form:{}:{}", request.kid_id, request.form_id));
        Self::set_form_status(&mut state, request.kid_id, request.form_id, FormStatus::Completed)
    }

    async fn send_form_to_parents(&self, request: &FormActionRequest) -> ApiResult<()> {
        let mut state =
            self.record_call(format!("send_form_to_parents:{}:{}", request.kid_id, request.form_id));
        Self::set_form_status(&mut state, request.kid_id, request.form_id, FormStatus::SentToParent)
    }

    async fn update_form_status(&self, request: &UpdateFormStatusRequest) -> ApiResult<()> {
        let mut state = self.record_call(format!(
            "update_form_status:{}:{}:{}",
            request.kid_id, request.form_id, request.status
        ));
        Self::set_form_status(&mut state, request.kid_id, request.form_id, request.status)
    }

    async fn update_process_status(&self, request: &UpdateProcessStatusRequest) -> ApiResult<()> {
        let mut state = self.record_call(format!(
            "update_process_status:{}:{}",
            request.kid_id, request.status
        ));
        let process = state.processes.get_mut(&request.kid_id).ok_or(ApiError::NotFound)?;
        process.status = request.status;
        Ok(())
    }

    async fn delete_process(&self, kid_id: i64) -> ApiResult<()> {
        let mut state = self.record_call(format!("delete_process:{}", kid_id));
        state
            .processes
            .remove(&kid_id)
            .map(|_| ())
            .ok_or(ApiError::NotFound)
    }
}

#[async_trait]
impl ParentAccessStorage for InMemoryConnection {
    async fn validate_token(&self, token: &str) -> ApiResult<AccessLinkResponse> {
        let state = self.record_call("validate_token".to_string());
        Self::check_throttle(&state)?;
        if state.expired_tokens.contains(token) {
            return Err(ApiError::Rejected {
                status: 410,
                message: format!("Token {} expired on 2026-01-01", token),
            });
        }
        state.access_links.get(token).cloned().ok_or(ApiError::NotFound)
    }

    async fn send_code(&self, request: &SendCodeRequest) -> ApiResult<()> {
        let mut state = self.record_call(format!("send_code:{}", request.form_id));
        if state.fail_code_delivery {
            return Err(ApiError::Transport("SMS gateway timed out".to_string()));
        }
        let code = format!("{:06}", uuid::Uuid::new_v4().as_u128() % 1_000_000);
        state
            .issued_codes
            .insert((request.form_id, request.phone_number.clone()), code);
        Ok(())
    }

    async fn verify_code(&self, request: &VerifyCodeRequest) -> ApiResult<KidInfoDto> {
        let state = self.record_call(format!("verify_code:{}", request.form_id));
        Self::check_throttle(&state)?;
        let expected = state
            .issued_codes
            .get(&(request.form_id, request.phone_number.clone()));
        if expected != Some(&request.code) {
            return Err(ApiError::Rejected {
                status: 401,
                message: "Invalid verification code".to_string(),
            });
        }
        state
            .kids
            .values()
            .find(|kid| kid.form_id == request.form_id)
            .cloned()
            .ok_or(ApiError::NotFound)
    }
}

#[async_trait]
impl AttendanceStorage for InMemoryConnection {
    async fn list_attendance(&self, date: &str) -> ApiResult<Vec<AttendanceRecordDto>> {
        let state = self.record_call(format!("list_attendance:{}", date));
        Ok(state
            .attendance
            .iter()
            .filter(|r| r.attendance_date == date)
            .cloned()
            .collect())
    }

    async fn create_attendance(
        &self,
        request: &CreateAttendanceRequest,
    ) -> ApiResult<AttendanceRecordDto> {
        let mut state = self.record_call(format!("create_attendance:{}", request.kid_id));
        Self::check_attendance_write(&mut state)?;
        if state
            .attendance
            .iter()
            .any(|r| r.kid_id == request.kid_id && r.attendance_date == request.attendance_date)
        {
            return Err(ApiError::Rejected {
                status: 409,
                message: "Attendance already recorded for this date".to_string(),
            });
        }

        state.next_attendance_id += 1;
        let record = AttendanceRecordDto {
            attendance_id: state.next_attendance_id,
            kid_id: request.kid_id,
            attendance_date: request.attendance_date.clone(),
            is_present: Some(request.is_present),
            absence_reason: request.absence_reason.clone(),
            reported_by: Some(request.reported_by.clone()),
        };
        state.attendance.push(record.clone());
        Ok(record)
    }

    async fn update_attendance(
        &self,
        attendance_id: i64,
        request: &UpdateAttendanceRequest,
    ) -> ApiResult<AttendanceRecordDto> {
        let mut state = self.record_call(format!("update_attendance:{}", attendance_id));
        Self::check_attendance_write(&mut state)?;
        let record = state
            .attendance
            .iter_mut()
            .find(|r| r.attendance_id == attendance_id)
            .ok_or(ApiError::NotFound)?;
        record.is_present = Some(request.is_present);
        record.absence_reason = request.absence_reason.clone();
        record.reported_by = Some(request.reported_by.clone());
        Ok(record.clone())
    }
}
