//! Attendance endpoints.

use async_trait::async_trait;
use reqwest::Method;
use shared::{AttendanceRecordDto, CreateAttendanceRequest, UpdateAttendanceRequest};

use super::connection::RestConnection;
use crate::storage::{AttendanceStorage, ApiResult};

const ATTENDANCE: &str = "attendance";

#[async_trait]
impl AttendanceStorage for RestConnection {
    async fn list_attendance(&self, date: &str) -> ApiResult<Vec<AttendanceRecordDto>> {
        let mut url = self.endpoint(&[ATTENDANCE])?;
        url.query_pairs_mut().append_pair("date", date);
        self.get_json(url).await
    }

    async fn create_attendance(
        &self,
        request: &CreateAttendanceRequest,
    ) -> ApiResult<AttendanceRecordDto> {
        self.send_json(Method::POST, self.endpoint(&[ATTENDANCE])?, request)
            .await
    }

    async fn update_attendance(
        &self,
        attendance_id: i64,
        request: &UpdateAttendanceRequest,
    ) -> ApiResult<AttendanceRecordDto> {
        let url = self.endpoint(&[ATTENDANCE, &attendance_id.to_string()])?;
        self.send_json(Method::PUT, url, request).await
    }
}
