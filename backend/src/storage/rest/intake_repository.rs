//! Intake process endpoints.

use async_trait::async_trait;
use reqwest::Method;
use shared::{
    FormActionRequest, FormStatus, IntakeProcessDto, StartProcessRequest, UpdateFormStatusRequest,
    UpdateProcessStatusRequest,
};

use super::connection::RestConnection;
use crate::storage::{ApiError, ApiResult, IntakeStorage};

const PROCESSES: &str = "intake-processes";

#[async_trait]
impl IntakeStorage for RestConnection {
    async fn list_processes(&self) -> ApiResult<Vec<IntakeProcessDto>> {
        self.get_json(self.endpoint(&[PROCESSES])?).await
    }

    async fn get_process(&self, kid_id: i64) -> ApiResult<Option<IntakeProcessDto>> {
        let url = self.endpoint(&[PROCESSES, &kid_id.to_string()])?;
        match self.get_json(url).await {
            Ok(process) => Ok(Some(process)),
            Err(ApiError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn start_process(&self, request: &StartProcessRequest) -> ApiResult<IntakeProcessDto> {
        self.send_json(Method::POST, self.endpoint(&[PROCESSES])?, request)
            .await
    }

    async fn complete_form(&self, request: &FormActionRequest) -> ApiResult<()> {
        let url = self.endpoint(&[PROCESSES, "complete-form"])?;
        self.send_command(Method::POST, url, Some(request)).await
    }

    async fn send_form_to_parents(&self, request: &FormActionRequest) -> ApiResult<()> {
        let url = self.endpoint(&[PROCESSES, "send-to-parents"])?;
        self.send_command(Method::POST, url, Some(request)).await
    }

    async fn update_form_status(&self, request: &UpdateFormStatusRequest) -> ApiResult<()> {
        // Statuses with a dedicated endpoint go through it
        let action = FormActionRequest {
            kid_id: request.kid_id,
            form_id: request.form_id,
        };
        match request.status {
            FormStatus::Completed => self.complete_form(&action).await,
            FormStatus::SentToParent => self.send_form_to_parents(&action).await,
            FormStatus::NotStarted | FormStatus::InProgress => {
                let url = self.endpoint(&[PROCESSES, "form-status"])?;
                self.send_command(Method::PUT, url, Some(request)).await
            }
        }
    }

    async fn update_process_status(&self, request: &UpdateProcessStatusRequest) -> ApiResult<()> {
        let url = self.endpoint(&[PROCESSES, "status"])?;
        self.send_command(Method::PUT, url, Some(request)).await
    }

    async fn delete_process(&self, kid_id: i64) -> ApiResult<()> {
        let url = self.endpoint(&[PROCESSES, &kid_id.to_string()])?;
        self.send_command::<()>(Method::DELETE, url, None).await
    }
}
