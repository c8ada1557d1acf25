use log::{debug, info, warn};
use shared::{FormStatus, ProcessStatus, StartProcessRequest, UpdateProcessStatusRequest};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use crate::domain::commands::intake::{
    DashboardKid, MarkFormStatusCommand, MarkFormStatusResult, UpdateProcessStatusCommand,
};
use crate::domain::errors::ConsoleError;
use crate::domain::form_ledger::FormLedger;
use crate::domain::models::{progress_percent, FormId, IntakeSummary, KidId};
use crate::storage::mappers::IntakeMapper;
use crate::storage::{ApiError, IntakeStorage};

/// Default number of children fetched for one dashboard render
pub const DEFAULT_DASHBOARD_BATCH_SIZE: usize = 20;

/// Completion rate across a cohort: all completed forms over all forms.
///
/// Children with many forms weigh more than children with few.
pub fn cohort_completion_rate<'a>(summaries: impl IntoIterator<Item = &'a IntakeSummary>) -> u8 {
    let (completed, total) = summaries
        .into_iter()
        .fold((0, 0), |(completed, total), summary| {
            (completed + summary.completed_forms, total + summary.total_forms)
        });
    progress_percent(completed, total)
}

/// Owns the "does this child have an intake process" lifecycle and builds
/// summaries from the ledger
pub struct IntakeService<S: IntakeStorage> {
    storage: Arc<S>,
    ledger: FormLedger<S>,
    dashboard_batch_size: usize,
}

impl<S: IntakeStorage> Clone for IntakeService<S> {
    fn clone(&self) -> Self {
        Self {
            storage: self.storage.clone(),
            ledger: self.ledger.clone(),
            dashboard_batch_size: self.dashboard_batch_size,
        }
    }
}

impl<S: IntakeStorage> IntakeService<S> {
    pub fn new(storage: Arc<S>) -> Self {
        Self {
            ledger: FormLedger::new(storage.clone()),
            storage,
            dashboard_batch_size: DEFAULT_DASHBOARD_BATCH_SIZE,
        }
    }

    pub fn with_dashboard_batch_size(mut self, batch_size: usize) -> Self {
        self.dashboard_batch_size = batch_size.max(1);
        self
    }

    pub fn ledger(&self) -> &FormLedger<S> {
        &self.ledger
    }

    /// Start a process; the server creates every required form as not started
    pub async fn start_process(&self, kid_id: KidId) -> Result<IntakeSummary, ConsoleError> {
        info!("Starting intake process for kid {}", kid_id);

        if kid_id <= 0 {
            return Err(ConsoleError::Validation(format!("Invalid kid id: {}", kid_id)));
        }

        if self.storage.get_process(kid_id).await?.is_some() {
            warn!("Intake process already exists for kid {}", kid_id);
            return Err(ConsoleError::AlreadyStarted(kid_id));
        }

        let process = self
            .storage
            .start_process(&StartProcessRequest { kid_id })
            .await
            .map_err(|e| match e {
                ApiError::Rejected { status: 409, .. } => ConsoleError::AlreadyStarted(kid_id),
                other => other.into(),
            })?;

        let summary = IntakeSummary::from_process(IntakeMapper::process_to_domain(process)?);
        info!(
            "Started intake process for kid {} with {} forms",
            kid_id, summary.total_forms
        );
        Ok(summary)
    }

    /// `None` means the child has no process yet, which is a normal state
    pub async fn fetch_status(&self, kid_id: KidId) -> Result<Option<IntakeSummary>, ConsoleError> {
        debug!("Fetching intake status for kid {}", kid_id);

        match self.storage.get_process(kid_id).await? {
            Some(process) => {
                let summary = IntakeSummary::from_process(IntakeMapper::process_to_domain(process)?);
                debug!(
                    "Kid {} intake progress {}% ({}/{})",
                    kid_id, summary.overall_progress, summary.completed_forms, summary.total_forms
                );
                Ok(Some(summary))
            }
            None => {
                debug!("No intake process for kid {}", kid_id);
                Ok(None)
            }
        }
    }

    /// Administrative override of the coarse status. Forms are left alone.
    pub async fn update_status(&self, command: UpdateProcessStatusCommand) -> Result<(), ConsoleError> {
        info!(
            "Updating intake process status for kid {} to {}",
            command.kid_id, command.status
        );

        self.storage
            .update_process_status(&UpdateProcessStatusRequest {
                kid_id: command.kid_id,
                status: command.status,
            })
            .await
            .map_err(|e| match e {
                ApiError::NotFound => ConsoleError::NotFound(format!(
                    "No intake process for kid {}",
                    command.kid_id
                )),
                other => other.into(),
            })?;

        info!("Intake process for kid {} is now {}", command.kid_id, command.status);
        Ok(())
    }

    /// Summaries for the most recently active children, up to the batch size.
    ///
    /// A child without a process, or whose fetch fails, is left out of the
    /// result instead of failing the whole dashboard.
    pub async fn aggregate_for_dashboard(
        &self,
        kids: &[DashboardKid],
    ) -> BTreeMap<KidId, IntakeSummary> {
        let mut ordered: Vec<&DashboardKid> = kids.iter().collect();
        // Most recent first, never-active children last
        ordered.sort_by(|a, b| b.last_active.cmp(&a.last_active));
        let mut seen = HashSet::new();
        ordered.retain(|kid| seen.insert(kid.kid_id));

        let batch: Vec<KidId> = ordered
            .into_iter()
            .map(|kid| kid.kid_id)
            .take(self.dashboard_batch_size)
            .collect();
        info!(
            "Aggregating intake dashboard for {} of {} children",
            batch.len(),
            kids.len()
        );

        let mut summaries = BTreeMap::new();
        for kid_id in batch {
            match self.fetch_status(kid_id).await {
                Ok(Some(summary)) => {
                    summaries.insert(kid_id, summary);
                }
                Ok(None) => {}
                Err(e) => warn!("Skipping kid {} on dashboard: {}", kid_id, e),
            }
        }

        info!("Dashboard aggregated {} summaries", summaries.len());
        summaries
    }

    pub async fn list_processes(&self) -> Result<Vec<IntakeSummary>, ConsoleError> {
        info!("Listing all intake processes");

        let mut summaries = self
            .storage
            .list_processes()
            .await?
            .into_iter()
            .map(|dto| IntakeMapper::process_to_domain(dto).map(IntakeSummary::from_process))
            .collect::<Result<Vec<_>, _>>()?;
        summaries.sort_by_key(|summary| summary.kid_id);

        info!("Found {} intake processes", summaries.len());
        Ok(summaries)
    }

    /// Remove a process together with its ledger
    pub async fn delete_process(&self, kid_id: KidId) -> Result<(), ConsoleError> {
        info!("Deleting intake process for kid {}", kid_id);

        self.storage.delete_process(kid_id).await.map_err(|e| match e {
            ApiError::NotFound => {
                ConsoleError::NotFound(format!("No intake process for kid {}", kid_id))
            }
            other => other.into(),
        })?;

        info!("Deleted intake process for kid {}", kid_id);
        Ok(())
    }

    pub async fn send_form_to_parents(
        &self,
        kid_id: KidId,
        form_id: FormId,
    ) -> Result<MarkFormStatusResult, ConsoleError> {
        self.ledger
            .mark_form_status(MarkFormStatusCommand {
                kid_id,
                form_id,
                status: FormStatus::SentToParent,
            })
            .await
    }

    pub async fn complete_form(
        &self,
        kid_id: KidId,
        form_id: FormId,
    ) -> Result<MarkFormStatusResult, ConsoleError> {
        self.ledger
            .mark_form_status(MarkFormStatusCommand {
                kid_id,
                form_id,
                status: FormStatus::Completed,
            })
            .await
    }

    /// Recorded status for a kid, if a process exists
    pub async fn recorded_status(&self, kid_id: KidId) -> Result<Option<ProcessStatus>, ConsoleError> {
        Ok(self
            .fetch_status(kid_id)
            .await?
            .map(|summary| summary.recorded_status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::form_ledger::current_form;
    use crate::domain::models::ProcessStage;
    use crate::storage::InMemoryConnection;
    use chrono::{Duration, TimeZone, Utc};
    use shared::{IntakeFormDto, IntakeProcessDto};

    fn setup() -> (Arc<InMemoryConnection>, IntakeService<InMemoryConnection>) {
        let conn = Arc::new(InMemoryConnection::new());
        (conn.clone(), IntakeService::new(conn))
    }

    fn seed(conn: &InMemoryConnection, kid_id: KidId, forms: &[(u32, FormStatus)]) {
        let stamp = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap().to_rfc3339();
        conn.insert_process(IntakeProcessDto {
            kid_id,
            status: ProcessStatus::InProgress,
            created_at: stamp.clone(),
            forms: forms
                .iter()
                .map(|(form_id, status)| IntakeFormDto {
                    form_id: *form_id,
                    kid_id,
                    status: *status,
                    last_updated: stamp.clone(),
                    start_date: None,
                })
                .collect(),
        });
    }

    #[tokio::test]
    async fn test_start_process_creates_required_forms() {
        let (_conn, service) = setup();

        let summary = service.start_process(42).await.unwrap();
        assert_eq!(summary.total_forms, FormId::REQUIRED.len());
        assert_eq!(summary.completed_forms, 0);
        assert_eq!(summary.overall_progress, 0);
        assert_eq!(summary.stage, ProcessStage::Started);
        assert!(summary.forms.iter().all(|f| f.status == FormStatus::NotStarted));
    }

    #[tokio::test]
    async fn test_start_process_twice_is_already_started() {
        let (conn, service) = setup();
        service.start_process(42).await.unwrap();
        conn.clear_calls();

        let result = service.start_process(42).await;
        assert_eq!(result, Err(ConsoleError::AlreadyStarted(42)));
        assert_eq!(conn.calls(), vec!["get_process:42".to_string()]);
    }

    #[tokio::test]
    async fn test_start_process_rejects_invalid_kid() {
        let (conn, service) = setup();
        let result = service.start_process(0).await;
        assert!(matches!(result, Err(ConsoleError::Validation(_))));
        assert_eq!(conn.call_count(), 0);
    }

    #[tokio::test]
    async fn test_fetch_status_without_process_is_none() {
        let (_conn, service) = setup();
        assert_eq!(service.fetch_status(7).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_fetch_status_progress_and_current_form() {
        let (conn, service) = setup();
        seed(
            &conn,
            7,
            &[
                (1003, FormStatus::NotStarted),
                (1004, FormStatus::InProgress),
                (1005, FormStatus::Completed),
            ],
        );

        let summary = service.fetch_status(7).await.unwrap().unwrap();
        assert_eq!(summary.total_forms, 3);
        assert_eq!(summary.completed_forms, 1);
        assert_eq!(summary.overall_progress, 33);
        assert_eq!(current_form(&summary.forms).unwrap().form_id, FormId(1004));
    }

    #[tokio::test]
    async fn test_all_completed_stage() {
        let (conn, service) = setup();
        seed(&conn, 8, &[(1001, FormStatus::Completed), (1002, FormStatus::Completed)]);

        let summary = service.fetch_status(8).await.unwrap().unwrap();
        assert_eq!(summary.overall_progress, 100);
        assert_eq!(summary.stage, ProcessStage::AllCompleted);
    }

    #[tokio::test]
    async fn test_update_status_leaves_forms_alone() {
        let (conn, service) = setup();
        seed(&conn, 7, &[(1001, FormStatus::InProgress)]);

        service
            .update_status(UpdateProcessStatusCommand {
                kid_id: 7,
                status: ProcessStatus::OnHold,
            })
            .await
            .unwrap();

        let stored = conn.process(7).unwrap();
        assert_eq!(stored.status, ProcessStatus::OnHold);
        assert_eq!(stored.forms[0].status, FormStatus::InProgress);
        assert_eq!(
            service.recorded_status(7).await.unwrap(),
            Some(ProcessStatus::OnHold)
        );
    }

    #[tokio::test]
    async fn test_update_status_without_process_is_not_found() {
        let (_conn, service) = setup();
        let result = service
            .update_status(UpdateProcessStatusCommand {
                kid_id: 3,
                status: ProcessStatus::Completed,
            })
            .await;
        assert!(matches!(result, Err(ConsoleError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_dashboard_tolerates_missing_and_failing_kids() {
        let (conn, service) = setup();
        seed(&conn, 1, &[(1001, FormStatus::Completed)]);
        seed(&conn, 2, &[(1001, FormStatus::NotStarted)]);
        conn.make_kid_unavailable(2);

        let now = Utc::now();
        let kids = vec![
            DashboardKid { kid_id: 1, last_active: Some(now) },
            DashboardKid { kid_id: 2, last_active: Some(now) },
            DashboardKid { kid_id: 3, last_active: None },
        ];

        let summaries = service.aggregate_for_dashboard(&kids).await;
        assert_eq!(summaries.len(), 1);
        assert!(summaries.contains_key(&1));
    }

    #[tokio::test]
    async fn test_dashboard_takes_most_recent_first() {
        let (conn, service) = setup();
        let service = service.with_dashboard_batch_size(2);
        for kid_id in 1..=4 {
            seed(&conn, kid_id, &[(1001, FormStatus::NotStarted)]);
        }

        let now = Utc::now();
        let kids = vec![
            DashboardKid { kid_id: 1, last_active: Some(now - Duration::days(10)) },
            DashboardKid { kid_id: 2, last_active: None },
            DashboardKid { kid_id: 3, last_active: Some(now) },
            DashboardKid { kid_id: 4, last_active: Some(now - Duration::days(1)) },
        ];

        let summaries = service.aggregate_for_dashboard(&kids).await;
        let ids: Vec<KidId> = summaries.keys().copied().collect();
        assert_eq!(ids, vec![3, 4]);
        assert_eq!(conn.calls(), vec!["get_process:3".to_string(), "get_process:4".to_string()]);
    }

    #[tokio::test]
    async fn test_cohort_rate_is_whole_cohort_ratio() {
        let (conn, service) = setup();
        // 1 of 1 and 1 of 4: per-child average would be 62, cohort is 40
        seed(&conn, 1, &[(1001, FormStatus::Completed)]);
        seed(
            &conn,
            2,
            &[
                (1001, FormStatus::Completed),
                (1002, FormStatus::NotStarted),
                (1003, FormStatus::NotStarted),
                (1004, FormStatus::NotStarted),
            ],
        );

        let summaries = service.list_processes().await.unwrap();
        assert_eq!(cohort_completion_rate(&summaries), 40);
        assert_eq!(cohort_completion_rate(&[]), 0);
    }

    #[tokio::test]
    async fn test_delete_process() {
        let (conn, service) = setup();
        seed(&conn, 5, &[(1001, FormStatus::NotStarted)]);

        service.delete_process(5).await.unwrap();
        assert!(conn.process(5).is_none());
        assert!(matches!(
            service.delete_process(5).await,
            Err(ConsoleError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_form_shortcuts_go_through_ledger() {
        let (conn, service) = setup();
        service.start_process(9).await.unwrap();

        service
            .send_form_to_parents(9, FormId::PARENTAL_CONSENT)
            .await
            .unwrap();
        let result = service.complete_form(9, FormId::REGISTRATION).await.unwrap();
        assert_eq!(result.previous_status, FormStatus::NotStarted);

        let summary = service.fetch_status(9).await.unwrap().unwrap();
        assert_eq!(summary.completed_forms, 1);
        let consent = summary
            .forms
            .iter()
            .find(|f| f.form_id == FormId::PARENTAL_CONSENT)
            .unwrap();
        assert_eq!(consent.status, FormStatus::SentToParent);
        assert!(conn.process(9).is_some());
    }
}
