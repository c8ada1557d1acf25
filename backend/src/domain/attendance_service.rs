//! Attendance reconciliation for one day.
//!
//! Two layers make up what staff see: the records the server has confirmed
//! and the presence toggles that have not been saved yet. Display and
//! statistics always go through [`merge_presence`], where a pending toggle
//! beats whatever the server last said.

use chrono::NaiveDate;
use log::{debug, info, warn};
use shared::{CreateAttendanceRequest, UpdateAttendanceRequest};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::domain::errors::ConsoleError;
use crate::domain::models::{
    AttendanceRecord, AttendanceStats, CommitOutcome, KidId, Presence, UNSPECIFIED_ABSENCE_REASON,
};
use crate::io::{AbsenceDecision, AbsencePrompt, Notification, NotificationLevel, Notifier};
use crate::storage::mappers::{format_date, AttendanceMapper};
use crate::storage::AttendanceStorage;

/// Pending override first, then the server's value, otherwise unknown
pub fn merge_presence(pending: Option<bool>, server: Option<&AttendanceRecord>) -> Presence {
    match pending {
        Some(is_present) => Presence::from_flag(Some(is_present)),
        None => Presence::from_flag(server.and_then(|record| record.is_present)),
    }
}

pub struct AttendanceReconciler<S: AttendanceStorage> {
    storage: Arc<S>,
    notifier: Arc<dyn Notifier>,
    date: NaiveDate,
    server_records: HashMap<KidId, AttendanceRecord>,
    /// Insertion order is the commit order
    overrides: Vec<(KidId, bool)>,
    /// Kids written by a batch that did not finish, waiting for a refresh
    settled: HashSet<KidId>,
}

impl<S: AttendanceStorage> AttendanceReconciler<S> {
    pub fn new(storage: Arc<S>, notifier: Arc<dyn Notifier>, date: NaiveDate) -> Self {
        Self {
            storage,
            notifier,
            date,
            server_records: HashMap::new(),
            overrides: Vec::new(),
            settled: HashSet::new(),
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn server_record(&self, kid_id: KidId) -> Option<&AttendanceRecord> {
        self.server_records.get(&kid_id)
    }

    /// Reload the server's records for this date. Pending overrides stay.
    pub async fn refresh(&mut self) -> Result<(), ConsoleError> {
        let date = format_date(self.date);
        debug!("Refreshing attendance for {}", date);

        let records = self
            .storage
            .list_attendance(&date)
            .await?
            .into_iter()
            .map(AttendanceMapper::to_domain)
            .collect::<Result<Vec<_>, _>>()?;

        info!("Loaded {} attendance records for {}", records.len(), date);
        self.apply_server_records(records);
        Ok(())
    }

    /// Replace the server-state cache.
    ///
    /// Overrides are only dropped for kids an unfinished batch already wrote,
    /// and only once the server agrees with them.
    pub fn apply_server_records(&mut self, records: Vec<AttendanceRecord>) {
        let date = self.date;
        self.server_records = records
            .into_iter()
            .filter(|record| record.attendance_date == date)
            .map(|record| (record.kid_id, record))
            .collect();

        let server_records = &self.server_records;
        let settled = &mut self.settled;
        self.overrides.retain(|(kid_id, is_present)| {
            let confirmed = settled.contains(kid_id)
                && server_records
                    .get(kid_id)
                    .and_then(|record| record.is_present)
                    == Some(*is_present);
            if confirmed {
                settled.remove(kid_id);
            }
            !confirmed
        });
        let pending: HashSet<KidId> = self.overrides.iter().map(|(kid_id, _)| *kid_id).collect();
        self.settled.retain(|kid_id| pending.contains(kid_id));
    }

    pub fn effective_presence(&self, kid_id: KidId) -> Presence {
        merge_presence(self.pending_value(kid_id), self.server_records.get(&kid_id))
    }

    /// Flip a child between present and absent locally. Nothing is sent.
    pub fn toggle(&mut self, kid_id: KidId) -> Presence {
        let is_present = self.effective_presence(kid_id).toggled();

        match self.overrides.iter_mut().find(|(id, _)| *id == kid_id) {
            Some(entry) => entry.1 = is_present,
            None => self.overrides.push((kid_id, is_present)),
        }
        // A fresh edit is not covered by an earlier partial write
        self.settled.remove(&kid_id);

        let presence = Presence::from_flag(Some(is_present));
        debug!("Kid {} toggled to {:?} for {}", kid_id, presence, self.date);
        let notification = if is_present {
            Notification::new(
                NotificationLevel::Info,
                "Marked present. Change pending, not yet saved.",
            )
        } else {
            Notification::new(
                NotificationLevel::Warning,
                "Marked absent. Change pending, not yet saved.",
            )
        };
        self.notifier.notify(notification);

        presence
    }

    /// Counts from the merged view, pending edits included
    pub fn compute_stats(&self, class_kids: &[KidId]) -> AttendanceStats {
        let mut stats = AttendanceStats::default();
        let mut seen = HashSet::new();
        for kid_id in class_kids {
            if seen.insert(*kid_id) {
                stats.record(self.effective_presence(*kid_id));
            }
        }
        stats
    }

    pub fn pending_overrides(&self) -> &[(KidId, bool)] {
        &self.overrides
    }

    pub fn pending_count(&self) -> usize {
        self.overrides.len()
    }

    pub fn has_pending_changes(&self) -> bool {
        !self.overrides.is_empty()
    }

    pub fn discard_overrides(&mut self) {
        if !self.overrides.is_empty() {
            info!("Discarding {} pending attendance changes", self.overrides.len());
        }
        self.overrides.clear();
        self.settled.clear();
    }

    /// Write every pending override, one record at a time, in toggle order.
    ///
    /// Absences trigger the confirmation prompt first. A write failure stops
    /// the batch; what was already written stays written and is reported in
    /// `PartialBatchFailure`.
    pub async fn commit_all(
        &mut self,
        operator_id: &str,
        prompt: &dyn AbsencePrompt,
    ) -> Result<CommitOutcome, ConsoleError> {
        if self.overrides.is_empty() {
            self.notifier.notify(Notification::new(
                NotificationLevel::Info,
                "There are no attendance changes to save.",
            ));
            return Ok(CommitOutcome::NothingToSave);
        }

        let operator_id = operator_id.trim();
        if operator_id.is_empty() {
            return Err(ConsoleError::Validation(
                "A staff member is required to save attendance.".to_string(),
            ));
        }

        let absent_count = self.overrides.iter().filter(|(_, present)| !present).count();
        if absent_count > 0 {
            match prompt.confirm_unexplained_absences(absent_count).await {
                AbsenceDecision::Proceed => {}
                AbsenceDecision::Redirect => {
                    info!("Attendance commit redirected to the attendance screen");
                    return Ok(CommitOutcome::RedirectedToAttendanceScreen);
                }
                AbsenceDecision::Cancel => {
                    info!("Attendance commit cancelled");
                    return Ok(CommitOutcome::Cancelled);
                }
            }
        }

        let batch = self.overrides.clone();
        let attempted = batch.len();
        let date = format_date(self.date);
        info!(
            "Committing {} attendance changes for {} by {}",
            attempted, date, operator_id
        );

        let mut committed = 0;
        for (kid_id, is_present) in batch {
            let existing = self
                .server_records
                .get(&kid_id)
                .and_then(|record| record.attendance_id.map(|id| (id, record.absence_reason.clone())));

            let result = match existing {
                Some((attendance_id, absence_reason)) => {
                    let request = UpdateAttendanceRequest {
                        kid_id,
                        attendance_date: date.clone(),
                        is_present,
                        absence_reason,
                        reported_by: operator_id.to_string(),
                    };
                    self.storage.update_attendance(attendance_id, &request).await
                }
                None => {
                    let request = CreateAttendanceRequest {
                        kid_id,
                        attendance_date: date.clone(),
                        is_present,
                        absence_reason: (!is_present)
                            .then(|| UNSPECIFIED_ABSENCE_REASON.to_string()),
                        reported_by: operator_id.to_string(),
                    };
                    self.storage.create_attendance(&request).await
                }
            };

            match result.and_then(AttendanceMapper::to_domain) {
                Ok(record) => {
                    self.server_records.insert(kid_id, record);
                    self.settled.insert(kid_id);
                    committed += 1;
                }
                Err(e) => {
                    let message = ConsoleError::from(e.clone()).user_message();
                    warn!(
                        "Attendance commit stopped at kid {} after {} of {} writes: {}",
                        kid_id, committed, attempted, e
                    );
                    if let Err(refresh_error) = self.refresh().await {
                        warn!("Refresh after failed commit failed: {}", refresh_error);
                    }
                    self.notifier.notify(Notification::new(
                        NotificationLevel::Error,
                        format!(
                            "Saved {} of {} attendance changes. {}",
                            committed, attempted, message
                        ),
                    ));
                    return Err(ConsoleError::PartialBatchFailure {
                        attempted,
                        committed,
                        message,
                    });
                }
            }
        }

        self.overrides.clear();
        self.settled.clear();
        if let Err(e) = self.refresh().await {
            warn!("Attendance saved but refresh failed: {}", e);
        }

        info!("Committed {} attendance changes for {}", committed, date);
        self.notifier.notify(Notification::new(
            NotificationLevel::Success,
            format!("Saved {} attendance changes.", committed),
        ));
        Ok(CommitOutcome::Saved { count: committed })
    }

    fn pending_value(&self, kid_id: KidId) -> Option<bool> {
        self.overrides
            .iter()
            .find(|(id, _)| *id == kid_id)
            .map(|(_, is_present)| *is_present)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{FixedDecision, RecordingNotifier};
    use crate::storage::InMemoryConnection;
    use shared::AttendanceRecordDto;

    const DATE: &str = "2026-03-02";

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
    }

    fn setup() -> (
        Arc<InMemoryConnection>,
        Arc<RecordingNotifier>,
        AttendanceReconciler<InMemoryConnection>,
    ) {
        let conn = Arc::new(InMemoryConnection::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let reconciler = AttendanceReconciler::new(conn.clone(), notifier.clone(), date());
        (conn, notifier, reconciler)
    }

    fn server_record(id: i64, kid_id: KidId, is_present: Option<bool>, reason: Option<&str>) -> AttendanceRecordDto {
        AttendanceRecordDto {
            attendance_id: id,
            kid_id,
            attendance_date: DATE.to_string(),
            is_present,
            absence_reason: reason.map(str::to_string),
            reported_by: Some("staff-0".to_string()),
        }
    }

    fn levels(notifier: &RecordingNotifier) -> Vec<NotificationLevel> {
        notifier.notifications().into_iter().map(|n| n.level).collect()
    }

    #[test]
    fn test_merge_presence_three_valued() {
        let record = AttendanceRecord {
            attendance_id: Some(1),
            kid_id: 1,
            attendance_date: date(),
            is_present: Some(false),
            absence_reason: None,
            reported_by: None,
        };
        assert_eq!(merge_presence(Some(true), Some(&record)), Presence::Present);
        assert_eq!(merge_presence(None, Some(&record)), Presence::Absent);
        assert_eq!(merge_presence(None, None), Presence::Unknown);

        let unknown = AttendanceRecord { is_present: None, ..record };
        assert_eq!(merge_presence(None, Some(&unknown)), Presence::Unknown);
    }

    #[tokio::test]
    async fn test_stats_reflect_pending_toggles() {
        let (conn, _notifier, mut reconciler) = setup();
        reconciler.refresh().await.unwrap();

        assert_eq!(reconciler.toggle(1), Presence::Present);
        reconciler.toggle(2);
        assert_eq!(reconciler.toggle(2), Presence::Absent);

        let stats = reconciler.compute_stats(&[1, 2, 3]);
        assert_eq!(stats.present, 1);
        assert_eq!(stats.absent, 1);
        assert_eq!(stats.unknown, 1);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.attendance_rate(), 50);
        // Only the initial load went out
        assert_eq!(conn.calls(), vec![format!("list_attendance:{}", DATE)]);
    }

    #[tokio::test]
    async fn test_toggle_sends_advisory_notification() {
        let (_conn, notifier, mut reconciler) = setup();
        reconciler.toggle(1);
        reconciler.toggle(1);

        assert_eq!(
            levels(&notifier),
            vec![NotificationLevel::Info, NotificationLevel::Warning]
        );
        assert_eq!(reconciler.pending_overrides(), &[(1, false)]);
    }

    #[tokio::test]
    async fn test_override_wins_over_fresher_server_read() {
        let (conn, _notifier, mut reconciler) = setup();
        conn.insert_attendance(server_record(1, 7, None, None));
        reconciler.refresh().await.unwrap();

        assert_eq!(reconciler.toggle(7), Presence::Present);

        // Another session writes while our change is pending
        conn.set_presence(7, DATE, Some(false));
        reconciler.refresh().await.unwrap();

        assert_eq!(reconciler.effective_presence(7), Presence::Present);
        assert_eq!(reconciler.server_record(7).unwrap().is_present, Some(false));
        assert!(reconciler.has_pending_changes());
    }

    #[tokio::test]
    async fn test_commit_with_nothing_pending_makes_no_calls() {
        let (conn, notifier, mut reconciler) = setup();

        let outcome = reconciler
            .commit_all("staff-1", &FixedDecision(AbsenceDecision::Proceed))
            .await
            .unwrap();

        assert_eq!(outcome, CommitOutcome::NothingToSave);
        assert_eq!(conn.call_count(), 0);
        assert_eq!(levels(&notifier), vec![NotificationLevel::Info]);
    }

    #[tokio::test]
    async fn test_redirect_and_cancel_keep_overrides() {
        let (conn, _notifier, mut reconciler) = setup();
        conn.insert_attendance(server_record(1, 4, Some(true), None));
        reconciler.refresh().await.unwrap();
        reconciler.toggle(4);
        conn.clear_calls();

        let outcome = reconciler
            .commit_all("staff-1", &FixedDecision(AbsenceDecision::Redirect))
            .await
            .unwrap();
        assert_eq!(outcome, CommitOutcome::RedirectedToAttendanceScreen);

        let outcome = reconciler
            .commit_all("staff-1", &FixedDecision(AbsenceDecision::Cancel))
            .await
            .unwrap();
        assert_eq!(outcome, CommitOutcome::Cancelled);

        assert_eq!(conn.call_count(), 0);
        assert_eq!(reconciler.pending_overrides(), &[(4, false)]);
    }

    #[tokio::test]
    async fn test_commit_updates_existing_and_creates_missing() {
        let (conn, notifier, mut reconciler) = setup();
        conn.insert_attendance(server_record(10, 1, Some(false), Some("sick")));
        reconciler.refresh().await.unwrap();

        reconciler.toggle(1); // absent -> present
        reconciler.toggle(2); // unknown -> present
        reconciler.toggle(2); // -> absent
        conn.clear_calls();

        let outcome = reconciler
            .commit_all("staff-9", &FixedDecision(AbsenceDecision::Proceed))
            .await
            .unwrap();
        assert_eq!(outcome, CommitOutcome::Saved { count: 2 });

        assert_eq!(
            conn.calls(),
            vec![
                "update_attendance:10".to_string(),
                "create_attendance:2".to_string(),
                format!("list_attendance:{}", DATE),
            ]
        );

        let updated = conn.attendance_for(1, DATE).unwrap();
        assert_eq!(updated.is_present, Some(true));
        assert_eq!(updated.absence_reason.as_deref(), Some("sick"));
        assert_eq!(updated.reported_by.as_deref(), Some("staff-9"));

        let created = conn.attendance_for(2, DATE).unwrap();
        assert_eq!(created.is_present, Some(false));
        assert_eq!(created.absence_reason.as_deref(), Some(UNSPECIFIED_ABSENCE_REASON));

        assert!(!reconciler.has_pending_changes());
        assert_eq!(reconciler.effective_presence(2), Presence::Absent);
        assert_eq!(levels(&notifier).last(), Some(&NotificationLevel::Success));
    }

    #[tokio::test]
    async fn test_present_only_batch_skips_prompt() {
        let (conn, _notifier, mut reconciler) = setup();
        reconciler.toggle(3);

        // A Cancel answer would stop the commit if the prompt were asked
        let outcome = reconciler
            .commit_all("staff-1", &FixedDecision(AbsenceDecision::Cancel))
            .await
            .unwrap();
        assert_eq!(outcome, CommitOutcome::Saved { count: 1 });

        let created = conn.attendance_for(3, DATE).unwrap();
        assert_eq!(created.absence_reason, None);
    }

    #[tokio::test]
    async fn test_commit_requires_operator() {
        let (conn, _notifier, mut reconciler) = setup();
        reconciler.toggle(3);

        let result = reconciler
            .commit_all("  ", &FixedDecision(AbsenceDecision::Proceed))
            .await;
        assert!(matches!(result, Err(ConsoleError::Validation(_))));
        assert_eq!(conn.call_count(), 0);
        assert_eq!(reconciler.pending_count(), 1);
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_earlier_writes() {
        let (conn, notifier, mut reconciler) = setup();
        reconciler.toggle(1);
        reconciler.toggle(2);
        reconciler.toggle(3);
        conn.fail_attendance_writes_after(1);

        let result = reconciler
            .commit_all("staff-1", &FixedDecision(AbsenceDecision::Proceed))
            .await;

        match result {
            Err(ConsoleError::PartialBatchFailure { attempted, committed, message }) => {
                assert_eq!(attempted, 3);
                assert_eq!(committed, 1);
                assert_eq!(message, "Attendance service unavailable");
            }
            other => panic!("expected partial batch failure, got {:?}", other),
        }

        // Writes are sequential and stop at the first failure
        assert_eq!(
            conn.calls(),
            vec![
                "create_attendance:1".to_string(),
                "create_attendance:2".to_string(),
                format!("list_attendance:{}", DATE),
            ]
        );
        assert_eq!(conn.attendance_for(1, DATE).unwrap().is_present, Some(true));
        assert!(conn.attendance_for(2, DATE).is_none());

        // The written kid was cleared by the refresh, the rest still pend
        assert_eq!(reconciler.pending_overrides(), &[(2, true), (3, true)]);

        let errors = levels(&notifier)
            .into_iter()
            .filter(|level| *level == NotificationLevel::Error)
            .count();
        assert_eq!(errors, 1);
    }

    #[tokio::test]
    async fn test_retoggle_after_partial_failure_is_kept() {
        let (conn, _notifier, mut reconciler) = setup();
        reconciler.toggle(1);
        reconciler.toggle(2);
        conn.fail_attendance_writes_after(1);
        let _ = reconciler
            .commit_all("staff-1", &FixedDecision(AbsenceDecision::Proceed))
            .await;

        // Kid 1 is written as present; staff flips it again
        reconciler.toggle(1);
        reconciler.refresh().await.unwrap();
        assert_eq!(reconciler.effective_presence(1), Presence::Absent);
        assert_eq!(reconciler.pending_count(), 2);
    }

    #[tokio::test]
    async fn test_discard_overrides() {
        let (_conn, _notifier, mut reconciler) = setup();
        reconciler.toggle(1);
        reconciler.toggle(2);
        assert_eq!(reconciler.pending_count(), 2);

        reconciler.discard_overrides();
        assert!(!reconciler.has_pending_changes());
        assert_eq!(reconciler.effective_presence(1), Presence::Unknown);
    }

    #[tokio::test]
    async fn test_records_for_other_dates_are_ignored() {
        let (_conn, _notifier, mut reconciler) = setup();
        let other_day = AttendanceRecord {
            attendance_id: Some(3),
            kid_id: 5,
            attendance_date: NaiveDate::from_ymd_opt(2026, 3, 3).unwrap(),
            is_present: Some(true),
            absence_reason: None,
            reported_by: None,
        };

        reconciler.apply_server_records(vec![other_day]);
        assert_eq!(reconciler.effective_presence(5), Presence::Unknown);
    }
}
