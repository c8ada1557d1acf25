//! Form-completion ledger.
//!
//! Source of truth for which intake forms exist for a child and where each
//! one stands. Offers read access, single-form status changes, and the
//! policy that picks the one form a screen should put in front of the user.

use chrono::Utc;
use log::{info, warn};
use shared::{FormStatus, UpdateFormStatusRequest};
use std::sync::Arc;

use crate::domain::commands::intake::{MarkFormStatusCommand, MarkFormStatusResult};
use crate::domain::errors::ConsoleError;
use crate::domain::models::{FormId, IntakeForm, KidId};
use crate::storage::mappers::IntakeMapper;
use crate::storage::IntakeStorage;

/// Reject moves the ledger does not allow. Going from `Completed` straight
/// back to `NotStarted` needs an explicit reset, which is not a status change.
pub fn check_transition(
    form_id: FormId,
    from: FormStatus,
    to: FormStatus,
) -> Result<(), ConsoleError> {
    if from == FormStatus::Completed && to == FormStatus::NotStarted {
        return Err(ConsoleError::InvalidTransition { form_id, from, to });
    }
    Ok(())
}

/// Pick the form a summary should show right now.
///
/// In-progress work wins over forms waiting on parents, which win over
/// untouched forms. With none of those left, the most recently updated form
/// is returned. Ties go to the lowest form id.
pub fn current_form(forms: &[IntakeForm]) -> Option<&IntakeForm> {
    let mut ordered: Vec<&IntakeForm> = forms.iter().collect();
    ordered.sort_by_key(|form| form.form_id);

    for status in [
        FormStatus::InProgress,
        FormStatus::SentToParent,
        FormStatus::NotStarted,
    ] {
        if let Some(form) = ordered.iter().find(|form| form.status == status) {
            return Some(form);
        }
    }

    ordered
        .into_iter()
        .rev()
        .max_by_key(|form| form.activity_time())
}

/// Ledger over the remote intake collection
pub struct FormLedger<S: IntakeStorage> {
    storage: Arc<S>,
}

impl<S: IntakeStorage> Clone for FormLedger<S> {
    fn clone(&self) -> Self {
        Self {
            storage: self.storage.clone(),
        }
    }
}

impl<S: IntakeStorage> FormLedger<S> {
    pub fn new(storage: Arc<S>) -> Self {
        Self { storage }
    }

    /// All forms for a child, ordered by form id
    pub async fn get_forms_for_kid(&self, kid_id: KidId) -> Result<Vec<IntakeForm>, ConsoleError> {
        info!("Loading intake forms for kid {}", kid_id);

        let process = self
            .storage
            .get_process(kid_id)
            .await?
            .ok_or_else(|| {
                warn!("No intake process for kid {}", kid_id);
                ConsoleError::NotFound(format!("No intake process for kid {}", kid_id))
            })?;

        let mut forms = IntakeMapper::process_to_domain(process)?.forms;
        forms.sort_by_key(|form| form.form_id);

        info!("Found {} intake forms for kid {}", forms.len(), kid_id);
        Ok(forms)
    }

    /// Change exactly one form's status. Other forms are never touched.
    pub async fn mark_form_status(
        &self,
        command: MarkFormStatusCommand,
    ) -> Result<MarkFormStatusResult, ConsoleError> {
        info!(
            "Marking form {} of kid {} as {}",
            command.form_id, command.kid_id, command.status
        );

        let forms = self.get_forms_for_kid(command.kid_id).await?;
        let mut form = forms
            .into_iter()
            .find(|form| form.form_id == command.form_id)
            .ok_or_else(|| {
                ConsoleError::NotFound(format!(
                    "Form {} not found for kid {}",
                    command.form_id, command.kid_id
                ))
            })?;

        let previous_status = form.status;
        check_transition(command.form_id, previous_status, command.status)?;

        let request = UpdateFormStatusRequest {
            kid_id: command.kid_id,
            form_id: command.form_id.0,
            status: command.status,
        };
        self.storage.update_form_status(&request).await?;

        // Only status and last update change; start_date is whatever the server reported
        form.status = command.status;
        form.last_updated = Some(Utc::now());

        info!(
            "Form {} of kid {} moved {} -> {}",
            form.form_id, form.kid_id, previous_status, form.status
        );
        Ok(MarkFormStatusResult {
            form,
            previous_status,
        })
    }
}
