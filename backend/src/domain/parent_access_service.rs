//! Verification gate for the parent-facing intake channel.
//!
//! A parent holds nothing but a link. The gate checks the link's token,
//! has a one-time code sent to a phone number, and only exposes the child's
//! details once that code has been confirmed by the server.

use log::{info, warn};
use shared::{SendCodeRequest, VerifyCodeRequest};
use std::sync::Arc;

use crate::domain::commands::parent_access::{RequestCodeCommand, SubmitCodeCommand};
use crate::domain::errors::{ConsoleError, TRANSPORT_FALLBACK_MESSAGE};
use crate::domain::models::{FormId, GateStage, KidInfo, LinkTarget, ParentAccessSession};
use crate::storage::mappers::ParentAccessMapper;
use crate::storage::ParentAccessStorage;

const MIN_PHONE_DIGITS: usize = 7;
const MAX_PHONE_DIGITS: usize = 15;

/// Strip the separators people type into phone numbers.
///
/// Accepts digits with an optional leading `+`.
pub fn normalize_phone_number(raw: &str) -> Result<String, ConsoleError> {
    let compact: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')' | '.'))
        .collect();

    let digits = compact.strip_prefix('+').unwrap_or(&compact);
    if digits.is_empty() {
        return Err(ConsoleError::Validation(
            "Please enter a phone number.".to_string(),
        ));
    }
    if !digits.chars().all(|c| c.is_ascii_digit())
        || !(MIN_PHONE_DIGITS..=MAX_PHONE_DIGITS).contains(&digits.len())
    {
        return Err(ConsoleError::Validation(
            "Please enter a valid phone number.".to_string(),
        ));
    }

    Ok(compact)
}

/// One gate per opened link
pub struct ParentAccessGate<S: ParentAccessStorage> {
    storage: Arc<S>,
    session: ParentAccessSession,
}

impl<S: ParentAccessStorage> ParentAccessGate<S> {
    pub fn open(storage: Arc<S>, token: impl Into<String>) -> Self {
        Self {
            storage,
            session: ParentAccessSession::open(token),
        }
    }

    pub fn session(&self) -> &ParentAccessSession {
        &self.session
    }

    /// Check the link's token with the server.
    ///
    /// Unknown and expired tokens both come back as `LinkExpired` so callers
    /// cannot tell them apart. A rejected token is final for this gate.
    pub async fn verify_access(&mut self) -> Result<LinkTarget, ConsoleError> {
        match self.session.stage() {
            GateStage::TokenInvalid => return Err(ConsoleError::LinkExpired),
            GateStage::LinkOpened => {}
            _ => {
                if let Some(link) = self.session.link() {
                    return Ok(link.clone());
                }
            }
        }

        let token = self.session.token().trim().to_string();
        if token.is_empty() {
            self.session.set_stage(GateStage::TokenInvalid);
            return Err(ConsoleError::LinkExpired);
        }

        info!("Validating parent access link");
        self.session.set_stage(GateStage::TokenValidating);

        match self.storage.validate_token(&token).await {
            Ok(response) => {
                let link = ParentAccessMapper::link_to_domain(response);
                info!(
                    "Access link accepted for kid {} form {}",
                    link.kid_id, link.form_id
                );
                self.session.accept_link(link.clone());
                Ok(link)
            }
            Err(e) if e.is_client_rejection() => {
                // The server's reason stays in the log only
                warn!("Access link rejected: {}", e);
                self.session.set_stage(GateStage::TokenInvalid);
                Err(ConsoleError::LinkExpired)
            }
            Err(e) => {
                warn!("Access link could not be checked: {}", e);
                self.session.set_stage(GateStage::LinkOpened);
                Err(ConsoleError::TransportFailure(
                    TRANSPORT_FALLBACK_MESSAGE.to_string(),
                ))
            }
        }
    }

    /// Ask the server to text a fresh one-time code.
    ///
    /// The session only moves to `CodeSent` once the send call succeeded.
    pub async fn request_code(&mut self, command: RequestCodeCommand) -> Result<(), ConsoleError> {
        let previous_stage = self.session.stage();
        if !matches!(previous_stage, GateStage::TokenValid | GateStage::CodeSent) {
            return Err(ConsoleError::Validation(
                "The access link must be verified before a code can be sent.".to_string(),
            ));
        }
        self.check_form(command.form_id)?;
        let phone_number = normalize_phone_number(&command.phone_number)?;

        info!("Requesting verification code for form {}", command.form_id);
        self.session.set_stage(GateStage::CodeRequested);

        let request = SendCodeRequest {
            form_id: command.form_id.0,
            phone_number: phone_number.clone(),
        };
        match self.storage.send_code(&request).await {
            Ok(()) => {
                self.session.mark_code_sent(phone_number);
                info!("Verification code sent for form {}", command.form_id);
                Ok(())
            }
            Err(e) => {
                warn!("Sending verification code failed: {}", e);
                self.session.set_stage(previous_stage);
                Err(ConsoleError::SendFailed(e.to_string()))
            }
        }
    }

    /// Confirm the code. This is the only way the child's details get in.
    pub async fn submit_code(&mut self, command: SubmitCodeCommand) -> Result<KidInfo, ConsoleError> {
        if self.session.stage() != GateStage::CodeSent {
            return Err(ConsoleError::Validation(
                "Please request a verification code first.".to_string(),
            ));
        }
        self.check_form(command.form_id)?;
        let phone_number = normalize_phone_number(&command.phone_number)?;
        let code = command.code.trim().to_string();
        if code.is_empty() {
            return Err(ConsoleError::Validation(
                "Please enter the verification code.".to_string(),
            ));
        }

        info!("Submitting verification code for form {}", command.form_id);
        self.session.set_stage(GateStage::CodeSubmitted);

        let request = VerifyCodeRequest {
            form_id: command.form_id.0,
            phone_number,
            code,
        };
        let result = self
            .storage
            .verify_code(&request)
            .await
            .and_then(ParentAccessMapper::kid_info_to_domain);

        match result {
            Ok(kid_info) => {
                info!("Parent verified for kid {}", kid_info.kid_id);
                self.session.mark_verified(kid_info.clone());
                Ok(kid_info)
            }
            Err(e) if e.is_client_rejection() => {
                warn!("Verification code rejected for form {}", command.form_id);
                self.session.set_stage(GateStage::CodeSent);
                Err(ConsoleError::InvalidCode)
            }
            Err(e) => {
                warn!("Verification code could not be checked: {}", e);
                self.session.set_stage(GateStage::CodeSent);
                Err(ConsoleError::TransportFailure(
                    TRANSPORT_FALLBACK_MESSAGE.to_string(),
                ))
            }
        }
    }

    /// Start the code flow over. The token and its link are kept.
    pub fn reset_verification(&mut self) {
        info!("Resetting parent verification");
        self.session.clear_verification();
    }

    fn check_form(&self, form_id: FormId) -> Result<(), ConsoleError> {
        match self.session.link() {
            Some(link) if link.form_id != form_id => Err(ConsoleError::Validation(format!(
                "This link does not grant access to form {}.",
                form_id
            ))),
            _ => Ok(()),
        }
    }
}
