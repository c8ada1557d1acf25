//! Domain models for the parent-facing access link flow.

use chrono::NaiveDate;

use super::intake::{FormId, KidId};

/// What a valid access token points at. Shown before the code challenge.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkTarget {
    pub kid_id: KidId,
    pub kid_name: String,
    pub form_id: FormId,
}

/// Kid details released only after the one-time code is verified
#[derive(Debug, Clone, PartialEq)]
pub struct KidInfo {
    pub kid_id: KidId,
    pub first_name: String,
    pub last_name: String,
    pub birth_date: Option<NaiveDate>,
    pub class_name: Option<String>,
    pub form_id: FormId,
}

impl KidInfo {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }
}

/// Position in the access-link state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateStage {
    LinkOpened,
    TokenValidating,
    /// Terminal
    TokenInvalid,
    TokenValid,
    CodeRequested,
    CodeSent,
    CodeSubmitted,
    /// Terminal
    Verified,
}

/// Ephemeral, in-memory session for one opened link.
///
/// `kid_info` is `Some` exactly when `verified` is true; only the gate can
/// change either.
#[derive(Debug, Clone, PartialEq)]
pub struct ParentAccessSession {
    token: String,
    phone_number: Option<String>,
    code_sent: bool,
    verified: bool,
    kid_info: Option<KidInfo>,
    link: Option<LinkTarget>,
    stage: GateStage,
}

impl ParentAccessSession {
    pub fn open(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            phone_number: None,
            code_sent: false,
            verified: false,
            kid_info: None,
            link: None,
            stage: GateStage::LinkOpened,
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn phone_number(&self) -> Option<&str> {
        self.phone_number.as_deref()
    }

    pub fn code_sent(&self) -> bool {
        self.code_sent
    }

    pub fn verified(&self) -> bool {
        self.verified
    }

    pub fn kid_info(&self) -> Option<&KidInfo> {
        self.kid_info.as_ref()
    }

    pub fn link(&self) -> Option<&LinkTarget> {
        self.link.as_ref()
    }

    pub fn stage(&self) -> GateStage {
        self.stage
    }

    pub(crate) fn set_stage(&mut self, stage: GateStage) {
        self.stage = stage;
    }

    pub(crate) fn accept_link(&mut self, link: LinkTarget) {
        self.link = Some(link);
        self.stage = GateStage::TokenValid;
    }

    pub(crate) fn mark_code_sent(&mut self, phone_number: String) {
        self.phone_number = Some(phone_number);
        self.code_sent = true;
        self.stage = GateStage::CodeSent;
    }

    pub(crate) fn mark_verified(&mut self, kid_info: KidInfo) {
        self.kid_info = Some(kid_info);
        self.verified = true;
        self.stage = GateStage::Verified;
    }

    pub(crate) fn clear_verification(&mut self) {
        self.verified = false;
        self.kid_info = None;
        self.code_sent = false;
        self.phone_number = None;
        if self.link.is_some() {
            self.stage = GateStage::TokenValid;
        }
    }
}
