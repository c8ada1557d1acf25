//! # Domain Module
//!
//! Business logic of the childcare console core.
//!
//! The services here know nothing about HTTP or screens. They talk to the
//! remote API through the storage traits and to the user through the seams
//! in `io`.
//!
//! ## Module Organization
//!
//! - **form_ledger**: per-child intake forms, status changes and the
//!   "current form" selection policy
//! - **intake_service**: starting, inspecting and summarising intake
//!   processes, including the dashboard aggregate
//! - **parent_access_service**: link token and one-time code gate in front of
//!   the parent-facing form
//! - **attendance_service**: merge of server attendance with pending toggles,
//!   statistics and the batch commit
//! - **errors**: `ConsoleError` and the user-facing message for each failure
//!
//! ## Rules Worth Knowing
//!
//! - A completed form never goes straight back to not started
//! - Progress is always derived from the forms, never stored
//! - Presence is three-valued; unknown is never counted as absent
//! - A pending attendance toggle beats any server value until it is committed

pub mod attendance_service;
pub mod commands;
pub mod errors;
pub mod form_ledger;
pub mod intake_service;
pub mod models;
pub mod parent_access_service;

pub use attendance_service::*;
pub use errors::*;
pub use form_ledger::*;
pub use intake_service::*;
pub use parent_access_service::*;
