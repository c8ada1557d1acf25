//! # IO Module
//!
//! The boundary between the console core and whatever presents it.
//!
//! The screens themselves live elsewhere; this module holds the pieces the
//! core needs from them, expressed as traits and small runtime helpers:
//!
//! - **notifications**: the toast surface (`Notifier`) and the blocking
//!   absence confirmation (`AbsencePrompt`)
//! - **periodic_refresh**: a cancelable scheduled task for views that keep
//!   data fresh on an interval

pub mod notifications;
pub mod periodic_refresh;

pub use notifications::*;
pub use periodic_refresh::*;
