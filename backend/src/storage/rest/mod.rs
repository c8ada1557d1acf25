//! # REST Storage
//!
//! `RestConnection` talks JSON over HTTP to the remote console API and
//! implements every storage trait. One file per endpoint family.

pub mod attendance_repository;
pub mod connection;
pub mod intake_repository;
pub mod parent_access_repository;

#[cfg(test)]
pub(crate) mod test_utils;

pub use connection::RestConnection;
