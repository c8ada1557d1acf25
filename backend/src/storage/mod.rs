//! # Storage Module
//!
//! Access to the remote data API the console is built on.
//!
//! The console does not persist anything locally. What the rest of the code
//! calls "storage" is the remote collection of intake processes, access
//! links and attendance records, reached through the traits in [`traits`].
//!
//! ## Implementations
//!
//! - **rest**: `RestConnection`, JSON over HTTP with `reqwest`
//! - **memory**: `InMemoryConnection`, an in-process stand-in used by tests
//!   and offline demos
//!
//! DTO ↔ domain conversion lives in [`mappers`].

pub mod mappers;
pub mod memory;
pub mod rest;
pub mod traits;

pub use memory::InMemoryConnection;
pub use rest::RestConnection;
pub use traits::*;
