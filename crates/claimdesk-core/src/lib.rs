//! Claimdesk Core — domain types shared by every Claimdesk crate.
//!
//! This crate provides:
//! - Domain models for users, branches, customers, policies, claims,
//!   payments and audit entries ([`models`])
//! - The error taxonomy surfaced to UI callers ([`ClaimdeskError`])
//! - The static role hierarchy ([`access`])
//! - Async repository contracts implemented by `claimdesk-db`
//!   ([`repository`])
//!
//! Nothing in here touches storage.

pub mod access;
pub mod error;
pub mod models;
pub mod repository;

pub use access::{authorize, has_access, has_access_named};
pub use error::{ClaimdeskError, ClaimdeskResult};
