//! Domain models for Claimdesk.
//!
//! These are the plain data structures handed to and returned from the
//! repository contracts. Enumerated columns are closed enums with
//! `as_str` / `FromStr` so an invalid value is rejected when it is parsed,
//! not when it reaches storage.

pub mod audit;
pub mod branch;
pub mod claim;
pub mod customer;
pub mod payment;
pub mod policy;
pub mod user;
