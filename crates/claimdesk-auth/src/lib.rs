//! Claimdesk Auth — password hashing, login, and encryption of sensitive
//! customer fields.

pub mod cipher;
pub mod config;
pub mod error;
pub mod password;
pub mod service;

pub use cipher::FieldCipher;
pub use config::AuthConfig;
pub use error::AuthError;
pub use service::{AuthService, LoginInput, Session};
