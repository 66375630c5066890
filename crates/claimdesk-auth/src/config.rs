//! Authentication and field-encryption configuration.

/// Configuration for password hashing and sensitive-field encryption.
#[derive(Clone)]
pub struct AuthConfig {
    /// Optional pepper prepended to passwords before Argon2id hashing and
    /// verification.
    pub pepper: Option<String>,
    /// Minimum password length accepted when creating accounts.
    pub min_password_length: usize,
    /// 256-bit AES-GCM key for customer national identifiers.
    pub field_encryption_key: [u8; 32],
}

/// Minimum password length when none is configured.
pub const DEFAULT_MIN_PASSWORD_LENGTH: usize = 8;

impl AuthConfig {
    /// No pepper and the default minimum password length. There is no
    /// `Default`: the field key must always be supplied.
    pub fn new(field_encryption_key: [u8; 32]) -> Self {
        Self {
            pepper: None,
            min_password_length: DEFAULT_MIN_PASSWORD_LENGTH,
            field_encryption_key,
        }
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("pepper", &self.pepper.as_ref().map(|_| "<redacted>"))
            .field("min_password_length", &self.min_password_length)
            .field("field_encryption_key", &"<redacted>")
            .finish()
    }
}
