//! Customer domain model.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ClaimdeskError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    /// National identifier (SSN), decrypted. Stored AES-256-GCM encrypted.
    pub national_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCustomer {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    /// Plaintext national identifier; encrypted before it is stored.
    pub national_id: Option<String>,
}

impl CreateCustomer {
    pub fn validate(&self) -> Result<(), ClaimdeskError> {
        if self.first_name.trim().is_empty() || self.last_name.trim().is_empty() {
            return Err(ClaimdeskError::validation(
                "first name and last name are required",
            ));
        }
        validate_email(&self.email)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateCustomer {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    /// `Some(Some(v))` = set, `Some(None)` = clear, `None` = no change.
    pub phone: Option<Option<String>>,
    pub address: Option<Option<String>>,
    pub date_of_birth: Option<Option<NaiveDate>>,
    pub national_id: Option<Option<String>>,
}

impl UpdateCustomer {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.email.is_none()
            && self.phone.is_none()
            && self.address.is_none()
            && self.date_of_birth.is_none()
            && self.national_id.is_none()
    }

    pub fn validate(&self) -> Result<(), ClaimdeskError> {
        let blank = |v: &Option<String>| v.as_deref().is_some_and(|s| s.trim().is_empty());
        if blank(&self.first_name) || blank(&self.last_name) {
            return Err(ClaimdeskError::validation(
                "first name and last name cannot be blank",
            ));
        }
        match &self.email {
            Some(email) => validate_email(email),
            None => Ok(()),
        }
    }
}

/// Filter for customer listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CustomerFilter {
    /// Customers owning at least one policy.
    WithPolicies,
    /// Customers owning no policy.
    WithoutPolicies,
}

fn validate_email(email: &str) -> Result<(), ClaimdeskError> {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
        _ => Err(ClaimdeskError::validation(format!(
            "invalid email address: {email:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jane() -> CreateCustomer {
        CreateCustomer {
            first_name: "Jane".into(),
            last_name: "Doe".into(),
            email: "jane.doe@example.com".into(),
            phone: None,
            address: None,
            date_of_birth: None,
            national_id: None,
        }
    }

    #[test]
    fn valid_customer_passes() {
        assert!(jane().validate().is_ok());
    }

    #[test]
    fn missing_name_is_rejected() {
        let mut input = jane();
        input.last_name = "  ".into();
        assert!(input.validate().is_err());
    }

    #[test]
    fn malformed_email_is_rejected() {
        for email in ["", "jane", "@example.com", "jane@"] {
            let mut input = jane();
            input.email = email.into();
            assert!(input.validate().is_err(), "{email:?} should be rejected");
        }
    }

    #[test]
    fn empty_update_is_detected() {
        assert!(UpdateCustomer::default().is_empty());
        let update = UpdateCustomer {
            phone: Some(None),
            ..Default::default()
        };
        assert!(!update.is_empty());
    }
}
