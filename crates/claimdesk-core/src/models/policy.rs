//! Policy domain model.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ClaimdeskError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "UPPERCASE")]
pub enum PolicyType {
    Auto,
    Home,
    Life,
    Health,
    Travel,
    Pet,
    Business,
}

impl PolicyType {
    pub const ALL: [PolicyType; 7] = [
        PolicyType::Auto,
        PolicyType::Home,
        PolicyType::Life,
        PolicyType::Health,
        PolicyType::Travel,
        PolicyType::Pet,
        PolicyType::Business,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyType::Auto => "AUTO",
            PolicyType::Home => "HOME",
            PolicyType::Life => "LIFE",
            PolicyType::Health => "HEALTH",
            PolicyType::Travel => "TRAVEL",
            PolicyType::Pet => "PET",
            PolicyType::Business => "BUSINESS",
        }
    }
}

impl fmt::Display for PolicyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PolicyType {
    type Err = ClaimdeskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        PolicyType::ALL
            .into_iter()
            .find(|t| t.as_str() == upper)
            .ok_or_else(|| ClaimdeskError::validation(format!("unknown policy type: {s}")))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum PolicyStatus {
    #[default]
    Active,
    Inactive,
    Cancelled,
    Expired,
}

impl PolicyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyStatus::Active => "active",
            PolicyStatus::Inactive => "inactive",
            PolicyStatus::Cancelled => "cancelled",
            PolicyStatus::Expired => "expired",
        }
    }
}

impl fmt::Display for PolicyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PolicyStatus {
    type Err = ClaimdeskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(PolicyStatus::Active),
            "inactive" => Ok(PolicyStatus::Inactive),
            "cancelled" => Ok(PolicyStatus::Cancelled),
            "expired" => Ok(PolicyStatus::Expired),
            other => Err(ClaimdeskError::validation(format!(
                "unknown policy status: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    pub id: i64,
    pub customer_id: i64,
    pub policy_type: PolicyType,
    pub policy_number: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub premium: Decimal,
    pub coverage_limit: Decimal,
    pub status: PolicyStatus,
    pub payment_schedule: Option<String>,
    pub beneficiary_info: Option<String>,
    pub exclusions: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePolicy {
    pub customer_id: i64,
    pub policy_type: PolicyType,
    pub policy_number: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub premium: Decimal,
    pub coverage_limit: Decimal,
    /// Defaults to [`PolicyStatus::Active`].
    pub status: Option<PolicyStatus>,
    pub payment_schedule: Option<String>,
    pub beneficiary_info: Option<String>,
    pub exclusions: Option<String>,
}

impl CreatePolicy {
    pub fn validate(&self) -> Result<(), ClaimdeskError> {
        if self.policy_number.trim().is_empty() {
            return Err(ClaimdeskError::validation("policy number is required"));
        }
        if self.end_date < self.start_date {
            return Err(ClaimdeskError::validation(format!(
                "policy ends ({}) before it starts ({})",
                self.end_date, self.start_date
            )));
        }
        validate_amounts(Some(self.premium), Some(self.coverage_limit))
    }
}

/// Partial update of the financial terms of a policy.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdatePolicyDetails {
    pub coverage_limit: Option<Decimal>,
    pub premium: Option<Decimal>,
}

impl UpdatePolicyDetails {
    pub fn is_empty(&self) -> bool {
        self.coverage_limit.is_none() && self.premium.is_none()
    }

    pub fn validate(&self) -> Result<(), ClaimdeskError> {
        validate_amounts(self.premium, self.coverage_limit)
    }
}

fn validate_amounts(
    premium: Option<Decimal>,
    coverage_limit: Option<Decimal>,
) -> Result<(), ClaimdeskError> {
    if premium.is_some_and(|p| p.is_sign_negative()) {
        return Err(ClaimdeskError::validation("premium cannot be negative"));
    }
    if coverage_limit.is_some_and(|c| c.is_sign_negative()) {
        return Err(ClaimdeskError::validation("coverage limit cannot be negative"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn auto_policy() -> CreatePolicy {
        CreatePolicy {
            customer_id: 1,
            policy_type: PolicyType::Auto,
            policy_number: "POL-001".into(),
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            premium: dec!(1200.00),
            coverage_limit: dec!(50000),
            status: None,
            payment_schedule: None,
            beneficiary_info: None,
            exclusions: None,
        }
    }

    #[test]
    fn policy_type_parses_case_insensitively() {
        assert_eq!("auto".parse::<PolicyType>().unwrap(), PolicyType::Auto);
        assert_eq!("BUSINESS".parse::<PolicyType>().unwrap(), PolicyType::Business);
        assert!("boat".parse::<PolicyType>().is_err());
    }

    #[test]
    fn policy_status_defaults_to_active() {
        assert_eq!(PolicyStatus::default(), PolicyStatus::Active);
    }

    #[test]
    fn inverted_window_is_rejected() {
        let mut input = auto_policy();
        input.end_date = NaiveDate::from_ymd_opt(2023, 12, 31).unwrap();
        assert!(input.validate().is_err());
    }

    #[test]
    fn negative_premium_is_rejected() {
        let mut input = auto_policy();
        input.premium = dec!(-1);
        assert!(input.validate().is_err());
        assert!(auto_policy().validate().is_ok());
    }
}
