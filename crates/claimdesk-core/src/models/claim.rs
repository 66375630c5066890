//! Claim domain model and claim numbering.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ClaimdeskError;

/// Prefix of every human-facing claim number.
pub const CLAIM_NUMBER_PREFIX: &str = "CLM-";

/// Minimum digits in a claim number; longer sequences simply widen.
pub const CLAIM_NUMBER_WIDTH: usize = 3;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ClaimStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    Paid,
}

impl ClaimStatus {
    pub const ALL: [ClaimStatus; 4] = [
        ClaimStatus::Pending,
        ClaimStatus::Approved,
        ClaimStatus::Rejected,
        ClaimStatus::Paid,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimStatus::Pending => "pending",
            ClaimStatus::Approved => "approved",
            ClaimStatus::Rejected => "rejected",
            ClaimStatus::Paid => "paid",
        }
    }

    /// The forward workflow: pending → approved | rejected, approved → paid.
    ///
    /// Storage does not enforce this; `update_status` only logs transitions
    /// that fall outside it.
    pub fn can_transition_to(&self, next: ClaimStatus) -> bool {
        use ClaimStatus::*;
        matches!(
            (self, next),
            (Pending, Approved) | (Pending, Rejected) | (Approved, Paid)
        ) || *self == next
    }
}

impl fmt::Display for ClaimStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClaimStatus {
    type Err = ClaimdeskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(ClaimStatus::Pending),
            "approved" => Ok(ClaimStatus::Approved),
            "rejected" => Ok(ClaimStatus::Rejected),
            "paid" => Ok(ClaimStatus::Paid),
            other => Err(ClaimdeskError::validation(format!(
                "unknown claim status: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claim {
    pub id: i64,
    pub policy_id: i64,
    pub claim_number: String,
    pub claim_date: NaiveDate,
    pub incident_date: NaiveDate,
    pub incident_time: Option<NaiveTime>,
    pub incident_location: Option<String>,
    pub description: String,
    pub claim_amount: Decimal,
    pub status: ClaimStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateClaim {
    pub policy_id: i64,
    pub claim_date: NaiveDate,
    pub incident_date: NaiveDate,
    pub incident_time: Option<NaiveTime>,
    pub incident_location: Option<String>,
    pub description: String,
    pub claim_amount: Decimal,
    /// Raw status from the form. Missing or unrecognized values become
    /// `pending`.
    pub status: Option<String>,
}

impl CreateClaim {
    pub fn validate(&self) -> Result<(), ClaimdeskError> {
        if self.description.trim().is_empty() {
            return Err(ClaimdeskError::validation("claim description is required"));
        }
        if self.claim_amount.is_sign_negative() {
            return Err(ClaimdeskError::validation("claim amount cannot be negative"));
        }
        if self.incident_date > self.claim_date {
            return Err(ClaimdeskError::validation(format!(
                "incident date {} is after the claim date {}",
                self.incident_date, self.claim_date
            )));
        }
        Ok(())
    }
}

/// Format a claim sequence number, e.g. `7` → `CLM-007`.
pub fn format_claim_number(sequence: u64) -> String {
    format!("{CLAIM_NUMBER_PREFIX}{sequence:0width$}", width = CLAIM_NUMBER_WIDTH)
}

/// The claim number following the highest sequence issued so far.
pub fn next_claim_number(highest: Option<u64>) -> String {
    format_claim_number(highest.unwrap_or(0) + 1)
}
