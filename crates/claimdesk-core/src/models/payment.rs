//! Payment domain model.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ClaimdeskError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    #[default]
    Completed,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = ClaimdeskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "completed" => Ok(PaymentStatus::Completed),
            "failed" => Ok(PaymentStatus::Failed),
            other => Err(ClaimdeskError::validation(format!(
                "unknown payment status: {other}"
            ))),
        }
    }
}

/// What a payment settles: a policy premium or a claim payout.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum PaymentTarget {
    Policy(i64),
    Claim(i64),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: i64,
    pub target: PaymentTarget,
    pub amount: Decimal,
    pub payment_date: NaiveDate,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
}

/// Reject zero and negative payment amounts.
pub fn validate_payment_amount(amount: Decimal) -> Result<(), ClaimdeskError> {
    if amount <= Decimal::ZERO {
        return Err(ClaimdeskError::validation(format!(
            "payment amount must be positive, got {amount}"
        )));
    }
    Ok(())
}
