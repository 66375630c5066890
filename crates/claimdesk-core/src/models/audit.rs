//! Audit log domain model.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ClaimdeskError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Create,
    Update,
    /// Disclosure of sensitive data (e.g. a decrypted national id).
    View,
    Delete,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Create => "create",
            AuditAction::Update => "update",
            AuditAction::View => "view",
            AuditAction::Delete => "delete",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditAction {
    type Err = ClaimdeskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(AuditAction::Create),
            "update" => Ok(AuditAction::Update),
            "view" => Ok(AuditAction::View),
            "delete" => Ok(AuditAction::Delete),
            other => Err(ClaimdeskError::validation(format!(
                "unknown audit action: {other}"
            ))),
        }
    }
}

/// An immutable audit trail row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: i64,
    /// `None` for system actions.
    pub user_id: Option<i64>,
    pub action: AuditAction,
    pub table_name: String,
    pub record_id: Option<i64>,
    pub details: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAuditLogEntry {
    pub user_id: Option<i64>,
    pub action: AuditAction,
    pub table_name: String,
    pub record_id: Option<i64>,
    pub details: Option<serde_json::Value>,
}
