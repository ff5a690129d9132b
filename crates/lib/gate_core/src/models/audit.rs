//! Admin audit log entries.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Whether the recorded action went through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditStatus {
    Success,
    Failed,
}

impl AuditStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditStatus::Success => "success",
            AuditStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for AuditStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(AuditStatus::Success),
            "failed" => Ok(AuditStatus::Failed),
            other => Err(format!("unknown audit status: {other}")),
        }
    }
}

/// One administrative action, as persisted.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub id: Uuid,
    /// Admin who performed the action.
    pub admin_id: Uuid,
    /// Username at the time of the action.
    pub admin_name: String,
    /// `create_user`, `update_admin`, ...
    pub action: String,
    /// `user` or `admin`.
    pub resource_type: String,
    pub resource_id: String,
    /// What changed, in words.
    pub details: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub status: AuditStatus,
    /// Why a failed action was refused.
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_wire_names() {
        assert_eq!(AuditStatus::Success.to_string(), "success");
        assert_eq!("failed".parse::<AuditStatus>(), Ok(AuditStatus::Failed));
        assert!("ok".parse::<AuditStatus>().is_err());
        assert_eq!(
            serde_json::to_string(&AuditStatus::Failed).unwrap(),
            "\"failed\""
        );
    }
}
