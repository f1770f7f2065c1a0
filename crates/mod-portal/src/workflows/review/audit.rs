use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{ApplicationId, ApplicationStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    StatusChanged,
    TeamApproved,
    TeamUnapproved,
    Deleted,
}

/// Immutable record of a status change, team approval toggle or deletion.
///
/// `application_name` is copied at write time so entries for deleted applications stay
/// readable. `new_status` is `None` for deletions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: String,
    pub action: AuditAction,
    pub application_id: ApplicationId,
    pub application_name: String,
    pub performed_by: String,
    pub comment: String,
    pub old_status: ApplicationStatus,
    pub new_status: Option<ApplicationStatus>,
    pub created_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(
        action: AuditAction,
        application_id: ApplicationId,
        application_name: impl Into<String>,
        performed_by: impl Into<String>,
        comment: impl Into<String>,
        old_status: ApplicationStatus,
        new_status: Option<ApplicationStatus>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            action,
            application_id,
            application_name: application_name.into(),
            performed_by: performed_by.into(),
            comment: comment.into(),
            old_status,
            new_status,
            created_at: Utc::now(),
        }
    }
}

/// Append-only sink for audit entries. The workflow never reads it for decisions.
pub trait AuditSink: Send + Sync {
    fn record(&self, entry: AuditEntry) -> Result<(), AuditError>;
    /// Newest entries first.
    fn recent(&self, limit: usize) -> Result<Vec<AuditEntry>, AuditError>;
}

#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("audit sink unavailable: {0}")]
    Unavailable(String),
}
