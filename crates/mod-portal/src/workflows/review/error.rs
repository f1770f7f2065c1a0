use super::domain::ApplicationId;
use super::repository::RepositoryError;

/// Failure surfaced by every review operation.
#[derive(Debug, thiserror::Error)]
pub enum ReviewError {
    #[error("{0}")]
    Validation(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("application {0} not found")]
    NotFound(ApplicationId),
    #[error("invalid transition: {0}")]
    InvalidTransition(String),
    #[error("conflicting update: {0}")]
    Conflict(String),
    #[error("authentication required")]
    Unauthenticated,
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl ReviewError {
    /// Stable machine-readable discriminator for API clients.
    pub const fn kind(&self) -> &'static str {
        match self {
            ReviewError::Validation(_) => "validation_error",
            ReviewError::PermissionDenied(_) => "permission_denied",
            ReviewError::NotFound(_) => "not_found",
            ReviewError::InvalidTransition(_) => "invalid_transition",
            ReviewError::Conflict(_) => "conflict",
            ReviewError::Unauthenticated => "unauthenticated",
            ReviewError::Unavailable(_) => "unavailable",
        }
    }

    pub(crate) fn denied(action: &str) -> Self {
        ReviewError::PermissionDenied(format!("you are not allowed to {action}"))
    }
}

impl From<RepositoryError> for ReviewError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::NotFound(id) => ReviewError::NotFound(id),
            RepositoryError::Conflict(id) => ReviewError::Conflict(format!(
                "application {id} was modified concurrently; refresh and retry"
            )),
            RepositoryError::Unavailable(reason) => ReviewError::Unavailable(reason),
        }
    }
}

/// Reject blank comments on paths where the reviewer must explain the decision.
pub(crate) fn require_comment(comment: &str) -> Result<(), ReviewError> {
    if comment.trim().is_empty() {
        return Err(ReviewError::Validation(
            "a comment is required for this action".to_string(),
        ));
    }
    Ok(())
}
