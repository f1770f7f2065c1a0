use serde::{Deserialize, Serialize};

use super::domain::{Application, ApplicationId, ApplicationStatus, Position};

/// Stored application plus the optimistic concurrency version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationRecord {
    pub application: Application,
    pub version: u64,
}

impl ApplicationRecord {
    pub fn id(&self) -> &ApplicationId {
        &self.application.id
    }
}

/// Query parameters accepted by [`ApplicationRepository::list`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplicationFilter {
    pub status: Option<ApplicationStatus>,
    pub position: Option<Position>,
}

impl ApplicationFilter {
    pub fn matches(&self, application: &Application) -> bool {
        self.status.map_or(true, |status| application.status == status)
            && self
                .position
                .map_or(true, |position| application.position() == position)
    }
}

/// Storage abstraction for application records.
///
/// `update` and `delete` are compare-and-swap operations: they succeed only when the
/// stored version still equals `record.version` / `expected_version`, and `update`
/// returns the record with its version bumped.
pub trait ApplicationRepository: Send + Sync {
    fn insert(&self, application: Application) -> Result<ApplicationRecord, RepositoryError>;
    fn update(&self, record: ApplicationRecord) -> Result<ApplicationRecord, RepositoryError>;
    fn fetch(&self, id: &ApplicationId) -> Result<Option<ApplicationRecord>, RepositoryError>;
    fn delete(&self, id: &ApplicationId, expected_version: u64) -> Result<(), RepositoryError>;
    fn list(&self, filter: &ApplicationFilter) -> Result<Vec<ApplicationRecord>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("application {0} was modified concurrently")]
    Conflict(ApplicationId),
    #[error("application {0} not found")]
    NotFound(ApplicationId),
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
