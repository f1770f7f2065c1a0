use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use super::capability::Principal;

/// Resolves a bearer token into the acting principal.
pub trait IdentityProvider: Send + Sync {
    fn resolve(&self, token: &str) -> Result<Principal, IdentityError>;
}

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("unknown or expired credentials")]
    UnknownToken,
    #[error("failed to read roster {path}: {source}")]
    RosterIo {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse roster: {0}")]
    RosterFormat(#[from] serde_json::Error),
    #[error("roster token for '{0}' is empty")]
    EmptyToken(String),
}

#[derive(Debug, Deserialize)]
struct RosterEntry {
    token: String,
    principal: Principal,
}

/// Token table loaded from a JSON roster, e.g.
/// `[{"token": "s3cr3t", "principal": {"username": "ana", "is_admin": true}}]`.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentityProvider {
    principals: HashMap<String, Principal>,
}

impl StaticIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_principal(mut self, token: impl Into<String>, principal: Principal) -> Self {
        self.principals.insert(token.into(), principal);
        self
    }

    pub fn from_json(raw: &str) -> Result<Self, IdentityError> {
        let entries: Vec<RosterEntry> = serde_json::from_str(raw)?;
        let mut provider = Self::new();
        for entry in entries {
            if entry.token.trim().is_empty() {
                return Err(IdentityError::EmptyToken(entry.principal.username));
            }
            provider = provider.with_principal(entry.token, entry.principal);
        }
        Ok(provider)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, IdentityError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| IdentityError::RosterIo {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&raw)
    }

    pub fn len(&self) -> usize {
        self.principals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.principals.is_empty()
    }
}

impl IdentityProvider for StaticIdentityProvider {
    fn resolve(&self, token: &str) -> Result<Principal, IdentityError> {
        self.principals
            .get(token)
            .cloned()
            .ok_or(IdentityError::UnknownToken)
    }
}
