use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::domain::Track;

const ADMIN: &str = "admin";
const MMOD: &str = "mmod";
const TRAINING_MANAGER: &str = "training_manager";
const IN_GAME_LEADER: &str = "in_game_leader";
const DISCORD_LEADER: &str = "discord_leader";

fn default_true() -> bool {
    true
}

/// Authenticated moderator as supplied by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub username: String,
    #[serde(default = "Principal::default_role")]
    pub role: String,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub is_training_manager: bool,
    #[serde(default)]
    pub is_in_game_leader: bool,
    #[serde(default)]
    pub is_discord_leader: bool,
    #[serde(default = "default_true")]
    pub can_view_applications: bool,
}

impl Principal {
    fn default_role() -> String {
        "moderator".to_string()
    }

    pub fn moderator(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            role: Self::default_role(),
            roles: Vec::new(),
            is_admin: false,
            is_training_manager: false,
            is_in_game_leader: false,
            is_discord_leader: false,
            can_view_applications: true,
        }
    }
}

/// Single capability view derived from the primary role, the role list and the
/// individual flags. Every permission check consults this value only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilitySet {
    roles: BTreeSet<String>,
    admin: bool,
    training_manager: bool,
    in_game_leader: bool,
    discord_leader: bool,
    view_applications: bool,
}

impl CapabilitySet {
    pub fn resolve(principal: &Principal) -> Self {
        let roles: BTreeSet<String> = std::iter::once(&principal.role)
            .chain(principal.roles.iter())
            .map(|role| role.trim().to_ascii_lowercase().replace('-', "_"))
            .filter(|role| !role.is_empty())
            .collect();

        Self {
            admin: principal.is_admin || roles.contains(ADMIN),
            training_manager: principal.is_training_manager || roles.contains(TRAINING_MANAGER),
            in_game_leader: principal.is_in_game_leader || roles.contains(IN_GAME_LEADER),
            discord_leader: principal.is_discord_leader || roles.contains(DISCORD_LEADER),
            view_applications: principal.can_view_applications,
            roles,
        }
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    pub fn is_admin(&self) -> bool {
        self.admin
    }

    pub fn is_training_manager(&self) -> bool {
        self.training_manager
    }

    pub fn can_view_applications(&self) -> bool {
        self.view_applications
    }

    pub fn can_approve_track(&self, track: Track) -> bool {
        self.admin
            || match track {
                Track::Discord => self.discord_leader,
                Track::InGame => self.in_game_leader,
            }
    }

    /// Waiting / rejected (and opening a review) without full team approval.
    pub fn can_set_intermediate_status(&self) -> bool {
        self.admin
            || self.has_role(MMOD)
            || self.training_manager
            || self.in_game_leader
            || self.discord_leader
    }

    pub fn can_final_approve(&self) -> bool {
        self.training_manager
    }

    pub fn can_override_status(&self) -> bool {
        self.admin
    }

    pub fn can_delete(&self) -> bool {
        self.admin
    }

    /// Legal name and e-mail are visible to training managers only.
    pub fn can_view_identity(&self) -> bool {
        self.training_manager
    }

    pub fn can_view_audit_log(&self) -> bool {
        self.admin || self.has_role(MMOD)
    }

    pub fn can_manage_intake(&self) -> bool {
        self.admin
    }
}

/// Per-request context: who is acting and what they may do.
#[derive(Debug, Clone)]
pub struct Session {
    pub principal: Principal,
    pub capabilities: CapabilitySet,
}

impl Session {
    pub fn new(principal: Principal) -> Self {
        let capabilities = CapabilitySet::resolve(&principal);
        Self {
            principal,
            capabilities,
        }
    }

    pub fn username(&self) -> &str {
        &self.principal.username
    }
}

impl From<Principal> for Session {
    fn from(principal: Principal) -> Self {
        Self::new(principal)
    }
}
