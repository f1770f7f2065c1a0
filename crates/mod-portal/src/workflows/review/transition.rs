//! The status state machine. `plan_status_change` is the only place that decides whether
//! a requested status is reachable, and under which guard.

use super::approval::{full_team_approved, outstanding_tracks};
use super::capability::CapabilitySet;
use super::domain::{Application, ApplicationStatus, Track};
use super::error::ReviewError;

/// Guard under which a status change is carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionPath {
    /// `awaiting_review` → `pending`.
    BeginReview,
    /// Review states → `waiting` / `rejected`, and `waiting` → `rejected`.
    Intermediate,
    /// Fully team approved → `approved`.
    FinalApproval,
    /// Admin correction between any two statuses.
    AdminOverride,
}

impl TransitionPath {
    pub const fn label(self) -> &'static str {
        match self {
            TransitionPath::BeginReview => "begin_review",
            TransitionPath::Intermediate => "intermediate",
            TransitionPath::FinalApproval => "final_approval",
            TransitionPath::AdminOverride => "admin_override",
        }
    }

    fn permitted(self, capabilities: &CapabilitySet) -> bool {
        match self {
            TransitionPath::BeginReview | TransitionPath::Intermediate => {
                capabilities.can_set_intermediate_status()
            }
            TransitionPath::FinalApproval => capabilities.can_final_approve(),
            TransitionPath::AdminOverride => capabilities.can_override_status(),
        }
    }
}

/// Capability gate evaluated before the record is loaded, so a caller without any
/// route to `target` learns nothing about whether the application exists.
pub fn authorize_target(
    capabilities: &CapabilitySet,
    target: ApplicationStatus,
) -> Result<(), ReviewError> {
    let allowed = capabilities.can_override_status()
        || match target {
            ApplicationStatus::Approved => capabilities.can_final_approve(),
            ApplicationStatus::Pending
            | ApplicationStatus::Waiting
            | ApplicationStatus::Rejected => capabilities.can_set_intermediate_status(),
            ApplicationStatus::AwaitingReview
            | ApplicationStatus::DiscordApproved
            | ApplicationStatus::InGameApproved => false,
        };

    if allowed {
        Ok(())
    } else {
        Err(ReviewError::denied(&format!(
            "move applications to {target}"
        )))
    }
}

fn natural_path(from: ApplicationStatus, to: ApplicationStatus) -> Option<TransitionPath> {
    use ApplicationStatus::*;

    match (from, to) {
        (AwaitingReview, Pending) => Some(TransitionPath::BeginReview),
        (Pending | DiscordApproved | InGameApproved, Waiting | Rejected) => {
            Some(TransitionPath::Intermediate)
        }
        (Waiting, Rejected) => Some(TransitionPath::Intermediate),
        (from, Approved) if !from.is_terminal() => Some(TransitionPath::FinalApproval),
        _ => None,
    }
}

fn describe_tracks(tracks: &[Track]) -> String {
    tracks
        .iter()
        .map(|track| track.display_name())
        .collect::<Vec<_>>()
        .join(" and ")
}

/// Decide how `application` may move to `target` for the given capabilities.
///
/// Regular guards are tried first; admins fall back to the override path. `approved`
/// always requires the full team approval rule, override included.
pub fn plan_status_change(
    application: &Application,
    capabilities: &CapabilitySet,
    target: ApplicationStatus,
) -> Result<TransitionPath, ReviewError> {
    let current = application.status;
    if current == target {
        return Err(ReviewError::InvalidTransition(format!(
            "application is already {current}"
        )));
    }

    let path = match natural_path(current, target) {
        Some(path) if path.permitted(capabilities) => path,
        _ if capabilities.can_override_status() => TransitionPath::AdminOverride,
        Some(_) => return Err(ReviewError::denied(&format!("move applications to {target}"))),
        None => {
            return Err(ReviewError::InvalidTransition(format!(
                "{target} is not reachable from {current}"
            )))
        }
    };

    if target == ApplicationStatus::Approved && !full_team_approved(application) {
        return Err(ReviewError::InvalidTransition(format!(
            "{} approval still outstanding for this {} application",
            describe_tracks(&outstanding_tracks(application)),
            application.position().label()
        )));
    }

    Ok(path)
}
