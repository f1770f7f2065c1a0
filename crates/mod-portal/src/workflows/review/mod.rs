//! Moderator application review: intake, voting, team approval and the status machine.
//!
//! Every operation resolves the caller's capabilities once, checks them before touching
//! the record, and commits through a versioned repository write so concurrent reviewers
//! cannot overwrite one another.

pub mod approval;
pub mod audit;
pub mod capability;
pub mod domain;
pub mod error;
pub mod identity;
pub mod intake;
pub(crate) mod ledger;
pub mod notify;
pub mod repository;
pub mod router;
pub mod service;
pub(crate) mod transition;
pub mod view;

#[cfg(test)]
mod tests;

pub use approval::{full_team_approved, is_track_approved, outstanding_tracks};
pub use audit::{AuditAction, AuditEntry, AuditError, AuditSink};
pub use capability::{CapabilitySet, Principal, Session};
pub use domain::{
    Application, ApplicationId, ApplicationStatus, ApplicationSubmission, Position,
    ReviewComment, TeamApprovals, Track, TrackApproval, Vote, VoteChoice,
};
pub use error::ReviewError;
pub use identity::{IdentityError, IdentityProvider, StaticIdentityProvider};
pub use intake::ApplicationSettings;
pub use ledger::{ReviewBadge, VoteTally};
pub use notify::{
    EmailMessage, MailTemplates, Notification, NotificationKind, Notifier, NotifyError,
};
pub use repository::{
    ApplicationFilter, ApplicationRecord, ApplicationRepository, RepositoryError,
};
pub use router::{review_router, ReviewApi};
pub use service::{ListQuery, NotificationDispatch, ReviewService, StatusChange, TeamDecision};
pub use transition::TransitionPath;
pub use view::{ApplicationView, HIDDEN_NAME};
