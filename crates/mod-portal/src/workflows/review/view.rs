use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::approval::{full_team_approved, is_track_approved};
use super::capability::Session;
use super::domain::{
    ApplicationId, ApplicationStatus, ApplicationSubmission, ReviewComment, Track, Vote,
};
use super::ledger::{badge_for, tally, ReviewBadge, VoteTally};
use super::repository::ApplicationRecord;

pub const HIDDEN_NAME: &str = "[Hidden - Training Manager Only]";

/// Application as seen by one moderator: identity fields redacted unless the viewer is a
/// training manager, plus the viewer's badge and derived approval state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplicationView {
    pub id: ApplicationId,
    pub version: u64,
    #[serde(flatten)]
    pub submission: ApplicationSubmission,
    pub submitted_at: DateTime<Utc>,
    pub status: ApplicationStatus,
    pub discord_approved: bool,
    pub discord_approved_by: Option<String>,
    pub in_game_approved: bool,
    pub in_game_approved_by: Option<String>,
    pub team_approved: bool,
    pub votes: Vec<Vote>,
    pub vote_tally: VoteTally,
    pub comments: Vec<ReviewComment>,
    pub viewed_by: BTreeSet<String>,
    pub badge: ReviewBadge,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<String>,
}

impl ApplicationView {
    pub fn for_viewer(record: &ApplicationRecord, session: &Session) -> Self {
        let application = &record.application;
        let mut submission = application.submission.clone();
        if !session.capabilities.can_view_identity() {
            submission.name = HIDDEN_NAME.to_string();
            submission.email = None;
        }

        let approver = |track: Track| {
            application
                .team
                .get(track)
                .map(|approval| approval.approved_by.clone())
        };

        Self {
            id: application.id.clone(),
            version: record.version,
            submission,
            submitted_at: application.submitted_at,
            status: application.status,
            discord_approved: is_track_approved(application, Track::Discord),
            discord_approved_by: approver(Track::Discord),
            in_game_approved: is_track_approved(application, Track::InGame),
            in_game_approved_by: approver(Track::InGame),
            team_approved: full_team_approved(application),
            votes: application.votes.clone(),
            vote_tally: tally(application),
            comments: application.comments.clone(),
            viewed_by: application.viewed_by.clone(),
            badge: badge_for(application, session.username()),
            reviewed_at: application.reviewed_at,
            reviewed_by: application.reviewed_by.clone(),
        }
    }
}
