//! Vote ledger and detail-view tracking. Both are advisory bookkeeping; neither drives
//! status transitions.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::domain::{Application, Vote, VoteChoice};

/// Outcome of a vote upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteEffect {
    Recorded,
    Replaced { previous: VoteChoice },
}

/// Upsert the moderator's vote. The moderator keeps their position in the ledger when
/// re-voting, so ordering reflects first participation.
pub fn record_vote(
    application: &mut Application,
    moderator: &str,
    choice: VoteChoice,
    at: DateTime<Utc>,
) -> VoteEffect {
    match application
        .votes
        .iter_mut()
        .find(|vote| vote.moderator == moderator)
    {
        Some(existing) => {
            let previous = existing.vote;
            existing.vote = choice;
            existing.timestamp = at;
            VoteEffect::Replaced { previous }
        }
        None => {
            application.votes.push(Vote {
                moderator: moderator.to_string(),
                vote: choice,
                timestamp: at,
            });
            VoteEffect::Recorded
        }
    }
}

/// Returns `true` when the viewer was not yet recorded.
pub fn mark_viewed(application: &mut Application, moderator: &str) -> bool {
    application.viewed_by.insert(moderator.to_string())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct VoteTally {
    pub approve: usize,
    pub reject: usize,
}

pub fn tally(application: &Application) -> VoteTally {
    application
        .votes
        .iter()
        .fold(VoteTally::default(), |mut tally, vote| {
            match vote.vote {
                VoteChoice::Approve => tally.approve += 1,
                VoteChoice::Reject => tally.reject += 1,
            }
            tally
        })
}

/// Per-moderator listing badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewBadge {
    New,
    Viewed,
    Voted,
}

pub fn badge_for(application: &Application, moderator: &str) -> ReviewBadge {
    if application
        .votes
        .iter()
        .any(|vote| vote.moderator == moderator)
    {
        ReviewBadge::Voted
    } else if application.viewed_by.contains(moderator) {
        ReviewBadge::Viewed
    } else {
        ReviewBadge::New
    }
}
