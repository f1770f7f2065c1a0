use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::ReviewError;

/// Identifier wrapper for submitted applications.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicationId(pub String);

impl ApplicationId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The team(s) a candidate is applying to moderate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Position {
    #[serde(rename = "Discord")]
    Discord,
    #[serde(rename = "In-Game")]
    InGame,
    #[serde(rename = "Both")]
    Both,
}

impl Position {
    /// Tracks whose approval is required before the final decision.
    pub const fn required_tracks(self) -> &'static [Track] {
        match self {
            Position::Discord => &[Track::Discord],
            Position::InGame => &[Track::InGame],
            Position::Both => &[Track::Discord, Track::InGame],
        }
    }

    pub fn requires(self, track: Track) -> bool {
        self.required_tracks().contains(&track)
    }

    pub const fn label(self) -> &'static str {
        match self {
            Position::Discord => "Discord",
            Position::InGame => "In-Game",
            Position::Both => "Both",
        }
    }
}

impl FromStr for Position {
    type Err = ReviewError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "discord" => Ok(Position::Discord),
            "in-game" | "in_game" | "ingame" => Ok(Position::InGame),
            "both" => Ok(Position::Both),
            _ => Err(ReviewError::Validation(format!(
                "position must be 'Discord', 'In-Game' or 'Both', found '{raw}'"
            ))),
        }
    }
}

/// Workflow status of an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    AwaitingReview,
    Pending,
    DiscordApproved,
    InGameApproved,
    Waiting,
    Approved,
    Rejected,
}

impl ApplicationStatus {
    pub const ALL: [ApplicationStatus; 7] = [
        ApplicationStatus::AwaitingReview,
        ApplicationStatus::Pending,
        ApplicationStatus::DiscordApproved,
        ApplicationStatus::InGameApproved,
        ApplicationStatus::Waiting,
        ApplicationStatus::Approved,
        ApplicationStatus::Rejected,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::AwaitingReview => "awaiting_review",
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::DiscordApproved => "discord_approved",
            ApplicationStatus::InGameApproved => "in_game_approved",
            ApplicationStatus::Waiting => "waiting",
            ApplicationStatus::Approved => "approved",
            ApplicationStatus::Rejected => "rejected",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, ApplicationStatus::Approved | ApplicationStatus::Rejected)
    }

    /// Statuses in which moderators still cast votes and leaders still approve tracks.
    pub const fn is_under_review(self) -> bool {
        matches!(
            self,
            ApplicationStatus::AwaitingReview
                | ApplicationStatus::Pending
                | ApplicationStatus::DiscordApproved
                | ApplicationStatus::InGameApproved
        )
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ApplicationStatus {
    type Err = ReviewError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let needle = raw.trim().to_ascii_lowercase();
        ApplicationStatus::ALL
            .into_iter()
            .find(|status| status.label() == needle)
            .ok_or_else(|| ReviewError::Validation(format!("unknown application status '{raw}'")))
    }
}

/// One of the two independent team approval dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Track {
    Discord,
    InGame,
}

impl Track {
    pub const fn label(self) -> &'static str {
        match self {
            Track::Discord => "discord",
            Track::InGame => "in_game",
        }
    }

    pub const fn display_name(self) -> &'static str {
        match self {
            Track::Discord => "Discord",
            Track::InGame => "In-Game",
        }
    }

    /// Status literal older records used to mark this track as approved.
    pub const fn legacy_status(self) -> ApplicationStatus {
        match self {
            Track::Discord => ApplicationStatus::DiscordApproved,
            Track::InGame => ApplicationStatus::InGameApproved,
        }
    }
}

impl FromStr for Track {
    type Err = ReviewError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "discord" => Ok(Track::Discord),
            "in_game" | "in-game" | "ingame" => Ok(Track::InGame),
            _ => Err(ReviewError::Validation(format!(
                "approval track must be 'discord' or 'in_game', found '{raw}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteChoice {
    Approve,
    Reject,
}

impl FromStr for VoteChoice {
    type Err = ReviewError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim() {
            "approve" => Ok(VoteChoice::Approve),
            "reject" => Ok(VoteChoice::Reject),
            _ => Err(ReviewError::Validation(
                "vote must be 'approve' or 'reject'".to_string(),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub moderator: String,
    pub vote: VoteChoice,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewComment {
    pub moderator: String,
    pub comment: String,
    pub timestamp: DateTime<Utc>,
}

/// Attribution for a track approval. Its presence is the approval flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackApproval {
    pub approved_by: String,
    pub approved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamApprovals {
    pub discord: Option<TrackApproval>,
    pub in_game: Option<TrackApproval>,
}

impl TeamApprovals {
    pub fn get(&self, track: Track) -> Option<&TrackApproval> {
        match track {
            Track::Discord => self.discord.as_ref(),
            Track::InGame => self.in_game.as_ref(),
        }
    }

    pub fn slot_mut(&mut self, track: Track) -> &mut Option<TrackApproval> {
        match track {
            Track::Discord => &mut self.discord,
            Track::InGame => &mut self.in_game,
        }
    }
}

/// Candidate answers exactly as submitted through the public form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationSubmission {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub position: Position,
    pub discord_handle: String,
    pub ingame_name: String,
    pub age: u8,
    pub country: String,
    pub server: String,
    #[serde(default)]
    pub activity_times: String,
    #[serde(default)]
    pub native_language: String,
    #[serde(default)]
    pub other_languages: String,
    #[serde(default)]
    pub previous_experience: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highest_character_level: Option<u16>,
    /// Remaining questionnaire answers keyed by question id.
    #[serde(default)]
    pub answers: BTreeMap<String, String>,
}

/// A candidate's submission together with its mutable review state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub submission: ApplicationSubmission,
    pub submitted_at: DateTime<Utc>,
    pub status: ApplicationStatus,
    pub team: TeamApprovals,
    pub votes: Vec<Vote>,
    pub comments: Vec<ReviewComment>,
    pub viewed_by: BTreeSet<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<String>,
}

impl Application {
    pub fn new(submission: ApplicationSubmission, submitted_at: DateTime<Utc>) -> Self {
        Self {
            id: ApplicationId::generate(),
            submission,
            submitted_at,
            status: ApplicationStatus::AwaitingReview,
            team: TeamApprovals::default(),
            votes: Vec::new(),
            comments: Vec::new(),
            viewed_by: BTreeSet::new(),
            reviewed_at: None,
            reviewed_by: None,
        }
    }

    pub fn position(&self) -> Position {
        self.submission.position
    }

    pub fn applicant_name(&self) -> &str {
        &self.submission.name
    }

    pub fn add_comment(&mut self, moderator: &str, text: impl Into<String>, at: DateTime<Utc>) {
        self.comments.push(ReviewComment {
            moderator: moderator.to_string(),
            comment: text.into(),
            timestamp: at,
        });
    }
}
