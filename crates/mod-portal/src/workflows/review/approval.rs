//! Team approval tracker: two independent track flags with attribution.

use chrono::{DateTime, Utc};

use super::domain::{Application, Track, TrackApproval};
use super::error::ReviewError;

/// Effective approval for a track. Records written before the boolean flags existed
/// only carry the `discord_approved` / `in_game_approved` status literal, so that
/// literal counts as approval too.
pub fn is_track_approved(application: &Application, track: Track) -> bool {
    application.team.get(track).is_some() || application.status == track.legacy_status()
}

/// Whether every track required by the position is approved.
pub fn full_team_approved(application: &Application) -> bool {
    application
        .position()
        .required_tracks()
        .iter()
        .all(|track| is_track_approved(application, *track))
}

/// Tracks still missing before the final decision can be made.
pub fn outstanding_tracks(application: &Application) -> Vec<Track> {
    application
        .position()
        .required_tracks()
        .iter()
        .copied()
        .filter(|track| !is_track_approved(application, *track))
        .collect()
}

/// Set the track flag with attribution. `status` is left alone: the literal only marks
/// approval on records that predate the flags.
pub fn approve_track(
    application: &mut Application,
    track: Track,
    approver: &str,
    at: DateTime<Utc>,
) -> Result<(), ReviewError> {
    if !application.position().requires(track) {
        return Err(ReviewError::Validation(format!(
            "{} approval does not apply to a {} application",
            track.display_name(),
            application.position().label()
        )));
    }

    let status = application.status;
    if !status.is_under_review() {
        return Err(ReviewError::InvalidTransition(format!(
            "team approval is closed once an application is {status}"
        )));
    }

    let slot = application.team.slot_mut(track);
    if slot.is_some() {
        return Err(ReviewError::InvalidTransition(format!(
            "{} track is already approved",
            track.display_name()
        )));
    }
    *slot = Some(TrackApproval {
        approved_by: approver.to_string(),
        approved_at: at,
    });
    Ok(())
}

/// Clear the track flag and attribution. The status literal is left untouched; reverting
/// it takes an explicit status change.
pub fn revoke_track(
    application: &mut Application,
    track: Track,
) -> Result<TrackApproval, ReviewError> {
    application.team.slot_mut(track).take().ok_or_else(|| {
        ReviewError::InvalidTransition(format!(
            "{} track is not approved",
            track.display_name()
        ))
    })
}
