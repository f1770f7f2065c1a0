use crate::infra::{InMemoryApplicationRepository, InMemoryAuditSink, LoggingMailer};
use clap::Args;
use mod_portal::error::AppError;
use mod_portal::workflows::review::{
    ApplicationId, ApplicationStatus, ApplicationSubmission, ApplicationView, AuditSink,
    MailTemplates, Position, Principal, ReviewError, ReviewService, Session, StatusChange,
    TeamDecision, Track, VoteChoice,
};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Position applied for: Discord, In-Game or Both.
    #[arg(long, value_parser = parse_position)]
    pub(crate) position: Option<Position>,
    /// Community name used in rendered applicant e-mail.
    #[arg(long, default_value = "Top War")]
    pub(crate) community: String,
    /// Place the applicant on the waiting list before the final decision.
    #[arg(long)]
    pub(crate) via_waitlist: bool,
}

fn parse_position(raw: &str) -> Result<Position, String> {
    raw.parse().map_err(|err: ReviewError| err.to_string())
}

fn session(username: &str, configure: impl FnOnce(&mut Principal)) -> Session {
    let mut principal = Principal::moderator(username);
    configure(&mut principal);
    Session::new(principal)
}

fn demo_submission(position: Position) -> ApplicationSubmission {
    let mut answers = BTreeMap::new();
    answers.insert(
        "conflict_example".to_string(),
        "Split a heated alliance argument into a private thread and followed up".to_string(),
    );

    ApplicationSubmission {
        name: "Avery Quinn".to_string(),
        email: Some("avery.quinn@example.com".to_string()),
        position,
        discord_handle: "averyq".to_string(),
        ingame_name: "QuinnTheBold".to_string(),
        age: 22,
        country: "Ireland".to_string(),
        server: "S-1207".to_string(),
        activity_times: "18:00-23:00 UTC".to_string(),
        native_language: "English".to_string(),
        other_languages: "Irish, Spanish".to_string(),
        previous_experience: "Alliance R4 for two years".to_string(),
        highest_character_level: Some(212),
        answers,
    }
}

fn print_view(heading: &str, view: &ApplicationView) {
    println!(
        "  {heading}: status={} discord_approved={} in_game_approved={} team_approved={} votes={}/{} badge={:?} (v{})",
        view.status,
        view.discord_approved,
        view.in_game_approved,
        view.team_approved,
        view.vote_tally.approve,
        view.vote_tally.reject,
        view.badge,
        view.version
    );
}

type DemoService =
    ReviewService<InMemoryApplicationRepository, InMemoryAuditSink, LoggingMailer>;

fn final_approval(version: Option<u64>) -> StatusChange {
    StatusChange {
        status: ApplicationStatus::Approved,
        comment: "Welcome aboard".to_string(),
        expected_version: version,
    }
}

fn walk_through_review(
    service: &DemoService,
    id: &ApplicationId,
    position: Position,
    via_waitlist: bool,
) -> Result<(), ReviewError> {
    let riley = session("riley", |_| {});
    let sam = session("sam", |p| p.role = "mmod".to_string());
    let dana = session("dana", |p| p.is_discord_leader = true);
    let ian = session("ian", |p| p.is_in_game_leader = true);
    let tess = session("tess", |p| p.is_training_manager = true);

    print_view("Moderator view", &service.get(&riley, id)?);
    service.vote(&riley, id, VoteChoice::Approve)?;
    service.vote(&sam, id, VoteChoice::Reject)?;
    print_view("After votes", &service.vote(&sam, id, VoteChoice::Approve)?);

    let view = service.change_status(
        &sam,
        id,
        &StatusChange {
            status: ApplicationStatus::Pending,
            comment: "Taking this one".to_string(),
            expected_version: None,
        },
    )?;
    print_view("Review started", &view);

    if let Err(err) = service.change_status(&tess, id, &final_approval(None)) {
        println!("  Early final approval refused ({}): {err}", err.kind());
    }

    for (leader, track) in [(&dana, Track::Discord), (&ian, Track::InGame)] {
        if !position.requires(track) {
            continue;
        }
        let view = service.team_approve(
            leader,
            id,
            &TeamDecision {
                track,
                comment: format!("{} checks complete", track.display_name()),
                expected_version: None,
            },
        )?;
        print_view(&format!("{} approved", track.display_name()), &view);
    }

    if via_waitlist {
        let view = service.change_status(
            &sam,
            id,
            &StatusChange {
                status: ApplicationStatus::Waiting,
                comment: "No open seat this cycle".to_string(),
                expected_version: None,
            },
        )?;
        print_view("Waitlisted", &view);
    }

    let current = service.get(&tess, id)?;
    let view = service.change_status(&tess, id, &final_approval(Some(current.version)))?;
    print_view("Final decision", &view);
    Ok(())
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        position,
        community,
        via_waitlist,
    } = args;
    let position = position.unwrap_or(Position::Discord);

    let audit = Arc::new(InMemoryAuditSink::default());
    let mailer = Arc::new(LoggingMailer::new(MailTemplates::new(community)));
    let service = ReviewService::new(
        Arc::new(InMemoryApplicationRepository::default()),
        audit.clone(),
        mailer.clone(),
    );

    println!("Moderator application review demo ({} position)", position.label());

    let record = match service.submit(demo_submission(position)) {
        Ok(record) => record,
        Err(err) => {
            println!("  Submission rejected: {err}");
            return Ok(());
        }
    };
    let id = record.id().clone();
    println!("  Submitted application {id}");

    if let Err(err) = walk_through_review(&service, &id, position, via_waitlist) {
        println!("  Review stopped ({}): {err}", err.kind());
    }

    println!("\nAudit trail (oldest first)");
    match audit.recent(usize::MAX) {
        Ok(entries) => {
            for entry in entries.iter().rev() {
                let new_status = entry
                    .new_status
                    .map(|status| status.to_string())
                    .unwrap_or_else(|| "deleted".to_string());
                println!(
                    "- {} {:?} by {}: {} -> {} \"{}\"",
                    entry.created_at.format("%H:%M:%S"),
                    entry.action,
                    entry.performed_by,
                    entry.old_status,
                    new_status,
                    entry.comment
                );
            }
        }
        Err(err) => println!("  Audit log unavailable: {err}"),
    }

    let outbox = mailer.outbox();
    if outbox.is_empty() {
        println!("\nApplicant e-mail: none dispatched");
    } else {
        println!("\nApplicant e-mail");
        for message in outbox {
            println!("- to {}: {}", message.to, message.subject);
        }
    }

    Ok(())
}
