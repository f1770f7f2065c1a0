//! End-to-end review scenarios driven through the public service facade.
//!
//! Each scenario uses fresh in-memory adapters so the assertions cover the state machine,
//! the audit trail and outbound notifications without any HTTP plumbing.

mod common {
    use std::collections::{BTreeMap, HashMap};
    use std::sync::{Arc, Mutex};

    use mod_portal::workflows::review::{
        Application, ApplicationFilter, ApplicationId, ApplicationRecord, ApplicationRepository,
        ApplicationSubmission, AuditEntry, AuditError, AuditSink, Notification, Notifier,
        NotifyError, Position, Principal, RepositoryError, ReviewService, Session,
    };

    pub type Service = ReviewService<MemoryRepository, MemoryAudit, MemoryNotifier>;

    pub fn submission(position: Position) -> ApplicationSubmission {
        ApplicationSubmission {
            name: "Morgan Hale".to_string(),
            email: Some("morgan@example.com".to_string()),
            position,
            discord_handle: "mhale".to_string(),
            ingame_name: "IronHale".to_string(),
            age: 31,
            country: "Canada".to_string(),
            server: "S-88".to_string(),
            activity_times: "Weekends".to_string(),
            native_language: "English".to_string(),
            other_languages: "French".to_string(),
            previous_experience: "Guild officer for three seasons".to_string(),
            highest_character_level: Some(95),
            answers: BTreeMap::new(),
        }
    }

    pub fn session(username: &str, configure: impl FnOnce(&mut Principal)) -> Session {
        let mut principal = Principal::moderator(username);
        configure(&mut principal);
        Session::new(principal)
    }

    pub fn build() -> (
        Arc<Service>,
        Arc<MemoryRepository>,
        Arc<MemoryAudit>,
        Arc<MemoryNotifier>,
    ) {
        let repository = Arc::new(MemoryRepository::default());
        let audit = Arc::new(MemoryAudit::default());
        let notifier = Arc::new(MemoryNotifier::default());
        let service = Arc::new(ReviewService::new(
            repository.clone(),
            audit.clone(),
            notifier.clone(),
        ));
        (service, repository, audit, notifier)
    }

    #[derive(Default)]
    pub struct MemoryRepository {
        records: Mutex<HashMap<ApplicationId, ApplicationRecord>>,
    }

    impl ApplicationRepository for MemoryRepository {
        fn insert(&self, application: Application) -> Result<ApplicationRecord, RepositoryError> {
            let record = ApplicationRecord {
                application,
                version: 1,
            };
            self.records
                .lock()
                .expect("repository mutex poisoned")
                .insert(record.id().clone(), record.clone());
            Ok(record)
        }

        fn update(&self, record: ApplicationRecord) -> Result<ApplicationRecord, RepositoryError> {
            let mut guard = self.records.lock().expect("repository mutex poisoned");
            let stored = guard
                .get_mut(record.id())
                .ok_or_else(|| RepositoryError::NotFound(record.id().clone()))?;
            if stored.version != record.version {
                return Err(RepositoryError::Conflict(record.id().clone()));
            }
            stored.application = record.application;
            stored.version += 1;
            Ok(stored.clone())
        }

        fn fetch(&self, id: &ApplicationId) -> Result<Option<ApplicationRecord>, RepositoryError> {
            Ok(self
                .records
                .lock()
                .expect("repository mutex poisoned")
                .get(id)
                .cloned())
        }

        fn delete(&self, id: &ApplicationId, expected: u64) -> Result<(), RepositoryError> {
            let mut guard = self.records.lock().expect("repository mutex poisoned");
            match guard.get(id).map(|record| record.version) {
                None => Err(RepositoryError::NotFound(id.clone())),
                Some(version) if version != expected => Err(RepositoryError::Conflict(id.clone())),
                Some(_) => {
                    guard.remove(id);
                    Ok(())
                }
            }
        }

        fn list(
            &self,
            filter: &ApplicationFilter,
        ) -> Result<Vec<ApplicationRecord>, RepositoryError> {
            Ok(self
                .records
                .lock()
                .expect("repository mutex poisoned")
                .values()
                .filter(|record| filter.matches(&record.application))
                .cloned()
                .collect())
        }
    }

    #[derive(Default)]
    pub struct MemoryAudit {
        entries: Mutex<Vec<AuditEntry>>,
    }

    impl MemoryAudit {
        pub fn entries(&self) -> Vec<AuditEntry> {
            self.entries.lock().expect("audit mutex poisoned").clone()
        }
    }

    impl AuditSink for MemoryAudit {
        fn record(&self, entry: AuditEntry) -> Result<(), AuditError> {
            self.entries.lock().expect("audit mutex poisoned").push(entry);
            Ok(())
        }

        fn recent(&self, limit: usize) -> Result<Vec<AuditEntry>, AuditError> {
            let guard = self.entries.lock().expect("audit mutex poisoned");
            Ok(guard.iter().rev().take(limit).cloned().collect())
        }
    }

    #[derive(Default)]
    pub struct MemoryNotifier {
        sent: Mutex<Vec<Notification>>,
    }

    impl MemoryNotifier {
        pub fn sent(&self) -> Vec<Notification> {
            self.sent.lock().expect("notifier mutex poisoned").clone()
        }
    }

    impl Notifier for MemoryNotifier {
        fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
            self.sent
                .lock()
                .expect("notifier mutex poisoned")
                .push(notification.clone());
            Ok(())
        }
    }
}

use std::sync::{Arc, Barrier};
use std::thread;

use common::*;
use mod_portal::workflows::review::{
    ApplicationStatus, NotificationKind, Position, ReviewError, StatusChange, TeamDecision,
    Track, VoteChoice,
};

fn status_change(status: ApplicationStatus, comment: &str, version: Option<u64>) -> StatusChange {
    StatusChange {
        status,
        comment: comment.to_string(),
        expected_version: version,
    }
}

#[test]
fn final_approval_is_blocked_until_both_tracks_approve() {
    let (service, _, audit, _) = build();
    let tm = session("tess", |p| p.is_training_manager = true);

    let record = service
        .submit(submission(Position::Both))
        .expect("submission succeeds");
    let view = service.get(&tm, record.id()).expect("detail");
    assert!(!view.discord_approved);
    assert!(!view.in_game_approved);

    let err = service
        .change_status(
            &tm,
            record.id(),
            &status_change(ApplicationStatus::Approved, "Welcome aboard", None),
        )
        .unwrap_err();
    assert_eq!(err.kind(), "invalid_transition");
    assert_eq!(
        service.get(&tm, record.id()).expect("detail").status,
        ApplicationStatus::AwaitingReview
    );
    assert!(audit.entries().is_empty());
}

#[test]
fn discord_application_flows_from_team_approval_to_welcome() {
    let (service, _, audit, notifier) = build();
    let dana = session("dana", |p| p.is_discord_leader = true);
    let tm = session("tess", |p| p.is_training_manager = true);

    let record = service
        .submit(submission(Position::Discord))
        .expect("submission succeeds");
    service
        .team_approve(
            &dana,
            record.id(),
            &TeamDecision {
                track: Track::Discord,
                comment: "looks good".to_string(),
                expected_version: None,
            },
        )
        .expect("discord approval");

    let view = service
        .change_status(
            &tm,
            record.id(),
            &status_change(ApplicationStatus::Approved, "Welcome aboard", None),
        )
        .expect("final approval");
    assert_eq!(view.status, ApplicationStatus::Approved);
    assert_eq!(view.reviewed_by.as_deref(), Some("tess"));

    let status_entries: Vec<_> = audit
        .entries()
        .into_iter()
        .filter(|entry| entry.new_status == Some(ApplicationStatus::Approved))
        .collect();
    assert_eq!(status_entries.len(), 1);
    assert_eq!(status_entries[0].old_status, ApplicationStatus::AwaitingReview);
    assert_eq!(status_entries[0].performed_by, "tess");

    let approved: Vec<_> = notifier
        .sent()
        .into_iter()
        .filter(|n| n.kind == NotificationKind::Approved)
        .collect();
    assert_eq!(approved.len(), 1);
    assert_eq!(approved[0].comment, "Welcome aboard");
}

#[test]
fn competing_decisions_on_one_version_let_exactly_one_win() {
    let (service, _, audit, notifier) = build();
    let dana = session("dana", |p| p.is_discord_leader = true);
    let sam = session("sam", |p| p.role = "mmod".to_string());
    let record = service
        .submit(submission(Position::Discord))
        .expect("submission succeeds");
    service
        .change_status(
            &sam,
            record.id(),
            &status_change(ApplicationStatus::Pending, "picking this up", None),
        )
        .expect("review begins");
    let approved = service
        .team_approve(
            &dana,
            record.id(),
            &TeamDecision {
                track: Track::Discord,
                comment: "ready".to_string(),
                expected_version: None,
            },
        )
        .expect("discord approval");
    let version = approved.version;
    let audit_before = audit.entries().len();
    let notified_before = notifier.sent().len();

    let barrier = Arc::new(Barrier::new(2));
    let contenders = [
        (
            session("tess", |p| p.is_training_manager = true),
            ApplicationStatus::Approved,
        ),
        (sam, ApplicationStatus::Rejected),
    ];

    let handles: Vec<_> = contenders
        .into_iter()
        .map(|(actor, target)| {
            let service = Arc::clone(&service);
            let barrier = Arc::clone(&barrier);
            let id = record.id().clone();
            thread::spawn(move || {
                barrier.wait();
                service.change_status(
                    &actor,
                    &id,
                    &status_change(target, "decision", Some(version)),
                )
            })
        })
        .collect();

    let outcomes: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().expect("thread completes"))
        .collect();

    let winners = outcomes.iter().filter(|outcome| outcome.is_ok()).count();
    let conflicts = outcomes
        .iter()
        .filter(|outcome| matches!(outcome, Err(ReviewError::Conflict(_))))
        .count();
    assert_eq!(winners, 1);
    assert_eq!(conflicts, 1);
    assert_eq!(audit.entries().len(), audit_before + 1);
    assert_eq!(notifier.sent().len(), notified_before + 1);
}

#[test]
fn revoked_discord_approval_blocks_the_welcome() {
    let (service, _, _, notifier) = build();
    let dana = session("dana", |p| p.is_discord_leader = true);
    let tm = session("tess", |p| p.is_training_manager = true);
    let decision = |comment: &str| TeamDecision {
        track: Track::Discord,
        comment: comment.to_string(),
        expected_version: None,
    };

    let record = service
        .submit(submission(Position::Discord))
        .expect("submission succeeds");
    service
        .team_approve(&dana, record.id(), &decision("looks good"))
        .expect("discord approval");
    let view = service
        .team_unapprove(&dana, record.id(), &decision("not ready yet"))
        .expect("revocation");
    assert_eq!(view.status, ApplicationStatus::AwaitingReview);
    assert!(!view.discord_approved);
    assert!(view.discord_approved_by.is_none());
    assert!(!view.team_approved);

    let err = service
        .change_status(
            &tm,
            record.id(),
            &status_change(ApplicationStatus::Approved, "Welcome aboard", None),
        )
        .unwrap_err();
    assert!(matches!(err, ReviewError::InvalidTransition(_)));
    assert!(notifier
        .sent()
        .iter()
        .all(|n| n.kind != NotificationKind::Approved));
}

#[test]
fn non_admin_delete_is_denied_and_application_survives() {
    let (service, _, _, _) = build();
    let riley = session("riley", |_| {});

    let record = service
        .submit(submission(Position::InGame))
        .expect("submission succeeds");
    let err = service.delete(&riley, record.id()).unwrap_err();
    assert_eq!(err.kind(), "permission_denied");

    let view = service.get(&riley, record.id()).expect("still retrievable");
    assert_eq!(view.id, *record.id());
}

#[test]
fn revote_replaces_the_moderators_earlier_vote() {
    let (service, _, _, _) = build();
    let riley = session("riley", |_| {});

    let record = service
        .submit(submission(Position::Discord))
        .expect("submission succeeds");
    service
        .vote(&riley, record.id(), VoteChoice::Approve)
        .expect("first vote");
    let view = service
        .vote(&riley, record.id(), VoteChoice::Reject)
        .expect("second vote");

    let mine: Vec<_> = view
        .votes
        .iter()
        .filter(|vote| vote.moderator == "riley")
        .collect();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].vote, VoteChoice::Reject);
    assert_eq!(view.vote_tally.reject, 1);
    assert_eq!(view.vote_tally.approve, 0);
}

#[test]
fn every_status_change_writes_one_matching_audit_entry() {
    let (service, _, audit, _) = build();
    let sam = session("sam", |p| p.roles = vec!["mmod".to_string()]);
    let ana = session("ana", |p| p.is_admin = true);

    let record = service
        .submit(submission(Position::InGame))
        .expect("submission succeeds");
    let steps = [
        (&sam, ApplicationStatus::Pending),
        (&sam, ApplicationStatus::Waiting),
        (&sam, ApplicationStatus::Rejected),
        (&ana, ApplicationStatus::Pending),
    ];

    let mut previous = ApplicationStatus::AwaitingReview;
    for (index, (actor, target)) in steps.iter().enumerate() {
        service
            .change_status(actor, record.id(), &status_change(*target, "step", None))
            .expect("transition allowed");

        let entries = audit.entries();
        assert_eq!(entries.len(), index + 1);
        let last = entries.last().expect("entry written");
        assert_eq!(last.old_status, previous);
        assert_eq!(last.new_status, Some(*target));
        previous = *target;
    }
}
