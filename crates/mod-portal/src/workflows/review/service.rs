use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use chrono::Utc;
use tracing::{debug, error, info, warn};

use super::approval::{approve_track, revoke_track};
use super::audit::{AuditAction, AuditEntry, AuditSink};
use super::capability::Session;
use super::domain::{
    Application, ApplicationId, ApplicationStatus, ApplicationSubmission, Position, Track,
    VoteChoice,
};
use super::error::{require_comment, ReviewError};
use super::intake::{validate_submission, ApplicationSettings};
use super::ledger::{mark_viewed, record_vote, VoteEffect};
use super::notify::{Notification, NotificationKind, Notifier};
use super::repository::{
    ApplicationFilter, ApplicationRecord, ApplicationRepository, RepositoryError,
};
use super::transition::{authorize_target, plan_status_change};
use super::view::ApplicationView;

/// How notifications leave the service once a transition is committed.
#[derive(Debug, Clone, Default)]
pub enum NotificationDispatch {
    /// Deliver on the calling thread before the operation returns.
    #[default]
    Inline,
    /// Hand delivery to the runtime's blocking pool and return immediately.
    Detached(tokio::runtime::Handle),
}

/// Listing filters; `search` matches handles and server, and the legal name only for
/// viewers allowed to see it.
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    pub search: Option<String>,
    pub status: Option<ApplicationStatus>,
    pub position: Option<Position>,
}

#[derive(Debug, Clone)]
pub struct StatusChange {
    pub status: ApplicationStatus,
    pub comment: String,
    pub expected_version: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct TeamDecision {
    pub track: Track,
    pub comment: String,
    pub expected_version: Option<u64>,
}

/// Service composing the repository, audit sink and notifier around the review state
/// machine. Each operation is one read-validate-write cycle against a single record.
pub struct ReviewService<R, A, N> {
    repository: Arc<R>,
    audit: Arc<A>,
    notifier: Arc<N>,
    dispatch: NotificationDispatch,
    settings: RwLock<ApplicationSettings>,
    audit_backlog: Mutex<VecDeque<AuditEntry>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn ensure_version(record: &ApplicationRecord, expected: Option<u64>) -> Result<(), ReviewError> {
    match expected {
        Some(version) if version != record.version => Err(ReviewError::Conflict(format!(
            "application {} is at version {}, request expected {version}",
            record.id(),
            record.version
        ))),
        _ => Ok(()),
    }
}

fn deliver<N: Notifier + ?Sized>(notifier: &N, notification: &Notification) {
    match notifier.send(notification) {
        Ok(()) => debug!(
            application_id = %notification.application_id,
            kind = notification.kind.label(),
            "notification delivered"
        ),
        Err(err) => warn!(
            application_id = %notification.application_id,
            kind = notification.kind.label(),
            error = %err,
            "notification failed; transition stays committed"
        ),
    }
}

impl<R, A, N> ReviewService<R, A, N>
where
    R: ApplicationRepository + 'static,
    A: AuditSink + 'static,
    N: Notifier + 'static,
{
    pub fn new(repository: Arc<R>, audit: Arc<A>, notifier: Arc<N>) -> Self {
        Self {
            repository,
            audit,
            notifier,
            dispatch: NotificationDispatch::default(),
            settings: RwLock::new(ApplicationSettings::new(true)),
            audit_backlog: Mutex::new(VecDeque::new()),
        }
    }

    pub fn with_dispatch(mut self, dispatch: NotificationDispatch) -> Self {
        self.dispatch = dispatch;
        self
    }

    pub fn with_applications_open(self, open: bool) -> Self {
        Self {
            settings: RwLock::new(ApplicationSettings::new(open)),
            ..self
        }
    }

    /// Store a new application in `awaiting_review`.
    pub fn submit(
        &self,
        submission: ApplicationSubmission,
    ) -> Result<ApplicationRecord, ReviewError> {
        if !self.settings().applications_enabled {
            return Err(ReviewError::PermissionDenied(
                "applications are currently closed".to_string(),
            ));
        }
        validate_submission(&submission)?;

        let application = Application::new(submission, Utc::now());
        let stored = self.repository.insert(application)?;
        info!(
            application_id = %stored.id(),
            position = stored.application.position().label(),
            "application submitted"
        );

        let has_email = stored
            .application
            .submission
            .email
            .as_deref()
            .is_some_and(|email| !email.trim().is_empty());
        if has_email {
            self.notify(Notification::new(
                NotificationKind::Received,
                &stored.application,
                "",
                None,
            ));
        }
        Ok(stored)
    }

    pub fn list(
        &self,
        session: &Session,
        query: &ListQuery,
    ) -> Result<Vec<ApplicationView>, ReviewError> {
        self.require_viewer(session)?;

        let filter = ApplicationFilter {
            status: query.status,
            position: query.position,
        };
        let needle = query
            .search
            .as_deref()
            .map(|raw| raw.trim().to_lowercase())
            .filter(|needle| !needle.is_empty());
        let include_name = session.capabilities.can_view_identity();

        let mut records: Vec<ApplicationRecord> = self
            .repository
            .list(&filter)?
            .into_iter()
            .filter(|record| match &needle {
                Some(needle) => search_matches(&record.application, needle, include_name),
                None => true,
            })
            .collect();
        records.sort_by(|a, b| b.application.submitted_at.cmp(&a.application.submitted_at));

        Ok(records
            .iter()
            .map(|record| ApplicationView::for_viewer(record, session))
            .collect())
    }

    /// Fetch one application and record the caller as a viewer.
    pub fn get(
        &self,
        session: &Session,
        id: &ApplicationId,
    ) -> Result<ApplicationView, ReviewError> {
        self.require_viewer(session)?;
        let mut record = self.load(id)?;

        if mark_viewed(&mut record.application, session.username()) {
            match self.repository.update(record.clone()) {
                Ok(stored) => record = stored,
                Err(RepositoryError::Conflict(_)) => debug!(
                    application_id = %id,
                    viewer = session.username(),
                    "view marker lost to a concurrent write"
                ),
                Err(other) => return Err(other.into()),
            }
        }

        Ok(ApplicationView::for_viewer(&record, session))
    }

    pub fn vote(
        &self,
        session: &Session,
        id: &ApplicationId,
        choice: VoteChoice,
    ) -> Result<ApplicationView, ReviewError> {
        self.require_viewer(session)?;
        let mut record = self.load(id)?;

        let status = record.application.status;
        if !matches!(
            status,
            ApplicationStatus::AwaitingReview | ApplicationStatus::Pending
        ) {
            return Err(ReviewError::InvalidTransition(format!(
                "voting is closed once an application is {status}"
            )));
        }

        let effect = record_vote(
            &mut record.application,
            session.username(),
            choice,
            Utc::now(),
        );
        let stored = self.repository.update(record)?;
        if let VoteEffect::Replaced { previous } = effect {
            debug!(
                application_id = %id,
                moderator = session.username(),
                vote = ?choice,
                previous = ?previous,
                "vote replaced"
            );
        }

        Ok(ApplicationView::for_viewer(&stored, session))
    }

    pub fn comment(
        &self,
        session: &Session,
        id: &ApplicationId,
        text: &str,
    ) -> Result<ApplicationView, ReviewError> {
        self.require_viewer(session)?;
        require_comment(text)?;
        let mut record = self.load(id)?;

        record
            .application
            .add_comment(session.username(), text.trim(), Utc::now());
        let stored = self.repository.update(record)?;

        Ok(ApplicationView::for_viewer(&stored, session))
    }

    pub fn team_approve(
        &self,
        session: &Session,
        id: &ApplicationId,
        decision: &TeamDecision,
    ) -> Result<ApplicationView, ReviewError> {
        let track = decision.track;
        if !session.capabilities.can_approve_track(track) {
            return Err(self.denied(session, &format!("approve the {} track", track.label())));
        }

        let mut record = self.load(id)?;
        ensure_version(&record, decision.expected_version)?;

        let now = Utc::now();
        approve_track(&mut record.application, track, session.username(), now)?;
        let note = decision.comment.trim();
        if !note.is_empty() {
            record.application.add_comment(
                session.username(),
                format!("[{} TEAM APPROVED] {note}", track.display_name().to_uppercase()),
                now,
            );
        }

        let stored = self.repository.update(record)?;
        let status = stored.application.status;
        info!(
            application_id = %id,
            actor = session.username(),
            track = track.label(),
            %status,
            "team track approved"
        );

        self.write_audit(AuditEntry::new(
            AuditAction::TeamApproved,
            id.clone(),
            stored.application.applicant_name(),
            session.username(),
            note,
            status,
            Some(status),
        ));

        Ok(ApplicationView::for_viewer(&stored, session))
    }

    pub fn team_unapprove(
        &self,
        session: &Session,
        id: &ApplicationId,
        decision: &TeamDecision,
    ) -> Result<ApplicationView, ReviewError> {
        let track = decision.track;
        if !session.capabilities.can_approve_track(track) {
            return Err(self.denied(session, &format!("revoke the {} track", track.label())));
        }
        require_comment(&decision.comment)?;

        let mut record = self.load(id)?;
        ensure_version(&record, decision.expected_version)?;

        let revoked = revoke_track(&mut record.application, track)?;
        let note = decision.comment.trim();
        record.application.add_comment(
            session.username(),
            format!(
                "[{} APPROVAL REVOKED] {note}",
                track.display_name().to_uppercase()
            ),
            Utc::now(),
        );

        let stored = self.repository.update(record)?;
        let status = stored.application.status;
        info!(
            application_id = %id,
            actor = session.username(),
            track = track.label(),
            previously_approved_by = %revoked.approved_by,
            "team track approval revoked"
        );

        self.write_audit(AuditEntry::new(
            AuditAction::TeamUnapproved,
            id.clone(),
            stored.application.applicant_name(),
            session.username(),
            note,
            status,
            Some(status),
        ));

        Ok(ApplicationView::for_viewer(&stored, session))
    }

    /// Route a status change through the state machine and commit it.
    pub fn change_status(
        &self,
        session: &Session,
        id: &ApplicationId,
        change: &StatusChange,
    ) -> Result<ApplicationView, ReviewError> {
        let target = change.status;
        authorize_target(&session.capabilities, target).map_err(|err| {
            warn!(actor = session.username(), target = %target, "status change denied");
            err
        })?;
        require_comment(&change.comment)?;

        let mut record = self.load(id)?;
        ensure_version(&record, change.expected_version)?;
        let path = plan_status_change(&record.application, &session.capabilities, target)?;

        let now = Utc::now();
        let previous = record.application.status;
        let application = &mut record.application;
        application.status = target;
        application.reviewed_at = Some(now);
        application.reviewed_by = Some(session.username().to_string());
        application.add_comment(
            session.username(),
            format!(
                "[STATUS CHANGE: {} → {}] {}",
                previous.label().to_uppercase(),
                target.label().to_uppercase(),
                change.comment.trim()
            ),
            now,
        );

        let stored = self.repository.update(record)?;
        info!(
            application_id = %id,
            actor = session.username(),
            path = path.label(),
            old_status = %previous,
            new_status = %target,
            "application status changed"
        );

        self.write_audit(AuditEntry::new(
            AuditAction::StatusChanged,
            id.clone(),
            stored.application.applicant_name(),
            session.username(),
            change.comment.trim(),
            previous,
            Some(target),
        ));

        if let Some(kind) = NotificationKind::for_status(target) {
            self.notify(Notification::new(
                kind,
                &stored.application,
                change.comment.clone(),
                Some(previous),
            ));
        }

        Ok(ApplicationView::for_viewer(&stored, session))
    }

    /// Irreversibly remove an application. Admin only.
    pub fn delete(&self, session: &Session, id: &ApplicationId) -> Result<(), ReviewError> {
        if !session.capabilities.can_delete() {
            return Err(self.denied(session, "delete applications"));
        }

        let record = self.load(id)?;
        self.repository.delete(id, record.version)?;
        warn!(application_id = %id, actor = session.username(), "application deleted");

        self.write_audit(AuditEntry::new(
            AuditAction::Deleted,
            id.clone(),
            record.application.applicant_name(),
            session.username(),
            format!("Application deleted by {}", session.username()),
            record.application.status,
            None,
        ));
        Ok(())
    }

    pub fn audit_log(
        &self,
        session: &Session,
        limit: usize,
    ) -> Result<Vec<AuditEntry>, ReviewError> {
        if !session.capabilities.can_view_audit_log() {
            return Err(self.denied(session, "view the audit log"));
        }
        self.audit
            .recent(limit)
            .map_err(|err| ReviewError::Unavailable(err.to_string()))
    }

    pub fn settings(&self) -> ApplicationSettings {
        self.settings
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn update_intake(
        &self,
        session: &Session,
        enabled: bool,
    ) -> Result<ApplicationSettings, ReviewError> {
        if !session.capabilities.can_manage_intake() {
            return Err(self.denied(session, "change application intake"));
        }

        let mut settings = self
            .settings
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        settings.applications_enabled = enabled;
        settings.updated_by = Some(session.username().to_string());
        settings.updated_at = Utc::now();
        info!(actor = session.username(), enabled, "application intake updated");

        Ok(settings.clone())
    }

    /// Retry audit entries whose first write failed. Returns how many are still queued.
    pub fn flush_audit_backlog(&self) -> usize {
        let mut backlog = lock(&self.audit_backlog);
        while let Some(entry) = backlog.pop_front() {
            if let Err(err) = self.audit.record(entry.clone()) {
                warn!(application_id = %entry.application_id, error = %err, "audit retry failed");
                backlog.push_front(entry);
                break;
            }
        }
        backlog.len()
    }

    fn write_audit(&self, entry: AuditEntry) {
        if self.flush_audit_backlog() > 0 {
            lock(&self.audit_backlog).push_back(entry);
            return;
        }

        if let Err(err) = self.audit.record(entry.clone()) {
            error!(
                application_id = %entry.application_id,
                action = ?entry.action,
                error = %err,
                "audit write failed; entry queued for retry"
            );
            lock(&self.audit_backlog).push_back(entry);
        }
    }

    fn notify(&self, notification: Notification) {
        match &self.dispatch {
            NotificationDispatch::Inline => deliver(self.notifier.as_ref(), &notification),
            NotificationDispatch::Detached(handle) => {
                let notifier = Arc::clone(&self.notifier);
                handle.spawn_blocking(move || deliver(notifier.as_ref(), &notification));
            }
        }
    }

    fn load(&self, id: &ApplicationId) -> Result<ApplicationRecord, ReviewError> {
        self.repository
            .fetch(id)?
            .ok_or_else(|| ReviewError::NotFound(id.clone()))
    }

    fn require_viewer(&self, session: &Session) -> Result<(), ReviewError> {
        if session.capabilities.can_view_applications() {
            Ok(())
        } else {
            Err(self.denied(session, "view applications"))
        }
    }

    fn denied(&self, session: &Session, action: &str) -> ReviewError {
        warn!(actor = session.username(), action, "permission denied");
        ReviewError::denied(action)
    }
}

fn search_matches(application: &Application, needle: &str, include_name: bool) -> bool {
    let submission = &application.submission;
    let mut fields = vec![
        &submission.discord_handle,
        &submission.ingame_name,
        &submission.server,
    ];
    if include_name {
        fields.push(&submission.name);
    }
    fields
        .into_iter()
        .any(|field| field.to_lowercase().contains(needle))
}
