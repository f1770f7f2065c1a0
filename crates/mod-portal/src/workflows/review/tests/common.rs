use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{header, Request};
use axum::response::Response;
use chrono::{Duration, Utc};
use serde_json::Value;

use crate::workflows::review::audit::{AuditEntry, AuditError, AuditSink};
use crate::workflows::review::capability::{Principal, Session};
use crate::workflows::review::domain::{
    Application, ApplicationId, ApplicationStatus, ApplicationSubmission, Position, Track,
    TrackApproval,
};
use crate::workflows::review::identity::StaticIdentityProvider;
use crate::workflows::review::notify::{Notification, Notifier, NotifyError};
use crate::workflows::review::repository::{
    ApplicationFilter, ApplicationRecord, ApplicationRepository, RepositoryError,
};
use crate::workflows::review::{review_router, ReviewService};

pub(super) type TestService = ReviewService<MemoryRepository, MemoryAudit, MemoryNotifier>;

pub(super) fn submission(position: Position) -> ApplicationSubmission {
    ApplicationSubmission {
        name: "Jordan Reyes".to_string(),
        email: Some("jordan@example.com".to_string()),
        position,
        discord_handle: "jreyes#2231".to_string(),
        ingame_name: "Warlord Jay".to_string(),
        age: 24,
        country: "Portugal".to_string(),
        server: "S-412".to_string(),
        activity_times: "Evenings UTC".to_string(),
        native_language: "Portuguese".to_string(),
        other_languages: "English".to_string(),
        previous_experience: "Moderated a 2k member Discord".to_string(),
        highest_character_level: Some(140),
        answers: BTreeMap::from([(
            "why_moderate".to_string(),
            "I enjoy keeping the community welcoming".to_string(),
        )]),
    }
}

pub(super) fn moderator(name: &str) -> Session {
    Session::new(Principal::moderator(name))
}

pub(super) fn mmod(name: &str) -> Session {
    Session::new(Principal {
        role: "mmod".to_string(),
        ..Principal::moderator(name)
    })
}

pub(super) fn admin(name: &str) -> Session {
    Session::new(Principal {
        is_admin: true,
        ..Principal::moderator(name)
    })
}

pub(super) fn training_manager(name: &str) -> Session {
    Session::new(Principal {
        is_training_manager: true,
        ..Principal::moderator(name)
    })
}

pub(super) fn discord_leader(name: &str) -> Session {
    Session::new(Principal {
        is_discord_leader: true,
        ..Principal::moderator(name)
    })
}

pub(super) fn in_game_leader(name: &str) -> Session {
    Session::new(Principal {
        roles: vec!["In-Game-Leader".to_string()],
        ..Principal::moderator(name)
    })
}

pub(super) fn build_service() -> (
    TestService,
    Arc<MemoryRepository>,
    Arc<MemoryAudit>,
    Arc<MemoryNotifier>,
) {
    let repository = Arc::new(MemoryRepository::default());
    let audit = Arc::new(MemoryAudit::default());
    let notifier = Arc::new(MemoryNotifier::default());
    let service = ReviewService::new(repository.clone(), audit.clone(), notifier.clone());
    (service, repository, audit, notifier)
}

/// Store an application directly in `status`, bypassing the workflow.
pub(super) fn seed(
    repository: &MemoryRepository,
    position: Position,
    status: ApplicationStatus,
    approved: &[Track],
) -> ApplicationRecord {
    let mut application = Application::new(submission(position), Utc::now());
    application.status = status;
    for track in approved {
        *application.team.slot_mut(*track) = Some(TrackApproval {
            approved_by: "seed".to_string(),
            approved_at: Utc::now(),
        });
    }
    repository.insert(application).expect("seed insert")
}

pub(super) fn seed_at(
    repository: &MemoryRepository,
    name: &str,
    hours_ago: i64,
) -> ApplicationRecord {
    let mut submission = submission(Position::Discord);
    submission.name = name.to_string();
    submission.discord_handle = format!("{}#0001", name.to_lowercase());
    let application = Application::new(submission, Utc::now() - Duration::hours(hours_ago));
    repository.insert(application).expect("seed insert")
}

#[derive(Default)]
pub(super) struct MemoryRepository {
    records: Mutex<HashMap<ApplicationId, ApplicationRecord>>,
}

impl MemoryRepository {
    pub(super) fn stored(&self, id: &ApplicationId) -> Option<ApplicationRecord> {
        self.records
            .lock()
            .expect("repository mutex poisoned")
            .get(id)
            .cloned()
    }

    /// Simulate a concurrent writer bumping the stored version.
    pub(super) fn touch(&self, id: &ApplicationId) {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if let Some(record) = guard.get_mut(id) {
            record.version += 1;
        }
    }
}

impl ApplicationRepository for MemoryRepository {
    fn insert(&self, application: Application) -> Result<ApplicationRecord, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if guard.contains_key(&application.id) {
            return Err(RepositoryError::Conflict(application.id));
        }
        let record = ApplicationRecord {
            application,
            version: 1,
        };
        guard.insert(record.id().clone(), record.clone());
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
        *stored = ApplicationRecord {
            version: record.version + 1,
            application: record.application,
        };
        Ok(stored.clone())
    }

    fn fetch(&self, id: &ApplicationId) -> Result<Option<ApplicationRecord>, RepositoryError> {
        Ok(self.stored(id))
    }

    fn delete(&self, id: &ApplicationId, expected_version: u64) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        match guard.get(id) {
            None => Err(RepositoryError::NotFound(id.clone())),
            Some(record) if record.version != expected_version => {
                Err(RepositoryError::Conflict(id.clone()))
            }
            Some(_) => {
                guard.remove(id);
                Ok(())
            }
        }
    }

    fn list(&self, filter: &ApplicationFilter) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard
            .values()
            .filter(|record| filter.matches(&record.application))
            .cloned()
            .collect())
    }
}

pub(super) struct UnavailableRepository;

impl ApplicationRepository for UnavailableRepository {
    fn insert(&self, _application: Application) -> Result<ApplicationRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn update(&self, _record: ApplicationRecord) -> Result<ApplicationRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, _id: &ApplicationId) -> Result<Option<ApplicationRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn delete(&self, _id: &ApplicationId, _expected: u64) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn list(&self, _filter: &ApplicationFilter) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

#[derive(Default)]
pub(super) struct MemoryAudit {
    entries: Mutex<Vec<AuditEntry>>,
    offline: AtomicBool,
}

impl MemoryAudit {
    pub(super) fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().expect("audit mutex poisoned").clone()
    }

    pub(super) fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }
}

impl AuditSink for MemoryAudit {
    fn record(&self, entry: AuditEntry) -> Result<(), AuditError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(AuditError::Unavailable("audit store offline".to_string()));
        }
        self.entries.lock().expect("audit mutex poisoned").push(entry);
        Ok(())
    }

    fn recent(&self, limit: usize) -> Result<Vec<AuditEntry>, AuditError> {
        let guard = self.entries.lock().expect("audit mutex poisoned");
        Ok(guard.iter().rev().take(limit).cloned().collect())
    }
}

#[derive(Default)]
pub(super) struct MemoryNotifier {
    sent: Mutex<Vec<Notification>>,
    failing: AtomicBool,
}

impl MemoryNotifier {
    pub(super) fn sent(&self) -> Vec<Notification> {
        self.sent.lock().expect("notifier mutex poisoned").clone()
    }

    pub(super) fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl Notifier for MemoryNotifier {
    fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotifyError::Transport("smtp relay refused".to_string()));
        }
        self.sent
            .lock()
            .expect("notifier mutex poisoned")
            .push(notification.clone());
        Ok(())
    }
}

pub(super) fn identity() -> StaticIdentityProvider {
    StaticIdentityProvider::new()
        .with_principal("mod-token", moderator("riley").principal)
        .with_principal("mmod-token", mmod("sam").principal)
        .with_principal("admin-token", admin("ana").principal)
        .with_principal("tm-token", training_manager("tess").principal)
        .with_principal("dl-token", discord_leader("dana").principal)
        .with_principal("igl-token", in_game_leader("ian").principal)
}

pub(super) fn router_with(service: TestService) -> axum::Router {
    review_router(Arc::new(service), Arc::new(identity()))
}

pub(super) fn json_request(
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Value,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder
        .body(Body::from(serde_json::to_vec(&body).expect("serialize body")))
        .expect("request")
}

pub(super) fn empty_request(method: &str, uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).expect("request")
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
