use metrics_exporter_prometheus::PrometheusHandle;
use mod_portal::config::PortalConfig;
use mod_portal::error::AppError;
use mod_portal::workflows::review::{
    Application, ApplicationFilter, ApplicationId, ApplicationRecord, ApplicationRepository,
    AuditEntry, AuditError, AuditSink, EmailMessage, MailTemplates, Notification, Notifier,
    NotifyError, RepositoryError, StaticIdentityProvider,
};
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{info, warn};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

fn guard<'a, T>(mutex: &'a Mutex<T>, what: &str) -> Result<MutexGuard<'a, T>, String> {
    mutex.lock().map_err(|_| format!("{what} lock poisoned"))
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryApplicationRepository {
    records: Arc<Mutex<HashMap<ApplicationId, ApplicationRecord>>>,
}

impl InMemoryApplicationRepository {
    fn records(
        &self,
    ) -> Result<MutexGuard<'_, HashMap<ApplicationId, ApplicationRecord>>, RepositoryError> {
        guard(&self.records, "repository").map_err(RepositoryError::Unavailable)
    }
}

impl ApplicationRepository for InMemoryApplicationRepository {
    fn insert(&self, application: Application) -> Result<ApplicationRecord, RepositoryError> {
        let mut records = self.records()?;
        if records.contains_key(&application.id) {
            return Err(RepositoryError::Conflict(application.id));
        }
        let record = ApplicationRecord {
            application,
            version: 1,
        };
        records.insert(record.id().clone(), record.clone());
        Ok(record)
    }

    fn update(&self, record: ApplicationRecord) -> Result<ApplicationRecord, RepositoryError> {
        let mut records = self.records()?;
        let stored = records
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
        Ok(self.records()?.get(id).cloned())
    }

    fn delete(&self, id: &ApplicationId, expected_version: u64) -> Result<(), RepositoryError> {
        let mut records = self.records()?;
        match records.get(id).map(|record| record.version) {
            None => Err(RepositoryError::NotFound(id.clone())),
            Some(version) if version != expected_version => {
                Err(RepositoryError::Conflict(id.clone()))
            }
            Some(_) => {
                records.remove(id);
                Ok(())
            }
        }
    }

    fn list(&self, filter: &ApplicationFilter) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        Ok(self
            .records()?
            .values()
            .filter(|record| filter.matches(&record.application))
            .cloned()
            .collect())
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryAuditSink {
    entries: Arc<Mutex<Vec<AuditEntry>>>,
}

impl AuditSink for InMemoryAuditSink {
    fn record(&self, entry: AuditEntry) -> Result<(), AuditError> {
        guard(&self.entries, "audit")
            .map_err(AuditError::Unavailable)?
            .push(entry);
        Ok(())
    }

    fn recent(&self, limit: usize) -> Result<Vec<AuditEntry>, AuditError> {
        let entries = guard(&self.entries, "audit").map_err(AuditError::Unavailable)?;
        Ok(entries.iter().rev().take(limit).cloned().collect())
    }
}

/// Renders applicant e-mail and writes it to the log instead of an SMTP relay.
pub(crate) struct LoggingMailer {
    templates: MailTemplates,
    outbox: Mutex<Vec<EmailMessage>>,
}

impl LoggingMailer {
    pub(crate) fn new(templates: MailTemplates) -> Self {
        Self {
            templates,
            outbox: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn outbox(&self) -> Vec<EmailMessage> {
        guard(&self.outbox, "outbox")
            .map(|messages| messages.clone())
            .unwrap_or_default()
    }
}

impl Notifier for LoggingMailer {
    fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let message = self.templates.render(notification)?;
        info!(
            application_id = %notification.application_id,
            kind = notification.kind.label(),
            to = %message.to,
            subject = %message.subject,
            "applicant e-mail rendered"
        );
        guard(&self.outbox, "outbox")
            .map_err(NotifyError::Transport)?
            .push(message);
        Ok(())
    }
}

pub(crate) fn load_identity(portal: &PortalConfig) -> Result<StaticIdentityProvider, AppError> {
    match &portal.roster_path {
        Some(path) => {
            let provider = StaticIdentityProvider::from_path(path)?;
            info!(path = %path.display(), principals = provider.len(), "moderator roster loaded");
            Ok(provider)
        }
        None => {
            warn!("PORTAL_ROSTER_PATH not set; moderator routes will reject every token");
            Ok(StaticIdentityProvider::new())
        }
    }
}
