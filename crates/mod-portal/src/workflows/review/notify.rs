use serde::{Deserialize, Serialize};

use super::domain::{Application, ApplicationId, ApplicationStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Received,
    Approved,
    Waiting,
    Rejected,
}

impl NotificationKind {
    /// Outbound notice for an application entering `status`, if that status sends one.
    pub fn for_status(status: ApplicationStatus) -> Option<Self> {
        match status {
            ApplicationStatus::Approved => Some(NotificationKind::Approved),
            ApplicationStatus::Waiting => Some(NotificationKind::Waiting),
            ApplicationStatus::Rejected => Some(NotificationKind::Rejected),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            NotificationKind::Received => "received",
            NotificationKind::Approved => "approved",
            NotificationKind::Waiting => "waiting",
            NotificationKind::Rejected => "rejected",
        }
    }
}

/// Payload handed to the notifier after a transition has been committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub application_id: ApplicationId,
    pub recipient: Option<String>,
    pub applicant_name: String,
    pub comment: String,
    pub previous_status: Option<ApplicationStatus>,
}

impl Notification {
    pub fn new(
        kind: NotificationKind,
        application: &Application,
        comment: impl Into<String>,
        previous_status: Option<ApplicationStatus>,
    ) -> Self {
        Self {
            kind,
            application_id: application.id.clone(),
            recipient: application.submission.email.clone(),
            applicant_name: application.submission.name.clone(),
            comment: comment.into(),
            previous_status,
        }
    }

    pub fn from_waitlist(&self) -> bool {
        self.previous_status == Some(ApplicationStatus::Waiting)
    }
}

/// Outbound delivery hook (e-mail adapters and the like).
pub trait Notifier: Send + Sync {
    fn send(&self, notification: &Notification) -> Result<(), NotifyError>;
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("no recipient address on application {0}")]
    MissingRecipient(ApplicationId),
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Plain-text templates for applicant e-mail.
#[derive(Debug, Clone)]
pub struct MailTemplates {
    community: String,
}

impl MailTemplates {
    pub fn new(community: impl Into<String>) -> Self {
        Self {
            community: community.into(),
        }
    }

    pub fn render(&self, notification: &Notification) -> Result<EmailMessage, NotifyError> {
        let to = notification
            .recipient
            .clone()
            .filter(|address| !address.trim().is_empty())
            .ok_or_else(|| NotifyError::MissingRecipient(notification.application_id.clone()))?;

        let community = &self.community;
        let name = &notification.applicant_name;
        let signature = format!("Kind regards,\n{community} Moderation Team");
        let manager_note = match notification.comment.trim() {
            "" => String::new(),
            note => format!("Message from the Training Team:\n{note}\n\n"),
        };

        let (subject, body) = match notification.kind {
            NotificationKind::Received => (
                format!("{community} - Application Received"),
                format!(
                    "Hi {name},\n\nThank you for applying to become a {community} Moderator. \
                     Our team will review your application shortly and you will receive an \
                     email once a decision has been made.\n\n{signature}"
                ),
            ),
            NotificationKind::Approved if notification.from_waitlist() => (
                format!("{community} Moderator Application - Position Available!"),
                format!(
                    "Hi {name},\n\nA position has become available and we would like to offer \
                     you a place on our moderation team. Your application, previously on our \
                     waiting list, has now been fully approved.\n\nThe next stage is an \
                     interview with the training team.\n\n{manager_note}We look forward to \
                     hearing from you shortly.\n\n{signature}"
                ),
            ),
            NotificationKind::Approved => (
                format!("{community} Moderator Application - Congratulations!"),
                format!(
                    "Hi {name},\n\nYour application to become a {community} Moderator has been \
                     successful.\n\nThe next stage is an interview with the training team.\n\n\
                     {manager_note}We look forward to hearing from you shortly.\n\n{signature}"
                ),
            ),
            NotificationKind::Waiting => (
                format!("{community} Moderator Application - Waitlist"),
                format!(
                    "Hi {name},\n\nYour application has been accepted, but we do not have an \
                     open vacancy at the moment. You have been placed on our waiting list and \
                     we will be in touch as soon as a position becomes available.\n\n{signature}"
                ),
            ),
            NotificationKind::Rejected => (
                format!("{community} Moderator Application - Update"),
                format!(
                    "Hi {name},\n\nThank you for applying for a {community} Moderator position. \
                     After careful review, your application has not been successful on this \
                     occasion. You are welcome to reapply in three months.\n\n{signature}"
                ),
            ),
        };

        Ok(EmailMessage { to, subject, body })
    }
}

impl Default for MailTemplates {
    fn default() -> Self {
        Self::new("Top War")
    }
}
