//! Best-effort side effects of an approval.
//!
//! The status write has already committed by the time [`ApprovalPipeline::run`] is called. Each
//! step below is attempted independently; failures are logged and never reach the caller.

use std::sync::Arc;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::MailConfig;

use super::domain::{
    ActorRole, Application, ApplicationId, NewNotification, NewSession, Notification,
    NotificationKind, Offer, Session,
};
use super::repository::{MailError, Mailer, MentorshipStore, OutboundEmail, RepositoryError};

pub const APPROVAL_NOTIFICATION_TITLE: &str = "Application Approved!";
pub const DEFAULT_SESSION_TOPIC: &str = "Mentorship Session";

/// Sender address and dashboard link embedded in approval e-mails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailSettings {
    pub from_address: String,
    pub dashboard_url: String,
}

impl From<&MailConfig> for MailSettings {
    fn from(config: &MailConfig) -> Self {
        Self {
            from_address: config.from_address.clone(),
            dashboard_url: config.dashboard_url.clone(),
        }
    }
}

impl Default for MailSettings {
    fn default() -> Self {
        Self::from(&MailConfig::default())
    }
}

/// A downstream effect that failed after the approval was recorded.
#[derive(Debug, thiserror::Error)]
pub enum SideEffectError {
    #[error("session creation failed: {0}")]
    Session(RepositoryError),
    #[error("notification insert failed: {0}")]
    Notification(RepositoryError),
    #[error("directory lookup failed: {0}")]
    Directory(RepositoryError),
    #[error("approval e-mail failed: {0}")]
    Mail(MailError),
}

/// What the pipeline managed to do. Absent entries were logged as failures or skipped.
#[derive(Debug, Default)]
pub struct ApprovalReport {
    pub session: Option<Session>,
    pub notification: Option<Notification>,
    /// Detached e-mail task. Dropping the handle does not cancel delivery.
    pub email: Option<JoinHandle<()>>,
}

pub struct ApprovalPipeline<S, M> {
    store: Arc<S>,
    mailer: Arc<M>,
    settings: MailSettings,
}

impl<S, M> ApprovalPipeline<S, M>
where
    S: MentorshipStore,
    M: Mailer,
{
    pub fn new(store: Arc<S>, mailer: Arc<M>, settings: MailSettings) -> Self {
        Self {
            store,
            mailer,
            settings,
        }
    }

    pub async fn run(&self, application: &Application, offer: &Offer) -> ApprovalReport {
        let owner_name = self.owner_name(application.id, offer).await;

        let session = match self.open_session(application, offer).await {
            Ok(session) => {
                info!(
                    application_id = %application.id,
                    session_id = %session.id,
                    student_id = %session.student_id,
                    "mentorship session opened"
                );
                Some(session)
            }
            Err(err) => {
                log_failure(application.id, &err);
                None
            }
        };

        let email = self.dispatch_email(application, offer, &owner_name).await;

        let notification = match self.notify(application, offer, &owner_name).await {
            Ok(notification) => Some(notification),
            Err(err) => {
                log_failure(application.id, &err);
                None
            }
        };

        ApprovalReport {
            session,
            notification,
            email,
        }
    }

    async fn owner_name(&self, application_id: ApplicationId, offer: &Offer) -> String {
        match self.store.member(&offer.owner_id, ActorRole::Alumni).await {
            Ok(Some(member)) => member.name,
            Ok(None) => offer.owner_id.to_string(),
            Err(err) => {
                log_failure(application_id, &SideEffectError::Directory(err));
                offer.owner_id.to_string()
            }
        }
    }

    async fn open_session(
        &self,
        application: &Application,
        offer: &Offer,
    ) -> Result<Session, SideEffectError> {
        let topic = if offer.title.trim().is_empty() {
            DEFAULT_SESSION_TOPIC.to_string()
        } else {
            offer.title.clone()
        };

        let session = NewSession {
            application_id: application.id,
            offer_id: offer.id,
            owner_id: offer.owner_id.clone(),
            student_id: application.applicant_id.clone(),
            topic,
        };

        self.store
            .open_session(&session, Utc::now())
            .await
            .map_err(SideEffectError::Session)
    }

    async fn dispatch_email(
        &self,
        application: &Application,
        offer: &Offer,
        owner_name: &str,
    ) -> Option<JoinHandle<()>> {
        let member = match self
            .store
            .member(&application.applicant_id, application.applicant_role)
            .await
        {
            Ok(member) => member,
            Err(err) => {
                log_failure(application.id, &SideEffectError::Directory(err));
                return None;
            }
        };

        let Some((name, address)) = member.and_then(|member| {
            member
                .email
                .filter(|address| !address.trim().is_empty())
                .map(|address| (member.name, address))
        }) else {
            debug!(
                application_id = %application.id,
                applicant_id = %application.applicant_id,
                "no e-mail address on file, skipping approval e-mail"
            );
            return None;
        };

        let email = approval_email(&self.settings, &address, &name, owner_name, &offer.title);
        let mailer = self.mailer.clone();
        let application_id = application.id;

        Some(tokio::spawn(async move {
            match mailer.send(email).await {
                Ok(()) => info!(%application_id, recipient = %address, "approval e-mail sent"),
                Err(err) => log_failure(application_id, &SideEffectError::Mail(err)),
            }
        }))
    }

    async fn notify(
        &self,
        application: &Application,
        offer: &Offer,
        owner_name: &str,
    ) -> Result<Notification, SideEffectError> {
        let notification = NewNotification {
            recipient_id: application.applicant_id.clone(),
            recipient_role: application.applicant_role,
            title: APPROVAL_NOTIFICATION_TITLE.to_string(),
            message: format!(
                "{owner_name} approved your application for \"{}\"!",
                offer.title
            ),
            related_offer_id: Some(offer.id),
            kind: NotificationKind::Success,
        };

        self.store
            .insert_notification(&notification, Utc::now())
            .await
            .map_err(SideEffectError::Notification)
    }
}

fn log_failure(application_id: ApplicationId, err: &SideEffectError) {
    warn!(%application_id, error = %err, "approval side effect failed");
}

pub(crate) fn approval_email(
    settings: &MailSettings,
    to: &str,
    applicant_name: &str,
    owner_name: &str,
    offer_title: &str,
) -> OutboundEmail {
    let html_body = format!(
        concat!(
            "<div style=\"font-family: Arial, sans-serif; max-width: 600px; margin: auto;\">",
            "<h1>Congratulations {applicant}!</h1>",
            "<p><strong>{owner}</strong> has accepted your application for:</p>",
            "<p style=\"font-weight: bold; font-size: 1.2rem;\">\"{title}\"</p>",
            "<p>You will be notified when the session is scheduled.</p>",
            "<p><a href=\"{dashboard}\">Go to Dashboard</a></p>",
            "</div>"
        ),
        applicant = escape_html(applicant_name),
        owner = escape_html(owner_name),
        title = escape_html(offer_title),
        dashboard = escape_html(&settings.dashboard_url),
    );

    OutboundEmail {
        from: settings.from_address.clone(),
        to: to.to_string(),
        subject: format!("You've been selected for \"{offer_title}\"!"),
        html_body,
    }
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}
