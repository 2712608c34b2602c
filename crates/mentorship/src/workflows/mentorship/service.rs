use std::sync::Arc;

use super::catalog::OfferCatalog;
use super::lifecycle::ApplicationLifecycle;
use super::notifications::NotificationInbox;
use super::pipeline::{ApprovalPipeline, MailSettings};
use super::repository::{Mailer, MentorshipStore, RepositoryError};
use super::sessions::SessionScheduler;

/// Service composing the offer catalog, application lifecycle, sessions, and inbox over one store.
pub struct MentorshipService<S, M> {
    catalog: OfferCatalog<S>,
    applications: ApplicationLifecycle<S, M>,
    sessions: SessionScheduler<S>,
    inbox: NotificationInbox<S>,
}

impl<S, M> MentorshipService<S, M>
where
    S: MentorshipStore,
    M: Mailer,
{
    /// The mailer is injected here so tests can substitute a recording double.
    pub fn new(store: Arc<S>, mailer: Arc<M>, settings: MailSettings) -> Self {
        let pipeline = ApprovalPipeline::new(store.clone(), mailer, settings);
        Self {
            catalog: OfferCatalog::new(store.clone()),
            applications: ApplicationLifecycle::new(store.clone(), pipeline),
            sessions: SessionScheduler::new(store.clone()),
            inbox: NotificationInbox::new(store),
        }
    }

    pub fn catalog(&self) -> &OfferCatalog<S> {
        &self.catalog
    }

    pub fn applications(&self) -> &ApplicationLifecycle<S, M> {
        &self.applications
    }

    pub fn sessions(&self) -> &SessionScheduler<S> {
        &self.sessions
    }

    pub fn inbox(&self) -> &NotificationInbox<S> {
        &self.inbox
    }
}

/// Error raised by the mentorship workflow.
#[derive(Debug, thiserror::Error)]
pub enum MentorshipError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("you have already applied to this offer")]
    DuplicateApplication,
    #[error(transparent)]
    Storage(#[from] RepositoryError),
}
