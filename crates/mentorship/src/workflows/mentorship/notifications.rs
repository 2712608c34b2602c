use std::sync::Arc;

use tracing::debug;

use super::domain::{Actor, Notification};
use super::repository::MentorshipStore;
use super::service::MentorshipError;

/// Read side of the append-only in-app notifications.
pub struct NotificationInbox<S> {
    store: Arc<S>,
}

impl<S> NotificationInbox<S>
where
    S: MentorshipStore,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub async fn list(&self, recipient: &Actor) -> Result<Vec<Notification>, MentorshipError> {
        Ok(self
            .store
            .notifications_for(&recipient.id, recipient.role)
            .await?)
    }

    pub async fn mark_all_read(&self, recipient: &Actor) -> Result<u64, MentorshipError> {
        let updated = self
            .store
            .mark_all_read(&recipient.id, recipient.role)
            .await?;
        debug!(recipient_id = %recipient.id, updated, "notifications marked read");
        Ok(updated)
    }
}
