use std::sync::Arc;

use chrono::NaiveDateTime;
use tracing::info;

use super::domain::{ActorId, Session, SessionId, SessionListing, SessionSlot, SessionStatus};
use super::pipeline::DEFAULT_SESSION_TOPIC;
use super::repository::MentorshipStore;
use super::service::MentorshipError;

/// Owner-supplied schedule. Blank values fall back to "not scheduled" defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleCommand {
    pub datetime: Option<NaiveDateTime>,
    pub topic: Option<String>,
    pub meeting_link: Option<String>,
    pub status: Option<SessionStatus>,
}

impl ScheduleCommand {
    fn into_slot(self) -> SessionSlot {
        SessionSlot {
            datetime: self.datetime,
            topic: self
                .topic
                .filter(|topic| !topic.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_SESSION_TOPIC.to_string()),
            meeting_link: self.meeting_link.filter(|link| !link.trim().is_empty()),
            status: self.status.unwrap_or_default(),
        }
    }
}

pub struct SessionScheduler<S> {
    store: Arc<S>,
}

impl<S> SessionScheduler<S>
where
    S: MentorshipStore,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub async fn sessions_for_owner(
        &self,
        owner_id: &ActorId,
    ) -> Result<Vec<SessionListing>, MentorshipError> {
        Ok(self.store.sessions_for_owner(owner_id).await?)
    }

    pub async fn sessions_for_student(
        &self,
        student_id: &ActorId,
    ) -> Result<Vec<SessionListing>, MentorshipError> {
        Ok(self.store.sessions_for_student(student_id).await?)
    }

    /// Schedule or reschedule; repeatable by the owning alumni.
    pub async fn schedule_session(
        &self,
        session_id: SessionId,
        owner_id: &ActorId,
        command: ScheduleCommand,
    ) -> Result<Session, MentorshipError> {
        let existing = self
            .store
            .fetch_session(session_id)
            .await?
            .ok_or_else(|| MentorshipError::NotFound(format!("session {session_id} not found")))?;

        if &existing.owner_id != owner_id {
            return Err(MentorshipError::Forbidden(
                "session is owned by another alumni".to_string(),
            ));
        }

        let slot = command.into_slot();
        let session = self
            .store
            .reschedule_session(session_id, owner_id, &slot)
            .await?
            .ok_or_else(|| MentorshipError::NotFound(format!("session {session_id} not found")))?;

        info!(
            %session_id,
            owner_id = %owner_id,
            datetime = ?session.datetime,
            status = %session.status,
            "mentorship session scheduled"
        );
        Ok(session)
    }
}
