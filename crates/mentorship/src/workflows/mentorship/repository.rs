use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    ActorId, ActorRole, ApplicantEntry, Application, ApplicationId, ApplicationRequest,
    ApplicationStatus, ApplicationSummary, CounterDrift, Member, NewNotification, NewSession,
    Notification, Offer, OfferDraft, OfferId, OfferListing, Session, SessionId, SessionListing,
    SessionSlot,
};

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
    #[error("stored record is malformed: {0}")]
    Corrupted(String),
}

#[async_trait]
pub trait MemberDirectory: Send + Sync {
    async fn upsert_member(&self, member: Member) -> Result<(), RepositoryError>;
    async fn member(
        &self,
        id: &ActorId,
        role: ActorRole,
    ) -> Result<Option<Member>, RepositoryError>;
}

#[async_trait]
pub trait OfferRepository: Send + Sync {
    async fn insert_offer(
        &self,
        owner_id: &ActorId,
        draft: &OfferDraft,
        created_at: DateTime<Utc>,
    ) -> Result<Offer, RepositoryError>;

    async fn fetch_offer(&self, id: OfferId) -> Result<Option<OfferListing>, RepositoryError>;

    /// Newest first.
    async fn list_offers(
        &self,
        owner_id: Option<&ActorId>,
    ) -> Result<Vec<OfferListing>, RepositoryError>;

    /// Overwrites every editable field. `None` when no offer with `id` is owned by `owner_id`.
    async fn replace_offer(
        &self,
        id: OfferId,
        owner_id: &ActorId,
        draft: &OfferDraft,
    ) -> Result<Option<Offer>, RepositoryError>;

    /// `false` when no offer with `id` is owned by `owner_id`.
    async fn delete_offer(&self, id: OfferId, owner_id: &ActorId)
        -> Result<bool, RepositoryError>;

    /// Recomputes every applicant counter from live application rows and rewrites drifted ones.
    async fn recount_applicants(&self) -> Result<Vec<CounterDrift>, RepositoryError>;
}

#[async_trait]
pub trait ApplicationRepository: Send + Sync {
    /// Inserts a pending application and bumps the offer's counter as one unit.
    ///
    /// Returns [`RepositoryError::Conflict`] when the applicant already applied to the offer;
    /// the counter is left untouched in that case.
    async fn insert_application(
        &self,
        request: &ApplicationRequest,
        applied_at: DateTime<Utc>,
    ) -> Result<Application, RepositoryError>;

    async fn fetch_application(
        &self,
        id: ApplicationId,
    ) -> Result<Option<Application>, RepositoryError>;

    async fn applications_for_offer(
        &self,
        offer_id: OfferId,
    ) -> Result<Vec<ApplicantEntry>, RepositoryError>;

    async fn applications_by_applicant(
        &self,
        applicant_id: &ActorId,
    ) -> Result<Vec<ApplicationSummary>, RepositoryError>;

    /// Conditional `pending -> status` write. `false` when the application was not pending.
    async fn resolve_application(
        &self,
        id: ApplicationId,
        status: ApplicationStatus,
    ) -> Result<bool, RepositoryError>;
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Creates the session for an approved application, or returns the one already created.
    async fn open_session(
        &self,
        session: &NewSession,
        created_at: DateTime<Utc>,
    ) -> Result<Session, RepositoryError>;

    async fn fetch_session(&self, id: SessionId) -> Result<Option<Session>, RepositoryError>;

    async fn sessions_for_owner(
        &self,
        owner_id: &ActorId,
    ) -> Result<Vec<SessionListing>, RepositoryError>;

    async fn sessions_for_student(
        &self,
        student_id: &ActorId,
    ) -> Result<Vec<SessionListing>, RepositoryError>;

    /// `None` when no session with `id` is owned by `owner_id`.
    async fn reschedule_session(
        &self,
        id: SessionId,
        owner_id: &ActorId,
        slot: &SessionSlot,
    ) -> Result<Option<Session>, RepositoryError>;
}

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn insert_notification(
        &self,
        notification: &NewNotification,
        created_at: DateTime<Utc>,
    ) -> Result<Notification, RepositoryError>;

    async fn notifications_for(
        &self,
        recipient_id: &ActorId,
        recipient_role: ActorRole,
    ) -> Result<Vec<Notification>, RepositoryError>;

    async fn mark_all_read(
        &self,
        recipient_id: &ActorId,
        recipient_role: ActorRole,
    ) -> Result<u64, RepositoryError>;
}

/// Everything the mentorship workflow persists, behind one bound.
pub trait MentorshipStore:
    MemberDirectory
    + OfferRepository
    + ApplicationRepository
    + SessionRepository
    + NotificationRepository
    + 'static
{
}

impl<T> MentorshipStore for T where
    T: MemberDirectory
        + OfferRepository
        + ApplicationRepository
        + SessionRepository
        + NotificationRepository
        + 'static
{
}

/// Outbound e-mail hook. Callers never wait on delivery for correctness.
#[async_trait]
pub trait Mailer: Send + Sync + 'static {
    async fn send(&self, email: OutboundEmail) -> Result<(), MailError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundEmail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html_body: String,
}

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("mail transport unavailable: {0}")]
    Transport(String),
    #[error("mail rejected for {recipient}: {reason}")]
    Rejected { recipient: String, reason: String },
}
