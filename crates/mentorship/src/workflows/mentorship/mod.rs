//! Alumni mentorship workflow: offers, applications, and the approval side effects.
//!
//! Alumni publish offers, students (or other alumni) apply, and an owner's approval opens a
//! session, sends an e-mail, and drops an in-app notification. Only the status transition is
//! authoritative; the downstream effects are best effort.

pub mod catalog;
pub mod domain;
pub mod lifecycle;
pub mod mailer;
pub mod memory;
pub mod notifications;
pub mod pipeline;
pub mod repository;
pub mod router;
pub mod service;
pub mod sessions;
pub mod sqlite;

#[cfg(test)]
mod tests;

pub use catalog::{OfferCatalog, OfferFilter};
pub use domain::{
    Actor, ActorId, ActorRole, ApplicantEntry, Application, ApplicationId, ApplicationRequest,
    ApplicationStatus, ApplicationSummary, CounterDrift, Member, NewNotification, NewSession,
    Notification, NotificationId, NotificationKind, Offer, OfferDraft, OfferId, OfferListing,
    OfferStatus, Session, SessionId, SessionListing, SessionSlot, SessionStatus, UnknownLabel,
};
pub use lifecycle::{ApplicationLifecycle, ApplyCommand, TransitionOutcome};
pub use mailer::LogMailer;
pub use memory::MemoryStore;
pub use notifications::NotificationInbox;
pub use pipeline::{
    ApprovalPipeline, ApprovalReport, MailSettings, SideEffectError, APPROVAL_NOTIFICATION_TITLE,
    DEFAULT_SESSION_TOPIC,
};
pub use repository::{
    ApplicationRepository, MailError, Mailer, MemberDirectory, MentorshipStore,
    NotificationRepository, OfferRepository, OutboundEmail, RepositoryError, SessionRepository,
};
pub use router::{mentorship_router, ActorIdentity, ApiResponse};
pub use service::{MentorshipError, MentorshipService};
pub use sessions::{ScheduleCommand, SessionScheduler};
pub use sqlite::SqliteStore;
