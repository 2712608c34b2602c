use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a student or alumni actor as issued by the university directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(pub String);

impl ActorId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

macro_rules! row_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

row_id!(
    /// Identifier of a mentorship offer.
    OfferId
);
row_id!(
    /// Identifier of an application to an offer.
    ApplicationId
);
row_id!(SessionId);
row_id!(NotificationId);

/// Error returned when a stored or submitted label does not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownLabel {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! labelled_enum {
    ($(#[$meta:meta])* $name:ident, $kind:literal { $($variant:ident => $label:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const fn label(self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        }

        impl FromStr for $name {
            type Err = UnknownLabel;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                match value.trim().to_ascii_lowercase().as_str() {
                    $($label => Ok($name::$variant),)+
                    _ => Err(UnknownLabel {
                        kind: $kind,
                        value: value.to_string(),
                    }),
                }
            }
        }
    };
}

labelled_enum!(
    /// Which side of the university an actor belongs to.
    ActorRole, "role" {
        Student => "student",
        Alumni => "alumni",
    }
);

labelled_enum!(
    OfferStatus, "offer status" {
        Active => "active",
        Closed => "closed",
    }
);

labelled_enum!(
    /// `pending` is the only state an application ever leaves.
    ApplicationStatus, "application status" {
        Pending => "pending",
        Approved => "approved",
        Rejected => "rejected",
    }
);

labelled_enum!(
    SessionStatus, "session status" {
        Scheduled => "scheduled",
        Rescheduled => "rescheduled",
    }
);

labelled_enum!(
    NotificationKind, "notification kind" {
        Info => "info",
        Success => "success",
        Warning => "warning",
    }
);

impl ApplicationStatus {
    pub const fn is_terminal(self) -> bool {
        !matches!(self, ApplicationStatus::Pending)
    }
}

impl Default for OfferStatus {
    fn default() -> Self {
        OfferStatus::Active
    }
}

impl Default for SessionStatus {
    fn default() -> Self {
        SessionStatus::Scheduled
    }
}

/// The already-identified caller of an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: ActorId,
    pub role: ActorRole,
}

impl Actor {
    pub fn new(id: impl Into<String>, role: ActorRole) -> Self {
        Self {
            id: ActorId::new(id),
            role,
        }
    }
}

/// Directory entry used for display names and e-mail lookups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: ActorId,
    pub role: ActorRole,
    pub name: String,
    pub email: Option<String>,
    pub batch: Option<String>,
}

/// Editable offer fields. Edits replace every field, they never merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferDraft {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, alias = "maxApplicants")]
    pub max_applicants: Option<u32>,
    #[serde(default)]
    pub schedule: Option<String>,
    #[serde(default)]
    pub status: OfferStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
    pub id: OfferId,
    pub owner_id: ActorId,
    pub title: String,
    pub category: String,
    pub description: String,
    pub max_applicants: Option<u32>,
    pub schedule: Option<String>,
    pub status: OfferStatus,
    /// Running counter bumped on every accepted application, never derived from rows.
    pub applicant_count: u32,
    pub created_at: DateTime<Utc>,
}

impl Offer {
    /// Capacity is advisory: a full offer still accepts applications.
    pub fn is_full(&self) -> bool {
        self.max_applicants
            .is_some_and(|limit| self.applicant_count >= limit)
    }
}

/// Offer joined with its owner's display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferListing {
    #[serde(flatten)]
    pub offer: Offer,
    pub owner_name: Option<String>,
    /// Snapshot of [`Offer::is_full`] for clients; never enforced.
    #[serde(default)]
    pub is_full: bool,
}

impl OfferListing {
    pub fn new(offer: Offer, owner_name: Option<String>) -> Self {
        let is_full = offer.is_full();
        Self {
            offer,
            owner_name,
            is_full,
        }
    }
}

/// Validated input for a new application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationRequest {
    pub offer_id: OfferId,
    pub applicant_id: ActorId,
    pub applicant_role: ActorRole,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub offer_id: OfferId,
    pub applicant_id: ActorId,
    pub applicant_role: ActorRole,
    pub message: String,
    pub status: ApplicationStatus,
    pub applied_at: DateTime<Utc>,
}

/// Application as seen by the offer owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicantEntry {
    #[serde(flatten)]
    pub application: Application,
    pub applicant_name: Option<String>,
    pub applicant_email: Option<String>,
    pub applicant_batch: Option<String>,
}

/// Application as seen by the applicant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationSummary {
    #[serde(flatten)]
    pub application: Application,
    pub offer_title: Option<String>,
    pub owner_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSession {
    pub application_id: ApplicationId,
    pub offer_id: OfferId,
    pub owner_id: ActorId,
    pub student_id: ActorId,
    pub topic: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub application_id: Option<ApplicationId>,
    pub offer_id: Option<OfferId>,
    pub owner_id: ActorId,
    pub student_id: ActorId,
    pub topic: String,
    /// `None` until the owner schedules the meeting.
    pub datetime: Option<NaiveDateTime>,
    pub meeting_link: Option<String>,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
}

/// Fully resolved values written by a schedule/reschedule call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSlot {
    pub datetime: Option<NaiveDateTime>,
    pub topic: String,
    pub meeting_link: Option<String>,
    pub status: SessionStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionListing {
    #[serde(flatten)]
    pub session: Session,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offer_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_batch: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
    pub recipient_id: ActorId,
    pub recipient_role: ActorRole,
    pub title: String,
    pub message: String,
    pub related_offer_id: Option<OfferId>,
    pub kind: NotificationKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub recipient_id: ActorId,
    pub recipient_role: ActorRole,
    pub title: String,
    pub message: String,
    pub related_offer_id: Option<OfferId>,
    pub kind: NotificationKind,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Offer whose stored applicant counter disagreed with its live application rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterDrift {
    pub offer_id: OfferId,
    pub recorded: u32,
    pub actual: u32,
}
