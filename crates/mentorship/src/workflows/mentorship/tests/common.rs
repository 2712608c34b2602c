use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Method, Request};
use axum::response::Response;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::workflows::mentorship::{
    ActorId, ActorRole, ApplicantEntry, Application, ApplicationId, ApplicationRepository,
    ApplicationRequest, ApplicationStatus, ApplicationSummary, ApplyCommand, CounterDrift,
    MailError, MailSettings, Mailer, Member, MemberDirectory, MemoryStore, MentorshipService,
    MentorshipStore, NewNotification, NewSession, Notification, NotificationRepository, Offer,
    OfferDraft, OfferId, OfferListing, OfferRepository, OutboundEmail, RepositoryError, Session,
    SessionId, SessionListing, SessionRepository, SessionSlot,
};

pub(super) const OWNER: &str = "A1";
pub(super) const OTHER_ALUMNI: &str = "A2";
pub(super) const STUDENT: &str = "S1";
pub(super) const QUIET_STUDENT: &str = "S2";

pub(super) fn members() -> Vec<Member> {
    vec![
        Member {
            id: ActorId::new(OWNER),
            role: ActorRole::Alumni,
            name: "Nadia Rahman".to_string(),
            email: Some("nadia@alumni.example".to_string()),
            batch: Some("2015".to_string()),
        },
        Member {
            id: ActorId::new(OTHER_ALUMNI),
            role: ActorRole::Alumni,
            name: "Rafi Chowdhury".to_string(),
            email: Some("rafi@alumni.example".to_string()),
            batch: Some("2012".to_string()),
        },
        Member {
            id: ActorId::new(STUDENT),
            role: ActorRole::Student,
            name: "Sadia Islam".to_string(),
            email: Some("sadia@student.example".to_string()),
            batch: Some("BCS-24".to_string()),
        },
        Member {
            id: ActorId::new(QUIET_STUDENT),
            role: ActorRole::Student,
            name: "Tanvir Ahmed".to_string(),
            email: None,
            batch: Some("BBA-25".to_string()),
        },
    ]
}

pub(super) async fn seed<S: MentorshipStore>(store: &S) {
    for member in members() {
        store.upsert_member(member).await.expect("seed member");
    }
}

pub(super) fn mail_settings() -> MailSettings {
    MailSettings {
        from_address: "Mentorship <no-reply@mentorship.example>".to_string(),
        dashboard_url: "https://mentorship.example/dashboard".to_string(),
    }
}

pub(super) type TestService<S = MemoryStore, M = RecordingMailer> = MentorshipService<S, M>;

pub(super) async fn build_service() -> (
    Arc<TestService>,
    Arc<MemoryStore>,
    Arc<RecordingMailer>,
) {
    let store = Arc::new(MemoryStore::default());
    seed(store.as_ref()).await;
    let mailer = Arc::new(RecordingMailer::default());
    let service = Arc::new(MentorshipService::new(
        store.clone(),
        mailer.clone(),
        mail_settings(),
    ));
    (service, store, mailer)
}

pub(super) async fn build_faulty_service() -> (
    Arc<TestService<FaultyStore>>,
    Arc<FaultyStore>,
    Arc<RecordingMailer>,
) {
    let store = Arc::new(FaultyStore::default());
    seed(store.as_ref()).await;
    let mailer = Arc::new(RecordingMailer::default());
    let service = Arc::new(MentorshipService::new(
        store.clone(),
        mailer.clone(),
        mail_settings(),
    ));
    (service, store, mailer)
}

pub(super) fn draft(title: &str) -> OfferDraft {
    OfferDraft {
        title: title.to_string(),
        category: "Career".to_string(),
        description: format!("{title} with a senior alumni"),
        max_applicants: Some(2),
        schedule: Some("Weekends".to_string()),
        status: Default::default(),
    }
}

pub(super) async fn publish<S, M>(service: &TestService<S, M>, owner: &str, title: &str) -> Offer
where
    S: MentorshipStore,
    M: Mailer,
{
    service
        .catalog()
        .create_offer(&ActorId::new(owner), draft(title))
        .await
        .expect("offer created")
}

pub(super) fn apply_command(offer_id: OfferId, applicant: &str, role: &str) -> ApplyCommand {
    ApplyCommand {
        offer_id: Some(offer_id),
        applicant_id: Some(ActorId::new(applicant)),
        applicant_role: Some(role.to_string()),
        message: Some("interested".to_string()),
    }
}

pub(super) async fn submit<S, M>(
    service: &TestService<S, M>,
    offer_id: OfferId,
    applicant: &str,
    role: &str,
) -> Application
where
    S: MentorshipStore,
    M: Mailer,
{
    service
        .applications()
        .apply(apply_command(offer_id, applicant, role))
        .await
        .expect("application accepted")
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    serde_json::from_slice(&bytes).expect("valid json")
}

pub(super) fn request(
    method: Method,
    uri: &str,
    actor: Option<(&str, &str)>,
    body: Option<Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some((id, role)) = actor {
        builder = builder.header("x-actor-id", id).header("x-actor-role", role);
    }
    match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .expect("request"),
        None => builder.body(Body::empty()).expect("request"),
    }
}

#[derive(Default, Clone)]
pub(super) struct RecordingMailer {
    sent: Arc<Mutex<Vec<OutboundEmail>>>,
}

impl RecordingMailer {
    pub(super) fn sent(&self) -> Vec<OutboundEmail> {
        self.sent.lock().expect("mailer mutex poisoned").clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: OutboundEmail) -> Result<(), MailError> {
        self.sent.lock().expect("mailer mutex poisoned").push(email);
        Ok(())
    }
}

#[derive(Default, Clone)]
pub(super) struct FailingMailer;

#[async_trait]
impl Mailer for FailingMailer {
    async fn send(&self, _email: OutboundEmail) -> Result<(), MailError> {
        Err(MailError::Transport("smtp relay refused connection".to_string()))
    }
}

/// Memory store with switchable failures on selected operations.
#[derive(Default)]
pub(super) struct FaultyStore {
    pub(super) inner: MemoryStore,
    fail_sessions: AtomicBool,
    fail_notifications: AtomicBool,
    fail_offer_reads: AtomicBool,
}

impl FaultyStore {
    pub(super) fn fail_sessions(&self) {
        self.fail_sessions.store(true, Ordering::SeqCst);
    }

    pub(super) fn fail_notifications(&self) {
        self.fail_notifications.store(true, Ordering::SeqCst);
    }

    pub(super) fn fail_offer_reads(&self) {
        self.fail_offer_reads.store(true, Ordering::SeqCst);
    }

    fn check(flag: &AtomicBool, what: &str) -> Result<(), RepositoryError> {
        if flag.load(Ordering::SeqCst) {
            Err(RepositoryError::Unavailable(format!("{what} offline")))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl MemberDirectory for FaultyStore {
    async fn upsert_member(&self, member: Member) -> Result<(), RepositoryError> {
        self.inner.upsert_member(member).await
    }

    async fn member(
        &self,
        id: &ActorId,
        role: ActorRole,
    ) -> Result<Option<Member>, RepositoryError> {
        self.inner.member(id, role).await
    }
}

#[async_trait]
impl OfferRepository for FaultyStore {
    async fn insert_offer(
        &self,
        owner_id: &ActorId,
        draft: &OfferDraft,
        created_at: DateTime<Utc>,
    ) -> Result<Offer, RepositoryError> {
        self.inner.insert_offer(owner_id, draft, created_at).await
    }

    async fn fetch_offer(&self, id: OfferId) -> Result<Option<OfferListing>, RepositoryError> {
        Self::check(&self.fail_offer_reads, "offer table")?;
        self.inner.fetch_offer(id).await
    }

    async fn list_offers(
        &self,
        owner_id: Option<&ActorId>,
    ) -> Result<Vec<OfferListing>, RepositoryError> {
        Self::check(&self.fail_offer_reads, "offer table")?;
        self.inner.list_offers(owner_id).await
    }

    async fn replace_offer(
        &self,
        id: OfferId,
        owner_id: &ActorId,
        draft: &OfferDraft,
    ) -> Result<Option<Offer>, RepositoryError> {
        self.inner.replace_offer(id, owner_id, draft).await
    }

    async fn delete_offer(
        &self,
        id: OfferId,
        owner_id: &ActorId,
    ) -> Result<bool, RepositoryError> {
        self.inner.delete_offer(id, owner_id).await
    }

    async fn recount_applicants(&self) -> Result<Vec<CounterDrift>, RepositoryError> {
        self.inner.recount_applicants().await
    }
}

#[async_trait]
impl ApplicationRepository for FaultyStore {
    async fn insert_application(
        &self,
        request: &ApplicationRequest,
        applied_at: DateTime<Utc>,
    ) -> Result<Application, RepositoryError> {
        self.inner.insert_application(request, applied_at).await
    }

    async fn fetch_application(
        &self,
        id: ApplicationId,
    ) -> Result<Option<Application>, RepositoryError> {
        self.inner.fetch_application(id).await
    }

    async fn applications_for_offer(
        &self,
        offer_id: OfferId,
    ) -> Result<Vec<ApplicantEntry>, RepositoryError> {
        self.inner.applications_for_offer(offer_id).await
    }

    async fn applications_by_applicant(
        &self,
        applicant_id: &ActorId,
    ) -> Result<Vec<ApplicationSummary>, RepositoryError> {
        self.inner.applications_by_applicant(applicant_id).await
    }

    async fn resolve_application(
        &self,
        id: ApplicationId,
        status: ApplicationStatus,
    ) -> Result<bool, RepositoryError> {
        self.inner.resolve_application(id, status).await
    }
}

#[async_trait]
impl SessionRepository for FaultyStore {
    async fn open_session(
        &self,
        session: &NewSession,
        created_at: DateTime<Utc>,
    ) -> Result<Session, RepositoryError> {
        Self::check(&self.fail_sessions, "session table")?;
        self.inner.open_session(session, created_at).await
    }

    async fn fetch_session(&self, id: SessionId) -> Result<Option<Session>, RepositoryError> {
        self.inner.fetch_session(id).await
    }

    async fn sessions_for_owner(
        &self,
        owner_id: &ActorId,
    ) -> Result<Vec<SessionListing>, RepositoryError> {
        self.inner.sessions_for_owner(owner_id).await
    }

    async fn sessions_for_student(
        &self,
        student_id: &ActorId,
    ) -> Result<Vec<SessionListing>, RepositoryError> {
        self.inner.sessions_for_student(student_id).await
    }

    async fn reschedule_session(
        &self,
        id: SessionId,
        owner_id: &ActorId,
        slot: &SessionSlot,
    ) -> Result<Option<Session>, RepositoryError> {
        self.inner.reschedule_session(id, owner_id, slot).await
    }
}

#[async_trait]
impl NotificationRepository for FaultyStore {
    async fn insert_notification(
        &self,
        notification: &NewNotification,
        created_at: DateTime<Utc>,
    ) -> Result<Notification, RepositoryError> {
        Self::check(&self.fail_notifications, "notification table")?;
        self.inner.insert_notification(notification, created_at).await
    }

    async fn notifications_for(
        &self,
        recipient_id: &ActorId,
        recipient_role: ActorRole,
    ) -> Result<Vec<Notification>, RepositoryError> {
        self.inner.notifications_for(recipient_id, recipient_role).await
    }

    async fn mark_all_read(
        &self,
        recipient_id: &ActorId,
        recipient_role: ActorRole,
    ) -> Result<u64, RepositoryError> {
        self.inner.mark_all_read(recipient_id, recipient_role).await
    }
}
