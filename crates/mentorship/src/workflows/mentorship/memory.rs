use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::domain::{
    ActorId, ActorRole, ApplicantEntry, Application, ApplicationId, ApplicationRequest,
    ApplicationStatus, ApplicationSummary, CounterDrift, Member, NewNotification, NewSession,
    Notification, NotificationId, Offer, OfferDraft, OfferId, OfferListing, Session, SessionId,
    SessionListing, SessionSlot, SessionStatus,
};
use super::repository::{
    ApplicationRepository, MemberDirectory, NotificationRepository, OfferRepository,
    RepositoryError, SessionRepository,
};

/// Process-local store. Every operation runs under one lock, which gives the same
/// all-or-nothing and check-and-set guarantees the SQL store gets from transactions.
#[derive(Default, Clone)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

#[derive(Default)]
struct MemoryState {
    members: HashMap<(ActorId, ActorRole), Member>,
    offers: BTreeMap<OfferId, Offer>,
    applications: BTreeMap<ApplicationId, Application>,
    sessions: BTreeMap<SessionId, Session>,
    notifications: BTreeMap<NotificationId, Notification>,
    last_offer: i64,
    last_application: i64,
    last_session: i64,
    last_notification: i64,
}

impl MemoryStore {
    fn state(&self) -> Result<MutexGuard<'_, MemoryState>, RepositoryError> {
        self.state
            .lock()
            .map_err(|_| RepositoryError::Unavailable("memory store lock poisoned".to_string()))
    }

    /// Overwrites the stored counter for an offer, bypassing the increment path.
    pub fn force_applicant_count(&self, id: OfferId, count: u32) -> Result<(), RepositoryError> {
        let mut state = self.state()?;
        let offer = state.offers.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        offer.applicant_count = count;
        Ok(())
    }
}

impl MemoryState {
    fn member_name(&self, id: &ActorId, role: ActorRole) -> Option<String> {
        self.members
            .get(&(id.clone(), role))
            .map(|member| member.name.clone())
    }

    /// Session rows do not record the applicant's role; prefer the student directory.
    fn attendee(&self, id: &ActorId) -> Option<&Member> {
        self.members
            .get(&(id.clone(), ActorRole::Student))
            .or_else(|| self.members.get(&(id.clone(), ActorRole::Alumni)))
    }

    fn listing(&self, offer: &Offer) -> OfferListing {
        OfferListing::new(
            offer.clone(),
            self.member_name(&offer.owner_id, ActorRole::Alumni),
        )
    }

    fn session_listing(&self, session: &Session, for_owner: bool) -> SessionListing {
        let offer = session
            .offer_id
            .and_then(|offer_id| self.offers.get(&offer_id));
        let offer_title = offer.map(|offer| offer.title.clone());

        if for_owner {
            let student = self.attendee(&session.student_id);
            SessionListing {
                session: session.clone(),
                offer_title,
                owner_name: None,
                student_name: student.map(|member| member.name.clone()),
                student_batch: student.and_then(|member| member.batch.clone()),
            }
        } else {
            SessionListing {
                session: session.clone(),
                offer_title,
                owner_name: self.member_name(&session.owner_id, ActorRole::Alumni),
                student_name: None,
                student_batch: None,
            }
        }
    }
}

fn next_id(last: &mut i64) -> i64 {
    *last += 1;
    *last
}

#[async_trait]
impl MemberDirectory for MemoryStore {
    async fn upsert_member(&self, member: Member) -> Result<(), RepositoryError> {
        let mut state = self.state()?;
        state
            .members
            .insert((member.id.clone(), member.role), member);
        Ok(())
    }

    async fn member(
        &self,
        id: &ActorId,
        role: ActorRole,
    ) -> Result<Option<Member>, RepositoryError> {
        let state = self.state()?;
        Ok(state.members.get(&(id.clone(), role)).cloned())
    }
}

#[async_trait]
impl OfferRepository for MemoryStore {
    async fn insert_offer(
        &self,
        owner_id: &ActorId,
        draft: &OfferDraft,
        created_at: DateTime<Utc>,
    ) -> Result<Offer, RepositoryError> {
        let mut state = self.state()?;
        let id = OfferId(next_id(&mut state.last_offer));
        let offer = Offer {
            id,
            owner_id: owner_id.clone(),
            title: draft.title.clone(),
            category: draft.category.clone(),
            description: draft.description.clone(),
            max_applicants: draft.max_applicants,
            schedule: draft.schedule.clone(),
            status: draft.status,
            applicant_count: 0,
            created_at,
        };
        state.offers.insert(id, offer.clone());
        Ok(offer)
    }

    async fn fetch_offer(&self, id: OfferId) -> Result<Option<OfferListing>, RepositoryError> {
        let state = self.state()?;
        Ok(state.offers.get(&id).map(|offer| state.listing(offer)))
    }

    async fn list_offers(
        &self,
        owner_id: Option<&ActorId>,
    ) -> Result<Vec<OfferListing>, RepositoryError> {
        let state = self.state()?;
        let mut offers: Vec<&Offer> = state
            .offers
            .values()
            .filter(|offer| owner_id.map_or(true, |owner| &offer.owner_id == owner))
            .collect();
        offers.sort_by_key(|offer| Reverse((offer.created_at, offer.id)));
        Ok(offers.into_iter().map(|offer| state.listing(offer)).collect())
    }

    async fn replace_offer(
        &self,
        id: OfferId,
        owner_id: &ActorId,
        draft: &OfferDraft,
    ) -> Result<Option<Offer>, RepositoryError> {
        let mut state = self.state()?;
        let Some(offer) = state
            .offers
            .get_mut(&id)
            .filter(|offer| &offer.owner_id == owner_id)
        else {
            return Ok(None);
        };

        offer.title = draft.title.clone();
        offer.category = draft.category.clone();
        offer.description = draft.description.clone();
        offer.max_applicants = draft.max_applicants;
        offer.schedule = draft.schedule.clone();
        offer.status = draft.status;
        Ok(Some(offer.clone()))
    }

    async fn delete_offer(
        &self,
        id: OfferId,
        owner_id: &ActorId,
    ) -> Result<bool, RepositoryError> {
        let mut state = self.state()?;
        let owned = state
            .offers
            .get(&id)
            .is_some_and(|offer| &offer.owner_id == owner_id);
        if owned {
            state.offers.remove(&id);
        }
        Ok(owned)
    }

    async fn recount_applicants(&self) -> Result<Vec<CounterDrift>, RepositoryError> {
        let mut state = self.state()?;
        let mut live: HashMap<OfferId, u32> = HashMap::new();
        for application in state.applications.values() {
            *live.entry(application.offer_id).or_default() += 1;
        }

        let mut drifts = Vec::new();
        for offer in state.offers.values_mut() {
            let actual = live.get(&offer.id).copied().unwrap_or(0);
            if offer.applicant_count != actual {
                drifts.push(CounterDrift {
                    offer_id: offer.id,
                    recorded: offer.applicant_count,
                    actual,
                });
                offer.applicant_count = actual;
            }
        }
        Ok(drifts)
    }
}

#[async_trait]
impl ApplicationRepository for MemoryStore {
    async fn insert_application(
        &self,
        request: &ApplicationRequest,
        applied_at: DateTime<Utc>,
    ) -> Result<Application, RepositoryError> {
        let mut state = self.state()?;
        let duplicate = state.applications.values().any(|existing| {
            existing.offer_id == request.offer_id && existing.applicant_id == request.applicant_id
        });
        if duplicate {
            return Err(RepositoryError::Conflict);
        }

        let offer = state
            .offers
            .get_mut(&request.offer_id)
            .ok_or(RepositoryError::NotFound)?;
        offer.applicant_count = offer.applicant_count.saturating_add(1);

        let id = ApplicationId(next_id(&mut state.last_application));
        let application = Application {
            id,
            offer_id: request.offer_id,
            applicant_id: request.applicant_id.clone(),
            applicant_role: request.applicant_role,
            message: request.message.clone(),
            status: ApplicationStatus::Pending,
            applied_at,
        };
        state.applications.insert(id, application.clone());
        Ok(application)
    }

    async fn fetch_application(
        &self,
        id: ApplicationId,
    ) -> Result<Option<Application>, RepositoryError> {
        let state = self.state()?;
        Ok(state.applications.get(&id).cloned())
    }

    async fn applications_for_offer(
        &self,
        offer_id: OfferId,
    ) -> Result<Vec<ApplicantEntry>, RepositoryError> {
        let state = self.state()?;
        let mut applications: Vec<&Application> = state
            .applications
            .values()
            .filter(|application| application.offer_id == offer_id)
            .collect();
        applications.sort_by_key(|application| Reverse((application.applied_at, application.id)));

        Ok(applications
            .into_iter()
            .map(|application| {
                let applicant = state
                    .members
                    .get(&(application.applicant_id.clone(), application.applicant_role));
                ApplicantEntry {
                    application: application.clone(),
                    applicant_name: applicant.map(|member| member.name.clone()),
                    applicant_email: applicant.and_then(|member| member.email.clone()),
                    applicant_batch: applicant.and_then(|member| member.batch.clone()),
                }
            })
            .collect())
    }

    async fn applications_by_applicant(
        &self,
        applicant_id: &ActorId,
    ) -> Result<Vec<ApplicationSummary>, RepositoryError> {
        let state = self.state()?;
        let mut applications: Vec<&Application> = state
            .applications
            .values()
            .filter(|application| &application.applicant_id == applicant_id)
            .collect();
        applications.sort_by_key(|application| Reverse((application.applied_at, application.id)));

        Ok(applications
            .into_iter()
            .map(|application| {
                let offer = state.offers.get(&application.offer_id);
                ApplicationSummary {
                    application: application.clone(),
                    offer_title: offer.map(|offer| offer.title.clone()),
                    owner_name: offer.and_then(|offer| {
                        state.member_name(&offer.owner_id, ActorRole::Alumni)
                    }),
                }
            })
            .collect())
    }

    async fn resolve_application(
        &self,
        id: ApplicationId,
        status: ApplicationStatus,
    ) -> Result<bool, RepositoryError> {
        let mut state = self.state()?;
        match state.applications.get_mut(&id) {
            Some(application) if application.status == ApplicationStatus::Pending => {
                application.status = status;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl SessionRepository for MemoryStore {
    async fn open_session(
        &self,
        session: &NewSession,
        created_at: DateTime<Utc>,
    ) -> Result<Session, RepositoryError> {
        let mut state = self.state()?;
        if let Some(existing) = state
            .sessions
            .values()
            .find(|existing| existing.application_id == Some(session.application_id))
        {
            return Ok(existing.clone());
        }

        let id = SessionId(next_id(&mut state.last_session));
        let created = Session {
            id,
            application_id: Some(session.application_id),
            offer_id: Some(session.offer_id),
            owner_id: session.owner_id.clone(),
            student_id: session.student_id.clone(),
            topic: session.topic.clone(),
            datetime: None,
            meeting_link: None,
            status: SessionStatus::Scheduled,
            created_at,
        };
        state.sessions.insert(id, created.clone());
        Ok(created)
    }

    async fn fetch_session(&self, id: SessionId) -> Result<Option<Session>, RepositoryError> {
        let state = self.state()?;
        Ok(state.sessions.get(&id).cloned())
    }

    async fn sessions_for_owner(
        &self,
        owner_id: &ActorId,
    ) -> Result<Vec<SessionListing>, RepositoryError> {
        let state = self.state()?;
        let mut sessions: Vec<&Session> = state
            .sessions
            .values()
            .filter(|session| &session.owner_id == owner_id)
            .collect();
        sessions.sort_by_key(|session| Reverse((session.created_at, session.id)));
        Ok(sessions
            .into_iter()
            .map(|session| state.session_listing(session, true))
            .collect())
    }

    async fn sessions_for_student(
        &self,
        student_id: &ActorId,
    ) -> Result<Vec<SessionListing>, RepositoryError> {
        let state = self.state()?;
        let mut sessions: Vec<&Session> = state
            .sessions
            .values()
            .filter(|session| &session.student_id == student_id)
            .collect();
        // Scheduled meetings first (latest on top), unscheduled ones after.
        sessions.sort_by_key(|session| {
            Reverse((
                session.datetime.is_some(),
                session.datetime,
                session.created_at,
                session.id,
            ))
        });
        Ok(sessions
            .into_iter()
            .map(|session| state.session_listing(session, false))
            .collect())
    }

    async fn reschedule_session(
        &self,
        id: SessionId,
        owner_id: &ActorId,
        slot: &SessionSlot,
    ) -> Result<Option<Session>, RepositoryError> {
        let mut state = self.state()?;
        let Some(session) = state
            .sessions
            .get_mut(&id)
            .filter(|session| &session.owner_id == owner_id)
        else {
            return Ok(None);
        };

        session.datetime = slot.datetime;
        session.topic = slot.topic.clone();
        session.meeting_link = slot.meeting_link.clone();
        session.status = slot.status;
        Ok(Some(session.clone()))
    }
}

#[async_trait]
impl NotificationRepository for MemoryStore {
    async fn insert_notification(
        &self,
        notification: &NewNotification,
        created_at: DateTime<Utc>,
    ) -> Result<Notification, RepositoryError> {
        let mut state = self.state()?;
        let id = NotificationId(next_id(&mut state.last_notification));
        let stored = Notification {
            id,
            recipient_id: notification.recipient_id.clone(),
            recipient_role: notification.recipient_role,
            title: notification.title.clone(),
            message: notification.message.clone(),
            related_offer_id: notification.related_offer_id,
            kind: notification.kind,
            is_read: false,
            created_at,
        };
        state.notifications.insert(id, stored.clone());
        Ok(stored)
    }

    async fn notifications_for(
        &self,
        recipient_id: &ActorId,
        recipient_role: ActorRole,
    ) -> Result<Vec<Notification>, RepositoryError> {
        let state = self.state()?;
        let mut notifications: Vec<Notification> = state
            .notifications
            .values()
            .filter(|notification| {
                &notification.recipient_id == recipient_id
                    && notification.recipient_role == recipient_role
            })
            .cloned()
            .collect();
        notifications.sort_by_key(|notification| Reverse((notification.created_at, notification.id)));
        Ok(notifications)
    }

    async fn mark_all_read(
        &self,
        recipient_id: &ActorId,
        recipient_role: ActorRole,
    ) -> Result<u64, RepositoryError> {
        let mut state = self.state()?;
        let mut updated = 0;
        for notification in state.notifications.values_mut() {
            if &notification.recipient_id == recipient_id
                && notification.recipient_role == recipient_role
                && !notification.is_read
            {
                notification.is_read = true;
                updated += 1;
            }
        }
        Ok(updated)
    }
}
