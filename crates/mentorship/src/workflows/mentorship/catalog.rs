use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use super::domain::{ActorId, ActorRole, CounterDrift, Offer, OfferDraft, OfferId, OfferListing};
use super::repository::MentorshipStore;
use super::service::MentorshipError;

/// Optional narrowing applied to offer listings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OfferFilter {
    pub owner_id: Option<ActorId>,
}

impl OfferFilter {
    pub fn owned_by(owner_id: ActorId) -> Self {
        Self {
            owner_id: Some(owner_id),
        }
    }
}

/// Mentorship offers posted by alumni. Mutations are restricted to the owner.
pub struct OfferCatalog<S> {
    store: Arc<S>,
}

impl<S> OfferCatalog<S>
where
    S: MentorshipStore,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub async fn list_offers(
        &self,
        filter: &OfferFilter,
    ) -> Result<Vec<OfferListing>, MentorshipError> {
        let offers = self.store.list_offers(filter.owner_id.as_ref()).await?;
        Ok(offers)
    }

    pub async fn get_offer(&self, id: OfferId) -> Result<OfferListing, MentorshipError> {
        self.store
            .fetch_offer(id)
            .await?
            .ok_or_else(|| MentorshipError::NotFound(format!("offer {id} not found")))
    }

    pub async fn create_offer(
        &self,
        owner_id: &ActorId,
        draft: OfferDraft,
    ) -> Result<Offer, MentorshipError> {
        let draft = validate_draft(owner_id, draft)?;

        if self.store.member(owner_id, ActorRole::Alumni).await?.is_none() {
            return Err(MentorshipError::Validation(format!(
                "{owner_id} is not a registered alumni"
            )));
        }

        let offer = self.store.insert_offer(owner_id, &draft, Utc::now()).await?;
        info!(offer_id = %offer.id, owner_id = %owner_id, "mentorship offer created");
        Ok(offer)
    }

    pub async fn edit_offer(
        &self,
        id: OfferId,
        owner_id: &ActorId,
        draft: OfferDraft,
    ) -> Result<Offer, MentorshipError> {
        let draft = validate_draft(owner_id, draft)?;

        match self.store.replace_offer(id, owner_id, &draft).await? {
            Some(offer) => {
                info!(offer_id = %id, owner_id = %owner_id, "mentorship offer updated");
                Ok(offer)
            }
            None => Err(not_owned(id)),
        }
    }

    pub async fn delete_offer(&self, id: OfferId, owner_id: &ActorId) -> Result<(), MentorshipError> {
        if owner_id.as_str().trim().is_empty() {
            return Err(MentorshipError::Validation("ownerId is required".to_string()));
        }

        if self.store.delete_offer(id, owner_id).await? {
            info!(offer_id = %id, owner_id = %owner_id, "mentorship offer deleted");
            Ok(())
        } else {
            Err(not_owned(id))
        }
    }

    /// Audit path for the running applicant counters.
    pub async fn reconcile_applicant_counts(&self) -> Result<Vec<CounterDrift>, MentorshipError> {
        let drifts = self.store.recount_applicants().await?;
        for drift in &drifts {
            warn!(
                offer_id = %drift.offer_id,
                recorded = drift.recorded,
                actual = drift.actual,
                "applicant counter drift corrected"
            );
        }
        Ok(drifts)
    }
}

fn not_owned(id: OfferId) -> MentorshipError {
    MentorshipError::Forbidden(format!("offer {id} is not owned by the caller"))
}

fn validate_draft(owner_id: &ActorId, draft: OfferDraft) -> Result<OfferDraft, MentorshipError> {
    let mut missing = Vec::new();
    if owner_id.as_str().trim().is_empty() {
        missing.push("ownerId");
    }
    if draft.title.trim().is_empty() {
        missing.push("title");
    }
    if draft.category.trim().is_empty() {
        missing.push("category");
    }
    if draft.description.trim().is_empty() {
        missing.push("description");
    }
    if !missing.is_empty() {
        return Err(MentorshipError::Validation(format!(
            "required fields missing: {}",
            missing.join(", ")
        )));
    }

    Ok(OfferDraft {
        schedule: draft.schedule.filter(|value| !value.trim().is_empty()),
        ..draft
    })
}
