use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use super::domain::{
    ActorId, ActorRole, ApplicantEntry, Application, ApplicationId, ApplicationRequest,
    ApplicationStatus, ApplicationSummary, OfferId,
};
use super::pipeline::{ApprovalPipeline, ApprovalReport};
use super::repository::{Mailer, MentorshipStore, RepositoryError};
use super::service::MentorshipError;

/// Raw apply input as received from a caller, validated by [`ApplicationLifecycle::apply`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyCommand {
    pub offer_id: Option<OfferId>,
    pub applicant_id: Option<ActorId>,
    pub applicant_role: Option<String>,
    pub message: Option<String>,
}

/// Result of a successful status change.
#[derive(Debug)]
pub struct TransitionOutcome {
    pub application: Application,
    /// Present only for approvals.
    pub side_effects: Option<ApprovalReport>,
}

/// Records applications to offers and moves them out of `pending` exactly once.
pub struct ApplicationLifecycle<S, M> {
    store: Arc<S>,
    pipeline: ApprovalPipeline<S, M>,
}

impl<S, M> ApplicationLifecycle<S, M>
where
    S: MentorshipStore,
    M: Mailer,
{
    pub fn new(store: Arc<S>, pipeline: ApprovalPipeline<S, M>) -> Self {
        Self { store, pipeline }
    }

    pub async fn apply(&self, command: ApplyCommand) -> Result<Application, MentorshipError> {
        let request = validate_apply(command)?;

        let offer = self
            .store
            .fetch_offer(request.offer_id)
            .await?
            .ok_or_else(|| {
                MentorshipError::NotFound(format!("offer {} not found", request.offer_id))
            })?
            .offer;

        if request.applicant_role == ActorRole::Alumni && offer.owner_id == request.applicant_id {
            return Err(MentorshipError::Forbidden(
                "cannot apply to your own offer".to_string(),
            ));
        }

        let application = match self.store.insert_application(&request, Utc::now()).await {
            Ok(application) => application,
            Err(RepositoryError::Conflict) => return Err(MentorshipError::DuplicateApplication),
            Err(err) => return Err(err.into()),
        };

        info!(
            application_id = %application.id,
            offer_id = %application.offer_id,
            applicant_id = %application.applicant_id,
            role = %application.applicant_role,
            "mentorship application received"
        );
        Ok(application)
    }

    pub async fn list_applications_for_offer(
        &self,
        offer_id: OfferId,
        requestor_id: &ActorId,
    ) -> Result<Vec<ApplicantEntry>, MentorshipError> {
        let owned = self
            .store
            .fetch_offer(offer_id)
            .await?
            .is_some_and(|listing| &listing.offer.owner_id == requestor_id);

        if !owned {
            return Err(MentorshipError::Forbidden(
                "offer not found or unauthorized".to_string(),
            ));
        }

        Ok(self.store.applications_for_offer(offer_id).await?)
    }

    pub async fn list_applications_for_applicant(
        &self,
        applicant_id: &ActorId,
    ) -> Result<Vec<ApplicationSummary>, MentorshipError> {
        Ok(self.store.applications_by_applicant(applicant_id).await?)
    }

    /// One-shot `pending -> approved | rejected` transition.
    ///
    /// The conditional status write is the authoritative step: once it lands the call succeeds,
    /// whatever happens to the approval side effects that follow.
    pub async fn set_application_status(
        &self,
        application_id: ApplicationId,
        requestor_id: &ActorId,
        new_status: ApplicationStatus,
    ) -> Result<TransitionOutcome, MentorshipError> {
        if new_status == ApplicationStatus::Pending {
            return Err(MentorshipError::Validation(
                "status must be approved or rejected".to_string(),
            ));
        }

        let mut application = self
            .store
            .fetch_application(application_id)
            .await?
            .ok_or_else(|| {
                MentorshipError::NotFound(format!("application {application_id} not found"))
            })?;

        let offer = match self.store.fetch_offer(application.offer_id).await? {
            Some(listing) if &listing.offer.owner_id == requestor_id => listing.offer,
            _ => return Err(MentorshipError::Forbidden("not authorized".to_string())),
        };

        if application.status.is_terminal() {
            return Err(already_resolved(application.status));
        }

        if !self
            .store
            .resolve_application(application_id, new_status)
            .await?
        {
            // Lost a race with a concurrent transition.
            let current = self
                .store
                .fetch_application(application_id)
                .await?
                .map(|current| current.status)
                .unwrap_or(new_status);
            return Err(already_resolved(current));
        }

        application.status = new_status;
        info!(
            %application_id,
            offer_id = %offer.id,
            status = %new_status,
            "mentorship application resolved"
        );

        let side_effects = match new_status {
            ApplicationStatus::Approved => Some(self.pipeline.run(&application, &offer).await),
            ApplicationStatus::Rejected | ApplicationStatus::Pending => None,
        };

        Ok(TransitionOutcome {
            application,
            side_effects,
        })
    }
}

fn already_resolved(status: ApplicationStatus) -> MentorshipError {
    MentorshipError::Validation(format!("application is already {status}"))
}

fn validate_apply(command: ApplyCommand) -> Result<ApplicationRequest, MentorshipError> {
    let ApplyCommand {
        offer_id,
        applicant_id,
        applicant_role,
        message,
    } = command;

    let applicant_id = applicant_id.filter(|id| !id.as_str().trim().is_empty());
    let applicant_role = applicant_role.filter(|role| !role.trim().is_empty());
    let message = message.filter(|message| !message.trim().is_empty());

    let (Some(offer_id), Some(applicant_id), Some(role), Some(message)) =
        (offer_id, applicant_id, applicant_role, message)
    else {
        return Err(MentorshipError::Validation(
            "missing required data".to_string(),
        ));
    };

    let applicant_role = role
        .parse::<ActorRole>()
        .map_err(|_| MentorshipError::Validation("invalid user type".to_string()))?;

    Ok(ApplicationRequest {
        offer_id,
        applicant_id,
        applicant_role,
        message,
    })
}
