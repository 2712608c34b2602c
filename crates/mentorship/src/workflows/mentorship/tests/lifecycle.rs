use super::common::*;
use crate::workflows::mentorship::{
    ActorId, ActorRole, ApplicationId, ApplicationStatus, ApplyCommand, MentorshipError,
    NotificationRepository, OfferDraft, OfferId, SessionRepository,
};

#[tokio::test]
async fn apply_records_a_pending_application_and_bumps_the_counter() {
    let (service, _store, _mailer) = build_service().await;
    let offer = publish(service.as_ref(), OWNER, "Resume clinic").await;

    let application = submit(service.as_ref(), offer.id, STUDENT, "student").await;
    assert_eq!(application.status, ApplicationStatus::Pending);
    assert_eq!(application.applicant_role, ActorRole::Student);
    assert_eq!(application.message, "interested");

    let listing = service.catalog().get_offer(offer.id).await.expect("present");
    assert_eq!(listing.offer.applicant_count, 1);
}

#[tokio::test]
async fn second_application_by_the_same_applicant_is_a_duplicate() {
    let (service, _store, _mailer) = build_service().await;
    let offer = publish(service.as_ref(), OWNER, "Resume clinic").await;
    submit(service.as_ref(), offer.id, STUDENT, "student").await;

    let result = service
        .applications()
        .apply(apply_command(offer.id, STUDENT, "student"))
        .await;
    match result {
        Err(MentorshipError::DuplicateApplication) => {}
        other => panic!("expected duplicate application, got {other:?}"),
    }

    let listing = service.catalog().get_offer(offer.id).await.expect("present");
    assert_eq!(listing.offer.applicant_count, 1);
}

#[tokio::test]
async fn alumni_may_apply_to_other_offers_but_not_their_own() {
    let (service, _store, _mailer) = build_service().await;
    let offer = publish(service.as_ref(), OWNER, "Resume clinic").await;

    let own = service
        .applications()
        .apply(apply_command(offer.id, OWNER, "alumni"))
        .await;
    match own {
        Err(MentorshipError::Forbidden(message)) => {
            assert_eq!(message, "cannot apply to your own offer")
        }
        other => panic!("expected forbidden, got {other:?}"),
    }

    let peer = submit(service.as_ref(), offer.id, OTHER_ALUMNI, "alumni").await;
    assert_eq!(peer.applicant_role, ActorRole::Alumni);
}

#[tokio::test]
async fn apply_validates_required_data_and_role() {
    let (service, _store, _mailer) = build_service().await;
    let offer = publish(service.as_ref(), OWNER, "Resume clinic").await;

    let blank_message = ApplyCommand {
        message: Some("   ".to_string()),
        ..apply_command(offer.id, STUDENT, "student")
    };
    match service.applications().apply(blank_message).await {
        Err(MentorshipError::Validation(message)) => assert_eq!(message, "missing required data"),
        other => panic!("expected validation error, got {other:?}"),
    }

    let missing_offer = ApplyCommand {
        offer_id: None,
        ..apply_command(offer.id, STUDENT, "student")
    };
    assert!(matches!(
        service.applications().apply(missing_offer).await,
        Err(MentorshipError::Validation(_))
    ));

    match service
        .applications()
        .apply(apply_command(offer.id, STUDENT, "faculty"))
        .await
    {
        Err(MentorshipError::Validation(message)) => assert_eq!(message, "invalid user type"),
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[tokio::test]
async fn apply_to_a_missing_offer_is_not_found() {
    let (service, _store, _mailer) = build_service().await;

    let result = service
        .applications()
        .apply(apply_command(OfferId(99), STUDENT, "student"))
        .await;
    assert!(matches!(result, Err(MentorshipError::NotFound(_))));
}

#[tokio::test]
async fn capacity_is_advisory() {
    let (service, _store, _mailer) = build_service().await;
    let offer = service
        .catalog()
        .create_offer(
            &ActorId::new(OWNER),
            OfferDraft {
                max_applicants: Some(1),
                ..draft("Resume clinic")
            },
        )
        .await
        .expect("offer created");

    submit(service.as_ref(), offer.id, STUDENT, "student").await;
    submit(service.as_ref(), offer.id, QUIET_STUDENT, "student").await;

    let listing = service.catalog().get_offer(offer.id).await.expect("present");
    assert_eq!(listing.offer.applicant_count, 2);
    assert!(listing.offer.is_full());
}

#[tokio::test]
async fn only_the_owner_lists_applications_for_an_offer() {
    let (service, _store, _mailer) = build_service().await;
    let offer = publish(service.as_ref(), OWNER, "Resume clinic").await;
    submit(service.as_ref(), offer.id, STUDENT, "student").await;

    let denied = service
        .applications()
        .list_applications_for_offer(offer.id, &ActorId::new(OTHER_ALUMNI))
        .await;
    match denied {
        Err(MentorshipError::Forbidden(message)) => {
            assert_eq!(message, "offer not found or unauthorized")
        }
        other => panic!("expected forbidden, got {other:?}"),
    }

    let entries = service
        .applications()
        .list_applications_for_offer(offer.id, &ActorId::new(OWNER))
        .await
        .expect("owner can list");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].applicant_name.as_deref(), Some("Sadia Islam"));
    assert_eq!(
        entries[0].applicant_email.as_deref(),
        Some("sadia@student.example")
    );
    assert_eq!(entries[0].applicant_batch.as_deref(), Some("BCS-24"));
}

#[tokio::test]
async fn applicants_see_their_applications_with_offer_context() {
    let (service, _store, _mailer) = build_service().await;
    let older = publish(service.as_ref(), OWNER, "Resume clinic").await;
    let newer = publish(service.as_ref(), OTHER_ALUMNI, "Research guidance").await;
    submit(service.as_ref(), older.id, STUDENT, "student").await;
    submit(service.as_ref(), newer.id, STUDENT, "student").await;

    let summaries = service
        .applications()
        .list_applications_for_applicant(&ActorId::new(STUDENT))
        .await
        .expect("list succeeds");

    assert_eq!(summaries.len(), 2);
    assert_eq!(summaries[0].application.offer_id, newer.id);
    assert_eq!(summaries[0].offer_title.as_deref(), Some("Research guidance"));
    assert_eq!(summaries[0].owner_name.as_deref(), Some("Rafi Chowdhury"));
    assert_eq!(summaries[1].owner_name.as_deref(), Some("Nadia Rahman"));
}

#[tokio::test]
async fn status_changes_are_reserved_for_the_offer_owner() {
    let (service, store, _mailer) = build_service().await;
    let offer = publish(service.as_ref(), OWNER, "Resume clinic").await;
    let application = submit(service.as_ref(), offer.id, STUDENT, "student").await;

    let result = service
        .applications()
        .set_application_status(
            application.id,
            &ActorId::new(OTHER_ALUMNI),
            ApplicationStatus::Approved,
        )
        .await;
    assert!(matches!(result, Err(MentorshipError::Forbidden(_))));

    let sessions = store
        .sessions_for_student(&ActorId::new(STUDENT))
        .await
        .expect("sessions");
    assert!(sessions.is_empty());
    let summaries = service
        .applications()
        .list_applications_for_applicant(&ActorId::new(STUDENT))
        .await
        .expect("list succeeds");
    assert_eq!(summaries[0].application.status, ApplicationStatus::Pending);
}

#[tokio::test]
async fn status_change_rejects_pending_and_unknown_applications() {
    let (service, _store, _mailer) = build_service().await;
    let offer = publish(service.as_ref(), OWNER, "Resume clinic").await;
    let application = submit(service.as_ref(), offer.id, STUDENT, "student").await;

    let back_to_pending = service
        .applications()
        .set_application_status(application.id, &ActorId::new(OWNER), ApplicationStatus::Pending)
        .await;
    assert!(matches!(back_to_pending, Err(MentorshipError::Validation(_))));

    let missing = service
        .applications()
        .set_application_status(ApplicationId(404), &ActorId::new(OWNER), ApplicationStatus::Approved)
        .await;
    assert!(matches!(missing, Err(MentorshipError::NotFound(_))));
}

#[tokio::test]
async fn a_resolved_application_never_transitions_again() {
    let (service, store, _mailer) = build_service().await;
    let offer = publish(service.as_ref(), OWNER, "Resume clinic").await;
    let application = submit(service.as_ref(), offer.id, STUDENT, "student").await;
    let owner = ActorId::new(OWNER);

    service
        .applications()
        .set_application_status(application.id, &owner, ApplicationStatus::Approved)
        .await
        .expect("first approval");

    for status in [ApplicationStatus::Approved, ApplicationStatus::Rejected] {
        match service
            .applications()
            .set_application_status(application.id, &owner, status)
            .await
        {
            Err(MentorshipError::Validation(message)) => {
                assert_eq!(message, "application is already approved")
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    let sessions = store
        .sessions_for_owner(&owner)
        .await
        .expect("sessions");
    assert_eq!(sessions.len(), 1);
    let notifications = store
        .notifications_for(&ActorId::new(STUDENT), ActorRole::Student)
        .await
        .expect("notifications");
    assert_eq!(notifications.len(), 1);
}

#[tokio::test]
async fn rejection_has_no_side_effects() {
    let (service, store, mailer) = build_service().await;
    let offer = publish(service.as_ref(), OWNER, "Resume clinic").await;
    let application = submit(service.as_ref(), offer.id, STUDENT, "student").await;

    let outcome = service
        .applications()
        .set_application_status(application.id, &ActorId::new(OWNER), ApplicationStatus::Rejected)
        .await
        .expect("rejection succeeds");
    assert_eq!(outcome.application.status, ApplicationStatus::Rejected);
    assert!(outcome.side_effects.is_none());

    assert!(store
        .sessions_for_student(&ActorId::new(STUDENT))
        .await
        .expect("sessions")
        .is_empty());
    assert!(store
        .notifications_for(&ActorId::new(STUDENT), ActorRole::Student)
        .await
        .expect("notifications")
        .is_empty());
    assert!(mailer.sent().is_empty());

    let later = service
        .applications()
        .set_application_status(application.id, &ActorId::new(OWNER), ApplicationStatus::Approved)
        .await;
    assert!(matches!(later, Err(MentorshipError::Validation(_))));
}

#[tokio::test]
async fn concurrent_approvals_transition_once() {
    let (service, store, _mailer) = build_service().await;
    let offer = publish(service.as_ref(), OWNER, "Resume clinic").await;
    let application = submit(service.as_ref(), offer.id, STUDENT, "student").await;
    let owner = ActorId::new(OWNER);

    let (first, second) = tokio::join!(
        service
            .applications()
            .set_application_status(application.id, &owner, ApplicationStatus::Approved),
        service
            .applications()
            .set_application_status(application.id, &owner, ApplicationStatus::Approved),
    );

    let successes = [first.is_ok(), second.is_ok()]
        .into_iter()
        .filter(|ok| *ok)
        .count();
    assert_eq!(successes, 1);

    let sessions = store.sessions_for_owner(&owner).await.expect("sessions");
    assert_eq!(sessions.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_applies_each_bump_the_counter_once() {
    let (service, _store, _mailer) = build_service().await;
    let offer_id = publish(service.as_ref(), OWNER, "Resume clinic").await.id;

    let tasks: Vec<_> = (0..32)
        .map(|index| {
            let service = service.clone();
            tokio::spawn(async move {
                service
                    .applications()
                    .apply(apply_command(offer_id, &format!("S-{index:03}"), "student"))
                    .await
            })
        })
        .collect();

    let mut accepted = 0;
    for task in tasks {
        task.await.expect("apply task").expect("apply succeeds");
        accepted += 1;
    }
    assert_eq!(accepted, 32);

    let listing = service.catalog().get_offer(offer_id).await.expect("present");
    assert_eq!(listing.offer.applicant_count, 32);
    let entries = service
        .applications()
        .list_applications_for_offer(offer_id, &ActorId::new(OWNER))
        .await
        .expect("entries");
    assert_eq!(entries.len(), 32);
}
