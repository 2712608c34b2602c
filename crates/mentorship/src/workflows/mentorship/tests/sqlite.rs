use std::sync::Arc;

use chrono::{NaiveDate, Utc};

use super::common::*;
use crate::config::DatabaseConfig;
use crate::workflows::mentorship::{
    ActorId, ActorRole, ApplicationRepository, ApplicationRequest, ApplicationStatus,
    MemberDirectory, MentorshipError, MentorshipService, NewSession, NotificationRepository,
    OfferFilter, OfferId, OfferRepository, RepositoryError, ScheduleCommand, SessionRepository,
    SessionStatus, SqliteStore,
};

async fn memory_store() -> SqliteStore {
    SqliteStore::connect(&DatabaseConfig {
        url: Some("sqlite::memory:".to_string()),
        max_connections: 4,
    })
    .await
    .expect("in-memory sqlite")
}

async fn sqlite_service() -> (
    Arc<TestService<SqliteStore>>,
    Arc<SqliteStore>,
    Arc<RecordingMailer>,
) {
    let store = Arc::new(memory_store().await);
    seed(store.as_ref()).await;
    let mailer = Arc::new(RecordingMailer::default());
    let service = Arc::new(MentorshipService::new(
        store.clone(),
        mailer.clone(),
        mail_settings(),
    ));
    (service, store, mailer)
}

#[tokio::test]
async fn schema_is_created_and_members_upsert() {
    let store = memory_store().await;
    store.health_check().await.expect("healthy");

    seed(&store).await;
    let mut renamed = members().remove(0);
    renamed.name = "Nadia R.".to_string();
    store.upsert_member(renamed).await.expect("upsert");

    let member = store
        .member(&ActorId::new(OWNER), ActorRole::Alumni)
        .await
        .expect("lookup")
        .expect("present");
    assert_eq!(member.name, "Nadia R.");
    assert_eq!(member.email.as_deref(), Some("nadia@alumni.example"));
    assert!(store
        .member(&ActorId::new(OWNER), ActorRole::Student)
        .await
        .expect("lookup")
        .is_none());
}

#[tokio::test]
async fn offers_round_trip_through_sqlite() {
    let (service, _store, _mailer) = sqlite_service().await;
    let first = publish(service.as_ref(), OWNER, "Resume clinic").await;
    let second = publish(service.as_ref(), OTHER_ALUMNI, "Research guidance").await;

    let listing = service.catalog().get_offer(first.id).await.expect("present");
    assert_eq!(listing.offer.title, "Resume clinic");
    assert_eq!(listing.offer.max_applicants, Some(2));
    assert_eq!(listing.offer.schedule.as_deref(), Some("Weekends"));
    assert_eq!(listing.owner_name.as_deref(), Some("Nadia Rahman"));

    let all = service
        .catalog()
        .list_offers(&OfferFilter::default())
        .await
        .expect("list");
    assert_eq!(all[0].offer.id, second.id);
    assert_eq!(all[1].offer.id, first.id);

    let mine = service
        .catalog()
        .list_offers(&OfferFilter::owned_by(ActorId::new(OTHER_ALUMNI)))
        .await
        .expect("list");
    assert_eq!(mine.len(), 1);

    let denied = service
        .catalog()
        .delete_offer(first.id, &ActorId::new(OTHER_ALUMNI))
        .await;
    assert!(matches!(denied, Err(MentorshipError::Forbidden(_))));
    service
        .catalog()
        .delete_offer(first.id, &ActorId::new(OWNER))
        .await
        .expect("owner deletes");
    assert!(matches!(
        service.catalog().get_offer(first.id).await,
        Err(MentorshipError::NotFound(_))
    ));
}

#[tokio::test]
async fn duplicate_applications_hit_the_unique_constraint_and_keep_the_counter() {
    let (service, store, _mailer) = sqlite_service().await;
    let offer = publish(service.as_ref(), OWNER, "Resume clinic").await;
    submit(service.as_ref(), offer.id, STUDENT, "student").await;

    let duplicate = service
        .applications()
        .apply(apply_command(offer.id, STUDENT, "student"))
        .await;
    assert!(matches!(
        duplicate,
        Err(MentorshipError::DuplicateApplication)
    ));

    let listing = store
        .fetch_offer(offer.id)
        .await
        .expect("fetch")
        .expect("present");
    assert_eq!(listing.offer.applicant_count, 1);
}

#[tokio::test]
async fn application_for_a_vanished_offer_rolls_back() {
    let store = memory_store().await;
    let request = ApplicationRequest {
        offer_id: OfferId(77),
        applicant_id: ActorId::new(STUDENT),
        applicant_role: ActorRole::Student,
        message: "interested".to_string(),
    };

    let result = store.insert_application(&request, Utc::now()).await;
    assert!(matches!(result, Err(RepositoryError::NotFound)));
    assert!(store
        .applications_by_applicant(&ActorId::new(STUDENT))
        .await
        .expect("list")
        .is_empty());
}

#[tokio::test]
async fn status_writes_are_conditional_on_pending() {
    let (service, store, _mailer) = sqlite_service().await;
    let offer = publish(service.as_ref(), OWNER, "Resume clinic").await;
    let application = submit(service.as_ref(), offer.id, STUDENT, "student").await;

    assert!(store
        .resolve_application(application.id, ApplicationStatus::Approved)
        .await
        .expect("first write"));
    assert!(!store
        .resolve_application(application.id, ApplicationStatus::Rejected)
        .await
        .expect("second write"));

    let stored = store
        .fetch_application(application.id)
        .await
        .expect("fetch")
        .expect("present");
    assert_eq!(stored.status, ApplicationStatus::Approved);
}

#[tokio::test]
async fn approval_pipeline_runs_against_sqlite() {
    let (service, store, mailer) = sqlite_service().await;
    let offer = publish(service.as_ref(), OWNER, "Resume clinic").await;
    let application = submit(service.as_ref(), offer.id, STUDENT, "student").await;

    let report = service
        .applications()
        .set_application_status(application.id, &ActorId::new(OWNER), ApplicationStatus::Approved)
        .await
        .expect("approval")
        .side_effects
        .expect("report");
    let session = report.session.expect("session");
    assert_eq!(session.status, SessionStatus::Scheduled);
    assert_eq!(session.datetime, None);
    report.email.expect("email").await.expect("task");
    assert_eq!(mailer.sent().len(), 1);

    let again = store
        .open_session(
            &NewSession {
                application_id: application.id,
                offer_id: offer.id,
                owner_id: ActorId::new(OWNER),
                student_id: ActorId::new(STUDENT),
                topic: "Duplicate".to_string(),
            },
            Utc::now(),
        )
        .await
        .expect("idempotent open");
    assert_eq!(again.id, session.id);
    assert_eq!(again.topic, "Resume clinic");

    let entries = service
        .applications()
        .list_applications_for_offer(offer.id, &ActorId::new(OWNER))
        .await
        .expect("entries");
    assert_eq!(entries[0].applicant_name.as_deref(), Some("Sadia Islam"));
    assert_eq!(entries[0].application.status, ApplicationStatus::Approved);

    let summaries = service
        .applications()
        .list_applications_for_applicant(&ActorId::new(STUDENT))
        .await
        .expect("summaries");
    assert_eq!(summaries[0].owner_name.as_deref(), Some("Nadia Rahman"));

    let inbox = store
        .notifications_for(&ActorId::new(STUDENT), ActorRole::Student)
        .await
        .expect("inbox");
    assert_eq!(inbox.len(), 1);
    assert_eq!(
        store
            .mark_all_read(&ActorId::new(STUDENT), ActorRole::Student)
            .await
            .expect("mark"),
        1
    );
    assert_eq!(
        store
            .mark_all_read(&ActorId::new(STUDENT), ActorRole::Student)
            .await
            .expect("mark"),
        0
    );
}

#[tokio::test]
async fn sqlite_student_sessions_order_unscheduled_last() {
    let (service, _store, _mailer) = sqlite_service().await;
    let owner = ActorId::new(OWNER);
    let mut sessions = Vec::new();
    for title in ["Resume clinic", "Mock interviews", "Research guidance"] {
        let offer = publish(service.as_ref(), OWNER, title).await;
        let application = submit(service.as_ref(), offer.id, STUDENT, "student").await;
        let session = service
            .applications()
            .set_application_status(application.id, &owner, ApplicationStatus::Approved)
            .await
            .expect("approval")
            .side_effects
            .and_then(|report| report.session)
            .expect("session");
        sessions.push(session);
    }

    let day = |d: u32| {
        NaiveDate::from_ymd_opt(2025, 11, d)
            .and_then(|date| date.and_hms_opt(10, 0, 0))
            .expect("valid")
    };
    for (index, when) in [(0, day(3)), (2, day(14))] {
        service
            .sessions()
            .schedule_session(
                sessions[index].id,
                &owner,
                ScheduleCommand {
                    datetime: Some(when),
                    meeting_link: Some("https://meet.example/room".to_string()),
                    ..ScheduleCommand::default()
                },
            )
            .await
            .expect("scheduled");
    }

    let listings = service
        .sessions()
        .sessions_for_student(&ActorId::new(STUDENT))
        .await
        .expect("listing");
    let ids: Vec<_> = listings.iter().map(|listing| listing.session.id).collect();
    assert_eq!(ids, vec![sessions[2].id, sessions[0].id, sessions[1].id]);
    assert_eq!(listings[0].session.datetime, Some(day(14)));
    assert_eq!(listings[0].owner_name.as_deref(), Some("Nadia Rahman"));

    let owner_view = service
        .sessions()
        .sessions_for_owner(&owner)
        .await
        .expect("listing");
    assert_eq!(owner_view.len(), 3);
    assert_eq!(owner_view[0].student_batch.as_deref(), Some("BCS-24"));
}

#[tokio::test]
async fn sqlite_reconcile_repairs_counters() {
    let (service, store, _mailer) = sqlite_service().await;
    let offer = publish(service.as_ref(), OWNER, "Resume clinic").await;
    submit(service.as_ref(), offer.id, STUDENT, "student").await;
    submit(service.as_ref(), offer.id, QUIET_STUDENT, "student").await;

    // Simulate a lost increment.
    sqlx_force_count(&store, offer.id, 0).await;

    let drifts = service
        .catalog()
        .reconcile_applicant_counts()
        .await
        .expect("reconcile");
    assert_eq!(drifts.len(), 1);
    assert_eq!(drifts[0].recorded, 0);
    assert_eq!(drifts[0].actual, 2);

    let listing = store
        .fetch_offer(offer.id)
        .await
        .expect("fetch")
        .expect("present");
    assert_eq!(listing.offer.applicant_count, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_applies_on_a_pooled_file_keep_the_counter_exact() {
    let dir = tempfile::tempdir().expect("temp dir");
    let url = format!("sqlite://{}", dir.path().join("mentorship.db").display());
    let store = Arc::new(
        SqliteStore::connect(&DatabaseConfig {
            url: Some(url),
            max_connections: 5,
        })
        .await
        .expect("file-backed sqlite"),
    );
    seed(store.as_ref()).await;
    let service = Arc::new(MentorshipService::new(
        store.clone(),
        Arc::new(RecordingMailer::default()),
        mail_settings(),
    ));
    let offer_id = publish(service.as_ref(), OWNER, "Resume clinic").await.id;

    let tasks: Vec<_> = (0..24)
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
    assert_eq!(accepted, 24);

    let listing = store
        .fetch_offer(offer_id)
        .await
        .expect("fetch")
        .expect("present");
    assert_eq!(listing.offer.applicant_count, 24);
    assert!(service
        .catalog()
        .reconcile_applicant_counts()
        .await
        .expect("reconcile")
        .is_empty());
    store.close().await;
}

async fn sqlx_force_count(store: &SqliteStore, offer_id: OfferId, count: i64) {
    sqlx::query("UPDATE offers SET applicant_count = ? WHERE id = ?")
        .bind(count)
        .bind(offer_id.0)
        .execute(store.pool())
        .await
        .expect("counter forced");
}
