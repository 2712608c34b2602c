use crate::infra::{demo_roster, seed_members, StoreBackend};
use async_trait::async_trait;
use chrono::{Duration, Local, NaiveTime};
use clap::Args;
use mentorship::config::{AppConfig, DatabaseConfig};
use mentorship::error::AppError;
use mentorship::workflows::mentorship::{
    Actor, ActorId, ActorRole, ApplicationStatus, ApplyCommand, MailError, MailSettings, Mailer,
    MentorshipError, MentorshipService, MentorshipStore, OfferCatalog, OfferDraft, OfferId,
    OfferStatus, OutboundEmail, ScheduleCommand,
};
use std::sync::Arc;

const MENTOR: &str = "A-1001";
const PEER_ALUMNI: &str = "A-1002";
const STUDENT: &str = "S-2401";
const SECOND_STUDENT: &str = "S-2502";

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Run the walkthrough against a sqlite database instead of process memory.
    #[arg(long)]
    pub(crate) database_url: Option<String>,
    /// Leave the approved session unscheduled.
    #[arg(long)]
    pub(crate) skip_schedule: bool,
}

#[derive(Args, Debug, Default)]
pub(crate) struct ReconcileArgs {
    /// Override DATABASE_URL (sqlite: URLs only)
    #[arg(long)]
    pub(crate) database_url: Option<String>,
}

/// Prints approval e-mails instead of relaying them.
#[derive(Debug, Default, Clone)]
struct ConsoleMailer;

#[async_trait]
impl Mailer for ConsoleMailer {
    async fn send(&self, email: OutboundEmail) -> Result<(), MailError> {
        println!("  [mail] {} -> {}: {}", email.from, email.to, email.subject);
        Ok(())
    }
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        database_url,
        skip_schedule,
    } = args;

    let mut config = DatabaseConfig {
        url: None,
        max_connections: 1,
    };
    if let Some(url) = database_url {
        config.override_url(url)?;
    }

    println!("Alumni mentorship demo");
    match StoreBackend::open(&config).await? {
        StoreBackend::Memory(store) => walkthrough(Arc::new(store), skip_schedule).await,
        StoreBackend::Sqlite(store) => {
            let result = walkthrough(Arc::new(store.clone()), skip_schedule).await;
            store.close().await;
            result
        }
    }
}

async fn walkthrough<S>(store: Arc<S>, skip_schedule: bool) -> Result<(), AppError>
where
    S: MentorshipStore,
{
    let seeded = seed_members(store.as_ref(), demo_roster()).await?;
    println!("- {seeded} members loaded into the directory");

    let service = MentorshipService::new(store, Arc::new(ConsoleMailer), MailSettings::default());
    let mentor = ActorId::new(MENTOR);

    let offer = service
        .catalog()
        .create_offer(
            &mentor,
            OfferDraft {
                title: "Resume clinic".to_string(),
                category: "Career".to_string(),
                description: "Thirty minute one-on-one review of your CV".to_string(),
                max_applicants: Some(2),
                schedule: Some("Saturday mornings".to_string()),
                status: OfferStatus::Active,
            },
        )
        .await?;
    println!(
        "\nOffer #{} \"{}\" published by {}",
        offer.id, offer.title, offer.owner_id
    );

    let mut applications = Vec::new();
    for (applicant, role) in [
        (STUDENT, ActorRole::Student),
        (SECOND_STUDENT, ActorRole::Student),
        (PEER_ALUMNI, ActorRole::Alumni),
    ] {
        let application = service
            .applications()
            .apply(apply(offer.id, applicant, role, "I'd love some feedback"))
            .await?;
        println!("- {} ({}) applied: #{}", applicant, role, application.id);
        applications.push(application);
    }

    match service
        .applications()
        .apply(apply(offer.id, STUDENT, ActorRole::Student, "again"))
        .await
    {
        Err(MentorshipError::DuplicateApplication) => {
            println!("- duplicate application from {STUDENT} refused")
        }
        Err(err) => return Err(err.into()),
        Ok(application) => println!("- unexpected duplicate accepted: #{}", application.id),
    }

    let listing = service.catalog().get_offer(offer.id).await?;
    println!(
        "- applicants recorded: {} (advisory cap {})",
        listing.offer.applicant_count,
        listing
            .offer
            .max_applicants
            .map_or_else(|| "none".to_string(), |cap| cap.to_string())
    );

    println!("\nApplicants for offer #{}", offer.id);
    for entry in service
        .applications()
        .list_applications_for_offer(offer.id, &mentor)
        .await?
    {
        println!(
            "  - #{} {} | {} | {}",
            entry.application.id,
            entry.applicant_name.as_deref().unwrap_or("unknown"),
            entry.applicant_email.as_deref().unwrap_or("no e-mail"),
            entry.application.status
        );
    }

    println!("\nDecisions");
    let approved = service
        .applications()
        .set_application_status(applications[0].id, &mentor, ApplicationStatus::Approved)
        .await?;
    let session = match approved.side_effects {
        Some(report) => {
            if let Some(email) = report.email {
                if let Err(err) = email.await {
                    println!("  [mail] delivery task aborted: {err}");
                }
            }
            report.session
        }
        None => None,
    };
    println!("- #{} approved", approved.application.id);

    service
        .applications()
        .set_application_status(applications[2].id, &mentor, ApplicationStatus::Rejected)
        .await?;
    println!("- #{} rejected", applications[2].id);

    match service
        .applications()
        .set_application_status(applications[0].id, &mentor, ApplicationStatus::Rejected)
        .await
    {
        Err(MentorshipError::Validation(message)) => {
            println!("- re-deciding #{}: {message}", applications[0].id)
        }
        Err(err) => return Err(err.into()),
        Ok(_) => println!("- unexpected second decision accepted"),
    }

    if let (Some(session), false) = (session.as_ref(), skip_schedule) {
        let when = (Local::now().date_naive() + Duration::days(3))
            .and_time(NaiveTime::from_hms_opt(18, 0, 0).unwrap_or_default());
        let scheduled = service
            .sessions()
            .schedule_session(
                session.id,
                &mentor,
                ScheduleCommand {
                    datetime: Some(when),
                    topic: Some("CV walkthrough".to_string()),
                    meeting_link: Some("https://meet.example/resume-clinic".to_string()),
                    status: None,
                },
            )
            .await?;
        println!(
            "\nSession #{} scheduled for {} ({})",
            scheduled.id,
            when.format("%Y-%m-%d %H:%M"),
            scheduled.status
        );
    }

    println!("\nSessions for {STUDENT}");
    for listing in service
        .sessions()
        .sessions_for_student(&ActorId::new(STUDENT))
        .await?
    {
        println!(
            "  - #{} {} with {} | {} | {}",
            listing.session.id,
            listing.session.topic,
            listing.owner_name.as_deref().unwrap_or("unknown"),
            listing.session.datetime.map_or_else(
                || "not scheduled".to_string(),
                |at| at.format("%Y-%m-%d %H:%M").to_string()
            ),
            listing.session.status
        );
    }

    let student = Actor::new(STUDENT, ActorRole::Student);
    println!("\nInbox for {STUDENT}");
    for notification in service.inbox().list(&student).await? {
        println!(
            "  - [{}] {}: {}",
            notification.kind, notification.title, notification.message
        );
    }
    let marked = service.inbox().mark_all_read(&student).await?;
    println!("- {marked} notification(s) marked read");

    Ok(())
}

fn apply(offer_id: OfferId, applicant: &str, role: ActorRole, message: &str) -> ApplyCommand {
    ApplyCommand {
        offer_id: Some(offer_id),
        applicant_id: Some(ActorId::new(applicant)),
        applicant_role: Some(role.label().to_string()),
        message: Some(message.to_string()),
    }
}

pub(crate) async fn run_reconcile(args: ReconcileArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;
    if let Some(url) = args.database_url {
        config.database.override_url(url)?;
    }

    match StoreBackend::open(&config.database).await? {
        StoreBackend::Memory(_) => {
            println!("No DATABASE_URL configured; an in-memory store has nothing to reconcile.");
            Ok(())
        }
        StoreBackend::Sqlite(store) => {
            let store = Arc::new(store);
            let drifts = OfferCatalog::new(store.clone())
                .reconcile_applicant_counts()
                .await?;
            if drifts.is_empty() {
                println!("Applicant counters match stored applications.");
            } else {
                println!("Repaired {} applicant counter(s):", drifts.len());
                for drift in drifts {
                    println!(
                        "  - offer #{}: recorded {} -> actual {}",
                        drift.offer_id, drift.recorded, drift.actual
                    );
                }
            }
            store.close().await;
            Ok(())
        }
    }
}
