//! SQLite-backed store.
//!
//! Multi-row writes run inside one transaction, duplicate applications are caught by the
//! `UNIQUE(offer_id, applicant_id)` constraint, and status changes are single conditional
//! `UPDATE`s so concurrent approvals cannot both observe `pending`.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use tracing::info;

use crate::config::DatabaseConfig;

use super::domain::{
    ActorId, ActorRole, ApplicantEntry, Application, ApplicationId, ApplicationRequest,
    ApplicationStatus, ApplicationSummary, CounterDrift, Member, NewNotification, NewSession,
    Notification, NotificationId, Offer, OfferDraft, OfferId, OfferListing, Session, SessionId,
    SessionListing, SessionSlot, UnknownLabel,
};
use super::repository::{
    ApplicationRepository, MemberDirectory, NotificationRepository, OfferRepository,
    RepositoryError, SessionRepository,
};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS members (
        id TEXT NOT NULL,
        role TEXT NOT NULL,
        name TEXT NOT NULL,
        email TEXT,
        batch TEXT,
        PRIMARY KEY (id, role)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS offers (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        owner_id TEXT NOT NULL,
        title TEXT NOT NULL,
        category TEXT NOT NULL,
        description TEXT NOT NULL,
        max_applicants INTEGER,
        schedule TEXT,
        status TEXT NOT NULL DEFAULT 'active',
        applicant_count INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS applications (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        offer_id INTEGER NOT NULL,
        applicant_id TEXT NOT NULL,
        applicant_role TEXT NOT NULL,
        message TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'pending',
        applied_at TEXT NOT NULL,
        UNIQUE (offer_id, applicant_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS sessions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        application_id INTEGER UNIQUE,
        offer_id INTEGER,
        owner_id TEXT NOT NULL,
        student_id TEXT NOT NULL,
        topic TEXT NOT NULL,
        datetime TEXT,
        meeting_link TEXT,
        status TEXT NOT NULL DEFAULT 'scheduled',
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS notifications (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        recipient_id TEXT NOT NULL,
        recipient_role TEXT NOT NULL,
        title TEXT NOT NULL,
        message TEXT NOT NULL,
        related_offer_id INTEGER,
        kind TEXT NOT NULL,
        is_read INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_offers_owner ON offers (owner_id)",
    "CREATE INDEX IF NOT EXISTS idx_applications_applicant ON applications (applicant_id)",
    "CREATE INDEX IF NOT EXISTS idx_sessions_owner ON sessions (owner_id)",
    "CREATE INDEX IF NOT EXISTS idx_sessions_student ON sessions (student_id)",
    "CREATE INDEX IF NOT EXISTS idx_notifications_recipient ON notifications (recipient_id, recipient_role)",
];

const OFFER_COLUMNS: &str = "o.id AS id, o.owner_id AS owner_id, o.title AS title, \
     o.category AS category, o.description AS description, o.max_applicants AS max_applicants, \
     o.schedule AS schedule, o.status AS status, o.applicant_count AS applicant_count, \
     o.created_at AS created_at";

const APPLICATION_COLUMNS: &str = "a.id AS id, a.offer_id AS offer_id, \
     a.applicant_id AS applicant_id, a.applicant_role AS applicant_role, a.message AS message, \
     a.status AS status, a.applied_at AS applied_at";

const SESSION_COLUMNS: &str = "s.id AS id, s.application_id AS application_id, \
     s.offer_id AS offer_id, s.owner_id AS owner_id, s.student_id AS student_id, \
     s.topic AS topic, s.datetime AS datetime, s.meeting_link AS meeting_link, \
     s.status AS status, s.created_at AS created_at";

const NOTIFICATION_COLUMNS: &str = "id, recipient_id, recipient_role, title, message, \
     related_offer_id, kind, is_read, created_at";

/// Relational store on a `sqlx` SQLite pool.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, RepositoryError> {
        let url = config.url.as_deref().unwrap_or("sqlite::memory:");
        Self::connect_url(url, config.effective_max_connections()).await
    }

    pub async fn connect_url(url: &str, max_connections: u32) -> Result<Self, RepositoryError> {
        info!(url, max_connections, "connecting to SQLite");

        let options = SqliteConnectOptions::from_str(url)
            .map_err(map_sqlx)?
            .create_if_missing(true);

        let mut pool_options = SqlitePoolOptions::new().max_connections(max_connections);
        if url.contains(":memory:") {
            // Closing the only connection would drop the whole database.
            pool_options = pool_options.idle_timeout(None).max_lifetime(None);
        }

        let pool = pool_options.connect_with(options).await.map_err(map_sqlx)?;
        let store = Self { pool };
        store.initialize_schema().await?;

        info!("SQLite schema ready");
        Ok(store)
    }

    async fn initialize_schema(&self) -> Result<(), RepositoryError> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(map_sqlx)?;
        }
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<(), RepositoryError> {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|_| ())
            .map_err(map_sqlx)
    }

    pub async fn close(&self) {
        self.pool.close().await;
        info!("SQLite pool closed");
    }

    async fn load_offer(&self, id: OfferId) -> Result<Option<OfferListing>, RepositoryError> {
        let sql = format!(
            "SELECT {OFFER_COLUMNS}, m.name AS owner_name FROM offers o \
             LEFT JOIN members m ON m.id = o.owner_id AND m.role = 'alumni' \
             WHERE o.id = ?"
        );
        let row = sqlx::query(&sql)
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;
        row.as_ref().map(offer_listing_from_row).transpose()
    }

    async fn load_session(&self, id: SessionId) -> Result<Option<Session>, RepositoryError> {
        let sql = format!("SELECT {SESSION_COLUMNS} FROM sessions s WHERE s.id = ?");
        let row = sqlx::query(&sql)
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;
        row.as_ref().map(session_from_row).transpose()
    }
}

fn map_sqlx(err: sqlx::Error) -> RepositoryError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => RepositoryError::Conflict,
        sqlx::Error::RowNotFound => RepositoryError::NotFound,
        _ => RepositoryError::Unavailable(err.to_string()),
    }
}

fn column<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T, RepositoryError>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(name)
        .map_err(|err| RepositoryError::Corrupted(format!("column {name}: {err}")))
}

fn label<T>(row: &SqliteRow, name: &str) -> Result<T, RepositoryError>
where
    T: FromStr<Err = UnknownLabel>,
{
    let raw: String = column(row, name)?;
    raw.parse()
        .map_err(|err: UnknownLabel| RepositoryError::Corrupted(err.to_string()))
}

fn count(row: &SqliteRow, name: &str) -> Result<u32, RepositoryError> {
    let raw: i64 = column(row, name)?;
    u32::try_from(raw)
        .map_err(|_| RepositoryError::Corrupted(format!("column {name}: {raw} out of range")))
}

fn offer_from_row(row: &SqliteRow) -> Result<Offer, RepositoryError> {
    let max_applicants: Option<i64> = column(row, "max_applicants")?;
    Ok(Offer {
        id: OfferId(column(row, "id")?),
        owner_id: ActorId(column(row, "owner_id")?),
        title: column(row, "title")?,
        category: column(row, "category")?,
        description: column(row, "description")?,
        max_applicants: max_applicants.and_then(|value| u32::try_from(value).ok()),
        schedule: column(row, "schedule")?,
        status: label(row, "status")?,
        applicant_count: count(row, "applicant_count")?,
        created_at: column(row, "created_at")?,
    })
}

fn offer_listing_from_row(row: &SqliteRow) -> Result<OfferListing, RepositoryError> {
    Ok(OfferListing::new(
        offer_from_row(row)?,
        column(row, "owner_name")?,
    ))
}

fn application_from_row(row: &SqliteRow) -> Result<Application, RepositoryError> {
    Ok(Application {
        id: ApplicationId(column(row, "id")?),
        offer_id: OfferId(column(row, "offer_id")?),
        applicant_id: ActorId(column(row, "applicant_id")?),
        applicant_role: label(row, "applicant_role")?,
        message: column(row, "message")?,
        status: label(row, "status")?,
        applied_at: column(row, "applied_at")?,
    })
}

fn session_from_row(row: &SqliteRow) -> Result<Session, RepositoryError> {
    let application_id: Option<i64> = column(row, "application_id")?;
    let offer_id: Option<i64> = column(row, "offer_id")?;
    let datetime: Option<NaiveDateTime> = column(row, "datetime")?;
    Ok(Session {
        id: SessionId(column(row, "id")?),
        application_id: application_id.map(ApplicationId),
        offer_id: offer_id.map(OfferId),
        owner_id: ActorId(column(row, "owner_id")?),
        student_id: ActorId(column(row, "student_id")?),
        topic: column(row, "topic")?,
        datetime,
        meeting_link: column(row, "meeting_link")?,
        status: label(row, "status")?,
        created_at: column(row, "created_at")?,
    })
}

fn notification_from_row(row: &SqliteRow) -> Result<Notification, RepositoryError> {
    let related_offer_id: Option<i64> = column(row, "related_offer_id")?;
    Ok(Notification {
        id: NotificationId(column(row, "id")?),
        recipient_id: ActorId(column(row, "recipient_id")?),
        recipient_role: label(row, "recipient_role")?,
        title: column(row, "title")?,
        message: column(row, "message")?,
        related_offer_id: related_offer_id.map(OfferId),
        kind: label(row, "kind")?,
        is_read: column(row, "is_read")?,
        created_at: column(row, "created_at")?,
    })
}

#[async_trait]
impl MemberDirectory for SqliteStore {
    async fn upsert_member(&self, member: Member) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO members (id, role, name, email, batch) VALUES (?, ?, ?, ?, ?) \
             ON CONFLICT (id, role) DO UPDATE SET \
             name = excluded.name, email = excluded.email, batch = excluded.batch",
        )
        .bind(member.id.as_str())
        .bind(member.role.label())
        .bind(&member.name)
        .bind(member.email.as_deref())
        .bind(member.batch.as_deref())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    async fn member(
        &self,
        id: &ActorId,
        role: ActorRole,
    ) -> Result<Option<Member>, RepositoryError> {
        let row = sqlx::query("SELECT id, role, name, email, batch FROM members WHERE id = ? AND role = ?")
            .bind(id.as_str())
            .bind(role.label())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;

        row.map(|row| {
            Ok(Member {
                id: ActorId(column(&row, "id")?),
                role: label(&row, "role")?,
                name: column(&row, "name")?,
                email: column(&row, "email")?,
                batch: column(&row, "batch")?,
            })
        })
        .transpose()
    }
}

#[async_trait]
impl OfferRepository for SqliteStore {
    async fn insert_offer(
        &self,
        owner_id: &ActorId,
        draft: &OfferDraft,
        created_at: DateTime<Utc>,
    ) -> Result<Offer, RepositoryError> {
        let done = sqlx::query(
            "INSERT INTO offers \
             (owner_id, title, category, description, max_applicants, schedule, status, applicant_count, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, 0, ?)",
        )
        .bind(owner_id.as_str())
        .bind(&draft.title)
        .bind(&draft.category)
        .bind(&draft.description)
        .bind(draft.max_applicants.map(i64::from))
        .bind(draft.schedule.as_deref())
        .bind(draft.status.label())
        .bind(created_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(Offer {
            id: OfferId(done.last_insert_rowid()),
            owner_id: owner_id.clone(),
            title: draft.title.clone(),
            category: draft.category.clone(),
            description: draft.description.clone(),
            max_applicants: draft.max_applicants,
            schedule: draft.schedule.clone(),
            status: draft.status,
            applicant_count: 0,
            created_at,
        })
    }

    async fn fetch_offer(&self, id: OfferId) -> Result<Option<OfferListing>, RepositoryError> {
        self.load_offer(id).await
    }

    async fn list_offers(
        &self,
        owner_id: Option<&ActorId>,
    ) -> Result<Vec<OfferListing>, RepositoryError> {
        let filter = if owner_id.is_some() {
            "WHERE o.owner_id = ?"
        } else {
            ""
        };
        let sql = format!(
            "SELECT {OFFER_COLUMNS}, m.name AS owner_name FROM offers o \
             LEFT JOIN members m ON m.id = o.owner_id AND m.role = 'alumni' \
             {filter} ORDER BY o.created_at DESC, o.id DESC"
        );

        let mut query = sqlx::query(&sql);
        if let Some(owner_id) = owner_id {
            query = query.bind(owner_id.as_str());
        }
        let rows = query.fetch_all(&self.pool).await.map_err(map_sqlx)?;
        rows.iter().map(offer_listing_from_row).collect()
    }

    async fn replace_offer(
        &self,
        id: OfferId,
        owner_id: &ActorId,
        draft: &OfferDraft,
    ) -> Result<Option<Offer>, RepositoryError> {
        let done = sqlx::query(
            "UPDATE offers SET title = ?, category = ?, description = ?, \
             max_applicants = ?, schedule = ?, status = ? \
             WHERE id = ? AND owner_id = ?",
        )
        .bind(&draft.title)
        .bind(&draft.category)
        .bind(&draft.description)
        .bind(draft.max_applicants.map(i64::from))
        .bind(draft.schedule.as_deref())
        .bind(draft.status.label())
        .bind(id.0)
        .bind(owner_id.as_str())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        if done.rows_affected() == 0 {
            return Ok(None);
        }
        Ok(self.load_offer(id).await?.map(|listing| listing.offer))
    }

    async fn delete_offer(
        &self,
        id: OfferId,
        owner_id: &ActorId,
    ) -> Result<bool, RepositoryError> {
        let done = sqlx::query("DELETE FROM offers WHERE id = ? AND owner_id = ?")
            .bind(id.0)
            .bind(owner_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(done.rows_affected() > 0)
    }

    async fn recount_applicants(&self) -> Result<Vec<CounterDrift>, RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;

        let rows = sqlx::query(
            "SELECT o.id AS id, o.applicant_count AS recorded, \
             (SELECT COUNT(*) FROM applications a WHERE a.offer_id = o.id) AS actual \
             FROM offers o \
             WHERE o.applicant_count <> (SELECT COUNT(*) FROM applications a WHERE a.offer_id = o.id) \
             ORDER BY o.id",
        )
        .fetch_all(&mut *tx)
        .await
        .map_err(map_sqlx)?;

        let mut drifts = Vec::with_capacity(rows.len());
        for row in &rows {
            let drift = CounterDrift {
                offer_id: OfferId(column(row, "id")?),
                recorded: count(row, "recorded")?,
                actual: count(row, "actual")?,
            };
            sqlx::query("UPDATE offers SET applicant_count = ? WHERE id = ?")
                .bind(i64::from(drift.actual))
                .bind(drift.offer_id.0)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx)?;
            drifts.push(drift);
        }

        tx.commit().await.map_err(map_sqlx)?;
        Ok(drifts)
    }
}

#[async_trait]
impl ApplicationRepository for SqliteStore {
    async fn insert_application(
        &self,
        request: &ApplicationRequest,
        applied_at: DateTime<Utc>,
    ) -> Result<Application, RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;

        let done = sqlx::query(
            "INSERT INTO applications \
             (offer_id, applicant_id, applicant_role, message, status, applied_at) \
             VALUES (?, ?, ?, ?, 'pending', ?)",
        )
        .bind(request.offer_id.0)
        .bind(request.applicant_id.as_str())
        .bind(request.applicant_role.label())
        .bind(&request.message)
        .bind(applied_at)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx)?;

        let bumped = sqlx::query("UPDATE offers SET applicant_count = applicant_count + 1 WHERE id = ?")
            .bind(request.offer_id.0)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx)?;
        if bumped.rows_affected() == 0 {
            // Dropping the transaction rolls the insert back.
            return Err(RepositoryError::NotFound);
        }

        tx.commit().await.map_err(map_sqlx)?;

        Ok(Application {
            id: ApplicationId(done.last_insert_rowid()),
            offer_id: request.offer_id,
            applicant_id: request.applicant_id.clone(),
            applicant_role: request.applicant_role,
            message: request.message.clone(),
            status: ApplicationStatus::Pending,
            applied_at,
        })
    }

    async fn fetch_application(
        &self,
        id: ApplicationId,
    ) -> Result<Option<Application>, RepositoryError> {
        let sql = format!("SELECT {APPLICATION_COLUMNS} FROM applications a WHERE a.id = ?");
        let row = sqlx::query(&sql)
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;
        row.as_ref().map(application_from_row).transpose()
    }

    async fn applications_for_offer(
        &self,
        offer_id: OfferId,
    ) -> Result<Vec<ApplicantEntry>, RepositoryError> {
        let sql = format!(
            "SELECT {APPLICATION_COLUMNS}, m.name AS applicant_name, m.email AS applicant_email, \
             m.batch AS applicant_batch FROM applications a \
             LEFT JOIN members m ON m.id = a.applicant_id AND m.role = a.applicant_role \
             WHERE a.offer_id = ? ORDER BY a.applied_at DESC, a.id DESC"
        );
        let rows = sqlx::query(&sql)
            .bind(offer_id.0)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)?;

        rows.iter()
            .map(|row| {
                Ok(ApplicantEntry {
                    application: application_from_row(row)?,
                    applicant_name: column(row, "applicant_name")?,
                    applicant_email: column(row, "applicant_email")?,
                    applicant_batch: column(row, "applicant_batch")?,
                })
            })
            .collect()
    }

    async fn applications_by_applicant(
        &self,
        applicant_id: &ActorId,
    ) -> Result<Vec<ApplicationSummary>, RepositoryError> {
        let sql = format!(
            "SELECT {APPLICATION_COLUMNS}, o.title AS offer_title, m.name AS owner_name \
             FROM applications a \
             LEFT JOIN offers o ON o.id = a.offer_id \
             LEFT JOIN members m ON m.id = o.owner_id AND m.role = 'alumni' \
             WHERE a.applicant_id = ? ORDER BY a.applied_at DESC, a.id DESC"
        );
        let rows = sqlx::query(&sql)
            .bind(applicant_id.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)?;

        rows.iter()
            .map(|row| {
                Ok(ApplicationSummary {
                    application: application_from_row(row)?,
                    offer_title: column(row, "offer_title")?,
                    owner_name: column(row, "owner_name")?,
                })
            })
            .collect()
    }

    async fn resolve_application(
        &self,
        id: ApplicationId,
        status: ApplicationStatus,
    ) -> Result<bool, RepositoryError> {
        let done = sqlx::query("UPDATE applications SET status = ? WHERE id = ? AND status = 'pending'")
            .bind(status.label())
            .bind(id.0)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(done.rows_affected() == 1)
    }
}

#[async_trait]
impl SessionRepository for SqliteStore {
    async fn open_session(
        &self,
        session: &NewSession,
        created_at: DateTime<Utc>,
    ) -> Result<Session, RepositoryError> {
        sqlx::query(
            "INSERT INTO sessions \
             (application_id, offer_id, owner_id, student_id, topic, datetime, meeting_link, status, created_at) \
             VALUES (?, ?, ?, ?, ?, NULL, NULL, 'scheduled', ?) \
             ON CONFLICT (application_id) DO NOTHING",
        )
        .bind(session.application_id.0)
        .bind(session.offer_id.0)
        .bind(session.owner_id.as_str())
        .bind(session.student_id.as_str())
        .bind(&session.topic)
        .bind(created_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        let sql = format!("SELECT {SESSION_COLUMNS} FROM sessions s WHERE s.application_id = ?");
        let row = sqlx::query(&sql)
            .bind(session.application_id.0)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx)?;
        session_from_row(&row)
    }

    async fn fetch_session(&self, id: SessionId) -> Result<Option<Session>, RepositoryError> {
        self.load_session(id).await
    }

    async fn sessions_for_owner(
        &self,
        owner_id: &ActorId,
    ) -> Result<Vec<SessionListing>, RepositoryError> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS}, o.title AS offer_title, \
             CASE WHEN st.id IS NOT NULL THEN st.name ELSE al.name END AS student_name, \
             CASE WHEN st.id IS NOT NULL THEN st.batch ELSE al.batch END AS student_batch \
             FROM sessions s \
             LEFT JOIN offers o ON o.id = s.offer_id \
             LEFT JOIN members st ON st.id = s.student_id AND st.role = 'student' \
             LEFT JOIN members al ON al.id = s.student_id AND al.role = 'alumni' \
             WHERE s.owner_id = ? ORDER BY s.created_at DESC, s.id DESC"
        );
        let rows = sqlx::query(&sql)
            .bind(owner_id.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)?;

        rows.iter()
            .map(|row| {
                Ok(SessionListing {
                    session: session_from_row(row)?,
                    offer_title: column(row, "offer_title")?,
                    owner_name: None,
                    student_name: column(row, "student_name")?,
                    student_batch: column(row, "student_batch")?,
                })
            })
            .collect()
    }

    async fn sessions_for_student(
        &self,
        student_id: &ActorId,
    ) -> Result<Vec<SessionListing>, RepositoryError> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS}, o.title AS offer_title, m.name AS owner_name \
             FROM sessions s \
             LEFT JOIN offers o ON o.id = s.offer_id \
             LEFT JOIN members m ON m.id = s.owner_id AND m.role = 'alumni' \
             WHERE s.student_id = ? \
             ORDER BY s.datetime IS NULL, s.datetime DESC, s.created_at DESC, s.id DESC"
        );
        let rows = sqlx::query(&sql)
            .bind(student_id.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)?;

        rows.iter()
            .map(|row| {
                Ok(SessionListing {
                    session: session_from_row(row)?,
                    offer_title: column(row, "offer_title")?,
                    owner_name: column(row, "owner_name")?,
                    student_name: None,
                    student_batch: None,
                })
            })
            .collect()
    }

    async fn reschedule_session(
        &self,
        id: SessionId,
        owner_id: &ActorId,
        slot: &SessionSlot,
    ) -> Result<Option<Session>, RepositoryError> {
        let done = sqlx::query(
            "UPDATE sessions SET datetime = ?, topic = ?, meeting_link = ?, status = ? \
             WHERE id = ? AND owner_id = ?",
        )
        .bind(slot.datetime)
        .bind(&slot.topic)
        .bind(slot.meeting_link.as_deref())
        .bind(slot.status.label())
        .bind(id.0)
        .bind(owner_id.as_str())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        if done.rows_affected() == 0 {
            return Ok(None);
        }
        self.load_session(id).await
    }
}

#[async_trait]
impl NotificationRepository for SqliteStore {
    async fn insert_notification(
        &self,
        notification: &NewNotification,
        created_at: DateTime<Utc>,
    ) -> Result<Notification, RepositoryError> {
        let done = sqlx::query(
            "INSERT INTO notifications \
             (recipient_id, recipient_role, title, message, related_offer_id, kind, is_read, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, 0, ?)",
        )
        .bind(notification.recipient_id.as_str())
        .bind(notification.recipient_role.label())
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(notification.related_offer_id.map(|id| id.0))
        .bind(notification.kind.label())
        .bind(created_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(Notification {
            id: NotificationId(done.last_insert_rowid()),
            recipient_id: notification.recipient_id.clone(),
            recipient_role: notification.recipient_role,
            title: notification.title.clone(),
            message: notification.message.clone(),
            related_offer_id: notification.related_offer_id,
            kind: notification.kind,
            is_read: false,
            created_at,
        })
    }

    async fn notifications_for(
        &self,
        recipient_id: &ActorId,
        recipient_role: ActorRole,
    ) -> Result<Vec<Notification>, RepositoryError> {
        let sql = format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications \
             WHERE recipient_id = ? AND recipient_role = ? \
             ORDER BY created_at DESC, id DESC"
        );
        let rows = sqlx::query(&sql)
            .bind(recipient_id.as_str())
            .bind(recipient_role.label())
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)?;
        rows.iter().map(notification_from_row).collect()
    }

    async fn mark_all_read(
        &self,
        recipient_id: &ActorId,
        recipient_role: ActorRole,
    ) -> Result<u64, RepositoryError> {
        let done = sqlx::query(
            "UPDATE notifications SET is_read = 1 \
             WHERE recipient_id = ? AND recipient_role = ? AND is_read = 0",
        )
        .bind(recipient_id.as_str())
        .bind(recipient_role.label())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(done.rows_affected())
    }
}
