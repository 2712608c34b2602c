use metrics_exporter_prometheus::PrometheusHandle;
use mentorship::config::DatabaseConfig;
use mentorship::error::AppError;
use mentorship::workflows::mentorship::{
    ActorId, ActorRole, Member, MemberDirectory, MemoryStore, SqliteStore,
};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Store selected from `DATABASE_URL`: none keeps everything in process memory.
pub(crate) enum StoreBackend {
    Memory(MemoryStore),
    Sqlite(SqliteStore),
}

impl StoreBackend {
    pub(crate) async fn open(config: &DatabaseConfig) -> Result<Self, AppError> {
        match config.url {
            None => Ok(Self::Memory(MemoryStore::default())),
            Some(_) => {
                let store = SqliteStore::connect(config).await?;
                store.health_check().await?;
                Ok(Self::Sqlite(store))
            }
        }
    }

    pub(crate) fn label(&self) -> &'static str {
        match self {
            Self::Memory(_) => "memory",
            Self::Sqlite(_) => "sqlite",
        }
    }
}

/// Members used by the demo walkthrough and `serve --seed-members`.
pub(crate) fn demo_roster() -> Vec<Member> {
    vec![
        member(
            "A-1001",
            ActorRole::Alumni,
            "Nadia Rahman",
            Some("nadia.rahman@alumni.example"),
            Some("BBA-12"),
        ),
        member(
            "A-1002",
            ActorRole::Alumni,
            "Rafi Chowdhury",
            Some("rafi.chowdhury@alumni.example"),
            Some("BCS-15"),
        ),
        member(
            "S-2401",
            ActorRole::Student,
            "Sadia Islam",
            Some("sadia.islam@student.example"),
            Some("BCS-24"),
        ),
        member(
            "S-2502",
            ActorRole::Student,
            "Tanvir Ahmed",
            None,
            Some("BBA-25"),
        ),
    ]
}

fn member(
    id: &str,
    role: ActorRole,
    name: &str,
    email: Option<&str>,
    batch: Option<&str>,
) -> Member {
    Member {
        id: ActorId::new(id),
        role,
        name: name.to_string(),
        email: email.map(str::to_string),
        batch: batch.map(str::to_string),
    }
}

pub(crate) async fn seed_members<D>(directory: &D, members: Vec<Member>) -> Result<usize, AppError>
where
    D: MemberDirectory + ?Sized,
{
    let mut seeded = 0;
    for member in members {
        directory.upsert_member(member).await?;
        seeded += 1;
    }
    Ok(seeded)
}
