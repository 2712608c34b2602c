use crate::cli::ServeArgs;
use crate::infra::{demo_roster, seed_members, AppState, StoreBackend};
use crate::routes::with_mentorship_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use mentorship::config::AppConfig;
use mentorship::error::AppError;
use mentorship::telemetry;
use mentorship::workflows::mentorship::{
    LogMailer, MailSettings, MentorshipService, MentorshipStore,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }
    if let Some(url) = args.database_url.take() {
        config.database.override_url(url)?;
    }

    telemetry::init(&config.telemetry)?;

    let backend = StoreBackend::open(&config.database).await?;
    info!(store = backend.label(), "mentorship store opened");

    match backend {
        // The in-memory directory starts empty and offer creation needs registered alumni.
        StoreBackend::Memory(store) => serve(config, Arc::new(store), true).await,
        StoreBackend::Sqlite(store) => {
            let result = serve(config, Arc::new(store.clone()), args.seed_members).await;
            store.close().await;
            result
        }
    }
}

async fn serve<S>(config: AppConfig, store: Arc<S>, seed: bool) -> Result<(), AppError>
where
    S: MentorshipStore,
{
    if seed {
        let seeded = seed_members(store.as_ref(), demo_roster()).await?;
        info!(seeded, "demo member roster loaded");
    }

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let service = Arc::new(MentorshipService::new(
        store,
        Arc::new(LogMailer),
        MailSettings::from(&config.mail),
    ));

    let app = with_mentorship_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "alumni mentorship service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
