use crate::cli::ServeArgs;
use crate::infra::{seeded_memory_store, AppState};
use crate::routes::with_application_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use recruitment::applications::{ApplicationService, ApplicationStore, PgStore};
use recruitment::config::AppConfig;
use recruitment::error::AppError;
use recruitment::telemetry;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    match config.database.url.clone() {
        Some(url) if !args.memory => {
            let store = PgStore::connect(&url, &config.database).await?;
            store.migrate().await?;
            info!("connected to postgres and applied migrations");
            serve(config, Arc::new(store)).await
        }
        _ => {
            warn!("serving from the in-memory store; data is lost on shutdown");
            let seeded = seeded_memory_store().await?;
            serve(config, Arc::new(seeded.store)).await
        }
    }
}

async fn serve<S>(config: AppConfig, store: Arc<S>) -> Result<(), AppError>
where
    S: ApplicationStore + 'static,
{
    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let service = Arc::new(ApplicationService::new(store, config.review));
    let policy = service.review_policy();
    let app = with_application_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        allow_decision_change = policy.allow_decision_change,
        "recruitment service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}

pub(crate) async fn migrate() -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let url = config
        .database
        .url
        .clone()
        .ok_or(AppError::MissingDatabaseUrl)?;
    let store = PgStore::connect(&url, &config.database).await?;
    store.migrate().await?;
    info!("database migrations applied");
    Ok(())
}
