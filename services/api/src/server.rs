use crate::cli::ServeArgs;
use crate::infra::{build_desk, AppState, CaseStore};
use crate::routes::with_case_desk_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tenant_credit::config::AppConfig;
use tenant_credit::error::AppError;
use tenant_credit::telemetry;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let store = CaseStore::from_config(&config.storage);
    info!(store = %store.describe(), "finalized cases storage selected");
    let desk = Arc::new(build_desk(store, config.scoring.clone()));

    let app = with_case_desk_routes(desk)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        high_threshold = config.scoring.high_threshold,
        medium_threshold = config.scoring.medium_threshold,
        "tenant credit desk ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
