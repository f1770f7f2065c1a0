use crate::cli::ServeArgs;
use crate::infra::{
    load_identity, AppState, InMemoryApplicationRepository, InMemoryAuditSink, LoggingMailer,
};
use crate::routes::with_review_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use mod_portal::config::AppConfig;
use mod_portal::error::AppError;
use mod_portal::telemetry;
use mod_portal::workflows::review::{MailTemplates, NotificationDispatch, ReviewService};
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

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let identity = Arc::new(load_identity(&config.portal)?);
    let mailer = LoggingMailer::new(MailTemplates::new(config.portal.community_name.clone()));
    let review_service = Arc::new(
        ReviewService::new(
            Arc::new(InMemoryApplicationRepository::default()),
            Arc::new(InMemoryAuditSink::default()),
            Arc::new(mailer),
        )
        .with_dispatch(NotificationDispatch::Detached(
            tokio::runtime::Handle::current(),
        ))
        .with_applications_open(config.portal.applications_open),
    );

    let app = with_review_routes(review_service, identity)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        applications_open = config.portal.applications_open,
        "moderator application portal ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
