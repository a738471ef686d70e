use crate::cli::ServeArgs;
use crate::infra::{open_repository, AppState, LogChannelPublisher, LogNotifier};
use crate::routes::with_intake_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use listing_intake::config::AppConfig;
use listing_intake::error::AppError;
use listing_intake::telemetry;
use listing_intake::workflows::submission::IntakeService;
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
    if let Some(path) = args.data_path.take() {
        config.intake.data_path = Some(path);
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let repository = Arc::new(open_repository(&config.intake)?);
    let intake_service = Arc::new(IntakeService::new(
        repository,
        Arc::new(LogNotifier::default()),
        Arc::new(LogChannelPublisher::default()),
        config.intake.clone(),
    )?);

    let app = with_intake_routes(intake_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        channel = %config.intake.channel,
        schema = %config.intake.default_schema,
        "listing intake service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
