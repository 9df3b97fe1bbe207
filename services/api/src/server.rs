use crate::cli::ServeArgs;
use crate::infra::{shutdown_signal, AppState};
use crate::routes::with_plan_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use date_score::config::AppConfig;
use date_score::error::AppError;
use date_score::oracle::GeminiClient;
use date_score::plans::{ContentFilter, DatePlanService, PlanRepository, PlanServiceSettings};
use date_score::store::{InMemoryPlanStore, SqlitePlanStore};
use date_score::telemetry;
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
    if let Some(url) = args.database_url.take() {
        config.database.url = url;
    }

    telemetry::init(&config.telemetry)?;

    if args.ephemeral {
        warn!("serving from an in-memory store; plans are lost on shutdown");
        serve_with(config, Arc::new(InMemoryPlanStore::default())).await
    } else {
        let store =
            SqlitePlanStore::connect(&config.database.url, config.database.max_connections)
                .await?;
        serve_with(config, Arc::new(store)).await
    }
}

async fn serve_with<R>(config: AppConfig, repository: Arc<R>) -> Result<(), AppError>
where
    R: PlanRepository + 'static,
{
    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let oracle = GeminiClient::new(&config.oracle)?;
    if !oracle.is_configured() {
        warn!("GEMINI_API_KEY is not set; every plan will receive the fallback evaluation");
    }
    let filter = ContentFilter::load_or_empty(&config.scoring.ng_words_path);
    let settings = PlanServiceSettings {
        consistency: config.scoring.consistency,
        oracle_timeout: config.oracle.timeout,
    };
    let plan_service = Arc::new(DatePlanService::new(
        repository,
        Arc::new(oracle),
        filter,
        settings,
    ));

    let app = with_plan_routes(plan_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        recalc_mode = settings.consistency.label(),
        model = %config.oracle.model,
        "date score service ready"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}
