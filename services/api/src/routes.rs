use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use date_score::oracle::{PlanSuggester, ScoringOracle};
use date_score::plans::{plan_router, DatePlanService, PlanRepository};
use serde_json::json;
use std::sync::Arc;

pub(crate) fn with_plan_routes<R, O>(service: Arc<DatePlanService<R, O>>) -> axum::Router
where
    R: PlanRepository + 'static,
    O: ScoringOracle + PlanSuggester + 'static,
{
    plan_router(service)
        .route("/", axum::routing::get(welcome))
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
}

pub(crate) async fn welcome() -> Json<serde_json::Value> {
    Json(json!({ "message": "Date Score API is running" }))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use date_score::config::OracleConfig;
    use date_score::oracle::{GeminiClient, FALLBACK_COMMENT};
    use date_score::plans::{ContentFilter, PlanServiceSettings};
    use date_score::store::InMemoryPlanStore;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;
    use tower::ServiceExt;

    fn unconfigured_oracle() -> GeminiClient {
        GeminiClient::new(&OracleConfig {
            api_key: None,
            model: "gemini-2.0-flash".to_string(),
            base_url: "http://127.0.0.1:9".to_string(),
            timeout: Duration::from_secs(1),
        })
        .expect("client builds")
    }

    fn app(ready: bool) -> axum::Router {
        let service = DatePlanService::new(
            Arc::new(InMemoryPlanStore::default()),
            Arc::new(unconfigured_oracle()),
            ContentFilter::default(),
            PlanServiceSettings::default(),
        );
        let state = AppState {
            readiness: Arc::new(AtomicBool::new(false)),
            metrics: Arc::new(PrometheusBuilder::new().build_recorder().handle()),
        };
        state.readiness.store(ready, Ordering::Release);
        with_plan_routes(Arc::new(service)).layer(Extension(state))
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .expect("read body");
        serde_json::from_slice(&body).expect("json payload")
    }

    fn get(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).expect("request")
    }

    #[tokio::test]
    async fn root_welcomes_clients() {
        let response = app(true).oneshot(get("/")).await.expect("route executes");
        assert_eq!(response.status(), StatusCode::OK);
        assert!(json_body(response).await["message"].is_string());
    }

    #[tokio::test]
    async fn readiness_reflects_the_flag() {
        let response = app(false)
            .oneshot(get("/ready"))
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let response = app(true)
            .oneshot(get("/ready"))
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!({ "status": "ready" }));
    }

    #[tokio::test]
    async fn health_and_metrics_respond() {
        let response = app(true)
            .oneshot(get("/health"))
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::OK);

        let response = app(true)
            .oneshot(get("/metrics"))
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).map(|v| v.as_bytes()),
            Some("text/plain; version=0.0.4".as_bytes())
        );
    }

    #[tokio::test]
    async fn submissions_without_an_api_key_use_the_fallback() {
        let plan = json!({
            "age": "24",
            "occupation": "student",
            "gender": "female",
            "date": "2025-07-07",
            "dayOfWeek": "Monday",
            "timeOfDay": "night",
            "dateNumber": "2",
            "location": "planetarium",
            "cost": "3000",
            "additionalNotes": "stargazing afterwards",
        });
        let response = app(true)
            .oneshot(
                Request::post("/api/dates")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(plan.to_string()))
                    .expect("request"),
            )
            .await
            .expect("route executes");

        assert_eq!(response.status(), StatusCode::OK);
        let payload = json_body(response).await;
        assert_eq!(payload["score"], json!(50));
        assert_eq!(payload["comment"], json!(FALLBACK_COMMENT));
    }
}
