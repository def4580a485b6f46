//! REST API handlers.
//!
//! Registry and transition handlers go straight to `ShopStateStore`;
//! orchestration runs go through the controller. All responses share
//! one JSON envelope.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};

use shopwatch_core::types::{OperationType, OrchestrationRequest};
use shopwatch_orchestrator::OrchestrateError;
use shopwatch_state::StateError;

use crate::ApiState;

/// Response wrapper for consistent API format.
#[derive(serde::Serialize)]
struct ApiResponse<T: serde::Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: serde::Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

fn error_response(msg: &str, status: StatusCode) -> impl IntoResponse {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
}

fn state_error_response(err: StateError) -> Response {
    let status = match &err {
        StateError::ShopNotFound(_) => StatusCode::NOT_FOUND,
        StateError::CountryImmutable(_) | StateError::InvalidTransition { .. } => {
            StatusCode::CONFLICT
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(&err.to_string(), status).into_response()
}

fn bad_operation(op: &str) -> Response {
    error_response(
        &format!(
            "unknown operation {op:?}; allowed: {}",
            OperationType::ALLOWED.join(", ")
        ),
        StatusCode::BAD_REQUEST,
    )
    .into_response()
}

// ── Shops ──────────────────────────────────────────────────────

/// Shop registration body.
#[derive(serde::Deserialize)]
pub struct RegisterShopRequest {
    pub domain: String,
    pub country: String,
}

/// GET /api/v1/shops
pub async fn list_shops(State(state): State<ApiState>) -> impl IntoResponse {
    match state.store.list_shops() {
        Ok(shops) => ApiResponse::ok(shops).into_response(),
        Err(e) => state_error_response(e),
    }
}

/// POST /api/v1/shops
pub async fn register_shop(
    State(state): State<ApiState>,
    Json(req): Json<RegisterShopRequest>,
) -> impl IntoResponse {
    if req.domain.is_empty() || req.country.is_empty() {
        return error_response("domain and country must be non-empty", StatusCode::BAD_REQUEST)
            .into_response();
    }
    match state.store.register_shop(&req.domain, &req.country) {
        Ok(record) => (StatusCode::CREATED, ApiResponse::ok(record)).into_response(),
        Err(e) => state_error_response(e),
    }
}

/// GET /api/v1/shops/:domain
pub async fn get_shop(
    State(state): State<ApiState>,
    Path(domain): Path<String>,
) -> impl IntoResponse {
    match state.store.get_shop(&domain) {
        Ok(Some(record)) => ApiResponse::ok(record).into_response(),
        Ok(None) => error_response("shop not found", StatusCode::NOT_FOUND).into_response(),
        Err(e) => state_error_response(e),
    }
}

/// DELETE /api/v1/shops/:domain
pub async fn delete_shop(
    State(state): State<ApiState>,
    Path(domain): Path<String>,
) -> impl IntoResponse {
    match state.store.delete_shop(&domain) {
        Ok(true) => ApiResponse::ok("deleted").into_response(),
        Ok(false) => error_response("shop not found", StatusCode::NOT_FOUND).into_response(),
        Err(e) => state_error_response(e),
    }
}

// ── Lifecycle transitions ──────────────────────────────────────

/// Transition body. `timestamp` defaults to the current wall clock.
#[derive(serde::Deserialize, Default)]
pub struct TransitionRequest {
    pub timestamp: Option<DateTime<Utc>>,
}

/// POST /api/v1/shops/:domain/operations/:op/started
pub async fn record_started(
    State(state): State<ApiState>,
    Path((domain, op)): Path<(String, String)>,
    Json(req): Json<TransitionRequest>,
) -> impl IntoResponse {
    let Some(operation) = OperationType::parse(&op) else {
        return bad_operation(&op);
    };
    let at = req.timestamp.unwrap_or_else(Utc::now);
    match state.store.record_started(&domain, operation, at) {
        Ok(record) => ApiResponse::ok(record).into_response(),
        Err(e) => state_error_response(e),
    }
}

/// POST /api/v1/shops/:domain/operations/:op/finished
pub async fn record_finished(
    State(state): State<ApiState>,
    Path((domain, op)): Path<(String, String)>,
    Json(req): Json<TransitionRequest>,
) -> impl IntoResponse {
    let Some(operation) = OperationType::parse(&op) else {
        return bad_operation(&op);
    };
    let at = req.timestamp.unwrap_or_else(Utc::now);
    match state.store.record_finished(&domain, operation, at) {
        Ok(record) => ApiResponse::ok(record).into_response(),
        Err(e) => state_error_response(e),
    }
}

// ── Orchestration ──────────────────────────────────────────────

/// POST /api/v1/orchestrations
pub async fn run_orchestration(
    State(state): State<ApiState>,
    Json(req): Json<OrchestrationRequest>,
) -> impl IntoResponse {
    match state.controller.run(&req).await {
        Ok(summary) => ApiResponse::ok(summary).into_response(),
        Err(err @ OrchestrateError::InvalidOperation { .. }) => error_response(
            &format!("{err}; allowed: {}", OperationType::ALLOWED.join(", ")),
            StatusCode::BAD_REQUEST,
        )
        .into_response(),
        Err(err) if err.is_client_error() => {
            error_response(&err.to_string(), StatusCode::BAD_REQUEST).into_response()
        }
        Err(err) => {
            error_response(&err.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response()
        }
    }
}

// ── Worker receive ─────────────────────────────────────────────

/// Receive body: how many messages to pull at most.
#[derive(serde::Deserialize, Default)]
pub struct ReceiveRequest {
    pub max: Option<usize>,
}

/// POST /api/v1/work/:op/receive
pub async fn receive_work(
    State(state): State<ApiState>,
    Path(op): Path<String>,
    Json(req): Json<ReceiveRequest>,
) -> impl IntoResponse {
    let Some(operation) = OperationType::parse(&op) else {
        return bad_operation(&op);
    };
    let Some(queue) = state.queues.get(&operation) else {
        return error_response("no queue configured for operation", StatusCode::NOT_FOUND)
            .into_response();
    };
    match queue.receive(req.max.unwrap_or(10)).await {
        Ok(messages) => ApiResponse::ok(messages).into_response(),
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;
    use std::sync::Arc;

    use chrono::{Duration, TimeZone};
    use shopwatch_core::types::OrchestrationDefaults;
    use shopwatch_orchestrator::OrchestrationController;
    use shopwatch_queue::InMemoryWorkQueue;
    use shopwatch_state::ShopStateStore;

    fn test_state() -> ApiState {
        let store = ShopStateStore::open_in_memory().unwrap();
        let crawl_queue: Arc<dyn shopwatch_core::ports::WorkQueue> =
            Arc::new(InMemoryWorkQueue::new("shop-crawl"));
        let scrape_queue: Arc<dyn shopwatch_core::ports::WorkQueue> =
            Arc::new(InMemoryWorkQueue::new("shop-scrape"));
        let controller = OrchestrationController::new(
            Arc::new(store.clone()),
            OrchestrationDefaults::default(),
        )
        .with_queue(OperationType::Crawl, crawl_queue.clone())
        .with_queue(OperationType::Scrape, scrape_queue.clone());
        let mut queues = HashMap::new();
        queues.insert(OperationType::Crawl, crawl_queue);
        queues.insert(OperationType::Scrape, scrape_queue);
        ApiState {
            store,
            controller: Arc::new(controller),
            queues,
        }
    }

    fn register(domain: &str, country: &str) -> Json<RegisterShopRequest> {
        Json(RegisterShopRequest {
            domain: domain.to_string(),
            country: country.to_string(),
        })
    }

    #[tokio::test]
    async fn register_and_get_shop() {
        let state = test_state();
        let resp = register_shop(State(state.clone()), register("shop.de", "DE"))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::CREATED);

        let resp = get_shop(State(state), Path("shop.de".to_string()))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn register_rejects_empty_fields() {
        let state = test_state();
        let resp = register_shop(State(state), register("", "DE"))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn register_conflicting_country_is_a_conflict() {
        let state = test_state();
        register_shop(State(state.clone()), register("shop.de", "DE")).await;
        let resp = register_shop(State(state), register("shop.de", "FR"))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn get_nonexistent_shop() {
        let state = test_state();
        let resp = get_shop(State(state), Path("nope.de".to_string()))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_shop_both_outcomes() {
        let state = test_state();
        register_shop(State(state.clone()), register("shop.de", "DE")).await;

        let resp = delete_shop(State(state.clone()), Path("shop.de".to_string()))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = delete_shop(State(state), Path("shop.de".to_string()))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn transitions_flow_through_the_store() {
        let state = test_state();
        register_shop(State(state.clone()), register("shop.de", "DE")).await;
        let started = Utc.with_ymd_and_hms(2026, 8, 29, 8, 0, 0).unwrap();

        let resp = record_started(
            State(state.clone()),
            Path(("shop.de".to_string(), "crawl".to_string())),
            Json(TransitionRequest { timestamp: Some(started) }),
        )
        .await
        .into_response();
        assert_eq!(resp.status(), StatusCode::OK);

        // Finishing before the start is rejected by the store.
        let resp = record_finished(
            State(state.clone()),
            Path(("shop.de".to_string(), "crawl".to_string())),
            Json(TransitionRequest { timestamp: Some(started - Duration::hours(1)) }),
        )
        .await
        .into_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let resp = record_finished(
            State(state),
            Path(("shop.de".to_string(), "crawl".to_string())),
            Json(TransitionRequest { timestamp: Some(started + Duration::hours(1)) }),
        )
        .await
        .into_response();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn transition_for_unknown_shop_is_not_found() {
        let state = test_state();
        let resp = record_started(
            State(state),
            Path(("nope.de".to_string(), "crawl".to_string())),
            Json(TransitionRequest::default()),
        )
        .await
        .into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn transition_with_unknown_operation_is_bad_request() {
        let state = test_state();
        let resp = record_started(
            State(state),
            Path(("shop.de".to_string(), "purge".to_string())),
            Json(TransitionRequest::default()),
        )
        .await
        .into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn orchestration_with_unknown_operation_is_bad_request() {
        let state = test_state();
        let resp = run_orchestration(
            State(state),
            Json(OrchestrationRequest {
                operation: "purge".to_string(),
                country: None,
                cutoff_days: None,
            }),
        )
        .await
        .into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn orchestration_then_receive_round_trip() {
        let state = test_state();
        register_shop(State(state.clone()), register("shop.de", "DE")).await;

        let resp = run_orchestration(
            State(state.clone()),
            Json(OrchestrationRequest {
                operation: "crawl".to_string(),
                country: None,
                cutoff_days: None,
            }),
        )
        .await
        .into_response();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = receive_work(
            State(state),
            Path("crawl".to_string()),
            Json(ReceiveRequest::default()),
        )
        .await
        .into_response();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
