//! shopwatch-api — REST API for the shop fleet.
//!
//! Provides axum route handlers for the shop registry, lifecycle
//! transitions reported by workers, orchestration runs, and worker-side
//! queue receives.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/api/v1/shops` | List registered shops |
//! | POST | `/api/v1/shops` | Register a shop |
//! | GET | `/api/v1/shops/:domain` | Get one shop |
//! | DELETE | `/api/v1/shops/:domain` | Delete a shop |
//! | POST | `/api/v1/shops/:domain/operations/:op/started` | Record an operation start |
//! | POST | `/api/v1/shops/:domain/operations/:op/finished` | Record an operation completion |
//! | POST | `/api/v1/orchestrations` | Run an orchestration |
//! | POST | `/api/v1/work/:op/receive` | Pull work messages (worker side) |

pub mod handlers;

use std::collections::HashMap;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};

use shopwatch_core::ports::WorkQueue;
use shopwatch_core::types::OperationType;
use shopwatch_orchestrator::OrchestrationController;
use shopwatch_state::ShopStateStore;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub store: ShopStateStore,
    pub controller: Arc<OrchestrationController>,
    pub queues: HashMap<OperationType, Arc<dyn WorkQueue>>,
}

/// Build the complete API router.
pub fn build_router(state: ApiState) -> Router {
    let api_routes = Router::new()
        .route("/shops", get(handlers::list_shops).post(handlers::register_shop))
        .route("/shops/{domain}", get(handlers::get_shop).delete(handlers::delete_shop))
        .route("/shops/{domain}/operations/{op}/started", post(handlers::record_started))
        .route("/shops/{domain}/operations/{op}/finished", post(handlers::record_finished))
        .route("/orchestrations", post(handlers::run_orchestration))
        .route("/work/{op}/receive", post(handlers::receive_work))
        .with_state(state);

    Router::new().nest("/api/v1", api_routes)
}
