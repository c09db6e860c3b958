//! Admin API.
//!
//! # Data Flow
//! ```text
//! Authorization: Bearer <api_key>
//!     → auth.rs (reject with 401 otherwise)
//!     → handlers.rs
//!         - route definitions: RouteRepository, then RouteRefresher::recompile
//!         - compiled routes: RouteTable snapshot
//!         - weights: WeightCalculator
//! ```
//!
//! # Design Decisions
//! - Served on its own listener, never through the gateway routes
//! - A posted definition is compiled once before it is stored, so a bad
//!   definition is rejected instead of being dropped at the next refresh

pub mod auth;
pub mod handlers;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};

use crate::route::RouteRefresher;
use crate::weight::WeightCalculator;

use self::auth::admin_auth_middleware;
use self::handlers::*;

/// Shared state of the admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub refresher: Arc<RouteRefresher>,
    pub weights: Arc<WeightCalculator>,
    pub api_key: Arc<str>,
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/routes", get(list_definitions).post(save_definition))
        .route("/admin/routes/compiled", get(list_compiled))
        .route("/admin/routes/{id}", delete(delete_definition).get(get_definition))
        .route("/admin/refresh", post(refresh_routes))
        .route("/admin/weights", get(list_weights).post(save_weight))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}
