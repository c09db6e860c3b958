use std::collections::BTreeMap;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;

use crate::admin::AdminState;
use crate::error::{GatewayError, GatewayResult};
use crate::route::definition::RouteDefinition;
use crate::route::refresh::RefreshOutcome;
use crate::route::RouteSummary;
use crate::weight::{GroupWeightConfig, WeightConfig};

pub async fn list_definitions(State(state): State<AdminState>) -> Json<Vec<RouteDefinition>> {
    Json(state.refresher.repository().list().to_vec())
}

pub async fn get_definition(
    State(state): State<AdminState>,
    Path(id): Path<String>,
) -> GatewayResult<Json<RouteDefinition>> {
    Ok(Json(state.refresher.repository().get(&id)?))
}

pub async fn list_compiled(State(state): State<AdminState>) -> Json<Vec<RouteSummary>> {
    let routes = state.refresher.table().snapshot();
    Json(routes.iter().map(|r| r.summary()).collect())
}

pub async fn save_definition(
    State(state): State<AdminState>,
    Json(definition): Json<RouteDefinition>,
) -> GatewayResult<(StatusCode, Json<RefreshOutcome>)> {
    if let Err(e) = state.refresher.compiler().compile(&definition) {
        tracing::warn!(route_id = %definition.id, error = %e, "Rejected route definition");
        return Err(match e {
            GatewayError::InvalidArgument(_) => e,
            other => GatewayError::InvalidArgument(other.to_string()),
        });
    }
    let id = definition.id.clone();
    state.refresher.repository().upsert(definition)?;
    tracing::info!(route_id = %id, "Saved route definition");
    let outcome = state.refresher.recompile().await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

pub async fn delete_definition(
    State(state): State<AdminState>,
    Path(id): Path<String>,
) -> GatewayResult<Json<RefreshOutcome>> {
    state.refresher.repository().remove(&id)?;
    tracing::info!(route_id = %id, "Deleted route definition");
    Ok(Json(state.refresher.recompile().await?))
}

pub async fn refresh_routes(State(state): State<AdminState>) -> GatewayResult<Json<RefreshOutcome>> {
    Ok(Json(state.refresher.refresh().await?))
}

pub async fn list_weights(State(state): State<AdminState>) -> Json<BTreeMap<String, GroupWeightConfig>> {
    let groups = state.weights.snapshot();
    Json(
        groups
            .iter()
            .map(|(name, group)| (name.clone(), GroupWeightConfig::clone(group)))
            .collect(),
    )
}

/// Result of saving an explicit weight.
#[derive(Debug, Serialize)]
pub struct WeightUpdate {
    pub config: WeightConfig,
    /// False while the route is not compiled; the weight is kept and takes
    /// effect with the refresh that compiles it.
    pub active: bool,
    pub group: Option<GroupWeightConfig>,
}

pub async fn save_weight(
    State(state): State<AdminState>,
    Json(config): Json<WeightConfig>,
) -> GatewayResult<Json<WeightUpdate>> {
    if config.group.trim().is_empty() || config.route_id.trim().is_empty() {
        return Err(GatewayError::InvalidArgument("group and route_id are required".into()));
    }
    state.weights.add_weight_config(config.clone());
    let active = state.weights.is_active(&config.group, &config.route_id);
    if !active {
        tracing::info!(
            group = %config.group,
            route_id = %config.route_id,
            "Saved weight for a route that is not compiled; it stays inactive until the route compiles"
        );
    }
    let group = state.weights.group(&config.group).map(|g| GroupWeightConfig::clone(&g));
    Ok(Json(WeightUpdate { config, active, group }))
}
