//! Route table refresh.
//!
//! # Responsibilities
//! - Pull definitions from the source into the repository
//! - Recompile the repository and swap the table
//! - Republish weight groups from the table that was swapped in
//! - Run periodically, on trigger, until shutdown

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::error::GatewayResult;
use crate::observability::metrics;
use crate::route::compiler::{RefreshPolicy, RouteCompiler};
use crate::route::repository::RouteRepository;
use crate::route::source::DefinitionSource;
use crate::route::table::RouteTable;
use crate::weight::WeightCalculator;

/// Result of one refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RefreshOutcome {
    pub definitions: usize,
    pub active: usize,
}

pub struct RouteRefresher {
    repository: Arc<RouteRepository>,
    source: Arc<dyn DefinitionSource>,
    compiler: Arc<RouteCompiler>,
    table: Arc<RouteTable>,
    weights: Arc<WeightCalculator>,
    policy: RefreshPolicy,
    /// Ids supplied by the last successful pull. Also serializes refreshes.
    sourced: Mutex<HashSet<String>>,
}

impl RouteRefresher {
    pub fn new(
        repository: Arc<RouteRepository>,
        source: Arc<dyn DefinitionSource>,
        compiler: Arc<RouteCompiler>,
        table: Arc<RouteTable>,
        weights: Arc<WeightCalculator>,
        policy: RefreshPolicy,
    ) -> Self {
        Self {
            repository,
            source,
            compiler,
            table,
            weights,
            policy,
            sourced: Mutex::new(HashSet::new()),
        }
    }

    pub fn repository(&self) -> &Arc<RouteRepository> {
        &self.repository
    }

    pub fn table(&self) -> &Arc<RouteTable> {
        &self.table
    }

    pub fn compiler(&self) -> &Arc<RouteCompiler> {
        &self.compiler
    }

    /// Pull from the source, then recompile.
    pub async fn refresh(&self) -> GatewayResult<RefreshOutcome> {
        let mut sourced = self.sourced.lock().await;

        let fetched = match self.source.fetch().await {
            Ok(definitions) => definitions,
            Err(e) => {
                metrics::record_refresh("error");
                return Err(e);
            }
        };

        let fetched_ids: HashSet<String> = fetched.iter().map(|d| d.id.clone()).collect();
        for definition in fetched {
            let id = definition.id.clone();
            if let Err(e) = self.repository.upsert(definition) {
                tracing::warn!(route_id = %id, error = %e, "RouteDefinition will be ignored");
            }
        }
        for stale in sourced.difference(&fetched_ids) {
            if self.repository.remove(stale).is_ok() {
                tracing::debug!(route_id = %stale, "Removed route no longer supplied by source");
            }
        }
        *sourced = fetched_ids;

        self.publish()
    }

    /// Recompile the repository as it is now, without pulling.
    pub async fn recompile(&self) -> GatewayResult<RefreshOutcome> {
        let _guard = self.sourced.lock().await;
        self.publish()
    }

    fn publish(&self) -> GatewayResult<RefreshOutcome> {
        let definitions = self.repository.list();
        let routes = match self.compiler.compile_all(&definitions, self.policy) {
            Ok(routes) => routes,
            Err(e) => {
                metrics::record_refresh("error");
                return Err(e);
            }
        };

        let ids: HashSet<String> = routes.iter().map(|r| r.id().to_string()).collect();
        let route_weights = routes.iter().flat_map(|r| r.weight_configs().iter().cloned()).collect();
        let active = routes.len();
        self.table.replace(routes);
        self.weights.publish_routes(route_weights, ids);

        metrics::set_routes_active(active);
        metrics::record_refresh("success");
        tracing::info!(definitions = definitions.len(), active, "Routes refreshed");
        Ok(RefreshOutcome {
            definitions: definitions.len(),
            active,
        })
    }

    /// Refresh every `period` and on each trigger until shutdown.
    pub fn spawn(
        self: Arc<Self>,
        period: Duration,
        mut triggers: mpsc::Receiver<()>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!(interval_secs = period.as_secs(), "Route refresher starting");
            let mut ticker = time::interval_at(time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    Some(()) = triggers.recv() => {
                        tracing::debug!("Route refresh requested");
                    }
                    _ = shutdown.recv() => {
                        tracing::info!("Route refresher received shutdown signal, exiting loop");
                        break;
                    }
                }
                if let Err(e) = self.refresh().await {
                    tracing::warn!(error = %e, "Route refresh failed, keeping previous routes");
                }
            }
        })
    }
}
