//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize all subsystems from a validated configuration
//! - Compile the initial route table before traffic is accepted
//! - Start background tasks (refresher, routes file watcher, admin API)
//! - Serve until shutdown, then wait for the background tasks
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - Listeners are bound by the caller so tests can use ephemeral ports

use std::sync::Arc;
use std::time::Duration;

use axum::{body::Body, http::Request, http::StatusCode, response::IntoResponse, routing::any, Json, Router};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use crate::admin::{setup_admin_router, AdminState};
use crate::config::{GatewayConfig, RoutesFileWatcher};
use crate::error::GatewayError;
use crate::filter::circuit_breaker::ExecutionFailure;
use crate::filter::factory::{FilterDependencies, FilterRegistry};
use crate::filter::global::cached_body::BodyCachingRoutes;
use crate::filter::global::standard_filters;
use crate::handler::GatewayHandler;
use crate::http::{GatewayServer, HyperHttpClient};
use crate::lifecycle::Shutdown;
use crate::load_balancer::StaticServiceResolver;
use crate::predicate::PredicateRegistry;
use crate::resilience::CircuitBreakerPolicy;
use crate::route::{
    CompositeDefinitionSource, DefinitionSource, FileDefinitionSource, RefreshPolicy, RouteCompiler, RouteRefresher,
    RouteRepository, RouteTable, StaticDefinitionSource,
};
use crate::weight::WeightCalculator;

/// Path of the built-in fallback handler.
pub const FALLBACK_PATH: &str = "/fallback";

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),
}

/// A fully wired gateway, ready to serve.
pub struct Gateway {
    config: GatewayConfig,
    handler: Arc<GatewayHandler>,
    refresher: Arc<RouteRefresher>,
    weights: Arc<WeightCalculator>,
    shutdown: Arc<Shutdown>,
    refresh_tx: mpsc::Sender<()>,
    refresh_rx: mpsc::Receiver<()>,
}

impl Gateway {
    /// Build with the built-in local handlers.
    pub async fn build(config: GatewayConfig) -> Result<Self, StartupError> {
        Self::build_with_local(config, local_handlers()).await
    }

    /// Build with `local` serving `forward:` targets that match no route.
    pub async fn build_with_local(config: GatewayConfig, local: Router) -> Result<Self, StartupError> {
        let weights = Arc::new(WeightCalculator::new());
        for weight in &config.weights {
            weights.add_weight_config(weight.clone());
        }

        let body_caching = Arc::new(BodyCachingRoutes::new());
        let deps = FilterDependencies {
            body_caching: body_caching.clone(),
            resilience: Arc::new(CircuitBreakerPolicy::new(config.circuit_breaker.policy_config())),
            backoff: config.retries.backoff(),
        };
        let compiler = Arc::new(RouteCompiler::new(
            PredicateRegistry::with_defaults(),
            FilterRegistry::with_defaults(deps),
            config.gateway.default_filters.clone(),
        ));

        let mut sources: Vec<Arc<dyn DefinitionSource>> =
            vec![Arc::new(StaticDefinitionSource::new(config.routes.clone()))];
        if let Some(path) = &config.gateway.routes_file {
            sources.push(Arc::new(FileDefinitionSource::new(path.clone())));
        }

        let table = Arc::new(RouteTable::new());
        let refresher = Arc::new(RouteRefresher::new(
            Arc::new(RouteRepository::new()),
            Arc::new(CompositeDefinitionSource::new(sources)),
            compiler,
            table.clone(),
            weights.clone(),
            RefreshPolicy::from_fail_on_error(config.gateway.fail_on_route_definition_error),
        ));
        let outcome = refresher.refresh().await?;
        tracing::info!(
            definitions = outcome.definitions,
            active = outcome.active,
            "Initial routes compiled"
        );

        let resolver = Arc::new(StaticServiceResolver::from_config(&config.services)?);
        let client = Arc::new(HyperHttpClient::new(
            Duration::from_secs(config.timeouts.connect_secs),
            Duration::from_secs(config.timeouts.response_secs),
        ));
        let handler = GatewayHandler::new(table, weights.clone(), standard_filters(body_caching, resolver, client))
            .with_local_router(local)
            .with_max_forward_depth(config.gateway.max_forward_depth);

        let (refresh_tx, refresh_rx) = mpsc::channel(1);
        Ok(Self {
            config,
            handler: Arc::new(handler),
            refresher,
            weights,
            shutdown: Arc::new(Shutdown::new()),
            refresh_tx,
            refresh_rx,
        })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn handler(&self) -> Arc<GatewayHandler> {
        self.handler.clone()
    }

    pub fn refresher(&self) -> Arc<RouteRefresher> {
        self.refresher.clone()
    }

    pub fn shutdown(&self) -> Arc<Shutdown> {
        self.shutdown.clone()
    }

    /// Sender that requests an immediate refresh.
    pub fn refresh_trigger(&self) -> mpsc::Sender<()> {
        self.refresh_tx.clone()
    }

    pub fn admin_router(&self) -> Router {
        setup_admin_router(AdminState {
            refresher: self.refresher.clone(),
            weights: self.weights.clone(),
            api_key: Arc::from(self.config.admin.api_key.as_str()),
        })
    }

    /// Serve on `listener` (and the admin API on `admin`) until shutdown.
    pub async fn run(self, listener: TcpListener, admin: Option<TcpListener>) -> Result<(), StartupError> {
        let admin_router = self.admin_router();
        let _watcher = match &self.config.gateway.routes_file {
            Some(path) => Some(RoutesFileWatcher::new(path, self.refresh_tx.clone()).run()?),
            None => None,
        };

        let refresh_task = self.refresher.clone().spawn(
            self.config.gateway.refresh_interval(),
            self.refresh_rx,
            self.shutdown.subscribe(),
        );

        let admin_task = admin.map(|admin_listener| {
            let mut shutdown = self.shutdown.subscribe();
            tokio::spawn(async move {
                if let Ok(addr) = admin_listener.local_addr() {
                    tracing::info!(address = %addr, "Admin API listening");
                }
                let result = axum::serve(admin_listener, admin_router)
                    .with_graceful_shutdown(async move {
                        let _ = shutdown.recv().await;
                    })
                    .await;
                if let Err(e) = result {
                    tracing::error!(error = %e, "Admin API failed");
                }
            })
        });

        let server = GatewayServer::new(self.handler.clone(), &self.config.listener, &self.config.timeouts);
        let served = server.run(listener, self.shutdown.subscribe()).await;

        if !self.shutdown.is_triggered() {
            tracing::warn!("Listener stopped before shutdown was requested");
        }
        self.shutdown.trigger();
        let _ = refresh_task.await;
        if let Some(task) = admin_task {
            let _ = task.await;
        }
        served?;
        Ok(())
    }
}

/// In-process handlers reachable through `forward:` URIs.
pub fn local_handlers() -> Router {
    Router::new().route(FALLBACK_PATH, any(fallback))
}

async fn fallback(request: Request<Body>) -> impl IntoResponse {
    let reason = request
        .extensions()
        .get::<ExecutionFailure>()
        .map(|failure| failure.0.clone())
        .unwrap_or_else(|| "upstream unavailable".to_string());
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(serde_json::json!({ "error": "Service unavailable", "reason": reason })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::definition::{PluginDefinition, RouteDefinition};

    fn config_with(routes: Vec<RouteDefinition>) -> GatewayConfig {
        GatewayConfig {
            routes,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_build_compiles_config_routes() {
        let route = RouteDefinition::new("a", "http://localhost:9000")
            .with_predicate(PluginDefinition::parse("Path=/a/**").unwrap());
        let gateway = Gateway::build(config_with(vec![route])).await.unwrap();
        assert_eq!(gateway.handler().table().len(), 1);
    }

    #[tokio::test]
    async fn test_bad_route_skipped_unless_fail_policy() {
        let bad = RouteDefinition::new("bad", "http://localhost:9000")
            .with_predicate(PluginDefinition::parse("Nope=1").unwrap());

        let gateway = Gateway::build(config_with(vec![bad.clone()])).await.unwrap();
        assert!(gateway.handler().table().is_empty());

        let mut strict = config_with(vec![bad]);
        strict.gateway.fail_on_route_definition_error = true;
        assert!(matches!(
            Gateway::build(strict).await,
            Err(StartupError::Gateway(GatewayError::UnknownFactory { .. }))
        ));
    }

    #[tokio::test]
    async fn test_config_weights_pruned_to_compiled_routes() {
        let route = RouteDefinition::new("a", "http://localhost:9000")
            .with_predicate(PluginDefinition::parse("Path=/a/**").unwrap());
        let mut config = config_with(vec![route]);
        config.weights = vec![
            crate::weight::WeightConfig::new("g", "a", 1),
            crate::weight::WeightConfig::new("g", "ghost", 1),
        ];
        let gateway = Gateway::build(config).await.unwrap();
        assert_eq!(gateway.weights.group("g").unwrap().weights(), &[("a".to_string(), 1)]);
    }
}
