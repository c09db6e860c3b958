//! Producers of route definitions.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{GatewayError, GatewayResult};
use crate::route::definition::RouteDefinition;

/// Produces the full definition set on demand.
#[async_trait]
pub trait DefinitionSource: Send + Sync + fmt::Debug {
    async fn fetch(&self) -> GatewayResult<Vec<RouteDefinition>>;
}

/// Fixed definitions, e.g. the `[[routes]]` of the main config file.
#[derive(Debug, Clone, Default)]
pub struct StaticDefinitionSource {
    definitions: Vec<RouteDefinition>,
}

impl StaticDefinitionSource {
    pub fn new(definitions: Vec<RouteDefinition>) -> Self {
        Self { definitions }
    }
}

#[async_trait]
impl DefinitionSource for StaticDefinitionSource {
    async fn fetch(&self) -> GatewayResult<Vec<RouteDefinition>> {
        Ok(self.definitions.clone())
    }
}

#[derive(Debug, Deserialize)]
struct RoutesFile {
    #[serde(default)]
    routes: Vec<RouteDefinition>,
}

/// TOML file of `[[routes]]`, re-read on every fetch.
#[derive(Debug, Clone)]
pub struct FileDefinitionSource {
    path: PathBuf,
}

impl FileDefinitionSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl DefinitionSource for FileDefinitionSource {
    async fn fetch(&self) -> GatewayResult<Vec<RouteDefinition>> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| GatewayError::DefinitionSource(format!("{}: {}", self.path.display(), e)))?;
        let file: RoutesFile = toml::from_str(&content)
            .map_err(|e| GatewayError::DefinitionSource(format!("{}: {}", self.path.display(), e)))?;
        tracing::debug!(path = %self.path.display(), routes = file.routes.len(), "Read route definitions");
        Ok(file.routes)
    }
}

/// Concatenation of several sources, in order.
#[derive(Debug, Clone, Default)]
pub struct CompositeDefinitionSource {
    sources: Vec<Arc<dyn DefinitionSource>>,
}

impl CompositeDefinitionSource {
    pub fn new(sources: Vec<Arc<dyn DefinitionSource>>) -> Self {
        Self { sources }
    }
}

#[async_trait]
impl DefinitionSource for CompositeDefinitionSource {
    async fn fetch(&self) -> GatewayResult<Vec<RouteDefinition>> {
        let mut definitions = Vec::new();
        for source in &self.sources {
            definitions.extend(source.fetch().await?);
        }
        Ok(definitions)
    }
}
