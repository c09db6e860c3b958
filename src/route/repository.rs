//! Authoritative in-memory route definition table.

use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::error::{GatewayError, GatewayResult};
use crate::route::definition::RouteDefinition;

/// Insertion-ordered definitions keyed by id; every write publishes a new list.
#[derive(Debug, Default)]
pub struct RouteRepository {
    definitions: ArcSwap<Vec<RouteDefinition>>,
}

impl RouteRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn list(&self) -> Arc<Vec<RouteDefinition>> {
        self.definitions.load_full()
    }

    pub fn get(&self, id: &str) -> GatewayResult<RouteDefinition> {
        self.definitions
            .load()
            .iter()
            .find(|d| d.id == id)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(id.to_string()))
    }

    /// Insert, or replace in place keeping the original position.
    pub fn upsert(&self, definition: RouteDefinition) -> GatewayResult<()> {
        if definition.id.trim().is_empty() {
            return Err(GatewayError::InvalidArgument("id may not be empty".into()));
        }
        self.definitions.rcu(|current| {
            let mut next = Vec::clone(current);
            match next.iter_mut().find(|d| d.id == definition.id) {
                Some(existing) => *existing = definition.clone(),
                None => next.push(definition.clone()),
            }
            next
        });
        Ok(())
    }

    pub fn remove(&self, id: &str) -> GatewayResult<RouteDefinition> {
        let mut removed = None;
        self.definitions.rcu(|current| {
            let mut next = Vec::clone(current);
            removed = next.iter().position(|d| d.id == id).map(|index| next.remove(index));
            next
        });
        removed.ok_or_else(|| GatewayError::NotFound(id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.definitions.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
