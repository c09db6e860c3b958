//! Weighted traffic splitting.
//!
//! # Data Flow
//! ```text
//! WeightConfig { group, route_id, weight }
//!     compiled Weight predicates  → WeightCalculator::publish_routes (after a table swap)
//!     admin API / config file     → WeightCalculator::add_weight_config
//!     → every group rebuilt from both sources, compiled routes only
//!     → one atomic swap of the group map
//!
//! Per request (before route lookup):
//!     draw r ∈ [0,1) per group → ranges[i] <= r < ranges[i+1]
//!     → ctx.weights[group] = route_id
//!     → Weight predicate matches the selected route only
//! ```
//!
//! # Design Decisions
//! - A published GroupWeightConfig is never mutated; updates build a new one
//! - Explicit weights override a route's own Weight predicate
//! - Explicit weights naming a route that is not compiled are kept but stay
//!   out of the published groups until the route compiles
//! - Groups are kept in a sorted map so seeded draws are reproducible
//! - Draws across groups are independent

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use arc_swap::ArcSwap;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::context::RequestContext;

/// Weight of one route inside a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightConfig {
    pub group: String,
    #[serde(alias = "routeId")]
    pub route_id: String,
    pub weight: u32,
}

impl WeightConfig {
    pub fn new(group: impl Into<String>, route_id: impl Into<String>, weight: u32) -> Self {
        Self {
            group: group.into(),
            route_id: route_id.into(),
            weight,
        }
    }
}

/// Derived, immutable weight table of one group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupWeightConfig {
    group: String,
    /// Route weights in first-seen order; this order fixes the range layout.
    weights: Vec<(String, u32)>,
    normalized: Vec<f64>,
    /// `members + 1` boundaries from 0.0 to 1.0, empty when the sum is zero.
    ranges: Vec<f64>,
}

impl GroupWeightConfig {
    fn empty(group: &str) -> Self {
        Self {
            group: group.to_string(),
            weights: Vec::new(),
            normalized: Vec::new(),
            ranges: Vec::new(),
        }
    }

    fn recompute(group: String, weights: Vec<(String, u32)>) -> Self {
        let sum: u64 = weights.iter().map(|(_, w)| u64::from(*w)).sum();
        if sum == 0 {
            return Self {
                normalized: vec![0.0; weights.len()],
                group,
                weights,
                ranges: Vec::new(),
            };
        }

        let normalized: Vec<f64> = weights.iter().map(|(_, w)| f64::from(*w) / sum as f64).collect();
        let mut ranges = Vec::with_capacity(normalized.len() + 1);
        ranges.push(0.0);
        for n in &normalized {
            let previous = ranges[ranges.len() - 1];
            ranges.push(previous + n);
        }
        // Pin the end so accumulated rounding never leaves a gap below 1.0.
        if let Some(last) = ranges.last_mut() {
            *last = 1.0;
        }

        Self {
            group,
            weights,
            normalized,
            ranges,
        }
    }

    /// Copy with `route_id` upserted to `weight`.
    fn with_weight(&self, route_id: &str, weight: u32) -> Self {
        let mut weights = self.weights.clone();
        match weights.iter_mut().find(|(id, _)| id == route_id) {
            Some(entry) => entry.1 = weight,
            None => weights.push((route_id.to_string(), weight)),
        }
        Self::recompute(self.group.clone(), weights)
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn weights(&self) -> &[(String, u32)] {
        &self.weights
    }

    pub fn ranges(&self) -> &[f64] {
        &self.ranges
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// False when every weight is zero; such a group selects nothing.
    pub fn is_active(&self) -> bool {
        self.ranges.len() > 1
    }

    pub fn normalized_weight(&self, route_id: &str) -> Option<f64> {
        self.weights
            .iter()
            .position(|(id, _)| id == route_id)
            .map(|i| self.normalized[i])
    }

    /// Route owning range segment `index`.
    pub fn route_at(&self, index: usize) -> Option<&str> {
        self.weights.get(index).map(|(id, _)| id.as_str())
    }

    /// Route whose segment contains `r`.
    pub fn select(&self, r: f64) -> Option<&str> {
        if !self.is_active() {
            return None;
        }
        for i in 0..self.ranges.len() - 1 {
            if self.ranges[i] <= r && r < self.ranges[i + 1] {
                return self.route_at(i);
            }
        }
        // r == 1.0 only from a broken generator: clamp to the last non-empty segment.
        (0..self.ranges.len() - 1)
            .rev()
            .find(|&i| self.ranges[i] < self.ranges[i + 1])
            .and_then(|i| self.route_at(i))
    }
}

/// Inputs the published groups are rebuilt from.
#[derive(Debug, Default)]
struct WeightSources {
    /// Admin and config weights, in arrival order.
    explicit: Vec<WeightConfig>,
    /// Weights carried by the compiled table's Weight predicates.
    from_routes: Vec<WeightConfig>,
    /// Ids of the compiled table; `None` until the first table is published.
    compiled: Option<HashSet<String>>,
}

impl WeightSources {
    fn upsert_explicit(&mut self, config: WeightConfig) {
        match self
            .explicit
            .iter_mut()
            .find(|c| c.group == config.group && c.route_id == config.route_id)
        {
            Some(existing) => existing.weight = config.weight,
            None => self.explicit.push(config),
        }
    }

    fn is_compiled(&self, route_id: &str) -> bool {
        self.compiled.as_ref().map_or(true, |ids| ids.contains(route_id))
    }

    fn build(&self) -> BTreeMap<String, Arc<GroupWeightConfig>> {
        let mut groups: BTreeMap<String, GroupWeightConfig> = BTreeMap::new();
        for config in self.from_routes.iter().chain(self.explicit.iter()) {
            if !self.is_compiled(&config.route_id) {
                tracing::debug!(
                    group = %config.group,
                    route_id = %config.route_id,
                    "Weight inactive until its route is compiled"
                );
                continue;
            }
            let next = match groups.get(&config.group) {
                Some(existing) => existing.with_weight(&config.route_id, config.weight),
                None => GroupWeightConfig::empty(&config.group).with_weight(&config.route_id, config.weight),
            };
            groups.insert(config.group.clone(), next);
        }
        groups.into_iter().map(|(name, group)| (name, Arc::new(group))).collect()
    }
}

/// Maintains group weight tables and draws per-request selections.
#[derive(Debug)]
pub struct WeightCalculator {
    groups: ArcSwap<BTreeMap<String, Arc<GroupWeightConfig>>>,
    /// Held while rebuilding so concurrent writers publish in order.
    sources: Mutex<WeightSources>,
    seeded: Option<Mutex<StdRng>>,
}

impl Default for WeightCalculator {
    fn default() -> Self {
        Self::new()
    }
}

impl WeightCalculator {
    pub fn new() -> Self {
        Self {
            groups: ArcSwap::from_pointee(BTreeMap::new()),
            sources: Mutex::new(WeightSources::default()),
            seeded: None,
        }
    }

    /// Calculator drawing from a deterministic generator.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seeded: Some(Mutex::new(StdRng::seed_from_u64(seed))),
            ..Self::new()
        }
    }

    fn sources(&self) -> MutexGuard<'_, WeightSources> {
        self.sources.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn publish(&self, sources: &WeightSources) {
        let groups = sources.build();
        for group in groups.values() {
            tracing::trace!(
                group = %group.group(),
                weights = ?group.weights(),
                ranges = ?group.ranges(),
                "Recalculated group weight config"
            );
        }
        self.groups.store(Arc::new(groups));
    }

    /// Upsert an explicit member weight and republish.
    pub fn add_weight_config(&self, config: WeightConfig) {
        let mut sources = self.sources();
        sources.upsert_explicit(config);
        self.publish(&sources);
    }

    /// Replace the route-carried weights with those of a newly swapped-in
    /// table whose route ids are `compiled`, then republish.
    pub fn publish_routes(&self, from_routes: Vec<WeightConfig>, compiled: HashSet<String>) {
        let mut sources = self.sources();
        sources.from_routes = from_routes;
        sources.compiled = Some(compiled);
        self.publish(&sources);
    }

    /// True when `route_id` takes part in the published `group`.
    pub fn is_active(&self, group: &str, route_id: &str) -> bool {
        self.group(group)
            .is_some_and(|g| g.weights().iter().any(|(id, _)| id == route_id))
    }

    pub fn group(&self, name: &str) -> Option<Arc<GroupWeightConfig>> {
        self.groups.load().get(name).cloned()
    }

    pub fn snapshot(&self) -> Arc<BTreeMap<String, Arc<GroupWeightConfig>>> {
        self.groups.load_full()
    }

    /// One independent draw per group.
    pub fn choose<R: Rng + ?Sized>(&self, rng: &mut R) -> HashMap<String, String> {
        let groups = self.groups.load();
        let mut selected = HashMap::with_capacity(groups.len());
        for (name, config) in groups.iter() {
            if !config.is_active() {
                tracing::debug!(group = %name, "Weight group has no positive weights");
                continue;
            }
            let r: f64 = rng.gen();
            if let Some(route_id) = config.select(r) {
                selected.insert(name.clone(), route_id.to_string());
            }
        }
        selected
    }

    /// Record this request's selections in its context.
    pub fn apply(&self, ctx: &mut RequestContext) {
        let selected = match &self.seeded {
            Some(rng) => match rng.lock() {
                Ok(mut rng) => self.choose(&mut *rng),
                Err(poisoned) => self.choose(&mut *poisoned.into_inner()),
            },
            None => self.choose(&mut rand::thread_rng()),
        };
        tracing::trace!(weights = ?selected, "Weights attr");
        ctx.weights_mut().extend(selected);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn calculator_2_7_1(seed: u64) -> WeightCalculator {
        let calc = WeightCalculator::with_seed(seed);
        calc.add_weight_config(WeightConfig::new("group1", "route1", 2));
        calc.add_weight_config(WeightConfig::new("group1", "route2", 7));
        calc.add_weight_config(WeightConfig::new("group1", "route3", 1));
        calc
    }

    #[test]
    fn test_normalized_weights_and_ranges() {
        let calc = calculator_2_7_1(1);
        let group = calc.group("group1").unwrap();

        let sum: f64 = ["route1", "route2", "route3"]
            .iter()
            .map(|id| group.normalized_weight(id).unwrap())
            .sum();
        assert!((sum - 1.0).abs() < 1e-9);
        assert_eq!(group.ranges().len(), group.len() + 1);
        assert_eq!(group.ranges()[0], 0.0);
        assert_eq!(*group.ranges().last().unwrap(), 1.0);
        assert!(group.ranges().windows(2).all(|w| w[0] <= w[1]));
        assert!((group.ranges()[1] - 0.2).abs() < 1e-9);
        assert!((group.ranges()[2] - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_upsert_replaces_weight() {
        let calc = calculator_2_7_1(1);
        let before = calc.group("group1").unwrap();
        calc.add_weight_config(WeightConfig::new("group1", "route2", 2));
        let after = calc.group("group1").unwrap();

        // The old snapshot is untouched.
        assert_eq!(before.weights()[1], ("route2".to_string(), 7));
        assert_eq!(after.weights()[1], ("route2".to_string(), 2));
        assert_eq!(after.len(), 3);
        assert!((after.normalized_weight("route2").unwrap() - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_selection_fairness() {
        let calc = calculator_2_7_1(42);
        let mut counts: HashMap<String, usize> = HashMap::new();
        let draws = 100_000;
        for _ in 0..draws {
            let mut ctx = RequestContext::new(
                axum::http::Request::builder()
                    .body(axum::body::Body::empty())
                    .unwrap(),
            );
            calc.apply(&mut ctx);
            *counts.entry(ctx.weights()["group1"].clone()).or_default() += 1;
        }

        for (route, expected) in [("route1", 0.2), ("route2", 0.7), ("route3", 0.1)] {
            let freq = counts[route] as f64 / draws as f64;
            assert!((freq - expected).abs() < 0.01, "{} frequency {} not near {}", route, freq, expected);
        }
    }

    #[test]
    fn test_select_boundaries() {
        let calc = calculator_2_7_1(1);
        let group = calc.group("group1").unwrap();
        assert_eq!(group.select(0.0), Some("route1"));
        assert_eq!(group.select(0.2), Some("route2"));
        assert_eq!(group.select(0.95), Some("route3"));
        assert_eq!(group.select(1.0), Some("route3"));
    }

    #[test]
    fn test_clamp_skips_zero_weight_tail() {
        let calc = WeightCalculator::new();
        calc.add_weight_config(WeightConfig::new("g", "a", 1));
        calc.add_weight_config(WeightConfig::new("g", "b", 0));
        let group = calc.group("g").unwrap();
        assert_eq!(group.select(1.0), Some("a"));
    }

    #[test]
    fn test_zero_sum_group_has_no_effect() {
        let calc = WeightCalculator::new();
        calc.add_weight_config(WeightConfig::new("g", "a", 0));
        let group = calc.group("g").unwrap();
        assert!(!group.is_active());
        assert!(calc.choose(&mut StdRng::seed_from_u64(3)).is_empty());
    }

    #[test]
    fn test_publish_routes_rebuilds_groups() {
        let calc = WeightCalculator::new();
        calc.publish_routes(
            vec![WeightConfig::new("g1", "a", 1), WeightConfig::new("g1", "b", 1)],
            ["a".to_string(), "b".to_string()].into(),
        );
        assert_eq!(calc.group("g1").unwrap().len(), 2);

        // b moves to another group: g1 no longer names it.
        calc.publish_routes(
            vec![WeightConfig::new("g1", "a", 1), WeightConfig::new("g2", "b", 1)],
            ["a".to_string(), "b".to_string()].into(),
        );
        assert_eq!(calc.group("g1").unwrap().weights(), &[("a".to_string(), 1)]);
        assert_eq!(calc.group("g2").unwrap().weights(), &[("b".to_string(), 1)]);

        calc.publish_routes(Vec::new(), HashSet::new());
        assert!(calc.snapshot().is_empty());
    }

    #[test]
    fn test_explicit_weight_waits_for_compiled_route() {
        let calc = WeightCalculator::new();
        calc.publish_routes(vec![WeightConfig::new("g", "a", 1)], ["a".to_string()].into());

        calc.add_weight_config(WeightConfig::new("g", "later", 5));
        assert!(!calc.is_active("g", "later"));
        assert_eq!(calc.group("g").unwrap().len(), 1);

        calc.publish_routes(
            vec![WeightConfig::new("g", "a", 1)],
            ["a".to_string(), "later".to_string()].into(),
        );
        assert!(calc.is_active("g", "later"));
        assert!((calc.group("g").unwrap().normalized_weight("later").unwrap() - 5.0 / 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_explicit_weight_overrides_route_weight() {
        let calc = WeightCalculator::new();
        calc.add_weight_config(WeightConfig::new("g", "a", 9));
        calc.publish_routes(
            vec![WeightConfig::new("g", "a", 1), WeightConfig::new("g", "b", 1)],
            ["a".to_string(), "b".to_string()].into(),
        );
        let group = calc.group("g").unwrap();
        assert_eq!(group.weights(), &[("a".to_string(), 9), ("b".to_string(), 1)]);
    }
}
