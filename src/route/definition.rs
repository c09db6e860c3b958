//! Declarative route definitions.
//!
//! A definition is the serializable form of a route before compilation.
//! Predicates and filters may be written either as shortcut strings
//! (`Path=/api/**`) or as `{ name, args }` tables.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{GatewayError, GatewayResult};
use crate::route::args::{parse_shortcut, Args};

/// Name plus argument set, resolved against a factory registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PluginRepr")]
pub struct PluginDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Args::is_empty")]
    pub args: Args,
}

/// Predicate entry of a route definition.
pub type PredicateDefinition = PluginDefinition;

/// Filter entry of a route definition.
pub type FilterDefinition = PluginDefinition;

impl PluginDefinition {
    pub fn new(name: impl Into<String>, args: Args) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }

    /// Parse the `Name=arg1,arg2` shortcut form.
    pub fn parse(text: &str) -> GatewayResult<Self> {
        let (name, args) = parse_shortcut(text)?;
        Ok(Self { name, args })
    }
}

impl fmt::Display for PluginDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.name, self.args)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PluginRepr {
    Shortcut(String),
    Full {
        name: String,
        #[serde(default)]
        args: Args,
    },
}

impl TryFrom<PluginRepr> for PluginDefinition {
    type Error = GatewayError;

    fn try_from(repr: PluginRepr) -> Result<Self, Self::Error> {
        match repr {
            PluginRepr::Shortcut(text) => PluginDefinition::parse(&text),
            PluginRepr::Full { name, args } => Ok(PluginDefinition { name, args }),
        }
    }
}

/// Declarative description of a route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteDefinition {
    /// Unique, non-empty route id.
    pub id: String,

    /// Target URI; may use logical schemes such as `lb` or `forward`.
    pub uri: String,

    #[serde(default)]
    pub predicates: Vec<PredicateDefinition>,

    #[serde(default)]
    pub filters: Vec<FilterDefinition>,

    /// Lower values are evaluated first.
    #[serde(default)]
    pub order: i32,

    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl RouteDefinition {
    pub fn new(id: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            uri: uri.into(),
            predicates: Vec::new(),
            filters: Vec::new(),
            order: 0,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_predicate(mut self, predicate: PredicateDefinition) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn with_filter(mut self, filter: FilterDefinition) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_mixed_forms() {
        let text = r#"
            id = "users"
            uri = "lb://user-service"
            order = 2
            predicates = ["Path=/user-service/**", { name = "Method", args = { methods = "GET" } }]
            filters = ["RewritePath=/user-service/(?<remaining>.*), /${remaining}"]

            [metadata]
            owner = "team-a"
        "#;
        let def: RouteDefinition = toml::from_str(text).unwrap();
        assert_eq!(def.id, "users");
        assert_eq!(def.order, 2);
        assert_eq!(def.predicates.len(), 2);
        assert_eq!(def.predicates[0].name, "Path");
        assert_eq!(def.predicates[1].args.get("methods"), Some("GET"));
        assert_eq!(def.filters[0].args.get("_genkey_1"), Some("/${remaining}"));
        assert_eq!(def.metadata["owner"], serde_json::json!("team-a"));
    }

    #[test]
    fn test_invalid_shortcut_rejected() {
        let text = r#"
            id = "bad"
            uri = "http://localhost"
            predicates = ["NoEquals"]
        "#;
        assert!(toml::from_str::<RouteDefinition>(text).is_err());
    }

    #[test]
    fn test_json_round_trip() {
        let def = RouteDefinition::new("r1", "http://localhost:9000")
            .with_predicate(PluginDefinition::parse("Path=/a/**").unwrap());
        let json = serde_json::to_string(&def).unwrap();
        let back: RouteDefinition = serde_json::from_str(&json).unwrap();
        assert_eq!(def, back);
    }
}
