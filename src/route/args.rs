//! Predicate/filter argument sets and their binding into factory configs.
//!
//! # Responsibilities
//! - Keep arguments in declaration order (positional binding depends on it)
//! - Expand the `Name=a,b` shortcut into generated keys
//! - Map generated keys onto a factory's declared field order
//!
//! # Design Decisions
//! - Named arguments must be declared by the factory; unknown names fail
//! - A gather-list factory receives every shortcut value in its single field

use std::fmt;
use std::str::FromStr;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{GatewayError, GatewayResult};

/// Prefix of keys produced by the shortcut syntax.
pub const GENERATED_KEY_PREFIX: &str = "_genkey_";

/// Ordered argument set of a predicate or filter definition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Args(Vec<(String, String)>);

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build generated-key arguments from the text after `=`.
    pub fn from_shortcut(text: &str) -> Self {
        let values = text
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .enumerate()
            .map(|(i, v)| (format!("{}{}", GENERATED_KEY_PREFIX, i), v.to_string()))
            .collect();
        Self(values)
    }

    /// Insert or replace a named argument, keeping its original position.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.0.push((key, value)),
        }
    }

    /// Builder-style [`Args::insert`].
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn is_shortcut(&self) -> bool {
        !self.0.is_empty() && self.0.iter().all(|(k, _)| k.starts_with(GENERATED_KEY_PREFIX))
    }
}

impl fmt::Display for Args {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (k, v)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}={}", k, v)?;
        }
        write!(f, "}}")
    }
}

impl Serialize for Args {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// Scalar argument values accepted from config files.
#[derive(Deserialize)]
#[serde(untagged)]
enum ArgValue {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl From<ArgValue> for String {
    fn from(value: ArgValue) -> Self {
        match value {
            ArgValue::Text(s) => s,
            ArgValue::Int(i) => i.to_string(),
            ArgValue::Float(f) => f.to_string(),
            ArgValue::Bool(b) => b.to_string(),
        }
    }
}

struct ArgsVisitor;

impl<'de> Visitor<'de> for ArgsVisitor {
    type Value = Args;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map of argument names to scalar values")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Args, A::Error> {
        let mut args = Args::new();
        while let Some((key, value)) = access.next_entry::<String, ArgValue>()? {
            args.insert(key, String::from(value));
        }
        Ok(args)
    }
}

impl<'de> Deserialize<'de> for Args {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(ArgsVisitor)
    }
}

/// How shortcut values map onto configuration fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShortcutType {
    /// Positional: value `i` binds to field `i`.
    #[default]
    Default,
    /// Every value is appended to the single declared field.
    GatherList,
}

/// Split `Name=a,b` into its name and generated-key arguments.
pub fn parse_shortcut(text: &str) -> GatewayResult<(String, Args)> {
    let (name, rest) = text.split_once('=').ok_or_else(|| {
        GatewayError::InvalidArgument(format!("Unable to parse definition text '{}'", text))
    })?;
    let name = name.trim();
    if name.is_empty() {
        return Err(GatewayError::InvalidArgument(format!(
            "Definition text '{}' has an empty name",
            text
        )));
    }
    Ok((name.to_string(), Args::from_shortcut(rest)))
}

/// Arguments after binding against a factory's declared fields.
#[derive(Debug, Clone)]
pub struct BoundArgs {
    name: String,
    values: Vec<(String, String)>,
}

impl BoundArgs {
    /// Bind `args` for factory `name` declaring `fields`.
    pub fn bind(
        name: &str,
        args: &Args,
        fields: &[&'static str],
        shortcut: ShortcutType,
    ) -> GatewayResult<Self> {
        let values = if args.is_shortcut() {
            match shortcut {
                ShortcutType::Default => {
                    if args.len() > fields.len() {
                        return Err(GatewayError::binding(
                            name,
                            format!("expected at most {} arguments, got {}", fields.len(), args.len()),
                        ));
                    }
                    fields
                        .iter()
                        .zip(args.iter())
                        .map(|(field, (_, v))| (field.to_string(), v.to_string()))
                        .collect()
                }
                ShortcutType::GatherList => {
                    let field = match fields {
                        [field] => *field,
                        _ => {
                            return Err(GatewayError::binding(
                                name,
                                "gather-list shortcut requires exactly one field",
                            ))
                        }
                    };
                    args.iter().map(|(_, v)| (field.to_string(), v.to_string())).collect()
                }
            }
        } else {
            let mut values = Vec::with_capacity(args.len());
            for (key, value) in args.iter() {
                if !fields.contains(&key) {
                    return Err(GatewayError::binding(name, format!("unknown argument '{}'", key)));
                }
                values.push((key.to_string(), value.to_string()));
            }
            values
        };

        Ok(Self {
            name: name.to_string(),
            values,
        })
    }

    /// Factory name these arguments were bound for.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn optional(&self, field: &str) -> Option<&str> {
        self.values.iter().find(|(k, _)| k == field).map(|(_, v)| v.as_str())
    }

    pub fn required(&self, field: &str) -> GatewayResult<&str> {
        self.optional(field)
            .ok_or_else(|| GatewayError::binding(&self.name, format!("missing required field '{}'", field)))
    }

    /// Every value of `field`, with comma-separated named values expanded.
    pub fn list(&self, field: &str) -> Vec<String> {
        self.values
            .iter()
            .filter(|(k, _)| k == field)
            .flat_map(|(_, v)| v.split(','))
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn parse<T>(&self, field: &str) -> GatewayResult<Option<T>>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        match self.optional(field) {
            None => Ok(None),
            Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|e| {
                GatewayError::binding(&self.name, format!("field '{}' value '{}': {}", field, raw, e))
            }),
        }
    }

    pub fn parse_required<T>(&self, field: &str) -> GatewayResult<T>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        self.parse(field)?
            .ok_or_else(|| GatewayError::binding(&self.name, format!("missing required field '{}'", field)))
    }
}
