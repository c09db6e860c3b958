//! Path predicate: `Path=/api/**,/v2/{segment}`.

use std::sync::Arc;

use async_trait::async_trait;

use crate::context::RequestContext;
use crate::error::{GatewayError, GatewayResult};
use crate::predicate::pattern::AntPattern;
use crate::predicate::{BoxedPredicate, PredicateFactory, RoutePredicate};
use crate::route::args::{BoundArgs, ShortcutType};

/// Matches the request path against any of its patterns.
#[derive(Debug)]
pub struct PathPredicate {
    patterns: Vec<AntPattern>,
}

impl PathPredicate {
    pub fn new(patterns: &[String]) -> GatewayResult<Self> {
        let patterns = patterns
            .iter()
            .map(|p| AntPattern::path(p))
            .collect::<GatewayResult<Vec<_>>>()?;
        Ok(Self { patterns })
    }
}

#[async_trait]
impl RoutePredicate for PathPredicate {
    async fn test(&self, ctx: &mut RequestContext) -> GatewayResult<bool> {
        let path = ctx.path().to_string();
        for pattern in &self.patterns {
            if let Some(vars) = pattern.captures(&path) {
                tracing::trace!(pattern = %pattern.as_str(), path = %path, "Path matches");
                ctx.uri_template_vars_mut().extend(vars);
                return Ok(true);
            }
        }
        Ok(false)
    }
}

pub struct PathPredicateFactory;

impl PredicateFactory for PathPredicateFactory {
    fn name(&self) -> &'static str {
        "Path"
    }

    fn fields(&self) -> &'static [&'static str] {
        &["patterns"]
    }

    fn shortcut_type(&self) -> ShortcutType {
        ShortcutType::GatherList
    }

    fn apply(&self, _route_id: &str, args: &BoundArgs) -> GatewayResult<BoxedPredicate> {
        let patterns = args.list("patterns");
        if patterns.is_empty() {
            return Err(GatewayError::binding(args.name(), "at least one pattern is required"));
        }
        Ok(Arc::new(PathPredicate::new(&patterns)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;

    fn ctx(uri: &str) -> RequestContext {
        RequestContext::new(Request::builder().uri(uri).body(Body::empty()).unwrap())
    }

    #[tokio::test]
    async fn test_path_patterns() {
        let predicate = PathPredicate::new(&["/red/{segment}".into(), "/blue/**".into()]).unwrap();

        let mut red = ctx("http://gw/red/1?x=y");
        assert!(predicate.test(&mut red).await.unwrap());
        assert_eq!(red.uri_template_vars()["segment"], "1");

        assert!(predicate.test(&mut ctx("/blue/a/b")).await.unwrap());
        assert!(!predicate.test(&mut ctx("/green/1")).await.unwrap());
    }

    #[test]
    fn test_factory_requires_pattern() {
        let args = BoundArgs::bind("Path", &Default::default(), &["patterns"], ShortcutType::GatherList).unwrap();
        assert!(PathPredicateFactory.apply("r", &args).is_err());
    }
}
