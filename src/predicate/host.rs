//! Host predicate: `Host=**.example.org,api.example.com`.

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::header::HOST;

use crate::context::RequestContext;
use crate::error::{GatewayError, GatewayResult};
use crate::predicate::pattern::AntPattern;
use crate::predicate::{BoxedPredicate, PredicateFactory, RoutePredicate};
use crate::route::args::{BoundArgs, ShortcutType};

/// Matches the `Host` header (port stripped) against host patterns.
#[derive(Debug)]
pub struct HostPredicate {
    patterns: Vec<AntPattern>,
}

impl HostPredicate {
    pub fn new(patterns: &[String]) -> GatewayResult<Self> {
        let patterns = patterns
            .iter()
            .map(|p| AntPattern::host(p))
            .collect::<GatewayResult<Vec<_>>>()?;
        Ok(Self { patterns })
    }
}

/// Host name of the request without port, lowercased.
fn request_host(ctx: &RequestContext) -> Option<String> {
    let raw = ctx
        .headers()
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| ctx.uri().host().map(str::to_string))?;

    let host = if raw.starts_with('[') {
        // IPv6 literal
        raw.split_once(']').map(|(h, _)| format!("{}]", h)).unwrap_or(raw)
    } else {
        raw.split(':').next().unwrap_or_default().to_string()
    };
    Some(host.to_ascii_lowercase())
}

#[async_trait]
impl RoutePredicate for HostPredicate {
    async fn test(&self, ctx: &mut RequestContext) -> GatewayResult<bool> {
        let Some(host) = request_host(ctx) else {
            return Ok(false);
        };
        for pattern in &self.patterns {
            if let Some(vars) = pattern.captures(&host) {
                ctx.uri_template_vars_mut().extend(vars);
                return Ok(true);
            }
        }
        Ok(false)
    }
}

pub struct HostPredicateFactory;

impl PredicateFactory for HostPredicateFactory {
    fn name(&self) -> &'static str {
        "Host"
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
        Ok(Arc::new(HostPredicate::new(&patterns)?))
    }
}
