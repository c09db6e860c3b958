//! `RewritePath=/red/(?<segment>.*), /${segment}`

use std::sync::Arc;

use async_trait::async_trait;
use axum::response::Response;
use regex::Regex;

use crate::context::RequestContext;
use crate::error::{GatewayError, GatewayResult};
use crate::filter::{BoxedFilter, FilterChain, FilterFactory, GatewayFilter};
use crate::route::args::BoundArgs;

/// Replaces every match of `regexp` in the request path.
#[derive(Debug)]
pub struct RewritePathFilter {
    regexp: Regex,
    replacement: String,
}

impl RewritePathFilter {
    /// `$\` in the replacement is an escaped `$`, for config formats that
    /// would otherwise expand `${...}` themselves.
    pub fn new(regexp: Regex, replacement: &str) -> Self {
        Self {
            regexp,
            replacement: replacement.replace("$\\", "$"),
        }
    }

    pub fn rewrite(&self, path: &str) -> String {
        self.regexp.replace_all(path, self.replacement.as_str()).into_owned()
    }
}

#[async_trait]
impl GatewayFilter for RewritePathFilter {
    async fn filter(&self, ctx: &mut RequestContext, chain: FilterChain<'_>) -> GatewayResult<Response> {
        let original = ctx.uri().clone();
        let path = self.rewrite(original.path());
        ctx.add_original_url(original);
        tracing::trace!(request_id = %ctx.request_id(), path = %path, "Rewrote path");
        ctx.set_path(&path)?;
        chain.next(ctx).await
    }
}

pub struct RewritePathFilterFactory;

impl FilterFactory for RewritePathFilterFactory {
    fn name(&self) -> &'static str {
        "RewritePath"
    }

    fn fields(&self) -> &'static [&'static str] {
        &["regexp", "replacement"]
    }

    fn apply(&self, _route_id: &str, args: &BoundArgs) -> GatewayResult<BoxedFilter> {
        let raw = args.required("regexp")?;
        if raw.trim().is_empty() {
            return Err(GatewayError::binding(args.name(), "regexp must have a value"));
        }
        let regexp = Regex::new(raw)
            .map_err(|e| GatewayError::binding(args.name(), format!("invalid regexp '{}': {}", raw, e)))?;
        let replacement = args.required("replacement")?;
        Ok(Arc::new(RewritePathFilter::new(regexp, replacement)))
    }
}
