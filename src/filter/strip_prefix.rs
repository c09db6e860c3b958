//! `StripPrefix=2`: drop leading path segments.

use std::sync::Arc;

use async_trait::async_trait;
use axum::response::Response;

use crate::context::RequestContext;
use crate::error::GatewayResult;
use crate::filter::{BoxedFilter, FilterChain, FilterFactory, GatewayFilter};
use crate::route::args::BoundArgs;

#[derive(Debug)]
pub struct StripPrefixFilter {
    parts: usize,
}

impl StripPrefixFilter {
    pub fn new(parts: usize) -> Self {
        Self { parts }
    }

    pub fn strip(&self, path: &str) -> String {
        let remaining: Vec<&str> = path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .skip(self.parts)
            .collect();
        let mut stripped = format!("/{}", remaining.join("/"));
        if path.ends_with('/') && stripped.len() > 1 {
            stripped.push('/');
        }
        stripped
    }
}

#[async_trait]
impl GatewayFilter for StripPrefixFilter {
    async fn filter(&self, ctx: &mut RequestContext, chain: FilterChain<'_>) -> GatewayResult<Response> {
        let original = ctx.uri().clone();
        let path = self.strip(original.path());
        ctx.add_original_url(original);
        ctx.set_path(&path)?;
        chain.next(ctx).await
    }
}

pub struct StripPrefixFilterFactory;

impl FilterFactory for StripPrefixFilterFactory {
    fn name(&self) -> &'static str {
        "StripPrefix"
    }

    fn fields(&self) -> &'static [&'static str] {
        &["parts"]
    }

    fn apply(&self, _route_id: &str, args: &BoundArgs) -> GatewayResult<BoxedFilter> {
        let parts = args.parse::<usize>("parts")?.unwrap_or(1);
        Ok(Arc::new(StripPrefixFilter::new(parts)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_segments() {
        let f = StripPrefixFilter::new(2);
        assert_eq!(f.strip("/name/blue/red"), "/red");
        assert_eq!(f.strip("/name/blue/red/"), "/red/");
        assert_eq!(f.strip("/name"), "/");
    }
}
