//! `PrefixPath=/mypath`

use std::sync::Arc;

use async_trait::async_trait;
use axum::response::Response;

use crate::context::RequestContext;
use crate::error::{GatewayError, GatewayResult};
use crate::filter::{BoxedFilter, FilterChain, FilterFactory, GatewayFilter};
use crate::route::args::BoundArgs;

#[derive(Debug)]
pub struct PrefixPathFilter {
    prefix: String,
}

#[async_trait]
impl GatewayFilter for PrefixPathFilter {
    async fn filter(&self, ctx: &mut RequestContext, chain: FilterChain<'_>) -> GatewayResult<Response> {
        let original = ctx.uri().clone();
        let path = format!("{}{}", self.prefix, original.path());
        ctx.add_original_url(original);
        ctx.set_path(&path)?;
        chain.next(ctx).await
    }
}

pub struct PrefixPathFilterFactory;

impl FilterFactory for PrefixPathFilterFactory {
    fn name(&self) -> &'static str {
        "PrefixPath"
    }

    fn fields(&self) -> &'static [&'static str] {
        &["prefix"]
    }

    fn apply(&self, _route_id: &str, args: &BoundArgs) -> GatewayResult<BoxedFilter> {
        let prefix = args.required("prefix")?.trim_end_matches('/').to_string();
        if !prefix.starts_with('/') {
            return Err(GatewayError::binding(args.name(), "prefix must start with '/'"));
        }
        Ok(Arc::new(PrefixPathFilter { prefix }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    use crate::filter::tests::{ctx, Respond};
    use crate::filter::OrderedFilter;

    #[tokio::test]
    async fn test_prefix_keeps_query() {
        let filter: BoxedFilter = Arc::new(PrefixPathFilter { prefix: "/api".into() });
        let filters = vec![
            OrderedFilter::new(1, filter),
            OrderedFilter::new(2, Arc::new(Respond(StatusCode::OK))),
        ];
        let mut ctx = ctx("/users?page=2");
        FilterChain::new(&filters).next(&mut ctx).await.unwrap();
        assert_eq!(ctx.uri().to_string(), "/api/users?page=2");
    }

    #[test]
    fn test_prefix_must_be_absolute() {
        use crate::route::args::{Args, ShortcutType};
        let args = BoundArgs::bind("PrefixPath", &Args::from_shortcut("api"), &["prefix"], ShortcutType::Default)
            .unwrap();
        assert!(PrefixPathFilterFactory.apply("r", &args).is_err());
    }
}
