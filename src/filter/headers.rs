//! Header filters: `AddRequestHeader`, `AddResponseHeader`, `PreserveHostHeader`.
//!
//! Header values may reference path or host template variables, e.g.
//! `AddRequestHeader=X-Segment, {segment}`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::{HeaderName, HeaderValue};
use axum::response::Response;

use crate::context::RequestContext;
use crate::error::{GatewayError, GatewayResult};
use crate::filter::{BoxedFilter, FilterChain, FilterFactory, GatewayFilter};
use crate::route::args::BoundArgs;

/// Replace `{name}` with the matching template variable.
pub(crate) fn expand(template: &str, vars: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        let Some(len) = rest[start..].find('}') else {
            break;
        };
        let name = &rest[start + 1..start + len];
        out.push_str(&rest[..start]);
        match vars.get(name) {
            Some(value) => out.push_str(value),
            None => out.push_str(&rest[start..=start + len]),
        }
        rest = &rest[start + len + 1..];
    }
    out.push_str(rest);
    out
}

fn header_name(args: &BoundArgs) -> GatewayResult<HeaderName> {
    let raw = args.required("name")?;
    HeaderName::from_bytes(raw.trim().as_bytes())
        .map_err(|_| GatewayError::binding(args.name(), format!("invalid header name '{}'", raw)))
}

fn header_value(value: &str) -> GatewayResult<HeaderValue> {
    HeaderValue::from_str(value).map_err(|_| GatewayError::InvalidArgument(format!("invalid header value '{}'", value)))
}

/// Appends a header to the upstream request.
#[derive(Debug)]
pub struct AddRequestHeaderFilter {
    name: HeaderName,
    value: String,
}

#[async_trait]
impl GatewayFilter for AddRequestHeaderFilter {
    async fn filter(&self, ctx: &mut RequestContext, chain: FilterChain<'_>) -> GatewayResult<Response> {
        let value = header_value(&expand(&self.value, ctx.uri_template_vars()))?;
        ctx.headers_mut().append(self.name.clone(), value);
        chain.next(ctx).await
    }
}

pub struct AddRequestHeaderFilterFactory;

impl FilterFactory for AddRequestHeaderFilterFactory {
    fn name(&self) -> &'static str {
        "AddRequestHeader"
    }

    fn fields(&self) -> &'static [&'static str] {
        &["name", "value"]
    }

    fn apply(&self, _route_id: &str, args: &BoundArgs) -> GatewayResult<BoxedFilter> {
        Ok(Arc::new(AddRequestHeaderFilter {
            name: header_name(args)?,
            value: args.required("value")?.to_string(),
        }))
    }
}

/// Appends a header to the response returned to the client.
#[derive(Debug)]
pub struct AddResponseHeaderFilter {
    name: HeaderName,
    value: String,
}

#[async_trait]
impl GatewayFilter for AddResponseHeaderFilter {
    async fn filter(&self, ctx: &mut RequestContext, chain: FilterChain<'_>) -> GatewayResult<Response> {
        let value = header_value(&expand(&self.value, ctx.uri_template_vars()))?;
        let mut response = chain.next(ctx).await?;
        response.headers_mut().append(self.name.clone(), value);
        Ok(response)
    }
}

pub struct AddResponseHeaderFilterFactory;

impl FilterFactory for AddResponseHeaderFilterFactory {
    fn name(&self) -> &'static str {
        "AddResponseHeader"
    }

    fn fields(&self) -> &'static [&'static str] {
        &["name", "value"]
    }

    fn apply(&self, _route_id: &str, args: &BoundArgs) -> GatewayResult<BoxedFilter> {
        Ok(Arc::new(AddResponseHeaderFilter {
            name: header_name(args)?,
            value: args.required("value")?.to_string(),
        }))
    }
}

/// Forward the client's `Host` header instead of the upstream's.
#[derive(Debug)]
pub struct PreserveHostHeaderFilter;

#[async_trait]
impl GatewayFilter for PreserveHostHeaderFilter {
    async fn filter(&self, ctx: &mut RequestContext, chain: FilterChain<'_>) -> GatewayResult<Response> {
        ctx.set_preserve_host(true);
        chain.next(ctx).await
    }
}

pub struct PreserveHostHeaderFilterFactory;

impl FilterFactory for PreserveHostHeaderFilterFactory {
    fn name(&self) -> &'static str {
        "PreserveHostHeader"
    }

    fn fields(&self) -> &'static [&'static str] {
        &[]
    }

    fn apply(&self, _route_id: &str, _args: &BoundArgs) -> GatewayResult<BoxedFilter> {
        Ok(Arc::new(PreserveHostHeaderFilter))
    }
}
