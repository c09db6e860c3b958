//! Body predicate: `ReadBody=.*"type":"order".*`.
//!
//! Buffers the request body into the context so later filters and the
//! upstream call can replay it.

use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;

use crate::context::RequestContext;
use crate::error::{GatewayError, GatewayResult};
use crate::predicate::{BoxedPredicate, PredicateFactory, RoutePredicate};
use crate::route::args::BoundArgs;

#[derive(Debug)]
pub struct ReadBodyPredicate {
    regexp: Regex,
}

impl ReadBodyPredicate {
    pub fn new(regexp: Regex) -> Self {
        Self { regexp }
    }
}

#[async_trait]
impl RoutePredicate for ReadBodyPredicate {
    async fn test(&self, ctx: &mut RequestContext) -> GatewayResult<bool> {
        let body = ctx.cache_body().await?;
        let text = String::from_utf8_lossy(&body);
        Ok(self.regexp.is_match(&text))
    }
}

pub struct ReadBodyPredicateFactory;

impl PredicateFactory for ReadBodyPredicateFactory {
    fn name(&self) -> &'static str {
        "ReadBody"
    }

    fn fields(&self) -> &'static [&'static str] {
        &["regexp"]
    }

    fn apply(&self, _route_id: &str, args: &BoundArgs) -> GatewayResult<BoxedPredicate> {
        let raw = args.required("regexp")?;
        let regexp = Regex::new(raw)
            .map_err(|e| GatewayError::binding(args.name(), format!("invalid regexp '{}': {}", raw, e)))?;
        Ok(Arc::new(ReadBodyPredicate::new(regexp)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use bytes::Bytes;

    #[tokio::test]
    async fn test_body_is_cached_after_match() {
        let p = ReadBodyPredicate::new(Regex::new(r#""type":"order""#).unwrap());
        let mut ctx = RequestContext::new(
            Request::builder()
                .method("POST")
                .uri("/orders")
                .body(Body::from(r#"{"type":"order","id":1}"#))
                .unwrap(),
        );

        assert!(p.test(&mut ctx).await.unwrap());
        assert!(p.test(&mut ctx).await.unwrap());
        let replay = axum::body::to_bytes(ctx.take_body().unwrap(), 1024).await.unwrap();
        assert_eq!(replay, Bytes::from_static(br#"{"type":"order","id":1}"#));
    }

    #[tokio::test]
    async fn test_body_mismatch() {
        let p = ReadBodyPredicate::new(Regex::new("^ping$").unwrap());
        let mut ctx = RequestContext::new(Request::builder().uri("/").body(Body::from("pong")).unwrap());
        assert!(!p.test(&mut ctx).await.unwrap());
        assert!(ctx.cached_body().is_some());
    }
}
