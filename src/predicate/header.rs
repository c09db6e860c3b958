//! Header predicate: `Header=X-Request-Id, \d+`.

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::HeaderName;
use regex::Regex;

use crate::context::RequestContext;
use crate::error::{GatewayError, GatewayResult};
use crate::predicate::{BoxedPredicate, PredicateFactory, RoutePredicate};
use crate::route::args::BoundArgs;

/// Matches when the header is present and, if a regexp is given, any of
/// its values matches it entirely.
#[derive(Debug)]
pub struct HeaderPredicate {
    header: HeaderName,
    regexp: Option<Regex>,
}

impl HeaderPredicate {
    pub fn new(header: HeaderName, regexp: Option<Regex>) -> Self {
        Self { header, regexp }
    }
}

#[async_trait]
impl RoutePredicate for HeaderPredicate {
    async fn test(&self, ctx: &mut RequestContext) -> GatewayResult<bool> {
        let mut values = ctx.headers().get_all(&self.header).iter().peekable();
        match &self.regexp {
            None => Ok(values.peek().is_some()),
            Some(re) => Ok(values.filter_map(|v| v.to_str().ok()).any(|v| re.is_match(v))),
        }
    }
}

/// Compile `pattern` anchored at both ends.
pub(crate) fn full_match_regex(name: &str, pattern: &str) -> GatewayResult<Regex> {
    Regex::new(&format!("^(?:{})$", pattern))
        .map_err(|e| GatewayError::binding(name, format!("invalid regexp '{}': {}", pattern, e)))
}

pub struct HeaderPredicateFactory;

impl PredicateFactory for HeaderPredicateFactory {
    fn name(&self) -> &'static str {
        "Header"
    }

    fn fields(&self) -> &'static [&'static str] {
        &["header", "regexp"]
    }

    fn apply(&self, _route_id: &str, args: &BoundArgs) -> GatewayResult<BoxedPredicate> {
        let raw = args.required("header")?;
        let header = HeaderName::from_bytes(raw.as_bytes())
            .map_err(|_| GatewayError::binding(args.name(), format!("invalid header name '{}'", raw)))?;
        let regexp = args
            .optional("regexp")
            .map(|re| full_match_regex(args.name(), re))
            .transpose()?;
        Ok(Arc::new(HeaderPredicate::new(header, regexp)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;

    use crate::route::args::{Args, ShortcutType};

    fn predicate(shortcut: &str) -> BoxedPredicate {
        let args = BoundArgs::bind(
            "Header",
            &Args::from_shortcut(shortcut),
            HeaderPredicateFactory.fields(),
            ShortcutType::Default,
        )
        .unwrap();
        HeaderPredicateFactory.apply("r", &args).unwrap()
    }

    fn ctx(headers: &[(&str, &str)]) -> RequestContext {
        let mut builder = Request::builder().uri("/");
        for (k, v) in headers {
            builder = builder.header(*k, *v);
        }
        RequestContext::new(builder.body(Body::empty()).unwrap())
    }

    #[tokio::test]
    async fn test_regexp_must_match_whole_value() {
        let p = predicate(r"X-Request-Id, \d+");
        assert!(p.test(&mut ctx(&[("x-request-id", "123")])).await.unwrap());
        assert!(!p.test(&mut ctx(&[("x-request-id", "12a")])).await.unwrap());
        assert!(!p.test(&mut ctx(&[])).await.unwrap());
    }

    #[tokio::test]
    async fn test_any_value_matches() {
        let p = predicate("X-Tag, beta");
        assert!(p.test(&mut ctx(&[("x-tag", "alpha"), ("x-tag", "beta")])).await.unwrap());
    }

    #[tokio::test]
    async fn test_presence_only() {
        let p = predicate("X-Debug");
        assert!(p.test(&mut ctx(&[("x-debug", "")])).await.unwrap());
        assert!(!p.test(&mut ctx(&[("x-other", "1")])).await.unwrap());
    }
}
