//! Query predicate: `Query=color, gree.`.

use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;

use crate::context::RequestContext;
use crate::error::GatewayResult;
use crate::predicate::header::full_match_regex;
use crate::predicate::{BoxedPredicate, PredicateFactory, RoutePredicate};
use crate::route::args::BoundArgs;

/// Matches when the query parameter is present and, if a regexp is
/// given, any of its values matches it entirely.
#[derive(Debug)]
pub struct QueryPredicate {
    param: String,
    regexp: Option<Regex>,
}

impl QueryPredicate {
    pub fn new(param: impl Into<String>, regexp: Option<Regex>) -> Self {
        Self {
            param: param.into(),
            regexp,
        }
    }
}

#[async_trait]
impl RoutePredicate for QueryPredicate {
    async fn test(&self, ctx: &mut RequestContext) -> GatewayResult<bool> {
        let Some(query) = ctx.query() else {
            return Ok(false);
        };
        let mut values = url::form_urlencoded::parse(query.as_bytes())
            .filter(|(k, _)| *k == self.param)
            .map(|(_, v)| v);
        Ok(match &self.regexp {
            None => values.next().is_some(),
            Some(re) => values.any(|v| re.is_match(&v)),
        })
    }
}

pub struct QueryPredicateFactory;

impl PredicateFactory for QueryPredicateFactory {
    fn name(&self) -> &'static str {
        "Query"
    }

    fn fields(&self) -> &'static [&'static str] {
        &["param", "regexp"]
    }

    fn apply(&self, _route_id: &str, args: &BoundArgs) -> GatewayResult<BoxedPredicate> {
        let param = args.required("param")?;
        let regexp = args
            .optional("regexp")
            .map(|re| full_match_regex(args.name(), re))
            .transpose()?;
        Ok(Arc::new(QueryPredicate::new(param, regexp)))
    }
}
