//! Remote address predicates: `RemoteAddr=10.0.0.0/8` and `BlackRemoteAddr=192.168.1.7`.

use std::net::IpAddr;
use std::sync::Arc;

use async_trait::async_trait;
use ipnet::IpNet;

use crate::context::RequestContext;
use crate::error::{GatewayError, GatewayResult};
use crate::predicate::{BoxedPredicate, PredicateFactory, RoutePredicate};
use crate::route::args::{BoundArgs, ShortcutType};

/// Parse `a.b.c.d/n`; a bare address becomes a single-host network.
fn parse_sources(args: &BoundArgs) -> GatewayResult<Vec<IpNet>> {
    let sources = args.list("sources");
    if sources.is_empty() {
        return Err(GatewayError::binding(args.name(), "at least one source is required"));
    }
    sources
        .iter()
        .map(|s| {
            if s.contains('/') {
                s.parse::<IpNet>().ok()
            } else {
                s.parse::<IpAddr>().ok().map(IpNet::from)
            }
            .ok_or_else(|| GatewayError::binding(args.name(), format!("invalid source '{}'", s)))
        })
        .collect()
}

fn in_any(sources: &[IpNet], addr: IpAddr) -> bool {
    sources.iter().any(|net| net.contains(&addr))
}

/// Matches clients inside any of the source networks.
#[derive(Debug)]
pub struct RemoteAddrPredicate {
    sources: Vec<IpNet>,
}

#[async_trait]
impl RoutePredicate for RemoteAddrPredicate {
    async fn test(&self, ctx: &mut RequestContext) -> GatewayResult<bool> {
        Ok(ctx
            .remote_addr()
            .map(|addr| in_any(&self.sources, addr.ip()))
            .unwrap_or(false))
    }
}

/// Matches clients outside every source network. An unknown client matches.
#[derive(Debug)]
pub struct BlackRemoteAddrPredicate {
    sources: Vec<IpNet>,
}

#[async_trait]
impl RoutePredicate for BlackRemoteAddrPredicate {
    async fn test(&self, ctx: &mut RequestContext) -> GatewayResult<bool> {
        match ctx.remote_addr() {
            Some(addr) => {
                let blocked = in_any(&self.sources, addr.ip());
                if blocked {
                    tracing::debug!(remote = %addr, "Remote address is blacklisted");
                }
                Ok(!blocked)
            }
            None => Ok(true),
        }
    }
}

pub struct RemoteAddrPredicateFactory;

impl PredicateFactory for RemoteAddrPredicateFactory {
    fn name(&self) -> &'static str {
        "RemoteAddr"
    }

    fn fields(&self) -> &'static [&'static str] {
        &["sources"]
    }

    fn shortcut_type(&self) -> ShortcutType {
        ShortcutType::GatherList
    }

    fn apply(&self, _route_id: &str, args: &BoundArgs) -> GatewayResult<BoxedPredicate> {
        Ok(Arc::new(RemoteAddrPredicate {
            sources: parse_sources(args)?,
        }))
    }
}

pub struct BlackRemoteAddrPredicateFactory;

impl PredicateFactory for BlackRemoteAddrPredicateFactory {
    fn name(&self) -> &'static str {
        "BlackRemoteAddr"
    }

    fn fields(&self) -> &'static [&'static str] {
        &["sources"]
    }

    fn shortcut_type(&self) -> ShortcutType {
        ShortcutType::GatherList
    }

    fn apply(&self, _route_id: &str, args: &BoundArgs) -> GatewayResult<BoxedPredicate> {
        Ok(Arc::new(BlackRemoteAddrPredicate {
            sources: parse_sources(args)?,
        }))
    }
}
