//! Daemon status and session-level commands.

use super::Services;
use crate::cache::CacheName;
use crate::dispatch::{Args, Handler};
use crate::error::Result;
use async_trait::async_trait;
use tracing::error;

#[derive(Debug, Clone, Copy)]
pub enum StatusQuery {
    Ping,
    Version,
    Threads,
    Queue,
    Requests,
    /// Entry count of the cache named by the first argument.
    CacheSize,
    /// Hit rate of the cache named by the first argument.
    HitRate,
    About,
    LatestEvent,
}

#[async_trait]
impl Handler<Services> for StatusQuery {
    async fn handle(&self, services: &Services, args: &Args) -> Result<String> {
        let reply = match self {
            StatusQuery::Ping => "1".to_string(),
            StatusQuery::Version => env!("CARGO_PKG_VERSION").to_string(),
            StatusQuery::Threads => services.server.live_workers().to_string(),
            StatusQuery::Queue => services.server.queue_depth().to_string(),
            StatusQuery::Requests => services.server.accepted().to_string(),
            StatusQuery::CacheSize => match CacheName::parse(args.get(0)) {
                Some(name) => services.caches().view(name).len().to_string(),
                None => {
                    error!(cache = %args.get(0), "Unknown cache name");
                    "0".to_string()
                }
            },
            StatusQuery::HitRate => match CacheName::parse(args.get(0)) {
                // Always rendered with a fraction, e.g. `1.0`.
                Some(name) => format!("{:?}", services.caches().view(name).stats().hit_rate()),
                None => {
                    error!(cache = %args.get(0), "Unknown cache name");
                    "0".to_string()
                }
            },
            StatusQuery::About => {
                let session = services.resolver.supervisor().current();
                match session.session.about().await {
                    Ok(about) => about,
                    Err(e) => {
                        error!(error = %e, "About query failed");
                        String::new()
                    }
                }
            }
            StatusQuery::LatestEvent => {
                let session = services.resolver.supervisor().current();
                match session.session.latest_event().await {
                    Ok(event) => event,
                    Err(e) => {
                        error!(error = %e, "Latest event query failed");
                        String::new()
                    }
                }
            }
        };
        Ok(reply)
    }
}
