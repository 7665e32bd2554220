//! Command handlers and the shared request context.
//!
//! Handlers resolve their object through `Services::locate`, read one or a
//! few properties through the resolved session snapshot, and format a reply.
//! Lookup and read failures become the command's default reply; they are
//! logged here and never reach the dispatcher.

mod catalogue;
mod derived;
mod discovery;
mod fields;
mod perf;
mod status;

pub use catalogue::build_dispatcher;
pub use derived::{Derived, GuestDiskSpace, GuestDisks, HostVmsMemory, VmMemory};
pub use discovery::Discovery;
pub use fields::{FieldQuery, Read};
pub use perf::{CounterOp, CounterQuery, CounterTarget};
pub use status::StatusQuery;

use crate::cache::CacheBank;
use crate::error::Result;
use crate::resolver::{EntityResolver, Resolved};
use crate::server::ServerStats;
use crate::types::ObjectType;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, warn};

/// Everything a handler may touch, shared by all workers.
pub struct Services {
    pub resolver: EntityResolver,
    pub server: Arc<ServerStats>,
    /// Default performance query window.
    pub interval: Duration,
    /// Pad/strip trailing characters of guest disk paths.
    pub escape_chars: bool,
}

impl Services {
    pub fn new(resolver: EntityResolver, server: Arc<ServerStats>, interval: Duration, escape_chars: bool) -> Self {
        Self { resolver, server, interval, escape_chars }
    }

    pub fn caches(&self) -> &CacheBank {
        self.resolver.caches()
    }

    /// Resolve `key` with the configured addressing mode, logging misses.
    pub async fn locate(&self, key: &str, kind: ObjectType) -> Located {
        match self.resolver.resolve(key, kind).await {
            Ok(Some(resolved)) => Located::Found(resolved),
            Ok(None) => {
                warn!(kind = kind.label(), key = %key, "No such object");
                Located::Missing
            }
            Err(e) => {
                error!(kind = kind.label(), key = %key, error = %e, "Lookup failed");
                Located::Failed
            }
        }
    }
}

/// Outcome of a handler's object lookup.
#[derive(Debug)]
pub enum Located {
    Found(Resolved),
    Missing,
    Failed,
}

/// Mapping from an enumerated remote state to the integer Zabbix stores.
#[derive(Debug, Clone, Copy)]
pub struct StatusMap {
    table: &'static [(&'static str, i64)],
    other: i64,
}

impl StatusMap {
    pub fn code(&self, state: &str) -> i64 {
        self.table.iter().find(|(name, _)| *name == state).map(|(_, code)| *code).unwrap_or(self.other)
    }

    pub fn other(&self) -> i64 {
        self.other
    }
}

/// Managed entity health (`overallStatus`, `configStatus`).
pub const ENTITY_STATUS: StatusMap = StatusMap {
    table: &[("gray", 0), ("grey", 0), ("green", 1), ("yellow", 2), ("red", 3)],
    other: 4,
};

pub const CONNECTION_STATE: StatusMap =
    StatusMap { table: &[("connected", 0), ("disconnected", 1)], other: 2 };

pub const POWER_STATE: StatusMap =
    StatusMap { table: &[("poweredOff", 0), ("poweredOn", 1), ("suspended", 2)], other: 3 };

pub const TOOLS_RUNNING: StatusMap = StatusMap {
    table: &[("guestToolsNotRunning", 0), ("guestToolsRunning", 1), ("guestToolsExecutingScripts", 2)],
    other: 3,
};

pub const TOOLS_VERSION: StatusMap = StatusMap {
    table: &[
        ("guestToolsNotInstalled", 0),
        ("guestToolsCurrent", 1),
        ("guestToolsNeedUpgrade", 2),
        ("guestToolsUnmanaged", 3),
        ("guestToolsBlacklisted", 4),
        ("guestToolsSupportedNew", 5),
        ("guestToolsSupportedOld", 6),
        ("guestToolsTooNew", 7),
        ("guestToolsTooOld", 8),
    ],
    other: 9,
};

/// Numeric reading of a property value.
pub(crate) fn as_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_u64().map(|v| v as i64)).or_else(|| n.as_f64().map(|v| v as i64)),
        Value::Bool(b) => Some(i64::from(*b)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Text reading of a property value.
pub(crate) fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

pub(crate) async fn read(resolved: &Resolved, path: &str) -> Result<Option<Value>> {
    resolved.session.navigator.get_field(&resolved.object, path).await
}

/// Integer property, unset reading as zero.
pub(crate) async fn read_int(resolved: &Resolved, path: &str) -> Result<i64> {
    Ok(read(resolved, path).await?.as_ref().and_then(as_int).unwrap_or(0))
}

pub(crate) async fn read_text(resolved: &Resolved, path: &str) -> Result<Option<String>> {
    Ok(read(resolved, path).await?.as_ref().map(as_text))
}

/// Follow a property holding a managed reference.
pub(crate) async fn follow(resolved: &Resolved, path: &str) -> Result<Option<Resolved>> {
    let Some(reference) = read_text(resolved, path).await? else {
        return Ok(None);
    };
    let target = resolved.session.navigator.lookup_by_reference(&reference).await?;
    Ok(target.map(|object| Resolved { object, session: resolved.session.clone() }))
}

/// Zabbix low-level discovery document: `{"data":[{...},...]}`.
pub(crate) fn discovery_json(entries: Vec<Value>) -> Result<String> {
    Ok(serde_json::to_string(&serde_json::json!({ "data": entries }))?)
}
