//! Entity resolver: name/identifier lookups through the cache bank.
//!
//! - by name: cache, then one direct remote lookup. A missing name is a
//!   legitimate answer and never triggers a reconnect.
//! - by identifier: cache, then a linear scan of every object of the type,
//!   comparing the type-specific identifier. An empty host list during the
//!   scan is taken as a dead session: caches are cleared, the supervisor
//!   reconnects once and the lookup is retried once.
//!
//! Resolved objects are returned together with the session snapshot that
//! should be used to read them.

use crate::cache::CacheBank;
use crate::config::AddressingMode;
use crate::error::Result;
use crate::session::{SessionHandle, SessionSupervisor};
use crate::types::{CounterDescriptor, ManagedObject, ObjectType, PerfMetricId, REALTIME_INTERVAL_ID};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// An object together with the session it must be read through.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub object: ManagedObject,
    pub session: Arc<SessionHandle>,
}

pub struct EntityResolver {
    supervisor: Arc<SessionSupervisor>,
    caches: Arc<CacheBank>,
    mode: AddressingMode,
}

impl EntityResolver {
    pub fn new(supervisor: Arc<SessionSupervisor>, caches: Arc<CacheBank>, mode: AddressingMode) -> Self {
        Self { supervisor, caches, mode }
    }

    pub fn supervisor(&self) -> &Arc<SessionSupervisor> {
        &self.supervisor
    }

    pub fn caches(&self) -> &Arc<CacheBank> {
        &self.caches
    }

    /// Resolve with the configured addressing mode. Types without an
    /// identifier (clusters, pools, datacenters) always resolve by name.
    pub async fn resolve(&self, key: &str, kind: ObjectType) -> Result<Option<Resolved>> {
        let mode = match kind.identifier_field() {
            Some(_) => self.mode,
            None => AddressingMode::ByName,
        };
        self.resolve_with(key, kind, mode).await
    }

    pub async fn resolve_with(
        &self,
        key: &str,
        kind: ObjectType,
        mode: AddressingMode,
    ) -> Result<Option<Resolved>> {
        match mode {
            AddressingMode::ByName => self.by_name(key, kind).await,
            AddressingMode::ByIdentifier => self.by_identifier(key, kind).await,
        }
    }

    async fn by_name(&self, key: &str, kind: ObjectType) -> Result<Option<Resolved>> {
        let session = self.supervisor.current();
        let cache = self.caches.objects(kind);

        if let Some(object) = cache.and_then(|c| c.get(key)) {
            debug!(kind = %kind, key = %key, "Cache hit");
            return Ok(Some(Resolved { object, session }));
        }

        let found = session.navigator.lookup_by_name(kind, key).await?;
        match found {
            Some(object) => {
                debug!(kind = %kind, key = %key, "Cache miss, resolved by name");
                if let Some(cache) = cache {
                    cache.insert(key, object.clone());
                }
                Ok(Some(Resolved { object, session }))
            }
            None => Ok(None),
        }
    }

    async fn by_identifier(&self, key: &str, kind: ObjectType) -> Result<Option<Resolved>> {
        let session = self.supervisor.current();
        let (found, hosts_seen) = self.scan_by_identifier(&session, key, kind).await?;
        if found.is_some() {
            return Ok(found);
        }

        let session_alive = match hosts_seen {
            Some(count) => count > 0,
            None => !session.navigator.list_objects(ObjectType::Host).await?.is_empty(),
        };
        if session_alive {
            return Ok(None);
        }

        warn!(kind = %kind, key = %key, "Empty host inventory, assuming a dead session");
        self.caches.invalidate_all();
        let fresh = self.supervisor.reconnect(&session).await;
        let (retried, _) = self.scan_by_identifier(&fresh, key, kind).await?;
        Ok(retried)
    }

    /// Cache lookup then linear scan. Also reports how many hosts the scan
    /// saw when it enumerated hosts, so the caller can skip a second listing.
    async fn scan_by_identifier(
        &self,
        session: &Arc<SessionHandle>,
        key: &str,
        kind: ObjectType,
    ) -> Result<(Option<Resolved>, Option<usize>)> {
        let cache = self.caches.objects(kind);
        if let Some(object) = cache.and_then(|c| c.get(key)) {
            debug!(kind = %kind, key = %key, "Cache hit");
            return Ok((Some(Resolved { object, session: session.clone() }), None));
        }

        let Some(field) = kind.identifier_field() else {
            return Ok((None, None));
        };

        let candidates = session.navigator.list_objects(kind).await?;
        let hosts_seen = (kind == ObjectType::Host).then_some(candidates.len());

        for object in candidates {
            let raw = session.navigator.get_field(&object, field).await?;
            let identifier = raw.as_ref().and_then(Value::as_str).and_then(|s| kind.identifier_from(s));
            if identifier.as_deref() == Some(key) {
                debug!(kind = %kind, key = %key, "Cache miss, resolved by identifier scan");
                if let Some(cache) = cache {
                    cache.insert(key, object.clone());
                }
                return Ok((Some(Resolved { object, session: session.clone() }), hosts_seen));
            }
        }
        Ok((None, hosts_seen))
    }

    /// Descriptor of a `group.name.rollup` counter.
    ///
    /// A miss fetches the whole catalogue once and caches every entry.
    pub async fn counter_by_name(&self, name: &str) -> Result<Option<CounterDescriptor>> {
        if let Some(descriptor) = self.caches.counters.get(name) {
            return Ok(Some(descriptor));
        }

        let session = self.supervisor.current();
        let catalogue = session.performance.counter_catalogue().await?;
        let mut found = None;
        for descriptor in catalogue {
            let full_name = descriptor.full_name();
            if found.is_none() && full_name == name {
                found = Some(descriptor.clone());
            }
            self.caches.counters.insert(full_name, descriptor);
        }
        debug!(counter = %name, found = found.is_some(), "Counter catalogue loaded");
        Ok(found)
    }

    /// Real-time metric ids available on a host, cached by host name.
    pub async fn host_metric_ids(&self, host: &Resolved) -> Result<Vec<PerfMetricId>> {
        if let Some(ids) = self.caches.host_metrics.get(&host.object.name) {
            return Ok(ids);
        }
        let ids = host
            .session
            .performance
            .available_metric_ids(&host.object, REALTIME_INTERVAL_ID)
            .await?;
        self.caches.host_metrics.insert(host.object.name.clone(), ids.clone());
        Ok(ids)
    }

    /// Host `runtime` property, cached by host name.
    pub async fn host_runtime(&self, host: &Resolved) -> Result<Value> {
        if let Some(runtime) = self.caches.host_runtime.get(&host.object.name) {
            return Ok(runtime);
        }
        let runtime = host.session.navigator.get_field(&host.object, "runtime").await?.unwrap_or(Value::Null);
        self.caches.host_runtime.insert(host.object.name.clone(), runtime.clone());
        Ok(runtime)
    }
}
