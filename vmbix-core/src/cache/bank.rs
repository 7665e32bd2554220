//! The set of caches shared by all workers.

use super::{CacheView, TtlCache};
use crate::config::CacheConfig;
use crate::types::{CounterDescriptor, ManagedObject, ObjectType, PerfMetricId};
use serde_json::Value;
use tracing::info;

/// Cache names accepted by `vmbix.stats[cachesize|hitrate,<name>]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheName {
    Vm,
    Esxi,
    Ds,
    Perf,
    Counter,
    Hri,
    Cluster,
    Pool,
}

impl CacheName {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "vm" => Some(CacheName::Vm),
            "esxi" => Some(CacheName::Esxi),
            "ds" => Some(CacheName::Ds),
            "perf" => Some(CacheName::Perf),
            "counter" => Some(CacheName::Counter),
            "hri" => Some(CacheName::Hri),
            "cluster" => Some(CacheName::Cluster),
            "pool" => Some(CacheName::Pool),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CacheName::Vm => "vm",
            CacheName::Esxi => "esxi",
            CacheName::Ds => "ds",
            CacheName::Perf => "perf",
            CacheName::Counter => "counter",
            CacheName::Hri => "hri",
            CacheName::Cluster => "cluster",
            CacheName::Pool => "pool",
        }
    }
}

/// One cache per object type plus the counter, metric-id and host runtime
/// caches. Each has its own TTL, bound and statistics.
pub struct CacheBank {
    pub vms: TtlCache<ManagedObject>,
    pub hosts: TtlCache<ManagedObject>,
    pub datastores: TtlCache<ManagedObject>,
    pub clusters: TtlCache<ManagedObject>,
    pub pools: TtlCache<ManagedObject>,
    /// Counter descriptors keyed by `group.name.rollup`.
    pub counters: TtlCache<CounterDescriptor>,
    /// Available metric ids keyed by host name.
    pub host_metrics: TtlCache<Vec<PerfMetricId>>,
    /// Host `runtime` property keyed by host name.
    pub host_runtime: TtlCache<Value>,
}

impl CacheBank {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            vms: TtlCache::from_settings("vm", &config.vm),
            hosts: TtlCache::from_settings("esxi", &config.esxi),
            datastores: TtlCache::from_settings("ds", &config.ds),
            clusters: TtlCache::from_settings("cluster", &config.cluster),
            pools: TtlCache::from_settings("pool", &config.pool),
            counters: TtlCache::from_settings("counter", &config.counter),
            host_metrics: TtlCache::from_settings("perf", &config.perf),
            host_runtime: TtlCache::from_settings("hri", &config.hri),
        }
    }

    /// Object cache for a type; datacenters and folders are not cached.
    pub fn objects(&self, kind: ObjectType) -> Option<&TtlCache<ManagedObject>> {
        match kind {
            ObjectType::VirtualMachine => Some(&self.vms),
            ObjectType::Host => Some(&self.hosts),
            ObjectType::Datastore => Some(&self.datastores),
            ObjectType::Cluster => Some(&self.clusters),
            ObjectType::ResourcePool => Some(&self.pools),
            ObjectType::Datacenter | ObjectType::Folder => None,
        }
    }

    pub fn view(&self, name: CacheName) -> &dyn CacheView {
        match name {
            CacheName::Vm => &self.vms,
            CacheName::Esxi => &self.hosts,
            CacheName::Ds => &self.datastores,
            CacheName::Perf => &self.host_metrics,
            CacheName::Counter => &self.counters,
            CacheName::Hri => &self.host_runtime,
            CacheName::Cluster => &self.clusters,
            CacheName::Pool => &self.pools,
        }
    }

    /// Drop every entry of every cache (after a reconnect).
    pub fn invalidate_all(&self) {
        self.vms.invalidate_all();
        self.hosts.invalidate_all();
        self.datastores.invalidate_all();
        self.clusters.invalidate_all();
        self.pools.invalidate_all();
        self.counters.invalidate_all();
        self.host_metrics.invalidate_all();
        self.host_runtime.invalidate_all();
        info!("All caches invalidated");
    }
}

impl Default for CacheBank {
    fn default() -> Self {
        Self::new(&CacheConfig::default())
    }
}
