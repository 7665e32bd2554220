//! Shared test fixtures: an in-memory endpoint and a snapshot-backed server.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use vmbix_core::adapters::{
    ConnectTarget, Connector, InventoryNavigator, PerformanceAccessor, RemoteSession, SessionParts,
};
use vmbix_core::config::{AddressingMode, CacheConfig};
use vmbix_core::types::{
    CounterDescriptor, ManagedObject, MetricSeries, ObjectType, PerfMetricId, RollupType, StatsType,
    TimeRange,
};
use vmbix_core::{
    build_dispatcher, protocol, AdapterFactory, CacheBank, ConnectionHandler, EntityResolver, Listener,
    Result, ServerStats, Services, SessionSupervisor, VmbixError, WorkerPool,
};

/// Remote calls observed by the mock endpoint, across all sessions.
#[derive(Debug, Default)]
pub struct CallCounts {
    pub connects: AtomicUsize,
    pub listings: AtomicUsize,
    pub name_lookups: AtomicUsize,
    pub catalogue_fetches: AtomicUsize,
    pub metric_id_queries: AtomicUsize,
}

impl CallCounts {
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

/// In-memory endpoint. The first `blind_sessions` sessions see an empty
/// inventory, as a dead session would.
pub struct MockConnector {
    objects: Vec<(ManagedObject, Value)>,
    counters: Vec<CounterDescriptor>,
    blind_sessions: usize,
    pub calls: Arc<CallCounts>,
}

impl MockConnector {
    pub fn new(objects: Vec<(ManagedObject, Value)>) -> Self {
        Self { objects, counters: Vec::new(), blind_sessions: 0, calls: Arc::new(CallCounts::default()) }
    }

    pub fn with_counters(mut self, counters: Vec<CounterDescriptor>) -> Self {
        self.counters = counters;
        self
    }

    pub fn blind_for(mut self, sessions: usize) -> Self {
        self.blind_sessions = sessions;
        self
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, _target: &ConnectTarget) -> Result<SessionParts> {
        let generation = self.calls.connects.fetch_add(1, Ordering::SeqCst) + 1;
        let objects = if generation <= self.blind_sessions { Vec::new() } else { self.objects.clone() };
        let session = Arc::new(MockSession {
            objects,
            counters: self.counters.clone(),
            calls: self.calls.clone(),
        });
        Ok(SessionParts { session: session.clone(), navigator: session.clone(), performance: session })
    }

    fn name(&self) -> &str {
        "mock"
    }
}

struct MockSession {
    objects: Vec<(ManagedObject, Value)>,
    counters: Vec<CounterDescriptor>,
    calls: Arc<CallCounts>,
}

#[async_trait]
impl RemoteSession for MockSession {
    async fn about(&self) -> Result<String> {
        Ok("Mock endpoint 1.0".to_string())
    }

    async fn latest_event(&self) -> Result<String> {
        Ok(String::new())
    }

    async fn logout(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl InventoryNavigator for MockSession {
    async fn list_objects(&self, kind: ObjectType) -> Result<Vec<ManagedObject>> {
        self.calls.listings.fetch_add(1, Ordering::SeqCst);
        Ok(self.objects.iter().filter(|(o, _)| o.kind == kind).map(|(o, _)| o.clone()).collect())
    }

    async fn lookup_by_name(&self, kind: ObjectType, name: &str) -> Result<Option<ManagedObject>> {
        self.calls.name_lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.objects.iter().find(|(o, _)| o.kind == kind && o.name == name).map(|(o, _)| o.clone()))
    }

    async fn lookup_by_reference(&self, reference: &str) -> Result<Option<ManagedObject>> {
        Ok(self.objects.iter().find(|(o, _)| o.reference == reference).map(|(o, _)| o.clone()))
    }

    async fn get_field(&self, object: &ManagedObject, path: &str) -> Result<Option<Value>> {
        let (_, properties) = self
            .objects
            .iter()
            .find(|(o, _)| o.reference == object.reference)
            .ok_or_else(|| VmbixError::remote("get_field", "stale reference"))?;
        Ok(path.split('.').try_fold(properties, |node, segment| node.get(segment)).cloned())
    }
}

#[async_trait]
impl PerformanceAccessor for MockSession {
    async fn counter_catalogue(&self) -> Result<Vec<CounterDescriptor>> {
        self.calls.catalogue_fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.counters.clone())
    }

    async fn query_counters(&self, keys: &[i32]) -> Result<Vec<CounterDescriptor>> {
        Ok(self.counters.iter().filter(|c| keys.contains(&c.key)).cloned().collect())
    }

    async fn available_metric_ids(&self, _object: &ManagedObject, _interval_id: i32) -> Result<Vec<PerfMetricId>> {
        self.calls.metric_id_queries.fetch_add(1, Ordering::SeqCst);
        Ok(self.counters.iter().map(|c| PerfMetricId { counter_id: c.key, instance: String::new() }).collect())
    }

    async fn query_series(
        &self,
        _object: &ManagedObject,
        _ids: &[PerfMetricId],
        _range: TimeRange,
    ) -> Result<Vec<MetricSeries>> {
        Ok(Vec::new())
    }
}

pub fn target() -> ConnectTarget {
    ConnectTarget {
        url: "mock://vcenter".to_string(),
        username: "monitor".to_string(),
        password: "secret".to_string(),
        connect_timeout: Duration::from_secs(5),
        read_timeout: Duration::from_secs(5),
    }
}

pub fn counter(key: i32, group: &str, name: &str) -> CounterDescriptor {
    CounterDescriptor {
        key,
        group: group.to_string(),
        name: name.to_string(),
        rollup: RollupType::Average,
        stats_type: StatsType::Rate,
        unit: "percent".to_string(),
        label: name.to_string(),
        unit_label: "Percent".to_string(),
    }
}

/// Two hosts and two VMs, addressable by name or UUID.
pub fn small_inventory() -> Vec<(ManagedObject, Value)> {
    vec![
        (
            ManagedObject::new(ObjectType::Host, "host-10", "esx01"),
            json!({"summary": {"hardware": {"uuid": "4c4c-1111"}}, "runtime": {"powerState": "poweredOn"}}),
        ),
        (
            ManagedObject::new(ObjectType::Host, "host-11", "esx02"),
            json!({"summary": {"hardware": {"uuid": "4c4c-2222"}}, "runtime": {"powerState": "poweredOn"}}),
        ),
        (
            ManagedObject::new(ObjectType::VirtualMachine, "vm-100", "web01"),
            json!({"config": {"uuid": "4201-aaaa"}, "runtime": {"powerState": "poweredOn"}}),
        ),
        (
            ManagedObject::new(ObjectType::VirtualMachine, "vm-101", "db01"),
            json!({"config": {"uuid": "4201-bbbb"}, "runtime": {"powerState": "poweredOff"}}),
        ),
    ]
}

pub async fn resolver_for(connector: Arc<MockConnector>, mode: AddressingMode) -> EntityResolver {
    let supervisor = SessionSupervisor::connect(connector, target()).await.unwrap();
    EntityResolver::new(Arc::new(supervisor), Arc::new(CacheBank::new(&CacheConfig::default())), mode)
}

/// A daemon serving a snapshot document on an ephemeral local port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub stats: Arc<ServerStats>,
    _dir: tempfile::TempDir,
}

impl TestServer {
    pub async fn start(document: &Value, mode: AddressingMode, escape_chars: bool) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path: PathBuf = dir.path().join("inventory.json");
        std::fs::write(&path, serde_json::to_vec(document).unwrap()).unwrap();

        let url = format!("file://{}", path.display());
        let connector = AdapterFactory::create(&url).unwrap();
        let mut connect_to = target();
        connect_to.url = url;
        let supervisor = Arc::new(SessionSupervisor::connect(connector, connect_to).await.unwrap());

        let caches = Arc::new(CacheBank::new(&CacheConfig::default()));
        let resolver = EntityResolver::new(supervisor, caches, mode);
        let stats = Arc::new(ServerStats::new());
        let services = Arc::new(Services::new(resolver, stats.clone(), Duration::from_secs(300), escape_chars));
        let dispatcher = Arc::new(build_dispatcher().unwrap());
        let handler = Arc::new(ConnectionHandler::new(dispatcher, services, Duration::from_secs(5)));
        let pool = WorkerPool::<TcpStream>::new(16, handler, stats.clone());

        let listener = Listener::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(listener.run(pool));

        Self { addr, stats, _dir: dir }
    }

    /// Send one plain request line and return the decoded reply.
    pub async fn query(&self, line: &str) -> String {
        self.exchange(format!("{}\n", line).as_bytes()).await
    }

    /// Send raw request bytes and return the decoded reply.
    pub async fn exchange(&self, request: &[u8]) -> String {
        let mut stream = TcpStream::connect(self.addr).await.unwrap();
        stream.write_all(request).await.unwrap();
        let mut reply = Vec::new();
        stream.read_to_end(&mut reply).await.unwrap();
        protocol::decode_reply(&reply).unwrap()
    }
}
