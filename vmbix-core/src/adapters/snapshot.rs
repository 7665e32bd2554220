//! File-backed endpoint: serves an inventory snapshot from a JSON document.
//!
//! Used for `file://` service URLs, for replaying a captured inventory and for
//! tests. Every `connect` re-reads the file, so a reconnect picks up edits.
//!
//! Document layout:
//!
//! ```json
//! {
//!   "about": "VMware vCenter Server 7.0.3 build-19480866",
//!   "latest_event": "User monitor@vsphere.local logged in",
//!   "credentials": { "username": "monitor", "password": "secret" },
//!   "objects": [
//!     { "type": "HostSystem", "ref": "host-10", "name": "esx01",
//!       "parent": "domain-c7", "properties": { "summary": { ... } } }
//!   ],
//!   "counters": [ { "key": 2, "group": "cpu", "name": "usage", ... } ],
//!   "performance": {
//!     "host-10": { "available": [ ... ], "series": [ ... ] }
//!   }
//! }
//! ```
//!
//! Sample series carry no timestamps; queries return every stored sample
//! regardless of the requested window.

use crate::adapters::{
    ConnectTarget, Connector, InventoryNavigator, PerformanceAccessor, RemoteSession, SessionParts,
};
use crate::error::{Result, VmbixError};
use crate::types::{
    CounterDescriptor, ManagedObject, MetricSeries, ObjectType, PerfMetricId, TimeRange,
};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, Deserialize)]
struct Credentials {
    username: String,
    password: String,
}

#[derive(Debug, Clone, Deserialize)]
struct SnapshotObject {
    #[serde(rename = "type")]
    kind: ObjectType,
    #[serde(rename = "ref")]
    reference: String,
    name: String,
    #[serde(default)]
    parent: Option<String>,
    #[serde(default)]
    properties: Value,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct EntityPerformance {
    #[serde(default)]
    available: Vec<PerfMetricId>,
    #[serde(default)]
    series: Vec<MetricSeries>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct InventorySnapshot {
    #[serde(default)]
    about: String,
    #[serde(default)]
    latest_event: String,
    #[serde(default)]
    credentials: Option<Credentials>,
    #[serde(default)]
    objects: Vec<SnapshotObject>,
    #[serde(default)]
    counters: Vec<CounterDescriptor>,
    #[serde(default)]
    performance: HashMap<String, EntityPerformance>,
}

/// Connector for `file://` service URLs.
pub struct SnapshotConnector {
    path: PathBuf,
}

impl SnapshotConnector {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl Connector for SnapshotConnector {
    async fn connect(&self, target: &ConnectTarget) -> Result<SessionParts> {
        let endpoint = self.path.display().to_string();
        let read = tokio::time::timeout(target.connect_timeout, tokio::fs::read_to_string(&self.path))
            .await
            .map_err(|_| VmbixError::ConnectFailed {
                endpoint: endpoint.clone(),
                reason: "connect timeout".to_string(),
            })?;
        let content = read.map_err(|e| VmbixError::ConnectFailed {
            endpoint: endpoint.clone(),
            reason: e.to_string(),
        })?;
        let snapshot: InventorySnapshot = serde_json::from_str(&content).map_err(|e| {
            VmbixError::ConnectFailed { endpoint: endpoint.clone(), reason: e.to_string() }
        })?;

        if let Some(expected) = &snapshot.credentials {
            if expected.username != target.username || expected.password != target.password {
                return Err(VmbixError::ConnectFailed {
                    endpoint,
                    reason: "authentication rejected".to_string(),
                });
            }
        }

        info!(
            endpoint = %endpoint,
            objects = snapshot.objects.len(),
            counters = snapshot.counters.len(),
            "Loaded inventory snapshot"
        );

        let session = Arc::new(SnapshotSession::new(snapshot));
        Ok(SessionParts { session: session.clone(), navigator: session.clone(), performance: session })
    }

    fn name(&self) -> &str {
        "snapshot"
    }
}

struct SnapshotSession {
    snapshot: InventorySnapshot,
    by_reference: HashMap<String, usize>,
    logged_out: AtomicBool,
}

impl SnapshotSession {
    fn new(snapshot: InventorySnapshot) -> Self {
        let by_reference = snapshot
            .objects
            .iter()
            .enumerate()
            .map(|(i, o)| (o.reference.clone(), i))
            .collect();
        Self { snapshot, by_reference, logged_out: AtomicBool::new(false) }
    }

    fn ensure_active(&self, operation: &str) -> Result<()> {
        if self.logged_out.load(Ordering::Acquire) {
            return Err(VmbixError::remote(operation, "session logged out"));
        }
        Ok(())
    }

    fn object(&self, reference: &str) -> Option<&SnapshotObject> {
        self.by_reference.get(reference).map(|&i| &self.snapshot.objects[i])
    }

    fn handle(object: &SnapshotObject) -> ManagedObject {
        ManagedObject::new(object.kind, &object.reference, &object.name)
    }
}

#[async_trait]
impl RemoteSession for SnapshotSession {
    async fn about(&self) -> Result<String> {
        self.ensure_active("about")?;
        Ok(self.snapshot.about.clone())
    }

    async fn latest_event(&self) -> Result<String> {
        self.ensure_active("latest_event")?;
        Ok(self.snapshot.latest_event.clone())
    }

    async fn logout(&self) -> Result<()> {
        self.logged_out.store(true, Ordering::Release);
        debug!("Snapshot session logged out");
        Ok(())
    }
}

#[async_trait]
impl InventoryNavigator for SnapshotSession {
    async fn list_objects(&self, kind: ObjectType) -> Result<Vec<ManagedObject>> {
        self.ensure_active("list_objects")?;
        Ok(self.snapshot.objects.iter().filter(|o| o.kind == kind).map(Self::handle).collect())
    }

    async fn lookup_by_name(&self, kind: ObjectType, name: &str) -> Result<Option<ManagedObject>> {
        self.ensure_active("lookup_by_name")?;
        Ok(self
            .snapshot
            .objects
            .iter()
            .find(|o| o.kind == kind && o.name == name)
            .map(Self::handle))
    }

    async fn lookup_by_reference(&self, reference: &str) -> Result<Option<ManagedObject>> {
        self.ensure_active("lookup_by_reference")?;
        Ok(self.object(reference).map(Self::handle))
    }

    async fn get_field(&self, object: &ManagedObject, path: &str) -> Result<Option<Value>> {
        self.ensure_active("get_field")?;
        let entry = self.object(&object.reference).ok_or_else(|| {
            VmbixError::remote("get_field", format!("stale reference {}", object.reference))
        })?;
        let value = match path {
            "name" => Some(Value::String(entry.name.clone())),
            "parent" => entry.parent.clone().map(Value::String),
            _ => path
                .split('.')
                .try_fold(&entry.properties, |node, segment| node.get(segment))
                .filter(|v| !v.is_null())
                .cloned(),
        };
        Ok(value)
    }
}

#[async_trait]
impl PerformanceAccessor for SnapshotSession {
    async fn counter_catalogue(&self) -> Result<Vec<CounterDescriptor>> {
        self.ensure_active("counter_catalogue")?;
        Ok(self.snapshot.counters.clone())
    }

    async fn query_counters(&self, keys: &[i32]) -> Result<Vec<CounterDescriptor>> {
        self.ensure_active("query_counters")?;
        Ok(self.snapshot.counters.iter().filter(|c| keys.contains(&c.key)).cloned().collect())
    }

    async fn available_metric_ids(
        &self,
        object: &ManagedObject,
        _interval_id: i32,
    ) -> Result<Vec<PerfMetricId>> {
        self.ensure_active("available_metric_ids")?;
        Ok(self
            .snapshot
            .performance
            .get(&object.reference)
            .map(|p| p.available.clone())
            .unwrap_or_default())
    }

    async fn query_series(
        &self,
        object: &ManagedObject,
        ids: &[PerfMetricId],
        _range: TimeRange,
    ) -> Result<Vec<MetricSeries>> {
        self.ensure_active("query_series")?;
        let Some(perf) = self.snapshot.performance.get(&object.reference) else {
            return Ok(Vec::new());
        };
        Ok(perf
            .series
            .iter()
            .filter(|s| ids.iter().any(|id| id.counter_id == s.counter_id && id.instance == s.instance))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;

    const DOCUMENT: &str = r#"{
        "about": "VMware vCenter Server 7.0.3",
        "credentials": {"username": "monitor", "password": "secret"},
        "objects": [
            {"type": "HostSystem", "ref": "host-10", "name": "esx01", "parent": "domain-c7",
             "properties": {"summary": {"hardware": {"uuid": "4c4c-1111", "cpuMhz": 2600}}}},
            {"type": "ClusterComputeResource", "ref": "domain-c7", "name": "prod"}
        ],
        "counters": [
            {"key": 2, "group": "cpu", "name": "usage", "rollup": "average",
             "statsType": "rate", "unit": "percent"}
        ],
        "performance": {
            "host-10": {
                "available": [{"counterId": 2, "instance": ""}],
                "series": [{"counterId": 2, "instance": "", "values": [1000, 3000]}]
            }
        }
    }"#;

    fn target(password: &str) -> ConnectTarget {
        ConnectTarget {
            url: "file:///unused".to_string(),
            username: "monitor".to_string(),
            password: password.to_string(),
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(5),
        }
    }

    fn write_document() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(DOCUMENT.as_bytes()).unwrap();
        file
    }

    #[tokio::test]
    async fn test_connect_and_read_fields() {
        let file = write_document();
        let parts = SnapshotConnector::new(file.path()).connect(&target("secret")).await.unwrap();

        let hosts = parts.navigator.list_objects(ObjectType::Host).await.unwrap();
        assert_eq!(hosts.len(), 1);
        let host = &hosts[0];

        let mhz = parts.navigator.get_field(host, "summary.hardware.cpuMhz").await.unwrap();
        assert_eq!(mhz, Some(Value::from(2600)));
        let missing = parts.navigator.get_field(host, "summary.quickStats.uptime").await.unwrap();
        assert_eq!(missing, None);

        let parent = parts.navigator.get_field(host, "parent").await.unwrap().unwrap();
        let cluster = parts.navigator.lookup_by_reference(parent.as_str().unwrap()).await.unwrap();
        assert_eq!(cluster.unwrap().name, "prod");
    }

    #[tokio::test]
    async fn test_rejects_bad_credentials() {
        let file = write_document();
        let result = SnapshotConnector::new(file.path()).connect(&target("wrong")).await;
        assert!(matches!(result, Err(VmbixError::ConnectFailed { .. })));
    }

    #[tokio::test]
    async fn test_missing_file_fails_connect() {
        let result = SnapshotConnector::new("/nonexistent/inventory.json")
            .connect(&target("secret"))
            .await;
        assert!(matches!(result, Err(VmbixError::ConnectFailed { .. })));
    }

    #[tokio::test]
    async fn test_performance_queries() {
        let file = write_document();
        let parts = SnapshotConnector::new(file.path()).connect(&target("secret")).await.unwrap();
        let host = parts.navigator.lookup_by_name(ObjectType::Host, "esx01").await.unwrap().unwrap();

        let ids = parts.performance.available_metric_ids(&host, 20).await.unwrap();
        assert_eq!(ids, vec![PerfMetricId { counter_id: 2, instance: String::new() }]);

        let range = TimeRange::realtime(Duration::from_secs(300));
        let series = parts.performance.query_series(&host, &ids, range).await.unwrap();
        assert_eq!(series[0].values, vec![1000, 3000]);
    }

    #[tokio::test]
    async fn test_logout_invalidates_session() {
        let file = write_document();
        let parts = SnapshotConnector::new(file.path()).connect(&target("secret")).await.unwrap();
        parts.session.logout().await.unwrap();
        assert!(parts.navigator.list_objects(ObjectType::Host).await.is_err());
    }
}
