//! Remote management endpoint abstraction.
//!
//! The daemon never speaks the management protocol itself. It talks to the
//! endpoint through four traits:
//! - `Connector`: opens a session from an endpoint and credentials
//! - `RemoteSession`: session-level calls (about, events, logout)
//! - `InventoryNavigator`: object enumeration, lookup and field reads
//! - `PerformanceAccessor`: counter catalogue and sample queries
//!
//! A successful connect yields all three session-side handles at once as
//! `SessionParts`; they are always replaced together.

use crate::error::Result;
use crate::types::{
    CounterDescriptor, ManagedObject, MetricSeries, ObjectType, PerfMetricId, TimeRange,
};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Endpoint, credentials and timeouts for opening a session.
#[derive(Debug, Clone)]
pub struct ConnectTarget {
    pub url: String,
    pub username: String,
    pub password: String,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
}

/// The three handles produced by one successful connect.
#[derive(Clone)]
pub struct SessionParts {
    pub session: Arc<dyn RemoteSession>,
    pub navigator: Arc<dyn InventoryNavigator>,
    pub performance: Arc<dyn PerformanceAccessor>,
}

/// Opens sessions against a management endpoint.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Establish a new session. Fails if the endpoint is unreachable or
    /// rejects the credentials.
    async fn connect(&self, target: &ConnectTarget) -> Result<SessionParts>;

    /// Connector name (for logging).
    fn name(&self) -> &str;
}

/// Session-level operations.
#[async_trait]
pub trait RemoteSession: Send + Sync {
    /// Full product name and version of the endpoint.
    async fn about(&self) -> Result<String>;

    /// Description of the most recent event.
    async fn latest_event(&self) -> Result<String>;

    /// End the session.
    async fn logout(&self) -> Result<()>;
}

/// Inventory enumeration and property reads.
#[async_trait]
pub trait InventoryNavigator: Send + Sync {
    /// All objects of a type.
    async fn list_objects(&self, kind: ObjectType) -> Result<Vec<ManagedObject>>;

    /// Direct lookup by display name.
    async fn lookup_by_name(&self, kind: ObjectType, name: &str) -> Result<Option<ManagedObject>>;

    /// Follow a managed reference (e.g. `runtime.host`, `parent`).
    async fn lookup_by_reference(&self, reference: &str) -> Result<Option<ManagedObject>>;

    /// Read a dotted property path, e.g. `summary.quickStats.overallCpuUsage`.
    /// Unset properties read as `None`.
    async fn get_field(&self, object: &ManagedObject, path: &str) -> Result<Option<Value>>;
}

/// Performance manager operations.
#[async_trait]
pub trait PerformanceAccessor: Send + Sync {
    /// The full counter catalogue.
    async fn counter_catalogue(&self) -> Result<Vec<CounterDescriptor>>;

    /// Descriptors for specific counter keys.
    async fn query_counters(&self, keys: &[i32]) -> Result<Vec<CounterDescriptor>>;

    /// Metric ids the entity publishes at `interval_id`.
    async fn available_metric_ids(
        &self,
        object: &ManagedObject,
        interval_id: i32,
    ) -> Result<Vec<PerfMetricId>>;

    /// Sample series for `ids` over `range`.
    async fn query_series(
        &self,
        object: &ManagedObject,
        ids: &[PerfMetricId],
        range: TimeRange,
    ) -> Result<Vec<MetricSeries>>;
}

mod factory;
pub mod snapshot;

pub use factory::AdapterFactory;
pub use snapshot::SnapshotConnector;
