//! Real-time performance counters of hosts and VMs.
//!
//! Counters are named `group.name.rollup`. Values are sampled at the
//! real-time interval over the configured window (or the window given as the
//! last argument) and reduced to one integer by the counter's rollup and
//! statistics kind. Objects that are not powered on publish no counters.

use super::derived::is_powered_on;
use super::{discovery_json, Located, Services};
use crate::config::AddressingMode;
use crate::dispatch::{Args, Handler};
use crate::error::Result;
use crate::resolver::Resolved;
use crate::types::{ObjectType, PerfMetricId, TimeRange, REALTIME_INTERVAL_ID};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterTarget {
    Host,
    Vm,
}

impl CounterTarget {
    fn kind(&self) -> ObjectType {
        match self {
            CounterTarget::Host => ObjectType::Host,
            CounterTarget::Vm => ObjectType::VirtualMachine,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterOp {
    /// `[object,counter,instance?,interval?]`
    Value,
    /// `[object,counter,interval?]`
    Discovery,
    /// `[object]`
    List,
}

#[derive(Debug, Clone, Copy)]
pub struct CounterQuery {
    target: CounterTarget,
    op: CounterOp,
}

impl CounterQuery {
    pub fn new(target: CounterTarget, op: CounterOp) -> Self {
        Self { target, op }
    }

    fn empty_reply(&self) -> Result<String> {
        match self.op {
            CounterOp::Value => Ok("0".to_string()),
            CounterOp::Discovery => discovery_json(Vec::new()),
            CounterOp::List => Ok(String::new()),
        }
    }

    async fn powered_on(&self, services: &Services, object: &Resolved) -> Result<bool> {
        match self.target {
            CounterTarget::Host => {
                let runtime = services.resolver.host_runtime(object).await?;
                Ok(runtime.get("powerState").and_then(Value::as_str) == Some("poweredOn"))
            }
            CounterTarget::Vm => is_powered_on(object).await,
        }
    }

    async fn available(&self, services: &Services, object: &Resolved) -> Result<Vec<PerfMetricId>> {
        match self.target {
            CounterTarget::Host => services.resolver.host_metric_ids(object).await,
            CounterTarget::Vm => {
                object.session.performance.available_metric_ids(&object.object, REALTIME_INTERVAL_ID).await
            }
        }
    }

    async fn value(&self, services: &Services, object: &Resolved, args: &Args) -> Result<String> {
        let name = args.get(1);
        let Some(counter) = services.resolver.counter_by_name(name).await? else {
            info!(counter = %name, object = %object.object.name, "No such performance counter");
            return Ok("0".to_string());
        };

        let window = window(args.optional(3), services.interval);
        let ids = [PerfMetricId { counter_id: counter.key, instance: args.get(2).to_string() }];
        let series = object
            .session
            .performance
            .query_series(&object.object, &ids, TimeRange::realtime(window))
            .await?;

        let value = series.last().map(|s| counter.aggregate(&s.values)).unwrap_or(0);
        Ok(value.to_string())
    }

    async fn discovery(&self, services: &Services, object: &Resolved, args: &Args) -> Result<String> {
        let name = args.get(1);
        let Some(counter) = services.resolver.counter_by_name(name).await? else {
            info!(counter = %name, object = %object.object.name, "No such performance counter");
            return discovery_json(Vec::new());
        };

        let mut data = Vec::new();
        for id in self.available(services, object).await? {
            if id.counter_id != counter.key {
                continue;
            }
            let mut entry = json!({ "{#METRICINSTANCE}": id.instance });
            if self.target == CounterTarget::Host && !id.instance.is_empty() {
                // Datastore counters are instanced by datastore identifier.
                let datastore = services
                    .resolver
                    .resolve_with(&id.instance, ObjectType::Datastore, AddressingMode::ByIdentifier)
                    .await?;
                if let Some(datastore) = datastore {
                    entry["{#METRICNAME}"] = json!(datastore.object.name);
                }
            }
            data.push(entry);
        }
        discovery_json(data)
    }

    async fn list(&self, services: &Services, object: &Resolved) -> Result<String> {
        let keys: BTreeSet<i32> = self.available(services, object).await?.iter().map(|id| id.counter_id).collect();
        let keys: Vec<i32> = keys.into_iter().collect();
        let counters = object.session.performance.query_counters(&keys).await?;
        let lines: Vec<String> = counters.iter().map(|c| c.summary_line()).collect();
        Ok(lines.join("\n"))
    }
}

/// Query window: the explicit argument in seconds, else the default.
fn window(argument: Option<&str>, default: Duration) -> Duration {
    match argument.map(|s| s.trim().parse::<u64>()) {
        Some(Ok(secs)) if secs > 0 => Duration::from_secs(secs),
        Some(_) => {
            warn!(interval = ?argument, "Invalid interval, using the default window");
            default
        }
        None => default,
    }
}

#[async_trait]
impl Handler<Services> for CounterQuery {
    async fn handle(&self, services: &Services, args: &Args) -> Result<String> {
        let Located::Found(object) = services.locate(args.get(0), self.target.kind()).await else {
            return self.empty_reply();
        };

        match self.powered_on(services, &object).await {
            Ok(true) => {}
            Ok(false) => {
                info!(object = %object.object.name, "Not powered on, performance counters unavailable");
                return self.empty_reply();
            }
            Err(e) => {
                error!(object = %object.object.name, error = %e, "Power state read failed");
                return self.empty_reply();
            }
        }

        let reply = match self.op {
            CounterOp::Value => self.value(services, &object, args).await,
            CounterOp::Discovery => self.discovery(services, &object, args).await,
            CounterOp::List => self.list(services, &object).await,
        };
        match reply {
            Ok(reply) => Ok(reply),
            Err(e) => {
                error!(object = %object.object.name, error = %e, "Performance query failed");
                self.empty_reply()
            }
        }
    }
}
