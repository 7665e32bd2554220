//! Performance counter types and sample aggregation.

use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// Interval id of real-time (20 second) samples.
pub const REALTIME_INTERVAL_ID: i32 = 20;

/// How samples of a counter roll up over a sampling interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RollupType {
    Average,
    Latest,
    Summation,
    Maximum,
    Minimum,
    None,
}

impl RollupType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RollupType::Average => "average",
            RollupType::Latest => "latest",
            RollupType::Summation => "summation",
            RollupType::Maximum => "maximum",
            RollupType::Minimum => "minimum",
            RollupType::None => "none",
        }
    }
}

/// Statistics kind of a counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatsType {
    Absolute,
    Delta,
    Rate,
}

impl StatsType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatsType::Absolute => "absolute",
            StatsType::Delta => "delta",
            StatsType::Rate => "rate",
        }
    }
}

/// Metadata needed to interpret the raw samples of one counter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterDescriptor {
    pub key: i32,
    pub group: String,
    pub name: String,
    pub rollup: RollupType,
    pub stats_type: StatsType,
    /// Unit key, e.g. `percent`, `kiloBytes`, `megaHertz`.
    pub unit: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub unit_label: String,
}

impl CounterDescriptor {
    /// Composite `group.name.rollup` key used in item keys.
    pub fn full_name(&self) -> String {
        format!("{}.{}.{}", self.group, self.name, self.rollup.as_str())
    }

    /// One line of `*.counter.list` output.
    pub fn summary_line(&self) -> String {
        format!(
            "{} : {} : {} in {} ({})",
            self.key,
            self.full_name(),
            self.label,
            self.unit_label,
            self.stats_type.as_str()
        )
    }

    /// Reduce one sample series to the integer reported to Zabbix.
    ///
    /// Sums for average/latest/summation rollups, extremes for
    /// maximum/minimum. Anything but `delta` statistics is averaged over the
    /// sample count, and `percent` units come back in hundredths.
    pub fn aggregate(&self, samples: &[i64]) -> i64 {
        if samples.is_empty() {
            return 0;
        }
        let mut value = match self.rollup {
            RollupType::Average | RollupType::Latest | RollupType::Summation => {
                samples.iter().map(|&v| v as f64).sum()
            }
            RollupType::Maximum => samples.iter().copied().max().unwrap_or(0) as f64,
            RollupType::Minimum => samples.iter().copied().min().unwrap_or(0) as f64,
            RollupType::None => {
                tracing::error!(counter = %self.full_name(), "Cannot handle counter rollup type");
                0.0
            }
        };
        if self.stats_type != StatsType::Delta {
            value /= samples.len() as f64;
        }
        if self.unit == "percent" {
            value /= 100.0;
        }
        value as i64
    }
}

/// A (counter, instance) pair available on an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerfMetricId {
    pub counter_id: i32,
    #[serde(default)]
    pub instance: String,
}

/// Samples returned for one metric id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricSeries {
    pub counter_id: i32,
    #[serde(default)]
    pub instance: String,
    pub values: Vec<i64>,
}

/// Sampling window of a series query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: SystemTime,
    pub end: SystemTime,
    pub interval_id: i32,
}

impl TimeRange {
    /// Real-time samples covering the last `window`.
    pub fn realtime(window: std::time::Duration) -> Self {
        let end = SystemTime::now();
        let start = end.checked_sub(window).unwrap_or(SystemTime::UNIX_EPOCH);
        Self { start, end, interval_id: REALTIME_INTERVAL_ID }
    }
}
