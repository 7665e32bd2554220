//! Replies computed from several properties or from related objects.

use super::{as_int, as_text, discovery_json, follow, read, read_int, read_text, Located, Services};
use crate::dispatch::{Args, Handler};
use crate::error::Result;
use crate::resolver::Resolved;
use crate::types::ObjectType;
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::error;

const MIB: i64 = 1024 * 1024;

/// Per-object computations keyed on the first argument.
#[derive(Debug, Clone, Copy)]
pub enum Derived {
    /// Multipath paths of a host in the given state.
    HostPaths(&'static str),
    /// Powered-on VMs registered on a host.
    HostRunningVms,
    /// Clock speed of the host running a VM.
    VmCpuTotal,
    /// Name of the host running a VM.
    VmHost,
    /// Slash-joined folder path of a VM.
    VmFolder,
    /// capacity - free + uncommitted.
    DatastoreProvisioned,
    ClusterCpuUsage,
    ClusterMemFree,
    ClusterMemUsage,
    ClusterHostsMaint,
}

impl Derived {
    fn kind(&self) -> ObjectType {
        match self {
            Derived::HostPaths(_) | Derived::HostRunningVms => ObjectType::Host,
            Derived::VmCpuTotal | Derived::VmHost | Derived::VmFolder => ObjectType::VirtualMachine,
            Derived::DatastoreProvisioned => ObjectType::Datastore,
            Derived::ClusterCpuUsage
            | Derived::ClusterMemFree
            | Derived::ClusterMemUsage
            | Derived::ClusterHostsMaint => ObjectType::Cluster,
        }
    }

    fn default_reply(&self) -> &'static str {
        match self {
            Derived::VmHost | Derived::VmFolder => "",
            _ => "0",
        }
    }

    async fn compute(&self, resolved: &Resolved) -> Result<String> {
        let reply = match self {
            Derived::HostPaths(state) => {
                let paths = read(resolved, "config.multipathState.path").await?;
                let count = entries(paths.as_ref())
                    .iter()
                    .filter(|p| p.get("pathState").and_then(Value::as_str) == Some(*state))
                    .count();
                count.to_string()
            }
            Derived::HostRunningVms => {
                let mut running = 0;
                for vm in host_vms(resolved).await? {
                    if is_powered_on(&vm).await? {
                        running += 1;
                    }
                }
                running.to_string()
            }
            Derived::VmCpuTotal => match follow(resolved, "runtime.host").await? {
                Some(host) => read_int(&host, "summary.hardware.cpuMhz").await?.to_string(),
                None => "0".to_string(),
            },
            Derived::VmHost => match follow(resolved, "runtime.host").await? {
                Some(host) => host.object.name,
                None => String::new(),
            },
            Derived::VmFolder => folder_path(resolved).await?,
            Derived::DatastoreProvisioned => {
                let capacity = read_int(resolved, "summary.capacity").await?;
                let free = read_int(resolved, "summary.freeSpace").await?;
                let uncommitted = read_int(resolved, "summary.uncommitted").await?;
                capacity.saturating_sub(free).saturating_add(uncommitted).to_string()
            }
            Derived::ClusterCpuUsage => {
                let total = read_int(resolved, "summary.totalCpu").await?;
                let effective = read_int(resolved, "summary.effectiveCpu").await?;
                total.saturating_sub(effective).to_string()
            }
            Derived::ClusterMemFree => read_int(resolved, "summary.effectiveMemory").await?.saturating_mul(MIB).to_string(),
            Derived::ClusterMemUsage => {
                let total = read_int(resolved, "summary.totalMemory").await?;
                let effective = read_int(resolved, "summary.effectiveMemory").await?;
                total.saturating_sub(effective.saturating_mul(MIB)).to_string()
            }
            Derived::ClusterHostsMaint => {
                let hosts = read_int(resolved, "summary.numHosts").await?;
                let effective = read_int(resolved, "summary.numEffectiveHosts").await?;
                hosts.saturating_sub(effective).to_string()
            }
        };
        Ok(reply)
    }
}

#[async_trait]
impl Handler<Services> for Derived {
    async fn handle(&self, services: &Services, args: &Args) -> Result<String> {
        let Located::Found(resolved) = services.locate(args.get(0), self.kind()).await else {
            return Ok(self.default_reply().to_string());
        };
        Ok(self.compute(&resolved).await.unwrap_or_else(|e| {
            error!(object = %resolved.object.name, error = %e, "Derived read failed");
            self.default_reply().to_string()
        }))
    }
}

/// Elements of an array property; anything else reads as empty.
fn entries(value: Option<&Value>) -> &[Value] {
    value.and_then(Value::as_array).map(Vec::as_slice).unwrap_or(&[])
}

async fn host_vms(host: &Resolved) -> Result<Vec<Resolved>> {
    let references = read(host, "vm").await?;
    let mut vms = Vec::new();
    for reference in entries(references.as_ref()).iter().filter_map(Value::as_str) {
        if let Some(object) = host.session.navigator.lookup_by_reference(reference).await? {
            vms.push(Resolved { object, session: host.session.clone() });
        }
    }
    Ok(vms)
}

pub(crate) async fn is_powered_on(vm: &Resolved) -> Result<bool> {
    Ok(read_text(vm, "runtime.powerState").await?.as_deref() == Some("poweredOn"))
}

async fn folder_path(vm: &Resolved) -> Result<String> {
    let mut path = String::new();
    let mut current = follow(vm, "parent").await?;
    while let Some(folder) = current {
        if folder.object.kind != ObjectType::Folder {
            break;
        }
        path = format!("/{}{}", folder.object.name, path);
        current = follow(&folder, "parent").await?;
    }
    Ok(path)
}

/// Memory statistic names and the `summary.quickStats` field behind each.
pub(crate) const MEMORY_STATS: &[(&str, &str)] = &[
    ("private", "privateMemory"),
    ("shared", "sharedMemory"),
    ("swapped", "swappedMemory"),
    ("compressed", "compressedMemory"),
    ("overheadConsumed", "consumedOverheadMemory"),
    ("consumed", "hostMemoryUsage"),
    ("ballooned", "balloonedMemory"),
    ("active", "guestMemoryUsage"),
];

pub(crate) const MEMORY_STAT_NAMES: &[&str] =
    &["private", "shared", "swapped", "compressed", "overheadConsumed", "consumed", "ballooned", "active"];

fn quick_stats_field(stat: &str) -> Option<&'static str> {
    MEMORY_STATS.iter().find(|(name, _)| *name == stat).map(|(_, field)| *field)
}

/// `vm.memory[<vm>,<stat>]`: raw quick-stats memory figure.
#[derive(Debug, Clone, Copy, Default)]
pub struct VmMemory;

#[async_trait]
impl Handler<Services> for VmMemory {
    async fn handle(&self, services: &Services, args: &Args) -> Result<String> {
        let Some(field) = quick_stats_field(args.get(1)) else {
            error!(stat = %args.get(1), "Unknown memory statistic");
            return Ok("0".to_string());
        };
        let Located::Found(vm) = services.locate(args.get(0), ObjectType::VirtualMachine).await else {
            return Ok("0".to_string());
        };
        match read_int(&vm, &format!("summary.quickStats.{}", field)).await {
            Ok(value) => Ok(value.to_string()),
            Err(e) => {
                error!(vm = %vm.object.name, error = %e, "Memory read failed");
                Ok("0".to_string())
            }
        }
    }
}

/// `esx.vms.memory[<host>,<stat>]`: mean percentage of configured memory
/// over the powered-on VMs of a host.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostVmsMemory;

impl HostVmsMemory {
    async fn percentage(host: &Resolved, field: &str, stat: &str) -> Result<i64> {
        let mut sum: i64 = 0;
        let mut counted = 0;
        for vm in host_vms(host).await? {
            if !is_powered_on(&vm).await? {
                continue;
            }
            let configured = read_int(&vm, "summary.config.memorySizeMB").await?;
            if configured == 0 {
                continue;
            }
            let mut value = read_int(&vm, &format!("summary.quickStats.{}", field)).await?;
            // Swapped and compressed are reported in KB.
            if stat == "swapped" || stat == "compressed" {
                value /= 1024;
            }
            sum = sum.saturating_add(value.saturating_mul(100) / configured);
            counted += 1;
        }
        Ok(if counted == 0 { 0 } else { sum / counted })
    }
}

#[async_trait]
impl Handler<Services> for HostVmsMemory {
    async fn handle(&self, services: &Services, args: &Args) -> Result<String> {
        let stat = args.get(1);
        let Some(field) = quick_stats_field(stat) else {
            error!(stat = %stat, "Unknown memory statistic");
            return Ok("0".to_string());
        };
        let Located::Found(host) = services.locate(args.get(0), ObjectType::Host).await else {
            return Ok("0".to_string());
        };
        match Self::percentage(&host, field, stat).await {
            Ok(value) => Ok(value.to_string()),
            Err(e) => {
                error!(host = %host.object.name, error = %e, "VM memory aggregation failed");
                Ok("0".to_string())
            }
        }
    }
}

/// Guest disk mount points as a `{#GUESTDISK}` discovery document.
#[derive(Debug, Clone, Copy, Default)]
pub struct GuestDisks;

#[async_trait]
impl Handler<Services> for GuestDisks {
    async fn handle(&self, services: &Services, args: &Args) -> Result<String> {
        let mut data = Vec::new();
        if let Located::Found(vm) = services.locate(args.get(0), ObjectType::VirtualMachine).await {
            match read(&vm, "guest.disk").await {
                Ok(disks) => {
                    for disk in entries(disks.as_ref()) {
                        let Some(path) = disk.get("diskPath").map(as_text) else {
                            continue;
                        };
                        data.push(json!({ "{#GUESTDISK}": escape_disk_path(path, services.escape_chars) }));
                    }
                }
                Err(e) => error!(vm = %vm.object.name, error = %e, "Guest disk read failed"),
            }
        }
        discovery_json(data)
    }
}

/// A trailing backslash would escape the closing quote of the item key.
fn escape_disk_path(path: String, escape_chars: bool) -> String {
    if escape_chars && path.ends_with('\\') {
        format!("{} ", path)
    } else {
        path
    }
}

/// Capacity or free space of one guest disk, selected by the second argument.
#[derive(Debug, Clone, Copy)]
pub struct GuestDiskSpace {
    field: &'static str,
}

impl GuestDiskSpace {
    pub fn capacity() -> Self {
        Self { field: "capacity" }
    }

    pub fn free() -> Self {
        Self { field: "freeSpace" }
    }
}

#[async_trait]
impl Handler<Services> for GuestDiskSpace {
    async fn handle(&self, services: &Services, args: &Args) -> Result<String> {
        let wanted = match args.get(1) {
            disk if services.escape_chars => disk.strip_suffix(' ').unwrap_or(disk),
            disk => disk,
        };
        let Located::Found(vm) = services.locate(args.get(0), ObjectType::VirtualMachine).await else {
            return Ok("0".to_string());
        };
        let disks = match read(&vm, "guest.disk").await {
            Ok(disks) => disks,
            Err(e) => {
                error!(vm = %vm.object.name, error = %e, "Guest disk read failed");
                return Ok("0".to_string());
            }
        };
        let size = entries(disks.as_ref())
            .iter()
            .find(|d| d.get("diskPath").and_then(Value::as_str) == Some(wanted))
            .and_then(|d| d.get(self.field))
            .and_then(as_int)
            .unwrap_or(0);
        Ok(size.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quick_stats_fields() {
        assert_eq!(quick_stats_field("consumed"), Some("hostMemoryUsage"));
        assert_eq!(quick_stats_field("active"), Some("guestMemoryUsage"));
        assert_eq!(quick_stats_field("total"), None);
        assert_eq!(MEMORY_STAT_NAMES.len(), MEMORY_STATS.len());
        assert!(MEMORY_STATS.iter().zip(MEMORY_STAT_NAMES).all(|((a, _), b)| a == b));
    }

    #[test]
    fn test_disk_path_escaping() {
        assert_eq!(escape_disk_path("C:\\".to_string(), true), "C:\\ ");
        assert_eq!(escape_disk_path("C:\\".to_string(), false), "C:\\");
        assert_eq!(escape_disk_path("/var".to_string(), true), "/var");
    }

    #[test]
    fn test_entries_of_non_array() {
        assert!(entries(None).is_empty());
        assert!(entries(Some(&json!("x"))).is_empty());
        assert_eq!(entries(Some(&json!([1, 2]))).len(), 2);
    }
}
