//! The command table served by the daemon.
//!
//! Registration order is match priority: within a key family the specific
//! forms come first.

use super::derived::{Derived, GuestDiskSpace, GuestDisks, HostVmsMemory, VmMemory, MEMORY_STAT_NAMES};
use super::discovery::Discovery;
use super::fields::{FieldQuery, Read};
use super::perf::{CounterOp, CounterQuery, CounterTarget};
use super::status::StatusQuery;
use super::{Services, CONNECTION_STATE, ENTITY_STATUS, POWER_STATE, TOOLS_RUNNING, TOOLS_VERSION};
use crate::dispatch::{Arg, Dispatcher};
use crate::error::Result;
use crate::types::ObjectType::{Cluster, Datacenter, Datastore, Host, ResourcePool, VirtualMachine};

use Arg::{Any, Field, Literal, Optional};

const PATH_STATES: [&str; 4] = ["active", "standby", "disabled", "dead"];

/// Build the full dispatcher.
pub fn build_dispatcher() -> Result<Dispatcher<Services>> {
    let mut d = Dispatcher::new();
    status(&mut d)?;
    pools(&mut d)?;
    clusters(&mut d)?;
    datacenters(&mut d)?;
    discovery(&mut d)?;
    hosts(&mut d)?;
    vms(&mut d)?;
    datastores(&mut d)?;
    Ok(d)
}

fn status(d: &mut Dispatcher<Services>) -> Result<()> {
    d.add("vmbix.ping", &[], StatusQuery::Ping)?
        .add("ping", &[], StatusQuery::Ping)?
        .add("vmbix.version", &[], StatusQuery::Version)?
        .add("vmbix.stats", &[Literal("threads")], StatusQuery::Threads)?
        .add("vmbix.stats", &[Literal("queue")], StatusQuery::Queue)?
        .add("vmbix.stats", &[Literal("requests")], StatusQuery::Requests)?
        .add("vmbix.stats", &[Literal("cachesize"), Field], StatusQuery::CacheSize)?
        .add("vmbix.stats", &[Literal("hitrate"), Field], StatusQuery::HitRate)?
        .add("about", &[], StatusQuery::About)?
        .add("event.latest", &[], StatusQuery::LatestEvent)?;
    Ok(())
}

fn pools(d: &mut Dispatcher<Services>) -> Result<()> {
    d.add("pool.discovery", &[], Discovery::Pools)?
        .add(
            "pool.cpu",
            &[Any, Literal("usage")],
            FieldQuery::int(ResourcePool, "summary.runtime.cpu.overallUsage"),
        )?
        .add(
            "pool.mem",
            &[Any, Literal("usage")],
            FieldQuery::int(ResourcePool, "summary.runtime.memory.overallUsage"),
        )?;
    Ok(())
}

fn clusters(d: &mut Dispatcher<Services>) -> Result<()> {
    d.add("cluster.discovery", &[], Discovery::Clusters)?
        .add("cluster.cpu", &[Any, Literal("free")], FieldQuery::int(Cluster, "summary.effectiveCpu"))?
        .add("cluster.cpu", &[Any, Literal("total")], FieldQuery::int(Cluster, "summary.totalCpu"))?
        .add("cluster.cpu", &[Any, Literal("usage")], Derived::ClusterCpuUsage)?
        .add("cluster.cpu.num", &[Any, Literal("threads")], FieldQuery::int(Cluster, "summary.numCpuThreads"))?
        .add("cluster.cpu.num", &[Any, Literal("cores")], FieldQuery::int(Cluster, "summary.numCpuCores"))?
        .add("cluster.mem", &[Any, Literal("free")], Derived::ClusterMemFree)?
        .add("cluster.mem", &[Any, Literal("total")], FieldQuery::int(Cluster, "summary.totalMemory"))?
        .add("cluster.mem", &[Any, Literal("usage")], Derived::ClusterMemUsage)?
        .add("cluster.hosts", &[Any, Literal("online")], FieldQuery::int(Cluster, "summary.numEffectiveHosts"))?
        .add("cluster.hosts", &[Any, Literal("maint")], Derived::ClusterHostsMaint)?
        .add("cluster.hosts", &[Any, Literal("total")], FieldQuery::int(Cluster, "summary.numHosts"))?;
    Ok(())
}

fn datacenters(d: &mut Dispatcher<Services>) -> Result<()> {
    d.add("datacenter.discovery", &[], Discovery::Datacenters)?
        .add(
            "datacenter.status",
            &[Any, Literal("overall")],
            FieldQuery::status(Datacenter, "overallStatus", ENTITY_STATUS),
        )?
        .add(
            "datacenter.status",
            &[Any, Literal("config")],
            FieldQuery::status(Datacenter, "configStatus", ENTITY_STATUS),
        )?;
    Ok(())
}

fn discovery(d: &mut Dispatcher<Services>) -> Result<()> {
    d.add("vm.discovery.full", &[], Discovery::VmsFull)?
        .add("vm.discovery", &[], Discovery::Vms)?
        .add("esx.discovery", &[], Discovery::Hosts)?
        .add("datastore.discovery", &[], Discovery::Datastores)?;
    Ok(())
}

fn hosts(d: &mut Dispatcher<Services>) -> Result<()> {
    d.add(
        "esx.connection",
        &[Any],
        FieldQuery::status(Host, "runtime.connectionState", CONNECTION_STATE).when_failed("3"),
    )?
    .add("esx.uptime", &[Any], FieldQuery::int(Host, "summary.quickStats.uptime"))?
    .add("esx.status", &[Any], FieldQuery::status(Host, "overallStatus", ENTITY_STATUS))?
    .add("esx.name", &[Any], FieldQuery::text(Host, "name"))?
    .add("esx.maintenance", &[Any], FieldQuery::flag(Host, "runtime.inMaintenanceMode"))?
    .add("esx.cpu.load", &[Any, Literal("used")], FieldQuery::int(Host, "summary.quickStats.overallCpuUsage"))?
    .add("esx.cpu.load", &[Any, Literal("total")], FieldQuery::int(Host, "summary.hardware.cpuMhz"))?
    .add("esx.cpu.load", &[Any, Literal("cores")], FieldQuery::int(Host, "summary.hardware.numCpuCores"))?;

    for state in PATH_STATES {
        d.add("esx.path", &[Any, Literal(state)], Derived::HostPaths(state))?;
    }

    d.add("esx.vms.count", &[Any], Derived::HostRunningVms)?
        .add("esx.vms.memory", &[Any, Arg::OneOf(MEMORY_STAT_NAMES)], HostVmsMemory)?
        .add(
            "esx.memory",
            &[Any, Literal("used")],
            FieldQuery::int(Host, "summary.quickStats.overallMemoryUsage"),
        )?
        .add("esx.memory", &[Any, Literal("total")], FieldQuery::int(Host, "summary.hardware.memorySize"))?
        .add("esx.counter.list", &[Any], CounterQuery::new(CounterTarget::Host, CounterOp::List))?
        .add(
            "esx.counter.discovery",
            &[Field, Field, Optional],
            CounterQuery::new(CounterTarget::Host, CounterOp::Discovery),
        )?
        .add(
            "esx.counter",
            &[Field, Field, Optional, Optional],
            CounterQuery::new(CounterTarget::Host, CounterOp::Value),
        )?;
    Ok(())
}

fn vms(d: &mut Dispatcher<Services>) -> Result<()> {
    d.add("vm.name", &[Any], FieldQuery::text(VirtualMachine, "name"))?
        .add("vm.status", &[Any], FieldQuery::status(VirtualMachine, "overallStatus", ENTITY_STATUS))?
        .add(
            "vm.cpu.load",
            &[Any, Literal("used")],
            FieldQuery::int(VirtualMachine, "summary.quickStats.overallCpuUsage"),
        )?
        .add("vm.cpu.load", &[Any, Literal("total")], Derived::VmCpuTotal)?
        .add("vm.cpu.load", &[Any, Literal("cores")], FieldQuery::int(VirtualMachine, "config.hardware.numCPU"))?
        .add("vm.memory", &[Any, Literal("total")], FieldQuery::int(VirtualMachine, "summary.config.memorySizeMB"))?
        .add("vm.memory", &[Any, Arg::OneOf(MEMORY_STAT_NAMES)], VmMemory)?
        .add("vm.host", &[Any], Derived::VmHost)?
        .add("vm.powerstate", &[Any], FieldQuery::status(VirtualMachine, "runtime.powerState", POWER_STATE))?
        .add("vm.folder", &[Any], Derived::VmFolder)?
        .add("vm.uptime", &[Any], FieldQuery::int(VirtualMachine, "summary.quickStats.uptimeSeconds"))?
        .add("vm.annotation", &[Any], FieldQuery::text(VirtualMachine, "config.annotation"))?
        .add("vm.snapshot", &[Any], FieldQuery::new(VirtualMachine, "snapshot", Read::Present))?
        .add("vm.storage.committed", &[Any], FieldQuery::int(VirtualMachine, "summary.storage.committed"))?
        .add("vm.storage.uncommitted", &[Any], FieldQuery::int(VirtualMachine, "summary.storage.uncommitted"))?
        .add("vm.storage.unshared", &[Any], FieldQuery::int(VirtualMachine, "summary.storage.unshared"))?
        .add("vm.guest.os.short", &[Any], FieldQuery::text(VirtualMachine, "guest.guestFamily"))?
        .add("vm.guest.os", &[Any], FieldQuery::text(VirtualMachine, "summary.guest.guestFullName"))?
        .add("vm.guest.name", &[Any], FieldQuery::text(VirtualMachine, "summary.guest.hostName"))?
        .add("vm.guest.ip", &[Any], FieldQuery::text(VirtualMachine, "summary.guest.ipAddress"))?
        .add("vm.guest.disk.discovery", &[Any], GuestDisks)?
        .add("vm.guest.disk.all", &[Any], GuestDisks)?
        .add("vm.guest.disk.capacity", &[Any, Any], GuestDiskSpace::capacity())?
        .add("vm.guest.disk.free", &[Any, Any], GuestDiskSpace::free())?
        .add(
            "vm.guest.tools.running",
            &[Any],
            FieldQuery::status(VirtualMachine, "summary.guest.toolsRunningStatus", TOOLS_RUNNING),
        )?
        .add(
            "vm.guest.tools.version",
            &[Any],
            FieldQuery::status(VirtualMachine, "summary.guest.toolsVersionStatus2", TOOLS_VERSION),
        )?
        .add("vm.guest.tools.mounted", &[Any], FieldQuery::flag(VirtualMachine, "runtime.toolsInstallerMounted"))?
        .add(
            "vm.consolidation",
            &[Any, Literal("needed")],
            FieldQuery::flag(VirtualMachine, "runtime.consolidationNeeded"),
        )?
        .add("vm.counter.list", &[Any], CounterQuery::new(CounterTarget::Vm, CounterOp::List))?
        .add(
            "vm.counter.discovery",
            &[Field, Field, Optional],
            CounterQuery::new(CounterTarget::Vm, CounterOp::Discovery),
        )?
        .add(
            "vm.counter",
            &[Field, Field, Optional, Optional],
            CounterQuery::new(CounterTarget::Vm, CounterOp::Value),
        )?;
    Ok(())
}

fn datastores(d: &mut Dispatcher<Services>) -> Result<()> {
    d.add("datastore.local", &[Any], FieldQuery::new(Datastore, "summary.multipleHostAccess", Read::NotFlag))?
        .add("datastore.size", &[Any, Literal("free")], FieldQuery::int(Datastore, "summary.freeSpace"))?
        .add("datastore.size", &[Any, Literal("total")], FieldQuery::int(Datastore, "summary.capacity"))?
        .add("datastore.size", &[Any, Literal("provisioned")], Derived::DatastoreProvisioned)?
        .add("datastore.size", &[Any, Literal("uncommitted")], FieldQuery::int(Datastore, "summary.uncommitted"))?;
    Ok(())
}
