//! Zabbix low-level discovery over whole object types.

use super::{discovery_json, follow, read, read_text, Services, POWER_STATE};
use crate::dispatch::{Args, Handler};
use crate::error::Result;
use crate::resolver::Resolved;
use crate::types::{datastore_identifier, ObjectType};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::error;

#[derive(Debug, Clone, Copy)]
pub enum Discovery {
    Vms,
    /// VMs with their power state.
    VmsFull,
    Hosts,
    Datastores,
    Clusters,
    Datacenters,
    Pools,
}

impl Discovery {
    fn kind(&self) -> ObjectType {
        match self {
            Discovery::Vms | Discovery::VmsFull => ObjectType::VirtualMachine,
            Discovery::Hosts => ObjectType::Host,
            Discovery::Datastores => ObjectType::Datastore,
            Discovery::Clusters => ObjectType::Cluster,
            Discovery::Datacenters => ObjectType::Datacenter,
            Discovery::Pools => ObjectType::ResourcePool,
        }
    }

    /// Discovery entry for one object, `None` to leave it out.
    async fn entry(&self, object: &Resolved) -> Result<Option<Value>> {
        let name = object.object.name.as_str();
        let entry = match self {
            Discovery::Vms => json!({
                "{#VIRTUALMACHINE}": name,
                "{#UUID}": read_text(object, "config.uuid").await?.unwrap_or_default(),
            }),
            Discovery::VmsFull => {
                let state = read_text(object, "runtime.powerState").await?.unwrap_or_default();
                json!({
                    "{#VIRTUALMACHINE}": name,
                    "{#UUID}": read_text(object, "config.uuid").await?.unwrap_or_default(),
                    "{#POWERSTATE}": POWER_STATE.code(&state),
                })
            }
            Discovery::Hosts => json!({
                "{#ESXHOST}": name,
                "{#UUID}": read_text(object, "summary.hardware.uuid").await?.unwrap_or_default(),
                "{#CLUSTER}": parent_name(object).await?,
            }),
            Discovery::Datastores => return datastore_entry(object).await,
            Discovery::Clusters => json!({ "{#CLUSTER}": name }),
            Discovery::Datacenters => json!({ "{#DATACENTER}": name }),
            Discovery::Pools => json!({ "{#POOL}": name }),
        };
        Ok(Some(entry))
    }
}

async fn parent_name(object: &Resolved) -> Result<String> {
    Ok(follow(object, "parent").await?.map(|p| p.object.name).unwrap_or_default())
}

/// NAS datastores carry their identifier in the URL, VMFS ones in the
/// volume info. Datastores with neither are skipped.
async fn datastore_entry(datastore: &Resolved) -> Result<Option<Value>> {
    let local = !read(datastore, "summary.multipleHostAccess").await?.and_then(|v| v.as_bool()).unwrap_or(false);
    let cluster = parent_name(datastore).await?;

    let (uuid, naa) = if let Some(nas) = read_text(datastore, "info.nas.name").await? {
        let url = read_text(datastore, "info.url").await?.unwrap_or_default();
        (datastore_identifier(&url).unwrap_or_default(), nas)
    } else if let Some(vmfs) = read(datastore, "info.vmfs").await? {
        let uuid = vmfs.get("uuid").and_then(Value::as_str).unwrap_or_default().to_string();
        let naa = vmfs
            .pointer("/extent/0/diskName")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        (uuid, naa)
    } else {
        return Ok(None);
    };

    Ok(Some(json!({
        "{#DATASTORE}": datastore.object.name,
        "{#UUID}": uuid,
        "{#CLUSTER}": cluster,
        "{#LOCAL}": local,
        "{#NAA}": naa,
    })))
}

#[async_trait]
impl Handler<Services> for Discovery {
    async fn handle(&self, services: &Services, _args: &Args) -> Result<String> {
        let session = services.resolver.supervisor().current();
        let objects = match session.navigator.list_objects(self.kind()).await {
            Ok(objects) => objects,
            Err(e) => {
                error!(kind = %self.kind(), error = %e, "Discovery listing failed");
                Vec::new()
            }
        };

        let mut data = Vec::with_capacity(objects.len());
        for object in objects {
            let resolved = Resolved { object, session: session.clone() };
            match self.entry(&resolved).await {
                Ok(Some(entry)) => data.push(entry),
                Ok(None) => {}
                Err(e) => error!(object = %resolved.object.name, error = %e, "Discovery entry failed"),
            }
        }
        discovery_json(data)
    }
}
