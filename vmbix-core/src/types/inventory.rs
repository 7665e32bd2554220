//! Inventory domain types.

use serde::{Deserialize, Serialize};

/// Prefix of a datastore backing URL that precedes its identifier,
/// e.g. `ds:///vmfs/volumes/` in `ds:///vmfs/volumes/5a0f2c1e-aa11/`.
const DATASTORE_URL_PREFIX_LEN: usize = 19;

/// Type of a managed inventory object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectType {
    #[serde(rename = "HostSystem")]
    Host,
    VirtualMachine,
    Datastore,
    #[serde(rename = "ClusterComputeResource")]
    Cluster,
    ResourcePool,
    Datacenter,
    Folder,
}

impl ObjectType {
    /// Remote type name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectType::Host => "HostSystem",
            ObjectType::VirtualMachine => "VirtualMachine",
            ObjectType::Datastore => "Datastore",
            ObjectType::Cluster => "ClusterComputeResource",
            ObjectType::ResourcePool => "ResourcePool",
            ObjectType::Datacenter => "Datacenter",
            ObjectType::Folder => "Folder",
        }
    }

    /// Short label used in log lines ("No host named ... found").
    pub fn label(&self) -> &'static str {
        match self {
            ObjectType::Host => "host",
            ObjectType::VirtualMachine => "vm",
            ObjectType::Datastore => "datastore",
            ObjectType::Cluster => "cluster",
            ObjectType::ResourcePool => "pool",
            ObjectType::Datacenter => "datacenter",
            ObjectType::Folder => "folder",
        }
    }

    /// Field holding the stable identifier, for types that have one.
    pub fn identifier_field(&self) -> Option<&'static str> {
        match self {
            ObjectType::Host => Some("summary.hardware.uuid"),
            ObjectType::VirtualMachine => Some("config.uuid"),
            ObjectType::Datastore => Some("info.url"),
            _ => None,
        }
    }

    /// Derive the identifier from the raw value of `identifier_field`.
    pub fn identifier_from(&self, raw: &str) -> Option<String> {
        match self {
            ObjectType::Datastore => datastore_identifier(raw),
            ObjectType::Host | ObjectType::VirtualMachine => Some(raw.to_string()),
            _ => None,
        }
    }
}

impl std::fmt::Display for ObjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Extract a datastore identifier from its backing URL.
///
/// Fixed-offset slice: drops the 19-byte scheme/volume prefix and the
/// trailing slash. Returns `None` when the URL is too short to slice.
pub fn datastore_identifier(url: &str) -> Option<String> {
    if url.len() <= DATASTORE_URL_PREFIX_LEN {
        return None;
    }
    url.get(DATASTORE_URL_PREFIX_LEN..url.len() - 1).map(str::to_string)
}

/// Handle to one object in the remote inventory.
///
/// Equality is by managed reference; the name is carried for replies and logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagedObject {
    pub kind: ObjectType,
    pub reference: String,
    pub name: String,
}

impl ManagedObject {
    pub fn new(kind: ObjectType, reference: impl Into<String>, name: impl Into<String>) -> Self {
        Self { kind, reference: reference.into(), name: name.into() }
    }
}

impl PartialEq for ManagedObject {
    fn eq(&self, other: &Self) -> bool {
        self.reference == other.reference
    }
}

impl Eq for ManagedObject {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_datastore_identifier_offset() {
        assert_eq!(
            datastore_identifier("ds:///vmfs/volumes/5a0f2c1e-77aa0b12/").as_deref(),
            Some("5a0f2c1e-77aa0b12")
        );
        assert_eq!(
            datastore_identifier("ds:///vmfs/volumes/a1b2c3d4-e5f6a7b8/").as_deref(),
            Some("a1b2c3d4-e5f6a7b8")
        );
    }

    #[test]
    fn test_datastore_identifier_short_url() {
        assert_eq!(datastore_identifier("ds:///vmfs/volumes/"), None);
        assert_eq!(datastore_identifier(""), None);
    }

    #[test]
    fn test_object_type_serde_names() {
        let kind: ObjectType = serde_json::from_str("\"HostSystem\"").unwrap();
        assert_eq!(kind, ObjectType::Host);
        let kind: ObjectType = serde_json::from_str("\"ClusterComputeResource\"").unwrap();
        assert_eq!(kind, ObjectType::Cluster);
        assert_eq!(serde_json::to_string(&ObjectType::Datastore).unwrap(), "\"Datastore\"");
    }

    #[test]
    fn test_identifier_fields() {
        assert_eq!(ObjectType::Host.identifier_field(), Some("summary.hardware.uuid"));
        assert_eq!(ObjectType::Cluster.identifier_field(), None);
        assert_eq!(ObjectType::VirtualMachine.identifier_from("4201-aa").as_deref(), Some("4201-aa"));
    }

    #[test]
    fn test_managed_object_equality_by_reference() {
        let a = ManagedObject::new(ObjectType::VirtualMachine, "vm-12", "web01");
        let b = ManagedObject::new(ObjectType::VirtualMachine, "vm-12", "web01-renamed");
        assert_eq!(a, b);
    }
}
