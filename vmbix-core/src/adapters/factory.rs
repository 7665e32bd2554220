//! Connector selection by service URL scheme.

use crate::adapters::{Connector, SnapshotConnector};
use crate::error::{Result, VmbixError};
use std::sync::Arc;
use tracing::{info, instrument};

/// Factory for creating endpoint connectors.
///
/// - `file:///path/to/inventory.json` → `SnapshotConnector`
///
/// Any other scheme is rejected at startup so a misconfigured daemon never
/// opens its listening socket.
pub struct AdapterFactory;

impl AdapterFactory {
    #[instrument]
    pub fn create(service_url: &str) -> Result<Arc<dyn Connector>> {
        if let Some(path) = service_url.strip_prefix("file://") {
            if path.is_empty() {
                return Err(VmbixError::InvalidConfig {
                    reason: "file:// service URL has no path".to_string(),
                });
            }
            info!(path = %path, "Selecting snapshot connector");
            return Ok(Arc::new(SnapshotConnector::new(path)));
        }

        Err(VmbixError::UnsupportedEndpoint { url: service_url.to_string() })
    }
}
