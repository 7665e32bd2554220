//! VmBix Core Library
//!
//! Zabbix-facing query bridge for a virtualization management endpoint:
//! admission and worker pool, object caches, session supervision, entity
//! resolution and command dispatch.

pub mod adapters;
pub mod cache;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod observability;
pub mod protocol;
pub mod resolver;
pub mod server;
pub mod session;
pub mod types;

// Re-export commonly used items
pub use adapters::{AdapterFactory, ConnectTarget, Connector};
pub use cache::{CacheBank, CacheName, TtlCache};
pub use config::{AddressingMode, Config, Settings};
pub use dispatch::{Dispatcher, NOT_SUPPORTED};
pub use error::{Result, VmbixError};
pub use handlers::{build_dispatcher, Services};
pub use observability::init as init_observability;
pub use resolver::{EntityResolver, Resolved};
pub use server::{ConnectionHandler, Listener, ServerStats, WorkerPool};
pub use session::{SessionHandle, SessionSupervisor};
pub use types::{ManagedObject, ObjectType};
