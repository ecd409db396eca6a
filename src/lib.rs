//! Vuurmuur - object store core of the Vuurmuur firewall manager
//!
//! This library provides:
//! - An arena-backed doubly-linked list and a fixed-row chaining hash table
//! - A registry of storage backend plugins with reference counting
//! - Per-category backend dispatch for services, zones, interfaces and rules
//! - The "textdir" plugin storing objects as `KEY="value"` text files
//! - Service and zone models indexed by port and by IPv4 address
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use vuurmuur::{Config, Context, ObjectType, PluginRegistry};
//!
//! let dir = tempfile::TempDir::new().unwrap();
//! let config = Config::default()
//!     .with_config_dir(dir.path().join("etc"))
//!     .with_textdir_location(dir.path());
//!
//! let registry = Arc::new(PluginRegistry::with_builtin_plugins().unwrap());
//! let mut ctx = Context::new(config, registry);
//! ctx.load_backends().unwrap();
//!
//! let services = ctx.services().unwrap();
//! services.add("ssh", ObjectType::Service).unwrap();
//! services
//!     .tell("ssh", "RANGE", "TCP;1024:65535;22", true, ObjectType::Service)
//!     .unwrap();
//! let range = services.ask("ssh", "range", 512, ObjectType::Service).unwrap();
//! assert_eq!(range.as_deref(), Some("TCP;1024:65535;22"));
//!
//! ctx.unload_backends().unwrap();
//! ```
//!
//! # Storage layout
//!
//! | Object | Name | File |
//! |--------|------|------|
//! | Service | `ssh` | `services/ssh` |
//! | Zone | `lan` | `zones/lan/zone.config` |
//! | Network | `office.lan` | `zones/lan/networks/office/network.config` |
//! | Host | `pc1.office.lan` | `zones/lan/networks/office/hosts/pc1.host` |
//! | Group | `admins.office.lan` | `zones/lan/networks/office/groups/admins.group` |
//! | Interface | `eth0` | `interfaces/eth0.conf` |
//! | Rules | `rules` | `rules/rules.conf` |

pub mod backend;
pub mod config;
pub mod error;
pub mod hash;
pub mod kv;
pub mod list;
pub mod services;
pub mod textdir;
pub mod types;
pub mod zones;

// Re-export commonly used items
pub use config::Config;
pub use error::{ErrorKind, Result, VrmrError};
pub use hash::{HashStrategy, HashTable, Named, StringHash, DEFAULT_ROWS};
pub use list::{List, NodeId};
pub use types::{BackendCategory, ListEntry, ObjectType, OpenMode};

// Re-export backend types
pub use backend::{
    Answers, Backend, BackendPlugin, CategoryState, Context, PluginRegistry, MAX_PLUGIN_NAME,
};

// Re-export object models
pub use services::{PortRange, Service, ServiceHash, ServiceProbe, Services};
pub use textdir::{TextDir, TextDirPlugin};
pub use zones::{Zone, ZoneIpHash, ZoneKind, Zones};
