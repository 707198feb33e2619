//! # clusterd
//!
//! Control-plane core of a clustered storage management daemon:
//! - Volume metadata persisted as JSON records in a coordination store (etcd)
//! - Metadata filtering, brick aggregation and replication-safety queries
//! - Supervision of the local coordination store process (start, health
//!   gate, restart, stop) with pid and environment files
//!
//! ## Architecture

#![allow(clippy::result_large_err)]
//!
//! ```text
//! ┌───────────────────────────────────────────┐
//! │                 clusterd                  │
//! │  VolumeRepository ──► KvStore (EtcdClient)│
//! │  Supervisor ──► etcd process + /health    │
//! └───────────┬───────────────────────────────┘
//!             │ JSON gateway (/v3/kv/*)
//!   ┌─────────▼──────────┐
//!   │  local etcd member │  pid file, env file
//!   └────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ### Start the daemon
//! ```bash
//! clusterd --config /etc/clusterd/clusterd.toml --stop-store-on-exit
//! ```
//!
//! ### Use the CLI
//! ```bash
//! clusterctl volume list --key tier --value gold
//! clusterctl volume info gv0
//! clusterctl volume check-brick gv0 --host node1 --path /bricks/b1
//! clusterctl verify
//! clusterctl store health
//! ```

pub mod common;
pub mod ops;
pub mod store;
pub mod supervisor;
pub mod volume;

// Re-export commonly used types
pub use common::{Config, Error, Result};
pub use store::{EtcdClient, KvStore, MemStore};
pub use supervisor::Supervisor;
pub use volume::{Brick, Volume, VolumeFilter, VolumeRepository};

/// Current version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
