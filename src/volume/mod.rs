//! Volume metadata
//!
//! Canonical volume records and the repository that stores them in the
//! coordination store:
//! - Create/replace, read, delete, existence checks
//! - Listing with metadata filters
//! - Cross-volume queries (brick aggregation, replication safety)

pub mod filter;
pub mod repository;
pub mod types;

pub use filter::{FilterMode, VolumeFilter};
pub use repository::{volume_key, VolumeRepository, VolumeScan, VOLUME_PREFIX};
pub use types::{Brick, Volume, VolumeState, VolumeType};
