//! Common utilities and types shared across clusterd

pub mod config;
pub mod error;
pub mod utils;

pub use config::{Config, StoreConfig, SupervisorConfig};
pub use error::{Error, Result};
pub use utils::{detect_host_ip, parse_duration, retry_with_backoff, validate_volume_name};
