//! Consensus store supervisor
//!
//! Manages the lifecycle of the local coordination store process:
//! - Idempotent start (adopts a live, healthy instance from its pid file)
//! - Health gate with a bounded wait after launch
//! - Restart with the cached arguments, graceful stop
//! - Pid and environment files so that a restarted daemon finds its store

pub mod args;
pub mod files;
pub mod health;
pub mod manager;
pub mod process;

pub use args::{LaunchUrls, StoreArgs, DEFAULT_MEMBER_NAME};
pub use files::{parse_env, EnvFile, PidFile};
pub use health::{HealthProbe, ProbeResult};
pub use manager::{ProcessIdentity, Supervisor, SupervisorOptions, SupervisorState};
pub use process::{is_process_alive, StoreProcess};
