//! Ops commands for cluster management

pub mod bricks;
pub mod verify;

pub use bricks::find_brick_conflicts;
pub use verify::{verify_volumes, VerifyReport};
