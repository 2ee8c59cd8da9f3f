//! Durable key-value storage for the session snapshot
//!
//! - File-per-key store opened per call (no handle held between operations)
//! - Well-known keys for the account and profile snapshots

mod file_system;

pub use file_system::Storage;

/// Keys written by the session cache
pub mod keys {
    pub const USER: &str = "user";
    pub const PROFILE: &str = "profile";
}
