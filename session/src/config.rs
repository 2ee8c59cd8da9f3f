/// Session configuration from environment variables
///
/// Controls the record store endpoint, the local snapshot directory and the
/// API bind address. A `.env` file is honoured when the binary loads it first.

use ajnabi_ledger::DEFAULT_MAX_CONFLICT_RETRIES;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_RECORD_STORE_URL: &str = "http://localhost:4000";
pub const DEFAULT_STORAGE_DIR: &str = "./session-data";
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:3000";

#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Base URL of the hosted record store
    pub record_store_url: String,
    /// Directory holding the persisted account/profile snapshot
    pub storage_dir: PathBuf,
    /// Address the local API listens on
    pub bind_address: String,
    /// Device identifier sent on signup (generated when absent)
    pub device_id: Option<String>,
    /// Conditional-write retries before a balance mutation gives up
    pub max_conflict_retries: u32,
}

impl SessionConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `RECORD_STORE_URL`: record store endpoint (default `http://localhost:4000`)
    /// - `SESSION_STORAGE_DIR`: snapshot directory (default `./session-data`)
    /// - `BIND_ADDRESS`: API address (default `127.0.0.1:3000`)
    /// - `DEVICE_ID`: device identifier (optional)
    /// - `LEDGER_MAX_CONFLICT_RETRIES`: retry budget (default 5)
    ///
    /// # Examples
    ///
    /// ```bash
    /// # Against a local record-store-mock
    /// RECORD_STORE_URL=http://localhost:4000 cargo run -p session
    /// ```
    pub fn from_env() -> Self {
        let record_store_url = env::var("RECORD_STORE_URL")
            .unwrap_or_else(|_| DEFAULT_RECORD_STORE_URL.to_string());
        log::info!("📡 Record store: {}", record_store_url);

        let storage_dir = env::var("SESSION_STORAGE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_STORAGE_DIR));

        let bind_address =
            env::var("BIND_ADDRESS").unwrap_or_else(|_| DEFAULT_BIND_ADDRESS.to_string());

        let device_id = env::var("DEVICE_ID").ok().filter(|id| !id.trim().is_empty());

        let max_conflict_retries =
            parse_or_default("LEDGER_MAX_CONFLICT_RETRIES", DEFAULT_MAX_CONFLICT_RETRIES);

        Self {
            record_store_url,
            storage_dir,
            bind_address,
            device_id,
            max_conflict_retries,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            record_store_url: DEFAULT_RECORD_STORE_URL.to_string(),
            storage_dir: PathBuf::from(DEFAULT_STORAGE_DIR),
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            device_id: None,
            max_conflict_retries: DEFAULT_MAX_CONFLICT_RETRIES,
        }
    }
}

fn parse_or_default<T>(name: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            log::warn!("⚠️  Invalid {}='{}', using {}", name, raw, default);
            default
        }),
        Err(_) => default,
    }
}
