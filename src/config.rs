//! Runtime configuration read from the environment.

use std::env;
use std::path::PathBuf;

use tracing::warn;

pub const DEFAULT_DATA_DIR: &str = "data/factions";
pub const DEFAULT_MAX_CONCURRENT_FETCHES: usize = 8;

const DATA_DIR_VAR: &str = "QUARTERMASTER_DATA_DIR";
const MAX_FETCHES_VAR: &str = "QUARTERMASTER_MAX_FETCHES";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuartermasterConfig {
    /// Root of the per-faction data tree (`<data_dir>/<faction>/index.json`).
    pub data_dir: PathBuf,
    /// Upper bound on underlying unit fetches running at once.
    pub max_concurrent_fetches: usize,
}

impl Default for QuartermasterConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            max_concurrent_fetches: DEFAULT_MAX_CONCURRENT_FETCHES,
        }
    }
}

impl QuartermasterConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds a config from an arbitrary variable lookup. Unset or invalid values keep defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(dir) = lookup(DATA_DIR_VAR).filter(|v| !v.trim().is_empty()) {
            config.data_dir = PathBuf::from(dir.trim());
        }

        if let Some(raw) = lookup(MAX_FETCHES_VAR) {
            match raw.trim().parse::<usize>() {
                Ok(n) => config.max_concurrent_fetches = n.max(1),
                Err(_) => warn!(
                    "invalid {MAX_FETCHES_VAR} '{raw}', defaulting to {DEFAULT_MAX_CONCURRENT_FETCHES}"
                ),
            }
        }

        config
    }
}
