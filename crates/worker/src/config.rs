use std::path::PathBuf;

use pulseboard_engine::EngineConfig;
use pulseboard_fetch::FetchConfig;

/// Directory of the durable store when `PULSEBOARD_STORE_DIR` is unset.
pub const DEFAULT_STORE_DIR: &str = "./data";

/// Storage key of the widget collection when `PULSEBOARD_STORE_KEY` is unset.
pub const DEFAULT_STORE_KEY: &str = "pulseboard-widgets";

/// Worker configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub store_dir: PathBuf,
    pub store_key: String,
    pub fetch: FetchConfig,
    pub engine: EngineConfig,
}

impl WorkerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default              |
    /// |------------------------|----------------------|
    /// | `PULSEBOARD_STORE_DIR` | `./data`             |
    /// | `PULSEBOARD_STORE_KEY` | `pulseboard-widgets` |
    ///
    /// Fetch and engine settings come from [`FetchConfig::from_env`] and
    /// [`EngineConfig::from_env`].
    pub fn from_env() -> Self {
        let store_dir = non_blank_var("PULSEBOARD_STORE_DIR")
            .unwrap_or_else(|| DEFAULT_STORE_DIR.to_string());
        let store_key = non_blank_var("PULSEBOARD_STORE_KEY")
            .unwrap_or_else(|| DEFAULT_STORE_KEY.to_string());

        Self {
            store_dir: PathBuf::from(store_dir),
            store_key,
            fetch: FetchConfig::from_env(),
            engine: EngineConfig::from_env(),
        }
    }

    /// Names of the provider secrets that are configured. Values are never
    /// exposed.
    pub fn configured_secrets(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.fetch.secrets.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            store_dir: PathBuf::from(DEFAULT_STORE_DIR),
            store_key: DEFAULT_STORE_KEY.to_string(),
            fetch: FetchConfig::default(),
            engine: EngineConfig::default(),
        }
    }
}

fn non_blank_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
