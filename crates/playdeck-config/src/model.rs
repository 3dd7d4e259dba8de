use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    /// Directory scanned for plugin modules. Defaults to `plugins` under
    /// the config directory when unset.
    #[serde(default)]
    pub plugins_dir: Option<PathBuf>,

    /// Oldest descriptor api level the host will still load.
    #[serde(default = "default_min_api_level")]
    pub min_api_level: u32,

    #[serde(default)]
    pub log_level: Option<String>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            plugins_dir: None,
            min_api_level: default_min_api_level(),
            log_level: Some("info".to_string()),
        }
    }
}

fn default_min_api_level() -> u32 {
    0
}
