use std::path::{Path, PathBuf};

use playdeck_common::{Error, Result};
use tracing::info;

use crate::model::HostConfig;

pub struct ConfigLoader {
    config_dir: PathBuf,
}

impl ConfigLoader {
    pub fn new() -> Result<Self> {
        Ok(Self {
            config_dir: Self::default_config_dir(),
        })
    }

    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|c| c.join("playdeck"))
            .unwrap_or_else(|| PathBuf::from(".playdeck"))
    }

    pub fn with_dir(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Directory scanned for plugin modules: the configured one, or
    /// `plugins` under the config directory.
    pub fn plugins_dir(&self, config: &HostConfig) -> PathBuf {
        config
            .plugins_dir
            .clone()
            .unwrap_or_else(|| self.config_dir.join("plugins"))
    }

    pub fn load(&self) -> Result<HostConfig> {
        let toml_path = self.config_dir.join("config.toml");

        if toml_path.exists() {
            info!("loading config from {}", toml_path.display());
            let contents = std::fs::read_to_string(&toml_path)?;
            toml::from_str(&contents)
                .map_err(|e| Error::Config(format!("failed to parse TOML config: {e}")))
        } else {
            info!("no config file found, using defaults");
            Ok(HostConfig::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ConfigLoader;
    use std::fs;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_dir(label: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock should be after unix epoch")
            .as_nanos();
        std::env::temp_dir().join(format!(
            "playdeck-config-test-{}-{}-{}",
            label,
            std::process::id(),
            nanos
        ))
    }

    #[test]
    fn load_returns_default_when_no_config_exists() {
        let dir = temp_dir("default");
        fs::create_dir_all(&dir).expect("failed to create temp dir");

        let loader = ConfigLoader::with_dir(&dir);
        let config = loader.load().expect("load should succeed");

        assert_eq!(config.min_api_level, 0);
        assert!(config.plugins_dir.is_none());
        assert_eq!(loader.plugins_dir(&config), dir.join("plugins"));

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn load_parses_toml_config() {
        let dir = temp_dir("toml");
        fs::create_dir_all(&dir).expect("failed to create temp dir");

        fs::write(
            dir.join("config.toml"),
            "plugins_dir = \"/opt/playdeck/plugins\"\nmin_api_level = 1\n",
        )
        .expect("failed to write config");

        let loader = ConfigLoader::with_dir(&dir);
        let config = loader.load().expect("load should succeed");

        assert_eq!(config.min_api_level, 1);
        assert_eq!(
            config.plugins_dir.as_deref(),
            Some(std::path::Path::new("/opt/playdeck/plugins"))
        );

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn load_rejects_invalid_toml() {
        let dir = temp_dir("invalid");
        fs::create_dir_all(&dir).expect("failed to create temp dir");

        fs::write(dir.join("config.toml"), "min_api_level = \"not a number\"")
            .expect("failed to write config");

        let loader = ConfigLoader::with_dir(&dir);
        assert!(loader.load().is_err());

        let _ = fs::remove_dir_all(dir);
    }
}
