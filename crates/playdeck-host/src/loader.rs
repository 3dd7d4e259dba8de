//! Discovers and loads plugin modules from the plugins directory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use anyhow::{Context, Result};
use libloading::Library;
use tracing::{info, warn};

use playdeck_abi::{EntryFn, ENTRY_SYMBOL, ENTRY_SYMBOL_NAME};

use crate::error::LoadError;
use crate::negotiate::HostPolicy;
use crate::plugin::LoadedPlugin;

/// Resolves modules on disk into validated [`LoadedPlugin`]s.
#[derive(Clone)]
pub struct PluginLoader {
    plugins_dir: PathBuf,
    policy: HostPolicy,
}

impl PluginLoader {
    pub fn new(plugins_dir: impl Into<PathBuf>) -> Self {
        Self {
            plugins_dir: plugins_dir.into(),
            policy: HostPolicy::default(),
        }
    }

    pub fn with_policy(plugins_dir: impl Into<PathBuf>, policy: HostPolicy) -> Self {
        Self {
            plugins_dir: plugins_dir.into(),
            policy,
        }
    }

    pub fn plugins_dir(&self) -> &Path {
        &self.plugins_dir
    }

    /// Open one module, validate its descriptor, and wrap it.
    ///
    /// Any failure drops the partially opened library; no partial plugin
    /// escapes, and failures never affect other loaded modules.
    pub fn load(&self, path: &Path) -> Result<Arc<LoadedPlugin>, LoadError> {
        let library = unsafe { Library::new(path) }.map_err(|source| LoadError::OpenModule {
            path: path.to_path_buf(),
            source,
        })?;

        let entry: EntryFn = unsafe {
            match library.get::<EntryFn>(ENTRY_SYMBOL) {
                Ok(symbol) => *symbol,
                Err(source) => {
                    return Err(LoadError::MissingSymbol {
                        path: path.to_path_buf(),
                        symbol: ENTRY_SYMBOL_NAME,
                        source,
                    });
                }
            }
        };

        let raw = unsafe { entry() };
        let plugin = unsafe {
            LoadedPlugin::from_parts(raw, &self.policy, Some(library), Some(path.to_path_buf()))
        }?;

        info!(
            plugin = plugin.name(),
            version = plugin.version(),
            api_level = plugin.api_level(),
            "loaded plugin from {}",
            path.display()
        );
        Ok(Arc::new(plugin))
    }

    /// Scan the plugins directory and return every loadable module,
    /// logging and skipping the rest. A missing directory is empty, not
    /// an error.
    pub fn discover(&self) -> Result<Vec<Arc<LoadedPlugin>>> {
        if !self.plugins_dir.exists() {
            return Ok(Vec::new());
        }

        let mut plugins = Vec::new();
        let entries = std::fs::read_dir(&self.plugins_dir).context("reading plugins dir")?;
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            if !is_dynamic_library(&path) {
                continue;
            }
            match self.load(&path) {
                Ok(plugin) => plugins.push(plugin),
                Err(e) => warn!("skipping {}: {e}", path.display()),
            }
        }

        Ok(plugins)
    }
}

fn is_dynamic_library(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .is_some_and(|ext| ext == std::env::consts::DLL_EXTENSION)
}

/// In-memory registry of loaded plugins, keyed by descriptor name.
pub struct PluginRegistry {
    loader: PluginLoader,
    plugins: RwLock<HashMap<String, Arc<LoadedPlugin>>>,
}

impl PluginRegistry {
    pub fn new(loader: PluginLoader) -> Self {
        Self {
            loader,
            plugins: RwLock::new(HashMap::new()),
        }
    }

    pub fn from_dir(plugins_dir: impl Into<PathBuf>) -> Self {
        Self::new(PluginLoader::new(plugins_dir))
    }

    /// Rescan the plugins directory, replacing the registry contents.
    /// Replaced plugins are drained and released once their last user
    /// lets go.
    pub fn reload(&self) -> Result<usize> {
        let discovered = self.loader.discover()?;
        let mut map = HashMap::new();
        for plugin in discovered {
            if let Some(previous) = map.insert(plugin.name().to_string(), plugin) {
                warn!(
                    plugin = previous.name(),
                    "duplicate plugin name, keeping the later module"
                );
            }
        }

        let mut guard = self
            .plugins
            .write()
            .map_err(|_| anyhow::anyhow!("plugin registry lock poisoned"))?;
        *guard = map;
        Ok(guard.len())
    }

    pub fn get(&self, name: &str) -> Option<Arc<LoadedPlugin>> {
        self.plugins
            .read()
            .ok()
            .and_then(|guard| guard.get(name).cloned())
    }

    pub fn list(&self) -> Vec<Arc<LoadedPlugin>> {
        self.plugins
            .read()
            .map(|guard| guard.values().cloned().collect())
            .unwrap_or_default()
    }
}
