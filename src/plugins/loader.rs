//! Plugin loader

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::manifest::PluginManifest;
use crate::errors::{RestpulseError, Result};
use crate::templating::TagDefinition;

/// Manifest file names tried in order
const MANIFEST_NAMES: [&str; 8] = [
    "plugin.toml",
    "plugin.yaml",
    "plugin.yml",
    "plugin.json",
    "manifest.toml",
    "manifest.yaml",
    "manifest.yml",
    "manifest.json",
];

/// A loaded plugin
#[derive(Debug, Clone)]
pub struct LoadedPlugin {
    pub manifest: PluginManifest,

    /// Plugin directory
    pub directory: PathBuf,

    /// Tag definitions built from the manifest
    pub definitions: Vec<TagDefinition>,
}

impl LoadedPlugin {
    pub fn name(&self) -> &str {
        &self.manifest.name
    }

    pub fn version(&self) -> &str {
        &self.manifest.version
    }
}

/// Plugin loader
pub struct PluginLoader {
    search_paths: Vec<PathBuf>,
}

impl PluginLoader {
    /// Loader with no search paths
    pub fn new() -> Self {
        Self {
            search_paths: Vec::new(),
        }
    }

    pub fn add_search_path<P: AsRef<Path>>(&mut self, path: P) {
        self.search_paths.push(path.as_ref().to_path_buf());
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// Get default plugin directories
    pub fn default_plugin_dirs() -> Vec<PathBuf> {
        let mut dirs = Vec::new();

        if let Some(config_dir) = dirs::config_dir() {
            dirs.push(config_dir.join("restpulse").join("plugins"));
        }

        if let Some(home) = dirs::home_dir() {
            dirs.push(home.join(".restpulse").join("plugins"));
        }

        dirs
    }

    /// Discover all plugins in the search paths
    ///
    /// Each subdirectory holding a manifest is a plugin. Plugins that fail to
    /// load are skipped.
    pub fn discover(&self) -> Result<Vec<LoadedPlugin>> {
        let mut plugins = Vec::new();

        for search_path in &self.search_paths {
            if !search_path.is_dir() {
                continue;
            }

            let mut dirs: Vec<PathBuf> = std::fs::read_dir(search_path)?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|path| path.is_dir())
                .collect();
            dirs.sort();

            for path in dirs {
                match self.load_plugin(&path) {
                    Ok(plugin) => {
                        debug!(plugin = %plugin.name(), tags = plugin.definitions.len(), "Loaded plugin");
                        plugins.push(plugin);
                    }
                    Err(e) => warn!(path = %path.display(), error = %e, "Skipping plugin"),
                }
            }
        }

        Ok(plugins)
    }

    /// Load a plugin from a directory
    pub fn load_plugin<P: AsRef<Path>>(&self, dir: P) -> Result<LoadedPlugin> {
        let dir = dir.as_ref();

        let manifest_path = Self::find_manifest(dir)?;
        let manifest = PluginManifest::load(&manifest_path)?;
        let definitions = manifest.definitions()?;

        Ok(LoadedPlugin {
            manifest,
            directory: dir.to_path_buf(),
            definitions,
        })
    }

    fn find_manifest(dir: &Path) -> Result<PathBuf> {
        MANIFEST_NAMES
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.is_file())
            .ok_or_else(|| RestpulseError::Config(format!("No plugin manifest found in {:?}", dir)))
    }
}

impl Default for PluginLoader {
    fn default() -> Self {
        let mut loader = Self::new();
        for dir in Self::default_plugin_dirs() {
            loader.add_search_path(dir);
        }
        loader
    }
}
