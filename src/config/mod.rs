//! Config file handling
//!
//! `config.toml` in the config directory:
//!
//! ```toml
//! [render]
//! max_depth = 10
//!
//! [export]
//! add_content_length = false
//!
//! [plugins]
//! enabled = true
//! dirs = ["plugins", "/opt/restpulse/plugins"]
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::errors::{RestpulseError, Result};
use crate::templating::DEFAULT_MAX_DEPTH;

/// Environment variable overriding the config directory
pub const CONFIG_DIR_ENV: &str = "RESTPULSE_CONFIG_DIR";

const CONFIG_FILE: &str = "config.toml";

/// restpulse configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub config_dir: PathBuf,
    pub render: RenderConfig,
    pub export: ExportConfig,
    pub plugins: PluginsConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Bound on nested renders
    pub max_depth: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub add_content_length: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PluginsConfig {
    pub enabled: bool,
    /// Extra search paths; relative ones are resolved against the config dir
    pub dirs: Vec<PathBuf>,
}

impl Default for PluginsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dirs: Vec::new(),
        }
    }
}

/// On-disk shape of `config.toml`
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    render: RenderConfig,
    export: ExportConfig,
    plugins: PluginsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self::with_dir(Self::default_config_dir())
    }
}

impl Config {
    fn with_dir(config_dir: PathBuf) -> Self {
        Self {
            config_dir,
            render: RenderConfig::default(),
            export: ExportConfig::default(),
            plugins: PluginsConfig::default(),
        }
    }

    /// Load configuration from the default config directory
    pub fn load() -> Result<Self> {
        Self::load_from(Self::default_config_dir())
    }

    /// Load `config.toml` from `config_dir`; a missing file gives defaults
    pub fn load_from(config_dir: impl Into<PathBuf>) -> Result<Self> {
        let config_dir = config_dir.into();
        let config_file = config_dir.join(CONFIG_FILE);

        if !config_file.exists() {
            debug!(path = %config_file.display(), "No config file, using defaults");
            return Ok(Self::with_dir(config_dir));
        }

        let content = std::fs::read_to_string(&config_file)
            .map_err(|e| RestpulseError::Config(format!("Failed to read config: {}", e)))?;

        Self::from_toml_str(&content, config_dir)
    }

    /// Parse config text; `config_dir` anchors relative plugin paths
    pub fn from_toml_str(content: &str, config_dir: impl Into<PathBuf>) -> Result<Self> {
        let file: ConfigFile = toml::from_str(content)
            .map_err(|e| RestpulseError::Config(format!("Invalid config TOML: {}", e)))?;

        if file.render.max_depth == 0 {
            return Err(RestpulseError::Config("render.max_depth must be at least 1".to_string()));
        }

        Ok(Self {
            config_dir: config_dir.into(),
            render: file.render,
            export: file.export,
            plugins: file.plugins,
        })
    }

    /// Get the default config directory
    pub fn default_config_dir() -> PathBuf {
        if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV).filter(|d| !d.is_empty()) {
            return PathBuf::from(dir);
        }
        dirs::config_dir()
            .map(|d| d.join("restpulse"))
            .unwrap_or_else(|| PathBuf::from(".restpulse"))
    }

    /// Plugin search paths from `[plugins] dirs`, made absolute
    pub fn plugin_dirs(&self) -> Vec<PathBuf> {
        self.plugins
            .dirs
            .iter()
            .map(|dir| resolve_against(&self.config_dir, dir))
            .collect()
    }
}

fn resolve_against(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let temp = TempDir::new().unwrap();
        let config = Config::load_from(temp.path()).unwrap();
        assert_eq!(config.render.max_depth, 10);
        assert!(!config.export.add_content_length);
        assert!(config.plugins.enabled);
        assert_eq!(config.config_dir, temp.path());
    }

    #[test]
    fn test_load_from_file() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("config.toml"),
            "[render]\nmax_depth = 4\n\n[export]\nadd_content_length = true\n\n[plugins]\nenabled = false\ndirs = [\"local\", \"/abs/plugins\"]\n",
        )
        .unwrap();

        let config = Config::load_from(temp.path()).unwrap();
        assert_eq!(config.render.max_depth, 4);
        assert!(config.export.add_content_length);
        assert!(!config.plugins.enabled);
        assert_eq!(
            config.plugin_dirs(),
            vec![temp.path().join("local"), PathBuf::from("/abs/plugins")]
        );
    }

    #[test]
    fn test_partial_sections() {
        let config = Config::from_toml_str("[export]\nadd_content_length = true\n", "/cfg").unwrap();
        assert_eq!(config.render.max_depth, 10);
        assert!(config.plugins.enabled);
    }

    #[test]
    fn test_invalid_toml() {
        let err = Config::from_toml_str("[render\nmax_depth = ", "/cfg").unwrap_err();
        assert!(matches!(err, RestpulseError::Config(msg) if msg.starts_with("Invalid config TOML")));
    }

    #[test]
    fn test_zero_depth_rejected() {
        assert!(Config::from_toml_str("[render]\nmax_depth = 0\n", "/cfg").is_err());
    }
}
