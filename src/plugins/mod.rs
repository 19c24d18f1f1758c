//! Manifest-based plugins contributing tag definitions

pub mod loader;
pub mod manifest;

pub use loader::{LoadedPlugin, PluginLoader};
pub use manifest::{ArgSpec, PluginManifest, TagSpec};

use tracing::info;

use crate::templating::TagRegistry;

/// Register every tag the plugins provide; returns the number registered
///
/// A plugin tag named like an existing one replaces it.
pub fn register_plugins(registry: &mut TagRegistry, plugins: &[LoadedPlugin]) -> usize {
    let mut count = 0;
    for plugin in plugins {
        for def in &plugin.definitions {
            registry.register(def.clone());
            count += 1;
        }
        info!(plugin = %plugin.name(), version = %plugin.version(), "Registered plugin tags");
    }
    count
}
