//! Common test utilities for restpulse integration tests
//!
//! - fixture workspace loading
//! - renderer construction
//! - CLI invocation helpers

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use assert_cmd::Command;
use serde_json::{Map, Value as JsonValue};
use tempfile::TempDir;

use restpulse::render::RequestRenderer;
use restpulse::store::MemoryStore;
use restpulse::templating::{RenderContext, TagRegistry, TemplateRenderer};

/// Length of a hyphenated UUID
pub const UUID_LEN: usize = 36;

/// Path of a file under `tests/fixtures`
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests").join("fixtures").join(name)
}

/// The fixture workspace export
pub fn workspace_path() -> PathBuf {
    fixture_path("workspace.json")
}

pub fn fixture_store() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::from_export_file(&workspace_path()).expect("fixture workspace loads"))
}

pub fn builtins() -> Arc<TagRegistry> {
    Arc::new(TagRegistry::with_builtins())
}

/// Request renderer over the fixture workspace with built-in tags
pub fn fixture_renderer() -> RequestRenderer {
    RequestRenderer::new(builtins(), fixture_store())
}

pub fn template_renderer() -> TemplateRenderer {
    TemplateRenderer::new(builtins())
}

/// Convert a `json!` object into a variable map
pub fn vars(value: JsonValue) -> Map<String, JsonValue> {
    match value {
        JsonValue::Object(map) => map,
        other => panic!("expected a JSON object, got {}", other),
    }
}

pub fn context(value: JsonValue) -> RenderContext {
    RenderContext::new(vars(value))
}

/// Isolated config directory for CLI runs
pub struct CliEnv {
    pub config_dir: TempDir,
}

impl CliEnv {
    pub fn new() -> Self {
        Self {
            config_dir: TempDir::new().expect("temp config dir"),
        }
    }

    /// Write `config.toml` into the config directory
    pub fn with_config(self, content: &str) -> Self {
        std::fs::write(self.config_dir.path().join("config.toml"), content).expect("write config");
        self
    }

    /// Add a plugin manifest under `<config_dir>/plugins/<name>/plugin.json`
    pub fn with_plugin(self, name: &str, manifest: &str) -> Self {
        let dir = self.config_dir.path().join("plugins").join(name);
        std::fs::create_dir_all(&dir).expect("plugin dir");
        std::fs::write(dir.join("plugin.json"), manifest).expect("write manifest");
        self
    }

    /// The `restpulse` binary with this environment applied
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_restpulse"));
        cmd.env("RESTPULSE_CONFIG_DIR", self.config_dir.path());
        cmd.env_remove("RESTPULSE_LOG");
        cmd
    }
}

/// The `restpulse` binary with an empty config directory
pub fn restpulse() -> (CliEnv, Command) {
    let env = CliEnv::new();
    let cmd = env.command();
    (env, cmd)
}
