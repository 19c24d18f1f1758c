//! Command execution for the `restpulse` binary

use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use serde_json::{json, Map, Value as JsonValue};
use tracing::{debug, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::cli::{Args, Command, HarArgs, RenderArgs, RequestArgs};
use crate::config::Config;
use crate::errors::{RestpulseError, Result};
use crate::har::{export_har, export_har_log};
use crate::plugins::{register_plugins, PluginLoader};
use crate::render::RequestRenderer;
use crate::status::ExitStatus;
use crate::store::MemoryStore;
use crate::templating::{ArgDefinition, ArgKind, RenderContext, TagDefinition, TagRegistry, TemplateRenderer};

/// Environment variable holding the log filter
pub const LOG_ENV: &str = "RESTPULSE_LOG";

/// Main entry point for the CLI.
///
/// Parses arguments, loads configuration and plugins, then runs the
/// selected command. Output goes to stdout, failures to stderr.
pub fn run(args: Vec<String>) -> ExitStatus {
    let parsed = match Args::try_parse_from(&args) {
        Ok(parsed) => parsed,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitStatus::Error
            } else {
                ExitStatus::Success
            };
        }
    };

    init_logging(parsed.debug);

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            warn!(error = %e, "Failed to load config, using defaults");
            Config::default()
        }
    };

    let registry = Arc::new(build_registry(&config));

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("restpulse: {}", e);
            return ExitStatus::Error;
        }
    };

    match runtime.block_on(execute(parsed.command, registry, &config)) {
        Ok(output) => {
            println!("{}", output);
            ExitStatus::Success
        }
        Err(e) => {
            eprintln!("restpulse: {}", e);
            ExitStatus::from(&e)
        }
    }
}

fn init_logging(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

/// Built-in tags plus every discoverable plugin tag
pub fn build_registry(config: &Config) -> TagRegistry {
    let mut registry = TagRegistry::with_builtins();
    if !config.plugins.enabled {
        return registry;
    }

    let mut loader = PluginLoader::default();
    let extra = std::iter::once(config.config_dir.join("plugins")).chain(config.plugin_dirs());
    for dir in extra {
        if !loader.search_paths().contains(&dir) {
            loader.add_search_path(dir);
        }
    }

    match loader.discover() {
        Ok(plugins) => {
            let count = register_plugins(&mut registry, &plugins);
            debug!(plugins = plugins.len(), tags = count, "Plugin discovery finished");
        }
        Err(e) => warn!(error = %e, "Plugin discovery failed"),
    }
    registry
}

/// Run one command; the returned text is printed on stdout
pub async fn execute(command: Command, registry: Arc<TagRegistry>, config: &Config) -> Result<String> {
    match command {
        Command::Tags(args) => list_tags(&registry, args.json),
        Command::Fill(args) => registry.default_fill(&args.name),
        Command::Render(args) => render_template(args, registry, config).await,
        Command::Request(args) => render_stored_request(args, registry, config).await,
        Command::Har(args) => export(args, registry, config).await,
    }
}

fn list_tags(registry: &TagRegistry, as_json: bool) -> Result<String> {
    if as_json {
        let tags: Vec<JsonValue> = registry.list().map(describe_tag).collect();
        return Ok(serde_json::to_string_pretty(&tags)?);
    }

    let lines: Vec<String> = registry
        .list()
        .map(|def| format!("{:<12} {:<20} {}", def.name, def.display_name, def.default_fill()))
        .collect();
    Ok(lines.join("\n"))
}

fn describe_tag(def: &TagDefinition) -> JsonValue {
    json!({
        "name": def.name,
        "displayName": def.display_name,
        "description": def.description,
        "args": def.args.iter().map(describe_arg).collect::<Vec<_>>(),
        "defaultFill": def.default_fill(),
    })
}

fn describe_arg(arg: &ArgDefinition) -> JsonValue {
    let mut out = json!({
        "type": arg.kind.name(),
        "displayName": arg.display_name_for(&[]),
        "defaultValue": arg.fill_value().as_string(),
    });
    if let Some(help) = &arg.help {
        out["help"] = json!(help);
    }
    match &arg.kind {
        ArgKind::Enum { options } => {
            out["options"] = options
                .iter()
                .map(|o| json!({"displayName": o.display_name, "value": o.value}))
                .collect();
        }
        ArgKind::Model { model } => out["model"] = json!(model.as_str()),
        ArgKind::String { placeholder: Some(p) } | ArgKind::Number { placeholder: Some(p) } => {
            out["placeholder"] = json!(p);
        }
        _ => {}
    }
    out
}

async fn render_template(args: RenderArgs, registry: Arc<TagRegistry>, config: &Config) -> Result<String> {
    let mut vars = match &args.vars_file {
        Some(path) => read_vars_file(path)?,
        None => Map::new(),
    };
    for (key, value) in args.vars {
        vars.insert(key, JsonValue::String(value));
    }

    let ctx = RenderContext::new(vars).with_max_depth(config.render.max_depth);
    TemplateRenderer::new(registry).render(&args.template, &ctx).await
}

fn read_vars_file(path: &Path) -> Result<Map<String, JsonValue>> {
    let content = std::fs::read_to_string(path)?;
    match serde_json::from_str(&content)? {
        JsonValue::Object(map) => Ok(map),
        _ => Err(RestpulseError::Config(format!(
            "Variables file {} must contain a JSON object",
            path.display()
        ))),
    }
}

fn request_renderer(data: &Path, registry: Arc<TagRegistry>, config: &Config) -> Result<RequestRenderer> {
    let store = MemoryStore::from_export_file(data)?;
    debug!(path = %data.display(), documents = store.len(), "Loaded workspace export");
    Ok(RequestRenderer::new(registry, Arc::new(store)).with_max_depth(config.render.max_depth))
}

async fn render_stored_request(args: RequestArgs, registry: Arc<TagRegistry>, config: &Config) -> Result<String> {
    let renderer = request_renderer(&args.data, registry, config)?;
    let rendered = renderer
        .get_rendered_request(&args.request_id, args.environment.as_deref())
        .await?;
    Ok(serde_json::to_string_pretty(&rendered)?)
}

async fn export(args: HarArgs, registry: Arc<TagRegistry>, config: &Config) -> Result<String> {
    let renderer = request_renderer(&args.data, registry, config)?;
    let add_content_length = args.content_length || config.export.add_content_length;
    let environment = args.environment.as_deref();

    if args.log {
        let har = export_har_log(&renderer, &args.request_ids, environment, add_content_length).await?;
        return Ok(serde_json::to_string_pretty(&har)?);
    }

    let mut requests = Vec::with_capacity(args.request_ids.len());
    for id in &args.request_ids {
        requests.push(export_har(&renderer, id, environment, add_content_length).await?);
    }

    if requests.len() == 1 {
        Ok(serde_json::to_string_pretty(&requests[0])?)
    } else {
        Ok(serde_json::to_string_pretty(&requests)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{FillArgs, TagsArgs};
    use tempfile::TempDir;

    fn config() -> Config {
        let mut config = Config::from_toml_str("", "/nonexistent").unwrap();
        config.plugins.enabled = false;
        config
    }

    fn registry() -> Arc<TagRegistry> {
        Arc::new(build_registry(&config()))
    }

    #[tokio::test]
    async fn test_fill_command() {
        let out = execute(Command::Fill(FillArgs { name: "uuid".into() }), registry(), &config())
            .await
            .unwrap();
        assert_eq!(out, "{% uuid('v4') %}");

        let err = execute(Command::Fill(FillArgs { name: "nope".into() }), registry(), &config()).await;
        assert!(matches!(err, Err(RestpulseError::UnknownTag(name)) if name == "nope"));
    }

    #[tokio::test]
    async fn test_tags_json_lists_builtins() {
        let out = execute(Command::Tags(TagsArgs { json: true }), registry(), &config())
            .await
            .unwrap();
        let tags: Vec<JsonValue> = serde_json::from_str(&out).unwrap();
        let names: Vec<&str> = tags.iter().filter_map(|t| t["name"].as_str()).collect();
        assert!(names.contains(&"uuid"));
        assert!(names.contains(&"response"));
        let response = tags.iter().find(|t| t["name"] == "response").unwrap();
        assert_eq!(response["args"][0]["type"], "model");
        assert_eq!(response["args"][0]["model"], "Request");
        assert_eq!(response["args"][1]["options"][0]["value"], "body");
    }

    #[tokio::test]
    async fn test_render_command_vars() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("vars.json");
        std::fs::write(&file, r#"{"host": "file.example.com", "port": 8080}"#).unwrap();

        let args = RenderArgs {
            template: "{{ host }}:{{ port }}".into(),
            vars: vec![("host".into(), "cli.example.com".into())],
            vars_file: Some(file),
        };
        let out = execute(Command::Render(args), registry(), &config()).await.unwrap();
        assert_eq!(out, "cli.example.com:8080");
    }

    #[tokio::test]
    async fn test_vars_file_must_be_object() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("vars.json");
        std::fs::write(&file, "[1, 2]").unwrap();
        let args = RenderArgs {
            template: "x".into(),
            vars: vec![],
            vars_file: Some(file),
        };
        let err = execute(Command::Render(args), registry(), &config()).await;
        assert!(matches!(err, Err(RestpulseError::Config(_))));
    }

    #[test]
    fn test_plugins_from_config_dirs() {
        let temp = TempDir::new().unwrap();
        let plugin = temp.path().join("plugins").join("shout");
        std::fs::create_dir_all(&plugin).unwrap();
        std::fs::write(
            plugin.join("plugin.json"),
            r#"{"name": "shout", "tags": [{"name": "shout", "template": "HEY"}]}"#,
        )
        .unwrap();

        let config = Config::from_toml_str("[plugins]\ndirs = [\"plugins\"]\n", temp.path()).unwrap();
        assert!(build_registry(&config).contains("shout"));
    }
}
