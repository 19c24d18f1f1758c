//! Plugin manifests

use std::path::Path;

use futures::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::errors::{RestpulseError, Result};
use crate::models::DocType;
use crate::templating::{ArgDefinition, ArgKind, ArgValue, EnumOption, RunContext, TagDefinition, TagRun};

/// Plugin manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginManifest {
    /// Plugin name
    pub name: String,

    /// Plugin version
    #[serde(default)]
    pub version: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub author: Option<String>,

    /// Tags this plugin provides
    #[serde(default)]
    pub tags: Vec<TagSpec>,
}

/// A tag declared by a plugin
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagSpec {
    pub name: String,

    #[serde(default)]
    pub display_name: Option<String>,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub args: Vec<ArgSpec>,

    /// Rendered in the caller's context when the tag runs
    pub template: String,
}

/// Declared argument of a plugin tag
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArgSpec {
    #[serde(rename = "type", default = "default_arg_type")]
    pub kind: String,

    #[serde(default)]
    pub display_name: String,

    /// Variable name the value is bound to inside the template
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub placeholder: Option<String>,

    #[serde(default)]
    pub help: Option<String>,

    #[serde(default)]
    pub default: Option<JsonValue>,

    #[serde(default)]
    pub options: Vec<OptionSpec>,

    /// Document type for `model` arguments
    #[serde(default)]
    pub model: Option<String>,
}

fn default_arg_type() -> String {
    "string".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionSpec {
    pub display_name: String,
    pub value: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl PluginManifest {
    /// Load manifest from a file, format chosen by extension
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;

        let ext = path.as_ref()
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("json");

        Self::parse(&content, ext)
    }

    /// Parse manifest text in the given format (`yaml`, `yml`, `toml` or `json`)
    pub fn parse(content: &str, format: &str) -> Result<Self> {
        let manifest: Self = match format {
            "yaml" | "yml" => serde_yaml::from_str(content)
                .map_err(|e| RestpulseError::Config(format!("Failed to parse plugin manifest: {}", e)))?,
            "toml" => toml::from_str(content)
                .map_err(|e| RestpulseError::Config(format!("Failed to parse plugin manifest: {}", e)))?,
            _ => serde_json::from_str(content)
                .map_err(|e| RestpulseError::Config(format!("Failed to parse plugin manifest: {}", e)))?,
        };

        if manifest.name.trim().is_empty() {
            return Err(RestpulseError::Config("Plugin manifest has no name".to_string()));
        }
        Ok(manifest)
    }

    /// Tag definitions declared by this manifest
    pub fn definitions(&self) -> Result<Vec<TagDefinition>> {
        self.tags.iter().map(TagSpec::to_definition).collect()
    }
}

impl TagSpec {
    pub fn to_definition(&self) -> Result<TagDefinition> {
        if self.name.trim().is_empty() {
            return Err(RestpulseError::Config("Plugin tag has no name".to_string()));
        }

        let names = self.args.iter().map(|a| a.name.clone()).collect();
        let display = self.display_name.clone().unwrap_or_else(|| self.name.clone());
        let mut def = TagDefinition::new(
            self.name.clone(),
            display,
            TemplateTag {
                template: self.template.clone(),
                names,
            },
        )
        .description(self.description.clone());

        for arg in &self.args {
            def = def.arg(arg.to_definition(&self.name)?);
        }
        Ok(def)
    }
}

impl ArgSpec {
    fn to_definition(&self, tag: &str) -> Result<ArgDefinition> {
        let kind = match self.kind.as_str() {
            "string" => ArgKind::String { placeholder: self.placeholder.clone() },
            "number" => ArgKind::Number { placeholder: self.placeholder.clone() },
            "boolean" => ArgKind::Boolean,
            "enum" => ArgKind::Enum {
                options: self
                    .options
                    .iter()
                    .map(|o| {
                        let option = EnumOption::new(o.display_name.clone(), o.value.clone());
                        match &o.description {
                            Some(d) => option.describe(d.clone()),
                            None => option,
                        }
                    })
                    .collect(),
            },
            "model" => {
                let name = self.model.as_deref().unwrap_or_default();
                let model = DocType::from_name(name).ok_or_else(|| {
                    RestpulseError::Config(format!("Tag '{}': unknown model type '{}'", tag, name))
                })?;
                ArgKind::Model { model }
            }
            other => {
                return Err(RestpulseError::Config(format!(
                    "Tag '{}': unknown argument type '{}'",
                    tag, other
                )))
            }
        };

        let mut def = ArgDefinition::new(kind, self.display_name.clone());
        if let Some(help) = &self.help {
            def = def.help(help.clone());
        }
        if let Some(value) = self.default.as_ref().and_then(json_to_arg) {
            def = def.default_value(value);
        }
        Ok(def)
    }
}

fn json_to_arg(value: &JsonValue) -> Option<ArgValue> {
    match value {
        JsonValue::String(s) => Some(ArgValue::Str(s.clone())),
        JsonValue::Number(n) => n.as_f64().map(ArgValue::Number),
        JsonValue::Bool(b) => Some(ArgValue::Bool(*b)),
        _ => None,
    }
}

fn arg_to_json(value: &ArgValue) -> JsonValue {
    match value {
        ArgValue::Str(s) => JsonValue::String(s.clone()),
        ArgValue::Number(n) => serde_json::Number::from_f64(*n)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        ArgValue::Bool(b) => JsonValue::Bool(*b),
    }
}

/// Runs a plugin tag by rendering its template
struct TemplateTag {
    template: String,
    names: Vec<Option<String>>,
}

impl TagRun for TemplateTag {
    fn run<'a>(&'a self, cx: &'a RunContext<'a>, args: &'a [ArgValue]) -> BoxFuture<'a, anyhow::Result<String>> {
        async move {
            let mut vars = Map::new();
            vars.insert("args".to_string(), JsonValue::Array(args.iter().map(arg_to_json).collect()));
            for (name, value) in self.names.iter().zip(args) {
                if let Some(name) = name {
                    vars.insert(name.clone(), arg_to_json(value));
                }
            }
            Ok(cx.render_with(&self.template, vars).await?)
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templating::{RenderContext, TagRegistry, TemplateRenderer};
    use std::sync::Arc;

    const GREETING: &str = r#"
name = "greetings"
version = "0.1.0"

[[tags]]
name = "greet"
display_name = "Greet"
template = "{{ salutation }}, {{ who }}!"

[[tags.args]]
type = "enum"
name = "salutation"
display_name = "Salutation"
options = [
    { display_name = "Hello", value = "Hello" },
    { display_name = "Hi", value = "Hi" },
]

[[tags.args]]
type = "string"
name = "who"
display_name = "Name"
default = "world"
"#;

    #[test]
    fn test_parse_toml_manifest() {
        let manifest = PluginManifest::parse(GREETING, "toml").unwrap();
        assert_eq!(manifest.name, "greetings");
        let defs = manifest.definitions().unwrap();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].display_name, "Greet");
        assert_eq!(defs[0].args.len(), 2);
        assert_eq!(defs[0].default_fill(), "{% greet('Hello', 'world') %}");
    }

    #[test]
    fn test_parse_yaml_manifest() {
        let yaml = "name: y\ntags:\n  - name: twice\n    template: \"{{ args.0 }}{{ args.0 }}\"\n    args:\n      - type: number\n        display_name: N\n";
        let manifest = PluginManifest::parse(yaml, "yaml").unwrap();
        let defs = manifest.definitions().unwrap();
        assert_eq!(defs[0].args[0].kind.name(), "number");
    }

    #[test]
    fn test_unknown_arg_type_rejected() {
        let json = r#"{"name": "bad", "tags": [{"name": "t", "template": "", "args": [{"type": "color"}]}]}"#;
        let manifest = PluginManifest::parse(json, "json").unwrap();
        assert!(matches!(manifest.definitions(), Err(RestpulseError::Config(_))));
    }

    #[test]
    fn test_unknown_model_rejected() {
        let json = r#"{"name": "bad", "tags": [{"name": "t", "template": "", "args": [{"type": "model", "model": "Nope"}]}]}"#;
        let manifest = PluginManifest::parse(json, "json").unwrap();
        assert!(manifest.definitions().is_err());
    }

    #[test]
    fn test_missing_name_rejected() {
        assert!(PluginManifest::parse(r#"{"name": " "}"#, "json").is_err());
    }

    #[tokio::test]
    async fn test_template_tag_runs() {
        let manifest = PluginManifest::parse(GREETING, "toml").unwrap();
        let mut registry = TagRegistry::new();
        for def in manifest.definitions().unwrap() {
            registry.register(def);
        }
        let renderer = TemplateRenderer::new(Arc::new(registry));
        let ctx = RenderContext::default();
        assert_eq!(renderer.render("{% greet 'Hi', 'Ada' %}", &ctx).await.unwrap(), "Hi, Ada!");
        assert_eq!(renderer.render("{% greet %}", &ctx).await.unwrap(), "Hello, world!");
    }
}
