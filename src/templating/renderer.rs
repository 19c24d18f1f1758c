//! Template renderer
//!
//! Resolves every `{% tag %}` and `{{ variable }}` region of a template
//! against a [`RenderContext`]. Nested renders (tag arguments, variables whose
//! values are templates, tags rendering other templates) carry an explicit
//! depth counter; going past the context's `max_depth` fails with
//! [`RestpulseError::RecursionLimit`].

use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use serde_json::{Map, Value as JsonValue};
use tracing::debug;

use super::definition::ArgValue;
use super::registry::TagRegistry;
use super::tokenizer::{self, Segment, TagArg, TagExpression};
use crate::errors::{RestpulseError, Result};
use crate::store::DocumentStore;

/// Default bound on nested rendering
pub const DEFAULT_MAX_DEPTH: usize = 10;

/// Per-call rendering inputs
#[derive(Clone)]
pub struct RenderContext {
    /// Variable bindings (the resolved environment)
    pub vars: Map<String, JsonValue>,
    /// Store used by `model` arguments
    pub store: Option<Arc<dyn DocumentStore>>,
    pub workspace_id: Option<String>,
    pub environment_id: Option<String>,
    pub max_depth: usize,
}

impl Default for RenderContext {
    fn default() -> Self {
        Self {
            vars: Map::new(),
            store: None,
            workspace_id: None,
            environment_id: None,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl std::fmt::Debug for RenderContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderContext")
            .field("vars", &self.vars)
            .field("store", &self.store.is_some())
            .field("workspace_id", &self.workspace_id)
            .field("environment_id", &self.environment_id)
            .field("max_depth", &self.max_depth)
            .finish()
    }
}

impl RenderContext {
    pub fn new(vars: Map<String, JsonValue>) -> Self {
        Self {
            vars,
            ..Default::default()
        }
    }

    pub fn with_store(mut self, store: Arc<dyn DocumentStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_workspace(mut self, workspace_id: impl Into<String>) -> Self {
        self.workspace_id = Some(workspace_id.into());
        self
    }

    pub fn with_environment(mut self, environment_id: Option<String>) -> Self {
        self.environment_id = environment_id;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Look up a variable
    ///
    /// An exact key wins; otherwise the path is walked through nested objects
    /// and array indexes (`users.0.name`).
    pub fn lookup(&self, path: &str) -> Option<&JsonValue> {
        if let Some(value) = self.vars.get(path) {
            return Some(value);
        }

        let mut parts = path.split('.');
        let mut current = self.vars.get(parts.next()?)?;
        for part in parts {
            current = match current {
                JsonValue::Object(map) => map.get(part)?,
                JsonValue::Array(items) => items.get(part.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }
}

/// Renders templates with the tags of one registry
#[derive(Debug, Clone)]
pub struct TemplateRenderer {
    registry: Arc<TagRegistry>,
}

impl TemplateRenderer {
    pub fn new(registry: Arc<TagRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &TagRegistry {
        &self.registry
    }

    /// Render a template
    ///
    /// Text without template delimiters is returned unchanged. A failing tag
    /// fails the whole render.
    pub async fn render(&self, text: &str, ctx: &RenderContext) -> Result<String> {
        self.render_at(text, ctx, 0).await
    }

    /// Render at a given nesting depth
    pub fn render_at<'a>(&'a self, text: &'a str, ctx: &'a RenderContext, depth: usize) -> BoxFuture<'a, Result<String>> {
        async move {
            if depth > ctx.max_depth {
                return Err(RestpulseError::RecursionLimit(ctx.max_depth));
            }
            if !tokenizer::has_template_syntax(text) {
                return Ok(text.to_string());
            }

            let mut out = String::with_capacity(text.len());
            for segment in tokenizer::segments(text)? {
                match segment {
                    Segment::Text(s) => out.push_str(s),
                    Segment::Variable { path, .. } => out.push_str(&self.render_variable(&path, ctx, depth).await?),
                    Segment::Tag { expr, .. } => out.push_str(&self.run_tag(&expr, ctx, depth).await?),
                }
            }
            Ok(out)
        }
        .boxed()
    }

    /// Resolve a variable; string values holding templates are rendered one
    /// level deeper
    async fn render_variable(&self, path: &str, ctx: &RenderContext, depth: usize) -> Result<String> {
        let value = ctx
            .lookup(path)
            .ok_or_else(|| RestpulseError::UndefinedVariable(path.to_string()))?;
        match value {
            JsonValue::String(s) if tokenizer::has_template_syntax(s) => self.render_at(s, ctx, depth + 1).await,
            JsonValue::String(s) => Ok(s.clone()),
            JsonValue::Null => Ok(String::new()),
            other => Ok(other.to_string()),
        }
    }

    /// Resolve one tag expression
    ///
    /// Arguments are resolved left to right; missing trailing arguments take
    /// their declared defaults.
    pub fn run_tag<'a>(&'a self, expr: &'a TagExpression, ctx: &'a RenderContext, depth: usize) -> BoxFuture<'a, Result<String>> {
        async move {
            let name = match &expr.name {
                Some(name) => name,
                None => return Ok(String::new()),
            };
            let def = self
                .registry
                .find(name)
                .ok_or_else(|| RestpulseError::UnknownTag(name.clone()))?;

            let mut values = Vec::with_capacity(expr.args.len().max(def.args.len()));
            for arg in &expr.args {
                values.push(self.resolve_arg(arg, ctx, depth).await?);
            }
            values.extend(def.args.iter().skip(values.len()).map(|a| a.fill_value()));

            debug!(tag = %name, depth, "Running tag");
            let cx = RunContext {
                renderer: self,
                context: ctx,
                depth: depth + 1,
            };
            def.run.run(&cx, &values).await.map_err(|err| run_error(name, err))
        }
        .boxed()
    }

    fn resolve_arg<'a>(&'a self, arg: &'a TagArg, ctx: &'a RenderContext, depth: usize) -> BoxFuture<'a, Result<ArgValue>> {
        async move {
            Ok(match arg {
                TagArg::Str(s) => ArgValue::Str(s.clone()),
                TagArg::Number(n) => ArgValue::Number(*n),
                TagArg::Bool(b) => ArgValue::Bool(*b),
                TagArg::Variable(path) => ArgValue::Str(self.render_variable(path, ctx, depth).await?),
                TagArg::Tag(inner) => {
                    if depth + 1 > ctx.max_depth {
                        return Err(RestpulseError::RecursionLimit(ctx.max_depth));
                    }
                    ArgValue::Str(self.run_tag(inner, ctx, depth + 1).await?)
                }
            })
        }
        .boxed()
    }

    /// Render nested tag arguments to literals and return the canonical tag
    /// text
    pub async fn flatten(&self, expr: &TagExpression, ctx: &RenderContext) -> Result<String> {
        let mut flat = expr.clone();
        for arg in flat.args.iter_mut() {
            if let TagArg::Tag(inner) = arg {
                let value = self.run_tag(inner, ctx, 1).await?;
                *arg = TagArg::Str(value);
            }
        }
        Ok(tokenizer::untokenize(&flat))
    }
}

/// Errors raised by nested renders keep their identity; anything else is
/// reported as a run failure of `tag`
fn run_error(tag: &str, err: anyhow::Error) -> RestpulseError {
    match err.downcast::<RestpulseError>() {
        Ok(inner) => inner,
        Err(other) => RestpulseError::Run {
            tag: tag.to_string(),
            message: other.to_string(),
        },
    }
}

/// What a running tag can see
pub struct RunContext<'a> {
    renderer: &'a TemplateRenderer,
    context: &'a RenderContext,
    depth: usize,
}

impl<'a> RunContext<'a> {
    pub fn context(&self) -> &RenderContext {
        self.context
    }

    pub fn store(&self) -> Option<&dyn DocumentStore> {
        self.context.store.as_deref()
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Render a template one level below the running tag
    pub fn render<'b>(&'b self, text: &'b str) -> BoxFuture<'b, Result<String>> {
        self.renderer.render_at(text, self.context, self.depth)
    }

    /// Render a template with extra variables layered over the context
    pub fn render_with<'b>(&'b self, text: &'b str, vars: Map<String, JsonValue>) -> BoxFuture<'b, Result<String>> {
        async move {
            let mut scoped = self.context.clone();
            scoped.vars.extend(vars);
            self.renderer.render_at(text, &scoped, self.depth).await
        }
        .boxed()
    }
}
