//! Tag definitions
//!
//! A [`TagDefinition`] describes one kind of tag: its display metadata, the
//! schema of its arguments and the [`TagRun`] that resolves it. Definitions are
//! immutable once registered.

use std::fmt;
use std::sync::Arc;

use futures::future::{self, BoxFuture, FutureExt};

use super::renderer::RunContext;
use super::tokenizer::{format_number, untokenize, TagArg, TagExpression};
use crate::models::DocType;

/// A resolved argument value handed to [`TagRun::run`]
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Str(String),
    Number(f64),
    Bool(bool),
}

impl ArgValue {
    /// String view; numbers and booleans are formatted
    pub fn as_string(&self) -> String {
        self.to_string()
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ArgValue::Number(n) => Some(*n),
            ArgValue::Str(s) => s.trim().parse().ok(),
            ArgValue::Bool(_) => None,
        }
    }

    pub fn as_bool(&self) -> bool {
        match self {
            ArgValue::Bool(b) => *b,
            ArgValue::Number(n) => *n != 0.0,
            ArgValue::Str(s) => matches!(s.as_str(), "true" | "1" | "yes"),
        }
    }

    /// Literal tag argument carrying this value
    pub fn to_tag_arg(&self) -> TagArg {
        match self {
            ArgValue::Str(s) => TagArg::Str(s.clone()),
            ArgValue::Number(n) => TagArg::Number(*n),
            ArgValue::Bool(b) => TagArg::Bool(*b),
        }
    }
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgValue::Str(s) => f.write_str(s),
            ArgValue::Number(n) => f.write_str(&format_number(*n)),
            ArgValue::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl From<&str> for ArgValue {
    fn from(s: &str) -> Self {
        ArgValue::Str(s.to_string())
    }
}

impl From<String> for ArgValue {
    fn from(s: String) -> Self {
        ArgValue::Str(s)
    }
}

impl From<f64> for ArgValue {
    fn from(n: f64) -> Self {
        ArgValue::Number(n)
    }
}

impl From<bool> for ArgValue {
    fn from(b: bool) -> Self {
        ArgValue::Bool(b)
    }
}

/// Function over the current (unrendered) arguments of a tag
pub type ArgFn<T> = Arc<dyn Fn(&[TagArg]) -> T + Send + Sync>;

/// Argument label, fixed or computed from sibling arguments
#[derive(Clone)]
pub enum DisplayName {
    Literal(String),
    Computed(ArgFn<String>),
}

impl DisplayName {
    pub fn resolve(&self, args: &[TagArg]) -> String {
        match self {
            DisplayName::Literal(s) => s.clone(),
            DisplayName::Computed(f) => f(args),
        }
    }
}

impl fmt::Debug for DisplayName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayName::Literal(s) => f.debug_tuple("Literal").field(s).finish(),
            DisplayName::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

/// One choice of an enum argument
#[derive(Debug, Clone, PartialEq)]
pub struct EnumOption {
    pub display_name: String,
    pub value: String,
    pub description: Option<String>,
}

impl EnumOption {
    pub fn new(display_name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            value: value.into(),
            description: None,
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Argument kind
#[derive(Debug, Clone, PartialEq)]
pub enum ArgKind {
    String { placeholder: Option<String> },
    Number { placeholder: Option<String> },
    Enum { options: Vec<EnumOption> },
    /// Id of a stored document of the given type
    Model { model: DocType },
    Boolean,
}

impl ArgKind {
    pub fn name(&self) -> &'static str {
        match self {
            ArgKind::String { .. } => "string",
            ArgKind::Number { .. } => "number",
            ArgKind::Enum { .. } => "enum",
            ArgKind::Model { .. } => "model",
            ArgKind::Boolean => "boolean",
        }
    }
}

/// Schema of one tag argument
#[derive(Clone)]
pub struct ArgDefinition {
    pub kind: ArgKind,
    pub display_name: DisplayName,
    pub help: Option<String>,
    pub default_value: Option<ArgValue>,
    pub hide: Option<ArgFn<bool>>,
}

impl ArgDefinition {
    pub fn new(kind: ArgKind, display_name: impl Into<String>) -> Self {
        Self {
            kind,
            display_name: DisplayName::Literal(display_name.into()),
            help: None,
            default_value: None,
            hide: None,
        }
    }

    pub fn string(display_name: impl Into<String>) -> Self {
        Self::new(ArgKind::String { placeholder: None }, display_name)
    }

    pub fn number(display_name: impl Into<String>) -> Self {
        Self::new(ArgKind::Number { placeholder: None }, display_name)
    }

    pub fn enumeration(display_name: impl Into<String>, options: Vec<EnumOption>) -> Self {
        Self::new(ArgKind::Enum { options }, display_name)
    }

    pub fn model(display_name: impl Into<String>, model: DocType) -> Self {
        Self::new(ArgKind::Model { model }, display_name)
    }

    pub fn boolean(display_name: impl Into<String>) -> Self {
        Self::new(ArgKind::Boolean, display_name)
    }

    /// Set the placeholder of a string or number argument
    pub fn placeholder(mut self, text: impl Into<String>) -> Self {
        match &mut self.kind {
            ArgKind::String { placeholder } | ArgKind::Number { placeholder } => *placeholder = Some(text.into()),
            _ => {}
        }
        self
    }

    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn default_value(mut self, value: impl Into<ArgValue>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn computed_name<F>(mut self, f: F) -> Self
    where
        F: Fn(&[TagArg]) -> String + Send + Sync + 'static,
    {
        self.display_name = DisplayName::Computed(Arc::new(f));
        self
    }

    pub fn hide_when<F>(mut self, f: F) -> Self
    where
        F: Fn(&[TagArg]) -> bool + Send + Sync + 'static,
    {
        self.hide = Some(Arc::new(f));
        self
    }

    pub fn display_name_for(&self, args: &[TagArg]) -> String {
        self.display_name.resolve(args)
    }

    pub fn is_hidden(&self, args: &[TagArg]) -> bool {
        self.hide.as_ref().map(|f| f(args)).unwrap_or(false)
    }

    /// Value used when the argument is missing
    ///
    /// enum: declared default, else the first option; number: 0;
    /// boolean: false; string and model: empty string.
    pub fn fill_value(&self) -> ArgValue {
        if let Some(value) = &self.default_value {
            return value.clone();
        }
        match &self.kind {
            ArgKind::Enum { options } => ArgValue::Str(options.first().map(|o| o.value.clone()).unwrap_or_default()),
            ArgKind::Number { .. } => ArgValue::Number(0.0),
            ArgKind::Boolean => ArgValue::Bool(false),
            ArgKind::String { .. } | ArgKind::Model { .. } => ArgValue::Str(String::new()),
        }
    }

    pub fn default_arg(&self) -> TagArg {
        self.fill_value().to_tag_arg()
    }
}

impl fmt::Debug for ArgDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArgDefinition")
            .field("kind", &self.kind)
            .field("display_name", &self.display_name)
            .field("help", &self.help)
            .field("default_value", &self.default_value)
            .field("hide", &self.hide.is_some())
            .finish()
    }
}

/// Resolution logic of a tag
///
/// `run` may suspend (store lookups, nested renders). Failures are reported
/// through `anyhow`; the renderer surfaces their message verbatim.
pub trait TagRun: Send + Sync {
    fn run<'a>(&'a self, cx: &'a RunContext<'a>, args: &'a [ArgValue]) -> BoxFuture<'a, anyhow::Result<String>>;
}

/// Adapter for run functions that never suspend
pub struct SyncRun<F>(pub F);

impl<F> TagRun for SyncRun<F>
where
    F: Fn(&RunContext<'_>, &[ArgValue]) -> anyhow::Result<String> + Send + Sync,
{
    fn run<'a>(&'a self, cx: &'a RunContext<'a>, args: &'a [ArgValue]) -> BoxFuture<'a, anyhow::Result<String>> {
        future::ready((self.0)(cx, args)).boxed()
    }
}

/// Schema and resolution logic for one kind of tag
#[derive(Clone)]
pub struct TagDefinition {
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub args: Vec<ArgDefinition>,
    pub run: Arc<dyn TagRun>,
}

impl TagDefinition {
    pub fn new(name: impl Into<String>, display_name: impl Into<String>, run: impl TagRun + 'static) -> Self {
        Self {
            name: name.into(),
            display_name: display_name.into(),
            description: String::new(),
            args: Vec::new(),
            run: Arc::new(run),
        }
    }

    /// Definition whose run function never suspends
    pub fn sync<F>(name: impl Into<String>, display_name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&RunContext<'_>, &[ArgValue]) -> anyhow::Result<String> + Send + Sync + 'static,
    {
        Self::new(name, display_name, SyncRun(f))
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn arg(mut self, arg: ArgDefinition) -> Self {
        self.args.push(arg);
        self
    }

    /// Pad a partial argument list with each missing argument's default
    pub fn args_with_defaults(&self, args: &[TagArg]) -> Vec<TagArg> {
        let mut out = args.to_vec();
        out.extend(self.args.iter().skip(args.len()).map(ArgDefinition::default_arg));
        out
    }

    pub fn default_expression(&self) -> TagExpression {
        TagExpression::new(self.name.clone(), self.args_with_defaults(&[]))
    }

    /// Canonical tag text with every argument at its default
    pub fn default_fill(&self) -> String {
        untokenize(&self.default_expression())
    }
}

impl fmt::Debug for TagDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TagDefinition")
            .field("name", &self.name)
            .field("display_name", &self.display_name)
            .field("description", &self.description)
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}
