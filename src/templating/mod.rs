//! Template tags
//!
//! [`tokenizer`] parses tag syntax, [`registry`] holds the available
//! [`TagDefinition`]s and [`renderer`] resolves templates against a
//! [`RenderContext`].

pub mod builtins;
pub mod definition;
pub mod registry;
pub mod renderer;
pub mod tokenizer;

pub use definition::{ArgDefinition, ArgFn, ArgKind, ArgValue, DisplayName, EnumOption, SyncRun, TagDefinition, TagRun};
pub use registry::TagRegistry;
pub use renderer::{RenderContext, RunContext, TemplateRenderer, DEFAULT_MAX_DEPTH};
pub use tokenizer::{tokenize, untokenize, TagArg, TagExpression, MAX_NESTING};
