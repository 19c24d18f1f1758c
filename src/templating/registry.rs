//! Tag definition registry
//!
//! Built once at startup (built-ins plus plugin tags) and shared read-only
//! with every renderer through an `Arc`.

use indexmap::IndexMap;
use tracing::{debug, warn};

use super::builtins;
use super::definition::TagDefinition;
use super::tokenizer::{self, TagExpression};
use crate::errors::{RestpulseError, Result};

/// Catalog of tag definitions in registration order
#[derive(Debug, Clone, Default)]
pub struct TagRegistry {
    tags: IndexMap<String, TagDefinition>,
}

impl TagRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in tag
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for def in builtins::definitions() {
            registry.register(def);
        }
        registry
    }

    /// Register a definition; an existing one with the same name is replaced
    /// in place
    pub fn register(&mut self, def: TagDefinition) {
        let name = def.name.clone();
        if self.tags.insert(name.clone(), def).is_some() {
            warn!(tag = %name, "Replacing existing tag definition");
        } else {
            debug!(tag = %name, "Registered tag definition");
        }
    }

    /// Register a definition, rejecting duplicate names
    pub fn try_register(&mut self, def: TagDefinition) -> Result<()> {
        if self.tags.contains_key(&def.name) {
            return Err(RestpulseError::DuplicateTag(def.name));
        }
        self.register(def);
        Ok(())
    }

    pub fn list(&self) -> impl Iterator<Item = &TagDefinition> {
        self.tags.values()
    }

    pub fn find(&self, name: &str) -> Option<&TagDefinition> {
        self.tags.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tags.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Canonical tag text for `name` with every argument at its default
    pub fn default_fill(&self, name: &str) -> Result<String> {
        self.find(name)
            .map(TagDefinition::default_fill)
            .ok_or_else(|| RestpulseError::UnknownTag(name.to_string()))
    }

    /// Tokenize a tag block, keeping the original text of unregistered tags
    /// so they round-trip unchanged
    pub fn tokenize(&self, text: &str) -> Result<TagExpression> {
        let mut expr = tokenizer::tokenize(text)?;
        let known = expr.name.as_deref().map(|name| self.contains(name)).unwrap_or(false);
        if !known {
            expr.raw_value = Some(text.to_string());
        }
        Ok(expr)
    }
}
