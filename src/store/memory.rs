//! In-memory document store

use std::path::Path;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use dashmap::DashMap;
use futures::future::{self, BoxFuture, FutureExt};
use serde::Deserialize;
use serde_json::{Map, Value as JsonValue};
use tracing::debug;
use uuid::Uuid;

use super::{DocFilter, Document, DocumentStore};
use crate::errors::{RestpulseError, Result};
use crate::models::DocType;

/// Bookkeeping keys that live on [`Document`] rather than in its fields
const RESERVED_KEYS: &[&str] = &["_id", "_type", "type", "parentId", "created", "modified"];

/// Workspace export file (`{"resources": [...]}`)
#[derive(Debug, Deserialize)]
struct ExportFile {
    #[serde(default)]
    resources: Vec<Map<String, JsonValue>>,
}

/// A [`DocumentStore`] kept entirely in memory
///
/// `modified` timestamps are strictly increasing across the store so
/// "most recently modified" ordering is deterministic.
#[derive(Debug, Default)]
pub struct MemoryStore {
    docs: DashMap<String, Document>,
    clock: AtomicI64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a workspace export
    ///
    /// Resources with an unknown `_type` are skipped.
    pub fn from_export(json: &str) -> Result<Self> {
        let export: ExportFile = serde_json::from_str(json)?;
        let store = Self::new();

        for resource in export.resources {
            let type_name = resource.get("_type").and_then(JsonValue::as_str).unwrap_or_default();
            match DocType::from_export_type(type_name) {
                Some(doc_type) => {
                    store.insert_doc(doc_type, resource);
                }
                None => debug!(resource_type = type_name, "Skipping unsupported export resource"),
            }
        }

        debug!(documents = store.len(), "Loaded workspace export");
        Ok(store)
    }

    pub fn from_export_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_export(&content)
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    fn tick(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let previous = self
            .clock
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |prev| Some(now.max(prev + 1)))
            .unwrap_or(now);
        now.max(previous + 1)
    }

    fn insert_doc(&self, doc_type: DocType, mut patch: Map<String, JsonValue>) -> Document {
        let id = patch
            .get("_id")
            .and_then(JsonValue::as_str)
            .filter(|id| !id.is_empty())
            .map(String::from)
            .unwrap_or_else(|| format!("{}_{}", doc_type.prefix(), Uuid::new_v4().simple()));
        let parent_id = patch
            .get("parentId")
            .and_then(JsonValue::as_str)
            .map(String::from);

        let modified = self.tick();
        let created = patch
            .get("created")
            .and_then(JsonValue::as_i64)
            .filter(|c| *c > 0)
            .unwrap_or(modified);

        for key in RESERVED_KEYS {
            patch.remove(*key);
        }

        let doc = Document {
            id: id.clone(),
            doc_type,
            parent_id,
            created,
            modified,
            fields: patch,
        };

        debug!(id = %id, doc_type = %doc_type, "Stored document");
        self.docs.insert(id, doc.clone());
        doc
    }

    fn matching(&self, doc_type: DocType, filter: &DocFilter) -> Vec<Document> {
        self.docs
            .iter()
            .filter(|entry| entry.doc_type == doc_type && filter.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect()
    }
}

impl DocumentStore for MemoryStore {
    fn get_by_id<'a>(&'a self, doc_type: DocType, id: &'a str) -> BoxFuture<'a, Result<Option<Document>>> {
        let found = self
            .docs
            .get(id)
            .filter(|doc| doc.doc_type == doc_type)
            .map(|doc| doc.value().clone());
        future::ready(Ok(found)).boxed()
    }

    fn find_most_recently_modified<'a>(
        &'a self,
        doc_type: DocType,
        filter: &'a DocFilter,
        limit: usize,
    ) -> BoxFuture<'a, Result<Vec<Document>>> {
        let mut docs = self.matching(doc_type, filter);
        docs.sort_by(|a, b| b.modified.cmp(&a.modified));
        docs.truncate(limit);
        future::ready(Ok(docs)).boxed()
    }

    fn remove_bulk<'a>(&'a self, doc_type: DocType, filter: &'a DocFilter) -> BoxFuture<'a, Result<usize>> {
        let ids: Vec<String> = self
            .matching(doc_type, filter)
            .into_iter()
            .map(|doc| doc.id)
            .collect();
        for id in &ids {
            self.docs.remove(id);
        }
        debug!(doc_type = %doc_type, removed = ids.len(), "Removed documents");
        future::ready(Ok(ids.len())).boxed()
    }

    fn create<'a>(&'a self, doc_type: DocType, patch: Map<String, JsonValue>) -> BoxFuture<'a, Result<Document>> {
        let result = match patch.get("_id").and_then(JsonValue::as_str) {
            Some(id) if self.docs.contains_key(id) => {
                Err(RestpulseError::Store(format!("Document {} already exists", id)))
            }
            _ => Ok(self.insert_doc(doc_type, patch)),
        };
        future::ready(result).boxed()
    }

    fn update<'a>(
        &'a self,
        doc_type: DocType,
        id: &'a str,
        mut patch: Map<String, JsonValue>,
    ) -> BoxFuture<'a, Result<Document>> {
        let modified = self.tick();
        let result = match self.docs.get_mut(id) {
            Some(mut doc) if doc.doc_type == doc_type => {
                if let Some(parent) = patch.get("parentId").and_then(JsonValue::as_str) {
                    doc.parent_id = Some(parent.to_string());
                }
                for key in RESERVED_KEYS {
                    patch.remove(*key);
                }
                doc.fields.extend(patch);
                doc.modified = modified;
                debug!(id = %id, doc_type = %doc_type, "Updated document");
                Ok(doc.clone())
            }
            _ => Err(RestpulseError::not_found(doc_type.as_str(), id)),
        };
        future::ready(result).boxed()
    }

    fn all<'a>(&'a self, doc_type: DocType) -> BoxFuture<'a, Result<Vec<Document>>> {
        let mut docs = self.matching(doc_type, &DocFilter::all());
        docs.sort_by(|a, b| a.created.cmp(&b.created).then_with(|| a.modified.cmp(&b.modified)));
        future::ready(Ok(docs)).boxed()
    }
}
