//! Document store interface
//!
//! The rendering core treats persistence as an opaque key-value/query store.
//! [`DocumentStore`] is object safe: every method returns a boxed future so
//! implementations are free to suspend on I/O.

pub mod memory;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::errors::{RestpulseError, Result};
use crate::models::{DocType, Model};

pub use memory::MemoryStore;

/// A stored document: bookkeeping fields plus the model's own fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "type")]
    pub doc_type: DocType,
    #[serde(rename = "parentId", default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub created: i64,
    #[serde(default)]
    pub modified: i64,
    #[serde(flatten)]
    pub fields: Map<String, JsonValue>,
}

impl Document {
    /// Decode into a typed model
    pub fn decode<M: Model>(&self) -> Result<M> {
        if self.doc_type != M::DOC_TYPE {
            return Err(RestpulseError::Store(format!(
                "Document {} is a {}, not a {}",
                self.id,
                self.doc_type,
                M::DOC_TYPE
            )));
        }
        Ok(serde_json::from_value(serde_json::to_value(self)?)?)
    }
}

/// Query filter over documents of one type
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocFilter {
    pub parent_id: Option<String>,
    pub exclude_ids: Vec<String>,
}

impl DocFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn parent(parent_id: impl Into<String>) -> Self {
        Self {
            parent_id: Some(parent_id.into()),
            exclude_ids: Vec::new(),
        }
    }

    pub fn excluding(mut self, ids: Vec<String>) -> Self {
        self.exclude_ids = ids;
        self
    }

    pub fn matches(&self, doc: &Document) -> bool {
        let parent_ok = match &self.parent_id {
            Some(parent) => doc.parent_id.as_deref() == Some(parent.as_str()),
            None => true,
        };
        parent_ok && !self.exclude_ids.iter().any(|id| id == &doc.id)
    }
}

/// Persistence operations consumed by the rendering core
pub trait DocumentStore: Send + Sync {
    fn get_by_id<'a>(&'a self, doc_type: DocType, id: &'a str) -> BoxFuture<'a, Result<Option<Document>>>;

    /// Matching documents, newest `modified` first, at most `limit`
    fn find_most_recently_modified<'a>(
        &'a self,
        doc_type: DocType,
        filter: &'a DocFilter,
        limit: usize,
    ) -> BoxFuture<'a, Result<Vec<Document>>>;

    /// Remove matching documents, returning how many were removed
    fn remove_bulk<'a>(&'a self, doc_type: DocType, filter: &'a DocFilter) -> BoxFuture<'a, Result<usize>>;

    /// Create a document from a patch; `_id` and `parentId` are honoured when present
    fn create<'a>(&'a self, doc_type: DocType, patch: Map<String, JsonValue>) -> BoxFuture<'a, Result<Document>>;

    /// Merge a patch into an existing document, bumping `modified`
    fn update<'a>(
        &'a self,
        doc_type: DocType,
        id: &'a str,
        patch: Map<String, JsonValue>,
    ) -> BoxFuture<'a, Result<Document>>;

    fn all<'a>(&'a self, doc_type: DocType) -> BoxFuture<'a, Result<Vec<Document>>>;
}

/// Fetch a typed document
pub async fn get<M: Model>(store: &dyn DocumentStore, id: &str) -> Result<Option<M>> {
    match store.get_by_id(M::DOC_TYPE, id).await? {
        Some(doc) => Ok(Some(doc.decode()?)),
        None => Ok(None),
    }
}

/// Fetch a typed document, failing with `NotFound` when it does not exist
pub async fn get_required<M: Model>(store: &dyn DocumentStore, id: &str) -> Result<M> {
    get(store, id)
        .await?
        .ok_or_else(|| RestpulseError::not_found(M::DOC_TYPE.as_str(), id))
}

pub async fn find_recent<M: Model>(store: &dyn DocumentStore, filter: &DocFilter, limit: usize) -> Result<Vec<M>> {
    store
        .find_most_recently_modified(M::DOC_TYPE, filter, limit)
        .await?
        .iter()
        .map(Document::decode::<M>)
        .collect()
}

/// Insert a typed model; an empty id is replaced by a generated one
pub async fn insert<M: Model>(store: &dyn DocumentStore, model: &M) -> Result<M> {
    let mut patch = match serde_json::to_value(model)? {
        JsonValue::Object(map) => map,
        other => {
            return Err(RestpulseError::Store(format!(
                "{} did not serialize to an object: {}",
                M::DOC_TYPE,
                other
            )))
        }
    };
    if model.id().is_empty() {
        patch.remove("_id");
    }
    store.create(M::DOC_TYPE, patch).await?.decode()
}
