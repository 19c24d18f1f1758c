//! Stored responses and the per-request response history

use serde::{Deserialize, Serialize};

use super::{DocType, Model};
use crate::errors::{RestpulseError, Result};
use crate::store::{self, DocFilter, DocumentStore};

/// Responses kept per request
pub const MAX_RESPONSES: usize = 20;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Response {
    #[serde(rename = "_id")]
    pub id: String,
    /// Id of the request this response belongs to
    pub parent_id: Option<String>,
    pub status_code: u16,
    pub status_message: String,
    pub content_type: String,
    pub url: String,
    pub bytes_read: i64,
    /// Milliseconds
    pub elapsed_time: f64,
    pub headers: Vec<ResponseHeader>,
    pub body: String,
    pub error: String,
    pub created: i64,
    pub modified: i64,
}

impl Model for Response {
    const DOC_TYPE: DocType = DocType::Response;

    fn id(&self) -> &str {
        &self.id
    }

    fn parent_id(&self) -> Option<&str> {
        self.parent_id.as_deref()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseHeader {
    pub name: String,
    pub value: String,
}

impl ResponseHeader {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl Response {
    /// First header with the given name (case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    /// All headers with the given name (case-insensitive)
    pub fn headers_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }
}

/// Store a new response, pruning the request's history so that at most
/// [`MAX_RESPONSES`] remain afterwards
pub async fn create(store: &dyn DocumentStore, response: &Response) -> Result<Response> {
    let parent_id = match response.parent_id.as_deref() {
        Some(id) if !id.is_empty() => id,
        _ => return Err(RestpulseError::Store("New Response missing `parentId`".to_string())),
    };

    let keep = store
        .find_most_recently_modified(DocType::Response, &DocFilter::parent(parent_id), MAX_RESPONSES - 1)
        .await?;
    let keep_ids = keep.into_iter().map(|doc| doc.id).collect();
    store
        .remove_bulk(DocType::Response, &DocFilter::parent(parent_id).excluding(keep_ids))
        .await?;

    store::insert(store, response).await
}

pub async fn find_recent_for_request(store: &dyn DocumentStore, request_id: &str, limit: usize) -> Result<Vec<Response>> {
    store::find_recent(store, &DocFilter::parent(request_id), limit).await
}

pub async fn get_latest_for_request(store: &dyn DocumentStore, request_id: &str) -> Result<Option<Response>> {
    Ok(find_recent_for_request(store, request_id, 1).await?.into_iter().next())
}

pub async fn remove_for_request(store: &dyn DocumentStore, request_id: &str) -> Result<usize> {
    store.remove_bulk(DocType::Response, &DocFilter::parent(request_id)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn response_for(request_id: &str, status: u16) -> Response {
        Response {
            parent_id: Some(request_id.to_string()),
            status_code: status,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_requires_parent() {
        let store = MemoryStore::new();
        let err = create(&store, &Response::default()).await;
        assert!(matches!(err, Err(RestpulseError::Store(msg)) if msg.contains("parentId")));
    }

    #[tokio::test]
    async fn test_latest_for_request() {
        let store = MemoryStore::new();
        create(&store, &response_for("req_1", 200)).await.unwrap();
        create(&store, &response_for("req_1", 404)).await.unwrap();
        create(&store, &response_for("req_2", 500)).await.unwrap();

        let latest = get_latest_for_request(&store, "req_1").await.unwrap().unwrap();
        assert_eq!(latest.status_code, 404);
        assert!(latest.id.starts_with("res_"));
        assert!(get_latest_for_request(&store, "req_3").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_history_is_pruned() {
        let store = MemoryStore::new();
        for i in 0..(MAX_RESPONSES + 5) {
            create(&store, &response_for("req_1", 200 + i as u16)).await.unwrap();
        }
        create(&store, &response_for("req_2", 201)).await.unwrap();

        let all = find_recent_for_request(&store, "req_1", 100).await.unwrap();
        assert_eq!(all.len(), MAX_RESPONSES);
        assert_eq!(all[0].status_code, 200 + (MAX_RESPONSES + 4) as u16);
        assert_eq!(find_recent_for_request(&store, "req_2", 100).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_remove_for_request() {
        let store = MemoryStore::new();
        create(&store, &response_for("req_1", 200)).await.unwrap();
        create(&store, &response_for("req_1", 200)).await.unwrap();
        assert_eq!(remove_for_request(&store, "req_1").await.unwrap(), 2);
        assert!(get_latest_for_request(&store, "req_1").await.unwrap().is_none());
    }

    #[test]
    fn test_header_lookup() {
        let response = Response {
            headers: vec![
                ResponseHeader::new("Set-Cookie", "a=1"),
                ResponseHeader::new("set-cookie", "b=2"),
                ResponseHeader::new("Content-Type", "application/json"),
            ],
            ..Default::default()
        };
        assert_eq!(response.header("content-type"), Some("application/json"));
        assert_eq!(response.headers_named("SET-COOKIE").count(), 2);
    }
}
