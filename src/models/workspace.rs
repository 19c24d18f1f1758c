//! Workspace, folder, environment and cookie jar documents

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use super::{DocType, Model};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Workspace {
    #[serde(rename = "_id")]
    pub id: String,
    pub parent_id: Option<String>,
    pub name: String,
    pub description: String,
}

impl Model for Workspace {
    const DOC_TYPE: DocType = DocType::Workspace;

    fn id(&self) -> &str {
        &self.id
    }

    fn parent_id(&self) -> Option<&str> {
        self.parent_id.as_deref()
    }
}

/// A folder of requests; may carry its own environment overrides
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RequestGroup {
    #[serde(rename = "_id")]
    pub id: String,
    pub parent_id: Option<String>,
    pub name: String,
    pub environment: Map<String, JsonValue>,
}

impl Model for RequestGroup {
    const DOC_TYPE: DocType = DocType::RequestGroup;

    fn id(&self) -> &str {
        &self.id
    }

    fn parent_id(&self) -> Option<&str> {
        self.parent_id.as_deref()
    }
}

/// Named variable bindings
///
/// The base environment's parent is the workspace; sub environments are
/// children of the base environment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Environment {
    #[serde(rename = "_id")]
    pub id: String,
    pub parent_id: Option<String>,
    pub name: String,
    pub data: Map<String, JsonValue>,
}

impl Model for Environment {
    const DOC_TYPE: DocType = DocType::Environment;

    fn id(&self) -> &str {
        &self.id
    }

    fn parent_id(&self) -> Option<&str> {
        self.parent_id.as_deref()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CookieJar {
    #[serde(rename = "_id")]
    pub id: String,
    pub parent_id: Option<String>,
    pub name: String,
    pub cookies: Vec<StoredCookie>,
}

impl Model for CookieJar {
    const DOC_TYPE: DocType = DocType::CookieJar;

    fn id(&self) -> &str {
        &self.id
    }

    fn parent_id(&self) -> Option<&str> {
        self.parent_id.as_deref()
    }
}

/// A persisted cookie
///
/// `expires` is an RFC 3339 timestamp; anything unparseable (for example
/// `"Infinity"`) is treated as a session cookie.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoredCookie {
    pub key: String,
    pub value: String,
    pub domain: Option<String>,
    pub path: Option<String>,
    pub expires: Option<String>,
    pub secure: bool,
    pub http_only: bool,
    pub host_only: bool,
    pub creation: Option<String>,
}

impl StoredCookie {
    pub fn new(key: impl Into<String>, value: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            domain: Some(domain.into()),
            path: Some("/".to_string()),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cookie_jar() {
        let json = r#"{
            "_id": "jar_1",
            "parentId": "wrk_1",
            "cookies": [{
                "key": "session",
                "value": "abc",
                "domain": "example.com",
                "path": "/",
                "expires": "2099-01-01T00:00:00.000Z",
                "httpOnly": true,
                "hostOnly": false
            }]
        }"#;
        let jar: CookieJar = serde_json::from_str(json).unwrap();
        assert_eq!(jar.cookies.len(), 1);
        assert!(jar.cookies[0].http_only);
        assert!(!jar.cookies[0].secure);
    }

    #[test]
    fn test_parse_environment_data() {
        let json = r#"{"_id": "env_1", "parentId": "wrk_1", "data": {"base_url": "https://api.example.com"}}"#;
        let env: Environment = serde_json::from_str(json).unwrap();
        assert_eq!(env.data["base_url"], "https://api.example.com");
    }
}
