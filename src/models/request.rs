//! Request documents

use serde::{Deserialize, Serialize};

use super::{DocType, Model};

pub const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";
pub const MULTIPART_FORM: &str = "multipart/form-data";

/// A stored request definition; every text field may contain template tags
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Request {
    #[serde(rename = "_id")]
    pub id: String,
    pub parent_id: Option<String>,
    pub name: String,
    pub method: String,
    pub url: String,
    pub headers: Vec<RequestHeader>,
    pub parameters: Vec<RequestParameter>,
    pub body: RequestBody,
    pub authentication: Authentication,
    pub created: i64,
    pub modified: i64,
}

impl Model for Request {
    const DOC_TYPE: DocType = DocType::Request;

    fn id(&self) -> &str {
        &self.id
    }

    fn parent_id(&self) -> Option<&str> {
        self.parent_id.as_deref()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestHeader {
    pub name: String,
    pub value: String,
    pub disabled: bool,
}

impl RequestHeader {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            disabled: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestParameter {
    pub name: String,
    pub value: String,
    pub disabled: bool,
}

impl RequestParameter {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            disabled: false,
        }
    }
}

/// Request body: raw text or structured form fields
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RequestBody {
    pub mime_type: Option<String>,
    pub text: Option<String>,
    pub params: Vec<BodyParam>,
}

impl RequestBody {
    pub fn text(mime_type: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            mime_type: Some(mime_type.into()),
            text: Some(text.into()),
            params: Vec::new(),
        }
    }

    pub fn form(mime_type: impl Into<String>, params: Vec<BodyParam>) -> Self {
        Self {
            mime_type: Some(mime_type.into()),
            text: None,
            params,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.params.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BodyParam {
    pub name: String,
    pub value: String,
    pub file_name: Option<String>,
    pub disabled: bool,
}

impl BodyParam {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthKind {
    #[default]
    None,
    Basic,
    Bearer,
}

/// Authentication settings; credential fields are templated
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Authentication {
    #[serde(rename = "type")]
    pub kind: AuthKind,
    pub username: String,
    pub password: String,
    pub token: String,
    pub prefix: String,
    pub disabled: bool,
}

impl Authentication {
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            kind: AuthKind::Basic,
            username: username.into(),
            password: password.into(),
            ..Default::default()
        }
    }

    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            kind: AuthKind::Bearer,
            token: token.into(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_export_request() {
        let json = r#"{
            "_id": "req_1",
            "_type": "request",
            "parentId": "wrk_1",
            "name": "Get user",
            "method": "GET",
            "url": "{{ base_url }}/users",
            "headers": [{"name": "Accept", "value": "application/json"}],
            "parameters": [{"name": "page", "value": "1", "disabled": true}],
            "body": {},
            "authentication": {}
        }"#;

        let request: Request = serde_json::from_str(json).unwrap();
        assert_eq!(request.id, "req_1");
        assert_eq!(request.parent_id.as_deref(), Some("wrk_1"));
        assert_eq!(request.headers.len(), 1);
        assert!(!request.headers[0].disabled);
        assert!(request.parameters[0].disabled);
        assert!(request.body.is_empty());
        assert_eq!(request.authentication.kind, AuthKind::None);
    }

    #[test]
    fn test_parse_bearer_auth() {
        let auth: Authentication =
            serde_json::from_str(r#"{"type": "bearer", "token": "{% env 'token' %}"}"#).unwrap();
        assert_eq!(auth.kind, AuthKind::Bearer);
        assert_eq!(auth.token, "{% env 'token' %}");
    }
}
