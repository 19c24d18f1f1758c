//! Document models consumed by the rendering core
//!
//! Models are plain serde structs stored as JSON documents in a
//! [`DocumentStore`](crate::store::DocumentStore). Field names follow the
//! camelCase workspace export format.

pub mod request;
pub mod response;
pub mod workspace;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use request::{Authentication, AuthKind, BodyParam, Request, RequestBody, RequestHeader, RequestParameter};
pub use response::{Response, ResponseHeader, MAX_RESPONSES};
pub use workspace::{CookieJar, Environment, RequestGroup, StoredCookie, Workspace};

/// Document type names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocType {
    Workspace,
    RequestGroup,
    Request,
    Environment,
    CookieJar,
    Response,
}

impl DocType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocType::Workspace => "Workspace",
            DocType::RequestGroup => "RequestGroup",
            DocType::Request => "Request",
            DocType::Environment => "Environment",
            DocType::CookieJar => "CookieJar",
            DocType::Response => "Response",
        }
    }

    /// Prefix used when generating ids
    pub fn prefix(&self) -> &'static str {
        match self {
            DocType::Workspace => "wrk",
            DocType::RequestGroup => "fld",
            DocType::Request => "req",
            DocType::Environment => "env",
            DocType::CookieJar => "jar",
            DocType::Response => "res",
        }
    }

    /// Parse the `_type` value used in workspace exports
    pub fn from_export_type(s: &str) -> Option<Self> {
        match s {
            "workspace" => Some(DocType::Workspace),
            "request_group" => Some(DocType::RequestGroup),
            "request" => Some(DocType::Request),
            "environment" => Some(DocType::Environment),
            "cookie_jar" => Some(DocType::CookieJar),
            "response" => Some(DocType::Response),
            _ => None,
        }
    }

    /// Parse a type name as used by `model` tag arguments
    pub fn from_name(s: &str) -> Option<Self> {
        match s {
            "Workspace" => Some(DocType::Workspace),
            "RequestGroup" => Some(DocType::RequestGroup),
            "Request" => Some(DocType::Request),
            "Environment" => Some(DocType::Environment),
            "CookieJar" => Some(DocType::CookieJar),
            "Response" => Some(DocType::Response),
            other => DocType::from_export_type(other),
        }
    }
}

impl fmt::Display for DocType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed document
pub trait Model: Serialize + DeserializeOwned + Send + Sync {
    const DOC_TYPE: DocType;

    fn id(&self) -> &str;

    fn parent_id(&self) -> Option<&str>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_types() {
        assert_eq!(DocType::from_export_type("request_group"), Some(DocType::RequestGroup));
        assert_eq!(DocType::from_export_type("cookie_jar"), Some(DocType::CookieJar));
        assert_eq!(DocType::from_export_type("api_spec"), None);
    }

    #[test]
    fn test_from_name_accepts_both_spellings() {
        assert_eq!(DocType::from_name("Request"), Some(DocType::Request));
        assert_eq!(DocType::from_name("request"), Some(DocType::Request));
        assert_eq!(DocType::from_name("Nope"), None);
    }

    #[test]
    fn test_serde_name() {
        let json = serde_json::to_string(&DocType::CookieJar).unwrap();
        assert_eq!(json, "\"CookieJar\"");
    }
}
