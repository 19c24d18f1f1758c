//! HAR (HTTP Archive) data structures
//!
//! Based on the HAR 1.2 specification: http://www.softwareishard.com/blog/har-12-spec/

use serde::{Deserialize, Serialize};

/// HAR format version written by the exporter
pub const HAR_VERSION: &str = "1.2";

/// HTTP version recorded for exported requests
pub const HTTP_VERSION: &str = "HTTP/1.1";

/// Root HAR structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Har {
    pub log: HarLog,
}

/// HAR log containing all entries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarLog {
    pub version: String,
    pub creator: HarCreator,
    #[serde(default)]
    pub entries: Vec<HarEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// Creator application info
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarCreator {
    pub name: String,
    pub version: String,
}

impl Default for HarCreator {
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// A single HTTP request/response entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarEntry {
    /// Request start time (ISO 8601)
    #[serde(rename = "startedDateTime")]
    pub started_date_time: String,

    /// Total time in milliseconds
    #[serde(default)]
    pub time: f64,

    pub request: HarRequest,
    pub response: HarResponse,

    #[serde(default)]
    pub cache: HarCache,

    #[serde(default)]
    pub timings: HarTimings,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// HTTP request details
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarRequest {
    pub method: String,
    pub url: String,

    #[serde(rename = "httpVersion")]
    pub http_version: String,

    #[serde(default)]
    pub cookies: Vec<HarCookie>,

    #[serde(default)]
    pub headers: Vec<HarHeader>,

    #[serde(rename = "queryString", default)]
    pub query_string: Vec<HarQueryParam>,

    #[serde(rename = "postData", default)]
    pub post_data: HarPostData,

    /// -1 when unknown
    #[serde(rename = "headersSize", default = "unknown_size")]
    pub headers_size: i64,

    /// -1 when unknown
    #[serde(rename = "bodySize", default = "unknown_size")]
    pub body_size: i64,
}

fn unknown_size() -> i64 {
    -1
}

/// HTTP response details
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarResponse {
    pub status: i32,

    #[serde(rename = "statusText")]
    pub status_text: String,

    #[serde(rename = "httpVersion")]
    pub http_version: String,

    #[serde(default)]
    pub cookies: Vec<HarCookie>,

    #[serde(default)]
    pub headers: Vec<HarHeader>,

    pub content: HarContent,

    #[serde(rename = "redirectURL", default)]
    pub redirect_url: String,

    #[serde(rename = "headersSize", default = "unknown_size")]
    pub headers_size: i64,

    #[serde(rename = "bodySize", default = "unknown_size")]
    pub body_size: i64,
}

/// HTTP header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarHeader {
    pub name: String,
    pub value: String,
}

impl HarHeader {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Cookie
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarCookie {
    pub name: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<String>,
    #[serde(rename = "httpOnly", default)]
    pub http_only: bool,
    #[serde(default)]
    pub secure: bool,
}

/// Query parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarQueryParam {
    pub name: String,
    pub value: String,
}

/// POST data
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarPostData {
    #[serde(rename = "mimeType", default)]
    pub mime_type: String,

    #[serde(default)]
    pub text: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<HarPostParam>,
}

/// POST parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarPostParam {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(rename = "fileName", default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

/// Response content
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HarContent {
    /// Content size in bytes
    #[serde(default)]
    pub size: i64,

    #[serde(rename = "mimeType", default)]
    pub mime_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Cache info; nothing is recorded
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarCache {}

/// Timing breakdown in milliseconds; -1 marks a phase that does not apply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarTimings {
    #[serde(default = "unknown_timing")]
    pub blocked: f64,
    #[serde(default = "unknown_timing")]
    pub dns: f64,
    #[serde(default = "unknown_timing")]
    pub connect: f64,
    pub send: f64,
    pub wait: f64,
    pub receive: f64,
    #[serde(default = "unknown_timing")]
    pub ssl: f64,
}

fn unknown_timing() -> f64 {
    -1.0
}

impl Default for HarTimings {
    fn default() -> Self {
        Self {
            blocked: -1.0,
            dns: -1.0,
            connect: -1.0,
            send: 0.0,
            wait: 0.0,
            receive: 0.0,
            ssl: -1.0,
        }
    }
}

impl HarRequest {
    /// Get header value by name (case-insensitive)
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }
}

impl HarResponse {
    /// Response recorded for a request that has never been sent
    pub fn placeholder() -> Self {
        Self {
            status: 0,
            status_text: String::new(),
            http_version: HTTP_VERSION.to_string(),
            cookies: Vec::new(),
            headers: Vec::new(),
            content: HarContent::default(),
            redirect_url: String::new(),
            headers_size: -1,
            body_size: -1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_har() {
        let json = r#"{
            "log": {
                "version": "1.2",
                "creator": {"name": "x", "version": "1"},
                "entries": []
            }
        }"#;

        let har: Har = serde_json::from_str(json).unwrap();
        assert_eq!(har.log.version, "1.2");
        assert!(har.log.entries.is_empty());
    }

    #[test]
    fn test_request_defaults_unknown_sizes() {
        let json = r#"{
            "method": "GET",
            "url": "https://example.com/api",
            "httpVersion": "HTTP/1.1",
            "headers": [{"name": "Accept", "value": "application/json"}]
        }"#;
        let request: HarRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.headers_size, -1);
        assert_eq!(request.body_size, -1);
        assert_eq!(request.get_header("accept"), Some("application/json"));
        assert_eq!(request.post_data, HarPostData::default());
    }

    #[test]
    fn test_cookie_skips_missing_attributes() {
        let cookie = HarCookie {
            name: "sid".to_string(),
            value: "abc".to_string(),
            path: None,
            domain: Some("example.com".to_string()),
            expires: None,
            http_only: true,
            secure: false,
        };
        let value = serde_json::to_value(&cookie).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"name": "sid", "value": "abc", "domain": "example.com", "httpOnly": true, "secure": false})
        );
    }

    #[test]
    fn test_placeholder_response_shape() {
        let value = serde_json::to_value(HarResponse::placeholder()).unwrap();
        assert_eq!(value["status"], 0);
        assert_eq!(value["headersSize"], -1);
        assert_eq!(value["content"]["mimeType"], "");
        assert!(value["content"].get("text").is_none());
    }
}
