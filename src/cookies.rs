//! Cookie jar
//!
//! Selects the stored cookies that apply to a URL (domain, path, secure and
//! expiry matching per RFC 6265) and ingests `Set-Cookie` headers from stored
//! responses.

use chrono::{DateTime, Duration, Utc};
use cookie::Cookie;
use url::Url;

use crate::models::{Response, StoredCookie};
use crate::utils::is_localhost;

/// A read/write view over a list of stored cookies
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Jar {
    cookies: Vec<StoredCookie>,
}

/// Build a jar from persisted cookies
pub fn jar_from_cookies(cookies: &[StoredCookie]) -> Jar {
    Jar {
        cookies: cookies.to_vec(),
    }
}

impl Jar {
    pub fn cookies(&self) -> &[StoredCookie] {
        &self.cookies
    }

    pub fn into_cookies(self) -> Vec<StoredCookie> {
        self.cookies
    }

    /// Cookies that would be sent to `url`, longest path first
    ///
    /// Unparseable URLs match nothing.
    pub fn cookies_for_url(&self, url: &str) -> Vec<&StoredCookie> {
        let parsed = match Url::parse(url) {
            Ok(u) => u,
            Err(_) => return Vec::new(),
        };
        let host = parsed.host_str().unwrap_or_default().to_ascii_lowercase();
        let path = parsed.path();
        let is_secure = matches!(parsed.scheme(), "https" | "wss");
        let now = Utc::now();

        let mut matched: Vec<&StoredCookie> = self
            .cookies
            .iter()
            .filter(|c| should_send_cookie(c, &host, path, is_secure, now))
            .collect();
        matched.sort_by_key(|c| std::cmp::Reverse(c.path.as_deref().unwrap_or("/").len()));
        matched
    }

    /// Store one `Set-Cookie` header received from `request_url`
    ///
    /// Replaces a cookie with the same key, domain and path. Returns false
    /// when the header cannot be parsed or its domain does not cover the
    /// request host.
    pub fn store_set_cookie(&mut self, header: &str, request_url: &Url) -> bool {
        let host = request_url.host_str().unwrap_or_default().to_ascii_lowercase();
        let mut stored = 0;
        for cookie in parse_set_cookie_header(header) {
            if let Some(cookie) = from_set_cookie(&cookie, &host, request_url.path()) {
                self.cookies.retain(|c| !(c.key == cookie.key && c.domain == cookie.domain && c.path == cookie.path));
                self.cookies.push(cookie);
                stored += 1;
            }
        }
        stored > 0
    }

    /// Ingest every `Set-Cookie` header of a stored response
    pub fn store_response_cookies(&mut self, response: &Response) -> usize {
        let url = match Url::parse(&response.url) {
            Ok(u) => u,
            Err(_) => return 0,
        };
        response
            .headers_named("set-cookie")
            .filter(|value| self.store_set_cookie(value, &url))
            .count()
    }

    /// Drop expired cookies
    pub fn remove_expired(&mut self) {
        let now = Utc::now();
        self.cookies.retain(|c| !is_cookie_expired(c, now));
    }
}

/// Check if a cookie should be sent for a given request
pub fn should_send_cookie(
    cookie: &StoredCookie,
    host: &str,
    path: &str,
    is_secure: bool,
    now: DateTime<Utc>,
) -> bool {
    let domain_match = match cookie.domain.as_deref() {
        Some(domain) if cookie.host_only => host == domain.trim_start_matches('.').to_ascii_lowercase(),
        Some(domain) => domain_matches(host, &domain.to_ascii_lowercase()),
        None => true,
    };

    let path_match = path_matches(path, cookie.path.as_deref().unwrap_or("/"));

    // localhost is treated as a secure context
    let secure_match = !cookie.secure || is_secure || is_localhost(host);

    domain_match && path_match && secure_match && !is_cookie_expired(cookie, now)
}

/// Check if a request domain matches a cookie domain
///
/// Handles the leading dot in cookie domains per RFC 6265.
/// Example: "api.example.com" matches ".example.com"
pub fn domain_matches(request_domain: &str, cookie_domain: &str) -> bool {
    let cookie_domain = cookie_domain.trim_start_matches('.');

    request_domain == cookie_domain
        || request_domain.ends_with(&format!(".{}", cookie_domain))
}

/// RFC 6265 path-match
pub fn path_matches(request_path: &str, cookie_path: &str) -> bool {
    if request_path == cookie_path {
        return true;
    }
    request_path.starts_with(cookie_path)
        && (cookie_path.ends_with('/') || request_path[cookie_path.len()..].starts_with('/'))
}

/// Expired cookies have an `expires` in the past; unparseable values never expire
pub fn is_cookie_expired(cookie: &StoredCookie, now: DateTime<Utc>) -> bool {
    cookie
        .expires
        .as_deref()
        .and_then(|e| DateTime::parse_from_rfc3339(e).ok())
        .map(|expires| expires.with_timezone(&Utc) <= now)
        .unwrap_or(false)
}

/// Split Set-Cookie header value into individual cookies
///
/// Handles the tricky case where cookie values may contain commas
/// (e.g., in Expires date), but cookies are separated by ", name=".
pub fn split_cookies(cookies: &str) -> Vec<String> {
    let mut result = Vec::new();
    let mut current = String::new();

    let mut rest = cookies;
    while let Some(c) = rest.chars().next() {
        if let Some(after) = rest.strip_prefix(", ") {
            if looks_like_cookie_start(after) {
                result.push(current.trim().to_string());
                current.clear();
                rest = after;
                continue;
            }
        }
        current.push(c);
        rest = &rest[c.len_utf8()..];
    }

    if !current.trim().is_empty() {
        result.push(current.trim().to_string());
    }

    result
}

/// Parse a Set-Cookie header into typed Cookie structs
pub fn parse_set_cookie_header(header: &str) -> Vec<Cookie<'static>> {
    split_cookies(header)
        .into_iter()
        .filter_map(|s| Cookie::parse(s).ok())
        .map(|c| c.into_owned())
        .collect()
}

/// Check if string starts with a cookie name pattern (token=)
fn looks_like_cookie_start(s: &str) -> bool {
    let mut chars = s.chars();

    match chars.next() {
        Some(c) if c.is_ascii_alphanumeric() || c == '_' || c == '-' => {}
        _ => return false,
    }

    for c in chars {
        if c == '=' {
            return true;
        }
        if !c.is_ascii_alphanumeric() && c != '_' && c != '-' {
            return false;
        }
    }

    false
}

/// RFC 6265 default-path: the request path up to its last '/'
fn default_path(request_path: &str) -> String {
    match request_path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(idx) => request_path[..idx].to_string(),
    }
}

fn from_set_cookie(cookie: &Cookie<'_>, host: &str, request_path: &str) -> Option<StoredCookie> {
    let (domain, host_only) = match cookie.domain() {
        Some(domain) => {
            let domain = domain.trim_start_matches('.').to_ascii_lowercase();
            if !domain_matches(host, &domain) {
                return None;
            }
            (domain, false)
        }
        None => (host.to_string(), true),
    };

    let path = cookie
        .path()
        .filter(|p| p.starts_with('/'))
        .map(String::from)
        .unwrap_or_else(|| default_path(request_path));

    let now = Utc::now();
    let expires = match cookie.max_age() {
        Some(max_age) => Some(now + Duration::seconds(max_age.whole_seconds())),
        None => cookie
            .expires_datetime()
            .and_then(|dt| DateTime::<Utc>::from_timestamp(dt.unix_timestamp(), 0)),
    };

    Some(StoredCookie {
        key: cookie.name().to_string(),
        value: cookie.value().to_string(),
        domain: Some(domain),
        path: Some(path),
        expires: expires.map(|e| e.to_rfc3339()),
        secure: cookie.secure().unwrap_or(false),
        http_only: cookie.http_only().unwrap_or(false),
        host_only,
        creation: Some(now.to_rfc3339()),
    })
}
