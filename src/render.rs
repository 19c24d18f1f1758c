//! Request rendering
//!
//! Turns a stored [`Request`] into a [`RenderedRequest`]: every templated
//! field resolved against the request's environment, disabled entries
//! dropped, and the workspace cookie jar attached. Fields render concurrently;
//! the first failure fails the whole request, tagged with the field it came
//! from.

use std::fmt;
use std::sync::Arc;

use futures::future::try_join_all;
use serde::Serialize;
use tracing::debug;

use crate::environment::resolve_environment;
use crate::errors::{RestpulseError, Result};
use crate::models::request::FORM_URLENCODED;
use crate::models::{AuthKind, Authentication, CookieJar, Request};
use crate::store::{self, DocFilter, DocumentStore};
use crate::templating::{RenderContext, TagRegistry, TemplateRenderer, DEFAULT_MAX_DEPTH};

/// Identity of a rendered request field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderField {
    Url,
    Header(String),
    Parameter(String),
    Body,
    BodyParam(String),
    Auth(&'static str),
}

impl fmt::Display for RenderField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderField::Url => f.write_str("URL"),
            RenderField::Header(name) => write!(f, "header \"{}\"", name),
            RenderField::Parameter(name) => write!(f, "query parameter \"{}\"", name),
            RenderField::Body => f.write_str("body"),
            RenderField::BodyParam(name) => write!(f, "body field \"{}\"", name),
            RenderField::Auth(name) => write!(f, "authentication {}", name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NameValue {
    pub name: String,
    pub value: String,
}

impl NameValue {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedBodyParam {
    pub name: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedBody {
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<RenderedBodyParam>,
}

impl RenderedBody {
    pub fn is_form_urlencoded(&self) -> bool {
        self.mime_type
            .as_deref()
            .map(|m| m.split(';').next().unwrap_or_default().trim().eq_ignore_ascii_case(FORM_URLENCODED))
            .unwrap_or(false)
    }

    /// Body bytes as they would be sent
    ///
    /// Text bodies verbatim, url-encoded forms encoded; multipart bodies have
    /// no single text form and yield an empty string.
    pub fn content(&self) -> String {
        if let Some(text) = &self.text {
            return text.clone();
        }
        if self.is_form_urlencoded() {
            let pairs: Vec<(&str, &str)> = self.params.iter().map(|p| (p.name.as_str(), p.value.as_str())).collect();
            return serde_urlencoded::to_string(pairs).unwrap_or_default();
        }
        String::new()
    }
}

/// A request with no template syntax left
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedRequest {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub method: String,
    pub url: String,
    pub headers: Vec<NameValue>,
    pub parameters: Vec<NameValue>,
    pub body: RenderedBody,
    pub authentication: Authentication,
    pub cookie_jar: CookieJar,
}

impl RenderedRequest {
    /// First header with the given name (case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }
}

/// Renders stored requests
pub struct RequestRenderer {
    renderer: TemplateRenderer,
    store: Arc<dyn DocumentStore>,
    max_depth: usize,
}

impl RequestRenderer {
    pub fn new(registry: Arc<TagRegistry>, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            renderer: TemplateRenderer::new(registry),
            store,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn store(&self) -> &dyn DocumentStore {
        self.store.as_ref()
    }

    pub fn renderer(&self) -> &TemplateRenderer {
        &self.renderer
    }

    /// Fetch a stored request and render it
    pub async fn get_rendered_request(&self, request_id: &str, environment_id: Option<&str>) -> Result<RenderedRequest> {
        let request: Request = store::get_required(self.store(), request_id).await?;
        self.render_request(&request, environment_id).await
    }

    /// Render every templated field of `request`
    ///
    /// The source request is left untouched.
    pub async fn render_request(&self, request: &Request, environment_id: Option<&str>) -> Result<RenderedRequest> {
        let scope = resolve_environment(self.store(), request, environment_id).await?;
        let mut ctx = RenderContext::new(scope.vars)
            .with_store(self.store.clone())
            .with_environment(environment_id.map(String::from))
            .with_max_depth(self.max_depth);
        ctx.workspace_id = scope.workspace_id.clone();
        let ctx = &ctx;

        debug!(request = %request.id, environment = ?environment_id, "Rendering request");

        let url = self.render_field(&request.url, ctx, RenderField::Url);

        let headers = try_join_all(request.headers.iter().filter(|h| !h.disabled).map(|h| async move {
            let value = self
                .render_field(&h.value, ctx, RenderField::Header(h.name.clone()))
                .await?;
            Ok::<_, RestpulseError>(NameValue::new(h.name.clone(), value))
        }));

        let parameters = try_join_all(request.parameters.iter().filter(|p| !p.disabled).map(|p| async move {
            let value = self
                .render_field(&p.value, ctx, RenderField::Parameter(p.name.clone()))
                .await?;
            Ok::<_, RestpulseError>(NameValue::new(p.name.clone(), value))
        }));

        let body = self.render_body(request, ctx);
        let authentication = self.render_auth(&request.authentication, ctx);
        let cookie_jar = self.workspace_cookie_jar(scope.workspace_id.as_deref());

        let (url, headers, parameters, body, authentication, cookie_jar) =
            futures::try_join!(url, headers, parameters, body, authentication, cookie_jar)?;

        let method = if request.method.trim().is_empty() {
            "GET".to_string()
        } else {
            request.method.trim().to_ascii_uppercase()
        };

        Ok(RenderedRequest {
            id: request.id.clone(),
            name: request.name.clone(),
            method,
            url,
            headers,
            parameters,
            body,
            authentication,
            cookie_jar,
        })
    }

    async fn render_field(&self, text: &str, ctx: &RenderContext, field: RenderField) -> Result<String> {
        self.renderer
            .render(text, ctx)
            .await
            .map_err(|source| RestpulseError::Field {
                field,
                source: Box::new(source),
            })
    }

    async fn render_body(&self, request: &Request, ctx: &RenderContext) -> Result<RenderedBody> {
        let body = &request.body;
        let text = match &body.text {
            Some(text) => Some(self.render_field(text, ctx, RenderField::Body).await?),
            None => None,
        };

        let params = try_join_all(body.params.iter().filter(|p| !p.disabled).map(|p| async move {
            let value = self
                .render_field(&p.value, ctx, RenderField::BodyParam(p.name.clone()))
                .await?;
            Ok::<_, RestpulseError>(RenderedBodyParam {
                name: p.name.clone(),
                value,
                file_name: p.file_name.clone(),
            })
        }))
        .await?;

        Ok(RenderedBody {
            mime_type: body.mime_type.clone(),
            text,
            params,
        })
    }

    async fn render_auth(&self, auth: &Authentication, ctx: &RenderContext) -> Result<Authentication> {
        let mut rendered = auth.clone();
        match auth.kind {
            AuthKind::None => {}
            AuthKind::Basic => {
                let (username, password) = futures::try_join!(
                    self.render_field(&auth.username, ctx, RenderField::Auth("username")),
                    self.render_field(&auth.password, ctx, RenderField::Auth("password")),
                )?;
                rendered.username = username;
                rendered.password = password;
            }
            AuthKind::Bearer => {
                let (token, prefix) = futures::try_join!(
                    self.render_field(&auth.token, ctx, RenderField::Auth("token")),
                    self.render_field(&auth.prefix, ctx, RenderField::Auth("prefix")),
                )?;
                rendered.token = token;
                rendered.prefix = prefix;
            }
        }
        Ok(rendered)
    }

    /// The workspace's cookie jar, empty when it has none
    async fn workspace_cookie_jar(&self, workspace_id: Option<&str>) -> Result<CookieJar> {
        let workspace_id = match workspace_id {
            Some(id) => id,
            None => return Ok(CookieJar::default()),
        };
        let jars: Vec<CookieJar> = store::find_recent(self.store(), &DocFilter::parent(workspace_id), 1).await?;
        Ok(jars.into_iter().next().unwrap_or_else(|| CookieJar {
            parent_id: Some(workspace_id.to_string()),
            ..Default::default()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BodyParam, Environment, RequestBody, RequestHeader, RequestParameter, StoredCookie, Workspace};
    use crate::models::request::MULTIPART_FORM;
    use crate::store::MemoryStore;
    use serde_json::{json, Map, Value as JsonValue};

    fn map(value: JsonValue) -> Map<String, JsonValue> {
        match value {
            JsonValue::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    async fn renderer_with(vars: JsonValue) -> RequestRenderer {
        let store = Arc::new(MemoryStore::new());
        store::insert(store.as_ref(), &Workspace { id: "wrk_1".into(), ..Default::default() })
            .await
            .unwrap();
        store::insert(
            store.as_ref(),
            &Environment {
                id: "env_base".into(),
                parent_id: Some("wrk_1".into()),
                data: map(vars),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        store::insert(
            store.as_ref(),
            &CookieJar {
                id: "jar_1".into(),
                parent_id: Some("wrk_1".into()),
                cookies: vec![StoredCookie::new("sid", "abc", "example.com")],
                ..Default::default()
            },
        )
        .await
        .unwrap();
        RequestRenderer::new(Arc::new(TagRegistry::with_builtins()), store)
    }

    fn request() -> Request {
        Request {
            id: "req_1".into(),
            parent_id: Some("wrk_1".into()),
            method: "post".into(),
            url: "{{ base }}/users".into(),
            headers: vec![
                RequestHeader::new("Authorization", "Bearer {% env 'token' %}"),
                RequestHeader {
                    disabled: true,
                    ..RequestHeader::new("X-Off", "{{ missing }}")
                },
                RequestHeader::new("X-Dup", "1"),
                RequestHeader::new("X-Dup", "2"),
            ],
            parameters: vec![RequestParameter::new("page", "{{ page }}")],
            body: RequestBody::text("application/json", r#"{"token": "{{ token }}"}"#),
            authentication: Authentication::bearer("{{ token }}"),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_render_request() {
        let renderer = renderer_with(json!({"base": "https://api.example.com", "token": "abc123", "page": 2})).await;
        let source = request();
        let rendered = renderer.render_request(&source, None).await.unwrap();

        assert_eq!(rendered.method, "POST");
        assert_eq!(rendered.url, "https://api.example.com/users");
        assert_eq!(rendered.header("authorization"), Some("Bearer abc123"));
        assert_eq!(rendered.headers.len(), 3);
        assert_eq!(rendered.headers.iter().filter(|h| h.name == "X-Dup").count(), 2);
        assert_eq!(rendered.parameters, vec![NameValue::new("page", "2")]);
        assert_eq!(rendered.body.text.as_deref(), Some(r#"{"token": "abc123"}"#));
        assert_eq!(rendered.authentication.token, "abc123");
        assert_eq!(rendered.cookie_jar.id, "jar_1");
        assert_eq!(source, request());
    }

    #[tokio::test]
    async fn test_field_failure_is_tagged() {
        let renderer = renderer_with(json!({"token": "abc123", "page": 1})).await;
        let err = renderer.render_request(&request(), None).await.unwrap_err();
        assert_eq!(err.field(), Some(&RenderField::Url));
        assert!(matches!(err.root(), RestpulseError::UndefinedVariable(name) if name == "base"));
        assert_eq!(err.to_string(), "Failed to render URL: Variable 'base' is not defined");
    }

    #[tokio::test]
    async fn test_header_failure_is_tagged() {
        let renderer = renderer_with(json!({"base": "http://x", "page": 1})).await;
        let mut req = request();
        req.authentication = Authentication::default();
        req.body = RequestBody::default();
        let err = renderer.render_request(&req, None).await.unwrap_err();
        assert_eq!(err.field(), Some(&RenderField::Header("Authorization".into())));
    }

    #[tokio::test]
    async fn test_form_body_params() {
        let renderer = renderer_with(json!({"name": "ada lovelace"})).await;
        let req = Request {
            id: "req_form".into(),
            parent_id: Some("wrk_1".into()),
            url: "http://example.com".into(),
            body: RequestBody::form(
                FORM_URLENCODED,
                vec![
                    BodyParam::new("name", "{{ name }}"),
                    BodyParam {
                        disabled: true,
                        ..BodyParam::new("skip", "{{ nope }}")
                    },
                    BodyParam::new("x", "a&b"),
                ],
            ),
            ..Default::default()
        };
        let rendered = renderer.render_request(&req, None).await.unwrap();
        assert_eq!(rendered.method, "GET");
        assert_eq!(rendered.body.params.len(), 2);
        assert_eq!(rendered.body.content(), "name=ada+lovelace&x=a%26b");
    }

    #[test]
    fn test_multipart_content_is_empty() {
        let body = RenderedBody {
            mime_type: Some(MULTIPART_FORM.to_string()),
            text: None,
            params: vec![RenderedBodyParam {
                name: "f".into(),
                value: "v".into(),
                file_name: None,
            }],
        };
        assert_eq!(body.content(), "");
        assert!(!body.is_form_urlencoded());
    }

    #[tokio::test]
    async fn test_get_rendered_request_not_found() {
        let renderer = renderer_with(json!({})).await;
        let err = renderer.get_rendered_request("req_missing", None).await;
        assert!(matches!(err, Err(RestpulseError::NotFound { id, .. }) if id == "req_missing"));
    }

    #[tokio::test]
    async fn test_missing_cookie_jar_is_empty() {
        let store = Arc::new(MemoryStore::new());
        let renderer = RequestRenderer::new(Arc::new(TagRegistry::with_builtins()), store);
        let req = Request {
            url: "http://example.com".into(),
            ..Default::default()
        };
        let rendered = renderer.render_request(&req, None).await.unwrap();
        assert!(rendered.cookie_jar.cookies.is_empty());
    }
}
