//! HAR export of rendered requests

use chrono::{DateTime, Utc};
use tracing::debug;

use super::types::*;
use crate::cookies::{jar_from_cookies, parse_set_cookie_header};
use crate::errors::Result;
use crate::models::{self, Response};
use crate::render::{RenderedRequest, RequestRenderer};
use crate::utils::prepare_url_for_sending;

const CONTENT_LENGTH: &str = "content-length";

/// Convert a rendered request into a HAR request record
///
/// With `add_content_length`, a `content-length` header holding the body's
/// byte length is appended unless one is already present (any case). The
/// input is never modified, so repeated exports give identical headers.
pub fn export_rendered_request(rendered: &RenderedRequest, add_content_length: bool) -> HarRequest {
    let body = rendered.body.content();

    let mut headers: Vec<HarHeader> = rendered
        .headers
        .iter()
        .map(|h| HarHeader::new(h.name.clone(), h.value.clone()))
        .collect();
    if add_content_length && !headers.iter().any(|h| h.name.eq_ignore_ascii_case(CONTENT_LENGTH)) {
        headers.push(HarHeader::new(CONTENT_LENGTH, body.len().to_string()));
    }

    let url = prepare_url_for_sending(&rendered.url);

    let jar = jar_from_cookies(&rendered.cookie_jar.cookies);
    let cookies = jar
        .cookies_for_url(&url)
        .into_iter()
        .map(|c| HarCookie {
            name: c.key.clone(),
            value: c.value.clone(),
            path: c.path.clone(),
            domain: c.domain.clone(),
            expires: c.expires.clone(),
            http_only: c.http_only,
            secure: c.secure,
        })
        .collect();

    let query_string = rendered
        .parameters
        .iter()
        .map(|p| HarQueryParam {
            name: p.name.clone(),
            value: p.value.clone(),
        })
        .collect();

    // text and params are exclusive; only multipart-style bodies list params
    let params = if rendered.body.text.is_none() && !rendered.body.is_form_urlencoded() {
        rendered
            .body
            .params
            .iter()
            .map(|p| HarPostParam {
                name: p.name.clone(),
                value: Some(p.value.clone()),
                file_name: p.file_name.clone(),
            })
            .collect()
    } else {
        Vec::new()
    };

    HarRequest {
        method: rendered.method.clone(),
        url,
        http_version: HTTP_VERSION.to_string(),
        cookies,
        headers,
        query_string,
        post_data: HarPostData {
            mime_type: rendered.body.mime_type.clone().unwrap_or_default(),
            text: body,
            params,
        },
        headers_size: -1,
        body_size: -1,
    }
}

/// Fetch, render and export one stored request
pub async fn export_har(
    renderer: &RequestRenderer,
    request_id: &str,
    environment_id: Option<&str>,
    add_content_length: bool,
) -> Result<HarRequest> {
    let rendered = renderer.get_rendered_request(request_id, environment_id).await?;
    Ok(export_rendered_request(&rendered, add_content_length))
}

/// Export a complete HAR document with one entry per request
///
/// Each entry carries the request's latest stored response, or an empty
/// placeholder when it has none.
pub async fn export_har_log(
    renderer: &RequestRenderer,
    request_ids: &[String],
    environment_id: Option<&str>,
    add_content_length: bool,
) -> Result<Har> {
    let mut entries = Vec::with_capacity(request_ids.len());

    for request_id in request_ids {
        let request = export_har(renderer, request_id, environment_id, add_content_length).await?;
        let latest = models::response::get_latest_for_request(renderer.store(), request_id).await?;
        debug!(request = %request_id, has_response = latest.is_some(), "Exporting HAR entry");
        entries.push(entry_for(request, latest.as_ref()));
    }

    Ok(Har {
        log: HarLog {
            version: HAR_VERSION.to_string(),
            creator: HarCreator::default(),
            entries,
            comment: None,
        },
    })
}

fn entry_for(request: HarRequest, response: Option<&Response>) -> HarEntry {
    let (started, time, har_response) = match response {
        Some(response) => (
            DateTime::<Utc>::from_timestamp_millis(response.created).unwrap_or_else(Utc::now),
            response.elapsed_time,
            export_response(response),
        ),
        None => (Utc::now(), 0.0, HarResponse::placeholder()),
    };

    HarEntry {
        started_date_time: started.to_rfc3339(),
        time,
        request,
        response: har_response,
        cache: HarCache::default(),
        timings: HarTimings {
            wait: time,
            ..HarTimings::default()
        },
        comment: None,
    }
}

/// Convert a stored response into a HAR response record
pub fn export_response(response: &Response) -> HarResponse {
    let cookies = response
        .headers_named("set-cookie")
        .flat_map(parse_set_cookie_header)
        .map(|c| HarCookie {
            name: c.name().to_string(),
            value: c.value().to_string(),
            path: c.path().map(String::from),
            domain: c.domain().map(String::from),
            expires: c
                .expires_datetime()
                .and_then(|dt| DateTime::<Utc>::from_timestamp(dt.unix_timestamp(), 0))
                .map(|dt| dt.to_rfc3339()),
            http_only: c.http_only().unwrap_or(false),
            secure: c.secure().unwrap_or(false),
        })
        .collect();

    let size = if response.bytes_read > 0 {
        response.bytes_read
    } else {
        response.body.len() as i64
    };

    HarResponse {
        status: i32::from(response.status_code),
        status_text: response.status_message.clone(),
        http_version: HTTP_VERSION.to_string(),
        cookies,
        headers: response
            .headers
            .iter()
            .map(|h| HarHeader::new(h.name.clone(), h.value.clone()))
            .collect(),
        content: HarContent {
            size,
            mime_type: response.content_type.clone(),
            text: Some(response.body.clone()),
        },
        redirect_url: response.header("location").unwrap_or_default().to_string(),
        headers_size: -1,
        body_size: size,
    }
}
