//! Built-in tags
//!
//! - `uuid` - UUID v4 or time-ordered v7
//! - `now` - current time (ISO 8601, millis, unix seconds or a strftime format)
//! - `timestamp` - unix timestamp in seconds or milliseconds
//! - `random` - random int, float, alphanumeric string or hex string
//! - `base64` - encode or decode
//! - `hash` - md5/sha1/sha256 digest, hex or base64 encoded
//! - `env` - environment variable from the rendering context
//! - `os_env` - process environment variable
//! - `request` - attribute of another stored request
//! - `response` - value from a request's latest stored response

use anyhow::{anyhow, bail, Context as _};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::format::{Item, StrftimeItems};
use chrono::Utc;
use futures::future::{BoxFuture, FutureExt};
use rand::Rng;
use serde_json::Value as JsonValue;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::definition::{ArgDefinition, ArgValue, EnumOption, TagDefinition, TagRun};
use super::renderer::RunContext;
use super::tokenizer::TagArg;
use crate::models::{self, DocType, Request};
use crate::store;

/// Every built-in definition, in listing order
pub fn definitions() -> Vec<TagDefinition> {
    vec![
        uuid_tag(),
        now_tag(),
        timestamp_tag(),
        random_tag(),
        base64_tag(),
        hash_tag(),
        env_tag(),
        os_env_tag(),
        request_tag(),
        response_tag(),
    ]
}

fn arg_str(args: &[ArgValue], index: usize) -> String {
    args.get(index).map(ArgValue::as_string).unwrap_or_default()
}

fn arg_usize(args: &[ArgValue], index: usize, default: usize) -> usize {
    args.get(index)
        .and_then(ArgValue::as_f64)
        .filter(|n| *n >= 0.0)
        .map(|n| n as usize)
        .unwrap_or(default)
}

/// Longest string `random` will generate
const MAX_RANDOM_LEN: usize = 4096;

fn random_len(args: &[ArgValue], default: usize) -> anyhow::Result<usize> {
    let len = arg_usize(args, 3, default);
    if len > MAX_RANDOM_LEN {
        bail!("Random length {} exceeds the maximum of {}", len, MAX_RANDOM_LEN);
    }
    Ok(len)
}

fn random_bound(args: &[ArgValue], index: usize, default: f64) -> anyhow::Result<f64> {
    let bound = args.get(index).and_then(ArgValue::as_f64).unwrap_or(default);
    if !bound.is_finite() {
        bail!("Random bound \"{}\" is not a finite number", bound);
    }
    Ok(bound)
}

/// True when the first argument is one of `values`
fn first_is(args: &[TagArg], values: &[&str]) -> bool {
    matches!(args.first(), Some(TagArg::Str(s)) if values.contains(&s.as_str()))
}

fn uuid_tag() -> TagDefinition {
    TagDefinition::sync("uuid", "UUID", |_, args| match arg_str(args, 0).as_str() {
        "" | "v4" | "4" => Ok(Uuid::new_v4().to_string()),
        "v7" | "7" => Ok(Uuid::now_v7().to_string()),
        other => bail!("Invalid UUID version \"{}\"", other),
    })
    .description("generate random UUID")
    .arg(ArgDefinition::enumeration(
        "Version",
        vec![
            EnumOption::new("Version 4", "v4").describe("random"),
            EnumOption::new("Version 7", "v7").describe("time-ordered"),
        ],
    ))
}

fn now_tag() -> TagDefinition {
    TagDefinition::sync("now", "Timestamp", |_, args| {
        let now = Utc::now();
        match arg_str(args, 0).as_str() {
            "" | "iso-8601" => Ok(now.to_rfc3339()),
            "millis" | "ms" => Ok(now.timestamp_millis().to_string()),
            "unix" | "seconds" | "s" => Ok(now.timestamp().to_string()),
            "custom" => {
                let format = arg_str(args, 1);
                if StrftimeItems::new(&format).any(|item| matches!(item, Item::Error)) {
                    bail!("Invalid date format \"{}\"", format);
                }
                Ok(now.format(&format).to_string())
            }
            other => bail!("Invalid date type \"{}\"", other),
        }
    })
    .description("get the current time")
    .arg(ArgDefinition::enumeration(
        "Timestamp Format",
        vec![
            EnumOption::new("ISO-8601", "iso-8601"),
            EnumOption::new("Milliseconds", "millis"),
            EnumOption::new("Unix", "unix"),
            EnumOption::new("Custom Format", "custom"),
        ],
    ))
    .arg(
        ArgDefinition::string("Custom Format")
            .placeholder("%Y-%m-%d %H:%M:%S")
            .help("strftime format string")
            .hide_when(|args| !first_is(args, &["custom"])),
    )
}

fn timestamp_tag() -> TagDefinition {
    TagDefinition::sync("timestamp", "Unix Timestamp", |_, args| {
        let now = Utc::now();
        match arg_str(args, 0).as_str() {
            "" | "seconds" => Ok(now.timestamp().to_string()),
            "millis" => Ok(now.timestamp_millis().to_string()),
            other => bail!("Invalid timestamp unit \"{}\"", other),
        }
    })
    .description("seconds or milliseconds since the epoch")
    .arg(ArgDefinition::enumeration(
        "Unit",
        vec![EnumOption::new("Seconds", "seconds"), EnumOption::new("Milliseconds", "millis")],
    ))
}

fn random_tag() -> TagDefinition {
    TagDefinition::sync("random", "Random", |_, args| {
        let mut rng = rand::rng();
        match arg_str(args, 0).as_str() {
            "" | "int" => {
                let min = random_bound(args, 1, 0.0)? as i64;
                let max = random_bound(args, 2, 100.0)? as i64;
                if min > max {
                    bail!("Random minimum {} is greater than maximum {}", min, max);
                }
                Ok(rng.random_range(min..=max).to_string())
            }
            "float" => {
                let min = random_bound(args, 1, 0.0)?;
                let max = random_bound(args, 2, 1.0)?;
                if min > max {
                    bail!("Random minimum {} is greater than maximum {}", min, max);
                }
                if !(max - min).is_finite() {
                    bail!("Random range {}..{} is too wide", min, max);
                }
                Ok(format!("{:.6}", rng.random_range(min..=max)))
            }
            "string" => Ok(random_string(random_len(args, 16)?)),
            "hex" => Ok(random_hex(random_len(args, 32)?)),
            other => bail!("Invalid random type \"{}\"", other),
        }
    })
    .description("generate random values")
    .arg(ArgDefinition::enumeration(
        "Type",
        vec![
            EnumOption::new("Integer", "int"),
            EnumOption::new("Float", "float"),
            EnumOption::new("Alphanumeric", "string"),
            EnumOption::new("Hex", "hex"),
        ],
    ))
    .arg(ArgDefinition::number("Minimum").hide_when(|args| first_is(args, &["string", "hex"])))
    .arg(
        ArgDefinition::number("Maximum")
            .default_value(100.0)
            .hide_when(|args| first_is(args, &["string", "hex"])),
    )
    .arg(
        ArgDefinition::number("Length")
            .default_value(16.0)
            .computed_name(|args| {
                if first_is(args, &["hex"]) {
                    "Hex Digits".to_string()
                } else {
                    "Characters".to_string()
                }
            })
            .hide_when(|args| !first_is(args, &["string", "hex"])),
    )
}

fn random_string(len: usize) -> String {
    use rand::distr::Alphanumeric;
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

fn random_hex(len: usize) -> String {
    let mut rng = rand::rng();
    let bytes: Vec<u8> = (0..len / 2 + 1).map(|_| rng.random()).collect();
    let mut out = hex::encode(bytes);
    out.truncate(len);
    out
}

fn base64_tag() -> TagDefinition {
    TagDefinition::sync("base64", "Base64", |_, args| {
        let value = arg_str(args, 1);
        match arg_str(args, 0).as_str() {
            "encode" => Ok(STANDARD.encode(value.as_bytes())),
            "decode" => {
                let bytes = STANDARD
                    .decode(value.trim())
                    .context("Invalid base64 input")?;
                String::from_utf8(bytes).map_err(|_| anyhow!("Decoded base64 is not valid UTF-8"))
            }
            other => bail!("Unsupported operation \"{}\". Must be encode or decode.", other),
        }
    })
    .description("encode or decode values")
    .arg(ArgDefinition::enumeration(
        "Action",
        vec![EnumOption::new("Encode", "encode"), EnumOption::new("Decode", "decode")],
    ))
    .arg(ArgDefinition::string("Value").placeholder("My text"))
}

fn hash_tag() -> TagDefinition {
    TagDefinition::sync("hash", "Hash", |_, args| {
        let value = arg_str(args, 2);
        let digest: Vec<u8> = match arg_str(args, 0).as_str() {
            "md5" => md5::compute(value.as_bytes()).0.to_vec(),
            "sha1" => sha1::Sha1::digest(value.as_bytes()).to_vec(),
            "sha256" => Sha256::digest(value.as_bytes()).to_vec(),
            other => bail!("Unsupported hash algorithm \"{}\"", other),
        };
        match arg_str(args, 1).as_str() {
            "hex" => Ok(hex::encode(digest)),
            "base64" => Ok(STANDARD.encode(digest)),
            other => bail!("Invalid encoding \"{}\". Choices are hex, base64", other),
        }
    })
    .description("apply hash to a value")
    .arg(ArgDefinition::enumeration(
        "Algorithm",
        vec![
            EnumOption::new("MD5", "md5"),
            EnumOption::new("SHA1", "sha1"),
            EnumOption::new("SHA256", "sha256"),
        ],
    ))
    .arg(ArgDefinition::enumeration(
        "Digest Encoding",
        vec![EnumOption::new("Hexadecimal", "hex"), EnumOption::new("Base64", "base64")],
    ))
    .arg(ArgDefinition::string("Input").placeholder("Value to hash"))
}

/// Context variable lookup; template values are rendered further
struct EnvTag;

impl TagRun for EnvTag {
    fn run<'a>(&'a self, cx: &'a RunContext<'a>, args: &'a [ArgValue]) -> BoxFuture<'a, anyhow::Result<String>> {
        async move {
            let name = arg_str(args, 0);
            let value = cx
                .context()
                .lookup(&name)
                .ok_or_else(|| anyhow!("Environment variable \"{}\" is not defined", name))?;
            match value {
                JsonValue::String(s) => Ok(cx.render(s).await?),
                JsonValue::Null => Ok(String::new()),
                other => Ok(other.to_string()),
            }
        }
        .boxed()
    }
}

fn env_tag() -> TagDefinition {
    TagDefinition::new("env", "Environment Variable", EnvTag)
        .description("value from the active environment")
        .arg(ArgDefinition::string("Name").placeholder("base_url"))
}

fn os_env_tag() -> TagDefinition {
    TagDefinition::sync("os_env", "OS Environment Variable", |_, args| {
        let name = arg_str(args, 0);
        match std::env::var(&name) {
            Ok(value) => Ok(value),
            Err(_) if args.len() > 1 && !arg_str(args, 1).is_empty() => Ok(arg_str(args, 1)),
            Err(_) => bail!("Process environment variable \"{}\" is not set", name),
        }
    })
    .description("value from the process environment")
    .arg(ArgDefinition::string("Name").placeholder("HOME"))
    .arg(ArgDefinition::string("Fallback").help("used when the variable is not set"))
}

async fn load_request(cx: &RunContext<'_>, id: &str) -> anyhow::Result<Request> {
    let store = cx.store().ok_or_else(|| anyhow!("No document store available"))?;
    if id.is_empty() {
        bail!("No request specified");
    }
    store::get::<Request>(store, id)
        .await?
        .ok_or_else(|| anyhow!("Could not find request {}", id))
}

/// Attribute of another request, rendered in the current context
struct RequestTag;

impl TagRun for RequestTag {
    fn run<'a>(&'a self, cx: &'a RunContext<'a>, args: &'a [ArgValue]) -> BoxFuture<'a, anyhow::Result<String>> {
        async move {
            let request = load_request(cx, &arg_str(args, 0)).await?;
            match arg_str(args, 1).as_str() {
                "url" => Ok(cx.render(&request.url).await?),
                "method" => Ok(request.method.clone()),
                "name" => Ok(request.name.clone()),
                "header" => {
                    let name = arg_str(args, 2);
                    let header = request
                        .headers
                        .iter()
                        .find(|h| !h.disabled && h.name.eq_ignore_ascii_case(&name))
                        .ok_or_else(|| anyhow!("No header with name \"{}\"", name))?;
                    Ok(cx.render(&header.value).await?)
                }
                other => bail!("Unknown request attribute \"{}\"", other),
            }
        }
        .boxed()
    }
}

fn request_tag() -> TagDefinition {
    TagDefinition::new("request", "Request", RequestTag)
        .description("reference value from another request")
        .arg(ArgDefinition::model("Request", DocType::Request))
        .arg(ArgDefinition::enumeration(
            "Attribute",
            vec![
                EnumOption::new("URL", "url"),
                EnumOption::new("Method", "method"),
                EnumOption::new("Name", "name"),
                EnumOption::new("Header", "header"),
            ],
        ))
        .arg(
            ArgDefinition::string("Header Name")
                .placeholder("Content-Type")
                .hide_when(|args| !matches!(args.get(1), Some(TagArg::Str(s)) if s == "header")),
        )
}

/// Value from the latest stored response of a request
struct ResponseTag;

impl TagRun for ResponseTag {
    fn run<'a>(&'a self, cx: &'a RunContext<'a>, args: &'a [ArgValue]) -> BoxFuture<'a, anyhow::Result<String>> {
        async move {
            let request_id = arg_str(args, 0);
            let request = load_request(cx, &request_id).await?;
            let store = cx.store().ok_or_else(|| anyhow!("No document store available"))?;
            let response = models::response::get_latest_for_request(store, &request.id)
                .await?
                .ok_or_else(|| anyhow!("No responses for request"))?;

            let filter = arg_str(args, 2);
            match arg_str(args, 1).as_str() {
                "body" => {
                    if filter.trim().is_empty() {
                        Ok(response.body)
                    } else {
                        query_body(&response.body, filter.trim())
                    }
                }
                "header" => response
                    .header(&filter)
                    .map(String::from)
                    .ok_or_else(|| anyhow!("No header with name \"{}\"", filter)),
                "status" => Ok(response.status_code.to_string()),
                other => bail!("Unknown response field \"{}\"", other),
            }
        }
        .boxed()
    }
}

/// Apply a JSONPath filter to a JSON body; exactly one match is required
fn query_body(body: &str, path: &str) -> anyhow::Result<String> {
    use jsonpath_rust::JsonPath;

    let value: JsonValue = serde_json::from_str(body).context("Response body is not valid JSON")?;
    let results = value
        .query(path)
        .map_err(|e| anyhow!("Invalid JSONPath query \"{}\": {}", path, e))?;
    match results.as_slice() {
        [] => bail!("Returned no results: {}", path),
        [JsonValue::String(s)] => Ok(s.clone()),
        [single] => Ok(single.to_string()),
        _ => bail!("Returned more than one result: {}", path),
    }
}

fn response_tag() -> TagDefinition {
    TagDefinition::new("response", "Response", ResponseTag)
        .description("reference values from other requests")
        .arg(ArgDefinition::model("Request", DocType::Request))
        .arg(ArgDefinition::enumeration(
            "Attribute",
            vec![
                EnumOption::new("Body", "body").describe("value of response body"),
                EnumOption::new("Header", "header").describe("value of response header"),
                EnumOption::new("Status", "status").describe("response status code"),
            ],
        ))
        .arg(
            ArgDefinition::string("Filter")
                .computed_name(|args| match args.get(1) {
                    Some(TagArg::Str(s)) if s == "header" => "Header Name".to_string(),
                    _ => "Filter (JSONPath)".to_string(),
                })
                .hide_when(|args| matches!(args.get(1), Some(TagArg::Str(s)) if s == "status")),
        )
}
