//! HAR (HTTP Archive) export

pub mod export;
pub mod types;

pub use export::{export_har, export_har_log, export_rendered_request, export_response};
pub use types::{Har, HarCookie, HarEntry, HarHeader, HarLog, HarPostData, HarRequest, HarResponse};
