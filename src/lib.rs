//! restpulse library interface
//!
//! Request templating and rendering for a REST client, plus HAR export.
//!
//! # Module Organization
//!
//! - [`templating`] - tag syntax, tag definitions, registry and renderer
//! - [`render`] - renders stored requests field by field
//! - [`har`] - HAR 1.2 export of rendered requests
//! - [`store`] / [`models`] - document storage and typed documents
//! - [`environment`] / [`cookies`] - variable layering and cookie jars
//! - [`errors`] - Error types (RestpulseError, Result)
//! - [`core`] - command execution for the binary

pub mod cli;
pub mod config;
pub mod cookies;
pub mod core;
pub mod environment;
pub mod errors;
pub mod har;
pub mod models;
pub mod plugins;
pub mod render;
pub mod status;
pub mod store;
pub mod templating;
pub mod utils;
