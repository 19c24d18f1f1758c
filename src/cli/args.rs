//! CLI argument definitions using clap

use std::path::PathBuf;

use clap::{ArgAction, Args as ClapArgs, Parser, Subcommand};

/// restpulse: render templated REST requests and export them as HAR
#[derive(Parser, Debug)]
#[command(name = "restpulse")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Enable debug logging on stderr
    #[arg(long, global = true, action = ArgAction::SetTrue)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List registered tags
    Tags(TagsArgs),

    /// Print the default expression of a tag
    Fill(FillArgs),

    /// Render a template string
    Render(RenderArgs),

    /// Render a stored request from a workspace export
    Request(RequestArgs),

    /// Export stored requests as HAR
    Har(HarArgs),
}

#[derive(ClapArgs, Debug)]
pub struct TagsArgs {
    /// Print full tag schemas as JSON
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,
}

#[derive(ClapArgs, Debug)]
pub struct FillArgs {
    #[arg(value_name = "NAME")]
    pub name: String,
}

#[derive(ClapArgs, Debug)]
pub struct RenderArgs {
    #[arg(value_name = "TEMPLATE")]
    pub template: String,

    /// Context variable (repeatable)
    #[arg(long = "var", value_name = "KEY=VALUE", value_parser = parse_var)]
    pub vars: Vec<(String, String)>,

    /// JSON object of context variables, applied before --var
    #[arg(long = "vars-file", value_name = "FILE")]
    pub vars_file: Option<PathBuf>,
}

#[derive(ClapArgs, Debug)]
pub struct RequestArgs {
    /// Workspace export to load
    #[arg(long, value_name = "FILE")]
    pub data: PathBuf,

    #[arg(value_name = "REQUEST_ID")]
    pub request_id: String,

    /// Sub environment to render with
    #[arg(long = "env", value_name = "ENV_ID")]
    pub environment: Option<String>,
}

#[derive(ClapArgs, Debug)]
pub struct HarArgs {
    /// Workspace export to load
    #[arg(long, value_name = "FILE")]
    pub data: PathBuf,

    #[arg(value_name = "REQUEST_ID", required = true)]
    pub request_ids: Vec<String>,

    /// Sub environment to render with
    #[arg(long = "env", value_name = "ENV_ID")]
    pub environment: Option<String>,

    /// Add a content-length header when missing
    #[arg(long = "content-length", action = ArgAction::SetTrue)]
    pub content_length: bool,

    /// Emit a full HAR document with stored responses
    #[arg(long, action = ArgAction::SetTrue)]
    pub log: bool,
}

/// Parse a `KEY=VALUE` pair
fn parse_var(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => Ok((key.trim().to_string(), value.to_string())),
        _ => Err(format!("invalid variable '{}': expected KEY=VALUE", s)),
    }
}
