//! Error types for restpulse

use thiserror::Error;

use crate::render::RenderField;

/// Main error type for restpulse
#[derive(Error, Debug)]
pub enum RestpulseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Malformed tag syntax
    #[error("Parse error at position {position}: {message}")]
    Parse {
        position: usize,
        message: String,
    },

    /// Tag name has no registered definition
    #[error("Unknown tag '{0}'")]
    UnknownTag(String),

    /// Nested rendering went deeper than the configured bound
    #[error("Render recursion limit of {0} exceeded")]
    RecursionLimit(usize),

    /// A tag's run logic failed; the message is shown verbatim
    #[error("{message}")]
    Run {
        tag: String,
        message: String,
    },

    #[error("Variable '{0}' is not defined")]
    UndefinedVariable(String),

    #[error("{doc_type} not found: {id}")]
    NotFound {
        doc_type: String,
        id: String,
    },

    /// A request field failed to render
    #[error("Failed to render {field}: {source}")]
    Field {
        field: RenderField,
        #[source]
        source: Box<RestpulseError>,
    },

    #[error("Tag '{0}' is already registered")]
    DuplicateTag(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Store error: {0}")]
    Store(String),
}

impl RestpulseError {
    pub fn parse(position: usize, message: impl Into<String>) -> Self {
        RestpulseError::Parse {
            position,
            message: message.into(),
        }
    }

    pub fn not_found(doc_type: impl Into<String>, id: impl Into<String>) -> Self {
        RestpulseError::NotFound {
            doc_type: doc_type.into(),
            id: id.into(),
        }
    }

    /// The error beneath any field tagging
    pub fn root(&self) -> &RestpulseError {
        match self {
            RestpulseError::Field { source, .. } => source.root(),
            other => other,
        }
    }

    /// The request field this error is attributed to, if any
    pub fn field(&self) -> Option<&RenderField> {
        match self {
            RestpulseError::Field { field, .. } => Some(field),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, RestpulseError>;
