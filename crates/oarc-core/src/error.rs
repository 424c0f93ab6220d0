use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    #[error("failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid OpenAPI document: missing top-level key `{0}`")]
    InvalidDocument(&'static str),

    #[error("unsupported OpenAPI version: {0}")]
    UnsupportedVersion(String),
}

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("unsupported schema at {location}: {reason}")]
    UnsupportedSchema { location: String, reason: String },

    #[error("ambiguous union at {location}: {reason}")]
    AmbiguousUnion { location: String, reason: String },

    #[error("schema names `{first}` and `{second}` both format to `{formatted}`")]
    NameCollision {
        first: String,
        second: String,
        formatted: String,
    },

    #[error("record `{record}` declares field `{field}` more than once")]
    DuplicateField { record: String, field: String },
}

impl SchemaError {
    pub(crate) fn unsupported(location: impl Into<String>, reason: impl Into<String>) -> Self {
        SchemaError::UnsupportedSchema {
            location: location.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn ambiguous(location: impl Into<String>, reason: impl Into<String>) -> Self {
        SchemaError::AmbiguousUnion {
            location: location.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("discriminator field `{field}` not found on union payload")]
    DiscriminatorFieldMissing { field: String },

    #[error("discriminator value `{value}` is not part of the union")]
    UnknownDiscriminatorValue { value: String },

    #[error("invalid date-time `{value}`: {source}")]
    InvalidDateTime {
        value: String,
        source: chrono::ParseError,
    },

    #[error("record `{record}` is not a member of the union")]
    NotAUnionMember { record: String },

    #[error("expected a JSON object for `{record}`")]
    ExpectedObject { record: String },
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),
}

/// Failure reported by a [`Transport`](crate::invoke::Transport) implementation.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct TransportError {
    pub message: String,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

#[derive(Debug, Error)]
pub enum InvokeError {
    #[error("unknown operation: {0}")]
    UnknownOperation(String),

    #[error("operation id `{operation_id}` is shared by {count} operations")]
    AmbiguousOperation { operation_id: String, count: usize },

    #[error("'{0}' is required")]
    MissingRequiredParameter(String),

    #[error("path `{path}` has no value for placeholder `{placeholder}`")]
    UnresolvedPlaceholder { path: String, placeholder: String },

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Non-success status. `body` holds the decoded JSON error payload, if any.
    #[error("{message}")]
    Status {
        status: u16,
        message: String,
        body: Option<serde_json::Value>,
    },

    #[error("response body is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),
}
