use std::fmt;

/// Category of a processing failure. Lets the driver log and count
/// failures without matching on every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Envelope could not be decoded or flattened.
    Decode,
    /// Target URL could not be built from the record key.
    Template,
    /// HTTP request failed or was rejected by the endpoint.
    Http,
    /// Publishing the outcome to a success/error topic failed.
    Route,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Decode => f.write_str("decode"),
            ErrorKind::Template => f.write_str("template"),
            ErrorKind::Http => f.write_str("http"),
            ErrorKind::Route => f.write_str("route"),
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Collaborator errors
// ═══════════════════════════════════════════════════════════════

/// Schema catalog lookup failure.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CatalogError {
    #[error("schema {0} not found")]
    NotFound(u32),

    #[error("subject '{0}' not found")]
    SubjectNotFound(String),

    #[error("registry: {0}")]
    Registry(String),
}

/// Log sink could not enqueue a record.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct SinkError(pub String);

impl SinkError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// The HTTP layer could not complete the request (connect, timeout, body read).
#[derive(Debug, Clone, thiserror::Error)]
#[error("http transport: {0}")]
pub struct TransportError(pub String);

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        Self(e.to_string())
    }
}

/// The request completed but the endpoint answered with status >= 300.
#[derive(Debug, Clone, thiserror::Error)]
#[error("error from http with status code '{code}': {body}")]
pub struct HttpStatusError {
    pub code: u16,
    pub body: String,
}

// ═══════════════════════════════════════════════════════════════
//  Pipeline stage errors
// ═══════════════════════════════════════════════════════════════

/// Decoded Avro value does not have the expected envelope shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FlattenError {
    #[error("not parsable")]
    NotParsable,

    #[error("empty payload")]
    EmptyPayload,
}

/// Record value could not be turned into a JSON body.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("value too short for registry envelope ({len} bytes)")]
    TooShort { len: usize },

    #[error("unexpected magic byte {0:#04x}")]
    MagicByte(u8),

    #[error("error getting the schema with id '{id}': {source}")]
    Schema { id: u32, source: CatalogError },

    #[error("schema {id}: invalid definition: {detail}")]
    InvalidSchema { id: u32, detail: String },

    #[error("schema {id}: avro binary: {detail}")]
    Binary { id: u32, detail: String },

    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error(transparent)]
    Flatten(#[from] FlattenError),
}

/// Target URL could not be resolved for a record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("record key is empty after sanitization")]
    EmptySanitizedKey,

    #[error("placeholder '{0}' not found in URL")]
    PlaceholderNotFound(String),
}

/// Malformed static header entry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HeaderError {
    #[error("header '{0}' should have key and value separated by '='")]
    Malformed(String),

    #[error("invalid header name '{0}'")]
    InvalidName(String),

    #[error("invalid value for header '{0}'")]
    InvalidValue(String),
}

/// Publishing the outcome of a dispatch failed.
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("error when writing to success topic: {0}")]
    SuccessTopic(SinkError),

    #[error("error when writing to error topic: {sink} (while handling: {original})")]
    ErrorTopic { sink: SinkError, original: String },

    #[error("error payload serialization: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Avro-JSON text does not fit the target schema.
#[derive(Debug, thiserror::Error)]
pub enum AvroJsonError {
    #[error("{path}: expected {expected}, got {found}")]
    Mismatch {
        path: String,
        expected: String,
        found: String,
    },

    #[error("{path}: {detail}")]
    Invalid { path: String, detail: String },

    #[error("avro encode: {0}")]
    Encode(String),
}

// ═══════════════════════════════════════════════════════════════
//  ProcessError: everything `Processor::process` can return
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("decode: {0}")]
    Decode(DecodeError),

    #[error("flatten: {0}")]
    Flatten(FlattenError),

    #[error("url: {0}")]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    HttpStatus(#[from] HttpStatusError),

    #[error(transparent)]
    Route(#[from] RouteError),
}

impl ProcessError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProcessError::Decode(_) | ProcessError::Flatten(_) => ErrorKind::Decode,
            ProcessError::Template(_) => ErrorKind::Template,
            ProcessError::Transport(_) | ProcessError::HttpStatus(_) => ErrorKind::Http,
            ProcessError::Route(_) => ErrorKind::Route,
        }
    }
}

impl From<DecodeError> for ProcessError {
    fn from(e: DecodeError) -> Self {
        match e {
            DecodeError::Flatten(f) => ProcessError::Flatten(f),
            other => ProcessError::Decode(other),
        }
    }
}
