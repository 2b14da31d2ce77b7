use std::time::Duration;

use apollo_compiler::{ast::Document, validation::WithErrors};
use reqwest::StatusCode;
use reqwest::header::InvalidHeaderValue;
use tokio::task::JoinError;
use url::Url;

/// A failure to reach the GraphQL endpoint, or to get a GraphQL response out of it
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("could not connect to {url}: {source}")]
    Connect {
        url: Url,
        #[source]
        source: reqwest::Error,
    },

    #[error("request to {url} failed: {source}")]
    Request {
        url: Url,
        #[source]
        source: reqwest::Error,
    },

    #[error("request timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("endpoint responded with HTTP status {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("endpoint returned a response that is not a GraphQL response: {0}")]
    InvalidResponse(String),

    #[error("could not build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("invalid API key header value: {0}")]
    ApiKey(#[from] InvalidHeaderValue),
}

impl TransportError {
    /// Whether another attempt could succeed where this one failed
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::Connect { .. } | TransportError::Timeout { .. } => true,
            TransportError::Status { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            TransportError::Request { .. }
            | TransportError::InvalidResponse(_)
            | TransportError::Client(_)
            | TransportError::ApiKey(_) => false,
        }
    }
}

/// An error fetching the schema of the GraphQL endpoint
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("failed to fetch schema after {attempts} attempt(s): {source}")]
    Fetch {
        attempts: u32,
        #[source]
        source: TransportError,
    },

    #[error("endpoint rejected the introspection query: {0}")]
    Rejected(String),

    #[error("introspection result is not a valid schema: {0}")]
    Malformed(String),
}

/// An error executing a GraphQL query
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("Could not parse GraphQL document: {0}")]
    Syntax(Box<WithErrors<Document>>),

    #[error("GraphQL document does not contain an operation")]
    NoOperations,

    #[error("Invalid variables JSON: {0}")]
    Variables(#[source] serde_json::Error),

    #[error("Variables must be a JSON object")]
    VariablesNotObject,

    #[error("query failed after {attempts} attempt(s): {source}")]
    Execution {
        attempts: u32,
        #[source]
        source: TransportError,
    },

    #[error("endpoint returned a malformed GraphQL response: {0}")]
    InvalidResponse(#[source] serde_json::Error),
}

/// A failed connectivity check
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error(transparent)]
    Unreachable(TransportError),

    #[error("unexpected liveness response: {0}")]
    UnexpectedLivenessResponse(String),

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// An error in server initialization
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Missing environment variable: {0}")]
    EnvironmentVariable(String),

    #[error("Invalid GraphQL transport: {0}")]
    Transport(#[from] TransportError),

    #[error("Could not bind listener: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to initialize MCP service: {0}")]
    McpInitialize(String),

    #[error("Failed to start server")]
    StartupError(#[from] JoinError),
}

/// An MCP tool error
pub type McpError = rmcp::model::ErrorData;
