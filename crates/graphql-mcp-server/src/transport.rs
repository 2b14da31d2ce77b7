//! HTTP transport to a single GraphQL endpoint
//!
//! Each logical operation opens its own [`Session`]. A session owns the HTTP
//! client and its connection pool, and releases them when it goes out of scope.
//! A session performs exactly one request per call; retrying is left to the caller.

use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::{debug, trace};
use url::Url;

use crate::errors::TransportError;

/// The header carrying the API key
pub const API_KEY_HEADER: HeaderName = HeaderName::from_static("x-api-key");

/// The timeout applied when none is configured
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Response bodies quoted in errors are cut to this many characters
const MAX_QUOTED_BODY: usize = 256;

/// Connection settings for a GraphQL endpoint
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub url: Url,
    pub api_key: SecretString,
    pub timeout: Duration,
}

impl TransportConfig {
    pub fn new(url: Url, api_key: SecretString) -> Self {
        Self {
            url,
            api_key,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// An authenticated transport to a GraphQL endpoint
#[derive(Debug)]
pub struct GraphQLTransport {
    url: Url,
    timeout: Duration,
    headers: HeaderMap,
}

impl GraphQLTransport {
    pub fn new(config: TransportConfig) -> Result<Self, TransportError> {
        let mut api_key = HeaderValue::from_str(config.api_key.expose_secret())?;
        api_key.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, api_key);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        Ok(Self {
            url: config.url,
            timeout: config.timeout,
            headers,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Open a session to the endpoint
    pub fn session(&self) -> Result<Session<'_>, TransportError> {
        let client = reqwest::Client::builder()
            .default_headers(self.headers.clone())
            .timeout(self.timeout)
            .build()
            .map_err(TransportError::Client)?;

        trace!(url = %self.url, "Opened session");
        Ok(Session {
            transport: self,
            client,
        })
    }

    /// Sort a request failure into a network failure worth retrying or a fatal one
    fn classify(&self, error: reqwest::Error) -> TransportError {
        if error.is_timeout() {
            TransportError::Timeout {
                timeout: self.timeout,
            }
        } else if error.is_connect() || error.is_request() {
            TransportError::Connect {
                url: self.url.clone(),
                source: error,
            }
        } else {
            TransportError::Request {
                url: self.url.clone(),
                source: error,
            }
        }
    }
}

/// A scoped connection to the endpoint
pub struct Session<'a> {
    transport: &'a GraphQLTransport,
    client: reqwest::Client,
}

impl Session<'_> {
    /// Post a GraphQL request body and return the response envelope
    ///
    /// A response whose body is a GraphQL envelope is returned even when the HTTP
    /// status is not a success, since it carries the endpoint's errors.
    pub async fn post(&self, body: &Value) -> Result<Value, TransportError> {
        let transport = self.transport;
        debug!(url = %transport.url, "Sending GraphQL request");

        let response = self
            .client
            .post(transport.url.clone())
            .json(body)
            .send()
            .await
            .map_err(|error| transport.classify(error))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|error| transport.classify(error))?;

        match serde_json::from_slice::<Value>(&bytes)
            .ok()
            .filter(is_graphql_envelope)
        {
            Some(envelope) if status.is_success() || envelope.get("errors").is_some() => {
                Ok(envelope)
            }
            _ if !status.is_success() => Err(TransportError::Status {
                status,
                body: quote(&bytes),
            }),
            _ => Err(TransportError::InvalidResponse(quote(&bytes))),
        }
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        trace!(url = %self.transport.url, "Closed session");
    }
}

fn is_graphql_envelope(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|object| object.contains_key("data") || object.contains_key("errors"))
}

fn quote(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    let mut quoted: String = text.chars().take(MAX_QUOTED_BODY).collect();
    if text.chars().count() > MAX_QUOTED_BODY {
        quoted.push('…');
    }
    quoted
}
