use std::time::Duration;

use graphql_mcp_server::errors::ServerError;
use graphql_mcp_server::retry::RetryPolicy;
use graphql_mcp_server::server::Transport;
use graphql_mcp_server::transport::{DEFAULT_TIMEOUT, GraphQLTransport, TransportConfig};
use schemars::JsonSchema;
use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

use super::logging::Logging;

const ENDPOINT_ENV: &str = "GRAPHQL_ENDPOINT";
const API_KEY_ENV: &str = "GRAPHQL_API_KEY";

/// Configuration for the MCP server
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(default)]
pub struct Config {
    /// The target GraphQL endpoint
    pub endpoint: Option<Url>,

    /// The API key sent with every GraphQL request
    #[schemars(with = "Option<String>")]
    pub api_key: Option<SecretString>,

    /// Timeout for each request to the endpoint (default: 60s)
    #[serde(deserialize_with = "humantime_serde::deserialize")]
    #[schemars(with = "String")]
    pub timeout: Duration,

    /// Retry behaviour for failed requests
    pub retry: RetryConfig,

    /// Logging configuration
    pub logging: Logging,

    /// Query generation prompt overrides
    pub prompt: PromptConfig,

    /// The type of server transport to use
    pub transport: Transport,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            timeout: DEFAULT_TIMEOUT,
            retry: RetryConfig::default(),
            logging: Logging::default(),
            prompt: PromptConfig::default(),
            transport: Transport::default(),
        }
    }
}

impl Config {
    /// Connection settings for the endpoint, failing when a required value is missing
    pub fn transport_config(&self) -> Result<TransportConfig, ServerError> {
        let url = self
            .endpoint
            .clone()
            .ok_or_else(|| ServerError::EnvironmentVariable(ENDPOINT_ENV.to_string()))?;
        let api_key = self
            .api_key
            .clone()
            .ok_or_else(|| ServerError::EnvironmentVariable(API_KEY_ENV.to_string()))?;

        Ok(TransportConfig::new(url, api_key).with_timeout(self.timeout))
    }

    /// The authenticated transport to the configured endpoint
    pub fn transport(&self) -> Result<GraphQLTransport, ServerError> {
        Ok(GraphQLTransport::new(self.transport_config()?)?)
    }
}

/// Exponential backoff between attempts
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(default)]
pub struct RetryConfig {
    /// Total number of attempts per request (default: 3)
    pub max_attempts: u32,

    /// Base of the exponential backoff (default: 1s)
    #[serde(deserialize_with = "humantime_serde::deserialize")]
    #[schemars(with = "String")]
    pub multiplier: Duration,

    /// Shortest wait between attempts (default: 2s)
    #[serde(deserialize_with = "humantime_serde::deserialize")]
    #[schemars(with = "String")]
    pub min_delay: Duration,

    /// Longest wait between attempts (default: 10s)
    #[serde(deserialize_with = "humantime_serde::deserialize")]
    #[schemars(with = "String")]
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts(),
            multiplier: policy.multiplier(),
            min_delay: policy.min_delay(),
            max_delay: policy.max_delay(),
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        RetryPolicy::builder()
            .max_attempts(config.max_attempts)
            .multiplier(config.multiplier)
            .min_delay(config.min_delay)
            .max_delay(config.max_delay)
            .build()
    }
}

/// Prompt options for the query generation tool
#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(default)]
pub struct PromptConfig {
    /// Domain guidance appended to the query generation prompt
    pub guidance: Option<String>,
}

#[cfg(test)]
mod test {
    use super::*;
    use graphql_mcp_server::errors::TransportError;
    use secrecy::ExposeSecret;

    #[test]
    fn it_parses_a_minimal_config() {
        let config = serde_json::from_str::<Config>("{}").unwrap();

        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.transport, Transport::Stdio);
        assert_eq!(RetryPolicy::from(&config.retry), RetryPolicy::default());
    }

    #[test]
    fn it_requires_an_endpoint() {
        let config = Config {
            api_key: Some(SecretString::from("key")),
            ..Default::default()
        };

        let error = config.transport_config().unwrap_err();

        assert_eq!(
            error.to_string(),
            "Missing environment variable: GRAPHQL_ENDPOINT"
        );
    }

    #[test]
    fn it_requires_an_api_key() {
        let config = Config {
            endpoint: Some(Url::parse("http://localhost:4000/graphql").unwrap()),
            ..Default::default()
        };

        let error = config.transport_config().unwrap_err();

        assert_eq!(
            error.to_string(),
            "Missing environment variable: GRAPHQL_API_KEY"
        );
    }

    #[test]
    fn it_builds_the_transport_config() {
        let config = serde_json::from_str::<Config>(
            r#"{ "endpoint": "http://localhost:4000/graphql", "api_key": "key", "timeout": "5s" }"#,
        )
        .unwrap();

        let transport = config.transport_config().unwrap();

        assert_eq!(transport.url.as_str(), "http://localhost:4000/graphql");
        assert_eq!(transport.api_key.expose_secret(), "key");
        assert_eq!(transport.timeout, Duration::from_secs(5));
    }

    #[test]
    fn it_rejects_api_keys_that_cannot_be_sent() {
        let config = Config {
            endpoint: Some(Url::parse("http://localhost:4000/graphql").unwrap()),
            api_key: Some(SecretString::from("line\nbreak")),
            ..Default::default()
        };

        let error = config.transport().unwrap_err();

        assert!(
            matches!(error, ServerError::Transport(TransportError::ApiKey(_))),
            "{error:?}"
        );
        assert!(error.to_string().starts_with("Invalid GraphQL transport: "));
    }

    #[test]
    fn it_contains_no_keys_with_double_underscore() {
        // The env provider splits nested fields on __, so no field name may contain it.
        // See [runtime::read_config]
        let schema = schemars::schema_for!(Config).to_value().to_string();

        assert!(!schema.contains("__"))
    }
}
