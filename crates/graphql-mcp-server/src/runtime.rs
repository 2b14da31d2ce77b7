//! Runtime utilities
//!
//! This module is only used by the main binary and provides helper code
//! related to runtime configuration.

mod config;
mod logging;

use std::collections::BTreeMap;
use std::path::Path;

pub use config::Config;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Yaml},
};

/// Separator to use when drilling down into nested options in the env figment
const ENV_NESTED_SEPARATOR: &str = "__";

/// Prefix of variables that map onto any config field
const ENV_PREFIX: &str = "GRAPHQL_MCP_";

/// Read configuration from environment variables only (when no config file is provided)
#[allow(clippy::result_large_err)]
pub fn read_config_from_env() -> Result<Config, figment::Error> {
    Figment::new()
        .join(connection_env())
        .join(Env::prefixed(ENV_PREFIX).split(ENV_NESTED_SEPARATOR))
        .extract()
}

/// Read in a config from a YAML file, filling in any missing values from the environment
#[allow(clippy::result_large_err)]
pub fn read_config(yaml_path: impl AsRef<Path>) -> Result<Config, figment::Error> {
    Figment::new()
        .join(connection_env())
        .join(Env::prefixed(ENV_PREFIX).split(ENV_NESTED_SEPARATOR))
        .join(Yaml::file(yaml_path))
        .extract()
}

/// Figment provider for the endpoint connection variables, `GRAPHQL_ENDPOINT` and `GRAPHQL_API_KEY`
///
/// Values are kept as strings: an all-digit API key must not be read as a number.
fn connection_env() -> Serialized<BTreeMap<String, String>> {
    let variables = Env::prefixed("GRAPHQL_")
        .only(&["endpoint", "api_key"])
        .iter()
        .map(|(key, value)| (key.as_str().to_string(), value))
        .collect();
    Serialized::defaults(variables)
}
