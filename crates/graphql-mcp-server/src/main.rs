use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use clap::builder::Styles;
use clap::builder::styling::{AnsiColor, Effects};
use graphql_mcp_server::client::GraphQLClient;
use graphql_mcp_server::retry::RetryPolicy;
use graphql_mcp_server::server::Server;
use runtime::Config;
use tracing::{debug, info};

mod runtime;

/// Clap styling
const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

/// Arguments to the MCP server
#[derive(Debug, Parser)]
#[command(
    version,
    styles = STYLES,
    about = "GraphQL MCP Server - explore and query a GraphQL API from an AI agent",
)]
struct Args {
    /// Path to the config file
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is not an error
    let dotenv = dotenv::dotenv();

    let config: Config = match Args::parse().config {
        Some(config_path) => runtime::read_config(config_path)?,
        None => runtime::read_config_from_env()?,
    };

    let _guard = config.logging.setup()?;

    info!(
        "GraphQL MCP Server v{} // (c) GraphQL MCP Server contributors // Licensed under MIT",
        env!("CARGO_PKG_VERSION")
    );
    if let Err(e) = dotenv {
        debug!("No .env file loaded: {e}");
    }

    let transport = config.transport()?;
    info!(endpoint = %transport.url(), "Using GraphQL endpoint");

    let client = GraphQLClient::builder()
        .transport(transport)
        .retry(RetryPolicy::from(&config.retry))
        .build();

    Ok(Server::builder()
        .transport(config.transport)
        .client(Arc::new(client))
        .maybe_guidance(config.prompt.guidance)
        .build()
        .start()
        .await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn it_verifies_the_cli() {
        Args::command().debug_assert();
    }

    #[test]
    fn it_takes_an_optional_config_path() {
        assert_eq!(
            Args::try_parse_from(["graphql-mcp-server", "config.yaml"])
                .unwrap()
                .config,
            Some(PathBuf::from("config.yaml"))
        );
        assert!(
            Args::try_parse_from(["graphql-mcp-server"])
                .unwrap()
                .config
                .is_none()
        );
    }
}
