use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use axum::Router;
use bon::bon;
use rmcp::ServiceExt as _;
use rmcp::transport::streamable_http_server::session::local::LocalSessionManager;
use rmcp::transport::{StreamableHttpService, stdio};
use schemars::JsonSchema;
use serde::Deserialize;
use tracing::{error, info};

use crate::client::GraphQLClient;
use crate::errors::ServerError;
use crate::server_handler::GraphQLMcpServerHandler;

/// The type of server transport to use
#[derive(Debug, Clone, Default, Deserialize, JsonSchema, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Transport {
    /// Use standard IO for server <> client communication
    #[default]
    Stdio,

    /// Host the MCP server on the supplied configuration, using streamable HTTP messages
    StreamableHttp {
        /// The IP address to bind to
        #[serde(default = "Transport::default_address")]
        address: IpAddr,

        /// The port to bind to
        #[serde(default = "Transport::default_port")]
        port: u16,
    },
}

impl Transport {
    fn default_address() -> IpAddr {
        IpAddr::V4(Ipv4Addr::LOCALHOST)
    }

    fn default_port() -> u16 {
        5000
    }
}

/// A GraphQL MCP Server
pub struct Server {
    transport: Transport,
    handler: GraphQLMcpServerHandler,
}

#[bon]
impl Server {
    #[builder]
    pub fn new(
        transport: Transport,
        client: Arc<GraphQLClient>,
        guidance: Option<String>,
    ) -> Self {
        Self {
            transport,
            handler: GraphQLMcpServerHandler::new(client, guidance),
        }
    }

    /// Serve MCP clients until the transport closes or the process is signalled
    pub async fn start(self) -> Result<(), ServerError> {
        match self.transport {
            Transport::StreamableHttp { address, port } => {
                info!(port = ?port, address = ?address, "Starting MCP server in Streamable HTTP mode");
                let handler = self.handler;
                let service = StreamableHttpService::new(
                    move || Ok(handler.clone()),
                    LocalSessionManager::default().into(),
                    Default::default(),
                );
                let router = Router::new().nest_service("/mcp", service);

                let tcp_listener =
                    tokio::net::TcpListener::bind(SocketAddr::new(address, port)).await?;
                axum::serve(tcp_listener, router)
                    .with_graceful_shutdown(shutdown_signal())
                    .await?;
            }
            Transport::Stdio => {
                info!("Starting MCP server in stdio mode");
                let service = self
                    .handler
                    .serve(stdio())
                    .await
                    .inspect_err(|e| {
                        error!("serving error: {:?}", e);
                    })
                    .map_err(|e| ServerError::McpInitialize(e.to_string()))?;
                service.waiting().await?;
            }
        }

        info!("MCP server stopped");
        Ok(())
    }
}

/// Resolves on CTRL+C, or SIGTERM on unix
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install CTRL+C signal handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::stdio(r#"{ "type": "stdio" }"#, Transport::Stdio)]
    #[case::http_defaults(
        r#"{ "type": "streamable_http" }"#,
        Transport::StreamableHttp { address: IpAddr::V4(Ipv4Addr::LOCALHOST), port: 5000 }
    )]
    #[case::http(
        r#"{ "type": "streamable_http", "address": "0.0.0.0", "port": 8000 }"#,
        Transport::StreamableHttp { address: IpAddr::V4(Ipv4Addr::UNSPECIFIED), port: 8000 }
    )]
    fn it_parses_transports(#[case] raw: &str, #[case] expected: Transport) {
        assert_eq!(serde_json::from_str::<Transport>(raw).unwrap(), expected);
    }

    #[test]
    fn it_defaults_to_stdio() {
        assert_eq!(Transport::default(), Transport::Stdio);
    }

    #[test]
    fn it_rejects_unknown_transports() {
        assert!(serde_json::from_str::<Transport>(r#"{ "type": "sse" }"#).is_err());
    }
}
