use std::sync::Arc;

use rmcp::model::{CallToolResult, Content, Tool};
use rmcp::schemars::JsonSchema;
use rmcp::serde_json::Value;
use rmcp::{schemars, serde_json};
use serde::Deserialize;
use tracing::error;

use crate::client::GraphQLClient;
use crate::errors::McpError;
use crate::schema_from_type;

/// The name of the tool to connect to the GraphQL endpoint
pub const CONNECT_TOOL_NAME: &str = "connect_graphql";

/// A tool to check that the endpoint is reachable and load its schema
#[derive(Clone)]
pub struct Connect {
    client: Arc<GraphQLClient>,
    pub tool: Tool,
}

/// Input for the connect tool.
#[derive(JsonSchema, Deserialize, Default)]
pub struct Input {}

impl Connect {
    pub fn new(client: Arc<GraphQLClient>) -> Self {
        Self {
            client,
            tool: Tool::new(
                CONNECT_TOOL_NAME,
                "Connect to the GraphQL endpoint and fetch its schema. Use this first to verify the endpoint is reachable.",
                schema_from_type!(Input),
            ),
        }
    }

    pub async fn execute(&self, _input: Input) -> Result<CallToolResult, McpError> {
        match self.client.check_connectivity().await {
            Ok(_) => Ok(CallToolResult::success(vec![Content::text(format!(
                "Successfully connected to {}. Schema loaded.",
                self.client.endpoint()
            ))])),
            Err(e) => {
                error!(endpoint = %self.client.endpoint(), "Failed to connect: {e}");
                Ok(CallToolResult::error(vec![Content::text(format!(
                    "Error connecting to GraphQL endpoint: {e}"
                ))]))
            }
        }
    }
}
