use std::sync::Arc;

use rmcp::model::{
    CallToolRequestParam, CallToolResult, ErrorCode, Implementation, JsonObject, ListToolsResult,
    PaginatedRequestParam, ServerCapabilities, ServerInfo, Tool,
};
use rmcp::service::RequestContext;
use rmcp::{RoleServer, ServerHandler};
use serde_json::Value;
use tracing::debug;

use crate::client::GraphQLClient;
use crate::errors::McpError;
use crate::tools::connect::{CONNECT_TOOL_NAME, Connect};
use crate::tools::execute::{EXECUTE_TOOL_NAME, Execute};
use crate::tools::generate_query::{GENERATE_QUERY_TOOL_NAME, GenerateQuery};

#[derive(Clone)]
pub struct GraphQLMcpServerHandler {
    connect_tool: Connect,
    generate_query_tool: GenerateQuery,
    execute_tool: Execute,
}

impl GraphQLMcpServerHandler {
    pub fn new(client: Arc<GraphQLClient>, guidance: Option<String>) -> Self {
        Self {
            connect_tool: Connect::new(client.clone()),
            generate_query_tool: GenerateQuery::new(client.clone(), guidance),
            execute_tool: Execute::new(client),
        }
    }

    /// The tools offered to clients
    pub fn tools(&self) -> Vec<Tool> {
        vec![
            self.connect_tool.tool.clone(),
            self.generate_query_tool.tool.clone(),
            self.execute_tool.tool.clone(),
        ]
    }

    pub(crate) async fn call(
        &self,
        name: &str,
        arguments: Option<JsonObject>,
    ) -> Result<CallToolResult, McpError> {
        debug!(tool = name, "Calling tool");
        match name {
            CONNECT_TOOL_NAME => {
                self.connect_tool
                    .execute(convert_arguments(arguments)?)
                    .await
            }
            GENERATE_QUERY_TOOL_NAME => {
                self.generate_query_tool
                    .execute(convert_arguments(arguments)?)
                    .await
            }
            EXECUTE_TOOL_NAME => {
                self.execute_tool
                    .execute(convert_arguments(arguments)?)
                    .await
            }
            _ => Err(tool_not_found(name)),
        }
    }
}

impl ServerHandler for GraphQLMcpServerHandler {
    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        self.call(&request.name, request.arguments).await
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        Ok(ListToolsResult {
            next_cursor: None,
            tools: self.tools(),
        })
    }

    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            instructions: Some(
                "Call connect_graphql first, then generate_query to draft queries from the schema and execute_graphql to run them.".to_string(),
            ),
            ..Default::default()
        }
    }
}

fn tool_not_found(name: &str) -> McpError {
    McpError::new(
        ErrorCode::METHOD_NOT_FOUND,
        format!("Tool {name} not found"),
        None,
    )
}

/// Missing arguments are read as an empty object
fn convert_arguments<T: serde::de::DeserializeOwned>(
    arguments: Option<JsonObject>,
) -> Result<T, McpError> {
    serde_json::from_value(Value::Object(arguments.unwrap_or_default()))
        .map_err(|_| McpError::new(ErrorCode::INVALID_PARAMS, "Invalid input".to_string(), None))
}
