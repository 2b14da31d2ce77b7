use std::sync::Arc;

use rmcp::model::{CallToolResult, Content, Tool};
use rmcp::schemars::JsonSchema;
use rmcp::serde_json::Value;
use rmcp::{schemars, serde_json};
use serde::Deserialize;
use tracing::error;

use crate::client::{GraphQLClient, QueryResponse, Variables, parse_variables};
use crate::errors::{McpError, QueryError};
use crate::schema_from_type;

/// The name of the tool to execute an ad hoc GraphQL query
pub const EXECUTE_TOOL_NAME: &str = "execute_graphql";

/// A tool to execute a GraphQL query against the endpoint
#[derive(Clone)]
pub struct Execute {
    client: Arc<GraphQLClient>,
    pub tool: Tool,
}

/// Input for the execute tool.
#[derive(JsonSchema, Deserialize)]
pub struct Input {
    /// The GraphQL query
    pub query: String,

    /// The variable values represented as JSON
    #[schemars(schema_with = "String::json_schema", default)]
    #[serde(default)]
    pub variables: Option<Value>,
}

impl Execute {
    pub fn new(client: Arc<GraphQLClient>) -> Self {
        Self {
            client,
            tool: Tool::new(
                EXECUTE_TOOL_NAME,
                "Execute a GraphQL query against the connected endpoint. Use the `generate_query` tool to draft queries from the schema. Variables are passed as a JSON object string.",
                schema_from_type!(Input),
            ),
        }
    }

    pub async fn execute(&self, input: Input) -> Result<CallToolResult, McpError> {
        match self.run(input).await {
            Ok(response) => {
                let is_failure = response.is_failure();
                let content = match serde_json::to_string_pretty(&response.into_payload()) {
                    Ok(text) => Content::text(text),
                    Err(e) => Content::text(format!("Error executing query: {e}")),
                };
                Ok(if is_failure {
                    CallToolResult::error(vec![content])
                } else {
                    CallToolResult::success(vec![content])
                })
            }
            Err(e) => {
                error!("Failed to execute query: {e}");
                Ok(CallToolResult::error(vec![Content::text(format!(
                    "Error executing query: {e}"
                ))]))
            }
        }
    }

    async fn run(&self, input: Input) -> Result<QueryResponse, QueryError> {
        let variables = variables(input.variables)?;
        self.client.execute_query(&input.query, variables).await
    }
}

/// Variables arrive as a serialized JSON object, though a plain object is accepted too
fn variables(input: Option<Value>) -> Result<Option<Variables>, QueryError> {
    match input {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(raw)) => parse_variables(Some(&raw)),
        Some(Value::Object(variables)) => Ok(Some(variables)),
        Some(_) => Err(QueryError::VariablesNotObject),
    }
}
