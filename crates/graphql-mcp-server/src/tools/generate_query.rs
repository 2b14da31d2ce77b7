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

/// The name of the tool to compose a query drafting prompt
pub const GENERATE_QUERY_TOOL_NAME: &str = "generate_query";

/// Guidance about the endpoint's domain appended to every prompt
pub const DEFAULT_GUIDANCE: &str = r#"The GraphQL API answers policy questions for a specific organization.
Users ask about the state they are located in or want to travel to, so the query should be focused on a state: use the `state` query with the short code of the state as the id (for example `"id": "NY"` for New York).
Do not filter policies by their names when asking for them, since the names are not known yet. Once the policies are fetched, they can be filtered by name.
Also request the policy holder of each policy and check its type. Policies are organized in a hierarchy where lower levels override higher levels (for example, a policy of a state can override a policy of a country).
For example, this query gets all the policies of a state:
```graphql
query sampleStateQuery {
  state(id: "NY") {
    state_name
    policies {
      policy_type
      policy_document
      policy_holder {
        __typename
      }
    }
  }
}
```"#;

/// A tool to compose a prompt for drafting a query against the live schema
#[derive(Clone)]
pub struct GenerateQuery {
    client: Arc<GraphQLClient>,
    guidance: String,
    pub tool: Tool,
}

/// Input for the generate query tool.
#[derive(JsonSchema, Deserialize)]
pub struct Input {
    /// What the query should do
    pub description: String,
}

impl GenerateQuery {
    pub fn new(client: Arc<GraphQLClient>, guidance: Option<String>) -> Self {
        Self {
            client,
            guidance: guidance.unwrap_or_else(|| DEFAULT_GUIDANCE.to_string()),
            tool: Tool::new(
                GENERATE_QUERY_TOOL_NAME,
                "Generate a GraphQL query based on the schema and a description of what the query should do. Returns a prompt embedding the schema to draft the query from.",
                schema_from_type!(Input),
            ),
        }
    }

    pub async fn execute(&self, input: Input) -> Result<CallToolResult, McpError> {
        match self.client.fetch_schema().await {
            Ok(schema) => Ok(CallToolResult::success(vec![Content::text(
                compose_prompt(&schema, &input.description, &self.guidance),
            )])),
            Err(e) => {
                error!("Failed to load schema for query generation: {e}");
                Ok(CallToolResult::error(vec![Content::text(format!(
                    "Error generating query: {e}"
                ))]))
            }
        }
    }
}

fn compose_prompt(schema: &str, description: &str, guidance: &str) -> String {
    format!(
        "Given this GraphQL schema:\n\n{schema}\n\nGenerate a GraphQL query that: {description}.\n\n{guidance}\n\nReturn only the GraphQL query without any explanation."
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::tests::{client_for, mock_introspection};
    use crate::tools::tests::text_of;
    use crate::transport::tests::unreachable_url;

    #[test]
    fn it_composes_the_prompt() {
        let prompt = compose_prompt(
            "type Query {\n  hello: String\n}",
            "says hello",
            "Keep it short.",
        );

        insta::assert_snapshot!(prompt, @r"
        Given this GraphQL schema:

        type Query {
          hello: String
        }

        Generate a GraphQL query that: says hello.

        Keep it short.

        Return only the GraphQL query without any explanation.
        ");
    }

    #[tokio::test]
    async fn it_embeds_the_live_schema_and_guidance() {
        let mut server = mockito::Server::new_async().await;
        let introspection = mock_introspection(&mut server, 1).await;
        let tool = GenerateQuery::new(Arc::new(client_for(&server.url())), None);

        for description in ["lists the policies of New York", "names California"] {
            let result = tool
                .execute(Input {
                    description: description.to_string(),
                })
                .await
                .unwrap();
            let prompt = text_of(&result);

            assert!(prompt.contains("type State {"));
            assert!(prompt.contains(&format!("Generate a GraphQL query that: {description}.")));
            assert!(prompt.contains(r#"state(id: "NY")"#));
        }

        // The second prompt reuses the cached schema
        introspection.assert_async().await;
    }

    #[tokio::test]
    async fn it_uses_configured_guidance() {
        let mut server = mockito::Server::new_async().await;
        let _introspection = mock_introspection(&mut server, 1).await;
        let tool = GenerateQuery::new(
            Arc::new(client_for(&server.url())),
            Some("Always ask for ids.".to_string()),
        );

        let prompt = text_of(
            &tool
                .execute(Input {
                    description: "finds states".to_string(),
                })
                .await
                .unwrap(),
        );

        assert!(prompt.contains("Always ask for ids."));
        assert!(!prompt.contains("sampleStateQuery"));
    }

    #[tokio::test]
    async fn it_reports_schema_failures_as_text() {
        let tool = GenerateQuery::new(Arc::new(client_for(&unreachable_url())), None);

        let result = tool
            .execute(Input {
                description: "anything".to_string(),
            })
            .await
            .unwrap();

        assert!(text_of(&result).starts_with("Error generating query: failed to fetch schema after 3 attempt(s)"));
        assert_eq!(result.is_error, Some(true));
    }
}
