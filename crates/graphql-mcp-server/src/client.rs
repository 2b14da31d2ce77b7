//! GraphQL client over a [`GraphQLTransport`]
//!
//! The client caches the endpoint's schema after the first successful fetch and
//! retries transport failures of every network round trip.

use apollo_compiler::ast::Definition;
use apollo_compiler::parser::Parser;
use bon::bon;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tokio::sync::RwLock;
use tracing::{debug, info};
use url::Url;

use crate::errors::{ConnectError, QueryError, SchemaError, TransportError};
use crate::introspection::{
    INTROSPECTION_QUERY, LIVENESS_QUERY, liveness_query_type, schema_from_response,
};
use crate::retry::{Exhausted, RetryPolicy};
use crate::transport::GraphQLTransport;

/// Variable values of a GraphQL request
pub type Variables = Map<String, Value>;

/// A GraphQL response envelope
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct QueryResponse {
    #[serde(default)]
    pub data: Option<Value>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Value>,
}

impl QueryResponse {
    /// Whether the endpoint reported errors
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Whether the endpoint reported errors and returned no data at all
    pub fn is_failure(&self) -> bool {
        self.has_errors() && self.data.as_ref().is_none_or(Value::is_null)
    }

    /// The value relayed to callers: the data alone, or the whole envelope
    /// when the endpoint reported errors.
    pub fn into_payload(self) -> Value {
        if self.errors.is_empty() {
            return self.data.unwrap_or(Value::Null);
        }

        let mut envelope = Map::new();
        envelope.insert("data".to_string(), self.data.unwrap_or(Value::Null));
        envelope.insert("errors".to_string(), Value::Array(self.errors));
        if let Some(extensions) = self.extensions {
            envelope.insert("extensions".to_string(), extensions);
        }
        Value::Object(envelope)
    }
}

/// Parse variables supplied as serialized JSON
///
/// Absent or blank input means no variables.
pub fn parse_variables(raw: Option<&str>) -> Result<Option<Variables>, QueryError> {
    let Some(raw) = raw.filter(|raw| !raw.trim().is_empty()) else {
        return Ok(None);
    };
    match serde_json::from_str::<Value>(raw).map_err(QueryError::Variables)? {
        Value::Null => Ok(None),
        Value::Object(variables) => Ok(Some(variables)),
        _ => Err(QueryError::VariablesNotObject),
    }
}

/// Check that a query is a parseable GraphQL document, returning its operation
/// name when it holds a single named operation.
fn operation_name(query: &str) -> Result<Option<String>, QueryError> {
    let document = Parser::new()
        .parse_ast(query, "query.graphql")
        .map_err(|e| QueryError::Syntax(Box::new(e)))?;

    let mut operations = document.definitions.iter().filter_map(|definition| match definition {
        Definition::OperationDefinition(operation) => Some(operation),
        _ => None,
    });

    match (operations.next(), operations.next()) {
        (None, _) => Err(QueryError::NoOperations),
        (Some(operation), None) => Ok(operation.name.as_ref().map(|name| name.to_string())),
        (Some(_), Some(_)) => Ok(None),
    }
}

/// A client for a single GraphQL endpoint
#[derive(Debug)]
pub struct GraphQLClient {
    transport: GraphQLTransport,
    retry: RetryPolicy,
    schema: RwLock<Option<String>>,
}

#[bon]
impl GraphQLClient {
    #[builder]
    pub fn new(transport: GraphQLTransport, #[builder(default)] retry: RetryPolicy) -> Self {
        Self {
            transport,
            retry,
            schema: RwLock::new(None),
        }
    }
}

impl GraphQLClient {
    /// The URL of the endpoint
    pub fn endpoint(&self) -> &Url {
        self.transport.url()
    }

    /// Whether the schema has already been fetched
    pub async fn is_schema_cached(&self) -> bool {
        self.schema.read().await.is_some()
    }

    /// Get the schema of the endpoint as SDL, fetching it on first use
    pub async fn fetch_schema(&self) -> Result<String, SchemaError> {
        if let Some(schema) = self.schema.read().await.as_ref() {
            debug!("Using cached schema");
            return Ok(schema.clone());
        }

        let response = self
            .post(&json!({ "query": INTROSPECTION_QUERY }))
            .await
            .map_err(|Exhausted { attempts, error }| SchemaError::Fetch {
                attempts,
                source: error,
            })?;
        let schema = schema_from_response(response)?;

        info!(endpoint = %self.endpoint(), "Fetched schema");
        *self.schema.write().await = Some(schema.clone());
        Ok(schema)
    }

    /// Execute a GraphQL query with optional variables
    pub async fn execute_query(
        &self,
        query: &str,
        variables: Option<Variables>,
    ) -> Result<QueryResponse, QueryError> {
        let operation_name = operation_name(query)?;

        let mut body = Map::new();
        body.insert("query".to_string(), Value::from(query));
        if let Some(variables) = variables {
            body.insert("variables".to_string(), Value::Object(variables));
        }
        if let Some(operation_name) = &operation_name {
            body.insert(
                "operationName".to_string(),
                Value::from(operation_name.as_str()),
            );
        }

        let response = self
            .post(&Value::Object(body))
            .await
            .map_err(|Exhausted { attempts, error }| QueryError::Execution {
                attempts,
                source: error,
            })?;
        let response: QueryResponse =
            serde_json::from_value(response).map_err(QueryError::InvalidResponse)?;

        if response.has_errors() {
            debug!(
                operation_name = operation_name.as_deref().unwrap_or("<anonymous>"),
                "Endpoint reported {} error(s)",
                response.errors.len()
            );
        }
        Ok(response)
    }

    /// Check the endpoint for liveness, then load its schema
    ///
    /// The liveness check is a single attempt so an unreachable endpoint is reported quickly.
    /// Returns the name of the root query type.
    pub async fn check_connectivity(&self) -> Result<String, ConnectError> {
        let session = self.transport.session().map_err(ConnectError::Unreachable)?;
        let response = session
            .post(&json!({ "query": LIVENESS_QUERY }))
            .await
            .map_err(ConnectError::Unreachable)?;
        drop(session);

        let query_type = liveness_query_type(&response)
            .ok_or_else(|| ConnectError::UnexpectedLivenessResponse(response.to_string()))?
            .to_string();
        debug!(query_type = %query_type, "Endpoint is reachable");

        self.fetch_schema().await?;
        Ok(query_type)
    }

    /// Post a request body, opening a fresh session for each attempt
    async fn post(&self, body: &Value) -> Result<Value, Exhausted<TransportError>> {
        self.retry
            .run(
                move || async move {
                    let session = self.transport.session()?;
                    session.post(body).await
                },
                TransportError::is_retryable,
            )
            .await
    }
}
