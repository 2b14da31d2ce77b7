//! MCP tools backed by the GraphQL client
//!
//! Every tool reports failures as text content rather than as an MCP error, since
//! the calling agent can only read what the tool returns.

pub mod connect;
pub mod execute;
pub mod generate_query;

#[cfg(test)]
pub(crate) mod tests {
    use rmcp::model::CallToolResult;

    /// The text content of a tool result
    pub(crate) fn text_of(result: &CallToolResult) -> String {
        result
            .content
            .iter()
            .filter_map(|content| content.as_text())
            .map(|text| text.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}
