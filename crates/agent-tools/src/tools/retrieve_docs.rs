use std::sync::Arc;

use agent_core::{Tool, ToolError, ToolResult};
use async_trait::async_trait;
use doc_index::SearchIndex;
use serde_json::json;
use tracing::info;

const DEFAULT_K: usize = 1;
const MAX_K: usize = 10;

/// Similarity search over the indexed workspace history.
pub struct RetrieveRelatedDocsTool {
    index: Arc<SearchIndex>,
}

impl RetrieveRelatedDocsTool {
    pub fn new(index: Arc<SearchIndex>) -> Self {
        Self { index }
    }
}

#[async_trait]
impl Tool for RetrieveRelatedDocsTool {
    fn name(&self) -> &str {
        "retrieve_related_docs"
    }

    fn description(&self) -> &str {
        "Search the vector database for documents related to a query"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Query to search related documents for"
                },
                "k": {
                    "type": "integer",
                    "description": "Number of documents to retrieve"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: serde_json::Value) -> Result<ToolResult, ToolError> {
        let query = args
            .get("query")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidArguments("'query' must be a string".to_string()))?;
        let k = args
            .get("k")
            .and_then(|v| v.as_u64())
            .map(|k| (k as usize).clamp(1, MAX_K))
            .unwrap_or(DEFAULT_K);

        info!("Retrieving {} documents for query", k);

        let documents = self
            .index
            .similarity_search(query, k)
            .await
            .map_err(|e| ToolError::Execution(format!("document search failed: {e}")))?;

        if documents.is_empty() {
            return Ok(ToolResult::ok("No related documents found."));
        }

        let rendered = documents
            .iter()
            .map(|scored| {
                let source = scored
                    .document
                    .metadata
                    .permalink
                    .as_deref()
                    .unwrap_or("unknown");
                format!("{}\n(source: {})", scored.document.content.trim(), source)
            })
            .collect::<Vec<_>>()
            .join("\n---\n");

        Ok(ToolResult::ok(rendered))
    }
}
