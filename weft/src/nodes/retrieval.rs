//! Retrieval node executor: query → documents → retrieval context.
//!
//! Retrieval failures are non-fatal: the context is cleared, the error is
//! noted in metadata, and execution continues.

use serde_json::Value;
use tracing::warn;

use crate::context::ExecutionContext;
use crate::error::WorkflowError;
use crate::graph::NodeSpec;
use crate::nodes::{NodeServices, NodeStep};

pub(super) async fn execute(
    spec: &NodeSpec,
    mut ctx: ExecutionContext,
    services: &NodeServices,
) -> Result<(ExecutionContext, NodeStep), WorkflowError> {
    let cap = services.capabilities.max_documents as u64;
    let limit = spec.config_u64("limit");
    if let Some(requested) = limit {
        if requested > cap {
            return Err(WorkflowError::ResourceLimitExceeded {
                resource: "max_documents".into(),
                limit: cap,
            });
        }
    }
    let k = limit.unwrap_or(cap) as usize;

    let Some(ref retriever) = services.retriever else {
        warn!(node_id = %spec.id, "no retriever configured; continuing without context");
        ctx.retrieval_context = Some(String::new());
        return Ok((ctx, NodeStep::Continue));
    };

    let query = spec
        .config_str("query")
        .map(str::to_string)
        .or_else(|| ctx.last_user_message().map(str::to_string))
        .unwrap_or_default();

    let result = tokio::select! {
        _ = services.cancel.cancelled() => return Err(WorkflowError::Cancelled),
        result = retriever.retrieve(&query, Some(k)) => result,
    };

    match result {
        Ok(documents) => {
            let joined = documents
                .iter()
                .map(|d| d.page_content.as_str())
                .collect::<Vec<_>>()
                .join("\n\n");
            ctx.metadata
                .insert("documents_retrieved".into(), Value::from(documents.len()));
            ctx.retrieval_context = Some(joined);
        }
        Err(e) => {
            warn!(node_id = %spec.id, error = %e, "retrieval failed; continuing without context");
            ctx.retrieval_context = Some(String::new());
            ctx.metadata
                .insert("retrieval_error".into(), Value::from(e.to_string()));
        }
    }

    Ok((ctx, NodeStep::Continue))
}
