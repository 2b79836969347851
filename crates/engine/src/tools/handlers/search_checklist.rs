use std::sync::atomic::Ordering;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};

use crate::tools::registry::{ToolHandler, ToolHandlerContext};

#[derive(Deserialize)]
struct Args {
    query: String,
    #[serde(default)]
    limit: Option<usize>,
}

/// Search the checklist guide for passages relevant to a query.
pub fn handler() -> ToolHandler {
    Arc::new(|args: Value, ctx: Arc<ToolHandlerContext>| {
        Box::pin(async move {
            let args: Args =
                serde_json::from_value(args).map_err(|e| format!("Invalid arguments: {}", e))?;

            if args.query.trim().is_empty() {
                return Err("Invalid arguments: query must not be empty".to_string());
            }

            let knowledge = ctx.knowledge.as_ref().ok_or_else(|| {
                "Checklist knowledge base not available; rely on general checklist practice"
                    .to_string()
            })?;

            let limit = args
                .limit
                .unwrap_or(ctx.max_passages)
                .clamp(1, ctx.max_passages.max(1));
            let passages = knowledge.retrieve_context(&args.query, limit);

            ctx.session_counters
                .checklist_queries
                .fetch_add(1, Ordering::Relaxed);

            tracing::debug!(query = %args.query, hits = passages.len(), "Checklist searched");

            Ok(json!({
                "query": args.query,
                "passages": passages,
            }))
        })
    })
}
