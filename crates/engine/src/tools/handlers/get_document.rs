use std::sync::atomic::Ordering;
use std::sync::Arc;

use serde_json::{json, Value};

use crate::tools::registry::{ToolHandler, ToolHandlerContext};
use crate::tools::truncation::truncate_text;

/// Return the contract text and filename. Takes no arguments.
pub fn handler() -> ToolHandler {
    Arc::new(|_args: Value, ctx: Arc<ToolHandlerContext>| {
        Box::pin(async move {
            let max_chars = ctx.tool_result_limits.max_document_chars as usize;
            let (content, truncated) = truncate_text(&ctx.document.content, max_chars);

            ctx.session_counters
                .document_reads
                .fetch_add(1, Ordering::Relaxed);

            if truncated {
                tracing::warn!(
                    filename = %ctx.document.filename,
                    max_chars,
                    "Contract text truncated for tool result"
                );
            }

            Ok(json!({
                "filename": ctx.document.filename,
                "content": content,
                "truncated": truncated,
            }))
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::tools::SessionCounters;
    use contract_review_common::config::ToolResultLimits;

    fn context(content: &str, max_document_chars: u32) -> Arc<ToolHandlerContext> {
        Arc::new(ToolHandlerContext {
            document: Arc::new(Document {
                content: content.into(),
                filename: "ServicesAgreementSample.pdf".into(),
            }),
            knowledge: None,
            tool_result_limits: ToolResultLimits { max_document_chars },
            max_passages: 3,
            session_counters: SessionCounters::default(),
        })
    }

    #[tokio::test]
    async fn test_returns_full_document() {
        let ctx = context("1. Term. This Agreement begins on the Effective Date.", 1000);
        let result = handler()(json!({}), Arc::clone(&ctx)).await.unwrap();

        assert_eq!(result["filename"], "ServicesAgreementSample.pdf");
        assert_eq!(
            result["content"],
            "1. Term. This Agreement begins on the Effective Date."
        );
        assert_eq!(result["truncated"], false);
        assert_eq!(ctx.session_counters.document_reads.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_truncates_long_document() {
        let ctx = context(&"x".repeat(500), 100);
        let result = handler()(Value::Null, ctx).await.unwrap();
        assert_eq!(result["truncated"], true);
    }
}
