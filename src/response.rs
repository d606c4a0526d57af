use rmcp::model::{CallToolResult, Content};
use serde::Serialize;

/// Tool response envelope. Every tool returns `Content::text(json_string)`
/// with this shape; failures are reported in-band with `status: "error"`.
#[derive(Debug, Serialize)]
pub struct ToolResponse {
    pub status: &'static str,
    pub content: String,
    pub content_type: &'static str,
    pub metadata: ToolMetadata,
}

#[derive(Debug, Serialize)]
pub struct ToolMetadata {
    pub tool_name: String,
    pub model_used: String,
    pub duration_seconds: f64,
}

impl ToolMetadata {
    /// A non-finite duration is recorded as 0.
    pub fn new(tool_name: &str, model_used: &str, duration_seconds: f64) -> Self {
        Self {
            tool_name: tool_name.to_string(),
            model_used: model_used.to_string(),
            duration_seconds: if duration_seconds.is_finite() {
                duration_seconds
            } else {
                0.0
            },
        }
    }
}

impl ToolResponse {
    pub fn success(content: String, metadata: ToolMetadata) -> Self {
        Self {
            status: "success",
            content,
            content_type: "text",
            metadata,
        }
    }

    /// Success whose content is a serialized JSON value.
    pub fn json<T: Serialize>(value: &T, metadata: ToolMetadata) -> Self {
        match serde_json::to_string(value) {
            Ok(content) => Self {
                status: "success",
                content,
                content_type: "json",
                metadata,
            },
            Err(e) => Self::error(format!("serialization failed: {e}"), metadata),
        }
    }

    pub fn error(message: String, metadata: ToolMetadata) -> Self {
        Self {
            status: "error",
            content: message,
            content_type: "text",
            metadata,
        }
    }

    /// Convert to an MCP result. Never flagged `is_error`: clients abort
    /// sibling calls on it, so the outcome lives in `status`.
    pub fn into_call_tool_result(self) -> CallToolResult {
        let text = serde_json::to_string(&self).unwrap_or_else(|e| {
            tracing::error!(tool = %self.metadata.tool_name, "failed to encode response: {e}");
            format!("failed to encode {} response: {e}", self.metadata.tool_name)
        });
        CallToolResult::success(vec![Content::text(text)])
    }
}
