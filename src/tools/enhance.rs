use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::enhance::HistoryItem;

/// Run one refinement of an enhancement dialogue.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct EnhanceRequest {
    /// Dialogue key. Defaults to prompt_id. Calls with the same key continue the same dialogue.
    pub session: Option<String>,
    /// Stored prompt to enhance. Its text is used when `text` is omitted.
    pub prompt_id: Option<String>,
    /// Prompt text to enhance (used only when the dialogue starts)
    pub text: Option<String>,
    /// Feedback on the previous enhancement. Omit to ask for a different angle.
    pub feedback: Option<String>,
    /// Model override (defaults to the selected model)
    pub model: Option<String>,
    /// Discard the existing dialogue and start over (default false)
    pub reset: Option<bool>,
}

impl EnhanceRequest {
    pub fn session_key(&self) -> Option<&str> {
        let non_blank = |k: &&str| !k.trim().is_empty();
        self.session
            .as_deref()
            .filter(non_blank)
            .or(self.prompt_id.as_deref().filter(non_blank))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnhanceResponse {
    pub session: String,
    pub enhanced_prompt: String,
    pub history: Vec<HistoryItem>,
}
