use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::categorize::CategorySuggestion;

/// Ask the selected model to categorize stored prompts.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct SuggestRequest {
    /// Prompt ids to categorize (defaults to all stored prompts)
    pub prompt_ids: Option<Vec<String>>,
    /// Model override (defaults to the selected model, then gpt-4o-mini)
    pub model: Option<String>,
    /// Write the suggested categories back to the stored prompts (default false)
    pub apply: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestResponse {
    pub suggestions: Vec<CategorySuggestion>,
    /// Number of stored prompts whose category changed (only when applying).
    pub applied: usize,
}
