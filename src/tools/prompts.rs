use schemars::JsonSchema;
use serde::Deserialize;

use crate::store::{Prompt, new_prompt_id, normalized_category};

/// Create a prompt, or replace an existing one by id.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct SavePromptRequest {
    /// Id of the prompt to replace. Omit to create a new prompt.
    pub id: Option<String>,
    /// Display name
    pub name: String,
    /// The snippet text
    pub text: String,
    /// Free-text category (blank becomes "General")
    pub category: Option<String>,
    /// Color tag, e.g. "#4f46e5"
    pub color: Option<String>,
    /// Icon name or emoji
    pub icon: Option<String>,
}

impl SavePromptRequest {
    /// Build the stored prompt. A blank or missing id gets a fresh one.
    pub fn into_prompt(self) -> Prompt {
        Prompt {
            id: self
                .id
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(new_prompt_id),
            name: self.name,
            text: self.text,
            category: normalized_category(self.category.as_deref().unwrap_or_default()),
            color: self.color.unwrap_or_default(),
            icon: self.icon.unwrap_or_default(),
        }
    }
}

/// Delete a prompt by id.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct DeletePromptRequest {
    /// Id of the prompt to delete
    pub id: String,
}

/// Export or import path.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct FileRequest {
    /// Absolute path of the JSON export file
    pub path: String,
}
