use serde::Serialize;

use crate::dispatch::http::UpstreamModel;
use crate::models::{Capability, ModelCategory, registry};

/// One listed model with its local capability descriptor.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    pub id: String,
    pub owned_by: String,
    pub display_name: String,
    pub category: ModelCategory,
    pub supports_json_mode: bool,
    pub token_field: &'static str,
    pub known: bool,
}

impl From<&UpstreamModel> for ModelInfo {
    fn from(model: &UpstreamModel) -> Self {
        let descriptor = registry::lookup(&model.id);
        Self {
            id: model.id.clone(),
            owned_by: model.owned_by.clone(),
            display_name: descriptor.display_name.clone(),
            category: descriptor.category,
            supports_json_mode: descriptor.supports_json_mode,
            token_field: descriptor.token_field().as_str(),
            known: registry::known(&model.id).is_some(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListModelsResponse {
    pub models: Vec<ModelInfo>,
    /// Used by suggest_categories when no model is selected.
    pub default_categorization_model: String,
    /// Known models suited to enhancement, chat models first.
    pub recommended_for_enhancement: Vec<String>,
}

impl ListModelsResponse {
    pub fn new(upstream: &[UpstreamModel]) -> Self {
        Self {
            models: upstream.iter().map(ModelInfo::from).collect(),
            default_categorization_model: registry::default_categorization_model(),
            recommended_for_enhancement: registry::recommended(Capability::Enhancement)
                .into_iter()
                .map(|d| d.id)
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn info_carries_descriptor_fields() {
        let info = ModelInfo::from(&UpstreamModel {
            id: "o9-mini".to_string(),
            object: "model".to_string(),
            created: 1,
            owned_by: "system".to_string(),
        });
        assert_eq!(info.category, ModelCategory::Reasoning);
        assert_eq!(info.token_field, "max_completion_tokens");
        assert!(!info.known);
    }

    #[test]
    fn response_lists_recommendations() {
        let response = ListModelsResponse::new(&[]);
        assert!(response.models.is_empty());
        assert_eq!(response.default_categorization_model, "gpt-4o-mini");
        assert_eq!(
            response.recommended_for_enhancement.first().map(String::as_str),
            Some("gpt-4o")
        );
    }
}
