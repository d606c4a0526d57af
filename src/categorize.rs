//! Batch category suggestions.
//!
//! All prompts go out in one request. The model is asked for
//! `{"prompts": [{"promptId", "category"}]}` but does not always comply, so
//! a `suggestions` array or a bare array are accepted as well. Elements
//! that do not decode are dropped; only the container shape can fail.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::dispatch::ChatMessage;
use crate::dispatch::http::OpenAiClient;
use crate::error::QuickPromptsError;
use crate::models::{self, registry};
use crate::store::{Prompt, normalized_category};

const SUGGEST_TOKENS: u32 = 1500;
const SUGGEST_TEMPERATURE: f64 = 0.3;

const SYSTEM_INSTRUCTION: &str = r#"You are a helpful assistant that categorizes prompts.
Please analyze the provided prompts and suggest a suitable category for each one.
Return your response as a valid JSON object in the following format:
{
  "prompts": [
    {
      "promptId": "id_from_input",
      "category": "your_suggested_category"
    },
    ...
  ]
}
Your response MUST be valid JSON."#;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorySuggestion {
    pub prompt_id: String,
    pub category: String,
}

/// Keys holding the suggestion array, in order of preference.
const CONTAINER_KEYS: [&str; 2] = ["suggestions", "prompts"];

/// The suggestion array: under a known key, or the document itself.
fn container(value: &Value) -> Option<&Vec<Value>> {
    match value {
        Value::Array(items) => Some(items),
        Value::Object(map) => CONTAINER_KEYS
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_array)),
        _ => None,
    }
}

#[derive(Serialize)]
struct PromptInput<'a> {
    id: &'a str,
    text: &'a str,
}

/// Decode the model's JSON content into suggestions.
pub fn decode_suggestions(content: &str) -> Result<Vec<CategorySuggestion>, QuickPromptsError> {
    let value: Value = serde_json::from_str(content).map_err(|e| {
        tracing::warn!("suggestion content is not JSON: {e}");
        QuickPromptsError::MalformedResponse("Failed to parse API response".to_string())
    })?;

    let Some(items) = container(&value) else {
        tracing::warn!("unexpected suggestion structure: {content}");
        return Err(QuickPromptsError::MalformedResponse(
            "API returned unexpected JSON structure".to_string(),
        ));
    };

    Ok(items
        .iter()
        .filter_map(
            |item| match serde_json::from_value::<CategorySuggestion>(item.clone()) {
                Ok(suggestion) => Some(suggestion),
                Err(e) => {
                    tracing::warn!("dropping suggestion {item}: {e}");
                    None
                }
            },
        )
        .collect())
}

/// Request body for a batch of prompts.
pub fn build_request(prompts: &[Prompt], model: &str) -> Result<models::RequestBody, QuickPromptsError> {
    let inputs: Vec<PromptInput<'_>> = prompts
        .iter()
        .map(|p| PromptInput {
            id: &p.id,
            text: &p.text,
        })
        .collect();
    let user_content = serde_json::to_string(&inputs).map_err(std::io::Error::other)?;

    let messages = [
        ChatMessage::system(SYSTEM_INSTRUCTION),
        ChatMessage::user(user_content),
    ];

    let mut extras = Map::new();
    extras.insert("response_format".to_string(), json!({"type": "json_object"}));
    extras.insert("temperature".to_string(), json!(SUGGEST_TEMPERATURE));

    let descriptor = registry::lookup(model);
    Ok(models::build(
        &descriptor,
        &messages,
        Some(SUGGEST_TOKENS),
        Some(&extras),
    ))
}

/// Ask the model for one category per prompt. Defaults to the registry's
/// preferred categorization model.
pub async fn suggest(
    client: &OpenAiClient,
    api_key: &str,
    prompts: &[Prompt],
    model: Option<&str>,
) -> Result<Vec<CategorySuggestion>, QuickPromptsError> {
    if api_key.trim().is_empty() {
        return Err(QuickPromptsError::Configuration(
            "No API key provided".to_string(),
        ));
    }
    if prompts.is_empty() {
        return Ok(Vec::new());
    }

    let model = model
        .filter(|m| !m.trim().is_empty())
        .map(str::to_string)
        .unwrap_or_else(registry::default_categorization_model);
    let model = model.as_str();
    let body = build_request(prompts, model)?;

    let content = client
        .chat_completion(api_key, &body)
        .await
        .inspect_err(|e| tracing::warn!(model, "category suggestion failed: {e}"))?;

    let suggestions = decode_suggestions(&content)?;
    tracing::info!(
        model,
        requested = prompts.len(),
        returned = suggestions.len(),
        "category suggestions received"
    );
    Ok(suggestions)
}

/// Set each prompt's category from the matching suggestion. Suggestions for
/// unknown ids are ignored. Returns how many prompts changed.
pub fn apply_suggestions(prompts: &mut [Prompt], suggestions: &[CategorySuggestion]) -> usize {
    let mut changed = 0;
    for suggestion in suggestions {
        let category = normalized_category(&suggestion.category);
        let Some(prompt) = prompts.iter_mut().find(|p| p.id == suggestion.prompt_id) else {
            continue;
        };
        if prompt.category != category {
            prompt.category = category;
            changed += 1;
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn suggestion(id: &str, category: &str) -> CategorySuggestion {
        CategorySuggestion {
            prompt_id: id.to_string(),
            category: category.to_string(),
        }
    }

    #[test]
    fn decodes_prompts_shape() {
        let got = decode_suggestions(r#"{"prompts":[{"promptId":"p1","category":"Greeting"}]}"#)
            .unwrap();
        assert_eq!(got, vec![suggestion("p1", "Greeting")]);
    }

    #[test]
    fn bare_array_equals_suggestions_object() {
        let items = r#"[{"promptId":"a","category":"X"},{"promptId":"b","category":"Y"}]"#;
        let bare = decode_suggestions(items).unwrap();
        let wrapped = decode_suggestions(&format!(r#"{{"suggestions":{items}}}"#)).unwrap();
        assert_eq!(bare, wrapped);
        assert_eq!(bare.len(), 2);
    }

    #[test]
    fn suggestions_key_wins_over_prompts() {
        let got = decode_suggestions(
            r#"{"suggestions":[{"promptId":"s","category":"S"}],"prompts":[{"promptId":"p","category":"P"}]}"#,
        )
        .unwrap();
        assert_eq!(got, vec![suggestion("s", "S")]);
    }

    #[test]
    fn undecodable_elements_are_dropped() {
        let got = decode_suggestions(
            r#"{"prompts":[{"promptId":"p1","category":"Greeting"},{"promptId":"p2"},"x"]}"#,
        )
        .unwrap();
        assert_eq!(got, vec![suggestion("p1", "Greeting")]);

        let got = decode_suggestions(r#"[{"promptId":1,"category":"A"}]"#).unwrap();
        assert!(got.is_empty());
    }

    #[test]
    fn non_array_suggestions_key_falls_through_to_prompts() {
        let got = decode_suggestions(
            r#"{"suggestions":"none","prompts":[{"promptId":"p","category":"P"}]}"#,
        )
        .unwrap();
        assert_eq!(got, vec![suggestion("p", "P")]);
    }

    #[test]
    fn unknown_shape_is_malformed() {
        let err = decode_suggestions(r#"{"categories":[]}"#).unwrap_err();
        assert!(matches!(err, QuickPromptsError::MalformedResponse(ref m) if m.contains("unexpected")));
    }

    #[test]
    fn invalid_json_is_malformed() {
        let err = decode_suggestions("Sure! Here are the categories:").unwrap_err();
        assert!(matches!(err, QuickPromptsError::MalformedResponse(ref m) if m.contains("parse")));
    }

    #[test]
    fn request_for_chat_model_keeps_json_mode() {
        let prompts = vec![Prompt {
            id: "p1".to_string(),
            text: "hello".to_string(),
            ..Prompt::new("", "", "", "", "")
        }];
        let body = build_request(&prompts, "gpt-4o-mini").unwrap();
        assert_eq!(body["response_format"], json!({"type": "json_object"}));
        assert_eq!(body["temperature"], json!(0.3));
        assert_eq!(body["max_tokens"], json!(1500));
        let user = body["messages"][1]["content"].as_str().unwrap();
        assert_eq!(user, r#"[{"id":"p1","text":"hello"}]"#);
    }

    #[test]
    fn apply_updates_matching_prompts() {
        let mut prompts = vec![
            Prompt {
                id: "a".to_string(),
                category: "General".to_string(),
                ..Prompt::new("", "", "", "", "")
            },
            Prompt {
                id: "b".to_string(),
                category: "Code".to_string(),
                ..Prompt::new("", "", "", "", "")
            },
        ];
        let changed = apply_suggestions(
            &mut prompts,
            &[
                suggestion("a", "Greeting"),
                suggestion("b", "Code"),
                suggestion("zzz", "Ghost"),
            ],
        );
        assert_eq!(changed, 1);
        assert_eq!(prompts[0].category, "Greeting");
        assert_eq!(prompts[1].category, "Code");
    }

    #[test]
    fn blank_suggested_category_becomes_general() {
        let mut prompts = vec![Prompt {
            id: "a".to_string(),
            category: "Misc".to_string(),
            ..Prompt::new("", "", "", "", "")
        }];
        apply_suggestions(&mut prompts, &[suggestion("a", "  ")]);
        assert_eq!(prompts[0].category, "General");
    }

    #[test]
    fn request_for_reasoning_model_is_corrected() {
        let body = build_request(&[], "o1-mini").unwrap();
        assert!(!body.contains_key("response_format"));
        assert_eq!(body["temperature"], json!(1.0));
        assert_eq!(body["max_completion_tokens"], json!(1500));
    }
}
