//! Request body construction per model descriptor.
//!
//! Callers pass whatever sampling options they want; the descriptor decides
//! what actually goes on the wire. Two corrections always run after the
//! caller's extras are merged:
//!
//! 1. `response_format` is dropped for models without JSON mode.
//! 2. `temperature` is pinned to the fixed value (or removed) for models
//!    that do not accept a configurable temperature.

use serde_json::{Map, Value, json};

use crate::dispatch::ChatMessage;
use crate::models::registry::{ModelDescriptor, TokenField};

pub type RequestBody = Map<String, Value>;

/// Keys owned by the adapter. Caller extras cannot override them.
const RESERVED_KEYS: &[&str] = &[
    "model",
    "messages",
    "max_tokens",
    "max_completion_tokens",
];

/// Token budget actually sent: requested (or the descriptor default),
/// clamped to the descriptor limit. Zero counts as "not requested".
pub fn token_budget(descriptor: &ModelDescriptor, requested: Option<u32>) -> u32 {
    let wanted = requested
        .filter(|&n| n > 0)
        .unwrap_or(descriptor.default_tokens);
    wanted.min(descriptor.token_limit)
}

pub fn build(
    descriptor: &ModelDescriptor,
    messages: &[ChatMessage],
    requested_tokens: Option<u32>,
    extra: Option<&Map<String, Value>>,
) -> RequestBody {
    let mut body = Map::new();
    body.insert("model".to_string(), json!(descriptor.id));
    body.insert("messages".to_string(), json!(messages));
    body.insert(
        descriptor.token_field().as_str().to_string(),
        json!(token_budget(descriptor, requested_tokens)),
    );

    if let Some(extra) = extra {
        for (key, value) in extra {
            if RESERVED_KEYS.contains(&key.as_str()) {
                tracing::debug!(key = %key, "ignoring reserved request parameter");
                continue;
            }
            body.insert(key.clone(), value.clone());
        }
    }

    if !descriptor.supports_json_mode && body.remove("response_format").is_some() {
        tracing::debug!(
            model = %descriptor.id,
            "model lacks JSON mode, dropped response_format"
        );
    }

    if !descriptor.temperature_configurable {
        match descriptor.fixed_temperature {
            Some(t) => {
                body.insert("temperature".to_string(), json!(t));
            }
            None => {
                body.remove("temperature");
            }
        }
    }

    body
}

/// Name of the token field present in a built body, if any.
pub fn emitted_token_field(body: &RequestBody) -> Option<TokenField> {
    match (
        body.contains_key(TokenField::MaxTokens.as_str()),
        body.contains_key(TokenField::MaxCompletionTokens.as_str()),
    ) {
        (true, false) => Some(TokenField::MaxTokens),
        (false, true) => Some(TokenField::MaxCompletionTokens),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::registry::{self, ModelCategory};

    fn extras(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("extras must be an object"),
        }
    }

    fn messages() -> Vec<ChatMessage> {
        vec![ChatMessage::system("sys"), ChatMessage::user("hi")]
    }

    #[test]
    fn every_known_model_emits_one_bounded_token_field() {
        for d in registry::all_known() {
            for requested in [None, Some(0), Some(1), Some(1500), Some(1_000_000)] {
                let body = build(&d, &messages(), requested, None);
                let field = emitted_token_field(&body)
                    .unwrap_or_else(|| panic!("{}: expected exactly one token field", d.id));
                assert_eq!(field, d.token_field());
                let value = body[field.as_str()].as_u64().unwrap();
                assert!(value <= u64::from(d.token_limit), "{}: {value}", d.id);
            }
        }
    }

    #[test]
    fn default_budget_used_when_not_requested() {
        let d = registry::lookup("o3");
        let body = build(&d, &messages(), None, None);
        assert_eq!(body["max_completion_tokens"], json!(4096));
        assert!(!body.contains_key("max_tokens"));
    }

    #[test]
    fn requested_budget_is_clamped() {
        let d = registry::lookup("gpt-4o");
        let body = build(&d, &messages(), Some(50_000), None);
        assert_eq!(body["max_tokens"], json!(4096));
    }

    #[test]
    fn fixed_temperature_overrides_caller() {
        for d in registry::all_known() {
            if d.temperature_configurable {
                continue;
            }
            let fixed = d.fixed_temperature.unwrap();
            for t in [0.0, 0.3, 0.5, 2.0] {
                let body = build(&d, &messages(), None, Some(&extras(json!({"temperature": t}))));
                assert_eq!(body["temperature"], json!(fixed));
            }
        }
    }

    #[test]
    fn configurable_temperature_passes_through() {
        let d = registry::lookup("gpt-4o-mini");
        let body = build(&d, &messages(), None, Some(&extras(json!({"temperature": 0.3}))));
        assert_eq!(body["temperature"], json!(0.3));
    }

    #[test]
    fn non_configurable_without_fixed_value_removes_temperature() {
        let mut d = registry::lookup("gpt-4o");
        d.temperature_configurable = false;
        d.fixed_temperature = None;
        let body = build(&d, &messages(), None, Some(&extras(json!({"temperature": 0.7}))));
        assert!(!body.contains_key("temperature"));
    }

    #[test]
    fn response_format_dropped_without_json_mode() {
        let d = registry::lookup("o1-mini");
        let extra = extras(json!({"response_format": {"type": "json_object"}, "temperature": 0.3}));
        let body = build(&d, &messages(), Some(1500), Some(&extra));
        assert!(!body.contains_key("response_format"));
        assert_eq!(body["temperature"], json!(1.0));
        assert_eq!(body["max_completion_tokens"], json!(1500));
    }

    #[test]
    fn response_format_kept_with_json_mode() {
        let d = registry::lookup("gpt-4o-mini");
        let extra = extras(json!({"response_format": {"type": "json_object"}}));
        let body = build(&d, &messages(), None, Some(&extra));
        assert_eq!(body["response_format"], json!({"type": "json_object"}));
    }

    #[test]
    fn unknown_other_model_drops_response_format() {
        let d = registry::lookup("gpt-9");
        assert_eq!(d.category, ModelCategory::Other);
        let extra = extras(json!({"response_format": {"type": "json_object"}}));
        let body = build(&d, &messages(), None, Some(&extra));
        assert!(!body.contains_key("response_format"));
    }

    #[test]
    fn extras_cannot_add_second_token_field() {
        let d = registry::lookup("o4-mini");
        let extra = extras(json!({"max_tokens": 10, "model": "other", "top_p": 0.9}));
        let body = build(&d, &messages(), None, Some(&extra));
        assert_eq!(emitted_token_field(&body), Some(TokenField::MaxCompletionTokens));
        assert_eq!(body["model"], json!("o4-mini"));
        assert_eq!(body["top_p"], json!(0.9));
    }

    #[test]
    fn messages_serialize_with_lowercase_roles() {
        let d = registry::lookup("gpt-4");
        let body = build(&d, &messages(), None, None);
        assert_eq!(body["messages"][0]["role"], json!("system"));
        assert_eq!(body["messages"][1]["content"], json!("hi"));
    }
}
