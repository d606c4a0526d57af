use quickprompts::dispatch::http::UpstreamModel;
use quickprompts::models::registry;
use quickprompts::response::{ToolMetadata, ToolResponse};
use quickprompts::store::Settings;
use quickprompts::tools::listmodels::ModelInfo;
use quickprompts::tools::settings::SettingsView;

#[test]
fn tool_response_success_serializes_correctly() {
    let response = ToolResponse::success(
        "Deleted prompt-1".to_string(),
        ToolMetadata::new("delete_prompt", "none", 0.01),
    );

    let json_str = serde_json::to_string(&response).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&json_str).unwrap();

    assert_eq!(parsed["status"], "success");
    assert_eq!(parsed["content"], "Deleted prompt-1");
    assert_eq!(parsed["content_type"], "text");
    assert_eq!(parsed["metadata"]["tool_name"], "delete_prompt");
    assert_eq!(parsed["metadata"]["model_used"], "none");
    assert!(parsed["metadata"]["duration_seconds"].is_f64());
}

#[test]
fn tool_response_json_carries_serialized_content() {
    let response = ToolResponse::json(
        &vec!["a", "b"],
        ToolMetadata::new("list_prompts", "none", f64::NAN),
    );

    let parsed: serde_json::Value =
        serde_json::from_str(&serde_json::to_string(&response).unwrap()).unwrap();
    assert_eq!(parsed["content_type"], "json");
    assert_eq!(parsed["content"], r#"["a","b"]"#);
    assert_eq!(parsed["metadata"]["duration_seconds"], 0.0);
}

#[test]
fn error_envelope_is_not_a_transport_error() {
    let result = ToolResponse::error(
        "Invalid import file format".to_string(),
        ToolMetadata::new("import_prompts", "none", 0.5),
    )
    .into_call_tool_result();
    assert!(
        result.is_error != Some(true),
        "in-band failures must not set is_error"
    );
    assert_eq!(result.content.len(), 1);
}

#[test]
fn tool_response_error_serializes_correctly() {
    let response = ToolResponse::error(
        "The selected model is not available. Please choose a different model.".to_string(),
        ToolMetadata::new("enhance_prompt", "gpt-9", 0.2),
    );

    let json_str = serde_json::to_string(&response).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&json_str).unwrap();

    assert_eq!(parsed["status"], "error");
    assert!(parsed["content"].as_str().unwrap().contains("not available"));
}

// ---------------------------------------------------------------------------
// list_models enriches upstream entries with local capabilities
// ---------------------------------------------------------------------------

#[test]
fn model_info_reports_capabilities() {
    for (id, json_mode, field) in [
        ("gpt-4o-mini", true, "max_tokens"),
        ("o3-mini", false, "max_completion_tokens"),
        ("o7", false, "max_completion_tokens"),
        ("my-finetune", false, "max_tokens"),
    ] {
        let info = ModelInfo::from(&UpstreamModel {
            id: id.to_string(),
            object: "model".to_string(),
            created: 0,
            owned_by: "system".to_string(),
        });
        assert_eq!(info.supports_json_mode, json_mode, "{id}");
        assert_eq!(info.token_field, field, "{id}");
        assert_eq!(info.known, registry::known(id).is_some(), "{id}");
        assert!(!info.display_name.is_empty(), "{id}");
    }
}

#[test]
fn settings_view_never_exposes_key() {
    let settings = Settings {
        openai_api_key: Some("sk-proj-1234567890abcd".to_string()),
        ..Settings::default()
    };
    let view = serde_json::to_string(&SettingsView::from(&settings)).unwrap();
    assert!(!view.contains("sk-proj-1234567890abcd"), "got: {view}");
    assert!(view.contains("abcd"));
}
