use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

/// Model family. Decides which request parameters the API accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelCategory {
    Reasoning,
    Chat,
    Completion,
    Other,
}

/// Capability flags a caller can ask about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Enhancement,
    Categorization,
    JsonMode,
}

/// Name of the field carrying the output token budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenField {
    MaxTokens,
    MaxCompletionTokens,
}

impl TokenField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MaxTokens => "max_tokens",
            Self::MaxCompletionTokens => "max_completion_tokens",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelDescriptor {
    pub id: String,
    pub display_name: String,
    pub category: ModelCategory,
    pub supports_enhancement: bool,
    pub supports_categorization: bool,
    pub supports_json_mode: bool,
    /// Reasoning models reject `max_tokens` and require `max_completion_tokens`.
    pub use_completion_token_field: bool,
    pub token_limit: u32,
    pub default_tokens: u32,
    pub temperature_configurable: bool,
    /// Value sent when temperature is not configurable. `None` means omit it.
    pub fixed_temperature: Option<f64>,
    pub deprecated: bool,
    pub description: Option<String>,
}

impl ModelDescriptor {
    pub fn supports(&self, capability: Capability) -> bool {
        match capability {
            Capability::Enhancement => self.supports_enhancement,
            Capability::Categorization => self.supports_categorization,
            Capability::JsonMode => self.supports_json_mode,
        }
    }

    pub fn token_field(&self) -> TokenField {
        if self.use_completion_token_field {
            TokenField::MaxCompletionTokens
        } else {
            TokenField::MaxTokens
        }
    }
}

/// Static row of the known-model table.
struct KnownModel {
    id: &'static str,
    display_name: &'static str,
    category: ModelCategory,
    json_mode: bool,
    token_limit: u32,
    default_tokens: u32,
    description: &'static str,
}

const REASONING_DEFAULT_TOKENS: u32 = 4096;
const CHAT_DEFAULT_TOKENS: u32 = 1000;
const FALLBACK_TOKEN_LIMIT: u32 = 4096;
const REASONING_TEMPERATURE: f64 = 1.0;

const KNOWN_MODELS: &[KnownModel] = &[
    KnownModel {
        id: "o1-preview",
        display_name: "O1 Preview",
        category: ModelCategory::Reasoning,
        json_mode: false,
        token_limit: 32768,
        default_tokens: REASONING_DEFAULT_TOKENS,
        description: "Advanced reasoning model for complex tasks",
    },
    KnownModel {
        id: "o1-mini",
        display_name: "O1 Mini",
        category: ModelCategory::Reasoning,
        json_mode: false,
        token_limit: 65536,
        default_tokens: REASONING_DEFAULT_TOKENS,
        description: "Smaller, faster reasoning model",
    },
    KnownModel {
        id: "o3",
        display_name: "O3",
        category: ModelCategory::Reasoning,
        json_mode: false,
        token_limit: 100_000,
        default_tokens: REASONING_DEFAULT_TOKENS,
        description: "Advanced reasoning model with enhanced capabilities",
    },
    KnownModel {
        id: "o3-mini",
        display_name: "O3 Mini",
        category: ModelCategory::Reasoning,
        json_mode: false,
        token_limit: 65536,
        default_tokens: REASONING_DEFAULT_TOKENS,
        description: "Smaller O3 model for faster inference",
    },
    KnownModel {
        id: "o4-mini",
        display_name: "O4 Mini",
        category: ModelCategory::Reasoning,
        json_mode: false,
        token_limit: 65536,
        default_tokens: REASONING_DEFAULT_TOKENS,
        description: "Fast, cost-efficient reasoning model with multimodal support",
    },
    KnownModel {
        id: "gpt-4o",
        display_name: "GPT-4o",
        category: ModelCategory::Chat,
        json_mode: true,
        token_limit: 4096,
        default_tokens: CHAT_DEFAULT_TOKENS,
        description: "Latest GPT-4 optimized model",
    },
    KnownModel {
        id: "gpt-4o-mini",
        display_name: "GPT-4o Mini",
        category: ModelCategory::Chat,
        json_mode: true,
        token_limit: 16384,
        default_tokens: CHAT_DEFAULT_TOKENS,
        description: "Small, affordable GPT-4o model",
    },
    KnownModel {
        id: "gpt-4-turbo",
        display_name: "GPT-4 Turbo",
        category: ModelCategory::Chat,
        json_mode: true,
        token_limit: 4096,
        default_tokens: CHAT_DEFAULT_TOKENS,
        description: "GPT-4 Turbo with vision capabilities",
    },
    KnownModel {
        id: "gpt-4",
        display_name: "GPT-4",
        category: ModelCategory::Chat,
        json_mode: true,
        token_limit: 8192,
        default_tokens: CHAT_DEFAULT_TOKENS,
        description: "Original GPT-4 model",
    },
    KnownModel {
        id: "gpt-3.5-turbo",
        display_name: "GPT-3.5 Turbo",
        category: ModelCategory::Chat,
        json_mode: true,
        token_limit: 4096,
        default_tokens: CHAT_DEFAULT_TOKENS,
        description: "Fast, affordable model for simpler tasks",
    },
];

/// Preferred categorization models, in order.
const PREFERRED_CATEGORIZATION_MODELS: &[&str] = &["gpt-4o-mini", "gpt-3.5-turbo", "gpt-4o"];

/// Fallback when nothing else is available.
pub const DEFAULT_CATEGORIZATION_MODEL: &str = "gpt-4o-mini";

static REASONING_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^o\d+(-mini|-preview)?$").expect("reasoning id pattern is valid")
});

impl From<&KnownModel> for ModelDescriptor {
    fn from(m: &KnownModel) -> Self {
        let reasoning = m.category == ModelCategory::Reasoning;
        Self {
            id: m.id.to_string(),
            display_name: m.display_name.to_string(),
            category: m.category,
            supports_enhancement: true,
            supports_categorization: true,
            supports_json_mode: m.json_mode,
            use_completion_token_field: reasoning,
            token_limit: m.token_limit,
            default_tokens: m.default_tokens,
            temperature_configurable: !reasoning,
            fixed_temperature: reasoning.then_some(REASONING_TEMPERATURE),
            deprecated: false,
            description: Some(m.description.to_string()),
        }
    }
}

/// Static descriptor for a known model id. Exact, case-sensitive match.
pub fn known(model_id: &str) -> Option<ModelDescriptor> {
    KNOWN_MODELS
        .iter()
        .find(|m| m.id == model_id)
        .map(ModelDescriptor::from)
}

/// True if the id follows the reasoning naming scheme (`o1`, `o3-mini`, `O7-preview`, ...).
pub fn is_reasoning_id(model_id: &str) -> bool {
    REASONING_ID.is_match(model_id)
}

/// Descriptor for an id missing from the table.
pub fn infer(model_id: &str) -> ModelDescriptor {
    let reasoning = is_reasoning_id(model_id);
    ModelDescriptor {
        id: model_id.to_string(),
        display_name: model_id.to_string(),
        category: if reasoning {
            ModelCategory::Reasoning
        } else {
            ModelCategory::Other
        },
        supports_enhancement: true,
        supports_categorization: true,
        supports_json_mode: false,
        use_completion_token_field: reasoning,
        token_limit: FALLBACK_TOKEN_LIMIT,
        default_tokens: CHAT_DEFAULT_TOKENS,
        temperature_configurable: !reasoning,
        fixed_temperature: reasoning.then_some(REASONING_TEMPERATURE),
        deprecated: false,
        description: reasoning.then(|| {
            "Unknown reasoning model - using max_completion_tokens parameter".to_string()
        }),
    }
}

/// Descriptor for any model id. Never fails.
pub fn lookup(model_id: &str) -> ModelDescriptor {
    known(model_id).unwrap_or_else(|| {
        let descriptor = infer(model_id);
        tracing::debug!(
            model = model_id,
            category = ?descriptor.category,
            "inferred descriptor for unknown model"
        );
        descriptor
    })
}

pub fn supports(model_id: &str, capability: Capability) -> bool {
    lookup(model_id).supports(capability)
}

pub fn token_field(model_id: &str) -> TokenField {
    lookup(model_id).token_field()
}

/// Known, non-deprecated models with the capability. Chat models first,
/// table order otherwise.
pub fn recommended(capability: Capability) -> Vec<ModelDescriptor> {
    let mut models: Vec<ModelDescriptor> = KNOWN_MODELS
        .iter()
        .map(ModelDescriptor::from)
        .filter(|d| d.supports(capability) && !d.deprecated)
        .collect();
    // Stable sort keeps table order within each group.
    models.sort_by_key(|d| d.category != ModelCategory::Chat);
    models
}

pub fn default_categorization_model() -> String {
    PREFERRED_CATEGORIZATION_MODELS
        .iter()
        .find(|id| known(id).is_some_and(|d| d.supports(Capability::Categorization)))
        .map(|id| id.to_string())
        .or_else(|| {
            recommended(Capability::Categorization)
                .into_iter()
                .next()
                .map(|d| d.id)
        })
        .unwrap_or_else(|| DEFAULT_CATEGORIZATION_MODEL.to_string())
}

/// All known descriptors in table order.
pub fn all_known() -> Vec<ModelDescriptor> {
    KNOWN_MODELS.iter().map(ModelDescriptor::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_lookup_returns_table_row() {
        let d = lookup("gpt-4o-mini");
        assert_eq!(d.category, ModelCategory::Chat);
        assert_eq!(d.token_limit, 16384);
        assert!(d.supports_json_mode);
        assert!(d.temperature_configurable);
    }

    #[test]
    fn reasoning_descriptors_fix_temperature() {
        for d in all_known() {
            if d.category == ModelCategory::Reasoning && d.use_completion_token_field {
                assert!(!d.temperature_configurable, "{} allows temperature", d.id);
                assert_eq!(d.fixed_temperature, Some(1.0));
            }
        }
    }

    #[test]
    fn reasoning_pattern() {
        assert!(is_reasoning_id("o1"));
        assert!(is_reasoning_id("o3-preview"));
        assert!(is_reasoning_id("O12-MINI"));
        assert!(!is_reasoning_id("o3-pro"));
        assert!(!is_reasoning_id("gpt-9"));
        assert!(!is_reasoning_id("o"));
        assert!(!is_reasoning_id("xo1"));
    }

    #[test]
    fn unknown_reasoning_id_is_inferred() {
        let d = lookup("o3-preview");
        assert_eq!(d.category, ModelCategory::Reasoning);
        assert_eq!(d.token_field(), TokenField::MaxCompletionTokens);
        assert!(!d.temperature_configurable);
        assert_eq!(d.fixed_temperature, Some(1.0));
        assert!(!d.supports_json_mode);
    }

    #[test]
    fn unknown_other_id_is_permissive() {
        let d = lookup("gpt-9");
        assert_eq!(d.category, ModelCategory::Other);
        assert_eq!(d.id, "gpt-9");
        assert_eq!(d.token_field(), TokenField::MaxTokens);
        assert!(d.temperature_configurable);
        assert_eq!(d.fixed_temperature, None);
        assert!(!d.supports_json_mode);
        assert!(d.supports_categorization);
    }

    #[test]
    fn known_match_is_case_sensitive() {
        // "GPT-4O" is not in the table and does not look like a reasoning id.
        assert_eq!(lookup("GPT-4O").category, ModelCategory::Other);
    }

    #[test]
    fn recommended_puts_chat_first() {
        let models = recommended(Capability::Enhancement);
        assert_eq!(models.len(), KNOWN_MODELS.len());
        assert_eq!(models[0].id, "gpt-4o");
        let first_reasoning = models
            .iter()
            .position(|d| d.category == ModelCategory::Reasoning)
            .unwrap();
        assert!(
            models[first_reasoning..]
                .iter()
                .all(|d| d.category != ModelCategory::Chat)
        );
    }

    #[test]
    fn json_mode_recommendations_exclude_reasoning() {
        assert!(
            recommended(Capability::JsonMode)
                .iter()
                .all(|d| d.category == ModelCategory::Chat)
        );
    }

    #[test]
    fn free_functions_agree_with_lookup() {
        assert!(supports("gpt-4o", Capability::JsonMode));
        assert!(!supports("o1-mini", Capability::JsonMode));
        assert!(supports("o7", Capability::Enhancement));
        assert_eq!(token_field("o7"), TokenField::MaxCompletionTokens);
        assert_eq!(token_field("gpt-3.5-turbo"), TokenField::MaxTokens);
    }

    #[test]
    fn default_categorization_prefers_mini() {
        assert_eq!(default_categorization_model(), "gpt-4o-mini");
    }
}
