use std::time::Duration;

use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};

use crate::error::QuickPromptsError;
use crate::models::RequestBody;

const MAX_RESPONSE_BYTES: usize = 2 * 1024 * 1024; // 2MB

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// Model ids containing this substring are hidden from model listings.
const HIDDEN_MODEL_MARKER: &str = "vision";

/// Client for the OpenAI chat-completions and models endpoints.
pub struct OpenAiClient {
    client: Client,
    base_url: String,
}

#[derive(Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<Message>,
}

#[derive(Deserialize)]
struct Message {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorBody>,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    code: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<UpstreamModel>,
}

/// One entry of the models listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamModel {
    pub id: String,
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub created: i64,
    #[serde(default)]
    pub owned_by: String,
}

impl Default for OpenAiClient {
    fn default() -> Self {
        Self::new(DEFAULT_API_BASE, Duration::from_secs(120))
    }
}

impl OpenAiClient {
    pub fn new(base_url: &str, request_timeout: Duration) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(request_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(4)
            .build()
            .expect("failed to build HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// POST a chat-completions request and return `choices[0].message.content`.
    pub async fn chat_completion(
        &self,
        api_key: &str,
        body: &RequestBody,
    ) -> Result<String, QuickPromptsError> {
        require_api_key(api_key)?;
        let url = format!("{}/chat/completions", self.base_url);
        tracing::debug!(
            model = body.get("model").and_then(|m| m.as_str()).unwrap_or("?"),
            "sending chat completion"
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {api_key}"))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await?;

        let bytes = read_capped(response).await?;

        let completion: ChatCompletion = serde_json::from_slice(&bytes).map_err(|e| {
            QuickPromptsError::MalformedResponse(format!("failed to parse API response: {e}"))
        })?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| {
                QuickPromptsError::MalformedResponse("No content returned from API".to_string())
            })
    }

    /// GET the model listing, minus vision models, sorted by id.
    pub async fn list_models(&self, api_key: &str) -> Result<Vec<UpstreamModel>, QuickPromptsError> {
        require_api_key(api_key)?;
        let url = format!("{}/models", self.base_url);

        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {api_key}"))
            .send()
            .await?;

        let bytes = read_capped(response).await?;
        let list: ModelList = serde_json::from_slice(&bytes).map_err(|e| {
            QuickPromptsError::MalformedResponse(format!("failed to parse model list: {e}"))
        })?;

        Ok(filter_models(list.data))
    }
}

/// Drop vision models and sort the rest by id.
pub fn filter_models(models: Vec<UpstreamModel>) -> Vec<UpstreamModel> {
    let mut models: Vec<UpstreamModel> = models
        .into_iter()
        .filter(|m| !m.id.contains(HIDDEN_MODEL_MARKER))
        .collect();
    models.sort_by(|a, b| a.id.cmp(&b.id));
    models
}

fn require_api_key(api_key: &str) -> Result<(), QuickPromptsError> {
    if api_key.trim().is_empty() {
        return Err(QuickPromptsError::Configuration(
            "No API key provided".to_string(),
        ));
    }
    Ok(())
}

/// Read the body with the size cap applied, turning non-2xx statuses into
/// `Upstream` errors.
async fn read_capped(response: Response) -> Result<Vec<u8>, QuickPromptsError> {
    let status = response.status();
    let bytes = response.bytes().await?;

    if bytes.len() > MAX_RESPONSE_BYTES {
        return Err(QuickPromptsError::MalformedResponse(format!(
            "response too large: {} bytes (max {})",
            bytes.len(),
            MAX_RESPONSE_BYTES
        )));
    }

    if !status.is_success() {
        let err = upstream_error(status.as_u16(), &bytes);
        tracing::warn!("API returned {status}: {err}");
        return Err(err);
    }

    Ok(bytes.to_vec())
}

/// Build an `Upstream` error from a non-2xx body. Uses the structured
/// envelope when present, otherwise the raw text.
pub fn upstream_error(status: u16, body: &[u8]) -> QuickPromptsError {
    let envelope = serde_json::from_slice::<ErrorEnvelope>(body)
        .ok()
        .and_then(|e| e.error);

    match envelope {
        Some(err) => QuickPromptsError::Upstream {
            message: err.message.unwrap_or_default(),
            kind: err.kind,
            code: err.code.and_then(|c| match c {
                serde_json::Value::String(s) => Some(s),
                serde_json::Value::Null => None,
                other => Some(other.to_string()),
            }),
            status,
        },
        None => {
            let text = String::from_utf8_lossy(body);
            let message = if text.trim().is_empty() {
                format!("HTTP {status}")
            } else {
                text.trim().to_string()
            };
            QuickPromptsError::Upstream {
                message,
                kind: None,
                code: None,
                status,
            }
        }
    }
}
