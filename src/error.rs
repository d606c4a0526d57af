use thiserror::Error;

use crate::translate;

#[derive(Debug, Error)]
pub enum QuickPromptsError {
    /// Missing API key or model. Raised before any upstream call is attempted.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    /// Non-2xx response from the API. `kind` and `code` come from the
    /// `{error: {message, type, code}}` envelope when one was present.
    #[error("upstream error ({status}): {message}")]
    Upstream {
        message: String,
        kind: Option<String>,
        code: Option<String>,
        status: u16,
    },

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("persistence error: {0}")]
    Persistence(#[from] std::io::Error),

    #[error("invalid import format: {0}")]
    Validation(String),
}

impl QuickPromptsError {
    /// Returns true for errors that came back from (or failed on the way to)
    /// the API, as opposed to local configuration and storage failures.
    pub fn is_upstream_facing(&self) -> bool {
        matches!(
            self,
            Self::Request(_) | Self::Upstream { .. } | Self::MalformedResponse(_)
        )
    }

    /// Stable user-facing text. Upstream messages always pass through the
    /// translator; transport details and raw bodies are not exposed.
    pub fn user_message(&self) -> String {
        match self {
            Self::Configuration(msg) => msg.clone(),
            Self::Request(e) if e.is_timeout() => {
                "request to the OpenAI API timed out".to_string()
            }
            Self::Request(e) if e.is_connect() => {
                "could not connect to the OpenAI API".to_string()
            }
            Self::Request(_) => "request to the OpenAI API failed".to_string(),
            Self::Upstream { message, .. } => translate::translate(message),
            Self::MalformedResponse(msg) => msg.clone(),
            Self::Persistence(e) => format!("failed to access local storage: {e}"),
            Self::Validation(_) => "Invalid import file format".to_string(),
        }
    }
}
