//! Upstream error translation.
//!
//! Maps the raw `error.message` text returned by the API to one of a few
//! stable explanations. Rules are checked in order; the first match wins.

const TOKEN_PARAMETER_MESSAGE: &str = "This model requires a different parameter format. \
     Please try a different model or contact support.";
const JSON_MODE_MESSAGE: &str = "This model does not support JSON response format. \
     The response may not be properly formatted.";
const MODEL_UNAVAILABLE_MESSAGE: &str =
    "The selected model is not available. Please choose a different model.";
const QUOTA_MESSAGE: &str = "API quota exceeded or rate limit reached. Please try again later.";
const UNKNOWN_MESSAGE: &str = "An unknown error occurred with the OpenAI API.";

/// Which translation rule matched a raw message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    TokenParameter,
    JsonModeUnsupported,
    ModelUnavailable,
    QuotaExceeded,
    Unrecognized,
}

struct Rule {
    kind: ErrorKind,
    /// Every needle must appear in the message.
    all_of: &'static [&'static str],
    /// At least one needle must appear. Empty means no constraint.
    any_of: &'static [&'static str],
}

const RULES: &[Rule] = &[
    Rule {
        kind: ErrorKind::TokenParameter,
        all_of: &["max_tokens", "max_completion_tokens"],
        any_of: &[],
    },
    Rule {
        kind: ErrorKind::JsonModeUnsupported,
        all_of: &["response_format"],
        any_of: &[],
    },
    Rule {
        kind: ErrorKind::ModelUnavailable,
        all_of: &[],
        any_of: &["does not exist", "invalid model"],
    },
    Rule {
        kind: ErrorKind::QuotaExceeded,
        all_of: &[],
        any_of: &["insufficient_quota", "rate_limit"],
    },
];

impl Rule {
    fn matches(&self, message: &str) -> bool {
        self.all_of.iter().all(|n| message.contains(n))
            && (self.any_of.is_empty() || self.any_of.iter().any(|n| message.contains(n)))
    }
}

/// Classify a raw upstream message.
pub fn classify(message: &str) -> ErrorKind {
    RULES
        .iter()
        .find(|rule| rule.matches(message))
        .map(|rule| rule.kind)
        .unwrap_or(ErrorKind::Unrecognized)
}

/// Translate a raw upstream message into user-facing text. Never empty.
pub fn translate(message: &str) -> String {
    match classify(message) {
        ErrorKind::TokenParameter => TOKEN_PARAMETER_MESSAGE.to_string(),
        ErrorKind::JsonModeUnsupported => JSON_MODE_MESSAGE.to_string(),
        ErrorKind::ModelUnavailable => MODEL_UNAVAILABLE_MESSAGE.to_string(),
        ErrorKind::QuotaExceeded => QUOTA_MESSAGE.to_string(),
        ErrorKind::Unrecognized if message.trim().is_empty() => UNKNOWN_MESSAGE.to_string(),
        ErrorKind::Unrecognized => message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_parameter_needs_both_names() {
        let msg = "Unsupported parameter: 'max_tokens' is not supported with this model. \
                   Use 'max_completion_tokens' instead.";
        assert_eq!(classify(msg), ErrorKind::TokenParameter);
        assert_eq!(classify("max_tokens is too large"), ErrorKind::Unrecognized);
    }

    #[test]
    fn token_rule_wins_over_later_rules() {
        let msg = "max_tokens / max_completion_tokens mismatch, rate_limit";
        assert_eq!(classify(msg), ErrorKind::TokenParameter);
    }

    #[test]
    fn response_format_rule() {
        let msg = "Invalid parameter: 'response_format' of type 'json_object' is not supported";
        assert_eq!(translate(msg), JSON_MODE_MESSAGE);
    }

    #[test]
    fn model_unavailable_rule() {
        assert_eq!(
            classify("The model `gpt-9` does not exist or you do not have access to it."),
            ErrorKind::ModelUnavailable
        );
        assert_eq!(classify("invalid model ID"), ErrorKind::ModelUnavailable);
    }

    #[test]
    fn quota_rule() {
        assert_eq!(classify("insufficient_quota"), ErrorKind::QuotaExceeded);
        assert_eq!(
            translate("rate_limit_exceeded for requests"),
            QUOTA_MESSAGE
        );
    }

    #[test]
    fn unrecognized_passes_through() {
        assert_eq!(translate("Incorrect API key provided"), "Incorrect API key provided");
    }

    #[test]
    fn blank_message_is_never_empty() {
        assert_eq!(translate(""), UNKNOWN_MESSAGE);
        assert_eq!(translate("   "), UNKNOWN_MESSAGE);
    }
}
