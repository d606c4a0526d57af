//! Multi-turn prompt enhancement.
//!
//! A session keeps the conversation with the model between refinements.
//! The system preamble is sent on every call but never stored, and the
//! stored history is cut to the last [`MAX_HISTORY`] messages after each
//! successful call (two user/assistant round-trips).

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value, json};
use tokio::sync::Mutex;

use crate::dispatch::{ChatMessage, Role};
use crate::dispatch::http::OpenAiClient;
use crate::error::QuickPromptsError;
use crate::models::{self, registry};

pub type HistoryItem = ChatMessage;

/// Messages retained between refinements.
pub const MAX_HISTORY: usize = 4;

const ENHANCE_TOKENS: u32 = 1000;
const ENHANCE_TEMPERATURE: f64 = 0.5;

const REGENERATE_DIRECTIVE: &str =
    "Regenerate the enhancement, perhaps exploring a different angle.";

pub const SYSTEM_PREAMBLE: &str = "You are an AI assistant specialized in enhancing user-provided prompts for Large Language Models (LLMs) like ChatGPT.
Your goal is to refine the user's prompt to be clearer, more effective, and more likely to yield the desired output from an LLM.

Guidelines:
1.  **Understand Intent:** Analyze the user's original prompt to grasp their underlying goal.
2.  **Clarity and Specificity:** Improve wording for precision. Remove ambiguity. Add necessary context or constraints if missing.
3.  **Structure:** Organize the prompt logically. Use formatting (like markdown or bullet points) if it improves readability for the LLM.
4.  **Completeness:** Ensure the prompt includes all necessary information for the LLM to perform the task.
5.  **Tone and Persona:** Adjust the tone or suggest a persona for the LLM if relevant to the user's goal (e.g., 'Act as a senior software engineer...').
6.  **Conciseness:** While adding detail is important, avoid unnecessary jargon or verbosity.
7.  **Output Format:** If the user implies a desired output format (e.g., list, JSON, table), make it explicit in the prompt.
8.  **Feedback Integration:** If the user provides feedback on a previous enhancement, incorporate it into the next refinement.

Output ONLY the enhanced prompt text, without any explanations, apologies, or introductory phrases like \"Here is the enhanced prompt:\". Just provide the raw, improved prompt.";

/// Result of one successful refinement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enhancement {
    pub text: String,
    pub history: Vec<HistoryItem>,
}

#[derive(Debug, Clone)]
pub struct EnhancementSession {
    original: String,
    history: Vec<HistoryItem>,
    last_enhancement: Option<String>,
}

impl EnhancementSession {
    pub fn start(original: impl Into<String>) -> Self {
        Self {
            original: original.into(),
            history: Vec::new(),
            last_enhancement: None,
        }
    }

    /// Rebuild a session from a history the caller kept. System messages are
    /// dropped and the rest is pruned.
    pub fn resume(original: impl Into<String>, history: Vec<HistoryItem>) -> Self {
        let history: Vec<HistoryItem> = history
            .into_iter()
            .filter(|m| m.role != Role::System)
            .collect();
        let last_enhancement = history
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant)
            .map(|m| m.content.clone());
        Self {
            original: original.into(),
            history: prune(history),
            last_enhancement,
        }
    }

    pub fn original(&self) -> &str {
        &self.original
    }

    pub fn history(&self) -> &[HistoryItem] {
        &self.history
    }

    pub fn last_enhancement(&self) -> Option<&str> {
        self.last_enhancement.as_deref()
    }

    /// The user turn the next call will append.
    fn next_user_turn(&self, feedback: Option<&str>) -> ChatMessage {
        let feedback = feedback.map(str::trim).filter(|f| !f.is_empty());
        if self.history.is_empty() {
            ChatMessage::user(format!("Enhance this prompt: {}", self.original))
        } else if let Some(feedback) = feedback {
            ChatMessage::user(feedback)
        } else {
            ChatMessage::user(REGENERATE_DIRECTIVE)
        }
    }

    /// Full message list for the next call: preamble, history, new user turn.
    pub fn next_messages(&self, feedback: Option<&str>) -> Vec<ChatMessage> {
        self.messages_with(self.next_user_turn(feedback))
    }

    fn messages_with(&self, user_turn: ChatMessage) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(self.history.len() + 2);
        messages.push(ChatMessage::system(SYSTEM_PREAMBLE));
        messages.extend(self.history.iter().cloned());
        messages.push(user_turn);
        messages
    }

    /// Record a successful turn. Empty content is rejected and leaves the
    /// session unchanged.
    pub fn record(
        &mut self,
        user_turn: ChatMessage,
        content: &str,
    ) -> Result<Enhancement, QuickPromptsError> {
        let text = content.trim();
        if text.is_empty() {
            return Err(QuickPromptsError::MalformedResponse(
                "No enhancement content returned from API".to_string(),
            ));
        }

        let mut history = std::mem::take(&mut self.history);
        history.push(user_turn);
        history.push(ChatMessage::assistant(text));
        self.history = prune(history);
        self.last_enhancement = Some(text.to_string());

        Ok(Enhancement {
            text: text.to_string(),
            history: self.history.clone(),
        })
    }

    /// Run one refinement against the API. The first call frames the
    /// original prompt; later calls send `feedback`, or ask for a different
    /// angle when there is none. On failure the session is unchanged.
    pub async fn refine(
        &mut self,
        client: &OpenAiClient,
        api_key: &str,
        model: &str,
        feedback: Option<&str>,
    ) -> Result<Enhancement, QuickPromptsError> {
        if api_key.trim().is_empty() {
            return Err(QuickPromptsError::Configuration(
                "API Key not provided".to_string(),
            ));
        }
        if model.trim().is_empty() {
            return Err(QuickPromptsError::Configuration(
                "Model ID not selected".to_string(),
            ));
        }

        let user_turn = self.next_user_turn(feedback);
        let messages = self.messages_with(user_turn.clone());
        let descriptor = registry::lookup(model);
        let body = models::build(
            &descriptor,
            &messages,
            Some(ENHANCE_TOKENS),
            Some(&enhance_extras()),
        );

        let content = client
            .chat_completion(api_key, &body)
            .await
            .inspect_err(|e| tracing::warn!(model, "enhancement failed: {e}"))?;

        self.record(user_turn, &content)
    }
}

/// Dialogues kept at once; the least recently used is dropped beyond this.
pub const MAX_SESSIONS: usize = 64;

pub type SharedSession = Arc<Mutex<EnhancementSession>>;

struct CachedSession {
    last_used: u64,
    session: SharedSession,
}

/// Enhancement dialogues by caller key, bounded to [`MAX_SESSIONS`].
#[derive(Default)]
pub struct SessionCache {
    entries: HashMap<String, CachedSession>,
    clock: u64,
}

impl SessionCache {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    pub fn get(&mut self, key: &str) -> Option<SharedSession> {
        let now = self.tick();
        let entry = self.entries.get_mut(key)?;
        entry.last_used = now;
        Some(entry.session.clone())
    }

    /// Store a new dialogue under `key`, replacing any previous one.
    pub fn insert(&mut self, key: &str, session: EnhancementSession) -> SharedSession {
        if self.entries.len() >= MAX_SESSIONS && !self.entries.contains_key(key) {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|(_, e)| e.last_used)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                tracing::debug!(session = %oldest, "evicting least recently used enhancement session");
                self.entries.remove(&oldest);
            }
        }

        let session = Arc::new(Mutex::new(session));
        let last_used = self.tick();
        self.entries.insert(
            key.to_string(),
            CachedSession {
                last_used,
                session: session.clone(),
            },
        );
        session
    }

    pub fn remove(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn enhance_extras() -> Map<String, Value> {
    let mut extras = Map::new();
    extras.insert("temperature".to_string(), json!(ENHANCE_TEMPERATURE));
    extras
}

/// Keep the most recent [`MAX_HISTORY`] messages.
pub fn prune(mut history: Vec<HistoryItem>) -> Vec<HistoryItem> {
    if history.len() > MAX_HISTORY {
        history.drain(..history.len() - MAX_HISTORY);
    }
    history
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_turn_frames_original() {
        let session = EnhancementSession::start("write a poem");
        let messages = session.next_messages(Some("ignored on first call"));
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[1], ChatMessage::user("Enhance this prompt: write a poem"));
    }

    #[test]
    fn feedback_and_default_directive() {
        let mut session = EnhancementSession::start("p");
        let turn = session.next_messages(None).pop().unwrap();
        session.record(turn, "better p").unwrap();

        let with_feedback = session.next_messages(Some("shorter please"));
        assert_eq!(with_feedback.len(), 4);
        assert_eq!(with_feedback[3], ChatMessage::user("shorter please"));

        let without = session.next_messages(Some("   "));
        assert_eq!(without[3], ChatMessage::user(REGENERATE_DIRECTIVE));
    }

    #[test]
    fn history_is_pruned_to_four() {
        let mut session = EnhancementSession::start("p");
        for i in 0..5 {
            let turn = session.next_messages(Some(&format!("fb {i}"))).pop().unwrap();
            let result = session.record(turn, &format!("answer {i}")).unwrap();
            assert!(result.history.len() <= MAX_HISTORY);
        }
        let history = session.history();
        assert_eq!(history.len(), 4);
        assert_eq!(history[0], ChatMessage::user("fb 3"));
        assert_eq!(history[3], ChatMessage::assistant("answer 4"));
        assert!(history.iter().all(|m| m.role != Role::System));
        assert_eq!(session.last_enhancement(), Some("answer 4"));
    }

    #[test]
    fn empty_content_is_failure() {
        let mut session = EnhancementSession::start("p");
        let turn = session.next_messages(None).pop().unwrap();
        let err = session.record(turn, "  \n").unwrap_err();
        assert!(matches!(err, QuickPromptsError::MalformedResponse(_)));
        assert!(session.history().is_empty());
        assert_eq!(session.last_enhancement(), None);
    }

    #[test]
    fn content_is_trimmed() {
        let mut session = EnhancementSession::start("p");
        let turn = session.next_messages(None).pop().unwrap();
        let result = session.record(turn, "\n  improved \n").unwrap();
        assert_eq!(result.text, "improved");
        assert_eq!(result.history[1], ChatMessage::assistant("improved"));
    }

    #[test]
    fn resume_drops_system_and_prunes() {
        let history = vec![
            ChatMessage::system("old preamble"),
            ChatMessage::user("u1"),
            ChatMessage::assistant("a1"),
            ChatMessage::user("u2"),
            ChatMessage::assistant("a2"),
            ChatMessage::user("u3"),
        ];
        let session = EnhancementSession::resume("p", history);
        assert_eq!(session.history().len(), 4);
        assert_eq!(session.history()[0], ChatMessage::assistant("a1"));
        assert_eq!(session.last_enhancement(), Some("a2"));
    }

    #[test]
    fn session_cache_evicts_least_recently_used() {
        let mut cache = SessionCache::default();
        for i in 0..MAX_SESSIONS {
            cache.insert(&format!("s{i}"), EnhancementSession::start("p"));
        }
        assert_eq!(cache.len(), MAX_SESSIONS);

        assert!(cache.get("s0").is_some());
        cache.insert("fresh", EnhancementSession::start("p"));

        assert_eq!(cache.len(), MAX_SESSIONS);
        assert!(cache.get("s0").is_some());
        assert!(cache.get("s1").is_none());
        assert!(cache.get("fresh").is_some());
    }

    #[test]
    fn session_cache_replaces_and_removes() {
        let mut cache = SessionCache::default();
        cache.insert("k", EnhancementSession::start("first"));
        cache.insert("k", EnhancementSession::start("second"));
        assert_eq!(cache.len(), 1);
        let session = cache.get("k").unwrap();
        assert_eq!(session.try_lock().unwrap().original(), "second");

        assert!(cache.remove("k"));
        assert!(!cache.remove("k"));
        assert!(cache.is_empty());
    }

    #[test]
    fn prune_keeps_short_history() {
        let h = vec![ChatMessage::user("a"), ChatMessage::assistant("b")];
        assert_eq!(prune(h.clone()), h);
    }
}
