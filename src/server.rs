use std::sync::Arc;
use std::time::Instant;

use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{CallToolResult, Implementation, ServerCapabilities, ServerInfo};
use rmcp::{ErrorData as McpError, ServerHandler, tool, tool_handler, tool_router};
use tokio::sync::Mutex;

use crate::categorize;
use crate::config::Config;
use crate::dispatch::http::OpenAiClient;
use crate::enhance::{EnhancementSession, SessionCache, SharedSession};
use crate::error::QuickPromptsError;
use crate::models::registry;
use crate::response::{ToolMetadata, ToolResponse};
use crate::store::{self, PromptStore, Settings, SettingsPatch};
use crate::tools::enhance::{EnhanceRequest, EnhanceResponse};
use crate::tools::listmodels::ListModelsResponse;
use crate::tools::prompts::{DeletePromptRequest, FileRequest, SavePromptRequest};
use crate::tools::settings::SettingsView;
use crate::tools::suggest::{SuggestRequest, SuggestResponse};

#[derive(Clone)]
pub struct QuickPromptsServer {
    store: Arc<PromptStore>,
    client: Arc<OpenAiClient>,
    config: Arc<Config>,
    /// One dialogue per key; the inner lock serializes refinements of it.
    sessions: Arc<Mutex<SessionCache>>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl QuickPromptsServer {
    pub fn new(config: Config) -> Self {
        let store = Arc::new(PromptStore::in_dir(&config.data_dir));
        let client = Arc::new(OpenAiClient::new(&config.api_base, config.request_timeout));
        Self {
            store,
            client,
            config: Arc::new(config),
            sessions: Arc::new(Mutex::new(SessionCache::default())),
            tool_router: Self::tool_router(),
        }
    }

    pub fn store(&self) -> &PromptStore {
        &self.store
    }

    /// Stored API key, or the environment fallback.
    fn api_key(&self, settings: &Settings) -> Option<String> {
        settings
            .api_key()
            .map(str::to_string)
            .or_else(|| self.config.fallback_api_key.clone())
    }

    /// Request override, then stored selection, then the configured default.
    fn model(&self, settings: &Settings, requested: Option<&str>) -> Option<String> {
        requested
            .filter(|m| !m.trim().is_empty())
            .or(settings.model())
            .or(self.config.default_model.as_deref())
            .map(str::to_string)
    }

    #[tool(
        name = "list_prompts",
        description = "List all stored prompts in order.",
        annotations(read_only_hint = true)
    )]
    async fn list_prompts(&self) -> Result<CallToolResult, McpError> {
        let start = Instant::now();
        let doc = self.store.load().await;
        Ok(ToolResponse::json(
            &doc.prompts,
            ToolMetadata::new("list_prompts", "none", start.elapsed().as_secs_f64()),
        )
        .into_call_tool_result())
    }

    #[tool(
        name = "save_prompt",
        description = "Create a prompt, or replace the prompt with the given id. Returns the stored prompt."
    )]
    async fn save_prompt(
        &self,
        Parameters(req): Parameters<SavePromptRequest>,
    ) -> Result<CallToolResult, McpError> {
        let start = Instant::now();
        if req.text.trim().is_empty() {
            return Err(McpError::invalid_params("text must not be empty", None));
        }

        let prompt = req.into_prompt();
        let stored = prompt.clone();
        let result = self
            .store
            .update_prompts(move |prompts| {
                match prompts.iter_mut().find(|p| p.id == stored.id) {
                    Some(existing) => *existing = stored,
                    None => prompts.push(stored),
                }
                ((), true)
            })
            .await;

        let metadata = ToolMetadata::new("save_prompt", "none", start.elapsed().as_secs_f64());
        let response = match result {
            Ok(()) => ToolResponse::json(&prompt, metadata),
            Err(e) => {
                log_failure("save_prompt", &e);
                ToolResponse::error(e.user_message(), metadata)
            }
        };
        Ok(response.into_call_tool_result())
    }

    #[tool(name = "delete_prompt", description = "Delete the prompt with the given id.")]
    async fn delete_prompt(
        &self,
        Parameters(req): Parameters<DeletePromptRequest>,
    ) -> Result<CallToolResult, McpError> {
        let start = Instant::now();
        let id = req.id.clone();
        let result = self
            .store
            .update_prompts(move |prompts| {
                let before = prompts.len();
                prompts.retain(|p| p.id != id);
                let removed = prompts.len() != before;
                (removed, removed)
            })
            .await;

        let metadata = ToolMetadata::new("delete_prompt", "none", start.elapsed().as_secs_f64());
        let response = match result {
            Ok(true) => {
                self.sessions.lock().await.remove(&req.id);
                ToolResponse::success(format!("Deleted {}", req.id), metadata)
            }
            Ok(false) => {
                return Err(McpError::invalid_params(
                    format!("no prompt with id {}", req.id),
                    None,
                ));
            }
            Err(e) => {
                log_failure("delete_prompt", &e);
                ToolResponse::error(e.user_message(), metadata)
            }
        };
        Ok(response.into_call_tool_result())
    }

    #[tool(
        name = "get_settings",
        description = "Read user settings. The API key is reported as set/unset only.",
        annotations(read_only_hint = true)
    )]
    async fn get_settings(&self) -> Result<CallToolResult, McpError> {
        let start = Instant::now();
        let doc = self.store.load().await;
        Ok(ToolResponse::json(
            &SettingsView::from(&doc.user_settings),
            ToolMetadata::new("get_settings", "none", start.elapsed().as_secs_f64()),
        )
        .into_call_tool_result())
    }

    #[tool(
        name = "save_settings",
        description = "Update user settings. Only the fields given are changed; an empty string clears the API key or model."
    )]
    async fn save_settings(
        &self,
        Parameters(patch): Parameters<SettingsPatch>,
    ) -> Result<CallToolResult, McpError> {
        let start = Instant::now();
        let result = self.store.save_settings(patch).await;
        let metadata = ToolMetadata::new("save_settings", "none", start.elapsed().as_secs_f64());
        let response = match result {
            Ok(settings) => ToolResponse::json(&SettingsView::from(&settings), metadata),
            Err(e) => {
                log_failure("save_settings", &e);
                ToolResponse::error(e.user_message(), metadata)
            }
        };
        Ok(response.into_call_tool_result())
    }

    #[tool(
        name = "list_models",
        description = "List models available to the stored API key (vision models excluded), with local capability info.",
        annotations(read_only_hint = true)
    )]
    async fn list_models(&self) -> Result<CallToolResult, McpError> {
        let start = Instant::now();
        let settings = self.store.load().await.user_settings;
        let api_key = self.api_key(&settings).unwrap_or_default();

        let response = match self.client.list_models(&api_key).await {
            Ok(models) => ToolResponse::json(
                &ListModelsResponse::new(&models),
                ToolMetadata::new("list_models", "none", start.elapsed().as_secs_f64()),
            ),
            Err(e) => {
                log_failure("list_models", &e);
                ToolResponse::error(
                    e.user_message(),
                    ToolMetadata::new("list_models", "none", start.elapsed().as_secs_f64()),
                )
            }
        };
        Ok(response.into_call_tool_result())
    }

    #[tool(
        name = "suggest_categories",
        description = "Ask the selected model for one category per stored prompt. Set apply=true to write the categories back."
    )]
    async fn suggest_categories(
        &self,
        Parameters(req): Parameters<SuggestRequest>,
    ) -> Result<CallToolResult, McpError> {
        let start = Instant::now();
        let doc = self.store.load().await;
        let api_key = self.api_key(&doc.user_settings).unwrap_or_default();
        let model = self.model(&doc.user_settings, req.model.as_deref());
        let model_used = model
            .clone()
            .unwrap_or_else(registry::default_categorization_model);

        let selected: Vec<store::Prompt> = match &req.prompt_ids {
            Some(ids) => doc
                .prompts
                .iter()
                .filter(|p| ids.contains(&p.id))
                .cloned()
                .collect(),
            None => doc.prompts.clone(),
        };

        let result = match categorize::suggest(&self.client, &api_key, &selected, model.as_deref())
            .await
        {
            Ok(suggestions) if req.apply.unwrap_or(false) => self
                .store
                .update_prompts(|prompts| {
                    let applied = categorize::apply_suggestions(prompts, &suggestions);
                    (applied, applied > 0)
                })
                .await
                .map(|applied| (suggestions, applied)),
            Ok(suggestions) => Ok((suggestions, 0)),
            Err(e) => Err(e),
        };

        let metadata =
            ToolMetadata::new("suggest_categories", &model_used, start.elapsed().as_secs_f64());
        let response = match result {
            Ok((suggestions, applied)) => ToolResponse::json(
                &SuggestResponse {
                    suggestions,
                    applied,
                },
                metadata,
            ),
            Err(e) => {
                log_failure("suggest_categories", &e);
                ToolResponse::error(e.user_message(), metadata)
            }
        };
        Ok(response.into_call_tool_result())
    }

    #[tool(
        name = "enhance_prompt",
        description = "Rewrite a prompt to be clearer and more effective. Repeat with the same session (or prompt_id) and optional feedback to refine further; reset=true starts over."
    )]
    async fn enhance_prompt(
        &self,
        Parameters(req): Parameters<EnhanceRequest>,
    ) -> Result<CallToolResult, McpError> {
        let start = Instant::now();
        let key = req
            .session_key()
            .ok_or_else(|| McpError::invalid_params("session or prompt_id is required", None))?
            .to_string();

        let doc = self.store.load().await;
        let session = self.session_for(&key, &req, &doc.prompts).await?;

        let api_key = self.api_key(&doc.user_settings).unwrap_or_default();
        let model = self
            .model(&doc.user_settings, req.model.as_deref())
            .unwrap_or_default();

        let result = {
            let mut session = session.lock().await;
            session
                .refine(&self.client, &api_key, &model, req.feedback.as_deref())
                .await
        };

        let metadata = ToolMetadata::new("enhance_prompt", &model, start.elapsed().as_secs_f64());
        let response = match result {
            Ok(enhancement) => ToolResponse::json(
                &EnhanceResponse {
                    session: key,
                    enhanced_prompt: enhancement.text,
                    history: enhancement.history,
                },
                metadata,
            ),
            Err(e) => {
                log_failure("enhance_prompt", &e);
                ToolResponse::error(e.user_message(), metadata)
            }
        };
        Ok(response.into_call_tool_result())
    }

    /// Existing dialogue for `key`, or a new one started from the request
    /// text or the stored prompt.
    async fn session_for(
        &self,
        key: &str,
        req: &EnhanceRequest,
        prompts: &[store::Prompt],
    ) -> Result<SharedSession, McpError> {
        let mut sessions = self.sessions.lock().await;
        if req.reset.unwrap_or(false) {
            sessions.remove(key);
        }
        if let Some(session) = sessions.get(key) {
            return Ok(session);
        }

        let original = match (&req.text, &req.prompt_id) {
            (Some(text), _) if !text.trim().is_empty() => text.clone(),
            (_, Some(id)) => prompts
                .iter()
                .find(|p| &p.id == id)
                .map(|p| p.text.clone())
                .ok_or_else(|| McpError::invalid_params(format!("no prompt with id {id}"), None))?,
            _ => {
                return Err(McpError::invalid_params(
                    "text or prompt_id is required to start a dialogue",
                    None,
                ));
            }
        };

        Ok(sessions.insert(key, EnhancementSession::start(original)))
    }

    #[tool(
        name = "export_prompts",
        description = "Write all stored prompts to a JSON export file at the given path."
    )]
    async fn export_prompts(
        &self,
        Parameters(req): Parameters<FileRequest>,
    ) -> Result<CallToolResult, McpError> {
        let start = Instant::now();
        let path = validate_path(&req.path)?;
        let metadata = ToolMetadata::new("export_prompts", "none", start.elapsed().as_secs_f64());
        let response = match self.store.export_to(&path).await {
            Ok(export) => ToolResponse::success(
                format!("Exported {} prompts to {}", export.prompts.len(), path.display()),
                metadata,
            ),
            Err(e) => {
                log_failure("export_prompts", &e);
                ToolResponse::error(e.user_message(), metadata)
            }
        };
        Ok(response.into_call_tool_result())
    }

    #[tool(
        name = "import_prompts",
        description = "Import prompts from a JSON export file. Prompts whose id already exists are skipped."
    )]
    async fn import_prompts(
        &self,
        Parameters(req): Parameters<FileRequest>,
    ) -> Result<CallToolResult, McpError> {
        let start = Instant::now();
        let path = validate_path(&req.path)?;

        let result = match self.store.import_from(&path).await {
            Ok(import) => {
                self.store
                    .update_prompts(move |prompts| {
                        let existing = std::mem::take(prompts);
                        let (merged, added) = store::merge_imported(existing, import.prompts);
                        *prompts = merged;
                        (added, added > 0)
                    })
                    .await
            }
            Err(e) => Err(e),
        };

        let metadata = ToolMetadata::new("import_prompts", "none", start.elapsed().as_secs_f64());
        let response = match result {
            Ok(0) => ToolResponse::success("No new prompts found to import".to_string(), metadata),
            Ok(added) => ToolResponse::success(
                format!("Successfully imported {added} new prompts"),
                metadata,
            ),
            Err(e @ QuickPromptsError::Validation(_)) => {
                tracing::warn!("import_prompts rejected {}: {e}", path.display());
                ToolResponse::error(e.user_message(), metadata)
            }
            Err(e) => {
                log_failure("import_prompts", &e);
                ToolResponse::error(e.user_message(), metadata)
            }
        };
        Ok(response.into_call_tool_result())
    }
}

/// Upstream trouble is expected now and then; local failures are not.
fn log_failure(tool: &str, e: &QuickPromptsError) {
    if e.is_upstream_facing() {
        tracing::warn!(tool, "{e}");
    } else {
        tracing::error!(tool, "{e}");
    }
}

fn validate_path(raw: &str) -> Result<std::path::PathBuf, McpError> {
    let path = std::path::PathBuf::from(raw.trim());
    if !path.is_absolute() {
        return Err(McpError::invalid_params("path must be absolute", None));
    }
    Ok(path)
}

#[tool_handler]
impl ServerHandler for QuickPromptsServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "quickprompts".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Default::default()
            },
            instructions: Some(
                "QuickPrompts: a library of reusable prompt snippets.\n\n\
                 - `list_prompts`, `save_prompt`, `delete_prompt` manage the library.\n\
                 - `get_settings` / `save_settings` hold the OpenAI key and selected model.\n\
                 - `suggest_categories` asks the model to categorize prompts.\n\
                 - `enhance_prompt` rewrites a prompt; call again with feedback to refine.\n\
                 - `export_prompts` / `import_prompts` move prompts between machines."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}
