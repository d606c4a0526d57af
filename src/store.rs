use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tokio::sync::Mutex;

use crate::error::QuickPromptsError;

/// Current schema version for the stored and exported documents.
pub const SCHEMA_VERSION: u32 = 1;

/// Category assigned when a prompt's category is blank.
pub const DEFAULT_CATEGORY: &str = "General";

pub const DEFAULT_SHORTCUT: &str = "CommandOrControl+Shift+P";

const STORAGE_FILE: &str = "data.json";

/// A stored snippet. `id` is generated once and never changes.
///
/// Fields are read leniently: a missing or null field is empty, and a
/// number or bool is kept as its text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prompt {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub text: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub category: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub color: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub icon: String,
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null | Value::Array(_) | Value::Object(_) => String::new(),
    })
}

/// Prompt entries of a stored or imported `prompts` array. Entries that
/// are not objects are skipped.
fn prompts_from(items: &[Value]) -> Vec<Prompt> {
    items
        .iter()
        .filter_map(|item| match serde_json::from_value::<Prompt>(item.clone()) {
            Ok(prompt) => Some(prompt),
            Err(e) => {
                tracing::warn!("storage: skipping prompt entry {item}: {e}");
                None
            }
        })
        .collect()
}

impl Prompt {
    /// New prompt with a fresh id. A blank category becomes "General".
    pub fn new(
        name: impl Into<String>,
        text: impl Into<String>,
        category: &str,
        color: impl Into<String>,
        icon: impl Into<String>,
    ) -> Self {
        Self {
            id: new_prompt_id(),
            name: name.into(),
            text: text.into(),
            category: normalized_category(category),
            color: color.into(),
            icon: icon.into(),
        }
    }
}

pub fn new_prompt_id() -> String {
    format!("prompt-{}", uuid::Uuid::new_v4())
}

pub fn normalized_category(category: &str) -> String {
    let trimmed = category.trim();
    if trimmed.is_empty() {
        DEFAULT_CATEGORY.to_string()
    } else {
        trimmed.to_string()
    }
}

/// User settings. Missing keys in the stored document fall back to the
/// defaults below; stored values win.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    #[serde(rename = "openAIApiKey")]
    pub openai_api_key: Option<String>,
    pub selected_model_id: Option<String>,
    pub debug_mode_enabled: bool,
    pub show_prompt_icons: bool,
    pub global_shortcut: String,
    pub launch_on_startup: bool,
    pub minimize_to_tray: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            selected_model_id: None,
            debug_mode_enabled: false,
            show_prompt_icons: true,
            global_shortcut: DEFAULT_SHORTCUT.to_string(),
            launch_on_startup: false,
            minimize_to_tray: true,
        }
    }
}

impl Settings {
    /// The stored key, if set and not blank.
    pub fn api_key(&self) -> Option<&str> {
        self.openai_api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
    }

    /// The selected model, if set and not blank.
    pub fn model(&self) -> Option<&str> {
        self.selected_model_id
            .as_deref()
            .filter(|m| !m.trim().is_empty())
    }

    pub fn apply(&mut self, patch: SettingsPatch) {
        if let Some(v) = patch.openai_api_key {
            self.openai_api_key = Some(v).filter(|k| !k.is_empty());
        }
        if let Some(v) = patch.selected_model_id {
            self.selected_model_id = Some(v).filter(|m| !m.is_empty());
        }
        if let Some(v) = patch.debug_mode_enabled {
            self.debug_mode_enabled = v;
        }
        if let Some(v) = patch.show_prompt_icons {
            self.show_prompt_icons = v;
        }
        if let Some(v) = patch.global_shortcut {
            self.global_shortcut = v;
        }
        if let Some(v) = patch.launch_on_startup {
            self.launch_on_startup = v;
        }
        if let Some(v) = patch.minimize_to_tray {
            self.minimize_to_tray = v;
        }
    }
}

/// Partial settings update. `None` leaves the stored value alone; an empty
/// string clears the API key or model selection.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    /// OpenAI API key. Empty string clears it.
    #[serde(rename = "openAIApiKey")]
    pub openai_api_key: Option<String>,
    /// Model used for categorization and enhancement. Empty string clears it.
    pub selected_model_id: Option<String>,
    pub debug_mode_enabled: Option<bool>,
    pub show_prompt_icons: Option<bool>,
    /// Accelerator string, e.g. "CommandOrControl+Shift+P".
    pub global_shortcut: Option<String>,
    pub launch_on_startup: Option<bool>,
    pub minimize_to_tray: Option<bool>,
}

impl Settings {
    /// Overlay stored settings on the defaults one key at a time. A key
    /// whose value does not fit keeps its default.
    pub fn from_stored(stored: &Value) -> Self {
        let Ok(Value::Object(mut merged)) = serde_json::to_value(Settings::default()) else {
            return Settings::default();
        };
        let Some(stored) = stored.as_object() else {
            return Settings::default();
        };

        for (key, value) in stored {
            let previous = merged.insert(key.clone(), value.clone());
            if serde_json::from_value::<Settings>(Value::Object(merged.clone())).is_err() {
                tracing::warn!(key = %key, "storage: ignoring invalid setting {value}");
                restore(&mut merged, key, previous);
            }
        }
        serde_json::from_value(Value::Object(merged)).unwrap_or_default()
    }
}

fn restore(map: &mut Map<String, Value>, key: &str, previous: Option<Value>) {
    match previous {
        Some(v) => {
            map.insert(key.to_string(), v);
        }
        None => {
            map.remove(key);
        }
    }
}

/// The whole persisted document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageDocument {
    pub version: u32,
    pub prompts: Vec<Prompt>,
    pub user_settings: Settings,
}

impl StorageDocument {
    /// Parse a stored document. Only invalid JSON is an error; missing or
    /// mistyped sections fall back section by section.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(raw)?;
        Ok(Self {
            version: value
                .get("version")
                .and_then(Value::as_u64)
                .and_then(|v| u32::try_from(v).ok())
                .unwrap_or(SCHEMA_VERSION),
            prompts: value
                .get("prompts")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .map(prompts_from)
                .unwrap_or_default(),
            user_settings: value
                .get("userSettings")
                .map(Settings::from_stored)
                .unwrap_or_default(),
        })
    }
}

impl Default for StorageDocument {
    fn default() -> Self {
        Self {
            version: SCHEMA_VERSION,
            prompts: Vec::new(),
            user_settings: Settings::default(),
        }
    }
}

/// Export/import file format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub version: u32,
    #[serde(default)]
    pub exported_at: String,
    pub prompts: Vec<Prompt>,
}

/// JSON file store for prompts and settings.
///
/// Writes replace the whole document via temp file + rename and are
/// serialized through an internal lock. Another process writing the same
/// file still races; the last writer wins.
pub struct PromptStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl PromptStore {
    /// Store backed by `<data_dir>/data.json`.
    pub fn in_dir(data_dir: &Path) -> Self {
        Self::with_path(data_dir.join(STORAGE_FILE))
    }

    pub fn with_path(path: PathBuf) -> Self {
        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the default document if none exists yet.
    pub async fn initialize(&self) -> Result<(), QuickPromptsError> {
        if tokio::fs::try_exists(&self.path).await.unwrap_or(false) {
            return Ok(());
        }
        tracing::info!("storage: first run, creating {}", self.path.display());
        self.save(&StorageDocument::default()).await
    }

    /// Read the document. Any failure yields the defaults.
    pub async fn load(&self) -> StorageDocument {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return StorageDocument::default();
            }
            Err(e) => {
                tracing::warn!("storage: failed to read {}: {e}", self.path.display());
                return StorageDocument::default();
            }
        };

        match StorageDocument::from_json(&raw) {
            Ok(doc) => doc,
            Err(e) => {
                tracing::warn!("storage: failed to parse {}: {e}", self.path.display());
                StorageDocument::default()
            }
        }
    }

    /// Replace the stored document.
    pub async fn save(&self, document: &StorageDocument) -> Result<(), QuickPromptsError> {
        let _lock = self.write_lock.lock().await;
        self.write_document(document).await
    }

    async fn write_document(&self, document: &StorageDocument) -> Result<(), QuickPromptsError> {
        let json = serde_json::to_string_pretty(document).map_err(std::io::Error::other)?;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        atomic_write(&self.path, &json).await?;
        Ok(())
    }

    /// Replace the prompt list, keeping stored settings.
    pub async fn save_prompts(&self, prompts: Vec<Prompt>) -> Result<(), QuickPromptsError> {
        let _lock = self.write_lock.lock().await;
        let mut doc = self.load().await;
        doc.prompts = prompts;
        self.write_document(&doc).await
    }

    /// Load, edit and write the prompt list under the write lock. The
    /// document is written only when `edit` reports a change.
    pub async fn update_prompts<R>(
        &self,
        edit: impl FnOnce(&mut Vec<Prompt>) -> (R, bool),
    ) -> Result<R, QuickPromptsError> {
        let _lock = self.write_lock.lock().await;
        let mut doc = self.load().await;
        let (result, changed) = edit(&mut doc.prompts);
        if changed {
            self.write_document(&doc).await?;
        }
        Ok(result)
    }

    /// Merge a partial update into the stored settings and return the result.
    pub async fn save_settings(&self, patch: SettingsPatch) -> Result<Settings, QuickPromptsError> {
        let _lock = self.write_lock.lock().await;
        let mut doc = self.load().await;
        doc.user_settings.apply(patch);
        self.write_document(&doc).await?;
        Ok(doc.user_settings)
    }

    /// Write the stored prompts to `path` in export format.
    pub async fn export_to(&self, path: &Path) -> Result<ExportDocument, QuickPromptsError> {
        let export = ExportDocument {
            version: SCHEMA_VERSION,
            exported_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            prompts: self.load().await.prompts,
        };
        let json = serde_json::to_string_pretty(&export).map_err(std::io::Error::other)?;
        tokio::fs::write(path, json.as_bytes()).await?;
        tracing::info!(
            "exported {} prompts to {}",
            export.prompts.len(),
            path.display()
        );
        Ok(export)
    }

    /// Read and validate an export file. Does not touch the store.
    pub async fn import_from(&self, path: &Path) -> Result<ExportDocument, QuickPromptsError> {
        let raw = tokio::fs::read_to_string(path).await?;
        parse_import(&raw)
    }
}

/// Structural validation of an import document: `version` must be a
/// positive integer and `prompts` an array. Individual prompts are not
/// validated; entries that are not objects are skipped.
pub fn parse_import(raw: &str) -> Result<ExportDocument, QuickPromptsError> {
    let value: serde_json::Value = serde_json::from_str(raw)
        .map_err(|e| QuickPromptsError::Validation(format!("not valid JSON: {e}")))?;

    let version = match value.get("version") {
        None | Some(serde_json::Value::Null) => {
            return Err(QuickPromptsError::Validation("missing version".to_string()));
        }
        Some(v) => v
            .as_u64()
            .filter(|&v| v > 0)
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| QuickPromptsError::Validation(format!("unsupported version: {v}")))?,
    };

    let prompts = match value.get("prompts") {
        Some(serde_json::Value::Array(items)) => prompts_from(items),
        _ => {
            return Err(QuickPromptsError::Validation(
                "prompts must be an array".to_string(),
            ));
        }
    };

    let exported_at = value
        .get("exportedAt")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();

    Ok(ExportDocument {
        version,
        exported_at,
        prompts,
    })
}

/// Append imported prompts whose id is not already present. Prompts with
/// a blank id get a fresh one. Returns the merged list and the number of
/// prompts added.
pub fn merge_imported(existing: Vec<Prompt>, imported: Vec<Prompt>) -> (Vec<Prompt>, usize) {
    let mut seen: HashSet<String> = existing.iter().map(|p| p.id.clone()).collect();
    let mut merged = existing;
    let mut added = 0;
    for mut prompt in imported {
        if prompt.id.trim().is_empty() {
            prompt.id = new_prompt_id();
        }
        if seen.insert(prompt.id.clone()) {
            merged.push(prompt);
            added += 1;
        }
    }
    (merged, added)
}

async fn atomic_write(path: &Path, content: &str) -> Result<(), std::io::Error> {
    let tmp_path = path.with_extension(format!("tmp.{}", std::process::id()));
    tokio::fs::write(&tmp_path, content.as_bytes()).await?;
    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(e);
    }
    Ok(())
}
