use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::dispatch::http::DEFAULT_API_BASE;

const DEFAULT_DATA_DIR: &str = ".quickprompts";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;
const CONFIG_FILE: &str = "config.toml";

/// Process configuration. Per-user values (API key, selected model) live in
/// the stored settings; this only covers where and how to reach things.
#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub api_base: String,
    pub request_timeout: Duration,
    /// Model used when the stored settings select none.
    pub default_model: Option<String>,
    /// Used only when the stored settings hold no API key.
    pub fallback_api_key: Option<String>,
}

/// Optional `<data_dir>/config.toml`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    api_base: Option<String>,
    request_timeout_secs: Option<u64>,
    default_model: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            api_base: DEFAULT_API_BASE.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            default_model: None,
            fallback_api_key: None,
        }
    }
}

impl Config {
    /// Defaults, then `config.toml` in the data directory, then environment.
    pub fn load() -> Self {
        let mut config = Config {
            data_dir: env_data_dir().unwrap_or_else(default_data_dir),
            ..Config::default()
        };

        if let Some(file) = read_file_config(&config.data_dir.join(CONFIG_FILE)) {
            config.apply_file(file);
        }
        config.apply_env();
        config
    }

    fn apply_file(&mut self, file: FileConfig) {
        if let Some(base) = file.api_base.filter(|b| !b.trim().is_empty()) {
            self.api_base = base;
        }
        if let Some(secs) = file.request_timeout_secs.filter(|&s| s > 0) {
            self.request_timeout = Duration::from_secs(secs);
        }
        if let Some(model) = file.default_model.filter(|m| !m.trim().is_empty()) {
            self.default_model = Some(model);
        }
    }

    fn apply_env(&mut self) {
        if let Some(base) = env::var("OPENAI_API_BASE")
            .ok()
            .filter(|b| !b.trim().is_empty())
        {
            self.api_base = base;
        }
        if let Ok(raw) = env::var("QUICKPROMPTS_REQUEST_TIMEOUT_SECS") {
            match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => self.request_timeout = Duration::from_secs(secs),
                _ => tracing::warn!("ignoring invalid QUICKPROMPTS_REQUEST_TIMEOUT_SECS={raw:?}"),
            }
        }
        self.fallback_api_key = env::var("OPENAI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty());
    }
}

fn read_file_config(path: &Path) -> Option<FileConfig> {
    let raw = std::fs::read_to_string(path).ok()?;
    match toml::from_str::<FileConfig>(&raw) {
        Ok(file) => {
            tracing::info!("loaded config from {}", path.display());
            Some(file)
        }
        Err(e) => {
            tracing::warn!("ignoring malformed {}: {e}", path.display());
            None
        }
    }
}

fn env_data_dir() -> Option<PathBuf> {
    env::var("QUICKPROMPTS_DATA_DIR")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
}

/// `$HOME/.quickprompts`, or a relative `.quickprompts` when HOME is unset.
fn default_data_dir() -> PathBuf {
    env::var_os("HOME")
        .map(|home| PathBuf::from(home).join(DEFAULT_DATA_DIR))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
}
