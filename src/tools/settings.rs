use serde::Serialize;

use crate::store::Settings;

/// Settings as shown to tool callers. The API key is never echoed back.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsView {
    pub api_key_set: bool,
    /// Last four characters of the key, for recognition.
    pub api_key_hint: Option<String>,
    pub selected_model_id: Option<String>,
    pub debug_mode_enabled: bool,
    pub show_prompt_icons: bool,
    pub global_shortcut: String,
    pub launch_on_startup: bool,
    pub minimize_to_tray: bool,
}

impl From<&Settings> for SettingsView {
    fn from(s: &Settings) -> Self {
        let key = s.api_key();
        Self {
            api_key_set: key.is_some(),
            api_key_hint: key.and_then(key_hint),
            selected_model_id: s.selected_model_id.clone(),
            debug_mode_enabled: s.debug_mode_enabled,
            show_prompt_icons: s.show_prompt_icons,
            global_shortcut: s.global_shortcut.clone(),
            launch_on_startup: s.launch_on_startup,
            minimize_to_tray: s.minimize_to_tray,
        }
    }
}

/// `...abcd` for keys long enough that four characters give nothing away.
fn key_hint(key: &str) -> Option<String> {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return None;
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    Some(format!("...{tail}"))
}
