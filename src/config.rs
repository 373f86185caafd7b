//! Configuration persistence for ocrbox settings

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::capture::ocr::OcrOptions;
use crate::chat::{ChatSettings, DEFAULT_ENDPOINT};
use crate::domain::{DEFAULT_MIN_SELECTION_SIZE, Region};
use crate::widget::region_overlay::DEFAULT_BAR_THICKNESS;

pub const CONFIG_FILE_NAME: &str = "config.json";
const APP_DIR: &str = "ocrbox";

/// Keys written by older releases. Ignored without a warning.
const LEGACY_KEYS: &[&str] = &[
    "ocr_engine",
    "tesseract_cmd",
    "log_path",
    "auto_copy_answer_to_clipboard",
    "auto_copy_ocr_text_to_clipboard",
    "region_mode",
    "window_title_contains",
    "use_client_area",
    "relative_region",
    "hotkey_select_region",
    "hotkey_ocr_only",
    "hotkey_send_to_chatgpt",
    "hotkey_quit",
    "max_completion_tokens",
];

/// Application configuration persisted between sessions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Region to capture, in desktop coordinates
    pub region: Option<Region>,
    /// Whether the outline around the region is shown
    pub show_region_overlay: bool,
    /// Outline edge thickness in pixels
    pub overlay_thickness: i32,
    /// Drags smaller than this (either side) are cancelled
    pub min_selection_size: i32,

    pub ocr_lang: String,
    /// Light blur before recognition, tuned for formulas
    pub ocr_math_mode: bool,
    pub ocr_adaptive: bool,
    pub ocr_block: u32,
    pub ocr_c: i32,

    /// Name of the environment variable holding the API key
    pub openai_api_env: String,
    pub openai_base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub system_prompt: String,

    /// Answer simple arithmetic locally instead of asking the model
    pub solve_simple_math_locally: bool,
    /// Reduce model replies to their final number (or last line)
    pub final_answer_only: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            region: None,
            show_region_overlay: false,
            overlay_thickness: DEFAULT_BAR_THICKNESS,
            min_selection_size: DEFAULT_MIN_SELECTION_SIZE,
            ocr_lang: "eng".to_string(),
            ocr_math_mode: false,
            ocr_adaptive: false,
            ocr_block: 25,
            ocr_c: 10,
            openai_api_env: "OPENAI_API_KEY".to_string(),
            openai_base_url: DEFAULT_ENDPOINT.to_string(),
            model: "gpt-5".to_string(),
            max_tokens: 256,
            system_prompt: "You are a helpful assistant. Be concise and accurate. \
                            When solving, show working only if needed."
                .to_string(),
            solve_simple_math_locally: false,
            final_answer_only: false,
        }
    }
}

impl Config {
    /// `./config.json` when present, else the per-user config directory
    pub fn default_path() -> PathBuf {
        let local = PathBuf::from(CONFIG_FILE_NAME);
        if local.exists() {
            return local;
        }
        match dirs::config_dir() {
            Some(dir) => dir.join(APP_DIR).join(CONFIG_FILE_NAME),
            None => local,
        }
    }

    /// Load configuration from disk, or return defaults if unavailable.
    ///
    /// Unknown keys are reported once and skipped, a key with a bad value
    /// keeps its default, and a file that is not a JSON object falls back
    /// to defaults entirely.
    pub fn load(path: &Path) -> Self {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                log::info!("No config at {}, using defaults", path.display());
                return Self::default();
            }
            Err(err) => {
                log::warn!("Could not read {}, using defaults: {err}", path.display());
                return Self::default();
            }
        };

        match Self::from_json(&text) {
            Ok(config) => config,
            Err(err) => {
                log::warn!("Error loading config, using defaults: {err:#}");
                Self::default()
            }
        }
    }

    /// Merge the file's keys over the defaults one at a time, so a bad
    /// value only costs that key.
    fn from_json(text: &str) -> anyhow::Result<Self> {
        let data: Map<String, Value> =
            serde_json::from_str(text).context("config is not a JSON object")?;

        let mut merged = default_map()?;
        let mut unknown = Vec::new();
        for (key, value) in data {
            let Some(default) = merged.get(&key).cloned() else {
                if !LEGACY_KEYS.contains(&key.as_str()) {
                    unknown.push(key);
                }
                continue;
            };
            merged.insert(key.clone(), value);
            if let Err(err) = serde_json::from_value::<Self>(Value::Object(merged.clone())) {
                log::warn!("Invalid config value for {key:?}, using the default: {err}");
                merged.insert(key, default);
            }
        }
        if !unknown.is_empty() {
            log::warn!("Ignoring unknown config keys: {unknown:?}");
        }

        serde_json::from_value(Value::Object(merged)).context("invalid config value")
    }

    /// Save configuration to disk
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
        log::debug!("Saved config to {}", path.display());
        Ok(())
    }

    pub fn ocr_options(&self) -> OcrOptions {
        OcrOptions {
            language: self.ocr_lang.clone(),
            math_mode: self.ocr_math_mode,
            adaptive_threshold: self.ocr_adaptive,
            block_size: self.ocr_block,
            threshold_constant: self.ocr_c,
        }
    }

    pub fn chat_settings(&self) -> ChatSettings {
        ChatSettings {
            api_key_env: self.openai_api_env.clone(),
            endpoint: self.openai_base_url.clone(),
            model: self.model.clone(),
        }
    }
}

fn default_map() -> anyhow::Result<Map<String, Value>> {
    match serde_json::to_value(Config::default())? {
        Value::Object(map) => Ok(map),
        other => anyhow::bail!("default config serialized to {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(Config::load(&dir.path().join("nope.json")), Config::default());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);
        let config = Config {
            region: Some(Region::new(-100, 20, 300, 40)),
            show_region_overlay: true,
            ocr_adaptive: true,
            model: "gpt-4o".to_string(),
            ..Config::default()
        };
        config.save(&path).unwrap();

        let raw: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["region"], serde_json::json!([-100, 20, 300, 40]));
        assert_eq!(Config::load(&path), config);
    }

    #[test]
    fn unknown_and_legacy_keys_are_ignored() {
        let config = Config::from_json(
            r#"{"region": [1, 2, 30, 40], "hotkey_quit": "ctrl+q", "colour": "teal", "ocr_c": 7}"#,
        )
        .unwrap();
        assert_eq!(config.region, Some(Region::new(1, 2, 30, 40)));
        assert_eq!(config.ocr_c, 7);
        assert_eq!(config.model, "gpt-5");
    }

    #[test]
    fn missing_keys_take_defaults() {
        let config = Config::from_json(r#"{"show_region_overlay": true}"#).unwrap();
        assert!(config.show_region_overlay);
        assert_eq!(config.overlay_thickness, 2);
        assert_eq!(config.min_selection_size, 5);
        assert_eq!(config.region, None);
    }

    #[test]
    fn malformed_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(Config::load(&path), Config::default());

        std::fs::write(&path, "[1, 2]").unwrap();
        assert_eq!(Config::load(&path), Config::default());
    }

    #[test]
    fn bad_value_only_resets_its_own_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(
            &path,
            r#"{"region":[100,200,640,120],"show_region_overlay":true,"max_tokens":"300"}"#,
        )
        .unwrap();

        let config = Config::load(&path);
        assert_eq!(config.region, Some(Region::new(100, 200, 640, 120)));
        assert!(config.show_region_overlay);
        assert_eq!(config.max_tokens, Config::default().max_tokens);

        // Saving what was loaded keeps the region
        config.save(&path).unwrap();
        assert_eq!(
            Config::load(&path).region,
            Some(Region::new(100, 200, 640, 120))
        );
    }

    #[test]
    fn region_without_area_is_dropped() {
        let config =
            Config::from_json(r#"{"region":[10,10,0,-4],"ocr_block":31}"#).unwrap();
        assert_eq!(config.region, None);
        assert_eq!(config.ocr_block, 31);

        let config = Config::from_json(r#"{"region":[10,10,5]}"#).unwrap();
        assert_eq!(config.region, None);
    }

    #[test]
    fn default_map_covers_every_field() {
        let keys = default_map().unwrap();
        assert!(keys.contains_key("region"));
        assert!(keys.contains_key("final_answer_only"));
        assert_eq!(keys.len(), 16);
    }

    #[test]
    fn converts_to_collaborator_options() {
        let config = Config {
            ocr_lang: "deu".to_string(),
            ocr_block: 31,
            ..Config::default()
        };
        let ocr = config.ocr_options();
        assert_eq!(ocr.language, "deu");
        assert_eq!(ocr.block_size, 31);
        assert_eq!(ocr.threshold_constant, 10);
        assert_eq!(config.chat_settings().model, "gpt-5");
    }
}
