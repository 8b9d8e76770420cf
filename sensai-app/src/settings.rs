//! Persistent application settings (JSON file in app data directory).
//!
//! `SENSAI_*` environment variables override the file for the current run
//! only; they are never written back.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use sensai_core::mode::DEFAULT_WAKE_PHRASE;
use sensai_core::speech::DEFAULT_SPEECH_LANG;
use sensai_core::{CenterPolicy, CoordinatorConfig, RemoteCleanupConfig, RuntimeConfig};

const DEFAULT_CLEANUP_MODEL: &str = "gpt-4o-mini";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct AppSettings {
    pub wake_phrase: String,
    pub growth_factor: f32,
    /// `"full"` or `"half"`.
    pub center_policy: String,
    pub center_margin_px: f32,
    pub min_detection_score: f32,
    pub cycle_cooldown_ms: u64,
    pub utterance_debounce_ms: u64,
    pub extraction_timeout_ms: u64,
    pub notification_ttl_ms: u64,
    pub vision_interval_ms: u64,
    pub speech_lang: String,
    /// Pace of the console speech stand-in.
    pub speech_word_interval_ms: u64,
    pub voice_commands_enabled: bool,
    /// Text returned by the placeholder OCR stage.
    pub placeholder_ocr_text: String,
    pub cleanup_opt_in: bool,
    pub cleanup_api_key: Option<String>,
    pub cleanup_endpoint: Option<String>,
    pub cleanup_model: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            wake_phrase: DEFAULT_WAKE_PHRASE.into(),
            growth_factor: 1.10,
            center_policy: "full".into(),
            center_margin_px: 0.0,
            min_detection_score: 0.5,
            cycle_cooldown_ms: 3_000,
            utterance_debounce_ms: 1_000,
            extraction_timeout_ms: 5_000,
            notification_ttl_ms: 3_000,
            vision_interval_ms: 200,
            speech_lang: DEFAULT_SPEECH_LANG.into(),
            speech_word_interval_ms: 120,
            voice_commands_enabled: true,
            placeholder_ocr_text: "EXIT".into(),
            cleanup_opt_in: false,
            cleanup_api_key: None,
            cleanup_endpoint: None,
            cleanup_model: DEFAULT_CLEANUP_MODEL.into(),
        }
    }
}

impl AppSettings {
    pub fn normalize(&mut self) {
        self.wake_phrase = normalize_wake_phrase(&self.wake_phrase);
        self.growth_factor = self.growth_factor.clamp(1.0, 3.0);
        self.center_policy = normalize_center_policy(&self.center_policy);
        self.center_margin_px = self.center_margin_px.clamp(0.0, 1_000.0);
        self.min_detection_score = self.min_detection_score.clamp(0.0, 1.0);
        self.cycle_cooldown_ms = self.cycle_cooldown_ms.min(60_000);
        self.utterance_debounce_ms = self.utterance_debounce_ms.min(10_000);
        self.extraction_timeout_ms = self.extraction_timeout_ms.clamp(500, 60_000);
        self.notification_ttl_ms = self.notification_ttl_ms.clamp(500, 30_000);
        self.vision_interval_ms = self.vision_interval_ms.clamp(33, 5_000);
        self.speech_lang = normalize_speech_lang(&self.speech_lang);
        self.speech_word_interval_ms = self.speech_word_interval_ms.min(2_000);
        if self.placeholder_ocr_text.trim().is_empty() {
            self.placeholder_ocr_text = "EXIT".into();
        }
        self.cleanup_api_key = trimmed_non_empty(self.cleanup_api_key.as_deref());
        self.cleanup_endpoint = trimmed_non_empty(self.cleanup_endpoint.as_deref());
        if self.cleanup_model.trim().is_empty() {
            self.cleanup_model = DEFAULT_CLEANUP_MODEL.into();
        }
    }

    /// Apply `SENSAI_*` overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(phrase) = lookup("SENSAI_WAKE_PHRASE") {
            self.wake_phrase = phrase;
        }
        if let Some(lang) = lookup("SENSAI_SPEECH_LANG") {
            self.speech_lang = lang;
        }
        if let Some(key) = lookup("SENSAI_CLEANUP_API_KEY") {
            self.cleanup_api_key = Some(key);
            self.cleanup_opt_in = true;
        }
        if let Some(endpoint) = lookup("SENSAI_CLEANUP_ENDPOINT") {
            self.cleanup_endpoint = Some(endpoint);
        }
        if let Some(flag) = lookup("SENSAI_VOICE_COMMANDS") {
            self.voice_commands_enabled = !matches!(flag.trim(), "0" | "false" | "off");
        }
        self.normalize();
    }

    pub fn coordinator_config(&self) -> CoordinatorConfig {
        let center_policy = match self.center_policy.as_str() {
            "half" => CenterPolicy::HalfCenter,
            _ => CenterPolicy::FullCenter {
                margin_px: self.center_margin_px,
            },
        };
        CoordinatorConfig {
            wake_phrase: self.wake_phrase.clone(),
            growth_factor: self.growth_factor,
            center_policy,
            min_detection_score: self.min_detection_score,
            cycle_cooldown: Duration::from_millis(self.cycle_cooldown_ms),
            utterance_debounce: Duration::from_millis(self.utterance_debounce_ms),
            extraction_timeout: Duration::from_millis(self.extraction_timeout_ms),
            notification_ttl: Duration::from_millis(self.notification_ttl_ms),
            speech_lang: self.speech_lang.clone(),
        }
    }

    pub fn runtime_config(&self) -> RuntimeConfig {
        RuntimeConfig {
            vision_interval: Duration::from_millis(self.vision_interval_ms),
            ..RuntimeConfig::default()
        }
    }

    /// `None` unless the user opted in and a key is available.
    pub fn remote_cleanup_config(&self) -> Option<RemoteCleanupConfig> {
        if !self.cleanup_opt_in {
            return None;
        }
        let key = self.cleanup_api_key.as_ref()?;
        let mut config = RemoteCleanupConfig::new(key.clone());
        if let Some(endpoint) = self.cleanup_endpoint.as_ref() {
            config.endpoint = endpoint.clone();
        }
        config.model = self.cleanup_model.clone();
        Some(config)
    }
}

pub fn normalize_wake_phrase(raw: &str) -> String {
    let phrase = raw
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ");
    if phrase.is_empty() {
        DEFAULT_WAKE_PHRASE.into()
    } else {
        phrase
    }
}

pub fn normalize_center_policy(raw: &str) -> String {
    match raw.trim().to_ascii_lowercase().as_str() {
        "half" | "half-center" | "half_center" | "strict" => "half".into(),
        _ => "full".into(),
    }
}

pub fn normalize_speech_lang(raw: &str) -> String {
    let lang = raw.trim();
    if lang.is_empty() {
        DEFAULT_SPEECH_LANG.into()
    } else {
        lang.into()
    }
}

fn trimmed_non_empty(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

pub fn default_settings_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("SensAI")
            .join("settings.json")
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var_os("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                std::env::var_os("HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("/tmp"))
                    .join(".local")
                    .join("share")
            })
            .join("sensai")
            .join("settings.json")
    }
}

pub fn load_settings(path: &Path) -> AppSettings {
    let mut settings = fs::read_to_string(path)
        .ok()
        .and_then(|raw| serde_json::from_str::<AppSettings>(&raw).ok())
        .unwrap_or_default();
    settings.normalize();
    settings
}

pub fn save_settings(path: &Path, settings: &AppSettings) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(settings).map_err(std::io::Error::other)?;
    fs::write(path, json)
}
