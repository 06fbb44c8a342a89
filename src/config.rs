//! Configuration types for the sidequest orchestrator.
//!
//! Everything is static at startup: the file is read once, environment
//! overrides are applied, and the resulting [`OverlayConfig`] is handed to
//! each component by value or reference.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable consulted when `inference.api_key` is empty.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    /// Per-kind timers and cooldowns.
    pub schedule: ScheduleConfig,
    /// Inference provider settings.
    pub inference: InferenceConfig,
    /// Screen capture settings.
    pub capture: CaptureConfig,
    /// Prompt text per job kind.
    pub prompts: PromptConfig,
    /// Text-to-speech settings.
    pub speech: SpeechConfig,
    /// Status HTTP boundary settings.
    pub status: StatusConfig,
}

/// Job timing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Period of the narration clock.
    pub narration_interval_secs: u64,
    /// How often quest generation eligibility is evaluated.
    pub quest_poll_secs: u64,
    /// Age after which an active quest is replaced by a new one.
    pub quest_interval_secs: u64,
    /// Period of the quest-check clock.
    pub quest_check_interval_secs: u64,
    /// Minimum spacing between two villager dispatches.
    pub villager_cooldown_secs: u64,
    /// Delay before generating a new quest after one completes.
    pub quest_reseed_delay_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            narration_interval_secs: 5,
            quest_poll_secs: 60,
            quest_interval_secs: 5 * 60,
            quest_check_interval_secs: 15,
            villager_cooldown_secs: 30,
            quest_reseed_delay_secs: 5,
        }
    }
}

impl ScheduleConfig {
    pub fn narration_interval(&self) -> Duration {
        Duration::from_secs(self.narration_interval_secs.max(1))
    }

    pub fn quest_poll(&self) -> Duration {
        Duration::from_secs(self.quest_poll_secs.max(1))
    }

    pub fn quest_interval(&self) -> Duration {
        Duration::from_secs(self.quest_interval_secs)
    }

    pub fn quest_check_interval(&self) -> Duration {
        Duration::from_secs(self.quest_check_interval_secs.max(1))
    }

    pub fn villager_cooldown(&self) -> Duration {
        Duration::from_secs(self.villager_cooldown_secs)
    }

    pub fn quest_reseed_delay(&self) -> Duration {
        Duration::from_secs(self.quest_reseed_delay_secs)
    }
}

/// Inference provider configuration (Gemini `generateContent` API).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// API base URL, without the `/v1beta` suffix.
    pub base_url: String,
    /// Model identifier.
    pub model: String,
    /// API key. Leave empty to read [`API_KEY_ENV`] at startup.
    pub api_key: String,
    /// System instruction sent with every request.
    pub system_instruction: String,
    /// Upper bound on a single inference call.
    pub timeout_secs: u64,
    /// JPEG quality used when encoding frames for upload (1-100).
    pub jpeg_quality: u8,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com".to_owned(),
            model: "gemini-2.5-flash".to_owned(),
            api_key: String::new(),
            system_instruction: "You are an AI assistant for a live video game overlay. \
                 Provide real-time, accurate commentary. Do NOT hallucinate objects not visible."
                .to_owned(),
            timeout_secs: 30,
            jpeg_quality: 80,
        }
    }
}

impl InferenceConfig {
    /// Returns the configured API key, falling back to [`API_KEY_ENV`].
    pub fn effective_api_key(&self) -> Option<String> {
        resolve_key(&self.api_key, std::env::var(API_KEY_ENV).ok().as_deref())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

/// Pick the configured key, else the environment value. Both are trimmed
/// and blank values count as missing.
pub fn resolve_key(configured: &str, env_value: Option<&str>) -> Option<String> {
    [Some(configured), env_value]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|k| !k.is_empty())
        .map(str::to_owned)
}

/// Where frames come from.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureBackend {
    /// Run a screenshot command that writes PNG to stdout.
    #[default]
    Command,
    /// Re-read an image file on every capture.
    File,
}

/// Screen capture configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Frame source.
    pub backend: CaptureBackend,
    /// Target frame width after resizing.
    pub width: u32,
    /// Target frame height after resizing.
    pub height: u32,
    /// Screenshot program (None = auto-detect).
    pub command: Option<String>,
    /// Arguments for `command`. Ignored when the command is auto-detected.
    pub args: Vec<String>,
    /// Image path for the `file` backend.
    pub image_path: Option<PathBuf>,
    /// Upper bound on one capture; a screenshot program still running is killed.
    pub timeout_secs: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            backend: CaptureBackend::default(),
            width: 960,
            height: 540,
            command: None,
            args: Vec::new(),
            image_path: None,
            timeout_secs: 10,
        }
    }
}

impl CaptureConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

/// Prompt text per job kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    pub narration: String,
    pub quest: String,
    pub villager: String,
    /// Quest-check prompt; `{quest}` is replaced with the active quest text.
    pub quest_check: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            narration: "Describe what's happening in this game in 1-2 sentences.".to_owned(),
            quest: "Create ONE short quest based on this screenshot.".to_owned(),
            villager: "Say ONE short line as an NPC reacting to this scene".to_owned(),
            quest_check: "Quest: '{quest}'. Is it completed? \
                          Answer 'YES - reason' or 'NO - reason'."
                .to_owned(),
        }
    }
}

/// Text-to-speech configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// Whether results are spoken at all.
    pub enabled: bool,
    /// Speaking rate in words per minute.
    pub rate: u32,
    /// TTS program (None = first of [`crate::speech::TTS_PROGRAMS`] on `PATH`).
    pub command: Option<String>,
    /// Also speak every narration result.
    pub narrate: bool,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rate: 170,
            command: None,
            narrate: false,
        }
    }
}

/// Status boundary configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusConfig {
    /// Bind host.
    pub host: String,
    /// Bind port (0 = auto-assign).
    pub port: u16,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_owned(),
            port: 8000,
        }
    }
}

impl OverlayConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::error::OverlayError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::OverlayError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `~/.config/sidequest/config.toml`.
    pub fn default_config_path() -> PathBuf {
        if let Some(config) = std::env::var_os("XDG_CONFIG_HOME") {
            PathBuf::from(config).join("sidequest").join("config.toml")
        } else if let Some(config) = dirs::config_dir() {
            config.join("sidequest").join("config.toml")
        } else {
            PathBuf::from("/tmp/sidequest-config/config.toml")
        }
    }

    /// Check values that would make the scheduler misbehave.
    ///
    /// # Errors
    ///
    /// Returns [`OverlayError::Config`](crate::error::OverlayError::Config)
    /// describing the first invalid field.
    pub fn validate(&self) -> crate::error::Result<()> {
        use crate::error::OverlayError;

        if self.capture.width == 0 || self.capture.height == 0 {
            return Err(OverlayError::Config(
                "capture.width and capture.height must be non-zero".into(),
            ));
        }
        if self.capture.backend == CaptureBackend::File && self.capture.image_path.is_none() {
            return Err(OverlayError::Config(
                "capture.image_path is required for the file backend".into(),
            ));
        }
        if !(1..=100).contains(&self.inference.jpeg_quality) {
            return Err(OverlayError::Config(
                "inference.jpeg_quality must be between 1 and 100".into(),
            ));
        }
        if !self.prompts.quest_check.contains("{quest}") {
            return Err(OverlayError::Config(
                "prompts.quest_check must contain the {quest} placeholder".into(),
            ));
        }
        Ok(())
    }
}
