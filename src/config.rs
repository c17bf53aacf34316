use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use tracing::warn;

use crate::dwell::DwellTimings;
use crate::error::{Error, Result};
use crate::layout::GridGeometry;

pub const DEFAULT_PATH: &str = "config.toml";

#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub dwell: DwellConfig,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub grid: GridGeometry,
    #[serde(default)]
    pub suggestions: SuggestionsConfig,
    #[serde(default)]
    pub speech: SpeechConfig,
    #[serde(default)]
    pub ui: UiConfig,
}

// ============================================================================
// Dwell Config
// ============================================================================

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct DwellConfig {
    #[serde(default = "default_key_ms")]
    pub word_ms: u64,
    #[serde(default = "default_key_ms")]
    pub category_ms: u64,
    #[serde(default = "default_key_ms")]
    pub action_ms: u64,
    /// Speaker and backspace
    #[serde(default = "default_control_ms")]
    pub control_ms: u64,
}

impl Default for DwellConfig {
    fn default() -> Self {
        Self {
            word_ms: default_key_ms(),
            category_ms: default_key_ms(),
            action_ms: default_key_ms(),
            control_ms: default_control_ms(),
        }
    }
}

impl DwellConfig {
    pub fn timings(&self) -> DwellTimings {
        DwellTimings {
            word: Duration::from_millis(self.word_ms),
            category: Duration::from_millis(self.category_ms),
            action: Duration::from_millis(self.action_ms),
            control: Duration::from_millis(self.control_ms),
        }
    }
}

fn default_key_ms() -> u64 {
    3000
}

fn default_control_ms() -> u64 {
    2000
}

// ============================================================================
// Scan Config
// ============================================================================

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct ScanConfig {
    #[serde(default = "default_scan_interval")]
    pub interval_ms: u64,
    #[serde(default = "default_row_width")]
    pub row_width: usize,
    /// Start in switch mode instead of dwell
    #[serde(default)]
    pub start_enabled: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_scan_interval(),
            row_width: default_row_width(),
            start_enabled: false,
        }
    }
}

impl ScanConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

fn default_scan_interval() -> u64 {
    1500
}

fn default_row_width() -> usize {
    6
}

// ============================================================================
// Suggestions Config
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SuggestionsConfig {
    /// Budget for one provider call before falling back to the rule layout
    #[serde(default = "default_suggestion_timeout")]
    pub timeout_ms: u64,
    #[serde(default = "default_max_suggestions")]
    pub max: usize,
    /// No provider means rule-based layouts only
    #[serde(default)]
    pub provider: Option<ProviderConfig>,
}

impl Default for SuggestionsConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_suggestion_timeout(),
            max: default_max_suggestions(),
            provider: None,
        }
    }
}

impl SuggestionsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn default_suggestion_timeout() -> u64 {
    4000
}

fn default_max_suggestions() -> usize {
    18
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(tag = "backend")]
pub enum ProviderConfig {
    #[serde(rename = "openai-compat")]
    OpenAiCompat {
        /// Base URL - can use preset or explicit URL
        #[serde(default)]
        base_url: String,
        /// Preset shortcuts: "lm_studio", "openai", "ollama"
        preset: Option<String>,
        model: String,
        /// API key (supports ${ENV_VAR} syntax)
        #[serde(default)]
        api_key: Option<String>,
        temperature: Option<f32>,
        max_tokens: Option<u32>,
    },
    #[serde(rename = "ollama")]
    Ollama {
        #[serde(default = "default_ollama_model")]
        model: String,
    },
}

fn default_ollama_model() -> String {
    "mistral:7b-instruct".into()
}

/// Expand ${VAR} to environment variable values
fn expand_env_vars(s: &str) -> String {
    let mut result = s.to_string();

    while let Some(start) = result.find("${") {
        if let Some(end) = result[start..].find('}') {
            let var_name = &result[start + 2..start + end];
            let value = std::env::var(var_name).unwrap_or_else(|_| {
                warn!(var = %var_name, "environment variable not found");
                String::new()
            });
            result.replace_range(start..start + end + 1, &value);
        } else {
            break;
        }
    }

    result
}

fn preset_url(preset: &str) -> &'static str {
    match preset {
        "lm_studio" => "http://localhost:1234/v1",
        "openai" => "https://api.openai.com/v1",
        "ollama" => "http://localhost:11434/v1",
        _ => {
            warn!(%preset, "unknown preset, using LM Studio default");
            "http://localhost:1234/v1"
        }
    }
}

impl ProviderConfig {
    /// Resolve preset to base_url if needed, and expand env vars in api_key
    pub fn resolve_presets(&mut self) {
        if let ProviderConfig::OpenAiCompat {
            base_url,
            preset,
            api_key,
            ..
        } = self
        {
            if base_url.is_empty() {
                *base_url = preset_url(preset.as_deref().unwrap_or("lm_studio")).to_string();
            }
            if let Some(key) = api_key {
                *key = expand_env_vars(key);
            }
        }
    }
}

// ============================================================================
// Speech Config
// ============================================================================

#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
#[serde(tag = "engine")]
pub enum SpeechConfig {
    /// Utterances go to the log only
    #[default]
    #[serde(rename = "log")]
    Log,
    /// External TTS program, text passed as the last argument
    #[serde(rename = "command")]
    Command {
        command: String,
        #[serde(default)]
        args: Vec<String>,
    },
}

// ============================================================================
// UI Config
// ============================================================================

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct UiConfig {
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    /// How long the time overlay stays up (hover is suspended meanwhile)
    #[serde(default = "default_time_overlay")]
    pub time_overlay_secs: u64,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            tick_ms: default_tick_ms(),
            time_overlay_secs: default_time_overlay(),
        }
    }
}

impl UiConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }

    pub fn time_overlay(&self) -> Duration {
        Duration::from_secs(self.time_overlay_secs)
    }
}

fn default_tick_ms() -> u64 {
    16
}

fn default_time_overlay() -> u64 {
    12
}

impl Config {
    pub fn parse(text: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        if let Some(provider) = config.suggestions.provider.as_mut() {
            provider.resolve_presets();
        }
        Ok(config)
    }

    /// Missing file means defaults; a file that fails to parse is an error
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let text = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        Self::parse(&text).map_err(|e| match e {
            Error::Config(msg) => Error::Config(format!("{}: {}", path.display(), msg)),
            other => other,
        })
    }
}
