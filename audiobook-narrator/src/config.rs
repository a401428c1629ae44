//! narrator configuration: voices, pacing, assembly and synthesis settings.

use crate::audio::{AssemblySettings, OutputFormat};
use crate::error::ConfigError;
use crate::pipeline::FailurePolicy;
use crate::text::{PauseDurations, SegmentRules};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const MALE_VOICE: &str = "tr-TR-AhmetNeural";
pub const FEMALE_VOICE: &str = "tr-TR-EmelNeural";

/// Placeholders substituted into the synthesis command.
pub const TEXT_PLACEHOLDER: &str = "{text}";
pub const VOICE_PLACEHOLDER: &str = "{voice}";
pub const OUTPUT_PLACEHOLDER: &str = "{output}";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarratorConfig {
    /// Voice preset name or engine voice id
    #[serde(default = "default_voice")]
    pub voice: String,

    /// Fill pauses with low-level noise instead of digital silence
    #[serde(default = "default_room_tone")]
    pub room_tone: bool,

    #[serde(default)]
    pub format: OutputFormat,

    /// Preset name to engine voice id
    #[serde(default = "default_voices")]
    pub voices: BTreeMap<String, String>,

    #[serde(default)]
    pub pauses: PauseDurations,

    #[serde(default)]
    pub assembly: AssemblySettings,

    #[serde(default)]
    pub rules: SegmentRules,

    #[serde(default)]
    pub synthesis: SynthesisSettings,
}

fn default_voice() -> String {
    "female".to_string()
}

fn default_room_tone() -> bool {
    true
}

fn default_voices() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("male".to_string(), MALE_VOICE.to_string()),
        ("female".to_string(), FEMALE_VOICE.to_string()),
    ])
}

impl Default for NarratorConfig {
    fn default() -> Self {
        Self {
            voice: default_voice(),
            room_tone: default_room_tone(),
            format: OutputFormat::default(),
            voices: default_voices(),
            pauses: PauseDurations::default(),
            assembly: AssemblySettings::default(),
            rules: SegmentRules::default(),
            synthesis: SynthesisSettings::default(),
        }
    }
}

/// How segments are sent to the speech engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesisSettings {
    /// Maximum synthesis calls in flight
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Per-call timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub failure_policy: FailurePolicy,

    /// Program and arguments, with {text}, {voice} and {output} placeholders
    #[serde(default = "default_command")]
    pub command: Vec<String>,

    /// Extension of the file the command writes
    #[serde(default = "default_output_extension")]
    pub output_extension: String,
}

fn default_max_concurrent() -> usize {
    4
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_command() -> Vec<String> {
    [
        "edge-tts",
        "--voice",
        VOICE_PLACEHOLDER,
        "--text",
        TEXT_PLACEHOLDER,
        "--write-media",
        OUTPUT_PLACEHOLDER,
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_output_extension() -> String {
    "mp3".to_string()
}

impl Default for SynthesisSettings {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            timeout_secs: default_timeout_secs(),
            failure_policy: FailurePolicy::default(),
            command: default_command(),
            output_extension: default_output_extension(),
        }
    }
}

impl SynthesisSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |message: &str| ConfigError::InvalidRule {
            table: "synthesis",
            message: message.to_string(),
        };

        if self.max_concurrent == 0 {
            return Err(invalid("max_concurrent must be at least 1"));
        }
        if self.timeout_secs == 0 {
            return Err(invalid("timeout_secs must be at least 1"));
        }
        if self.command.is_empty() {
            return Err(invalid("command is empty"));
        }
        if !self.command.iter().any(|arg| arg.contains(OUTPUT_PLACEHOLDER)) {
            return Err(invalid("command has no {output} placeholder"));
        }
        Ok(())
    }
}

impl NarratorConfig {
    /// Get the config file path: <config dir>/cli-programs/narrator.toml
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        let dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(dir.join("cli-programs").join("narrator.toml"))
    }

    /// Load config from the default location, returning defaults if the file doesn't exist
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let config: NarratorConfig = toml::from_str(&content)?;
        config.synthesis.validate()?;
        Ok(config)
    }

    /// Save config to the default location
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Map a preset name to its voice id; anything else is used verbatim.
    pub fn resolve_voice(&self, voice: &str) -> String {
        self.voices
            .get(voice)
            .cloned()
            .unwrap_or_else(|| voice.to_string())
    }
}
