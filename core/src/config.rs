//! TTS configuration: parameter enums, presets, defaults and request
//! validation.
//!
//! Every `Default` here already considers environment variables, so a binary
//! only has to overlay its config file on top.
//!
//! Env overrides:
//! - OPENAI_API_KEY, OPENAI_BASE_URL, OPENAI_TTS_MODEL, OPENAI_TIMEOUT_MS
//! - TTS_CACHE_ENABLED, TTS_CACHE_MAX_SIZE, TTS_CACHE_TTL_HOURS, TTS_CACHE_DIR
//! - TTS_OUTPUT_DIR, TTS_TOOL_TIMEOUT_MS

use crate::{Result, TtsError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

pub const MIN_SPEED: f64 = 0.25;
pub const MAX_SPEED: f64 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Voice {
    Alloy,
    Echo,
    Fable,
    Onyx,
    Nova,
    Shimmer,
    Coral,
}

impl Voice {
    pub const ALL: [Voice; 7] = [
        Voice::Alloy,
        Voice::Echo,
        Voice::Fable,
        Voice::Onyx,
        Voice::Nova,
        Voice::Shimmer,
        Voice::Coral,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Voice::Alloy => "alloy",
            Voice::Echo => "echo",
            Voice::Fable => "fable",
            Voice::Onyx => "onyx",
            Voice::Nova => "nova",
            Voice::Shimmer => "shimmer",
            Voice::Coral => "coral",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    Mp3,
    Opus,
    Aac,
    Flac,
    Wav,
    Pcm,
}

impl ResponseFormat {
    pub const ALL: [ResponseFormat; 6] = [
        ResponseFormat::Mp3,
        ResponseFormat::Opus,
        ResponseFormat::Aac,
        ResponseFormat::Flac,
        ResponseFormat::Wav,
        ResponseFormat::Pcm,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseFormat::Mp3 => "mp3",
            ResponseFormat::Opus => "opus",
            ResponseFormat::Aac => "aac",
            ResponseFormat::Flac => "flac",
            ResponseFormat::Wav => "wav",
            ResponseFormat::Pcm => "pcm",
        }
    }

    /// File extension for artifacts of this format.
    pub fn extension(&self) -> &'static str {
        self.as_str()
    }
}

/// What happens with synthesized audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    File,
    Play,
    Both,
}

impl OutputMode {
    pub const ALL: [OutputMode; 3] = [OutputMode::File, OutputMode::Play, OutputMode::Both];

    pub fn as_str(&self) -> &'static str {
        match self {
            OutputMode::File => "file",
            OutputMode::Play => "play",
            OutputMode::Both => "both",
        }
    }

    pub fn plays(&self) -> bool {
        matches!(self, OutputMode::Play | OutputMode::Both)
    }
}

macro_rules! enum_text {
    ($ty:ident, $label:literal) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = TtsError;

            fn from_str(s: &str) -> Result<Self> {
                let wanted = s.trim().to_ascii_lowercase();
                $ty::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str() == wanted)
                    .ok_or_else(|| {
                        let allowed: Vec<&str> = $ty::ALL.iter().map(|v| v.as_str()).collect();
                        TtsError::Validation(format!(
                            "Invalid {}: '{}'. Allowed: {}",
                            $label,
                            s,
                            allowed.join(", ")
                        ))
                    })
            }
        }
    };
}

enum_text!(Voice, "voice");
enum_text!(ResponseFormat, "response_format");
enum_text!(OutputMode, "output_mode");

/// Named bundle of voice parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TtsPreset {
    pub name: String,
    pub description: String,
    pub voice: Voice,
    pub speed: f64,
    pub response_format: ResponseFormat,
    #[serde(default)]
    pub instructions: Option<String>,
}

impl TtsPreset {
    fn builtin(
        name: &str,
        description: &str,
        voice: Voice,
        speed: f64,
        response_format: ResponseFormat,
        instructions: &str,
    ) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            voice,
            speed,
            response_format,
            instructions: Some(instructions.to_string()),
        }
    }
}

pub fn builtin_presets() -> Vec<TtsPreset> {
    vec![
        TtsPreset::builtin(
            "cheerful_female",
            "Bright, friendly female voice",
            Voice::Coral,
            1.1,
            ResponseFormat::Mp3,
            "Speak brightly and warmly, slightly faster than usual",
        ),
        TtsPreset::builtin(
            "calm_male",
            "Calm male voice",
            Voice::Onyx,
            0.9,
            ResponseFormat::Mp3,
            "Speak calmly and slowly with a reassuring tone",
        ),
        TtsPreset::builtin(
            "professional",
            "Professional, authoritative voice",
            Voice::Echo,
            1.0,
            ResponseFormat::Flac,
            "Speak formally with authority, suitable for business",
        ),
        TtsPreset::builtin(
            "gentle_female",
            "Gentle, warm female voice",
            Voice::Shimmer,
            0.95,
            ResponseFormat::Mp3,
            "Speak gently and warmly in a soft voice",
        ),
        TtsPreset::builtin(
            "energetic",
            "Lively, energetic voice",
            Voice::Nova,
            1.2,
            ResponseFormat::Mp3,
            "Speak with energy and enthusiasm",
        ),
        TtsPreset::builtin(
            "storyteller",
            "Expressive storytelling voice",
            Voice::Fable,
            1.0,
            ResponseFormat::Wav,
            "Narrate expressively as if telling a story",
        ),
    ]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TtsDefaults {
    pub voice: Voice,
    pub speed: f64,
    pub response_format: ResponseFormat,
    pub output_mode: OutputMode,
    pub instructions: Option<String>,
}

impl Default for TtsDefaults {
    fn default() -> Self {
        Self {
            voice: Voice::Alloy,
            speed: 1.0,
            response_format: ResponseFormat::Mp3,
            output_mode: OutputMode::File,
            instructions: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    pub enabled: bool,
    pub max_size: usize,
    pub ttl_hours: u64,
    /// `None` selects the per-user cache directory
    pub dir: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: env_parse("TTS_CACHE_ENABLED").unwrap_or(true),
            max_size: env_parse("TTS_CACHE_MAX_SIZE").unwrap_or(100),
            ttl_hours: env_parse("TTS_CACHE_TTL_HOURS").unwrap_or(24),
            dir: env_string("TTS_CACHE_DIR").map(PathBuf::from),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub name: String,
    pub version: String,
    pub temp_dir_cleanup_hours: u64,
    /// Provider hard limit per request, in chars
    pub max_text_length: usize,
    /// Text longer than this is split into chunks
    pub long_text_split_size: usize,
    pub max_total_text_length: usize,
    pub max_concurrent_chunks: usize,
    pub tool_timeout_ms: u64,
    pub output_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "openai-tts".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            temp_dir_cleanup_hours: 24,
            max_text_length: 4096,
            long_text_split_size: 4000,
            max_total_text_length: 100_000,
            max_concurrent_chunks: 3,
            tool_timeout_ms: env_parse("TTS_TOOL_TIMEOUT_MS").unwrap_or(300_000),
            output_dir: env_string("TTS_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| std::env::temp_dir().join("openai_tts_mcp")),
        }
    }
}

/// Speech provider connection settings.
#[derive(Clone, PartialEq)]
pub struct ProviderConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub request_timeout_ms: u64,
    /// Consume the response body as a byte stream instead of one buffer
    pub stream_response: bool,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: env_string("OPENAI_API_KEY"),
            base_url: env_string("OPENAI_BASE_URL")
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            model: env_string("OPENAI_TTS_MODEL").unwrap_or_else(|| "tts-1".to_string()),
            request_timeout_ms: env_parse("OPENAI_TIMEOUT_MS").unwrap_or(60_000),
            stream_response: false,
        }
    }
}

// Keep the key out of logs.
impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .field("stream_response", &self.stream_response)
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TtsConfig {
    pub defaults: TtsDefaults,
    pub cache: CacheConfig,
    pub server: ServerConfig,
    pub provider: ProviderConfig,
    pub custom_presets: HashMap<String, TtsPreset>,
}

/// Caller-supplied parameters before defaults and presets are applied.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ParamOverrides {
    #[serde(default)]
    pub voice: Option<String>,
    #[serde(default)]
    pub speed: Option<f64>,
    #[serde(default)]
    pub response_format: Option<String>,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub preset: Option<String>,
    #[serde(default)]
    pub output_mode: Option<String>,
}

/// Fully validated voice parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedParams {
    pub voice: Voice,
    pub speed: f64,
    pub response_format: ResponseFormat,
    pub output_mode: OutputMode,
    pub instructions: Option<String>,
    pub preset: Option<String>,
}

impl TtsConfig {
    /// Custom presets shadow built-ins of the same name.
    pub fn preset(&self, name: &str) -> Option<TtsPreset> {
        self.custom_presets
            .get(name)
            .cloned()
            .or_else(|| builtin_presets().into_iter().find(|p| p.name == name))
    }

    /// Built-in presets followed by custom ones, by name.
    pub fn all_presets(&self) -> Vec<TtsPreset> {
        let mut presets: Vec<TtsPreset> = builtin_presets()
            .into_iter()
            .filter(|p| !self.custom_presets.contains_key(&p.name))
            .collect();
        let mut custom: Vec<TtsPreset> = self.custom_presets.values().cloned().collect();
        custom.sort_by(|a, b| a.name.cmp(&b.name));
        presets.extend(custom);
        presets
    }

    /// Apply precedence explicit > preset > defaults and validate the result.
    pub fn resolve(&self, overrides: &ParamOverrides) -> Result<ResolvedParams> {
        let preset = match overrides.preset.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => Some(self.preset(name).ok_or_else(|| {
                TtsError::Validation(format!("Unknown preset: '{name}'"))
            })?),
            _ => None,
        };

        let voice = match &overrides.voice {
            Some(v) => v.parse()?,
            None => preset.as_ref().map(|p| p.voice).unwrap_or(self.defaults.voice),
        };
        let response_format = match &overrides.response_format {
            Some(f) => f.parse()?,
            None => preset
                .as_ref()
                .map(|p| p.response_format)
                .unwrap_or(self.defaults.response_format),
        };
        let output_mode = match &overrides.output_mode {
            Some(m) => m.parse()?,
            None => self.defaults.output_mode,
        };
        let speed = overrides
            .speed
            .or_else(|| preset.as_ref().map(|p| p.speed))
            .unwrap_or(self.defaults.speed);
        validate_speed(speed)?;

        let instructions = overrides
            .instructions
            .clone()
            .or_else(|| preset.as_ref().and_then(|p| p.instructions.clone()))
            .or_else(|| self.defaults.instructions.clone());

        Ok(ResolvedParams {
            voice,
            speed,
            response_format,
            output_mode,
            instructions,
            preset: preset.map(|p| p.name),
        })
    }
}

pub fn validate_speed(speed: f64) -> Result<()> {
    if !speed.is_finite() || !(MIN_SPEED..=MAX_SPEED).contains(&speed) {
        return Err(TtsError::Validation(format!(
            "Invalid speed: {speed}. Must be between {MIN_SPEED} and {MAX_SPEED}"
        )));
    }
    Ok(())
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.is_empty())
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_parsing() {
        assert_eq!("Nova".parse::<Voice>().unwrap(), Voice::Nova);
        assert_eq!(" wav ".parse::<ResponseFormat>().unwrap(), ResponseFormat::Wav);
        assert_eq!("both".parse::<OutputMode>().unwrap(), OutputMode::Both);
        let err = "robot".parse::<Voice>().unwrap_err();
        assert!(matches!(err, TtsError::Validation(_)));
        assert!(err.to_string().contains("alloy"));
    }

    #[test]
    fn test_serde_names_are_lowercase() {
        assert_eq!(serde_json::to_value(Voice::Shimmer).unwrap(), "shimmer");
        let f: ResponseFormat = serde_json::from_str("\"flac\"").unwrap();
        assert_eq!(f, ResponseFormat::Flac);
    }

    #[test]
    fn test_resolve_defaults() {
        let cfg = TtsConfig::default();
        let p = cfg.resolve(&ParamOverrides::default()).unwrap();
        assert_eq!(p.voice, Voice::Alloy);
        assert_eq!(p.speed, 1.0);
        assert_eq!(p.response_format, ResponseFormat::Mp3);
        assert_eq!(p.output_mode, OutputMode::File);
        assert_eq!(p.instructions, None);
    }

    #[test]
    fn test_resolve_preset_with_explicit_override() {
        let cfg = TtsConfig::default();
        let p = cfg
            .resolve(&ParamOverrides {
                preset: Some("storyteller".into()),
                speed: Some(1.5),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(p.voice, Voice::Fable);
        assert_eq!(p.response_format, ResponseFormat::Wav);
        assert_eq!(p.speed, 1.5);
        assert!(p.instructions.is_some());
        assert_eq!(p.preset.as_deref(), Some("storyteller"));
    }

    #[test]
    fn test_custom_preset_shadows_builtin() {
        let mut cfg = TtsConfig::default();
        cfg.custom_presets.insert(
            "energetic".into(),
            TtsPreset {
                name: "energetic".into(),
                description: "mine".into(),
                voice: Voice::Echo,
                speed: 2.0,
                response_format: ResponseFormat::Opus,
                instructions: None,
            },
        );
        let p = cfg
            .resolve(&ParamOverrides {
                preset: Some("energetic".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(p.voice, Voice::Echo);
        assert_eq!(cfg.all_presets().len(), builtin_presets().len());
    }

    #[test]
    fn test_resolve_rejects_bad_input() {
        let cfg = TtsConfig::default();
        for overrides in [
            ParamOverrides { speed: Some(0.1), ..Default::default() },
            ParamOverrides { speed: Some(f64::NAN), ..Default::default() },
            ParamOverrides { voice: Some("robot".into()), ..Default::default() },
            ParamOverrides { response_format: Some("ogg".into()), ..Default::default() },
            ParamOverrides { preset: Some("nope".into()), ..Default::default() },
        ] {
            assert!(matches!(cfg.resolve(&overrides), Err(TtsError::Validation(_))));
        }
    }

    #[test]
    fn test_provider_debug_redacts_key() {
        let cfg = ProviderConfig {
            api_key: Some("sk-secret".into()),
            ..ProviderConfig::default()
        };
        let shown = format!("{cfg:?}");
        assert!(!shown.contains("sk-secret"));
        assert!(shown.contains("redacted"));
    }
}
