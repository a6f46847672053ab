use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tts_mcp_core::config::{
    validate_speed, CacheConfig, OutputMode, ProviderConfig, ResponseFormat, ServerConfig,
    TtsDefaults, TtsPreset, Voice,
};
use tts_mcp_core::TtsConfig;

/// High-level configuration for the TTS MCP server
#[derive(Clone, Debug, Default)]
pub struct TtsServerConfig {
    pub tts: TtsConfig,
}

impl TtsServerConfig {
    /// Load configuration from a TOML file (path via TTS_MCP_CONFIG or ./tts_server.toml),
    /// overlaying values onto env-driven defaults.
    pub fn load() -> Self {
        let path = std::env::var("TTS_MCP_CONFIG").unwrap_or_else(|_| "tts_server.toml".into());
        Self::load_from(Path::new(&path))
    }

    pub fn load_from(p: &Path) -> Self {
        let default = Self::default();
        if !p.exists() {
            tracing::info!(target: "tts_server", path = %p.display(), "No TOML config found; using defaults/env");
            return default;
        }
        match fs::read_to_string(p) {
            Ok(s) => match toml::from_str::<TtsServerToml>(&s) {
                Ok(t) => t.overlay(default),
                Err(e) => {
                    tracing::warn!(target: "tts_server", error = %e, "Failed to parse TOML; using defaults");
                    default
                }
            },
            Err(e) => {
                tracing::warn!(target: "tts_server", error = %e, "Failed to read TOML; using defaults");
                default
            }
        }
    }
}

// =========================
// TOML overlay definitions
// =========================

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct TtsServerToml {
    pub defaults: Option<DefaultsToml>,
    pub cache: Option<CacheToml>,
    pub server: Option<ServerToml>,
    pub provider: Option<ProviderToml>,
    #[serde(default)]
    pub presets: HashMap<String, PresetToml>,
}

impl TtsServerToml {
    fn overlay(self, mut base: TtsServerConfig) -> TtsServerConfig {
        if let Some(d) = self.defaults {
            d.apply(&mut base.tts.defaults);
        }
        if let Some(c) = self.cache {
            c.apply(&mut base.tts.cache);
        }
        if let Some(s) = self.server {
            s.apply(&mut base.tts.server);
        }
        if let Some(p) = self.provider {
            p.apply(&mut base.tts.provider);
        }
        for (name, preset) in self.presets {
            match preset.into_preset(&name) {
                Some(p) => {
                    base.tts.custom_presets.insert(name, p);
                }
                None => {
                    tracing::warn!(target: "tts_server", preset = %name, "Skipping preset with invalid speed");
                }
            }
        }
        if validate_speed(base.tts.defaults.speed).is_err() {
            tracing::warn!(target: "tts_server", speed = base.tts.defaults.speed, "Invalid default speed; using 1.0");
            base.tts.defaults.speed = 1.0;
        }
        base
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct DefaultsToml {
    pub voice: Option<Voice>,
    pub speed: Option<f64>,
    pub response_format: Option<ResponseFormat>,
    pub output_mode: Option<OutputMode>,
    pub instructions: Option<String>,
}
impl DefaultsToml {
    fn apply(self, d: &mut TtsDefaults) {
        if let Some(v) = self.voice {
            d.voice = v;
        }
        if let Some(v) = self.speed {
            d.speed = v;
        }
        if let Some(v) = self.response_format {
            d.response_format = v;
        }
        if let Some(v) = self.output_mode {
            d.output_mode = v;
        }
        if let Some(v) = self.instructions {
            d.instructions = Some(v);
        }
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct CacheToml {
    pub enabled: Option<bool>,
    pub max_size: Option<usize>,
    pub ttl_hours: Option<u64>,
    pub dir: Option<PathBuf>,
}
impl CacheToml {
    fn apply(self, c: &mut CacheConfig) {
        if let Some(v) = self.enabled {
            c.enabled = v;
        }
        if let Some(v) = self.max_size {
            c.max_size = v;
        }
        if let Some(v) = self.ttl_hours {
            c.ttl_hours = v;
        }
        if let Some(v) = self.dir {
            c.dir = Some(v);
        }
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct ServerToml {
    pub name: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub temp_dir_cleanup_hours: Option<u64>,
    pub max_text_length: Option<usize>,
    pub long_text_split_size: Option<usize>,
    pub max_total_text_length: Option<usize>,
    pub max_concurrent_chunks: Option<usize>,
    pub tool_timeout_ms: Option<u64>,
}
impl ServerToml {
    fn apply(self, s: &mut ServerConfig) {
        if let Some(v) = self.name {
            s.name = v;
        }
        if let Some(v) = self.output_dir {
            s.output_dir = v;
        }
        if let Some(v) = self.temp_dir_cleanup_hours {
            s.temp_dir_cleanup_hours = v;
        }
        if let Some(v) = self.max_text_length {
            s.max_text_length = v;
        }
        if let Some(v) = self.long_text_split_size {
            s.long_text_split_size = v;
        }
        if let Some(v) = self.max_total_text_length {
            s.max_total_text_length = v;
        }
        if let Some(v) = self.max_concurrent_chunks {
            s.max_concurrent_chunks = v.max(1);
        }
        if let Some(v) = self.tool_timeout_ms {
            s.tool_timeout_ms = v;
        }
    }
}

/// The API key is env-only (OPENAI_API_KEY), never read from the file.
#[derive(Debug, Clone, Default, serde::Deserialize)]
struct ProviderToml {
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub request_timeout_ms: Option<u64>,
    pub stream_response: Option<bool>,
}
impl ProviderToml {
    fn apply(self, p: &mut ProviderConfig) {
        if let Some(v) = self.base_url {
            p.base_url = v;
        }
        if let Some(v) = self.model {
            p.model = v;
        }
        if let Some(v) = self.request_timeout_ms {
            p.request_timeout_ms = v;
        }
        if let Some(v) = self.stream_response {
            p.stream_response = v;
        }
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
struct PresetToml {
    pub description: Option<String>,
    pub voice: Voice,
    pub speed: Option<f64>,
    pub response_format: Option<ResponseFormat>,
    pub instructions: Option<String>,
}
impl PresetToml {
    fn into_preset(self, name: &str) -> Option<TtsPreset> {
        let speed = self.speed.unwrap_or(1.0);
        validate_speed(speed).ok()?;
        Some(TtsPreset {
            name: name.to_string(),
            description: self.description.unwrap_or_else(|| format!("Custom preset {name}")),
            voice: self.voice,
            speed,
            response_format: self.response_format.unwrap_or(ResponseFormat::Mp3),
            instructions: self.instructions,
        })
    }
}
