use super::parse_args;
use crate::audio::AudioPlayer;
use crate::config::{ParamOverrides, TtsConfig};
use crate::synthesis::{SynthesisOrchestrator, SynthesisRequest};
use crate::text::{estimate_speech_duration, extract_speech_text};
use crate::tools::{Tool, ToolError, ToolResult};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

// ─────────────────────────────────────────────────────────────────────────────
// generate_speech
// ─────────────────────────────────────────────────────────────────────────────

fn enabled() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct GenerateSpeechArgs {
    text: String,
    #[serde(flatten)]
    params: ParamOverrides,
    #[serde(default = "enabled")]
    use_cache: bool,
    #[serde(default = "enabled")]
    split_long_text: bool,
    #[serde(default = "enabled")]
    merge: bool,
    #[serde(default)]
    normalize_text: bool,
}

pub struct GenerateSpeechTool {
    config: Arc<TtsConfig>,
    orchestrator: Arc<SynthesisOrchestrator>,
    player: Arc<AudioPlayer>,
}

impl GenerateSpeechTool {
    pub fn new(
        config: Arc<TtsConfig>,
        orchestrator: Arc<SynthesisOrchestrator>,
        player: Arc<AudioPlayer>,
    ) -> Self {
        Self {
            config,
            orchestrator,
            player,
        }
    }
}

#[async_trait]
impl Tool for GenerateSpeechTool {
    fn name(&self) -> String {
        "generate_speech".to_string()
    }

    fn description(&self) -> String {
        "Convert text to speech with OpenAI TTS and save it as an audio file. \
         Long text is split at natural boundaries and merged; repeated requests are served from the cache."
            .to_string()
    }

    fn parameters(&self) -> Value {
        let presets: Vec<String> = self.config.all_presets().into_iter().map(|p| p.name).collect();
        json!({
            "type": "object",
            "properties": {
                "text": {
                    "type": "string",
                    "description": "Text to speak",
                    "maxLength": self.config.server.max_total_text_length
                },
                "voice": {
                    "type": "string",
                    "enum": ["alloy", "echo", "fable", "onyx", "nova", "shimmer", "coral"],
                    "description": "Voice to use"
                },
                "speed": {
                    "type": "number",
                    "minimum": crate::config::MIN_SPEED,
                    "maximum": crate::config::MAX_SPEED,
                    "description": "Playback speed"
                },
                "response_format": {
                    "type": "string",
                    "enum": ["mp3", "opus", "aac", "flac", "wav", "pcm"],
                    "description": "Audio format"
                },
                "instructions": {
                    "type": "string",
                    "description": "Speaking style instructions"
                },
                "preset": {
                    "type": "string",
                    "enum": presets,
                    "description": "Named voice preset; explicit parameters override it"
                },
                "output_mode": {
                    "type": "string",
                    "enum": ["file", "play", "both"],
                    "description": "Save only, play, or both"
                },
                "use_cache": {
                    "type": "boolean",
                    "default": true,
                    "description": "Serve repeated requests from the audio cache"
                },
                "split_long_text": {
                    "type": "boolean",
                    "default": true,
                    "description": "Split text that exceeds the per-request limit"
                },
                "merge": {
                    "type": "boolean",
                    "default": true,
                    "description": "Merge chunk audio into a single file"
                },
                "normalize_text": {
                    "type": "boolean",
                    "default": false,
                    "description": "Strip URLs and markup and normalize whitespace first"
                }
            },
            "required": ["text"]
        })
    }

    async fn call(&self, arguments: Value) -> ToolResult<Value> {
        let args: GenerateSpeechArgs = parse_args(arguments)?;

        let text = if args.normalize_text {
            extract_speech_text(&args.text)
        } else {
            args.text.trim().to_string()
        };
        if text.is_empty() {
            return Err(ToolError::InvalidArguments(
                "Missing or empty 'text' argument".to_string(),
            ));
        }
        let text_length = text.chars().count();
        let max_total = self.config.server.max_total_text_length;
        if text_length > max_total {
            return Err(ToolError::InvalidArguments(format!(
                "Text is {text_length} characters; the maximum is {max_total}"
            )));
        }

        let params = self.config.resolve(&args.params)?;
        let mut request = SynthesisRequest::new(text.clone(), &params);
        request.use_cache = args.use_cache;
        request.split = args.split_long_text;
        request.merge = args.merge;

        let outcome = self.orchestrator.synthesize(request).await?;

        let played = if params.output_mode.plays() {
            self.player.play(&outcome.primary_path).await
        } else {
            false
        };

        let file_name = outcome
            .primary_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        info!(target: "generate_speech", file = %file_name, chunks = outcome.chunk_count, played, "Speech generated");

        Ok(json!({
            "success": true,
            "file_path": outcome.primary_path,
            "message": format!("Generated speech file: {file_name}"),
            "text_length": text_length,
            "chunk_count": outcome.chunk_count,
            "chunk_paths": outcome.chunk_paths,
            "merged": outcome.merged,
            "cached_chunks": outcome.cached_chunks,
            "voice": params.voice,
            "speed": params.speed,
            "response_format": params.response_format,
            "output_mode": params.output_mode,
            "preset": params.preset,
            "played": played,
            "estimated_duration_sec": (estimate_speech_duration(&text, params.speed) * 10.0).round() / 10.0,
        }))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// list_presets
// ─────────────────────────────────────────────────────────────────────────────

pub struct ListPresetsTool {
    config: Arc<TtsConfig>,
}

impl ListPresetsTool {
    pub fn new(config: Arc<TtsConfig>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Tool for ListPresetsTool {
    fn name(&self) -> String {
        "list_presets".to_string()
    }

    fn description(&self) -> String {
        "List the available voice presets and the server defaults".to_string()
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {}
        })
    }

    async fn call(&self, _arguments: Value) -> ToolResult<Value> {
        let presets: Vec<Value> = self
            .config
            .all_presets()
            .into_iter()
            .map(|p| {
                let custom = self.config.custom_presets.contains_key(&p.name);
                json!({
                    "name": p.name,
                    "description": p.description,
                    "voice": p.voice,
                    "speed": p.speed,
                    "response_format": p.response_format,
                    "instructions": p.instructions,
                    "custom": custom,
                })
            })
            .collect();
        let defaults = &self.config.defaults;

        Ok(json!({
            "success": true,
            "presets": presets,
            "defaults": {
                "voice": defaults.voice,
                "speed": defaults.speed,
                "response_format": defaults.response_format,
                "output_mode": defaults.output_mode,
            }
        }))
    }
}
