use super::parse_args;
use crate::audio::{merge_audio_files, AudioMerger, AudioPlayer};
use crate::config::{ResponseFormat, TtsConfig};
use crate::text::TextSplitter;
use crate::tools::{Tool, ToolError, ToolResult};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;

// ─────────────────────────────────────────────────────────────────────────────
// split_text
// ─────────────────────────────────────────────────────────────────────────────

pub struct SplitTextTool {
    default_max_length: usize,
}

impl SplitTextTool {
    pub fn new(config: &TtsConfig) -> Self {
        Self {
            default_max_length: config.server.long_text_split_size,
        }
    }
}

#[async_trait]
impl Tool for SplitTextTool {
    fn name(&self) -> String {
        "split_text".to_string()
    }

    fn description(&self) -> String {
        "Split long text into chunks at paragraph, sentence or word boundaries".to_string()
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "text": {
                    "type": "string",
                    "description": "Text to split"
                },
                "max_length": {
                    "type": "integer",
                    "minimum": 1,
                    "default": self.default_max_length,
                    "description": "Maximum characters per chunk"
                }
            },
            "required": ["text"]
        })
    }

    async fn call(&self, arguments: Value) -> ToolResult<Value> {
        let text = arguments["text"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'text' argument".to_string()))?;
        let max_length = match arguments.get("max_length").filter(|v| !v.is_null()) {
            None => self.default_max_length,
            Some(v) => v
                .as_u64()
                .filter(|n| *n >= 1)
                .and_then(|n| usize::try_from(n).ok())
                .ok_or_else(|| {
                    ToolError::InvalidArguments("'max_length' must be a positive integer".to_string())
                })?,
        };

        let chunks = TextSplitter::new(max_length).split_text(text);
        let lengths: Vec<usize> = chunks.iter().map(|c| c.chars().count()).collect();
        Ok(json!({
            "success": true,
            "chunk_count": chunks.len(),
            "max_length": max_length,
            "lengths": lengths,
            "chunks": chunks,
        }))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// merge_audio_files
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct MergeArgs {
    paths: Vec<PathBuf>,
    #[serde(default)]
    format: Option<String>,
    #[serde(default)]
    output_dir: Option<PathBuf>,
}

pub struct MergeAudioFilesTool {
    merger: Arc<AudioMerger>,
    default_format: ResponseFormat,
}

impl MergeAudioFilesTool {
    pub fn new(merger: Arc<AudioMerger>, config: &TtsConfig) -> Self {
        Self {
            merger,
            default_format: config.defaults.response_format,
        }
    }

    fn format_for(&self, args: &MergeArgs) -> ToolResult<ResponseFormat> {
        if let Some(f) = &args.format {
            return Ok(f.parse()?);
        }
        Ok(args
            .paths
            .first()
            .and_then(|p| p.extension())
            .and_then(|e| e.to_str())
            .and_then(|e| e.parse().ok())
            .unwrap_or(self.default_format))
    }
}

#[async_trait]
impl Tool for MergeAudioFilesTool {
    fn name(&self) -> String {
        "merge_audio_files".to_string()
    }

    fn description(&self) -> String {
        "Concatenate audio files in the given order into a single file".to_string()
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "paths": {
                    "type": "array",
                    "items": { "type": "string" },
                    "minItems": 1,
                    "description": "Audio files in playback order"
                },
                "format": {
                    "type": "string",
                    "enum": ["mp3", "opus", "aac", "flac", "wav", "pcm"],
                    "description": "Output format; defaults to the first file's extension"
                },
                "output_dir": {
                    "type": "string",
                    "description": "Directory for the merged file"
                }
            },
            "required": ["paths"]
        })
    }

    async fn call(&self, arguments: Value) -> ToolResult<Value> {
        let args: MergeArgs = parse_args(arguments)?;
        if args.paths.is_empty() {
            return Err(ToolError::InvalidArguments("'paths' must not be empty".to_string()));
        }
        let format = self.format_for(&args)?;

        let merged = match &args.output_dir {
            Some(dir) => merge_audio_files(&args.paths, format, dir).await?,
            None => self.merger.merge(&args.paths, format).await?,
        };

        Ok(json!({
            "success": true,
            "file_path": merged,
            "file_count": args.paths.len(),
            "format": format,
        }))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// play_audio
// ─────────────────────────────────────────────────────────────────────────────

pub struct PlayAudioTool {
    player: Arc<AudioPlayer>,
}

impl PlayAudioTool {
    pub fn new(player: Arc<AudioPlayer>) -> Self {
        Self { player }
    }
}

#[async_trait]
impl Tool for PlayAudioTool {
    fn name(&self) -> String {
        "play_audio".to_string()
    }

    fn description(&self) -> String {
        "Play an audio file on this machine with the system audio player".to_string()
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "Audio file to play"
                }
            },
            "required": ["file_path"]
        })
    }

    async fn call(&self, arguments: Value) -> ToolResult<Value> {
        let path_str = arguments["file_path"].as_str().ok_or_else(|| {
            ToolError::InvalidArguments("Missing 'file_path' argument".to_string())
        })?;
        let path = PathBuf::from(path_str);
        if !path.exists() {
            return Err(ToolError::NotFound(format!("File not found: {path_str}")));
        }

        let played = self.player.play(&path).await;
        let message = if played {
            "Playback finished"
        } else {
            "No usable audio player; file left on disk"
        };
        Ok(json!({
            "success": played,
            "played": played,
            "file_path": path,
            "message": message,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_split_text_tool() {
        let tool = SplitTextTool::new(&TtsConfig::default());
        let out = tool
            .call(json!({"text": "One. Two. Three.", "max_length": 6}))
            .await
            .unwrap();
        assert_eq!(out["chunks"], json!(["One.", "Two.", "Three."]));
        assert_eq!(out["chunk_count"], 3);

        assert!(matches!(
            tool.call(json!({"text": "x", "max_length": 0})).await,
            Err(ToolError::InvalidArguments(_))
        ));
        assert!(matches!(
            tool.call(json!({})).await,
            Err(ToolError::InvalidArguments(_))
        ));
    }

    #[tokio::test]
    async fn test_merge_tool_infers_format() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.pcm");
        let b = dir.path().join("b.pcm");
        std::fs::write(&a, b"12").unwrap();
        std::fs::write(&b, b"34").unwrap();

        let merger = Arc::new(AudioMerger::with_codec(dir.path().join("out"), None));
        let tool = MergeAudioFilesTool::new(merger, &TtsConfig::default());
        let out = tool.call(json!({"paths": [a, b]})).await.unwrap();
        assert_eq!(out["format"], "pcm");
        let merged = PathBuf::from(out["file_path"].as_str().unwrap());
        assert_eq!(std::fs::read(merged).unwrap(), b"1234");

        assert!(matches!(
            tool.call(json!({"paths": []})).await,
            Err(ToolError::InvalidArguments(_))
        ));
        assert!(matches!(
            tool.call(json!({"paths": ["a.mp3", "b.mp3"], "format": "ogg"})).await,
            Err(ToolError::InvalidArguments(_))
        ));
    }

    #[tokio::test]
    async fn test_play_missing_file() {
        let tool = PlayAudioTool::new(Arc::new(AudioPlayer::default()));
        assert!(matches!(
            tool.call(json!({"file_path": "/no/such/file.mp3"})).await,
            Err(ToolError::NotFound(_))
        ));
    }
}
