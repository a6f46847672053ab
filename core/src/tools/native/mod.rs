pub mod audio;
pub mod cache;
pub mod speech;

pub use audio::{MergeAudioFilesTool, PlayAudioTool, SplitTextTool};
pub use cache::{CacheStatsTool, CleanupCacheTool, ClearCacheTool, ResizeCacheTool};
pub use speech::{GenerateSpeechTool, ListPresetsTool};

use crate::audio::{AudioMerger, AudioPlayer};
use crate::cache::SharedCache;
use crate::config::TtsConfig;
use crate::synthesis::SynthesisOrchestrator;
use crate::tools::{ToolError, ToolRegistry, ToolResult};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

/// Decode tool arguments; a missing arguments object counts as `{}`.
pub(crate) fn parse_args<T: DeserializeOwned>(arguments: Value) -> ToolResult<T> {
    let arguments = if arguments.is_null() {
        Value::Object(Default::default())
    } else {
        arguments
    };
    serde_json::from_value(arguments).map_err(|e| ToolError::InvalidArguments(e.to_string()))
}

/// Register every TTS tool with the registry.
pub async fn register_tts_tools(
    registry: &ToolRegistry,
    config: Arc<TtsConfig>,
    orchestrator: Arc<SynthesisOrchestrator>,
    cache: Option<SharedCache>,
    merger: Arc<AudioMerger>,
    player: Arc<AudioPlayer>,
) {
    registry
        .register(Arc::new(GenerateSpeechTool::new(
            config.clone(),
            orchestrator,
            player.clone(),
        )))
        .await;
    registry
        .register(Arc::new(ListPresetsTool::new(config.clone())))
        .await;
    registry
        .register(Arc::new(CacheStatsTool::new(cache.clone())))
        .await;
    registry
        .register(Arc::new(ClearCacheTool::new(cache.clone())))
        .await;
    registry
        .register(Arc::new(CleanupCacheTool::new(cache.clone())))
        .await;
    registry
        .register(Arc::new(ResizeCacheTool::new(cache)))
        .await;
    registry
        .register(Arc::new(SplitTextTool::new(&config)))
        .await;
    registry
        .register(Arc::new(MergeAudioFilesTool::new(merger, &config)))
        .await;
    registry
        .register(Arc::new(PlayAudioTool::new(player)))
        .await;
}
