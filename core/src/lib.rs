// TTS MCP Core Library
// Speech synthesis, audio caching and MCP tool serving

pub mod audio;
pub mod cache;
pub mod config;
pub mod mcp;
pub mod synthesis;
pub mod text;
pub mod tools;

// Export core types
pub use audio::{merge_audio_files, AudioMerger, AudioPlayer};
pub use cache::{CacheKey, CacheStats, SharedCache, TtsCache};
pub use config::{OutputMode, ResponseFormat, TtsConfig, TtsPreset, Voice};
pub use mcp::McpServer;
pub use synthesis::{
    OpenAiSpeechClient, SpeechSynthesizer, SynthesisError, SynthesisOrchestrator,
};
pub use text::{split_long_text, TextSplitter};

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TtsError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Synthesis(#[from] SynthesisError),

    #[error("Merge error: {0}")]
    Merge(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}
pub type Result<T> = std::result::Result<T, TtsError>;

/// Core runtime: wires cache, synthesis, playback and the tool registry.
pub struct TtsRuntime {
    pub config: Arc<TtsConfig>,
    pub cache: Option<SharedCache>,
    pub orchestrator: Arc<SynthesisOrchestrator>,
    pub player: Arc<AudioPlayer>,
    pub merger: Arc<AudioMerger>,
    pub tool_registry: tools::ToolRegistry,
}

impl TtsRuntime {
    /// Build a runtime backed by the OpenAI speech endpoint. Fails without an
    /// API key.
    pub async fn new(config: TtsConfig) -> Result<Self> {
        let client = OpenAiSpeechClient::new(config.provider.clone())?;
        Self::with_synthesizer(config, Arc::new(client)).await
    }

    pub async fn with_synthesizer(
        config: TtsConfig,
        synthesizer: Arc<dyn SpeechSynthesizer>,
    ) -> Result<Self> {
        let config = Arc::new(config);

        let cache = if config.cache.enabled {
            Some(cache::shared(TtsCache::from_config(&config.cache)?))
        } else {
            tracing::info!(target: "tts_runtime", "Audio cache disabled");
            None
        };

        let merger = Arc::new(AudioMerger::new(config.server.output_dir.clone()));
        let orchestrator = Arc::new(SynthesisOrchestrator::new(
            synthesizer,
            cache.clone(),
            merger.clone(),
            synthesis::OrchestratorConfig::from_server(&config.server),
        ));
        let player = Arc::new(AudioPlayer::detect());

        let tool_registry =
            tools::ToolRegistry::with_timeout(Duration::from_millis(config.server.tool_timeout_ms));
        tools::native::register_tts_tools(
            &tool_registry,
            config.clone(),
            orchestrator.clone(),
            cache.clone(),
            merger.clone(),
            player.clone(),
        )
        .await;

        Ok(Self {
            config,
            cache,
            orchestrator,
            player,
            merger,
            tool_registry,
        })
    }

    /// Prepare the output directory and drop artifacts left by earlier runs.
    pub async fn start(&self) -> Result<()> {
        tracing::info!("Starting TTS runtime...");

        tokio::fs::create_dir_all(&self.config.server.output_dir).await?;
        let removed = self
            .orchestrator
            .cleanup_old_files(self.config.server.temp_dir_cleanup_hours)
            .await;
        if removed > 0 {
            tracing::info!(removed, "Removed stale audio artifacts");
        }

        tracing::info!("TTS runtime started successfully");
        Ok(())
    }

    pub fn mcp_server(&self) -> McpServer {
        McpServer::new(
            self.tool_registry.clone(),
            mcp::ServerInfo {
                name: self.config.server.name.clone(),
                version: self.config.server.version.clone(),
            },
        )
    }
}
