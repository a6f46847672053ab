//! Request orchestration: split, look up the cache, synthesize chunks with
//! bounded concurrency, persist, and optionally merge.
//!
//! A request either fully succeeds or leaves nothing behind. Every chunk file
//! lives in the output directory, cache hits included (they are copied out of
//! the cache), so cache eviction never touches a returned path. Fresh chunk
//! files are only handed to the cache once every chunk succeeded; on any
//! failure, or when the request is abandoned, all of them are deleted.

use crate::audio::utils::{file_timestamp, gen_id, remove_file_best_effort};
use crate::audio::AudioMerger;
use crate::cache::{CacheKey, SharedCache};
use crate::config::{ResolvedParams, ResponseFormat, ServerConfig, Voice};
use crate::synthesis::client::{SpeechRequest, SpeechSynthesizer, SynthesisError};
use crate::text::TextSplitter;
use crate::{Result, TtsError};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

const ARTIFACT_PREFIXES: [&str; 3] = ["tts_", "merged_", "concatenated_"];

#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorConfig {
    pub output_dir: PathBuf,
    /// Texts longer than this (in chars) are split
    pub long_text_threshold: usize,
    /// Largest single chunk the provider accepts
    pub max_text_length: usize,
    pub max_concurrent_chunks: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self::from_server(&ServerConfig::default())
    }
}

impl OrchestratorConfig {
    pub fn from_server(server: &ServerConfig) -> Self {
        Self {
            output_dir: server.output_dir.clone(),
            long_text_threshold: server.long_text_split_size,
            max_text_length: server.max_text_length,
            max_concurrent_chunks: server.max_concurrent_chunks,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisRequest {
    pub text: String,
    pub voice: Voice,
    pub speed: f64,
    pub format: ResponseFormat,
    pub instructions: Option<String>,
    pub use_cache: bool,
    pub merge: bool,
    /// When false, text over the provider limit is rejected instead of split
    pub split: bool,
}

impl SynthesisRequest {
    pub fn new(text: impl Into<String>, params: &ResolvedParams) -> Self {
        Self {
            text: text.into(),
            voice: params.voice,
            speed: params.speed,
            format: params.response_format,
            instructions: params.instructions.clone(),
            use_cache: true,
            merge: true,
            split: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisOutcome {
    /// Merged file, or the first chunk when nothing was merged
    pub primary_path: PathBuf,
    pub chunk_paths: Vec<PathBuf>,
    pub merged: bool,
    pub chunk_count: usize,
    pub cached_chunks: usize,
}

enum ChunkAudio {
    Cached(PathBuf),
    Fresh { path: PathBuf, key: CacheKey },
}

impl ChunkAudio {
    fn path(&self) -> &PathBuf {
        match self {
            ChunkAudio::Cached(path) | ChunkAudio::Fresh { path, .. } => path,
        }
    }
}

pub struct SynthesisOrchestrator {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    cache: Option<SharedCache>,
    merger: Arc<AudioMerger>,
    config: OrchestratorConfig,
}

impl SynthesisOrchestrator {
    pub fn new(
        synthesizer: Arc<dyn SpeechSynthesizer>,
        cache: Option<SharedCache>,
        merger: Arc<AudioMerger>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            synthesizer,
            cache,
            merger,
            config,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    fn plan_chunks(&self, text: &str, split: bool) -> Result<Vec<String>> {
        let chars = text.chars().count();
        if chars > self.config.long_text_threshold && split {
            return Ok(TextSplitter::new(self.config.long_text_threshold).split_text(text));
        }
        if chars > self.config.max_text_length {
            return Err(TtsError::Validation(format!(
                "Text is {chars} characters; the limit is {} unless long text splitting is enabled",
                self.config.max_text_length
            )));
        }
        Ok(vec![text.to_string()])
    }

    #[tracing::instrument(skip(self, request), fields(voice = %request.voice, format = %request.format))]
    pub async fn synthesize(&self, request: SynthesisRequest) -> Result<SynthesisOutcome> {
        let text = request.text.trim();
        if text.is_empty() {
            return Err(TtsError::Validation("Text must not be empty".to_string()));
        }
        let chunks = self.plan_chunks(text, request.split)?;
        let total = chunks.len();
        info!(target: "orchestrator", chunks = total, chars = text.chars().count(), "Synthesizing");

        tokio::fs::create_dir_all(&self.config.output_dir).await?;

        let cache = if request.use_cache { self.cache.clone() } else { None };
        let targets: Vec<PathBuf> = (0..total)
            .map(|index| {
                self.config.output_dir.join(format!(
                    "tts_{}_{}{index:03}.{}",
                    file_timestamp(),
                    gen_id(),
                    request.format.extension()
                ))
            })
            .collect();

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_chunks.max(1)));
        let mut batch = ChunkBatch::new(targets.clone());
        for (index, chunk) in chunks.into_iter().enumerate() {
            let semaphore = semaphore.clone();
            let synthesizer = self.synthesizer.clone();
            let cache = cache.clone();
            let target = targets[index].clone();
            let mut cancel = batch.subscribe();
            let speech = SpeechRequest {
                text: chunk,
                voice: request.voice,
                speed: request.speed,
                response_format: request.format,
                instructions: request.instructions.clone(),
            };
            batch.tasks.spawn(async move {
                let permit = tokio::select! {
                    biased;
                    _ = cancel.wait_for(|c| *c) => return (index, Err(SynthesisError::Cancelled)),
                    permit = semaphore.acquire_owned() => permit,
                };
                let result = match permit {
                    Ok(_permit) => render_chunk(synthesizer, cache, speech, target, &mut cancel).await,
                    Err(_) => Err(SynthesisError::Provider("Synthesis pool closed".to_string())),
                };
                (index, result)
            });
        }

        let mut slots: Vec<Option<ChunkAudio>> = (0..total).map(|_| None).collect();
        let mut failure: Option<(usize, SynthesisError)> = None;
        while let Some(joined) = batch.tasks.join_next().await {
            match joined {
                Ok((index, Ok(audio))) => slots[index] = Some(audio),
                Ok((_, Err(SynthesisError::Cancelled))) => {}
                Ok((index, Err(e))) => {
                    warn!(target: "orchestrator", chunk = index, error = %e, "Chunk synthesis failed");
                    if failure.as_ref().map_or(true, |(first, _)| index < *first) {
                        failure = Some((index, e));
                    }
                    batch.cancel();
                }
                Err(e) => {
                    warn!(target: "orchestrator", error = %e, "Chunk task panicked");
                    batch.cancel();
                }
            }
        }

        let failure = failure.or_else(|| {
            slots.iter().position(Option::is_none).map(|index| {
                (index, SynthesisError::Provider("Chunk task did not complete".to_string()))
            })
        });

        if let Some((index, source)) = failure {
            let removed = batch.discard().await;
            info!(target: "orchestrator", removed, "Discarded partial request artifacts");
            let err = if total == 1 {
                source
            } else {
                SynthesisError::ChunkFailed {
                    index,
                    total,
                    source: Box::new(source),
                }
            };
            return Err(err.into());
        }
        batch.keep();

        let audio: Vec<ChunkAudio> = slots.into_iter().flatten().collect();

        if let Some(cache) = &cache {
            let mut cache = cache.lock().await;
            for chunk in &audio {
                if let ChunkAudio::Fresh { path, key } = chunk {
                    cache.put(key, path);
                }
            }
        }

        let cached_chunks = audio
            .iter()
            .filter(|c| matches!(c, ChunkAudio::Cached(_)))
            .count();
        let chunk_paths: Vec<PathBuf> = audio.iter().map(|c| c.path().clone()).collect();

        let (primary_path, merged) = if chunk_paths.len() > 1 && request.merge {
            match self.merger.merge(&chunk_paths, request.format).await {
                Ok(path) => (path, true),
                Err(e) => {
                    warn!(target: "orchestrator", error = %e, "Merge failed; returning first chunk");
                    (chunk_paths[0].clone(), false)
                }
            }
        } else {
            (chunk_paths[0].clone(), false)
        };

        info!(
            target: "orchestrator",
            chunks = total,
            cached = cached_chunks,
            merged,
            path = %primary_path.display(),
            "Synthesis complete"
        );

        Ok(SynthesisOutcome {
            primary_path,
            chunk_paths,
            merged,
            chunk_count: total,
            cached_chunks,
        })
    }

    /// Delete generated artifacts in the output directory older than
    /// `max_age_hours`. Returns the number removed.
    pub async fn cleanup_old_files(&self, max_age_hours: u64) -> usize {
        let Ok(mut entries) = tokio::fs::read_dir(&self.config.output_dir).await else {
            return 0;
        };
        let max_age = Duration::from_secs(max_age_hours.saturating_mul(3600));
        let now = SystemTime::now();
        let mut removed = 0;

        while let Ok(Some(entry)) = entries.next_entry().await {
            let name = entry.file_name().to_string_lossy().to_string();
            if !ARTIFACT_PREFIXES.iter().any(|p| name.starts_with(p)) {
                continue;
            }
            let Ok(meta) = entry.metadata().await else {
                continue;
            };
            let age = meta
                .modified()
                .ok()
                .and_then(|m| now.duration_since(m).ok())
                .unwrap_or_default();
            if meta.is_file() && age > max_age && remove_file_best_effort(&entry.path()) {
                removed += 1;
            }
        }

        if removed > 0 {
            debug!(target: "orchestrator", removed, "Removed old artifacts");
        }
        removed
    }
}

async fn render_chunk(
    synthesizer: Arc<dyn SpeechSynthesizer>,
    cache: Option<SharedCache>,
    request: SpeechRequest,
    target: PathBuf,
    cancel: &mut watch::Receiver<bool>,
) -> ChunkResult {
    let key = CacheKey::new(
        request.text.as_str(),
        request.voice.as_str(),
        request.speed,
        request.response_format.as_str(),
        request.instructions.clone(),
    );

    if let Some(cache) = &cache {
        let hit = cache.lock().await.get(&key);
        if let Some(hit) = hit {
            // The request owns a copy; eviction may delete the cached file later.
            match tokio::fs::copy(&hit, &target).await {
                Ok(_) => return Ok(ChunkAudio::Cached(target)),
                Err(e) => {
                    warn!(target: "orchestrator", path = %hit.display(), error = %e, "Cached audio unreadable; synthesizing");
                }
            }
        }
    }

    let audio = tokio::select! {
        biased;
        _ = cancel.wait_for(|c| *c) => return Err(SynthesisError::Cancelled),
        audio = synthesizer.synthesize(&request) => audio?,
    };
    // Not cancellable from here on; the batch waits for the write before removing the file.
    let bytes = audio.write_to(&target).await?;
    debug!(target: "orchestrator", path = %target.display(), bytes, "Wrote chunk audio");
    Ok(ChunkAudio::Fresh { path: target, key })
}

type ChunkResult = std::result::Result<ChunkAudio, SynthesisError>;

/// Chunk tasks of one request and the files they may write.
///
/// Dropping an unsettled batch (the request future was abandoned, e.g. by a
/// tool timeout) cancels the tasks and removes the files once every task has
/// stopped, so no late write can recreate a deleted file.
struct ChunkBatch {
    tasks: JoinSet<(usize, ChunkResult)>,
    cancel: watch::Sender<bool>,
    targets: Vec<PathBuf>,
    settled: bool,
}

impl ChunkBatch {
    fn new(targets: Vec<PathBuf>) -> Self {
        let (cancel, _) = watch::channel(false);
        Self {
            tasks: JoinSet::new(),
            cancel,
            targets,
            settled: false,
        }
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.cancel.subscribe()
    }

    fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    /// Cancel, wait for every task, then delete the request's files.
    async fn discard(&mut self) -> usize {
        self.cancel();
        while self.tasks.join_next().await.is_some() {}
        self.settled = true;
        remove_targets(&self.targets)
    }

    fn keep(&mut self) {
        self.settled = true;
    }
}

impl Drop for ChunkBatch {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        self.cancel();
        let mut tasks = std::mem::replace(&mut self.tasks, JoinSet::new());
        let targets = std::mem::take(&mut self.targets);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    while tasks.join_next().await.is_some() {}
                    let removed = remove_targets(&targets);
                    info!(target: "orchestrator", removed, "Discarded artifacts of an abandoned request");
                });
            }
            Err(_) => {
                tasks.detach_all();
                remove_targets(&targets);
            }
        }
    }
}

fn remove_targets(targets: &[PathBuf]) -> usize {
    targets
        .iter()
        .filter(|t| t.exists() && remove_file_best_effort(t))
        .count()
}
