use async_trait::async_trait;
use bytes::Bytes;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tts_mcp_core::audio::AudioMerger;
use tts_mcp_core::cache::{shared, SharedCache, TtsCache};
use tts_mcp_core::config::{ResponseFormat, Voice};
use tts_mcp_core::synthesis::{
    OrchestratorConfig, SpeechAudio, SpeechRequest, SpeechSynthesizer, SynthesisError,
    SynthesisOrchestrator, SynthesisRequest,
};
use tts_mcp_core::TtsError;

/// Returns the request text as audio bytes and records concurrency.
#[derive(Default)]
struct FakeSynthesizer {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    calls: Mutex<Vec<String>>,
    fail_on: Option<String>,
    stall_on: Option<String>,
    stream: bool,
}

impl FakeSynthesizer {
    fn failing_on(text: &str) -> Self {
        Self {
            fail_on: Some(text.to_string()),
            ..Default::default()
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for FakeSynthesizer {
    async fn synthesize(&self, request: &SpeechRequest) -> Result<SpeechAudio, SynthesisError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.calls.lock().unwrap().push(request.text.clone());
        tokio::time::sleep(Duration::from_millis(20)).await;
        if self.stall_on.as_deref().is_some_and(|s| request.text.contains(s)) {
            tokio::time::sleep(Duration::from_secs(60)).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail_on.as_deref().is_some_and(|f| request.text.contains(f)) {
            return Err(SynthesisError::classify("You exceeded your current quota"));
        }
        let body = Bytes::from(format!("[{}]", request.text));
        if self.stream {
            let parts: Vec<std::io::Result<Bytes>> =
                vec![Ok(body.slice(..1)), Ok(body.slice(1..))];
            Ok(SpeechAudio::ByteStream(Box::pin(tokio_stream::iter(parts))))
        } else {
            Ok(SpeechAudio::RawBytes(body))
        }
    }
}

fn orchestrator(
    synth: Arc<FakeSynthesizer>,
    cache: Option<SharedCache>,
    out: &Path,
    threshold: usize,
    concurrency: usize,
) -> SynthesisOrchestrator {
    SynthesisOrchestrator::new(
        synth,
        cache,
        Arc::new(AudioMerger::with_codec(out.to_path_buf(), None)),
        OrchestratorConfig {
            output_dir: out.to_path_buf(),
            long_text_threshold: threshold,
            max_text_length: threshold,
            max_concurrent_chunks: concurrency,
        },
    )
}

fn request(text: &str) -> SynthesisRequest {
    SynthesisRequest {
        text: text.to_string(),
        voice: Voice::Onyx,
        speed: 1.0,
        format: ResponseFormat::Pcm,
        instructions: None,
        use_cache: true,
        merge: true,
        split: true,
    }
}

fn sentences(n: usize) -> String {
    (0..n)
        .map(|i| format!("Sentence {i:02} is here."))
        .collect::<Vec<_>>()
        .join(" ")
}

fn tts_files(dir: &Path) -> usize {
    std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with("tts_"))
        .count()
}

#[tokio::test]
async fn test_concurrency_is_bounded() {
    let out = tempfile::tempdir().unwrap();
    let synth = Arc::new(FakeSynthesizer::default());
    let orch = orchestrator(synth.clone(), None, out.path(), 25, 2);

    let outcome = orch.synthesize(request(&sentences(8))).await.unwrap();
    assert_eq!(outcome.chunk_count, 8);
    assert!(synth.peak.load(Ordering::SeqCst) <= 2);
    assert!(synth.peak.load(Ordering::SeqCst) >= 1);
}

#[tokio::test]
async fn test_chunks_reassembled_in_split_order() {
    let out = tempfile::tempdir().unwrap();
    let synth = Arc::new(FakeSynthesizer::default());
    let orch = orchestrator(synth, None, out.path(), 25, 4);

    let text = sentences(6);
    let outcome = orch.synthesize(request(&text)).await.unwrap();
    assert!(outcome.merged);

    let expected: String = (0..6).map(|i| format!("[Sentence {i:02} is here.]")).collect();
    assert_eq!(std::fs::read_to_string(&outcome.primary_path).unwrap(), expected);
    for (i, path) in outcome.chunk_paths.iter().enumerate() {
        assert_eq!(
            std::fs::read_to_string(path).unwrap(),
            format!("[Sentence {i:02} is here.]")
        );
    }
}

#[tokio::test]
async fn test_merge_disabled_returns_first_chunk() {
    let out = tempfile::tempdir().unwrap();
    let orch = orchestrator(Arc::new(FakeSynthesizer::default()), None, out.path(), 25, 3);

    let mut req = request(&sentences(3));
    req.merge = false;
    let outcome = orch.synthesize(req).await.unwrap();
    assert!(!outcome.merged);
    assert_eq!(outcome.primary_path, outcome.chunk_paths[0]);
    assert_eq!(outcome.chunk_paths.len(), 3);
}

#[tokio::test]
async fn test_failure_cleans_up_everything() {
    let out = tempfile::tempdir().unwrap();
    let cache_dir = tempfile::tempdir().unwrap();
    let cache = shared(TtsCache::new(50, 24, Some(cache_dir.path().to_path_buf())).unwrap());
    let synth = Arc::new(FakeSynthesizer::failing_on("Sentence 03"));
    let orch = orchestrator(synth, Some(cache.clone()), out.path(), 25, 2);

    let err = orch.synthesize(request(&sentences(5))).await.unwrap_err();
    match &err {
        TtsError::Synthesis(SynthesisError::ChunkFailed { index, total, .. }) => {
            assert_eq!(*index, 3);
            assert_eq!(*total, 5);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.to_string().contains("quota"));
    assert_eq!(tts_files(out.path()), 0);
    assert!(cache.lock().await.is_empty());
}

#[tokio::test]
async fn test_partial_cache_hits_are_reused() {
    let out = tempfile::tempdir().unwrap();
    let cache_dir = tempfile::tempdir().unwrap();
    let cache = shared(TtsCache::new(50, 24, Some(cache_dir.path().to_path_buf())).unwrap());
    let synth = Arc::new(FakeSynthesizer::default());
    let orch = orchestrator(synth.clone(), Some(cache.clone()), out.path(), 25, 3);

    orch.synthesize(request(&sentences(2))).await.unwrap();
    assert_eq!(synth.calls.lock().unwrap().len(), 2);

    // The first two sentences are cached; only the third is new
    let outcome = orch.synthesize(request(&sentences(3))).await.unwrap();
    assert_eq!(outcome.cached_chunks, 2);
    assert_eq!(synth.calls.lock().unwrap().len(), 3);
    assert_eq!(cache.lock().await.len(), 3);
}

#[tokio::test]
async fn test_streamed_audio_is_written() {
    let out = tempfile::tempdir().unwrap();
    let synth = Arc::new(FakeSynthesizer {
        stream: true,
        ..Default::default()
    });
    let orch = orchestrator(synth, None, out.path(), 100, 3);

    let outcome = orch.synthesize(request("Streamed.")).await.unwrap();
    assert_eq!(
        std::fs::read_to_string(outcome.primary_path).unwrap(),
        "[Streamed.]"
    );
}

#[tokio::test]
async fn test_instructions_change_cache_identity() {
    let out = tempfile::tempdir().unwrap();
    let cache_dir = tempfile::tempdir().unwrap();
    let cache = shared(TtsCache::new(50, 24, Some(cache_dir.path().to_path_buf())).unwrap());
    let synth = Arc::new(FakeSynthesizer::default());
    let orch = orchestrator(synth.clone(), Some(cache), out.path(), 100, 3);

    orch.synthesize(request("Same text.")).await.unwrap();
    let mut styled = request("Same text.");
    styled.instructions = Some("Whisper".to_string());
    let outcome = orch.synthesize(styled).await.unwrap();
    assert_eq!(outcome.cached_chunks, 0);
    assert_eq!(synth.calls.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_abandoned_request_removes_written_chunks() {
    let out = tempfile::tempdir().unwrap();
    let synth = Arc::new(FakeSynthesizer {
        stall_on: Some("Sentence 02".to_string()),
        ..Default::default()
    });
    let orch = orchestrator(synth.clone(), None, out.path(), 25, 3);

    // Same shape as the tool registry's per-call timeout
    let res = tokio::time::timeout(
        Duration::from_millis(300),
        orch.synthesize(request(&sentences(3))),
    )
    .await;
    assert!(res.is_err());
    assert_eq!(synth.calls.lock().unwrap().len(), 3);

    for _ in 0..50 {
        if tts_files(out.path()) == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(tts_files(out.path()), 0);
}

#[tokio::test]
async fn test_cache_hits_copied_into_output_dir() {
    let out = tempfile::tempdir().unwrap();
    let cache_dir = tempfile::tempdir().unwrap();
    let cache = shared(TtsCache::new(50, 24, Some(cache_dir.path().to_path_buf())).unwrap());
    let orch = orchestrator(
        Arc::new(FakeSynthesizer::default()),
        Some(cache.clone()),
        out.path(),
        100,
        3,
    );

    orch.synthesize(request("Copied.")).await.unwrap();
    let hit = orch.synthesize(request("Copied.")).await.unwrap();
    assert_eq!(hit.cached_chunks, 1);
    assert!(hit.primary_path.starts_with(out.path()));

    cache.lock().await.clear();
    assert_eq!(std::fs::read_to_string(&hit.primary_path).unwrap(), "[Copied.]");
}
