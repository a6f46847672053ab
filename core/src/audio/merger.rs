//! Ordered concatenation of chunk audio into one artifact.
//!
//! With an [`AudioCodec`] available the inputs are decoded and re-encoded as a
//! single stream. Without one, or for raw `pcm`, the files are byte-concatenated,
//! which is exact for headerless pcm and best-effort for container formats.

use crate::audio::utils::{file_timestamp, get_from_path};
use crate::config::ResponseFormat;
use crate::{Result, TtsError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Something that can decode several audio files and encode them as one.
#[async_trait]
pub trait AudioCodec: Send + Sync {
    fn name(&self) -> String;

    /// Concatenate `inputs` in order into `output` encoded as `format`.
    async fn concat(&self, inputs: &[PathBuf], output: &Path, format: ResponseFormat) -> Result<()>;
}

/// Codec backed by the `ffmpeg` binary.
pub struct FfmpegCodec {
    bin: PathBuf,
}

impl FfmpegCodec {
    pub fn new(bin: PathBuf) -> Self {
        Self { bin }
    }

    /// Locate `ffmpeg` via FFMPEG_BIN or PATH.
    pub fn detect() -> Option<Self> {
        std::env::var("FFMPEG_BIN")
            .ok()
            .map(PathBuf::from)
            .filter(|p| p.exists())
            .or_else(|| get_from_path("ffmpeg"))
            .map(Self::new)
    }

    fn muxer(format: ResponseFormat) -> &'static str {
        match format {
            ResponseFormat::Mp3 => "mp3",
            ResponseFormat::Opus => "opus",
            ResponseFormat::Aac => "adts",
            ResponseFormat::Flac => "flac",
            ResponseFormat::Wav => "wav",
            ResponseFormat::Pcm => "s16le",
        }
    }

    fn filter_graph(inputs: usize) -> String {
        let labels: String = (0..inputs).map(|i| format!("[{i}:a]")).collect();
        format!("{labels}concat=n={inputs}:v=0:a=1[out]")
    }
}

#[async_trait]
impl AudioCodec for FfmpegCodec {
    fn name(&self) -> String {
        "ffmpeg".to_string()
    }

    async fn concat(&self, inputs: &[PathBuf], output: &Path, format: ResponseFormat) -> Result<()> {
        let mut cmd = Command::new(&self.bin);
        cmd.args(["-y", "-hide_banner", "-loglevel", "error"]);
        for input in inputs {
            cmd.arg("-i").arg(input);
        }
        cmd.arg("-filter_complex")
            .arg(Self::filter_graph(inputs.len()))
            .args(["-map", "[out]", "-f", Self::muxer(format)])
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        let out = cmd
            .output()
            .await
            .map_err(|e| TtsError::Merge(format!("Failed to run ffmpeg: {e}")))?;
        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            return Err(TtsError::Merge(format!(
                "ffmpeg exited with {}: {}",
                out.status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

pub struct AudioMerger {
    output_dir: PathBuf,
    codec: Option<Arc<dyn AudioCodec>>,
}

impl AudioMerger {
    /// Merger writing into `output_dir`, using ffmpeg when it is installed.
    pub fn new(output_dir: PathBuf) -> Self {
        let codec = FfmpegCodec::detect().map(|c| Arc::new(c) as Arc<dyn AudioCodec>);
        if codec.is_none() {
            info!(target: "audio_merger", "ffmpeg not found; merges fall back to byte concatenation");
        }
        Self::with_codec(output_dir, codec)
    }

    pub fn with_codec(output_dir: PathBuf, codec: Option<Arc<dyn AudioCodec>>) -> Self {
        Self { output_dir, codec }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn codec_name(&self) -> Option<String> {
        self.codec.as_ref().map(|c| c.name())
    }

    /// Merge `inputs` in order. A single input is returned as-is.
    pub async fn merge(&self, inputs: &[PathBuf], format: ResponseFormat) -> Result<PathBuf> {
        match inputs {
            [] => return Err(TtsError::Merge("No audio files to merge".to_string())),
            [only] => return Ok(only.clone()),
            _ => {}
        }
        if let Some(missing) = inputs.iter().find(|p| !p.exists()) {
            return Err(TtsError::Merge(format!(
                "Audio file not found: {}",
                missing.display()
            )));
        }

        tokio::fs::create_dir_all(&self.output_dir).await?;

        match &self.codec {
            Some(codec) if format != ResponseFormat::Pcm => {
                let output = self
                    .output_dir
                    .join(format!("merged_{}.{}", file_timestamp(), format.extension()));
                debug!(target: "audio_merger", codec = %codec.name(), files = inputs.len(), "Merging with codec");
                codec.concat(inputs, &output, format).await?;
                info!(target: "audio_merger", files = inputs.len(), output = %output.display(), "Merged audio files");
                Ok(output)
            }
            _ => self.concatenate(inputs, format).await,
        }
    }

    async fn concatenate(&self, inputs: &[PathBuf], format: ResponseFormat) -> Result<PathBuf> {
        if format != ResponseFormat::Pcm {
            warn!(target: "audio_merger", %format, "Byte-concatenating container audio; playback may stop early");
        }
        let output = self
            .output_dir
            .join(format!("concatenated_{}.{}", file_timestamp(), format.extension()));

        let mut out = tokio::fs::File::create(&output).await?;
        for input in inputs {
            let bytes = tokio::fs::read(input).await?;
            out.write_all(&bytes).await?;
        }
        out.flush().await?;

        info!(target: "audio_merger", files = inputs.len(), output = %output.display(), "Concatenated audio files");
        Ok(output)
    }
}

/// One-off merge into `output_dir` with codec auto-detection.
pub async fn merge_audio_files(
    paths: &[PathBuf],
    format: ResponseFormat,
    output_dir: &Path,
) -> Result<PathBuf> {
    AudioMerger::new(output_dir.to_path_buf())
        .merge(paths, format)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct RecordingCodec {
        calls: Mutex<Vec<Vec<PathBuf>>>,
        fail: bool,
    }

    #[async_trait]
    impl AudioCodec for RecordingCodec {
        fn name(&self) -> String {
            "recording".into()
        }

        async fn concat(&self, inputs: &[PathBuf], output: &Path, _: ResponseFormat) -> Result<()> {
            self.calls.lock().unwrap().push(inputs.to_vec());
            if self.fail {
                return Err(TtsError::Merge("codec broke".into()));
            }
            std::fs::write(output, b"encoded")?;
            Ok(())
        }
    }

    fn write(dir: &Path, name: &str, body: &[u8]) -> PathBuf {
        let p = dir.join(name);
        std::fs::write(&p, body).unwrap();
        p
    }

    #[tokio::test]
    async fn test_empty_and_single_input() {
        let dir = tempfile::tempdir().unwrap();
        let merger = AudioMerger::with_codec(dir.path().to_path_buf(), None);
        assert!(matches!(
            merger.merge(&[], ResponseFormat::Mp3).await,
            Err(TtsError::Merge(_))
        ));

        let one = write(dir.path(), "one.mp3", b"1");
        let out = merger.merge(&[one.clone()], ResponseFormat::Mp3).await.unwrap();
        assert_eq!(out, one);
    }

    #[tokio::test]
    async fn test_byte_concatenation_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let out_dir = dir.path().join("out");
        let merger = AudioMerger::with_codec(out_dir.clone(), None);
        let inputs = vec![
            write(dir.path(), "a.pcm", b"AA"),
            write(dir.path(), "b.pcm", b"BBB"),
            write(dir.path(), "c.pcm", b"C"),
        ];

        let out = merger.merge(&inputs, ResponseFormat::Pcm).await.unwrap();
        assert!(out.starts_with(&out_dir));
        let name = out.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("concatenated_") && name.ends_with(".pcm"));
        assert_eq!(std::fs::read(out).unwrap(), b"AABBBC");
    }

    #[tokio::test]
    async fn test_codec_used_except_for_pcm() {
        let dir = tempfile::tempdir().unwrap();
        let codec = Arc::new(RecordingCodec {
            calls: Mutex::new(Vec::new()),
            fail: false,
        });
        let merger = AudioMerger::with_codec(dir.path().to_path_buf(), Some(codec.clone()));
        let inputs = vec![write(dir.path(), "a.mp3", b"a"), write(dir.path(), "b.mp3", b"b")];

        let out = merger.merge(&inputs, ResponseFormat::Mp3).await.unwrap();
        assert!(out
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("merged_"));
        assert_eq!(codec.calls.lock().unwrap().as_slice(), &[inputs.clone()]);

        merger.merge(&inputs, ResponseFormat::Pcm).await.unwrap();
        assert_eq!(codec.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_codec_failure_is_merge_error() {
        let dir = tempfile::tempdir().unwrap();
        let codec = Arc::new(RecordingCodec {
            calls: Mutex::new(Vec::new()),
            fail: true,
        });
        let merger = AudioMerger::with_codec(dir.path().to_path_buf(), Some(codec));
        let inputs = vec![write(dir.path(), "a.mp3", b"a"), write(dir.path(), "b.mp3", b"b")];
        assert!(matches!(
            merger.merge(&inputs, ResponseFormat::Mp3).await,
            Err(TtsError::Merge(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_input_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let merger = AudioMerger::with_codec(dir.path().to_path_buf(), None);
        let inputs = vec![write(dir.path(), "a.wav", b"a"), dir.path().join("nope.wav")];
        assert!(merger.merge(&inputs, ResponseFormat::Wav).await.is_err());
    }

    #[test]
    fn test_filter_graph() {
        assert_eq!(
            FfmpegCodec::filter_graph(3),
            "[0:a][1:a][2:a]concat=n=3:v=0:a=1[out]"
        );
    }
}
