//! Local playback through whatever system player is installed.
//!
//! - macOS: afplay
//! - Linux: paplay, aplay (wav only), ffplay, mpg123 (mp3 only); first found
//! - Windows: PowerShell, `Media.SoundPlayer` for wav and `Start-Process` otherwise
//!
//! TTS_PLAYER may name a preferred binary; it is tried first on any platform.

use crate::audio::utils::get_from_path;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Program plus arguments for one playback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayCommand {
    pub program: PathBuf,
    pub args: Vec<OsString>,
}

#[derive(Debug, Clone, Default)]
pub struct AudioPlayer {
    preferred: Option<String>,
}

impl AudioPlayer {
    pub fn new(preferred: Option<String>) -> Self {
        Self { preferred }
    }

    pub fn detect() -> Self {
        Self::new(std::env::var("TTS_PLAYER").ok().filter(|s| !s.is_empty()))
    }

    /// Play `path` to completion. Returns `false` when the file is missing, no
    /// player applies on this platform, or the player fails.
    pub async fn play(&self, path: &Path) -> bool {
        if !path.exists() {
            warn!(target: "audio_player", path = %path.display(), "Audio file not found");
            return false;
        }

        let Some(cmd) = self.command_for(path) else {
            info!(target: "audio_player", os = std::env::consts::OS, "No audio player available");
            return false;
        };

        debug!(target: "audio_player", program = %cmd.program.display(), path = %path.display(), "Playing audio");
        let status = Command::new(&cmd.program)
            .args(&cmd.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        match status {
            Ok(s) if s.success() => true,
            Ok(s) => {
                warn!(target: "audio_player", status = %s, "Audio player exited with failure");
                false
            }
            Err(e) => {
                warn!(target: "audio_player", error = %e, "Failed to start audio player");
                false
            }
        }
    }

    pub fn command_for(&self, path: &Path) -> Option<PlayCommand> {
        if let Some(bin) = self.preferred.as_deref().and_then(get_from_path) {
            return Some(with_player_args(bin, path));
        }
        select_command(std::env::consts::OS, path, get_from_path)
    }
}

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default()
}

fn with_player_args(bin: PathBuf, path: &Path) -> PlayCommand {
    let name = bin
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_string();
    let mut args: Vec<OsString> = Vec::new();
    match name.as_str() {
        "ffplay" => args.extend(["-nodisp", "-autoexit", "-loglevel", "quiet"].map(OsString::from)),
        "mpg123" => args.push("-q".into()),
        _ => {}
    }
    args.push(path.as_os_str().to_owned());
    PlayCommand { program: bin, args }
}

/// Pick a player for `os`, resolving binaries through `lookup`.
pub fn select_command(
    os: &str,
    path: &Path,
    lookup: impl Fn(&str) -> Option<PathBuf>,
) -> Option<PlayCommand> {
    let ext = extension(path);
    match os {
        "macos" => lookup("afplay").map(|bin| with_player_args(bin, path)),
        "linux" => {
            let candidates: [(&str, bool); 4] = [
                ("paplay", true),
                ("aplay", ext == "wav"),
                ("ffplay", true),
                ("mpg123", ext == "mp3"),
            ];
            candidates
                .iter()
                .filter(|(_, applies)| *applies)
                .find_map(|(name, _)| lookup(name))
                .map(|bin| with_player_args(bin, path))
        }
        "windows" => {
            let quoted = path.display().to_string().replace('\'', "''");
            let script = if ext == "wav" {
                format!("(New-Object Media.SoundPlayer '{quoted}').PlaySync()")
            } else {
                format!("Start-Process -FilePath '{quoted}' -Wait")
            };
            Some(PlayCommand {
                program: PathBuf::from("powershell"),
                args: vec!["-NoProfile".into(), "-Command".into(), script.into()],
            })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn only(available: &'static [&'static str]) -> impl Fn(&str) -> Option<PathBuf> {
        move |name| {
            available
                .contains(&name)
                .then(|| PathBuf::from(format!("/usr/bin/{name}")))
        }
    }

    #[test]
    fn test_linux_prefers_paplay() {
        let cmd = select_command("linux", Path::new("/tmp/a.mp3"), only(&["paplay", "ffplay"])).unwrap();
        assert_eq!(cmd.program, PathBuf::from("/usr/bin/paplay"));
        assert_eq!(cmd.args, vec![OsString::from("/tmp/a.mp3")]);
    }

    #[test]
    fn test_linux_aplay_only_for_wav() {
        assert!(select_command("linux", Path::new("a.mp3"), only(&["aplay"])).is_none());
        let cmd = select_command("linux", Path::new("a.wav"), only(&["aplay"])).unwrap();
        assert_eq!(cmd.program, PathBuf::from("/usr/bin/aplay"));
    }

    #[test]
    fn test_linux_ffplay_flags_and_mpg123() {
        let cmd = select_command("linux", Path::new("a.flac"), only(&["ffplay", "mpg123"])).unwrap();
        assert!(cmd.args.contains(&OsString::from("-nodisp")));
        assert!(cmd.args.contains(&OsString::from("-autoexit")));

        assert!(select_command("linux", Path::new("a.flac"), only(&["mpg123"])).is_none());
        assert!(select_command("linux", Path::new("a.mp3"), only(&["mpg123"])).is_some());
    }

    #[test]
    fn test_windows_and_unknown_platforms() {
        let wav = select_command("windows", Path::new("C:/x.wav"), only(&[])).unwrap();
        assert!(wav.args[2].to_string_lossy().contains("Media.SoundPlayer"));
        let mp3 = select_command("windows", Path::new("C:/x.mp3"), only(&[])).unwrap();
        assert!(mp3.args[2].to_string_lossy().contains("Start-Process"));
        assert!(select_command("freebsd", Path::new("a.wav"), only(&["paplay"])).is_none());
        assert!(select_command("macos", Path::new("a.wav"), only(&[])).is_none());
    }

    #[tokio::test]
    async fn test_missing_file_is_false() {
        let player = AudioPlayer::default();
        assert!(!player.play(Path::new("/no/such/audio.mp3")).await);
    }
}
