// Audio artifacts: merging chunk files and local playback

pub mod merger;
pub mod player;

pub use merger::{merge_audio_files, AudioCodec, AudioMerger, FfmpegCodec};
pub use player::{AudioPlayer, PlayCommand};

// Shared audio utilities
pub mod utils;
