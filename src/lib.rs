pub mod artifacts;
pub mod audio;
pub mod augment;
pub mod config;
pub mod discover;
pub mod dsp;
pub mod pipeline;

/// Audio file extension we process. Earlier dataset stages are expected to
/// have resampled every clip to wav at the training rate.
pub const WAV_EXTENSION: &str = "wav";

/// Application name for XDG paths
pub const APP_NAME: &str = "stagehand";
