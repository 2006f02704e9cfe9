use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::Deserialize;

use crate::dsp::mel::VocoderKind;

/// Default config location relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "configs/stagehand.toml";

/// Application configuration loaded from TOML config file.
/// All fields have sensible defaults — the config file is optional.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Dataset root scanned for `<speaker>/<clip>.wav` inputs
    /// (used when `extract` has no `--in-dir`).
    pub dataset_dir: PathBuf,
    /// Number of parallel workers. 0 = auto-detect (cores / 2, min 1).
    pub workers: usize,
    /// Audio framing shared by every extractor.
    pub data: DataConfig,
    /// Training-side switches that change which artifacts are required.
    pub model: ModelConfig,
    /// Mel front-end of the diffusion refiner's vocoder.
    pub vocoder: VocoderConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            dataset_dir: PathBuf::from("dataset/44k"),
            workers: 0,
            data: DataConfig::default(),
            model: ModelConfig::default(),
            vocoder: VocoderConfig::default(),
        }
    }
}

/// Audio framing configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Sample rate every input clip must already be at.
    pub sampling_rate: u32,
    /// Analysis hop in samples. Every artifact is framed at this rate.
    pub hop_length: usize,
    /// FFT size of the linear spectrogram.
    pub filter_length: usize,
    /// Analysis window of the linear spectrogram.
    pub win_length: usize,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            sampling_rate: 44100,
            hop_length: 512,
            filter_length: 2048,
            win_length: 2048,
        }
    }
}

/// Training-side model switches.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ModelConfig {
    /// Volume embedding conditioning. Forces loudness extraction even
    /// when the diffusion artifacts are not requested.
    pub vol_embedding: bool,
}

/// Mel front-end configuration, matching the vocoder the refiner trains
/// against.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VocoderConfig {
    /// Log compression convention of the vocoder.
    pub kind: VocoderKind,
    /// Rate the vocoder was trained at. Clips at a different rate are
    /// resampled before mel extraction.
    pub sample_rate: u32,
    pub n_fft: usize,
    pub win_length: usize,
    pub hop_length: usize,
    pub num_mels: usize,
    pub mel_fmin: f32,
    pub mel_fmax: f32,
}

impl Default for VocoderConfig {
    fn default() -> Self {
        Self {
            kind: VocoderKind::NsfHifigan,
            sample_rate: 44100,
            n_fft: 2048,
            win_length: 2048,
            hop_length: 512,
            num_mels: 128,
            mel_fmin: 40.0,
            mel_fmax: 16000.0,
        }
    }
}

impl AppConfig {
    /// Load config from `--config`, then `configs/stagehand.toml`, then
    /// `~/.config/stagehand/config.toml`.
    /// Returns default config if no file is found.
    /// Logs a warning if a file exists but can't be read or parsed.
    pub fn load(explicit: Option<&Path>) -> Self {
        let Some(path) = Self::resolve_path(explicit) else {
            log::debug!("No config file found, using defaults");
            return Self::default();
        };
        match std::fs::read_to_string(&path) {
            Ok(contents) => match toml::from_str::<AppConfig>(&contents) {
                Ok(config) => {
                    log::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    log::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                log::warn!("Failed to read {}: {}. Using defaults.", path.display(), e);
                Self::default()
            }
        }
    }

    /// Resolve worker count: 0 → auto-detect (cores / 2, min 1).
    pub fn resolve_workers(&self) -> usize {
        if self.workers > 0 {
            self.workers
        } else {
            let cores = std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(2);
            (cores / 2).max(1)
        }
    }

    /// Pick the config file to load. An explicit path is always used so a
    /// typo surfaces as a read warning instead of silent defaults.
    fn resolve_path(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }
        let local = PathBuf::from(DEFAULT_CONFIG_PATH);
        if local.exists() {
            return Some(local);
        }
        ProjectDirs::from("", "", crate::APP_NAME)
            .map(|dirs| dirs.config_dir().join("config.toml"))
            .filter(|path| path.exists())
    }
}
