use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use indicatif::{ProgressBar, ProgressStyle};
use ndarray::Array1;
use thiserror::Error;

use crate::artifacts::{self, Artifact};
use crate::audio;
use crate::augment;
use crate::config::AppConfig;
use crate::dsp::f0::{self, F0Method, F0Predictor};
use crate::dsp::mel::{MelError, MelExtractor};
use crate::dsp::stft::Spectrogram;
use crate::dsp::volume::VolumeExtractor;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Audio error: {0}")]
    Audio(#[from] audio::AudioError),
    #[error("{path}: sample rate {got} doesn't match target {want}")]
    SampleRateMismatch { path: String, got: u32, want: u32 },
    #[error("Artifact error: {0}")]
    Artifact(#[from] artifacts::ArtifactError),
    #[error("Mel error: {0}")]
    Mel(#[from] MelError),
}

pub struct ExtractResult {
    pub processed: u64,
    pub failed: u64,
}

/// Per-run switches for one extraction pass.
pub struct ExtractOptions {
    pub f0_method: F0Method,
    pub use_diff: bool,
    pub force: bool,
    pub workers: usize,
}

/// Extractors built once per run and shared read-only by the workers.
struct Extractors {
    f0: Box<dyn F0Predictor + Send + Sync>,
    spectrogram: Spectrogram,
    volume: VolumeExtractor,
    /// Present only in diffusion mode.
    mel: Option<MelExtractor>,
}

impl Extractors {
    fn new(config: &AppConfig, opts: &ExtractOptions) -> Self {
        let data = &config.data;
        Self {
            f0: f0::create_predictor(
                opts.f0_method,
                data.sampling_rate,
                data.hop_length,
                f0::VOICING_THRESHOLD,
            ),
            spectrogram: Spectrogram::new(data.filter_length, data.hop_length, data.win_length),
            volume: VolumeExtractor::new(data.hop_length),
            mel: opts.use_diff.then(|| MelExtractor::new(&config.vocoder)),
        }
    }
}

/// Extract features for `files` in parallel.
///
/// The file list is split into one contiguous chunk per worker up front;
/// each worker walks its chunk sequentially. Failures are logged and
/// counted without stopping the run, so a rerun picks up whatever is
/// still missing.
pub fn extract_features(
    config: &AppConfig,
    files: &[PathBuf],
    opts: &ExtractOptions,
) -> ExtractResult {
    if files.is_empty() {
        log::info!("No wav files to process");
        return ExtractResult {
            processed: 0,
            failed: 0,
        };
    }

    log::info!(
        "Extracting features for {} files with {} workers",
        files.len(),
        opts.workers
    );

    let extractors = Extractors::new(config, opts);

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
        )
        .unwrap()
        .progress_chars("#>-"),
    );

    // Configure rayon thread pool
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(opts.workers)
        .build()
        .unwrap();

    let chunks = chunk_ranges(files.len(), opts.workers);
    let processed = AtomicU64::new(0);
    let failed = AtomicU64::new(0);

    pool.install(|| {
        use rayon::prelude::*;
        chunks.par_iter().for_each(|range| {
            if range.is_empty() {
                return;
            }
            log::debug!("Worker chunk {}..{}", range.start, range.end);
            for path in &files[range.clone()] {
                match process_one(config, opts, &extractors, path) {
                    Ok(()) => {
                        processed.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => {
                        log::warn!("Failed to process {}: {}", path.display(), e);
                        failed.fetch_add(1, Ordering::Relaxed);
                    }
                }
                pb.inc(1);
                pb.set_message(format!(
                    "{} done, {} failed",
                    processed.load(Ordering::Relaxed),
                    failed.load(Ordering::Relaxed)
                ));
            }
        });
    });

    let processed = processed.into_inner();
    let failed = failed.into_inner();
    pb.finish_with_message(format!("Done: {} processed, {} failed", processed, failed));

    ExtractResult { processed, failed }
}

/// Split `0..len` into `workers` contiguous ranges, `i*len/n` to
/// `(i+1)*len/n`. Ranges can be empty when workers outnumber files.
fn chunk_ranges(len: usize, workers: usize) -> Vec<Range<usize>> {
    let n = workers.max(1);
    (0..n).map(|i| (i * len / n)..((i + 1) * len / n)).collect()
}

/// Extract every missing artifact for one clip. Each step checks the disk
/// first, so interrupted runs resume where they stopped.
fn process_one(
    config: &AppConfig,
    opts: &ExtractOptions,
    extractors: &Extractors,
    path: &Path,
) -> Result<(), ExtractError> {
    log::debug!(
        "Extracting: {}",
        path.file_name().and_then(|f| f.to_str()).unwrap_or("?")
    );

    let clip = audio::load_wav(path)?;
    if clip.sample_rate != config.data.sampling_rate {
        return Err(ExtractError::SampleRateMismatch {
            path: path.display().to_string(),
            got: clip.sample_rate,
            want: config.data.sampling_rate,
        });
    }
    let force = opts.force;

    let f0_path = Artifact::F0.path_for(path);
    if force || !f0_path.exists() {
        let (f0, uv) = extractors.f0.compute_f0_uv(&clip.samples);
        artifacts::save_f0(
            &f0_path,
            Array1::from_vec(f0).view(),
            Array1::from_vec(uv).view(),
        )?;
    }

    let spec_path = Artifact::Spectrogram.path_for(path);
    if force || !spec_path.exists() {
        let spec = extractors.spectrogram.compute(&clip.samples);
        artifacts::save_npy(&spec_path, &spec)?;
    }

    if opts.use_diff || config.model.vol_embedding {
        let vol_path = Artifact::Volume.path_for(path);
        if force || !vol_path.exists() {
            let volume = extractors.volume.extract(&clip.samples);
            artifacts::save_npy(&vol_path, &volume)?;
        }
    }

    if let Some(mel_extractor) = &extractors.mel {
        let mel_path = Artifact::Mel.path_for(path);
        if force || !mel_path.exists() {
            let mel = mel_extractor.extract(&clip.samples, clip.sample_rate, 0.0)?;
            artifacts::save_npy(&mel_path, &mel)?;
        }

        let aug_mel_path = Artifact::AugMel.path_for(path);
        let aug_vol_path = Artifact::AugVolume.path_for(path);
        if force || !aug_mel_path.exists() || !aug_vol_path.exists() {
            let aug = augment::sample_augmentation(&mut rand::rng(), &clip.samples);
            let scaled = augment::apply_gain(&clip.samples, aug.gain);
            if force || !aug_mel_path.exists() {
                let aug_mel = mel_extractor.extract(&scaled, clip.sample_rate, aug.keyshift)?;
                artifacts::save_aug_mel(&aug_mel_path, &aug_mel, aug.keyshift)?;
            }
            if force || !aug_vol_path.exists() {
                let aug_vol = extractors.volume.extract(&scaled);
                artifacts::save_npy(&aug_vol_path, &aug_vol)?;
            }
        }
    }

    Ok(())
}

/// One row of the cache report.
pub struct ArtifactCount {
    pub artifact: Artifact,
    pub cached: usize,
}

/// Cache report for a file set: how many clips already have each required
/// artifact, and how many have all of them.
pub struct StatusReport {
    pub total: usize,
    pub complete: usize,
    pub counts: Vec<ArtifactCount>,
}

/// Count cached artifacts per kind without decoding any audio.
pub fn status(files: &[PathBuf], use_diff: bool, vol_embedding: bool) -> StatusReport {
    let required: Vec<Artifact> = artifacts::ALL
        .iter()
        .copied()
        .filter(|a| a.required(use_diff, vol_embedding))
        .collect();

    let mut cached = vec![0usize; required.len()];
    let mut complete = 0;
    for path in files {
        let mut have_all = true;
        for (slot, artifact) in required.iter().enumerate() {
            if artifact.path_for(path).exists() {
                cached[slot] += 1;
            } else {
                have_all = false;
            }
        }
        if have_all {
            complete += 1;
        }
    }

    StatusReport {
        total: files.len(),
        complete,
        counts: required
            .into_iter()
            .zip(cached)
            .map(|(artifact, cached)| ArtifactCount { artifact, cached })
            .collect(),
    }
}
