use std::fs::File;
use std::path::{Path, PathBuf};

use ndarray::{Array2, ArrayView1, arr0};
use ndarray_npy::{NpzWriter, WriteNpyError, WriteNpyExt, WriteNpzError, write_npy};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("npy write error: {0}")]
    Npy(#[from] WriteNpyError),
    #[error("npz write error: {0}")]
    Npz(#[from] WriteNpzError),
}

/// The per-clip feature artifacts, each stored under a fixed suffix next to
/// the source wav so reruns can skip finished work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Artifact {
    /// `<clip>.wav.f0.npz` with `f0` and `uv` entries.
    F0,
    /// `<clip>.spec.npy`, `[n_fft/2 + 1, frames]`.
    Spectrogram,
    /// `<clip>.wav.vol.npy`, `[frames]`.
    Volume,
    /// `<clip>.wav.mel.npy`, `[frames, num_mels]`.
    Mel,
    /// `<clip>.wav.aug_mel.npz` with `mel` and scalar `keyshift` entries.
    AugMel,
    /// `<clip>.wav.aug_vol.npy`, `[frames]`.
    AugVolume,
}

/// Every artifact kind, in extraction order.
pub const ALL: [Artifact; 6] = [
    Artifact::F0,
    Artifact::Spectrogram,
    Artifact::Volume,
    Artifact::Mel,
    Artifact::AugMel,
    Artifact::AugVolume,
];

impl Artifact {
    /// Where this artifact lives for a given wav. The spectrogram replaces
    /// the `.wav` extension (matching the trainer's loader); everything else
    /// appends its suffix to the full file name.
    pub fn path_for(&self, wav: &Path) -> PathBuf {
        match self {
            Artifact::Spectrogram => wav.with_extension("spec.npy"),
            Artifact::F0 => append_suffix(wav, ".f0.npz"),
            Artifact::Volume => append_suffix(wav, ".vol.npy"),
            Artifact::Mel => append_suffix(wav, ".mel.npy"),
            Artifact::AugMel => append_suffix(wav, ".aug_mel.npz"),
            Artifact::AugVolume => append_suffix(wav, ".aug_vol.npy"),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Artifact::F0 => "f0",
            Artifact::Spectrogram => "spec",
            Artifact::Volume => "vol",
            Artifact::Mel => "mel",
            Artifact::AugMel => "aug_mel",
            Artifact::AugVolume => "aug_vol",
        }
    }

    /// Whether this artifact is produced under the given mode switches.
    pub fn required(&self, use_diff: bool, vol_embedding: bool) -> bool {
        match self {
            Artifact::F0 | Artifact::Spectrogram => true,
            Artifact::Volume => use_diff || vol_embedding,
            Artifact::Mel | Artifact::AugMel | Artifact::AugVolume => use_diff,
        }
    }
}

fn append_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

/// Save a single array as `.npy`.
pub fn save_npy<A: WriteNpyExt>(path: &Path, array: &A) -> Result<(), ArtifactError> {
    Ok(write_npy(path, array)?)
}

/// Save the `{f0, uv}` pair as one `.npz`.
pub fn save_f0(path: &Path, f0: ArrayView1<f32>, uv: ArrayView1<f32>) -> Result<(), ArtifactError> {
    let mut npz = NpzWriter::new(File::create(path)?);
    npz.add_array("f0", &f0)?;
    npz.add_array("uv", &uv)?;
    npz.finish()?;
    Ok(())
}

/// Save an augmented mel together with the key shift that produced it.
pub fn save_aug_mel(path: &Path, mel: &Array2<f32>, keyshift: f32) -> Result<(), ArtifactError> {
    let mut npz = NpzWriter::new(File::create(path)?);
    npz.add_array("mel", mel)?;
    npz.add_array("keyshift", &arr0(keyshift))?;
    npz.finish()?;
    Ok(())
}
