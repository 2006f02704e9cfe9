use ndarray::Array2;
use realfft::RealFftPlanner;
use rubato::{Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction};
use serde::Deserialize;
use thiserror::Error;

use crate::config::VocoderConfig;
use super::{centered_window, reflect_pad, zero_pad};

/// Mel floor before log compression.
const CLIP_VAL: f32 = 1e-5;
/// Magnitude floor inside the mel STFT.
const MAG_EPS: f32 = 1e-9;

/// Log compression convention of the vocoder the refiner trains against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VocoderKind {
    /// Natural-log mels (the NSF-HiFiGAN convention).
    NsfHifigan,
    /// Same front-end with base-10 log compression.
    NsfHifiganLog10,
}

#[derive(Error, Debug)]
pub enum MelError {
    #[error("resample error: {0}")]
    Resample(String),
}

/// Log-mel extractor matching the vocoder's front-end: uncentered STFT
/// with an optional key-shift frequency warp, slaney-style mel filterbank,
/// log compression.
pub struct MelExtractor {
    kind: VocoderKind,
    sample_rate: u32,
    n_fft: usize,
    win_length: usize,
    hop_length: usize,
    num_mels: usize,
    /// `[num_mels, n_fft/2 + 1]` filterbank.
    mel_basis: Array2<f32>,
}

impl MelExtractor {
    pub fn new(config: &VocoderConfig) -> Self {
        let mel_basis = mel_filterbank(
            config.sample_rate,
            config.n_fft,
            config.num_mels,
            config.mel_fmin,
            config.mel_fmax,
        );
        Self {
            kind: config.kind,
            sample_rate: config.sample_rate,
            n_fft: config.n_fft,
            win_length: config.win_length,
            hop_length: config.hop_length,
            num_mels: config.num_mels,
            mel_basis,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn num_mels(&self) -> usize {
        self.num_mels
    }

    /// Extract `[frames, num_mels]` log-mels. `keyshift` warps the analysis
    /// frame by `2^(keyshift/12)`, so a shifted clip reads as if its pitch
    /// moved by that many semitones. Input at a different rate is resampled
    /// to the vocoder rate first.
    pub fn extract(
        &self,
        samples: &[f32],
        sample_rate: u32,
        keyshift: f32,
    ) -> Result<Array2<f32>, MelError> {
        let resampled;
        let samples = if sample_rate == self.sample_rate {
            samples
        } else {
            resampled = resample(samples, sample_rate, self.sample_rate)?;
            &resampled
        };

        let spec = self.warped_spectrogram(samples, keyshift);
        let mel = self.mel_basis.dot(&spec);
        let compressed = match self.kind {
            VocoderKind::NsfHifigan => mel.mapv(|x| x.max(CLIP_VAL).ln()),
            VocoderKind::NsfHifiganLog10 => mel.mapv(|x| x.max(CLIP_VAL).log10()),
        };
        Ok(compressed.t().as_standard_layout().into_owned())
    }

    /// Linear magnitudes on the vocoder's `n_fft/2 + 1` bins. A nonzero
    /// keyshift scales FFT and window sizes by `2^(keyshift/12)`, then the
    /// bin axis is truncated or zero-padded back to the vocoder's bins.
    fn warped_spectrogram(&self, samples: &[f32], keyshift: f32) -> Array2<f32> {
        let factor = (2.0f32).powf(keyshift / 12.0);
        let n_fft_new = (self.n_fft as f32 * factor).round() as usize;
        let win_new = (self.win_length as f32 * factor).round() as usize;
        let hop = self.hop_length;

        let pad_left = win_new.saturating_sub(hop) / 2;
        let pad_base = (win_new.saturating_sub(hop) + 1) / 2;
        // Stretch the right pad so even a sub-window clip fills one frame.
        let pad_right = pad_base.max(win_new.saturating_sub(samples.len() + pad_left));
        let padded = if pad_right < samples.len() {
            reflect_pad(samples, pad_left, pad_right)
        } else {
            zero_pad(samples, pad_left, pad_right)
        };

        let bins_new = n_fft_new / 2 + 1;
        let frames = if padded.len() >= n_fft_new {
            (padded.len() - n_fft_new) / hop + 1
        } else {
            0
        };

        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(n_fft_new);
        let window = centered_window(n_fft_new, win_new);

        let mut spec = Array2::zeros((bins_new, frames));
        let mut input = vec![0.0f32; n_fft_new];
        let mut output = fft.make_output_vec();
        for t in 0..frames {
            let start = t * hop;
            for (i, w) in window.iter().enumerate() {
                input[i] = padded[start + i] * w;
            }
            fft.process(&mut input, &mut output)
                .expect("FFT buffers are sized by the planner");
            for (k, c) in output.iter().enumerate() {
                spec[[k, t]] = (c.norm_sqr() + MAG_EPS).sqrt();
            }
        }

        if keyshift != 0.0 {
            let target_bins = self.n_fft / 2 + 1;
            let scale = self.win_length as f32 / win_new as f32;
            let mut resized = Array2::zeros((target_bins, frames));
            for k in 0..target_bins.min(bins_new) {
                for t in 0..frames {
                    resized[[k, t]] = spec[[k, t]] * scale;
                }
            }
            resized
        } else {
            spec
        }
    }
}

/// librosa-compatible mel filterbank: slaney frequency scale, slaney area
/// normalization, `[num_mels, n_fft/2 + 1]`.
pub fn mel_filterbank(
    sample_rate: u32,
    n_fft: usize,
    num_mels: usize,
    fmin: f32,
    fmax: f32,
) -> Array2<f32> {
    let bins = n_fft / 2 + 1;
    let fft_freqs: Vec<f64> = (0..bins)
        .map(|k| k as f64 * sample_rate as f64 / n_fft as f64)
        .collect();

    // Band edges: num_mels + 2 points evenly spaced on the mel scale.
    let mel_min = hz_to_mel(fmin as f64);
    let mel_max = hz_to_mel(fmax as f64);
    let mel_f: Vec<f64> = (0..num_mels + 2)
        .map(|i| mel_to_hz(mel_min + (mel_max - mel_min) * i as f64 / (num_mels + 1) as f64))
        .collect();

    let mut weights = Array2::zeros((num_mels, bins));
    for m in 0..num_mels {
        let (lo, center, hi) = (mel_f[m], mel_f[m + 1], mel_f[m + 2]);
        let enorm = 2.0 / (hi - lo);
        for k in 0..bins {
            let lower = (fft_freqs[k] - lo) / (center - lo);
            let upper = (hi - fft_freqs[k]) / (hi - center);
            weights[[m, k]] = (lower.min(upper).max(0.0) * enorm) as f32;
        }
    }
    weights
}

/// Slaney mel scale: linear below 1 kHz, logarithmic above.
fn hz_to_mel(hz: f64) -> f64 {
    let f_sp = 200.0 / 3.0;
    let min_log_hz = 1000.0;
    let min_log_mel = min_log_hz / f_sp;
    let logstep = (6.4f64).ln() / 27.0;
    if hz >= min_log_hz {
        min_log_mel + (hz / min_log_hz).ln() / logstep
    } else {
        hz / f_sp
    }
}

fn mel_to_hz(mel: f64) -> f64 {
    let f_sp = 200.0 / 3.0;
    let min_log_hz = 1000.0;
    let min_log_mel = min_log_hz / f_sp;
    let logstep = (6.4f64).ln() / 27.0;
    if mel >= min_log_mel {
        min_log_hz * (logstep * (mel - min_log_mel)).exp()
    } else {
        f_sp * mel
    }
}

/// High-quality sinc resample, mono. The filter tail is flushed and the
/// resampler's delay trimmed, so the output holds exactly
/// `round(len * to / from)` samples aligned with the input.
fn resample(samples: &[f32], from: u32, to: u32) -> Result<Vec<f32>, MelError> {
    let ratio = to as f64 / from as f64;
    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Cubic,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };
    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, samples.len(), 1)
        .map_err(|e| MelError::Resample(e.to_string()))?;
    let delay = resampler.output_delay();

    let mut out = resampler
        .process(&[samples.to_vec()], None)
        .map_err(|e| MelError::Resample(e.to_string()))?
        .into_iter()
        .next()
        .unwrap_or_default();
    let tail = resampler
        .process_partial(None::<&[Vec<f32>]>, None)
        .map_err(|e| MelError::Resample(e.to_string()))?;
    if let Some(flushed) = tail.into_iter().next() {
        out.extend_from_slice(&flushed);
    }

    out.drain(..delay.min(out.len()));
    out.resize((samples.len() as f64 * ratio).round() as usize, 0.0);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> VocoderConfig {
        VocoderConfig {
            kind: VocoderKind::NsfHifigan,
            sample_rate: 16000,
            n_fft: 512,
            win_length: 512,
            hop_length: 128,
            num_mels: 40,
            mel_fmin: 40.0,
            mel_fmax: 8000.0,
        }
    }

    fn sine(freq: f32, sample_rate: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate).sin())
            .collect()
    }

    #[test]
    fn test_filterbank_shape_and_coverage() {
        let fb = mel_filterbank(16000, 512, 40, 40.0, 8000.0);
        assert_eq!(fb.shape(), &[40, 257]);
        // Every band overlaps at least one FFT bin at this resolution.
        for m in 0..40 {
            let row_sum: f32 = fb.row(m).sum();
            assert!(row_sum > 0.0, "band {} is empty", m);
        }
    }

    #[test]
    fn test_mel_scale_round_trip() {
        for hz in [50.0, 440.0, 999.0, 1000.0, 4000.0, 15999.0] {
            let back = mel_to_hz(hz_to_mel(hz));
            assert!((back - hz).abs() < 1e-6, "hz {}", hz);
        }
    }

    #[test]
    fn test_frame_count_matches_hop_division() {
        let extractor = MelExtractor::new(&test_config());
        for len in [3200, 3201, 4096] {
            let mel = extractor
                .extract(&sine(440.0, 16000.0, len), 16000, 0.0)
                .unwrap();
            assert_eq!(mel.shape(), &[len / 128, 40], "len {}", len);
        }
    }

    #[test]
    fn test_keyshift_keeps_frame_count_and_bins() {
        let extractor = MelExtractor::new(&test_config());
        let signal = sine(440.0, 16000.0, 3200);
        for keyshift in [-12.0, -5.0, 4.0, 12.0] {
            let mel = extractor.extract(&signal, 16000, keyshift).unwrap();
            assert_eq!(mel.shape(), &[25, 40], "keyshift {}", keyshift);
        }
    }

    #[test]
    fn test_silence_sits_at_log_floor() {
        let extractor = MelExtractor::new(&test_config());
        let mel = extractor.extract(&vec![0.0f32; 2048], 16000, 0.0).unwrap();
        let floor = (1e-5f32).ln();
        for &v in mel.iter() {
            // Tiny FFT eps leaks through the filterbank but stays at the clip floor.
            assert!((v - floor).abs() < 1e-3);
        }
    }

    #[test]
    fn test_log10_variant_rescales() {
        let base = MelExtractor::new(&test_config());
        let log10 = MelExtractor::new(&VocoderConfig {
            kind: VocoderKind::NsfHifiganLog10,
            ..test_config()
        });
        let signal = sine(440.0, 16000.0, 2048);
        let a = base.extract(&signal, 16000, 0.0).unwrap();
        let b = log10.extract(&signal, 16000, 0.0).unwrap();
        for (x, y) in a.iter().zip(b.iter()) {
            assert!((x / std::f32::consts::LN_10 - y).abs() < 1e-4);
        }
    }

    #[test]
    fn test_octave_shift_moves_tone_up_an_octave() {
        let extractor = MelExtractor::new(&test_config());
        let shifted = extractor
            .extract(&sine(500.0, 16000.0, 4096), 16000, 12.0)
            .unwrap();
        let reference = extractor
            .extract(&sine(1000.0, 16000.0, 4096), 16000, 0.0)
            .unwrap();

        let mid = shifted.nrows() / 2;
        let band = |mel: &Array2<f32>, row: usize| {
            mel.row(row)
                .iter()
                .enumerate()
                .max_by(|a, b| a.1.total_cmp(b.1))
                .map(|(m, _)| m as i64)
                .unwrap()
        };
        let delta = (band(&shifted, mid) - band(&reference, mid)).abs();
        assert!(delta <= 1, "peak bands differ by {}", delta);
    }

    #[test]
    fn test_resample_halves_length() {
        let out = resample(&sine(440.0, 32000.0, 6400), 32000, 16000).unwrap();
        assert_eq!(out.len(), 3200);
        // Delay-trimmed output lines up with the input timeline.
        for i in 500..600 {
            let expected = (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 16000.0).sin();
            assert!(
                (out[i] - expected).abs() < 0.12,
                "sample {}: {} vs {}",
                i,
                out[i],
                expected
            );
        }
        // The flushed tail still carries the tone instead of padding zeros.
        let tail = &out[3000..3150];
        let rms = (tail.iter().map(|x| x * x).sum::<f32>() / tail.len() as f32).sqrt();
        assert!(
            (rms - std::f32::consts::FRAC_1_SQRT_2).abs() < 0.05,
            "tail rms {}",
            rms
        );
    }

    #[test]
    fn test_rate_mismatch_keeps_frame_contract() {
        let extractor = MelExtractor::new(&test_config());
        // 6400 samples at 32 kHz land as 3200 at the vocoder rate: 25 frames.
        let mel = extractor
            .extract(&sine(440.0, 32000.0, 6400), 32000, 0.0)
            .unwrap();
        assert_eq!(mel.shape(), &[25, 40]);
    }
}
