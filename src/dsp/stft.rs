use std::sync::Arc;

use ndarray::Array2;
use realfft::{RealFftPlanner, RealToComplex};

use super::{centered_window, reflect_pad};

/// Magnitude floor added under the square root, matching the trainer's
/// spectrogram convention.
const MAG_EPS: f32 = 1e-6;

/// Linear-magnitude spectrogram extractor.
///
/// Uses an uncentered STFT over a reflect-padded signal, so a clip of
/// `n` samples always yields exactly `n / hop_length` frames.
pub struct Spectrogram {
    n_fft: usize,
    hop_length: usize,
    fft: Arc<dyn RealToComplex<f32>>,
    window: Vec<f32>,
}

impl Spectrogram {
    pub fn new(n_fft: usize, hop_length: usize, win_length: usize) -> Self {
        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(n_fft);
        Self {
            n_fft,
            hop_length,
            fft,
            window: centered_window(n_fft, win_length),
        }
    }

    pub fn num_bins(&self) -> usize {
        self.n_fft / 2 + 1
    }

    /// Compute `[n_fft/2 + 1, frames]` linear magnitudes.
    pub fn compute(&self, samples: &[f32]) -> Array2<f32> {
        let pad = self.n_fft.saturating_sub(self.hop_length) / 2;
        let padded = reflect_pad(samples, pad, pad);

        let frames = if padded.len() >= self.n_fft {
            (padded.len() - self.n_fft) / self.hop_length + 1
        } else {
            0
        };
        let mut spec = Array2::zeros((self.num_bins(), frames));

        let mut input = vec![0.0f32; self.n_fft];
        let mut output = self.fft.make_output_vec();
        for t in 0..frames {
            let start = t * self.hop_length;
            for (i, w) in self.window.iter().enumerate() {
                input[i] = padded[start + i] * w;
            }
            self.fft
                .process(&mut input, &mut output)
                .expect("FFT buffers are sized by the planner");
            for (k, c) in output.iter().enumerate() {
                spec[[k, t]] = (c.norm_sqr() + MAG_EPS).sqrt();
            }
        }
        spec
    }
}
