use clap::ValueEnum;

use super::{frame_count, hann_window, reflect_pad};

/// Pitch search range in Hz, covering low speech through soprano singing.
pub const F0_MIN: f32 = 50.0;
pub const F0_MAX: f32 = 1100.0;

/// CMNDF dip a frame must cross before YIN counts it as voiced.
pub const VOICING_THRESHOLD: f32 = 0.05;

/// Normalized autocorrelation peak the AC estimator requires for voicing.
const AC_VOICING_PEAK: f32 = 0.45;

/// Per-octave tilt toward shorter lags when scoring AC candidates
/// (Praat's octave cost).
const AC_OCTAVE_COST: f32 = 0.01;

/// Analysis window for both time-domain estimators.
const FRAME_LENGTH: usize = 2048;

/// Which F0 estimator to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum F0Method {
    /// Cumulative mean normalized difference (YIN).
    Yin,
    /// Windowed normalized autocorrelation with a Praat-style voicing gate.
    Ac,
}

impl F0Method {
    pub fn name(self) -> &'static str {
        match self {
            F0Method::Yin => "yin",
            F0Method::Ac => "ac",
        }
    }
}

/// A frame-rate pitch estimator.
pub trait F0Predictor {
    /// F0 contour and voicing mask, one value per hop (`len / hop` frames).
    /// F0 is linearly interpolated across unvoiced stretches; `uv` is 1.0
    /// where the frame itself was voiced.
    fn compute_f0_uv(&self, samples: &[f32]) -> (Vec<f32>, Vec<f32>);
}

pub fn create_predictor(
    method: F0Method,
    sampling_rate: u32,
    hop_length: usize,
    threshold: f32,
) -> Box<dyn F0Predictor + Send + Sync> {
    match method {
        F0Method::Yin => Box::new(Yin::new(sampling_rate, hop_length, threshold)),
        F0Method::Ac => Box::new(Autocorrelation::new(sampling_rate, hop_length)),
    }
}

/// YIN estimator (de Cheveigné & Kawahara 2002): squared difference
/// function, cumulative mean normalization, absolute threshold, parabolic
/// refinement.
pub struct Yin {
    sampling_rate: u32,
    hop_length: usize,
    threshold: f32,
    f0_min: f32,
    f0_max: f32,
}

impl Yin {
    pub fn new(sampling_rate: u32, hop_length: usize, threshold: f32) -> Self {
        Self {
            sampling_rate,
            hop_length,
            threshold,
            f0_min: F0_MIN,
            f0_max: F0_MAX,
        }
    }

    /// One frame estimate. Returns 0.0 for unvoiced.
    fn estimate(&self, frame: &[f32], tau_min: usize, tau_max: usize, cmndf: &mut [f32]) -> f32 {
        let span = frame.len() - tau_max;
        let mut running = 0.0f32;
        cmndf[0] = 1.0;
        for tau in 1..=tau_max {
            let mut d = 0.0f32;
            for j in 0..span {
                let diff = frame[j] - frame[j + tau];
                d += diff * diff;
            }
            running += d;
            cmndf[tau] = if running > 0.0 {
                d * tau as f32 / running
            } else {
                1.0
            };
        }

        // First dip under the threshold, descended to its local minimum.
        let mut tau = tau_min;
        while tau <= tau_max {
            if cmndf[tau] < self.threshold {
                while tau + 1 <= tau_max && cmndf[tau + 1] < cmndf[tau] {
                    tau += 1;
                }
                return self.sampling_rate as f32 / parabolic_vertex(cmndf, tau);
            }
            tau += 1;
        }
        0.0
    }
}

impl F0Predictor for Yin {
    fn compute_f0_uv(&self, samples: &[f32]) -> (Vec<f32>, Vec<f32>) {
        let n_frames = frame_count(samples.len(), self.hop_length);
        if n_frames == 0 {
            return (Vec::new(), Vec::new());
        }
        let tau_min = ((self.sampling_rate as f32 / self.f0_max) as usize).max(2);
        let tau_max =
            ((self.sampling_rate as f32 / self.f0_min).ceil() as usize).min(FRAME_LENGTH / 2);
        let padded = reflect_pad(samples, FRAME_LENGTH / 2, FRAME_LENGTH / 2 + self.hop_length);

        let mut cmndf = vec![0.0f32; tau_max + 1];
        let mut raw = Vec::with_capacity(n_frames);
        for t in 0..n_frames {
            let frame = &padded[t * self.hop_length..t * self.hop_length + FRAME_LENGTH];
            raw.push(self.estimate(frame, tau_min, tau_max, &mut cmndf));
        }
        interpolate_f0(&raw)
    }
}

/// Praat-style estimator: Hann-windowed normalized autocorrelation divided
/// by the window's own autocorrelation to undo the taper bias. Candidate
/// lags are local maxima scored with the octave cost and gated on the
/// corrected peak height.
pub struct Autocorrelation {
    sampling_rate: u32,
    hop_length: usize,
    f0_min: f32,
    f0_max: f32,
    window: Vec<f32>,
    /// Window autocorrelation, normalized so lag 0 is 1.0.
    window_ac: Vec<f32>,
}

impl Autocorrelation {
    pub fn new(sampling_rate: u32, hop_length: usize) -> Self {
        let window = hann_window(FRAME_LENGTH);
        let window_ac = autocorrelation(&window, FRAME_LENGTH / 2 + 1);
        Self {
            sampling_rate,
            hop_length,
            f0_min: F0_MIN,
            f0_max: F0_MAX,
            window,
            window_ac,
        }
    }

    fn estimate(&self, frame: &[f32], tau_min: usize, tau_max: usize) -> f32 {
        let mean = frame.iter().sum::<f32>() / frame.len() as f32;
        let windowed: Vec<f32> = frame
            .iter()
            .zip(&self.window)
            .map(|(x, w)| (x - mean) * w)
            .collect();
        let r0: f32 = windowed.iter().map(|x| x * x).sum();
        if r0 <= f32::EPSILON {
            return 0.0;
        }

        let hi = (tau_max + 1).min(self.window_ac.len() - 1);
        let mut corrected = vec![0.0f32; hi + 1];
        for tau in tau_min.saturating_sub(1)..=hi {
            let mut r = 0.0f32;
            for j in 0..windowed.len() - tau {
                r += windowed[j] * windowed[j + tau];
            }
            corrected[tau] = r / r0 / self.window_ac[tau];
        }

        // Period multiples of the fundamental reach the same height; the
        // octave cost breaks those ties toward the shorter lag. Voicing is
        // still gated on the raw height of the winner.
        let sr = self.sampling_rate as f32;
        let hi_tau = tau_max.min(hi);
        let mut best_tau = 0;
        let mut best_score = 0.0f32;
        for tau in tau_min..=hi_tau {
            let is_peak = corrected[tau] >= corrected[tau - 1]
                && (tau == hi_tau || corrected[tau] >= corrected[tau + 1]);
            if !is_peak {
                continue;
            }
            let score = corrected[tau] - AC_OCTAVE_COST * (tau as f32 * self.f0_min / sr).log2();
            if score > best_score {
                best_score = score;
                best_tau = tau;
            }
        }
        if best_tau == 0 || corrected[best_tau] < AC_VOICING_PEAK {
            return 0.0;
        }
        sr / parabolic_vertex(&corrected, best_tau)
    }
}

impl F0Predictor for Autocorrelation {
    fn compute_f0_uv(&self, samples: &[f32]) -> (Vec<f32>, Vec<f32>) {
        let n_frames = frame_count(samples.len(), self.hop_length);
        if n_frames == 0 {
            return (Vec::new(), Vec::new());
        }
        let tau_min = ((self.sampling_rate as f32 / self.f0_max) as usize).max(2);
        let tau_max =
            ((self.sampling_rate as f32 / self.f0_min).ceil() as usize).min(FRAME_LENGTH / 2);
        let padded = reflect_pad(samples, FRAME_LENGTH / 2, FRAME_LENGTH / 2 + self.hop_length);

        let mut raw = Vec::with_capacity(n_frames);
        for t in 0..n_frames {
            let frame = &padded[t * self.hop_length..t * self.hop_length + FRAME_LENGTH];
            raw.push(self.estimate(frame, tau_min, tau_max));
        }
        interpolate_f0(&raw)
    }
}

/// Normalized linear autocorrelation of `signal` for lags `0..lags`.
fn autocorrelation(signal: &[f32], lags: usize) -> Vec<f32> {
    let r0: f32 = signal.iter().map(|x| x * x).sum();
    (0..lags)
        .map(|tau| {
            let mut r = 0.0f32;
            for j in 0..signal.len() - tau {
                r += signal[j] * signal[j + tau];
            }
            if r0 > 0.0 { r / r0 } else { 0.0 }
        })
        .collect()
}

/// Refine a sampled extremum with the vertex of the parabola through its
/// neighbors. The shift is pinned to half a lag.
fn parabolic_vertex(values: &[f32], tau: usize) -> f32 {
    if tau == 0 || tau + 1 >= values.len() {
        return tau as f32;
    }
    let (a, b, c) = (values[tau - 1], values[tau], values[tau + 1]);
    let denom = a + c - 2.0 * b;
    if denom.abs() <= f32::EPSILON {
        return tau as f32;
    }
    tau as f32 + (0.5 * (a - c) / denom).clamp(-0.5, 0.5)
}

/// Fill unvoiced gaps by linear interpolation between voiced neighbors and
/// return the voicing mask alongside. Endpoints extend the nearest voiced
/// value; an all-unvoiced track stays zero.
pub fn interpolate_f0(raw: &[f32]) -> (Vec<f32>, Vec<f32>) {
    let uv: Vec<f32> = raw
        .iter()
        .map(|&v| if v > 0.0 { 1.0 } else { 0.0 })
        .collect();
    let voiced: Vec<(usize, f32)> = raw
        .iter()
        .enumerate()
        .filter(|&(_, &v)| v > 0.0)
        .map(|(i, &v)| (i, v))
        .collect();

    let f0 = match voiced.len() {
        0 => vec![0.0; raw.len()],
        1 => vec![voiced[0].1; raw.len()],
        _ => (0..raw.len()).map(|i| interp_at(i, &voiced)).collect(),
    };
    (f0, uv)
}

fn interp_at(i: usize, voiced: &[(usize, f32)]) -> f32 {
    match voiced.binary_search_by_key(&i, |&(idx, _)| idx) {
        Ok(pos) => voiced[pos].1,
        Err(0) => voiced[0].1,
        Err(pos) if pos == voiced.len() => voiced[pos - 1].1,
        Err(pos) => {
            let (x0, y0) = voiced[pos - 1];
            let (x1, y1) = voiced[pos];
            let t = (i - x0) as f32 / (x1 - x0) as f32;
            y0 + t * (y1 - y0)
        }
    }
}
