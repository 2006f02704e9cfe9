use ndarray::Array1;

use super::{frame_count, reflect_pad};

/// Per-hop RMS loudness envelope.
///
/// The squared signal is reflect-padded by half a hop on each side, then
/// averaged over one hop per frame, so frame `t` is centered on sample
/// `t * hop_size + hop_size / 2`.
pub struct VolumeExtractor {
    hop_size: usize,
}

impl VolumeExtractor {
    pub fn new(hop_size: usize) -> Self {
        Self { hop_size }
    }

    /// One RMS value per full hop.
    pub fn extract(&self, samples: &[f32]) -> Array1<f32> {
        let n_frames = frame_count(samples.len(), self.hop_size);
        let squared: Vec<f32> = samples.iter().map(|x| x * x).collect();
        let padded = reflect_pad(&squared, self.hop_size / 2, self.hop_size.div_ceil(2));

        let mut volume = Array1::zeros(n_frames);
        for t in 0..n_frames {
            let frame = &padded[t * self.hop_size..(t + 1) * self.hop_size];
            let mean = frame.iter().sum::<f32>() / self.hop_size as f32;
            volume[t] = mean.sqrt();
        }
        volume
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_count() {
        let extractor = VolumeExtractor::new(128);
        assert_eq!(extractor.extract(&vec![0.1; 3200]).len(), 25);
        assert_eq!(extractor.extract(&vec![0.1; 3300]).len(), 25);
        assert_eq!(extractor.extract(&vec![0.1; 100]).len(), 0);
    }

    #[test]
    fn test_constant_signal_rms() {
        let extractor = VolumeExtractor::new(128);
        let volume = extractor.extract(&vec![0.5f32; 1280]);
        for &v in volume.iter() {
            assert!((v - 0.5).abs() < 1e-6);
        }
    }

    #[test]
    fn test_silence_is_zero() {
        let extractor = VolumeExtractor::new(128);
        let volume = extractor.extract(&vec![0.0f32; 1280]);
        for &v in volume.iter() {
            assert_eq!(v, 0.0);
        }
    }

    #[test]
    fn test_gain_scales_linearly() {
        let extractor = VolumeExtractor::new(128);
        let signal: Vec<f32> = (0..1280).map(|i| (i as f32 * 0.1).sin() * 0.3).collect();
        let doubled: Vec<f32> = signal.iter().map(|x| x * 2.0).collect();
        let base = extractor.extract(&signal);
        let loud = extractor.extract(&doubled);
        for (a, b) in base.iter().zip(loud.iter()) {
            assert!((b - 2.0 * a).abs() < 1e-5);
        }
    }
}
