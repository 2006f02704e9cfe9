use rand::Rng;

/// Key shifts are drawn from plus or minus this many semitones.
const KEYSHIFT_RANGE: f32 = 5.0;

/// One random pitch/volume perturbation for a clip's augmented features.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Augmentation {
    /// Semitone offset applied through the mel front-end's frequency warp.
    pub keyshift: f32,
    /// Linear gain applied to the samples before extraction.
    pub gain: f32,
}

/// Draw a random augmentation for `samples`. The gain is sampled uniformly
/// in log10 space over `[-1, min(1, log10(1/peak))]`, which caps the scaled
/// peak at full scale while still allowing up to 10x boost for quiet clips.
pub fn sample_augmentation<R: Rng + ?Sized>(rng: &mut R, samples: &[f32]) -> Augmentation {
    let peak = samples.iter().fold(0.0f32, |m, &x| m.max(x.abs())) + 1e-5;
    // Clips already over full scale would push the bound under the lower
    // edge; pin it there.
    let max_shift = (1.0f32).min((1.0 / peak).log10()).max(-1.0);
    let log10_gain = rng.random_range(-1.0f32..=max_shift);
    Augmentation {
        keyshift: rng.random_range(-KEYSHIFT_RANGE..=KEYSHIFT_RANGE),
        gain: 10.0f32.powf(log10_gain),
    }
}

/// Scale a clip by a linear gain.
pub fn apply_gain(samples: &[f32], gain: f32) -> Vec<f32> {
    samples.iter().map(|x| x * gain).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::prelude::*;

    #[test]
    fn test_draws_stay_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        let samples = vec![0.5f32; 256];
        for _ in 0..200 {
            let aug = sample_augmentation(&mut rng, &samples);
            assert!(aug.keyshift >= -5.0 && aug.keyshift <= 5.0);
            assert!(aug.gain >= 0.1 - 1e-6);
            // Peak 0.5: the gain bound keeps the scaled clip at full scale.
            assert!(0.5 * aug.gain <= 1.0 + 1e-4);
        }
    }

    #[test]
    fn test_quiet_clip_allows_full_boost_range() {
        let mut rng = StdRng::seed_from_u64(7);
        let samples = vec![0.01f32; 256];
        let mut max_gain = 0.0f32;
        for _ in 0..500 {
            let aug = sample_augmentation(&mut rng, &samples);
            // log10(1/0.01) = 2, so the cap is the unconditional 10x.
            assert!(aug.gain <= 10.0 + 1e-4);
            max_gain = max_gain.max(aug.gain);
        }
        assert!(max_gain > 5.0, "boost range never exercised: {}", max_gain);
    }

    #[test]
    fn test_hot_clip_only_attenuates() {
        let mut rng = StdRng::seed_from_u64(7);
        let samples = vec![1.0f32; 256];
        for _ in 0..200 {
            let aug = sample_augmentation(&mut rng, &samples);
            assert!(aug.gain <= 1.0 + 1e-4);
        }
    }

    #[test]
    fn test_apply_gain() {
        let scaled = apply_gain(&[0.1, -0.2, 0.3], 2.0);
        assert_eq!(scaled, vec![0.2, -0.4, 0.6]);
    }
}
