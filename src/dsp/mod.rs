pub mod f0;
pub mod mel;
pub mod stft;
pub mod volume;

/// Number of feature frames a clip yields: one frame per full hop.
/// F0, loudness, spectrogram, and mel all align on this count.
pub fn frame_count(num_samples: usize, hop_length: usize) -> usize {
    num_samples / hop_length
}

/// Periodic Hann window (the STFT convention, not the symmetric one).
pub fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| {
            let phase = 2.0 * std::f32::consts::PI * i as f32 / size as f32;
            0.5 * (1.0 - phase.cos())
        })
        .collect()
}

/// A Hann window of `win_length` centered in a zero-filled `n_fft` frame.
/// A window wider than the frame keeps its middle `n_fft` samples.
pub fn centered_window(n_fft: usize, win_length: usize) -> Vec<f32> {
    let mut window = vec![0.0f32; n_fft];
    let len = win_length.min(n_fft);
    let offset = (n_fft - len) / 2;
    let hann = hann_window(win_length);
    let skip = (win_length - len) / 2;
    window[offset..offset + len].copy_from_slice(&hann[skip..skip + len]);
    window
}

/// Reflect-pad `signal` by `left`/`right` samples without repeating the
/// edge sample. Pads wider than the signal fold back cyclically, so short
/// clips still produce a full analysis frame.
pub fn reflect_pad(signal: &[f32], left: usize, right: usize) -> Vec<f32> {
    let len = signal.len();
    let mut out = Vec::with_capacity(left + len + right);
    if len == 0 {
        out.resize(left + right, 0.0);
        return out;
    }
    for pos in 0..left + len + right {
        let idx = pos as isize - left as isize;
        out.push(signal[mirror(idx, len)]);
    }
    out
}

/// Zero-pad `signal` by `left`/`right` samples.
pub fn zero_pad(signal: &[f32], left: usize, right: usize) -> Vec<f32> {
    let mut out = vec![0.0f32; left];
    out.extend_from_slice(signal);
    out.resize(left + signal.len() + right, 0.0);
    out
}

/// Fold an out-of-range index back into `0..len` by mirroring at both ends.
fn mirror(idx: isize, len: usize) -> usize {
    if len == 1 {
        return 0;
    }
    let period = 2 * (len as isize - 1);
    let mut k = idx % period;
    if k < 0 {
        k += period;
    }
    if k >= len as isize {
        k = period - k;
    }
    k as usize
}
