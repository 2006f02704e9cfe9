use std::path::Path;

use hound::SampleFormat;
use thiserror::Error;

/// Errors from WAV decoding.
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("wav decode error: {0}")]
    Wav(#[from] hound::Error),
    #[error("{path}: empty audio stream")]
    Empty { path: String },
}

/// A decoded clip: mono samples in [-1, 1] plus the file's native rate.
#[derive(Debug, Clone)]
pub struct AudioData {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

/// Decode a WAV file to mono f32. Integer formats are normalized by their
/// bit depth; multi-channel audio is averaged down to one channel.
pub fn load_wav(path: &Path) -> Result<AudioData, AudioError> {
    let mut reader = hound::WavReader::open(path)?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let mut samples: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>()?,
        SampleFormat::Int => {
            let scale = 1.0 / (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<Result<_, _>>()?
        }
    };

    if channels > 1 {
        samples = downmix(&samples, channels);
    }
    if samples.is_empty() {
        return Err(AudioError::Empty {
            path: path.display().to_string(),
        });
    }

    Ok(AudioData {
        samples,
        sample_rate: spec.sample_rate,
    })
}

fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_wav(path: &Path, spec: hound::WavSpec, samples: &[f32]) {
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        match (spec.sample_format, spec.bits_per_sample) {
            (SampleFormat::Float, _) => {
                for &s in samples {
                    writer.write_sample(s).unwrap();
                }
            }
            (SampleFormat::Int, 16) => {
                for &s in samples {
                    writer.write_sample((s * 32767.0) as i16).unwrap();
                }
            }
            _ => panic!("unsupported test spec"),
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_load_mono_float() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        let samples: Vec<f32> = (0..1000)
            .map(|i| (i as f32 * 0.05).sin() * 0.5)
            .collect();
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 16000,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        write_wav(&path, spec, &samples);

        let audio = load_wav(&path).unwrap();
        assert_eq!(audio.sample_rate, 16000);
        assert_eq!(audio.samples.len(), 1000);
        assert!((audio.samples[10] - samples[10]).abs() < 1e-6);
    }

    #[test]
    fn test_load_mono_i16_normalizes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone16.wav");
        let samples = vec![0.5f32; 64];
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 16000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        write_wav(&path, spec, &samples);

        let audio = load_wav(&path).unwrap();
        assert_eq!(audio.samples.len(), 64);
        // 16-bit quantization keeps us within one LSB of the input.
        assert!((audio.samples[0] - 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_load_stereo_downmixes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 16000,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for _ in 0..100 {
            writer.write_sample(0.8f32).unwrap();
            writer.write_sample(-0.4f32).unwrap();
        }
        writer.finalize().unwrap();

        let audio = load_wav(&path).unwrap();
        assert_eq!(audio.samples.len(), 100);
        assert!((audio.samples[50] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_load_missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_wav(&dir.path().join("nope.wav"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_empty_stream_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.wav");
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 16000,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        hound::WavWriter::create(&path, spec)
            .unwrap()
            .finalize()
            .unwrap();

        let result = load_wav(&path);
        assert!(matches!(result, Err(AudioError::Empty { .. })));
    }
}
