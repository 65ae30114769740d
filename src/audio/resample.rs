//! Sample rate conversion for sources Opus cannot take directly

use rubato::{FftFixedIn, Resampler};

use crate::error::TranscodeError;

/// Sample rates accepted by the Opus encoder
pub const OPUS_SAMPLE_RATES: [u32; 5] = [8000, 12000, 16000, 24000, 48000];

/// Rate everything else is converted to
pub const FALLBACK_SAMPLE_RATE: u32 = 48000;

/// Input block size for the FFT resampler
const CHUNK_FRAMES: usize = 1024;

/// Rate to encode a source of `sample_rate` at
pub fn target_rate(sample_rate: u32) -> u32 {
    if OPUS_SAMPLE_RATES.contains(&sample_rate) {
        sample_rate
    } else {
        FALLBACK_SAMPLE_RATE
    }
}

/// Resample one channel, compensating for the resampler delay so the
/// output lines up with the input and has the rate-scaled length.
pub fn resample_channel(input: &[f32], from: u32, to: u32) -> Result<Vec<f32>, TranscodeError> {
    if from == to || input.is_empty() {
        return Ok(input.to_vec());
    }

    let mut resampler = FftFixedIn::<f32>::new(from as usize, to as usize, CHUNK_FRAMES, 2, 1)
        .map_err(|e| TranscodeError::Resample(format!("Failed to create resampler: {}", e)))?;
    let delay = resampler.output_delay();
    let expected = (input.len() as u64 * to as u64 / from as u64) as usize;

    let mut output = Vec::with_capacity(expected + delay + CHUNK_FRAMES);
    let mut chunks = input.chunks_exact(CHUNK_FRAMES);
    for chunk in &mut chunks {
        let frames = resampler
            .process(&[chunk], None)
            .map_err(|e| TranscodeError::Resample(e.to_string()))?;
        output.extend_from_slice(&frames[0]);
    }

    let rest = chunks.remainder();
    if !rest.is_empty() {
        let frames = resampler
            .process_partial(Some(&[rest][..]), None)
            .map_err(|e| TranscodeError::Resample(e.to_string()))?;
        output.extend_from_slice(&frames[0]);
    }

    // Drain the delay line
    while output.len() < expected + delay {
        let frames = resampler
            .process_partial::<&[f32]>(None, None)
            .map_err(|e| TranscodeError::Resample(e.to_string()))?;
        if frames[0].is_empty() {
            break;
        }
        output.extend_from_slice(&frames[0]);
    }

    Ok(output.into_iter().skip(delay).take(expected).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_rate() {
        assert_eq!(target_rate(48000), 48000);
        assert_eq!(target_rate(16000), 16000);
        assert_eq!(target_rate(44100), 48000);
        assert_eq!(target_rate(22050), 48000);
    }

    #[test]
    fn test_same_rate_is_copy() {
        let input = vec![0.1f32, 0.2, 0.3];
        assert_eq!(resample_channel(&input, 48000, 48000).unwrap(), input);
    }

    #[test]
    fn test_resample_length_and_energy() {
        let input: Vec<f32> = (0..44100)
            .map(|i| (i as f32 / 44100.0 * 440.0 * 2.0 * std::f32::consts::PI).sin() * 0.5)
            .collect();

        let output = resample_channel(&input, 44100, 48000).unwrap();

        assert_eq!(output.len(), 48000);
        let peak = output.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
        assert!(peak > 0.4 && peak < 0.6, "peak {}", peak);
    }
}
