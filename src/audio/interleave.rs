//! Channel layout selection and interleaving
//!
//! Uploads are always mono or stereo. Sources with more than two channels
//! keep only channels 0 and 1; the rest are dropped, not mixed in.

use crate::error::TranscodeError;

/// Channel layout fed to the encoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelLayout {
    Mono,
    Stereo,
}

impl ChannelLayout {
    /// Layout produced for a source with `count` channels
    pub fn for_source(count: usize) -> Result<Self, TranscodeError> {
        match count {
            0 => Err(TranscodeError::UnsupportedChannelLayout(0)),
            1 => Ok(ChannelLayout::Mono),
            _ => Ok(ChannelLayout::Stereo),
        }
    }

    pub fn channels(&self) -> u16 {
        match self {
            ChannelLayout::Mono => 1,
            ChannelLayout::Stereo => 2,
        }
    }
}

/// Interleave planar channels into one sample stream.
///
/// Two or more channels produce `L0 R0 L1 R1 ...` from channels 0 and 1; a
/// single channel is returned unchanged. The output length follows the first
/// channel, with missing right samples read as silence.
pub fn interleave<C: AsRef<[f32]>>(channels: &[C]) -> Result<Vec<f32>, TranscodeError> {
    match ChannelLayout::for_source(channels.len())? {
        ChannelLayout::Mono => Ok(channels[0].as_ref().to_vec()),
        ChannelLayout::Stereo => {
            let left = channels[0].as_ref();
            let right = channels[1].as_ref();
            let mut out = Vec::with_capacity(left.len() * 2);
            for (i, sample) in left.iter().enumerate() {
                out.push(*sample);
                out.push(right.get(i).copied().unwrap_or(0.0));
            }
            Ok(out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stereo_interleave() {
        let left = vec![0.1, 0.2, 0.3];
        let right = vec![-0.1, -0.2, -0.3];
        let out = interleave(&[left, right]).unwrap();
        assert_eq!(out, vec![0.1, -0.1, 0.2, -0.2, 0.3, -0.3]);
    }

    #[test]
    fn test_mono_passthrough() {
        let mono = vec![0.5f32, 0.25, -1.0];
        assert_eq!(interleave(&[mono.clone()]).unwrap(), mono);
    }

    #[test]
    fn test_extra_channels_dropped() {
        let channels = vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![9.0, 9.0], vec![8.0, 8.0]];
        assert_eq!(interleave(&channels).unwrap(), vec![1.0, 3.0, 2.0, 4.0]);
        assert_eq!(ChannelLayout::for_source(6).unwrap(), ChannelLayout::Stereo);
    }

    #[test]
    fn test_short_right_channel() {
        let out = interleave(&[vec![1.0f32, 2.0], vec![3.0]]).unwrap();
        assert_eq!(out, vec![1.0, 3.0, 2.0, 0.0]);
    }

    #[test]
    fn test_zero_channels() {
        let none: Vec<Vec<f32>> = Vec::new();
        assert!(matches!(
            interleave(&none),
            Err(TranscodeError::UnsupportedChannelLayout(0))
        ));
    }
}
