//! Opus decoder wrapper
//!
//! Used to check packed blobs: every chunk must decode on its own.

use opus::{Channels, Decoder};

use crate::audio::ChannelLayout;
use crate::error::CodecError;

/// Opus decoder wrapper
pub struct OpusDecoder {
    decoder: Decoder,
    sample_rate: u32,
    layout: ChannelLayout,
    /// Decoding buffer (reused to avoid allocations)
    decode_buffer: Vec<f32>,
    /// Frames decoded
    frames_decoded: u64,
    /// Total samples produced, all channels
    samples_produced: u64,
}

impl OpusDecoder {
    /// Create a new Opus decoder
    pub fn new(sample_rate: u32, layout: ChannelLayout) -> Result<Self, CodecError> {
        let channels = match layout {
            ChannelLayout::Mono => Channels::Mono,
            ChannelLayout::Stereo => Channels::Stereo,
        };

        let decoder = Decoder::new(sample_rate, channels)
            .map_err(|e| CodecError::DecoderInit(e.to_string()))?;

        // 120ms at 48kHz stereo = 11520 samples, the largest Opus packet
        let decode_buffer = vec![0.0f32; 48000 * 2 * 120 / 1000];

        Ok(Self {
            decoder,
            sample_rate,
            layout,
            decode_buffer,
            frames_decoded: 0,
            samples_produced: 0,
        })
    }

    /// Decode one Opus packet to interleaved samples
    pub fn decode(&mut self, data: &[u8]) -> Result<Vec<f32>, CodecError> {
        let samples = self
            .decoder
            .decode_float(data, &mut self.decode_buffer, false)
            .map_err(|e| CodecError::DecodingFailed(e.to_string()))?;

        let total_samples = samples * self.layout.channels() as usize;
        self.frames_decoded += 1;
        self.samples_produced += total_samples as u64;

        Ok(self.decode_buffer[..total_samples].to_vec())
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn layout(&self) -> ChannelLayout {
        self.layout
    }

    pub fn stats(&self) -> DecoderStats {
        let per_channel = self.samples_produced / self.layout.channels() as u64;
        DecoderStats {
            frames_decoded: self.frames_decoded,
            samples_produced: self.samples_produced,
            duration_ms: per_channel * 1000 / self.sample_rate as u64,
        }
    }
}

/// Decoder statistics
#[derive(Debug, Clone)]
pub struct DecoderStats {
    pub frames_decoded: u64,
    pub samples_produced: u64,
    pub duration_ms: u64,
}
