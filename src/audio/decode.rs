//! Source audio decoding
//!
//! Turns an arbitrary container/codec byte stream into planar `f32` PCM.

use async_trait::async_trait;
use bytes::Bytes;
use std::io::{Cursor, ErrorKind};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

use crate::error::TranscodeError;

/// Decoded PCM, one sample vector per channel
#[derive(Debug, Clone, Default)]
pub struct DecodedAudio {
    pub channels: Vec<Vec<f32>>,
    pub sample_rate: u32,
}

impl DecodedAudio {
    pub fn new(channels: Vec<Vec<f32>>, sample_rate: u32) -> Self {
        Self {
            channels,
            sample_rate,
        }
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Samples per channel
    pub fn frames(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        self.frames() as u64 * 1000 / self.sample_rate as u64
    }
}

/// Source of decoded PCM for the transcoder
#[async_trait]
pub trait AudioDecoder: Send + Sync {
    async fn decode(&self, raw: Bytes) -> Result<DecodedAudio, TranscodeError>;
}

/// Decoder backed by symphonia's format probe and codec registry
#[derive(Debug, Clone, Default)]
pub struct SymphoniaDecoder {
    extension: Option<String>,
}

impl SymphoniaDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hint the container format with a file extension such as `mp3`
    pub fn with_extension(extension: impl Into<String>) -> Self {
        Self {
            extension: Some(extension.into()),
        }
    }

    fn decode_blocking(&self, raw: Bytes) -> Result<DecodedAudio, TranscodeError> {
        let mss = MediaSourceStream::new(Box::new(Cursor::new(raw)), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = &self.extension {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| TranscodeError::Decode(e.to_string()))?;
        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| TranscodeError::Decode("no supported audio track".to_string()))?;
        let track_id = track.id;
        let declared_channels = track.codec_params.channels.map_or(0, |c| c.count());
        let mut sample_rate = track.codec_params.sample_rate;

        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| TranscodeError::Decode(e.to_string()))?;

        let mut channels: Vec<Vec<f32>> = Vec::new();
        let mut skipped = 0usize;

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref e)) if e.kind() == ErrorKind::UnexpectedEof => break,
                Err(SymphoniaError::ResetRequired) => {
                    warn!("Track list changed mid-stream, keeping what was decoded");
                    break;
                }
                Err(e) => return Err(TranscodeError::Decode(e.to_string())),
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(msg)) => {
                    skipped += 1;
                    warn!("Skipping corrupt packet: {}", msg);
                    continue;
                }
                Err(e) => return Err(TranscodeError::Decode(e.to_string())),
            };

            let spec = *decoded.spec();
            let frames = decoded.frames();
            if frames == 0 {
                continue;
            }
            sample_rate = Some(spec.rate);
            if channels.is_empty() {
                channels = vec![Vec::new(); spec.channels.count()];
            }

            let mut sample_buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
            sample_buf.copy_planar_ref(decoded);
            for (channel, plane) in channels.iter_mut().zip(sample_buf.samples().chunks_exact(frames)) {
                channel.extend_from_slice(plane);
            }
        }

        if channels.is_empty() {
            channels = vec![Vec::new(); declared_channels];
        }
        let sample_rate =
            sample_rate.ok_or_else(|| TranscodeError::Decode("unknown sample rate".to_string()))?;

        let audio = DecodedAudio::new(channels, sample_rate);
        debug!(
            "Decoded {} channels, {} frames at {} Hz ({} packets skipped)",
            audio.channel_count(),
            audio.frames(),
            audio.sample_rate,
            skipped
        );
        Ok(audio)
    }
}

#[async_trait]
impl AudioDecoder for SymphoniaDecoder {
    async fn decode(&self, raw: Bytes) -> Result<DecodedAudio, TranscodeError> {
        self.decode_blocking(raw)
    }
}
