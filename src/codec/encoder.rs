//! Opus encoder wrapper
//!
//! Provides fixed-frame Opus encoding and the pump that feeds a whole audio
//! unit through an encoder, emitting chunks over a channel.

use bytes::Bytes;
use opus::{Application, Channels, Encoder};
use tokio::sync::mpsc;

use crate::audio::ChannelLayout;
use crate::config::EncoderConfig;
use crate::error::CodecError;

/// Largest Opus packet we ask the library to produce into
const MAX_PACKET_SIZE: usize = 4000;

/// Encoder that turns exactly one frame of interleaved samples into a chunk
pub trait BlockEncoder: Send {
    /// Interleaved samples per frame (all channels)
    fn samples_per_frame(&self) -> usize;

    fn encode_frame(&mut self, samples: &[f32]) -> Result<Bytes, CodecError>;
}

/// Opus encoder wrapper with the upload settings applied
pub struct OpusEncoder {
    encoder: Encoder,
    sample_rate: u32,
    layout: ChannelLayout,
    /// Samples per channel in one frame
    frame_size: usize,
    /// Encoding buffer (reused to avoid allocations)
    encode_buffer: Vec<u8>,
    /// Frame counter for statistics
    frames_encoded: u64,
    /// Total bytes produced
    bytes_produced: u64,
}

impl OpusEncoder {
    /// Create an encoder for the given source rate and layout
    pub fn new(
        config: &EncoderConfig,
        sample_rate: u32,
        layout: ChannelLayout,
    ) -> Result<Self, CodecError> {
        let channels = match layout {
            ChannelLayout::Mono => Channels::Mono,
            ChannelLayout::Stereo => Channels::Stereo,
        };
        let frame_size = config.frame_size(sample_rate)?;

        let mut encoder = Encoder::new(sample_rate, channels, Application::Audio)
            .map_err(|e| CodecError::EncoderInit(e.to_string()))?;

        Self::configure_encoder(&mut encoder, config)?;

        Ok(Self {
            encoder,
            sample_rate,
            layout,
            frame_size,
            encode_buffer: vec![0u8; MAX_PACKET_SIZE],
            frames_encoded: 0,
            bytes_produced: 0,
        })
    }

    fn configure_encoder(encoder: &mut Encoder, config: &EncoderConfig) -> Result<(), CodecError> {
        encoder
            .set_bitrate(opus::Bitrate::Bits(config.bitrate as i32))
            .map_err(|e| CodecError::EncoderInit(format!("Failed to set bitrate: {}", e)))?;

        encoder
            .set_vbr(config.vbr)
            .map_err(|e| CodecError::EncoderInit(format!("Failed to set VBR: {}", e)))?;

        Ok(())
    }

    /// Encode one frame of interleaved samples
    ///
    /// Input length must equal [`OpusEncoder::samples_per_frame`].
    pub fn encode(&mut self, samples: &[f32]) -> Result<Bytes, CodecError> {
        if samples.len() != self.samples_per_frame() {
            return Err(CodecError::InvalidFrameSize(samples.len()));
        }

        let size = self
            .encoder
            .encode_float(samples, &mut self.encode_buffer)
            .map_err(|e| CodecError::EncodingFailed(e.to_string()))?;

        self.frames_encoded += 1;
        self.bytes_produced += size as u64;

        Ok(Bytes::copy_from_slice(&self.encode_buffer[..size]))
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn layout(&self) -> ChannelLayout {
        self.layout
    }

    /// Samples per channel in one frame
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    pub fn samples_per_frame(&self) -> usize {
        self.frame_size * self.layout.channels() as usize
    }

    pub fn frame_duration_ms(&self) -> f32 {
        self.frame_size as f32 * 1000.0 / self.sample_rate as f32
    }

    pub fn stats(&self) -> EncoderStats {
        EncoderStats {
            frames_encoded: self.frames_encoded,
            bytes_produced: self.bytes_produced,
            average_frame_size: if self.frames_encoded > 0 {
                self.bytes_produced as f32 / self.frames_encoded as f32
            } else {
                0.0
            },
        }
    }
}

impl BlockEncoder for OpusEncoder {
    fn samples_per_frame(&self) -> usize {
        OpusEncoder::samples_per_frame(self)
    }

    fn encode_frame(&mut self, samples: &[f32]) -> Result<Bytes, CodecError> {
        self.encode(samples)
    }
}

/// Encoder statistics
#[derive(Debug, Clone)]
pub struct EncoderStats {
    pub frames_encoded: u64,
    pub bytes_produced: u64,
    pub average_frame_size: f32,
}

/// Output of an [`EncoderPump`]
#[derive(Debug)]
pub enum EncoderEvent {
    Chunk(Bytes),
    Error(CodecError),
    /// All buffered audio has been emitted; nothing follows
    Flushed,
}

/// Splits audio units into frames, encodes them, and emits the chunks in
/// order. After an encoder error or a closed receiver the pump stops and
/// ignores further input.
pub struct EncoderPump<E> {
    encoder: E,
    pending: Vec<f32>,
    tx: mpsc::Sender<EncoderEvent>,
    stopped: bool,
}

impl<E: BlockEncoder> EncoderPump<E> {
    pub fn new(encoder: E, tx: mpsc::Sender<EncoderEvent>) -> Self {
        Self {
            encoder,
            pending: Vec::new(),
            tx,
            stopped: false,
        }
    }

    /// Feed one unit of interleaved audio.
    ///
    /// Whole frames are encoded straight from `unit`; only a trailing partial
    /// frame is buffered.
    pub async fn encode(&mut self, unit: &[f32]) {
        if self.stopped {
            return;
        }
        let frame_len = self.encoder.samples_per_frame();
        let mut rest = unit;

        // Complete the frame left over from the previous unit
        if !self.pending.is_empty() {
            let missing = frame_len - self.pending.len();
            if rest.len() < missing {
                self.pending.extend_from_slice(rest);
                return;
            }
            self.pending.extend_from_slice(&rest[..missing]);
            rest = &rest[missing..];
            let result = self.encoder.encode_frame(&self.pending);
            self.pending.clear();
            self.emit(result).await;
        }

        let mut frames = rest.chunks_exact(frame_len);
        for frame in &mut frames {
            if self.stopped {
                return;
            }
            let result = self.encoder.encode_frame(frame);
            self.emit(result).await;
        }
        if !self.stopped {
            self.pending.extend_from_slice(frames.remainder());
        }
    }

    /// Encode the zero-padded remainder and signal end of stream
    pub async fn flush(mut self) {
        if !self.stopped && !self.pending.is_empty() {
            let mut frame = std::mem::take(&mut self.pending);
            frame.resize(self.encoder.samples_per_frame(), 0.0);
            let result = self.encoder.encode_frame(&frame);
            self.emit(result).await;
        }
        if !self.stopped {
            let _ = self.tx.send(EncoderEvent::Flushed).await;
        }
    }

    async fn emit(&mut self, result: Result<Bytes, CodecError>) {
        let event = match result {
            Ok(chunk) => EncoderEvent::Chunk(chunk),
            Err(e) => {
                self.stopped = true;
                EncoderEvent::Error(e)
            }
        };
        if self.tx.send(event).await.is_err() {
            self.stopped = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn music_encoder(sample_rate: u32, layout: ChannelLayout) -> OpusEncoder {
        OpusEncoder::new(&EncoderConfig::default(), sample_rate, layout).unwrap()
    }

    #[test]
    fn test_encoder_creation() {
        let encoder = music_encoder(48000, ChannelLayout::Stereo);
        assert_eq!(encoder.sample_rate(), 48000);
        assert_eq!(encoder.frame_size(), 960);
        assert_eq!(encoder.samples_per_frame(), 1920);
        assert!((encoder.frame_duration_ms() - 20.0).abs() < 0.01);
    }

    #[test]
    fn test_unsupported_rate() {
        let result = OpusEncoder::new(&EncoderConfig::default(), 44100, ChannelLayout::Stereo);
        assert!(result.is_err());
    }

    #[test]
    fn test_encoding() {
        let mut encoder = music_encoder(48000, ChannelLayout::Stereo);
        let frame_size = encoder.samples_per_frame();

        let samples = vec![0.0f32; frame_size];
        let encoded = encoder.encode(&samples).unwrap();
        assert!(!encoded.is_empty());
        assert!(encoded.len() < frame_size * 4);
        assert_eq!(encoder.stats().frames_encoded, 1);
    }

    #[test]
    fn test_wrong_frame_length() {
        let mut encoder = music_encoder(24000, ChannelLayout::Mono);
        assert!(matches!(
            encoder.encode(&[0.0; 100]),
            Err(CodecError::InvalidFrameSize(100))
        ));
    }

    /// Emits the first sample of each frame as a one-byte chunk
    struct TaggingEncoder {
        frame: usize,
        fail_at: Option<usize>,
        calls: usize,
    }

    impl BlockEncoder for TaggingEncoder {
        fn samples_per_frame(&self) -> usize {
            self.frame
        }

        fn encode_frame(&mut self, samples: &[f32]) -> Result<Bytes, CodecError> {
            assert_eq!(samples.len(), self.frame);
            self.calls += 1;
            if self.fail_at == Some(self.calls) {
                return Err(CodecError::EncodingFailed("boom".into()));
            }
            Ok(Bytes::from(vec![samples[0] as u8, samples[self.frame - 1] as u8]))
        }
    }

    async fn drain(mut rx: mpsc::Receiver<EncoderEvent>) -> Vec<EncoderEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_pump_frames_and_padding() {
        let (tx, rx) = mpsc::channel(16);
        let encoder = TaggingEncoder { frame: 4, fail_at: None, calls: 0 };
        let mut pump = EncoderPump::new(encoder, tx);

        let samples: Vec<f32> = (1..=10).map(|i| i as f32).collect();
        pump.encode(&samples).await;
        pump.flush().await;

        let events = drain(rx).await;
        assert_eq!(events.len(), 4);
        let chunks: Vec<Vec<u8>> = events[..3]
            .iter()
            .map(|e| match e {
                EncoderEvent::Chunk(c) => c.to_vec(),
                other => panic!("unexpected {:?}", other),
            })
            .collect();
        // Last frame is [9, 10, 0, 0]
        assert_eq!(chunks, vec![vec![1, 4], vec![5, 8], vec![9, 0]]);
        assert!(matches!(events[3], EncoderEvent::Flushed));
    }

    #[tokio::test]
    async fn test_pump_frames_across_units() {
        let (tx, rx) = mpsc::channel(16);
        let encoder = TaggingEncoder { frame: 4, fail_at: None, calls: 0 };
        let mut pump = EncoderPump::new(encoder, tx);

        pump.encode(&[1.0, 2.0, 3.0]).await;
        pump.encode(&[4.0]).await;
        pump.encode(&[5.0, 6.0, 7.0, 8.0, 9.0, 10.0]).await;
        pump.flush().await;

        let chunks: Vec<Vec<u8>> = drain(rx)
            .await
            .into_iter()
            .filter_map(|e| match e {
                EncoderEvent::Chunk(c) => Some(c.to_vec()),
                _ => None,
            })
            .collect();
        assert_eq!(chunks, vec![vec![1, 4], vec![5, 8], vec![9, 0]]);
    }

    #[tokio::test]
    async fn test_pump_buffers_only_the_tail() {
        let (tx, _rx) = mpsc::channel(64);
        let encoder = TaggingEncoder { frame: 100, fail_at: None, calls: 0 };
        let mut pump = EncoderPump::new(encoder, tx);

        pump.encode(&[1.0; 1003]).await;

        assert_eq!(pump.encoder.calls, 10);
        assert_eq!(pump.pending.len(), 3);
        assert!(pump.pending.capacity() < 100);
    }

    #[tokio::test]
    async fn test_pump_stops_on_error() {
        let (tx, rx) = mpsc::channel(16);
        let encoder = TaggingEncoder { frame: 2, fail_at: Some(2), calls: 0 };
        let mut pump = EncoderPump::new(encoder, tx);

        pump.encode(&[1.0; 10]).await;
        pump.encode(&[1.0; 10]).await;
        pump.flush().await;

        let events = drain(rx).await;
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], EncoderEvent::Chunk(_)));
        assert!(matches!(events[1], EncoderEvent::Error(_)));
    }
}
