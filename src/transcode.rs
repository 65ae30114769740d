//! Upload transcoding pipeline
//!
//! ```text
//! raw bytes --> AudioDecoder --> planar PCM --> (resample) --> interleave
//!                                                                  |
//!                                                                  v
//!          packed blob <-- pack <-- collector <-- mpsc <-- EncoderPump(Opus)
//! ```
//!
//! The pump and the collector run concurrently on the calling task; the
//! bounded channel between them carries chunks in order and ends with an
//! explicit `Flushed` event. Nothing is packed unless every stage succeeds.

use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::audio::{
    interleave, resample_channel, target_rate, AudioDecoder, ChannelLayout, DecodedAudio,
    SymphoniaDecoder,
};
use crate::codec::{pack, BlockEncoder, EncoderEvent, EncoderPump, OpusEncoder};
use crate::config::EncoderConfig;
use crate::error::{CodecError, TranscodeError};

/// Interleaved PCM ready for the encoder
#[derive(Debug, Clone)]
pub struct PreparedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub layout: ChannelLayout,
}

/// Turns arbitrary audio files into packed Opus blobs
pub struct Transcoder<D = SymphoniaDecoder> {
    decoder: D,
    config: EncoderConfig,
}

impl Transcoder<SymphoniaDecoder> {
    pub fn new(config: EncoderConfig) -> Self {
        Self::with_decoder(SymphoniaDecoder::new(), config)
    }
}

impl<D: AudioDecoder> Transcoder<D> {
    pub fn with_decoder(decoder: D, config: EncoderConfig) -> Self {
        Self { decoder, config }
    }

    /// Decode, encode and pack `raw` into a blob
    pub async fn transcode(&self, raw: Bytes) -> Result<Bytes, TranscodeError> {
        info!("Transcoding {} bytes of source audio", raw.len());
        let decoded = self.decoder.decode(raw).await?;
        let prepared = prepare(decoded)?;

        let encoder = OpusEncoder::new(&self.config, prepared.sample_rate, prepared.layout)?;
        let blob = encode_and_pack(encoder, &prepared.samples, self.config.channel_capacity).await?;

        info!(
            "Transcoded to {} bytes ({:?}, {} Hz)",
            blob.len(),
            prepared.layout,
            prepared.sample_rate
        );
        Ok(blob)
    }
}

/// Pick the channel layout, fix the sample rate and interleave
pub fn prepare(decoded: DecodedAudio) -> Result<PreparedAudio, TranscodeError> {
    let source_channels = decoded.channel_count();
    let layout = ChannelLayout::for_source(source_channels)?;
    if source_channels > 2 {
        warn!("Source has {} channels, keeping only the first two", source_channels);
    }

    let kept = &decoded.channels[..layout.channels() as usize];
    let sample_rate = target_rate(decoded.sample_rate);
    let samples = if sample_rate == decoded.sample_rate {
        interleave(kept)?
    } else {
        debug!("Resampling {} Hz -> {} Hz", decoded.sample_rate, sample_rate);
        let resampled = kept
            .iter()
            .map(|channel| resample_channel(channel, decoded.sample_rate, sample_rate))
            .collect::<Result<Vec<_>, _>>()?;
        interleave(&resampled)?
    };

    Ok(PreparedAudio {
        samples,
        sample_rate,
        layout,
    })
}

/// Feed `samples` through `encoder` as one unit, flush, and pack the chunks
pub async fn encode_and_pack<E: BlockEncoder>(
    encoder: E,
    samples: &[f32],
    channel_capacity: usize,
) -> Result<Bytes, TranscodeError> {
    let (tx, rx) = mpsc::channel(channel_capacity.max(1));
    let mut pump = EncoderPump::new(encoder, tx);

    let produce = async move {
        pump.encode(samples).await;
        pump.flush().await;
    };
    let ((), collected) = tokio::join!(produce, collect_chunks(rx));

    let chunks = collected?;
    debug!("Collected {} encoded chunks", chunks.len());
    Ok(pack(&chunks)?)
}

/// Gather chunks until the pump reports `Flushed`.
///
/// Returns on the first encoder error; dropping the receiver stops the pump.
pub async fn collect_chunks(
    mut rx: mpsc::Receiver<EncoderEvent>,
) -> Result<Vec<Bytes>, TranscodeError> {
    let mut chunks = Vec::new();
    loop {
        match rx.recv().await {
            Some(EncoderEvent::Chunk(chunk)) => chunks.push(chunk),
            Some(EncoderEvent::Error(e)) => return Err(e.into()),
            Some(EncoderEvent::Flushed) => return Ok(chunks),
            None => {
                return Err(CodecError::EncodingFailed("encoder stopped before flush".into()).into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::decode::tests::wav_bytes;
    use crate::codec::{unpack, OpusDecoder};
    use async_trait::async_trait;

    /// Hands out a fixed decode result
    struct FixedDecoder(DecodedAudio);

    #[async_trait]
    impl AudioDecoder for FixedDecoder {
        async fn decode(&self, _raw: Bytes) -> Result<DecodedAudio, TranscodeError> {
            Ok(self.0.clone())
        }
    }

    fn sine(frames: usize, sample_rate: u32, freq: f32) -> Vec<f32> {
        (0..frames)
            .map(|i| (i as f32 / sample_rate as f32 * freq * 2.0 * std::f32::consts::PI).sin() * 0.5)
            .collect()
    }

    #[tokio::test]
    async fn test_zero_channels_rejected() {
        let transcoder = Transcoder::with_decoder(
            FixedDecoder(DecodedAudio::new(Vec::new(), 48000)),
            EncoderConfig::default(),
        );
        let result = transcoder.transcode(Bytes::new()).await;
        assert!(matches!(result, Err(TranscodeError::UnsupportedChannelLayout(0))));
    }

    #[tokio::test]
    async fn test_stereo_transcode_frames() {
        // 100 ms at 48 kHz is exactly five 20 ms frames
        let left = sine(4800, 48000, 440.0);
        let right = sine(4800, 48000, 660.0);
        let transcoder = Transcoder::with_decoder(
            FixedDecoder(DecodedAudio::new(vec![left, right], 48000)),
            EncoderConfig::default(),
        );

        let blob = transcoder.transcode(Bytes::new()).await.unwrap();
        let chunks = unpack(&blob).unwrap();
        assert_eq!(chunks.len(), 5);

        let mut decoder = OpusDecoder::new(48000, ChannelLayout::Stereo).unwrap();
        for chunk in &chunks {
            assert_eq!(decoder.decode(chunk).unwrap().len(), 1920);
        }
    }

    #[tokio::test]
    async fn test_partial_frame_is_padded() {
        let mono = sine(1000, 16000, 440.0);
        let transcoder = Transcoder::with_decoder(
            FixedDecoder(DecodedAudio::new(vec![mono], 16000)),
            EncoderConfig::default(),
        );

        // 320 samples per frame: three full frames plus one padded
        let blob = transcoder.transcode(Bytes::new()).await.unwrap();
        assert_eq!(unpack(&blob).unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_wav_at_44100_is_resampled() {
        let frames = 44100 / 5;
        let left: Vec<i16> = sine(frames, 44100, 440.0).iter().map(|s| (s * 20000.0) as i16).collect();
        let transcoder = Transcoder::new(EncoderConfig::default());

        let blob = transcoder.transcode(wav_bytes(44100, &[left])).await.unwrap();

        // 200 ms at 48 kHz = ten 20 ms frames
        let chunks = unpack(&blob).unwrap();
        assert_eq!(chunks.len(), 10);
        let mut decoder = OpusDecoder::new(48000, ChannelLayout::Mono).unwrap();
        for chunk in &chunks {
            decoder.decode(chunk).unwrap();
        }
        assert_eq!(decoder.stats().duration_ms, 200);
    }

    #[tokio::test]
    async fn test_undecodable_input() {
        let transcoder = Transcoder::new(EncoderConfig::default());
        let result = transcoder.transcode(Bytes::from_static(b"\x00\x01\x02\x03")).await;
        assert!(matches!(result, Err(TranscodeError::Decode(_))));
    }

    #[test]
    fn test_prepare_drops_extra_channels() {
        let decoded = DecodedAudio::new(
            vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]],
            48000,
        );
        let prepared = prepare(decoded).unwrap();
        assert_eq!(prepared.layout, ChannelLayout::Stereo);
        assert_eq!(prepared.samples, vec![1.0, 3.0, 2.0, 4.0]);
    }

    struct FailingEncoder {
        calls: usize,
    }

    impl BlockEncoder for FailingEncoder {
        fn samples_per_frame(&self) -> usize {
            2
        }

        fn encode_frame(&mut self, _samples: &[f32]) -> Result<Bytes, CodecError> {
            self.calls += 1;
            if self.calls == 3 {
                Err(CodecError::EncodingFailed("bad frame".into()))
            } else {
                Ok(Bytes::from_static(&[0xAB]))
            }
        }
    }

    #[tokio::test]
    async fn test_encoder_error_aborts() {
        // Capacity 1 forces the pump and the collector to interleave
        let result = encode_and_pack(FailingEncoder { calls: 0 }, &[0.0; 64], 1).await;
        assert!(matches!(
            result,
            Err(TranscodeError::Encode(CodecError::EncodingFailed(_)))
        ));
    }

    #[tokio::test]
    async fn test_empty_audio_packs_empty_blob() {
        let result = encode_and_pack(FailingEncoder { calls: 0 }, &[], 4).await.unwrap();
        assert!(result.is_empty());
    }
}
