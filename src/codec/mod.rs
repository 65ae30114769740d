//! Opus codec wrapper and packed blob framing
//!
//! Uploads are Opus frames packed into a length-prefixed blob; see
//! [`framing`] for the byte layout.

pub mod decoder;
pub mod encoder;
pub mod framing;

pub use decoder::OpusDecoder;
pub use encoder::{BlockEncoder, EncoderEvent, EncoderPump, OpusEncoder};
pub use framing::{pack, unpack, FrameReader};
