//! Audio subsystem module

pub mod decode;
pub mod interleave;
pub mod resample;

pub use decode::{AudioDecoder, DecodedAudio, SymphoniaDecoder};
pub use interleave::{interleave, ChannelLayout};
pub use resample::{resample_channel, target_rate};
