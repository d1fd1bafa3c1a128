//! Audio output path
//!
//! Architecture:
//! - `SampleSink`: per-channel, non-blocking write contract
//! - `StereoFrameSink`: one latch per channel in front of an I2S frame writer
//! - WM8731 codec @ 48 kHz, 32-bit I2S words

pub mod sink;
pub mod stereo;

pub use sink::{Channel, SampleSink, SinkError};
pub use stereo::{ClearError, FrameWriter, StereoFrameSink};
