//! # dds-tonegen
//!
//! Direct Digital Synthesis tone generator for a WM8731 stereo codec.
//!
//! ## Architecture
//!
//! The synthesis loop is a busy-wait on a millisecond tick counter:
//! - `tick`: 1 kHz timer interrupt increments a shared counter
//! - `dds`: phase accumulator → sine samples, note table, effect sequences
//! - `audio`: non-blocking per-channel sample sink in front of I2S
//! - `hal`: codec bring-up over a register bus, ESP-IDF adapters
//!
//! Nothing on the sample path allocates, locks or blocks. Diagnostics go
//! to an RT-safe [`LogStream`] drained between effects.

#![cfg_attr(not(any(test, feature = "std")), no_std)]

pub mod audio;
pub mod config;
pub mod dds;
pub mod fault;
pub mod hal;
pub mod log_globals;
pub mod logging;
pub mod tick;
pub mod uart_logger;

#[cfg(feature = "std")]
pub mod sim;

pub use audio::{Channel, SampleSink, SinkError, StereoFrameSink};
pub use config::CONFIG;
pub use dds::{Note, PitchClass, ToneError, ToneSequencer, WritePolicy};
pub use fault::{FaultCode, FaultState};
pub use logging::{LogLevel, LogStream};
pub use tick::{Clock, TickCounter, TickSource};
