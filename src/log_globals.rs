//! Global log stream and fault state.

use crate::fault::FaultState;
use crate::logging::LogStream;

/// Main-line log stream.
///
/// Single producer (synthesis loop), single consumer (drain between effects).
pub static LOG_STREAM: LogStream = LogStream::new();

/// Most recent delivery fault.
pub static FAULT_STATE: FaultState = FaultState::new();
