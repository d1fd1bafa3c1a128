//! Sample sink contract.
//!
//! A stereo output device with independent left/right write ports, each
//! backed by a small hardware FIFO. Writes never block: a full FIFO is
//! reported as [`SinkError::FifoFull`] and the caller decides what to do.

/// Output channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Left,
    Right,
}

impl Channel {
    /// Both channels, left first.
    pub const BOTH: [Channel; 2] = [Channel::Left, Channel::Right];
}

/// Sample write failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkError {
    /// Write attempted before codec bring-up completed.
    NotInitialized,
    /// No free FIFO slot at check time. Transient.
    FifoFull,
}

impl SinkError {
    /// Get error message
    pub fn message(&self) -> &'static str {
        match self {
            Self::NotInitialized => "sink not initialized",
            Self::FifoFull => "FIFO full",
        }
    }
}

impl core::fmt::Display for SinkError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.message())
    }
}

/// Stereo sample output.
pub trait SampleSink {
    /// Bring-up has completed and the sink accepts samples.
    fn is_initialized(&self) -> bool;

    /// Signed sample width in bits. Samples must fit in this width.
    fn sample_bits(&self) -> u32;

    /// Write one sample to `channel`. Must never block.
    fn write(&mut self, channel: Channel, sample: i32) -> Result<(), SinkError>;
}

impl<S: SampleSink> SampleSink for &mut S {
    #[inline]
    fn is_initialized(&self) -> bool {
        (**self).is_initialized()
    }

    #[inline]
    fn sample_bits(&self) -> u32 {
        (**self).sample_bits()
    }

    #[inline]
    fn write(&mut self, channel: Channel, sample: i32) -> Result<(), SinkError> {
        (**self).write(channel, sample)
    }
}
