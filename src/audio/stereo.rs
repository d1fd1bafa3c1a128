//! Latched stereo sink over a frame-oriented codec interface.
//!
//! I2S consumes interleaved (left, right) frames, while the sink contract
//! exposes independent per-channel ports. Each channel owns one latch slot
//! that stands in for its hardware FIFO:
//!
//! ```text
//! write(Left)  ──▶ [L latch] ─┐
//!                              ├──▶ FrameWriter::try_push([L, R])
//! write(Right) ──▶ [R latch] ─┘      (zero timeout, never blocks)
//! ```
//!
//! A channel has free space while its latch is empty. Once both latches
//! hold a sample the frame is pushed; if the writer refuses, both latches
//! stay occupied and further writes to either channel return `FifoFull`
//! until the writer drains.

use super::sink::{Channel, SampleSink, SinkError};
use crate::config::SAMPLE_BITS;

/// Non-blocking frame output (e.g. an I2S TX channel).
pub trait FrameWriter {
    /// Driver error.
    type Error: core::fmt::Debug;

    /// Push one `[left, right]` frame. Returns `false` if there is no room.
    fn try_push(&mut self, frame: [i32; 2]) -> bool;

    /// Discard anything queued but not yet played.
    fn clear(&mut self) -> Result<(), Self::Error>;
}

/// [`StereoFrameSink::clear_buffers`] failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearError<E> {
    /// Called before codec bring-up completed.
    NotInitialized,
    /// Writer failed to clear. The sink is marked uninitialized.
    Writer(E),
}

impl<E: core::fmt::Debug> core::fmt::Display for ClearError<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotInitialized => f.write_str(SinkError::NotInitialized.message()),
            Self::Writer(e) => write!(f, "frame writer clear failed: {:?}", e),
        }
    }
}

/// Per-channel latches in front of a [`FrameWriter`].
pub struct StereoFrameSink<F: FrameWriter> {
    writer: F,
    left: Option<i32>,
    right: Option<i32>,
    initialized: bool,
}

impl<F: FrameWriter> StereoFrameSink<F> {
    /// Create an uninitialized sink. Writes fail until
    /// [`mark_initialized`](Self::mark_initialized).
    pub fn new(writer: F) -> Self {
        Self {
            writer,
            left: None,
            right: None,
            initialized: false,
        }
    }

    /// Record that codec bring-up has completed.
    pub fn mark_initialized(&mut self) {
        self.initialized = true;
    }

    /// Drop latched samples and clear the writer's queue.
    ///
    /// If the writer fails, the channel state is unknown: the sink drops back
    /// to uninitialized and writes report `NotInitialized` until
    /// [`mark_initialized`](Self::mark_initialized) is called again.
    pub fn clear_buffers(&mut self) -> Result<(), ClearError<F::Error>> {
        if !self.initialized {
            return Err(ClearError::NotInitialized);
        }
        self.left = None;
        self.right = None;
        if let Err(e) = self.writer.clear() {
            self.initialized = false;
            return Err(ClearError::Writer(e));
        }
        Ok(())
    }

    /// Channel has a free slot.
    #[inline]
    pub fn has_space(&self, channel: Channel) -> bool {
        match channel {
            Channel::Left => self.left.is_none(),
            Channel::Right => self.right.is_none(),
        }
    }

    /// Underlying writer.
    pub fn writer(&self) -> &F {
        &self.writer
    }

    /// Underlying writer, mutably.
    pub fn writer_mut(&mut self) -> &mut F {
        &mut self.writer
    }

    #[inline]
    fn try_flush(&mut self) {
        if let (Some(l), Some(r)) = (self.left, self.right) {
            if self.writer.try_push([l, r]) {
                self.left = None;
                self.right = None;
            }
        }
    }
}

impl<F: FrameWriter> SampleSink for StereoFrameSink<F> {
    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn sample_bits(&self) -> u32 {
        SAMPLE_BITS
    }

    fn write(&mut self, channel: Channel, sample: i32) -> Result<(), SinkError> {
        if !self.initialized {
            return Err(SinkError::NotInitialized);
        }

        // Pending frame may have room now
        self.try_flush();

        let slot = match channel {
            Channel::Left => &mut self.left,
            Channel::Right => &mut self.right,
        };
        if slot.is_some() {
            return Err(SinkError::FifoFull);
        }
        *slot = Some(sample);

        self.try_flush();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Gate {
        open: bool,
        frames: usize,
        last: [i32; 2],
    }

    impl FrameWriter for Gate {
        type Error = core::convert::Infallible;

        fn try_push(&mut self, frame: [i32; 2]) -> bool {
            if self.open {
                self.frames += 1;
                self.last = frame;
            }
            self.open
        }

        fn clear(&mut self) -> Result<(), Self::Error> {
            Ok(())
        }
    }

    fn gate(open: bool) -> StereoFrameSink<Gate> {
        let mut sink = StereoFrameSink::new(Gate {
            open,
            frames: 0,
            last: [0; 2],
        });
        sink.mark_initialized();
        sink
    }

    #[test]
    fn test_frame_pushed_when_both_latched() {
        let mut sink = gate(true);
        sink.write(Channel::Left, 7).unwrap();
        assert_eq!(sink.writer().frames, 0);
        sink.write(Channel::Right, -7).unwrap();
        assert_eq!(sink.writer().frames, 1);
        assert_eq!(sink.writer().last, [7, -7]);
        assert!(sink.has_space(Channel::Left));
        assert!(sink.has_space(Channel::Right));
    }

    #[test]
    fn test_channel_full_while_latched() {
        let mut sink = gate(true);
        sink.write(Channel::Left, 1).unwrap();
        assert_eq!(sink.write(Channel::Left, 2), Err(SinkError::FifoFull));
    }

    #[test]
    fn test_blocked_writer_resumes() {
        let mut sink = gate(false);
        sink.write(Channel::Left, 1).unwrap();
        sink.write(Channel::Right, 2).unwrap();
        assert_eq!(sink.write(Channel::Left, 3), Err(SinkError::FifoFull));

        sink.writer_mut().open = true;
        sink.write(Channel::Left, 3).unwrap();
        assert_eq!(sink.writer().last, [1, 2]);
    }
}
