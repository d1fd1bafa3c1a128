//! Tone sequencer: note → frequency → NCO → sink, paced by the tick source.
//!
//! # Timing
//!
//! Playback is bound to wall-clock duration, not to a sample count. One
//! sample is synthesised per loop iteration while
//! `now_ms() − start < duration_ms`, so the number of samples emitted
//! depends on how fast the loop runs relative to the sample clock. With
//! 1 ms tick resolution the observed duration is in `[d, d + 1]` ms.
//!
//! # Backpressure
//!
//! Each sample goes to both channels. What happens on a failed write is the
//! caller's [`WritePolicy`]:
//!
//! - `DropOnBackpressure`: drop and advance (timing preserved, audible glitch)
//! - `RetryWithBudget(n)`: retry the same sample up to `n` more times before
//!   the phase advances, then drop
//!
//! `NotInitialized` is never retried.
//!
//! # Cancellation
//!
//! [`ToneTask`] is the playback state machine:
//!
//! ```text
//! Idle ──start──▶ Playing ──elapsed ≥ duration──▶ Completed
//!                    │
//!                    └──────cancel token set────▶ Cancelled
//! ```
//!
//! The token is observed between samples, never mid-sample.

use core::sync::atomic::{AtomicBool, Ordering};

use super::nco::{Amplitude, Nco, ToneError};
use super::note::{frequency_hz, Note, PitchClass};
use crate::audio::{Channel, SampleSink, SinkError};
use crate::config::SAMPLE_RATE_HZ;
use crate::fault::{FaultCode, FaultState};
use crate::logging::LogStream;
use crate::tick::Clock;

/// What to do when a sample write fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePolicy {
    /// Drop the sample and keep going.
    DropOnBackpressure,
    /// Retry a `FifoFull` write up to N more times, then drop.
    RetryWithBudget(u16),
}

impl Default for WritePolicy {
    fn default() -> Self {
        Self::DropOnBackpressure
    }
}

/// Playback state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayState {
    /// Created, not started.
    Idle,
    /// Emitting samples.
    Playing,
    /// Duration elapsed.
    Completed,
    /// Stopped early by a [`CancelToken`].
    Cancelled,
}

impl PlayState {
    /// Completed or Cancelled.
    #[inline]
    pub fn is_finished(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

/// Cross-context cancellation flag.
///
/// Stays set until [`reset`](Self::reset).
pub struct CancelToken {
    cancelled: AtomicBool,
}

impl CancelToken {
    pub const fn new() -> Self {
        Self {
            cancelled: AtomicBool::new(false),
        }
    }

    /// Request cancellation of the current (and any later) playback.
    #[inline]
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Allow playback again.
    #[inline]
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::Release);
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of one note. Counters saturate at `u32::MAX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteReport {
    /// Samples synthesised (NCO steps).
    pub samples: u32,
    /// Channel writes accepted by the sink.
    pub delivered: u32,
    /// Channel writes given up on.
    pub dropped: u32,
    /// Extra write attempts made under `RetryWithBudget`.
    pub retries: u32,
    /// Last failure seen, if any.
    pub last_error: Option<SinkError>,
    /// Milliseconds between start and the last clock read.
    pub elapsed_ms: u32,
    /// Terminal (or current) state.
    pub state: PlayState,
}

impl NoteReport {
    const EMPTY: Self = Self {
        samples: 0,
        delivered: 0,
        dropped: 0,
        retries: 0,
        last_error: None,
        elapsed_ms: 0,
        state: PlayState::Idle,
    };
}

/// One note's playback state machine.
///
/// Owns its oscillator for the lifetime of the note.
pub struct ToneTask {
    nco: Nco,
    duration_ms: u32,
    start_ms: u32,
    report: NoteReport,
}

impl ToneTask {
    pub fn new(nco: Nco, duration_ms: u32) -> Self {
        Self {
            nco,
            duration_ms,
            start_ms: 0,
            report: NoteReport::EMPTY,
        }
    }

    #[inline]
    pub fn state(&self) -> PlayState {
        self.report.state
    }

    /// Counters so far.
    #[inline]
    pub fn report(&self) -> NoteReport {
        self.report
    }

    /// Tick count at start.
    pub fn start_ms(&self) -> u32 {
        self.start_ms
    }

    /// Idle → Playing. No effect in any other state.
    pub fn start(&mut self, now_ms: u32) {
        if self.report.state == PlayState::Idle {
            self.start_ms = now_ms;
            self.report.state = PlayState::Playing;
        }
    }

    /// Run one synthesis iteration. Starts the task if idle.
    ///
    /// Returns the state after the iteration.
    pub fn poll<C, S>(
        &mut self,
        clock: &C,
        sink: &mut S,
        policy: WritePolicy,
        cancel: Option<&CancelToken>,
    ) -> PlayState
    where
        C: Clock + ?Sized,
        S: SampleSink + ?Sized,
    {
        match self.report.state {
            PlayState::Idle => self.start(clock.now_ms()),
            PlayState::Playing => {}
            done => return done,
        }

        if cancel.is_some_and(CancelToken::is_cancelled) {
            self.report.state = PlayState::Cancelled;
            return self.report.state;
        }

        let elapsed = clock.elapsed_since(self.start_ms);
        self.report.elapsed_ms = elapsed;
        if elapsed >= self.duration_ms {
            self.report.state = PlayState::Completed;
            return self.report.state;
        }

        let sample = self.nco.step();
        self.report.samples = self.report.samples.saturating_add(1);
        for channel in Channel::BOTH {
            self.deliver(sink, channel, sample, policy);
        }

        self.report.state
    }

    fn deliver<S>(&mut self, sink: &mut S, channel: Channel, sample: i32, policy: WritePolicy)
    where
        S: SampleSink + ?Sized,
    {
        let mut budget = match policy {
            WritePolicy::DropOnBackpressure => 0,
            WritePolicy::RetryWithBudget(n) => n,
        };

        loop {
            match sink.write(channel, sample) {
                Ok(()) => {
                    self.report.delivered = self.report.delivered.saturating_add(1);
                    return;
                }
                Err(SinkError::FifoFull) if budget > 0 => {
                    budget -= 1;
                    self.report.retries = self.report.retries.saturating_add(1);
                    core::hint::spin_loop();
                }
                Err(e) => {
                    self.report.dropped = self.report.dropped.saturating_add(1);
                    self.report.last_error = Some(e);
                    return;
                }
            }
        }
    }
}

/// Totals over a sequence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SequenceReport {
    /// Notes that ran to completion.
    pub completed: usize,
    pub samples: u32,
    pub dropped: u32,
    pub retries: u32,
    /// A note was cancelled; the rest of the sequence was skipped.
    pub cancelled: bool,
}

/// Drives [`ToneTask`]s against a clock and a sink.
///
/// # Example
///
/// ```ignore
/// let mut seq = ToneSequencer::new(&TICKS, sink, CONFIG.write_policy())?
///     .with_log(&LOG_STREAM);
/// seq.play_note(PitchClass::A, 4, 125)?;
/// seq.play_sequence(&sfx::SFX2)?;
/// ```
pub struct ToneSequencer<'a, C: Clock + ?Sized, S: SampleSink> {
    clock: &'a C,
    sink: S,
    policy: WritePolicy,
    amplitude: Amplitude,
    cancel: Option<&'a CancelToken>,
    log: Option<&'a LogStream>,
    fault: Option<&'a FaultState>,
}

impl<'a, C: Clock + ?Sized, S: SampleSink> ToneSequencer<'a, C, S> {
    /// Sequencer at the reference amplitude.
    ///
    /// Fails if the reference amplitude does not fit the sink's width.
    pub fn new(clock: &'a C, sink: S, policy: WritePolicy) -> Result<Self, ToneError> {
        Self::new_with_amplitude(clock, sink, policy, Amplitude::REFERENCE)
    }

    /// Sequencer at `amplitude`, checked against the sink's width.
    pub fn new_with_amplitude(
        clock: &'a C,
        sink: S,
        policy: WritePolicy,
        amplitude: Amplitude,
    ) -> Result<Self, ToneError> {
        if !amplitude.fits(sink.sample_bits()) {
            return Err(ToneError::AmplitudeOutOfRange);
        }
        Ok(Self {
            clock,
            sink,
            policy,
            amplitude,
            cancel: None,
            log: None,
            fault: None,
        })
    }

    /// Replace the output amplitude, checked against the sink's width.
    pub fn with_amplitude(mut self, amplitude: Amplitude) -> Result<Self, ToneError> {
        if !amplitude.fits(self.sink.sample_bits()) {
            return Err(ToneError::AmplitudeOutOfRange);
        }
        self.amplitude = amplitude;
        Ok(self)
    }

    /// Observe `token` between samples.
    pub fn with_cancel(mut self, token: &'a CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// RT log note start/end to `log`.
    pub fn with_log(mut self, log: &'a LogStream) -> Self {
        self.log = Some(log);
        self
    }

    /// Record delivery failures in `fault`.
    pub fn with_fault_state(mut self, fault: &'a FaultState) -> Self {
        self.fault = Some(fault);
        self
    }

    pub fn policy(&self) -> WritePolicy {
        self.policy
    }

    /// Takes effect at the next note.
    pub fn set_policy(&mut self, policy: WritePolicy) {
        self.policy = policy;
    }

    pub fn amplitude(&self) -> Amplitude {
        self.amplitude
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Play `pitch` in `octave` for `duration_ms`. Blocks until done.
    pub fn play_note(
        &mut self,
        pitch: PitchClass,
        octave: u8,
        duration_ms: u32,
    ) -> Result<NoteReport, ToneError> {
        self.play_frequency(frequency_hz(pitch, octave), duration_ms)
    }

    /// Play a sine at `frequency_hz` for `duration_ms`. Blocks until done
    /// or cancelled.
    pub fn play_frequency(
        &mut self,
        frequency_hz: f64,
        duration_ms: u32,
    ) -> Result<NoteReport, ToneError> {
        let nco = Nco::new(frequency_hz, SAMPLE_RATE_HZ, self.amplitude)?;
        let mut task = ToneTask::new(nco, duration_ms);

        task.start(self.clock.now_ms());
        if let Some(log) = self.log {
            crate::rt_debug!(
                log,
                task.start_ms(),
                "tone {:.2} Hz for {} ms",
                frequency_hz,
                duration_ms
            );
        }

        while !task
            .poll(self.clock, &mut self.sink, self.policy, self.cancel)
            .is_finished()
        {}

        let report = task.report();
        self.finish(&report, task.start_ms().wrapping_add(report.elapsed_ms));
        Ok(report)
    }

    /// Play `notes` back to back. Stops early if a note is cancelled.
    pub fn play_sequence(&mut self, notes: &[Note]) -> Result<SequenceReport, ToneError> {
        let mut total = SequenceReport::default();

        for note in notes {
            let report = self.play_note(note.pitch, note.octave, note.duration_ms)?;
            total.samples = total.samples.saturating_add(report.samples);
            total.dropped = total.dropped.saturating_add(report.dropped);
            total.retries = total.retries.saturating_add(report.retries);

            if report.state == PlayState::Cancelled {
                total.cancelled = true;
                break;
            }
            total.completed += 1;
        }

        Ok(total)
    }

    fn finish(&self, report: &NoteReport, now_ms: u32) {
        if let (Some(fault), Some(e)) = (self.fault, report.last_error) {
            fault.record(FaultCode::from(e), report.dropped, now_ms);
        }

        let Some(log) = self.log else {
            return;
        };
        if report.dropped > 0 {
            crate::rt_warn!(
                log,
                now_ms,
                "dropped {} of {} writes ({:?})",
                report.dropped,
                report.samples.saturating_mul(2),
                report.last_error
            );
        }
        crate::rt_info!(
            log,
            now_ms,
            "tone {:?} after {} ms: {} samples",
            report.state,
            report.elapsed_ms,
            report.samples
        );
    }
}
