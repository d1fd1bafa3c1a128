//! In-memory fakes of the hardware boundaries, plus signal analysis helpers.
//!
//! Used by the test suite and the host simulation binary. Nothing here
//! touches real hardware.

use std::cell::Cell;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::audio::{Channel, FrameWriter, SampleSink, SinkError};
use crate::config::SAMPLE_BITS;
use crate::hal::RegisterBus;
use crate::tick::{Clock, IrqAck, TimerControl, TimerHw, Watchdog};

// ---------------------------------------------------------------------------
// Clocks
// ---------------------------------------------------------------------------

/// Clock that advances one millisecond every `reads_per_ms` reads.
///
/// Makes busy-wait playback deterministic: with one read per loop
/// iteration, `reads_per_ms = 48` emits 48 samples per millisecond.
pub struct SimClock {
    reads: Cell<u64>,
    reads_per_ms: u64,
    offset_ms: u32,
}

impl SimClock {
    pub fn new(reads_per_ms: u64) -> Self {
        Self::starting_at(0, reads_per_ms)
    }

    /// Start at `offset_ms` (e.g. just below the wrap point).
    pub fn starting_at(offset_ms: u32, reads_per_ms: u64) -> Self {
        Self {
            reads: Cell::new(0),
            reads_per_ms: reads_per_ms.max(1),
            offset_ms,
        }
    }
}

impl Clock for SimClock {
    fn now_ms(&self) -> u32 {
        let r = self.reads.get();
        self.reads.set(r + 1);
        self.offset_ms.wrapping_add((r / self.reads_per_ms) as u32)
    }
}

// ---------------------------------------------------------------------------
// Sinks
// ---------------------------------------------------------------------------

/// Sink that records every accepted sample.
pub struct CaptureSink {
    pub left: Vec<i32>,
    pub right: Vec<i32>,
    initialized: bool,
    bits: u32,
    full: bool,
    fail_every: Option<u64>,
    attempts: u64,
}

impl CaptureSink {
    /// Initialized, 32-bit, always has space.
    pub fn new() -> Self {
        Self {
            left: Vec::new(),
            right: Vec::new(),
            initialized: true,
            bits: SAMPLE_BITS,
            full: false,
            fail_every: None,
            attempts: 0,
        }
    }

    /// Bring-up not yet done.
    pub fn uninitialized() -> Self {
        Self {
            initialized: false,
            ..Self::new()
        }
    }

    pub fn with_sample_bits(mut self, bits: u32) -> Self {
        self.bits = bits;
        self
    }

    /// Every `n`th write attempt reports `FifoFull`.
    pub fn fail_every(mut self, n: u64) -> Self {
        self.fail_every = Some(n.max(1));
        self
    }

    /// Advertise zero free slots (or restore space).
    pub fn set_full(&mut self, full: bool) {
        self.full = full;
    }

    pub fn set_initialized(&mut self, initialized: bool) {
        self.initialized = initialized;
    }

    /// Write attempts, accepted or not.
    pub fn attempts(&self) -> u64 {
        self.attempts
    }

    pub fn samples(&self, channel: Channel) -> &[i32] {
        match channel {
            Channel::Left => &self.left,
            Channel::Right => &self.right,
        }
    }
}

impl Default for CaptureSink {
    fn default() -> Self {
        Self::new()
    }
}

impl SampleSink for CaptureSink {
    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn sample_bits(&self) -> u32 {
        self.bits
    }

    fn write(&mut self, channel: Channel, sample: i32) -> Result<(), SinkError> {
        self.attempts += 1;
        if !self.initialized {
            return Err(SinkError::NotInitialized);
        }
        if self.full || self.fail_every.is_some_and(|n| self.attempts % n == 0) {
            return Err(SinkError::FifoFull);
        }
        match channel {
            Channel::Left => self.left.push(sample),
            Channel::Right => self.right.push(sample),
        }
        Ok(())
    }
}

/// Per-channel FIFO of `depth` slots drained in real time at `rate_hz`.
pub struct PacedSink {
    start: Instant,
    rate_hz: u64,
    depth: u64,
    written: [u64; 2],
    rejected: [u64; 2],
}

impl PacedSink {
    pub fn new(rate_hz: u32, depth: u32) -> Self {
        Self {
            start: Instant::now(),
            rate_hz: u64::from(rate_hz),
            depth: u64::from(depth.max(1)),
            written: [0; 2],
            rejected: [0; 2],
        }
    }

    /// Samples accepted on `channel`.
    pub fn accepted(&self, channel: Channel) -> u64 {
        self.written[channel as usize]
    }

    /// `FifoFull` results on `channel`.
    pub fn rejected(&self, channel: Channel) -> u64 {
        self.rejected[channel as usize]
    }

    fn drained(&self) -> u64 {
        let elapsed = self.start.elapsed().as_nanos();
        (elapsed * u128::from(self.rate_hz) / 1_000_000_000) as u64
    }
}

impl SampleSink for PacedSink {
    fn is_initialized(&self) -> bool {
        true
    }

    fn sample_bits(&self) -> u32 {
        SAMPLE_BITS
    }

    fn write(&mut self, channel: Channel, _sample: i32) -> Result<(), SinkError> {
        let i = channel as usize;
        let drained = self.drained();
        // An idle FIFO underruns; it cannot bank slots for later.
        if self.written[i] < drained {
            self.written[i] = drained;
        }
        if self.written[i] - drained >= self.depth {
            self.rejected[i] += 1;
            return Err(SinkError::FifoFull);
        }
        self.written[i] += 1;
        Ok(())
    }
}

/// Simulated frame writer failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimWriterError;

/// Frame writer with an optional capacity and an on/off gate.
#[derive(Default)]
pub struct SimFrameWriter {
    pub frames: Vec<[i32; 2]>,
    capacity: Option<usize>,
    blocked: bool,
    fail_clear: bool,
    clears: u32,
}

impl SimFrameWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse pushes once `capacity` frames are queued.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
            ..Self::default()
        }
    }

    pub fn set_blocked(&mut self, blocked: bool) {
        self.blocked = blocked;
    }

    /// Make `clear` fail, leaving the queue untouched.
    pub fn set_fail_clear(&mut self, fail: bool) {
        self.fail_clear = fail;
    }

    /// Play out (remove) up to `n` queued frames.
    pub fn play(&mut self, n: usize) -> Vec<[i32; 2]> {
        let n = n.min(self.frames.len());
        self.frames.drain(..n).collect()
    }

    pub fn clears(&self) -> u32 {
        self.clears
    }
}

impl FrameWriter for SimFrameWriter {
    type Error = SimWriterError;

    fn try_push(&mut self, frame: [i32; 2]) -> bool {
        if self.blocked || self.capacity.is_some_and(|c| self.frames.len() >= c) {
            return false;
        }
        self.frames.push(frame);
        true
    }

    fn clear(&mut self) -> Result<(), SimWriterError> {
        if self.fail_clear {
            return Err(SimWriterError);
        }
        self.frames.clear();
        self.clears += 1;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Codec control bus
// ---------------------------------------------------------------------------

/// Simulated bus NACK.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimBusError;

/// Records register writes; optionally fails the `n`th (0-based).
#[derive(Default)]
pub struct RecordingBus {
    pub writes: Vec<(u8, u16)>,
    fail_at: Option<usize>,
    attempts: usize,
}

impl RecordingBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_at(index: usize) -> Self {
        Self {
            fail_at: Some(index),
            ..Self::default()
        }
    }
}

impl RegisterBus for RecordingBus {
    type Error = SimBusError;

    fn write_register(&mut self, reg: u8, value: u16) -> Result<(), SimBusError> {
        let n = self.attempts;
        self.attempts += 1;
        if self.fail_at == Some(n) {
            return Err(SimBusError);
        }
        self.writes.push((reg, value));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Timers
// ---------------------------------------------------------------------------

/// Register state of a simulated countdown timer.
#[derive(Default)]
pub struct SimTimerRegs {
    load: AtomicU64,
    control: AtomicU32,
    pending: AtomicBool,
    reloads: AtomicU32,
}

impl SimTimerRegs {
    pub fn load(&self) -> u64 {
        self.load.load(Ordering::Acquire)
    }

    /// Packed E/A/I control bits.
    pub fn control(&self) -> u32 {
        self.control.load(Ordering::Acquire)
    }

    pub fn pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// Number of `reload` calls.
    pub fn reloads(&self) -> u32 {
        self.reloads.load(Ordering::Acquire)
    }
}

/// Pending-flag clear for [`SimTimer`].
pub struct SimAck(Arc<SimTimerRegs>);

impl IrqAck for SimAck {
    fn clear_pending(&mut self) {
        self.0.pending.store(false, Ordering::Release);
    }
}

/// Countdown timer fired by hand with [`SimTimer::fire`].
pub struct SimTimer {
    input_hz: u64,
    regs: Arc<SimTimerRegs>,
    handler: Option<Box<dyn FnMut() + Send>>,
}

impl SimTimer {
    pub fn new(input_hz: u64) -> Self {
        Self {
            input_hz,
            regs: Arc::new(SimTimerRegs::default()),
            handler: None,
        }
    }

    pub fn regs(&self) -> &SimTimerRegs {
        &self.regs
    }

    /// Simulate one expiry. Returns `false` if the timer is not running with
    /// its interrupt enabled, or no handler is registered.
    pub fn fire(&mut self) -> bool {
        let control = self.regs.control();
        let running = TimerControl::FREE_RUNNING.bits();
        if control & running != running {
            return false;
        }
        let Some(handler) = self.handler.as_mut() else {
            return false;
        };
        self.regs.pending.store(true, Ordering::Release);
        handler();
        true
    }
}

impl TimerHw for SimTimer {
    type Error = core::convert::Infallible;
    type Ack = SimAck;

    fn input_hz(&self) -> u64 {
        self.input_hz
    }

    fn reload(&mut self, load: u64, control: TimerControl) -> Result<(), Self::Error> {
        self.regs.load.store(load, Ordering::Release);
        self.regs.control.store(control.bits(), Ordering::Release);
        self.regs.reloads.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    fn ack(&self) -> SimAck {
        SimAck(Arc::clone(&self.regs))
    }

    fn register_handler<F>(&mut self, handler: F) -> Result<(), Self::Error>
    where
        F: FnMut() + Send + 'static,
    {
        self.handler = Some(Box::new(handler));
        Ok(())
    }
}

/// Host timer: a thread calls the handler once per reload period.
pub struct ThreadTimer {
    input_hz: u64,
    period_ns: Arc<AtomicU64>,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

/// The host thread has nothing to acknowledge.
pub struct NoAck;

impl IrqAck for NoAck {
    fn clear_pending(&mut self) {}
}

impl ThreadTimer {
    pub fn new(input_hz: u64) -> Self {
        Self {
            input_hz: input_hz.max(1),
            period_ns: Arc::new(AtomicU64::new(1_000_000)),
            running: Arc::new(AtomicBool::new(false)),
            thread: None,
        }
    }

    /// Stop the tick thread.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl TimerHw for ThreadTimer {
    type Error = core::convert::Infallible;
    type Ack = NoAck;

    fn input_hz(&self) -> u64 {
        self.input_hz
    }

    fn reload(&mut self, load: u64, control: TimerControl) -> Result<(), Self::Error> {
        let ns = (u128::from(load) * 1_000_000_000 / u128::from(self.input_hz)) as u64;
        self.period_ns.store(ns.max(1), Ordering::Release);
        self.running.store(control.enable && control.irq_enable, Ordering::Release);
        Ok(())
    }

    fn ack(&self) -> NoAck {
        NoAck
    }

    fn register_handler<F>(&mut self, mut handler: F) -> Result<(), Self::Error>
    where
        F: FnMut() + Send + 'static,
    {
        self.stop();
        self.running.store(true, Ordering::Release);

        let period = Arc::clone(&self.period_ns);
        let running = Arc::clone(&self.running);
        self.thread = Some(std::thread::spawn(move || {
            let mut deadline = Instant::now();
            while running.load(Ordering::Acquire) {
                deadline += Duration::from_nanos(period.load(Ordering::Acquire));
                if let Some(wait) = deadline.checked_duration_since(Instant::now()) {
                    std::thread::sleep(wait);
                }
                handler();
            }
        }));
        Ok(())
    }
}

impl Drop for ThreadTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Watchdog that counts services.
#[derive(Clone, Default)]
pub struct CountingWatchdog(Arc<AtomicU32>);

impl CountingWatchdog {
    pub fn services(&self) -> u32 {
        self.0.load(Ordering::Acquire)
    }
}

impl Watchdog for CountingWatchdog {
    fn service(&mut self) {
        self.0.fetch_add(1, Ordering::AcqRel);
    }
}

// ---------------------------------------------------------------------------
// Analysis
// ---------------------------------------------------------------------------

/// Indices `i` where `samples[i - 1] < 0 <= samples[i]`.
pub fn rising_zero_crossings(samples: &[i32]) -> Vec<usize> {
    samples
        .windows(2)
        .enumerate()
        .filter(|(_, w)| w[0] < 0 && w[1] >= 0)
        .map(|(i, _)| i + 1)
        .collect()
}

/// Indices where the sign flips, in either direction.
pub fn zero_crossings(samples: &[i32]) -> Vec<usize> {
    samples
        .windows(2)
        .enumerate()
        .filter(|(_, w)| (w[0] < 0) != (w[1] < 0))
        .map(|(i, _)| i + 1)
        .collect()
}

/// Mean spacing between consecutive `crossings`.
pub fn mean_spacing(crossings: &[usize]) -> Option<f64> {
    match crossings {
        [first, .., last] => Some((last - first) as f64 / (crossings.len() - 1) as f64),
        _ => None,
    }
}

/// Fundamental estimated from rising zero crossings.
pub fn estimate_frequency_hz(samples: &[i32], sample_rate_hz: u32) -> Option<f64> {
    mean_spacing(&rising_zero_crossings(samples)).map(|period| f64::from(sample_rate_hz) / period)
}
