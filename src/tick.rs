//! Free-running millisecond tick source.
//!
//! ```text
//! Timer IRQ (1 kHz)        TickCounter          Main line
//! ─────────────────        ───────────          ─────────
//!
//! TickIsr::on_interrupt ──▶ [AtomicU32] ──────▶ now_ms()
//!   +1, clear flag,         single writer        any context,
//!   feed watchdog                                never blocks
//! ```
//!
//! The counter is the only datum shared between interrupt and main-line
//! code. It is written exclusively by [`TickIsr`] and read everywhere else.
//! A 32-bit counter matches the atomic read width of the target, so reads
//! are never torn. It wraps after ~49.7 days; elapsed time is always
//! computed with `wrapping_sub`.

use core::sync::atomic::{AtomicU32, Ordering};

use crate::config::TICK_INTERVAL_MS;

/// Anything that can report milliseconds since boot.
pub trait Clock {
    /// Current tick count in milliseconds. Must never block.
    fn now_ms(&self) -> u32;

    /// Milliseconds elapsed since `start`.
    #[inline]
    fn elapsed_since(&self, start: u32) -> u32 {
        self.now_ms().wrapping_sub(start)
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    #[inline]
    fn now_ms(&self) -> u32 {
        (**self).now_ms()
    }
}

/// Process-wide monotonic millisecond counter.
///
/// # Usage
///
/// ```ignore
/// static TICKS: TickCounter = TickCounter::new();
///
/// // In the timer ISR (via TickIsr):
/// TICKS.increment();
///
/// // Anywhere:
/// let start = TICKS.now_ms();
/// ```
pub struct TickCounter {
    ticks: AtomicU32,
}

impl TickCounter {
    /// Create a counter at zero.
    pub const fn new() -> Self {
        Self {
            ticks: AtomicU32::new(0),
        }
    }

    /// Advance by exactly one tick. Interrupt context only.
    #[inline]
    pub fn increment(&self) {
        self.ticks.fetch_add(1, Ordering::Release);
    }

    /// Pure read of the counter.
    #[inline]
    pub fn now_ms(&self) -> u32 {
        self.ticks.load(Ordering::Acquire).wrapping_mul(TICK_INTERVAL_MS)
    }
}

impl Default for TickCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TickCounter {
    #[inline]
    fn now_ms(&self) -> u32 {
        TickCounter::now_ms(self)
    }
}

/// Control flags written alongside the reload value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerControl {
    /// Timer counting.
    pub enable: bool,
    /// Expiry raises an interrupt.
    pub irq_enable: bool,
    /// Reload value is reapplied on expiry.
    pub auto_reload: bool,
}

impl TimerControl {
    /// Enabled, interrupting, auto-reloading.
    pub const FREE_RUNNING: Self = Self {
        enable: true,
        irq_enable: true,
        auto_reload: true,
    };

    /// Packed E/I/A bits (bit 0 enable, bit 1 auto-reload, bit 2 irq).
    pub fn bits(self) -> u32 {
        (self.enable as u32) | ((self.auto_reload as u32) << 1) | ((self.irq_enable as u32) << 2)
    }
}

/// Clears the timer's pending-interrupt flag so the hardware re-arms.
pub trait IrqAck {
    fn clear_pending(&mut self);
}

/// External watchdog serviced from the tick interrupt.
pub trait Watchdog {
    fn service(&mut self);
}

/// No external watchdog.
impl Watchdog for () {
    #[inline]
    fn service(&mut self) {}
}

/// Hardware countdown timer driving the tick source.
///
/// Implemented by the ESP-IDF timer adapter in production and by the
/// in-memory timers in [`crate::sim`] for tests.
pub trait TimerHw {
    /// Driver error.
    type Error;
    /// Handle moved into the interrupt handler.
    type Ack: IrqAck + Send + 'static;

    /// Timer input clock in Hz.
    fn input_hz(&self) -> u64;

    /// Load the countdown value and control flags. Starts counting if
    /// `control.enable` is set.
    fn reload(&mut self, load: u64, control: TimerControl) -> Result<(), Self::Error>;

    /// Acknowledge handle for the interrupt handler.
    fn ack(&self) -> Self::Ack;

    /// Register `handler` for the expiry interrupt.
    fn register_handler<F>(&mut self, handler: F) -> Result<(), Self::Error>
    where
        F: FnMut() + Send + 'static;
}

/// Tick source error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickError<E> {
    /// Timer input clock too slow for a 1 ms interval.
    ClockTooSlow,
    /// Underlying timer driver failed.
    Timer(E),
}

impl<E: core::fmt::Debug> core::fmt::Display for TickError<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::ClockTooSlow => write!(f, "timer clock too slow for 1 ms tick"),
            Self::Timer(e) => write!(f, "timer driver error: {:?}", e),
        }
    }
}

/// Interrupt-side half of the tick source.
///
/// Must complete in bounded, small time: it runs at 1 kHz.
pub struct TickIsr<A: IrqAck, W: Watchdog> {
    counter: &'static TickCounter,
    ack: A,
    watchdog: W,
}

impl<A: IrqAck, W: Watchdog> TickIsr<A, W> {
    pub fn new(counter: &'static TickCounter, ack: A, watchdog: W) -> Self {
        Self {
            counter,
            ack,
            watchdog,
        }
    }

    /// Timer expiry: count, re-arm, feed the watchdog.
    #[inline]
    pub fn on_interrupt(&mut self) {
        self.counter.increment();
        self.ack.clear_pending();
        self.watchdog.service();
    }
}

/// Millisecond tick source over a hardware countdown timer.
pub struct TickSource<T: TimerHw> {
    counter: &'static TickCounter,
    timer: T,
}

impl<T: TimerHw> TickSource<T> {
    pub fn new(counter: &'static TickCounter, timer: T) -> Self {
        Self { counter, timer }
    }

    /// Countdown value for one tick interval at the timer's input clock.
    pub fn load_value(&self) -> u64 {
        self.timer.input_hz() * u64::from(TICK_INTERVAL_MS) / 1000
    }

    /// Configure reload + control, then register the expiry handler.
    ///
    /// The timer starts counting immediately.
    pub fn init<W>(&mut self, watchdog: W) -> Result<(), TickError<T::Error>>
    where
        W: Watchdog + Send + 'static,
    {
        self.reset()?;

        let mut isr = TickIsr::new(self.counter, self.timer.ack(), watchdog);
        self.timer
            .register_handler(move || isr.on_interrupt())
            .map_err(TickError::Timer)
    }

    /// (Re)load the countdown and control configuration. Idempotent.
    pub fn reset(&mut self) -> Result<(), TickError<T::Error>> {
        let load = self.load_value();
        if load == 0 {
            return Err(TickError::ClockTooSlow);
        }
        self.timer
            .reload(load, TimerControl::FREE_RUNNING)
            .map_err(TickError::Timer)
    }

    /// Milliseconds since boot.
    #[inline]
    pub fn now_ms(&self) -> u32 {
        self.counter.now_ms()
    }

    /// Shared counter handle.
    pub fn counter(&self) -> &'static TickCounter {
        self.counter
    }

    /// Underlying timer.
    pub fn timer(&self) -> &T {
        &self.timer
    }

    pub fn timer_mut(&mut self) -> &mut T {
        &mut self.timer
    }
}
