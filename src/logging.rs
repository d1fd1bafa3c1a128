//! RT-safe logging for the synthesis loop.
//!
//! # Architecture
//!
//! ```text
//! Synthesis loop         LogStream            Drain
//! ──────────────         ─────────            ─────
//!
//! rt_log!() ──────────▶ [L0][L1][L2] ──────▶ UART TX / stdout
//! non-blocking            lock-free           between effects,
//!                         ring buffer         blocking ok
//! ```
//!
//! # Rules
//!
//! - The synthesis and interrupt paths never call blocking log functions
//! - `println!` and ESP_LOGx are forbidden inside `play_note`
//! - One producer (main line), one consumer (drain)
//! - Messages are timestamped in tick-source milliseconds
//! - Messages may be dropped if the ring is full
//! - Levels above the stream's threshold are never formatted

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicU32, AtomicU8, Ordering};

/// Maximum message length.
pub const MAX_MSG_LEN: usize = 96;

/// Log buffer size (number of entries).
pub const LOG_BUFFER_SIZE: usize = 64;

/// Log level.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogLevel {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
    Trace = 4,
}

impl LogLevel {
    /// Convert to string for output.
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warn => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
            LogLevel::Trace => "TRACE",
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            0 => LogLevel::Error,
            1 => LogLevel::Warn,
            2 => LogLevel::Info,
            3 => LogLevel::Debug,
            _ => LogLevel::Trace,
        }
    }
}

/// A single log entry.
#[derive(Clone, Copy)]
#[repr(C)]
pub struct LogEntry {
    /// Tick count when logged.
    pub timestamp_ms: u32,
    pub level: LogLevel,
    /// Message length.
    pub len: u8,
    /// Message bytes (not null-terminated).
    pub msg: [u8; MAX_MSG_LEN],
}

impl LogEntry {
    const EMPTY: Self = Self {
        timestamp_ms: 0,
        level: LogLevel::Info,
        len: 0,
        msg: [0; MAX_MSG_LEN],
    };

    /// Message text, or `"<invalid utf8>"` if truncation split a character.
    pub fn text(&self) -> &str {
        core::str::from_utf8(&self.msg[..self.len as usize]).unwrap_or("<invalid utf8>")
    }
}

impl Default for LogEntry {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// Lock-free SPSC log ring.
///
/// - Push never blocks (drops message if full)
/// - Drain runs between effects, at leisure
pub struct LogStream<const N: usize = LOG_BUFFER_SIZE> {
    entries: UnsafeCell<[LogEntry; N]>,
    write_idx: AtomicU32,
    read_idx: AtomicU32,
    dropped: AtomicU32,
    max_level: AtomicU8,
}

// SAFETY: One producer writes only the slot at write_idx and publishes it with
// a Release store; one consumer reads only slots below write_idx (Acquire).
unsafe impl<const N: usize> Sync for LogStream<N> {}
unsafe impl<const N: usize> Send for LogStream<N> {}

impl<const N: usize> LogStream<N> {
    const MASK: usize = N - 1;

    /// Create a new empty log stream at `Info` verbosity.
    pub const fn new() -> Self {
        assert!(N.is_power_of_two(), "Log buffer size must be power of 2");

        Self {
            entries: UnsafeCell::new([LogEntry::EMPTY; N]),
            write_idx: AtomicU32::new(0),
            read_idx: AtomicU32::new(0),
            dropped: AtomicU32::new(0),
            max_level: AtomicU8::new(LogLevel::Info as u8),
        }
    }

    /// Most verbose level still recorded.
    pub fn level(&self) -> LogLevel {
        LogLevel::from_u8(self.max_level.load(Ordering::Relaxed))
    }

    pub fn set_level(&self, level: LogLevel) {
        self.max_level.store(level as u8, Ordering::Relaxed);
    }

    /// `level` passes the threshold.
    #[inline]
    pub fn enabled(&self, level: LogLevel) -> bool {
        level as u8 <= self.max_level.load(Ordering::Relaxed)
    }

    /// Push a log entry (RT-safe, never blocks).
    ///
    /// Returns `true` if message was queued, `false` if dropped (ring full
    /// or filtered).
    ///
    /// # Timing
    ///
    /// Completes in O(1), well under one 20.8 µs sample period.
    #[inline]
    pub fn push(&self, timestamp_ms: u32, level: LogLevel, msg: &[u8]) -> bool {
        if !self.enabled(level) {
            return false;
        }

        let write = self.write_idx.load(Ordering::Relaxed);
        let read = self.read_idx.load(Ordering::Acquire);

        if write.wrapping_sub(read) >= N as u32 {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        let idx = (write as usize) & Self::MASK;

        // SAFETY: Single producer; the consumer never touches idx until the
        // Release store below publishes it.
        unsafe {
            let entry = &mut (*self.entries.get())[idx];
            entry.timestamp_ms = timestamp_ms;
            entry.level = level;
            entry.len = msg.len().min(MAX_MSG_LEN) as u8;
            entry.msg[..entry.len as usize].copy_from_slice(&msg[..entry.len as usize]);
        }

        self.write_idx.store(write.wrapping_add(1), Ordering::Release);
        true
    }

    /// Drain next log entry.
    ///
    /// Returns `None` if no entries available.
    #[inline]
    pub fn drain(&self) -> Option<LogEntry> {
        let read = self.read_idx.load(Ordering::Relaxed);
        let write = self.write_idx.load(Ordering::Acquire);

        if read == write {
            return None;
        }

        let idx = (read as usize) & Self::MASK;

        // SAFETY: Single consumer; slot published by the producer's Release.
        let entry = unsafe { (*self.entries.get())[idx] };

        self.read_idx.store(read.wrapping_add(1), Ordering::Release);
        Some(entry)
    }

    /// Drain everything pending into `sink`. Returns the number drained.
    pub fn drain_each(&self, mut sink: impl FnMut(&LogEntry)) -> usize {
        let mut count = 0;
        while let Some(entry) = self.drain() {
            sink(&entry);
            count += 1;
        }
        count
    }

    /// Get count of dropped messages.
    #[inline]
    pub fn dropped(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Reset dropped counter (e.g., after reporting).
    #[inline]
    pub fn reset_dropped(&self) {
        self.dropped.store(0, Ordering::Relaxed);
    }

    /// Get number of entries waiting to be drained.
    #[inline]
    pub fn pending(&self) -> u32 {
        let read = self.read_idx.load(Ordering::Relaxed);
        let write = self.write_idx.load(Ordering::Acquire);
        write.wrapping_sub(read)
    }
}

impl<const N: usize> Default for LogStream<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Truncating `fmt::Write` over a byte slice.
pub struct BufWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> BufWriter<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes written so far.
    pub fn len(&self) -> usize {
        self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.pos == 0
    }
}

impl core::fmt::Write for BufWriter<'_> {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        let bytes = s.as_bytes();
        let to_write = bytes.len().min(self.buf.len() - self.pos);
        self.buf[self.pos..self.pos + to_write].copy_from_slice(&bytes[..to_write]);
        self.pos += to_write;
        Ok(())
    }
}

/// Format a message into a buffer.
///
/// Returns the number of bytes written.
#[inline]
pub fn format_to_buffer(buf: &mut [u8], args: core::fmt::Arguments<'_>) -> usize {
    let mut writer = BufWriter::new(buf);
    let _ = core::fmt::write(&mut writer, args);
    writer.len()
}

/// RT-safe log macro.
///
/// Use this in the synthesis path instead of println!, ESP_LOGx, etc.
///
/// # Example
///
/// ```ignore
/// rt_log!(LogLevel::Info, LOG_STREAM, TICKS.now_ms(), "tone {} Hz", freq);
/// ```
#[macro_export]
macro_rules! rt_log {
    ($level:expr, $stream:expr, $timestamp:expr, $($arg:tt)*) => {{
        let level = $level;
        if $stream.enabled(level) {
            let mut buf = [0u8; $crate::logging::MAX_MSG_LEN];
            let len = $crate::logging::format_to_buffer(&mut buf, format_args!($($arg)*));
            $stream.push($timestamp, level, &buf[..len]);
        }
    }};
}

/// RT-safe info log.
#[macro_export]
macro_rules! rt_info {
    ($stream:expr, $timestamp:expr, $($arg:tt)*) => {
        $crate::rt_log!($crate::logging::LogLevel::Info, $stream, $timestamp, $($arg)*)
    };
}

/// RT-safe warning log.
#[macro_export]
macro_rules! rt_warn {
    ($stream:expr, $timestamp:expr, $($arg:tt)*) => {
        $crate::rt_log!($crate::logging::LogLevel::Warn, $stream, $timestamp, $($arg)*)
    };
}

/// RT-safe error log.
#[macro_export]
macro_rules! rt_error {
    ($stream:expr, $timestamp:expr, $($arg:tt)*) => {
        $crate::rt_log!($crate::logging::LogLevel::Error, $stream, $timestamp, $($arg)*)
    };
}

/// RT-safe debug log.
#[macro_export]
macro_rules! rt_debug {
    ($stream:expr, $timestamp:expr, $($arg:tt)*) => {
        $crate::rt_log!($crate::logging::LogLevel::Debug, $stream, $timestamp, $($arg)*)
    };
}

/// RT-safe trace log (maximum verbosity).
#[macro_export]
macro_rules! rt_trace {
    ($stream:expr, $timestamp:expr, $($arg:tt)*) => {
        $crate::rt_log!($crate::logging::LogLevel::Trace, $stream, $timestamp, $($arg)*)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_stream_basic() {
        let stream = LogStream::<16>::new();

        assert!(stream.push(1000, LogLevel::Info, b"tone 440.00 Hz for 125 ms"));
        assert_eq!(stream.pending(), 1);

        let entry = stream.drain().unwrap();
        assert_eq!(entry.timestamp_ms, 1000);
        assert_eq!(entry.level, LogLevel::Info);
        assert_eq!(entry.text(), "tone 440.00 Hz for 125 ms");

        assert_eq!(stream.pending(), 0);
    }

    #[test]
    fn test_log_stream_full() {
        let stream = LogStream::<4>::new();

        for t in 1..=4 {
            assert!(stream.push(t, LogLevel::Info, b"x"));
        }

        // Should drop, and not disturb what is queued
        assert!(!stream.push(5, LogLevel::Info, b"5"));
        assert_eq!(stream.dropped(), 1);
        assert_eq!(stream.pending(), 4);

        // Drain one, should be able to push again
        assert_eq!(stream.drain().map(|e| e.timestamp_ms), Some(1));
        assert!(stream.push(6, LogLevel::Info, b"6"));
        assert_eq!(stream.drain_each(|_| {}), 4);
    }

    #[test]
    fn test_level_threshold() {
        let stream = LogStream::<8>::new();
        assert!(!stream.push(0, LogLevel::Debug, b"hidden"));
        assert_eq!(stream.dropped(), 0);

        stream.set_level(LogLevel::Trace);
        crate::rt_debug!(stream, 3, "note {}", 7);
        let entry = stream.drain().unwrap();
        assert_eq!(entry.text(), "note 7");
        assert_eq!(entry.level, LogLevel::Debug);
    }

    #[test]
    fn test_format_to_buffer_truncates() {
        let mut buf = [0u8; 8];
        let len = format_to_buffer(&mut buf, format_args!("dropped {}", 12345));
        assert_eq!(&buf[..len], b"dropped ");
    }

    #[test]
    fn test_log_level_ordering() {
        assert!(LogLevel::Error < LogLevel::Warn);
        assert!(LogLevel::Warn < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Debug);
        assert!(LogLevel::Debug < LogLevel::Trace);
    }

    #[test]
    fn test_producer_consumer_threads() {
        use std::sync::Arc;
        use std::thread;

        let stream = Arc::new(LogStream::<16>::new());
        let producer = {
            let stream = Arc::clone(&stream);
            thread::spawn(move || {
                let mut queued = 0u32;
                for t in 0..500u32 {
                    let msg = format!("tick {}", t);
                    if stream.push(t, LogLevel::Info, msg.as_bytes()) {
                        queued += 1;
                    }
                }
                queued
            })
        };

        let mut seen = Vec::new();
        while !producer.is_finished() || stream.pending() > 0 {
            stream.drain_each(|e| seen.push(e.timestamp_ms));
        }
        let queued = producer.join().unwrap();
        stream.drain_each(|e| seen.push(e.timestamp_ms));

        assert_eq!(seen.len() as u32, queued);
        assert_eq!(queued + stream.dropped(), 500);
        // FIFO order survives drops
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
    }
}
