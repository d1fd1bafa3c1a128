//! Sample delivery fault tracking.
//!
//! Failed writes do not leave the synthesis loop: the note keeps its
//! wall-clock duration and the sample is dropped (or retried, then dropped).
//! After each note that lost samples the sequencer records it here, and the
//! main loop picks the record up between effects.
//!
//! Single writer (the sequencer), any number of readers. Fields are
//! published by the Release store of `active`.

use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};

use crate::audio::SinkError;

/// Why samples were lost.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum FaultCode {
    None = 0,
    /// Writes attempted before codec bring-up completed.
    SinkNotInitialized = 1,
    /// FIFO stayed full past the write policy's budget.
    Backpressure = 2,
}

impl FaultCode {
    /// Decode a stored code. Unknown values read as `None`.
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::SinkNotInitialized,
            2 => Self::Backpressure,
            _ => Self::None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::SinkNotInitialized => "sink not initialized",
            Self::Backpressure => "backpressure",
        }
    }
}

impl From<SinkError> for FaultCode {
    fn from(e: SinkError) -> Self {
        match e {
            SinkError::NotInitialized => Self::SinkNotInitialized,
            SinkError::FifoFull => Self::Backpressure,
        }
    }
}

/// Last delivery fault plus running totals.
///
/// ```ignore
/// static FAULT_STATE: FaultState = FaultState::new();
///
/// // sequencer, after a lossy note
/// FAULT_STATE.record(FaultCode::Backpressure, dropped, now_ms);
///
/// // main loop, between effects
/// if let Some(fault) = FAULT_STATE.take() {
///     rt_warn!(LOG_STREAM, now_ms, "{}: {} lost", fault.code.as_str(), fault.dropped);
/// }
/// ```
pub struct FaultState {
    active: AtomicBool,
    code: AtomicU8,
    /// Writes dropped by the last faulting note.
    dropped: AtomicU32,
    /// Tick count when the last fault was recorded.
    at_ms: AtomicU32,
    /// Faulting notes since boot. Never cleared.
    count: AtomicU32,
    /// Writes dropped since boot (saturating). Never cleared.
    total_dropped: AtomicU32,
}

impl FaultState {
    pub const fn new() -> Self {
        Self {
            active: AtomicBool::new(false),
            code: AtomicU8::new(FaultCode::None as u8),
            dropped: AtomicU32::new(0),
            at_ms: AtomicU32::new(0),
            count: AtomicU32::new(0),
            total_dropped: AtomicU32::new(0),
        }
    }

    /// Record a note that dropped `dropped` writes. Overwrites any record
    /// not yet taken.
    #[inline]
    pub fn record(&self, code: FaultCode, dropped: u32, at_ms: u32) {
        self.code.store(code as u8, Ordering::Relaxed);
        self.dropped.store(dropped, Ordering::Relaxed);
        self.at_ms.store(at_ms, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
        let total = self.total_dropped.load(Ordering::Relaxed);
        self.total_dropped
            .store(total.saturating_add(dropped), Ordering::Relaxed);
        self.active.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Only meaningful while `is_active()`.
    #[inline]
    pub fn code(&self) -> FaultCode {
        FaultCode::from_u8(self.code.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn dropped(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn count(&self) -> u32 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn total_dropped(&self) -> u32 {
        self.total_dropped.load(Ordering::Relaxed)
    }

    /// Clear the active flag. Totals are kept.
    pub fn clear(&self) {
        self.active.store(false, Ordering::Release);
    }

    /// Snapshot and clear the pending record, if any.
    pub fn take(&self) -> Option<FaultSnapshot> {
        if !self.active.swap(false, Ordering::AcqRel) {
            return None;
        }
        Some(FaultSnapshot {
            code: self.code(),
            dropped: self.dropped(),
            at_ms: self.at_ms.load(Ordering::Relaxed),
            count: self.count(),
        })
    }
}

impl Default for FaultState {
    fn default() -> Self {
        Self::new()
    }
}

/// A taken fault record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FaultSnapshot {
    pub code: FaultCode,
    pub dropped: u32,
    pub at_ms: u32,
    pub count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_take() {
        let fault = FaultState::new();
        assert!(fault.take().is_none());

        fault.record(FaultCode::Backpressure, 42, 1000);
        assert!(fault.is_active());

        let snap = fault.take().unwrap();
        assert_eq!(snap.code, FaultCode::Backpressure);
        assert_eq!(snap.dropped, 42);
        assert_eq!(snap.at_ms, 1000);
        assert_eq!(snap.count, 1);

        assert!(!fault.is_active());
        assert!(fault.take().is_none());
    }

    #[test]
    fn test_totals_survive_clear() {
        let fault = FaultState::new();
        fault.record(FaultCode::Backpressure, 10, 1);
        fault.record(FaultCode::SinkNotInitialized, 5, 2);
        fault.clear();

        assert_eq!(fault.count(), 2);
        assert_eq!(fault.total_dropped(), 15);
        // Latest record wins
        assert_eq!(fault.code(), FaultCode::SinkNotInitialized);
    }

    #[test]
    fn test_total_saturates() {
        let fault = FaultState::new();
        fault.record(FaultCode::Backpressure, u32::MAX, 0);
        fault.record(FaultCode::Backpressure, 1, 0);
        assert_eq!(fault.total_dropped(), u32::MAX);
    }

    #[test]
    fn test_code_from_sink_error() {
        assert_eq!(FaultCode::from(SinkError::FifoFull), FaultCode::Backpressure);
        assert_eq!(FaultCode::from(SinkError::NotInitialized), FaultCode::SinkNotInitialized);
        assert_eq!(FaultCode::from_u8(200), FaultCode::None);
    }
}
