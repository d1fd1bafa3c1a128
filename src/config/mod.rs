//! Module: config
//!
//! Purpose: Fixed synthesis constants and the runtime playback config.
//!
//! Architecture:
//! - Constants: sample clock, tick interval, reference octave/amplitude
//! - `CONFIG`: global runtime settings, applied at effect boundaries
//! - All runtime config atomically accessible (lock-free)
//!
//! Safety: RT-safe. All access via atomics, no locks.

use core::sync::atomic::{AtomicU16, AtomicU8, Ordering};

use crate::dds::WritePolicy;

/// Codec sample clock in Hz. Fixed by the codec configuration.
pub const SAMPLE_RATE_HZ: u32 = 48_000;

/// Tick source interval.
pub const TICK_INTERVAL_MS: u32 = 1;

/// Octave at which the note table is defined.
pub const REFERENCE_OCTAVE: u8 = 4;

/// Codec sample word width.
pub const SAMPLE_BITS: u32 = 32;

/// Reference output amplitude: 2^31 / 80, truncated.
pub const AMPLITUDE_REFERENCE: f64 = 26_843_545.0;

const POLICY_DROP: u8 = 0;
const POLICY_RETRY: u8 = 1;

/// Runtime playback settings.
pub struct PlaybackConfig {
    policy: AtomicU8,
    retry_budget: AtomicU16,
}

impl PlaybackConfig {
    /// Drop-on-backpressure, the reference behaviour.
    pub const fn new() -> Self {
        Self {
            policy: AtomicU8::new(POLICY_DROP),
            retry_budget: AtomicU16::new(0),
        }
    }

    /// Current sample write policy.
    pub fn write_policy(&self) -> WritePolicy {
        match self.policy.load(Ordering::Acquire) {
            POLICY_RETRY => WritePolicy::RetryWithBudget(self.retry_budget.load(Ordering::Relaxed)),
            _ => WritePolicy::DropOnBackpressure,
        }
    }

    /// Change the write policy. Takes effect at the next note.
    pub fn set_write_policy(&self, policy: WritePolicy) {
        match policy {
            WritePolicy::DropOnBackpressure => {
                self.policy.store(POLICY_DROP, Ordering::Release);
            }
            WritePolicy::RetryWithBudget(budget) => {
                // Budget first: a reader that sees RETRY must see the new budget.
                self.retry_budget.store(budget, Ordering::Relaxed);
                self.policy.store(POLICY_RETRY, Ordering::Release);
            }
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Global playback config.
pub static CONFIG: PlaybackConfig = PlaybackConfig::new();

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_drops() {
        let config = PlaybackConfig::new();
        assert_eq!(config.write_policy(), WritePolicy::DropOnBackpressure);
    }

    #[test]
    fn test_policy_round_trip() {
        let config = PlaybackConfig::new();
        config.set_write_policy(WritePolicy::RetryWithBudget(64));
        assert_eq!(config.write_policy(), WritePolicy::RetryWithBudget(64));

        config.set_write_policy(WritePolicy::DropOnBackpressure);
        assert_eq!(config.write_policy(), WritePolicy::DropOnBackpressure);
    }

    #[test]
    fn test_reference_amplitude_is_one_eightieth_of_full_scale() {
        assert_eq!(AMPLITUDE_REFERENCE, ((1u64 << 31) / 80) as f64);
    }
}
