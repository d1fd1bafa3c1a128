//! Numerically controlled oscillator (DDS core).
//!
//! Phase accumulator in radians, re-normalised into `[0, 2π)` by repeated
//! subtraction after every step, then mapped through `sin`:
//!
//! ```text
//! phase += 2π·f/fs
//! while phase ≥ 2π { phase -= 2π }
//! sample = round(A · sin(phase))
//! ```
//!
//! The sample sequence depends only on `f`, `fs` and `A`: two oscillators
//! created with the same arguments emit identical streams.

use core::f64::consts::TAU;

use crate::config::AMPLITUDE_REFERENCE;

/// Tone generation error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToneError {
    /// Frequency not finite, not positive, or at/above Nyquist.
    InvalidFrequency,
    /// Amplitude could exceed the sink's sample width.
    AmplitudeOutOfRange,
}

impl ToneError {
    /// Get error message
    pub fn message(&self) -> &'static str {
        match self {
            Self::InvalidFrequency => "frequency out of range",
            Self::AmplitudeOutOfRange => "amplitude exceeds sample width",
        }
    }
}

impl core::fmt::Display for ToneError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.message())
    }
}

/// Peak output amplitude in sample units.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Amplitude(f64);

impl Amplitude {
    /// Literal reference scale (2^31 / 80).
    pub const REFERENCE: Self = Self(AMPLITUDE_REFERENCE);

    /// Explicit scale. Negative or non-finite values are clamped to zero.
    pub fn new(scale: f64) -> Self {
        if scale.is_finite() && scale > 0.0 {
            Self(scale)
        } else {
            Self(0.0)
        }
    }

    /// `fraction` of full scale for a signed `bits`-wide sample.
    pub fn for_sample_bits(bits: u32, fraction: f64) -> Self {
        Self::new(Self::max_for_bits(bits) * fraction.clamp(0.0, 1.0))
    }

    /// Largest positive value of a signed `bits`-wide sample.
    pub fn max_for_bits(bits: u32) -> f64 {
        let bits = bits.clamp(2, 32);
        ((1u64 << (bits - 1)) - 1) as f64
    }

    /// `round(±scale)` fits a signed `bits`-wide sample.
    pub fn fits(self, bits: u32) -> bool {
        libm::round(self.0) <= Self::max_for_bits(bits)
    }

    #[inline]
    pub fn scale(self) -> f64 {
        self.0
    }
}

impl Default for Amplitude {
    fn default() -> Self {
        Self::REFERENCE
    }
}

/// Phase increment in radians per sample for `frequency_hz` at `sample_rate_hz`.
#[inline]
pub fn phase_increment(frequency_hz: f64, sample_rate_hz: f64) -> f64 {
    TAU * frequency_hz / sample_rate_hz
}

/// Oscillator state. Owned by exactly one playback call.
#[derive(Debug, Clone)]
pub struct Nco {
    phase: f64,
    increment: f64,
    amplitude: f64,
}

impl Nco {
    /// Create an oscillator at phase 0.
    ///
    /// Rejects frequencies that are not finite, not positive, or at or above
    /// `sample_rate_hz / 2`. This keeps the increment below π, so the
    /// renormalisation loop subtracts at most once per step.
    pub fn new(
        frequency_hz: f64,
        sample_rate_hz: u32,
        amplitude: Amplitude,
    ) -> Result<Self, ToneError> {
        let fs = f64::from(sample_rate_hz);
        if !frequency_hz.is_finite() || frequency_hz <= 0.0 || frequency_hz >= fs / 2.0 {
            return Err(ToneError::InvalidFrequency);
        }

        Ok(Self {
            phase: 0.0,
            increment: phase_increment(frequency_hz, fs),
            amplitude: amplitude.scale(),
        })
    }

    /// Advance one sample period and return the new sample.
    #[inline]
    pub fn step(&mut self) -> i32 {
        self.phase += self.increment;
        while self.phase >= TAU {
            self.phase -= TAU;
        }
        libm::round(self.amplitude * libm::sin(self.phase)) as i32
    }

    /// Current phase, always in `[0, 2π)`.
    #[inline]
    pub fn phase(&self) -> f64 {
        self.phase
    }

    /// Phase increment per step.
    #[inline]
    pub fn increment(&self) -> f64 {
        self.increment
    }

    /// Output frequency for `sample_rate_hz`.
    pub fn frequency_hz(&self, sample_rate_hz: u32) -> f64 {
        self.increment * f64::from(sample_rate_hz) / TAU
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_sample_is_after_one_increment() {
        let mut nco = Nco::new(12_000.0, 48_000, Amplitude::new(1000.0)).unwrap();
        // quarter cycle per step
        assert_eq!(nco.step(), 1000);
        assert_eq!(nco.step(), 0);
        assert_eq!(nco.step(), -1000);
    }

    #[test]
    fn test_rejects_nyquist_and_above() {
        assert_eq!(
            Nco::new(24_000.0, 48_000, Amplitude::REFERENCE).err(),
            Some(ToneError::InvalidFrequency)
        );
        assert!(Nco::new(0.0, 48_000, Amplitude::REFERENCE).is_err());
        assert!(Nco::new(f64::NAN, 48_000, Amplitude::REFERENCE).is_err());
        assert!(Nco::new(-440.0, 48_000, Amplitude::REFERENCE).is_err());
    }

    #[test]
    fn test_amplitude_width_checks() {
        assert!(Amplitude::REFERENCE.fits(32));
        assert!(!Amplitude::REFERENCE.fits(24));
        assert_eq!(Amplitude::max_for_bits(16), 32767.0);
        assert!(Amplitude::for_sample_bits(24, 1.0).fits(24));
    }
}
