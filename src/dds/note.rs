//! Equal-tempered note table.

use crate::config::REFERENCE_OCTAVE;

/// The 12 pitch classes. Sharps share the flat's slot.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PitchClass {
    C = 0,
    Db = 1,
    D = 2,
    Eb = 3,
    E = 4,
    F = 5,
    Gb = 6,
    G = 7,
    Ab = 8,
    A = 9,
    Bb = 10,
    B = 11,
}

#[allow(non_upper_case_globals)]
impl PitchClass {
    pub const Cs: Self = Self::Db;
    pub const Ds: Self = Self::Eb;
    pub const Fs: Self = Self::Gb;
    pub const Gs: Self = Self::Ab;
    pub const As: Self = Self::Bb;

    /// All pitch classes in table order.
    pub const ALL: [PitchClass; 12] = [
        Self::C,
        Self::Db,
        Self::D,
        Self::Eb,
        Self::E,
        Self::F,
        Self::Gb,
        Self::G,
        Self::Ab,
        Self::A,
        Self::Bb,
        Self::B,
    ];

    /// Convert from table index (wraps modulo 12).
    pub fn from_index(index: u8) -> Self {
        Self::ALL[usize::from(index % 12)]
    }

    /// Reference frequency at octave 4.
    #[inline]
    pub fn reference_hz(self) -> f64 {
        NOTE_TABLE[self as usize]
    }
}

/// Octave-4 frequencies in Hz, indexed by [`PitchClass`].
pub const NOTE_TABLE: [f64; 12] = [
    261.63, 277.18, 293.66, 311.13, 329.63, 349.23, 369.99, 392.00, 415.30, 440.00, 466.16, 493.88,
];

/// `reference_hz(pitch) · 2^(octave − 4)`.
pub fn frequency_hz(pitch: PitchClass, octave: u8) -> f64 {
    let power = i32::from(octave) - i32::from(REFERENCE_OCTAVE);
    pitch.reference_hz() * libm::pow(2.0, f64::from(power))
}

/// One entry of a tone sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Note {
    pub pitch: PitchClass,
    pub octave: u8,
    pub duration_ms: u32,
}

impl Note {
    pub const fn new(pitch: PitchClass, octave: u8, duration_ms: u32) -> Self {
        Self {
            pitch,
            octave,
            duration_ms,
        }
    }

    /// Target frequency of this note.
    pub fn frequency_hz(&self) -> f64 {
        frequency_hz(self.pitch, self.octave)
    }
}
