//! Fixed sound effects.

use super::note::{Note, PitchClass::*};

/// Low fifth: C3 then G3.
pub const SFX1: [Note; 2] = [Note::new(C, 3, 125), Note::new(G, 3, 200)];

/// Rising arpeggio: C4, G4, C5.
pub const SFX2: [Note; 3] = [Note::new(C, 4, 125), Note::new(G, 4, 125), Note::new(C, 5, 200)];

/// Every effect, in order.
pub const ALL: [&[Note]; 2] = [&SFX1, &SFX2];

/// Total nominal duration of `notes`.
pub fn duration_ms(notes: &[Note]) -> u32 {
    notes.iter().map(|n| n.duration_ms).sum()
}
