//! Direct Digital Synthesis tone generator.
//!
//! Architecture:
//! - `note`: pitch class + octave → frequency (equal-tempered table)
//! - `nco`: phase accumulator → sine sample
//! - `sequencer`: drives the NCO into a `SampleSink` for a wall-clock duration
//! - `sfx`: fixed note sequences

pub mod nco;
pub mod note;
pub mod sequencer;
pub mod sfx;

pub use nco::{phase_increment, Amplitude, Nco, ToneError};
pub use note::{frequency_hz, Note, PitchClass, NOTE_TABLE};
pub use sequencer::{
    CancelToken, NoteReport, PlayState, SequenceReport, ToneSequencer, ToneTask, WritePolicy,
};
