/// TONEGRID - a three-voice groove box
///
/// This library provides the pieces behind the app:
/// - Musical time and pitch parsing
/// - Looping parts, the built-in drum/bass/lead patterns and the step grid
/// - A transport and playback engine that fires triggers every sixteenth
/// - Audio output for the voices and MIDI output for external gear

pub mod audio;
pub mod config;
pub mod error;
pub mod midi;
pub mod pitch;
pub mod sequencer;
pub mod time;

// Re-export commonly used types
pub use audio::{AudioOutput, Rack};
pub use config::Config;
pub use error::{Error, Result};
pub use midi::{midi_note_name, MidiOutputDevice};
pub use pitch::Pitch;
pub use sequencer::part::Part;
pub use sequencer::patterns::{Arrangement, DrumKey};
pub use sequencer::playback::{PlaybackEngine, PlaybackEvent, Performs, Transport, Trigger};
pub use sequencer::{CellChange, Grid, Sequencer};
pub use time::{NoteValue, Position, Tempo};
