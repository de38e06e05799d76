/// Error type shared by every part of the crate
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid position {0:?}: expected bars:beats:sixteenths")]
    InvalidPosition(String),

    #[error("invalid note value {0:?}")]
    InvalidNoteValue(String),

    #[error("invalid pitch {0:?}")]
    InvalidPitch(String),

    #[error("unknown drum {0:?}")]
    UnknownDrum(String),

    #[error("loop end {end} must come after loop start {start}")]
    InvalidLoop { start: u32, end: u32 },

    #[error("cell ({column}, {row}) is outside a {columns}x{rows} grid")]
    CellOutOfRange {
        column: usize,
        row: usize,
        columns: usize,
        rows: usize,
    },

    #[error("couldn't read config {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("couldn't parse config {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("couldn't load sample {path}: {reason}")]
    Sample { path: PathBuf, reason: String },

    #[error("audio output: {0}")]
    Audio(String),

    #[error("MIDI output: {0}")]
    Midi(String),
}

pub type Result<T> = std::result::Result<T, Error>;
