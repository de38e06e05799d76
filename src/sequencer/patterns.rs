/// The drum kit keys and the three built-in patterns
use super::part::Part;
use crate::error::{Error, Result};
use crate::pitch::Pitch;
use crate::time::{NoteValue, Position};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "camelCase")]
#[serde(rename_all = "camelCase")]
pub enum DrumKey {
    Kick,
    HatClosed,
    HatOpen,
    Snare,
    TomLow,
    TomMid,
    TomHigh,
    Ride,
    Crash,
}

impl DrumKey {
    pub fn parse(s: &str) -> Result<Self> {
        Self::from_str(s).map_err(|_| Error::UnknownDrum(s.to_string()))
    }

    pub fn all() -> impl Iterator<Item = DrumKey> {
        Self::iter()
    }

    /// General MIDI percussion note for this drum.
    pub fn gm_note(&self) -> u8 {
        match self {
            DrumKey::Kick => 36,
            DrumKey::Snare => 38,
            DrumKey::HatClosed => 42,
            DrumKey::TomLow => 45,
            DrumKey::HatOpen => 46,
            DrumKey::TomMid => 47,
            DrumKey::Crash => 49,
            DrumKey::TomHigh => 50,
            DrumKey::Ride => 51,
        }
    }
}

const DRUM_PATTERN: [(&str, &str); 12] = [
    ("0:0:0", "kick"),
    ("0:1:0", "hatClosed"),
    ("0:1:2", "kick"),
    ("0:2:0", "kick"),
    ("0:3:0", "hatClosed"),
    ("1:0:0", "kick"),
    ("1:1:0", "hatClosed"),
    ("1:2:0", "kick"),
    ("1:2:3", "kick"),
    ("1:3:0", "hatClosed"),
    ("1:3:2", "kick"),
    ("1:3:2", "hatOpen"),
];
const DRUM_LOOP: &str = "2m";

const BASS_PATTERN: [(&str, &str); 3] = [("0:0:0", "C#2"), ("0:0:3", "C#2"), ("0:1:2", "E1")];
const BASS_LOOP: &str = "2n";

const LEAD_LOOP: &str = "2m";

fn parse_part<T: PartialEq>(
    literal: &[(&str, &str)],
    loop_end: &str,
    parse_value: impl Fn(&str) -> Result<T>,
) -> Result<Part<T>> {
    let events = literal
        .iter()
        .map(|&(time, value)| -> Result<(Position, T)> {
            Ok((Position::parse(time)?, parse_value(value)?))
        })
        .collect::<Result<Vec<_>>>()?;
    Part::from_events(events).with_loop(0, NoteValue::parse(loop_end)?.ticks())
}

pub fn drum_pattern() -> Result<Part<DrumKey>> {
    parse_part(&DRUM_PATTERN, DRUM_LOOP, DrumKey::parse)
}

pub fn bass_pattern() -> Result<Part<Pitch>> {
    parse_part(&BASS_PATTERN, BASS_LOOP, Pitch::parse)
}

pub fn lead_pattern() -> Result<Part<Pitch>> {
    parse_part(&[], LEAD_LOOP, Pitch::parse)
}

/// The three parts that share one transport.
#[derive(Debug, Clone, PartialEq)]
pub struct Arrangement {
    pub drums: Part<DrumKey>,
    pub bass: Part<Pitch>,
    pub lead: Part<Pitch>,
}

impl Arrangement {
    pub fn new() -> Result<Self> {
        Ok(Self {
            drums: drum_pattern()?,
            bass: bass_pattern()?,
            lead: lead_pattern()?,
        })
    }
}
