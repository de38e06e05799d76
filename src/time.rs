/// Musical time in 4/4: positions, note values and tempo
///
/// The smallest unit is the sixteenth note, called a tick throughout the
/// crate. A bar is four beats and a beat is four ticks.
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const TICKS_PER_BEAT: u32 = 4;
pub const BEATS_PER_BAR: u32 = 4;
pub const TICKS_PER_BAR: u32 = TICKS_PER_BEAT * BEATS_PER_BAR;

/// A `bars:beats:sixteenths` position measured from the start of a part.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position {
    bars: u32,
    beats: u32,
    sixteenths: u32,
}

impl Position {
    pub const ZERO: Self = Self {
        bars: 0,
        beats: 0,
        sixteenths: 0,
    };

    /// Saturates at the last representable tick.
    pub fn new(bars: u32, beats: u32, sixteenths: u32) -> Self {
        Self::from_ticks(
            bars.saturating_mul(TICKS_PER_BAR)
                .saturating_add(beats.saturating_mul(TICKS_PER_BEAT))
                .saturating_add(sixteenths),
        )
    }

    pub fn from_ticks(ticks: u32) -> Self {
        Self {
            bars: ticks / TICKS_PER_BAR,
            beats: (ticks % TICKS_PER_BAR) / TICKS_PER_BEAT,
            sixteenths: ticks % TICKS_PER_BEAT,
        }
    }

    /// Strict three-field parse. Fields may exceed their natural range
    /// ("0:5:0" is one bar and one beat) and are normalized.
    pub fn parse(s: &str) -> Result<Self> {
        let fields: Vec<&str> = s.trim().split(':').collect();
        if fields.len() != 3 {
            return Err(Error::InvalidPosition(s.to_string()));
        }
        let mut values = [0u32; 3];
        for (value, field) in values.iter_mut().zip(&fields) {
            *value = field
                .parse()
                .map_err(|_| Error::InvalidPosition(s.to_string()))?;
        }
        let [bars, beats, sixteenths] = values;
        bars.checked_mul(TICKS_PER_BAR)
            .zip(beats.checked_mul(TICKS_PER_BEAT))
            .and_then(|(bars, beats)| bars.checked_add(beats))
            .and_then(|ticks| ticks.checked_add(sixteenths))
            .map(Self::from_ticks)
            .ok_or_else(|| Error::InvalidPosition(s.to_string()))
    }

    pub fn bars(&self) -> u32 {
        self.bars
    }

    pub fn beats(&self) -> u32 {
        self.beats
    }

    pub fn sixteenths(&self) -> u32 {
        self.sixteenths
    }

    pub fn ticks(&self) -> u32 {
        self.bars * TICKS_PER_BAR + self.beats * TICKS_PER_BEAT + self.sixteenths
    }
}

impl FromStr for Position {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.bars, self.beats, self.sixteenths)
    }
}

/// A duration written the usual way: "2m" for two bars, "8n" for an
/// eighth note.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteValue {
    ticks: u32,
}

impl NoteValue {
    pub fn from_ticks(ticks: u32) -> Self {
        Self { ticks }
    }

    pub fn parse(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidNoteValue(s.to_string());
        let s = s.trim();
        let unit = s.chars().last().ok_or_else(invalid)?;
        let count: u32 = s[..s.len() - unit.len_utf8()]
            .parse()
            .map_err(|_| invalid())?;
        if count == 0 {
            return Err(invalid());
        }
        let ticks = match unit {
            'm' => count.checked_mul(TICKS_PER_BAR).ok_or_else(invalid)?,
            'n' if TICKS_PER_BAR % count == 0 => TICKS_PER_BAR / count,
            _ => return Err(invalid()),
        };
        Ok(Self { ticks })
    }

    pub fn ticks(&self) -> u32 {
        self.ticks
    }

    pub fn seconds(&self, tempo: Tempo) -> f32 {
        self.ticks as f32 * tempo.seconds_per_tick()
    }
}

impl FromStr for NoteValue {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Beats per minute, always within `MIN_VALUE..=MAX_VALUE`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(from = "f32", into = "f32")]
pub struct Tempo(f32);

impl Tempo {
    pub const MIN_VALUE: f32 = 40.0;
    pub const MAX_VALUE: f32 = 240.0;

    pub fn new(bpm: f32) -> Self {
        if bpm.is_nan() {
            return Self::default();
        }
        Self(bpm.clamp(Self::MIN_VALUE, Self::MAX_VALUE))
    }

    pub fn bpm(&self) -> f32 {
        self.0
    }

    /// Length of one sixteenth note.
    pub fn seconds_per_tick(&self) -> f32 {
        60.0 / self.0 / TICKS_PER_BEAT as f32
    }
}

impl Default for Tempo {
    fn default() -> Self {
        Self(120.0)
    }
}

impl From<f32> for Tempo {
    fn from(bpm: f32) -> Self {
        Self::new(bpm)
    }
}

impl From<Tempo> for f32 {
    fn from(tempo: Tempo) -> Self {
        tempo.0
    }
}

impl fmt::Display for Tempo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:0.1} BPM", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;

    #[test]
    fn test_position_parse() {
        let pos = Position::parse("1:2:3").unwrap();
        assert_eq!(pos.ticks(), 16 + 8 + 3);
        assert_eq!(pos.to_string(), "1:2:3");
    }

    #[test]
    fn test_position_overflow_normalizes() {
        let pos: Position = "0:5:0".parse().unwrap();
        assert_eq!(pos, Position::new(1, 1, 0));
        assert_eq!(Position::from_ticks(31).to_string(), "1:3:3");
    }

    #[test]
    fn test_position_rejects_bad_fields() {
        for bad in [
            "",
            "0:0",
            "0:0:0:0",
            "a:0:0",
            "0:-1:0",
            "0:0:1.5",
            "300000000:0:0",
            "0:4294967295:0",
            "268435455:3:4",
        ] {
            assert!(Position::parse(bad).is_err(), "{bad:?} should not parse");
        }
    }

    #[test]
    fn test_note_values() {
        assert_eq!(NoteValue::parse("2m").unwrap().ticks(), 32);
        assert_eq!(NoteValue::parse("1n").unwrap().ticks(), 16);
        assert_eq!(NoteValue::parse("2n").unwrap().ticks(), 8);
        assert_eq!(NoteValue::parse("8n").unwrap().ticks(), 2);
        assert_eq!(NoteValue::parse("16n").unwrap().ticks(), 1);
        assert!(NoteValue::parse("32n").is_err());
        assert!(NoteValue::parse("3n").is_err());
        assert!(NoteValue::parse("0m").is_err());
        assert!(NoteValue::parse("m").is_err());
        assert!(matches!(
            NoteValue::parse("999999999m"),
            Err(Error::InvalidNoteValue(_))
        ));
    }

    #[test]
    fn test_tempo_clamps() {
        assert_eq!(Tempo::new(10.0).bpm(), Tempo::MIN_VALUE);
        assert_eq!(Tempo::new(1000.0).bpm(), Tempo::MAX_VALUE);
        assert_eq!(Tempo::new(f32::NAN), Tempo::default());
    }

    #[test]
    fn test_note_value_seconds() {
        let tempo = Tempo::new(120.0);
        assert!(approx_eq!(f32, tempo.seconds_per_tick(), 0.125, ulps = 2));
        assert!(approx_eq!(f32, NoteValue::parse("2n").unwrap().seconds(tempo), 1.0, ulps = 2));
    }
}
