/// Pitches in scientific notation ("C#2", "Bb1") backed by MIDI note numbers
use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pitch(u8);

impl Pitch {
    pub fn from_midi(note: u8) -> Result<Self> {
        if note > 127 {
            return Err(Error::InvalidPitch(note.to_string()));
        }
        Ok(Self(note))
    }

    /// Accepts a letter, any number of `#` or `b`, then a (possibly
    /// negative) octave. C4 is MIDI 60.
    pub fn parse(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidPitch(s.to_string());
        let mut chars = s.trim().chars().peekable();

        let letter = chars.next().ok_or_else(invalid)?;
        let mut semitone: i32 = match letter.to_ascii_uppercase() {
            'C' => 0,
            'D' => 2,
            'E' => 4,
            'F' => 5,
            'G' => 7,
            'A' => 9,
            'B' => 11,
            _ => return Err(invalid()),
        };
        while let Some(&c) = chars.peek() {
            match c {
                '#' => semitone += 1,
                'b' => semitone -= 1,
                _ => break,
            }
            chars.next();
        }

        let octave: i32 = chars.collect::<String>().parse().map_err(|_| invalid())?;
        octave
            .checked_add(1)
            .and_then(|o| o.checked_mul(12))
            .and_then(|m| m.checked_add(semitone))
            .and_then(|midi| u8::try_from(midi).ok())
            .filter(|n| *n <= 127)
            .map(Self)
            .ok_or_else(invalid)
    }

    pub fn midi(&self) -> u8 {
        self.0
    }

    pub fn frequency(&self) -> f32 {
        440.0 * 2.0_f32.powf((self.0 as f32 - 69.0) / 12.0)
    }

    /// Playback-rate ratio that shifts a sample recorded at `root` to this
    /// pitch.
    pub fn ratio_from(&self, root: Pitch) -> f32 {
        2.0_f32.powf((self.0 as f32 - root.0 as f32) / 12.0)
    }
}

impl FromStr for Pitch {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Pitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let octave = (self.0 / 12) as i32 - 1;
        write!(f, "{}{}", NOTE_NAMES[(self.0 % 12) as usize], octave)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;

    #[test]
    fn test_parse_names() {
        assert_eq!(Pitch::parse("C4").unwrap().midi(), 60);
        assert_eq!(Pitch::parse("A4").unwrap().midi(), 69);
        assert_eq!(Pitch::parse("C#2").unwrap().midi(), 37);
        assert_eq!(Pitch::parse("Db2").unwrap().midi(), 37);
        assert_eq!(Pitch::parse("E1").unwrap().midi(), 28);
        assert_eq!(Pitch::parse("C-1").unwrap().midi(), 0);
        assert_eq!(Pitch::parse("G9").unwrap().midi(), 127);
    }

    #[test]
    fn test_parse_rejects() {
        for bad in ["", "H2", "C", "C#", "G#9", "Cb-1", "C 4"] {
            assert!(Pitch::parse(bad).is_err(), "{bad:?} should not parse");
        }
    }

    #[test]
    fn test_huge_octave_is_rejected() {
        for bad in ["C999999999", "C-999999999", "B2147483647"] {
            assert!(matches!(Pitch::parse(bad), Err(Error::InvalidPitch(_))));
        }
    }

    #[test]
    fn test_display_uses_sharps() {
        assert_eq!(Pitch::parse("Ab3").unwrap().to_string(), "G#3");
        assert_eq!(Pitch::from_midi(60).unwrap().to_string(), "C4");
    }

    #[test]
    fn test_frequency_and_ratio() {
        let a4 = Pitch::parse("A4").unwrap();
        assert!(approx_eq!(f32, a4.frequency(), 440.0, ulps = 2));
        let c2 = Pitch::parse("C2").unwrap();
        let c3 = Pitch::parse("C3").unwrap();
        assert!(approx_eq!(f32, c3.ratio_from(c2), 2.0, ulps = 2));
        assert!(approx_eq!(f32, c2.ratio_from(c2), 1.0, ulps = 2));
    }
}
