/// MIDI output using midir
use crate::error::{Error, Result};
use crate::pitch::Pitch;
use crate::sequencer::playback::Trigger;
use midir::{MidiOutput, MidiOutputConnection};
use std::time::{Duration, Instant};

const CLIENT_NAME: &str = "tonegrid MIDI Output";

pub const BASS_CHANNEL: u8 = 0;
pub const LEAD_CHANNEL: u8 = 1;
pub const DRUM_CHANNEL: u8 = 9;

/// How long a drum note is held before its note-off.
const DRUM_GATE: Duration = Duration::from_millis(50);

const NOTE_ON: u8 = 0x90;
const NOTE_OFF: u8 = 0x80;

/// A note that has been sent and still needs its note-off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeldNote {
    pub channel: u8,
    pub note: u8,
    pub until: Instant,
}

/// Channel, note and gate length a trigger maps to.
pub fn trigger_message(trigger: &Trigger) -> (u8, u8, Duration) {
    match *trigger {
        Trigger::Drum(key) => (DRUM_CHANNEL, key.gm_note(), DRUM_GATE),
        Trigger::Bass { pitch, seconds } => {
            (BASS_CHANNEL, pitch.midi(), Duration::from_secs_f32(seconds))
        }
        Trigger::Lead { pitch, seconds } => {
            (LEAD_CHANNEL, pitch.midi(), Duration::from_secs_f32(seconds))
        }
    }
}

pub struct MidiOutputDevice {
    connection: Option<MidiOutputConnection>,
    held: Vec<HeldNote>,
}

impl MidiOutputDevice {
    pub fn new() -> Self {
        Self {
            connection: None,
            held: Vec::new(),
        }
    }

    pub fn available_ports() -> Vec<String> {
        match MidiOutput::new(CLIENT_NAME) {
            Ok(midi_out) => midi_out
                .ports()
                .iter()
                .filter_map(|p| midi_out.port_name(p).ok())
                .collect(),
            Err(e) => {
                log::warn!("MIDI unavailable: {}", e);
                vec![]
            }
        }
    }

    pub fn connect(&mut self, port_index: usize) -> Result<()> {
        let midi_out = MidiOutput::new(CLIENT_NAME)
            .map_err(|e| Error::Midi(format!("failed to create output: {}", e)))?;

        let ports = midi_out.ports();
        let port = ports
            .get(port_index)
            .ok_or_else(|| Error::Midi(format!("no port {}", port_index)))?;
        let name = midi_out.port_name(port).unwrap_or_default();

        let connection = midi_out
            .connect(port, "tonegrid")
            .map_err(|e| Error::Midi(format!("failed to connect: {}", e)))?;

        self.release_all();
        self.connection = Some(connection);
        log::info!("MIDI connected to {}", name);
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub fn send_note_on(&mut self, channel: u8, note: u8, velocity: u8) -> Result<()> {
        if let Some(ref mut conn) = self.connection {
            conn.send(&[NOTE_ON | (channel & 0x0f), note & 0x7f, velocity & 0x7f])
                .map_err(|e| Error::Midi(format!("failed to send note on: {}", e)))?;
        }
        Ok(())
    }

    pub fn send_note_off(&mut self, channel: u8, note: u8) -> Result<()> {
        if let Some(ref mut conn) = self.connection {
            conn.send(&[NOTE_OFF | (channel & 0x0f), note & 0x7f, 0])
                .map_err(|e| Error::Midi(format!("failed to send note off: {}", e)))?;
        }
        Ok(())
    }

    /// Sends the note-on for a trigger and remembers when to end it.
    pub fn play(&mut self, trigger: &Trigger, now: Instant) -> Result<()> {
        if !self.is_connected() {
            return Ok(());
        }
        let (channel, note, gate) = trigger_message(trigger);
        if let Some(index) = self
            .held
            .iter()
            .position(|h| h.channel == channel && h.note == note)
        {
            self.held.remove(index);
            self.send_note_off(channel, note)?;
        }
        self.send_note_on(channel, note, 100)?;
        self.held.push(HeldNote {
            channel,
            note,
            until: now + gate,
        });
        Ok(())
    }

    /// Sends note-offs for everything whose gate has elapsed.
    pub fn release_due(&mut self, now: Instant) -> Result<()> {
        let (due, held): (Vec<HeldNote>, Vec<HeldNote>) =
            self.held.drain(..).partition(|h| h.until <= now);
        self.held = held;
        for h in due {
            self.send_note_off(h.channel, h.note)?;
        }
        Ok(())
    }

    pub fn release_all(&mut self) {
        for h in std::mem::take(&mut self.held) {
            if let Err(e) = self.send_note_off(h.channel, h.note) {
                log::warn!("{}", e);
            }
        }
    }

    pub fn held_notes(&self) -> &[HeldNote] {
        &self.held
    }
}

impl Default for MidiOutputDevice {
    fn default() -> Self {
        Self::new()
    }
}

pub fn midi_note_name(note: u8) -> String {
    Pitch::from_midi(note)
        .map(|p| p.to_string())
        .unwrap_or_else(|_| format!("#{}", note))
}
