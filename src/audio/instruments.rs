/// The three voices: drum players, a sawtooth bass and a sampled lead
use super::effects::{db_to_gain, LowPassFilter, PingPongDelay, Reverb};
use super::sample::{Sample, SampleVoice};
use crate::pitch::Pitch;
use crate::sequencer::patterns::DrumKey;
use std::collections::HashMap;

/// One-shot sample players keyed by drum name. A new hit restarts that
/// drum's player.
#[derive(Debug, Default)]
pub struct DrumPlayers {
    players: HashMap<DrumKey, SampleVoice>,
    sample_rate: f32,
}

impl DrumPlayers {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            players: HashMap::new(),
            sample_rate,
        }
    }

    pub fn insert(&mut self, key: DrumKey, sample: Sample) {
        self.players
            .insert(key, SampleVoice::new(sample, self.sample_rate));
    }

    pub fn has(&self, key: DrumKey) -> bool {
        self.players.contains_key(&key)
    }

    pub fn trigger(&mut self, key: DrumKey) {
        match self.players.get_mut(&key) {
            Some(player) => player.trigger(1.0, None, 0, self.sample_rate),
            None => log::debug!("no sample loaded for {}", key),
        }
    }

    pub fn silence(&mut self) {
        self.players.values_mut().for_each(SampleVoice::silence);
    }

    pub fn next_frame(&mut self) -> f32 {
        self.players.values_mut().map(SampleVoice::next_frame).sum()
    }
}

const BASS_ATTACK_SECONDS: f32 = 0.005;
const BASS_DECAY_SECONDS: f32 = 0.1;
const BASS_SUSTAIN_LEVEL: f32 = 0.3;
const BASS_RELEASE_SECONDS: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Attack,
    Decay,
    Sustain,
    Release,
}

/// Monophonic sawtooth through a low-pass filter, shaped by an ADSR
/// envelope.
#[derive(Debug, Clone)]
pub struct BassSynth {
    sample_rate: f32,
    phase: f32,
    frequency: f32,
    gain: f32,
    level: f32,
    stage: Stage,
    release_step: f32,
    gate_frames: u64,
    elapsed: u64,
    filter: LowPassFilter,
}

impl BassSynth {
    pub fn new(sample_rate: f32, volume_db: f32, cutoff: f32) -> Self {
        Self {
            sample_rate,
            phase: 0.0,
            frequency: 0.0,
            gain: db_to_gain(volume_db),
            level: 0.0,
            stage: Stage::Release,
            release_step: 0.0,
            gate_frames: 0,
            elapsed: 0,
            filter: LowPassFilter::new(cutoff, 1.0, sample_rate),
        }
    }

    /// Attack now, release after `seconds`.
    pub fn trigger(&mut self, pitch: Pitch, seconds: f32) {
        self.frequency = pitch.frequency();
        self.gate_frames = (seconds.max(0.0) * self.sample_rate) as u64;
        self.elapsed = 0;
        self.stage = Stage::Attack;
    }

    pub fn silence(&mut self) {
        self.gate_frames = 0;
        self.elapsed = u64::MAX / 2;
        self.level = 0.0;
        self.stage = Stage::Release;
    }

    pub fn is_sounding(&self) -> bool {
        self.elapsed < self.gate_frames || self.level > 0.0
    }

    fn frames(&self, seconds: f32) -> f32 {
        (seconds * self.sample_rate).max(1.0)
    }

    fn envelope(&mut self) -> f32 {
        if self.stage != Stage::Release && self.elapsed >= self.gate_frames {
            self.stage = Stage::Release;
            self.release_step = self.level / self.frames(BASS_RELEASE_SECONDS);
        }
        match self.stage {
            Stage::Attack => {
                self.level += 1.0 / self.frames(BASS_ATTACK_SECONDS);
                if self.level >= 1.0 {
                    self.level = 1.0;
                    self.stage = Stage::Decay;
                }
            }
            Stage::Decay => {
                self.level -= (1.0 - BASS_SUSTAIN_LEVEL) / self.frames(BASS_DECAY_SECONDS);
                if self.level <= BASS_SUSTAIN_LEVEL {
                    self.level = BASS_SUSTAIN_LEVEL;
                    self.stage = Stage::Sustain;
                }
            }
            Stage::Sustain => {}
            Stage::Release => self.level = (self.level - self.release_step).max(0.0),
        }
        self.elapsed = self.elapsed.saturating_add(1);
        self.level
    }

    pub fn next_frame(&mut self) -> f32 {
        let level = self.envelope();
        let raw = if level > 0.0 {
            let saw = 2.0 * self.phase - 1.0;
            self.phase += self.frequency / self.sample_rate;
            self.phase -= self.phase.floor();
            saw * level * self.gain
        } else {
            0.0
        };
        self.filter.process(raw)
    }
}

const LEAD_RELEASE_SECONDS: f32 = 1.0;
const LEAD_MAX_VOICES: usize = 16;

/// A sampler built from one recording at `root`, repitched by playback
/// rate and sent through a ping-pong delay and a reverb.
#[derive(Debug)]
pub struct LeadSampler {
    sample: Option<Sample>,
    root: Pitch,
    voices: Vec<SampleVoice>,
    gain: f32,
    sample_rate: f32,
    delay: PingPongDelay,
    reverb: Reverb,
}

impl LeadSampler {
    pub fn new(
        sample_rate: f32,
        root: Pitch,
        volume_db: f32,
        delay: PingPongDelay,
        reverb: Reverb,
    ) -> Self {
        Self {
            sample: None,
            root,
            voices: Vec::new(),
            gain: db_to_gain(volume_db),
            sample_rate,
            delay,
            reverb,
        }
    }

    pub fn set_sample(&mut self, sample: Sample) {
        self.sample = Some(sample);
        self.voices.clear();
    }

    pub fn has_sample(&self) -> bool {
        self.sample.is_some()
    }

    pub fn active_voices(&self) -> usize {
        self.voices.iter().filter(|v| v.is_active()).count()
    }

    pub fn trigger(&mut self, pitch: Pitch, seconds: f32) {
        let Some(sample) = &self.sample else {
            log::debug!("lead has no sample; dropping {}", pitch);
            return;
        };
        self.voices.retain(SampleVoice::is_active);
        if self.voices.len() >= LEAD_MAX_VOICES {
            self.voices.remove(0);
        }
        let mut voice = SampleVoice::new(sample.clone(), self.sample_rate);
        voice.trigger(
            pitch.ratio_from(self.root),
            Some((seconds.max(0.0) * self.sample_rate) as u64),
            (LEAD_RELEASE_SECONDS * self.sample_rate) as u64,
            self.sample_rate,
        );
        self.voices.push(voice);
    }

    pub fn silence(&mut self) {
        self.voices.clear();
    }

    pub fn next_frame(&mut self) -> (f32, f32) {
        let dry = self.voices.iter_mut().map(SampleVoice::next_frame).sum::<f32>() * self.gain;
        let (delay_left, delay_right) = self.delay.process(dry);
        let reverb = self.reverb.process(dry);
        (delay_left + reverb, delay_right + reverb)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;

    const SAMPLE_RATE: f32 = 1000.0;

    fn lead() -> LeadSampler {
        LeadSampler::new(
            SAMPLE_RATE,
            Pitch::parse("C2").unwrap(),
            0.0,
            PingPongDelay::new(0.25, 0.3, SAMPLE_RATE),
            Reverb::new(3.0, 0.5, SAMPLE_RATE),
        )
    }

    #[test]
    fn test_drum_hit_restarts() {
        let mut drums = DrumPlayers::new(SAMPLE_RATE);
        drums.insert(DrumKey::Kick, Sample::from_frames(vec![1.0, 0.5], 1000));
        assert!(drums.has(DrumKey::Kick));
        drums.trigger(DrumKey::Kick);
        assert_eq!(drums.next_frame(), 1.0);
        drums.trigger(DrumKey::Kick);
        assert_eq!(drums.next_frame(), 1.0);
        assert_eq!(drums.next_frame(), 0.5);
        assert_eq!(drums.next_frame(), 0.0);
    }

    #[test]
    fn test_drums_without_samples_are_silent() {
        let mut drums = DrumPlayers::new(SAMPLE_RATE);
        drums.trigger(DrumKey::Snare);
        assert_eq!(drums.next_frame(), 0.0);
    }

    #[test]
    fn test_bass_gate() {
        let mut bass = BassSynth::new(SAMPLE_RATE, -4.0, 2000.0);
        assert!(!bass.is_sounding());
        bass.trigger(Pitch::parse("E1").unwrap(), 0.1);
        let energy: f32 = (0..100).map(|_| bass.next_frame().abs()).sum();
        assert!(energy > 0.0);
        for _ in 0..200 {
            bass.next_frame();
        }
        assert!(bass.is_sounding(), "release tail lasts a second");
        for _ in 0..1000 {
            bass.next_frame();
        }
        assert!(!bass.is_sounding());
    }

    #[test]
    fn test_bass_settles_on_sustain() {
        let mut bass = BassSynth::new(SAMPLE_RATE, 0.0, 2000.0);
        bass.trigger(Pitch::parse("C#2").unwrap(), 1.0);
        for _ in 0..10 {
            bass.next_frame();
        }
        assert_eq!(bass.stage, Stage::Decay);
        assert!(bass.level > BASS_SUSTAIN_LEVEL);
        for _ in 0..200 {
            bass.next_frame();
        }
        assert_eq!(bass.stage, Stage::Sustain);
        assert!(approx_eq!(f32, bass.level, BASS_SUSTAIN_LEVEL, ulps = 2));
    }

    #[test]
    fn test_lead_needs_sample() {
        let mut lead = lead();
        lead.trigger(Pitch::parse("C2").unwrap(), 0.5);
        assert_eq!(lead.active_voices(), 0);
        assert_eq!(lead.next_frame(), (0.0, 0.0));
    }

    #[test]
    fn test_lead_is_polyphonic() {
        let mut lead = lead();
        lead.set_sample(Sample::from_frames(vec![0.5; 2000], 1000));
        lead.trigger(Pitch::parse("C2").unwrap(), 0.5);
        lead.trigger(Pitch::parse("G2").unwrap(), 0.5);
        assert_eq!(lead.active_voices(), 2);
        let (left, right) = lead.next_frame();
        assert!(left > 0.0);
        assert_eq!(left, right);
        lead.silence();
        assert_eq!(lead.active_voices(), 0);
    }
}
