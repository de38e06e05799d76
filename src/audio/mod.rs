/// Audio output using cpal
use crate::config::Config;
use crate::error::{Error, Result};
use crate::sequencer::patterns::DrumKey;
use crate::sequencer::playback::{PlaybackEvent, Performs, SharedPerformer, Trigger};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample as _, SizedSample};
use std::sync::{Arc, Mutex};

pub mod effects;
pub mod instruments;
pub mod sample;

use effects::{PingPongDelay, Reverb};
use instruments::{BassSynth, DrumPlayers, LeadSampler};
use sample::Sample;

const FALLBACK_SAMPLE_RATE: f32 = 44100.0;

/// All three voices, mixed to stereo.
#[derive(Debug)]
pub struct Rack {
    drums: DrumPlayers,
    bass: BassSynth,
    lead: LeadSampler,
    sample_rate: f32,
}

impl Rack {
    /// Builds the voices without loading any samples. The delay time is
    /// fixed at the configured starting tempo.
    pub fn new(sample_rate: f32, config: &Config) -> Result<Self> {
        let delay_seconds = config.lead_delay()?.seconds(config.bpm);
        Ok(Self {
            drums: DrumPlayers::new(sample_rate),
            bass: BassSynth::new(sample_rate, config.bass.volume_db, config.bass.cutoff),
            lead: LeadSampler::new(
                sample_rate,
                config.lead_root()?,
                config.lead.volume_db,
                PingPongDelay::new(delay_seconds, config.lead.feedback, sample_rate),
                Reverb::new(config.lead.reverb_decay, config.lead.reverb_wet, sample_rate),
            ),
            sample_rate,
        })
    }

    /// Loads every configured sample. A file that can't be read leaves its
    /// voice silent.
    pub fn load_samples(&mut self, config: &Config) {
        let mut missing = 0;
        for key in DrumKey::all() {
            let Some(path) = config.drum_sample(key) else {
                continue;
            };
            match Sample::load(&path) {
                Ok(sample) => self.drums.insert(key, sample),
                Err(e) => {
                    log::warn!("{}: {}", key, e);
                    missing += 1;
                }
            }
        }
        if missing > 0 {
            log::warn!(
                "{} drum samples missing; the kit is available from {}",
                missing,
                crate::config::DRUM_KIT_SOURCE
            );
        }

        match Sample::load(&config.lead_sample()) {
            Ok(sample) => self.lead.set_sample(sample),
            Err(e) => log::warn!("lead: {}", e),
        }
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn silence(&mut self) {
        self.drums.silence();
        self.bass.silence();
        self.lead.silence();
    }

    pub fn next_frame(&mut self) -> (f32, f32) {
        let drums = self.drums.next_frame();
        let bass = self.bass.next_frame();
        let (lead_left, lead_right) = self.lead.next_frame();
        let left = (drums + bass + lead_left).clamp(-1.0, 1.0);
        let right = (drums + bass + lead_right).clamp(-1.0, 1.0);
        (left, right)
    }

    /// Fills an interleaved buffer. Mono devices get the average of both
    /// sides; channels past the second stay silent.
    pub fn render<T>(&mut self, data: &mut [T], channels: usize)
    where
        T: SizedSample + FromSample<f32>,
    {
        for frame in data.chunks_mut(channels.max(1)) {
            let (left, right) = self.next_frame();
            for (channel, sample) in frame.iter_mut().enumerate() {
                let value = match (channels, channel) {
                    (1, _) => (left + right) * 0.5,
                    (_, 0) => left,
                    (_, 1) => right,
                    _ => 0.0,
                };
                *sample = T::from_sample(value);
            }
        }
    }
}

impl Performs for Rack {
    fn perform(&mut self, event: &PlaybackEvent) {
        match event {
            PlaybackEvent::Trigger(Trigger::Drum(key)) => self.drums.trigger(*key),
            PlaybackEvent::Trigger(Trigger::Bass { pitch, seconds }) => {
                self.bass.trigger(*pitch, *seconds)
            }
            PlaybackEvent::Trigger(Trigger::Lead { pitch, seconds }) => {
                self.lead.trigger(*pitch, *seconds)
            }
            PlaybackEvent::Stopped => self.silence(),
            PlaybackEvent::StepAdvanced(_) => {}
        }
    }
}

pub struct AudioOutput {
    stream: Option<cpal::Stream>,
    rack: Arc<Mutex<Rack>>,
}

impl AudioOutput {
    /// Opens the default output device and starts rendering the rack.
    pub fn new(config: &Config) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device".to_string()))?;
        let supported = device
            .default_output_config()
            .map_err(|e| Error::Audio(e.to_string()))?;
        log::info!(
            "audio output {} at {} Hz, {} channels",
            device.name().unwrap_or_else(|_| "(unnamed)".to_string()),
            supported.sample_rate().0,
            supported.channels()
        );

        let sample_rate = supported.sample_rate().0 as f32;
        let mut rack = Rack::new(sample_rate, config)?;
        rack.load_samples(config);
        let rack = Arc::new(Mutex::new(rack));

        let stream_config: cpal::StreamConfig = supported.config();
        let stream = match supported.sample_format() {
            cpal::SampleFormat::F32 => {
                Self::build_stream::<f32>(&device, &stream_config, Arc::clone(&rack))
            }
            cpal::SampleFormat::I16 => {
                Self::build_stream::<i16>(&device, &stream_config, Arc::clone(&rack))
            }
            cpal::SampleFormat::U16 => {
                Self::build_stream::<u16>(&device, &stream_config, Arc::clone(&rack))
            }
            format => Err(Error::Audio(format!("unsupported sample format {format:?}"))),
        }?;
        stream.play().map_err(|e| Error::Audio(e.to_string()))?;

        Ok(Self {
            stream: Some(stream),
            rack,
        })
    }

    /// A rack that is never heard, for when no device is available.
    pub fn silent(config: &Config) -> Result<Self> {
        Ok(Self {
            stream: None,
            rack: Arc::new(Mutex::new(Rack::new(FALLBACK_SAMPLE_RATE, config)?)),
        })
    }

    fn build_stream<T>(
        device: &cpal::Device,
        config: &cpal::StreamConfig,
        rack: Arc<Mutex<Rack>>,
    ) -> Result<cpal::Stream>
    where
        T: SizedSample + FromSample<f32>,
    {
        let channels = config.channels as usize;
        device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| match rack.lock() {
                    Ok(mut rack) => rack.render(data, channels),
                    Err(_) => data.fill(T::EQUILIBRIUM),
                },
                |err| log::error!("audio stream error: {}", err),
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))
    }

    pub fn is_audible(&self) -> bool {
        self.stream.is_some()
    }

    pub fn rack(&self) -> &Arc<Mutex<Rack>> {
        &self.rack
    }

    /// The rack as a playback callback.
    pub fn performer(&self) -> SharedPerformer {
        self.rack.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pitch::Pitch;

    fn rack() -> Rack {
        Rack::new(1000.0, &Config::default()).unwrap()
    }

    #[test]
    fn test_triggers_reach_voices() {
        let mut rack = rack();
        rack.drums.insert(DrumKey::Kick, Sample::from_frames(vec![0.5; 10], 1000));
        rack.perform(&PlaybackEvent::Trigger(Trigger::Drum(DrumKey::Kick)));
        assert_eq!(rack.next_frame(), (0.5, 0.5));
    }

    #[test]
    fn test_stop_silences() {
        let mut rack = rack();
        rack.perform(&PlaybackEvent::Trigger(Trigger::Bass {
            pitch: Pitch::parse("C#2").unwrap(),
            seconds: 0.1,
        }));
        rack.next_frame();
        rack.perform(&PlaybackEvent::Stopped);
        for _ in 0..10 {
            rack.next_frame();
        }
        assert!(!rack.bass.is_sounding());
    }

    #[test]
    fn test_render_interleaves() {
        let mut rack = rack();
        rack.drums.insert(DrumKey::Snare, Sample::from_frames(vec![1.0; 4], 1000));
        rack.perform(&PlaybackEvent::Trigger(Trigger::Drum(DrumKey::Snare)));
        let mut data = [0.0_f32; 6];
        rack.render(&mut data[..], 3);
        assert_eq!(data, [1.0, 1.0, 0.0, 1.0, 1.0, 0.0]);

        let mut mono = [0_i16; 2];
        rack.render(&mut mono[..], 1);
        assert!(mono.iter().all(|s| *s > i16::MAX / 2));
    }
}
