/// Decoded audio samples and a resampling one-shot player
use crate::error::{Error, Result};
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use symphonia::core::{
    audio::SampleBuffer,
    codecs::DecoderOptions,
    errors::Error as SymphoniaError,
    formats::FormatOptions,
    io::{MediaSourceStream, MediaSourceStreamOptions},
    meta::MetadataOptions,
    probe::Hint,
};

/// A mono clip in memory.
#[derive(Debug, Clone)]
pub struct Sample {
    frames: Arc<[f32]>,
    sample_rate: u32,
}

impl Sample {
    pub fn from_frames(frames: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            frames: frames.into(),
            sample_rate,
        }
    }

    /// Decodes any wav or mp3 file, mixing all channels down to mono.
    pub fn load(path: &Path) -> Result<Self> {
        log::info!("loading sample {}", path.display());
        let fail = |reason: String| Error::Sample {
            path: path.to_path_buf(),
            reason,
        };

        let file = File::open(path).map_err(|e| fail(e.to_string()))?;
        let mut hint = Hint::new();
        if let Some(extension) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(extension);
        }

        let mut format = symphonia::default::get_probe()
            .format(
                &hint,
                MediaSourceStream::new(Box::new(file), MediaSourceStreamOptions::default()),
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| fail(e.to_string()))?
            .format;

        let track = format
            .default_track()
            .ok_or_else(|| fail("no audio track".to_string()))?;
        let track_id = track.id;
        let sample_rate = track
            .codec_params
            .sample_rate
            .ok_or_else(|| fail("unknown sample rate".to_string()))?;

        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| fail(e.to_string()))?;

        let mut frames = Vec::new();
        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break
                }
                Err(e) => return Err(fail(e.to_string())),
            };
            if packet.track_id() != track_id {
                continue;
            }

            let audio_buf = match decoder.decode(&packet) {
                Ok(audio_buf) => audio_buf,
                Err(SymphoniaError::DecodeError(reason)) => {
                    log::warn!("skipping bad packet in {}: {}", path.display(), reason);
                    continue;
                }
                Err(e) => return Err(fail(e.to_string())),
            };

            let spec = *audio_buf.spec();
            let channels = spec.channels.count().max(1);
            let capacity = audio_buf.capacity() as u64;
            let mut buf = SampleBuffer::<f32>::new(capacity, spec);
            buf.copy_interleaved_ref(audio_buf);
            frames.extend(
                buf.samples()
                    .chunks(channels)
                    .map(|frame| frame.iter().sum::<f32>() / channels as f32),
            );
        }

        log::info!(
            "loaded sample {} ({} frames at {} Hz)",
            path.display(),
            frames.len(),
            sample_rate
        );
        Ok(Self::from_frames(frames, sample_rate))
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Linear interpolation between neighbouring frames.
    pub fn frame_at(&self, position: f64) -> f32 {
        let index = position.floor() as usize;
        let frac = (position - position.floor()) as f32;
        let a = self.frames.get(index).copied().unwrap_or(0.0);
        let b = self.frames.get(index + 1).copied().unwrap_or(0.0);
        a + (b - a) * frac
    }
}

/// Plays a sample once at a given rate, with an optional release fade.
#[derive(Debug, Clone)]
pub struct SampleVoice {
    sample: Sample,
    position: f64,
    increment: f64,
    gain: f32,
    hold_frames: Option<u64>,
    release_frames: u64,
    elapsed: u64,
    active: bool,
}

impl SampleVoice {
    pub fn new(sample: Sample, output_rate: f32) -> Self {
        Self {
            increment: sample.sample_rate() as f64 / output_rate as f64,
            sample,
            position: 0.0,
            gain: 1.0,
            hold_frames: None,
            release_frames: 0,
            elapsed: 0,
            active: false,
        }
    }

    /// Starts from the top. `rate` scales playback speed (and so pitch);
    /// `hold` bounds how long it plays before fading out over `release`.
    pub fn trigger(&mut self, rate: f32, hold: Option<u64>, release: u64, output_rate: f32) {
        self.increment = self.sample.sample_rate() as f64 / output_rate as f64 * rate as f64;
        self.position = 0.0;
        self.hold_frames = hold;
        self.release_frames = release;
        self.elapsed = 0;
        self.gain = 1.0;
        self.active = !self.sample.is_empty();
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn silence(&mut self) {
        self.active = false;
    }

    pub fn next_frame(&mut self) -> f32 {
        if !self.active {
            return 0.0;
        }
        if self.position >= self.sample.len() as f64 {
            self.active = false;
            return 0.0;
        }

        if let Some(hold) = self.hold_frames {
            if self.elapsed >= hold {
                let into_release = self.elapsed - hold;
                if into_release >= self.release_frames {
                    self.active = false;
                    return 0.0;
                }
                self.gain = 1.0 - into_release as f32 / self.release_frames as f32;
            }
        }

        let out = self.sample.frame_at(self.position) * self.gain;
        self.position += self.increment;
        self.elapsed += 1;
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpolation() {
        let sample = Sample::from_frames(vec![0.0, 1.0, 0.0], 44100);
        assert_eq!(sample.frame_at(0.5), 0.5);
        assert_eq!(sample.frame_at(1.0), 1.0);
        assert_eq!(sample.frame_at(10.0), 0.0);
    }

    #[test]
    fn test_voice_plays_once() {
        let sample = Sample::from_frames(vec![0.25; 4], 100);
        let mut voice = SampleVoice::new(sample, 100.0);
        assert_eq!(voice.next_frame(), 0.0);
        voice.trigger(1.0, None, 0, 100.0);
        let out: Vec<f32> = (0..6).map(|_| voice.next_frame()).collect();
        assert_eq!(out, vec![0.25, 0.25, 0.25, 0.25, 0.0, 0.0]);
        assert!(!voice.is_active());
    }

    #[test]
    fn test_voice_rate_doubles_speed() {
        let sample = Sample::from_frames(vec![1.0; 8], 100);
        let mut voice = SampleVoice::new(sample, 100.0);
        voice.trigger(2.0, None, 0, 100.0);
        let played = (0..8).filter(|_| voice.next_frame() != 0.0).count();
        assert_eq!(played, 4);
    }

    #[test]
    fn test_voice_releases() {
        let sample = Sample::from_frames(vec![1.0; 100], 100);
        let mut voice = SampleVoice::new(sample, 100.0);
        voice.trigger(1.0, Some(2), 2, 100.0);
        let out: Vec<f32> = (0..5).map(|_| voice.next_frame()).collect();
        assert_eq!(out, vec![1.0, 1.0, 1.0, 0.5, 0.0]);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = Sample::load(Path::new("/nonexistent/kick.mp3")).unwrap_err();
        assert!(matches!(err, Error::Sample { .. }));
    }
}
