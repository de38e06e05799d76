/// Playback engine - coordinates timing and triggers
use super::patterns::{Arrangement, DrumKey};
use crate::pitch::Pitch;
use crate::time::{NoteValue, Tempo};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// How long a bass note sounds.
pub const BASS_NOTE_SECONDS: f32 = 0.1;

/// How long a lead note sounds, in musical time.
pub const LEAD_NOTE_TICKS: u32 = 8;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Trigger {
    Drum(DrumKey),
    Bass { pitch: Pitch, seconds: f32 },
    Lead { pitch: Pitch, seconds: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlaybackEvent {
    StepAdvanced(u64),
    Trigger(Trigger),
    Stopped,
}

/// Anything that reacts to playback events as they happen, e.g. the
/// instrument rack.
pub trait Performs {
    fn perform(&mut self, event: &PlaybackEvent);
}

pub type SharedPerformer = Arc<Mutex<dyn Performs + Send>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Started,
    Stopped,
}

/// The shared clock. Walks the arrangement one sixteenth at a time.
#[derive(Debug, Clone)]
pub struct Transport {
    arrangement: Arrangement,
    tempo: Tempo,
    tick: u64,
    state: TransportState,
}

impl Transport {
    pub fn new(arrangement: Arrangement, tempo: Tempo) -> Self {
        Self {
            arrangement,
            tempo,
            tick: 0,
            state: TransportState::Stopped,
        }
    }

    pub fn arrangement(&self) -> &Arrangement {
        &self.arrangement
    }

    pub fn arrangement_mut(&mut self) -> &mut Arrangement {
        &mut self.arrangement
    }

    pub fn tempo(&self) -> Tempo {
        self.tempo
    }

    pub fn bpm(&self) -> f32 {
        self.tempo.bpm()
    }

    pub fn set_bpm(&mut self, bpm: f32) {
        self.tempo = Tempo::new(bpm);
        log::debug!("tempo now {}", self.tempo);
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn is_started(&self) -> bool {
        self.state == TransportState::Started
    }

    pub fn start(&mut self) {
        self.state = TransportState::Started;
    }

    /// Halts and rewinds to the top.
    pub fn stop(&mut self) {
        self.state = TransportState::Stopped;
        self.tick = 0;
    }

    pub fn step_duration(&self) -> Duration {
        Duration::from_secs_f32(self.tempo.seconds_per_tick())
    }

    /// Everything that fires on the current tick, then moves on by one.
    pub fn step(&mut self) -> Vec<PlaybackEvent> {
        if !self.is_started() {
            return Vec::new();
        }

        let tick = self.tick;
        let lead_seconds = NoteValue::from_ticks(LEAD_NOTE_TICKS).seconds(self.tempo);
        let arrangement = &self.arrangement;

        let mut events = vec![PlaybackEvent::StepAdvanced(tick)];
        events.extend(
            arrangement
                .drums
                .values_at(tick)
                .map(|drum| Trigger::Drum(*drum))
                .chain(arrangement.bass.values_at(tick).map(|pitch| Trigger::Bass {
                    pitch: *pitch,
                    seconds: BASS_NOTE_SECONDS,
                }))
                .chain(arrangement.lead.values_at(tick).map(|pitch| Trigger::Lead {
                    pitch: *pitch,
                    seconds: lead_seconds,
                }))
                .map(PlaybackEvent::Trigger),
        );

        self.tick += 1;
        events
    }
}

pub struct PlaybackEngine {
    sender: Sender<PlaybackEvent>,
    receiver: Receiver<PlaybackEvent>,
    transport: Arc<Mutex<Transport>>,
    performer: Option<SharedPerformer>,
    is_running: Arc<Mutex<bool>>,
    worker: Option<JoinHandle<()>>,
}

impl PlaybackEngine {
    pub fn new(transport: Arc<Mutex<Transport>>) -> Self {
        let (sender, receiver) = channel();

        Self {
            sender,
            receiver,
            transport,
            performer: None,
            is_running: Arc::new(Mutex::new(false)),
            worker: None,
        }
    }

    pub fn transport(&self) -> &Arc<Mutex<Transport>> {
        &self.transport
    }

    /// Every event is handed to the performer on the timing thread, before
    /// it reaches the poll queue.
    pub fn attach(&mut self, performer: SharedPerformer) {
        self.performer = Some(performer);
    }

    pub fn start(&mut self) {
        if *self.is_running.lock().unwrap() {
            return;
        }

        *self.is_running.lock().unwrap() = true;
        self.transport.lock().unwrap().start();
        log::info!("transport started");

        let is_running = Arc::clone(&self.is_running);
        let transport = Arc::clone(&self.transport);
        let performer = self.performer.clone();
        let sender = self.sender.clone();

        self.worker = Some(thread::spawn(move || {
            let mut next_step = Instant::now();

            while *is_running.lock().unwrap() {
                let now = Instant::now();

                if now >= next_step {
                    let (events, step_duration) = {
                        let mut transport = transport.lock().unwrap();
                        (transport.step(), transport.step_duration())
                    };

                    for event in events {
                        if let Some(performer) = &performer {
                            performer.lock().unwrap().perform(&event);
                        }
                        let _ = sender.send(event);
                    }

                    // Deadlines accumulate so timing does not drift, but a
                    // stall never causes a burst of catch-up steps.
                    next_step += step_duration;
                    if next_step < now {
                        next_step = now + step_duration;
                    }
                }

                thread::sleep(Duration::from_millis(1));
            }
        }));
    }

    /// Halts the timing thread and rewinds the transport. Once this returns
    /// no more events are produced.
    pub fn stop(&mut self) {
        *self.is_running.lock().unwrap() = false;
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("playback thread panicked");
            }
        }
        self.transport.lock().unwrap().stop();

        let event = PlaybackEvent::Stopped;
        if let Some(performer) = &self.performer {
            performer.lock().unwrap().perform(&event);
        }
        let _ = self.sender.send(event);
        log::info!("transport stopped");
    }

    pub fn set_bpm(&self, bpm: f32) {
        self.transport.lock().unwrap().set_bpm(bpm);
    }

    pub fn is_running(&self) -> bool {
        *self.is_running.lock().unwrap()
    }

    pub fn poll_events(&self) -> Vec<PlaybackEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.receiver.try_recv() {
            events.push(event);
        }
        events
    }
}

impl Drop for PlaybackEngine {
    fn drop(&mut self) {
        *self.is_running.lock().unwrap() = false;
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport() -> Transport {
        Transport::new(Arrangement::new().unwrap(), Tempo::new(240.0))
    }

    fn triggers(events: &[PlaybackEvent]) -> Vec<Trigger> {
        events
            .iter()
            .filter_map(|e| match e {
                PlaybackEvent::Trigger(t) => Some(*t),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_stopped_transport_is_silent() {
        let mut transport = transport();
        assert!(transport.step().is_empty());
        assert_eq!(transport.tick(), 0);
    }

    #[test]
    fn test_first_step_fires_kick_and_bass() {
        let mut transport = transport();
        transport.start();
        let events = transport.step();
        assert_eq!(events[0], PlaybackEvent::StepAdvanced(0));
        let fired = triggers(&events);
        assert_eq!(fired.len(), 2);
        assert_eq!(fired[0], Trigger::Drum(DrumKey::Kick));
        assert!(matches!(fired[1], Trigger::Bass { pitch, .. } if pitch.to_string() == "C#2"));
        assert_eq!(transport.tick(), 1);
    }

    #[test]
    fn test_bass_loops_every_half_bar() {
        let mut transport = transport();
        transport.start();
        let bass_ticks: Vec<u64> = (0..16)
            .filter_map(|_| {
                let tick = transport.tick();
                let fired = triggers(&transport.step());
                fired
                    .iter()
                    .any(|t| matches!(t, Trigger::Bass { .. }))
                    .then_some(tick)
            })
            .collect();
        assert_eq!(bass_ticks, vec![0, 3, 6, 8, 11, 14]);
    }

    #[test]
    fn test_lead_edits_are_heard() {
        let mut transport = transport();
        let pitch = Pitch::parse("E3").unwrap();
        transport
            .arrangement_mut()
            .lead
            .add(crate::time::Position::from_ticks(1), pitch);
        transport.start();
        transport.step();
        let fired = triggers(&transport.step());
        let lead = fired
            .iter()
            .find_map(|t| match t {
                Trigger::Lead { pitch, seconds } => Some((*pitch, *seconds)),
                _ => None,
            })
            .unwrap();
        assert_eq!(lead.0, pitch);
        // a half note at 240 BPM
        assert!((lead.1 - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_stop_rewinds() {
        let mut transport = transport();
        transport.start();
        for _ in 0..5 {
            transport.step();
        }
        transport.stop();
        assert_eq!(transport.tick(), 0);
        assert!(transport.step().is_empty());
    }

    #[test]
    fn test_tempo_change_is_clamped() {
        let mut transport = transport();
        transport.set_bpm(500.0);
        assert_eq!(transport.bpm(), Tempo::MAX_VALUE);
        assert_eq!(transport.step_duration(), Duration::from_secs_f32(0.0625));
    }

    #[derive(Default)]
    struct Counter {
        steps: usize,
        stops: usize,
    }

    impl Performs for Counter {
        fn perform(&mut self, event: &PlaybackEvent) {
            match event {
                PlaybackEvent::StepAdvanced(_) => self.steps += 1,
                PlaybackEvent::Stopped => self.stops += 1,
                PlaybackEvent::Trigger(_) => {}
            }
        }
    }

    #[test]
    fn test_engine_start_then_stop_halts() {
        let transport = Arc::new(Mutex::new(transport()));
        let counter = Arc::new(Mutex::new(Counter::default()));
        let mut engine = PlaybackEngine::new(Arc::clone(&transport));
        engine.attach(counter.clone());

        engine.start();
        engine.start();
        thread::sleep(Duration::from_millis(120));
        engine.stop();

        assert!(!engine.is_running());
        assert_eq!(transport.lock().unwrap().tick(), 0);
        let steps_at_stop = counter.lock().unwrap().steps;
        assert!(steps_at_stop >= 1);
        assert_eq!(counter.lock().unwrap().stops, 1);

        let events = engine.poll_events();
        assert_eq!(events.last(), Some(&PlaybackEvent::Stopped));

        thread::sleep(Duration::from_millis(100));
        assert!(engine.poll_events().is_empty());
        assert_eq!(counter.lock().unwrap().steps, steps_at_stop);
    }
}
