use clap::Parser;
use eframe::egui;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tonegrid::{
    AudioOutput, CellChange, Config, MidiOutputDevice, PlaybackEngine,
    PlaybackEvent, Sequencer, Tempo, Transport,
};

#[derive(Parser, Debug)]
#[command(about = "Three-voice groove box with a step grid for the lead")]
struct Args {
    /// JSON settings file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Starting tempo
    #[arg(short, long)]
    bpm: Option<f32>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(bpm) = args.bpm {
        config.bpm = Tempo::new(bpm);
    }
    let app = TonegridApp::new(config)?;

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([760.0, 420.0])
            .with_title("tonegrid"),
        ..Default::default()
    };

    eframe::run_native("tonegrid", options, Box::new(|_cc| Ok(Box::new(app))))?;
    Ok(())
}

struct TonegridApp {
    config: Config,
    sequencer: Sequencer,
    transport: Arc<Mutex<Transport>>,
    audio_output: Option<AudioOutput>,
    midi_output: MidiOutputDevice,
    playback_engine: PlaybackEngine,

    // UI state
    available_midi_ports: Vec<String>,
    selected_port: Option<usize>,
    bpm: f32,
}

impl TonegridApp {
    fn new(config: Config) -> tonegrid::Result<Self> {
        let transport = Arc::new(Mutex::new(Transport::new(config.arrangement()?, config.bpm)));
        let playback_engine = PlaybackEngine::new(Arc::clone(&transport));

        Ok(Self {
            sequencer: config.sequencer()?,
            bpm: config.bpm.bpm(),
            config,
            transport,
            audio_output: None,
            midi_output: MidiOutputDevice::new(),
            playback_engine,
            available_midi_ports: MidiOutputDevice::available_ports(),
            selected_port: None,
        })
    }

    /// Audio is opened on the first start, not at launch.
    fn ensure_audio(&mut self) {
        if self.audio_output.is_some() {
            return;
        }
        let output = AudioOutput::new(&self.config).or_else(|e| {
            log::warn!("{}; continuing without sound", e);
            AudioOutput::silent(&self.config)
        });
        match output {
            Ok(output) => {
                self.playback_engine.attach(output.performer());
                self.audio_output = Some(output);
            }
            Err(e) => log::error!("{}", e),
        }
    }

    fn handle_playback_events(&mut self) {
        let now = Instant::now();

        for event in self.playback_engine.poll_events() {
            match event {
                PlaybackEvent::StepAdvanced(tick) => {
                    self.sequencer.set_playhead(tick as usize);
                }
                PlaybackEvent::Trigger(trigger) => {
                    if let Err(e) = self.midi_output.play(&trigger, now) {
                        log::warn!("{}", e);
                    }
                }
                PlaybackEvent::Stopped => {
                    self.sequencer.reset_playhead();
                    self.midi_output.release_all();
                }
            }
        }

        if let Err(e) = self.midi_output.release_due(now) {
            log::warn!("{}", e);
        }
    }

    fn start_playback(&mut self) {
        self.ensure_audio();
        self.playback_engine.start();
    }

    fn stop_playback(&mut self) {
        self.ensure_audio();
        self.playback_engine.stop();
    }

    fn change_cell(&mut self, change: CellChange) {
        let mut transport = self.transport.lock().unwrap();
        let lead = &mut transport.arrangement_mut().lead;
        if let Err(e) = self.sequencer.change(change, lead) {
            log::warn!("{}", e);
        }
    }

    fn grid_ui(&mut self, ui: &mut egui::Ui) {
        let is_playing = self.playback_engine.is_running();
        let mut changes = Vec::new();

        egui::Grid::new("sequencer")
            .spacing(egui::vec2(2.0, 2.0))
            .show(ui, |ui| {
                for row in 0..self.sequencer.rows() {
                    let label = self
                        .sequencer
                        .row_pitch(row)
                        .map(|p| p.to_string())
                        .unwrap_or_default();
                    ui.label(label);

                    for column in 0..self.sequencer.columns() {
                        let on = self.sequencer.grid().get(column, row);
                        let is_current = is_playing && self.sequencer.playhead() == column;
                        let fill = match (on, is_current) {
                            (true, true) => egui::Color32::from_rgb(140, 230, 140),
                            (true, false) => egui::Color32::from_rgb(60, 60, 200),
                            (false, true) => egui::Color32::from_rgb(70, 110, 70),
                            (false, false) if column % 4 == 0 => egui::Color32::from_rgb(55, 55, 55),
                            (false, false) => egui::Color32::from_rgb(40, 40, 40),
                        };

                        let button = egui::Button::new("")
                            .min_size(egui::vec2(15.0, 15.0))
                            .fill(fill);
                        if ui.add(button).clicked() {
                            changes.push(CellChange {
                                column,
                                row,
                                state: !on,
                            });
                        }
                    }
                    ui.end_row();
                }
            });

        for change in changes {
            self.change_cell(change);
        }
    }
}

impl eframe::App for TonegridApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        ctx.request_repaint();

        self.handle_playback_events();

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("tonegrid");
            ui.add_space(10.0);

            // MIDI Port Selection
            let mut selected_port_changed = None;
            ui.horizontal(|ui| {
                ui.label("MIDI Output:");
                if self.available_midi_ports.is_empty() {
                    ui.label("No MIDI ports available");
                } else {
                    egui::ComboBox::from_label("")
                        .selected_text(
                            self.selected_port
                                .and_then(|i| self.available_midi_ports.get(i))
                                .map(String::as_str)
                                .unwrap_or("Select port..."),
                        )
                        .show_ui(ui, |ui| {
                            for (i, port_name) in self.available_midi_ports.iter().enumerate() {
                                if ui
                                    .selectable_label(self.selected_port == Some(i), port_name)
                                    .clicked()
                                {
                                    selected_port_changed = Some(i);
                                }
                            }
                        });
                }
            });

            if let Some(port_idx) = selected_port_changed {
                match self.midi_output.connect(port_idx) {
                    Ok(()) => self.selected_port = Some(port_idx),
                    Err(e) => log::warn!("{}", e),
                }
            }

            ui.add_space(10.0);

            // Transport controls
            ui.horizontal(|ui| {
                if ui.button("▶ Start").clicked() {
                    self.start_playback();
                }
                if ui.button("■ Stop").clicked() {
                    self.stop_playback();
                }

                ui.add_space(20.0);

                ui.label("BPM:");
                if ui
                    .add(
                        egui::DragValue::new(&mut self.bpm)
                            .clamp_range(Tempo::MIN_VALUE..=Tempo::MAX_VALUE)
                            .speed(1.0),
                    )
                    .changed()
                {
                    self.playback_engine.set_bpm(self.bpm);
                }
            });

            ui.add_space(20.0);

            self.grid_ui(ui);

            // Info
            ui.separator();
            ui.label("Click cells to add or remove lead notes");
            if self
                .audio_output
                .as_ref()
                .is_some_and(|output| !output.is_audible())
            {
                ui.colored_label(egui::Color32::YELLOW, "⚠ No audio device - silent playback");
            }
            if !self.midi_output.is_connected() {
                ui.colored_label(
                    egui::Color32::YELLOW,
                    "⚠ No MIDI output connected - audio playback only",
                );
            }
        });
    }
}
