/// Settings for the voices, patterns and grid, loadable from JSON
use crate::error::{Error, Result};
use crate::pitch::Pitch;
use crate::sequencer::patterns::{Arrangement, DrumKey};
use crate::sequencer::{Sequencer, DEFAULT_COLUMNS, DEFAULT_ROWS};
use crate::time::{NoteValue, Tempo, TICKS_PER_BAR};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Where the default drum kit is published, for anyone missing the files.
pub const DRUM_KIT_SOURCE: &str = "https://teropa.info/ext-assets/drumkit/";

/// Longest lead delay accepted, one bar.
pub const MAX_DELAY_TICKS: u32 = TICKS_PER_BAR;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    pub bpm: Tempo,
    pub drum_samples: BTreeMap<DrumKey, PathBuf>,
    pub bass: BassConfig,
    pub lead: LeadConfig,
    pub grid: GridConfig,

    /// Directory relative sample paths are resolved against.
    #[serde(skip)]
    base_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct BassConfig {
    pub volume_db: f32,
    pub cutoff: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct LeadConfig {
    pub sample: PathBuf,
    pub root: String,
    pub volume_db: f32,
    pub delay: String,
    pub feedback: f32,
    pub reverb_decay: f32,
    pub reverb_wet: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct GridConfig {
    pub columns: usize,
    pub rows: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        let drum_samples = [
            (DrumKey::Kick, "kick.mp3"),
            (DrumKey::HatClosed, "hatClosed.mp3"),
            (DrumKey::HatOpen, "hatOpen2.mp3"),
            (DrumKey::Snare, "snare3.mp3"),
            (DrumKey::TomLow, "tomLow.mp3"),
            (DrumKey::TomMid, "tomMid.mp3"),
            (DrumKey::TomHigh, "tomHigh.mp3"),
            (DrumKey::Ride, "ride.mp3"),
            (DrumKey::Crash, "hatOpen.mp3"),
        ]
        .into_iter()
        .map(|(key, file)| (key, Path::new("assets/drumkit").join(file)))
        .collect();

        Self {
            bpm: Tempo::default(),
            drum_samples,
            bass: BassConfig::default(),
            lead: LeadConfig::default(),
            grid: GridConfig::default(),
            base_dir: PathBuf::new(),
        }
    }
}

impl Default for BassConfig {
    fn default() -> Self {
        Self {
            volume_db: -4.0,
            cutoff: 2000.0,
        }
    }
}

impl Default for LeadConfig {
    fn default() -> Self {
        Self {
            sample: PathBuf::from("assets/127155__daphne-in-wonderland__celtic-harp-c2.wav"),
            root: "C2".to_string(),
            volume_db: -4.0,
            delay: "8n".to_string(),
            feedback: 0.3,
            reverb_decay: 3.0,
            reverb_wet: 0.5,
        }
    }
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            columns: DEFAULT_COLUMNS,
            rows: DEFAULT_ROWS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Config {
    /// Reads a JSON config. Missing fields keep their defaults; relative
    /// sample paths are taken relative to the file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| Error::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_json(&text).map_err(|source| Error::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;
        config.base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        config.validate()?;
        log::info!("loaded config {}", path.display());
        Ok(config)
    }

    pub fn from_json(text: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Checks every pitch, note value and the grid width up front.
    pub fn validate(&self) -> Result<()> {
        self.lead_root()?;
        self.lead_delay()?;
        self.arrangement()?;
        Ok(())
    }

    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    pub fn drum_sample(&self, key: DrumKey) -> Option<PathBuf> {
        self.drum_samples.get(&key).map(|p| self.resolve(p))
    }

    pub fn lead_sample(&self) -> PathBuf {
        self.resolve(&self.lead.sample)
    }

    pub fn lead_root(&self) -> Result<Pitch> {
        Pitch::parse(&self.lead.root)
    }

    pub fn lead_delay(&self) -> Result<NoteValue> {
        let delay = NoteValue::parse(&self.lead.delay)?;
        if delay.ticks() > MAX_DELAY_TICKS {
            return Err(Error::InvalidNoteValue(self.lead.delay.clone()));
        }
        Ok(delay)
    }

    /// A fresh grid with the configured size and row pitches.
    pub fn sequencer(&self) -> Result<Sequencer> {
        Sequencer::from_names(self.grid.columns, &self.grid.rows[..])
    }

    /// The built-in patterns, with the lead loop sized to the grid.
    pub fn arrangement(&self) -> Result<Arrangement> {
        let mut arrangement = Arrangement::new()?;
        self.sequencer()?.fit_lead_loop(&mut arrangement.lead)?;
        Ok(arrangement)
    }
}
