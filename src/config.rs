// Session configuration - RON file with defaults for every field

use crate::generation::{GenerationMode, GenerationSettings};
use crate::sequencer::{STEPS, Voice, drums};
use crate::session::schedule::PlaySchedule;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("RON parse error: {0}")]
    Ron(#[from] ron::error::SpannedError),

    #[error("RON write error: {0}")]
    RonWrite(#[from] ron::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Everything a playback session needs to know up front
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Drum names, in row order
    pub drums: Vec<String>,
    pub sequence_len: usize,
    pub input_len: usize,
    pub filler_start: usize,
    pub filler_len: usize,

    pub tempo: f64,
    pub min_bpm: f64,
    pub max_bpm: f64,

    pub temperature: f64,
    pub random_probability: f64,
    pub transition_duration_ms: u64,

    /// When false, the generated columns reject user edits
    pub editable_output: bool,
    pub monophonic: bool,
    /// e.g. `"kick:1,5,9;snare:5,13"`
    pub preset: Option<String>,

    pub generation_mode: GenerationMode,
    pub cycle_length: u32,
    pub play_schedule: PlaySchedule,
    pub idle_loop_limit: u32,
    pub idle_timeout_ms: u64,

    pub listen_addr: String,
    pub player_addr: String,
    pub settle_delay_ms: u64,

    /// External generator command line; without one, AI mode falls back to random
    pub generator_command: Option<String>,
    pub midi_port: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            drums: drums::drum_names().map(str::to_string).collect(),
            sequence_len: STEPS,
            input_len: 6,
            filler_start: 10,
            filler_len: 6,
            tempo: 100.0,
            min_bpm: 80.0,
            max_bpm: 160.0,
            temperature: 1.2,
            random_probability: 0.15,
            transition_duration_ms: 600,
            editable_output: false,
            monophonic: false,
            preset: None,
            generation_mode: GenerationMode::Ai,
            cycle_length: 20,
            play_schedule: PlaySchedule::default(),
            idle_loop_limit: 40,
            idle_timeout_ms: 120_000,
            listen_addr: "127.0.0.1:12004".to_string(),
            player_addr: "127.0.0.1:4560".to_string(),
            settle_delay_ms: 100,
            generator_command: None,
            midi_port: None,
        }
    }
}

impl SessionConfig {
    /// Default file location: `<config dir>/mmi-drums/config.ron`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("mmi-drums").join("config.ron"))
    }

    pub fn from_ron_str(text: &str) -> ConfigResult<Self> {
        let config: SessionConfig = ron::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_ron_str(&text)
    }

    /// Load `path`, or the default location if it exists, or the defaults
    pub fn load_or_default(path: Option<&Path>) -> ConfigResult<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.exists() => {
                log::info!("Loading config from {}", path.display());
                Self::load(&path)
            }
            _ => Ok(Self::default()),
        }
    }

    pub fn to_ron_string(&self) -> ConfigResult<String> {
        Ok(ron::ser::to_string_pretty(
            self,
            ron::ser::PrettyConfig::default(),
        )?)
    }

    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_ron_string()?)?;
        Ok(())
    }

    pub fn validate(&self) -> ConfigResult<()> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if self.drums.is_empty() {
            return invalid("at least one drum is required".into());
        }
        self.voices()?;

        if self.sequence_len == 0 {
            return invalid("sequence_len must be positive".into());
        }
        if self.input_len >= self.sequence_len {
            return invalid(format!(
                "input_len {} must be below sequence_len {}",
                self.input_len, self.sequence_len
            ));
        }
        if self.filler_len == 0 || self.filler_start + self.filler_len > self.sequence_len {
            return invalid(format!(
                "filler window {}..{} outside the sequence",
                self.filler_start,
                self.filler_start + self.filler_len
            ));
        }
        if !(self.min_bpm > 0.0 && self.min_bpm <= self.max_bpm) {
            return invalid(format!("bad BPM range {}..{}", self.min_bpm, self.max_bpm));
        }
        if self.tempo < self.min_bpm || self.tempo > self.max_bpm {
            return invalid(format!(
                "tempo {} outside {}..{}",
                self.tempo, self.min_bpm, self.max_bpm
            ));
        }
        if !(self.temperature > 0.0) {
            return invalid("temperature must be positive".into());
        }
        if !(0.0..=1.0).contains(&self.random_probability) {
            return invalid("random_probability must be within 0..1".into());
        }
        if self.cycle_length == 0 {
            return invalid("cycle_length must be positive".into());
        }
        self.listen_addr()?;
        self.player_addr()?;
        Ok(())
    }

    /// Configured drums as voices, in row order
    pub fn voices(&self) -> ConfigResult<Vec<Voice>> {
        self.drums
            .iter()
            .map(|name| drums::voice_for(name).map_err(|e| ConfigError::Invalid(e.to_string())))
            .collect()
    }

    /// Switch AI mode to random generation when no generator is available
    ///
    /// Returns true if the mode changed.
    pub fn fall_back_to_random(&mut self) -> bool {
        if self.generation_mode != GenerationMode::Ai {
            return false;
        }
        log::warn!("No generator available, using random generation");
        self.generation_mode = GenerationMode::Random;
        true
    }

    pub fn generation_settings(&self) -> GenerationSettings {
        GenerationSettings {
            sequence_len: self.sequence_len,
            input_len: self.input_len,
            filler_start: self.filler_start,
            filler_len: self.filler_len,
            temperature: self.temperature,
            transition_duration: Duration::from_millis(self.transition_duration_ms),
        }
    }

    pub fn clamp_bpm(&self, bpm: f64) -> f64 {
        bpm.clamp(self.min_bpm, self.max_bpm)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn listen_addr(&self) -> ConfigResult<SocketAddr> {
        parse_addr(&self.listen_addr)
    }

    pub fn player_addr(&self) -> ConfigResult<SocketAddr> {
        parse_addr(&self.player_addr)
    }
}

fn parse_addr(addr: &str) -> ConfigResult<SocketAddr> {
    addr.parse()
        .map_err(|_| ConfigError::Invalid(format!("bad socket address: {}", addr)))
}
