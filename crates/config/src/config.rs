//! Core configuration structures and loading logic

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Error type for configuration operations
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file
    Io(std::io::Error),
    /// TOML parsing error
    Parse(toml::de::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Failed to read config file: {}", e),
            ConfigError::Parse(e) => write!(f, "Failed to parse config: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e)
    }
}

/// Silence detection parameters handed to the media engine
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DetectionConfig {
    /// Noise floor in dB below which audio counts as silence
    #[serde(default = "default_threshold_db")]
    pub threshold_db: f64,
    /// Minimum length of a silent span, in seconds
    #[serde(default = "default_min_silence_secs")]
    pub min_silence_secs: f64,
}

fn default_threshold_db() -> f64 {
    -40.0
}

fn default_min_silence_secs() -> f64 {
    0.5
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            threshold_db: default_threshold_db(),
            min_silence_secs: default_min_silence_secs(),
        }
    }
}

/// Batch-level behavior
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchConfig {
    /// Preset name used for the final encode
    #[serde(default = "default_preset")]
    pub preset: String,
    /// File extensions eligible for processing (without dot, case-insensitive)
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    /// Descend into subdirectories
    #[serde(default)]
    pub recursive: bool,
    /// Files processed at once (0 = auto-derive, 1 = sequential)
    #[serde(default = "default_max_concurrent_files")]
    pub max_concurrent_files: u32,
    /// Skip sources whose final output already exists
    #[serde(default = "default_true")]
    pub skip_existing: bool,
    /// Write a `<stem>_silence_report.txt` per file
    #[serde(default = "default_true")]
    pub write_reports: bool,
    /// Keep the silence-trimmed intermediate after the final encode
    #[serde(default)]
    pub keep_intermediate: bool,
}

fn default_preset() -> String {
    "tiktok".to_string()
}

fn default_extensions() -> Vec<String> {
    vec!["mp4".to_string(), "mov".to_string(), "mkv".to_string()]
}

fn default_max_concurrent_files() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            preset: default_preset(),
            extensions: default_extensions(),
            recursive: false,
            max_concurrent_files: default_max_concurrent_files(),
            skip_existing: true,
            write_reports: true,
            keep_intermediate: false,
        }
    }
}

/// External media engine settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    /// Program name or path of the ffmpeg binary
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: String,
}

fn default_ffmpeg_path() -> String {
    "ffmpeg".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
        }
    }
}

/// Output and scratch locations
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct PathsConfig {
    /// Where final outputs and reports go (defaults to the source directory)
    pub output_dir: Option<PathBuf>,
    /// Where intermediates go (defaults to `<temp>/silencecut`)
    pub work_dir: Option<PathBuf>,
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub paths: PathsConfig,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Missing sections and fields fall back to their defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::parse_toml(&content)
    }

    /// Parse configuration from a TOML string
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration
    ///
    /// Overrides the following values if environment variables are set:
    /// - SILENCECUT_THRESHOLD_DB -> detection.threshold_db
    /// - SILENCECUT_MIN_SILENCE_SECS -> detection.min_silence_secs
    /// - SILENCECUT_PRESET -> batch.preset
    /// - SILENCECUT_MAX_CONCURRENT_FILES -> batch.max_concurrent_files
    /// - SILENCECUT_SKIP_EXISTING -> batch.skip_existing
    /// - SILENCECUT_FFMPEG -> engine.ffmpeg_path
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("SILENCECUT_THRESHOLD_DB") {
            if let Ok(db) = val.parse::<f64>() {
                self.detection.threshold_db = db;
            }
        }

        if let Ok(val) = env::var("SILENCECUT_MIN_SILENCE_SECS") {
            if let Ok(secs) = val.parse::<f64>() {
                self.detection.min_silence_secs = secs;
            }
        }

        if let Ok(val) = env::var("SILENCECUT_PRESET") {
            let val = val.trim();
            if !val.is_empty() {
                self.batch.preset = val.to_string();
            }
        }

        if let Ok(val) = env::var("SILENCECUT_MAX_CONCURRENT_FILES") {
            if let Ok(files) = val.parse::<u32>() {
                self.batch.max_concurrent_files = files;
            }
        }

        if let Ok(val) = env::var("SILENCECUT_SKIP_EXISTING") {
            // Accept "true", "1", "yes" as true; "false", "0", "no" as false
            match val.to_lowercase().as_str() {
                "true" | "1" | "yes" => self.batch.skip_existing = true,
                "false" | "0" | "no" => self.batch.skip_existing = false,
                _ => {} // Invalid value, keep existing
            }
        }

        if let Ok(val) = env::var("SILENCECUT_FFMPEG") {
            if !val.is_empty() {
                self.engine.ffmpeg_path = val;
            }
        }
    }

    /// Load configuration from file and apply environment overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Defaults plus environment overrides, for runs without a config file
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }
}
