//! Configuration loaded from TOML with environment overrides.
//!
//! Lookup order for the file: an explicit path, then `COLLOQUY_CONFIG`, then
//! `config.toml` in the platform config directory. A missing file yields the
//! defaults.

use crate::audio_writer::{AudioFormat, EncodingSettings};
use crate::composer::ComposerSettings;
use crate::error::{ColloquyError, ColloquyResult};
use crate::manifest::DEFAULT_PROJECT_NAME;
use crate::synthesis::DEFAULT_ENGINE_PROGRAM;
use crate::timeline::{DEFAULT_GAP_MS, MAX_DELAY_MS};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::info;

/// Environment variable naming the config file
pub const CONFIG_ENV: &str = "COLLOQUY_CONFIG";

/// Where a loaded configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Parsed from this file
    File(PathBuf),
    /// Built-in defaults; holds the path that was looked up, if any
    Defaults(Option<PathBuf>),
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "configuration from {}", path.display()),
            Self::Defaults(Some(path)) => {
                write!(f, "default configuration ({} not found)", path.display())
            }
            Self::Defaults(None) => write!(f, "default configuration"),
        }
    }
}

/// Voice pool settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoicesConfig {
    /// Language substring a voice must support
    pub language: String,
}

impl Default for VoicesConfig {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
        }
    }
}

/// Timeline settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineConfig {
    /// Silence before each serially placed clip
    pub gap_ms: u64,
    /// Output sample rate in Hz
    pub sample_rate: u32,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            gap_ms: DEFAULT_GAP_MS,
            sample_rate: crate::DEFAULT_SAMPLE_RATE,
        }
    }
}

/// Speech engine settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Program to run
    pub program: String,
    /// Longest text accepted per utterance
    pub max_text_length: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            program: DEFAULT_ENGINE_PROGRAM.to_string(),
            max_text_length: crate::MAX_TEXT_LENGTH,
        }
    }
}

/// Output settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Audio file extension, `mp3` or `wav`
    pub format: String,
    /// MP3 bitrate
    pub bitrate_kbps: u32,
    /// Project name written into payloads
    pub project_name: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: "mp3".to_string(),
            bitrate_kbps: 128,
            project_name: DEFAULT_PROJECT_NAME.to_string(),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `colloquy_core=debug`
    pub level: String,
    /// Emit JSON lines instead of text
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColloquyConfig {
    /// Seed used when none is given on the command line
    pub seed: u64,
    /// Voice pool settings
    pub voices: VoicesConfig,
    /// Timeline settings
    pub timeline: TimelineConfig,
    /// Speech engine settings
    pub engine: EngineConfig,
    /// Output settings
    pub output: OutputConfig,
    /// Logging settings
    pub logging: LoggingConfig,
}

impl Default for ColloquyConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            voices: VoicesConfig::default(),
            timeline: TimelineConfig::default(),
            engine: EngineConfig::default(),
            output: OutputConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl ColloquyConfig {
    /// Parse a TOML document
    ///
    /// # Errors
    ///
    /// Returns a configuration error for malformed TOML.
    pub fn from_toml(contents: &str) -> ColloquyResult<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Load configuration, apply environment overrides and validate
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, or
    /// if the result fails validation.
    pub fn load(path: Option<&Path>) -> ColloquyResult<Self> {
        let (config, source) = Self::load_with_source(path)?;
        info!("Using {}", source);
        Ok(config)
    }

    /// Like [`ColloquyConfig::load`], but returns the source instead of
    /// logging it, for callers that install a subscriber afterwards.
    ///
    /// # Errors
    ///
    /// Same as [`ColloquyConfig::load`].
    pub fn load_with_source(path: Option<&Path>) -> ColloquyResult<(Self, ConfigSource)> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from))
            .or_else(default_config_path);

        let (mut config, source) = match path {
            Some(path) => match std::fs::read_to_string(&path) {
                Ok(contents) => (Self::from_toml(&contents)?, ConfigSource::File(path)),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    (Self::default(), ConfigSource::Defaults(Some(path)))
                }
                Err(e) => {
                    return Err(ColloquyError::file(format!(
                        "Failed to read {}: {e}",
                        path.display()
                    )))
                }
            },
            None => (Self::default(), ConfigSource::Defaults(None)),
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok((config, source))
    }

    /// Override fields from `COLLOQUY_*` variables looked up with `lookup`
    pub fn apply_env_overrides<F: Fn(&str) -> Option<String>>(&mut self, lookup: F) {
        if let Some(language) = lookup("COLLOQUY_LANGUAGE") {
            self.voices.language = language;
        }
        if let Some(program) = lookup("COLLOQUY_ENGINE") {
            self.engine.program = program;
        }
        if let Some(level) = lookup("COLLOQUY_LOG_LEVEL") {
            self.logging.level = level;
        }
    }

    /// Check that every setting is usable
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming the first bad setting.
    pub fn validate(&self) -> ColloquyResult<()> {
        if self.voices.language.trim().is_empty() {
            return Err(ColloquyError::configuration("voices.language must not be empty"));
        }
        if self.timeline.gap_ms > MAX_DELAY_MS {
            return Err(ColloquyError::configuration(format!(
                "timeline.gap_ms must be at most {MAX_DELAY_MS}, got {}",
                self.timeline.gap_ms
            )));
        }
        self.audio_format()?;
        self.encoding_settings()
            .validate()
            .map_err(|e| ColloquyError::configuration(format!("[timeline]/[output]: {e}")))
    }

    /// Output audio format
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an unknown format.
    pub fn audio_format(&self) -> ColloquyResult<AudioFormat> {
        AudioFormat::from_extension(&self.output.format)
            .map_err(|e| ColloquyError::configuration(format!("output.format: {e}")))
    }

    /// Settings for the composer
    #[must_use]
    pub fn composer_settings(&self) -> ComposerSettings {
        ComposerSettings {
            language: self.voices.language.clone(),
            gap_ms: self.timeline.gap_ms,
            sample_rate: self.timeline.sample_rate,
        }
    }

    /// Settings for the audio writer
    #[must_use]
    pub fn encoding_settings(&self) -> EncodingSettings {
        EncodingSettings::new(self.timeline.sample_rate, 1).with_bitrate(self.output.bitrate_kbps)
    }
}

/// `config.toml` in the platform config directory
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("io", "Colloquy", "colloquy").map(|dirs| dirs.config_dir().join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = ColloquyConfig::default();
        assert_eq!(config.seed, 42);
        assert_eq!(config.voices.language, "en");
        assert_eq!(config.timeline.gap_ms, 300);
        assert_eq!(config.timeline.sample_rate, 22_050);
        assert_eq!(config.engine.program, "espeak-ng");
        assert_eq!(config.output.format, "mp3");
        assert_eq!(config.output.project_name, "<YOUR_PROJECT>");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ColloquyConfig::from_toml(
            r#"
            seed = 7

            [timeline]
            gap_ms = 150

            [output]
            format = "wav"
            "#,
        )
        .unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.timeline.gap_ms, 150);
        assert_eq!(config.timeline.sample_rate, 22_050);
        assert_eq!(config.audio_format().unwrap(), AudioFormat::Wav);
        assert_eq!(config.output.bitrate_kbps, 128);
    }

    #[test]
    fn test_malformed_toml() {
        let err = ColloquyConfig::from_toml("seed = \"many\"").unwrap_err();
        assert!(matches!(err, ColloquyError::ConfigurationError { .. }));
    }

    #[test]
    fn test_validation() {
        let mut config = ColloquyConfig::default();
        config.timeline.sample_rate = 0;
        assert!(config.validate().is_err());

        let mut config = ColloquyConfig::default();
        config.voices.language = "  ".into();
        assert!(config.validate().is_err());

        let mut config = ColloquyConfig::default();
        config.output.bitrate_kbps = 0;
        assert!(config.validate().is_err());

        let mut config = ColloquyConfig::default();
        config.output.format = "ogg".into();
        assert!(config.validate().is_err());

        let mut config = ColloquyConfig::default();
        config.timeline.gap_ms = MAX_DELAY_MS + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_catches_encoder_settings_early() {
        let mut config = ColloquyConfig::default();
        config.output.bitrate_kbps = 130;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ColloquyError::ConfigurationError { .. }));
        assert!(err.to_string().contains("130"));

        let mut config = ColloquyConfig::default();
        config.timeline.sample_rate = 4000;
        assert!(config.validate().is_err());

        let mut config = ColloquyConfig::default();
        config.output.bitrate_kbps = 320;
        config.timeline.sample_rate = 44_100;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [("COLLOQUY_LANGUAGE", "fr"), ("COLLOQUY_LOG_LEVEL", "debug")]
            .into_iter()
            .collect();
        let mut config = ColloquyConfig::default();
        config.apply_env_overrides(|key| vars.get(key).map(|v| (*v).to_string()));

        assert_eq!(config.voices.language, "fr");
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.engine.program, "espeak-ng");
    }

    #[test]
    fn test_load_file_and_missing_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[voices]\nlanguage = \"en-gb\"").unwrap();
        let config = ColloquyConfig::load(Some(file.path())).unwrap();
        assert!(config.voices.language == "en-gb" || std::env::var("COLLOQUY_LANGUAGE").is_ok());

        let config = ColloquyConfig::load(Some(Path::new("/nonexistent/colloquy.toml"))).unwrap();
        assert_eq!(config.timeline.gap_ms, 300);
    }

    #[test]
    fn test_load_reports_source() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "seed = 9").unwrap();
        let (config, source) = ColloquyConfig::load_with_source(Some(file.path())).unwrap();
        assert_eq!(config.seed, 9);
        assert_eq!(source, ConfigSource::File(file.path().to_path_buf()));
        assert!(source.to_string().starts_with("configuration from"));

        let missing = Path::new("/nonexistent/colloquy.toml");
        let (_, source) = ColloquyConfig::load_with_source(Some(missing)).unwrap();
        assert_eq!(source, ConfigSource::Defaults(Some(missing.to_path_buf())));
        assert!(source.to_string().contains("not found"));
    }

    #[test]
    fn test_derived_settings() {
        let config = ColloquyConfig::default();
        let composer = config.composer_settings();
        assert_eq!(composer.gap_ms, 300);
        assert_eq!(composer.language, "en");
        let encoding = config.encoding_settings();
        assert_eq!(encoding.sample_rate, 22_050);
        assert_eq!(encoding.bitrate_kbps, 128);
    }
}
