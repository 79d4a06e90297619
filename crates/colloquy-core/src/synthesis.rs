//! Speech engine boundary.
//!
//! The composer only needs two things from an engine: the voices it offers
//! and a blocking call that turns text into a [`Clip`]. [`EspeakSynthesizer`]
//! implements both on top of the `espeak-ng` command line program.

use crate::clip::Clip;
use crate::error::{ColloquyError, ColloquyResult};
use crate::voice_pool::{Gender, Voice};
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::{debug, info};

/// Default speech engine program
pub const DEFAULT_ENGINE_PROGRAM: &str = "espeak-ng";

/// A text-to-speech engine the composer can drive
#[cfg_attr(test, mockall::automock)]
pub trait SpeechSynthesizer: Send + Sync {
    /// List every voice the engine offers
    ///
    /// # Errors
    ///
    /// Returns an error if the engine cannot be queried.
    fn voices(&self) -> ColloquyResult<Vec<Voice>>;

    /// Synthesize `text` with `voice`, blocking until audio is available
    ///
    /// # Errors
    ///
    /// Returns an error if the engine fails for this utterance.
    fn synthesize(&self, voice: &Voice, text: &str) -> ColloquyResult<Clip>;
}

/// Speech synthesis through the `espeak-ng` program
#[derive(Debug, Clone)]
pub struct EspeakSynthesizer {
    program: String,
    max_text_length: usize,
}

impl EspeakSynthesizer {
    /// Create an adapter invoking `program`
    #[must_use]
    pub fn new<S: Into<String>>(program: S) -> Self {
        Self {
            program: program.into(),
            max_text_length: crate::MAX_TEXT_LENGTH,
        }
    }

    /// Set the longest text accepted per utterance
    #[must_use]
    pub const fn with_max_text_length(mut self, max_text_length: usize) -> Self {
        self.max_text_length = max_text_length;
        self
    }

    /// Program this adapter runs
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    fn validate_text(&self, text: &str) -> ColloquyResult<()> {
        if text.len() > self.max_text_length {
            return Err(ColloquyError::invalid_input(format!(
                "Text length {} exceeds maximum of {}",
                text.len(),
                self.max_text_length
            )));
        }
        Ok(())
    }
}

impl Default for EspeakSynthesizer {
    fn default() -> Self {
        Self::new(DEFAULT_ENGINE_PROGRAM)
    }
}

impl SpeechSynthesizer for EspeakSynthesizer {
    fn voices(&self) -> ColloquyResult<Vec<Voice>> {
        let output = Command::new(&self.program)
            .arg("--voices")
            .output()
            .map_err(|e| {
                ColloquyError::synthesis(format!("Failed to run '{}': {e}", self.program))
            })?;

        if !output.status.success() {
            return Err(ColloquyError::synthesis(format!(
                "'{} --voices' exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let voices = parse_voice_list(&String::from_utf8_lossy(&output.stdout));
        info!("Speech engine reported {} voices", voices.len());
        Ok(voices)
    }

    fn synthesize(&self, voice: &Voice, text: &str) -> ColloquyResult<Clip> {
        self.validate_text(text)?;
        debug!("Synthesizing {} characters with voice {}", text.len(), voice.id);

        let scratch = tempfile::Builder::new()
            .prefix("colloquy-")
            .suffix(".wav")
            .tempfile()?;

        let mut child = Command::new(&self.program)
            .arg("-v")
            .arg(&voice.id)
            .arg("-w")
            .arg(scratch.path())
            .arg("--stdin")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                ColloquyError::synthesis(format!("Failed to run '{}': {e}", self.program))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(text.as_bytes())?;
        }

        let output = child.wait_with_output()?;
        if !output.status.success() {
            return Err(ColloquyError::synthesis(format!(
                "Voice '{}' failed with {}: {}",
                voice.id,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        read_wav_clip(scratch.path()).map_err(|e| {
            ColloquyError::synthesis(format!("Voice '{}' produced unreadable audio: {e}", voice.id))
        })
    }
}

/// Parse the table printed by `espeak-ng --voices`.
///
/// ```text
/// Pty Language       Age/Gender VoiceName          File          Other Languages
///  5  en-us           --/M      English_(America)  gmw/en-US     (en 3)
/// ```
///
/// The language column doubles as the voice identifier.
#[must_use]
pub fn parse_voice_list(listing: &str) -> Vec<Voice> {
    listing
        .lines()
        .filter(|line| !line.trim_start().starts_with("Pty"))
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 5 {
                return None;
            }

            let language = fields[1];
            let gender = fields[2].split('/').nth(1).map_or(Gender::Other, Gender::from_tag);

            let mut languages = vec![language.to_string()];
            languages.extend(
                fields[5..]
                    .iter()
                    .filter_map(|f| f.strip_prefix('('))
                    .map(str::to_string),
            );

            Some(Voice::new(
                language.to_string(),
                fields[3].replace('_', " "),
                languages,
                gender,
            ))
        })
        .collect()
}

/// Decode a WAV file into a mono clip
///
/// # Errors
///
/// Returns an error if the file cannot be read or has an unsupported layout.
pub fn read_wav_clip(path: &Path) -> ColloquyResult<Clip> {
    let mut reader = hound::WavReader::open(path)?;
    let spec = reader.spec();
    let channels = usize::from(spec.channels.max(1));

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>()?,
        hound::SampleFormat::Int => {
            let scale = 2f32.powi(i32::from(spec.bits_per_sample) - 1);
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()?
        }
    };

    let mono = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect()
    };

    Clip::from_samples(mono, spec.sample_rate)
}
