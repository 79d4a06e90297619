//! # Colloquy Core
//!
//! Composes a scripted multi-speaker conversation into one audio track and a
//! time-aligned segment manifest.
//!
//! ## Features
//!
//! - Gender-bucketed voice pools with a seed-derived voice rotation
//! - Timeline assembly with gaps, explicit delays and overlapping speech
//! - Segment manifests wrapped in ingestion payloads
//! - WAV and MP3 output
//! - CSV tooling for import payloads and synthetic date columns
//!
//! ## Example
//!
//! ```rust,no_run
//! use colloquy_core::{
//!     read_script, AudioFormat, AudioWriter, Composer, ComposerSettings, EspeakSynthesizer,
//!     Manifest,
//! };
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let script = read_script(Path::new("call.csv"), Path::new("call_participants.csv"))?;
//!     let composer = Composer::new(EspeakSynthesizer::default(), ComposerSettings::default());
//!     let composition = composer.compose(&script, 42)?;
//!
//!     AudioWriter::new()
//!         .write_file(&composition.track, "call.mp3", AudioFormat::Mp3)
//!         .await?;
//!     let manifest = Manifest::build("call", &script, &composition.segments)?;
//!     println!("{} ms", manifest.duration);
//!     Ok(())
//! }
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod audio_writer;
pub mod clip;
pub mod composer;
pub mod config;
pub mod csv_import;
pub mod date_column;
pub mod error;
pub mod manifest;
pub mod script;
pub mod synthesis;
pub mod timeline;
pub mod voice_pool;

// Re-export main types for convenience
pub use audio_writer::{AudioFormat, AudioWriter, EncodingSettings};
pub use clip::{AudioData, Clip, Track};
pub use composer::{Composer, ComposerSettings, Composition};
pub use config::{ColloquyConfig, ConfigSource};
pub use csv_import::{convert_csv, ColumnKind, ImportPayload};
pub use date_column::{add_random_dates, DateRange};
pub use error::{ColloquyError, ColloquyResult};
pub use manifest::{to_pretty_json, Manifest, Payload};
pub use script::{parse_delay, read_script, Participant, ParticipantGender, Script, Utterance};
pub use synthesis::{EspeakSynthesizer, SpeechSynthesizer};
pub use timeline::{merge, DelayMs, Segment, Timeline};
pub use voice_pool::{select_voice, Gender, RunOffset, Voice, VoicePool};

/// Version information for the colloquy-core crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default sample rate of composed tracks (22.05 kHz)
pub const DEFAULT_SAMPLE_RATE: u32 = 22_050;

/// Maximum text length per utterance
pub const MAX_TEXT_LENGTH: usize = 100_000;
