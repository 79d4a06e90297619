//! Voice partitioning and per-speaker voice selection.
//!
//! Voices reported by the speech engine are split into three gender buckets
//! restricted to a target language. Every bucket is guaranteed non-empty: a
//! bucket that matches nothing falls back to the whole unfiltered voice list.
//! A speaker is then mapped onto its bucket with a modulo index shifted by a
//! seed-derived run offset, so voice choice varies between seeds but stays
//! fixed for a speaker within one run.

use crate::error::{ColloquyError, ColloquyResult};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Upper bound (inclusive) of the seed-derived run offset
pub const MAX_RUN_OFFSET: usize = 100;

/// Gender bucket used for voice selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    /// Male voice
    Male,
    /// Female voice
    Female,
    /// Any voice not tagged male or female
    Other,
}

impl Gender {
    /// Classify a free-form gender tag as reported by a speech engine.
    ///
    /// Engines disagree on the shape of the tag (`"M"`, `"female"`,
    /// `"VoiceGenderMale"`), so matching is by case-insensitive token.
    #[must_use]
    pub fn from_tag(tag: &str) -> Self {
        let tag = tag.trim().to_ascii_lowercase();
        if tag.contains("female") || tag == "f" {
            Self::Female
        } else if tag.contains("male") || tag == "m" {
            Self::Male
        } else {
            Self::Other
        }
    }
}

impl std::fmt::Display for Gender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Male => write!(f, "Male"),
            Self::Female => write!(f, "Female"),
            Self::Other => write!(f, "Other"),
        }
    }
}

/// Synthesis voice as reported by the speech engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voice {
    /// Identifier passed back to the engine when synthesizing
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// Language tags the voice can speak (e.g. "en-us", "en")
    pub languages: Vec<String>,
    /// Voice gender
    pub gender: Gender,
}

impl Voice {
    /// Create a new voice descriptor
    #[must_use]
    pub fn new(id: String, name: String, languages: Vec<String>, gender: Gender) -> Self {
        Self {
            id,
            name,
            languages,
            gender,
        }
    }

    /// Check whether any supported language contains `language`, ignoring case
    #[must_use]
    pub fn supports_language(&self, language: &str) -> bool {
        let needle = language.to_lowercase();
        self.languages
            .iter()
            .any(|lang| lang.to_lowercase().contains(&needle))
    }
}

/// Seed-derived offset added to every voice index within one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RunOffset(usize);

impl RunOffset {
    /// Draw the run offset from a seeded generator.
    ///
    /// The offset is drawn once per run and is a pure function of `seed`.
    #[must_use]
    pub fn from_seed(seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        Self(rng.gen_range(0..=MAX_RUN_OFFSET))
    }

    /// Use an explicit offset
    #[must_use]
    pub const fn new(offset: usize) -> Self {
        Self(offset)
    }

    /// Get the raw offset
    #[must_use]
    pub const fn value(self) -> usize {
        self.0
    }
}

/// Pick a voice from `bucket` for the given speaker.
///
/// The index is `(speaker_index + run_offset) mod len(bucket)`. Returns
/// `None` only when the bucket is empty.
#[must_use]
pub fn select_voice(bucket: &[Voice], speaker_index: usize, run_offset: RunOffset) -> Option<&Voice> {
    if bucket.is_empty() {
        return None;
    }
    let index = speaker_index.wrapping_add(run_offset.value()) % bucket.len();
    bucket.get(index)
}

/// Voices split into gender buckets for one target language
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoicePool {
    language: String,
    male: Vec<Voice>,
    female: Vec<Voice>,
    other: Vec<Voice>,
}

impl VoicePool {
    /// Partition `voices` into male, female and other buckets for `language`.
    ///
    /// A voice lands in its gender bucket when one of its languages contains
    /// `language` (case-insensitive). Voices speaking other languages are left
    /// out. Any bucket that ends up empty is replaced by the full `voices`
    /// list in its original order.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `voices` is empty.
    pub fn partition(voices: &[Voice], language: &str) -> ColloquyResult<Self> {
        if voices.is_empty() {
            return Err(ColloquyError::configuration(
                "The speech engine reported no voices",
            ));
        }

        let mut male = Vec::new();
        let mut female = Vec::new();
        let mut other = Vec::new();

        for voice in voices.iter().filter(|voice| voice.supports_language(language)) {
            match voice.gender {
                Gender::Male => male.push(voice.clone()),
                Gender::Female => female.push(voice.clone()),
                Gender::Other => other.push(voice.clone()),
            }
        }

        let fill = |bucket: &mut Vec<Voice>, gender: Gender| {
            if bucket.is_empty() {
                warn!(
                    "No {} voices for language '{}', falling back to all {} voices",
                    gender,
                    language,
                    voices.len()
                );
                *bucket = voices.to_vec();
            }
        };
        fill(&mut male, Gender::Male);
        fill(&mut female, Gender::Female);
        fill(&mut other, Gender::Other);

        debug!(
            "Voice pool for '{}': {} male, {} female, {} other",
            language,
            male.len(),
            female.len(),
            other.len()
        );

        Ok(Self {
            language: language.to_string(),
            male,
            female,
            other,
        })
    }

    /// Target language the pool was built for
    #[must_use]
    pub fn language(&self) -> &str {
        &self.language
    }

    /// Get the bucket for a gender
    #[must_use]
    pub fn bucket(&self, gender: Gender) -> &[Voice] {
        match gender {
            Gender::Male => &self.male,
            Gender::Female => &self.female,
            Gender::Other => &self.other,
        }
    }

    /// Resolve the voice for a speaker
    ///
    /// # Errors
    ///
    /// Returns a voice-not-found error if the bucket is empty, which a pool
    /// built by [`VoicePool::partition`] never produces.
    pub fn resolve(
        &self,
        gender: Gender,
        speaker_index: usize,
        run_offset: RunOffset,
    ) -> ColloquyResult<&Voice> {
        select_voice(self.bucket(gender), speaker_index, run_offset)
            .ok_or_else(|| ColloquyError::voice_not_found(format!("{gender} bucket")))
    }
}
