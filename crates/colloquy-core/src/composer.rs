//! End-to-end composition of a script into a track.

use crate::clip::Track;
use crate::error::ColloquyResult;
use crate::script::Script;
use crate::synthesis::SpeechSynthesizer;
use crate::timeline::{Segment, Timeline, DEFAULT_GAP_MS};
use crate::voice_pool::{RunOffset, Voice, VoicePool};
use tracing::{debug, info};

/// Settings for a composition run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposerSettings {
    /// Language substring used to partition voices
    pub language: String,
    /// Silence before each serially placed clip
    pub gap_ms: u64,
    /// Sample rate of the output track
    pub sample_rate: u32,
}

impl Default for ComposerSettings {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            gap_ms: DEFAULT_GAP_MS,
            sample_rate: crate::DEFAULT_SAMPLE_RATE,
        }
    }
}

/// Result of one composition run
#[derive(Debug, Clone, PartialEq)]
pub struct Composition {
    /// Assembled audio
    pub track: Track,
    /// One segment per utterance, in order
    pub segments: Vec<Segment>,
    /// Voice used for each utterance, in order
    pub assignments: Vec<Voice>,
    /// Offset derived from the run seed
    pub run_offset: RunOffset,
}

/// Drives a speech engine over a script
#[derive(Debug)]
pub struct Composer<S> {
    synthesizer: S,
    settings: ComposerSettings,
}

impl<S: SpeechSynthesizer> Composer<S> {
    /// Create a composer
    pub const fn new(synthesizer: S, settings: ComposerSettings) -> Self {
        Self {
            synthesizer,
            settings,
        }
    }

    /// Settings in use
    pub const fn settings(&self) -> &ComposerSettings {
        &self.settings
    }

    /// Partition the engine's voices for the configured language
    ///
    /// # Errors
    ///
    /// Returns an error if the engine cannot list voices or lists none.
    pub fn voice_pool(&self) -> ColloquyResult<VoicePool> {
        let voices = self.synthesizer.voices()?;
        VoicePool::partition(&voices, &self.settings.language)
    }

    /// Synthesize every utterance and lay the clips out on one track.
    ///
    /// The voice pool is checked before any synthesis starts. The first
    /// engine failure aborts the run.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an empty voice pool, or the engine's
    /// error for the first utterance it fails to synthesize.
    pub fn compose(&self, script: &Script, seed: u64) -> ColloquyResult<Composition> {
        let pool = self.voice_pool()?;
        let run_offset = RunOffset::from_seed(seed);
        info!(
            "Composing {} utterances (seed {}, run offset {})",
            script.utterances.len(),
            seed,
            run_offset.value()
        );

        let mut timeline = Timeline::new(self.settings.sample_rate, self.settings.gap_ms);
        let mut assignments = Vec::with_capacity(script.utterances.len());

        for utterance in &script.utterances {
            let voice = pool.resolve(
                utterance.gender.voice_gender(),
                utterance.speaker_index,
                run_offset,
            )?;
            debug!(
                "Speaker '{}' ({}) uses voice {}",
                utterance.speaker, utterance.speaker_index, voice.id
            );

            let clip = self.synthesizer.synthesize(voice, &utterance.text)?;
            timeline.place(clip, utterance.delay)?;
            assignments.push(voice.clone());
        }

        let (track, segments) = timeline.finish();
        info!(
            "Composed {} ms of audio in {} segments",
            track.duration_ms(),
            segments.len()
        );

        Ok(Composition {
            track,
            segments,
            assignments,
            run_offset,
        })
    }
}
