//! Conversation script ingestion.
//!
//! A script is two tables: the conversation (`name`, `text`, `delay`) and
//! the participants (`name`, `type`, `gender`). Both are validated here, once,
//! so later stages work with typed utterances only. Delays are converted
//! from decimal seconds to milliseconds at this boundary.

use crate::error::{ColloquyError, ColloquyResult};
use crate::timeline::DelayMs;
use crate::voice_pool::Gender;
use serde::Deserialize;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};

/// Speaker gender as written in the participants table
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParticipantGender {
    /// `MALE`
    Male,
    /// `FEMALE`
    Female,
    /// `ROBOT`, a synthetic participant
    Robot,
    /// Any other tag, kept verbatim
    Other(String),
}

impl ParticipantGender {
    /// Normalize a participants-table tag
    #[must_use]
    pub fn from_tag(tag: &str) -> Self {
        let tag = tag.trim();
        match tag.to_ascii_uppercase().as_str() {
            "MALE" => Self::Male,
            "FEMALE" => Self::Female,
            "ROBOT" => Self::Robot,
            _ => Self::Other(tag.to_string()),
        }
    }

    /// Voice bucket used to pick a synthesis voice
    #[must_use]
    pub const fn voice_gender(&self) -> Gender {
        match self {
            Self::Male => Gender::Male,
            Self::Female => Gender::Female,
            Self::Robot | Self::Other(_) => Gender::Other,
        }
    }

    /// Gender reported in the manifest; robots are reported as `MALE`
    #[must_use]
    pub fn manifest_tag(&self) -> &str {
        match self {
            Self::Male | Self::Robot => "MALE",
            Self::Female => "FEMALE",
            Self::Other(tag) => tag,
        }
    }

    /// Whether the participant is a synthetic speaker
    #[must_use]
    pub const fn is_bot(&self) -> bool {
        matches!(self, Self::Robot)
    }
}

/// One row of the participants table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    /// Position in the participants table, used as speaker index
    pub index: usize,
    /// Speaker name as referenced by the conversation table
    pub name: String,
    /// Participant role (e.g. `AGENT`, `CLIENT`)
    pub kind: String,
    /// Normalized gender
    pub gender: ParticipantGender,
}

impl Participant {
    /// Identifier used in the manifest
    #[must_use]
    pub fn id(&self) -> String {
        self.index.to_string()
    }
}

/// One line of dialogue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    /// Speaker name
    pub speaker: String,
    /// Index of the speaker in the participants table
    pub speaker_index: usize,
    /// Speaker gender
    pub gender: ParticipantGender,
    /// Text to speak
    pub text: String,
    /// Offset relative to the previous utterance, if any
    pub delay: Option<DelayMs>,
}

/// A validated conversation ready for composition
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Script {
    /// Participants in table order
    pub participants: Vec<Participant>,
    /// Utterances in playback order
    pub utterances: Vec<Utterance>,
}

#[derive(Debug, Deserialize)]
struct ConversationRow {
    name: String,
    text: String,
    #[serde(default)]
    delay: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ParticipantRow {
    name: String,
    #[serde(default, rename = "type")]
    kind: String,
    #[serde(default)]
    gender: String,
}

/// Parse a delay cell given in decimal seconds.
///
/// Empty cells mean no delay. Cells that are not finite numbers are treated
/// the same way.
#[must_use]
pub fn parse_delay(raw: &str) -> Option<DelayMs> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    match raw.parse::<f64>() {
        Ok(seconds) if seconds.is_finite() => Some((seconds * 1000.0).round() as DelayMs),
        _ => {
            warn!("Ignoring malformed delay '{}'", raw);
            None
        }
    }
}

fn csv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .from_reader(reader)
}

impl Script {
    /// Build a script from already typed parts
    #[must_use]
    pub fn new(participants: Vec<Participant>, utterances: Vec<Utterance>) -> Self {
        Self {
            participants,
            utterances,
        }
    }

    /// Read both tables and join utterances to their speakers
    ///
    /// # Errors
    ///
    /// Returns a script error if either table is malformed or an utterance
    /// names a speaker missing from the participants table.
    pub fn from_readers<C: Read, P: Read>(conversation: C, participants: P) -> ColloquyResult<Self> {
        let participants = csv_reader(participants)
            .deserialize::<ParticipantRow>()
            .enumerate()
            .map(|(index, row)| {
                let row = row?;
                Ok(Participant {
                    index,
                    name: row.name.trim().to_string(),
                    kind: row.kind.trim().to_string(),
                    gender: ParticipantGender::from_tag(&row.gender),
                })
            })
            .collect::<ColloquyResult<Vec<_>>>()?;

        let mut by_name: HashMap<&str, &Participant> = HashMap::new();
        for participant in &participants {
            if by_name.insert(&participant.name, participant).is_some() {
                warn!(
                    "Participant '{}' listed more than once, using the last entry",
                    participant.name
                );
            }
        }

        let mut utterances = Vec::new();
        for (row_number, row) in csv_reader(conversation).deserialize::<ConversationRow>().enumerate() {
            let row = row?;
            let speaker = row.name.trim();
            let participant = by_name.get(speaker).ok_or_else(|| {
                ColloquyError::script(format!(
                    "Conversation row {} names unknown speaker '{}'",
                    row_number + 2,
                    speaker
                ))
            })?;

            utterances.push(Utterance {
                speaker: speaker.to_string(),
                speaker_index: participant.index,
                gender: participant.gender.clone(),
                text: row.text,
                delay: row.delay.as_deref().and_then(parse_delay),
            });
        }

        debug!(
            "Loaded script with {} participants and {} utterances",
            participants.len(),
            utterances.len()
        );

        Ok(Self {
            participants,
            utterances,
        })
    }

    /// Delays in utterance order
    #[must_use]
    pub fn delays(&self) -> Vec<Option<DelayMs>> {
        self.utterances.iter().map(|u| u.delay).collect()
    }
}

/// Read `<conversation>` and `<participants>` CSV files
///
/// # Errors
///
/// Returns a file error if a file cannot be opened, or a script error if
/// its contents are invalid.
pub fn read_script(conversation: &Path, participants: &Path) -> ColloquyResult<Script> {
    let open = |path: &Path| {
        std::fs::File::open(path)
            .map_err(|e| ColloquyError::file(format!("Failed to open {}: {e}", path.display())))
    };
    Script::from_readers(open(conversation)?, open(participants)?)
}
