//! Segment manifest and the ingestion payload that carries it.

use crate::error::{ColloquyError, ColloquyResult};
use crate::script::Script;
use crate::timeline::Segment;
use serde::{Deserialize, Serialize};

/// Granularity reported for every segment
pub const SEGMENT_TYPE: &str = "SENTENCE";

/// Project name written when none is configured
pub const DEFAULT_PROJECT_NAME: &str = "<YOUR_PROJECT>";

/// Participant entry of a manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestParticipant {
    /// Index in the participants table, as a string
    pub participant_id: String,
    /// Reported gender
    pub gender: String,
    /// Participant role
    #[serde(rename = "type")]
    pub kind: String,
    /// Whether the participant is synthetic
    pub is_bot: bool,
}

/// Timed utterance entry of a manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestSegment {
    /// Speaker of the utterance
    pub participant_id: String,
    /// Start offset in milliseconds
    pub start: u64,
    /// End offset in milliseconds
    pub end: u64,
    /// Spoken text
    pub text: String,
}

/// Time-aligned description of a composed conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Run identifier
    #[serde(rename = "ID")]
    pub id: String,
    /// End of the last segment in milliseconds
    pub duration: u64,
    /// Segment granularity
    pub segment_type: String,
    /// Every participant in table order
    pub participants: Vec<ManifestParticipant>,
    /// One entry per utterance in playback order
    pub segments: Vec<ManifestSegment>,
}

impl Manifest {
    /// Join a script with the segments produced for it
    ///
    /// # Errors
    ///
    /// Returns an invalid-input error if the segment count differs from the
    /// utterance count.
    pub fn build(id: &str, script: &Script, segments: &[Segment]) -> ColloquyResult<Self> {
        if segments.len() != script.utterances.len() {
            return Err(ColloquyError::invalid_input(format!(
                "Got {} segments for {} utterances",
                segments.len(),
                script.utterances.len()
            )));
        }

        let participants = script
            .participants
            .iter()
            .map(|p| ManifestParticipant {
                participant_id: p.id(),
                gender: p.gender.manifest_tag().to_string(),
                kind: p.kind.clone(),
                is_bot: p.gender.is_bot(),
            })
            .collect();

        let segments: Vec<ManifestSegment> = script
            .utterances
            .iter()
            .zip(segments)
            .map(|(utterance, segment)| ManifestSegment {
                participant_id: utterance.speaker_index.to_string(),
                start: segment.start_ms,
                end: segment.end_ms,
                text: utterance.text.clone(),
            })
            .collect();

        Ok(Self {
            id: id.to_string(),
            duration: segments.last().map_or(0, |s| s.end),
            segment_type: SEGMENT_TYPE.to_string(),
            participants,
            segments,
        })
    }
}

/// Extra settings of the rich verbatim attribute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RichVerbatimParameters {
    /// Conversation kind
    #[serde(rename = "type")]
    pub kind: String,
    /// Names of the per-channel verbatim attributes
    pub verbatim_types: Vec<String>,
    /// Conversation language
    pub language: String,
}

/// Attribute definition of an audio payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioAttribute {
    /// Attribute name
    pub name: String,
    /// Value type
    #[serde(rename = "type")]
    pub kind: String,
    /// Target field
    pub map: String,
    /// Channel tags for verbatim attributes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verbatim_metadata_tags: Option<Vec<String>>,
    /// Settings for the rich verbatim attribute
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<RichVerbatimParameters>,
}

impl AudioAttribute {
    fn plain(name: &str, map: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: "TEXT".to_string(),
            map: map.to_string(),
            verbatim_metadata_tags: None,
            parameters: None,
        }
    }

    fn verbatim(name: &str, channel: &str) -> Self {
        Self {
            verbatim_metadata_tags: Some(vec![channel.to_string(), "TYPE_AUDIO".to_string()]),
            ..Self::plain(name, "VERBATIM")
        }
    }
}

/// The single record of an audio payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioRecord {
    /// `Audio;<id>`
    #[serde(rename = "NATURAL_ID")]
    pub natural_id: String,
    /// The manifest, serialized as a JSON string
    pub cool_rich_verbatim: String,
}

/// Ingestion document wrapping a manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payload {
    /// Always `FULL`
    pub response_level: String,
    /// Persist the records
    pub save: bool,
    /// Process the records after upload
    pub process: bool,
    /// Destination project
    pub project_name: String,
    /// Attribute definitions
    pub attributes: Vec<AudioAttribute>,
    /// Records to ingest
    pub records: Vec<AudioRecord>,
}

impl Payload {
    /// Wrap `manifest` for upload into `project_name`
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the manifest cannot be encoded.
    pub fn for_manifest(manifest: &Manifest, project_name: &str) -> ColloquyResult<Self> {
        let agent = "verbatim_type_for_agent";
        let bot = "verbatim_type_for_bot";
        let client = "verbatim_type_for_client";

        let rich = AudioAttribute {
            parameters: Some(RichVerbatimParameters {
                kind: "CALL".to_string(),
                verbatim_types: vec![agent.to_string(), client.to_string(), bot.to_string()],
                language: "en".to_string(),
            }),
            ..AudioAttribute::plain("cool_rich_verbatim", "RICH_VERBATIM")
        };

        Ok(Self {
            response_level: "FULL".to_string(),
            save: true,
            process: true,
            project_name: project_name.to_string(),
            attributes: vec![
                AudioAttribute::verbatim(agent, "CHANNEL_AGENT"),
                AudioAttribute::verbatim(bot, "CHANNEL_UNKNOWN"),
                AudioAttribute::verbatim(client, "CHANNEL_CLIENT"),
                rich,
                AudioAttribute::plain("NATURAL_ID", "ID1"),
            ],
            records: vec![AudioRecord {
                natural_id: format!("Audio;{}", manifest.id),
                cool_rich_verbatim: serde_json::to_string(manifest)?,
            }],
        })
    }
}

/// Serialize `value` as JSON indented by four spaces
///
/// # Errors
///
/// Returns a serialization error if `value` cannot be encoded.
pub fn to_pretty_json<T: Serialize>(value: &T) -> ColloquyResult<String> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut serializer)?;
    String::from_utf8(buf).map_err(|e| ColloquyError::serialization(e.to_string()))
}
