//! Integration tests for colloquy-core crate

use colloquy_core::manifest::DEFAULT_PROJECT_NAME;
use colloquy_core::{
    to_pretty_json, AudioFormat, AudioWriter, Clip, ColloquyError, ColloquyResult, Composer,
    ComposerSettings, Gender, Manifest, Payload, RunOffset, Script, Segment, SpeechSynthesizer,
    Voice, VoicePool,
};
use rstest::rstest;
use tempfile::TempDir;

/// Engine whose clip length depends only on the text, 10 ms per character
struct FixedRateEngine {
    voices: Vec<Voice>,
}

impl FixedRateEngine {
    fn new() -> Self {
        let voice = |id: &str, lang: &str, gender| {
            Voice::new(id.to_string(), id.to_uppercase(), vec![lang.to_string()], gender)
        };
        Self {
            voices: vec![
                voice("m0", "en-us", Gender::Male),
                voice("f0", "en-gb", Gender::Female),
                voice("m1", "en-gb", Gender::Male),
                voice("f1", "en-us", Gender::Female),
                voice("de", "de", Gender::Male),
            ],
        }
    }
}

impl SpeechSynthesizer for FixedRateEngine {
    fn voices(&self) -> ColloquyResult<Vec<Voice>> {
        Ok(self.voices.clone())
    }

    fn synthesize(&self, voice: &Voice, text: &str) -> ColloquyResult<Clip> {
        let level = if voice.gender == Gender::Female { 0.2 } else { 0.1 };
        Clip::from_samples(vec![level; text.len() * 10], 1000)
    }
}

/// Engine failing on any text containing "boom"
struct FlakyEngine(FixedRateEngine);

impl SpeechSynthesizer for FlakyEngine {
    fn voices(&self) -> ColloquyResult<Vec<Voice>> {
        self.0.voices()
    }

    fn synthesize(&self, voice: &Voice, text: &str) -> ColloquyResult<Clip> {
        if text.contains("boom") {
            return Err(ColloquyError::synthesis(format!("voice {} crashed", voice.id)));
        }
        self.0.synthesize(voice, text)
    }
}

const PARTICIPANTS: &str = "name,type,gender\nAnna,AGENT,FEMALE\nBen,CLIENT,MALE\nBot,BOT,ROBOT\n";

fn settings() -> ComposerSettings {
    ComposerSettings {
        sample_rate: 1000,
        ..ComposerSettings::default()
    }
}

fn script(conversation: &str) -> Script {
    Script::from_readers(conversation.as_bytes(), PARTICIPANTS.as_bytes()).expect("valid script")
}

fn spans(segments: &[Segment]) -> Vec<(u64, u64)> {
    segments.iter().map(|s| (s.start_ms, s.end_ms)).collect()
}

// Texts of 100 and 50 characters give 1000 ms and 500 ms clips
#[rstest]
#[case::implicit_gaps("Anna,{a},\nBen,{b},\n", &[(300, 1300), (1600, 2100)])]
#[case::explicit_delays("Anna,{a},0\nBen,{b},2.0\n", &[(300, 1300), (3600, 4100)])]
#[case::overlay("Anna,{a},\nBen,{c},-0.5\n", &[(300, 1300), (800, 1100)])]
fn test_compose_scenarios(#[case] rows: &str, #[case] expected: &[(u64, u64)]) {
    let rows = rows
        .replace("{a}", &"a".repeat(100))
        .replace("{b}", &"b".repeat(50))
        .replace("{c}", &"c".repeat(30));
    let script = script(&format!("name,text,delay\n{rows}"));

    let composition = Composer::new(FixedRateEngine::new(), settings())
        .compose(&script, 42)
        .expect("composition succeeds");

    assert_eq!(spans(&composition.segments), expected);
    let end = expected.iter().map(|&(_, e)| e).max().unwrap_or(0);
    assert_eq!(composition.track.duration_ms(), end);
}

#[test]
fn test_overlay_mixes_onto_earlier_speech() {
    let script = script(&format!(
        "name,text,delay\nAnna,{},\nBen,{},-0.5\n",
        "a".repeat(100),
        "c".repeat(30)
    ));
    let composition = Composer::new(FixedRateEngine::new(), settings())
        .compose(&script, 42)
        .unwrap();

    let samples = composition.track.samples();
    assert!((samples[500] - 0.2).abs() < 1e-6);
    assert!((samples[900] - 0.3).abs() < 1e-6);
}

#[test]
fn test_same_seed_same_output() {
    let conversation = "name,text,delay\nAnna,Hello there,\nBen,Hi,0.25\nBot,Beep boop,-0.1\nBen,Bye,\n";
    let run = |seed| {
        Composer::new(FixedRateEngine::new(), settings())
            .compose(&script(conversation), seed)
            .unwrap()
    };

    let first = run(1234);
    let second = run(1234);
    assert_eq!(first.assignments, second.assignments);
    assert_eq!(first.segments, second.segments);
    assert_eq!(first.track.samples(), second.track.samples());
}

#[test]
fn test_voice_rotation_uses_speaker_index_and_offset() {
    let engine = FixedRateEngine::new();
    let pool = VoicePool::partition(&engine.voices().unwrap(), "en").unwrap();

    // Two English male voices; the German one is filtered out
    assert_eq!(pool.bucket(Gender::Male).len(), 2);
    let voice = pool.resolve(Gender::Male, 1, RunOffset::new(3)).unwrap();
    assert_eq!(voice.id, "m0");

    // No "other" voices for English, so the bucket falls back to every voice
    assert_eq!(pool.bucket(Gender::Other).len(), 5);
    let voice = pool.resolve(Gender::Other, 2, RunOffset::new(7)).unwrap();
    assert_eq!(voice.id, "de");
}

#[test]
fn test_synthesis_failure_aborts_run() {
    let script = script("name,text,delay\nAnna,fine,\nBen,boom,\nAnna,never reached,\n");
    let err = Composer::new(FlakyEngine(FixedRateEngine::new()), settings())
        .compose(&script, 42)
        .unwrap_err();
    assert!(matches!(err, ColloquyError::SynthesisError { .. }));
}

#[tokio::test]
async fn test_end_to_end_outputs() {
    let dir = TempDir::new().unwrap();
    let script = script("name,text,delay\nAnna,Thanks for calling,\nBot,Please hold,1\nBen,Sure,-0.2\n");

    // The writer needs at least 8 kHz; clips are resampled on placement
    let settings = ComposerSettings {
        sample_rate: 8000,
        ..ComposerSettings::default()
    };
    let composition = Composer::new(FixedRateEngine::new(), settings)
        .compose(&script, 42)
        .unwrap();

    let audio_path = dir.path().join("call.wav");
    AudioWriter::new()
        .write_file(&composition.track, &audio_path, AudioFormat::Wav)
        .await
        .unwrap();
    let reader = hound::WavReader::open(&audio_path).unwrap();
    assert_eq!(reader.spec().sample_rate, 8000);
    assert_eq!(reader.len() as usize, composition.track.len());

    let mp3_path = dir.path().join("call.mp3");
    AudioWriter::new()
        .write_file_auto(&composition.track, &mp3_path)
        .await
        .unwrap();
    assert!(std::fs::metadata(&mp3_path).unwrap().len() > 0);

    let manifest = Manifest::build("call", &script, &composition.segments).unwrap();
    assert_eq!(manifest.segments.len(), 3);
    assert_eq!(manifest.duration, composition.segments[2].end_ms);
    assert_eq!(manifest.participants[2].gender, "MALE");
    assert!(manifest.participants[2].is_bot);

    let payload = Payload::for_manifest(&manifest, DEFAULT_PROJECT_NAME).unwrap();
    let json_path = dir.path().join("call.json");
    tokio::fs::write(&json_path, to_pretty_json(&payload).unwrap())
        .await
        .unwrap();

    let text = std::fs::read_to_string(&json_path).unwrap();
    assert!(text.starts_with("{\n    \"responseLevel\": \"FULL\""));
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(value["records"][0]["NATURAL_ID"], "Audio;call");
}

#[tokio::test]
async fn test_empty_script_still_writes_outputs() {
    let dir = TempDir::new().unwrap();
    let script = script("name,text,delay\n");
    assert!(script.utterances.is_empty());

    let settings = ComposerSettings {
        sample_rate: 8000,
        ..ComposerSettings::default()
    };
    let composition = Composer::new(FixedRateEngine::new(), settings)
        .compose(&script, 42)
        .unwrap();
    assert!(composition.segments.is_empty());
    assert!(composition.track.is_empty());

    let writer = AudioWriter::new();
    for format in [AudioFormat::Mp3, AudioFormat::Wav] {
        let path = dir.path().join(format!("empty.{}", format.extension()));
        writer
            .write_file(&composition.track, &path, format)
            .await
            .unwrap();
        assert!(path.exists());
    }

    let manifest = Manifest::build("empty", &script, &composition.segments).unwrap();
    assert_eq!(manifest.duration, 0);
    assert!(manifest.segments.is_empty());
    let payload = Payload::for_manifest(&manifest, DEFAULT_PROJECT_NAME).unwrap();
    let value: serde_json::Value = serde_json::from_str(&to_pretty_json(&payload).unwrap()).unwrap();
    let embedded = value["records"][0]["cool_rich_verbatim"].as_str().unwrap();
    let embedded: serde_json::Value = serde_json::from_str(embedded).unwrap();
    assert_eq!(embedded["duration"], 0);
}
