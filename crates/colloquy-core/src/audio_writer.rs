//! Audio file writing for composed tracks.

use crate::clip::Track;
use crate::error::{ColloquyError, ColloquyResult};
use mp3lame_encoder::{
    max_required_buffer_size, Bitrate, Builder, DualPcm, FlushNoGap, MonoPcm, Quality,
};
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, info, warn};

/// Supported audio output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AudioFormat {
    /// WAV format (uncompressed)
    Wav,
    /// MP3 format (lossy compression)
    Mp3,
}

impl AudioFormat {
    /// Get file extension for the format
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Wav => "wav",
            Self::Mp3 => "mp3",
        }
    }

    /// Get MIME type for the format
    #[must_use]
    pub const fn mime_type(self) -> &'static str {
        match self {
            Self::Wav => "audio/wav",
            Self::Mp3 => "audio/mpeg",
        }
    }

    /// Detect format from file extension
    ///
    /// # Errors
    ///
    /// Returns an error if the extension is not supported
    pub fn from_extension(extension: &str) -> ColloquyResult<Self> {
        match extension.to_lowercase().as_str() {
            "wav" => Ok(Self::Wav),
            "mp3" => Ok(Self::Mp3),
            _ => Err(ColloquyError::invalid_input(format!(
                "Unsupported audio format: {extension}"
            ))),
        }
    }

    /// Detect format from file path
    ///
    /// # Errors
    ///
    /// Returns an error if the file has no extension or unsupported extension
    pub fn from_path<P: AsRef<Path>>(path: P) -> ColloquyResult<Self> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .ok_or_else(|| {
                ColloquyError::invalid_input(format!(
                    "No file extension found in path: {}",
                    path.display()
                ))
            })?;

        Self::from_extension(extension)
    }
}

impl std::fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.extension().to_uppercase())
    }
}

/// Audio encoding settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodingSettings {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of output channels; mono audio is duplicated across them
    pub channels: u16,
    /// Bit depth for WAV output
    pub bit_depth: u16,
    /// Constant bitrate for MP3 output
    pub bitrate_kbps: u32,
}

impl Default for EncodingSettings {
    fn default() -> Self {
        Self {
            sample_rate: crate::DEFAULT_SAMPLE_RATE,
            channels: 1,
            bit_depth: 16,
            bitrate_kbps: 128,
        }
    }
}

impl EncodingSettings {
    /// Create new encoding settings
    #[must_use]
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
            ..Default::default()
        }
    }

    /// Set bit depth for WAV output
    #[must_use]
    pub const fn with_bit_depth(mut self, bit_depth: u16) -> Self {
        self.bit_depth = bit_depth;
        self
    }

    /// Set bitrate for MP3 output
    #[must_use]
    pub const fn with_bitrate(mut self, bitrate_kbps: u32) -> Self {
        self.bitrate_kbps = bitrate_kbps;
        self
    }

    /// Validate encoding settings
    ///
    /// # Errors
    ///
    /// Returns an invalid-input error naming the first bad setting.
    pub fn validate(&self) -> ColloquyResult<()> {
        if self.sample_rate < 8000 || self.sample_rate > 192_000 {
            return Err(ColloquyError::invalid_input(format!(
                "Sample rate must be between 8000 and 192000 Hz, got {}",
                self.sample_rate
            )));
        }

        if !matches!(self.channels, 1 | 2) {
            return Err(ColloquyError::invalid_input(format!(
                "Channels must be 1 or 2, got {}",
                self.channels
            )));
        }

        if !matches!(self.bit_depth, 16 | 24 | 32) {
            return Err(ColloquyError::invalid_input(format!(
                "Bit depth must be 16, 24, or 32, got {}",
                self.bit_depth
            )));
        }

        lame_bitrate(self.bitrate_kbps)?;
        Ok(())
    }
}

fn lame_bitrate(kbps: u32) -> ColloquyResult<Bitrate> {
    Ok(match kbps {
        8 => Bitrate::Kbps8,
        16 => Bitrate::Kbps16,
        24 => Bitrate::Kbps24,
        32 => Bitrate::Kbps32,
        40 => Bitrate::Kbps40,
        48 => Bitrate::Kbps48,
        64 => Bitrate::Kbps64,
        80 => Bitrate::Kbps80,
        96 => Bitrate::Kbps96,
        112 => Bitrate::Kbps112,
        128 => Bitrate::Kbps128,
        160 => Bitrate::Kbps160,
        192 => Bitrate::Kbps192,
        224 => Bitrate::Kbps224,
        256 => Bitrate::Kbps256,
        320 => Bitrate::Kbps320,
        other => {
            return Err(ColloquyError::invalid_input(format!(
                "Unsupported MP3 bitrate: {other} kbps"
            )))
        }
    })
}

/// Upper bound of bytes LAME emits when flushing
const MP3_FLUSH_BYTES: usize = 7200;

fn to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16
}

/// Writes composed tracks to disk
#[derive(Debug, Default)]
pub struct AudioWriter {
    settings: EncodingSettings,
}

impl AudioWriter {
    /// Create a new audio writer with default settings
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new audio writer with custom settings
    #[must_use]
    pub const fn with_settings(settings: EncodingSettings) -> Self {
        Self { settings }
    }

    /// Encode `track` into an in-memory file.
    ///
    /// The track's own sample rate is used; samples are clamped to [-1, 1].
    /// An empty track gives a header-only WAV or a frame-less MP3.
    ///
    /// # Errors
    ///
    /// Returns an error if the track holds non-finite samples, the settings
    /// are invalid or the encoder fails.
    pub fn encode(&self, track: &Track, format: AudioFormat) -> ColloquyResult<Vec<u8>> {
        let settings = EncodingSettings {
            sample_rate: track.sample_rate(),
            ..self.settings.clone()
        };
        Self::validate_inputs(track.samples(), &settings)?;

        match format {
            AudioFormat::Wav => Self::encode_wav(track.samples(), &settings),
            AudioFormat::Mp3 => Self::encode_mp3(track.samples(), &settings),
        }
    }

    /// Write `track` to `path` in `format`
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails or the file cannot be written.
    pub async fn write_file<P: AsRef<Path>>(
        &self,
        track: &Track,
        path: P,
        format: AudioFormat,
    ) -> ColloquyResult<()> {
        let path = path.as_ref();
        info!(
            "Writing {} samples to {} in {} format",
            track.len(),
            path.display(),
            format
        );

        let bytes = self.encode(track, format)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                ColloquyError::file(format!("Failed to create directory {}: {e}", parent.display()))
            })?;
        }

        tokio::fs::write(path, &bytes).await.map_err(|e| {
            ColloquyError::file(format!("Failed to write {}: {e}", path.display()))
        })?;

        info!("Successfully wrote audio file: {} ({} bytes)", path.display(), bytes.len());
        Ok(())
    }

    /// Write audio data to file, auto-detecting format from extension
    ///
    /// # Errors
    ///
    /// Returns an error if the format cannot be detected or writing fails
    pub async fn write_file_auto<P: AsRef<Path>>(&self, track: &Track, path: P) -> ColloquyResult<()> {
        let format = AudioFormat::from_path(&path)?;
        self.write_file(track, path, format).await
    }

    fn validate_inputs(samples: &[f32], settings: &EncodingSettings) -> ColloquyResult<()> {
        if samples.is_empty() {
            debug!("Encoding an empty track");
        }

        if let Some((i, sample)) = samples.iter().enumerate().find(|(_, s)| !s.is_finite()) {
            return Err(ColloquyError::invalid_input(format!(
                "Invalid audio sample at index {i}: {sample}"
            )));
        }

        let clipped = samples.iter().filter(|s| s.abs() > 1.0).count();
        if clipped > 0 {
            warn!("{} samples exceed [-1.0, 1.0] and will be clipped", clipped);
        }

        settings.validate()
    }

    fn encode_wav(samples: &[f32], settings: &EncodingSettings) -> ColloquyResult<Vec<u8>> {
        let spec = hound::WavSpec {
            channels: settings.channels,
            sample_rate: settings.sample_rate,
            bits_per_sample: settings.bit_depth,
            sample_format: hound::SampleFormat::Int,
        };
        let scale = 2f64.powi(i32::from(settings.bit_depth) - 1) - 1.0;

        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
            for &sample in samples {
                let value = (f64::from(sample.clamp(-1.0, 1.0)) * scale) as i32;
                for _ in 0..settings.channels {
                    writer.write_sample(value)?;
                }
            }
            writer.finalize()?;
        }

        debug!("Encoded {} samples as {}-bit WAV", samples.len(), settings.bit_depth);
        Ok(cursor.into_inner())
    }

    fn encode_mp3(samples: &[f32], settings: &EncodingSettings) -> ColloquyResult<Vec<u8>> {
        let lame_error = |what: &str, e: &dyn std::fmt::Debug| {
            ColloquyError::audio_processing(format!("MP3 encoder {what} failed: {e:?}"))
        };

        let mut builder = Builder::new()
            .ok_or_else(|| ColloquyError::audio_processing("Failed to create MP3 encoder"))?;
        builder
            .set_num_channels(settings.channels as u8)
            .map_err(|e| lame_error("channel setup", &e))?;
        builder
            .set_sample_rate(settings.sample_rate)
            .map_err(|e| lame_error("sample rate setup", &e))?;
        builder
            .set_brate(lame_bitrate(settings.bitrate_kbps)?)
            .map_err(|e| lame_error("bitrate setup", &e))?;
        builder
            .set_quality(Quality::Good)
            .map_err(|e| lame_error("quality setup", &e))?;
        let mut encoder = builder.build().map_err(|e| lame_error("init", &e))?;

        let pcm: Vec<i16> = samples.iter().copied().map(to_i16).collect();

        // LAME writes into the spare capacity, so it must be reserved up front
        let mut out = Vec::with_capacity(max_required_buffer_size(pcm.len()));
        if pcm.is_empty() {
            debug!("No samples to encode, flushing only");
        } else if settings.channels == 1 {
            encoder
                .encode_to_vec(MonoPcm(&pcm), &mut out)
                .map_err(|e| lame_error("encode", &e))?;
        } else {
            encoder
                .encode_to_vec(
                    DualPcm {
                        left: &pcm,
                        right: &pcm,
                    },
                    &mut out,
                )
                .map_err(|e| lame_error("encode", &e))?;
        }

        out.reserve(MP3_FLUSH_BYTES);
        encoder
            .flush_to_vec::<FlushNoGap>(&mut out)
            .map_err(|e| lame_error("flush", &e))?;

        debug!(
            "Encoded {} samples as {} kbps MP3 ({} bytes)",
            samples.len(),
            settings.bitrate_kbps,
            out.len()
        );
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn tone(ms: u64) -> Track {
        let mut track = Track::new(22_050);
        let samples: Vec<f32> = (0..ms * 22)
            .map(|i| (i as f32 * 0.05).sin() * 0.5)
            .collect();
        track.mix_at(0, &samples);
        track
    }

    #[test]
    fn test_audio_format_extension_and_mime() {
        assert_eq!(AudioFormat::Wav.extension(), "wav");
        assert_eq!(AudioFormat::Mp3.extension(), "mp3");
        assert_eq!(AudioFormat::Wav.mime_type(), "audio/wav");
        assert_eq!(AudioFormat::Mp3.mime_type(), "audio/mpeg");
        assert_eq!(AudioFormat::Mp3.to_string(), "MP3");
    }

    #[test]
    fn test_audio_format_from_path() {
        assert_eq!(AudioFormat::from_path("call.WAV").unwrap(), AudioFormat::Wav);
        assert_eq!(AudioFormat::from_path("/tmp/out/call.mp3").unwrap(), AudioFormat::Mp3);
        assert!(AudioFormat::from_path("no_extension").is_err());
        assert!(AudioFormat::from_path("file.flac").is_err());
    }

    #[test]
    fn test_encoding_settings_validation() {
        assert!(EncodingSettings::default().validate().is_ok());
        assert!(EncodingSettings::new(4000, 1).validate().is_err());
        assert!(EncodingSettings::new(22_050, 3).validate().is_err());
        assert!(EncodingSettings::default().with_bit_depth(8).validate().is_err());
        assert!(EncodingSettings::default().with_bitrate(0).validate().is_err());
        assert!(EncodingSettings::default().with_bitrate(320).validate().is_ok());
    }

    #[test]
    fn test_encode_rejects_non_finite() {
        let mut track = Track::new(22_050);
        track.mix_at(0, &[0.0, f32::NAN]);
        let err = AudioWriter::new().encode(&track, AudioFormat::Wav).unwrap_err();
        assert!(matches!(err, ColloquyError::InvalidInput { .. }));
    }

    #[test]
    fn test_encode_empty_track() {
        let writer = AudioWriter::new();
        let bytes = writer.encode(&Track::new(22_050), AudioFormat::Wav).unwrap();
        let reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
        assert_eq!(reader.len(), 0);
        assert_eq!(reader.spec().sample_rate, 22_050);

        assert!(writer.encode(&Track::new(22_050), AudioFormat::Mp3).is_ok());
    }

    #[test]
    fn test_encode_wav_roundtrips_through_hound() {
        let track = tone(100);
        let bytes = AudioWriter::with_settings(EncodingSettings::default().with_bit_depth(24))
            .encode(&track, AudioFormat::Wav)
            .unwrap();

        let reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
        assert_eq!(reader.spec().sample_rate, 22_050);
        assert_eq!(reader.spec().bits_per_sample, 24);
        assert_eq!(reader.len() as usize, track.len());
    }

    #[test]
    fn test_encode_wav_clamps_loud_samples() {
        let mut track = Track::new(8000);
        track.mix_at(0, &[2.0, -2.0]);
        let bytes = AudioWriter::new().encode(&track, AudioFormat::Wav).unwrap();
        let mut reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
        let samples: Vec<i16> = reader.samples::<i16>().map(Result::unwrap).collect();
        assert_eq!(samples, vec![i16::MAX, -i16::MAX]);
    }

    #[test]
    fn test_encode_mp3_produces_frames() {
        let bytes = AudioWriter::new().encode(&tone(500), AudioFormat::Mp3).unwrap();
        assert!(bytes.len() > 1000);
    }

    #[test]
    fn test_encode_mp3_stereo_and_other_rates() {
        let stereo = AudioWriter::with_settings(EncodingSettings::new(22_050, 2));
        assert!(!stereo.encode(&tone(500), AudioFormat::Mp3).unwrap().is_empty());

        let mut track = Track::new(44_100);
        let samples: Vec<f32> = (0..44_100).map(|i| (i as f32 * 0.02).sin() * 0.4).collect();
        track.mix_at(0, &samples);
        let bytes = AudioWriter::new().encode(&track, AudioFormat::Mp3).unwrap();
        assert!(bytes.len() > 1000);
    }

    #[tokio::test]
    async fn test_write_file_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("call.wav");

        AudioWriter::new().write_file_auto(&tone(50), &path).await.unwrap();
        assert!(path.exists());
        assert!(std::fs::metadata(&path).unwrap().len() > 44);
    }
}
