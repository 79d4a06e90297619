//! Audio buffers exchanged between the speech engine and the timeline.

use crate::error::{ColloquyError, ColloquyResult};
use rubato::{FftFixedIn, Resampler};

/// Audio data type - 32-bit floating point mono samples
pub type AudioData = Vec<f32>;

const RESAMPLE_CHUNK: usize = 1024;
const RESAMPLE_SUB_CHUNKS: usize = 2;

/// Convert a sample count to whole milliseconds, rounding to nearest
#[must_use]
pub fn samples_to_ms(samples: usize, sample_rate: u32) -> u64 {
    if sample_rate == 0 {
        return 0;
    }
    let rate = u128::from(sample_rate);
    ((samples as u128 * 1000 + rate / 2) / rate) as u64
}

/// Convert milliseconds to a sample count, rounding to nearest
#[must_use]
pub fn ms_to_samples(ms: u64, sample_rate: u32) -> usize {
    ((u128::from(ms) * u128::from(sample_rate) + 500) / 1000) as usize
}

/// One synthesized utterance
#[derive(Debug, Clone, PartialEq)]
pub struct Clip {
    samples: AudioData,
    sample_rate: u32,
    duration_ms: u64,
}

impl Clip {
    /// Wrap engine output, deriving the duration from the sample count
    ///
    /// # Errors
    ///
    /// Returns an error if the sample rate is zero.
    pub fn from_samples(samples: AudioData, sample_rate: u32) -> ColloquyResult<Self> {
        if sample_rate == 0 {
            return Err(ColloquyError::invalid_input("Clip sample rate must be non-zero"));
        }
        let duration_ms = samples_to_ms(samples.len(), sample_rate);
        Ok(Self {
            samples,
            sample_rate,
            duration_ms,
        })
    }

    /// A clip of silence lasting `duration_ms`
    #[must_use]
    pub fn silent(duration_ms: u64, sample_rate: u32) -> Self {
        Self {
            samples: vec![0.0; ms_to_samples(duration_ms, sample_rate)],
            sample_rate,
            duration_ms,
        }
    }

    /// Duration in milliseconds
    #[must_use]
    pub const fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    /// Sample rate in Hz
    #[must_use]
    pub const fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Raw samples
    #[must_use]
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Convert to `target_rate`, keeping the duration.
    ///
    /// # Errors
    ///
    /// Returns an error if either rate is zero or the resampler fails.
    pub fn resampled(self, target_rate: u32) -> ColloquyResult<Self> {
        if target_rate == self.sample_rate {
            return Ok(self);
        }
        let samples = resample_mono(&self.samples, self.sample_rate, target_rate)?;
        let duration_ms = samples_to_ms(samples.len(), target_rate);
        Ok(Self {
            samples,
            sample_rate: target_rate,
            duration_ms,
        })
    }
}

/// Resample mono PCM with rubato's FFT resampler.
///
/// The output holds exactly `round(len * to / from)` samples, aligned with
/// the input by dropping the resampler's delay.
///
/// # Errors
///
/// Returns an invalid-input error for a zero rate, or an audio processing
/// error if rubato rejects the rates or fails mid-stream.
pub fn resample_mono(input: &[f32], from: u32, to: u32) -> ColloquyResult<AudioData> {
    if from == 0 || to == 0 {
        return Err(ColloquyError::invalid_input(format!(
            "Cannot resample between {from} Hz and {to} Hz"
        )));
    }
    let from_rate = u128::from(from);
    let expected =
        ((input.len() as u128 * u128::from(to) + from_rate / 2) / from_rate) as usize;
    if input.is_empty() || expected == 0 {
        return Ok(Vec::new());
    }

    let mut resampler =
        FftFixedIn::<f32>::new(from as usize, to as usize, RESAMPLE_CHUNK, RESAMPLE_SUB_CHUNKS, 1)?;
    let delay = resampler.output_delay();
    let wanted = delay + expected;
    let mut out = Vec::with_capacity(wanted + resampler.output_frames_max());

    for chunk in input.chunks(RESAMPLE_CHUNK) {
        let frames = if chunk.len() == RESAMPLE_CHUNK {
            resampler.process(&[chunk][..], None)?
        } else {
            resampler.process_partial(Some(&[chunk][..]), None)?
        };
        out.extend_from_slice(&frames[0]);
    }

    // Flush the tail still held by the resampler
    while out.len() < wanted {
        let frames = resampler.process_partial::<&[f32]>(None, None)?;
        out.extend_from_slice(&frames[0]);
    }

    out.drain(..delay);
    out.truncate(expected);
    Ok(out)
}

/// The assembled output track
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    samples: AudioData,
    sample_rate: u32,
}

impl Track {
    /// Create an empty track
    #[must_use]
    pub const fn new(sample_rate: u32) -> Self {
        Self {
            samples: Vec::new(),
            sample_rate,
        }
    }

    /// Sample rate in Hz
    #[must_use]
    pub const fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Raw samples
    #[must_use]
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Length in samples
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the track holds no samples
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in milliseconds
    #[must_use]
    pub fn duration_ms(&self) -> u64 {
        samples_to_ms(self.samples.len(), self.sample_rate)
    }

    /// Sum `samples` onto the track starting at sample `offset`.
    ///
    /// The track grows with silence as needed, so writing past the end
    /// appends and writing inside existing audio overlays it.
    pub fn mix_at(&mut self, offset: usize, samples: &[f32]) {
        let end = offset + samples.len();
        if end > self.samples.len() {
            self.samples.resize(end, 0.0);
        }
        for (dst, &src) in self.samples[offset..end].iter_mut().zip(samples) {
            *dst += src;
        }
    }

    /// Pad with silence or cut so the track lasts exactly `ms`
    pub fn set_duration_ms(&mut self, ms: u64) {
        self.samples.resize(ms_to_samples(ms, self.sample_rate), 0.0);
    }

    /// Pad with silence so the track lasts at least `ms`
    pub fn extend_to_ms(&mut self, ms: u64) {
        let target = ms_to_samples(ms, self.sample_rate);
        if target > self.samples.len() {
            self.samples.resize(target, 0.0);
        }
    }
}
