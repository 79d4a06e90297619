//! Timeline assembly: merges synthesized clips into one track.
//!
//! Every clip is placed according to its delay:
//!
//! - no delay: a fixed gap of silence, then the clip
//! - delay `d >= 0`: the gap plus `d` of silence, then the clip
//! - delay `d < 0`: the clip is mixed onto audio already in the track,
//!   starting `|d|` before the cursor but never before the previous
//!   segment's start
//!
//! All offsets are integer milliseconds. The cursor never moves backward and
//! the finished track lasts exactly as long as the final cursor. Delay
//! magnitudes above [`MAX_DELAY_MS`] are clamped to it.

use crate::clip::{ms_to_samples, Clip, Track};
use crate::error::ColloquyResult;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Signed inter-utterance delay in milliseconds
pub type DelayMs = i64;

/// Silence inserted before every serially placed clip
pub const DEFAULT_GAP_MS: u64 = 300;

/// Largest delay magnitude honored, one hour
pub const MAX_DELAY_MS: u64 = 3_600_000;

/// Placement of one clip on the finished track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Segment {
    /// Start offset in milliseconds
    pub start_ms: u64,
    /// End offset in milliseconds
    pub end_ms: u64,
}

impl Segment {
    /// Create a segment
    #[must_use]
    pub const fn new(start_ms: u64, end_ms: u64) -> Self {
        Self { start_ms, end_ms }
    }

    /// Length in milliseconds
    #[must_use]
    pub const fn duration_ms(&self) -> u64 {
        self.end_ms - self.start_ms
    }
}

/// How a clip is placed relative to the cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Regime {
    /// Silence of `gap + extra_ms`, then the clip
    Serial { extra_ms: u64 },
    /// Mixed in, reaching `back_ms` behind the cursor
    Overlay { back_ms: u64 },
}

impl Regime {
    fn of(delay: Option<DelayMs>) -> Self {
        let Some(d) = delay else {
            return Self::Serial { extra_ms: 0 };
        };

        let magnitude = d.unsigned_abs();
        if magnitude > MAX_DELAY_MS {
            warn!("Delay of {} ms clamped to {} ms", d, MAX_DELAY_MS);
        }
        let magnitude = magnitude.min(MAX_DELAY_MS);

        if d >= 0 {
            Self::Serial {
                extra_ms: magnitude,
            }
        } else {
            Self::Overlay { back_ms: magnitude }
        }
    }
}

/// Merge state for a single composition run
#[derive(Debug)]
pub struct Timeline {
    gap_ms: u64,
    cursor_ms: u64,
    track: Track,
    segments: Vec<Segment>,
}

impl Timeline {
    /// Create an empty timeline rendering at `sample_rate`
    #[must_use]
    pub const fn new(sample_rate: u32, gap_ms: u64) -> Self {
        Self {
            gap_ms,
            cursor_ms: 0,
            track: Track::new(sample_rate),
            segments: Vec::new(),
        }
    }

    /// Current cursor in milliseconds
    #[must_use]
    pub const fn cursor_ms(&self) -> u64 {
        self.cursor_ms
    }

    /// Segments placed so far, in input order
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Place the next clip and return its segment.
    ///
    /// A negative delay on the very first clip has no previous segment to
    /// clamp against and is clamped to the start of the track instead.
    ///
    /// # Errors
    ///
    /// Returns an error if the clip cannot be resampled to the track rate.
    pub fn place(&mut self, clip: Clip, delay: Option<DelayMs>) -> ColloquyResult<Segment> {
        let clip = clip.resampled(self.track.sample_rate())?;
        let duration = clip.duration_ms();

        let segment = match Regime::of(delay) {
            Regime::Serial { extra_ms } => {
                let start = self.cursor_ms + self.gap_ms + extra_ms;
                let segment = Segment::new(start, start + duration);
                self.cursor_ms = segment.end_ms;
                segment
            }
            Regime::Overlay { back_ms } => {
                let floor = self.segments.last().map_or(0, |prev| prev.start_ms);
                let start = self.cursor_ms.saturating_sub(back_ms).max(floor);
                let segment = Segment::new(start, start + duration);
                self.cursor_ms = self.cursor_ms.max(segment.end_ms);
                segment
            }
        };

        self.track
            .mix_at(ms_to_samples(segment.start_ms, self.track.sample_rate()), clip.samples());
        self.track.extend_to_ms(self.cursor_ms);

        debug!(
            "Placed clip {} at {}..{} ms (delay: {:?}, cursor: {} ms)",
            self.segments.len(),
            segment.start_ms,
            segment.end_ms,
            delay,
            self.cursor_ms
        );

        self.segments.push(segment);
        Ok(segment)
    }

    /// Finish the run, trimming the track to the final cursor
    #[must_use]
    pub fn finish(mut self) -> (Track, Vec<Segment>) {
        self.track.set_duration_ms(self.cursor_ms);
        (self.track, self.segments)
    }
}

/// Merge clips in order into one track plus one segment per clip.
///
/// # Errors
///
/// Returns an error if a clip cannot be resampled to `sample_rate`.
pub fn merge<I>(clips: I, gap_ms: u64, sample_rate: u32) -> ColloquyResult<(Track, Vec<Segment>)>
where
    I: IntoIterator<Item = (Clip, Option<DelayMs>)>,
{
    let mut timeline = Timeline::new(sample_rate, gap_ms);
    for (clip, delay) in clips {
        timeline.place(clip, delay)?;
    }
    Ok(timeline.finish())
}
