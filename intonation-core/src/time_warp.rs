//! # Time-Warp Mapper
//!
//! Maps a live timestamp onto the reference timeline. The n-th closed voice
//! segment is paired with the n-th reference syllable:
//! - inside a closed segment, the relative position within that segment is
//!   carried into its syllable;
//! - inside the open segment, elapsed time is measured against the current
//!   syllable's duration, allowing an overrun up to the configured cap;
//! - between segments, the gap is interpolated between the two syllables;
//! - before the first segment or past the last syllable, live time is scaled
//!   by the tempo ratio learned from the paired segments.
//!
//! With an empty reference the mapping is the identity.

use linreg::linear_regression;
use tracing::{debug, warn};

use crate::{ReferenceSyllable, VoiceSegment};

/// Orders and clamps caller-supplied syllables so that every syllable
/// starts at or after the previous end and has a non-negative duration.
/// Returns the cleaned list and how many syllables had to be adjusted.
pub fn sanitize_syllables(input: Vec<ReferenceSyllable>) -> (Vec<ReferenceSyllable>, usize) {
    let mut adjusted = 0;
    let mut prev_end = f64::NEG_INFINITY;
    let mut out = Vec::with_capacity(input.len());
    for mut syl in input {
        let original = (syl.start, syl.end);
        if !syl.start.is_finite() {
            syl.start = if prev_end.is_finite() { prev_end } else { 0.0 };
        }
        syl.start = syl.start.max(prev_end);
        if !syl.end.is_finite() || syl.end < syl.start {
            syl.end = syl.start;
        }
        if (syl.start, syl.end) != original {
            adjusted += 1;
        }
        prev_end = syl.end;
        out.push(syl);
    }
    (out, adjusted)
}

#[derive(Debug, Clone)]
pub struct TimeWarpMapper {
    syllables: Vec<ReferenceSyllable>,
    completed: Vec<VoiceSegment>,
    open_start: Option<f64>,
    /// Index of the syllable the learner is currently on.
    current: usize,
    overrun_cap: f64,
    tempo: f64,
    live_marks: Vec<f64>,
    reference_marks: Vec<f64>,
}

impl TimeWarpMapper {
    pub fn new(overrun_cap: f64) -> Self {
        Self {
            syllables: Vec::new(),
            completed: Vec::new(),
            open_start: None,
            current: 0,
            overrun_cap,
            tempo: 1.0,
            live_marks: Vec::new(),
            reference_marks: Vec::new(),
        }
    }

    /// Replaces the alignment target and resets the pointer and all pairing.
    pub fn set_reference(&mut self, syllables: Vec<ReferenceSyllable>) {
        let (syllables, adjusted) = sanitize_syllables(syllables);
        if adjusted > 0 {
            warn!(adjusted, total = syllables.len(), "reference syllables clamped to a monotonic, non-overlapping list");
        }
        self.syllables = syllables;
        self.reset();
    }

    /// Clears per-session pairing; keeps the reference.
    pub fn reset(&mut self) {
        self.completed.clear();
        self.open_start = None;
        self.current = 0;
        self.tempo = 1.0;
        self.live_marks.clear();
        self.reference_marks.clear();
    }

    pub fn is_active(&self) -> bool {
        !self.syllables.is_empty()
    }

    pub fn syllables(&self) -> &[ReferenceSyllable] {
        &self.syllables
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current_syllable(&self) -> Option<&ReferenceSyllable> {
        self.syllables.get(self.current)
    }

    /// Reference seconds per live second, learned from paired segments.
    pub fn tempo_ratio(&self) -> f64 {
        self.tempo
    }

    pub fn open_segment(&mut self, start: f64) {
        self.open_start = Some(start);
    }

    /// Records a completed segment and advances the syllable pointer.
    pub fn close_segment(&mut self, segment: VoiceSegment) {
        let Some(end) = segment.end else {
            return;
        };
        let index = self.completed.len();
        self.completed.push(segment);
        self.open_start = None;

        if let Some(syl) = self.syllables.get(index) {
            self.live_marks.extend([segment.start, end]);
            self.reference_marks.extend([syl.start, syl.end]);
            self.tempo = self.fit_tempo();
            debug!(index, label = %syl.label, tempo = self.tempo, "syllable completed");
        }
        self.current = (self.current + 1).min(self.syllables.len());
    }

    fn fit_tempo(&self) -> f64 {
        if let Ok((slope, _intercept)) =
            linear_regression::<_, _, f64>(&self.live_marks, &self.reference_marks)
        {
            if slope.is_finite() && slope > 0.0 {
                return slope;
            }
        }
        let live: f64 = self.live_marks.chunks(2).map(|m| m[1] - m[0]).sum();
        let reference: f64 = self.reference_marks.chunks(2).map(|m| m[1] - m[0]).sum();
        if live > 0.0 && reference > 0.0 {
            reference / live
        } else {
            1.0
        }
    }

    /// Maps a live timestamp to the reference timeline.
    pub fn map(&self, t: f64) -> f64 {
        if self.syllables.is_empty() {
            return t;
        }

        if let Some(open_start) = self.open_start.filter(|&s| t >= s) {
            let index = self.completed.len();
            return match self.syllables.get(index) {
                Some(syl) => self.within_open(syl, t - open_start),
                None => self.after_last(t),
            };
        }

        let preceding = self.completed.partition_point(|s| s.start <= t);
        if preceding == 0 {
            return self.lead_in(t);
        }
        let k = preceding - 1;
        let Some(syl) = self.syllables.get(k) else {
            return self.after_last(t);
        };
        let segment = self.completed[k];
        let end = segment.end.unwrap_or(segment.start);

        if t <= end {
            let live_duration = end - segment.start;
            let rel = if live_duration > 0.0 {
                ((t - segment.start) / live_duration).clamp(0.0, 1.0)
            } else {
                0.0
            };
            return syl.start + rel * syl.duration();
        }

        let Some(next) = self.syllables.get(k + 1) else {
            return self.after_last(t);
        };
        let next_start = self
            .completed
            .get(k + 1)
            .map(|s| s.start)
            .or(self.open_start);
        match next_start {
            Some(next_live) if next_live > end => {
                let frac = ((t - end) / (next_live - end)).clamp(0.0, 1.0);
                syl.end + frac * (next.start - syl.end)
            }
            _ => (syl.end + (t - end) * self.tempo).min(next.start),
        }
    }

    fn within_open(&self, syl: &ReferenceSyllable, elapsed: f64) -> f64 {
        let duration = syl.duration();
        if duration <= 0.0 {
            return syl.start;
        }
        let rel = (elapsed / duration).clamp(0.0, self.overrun_cap);
        syl.start + rel * duration
    }

    fn lead_in(&self, t: f64) -> f64 {
        let first_ref = self.syllables[0].start;
        let first_live = self
            .completed
            .first()
            .map(|s| s.start)
            .or(self.open_start);
        let t = t.max(0.0);
        match first_live {
            Some(live) if live > 0.0 => first_ref * (t / live).min(1.0),
            _ => (t * self.tempo).min(first_ref.max(0.0)),
        }
    }

    fn after_last(&self, t: f64) -> f64 {
        let last = self.syllables.len() - 1;
        let anchor_ref = self.syllables[last].end;
        let anchor_live = self
            .completed
            .get(last)
            .and_then(|s| s.end)
            .unwrap_or(t);
        anchor_ref + (t - anchor_live).max(0.0) * self.tempo
    }
}
