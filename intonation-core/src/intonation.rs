//! # Intonation Comparison Module
//!
//! Compares the learner's pitch against the reference recording's pitch
//! curve, once the live time has been mapped onto the reference timeline.
//!
//! ## Features
//! - Reference pitch curve with interpolation between voiced points
//! - Cent and semitone conversions

use serde::{Deserialize, Serialize};

/// Reference points further apart than this are not bridged by
/// interpolation.
pub const MAX_BRIDGE_SECS: f64 = 0.1;

/// One sample of the reference pitch track. `frequency_hz` is 0 where the
/// reference is unvoiced.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    pub time: f64,
    pub frequency_hz: f32,
}

/// The reference recording's pitch track, sorted by time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReferenceCurve {
    points: Vec<CurvePoint>,
}

impl ReferenceCurve {
    /// Builds a curve, sorting by time and dropping non-finite points.
    pub fn new(mut points: Vec<CurvePoint>) -> Self {
        points.retain(|p| p.time.is_finite() && p.frequency_hz.is_finite());
        points.sort_by(|a, b| a.time.partial_cmp(&b.time).unwrap_or(std::cmp::Ordering::Equal));
        Self { points }
    }

    pub fn points(&self) -> &[CurvePoint] {
        &self.points
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Reference F0 at `time`.
    ///
    /// Interpolates linearly between the two surrounding points when both are
    /// voiced and no more than [`MAX_BRIDGE_SECS`] apart. An exact hit on a
    /// voiced point returns it. Returns `None` inside unvoiced stretches and
    /// outside the curve.
    pub fn frequency_at(&self, time: f64) -> Option<f32> {
        let idx = self.points.partition_point(|p| p.time < time);
        if let Some(p) = self.points.get(idx) {
            if p.time == time {
                return (p.frequency_hz > 0.0).then_some(p.frequency_hz);
            }
        }
        if idx == 0 || idx >= self.points.len() {
            return None;
        }
        let a = self.points[idx - 1];
        let b = self.points[idx];
        if a.frequency_hz <= 0.0 || b.frequency_hz <= 0.0 || b.time - a.time > MAX_BRIDGE_SECS {
            return None;
        }
        let frac = ((time - a.time) / (b.time - a.time)) as f32;
        Some(a.frequency_hz + frac * (b.frequency_hz - a.frequency_hz))
    }
}

/// Calculates the deviation from a target frequency in cents.
///
/// - 100 cents = 1 semitone
/// - 1200 cents = 1 octave
/// - Positive values mean the live voice is higher than the reference
pub fn calculate_cents_deviation(freq: f32, target_freq: f32) -> f32 {
    1200.0 * (freq / target_freq).log2()
}

/// Interval between two frequencies in semitones.
pub fn semitones_between(low: f32, high: f32) -> f32 {
    12.0 * (high / low).log2()
}

/// Cents deviation when both frequencies are positive.
pub fn compare(live_hz: f32, reference_hz: f32) -> Option<f32> {
    (live_hz > 0.0 && reference_hz > 0.0).then(|| calculate_cents_deviation(live_hz, reference_hz))
}
