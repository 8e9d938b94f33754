//! # Voice-Activity Segmenter
//!
//! Two-threshold hysteresis on frame energy. A segment opens when energy
//! rises above the onset level and only closes once energy falls below the
//! (lower) offset level after the segment has lasted the minimum duration.
//! Dips that stay between the two thresholds never split a segment.

use tracing::debug;

use crate::VoiceSegment;

/// Energy floor reported for silent frames, in dBFS.
pub const SILENCE_DB: f32 = -120.0;

/// RMS level of `samples` in dBFS, floored at [`SILENCE_DB`].
pub fn frame_energy_db(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return SILENCE_DB;
    }
    let mean = samples.iter().sum::<f32>() / samples.len() as f32;
    let power = samples.iter().map(|&s| (s - mean) * (s - mean)).sum::<f32>() / samples.len() as f32;
    if power <= 0.0 {
        return SILENCE_DB;
    }
    (10.0 * power.log10()).max(SILENCE_DB)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VadState {
    Silent,
    Voiced,
}

/// A change in the segment list caused by one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SegmentEvent {
    /// A new segment started at this time.
    Opened { index: usize, start: f64 },
    /// The segment at `index` has been closed.
    Closed { index: usize, segment: VoiceSegment },
}

#[derive(Debug, Clone)]
pub struct Segmenter {
    onset_db: f32,
    offset_db: f32,
    min_duration: f64,
    state: VadState,
    segments: Vec<VoiceSegment>,
}

impl Segmenter {
    pub fn new(onset_db: f32, offset_db: f32, min_duration: f64) -> Self {
        Self {
            onset_db,
            offset_db,
            min_duration,
            state: VadState::Silent,
            segments: Vec::new(),
        }
    }

    /// Advances the state machine with the energy of the frame at `time`.
    pub fn push(&mut self, time: f64, energy_db: f32) -> Option<SegmentEvent> {
        match self.state {
            VadState::Silent if energy_db > self.onset_db => {
                self.state = VadState::Voiced;
                self.segments.push(VoiceSegment::open(time));
                let index = self.segments.len() - 1;
                debug!(index, start = time, energy_db, "voice segment opened");
                Some(SegmentEvent::Opened { index, start: time })
            }
            VadState::Voiced if energy_db < self.offset_db => {
                let start = self.segments.last().map(|s| s.start)?;
                if time - start < self.min_duration {
                    return None;
                }
                self.close_at(time)
            }
            _ => None,
        }
    }

    /// Closes the open segment, if any, at `time`.
    pub fn finish(&mut self, time: f64) -> Option<SegmentEvent> {
        if self.state == VadState::Voiced {
            self.close_at(time)
        } else {
            None
        }
    }

    fn close_at(&mut self, time: f64) -> Option<SegmentEvent> {
        let index = self.segments.len().checked_sub(1)?;
        let segment = &mut self.segments[index];
        segment.end = Some(time.max(segment.start));
        self.state = VadState::Silent;
        let segment = *segment;
        debug!(index, start = segment.start, end = ?segment.end, "voice segment closed");
        Some(SegmentEvent::Closed { index, segment })
    }

    pub fn state(&self) -> VadState {
        self.state
    }

    /// All segments of the session, in time order.
    pub fn segments(&self) -> &[VoiceSegment] {
        &self.segments
    }

    pub fn reset(&mut self) {
        self.state = VadState::Silent;
        self.segments.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segmenter() -> Segmenter {
        Segmenter::new(-40.0, -50.0, 0.07)
    }

    #[test]
    fn test_energy_of_silence() {
        assert_eq!(frame_energy_db(&[0.0; 64]), SILENCE_DB);
        assert_eq!(frame_energy_db(&[]), SILENCE_DB);
    }

    #[test]
    fn test_energy_of_full_scale_square() {
        let samples: Vec<f32> = (0..64).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        assert!(frame_energy_db(&samples).abs() < 1e-4);
    }

    #[test]
    fn test_dip_between_thresholds_keeps_segment() {
        let mut seg = segmenter();
        let profile = [-60.0, -30.0, -30.0, -45.0, -45.0, -30.0, -30.0, -60.0];
        let mut events = Vec::new();
        for (i, &db) in profile.iter().enumerate() {
            if let Some(ev) = seg.push(i as f64 * 0.02, db) {
                events.push(ev);
            }
        }
        assert_eq!(seg.segments().len(), 1);
        assert_eq!(events.len(), 2);
        let closed = seg.segments()[0];
        assert!((closed.start - 0.02).abs() < 1e-9);
        assert!((closed.end.unwrap() - 0.14).abs() < 1e-9);
    }

    #[test]
    fn test_short_segment_not_closed() {
        let mut seg = segmenter();
        seg.push(0.00, -30.0);
        // 40 ms in: below offset but under the minimum duration.
        assert_eq!(seg.push(0.04, -70.0), None);
        assert_eq!(seg.state(), VadState::Voiced);
        assert!(matches!(seg.push(0.08, -70.0), Some(SegmentEvent::Closed { index: 0, .. })));
    }

    #[test]
    fn test_two_syllables() {
        let mut seg = segmenter();
        let mut t = 0.0;
        for db in [-30.0, -30.0, -30.0, -30.0, -30.0, -70.0, -30.0, -30.0, -30.0, -30.0, -30.0, -70.0] {
            seg.push(t, db);
            t += 0.02;
        }
        assert_eq!(seg.segments().len(), 2);
        assert!(seg.segments().iter().all(|s| !s.is_open()));
        assert!(seg.segments()[0].end.unwrap() <= seg.segments()[1].start);
    }

    #[test]
    fn test_finish_and_reset() {
        let mut seg = segmenter();
        seg.push(0.0, -20.0);
        assert!(seg.segments()[0].is_open());
        assert!(seg.finish(0.5).is_some());
        assert_eq!(seg.segments()[0].duration(), Some(0.5));
        assert_eq!(seg.finish(0.6), None);
        seg.reset();
        assert!(seg.segments().is_empty());
        assert_eq!(seg.state(), VadState::Silent);
    }
}
