//! # Track Smoother
//!
//! Median-of-history filtering plus a per-hop rate clamp. The median drops
//! single-frame octave slips; the clamp bounds how far the track may move in
//! one hop, so genuine glides still come through at a limited slope.

use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct TrackSmoother {
    history: VecDeque<f32>,
    capacity: usize,
    max_change_fraction: f32,
    previous: Option<f32>,
    scratch: Vec<f32>,
}

fn median(values: &mut [f32]) -> f32 {
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        values[mid]
    } else {
        0.5 * (values[mid - 1] + values[mid])
    }
}

impl TrackSmoother {
    pub fn new(capacity: usize, max_change_fraction: f32) -> Self {
        let capacity = capacity.max(1);
        Self {
            history: VecDeque::with_capacity(capacity),
            capacity,
            max_change_fraction,
            previous: None,
            scratch: Vec::with_capacity(capacity),
        }
    }

    /// Feeds one accepted frequency and returns the smoothed value.
    pub fn push(&mut self, frequency_hz: f32) -> f32 {
        if self.history.len() == self.capacity {
            self.history.pop_front();
        }
        self.history.push_back(frequency_hz);

        self.scratch.clear();
        self.scratch.extend(self.history.iter().copied());
        let mut smoothed = median(&mut self.scratch);

        if let Some(prev) = self.previous {
            let lo = prev * (1.0 - self.max_change_fraction);
            let hi = prev * (1.0 + self.max_change_fraction);
            smoothed = smoothed.clamp(lo.max(0.0), hi);
        }
        self.previous = Some(smoothed);
        smoothed
    }

    /// Forgets everything; called on every voiced-to-unvoiced transition.
    pub fn reset(&mut self) {
        self.history.clear();
        self.previous = None;
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn previous(&self) -> Option<f32> {
        self.previous
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_outlier_removed() {
        let mut s = TrackSmoother::new(5, 0.2);
        for _ in 0..4 {
            s.push(200.0);
        }
        // An octave jump in one frame does not survive the median.
        assert_eq!(s.push(400.0), 200.0);
        assert_eq!(s.push(200.0), 200.0);
    }

    #[test]
    fn test_change_is_clamped() {
        let mut s = TrackSmoother::new(1, 0.2);
        assert_eq!(s.push(100.0), 100.0);
        let next = s.push(300.0);
        assert!((next - 120.0).abs() < 1e-4);
        let next = s.push(300.0);
        assert!((next - 144.0).abs() < 1e-3);
    }

    #[test]
    fn test_glide_is_tracked() {
        let mut s = TrackSmoother::new(5, 0.2);
        let mut last = 0.0;
        for i in 0..40 {
            last = s.push(150.0 + 2.0 * i as f32);
        }
        assert!(last > 210.0, "last={}", last);
    }

    #[test]
    fn test_reset_forgets_history() {
        let mut s = TrackSmoother::new(5, 0.2);
        s.push(100.0);
        s.push(100.0);
        s.reset();
        assert!(s.is_empty());
        assert_eq!(s.previous(), None);
        assert_eq!(s.push(300.0), 300.0);
    }

    #[test]
    fn test_even_history_median() {
        let mut values = [4.0, 1.0, 3.0, 2.0];
        assert_eq!(median(&mut values), 2.5);
    }
}
