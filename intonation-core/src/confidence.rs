//! # Confidence Scorer
//!
//! Turns a period candidate into a single voicing confidence in [0, 1] by
//! blending an SNR proxy with a period-to-period consistency score. Both use
//! window-aligned products (`x[i] w[i+L]` against `x[i+L] w[i]`), which cancel
//! the amplitude taper the Hamming window puts on the frame.

use crate::preprocess::ConditionedFrame;

/// Upper clamp of the SNR proxy; also its normalization constant.
pub const SNR_CEILING: f32 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceScore {
    /// Clamped SNR proxy in [0, SNR_CEILING].
    pub snr: f32,
    /// Mean normalized correlation between successive periods, in [0, 1].
    pub periodicity: f32,
    /// Weighted blend in [0, 1].
    pub confidence: f32,
}

#[derive(Debug, Clone, Copy)]
pub struct ConfidenceScorer {
    snr_weight: f32,
    periodicity_weight: f32,
}

/// Normalized correlation of the window-aligned products over `start..end`.
fn aligned_correlation(x: &[f32], w: &[f32], lag: usize, start: usize, end: usize) -> f32 {
    let mut num = 0.0f64;
    let mut energy_a = 0.0f64;
    let mut energy_b = 0.0f64;
    for i in start..end {
        let a = (x[i] * w[i + lag]) as f64;
        let b = (x[i + lag] * w[i]) as f64;
        num += a * b;
        energy_a += a * a;
        energy_b += b * b;
    }
    let den = (energy_a * energy_b).sqrt();
    if den <= f64::MIN_POSITIVE {
        return 0.0;
    }
    ((num / den) as f32).clamp(0.0, 1.0)
}

impl ConfidenceScorer {
    pub fn new(snr_weight: f32, periodicity_weight: f32) -> Self {
        Self {
            snr_weight,
            periodicity_weight,
        }
    }

    /// SNR proxy: the correlated part of the frame at one period lag against
    /// the residual energy, `r / (1 - r)`, clamped to `[0, SNR_CEILING]`.
    pub fn snr(&self, frame: &ConditionedFrame, lag: usize) -> f32 {
        let n = frame.len();
        if lag == 0 || lag >= n {
            return 0.0;
        }
        let r = aligned_correlation(frame.samples(), frame.window(), lag, 0, n - lag);
        let residual = 1.0 - r;
        if residual <= r / SNR_CEILING {
            return SNR_CEILING;
        }
        (r / residual).clamp(0.0, SNR_CEILING)
    }

    /// Averages the normalized correlation of each whole period with the
    /// next one. Frames holding fewer than two whole periods score 0.
    pub fn periodicity(&self, frame: &ConditionedFrame, lag: usize) -> f32 {
        let n = frame.len();
        if lag == 0 {
            return 0.0;
        }
        let periods = n / lag;
        if periods < 2 {
            return 0.0;
        }
        let pairs = periods - 1;
        let total: f32 = (0..pairs)
            .map(|k| aligned_correlation(frame.samples(), frame.window(), lag, k * lag, (k + 1) * lag))
            .sum();
        total / pairs as f32
    }

    /// Scores `frame` for a candidate at `frequency_hz`.
    pub fn score(&self, frame: &ConditionedFrame, frequency_hz: f32) -> ConfidenceScore {
        if frequency_hz <= 0.0 || frame.sample_rate() == 0 {
            return ConfidenceScore {
                snr: 0.0,
                periodicity: 0.0,
                confidence: 0.0,
            };
        }
        let lag = (frame.sample_rate() as f32 / frequency_hz).round() as usize;
        let snr = self.snr(frame, lag);
        let periodicity = self.periodicity(frame, lag);
        let confidence =
            (self.snr_weight * snr / SNR_CEILING + self.periodicity_weight * periodicity).clamp(0.0, 1.0);
        ConfidenceScore {
            snr,
            periodicity,
            confidence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocess::Preprocessor;
    use crate::AudioFrame;

    fn condition(samples: Vec<f32>, sr: u32) -> ConditionedFrame {
        Preprocessor::new(0.97).process(&AudioFrame::new(samples, sr, 0.0).unwrap())
    }

    fn gen_sine(sr: u32, freq: f32, n: usize) -> Vec<f32> {
        (0..n)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sr as f32).sin() * 0.5)
            .collect()
    }

    // Deterministic white noise in [-0.5, 0.5).
    fn gen_noise(n: usize, seed: u32) -> Vec<f32> {
        let mut state = seed;
        (0..n)
            .map(|_| {
                state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                (state >> 8) as f32 / (1u32 << 24) as f32 - 0.5
            })
            .collect()
    }

    #[test]
    fn test_sine_scores_high() {
        let sr = 16000;
        let frame = condition(gen_sine(sr, 200.0, 1024), sr);
        let score = ConfidenceScorer::new(0.4, 0.6).score(&frame, 200.0);
        assert!(score.confidence > 0.9, "{:?}", score);
        assert!(score.periodicity > 0.95);
        assert!(score.snr > 5.0);
    }

    #[test]
    fn test_noise_scores_low() {
        let sr = 16000;
        let frame = condition(gen_noise(1024, 7), sr);
        let score = ConfidenceScorer::new(0.4, 0.6).score(&frame, 200.0);
        assert!(score.confidence < 0.4, "{:?}", score);
    }

    #[test]
    fn test_too_few_periods() {
        let sr = 16000;
        let frame = condition(gen_sine(sr, 100.0, 200), sr);
        let scorer = ConfidenceScorer::new(0.4, 0.6);
        assert_eq!(scorer.periodicity(&frame, 160), 0.0);
    }

    #[test]
    fn test_silence_scores_zero() {
        let frame = condition(vec![0.0; 512], 16000);
        let score = ConfidenceScorer::new(0.4, 0.6).score(&frame, 200.0);
        assert_eq!(score.confidence, 0.0);
    }
}
