//! # Pitch Detection Module
//!
//! A YIN-class fundamental frequency estimator for windowed speech frames.
//!
//! ## Features
//! - Squared-difference function computed through FFT cross-correlation
//! - Window-compensated products, so a windowed periodic frame still has an
//!   exact zero at its period
//! - Cumulative mean normalization and absolute-threshold dip search with a
//!   looser global-minimum fallback
//! - Parabolic interpolation for sub-sample accuracy

use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

use crate::error::Unvoiced;
use crate::preprocess::ConditionedFrame;

/// A raw period candidate for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct F0Candidate {
    pub frequency_hz: f32,
    /// `1 - d'(tau)` at the chosen lag.
    pub strength: f32,
    /// Refined period in samples.
    pub period: f32,
}

/// Lag bounds for a sample rate and frequency range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LagRange {
    pub tau_min: usize,
    pub tau_max: usize,
}

impl LagRange {
    pub fn new(sample_rate: u32, floor_hz: f32, ceiling_hz: f32) -> Self {
        let sr = sample_rate as f32;
        let tau_min = ((sr / ceiling_hz).floor() as usize).max(2);
        let tau_max = (sr / floor_hz).ceil() as usize;
        Self { tau_min, tau_max }
    }

    /// Shortest frame that can resolve the floor frequency.
    pub fn min_frame_len(&self) -> usize {
        2 * self.tau_max
    }
}

/// Per-length FFT state. Rebuilt only when the frame length or sample rate
/// changes, so steady-state frames do no planning or window transforms.
struct CorrelationPlan {
    frame_len: usize,
    sample_rate: u32,
    lags: LagRange,
    /// Integration window of the difference function.
    span: usize,
    fft_len: usize,
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
    /// Spectrum of `w^2` over the first `span` samples.
    window_sq_head: Vec<Complex<f32>>,
    /// Spectrum of `w^2` over the whole frame.
    window_sq_full: Vec<Complex<f32>>,
    bufs: [Vec<Complex<f32>>; 4],
    scratch: Vec<Complex<f32>>,
}

impl CorrelationPlan {
    fn new(planner: &mut FftPlanner<f32>, window: &[f32], sample_rate: u32, lags: LagRange) -> Self {
        let frame_len = window.len();
        let span = frame_len - lags.tau_max;
        let fft_len = (frame_len + span).next_power_of_two();
        let forward = planner.plan_fft_forward(fft_len);
        let inverse = planner.plan_fft_inverse(fft_len);
        let scratch_len = forward
            .get_inplace_scratch_len()
            .max(inverse.get_inplace_scratch_len());
        let mut scratch = vec![Complex::new(0.0, 0.0); scratch_len];

        let mut window_sq_head = vec![Complex::new(0.0, 0.0); fft_len];
        let mut window_sq_full = vec![Complex::new(0.0, 0.0); fft_len];
        for (i, &w) in window.iter().enumerate() {
            let sq = Complex::new(w * w, 0.0);
            window_sq_full[i] = sq;
            if i < span {
                window_sq_head[i] = sq;
            }
        }
        forward.process_with_scratch(&mut window_sq_head, &mut scratch);
        forward.process_with_scratch(&mut window_sq_full, &mut scratch);

        Self {
            frame_len,
            sample_rate,
            lags,
            span,
            fft_len,
            forward,
            inverse,
            window_sq_head,
            window_sq_full,
            bufs: std::array::from_fn(|_| vec![Complex::new(0.0, 0.0); fft_len]),
            scratch,
        }
    }

    /// Fills `diff[0..=tau_max]` with
    /// `d(tau) = sum_{i<span} (x[i] w[i+tau] - x[i+tau] w[i])^2`.
    ///
    /// Expanded, the three terms are cross-correlations:
    /// `x^2 * w^2`, `w^2 * x^2` and `(xw) * (xw)`.
    fn difference(&mut self, frame: &ConditionedFrame, diff: &mut Vec<f32>) {
        let x = frame.samples();
        let w = frame.window();
        let [sq_head, sq_full, xw_head, xw_full] = &mut self.bufs;

        for buf in [&mut *sq_head, &mut *sq_full, &mut *xw_head, &mut *xw_full] {
            buf.fill(Complex::new(0.0, 0.0));
        }
        for i in 0..self.frame_len {
            let sq = Complex::new(x[i] * x[i], 0.0);
            let xw = Complex::new(x[i] * w[i], 0.0);
            sq_full[i] = sq;
            xw_full[i] = xw;
            if i < self.span {
                sq_head[i] = sq;
                xw_head[i] = xw;
            }
        }
        for buf in [&mut *sq_head, &mut *sq_full, &mut *xw_head, &mut *xw_full] {
            self.forward.process_with_scratch(buf, &mut self.scratch);
        }

        // corr(f, g)[tau] = IFFT(conj(F) * G)[tau]; accumulate into sq_head.
        for k in 0..self.fft_len {
            sq_head[k] = sq_head[k].conj() * self.window_sq_full[k]
                + self.window_sq_head[k].conj() * sq_full[k]
                - xw_head[k].conj() * xw_full[k] * 2.0;
        }
        self.inverse.process_with_scratch(sq_head.as_mut_slice(), &mut self.scratch);

        let scale = 1.0 / self.fft_len as f32;
        diff.clear();
        diff.extend(
            sq_head[..=self.lags.tau_max]
                .iter()
                .map(|c| (c.re * scale).max(0.0)),
        );
    }
}

/// Fills `cmnd` with the cumulative-mean-normalized difference, `d'(0) = 1`.
pub fn cumulative_mean_normalize(diff: &[f32], cmnd: &mut Vec<f32>) {
    cmnd.clear();
    cmnd.reserve(diff.len());
    let mut running_sum = 0.0f32;
    for (tau, &d) in diff.iter().enumerate() {
        if tau == 0 {
            cmnd.push(1.0);
            continue;
        }
        running_sum += d;
        if running_sum > f32::EPSILON {
            cmnd.push(d * tau as f32 / running_sum);
        } else {
            cmnd.push(1.0);
        }
    }
}

/// Absolute-threshold search over `cmnd[tau_min..=tau_max]`.
///
/// Returns the first local minimum under `threshold`, otherwise the global
/// minimum if it is under `fallback`.
pub fn pick_lag(cmnd: &[f32], lags: LagRange, threshold: f32, fallback: f32) -> Option<usize> {
    let last = lags.tau_max.min(cmnd.len().saturating_sub(1));
    if lags.tau_min > last {
        return None;
    }

    let mut tau = lags.tau_min;
    while tau <= last {
        if cmnd[tau] < threshold {
            while tau < last && cmnd[tau + 1] < cmnd[tau] {
                tau += 1;
            }
            return Some(tau);
        }
        tau += 1;
    }

    let (best, &value) = cmnd[lags.tau_min..=last]
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))?;
    (value < fallback).then_some(lags.tau_min + best)
}

/// Refines an integer lag with a parabola through its two neighbours.
pub fn parabolic_refine(cmnd: &[f32], tau: usize) -> f32 {
    if tau == 0 || tau + 1 >= cmnd.len() {
        return tau as f32;
    }
    let y1 = cmnd[tau - 1];
    let y2 = cmnd[tau];
    let y3 = cmnd[tau + 1];
    let denom = y1 - 2.0 * y2 + y3;
    if denom.abs() <= f32::EPSILON {
        return tau as f32;
    }
    let shift = ((y1 - y3) / (2.0 * denom)).clamp(-1.0, 1.0);
    tau as f32 + shift
}

/// Stateful so that FFT plans and scratch buffers survive across frames.
pub struct PitchEstimator {
    floor_hz: f32,
    ceiling_hz: f32,
    threshold: f32,
    fallback_threshold: f32,
    planner: FftPlanner<f32>,
    plan: Option<CorrelationPlan>,
    diff: Vec<f32>,
    cmnd: Vec<f32>,
}

impl std::fmt::Debug for PitchEstimator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PitchEstimator")
            .field("floor_hz", &self.floor_hz)
            .field("ceiling_hz", &self.ceiling_hz)
            .field("threshold", &self.threshold)
            .field("fallback_threshold", &self.fallback_threshold)
            .finish_non_exhaustive()
    }
}

impl PitchEstimator {
    pub fn new(floor_hz: f32, ceiling_hz: f32, threshold: f32, fallback_threshold: f32) -> Self {
        Self {
            floor_hz,
            ceiling_hz,
            threshold,
            fallback_threshold,
            planner: FftPlanner::new(),
            plan: None,
            diff: Vec::new(),
            cmnd: Vec::new(),
        }
    }

    /// Estimates the period of one conditioned frame.
    ///
    /// # Returns
    /// * `Ok(candidate)` - frequency within floor/ceiling and its strength
    /// * `Err(reason)` - why the frame has no usable pitch
    pub fn estimate(&mut self, frame: &ConditionedFrame) -> Result<F0Candidate, Unvoiced> {
        let sample_rate = frame.sample_rate();
        let lags = LagRange::new(sample_rate, self.floor_hz, self.ceiling_hz);
        if frame.len() < lags.min_frame_len() || lags.tau_min >= lags.tau_max {
            return Err(Unvoiced::InsufficientData);
        }
        if frame.energy() <= f32::MIN_POSITIVE {
            return Err(Unvoiced::Silence);
        }

        let stale = match &self.plan {
            Some(plan) => plan.frame_len != frame.len() || plan.sample_rate != sample_rate,
            None => true,
        };
        if stale {
            self.plan = Some(CorrelationPlan::new(
                &mut self.planner,
                frame.window(),
                sample_rate,
                lags,
            ));
        }
        let Some(plan) = self.plan.as_mut() else {
            return Err(Unvoiced::InsufficientData);
        };

        plan.difference(frame, &mut self.diff);
        cumulative_mean_normalize(&self.diff, &mut self.cmnd);

        let tau = pick_lag(&self.cmnd, lags, self.threshold, self.fallback_threshold)
            .ok_or(Unvoiced::NoPeriodicity)?;
        let period = parabolic_refine(&self.cmnd, tau);
        if period <= 0.0 {
            return Err(Unvoiced::NoPeriodicity);
        }

        let frequency_hz = sample_rate as f32 / period;
        if !frequency_hz.is_finite() || frequency_hz < self.floor_hz || frequency_hz > self.ceiling_hz {
            return Err(Unvoiced::OutOfRangeFrequency);
        }

        Ok(F0Candidate {
            frequency_hz,
            strength: (1.0 - self.cmnd[tau]).clamp(0.0, 1.0),
            period,
        })
    }

    /// The normalized difference of the last analysed frame.
    pub fn last_normalized_difference(&self) -> &[f32] {
        &self.cmnd
    }
}
