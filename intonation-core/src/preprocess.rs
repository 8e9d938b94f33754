//! # Frame Preprocessor
//!
//! Conditions a raw frame before period analysis:
//! 1. DC offset removal
//! 2. First-order pre-emphasis
//! 3. Hamming windowing
//!
//! The window itself travels with the conditioned samples, because the
//! difference function and the confidence scorer both weight each product by
//! the window value of the opposite sample.

use crate::AudioFrame;

/// Removes the DC offset from a signal by making its average value zero.
///
/// DC offset inflates the difference function at every lag and hides
/// the dip at the true period.
///
/// # Arguments
/// * `signal` - Audio signal to process (modified in-place)
fn remove_dc_offset(signal: &mut [f32]) {
    let len = signal.len();
    if len == 0 { return; }
    let avg = signal.iter().sum::<f32>() / len as f32;
    if avg.abs() > 1e-9 {
        for sample in signal.iter_mut() {
            *sample -= avg;
        }
    }
}

/// Applies `y[n] = x[n] - a * x[n-1]` in place.
///
/// The sample before the frame is taken to equal the first sample, so the
/// first output does not carry an artificial step.
fn apply_pre_emphasis(signal: &mut [f32], coefficient: f32) {
    let mut prev = match signal.first() {
        Some(&s) => s,
        None => return,
    };
    for sample in signal.iter_mut() {
        let current = *sample;
        *sample = current - coefficient * prev;
        prev = current;
    }
}

/// Fills `window` with a Hamming window of its own length.
fn fill_hamming(window: &mut [f32]) {
    let n = window.len();
    if n == 1 {
        window[0] = 1.0;
        return;
    }
    let n_minus_1 = (n - 1) as f32;
    for (i, w) in window.iter_mut().enumerate() {
        *w = 0.54 - 0.46 * (2.0 * std::f32::consts::PI * i as f32 / n_minus_1).cos();
    }
}

/// A frame after conditioning, together with the window that was applied.
#[derive(Debug, Clone, Default)]
pub struct ConditionedFrame {
    samples: Vec<f32>,
    window: Vec<f32>,
    sample_rate: u32,
}

impl ConditionedFrame {
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn window(&self) -> &[f32] {
        &self.window
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Total energy of the conditioned samples.
    pub fn energy(&self) -> f32 {
        self.samples.iter().map(|s| s * s).sum()
    }
}

/// Stateless apart from its coefficient; buffers live in the output frame so
/// they can be reused across hops.
#[derive(Debug, Clone, Copy)]
pub struct Preprocessor {
    pre_emphasis: f32,
}

impl Preprocessor {
    pub fn new(pre_emphasis: f32) -> Self {
        Self { pre_emphasis }
    }

    /// Conditions `frame` into `out`, reusing its buffers. The window is only
    /// recomputed when the frame length changes.
    pub fn process_into(&self, frame: &AudioFrame, out: &mut ConditionedFrame) {
        let input = frame.samples();
        out.sample_rate = frame.sample_rate();
        out.samples.clear();
        out.samples.extend_from_slice(input);

        if out.window.len() != input.len() {
            out.window.resize(input.len(), 0.0);
            if !input.is_empty() {
                fill_hamming(&mut out.window);
            }
        }

        remove_dc_offset(&mut out.samples);
        apply_pre_emphasis(&mut out.samples, self.pre_emphasis);
        for (sample, w) in out.samples.iter_mut().zip(out.window.iter()) {
            *sample *= w;
        }
    }

    /// Allocating convenience over [`Preprocessor::process_into`].
    pub fn process(&self, frame: &AudioFrame) -> ConditionedFrame {
        let mut out = ConditionedFrame::default();
        self.process_into(frame, &mut out);
        out
    }
}
