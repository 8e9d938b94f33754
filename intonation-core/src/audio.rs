//! # Audio Capture Module
//!
//! Real-time microphone capture through CPAL (Cross-Platform Audio Library).
//! The input callback downmixes to mono, cuts overlapping analysis windows
//! every hop and publishes them into a single-slot handoff, so a slow
//! consumer causes dropped frames rather than growing latency.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SupportedStreamConfigRange;
use anyhow::{Context, Result, anyhow};
use tracing::{error, info};

use crate::config::EngineConfig;
use crate::handoff::LatestSlot;
use crate::AudioFrame;

/// Preferred capture rate. Speech F0 needs far less, but most devices
/// support it natively.
pub const TARGET_SAMPLE_RATE: u32 = 44100;

/// Cuts a mono sample stream into overlapping windows stamped with their
/// start time on the live timeline.
#[derive(Debug)]
pub struct Framer {
    sample_rate: u32,
    window: usize,
    hop: usize,
    pending: Vec<f32>,
    consumed: u64,
}

impl Framer {
    pub fn new(config: &EngineConfig, sample_rate: u32) -> Self {
        let window = config.window_samples(sample_rate);
        let hop = config.hop_samples(sample_rate).min(window);
        Self {
            sample_rate,
            window,
            hop,
            pending: Vec::with_capacity(window * 2),
            consumed: 0,
        }
    }

    /// Appends interleaved samples, averaging `channels` into one.
    pub fn extend_interleaved(&mut self, data: &[f32], channels: usize) {
        if channels <= 1 {
            self.pending.extend_from_slice(data);
            return;
        }
        let scale = 1.0 / channels as f32;
        self.pending
            .extend(data.chunks_exact(channels).map(|c| c.iter().sum::<f32>() * scale));
    }

    /// Emits every complete window currently buffered.
    pub fn drain_frames(&mut self, mut emit: impl FnMut(AudioFrame)) {
        while self.pending.len() >= self.window {
            let start_time = self.consumed as f64 / self.sample_rate as f64;
            if let Ok(frame) = AudioFrame::new(self.pending[..self.window].to_vec(), self.sample_rate, start_time) {
                emit(frame);
            }
            self.pending.drain(..self.hop);
            self.consumed += self.hop as u64;
        }
    }
}

/// Starts audio capture from the default input device.
///
/// This function:
/// 1. Selects the default audio input device
/// 2. Picks an f32 input format closest to [`TARGET_SAMPLE_RATE`]
/// 3. Sets up a callback that frames the audio and publishes it to `frames`
///
/// # Returns
/// * `Ok((stream, sample_rate))` - Audio stream handle and sample rate
/// * `Err(e)` - Error if audio setup fails
pub fn start_audio_capture(config: &EngineConfig, frames: LatestSlot<AudioFrame>) -> Result<(cpal::Stream, u32)> {
    let host = cpal::default_host();
    let device = host.default_input_device()
        .ok_or_else(|| anyhow!("No input device available"))?;

    info!(device = %device.name()?, "using audio input device");

    let configs = device.supported_input_configs()
        .context("failed to query input configurations")?
        .collect::<Vec<_>>();
    let supported_config = find_supported_config(configs, TARGET_SAMPLE_RATE)
        .ok_or_else(|| anyhow!("No suitable f32 input format found"))?;

    let rate = TARGET_SAMPLE_RATE.clamp(
        supported_config.min_sample_rate().0,
        supported_config.max_sample_rate().0,
    );
    let config_with_rate = supported_config.with_sample_rate(cpal::SampleRate(rate));
    let sample_rate_val = config_with_rate.sample_rate().0;
    let channels = config_with_rate.channels() as usize;
    let stream_config: cpal::StreamConfig = config_with_rate.into();

    info!(sample_rate = sample_rate_val, channels, "selected capture format");

    let err_fn = |err| error!("an error occurred on the audio stream: {}", err);

    let mut framer = Framer::new(config, sample_rate_val);

    let stream = device.build_input_stream(
        &stream_config,
        move |data: &[f32], _: &cpal::InputCallbackInfo| {
            framer.extend_interleaved(data, channels);
            framer.drain_frames(|frame| {
                frames.publish(frame);
            });
        },
        err_fn,
        None
    ).context("failed to build input stream")?;

    stream.play().context("failed to start input stream")?;

    Ok((stream, sample_rate_val))
}

/// Finds the best supported audio configuration for the target sample rate.
///
/// Only 32-bit float formats qualify. Mono is preferred over multi-channel,
/// then the range closest to `target_rate`.
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter(|c| c.sample_format() == cpal::SampleFormat::F32)
        .min_by_key(|c| {
            let min_diff = (c.min_sample_rate().0 as i64 - target_rate as i64).abs();
            let max_diff = (c.max_sample_rate().0 as i64 - target_rate as i64).abs();
            let in_range = c.min_sample_rate().0 <= target_rate && target_rate <= c.max_sample_rate().0;
            let rate_penalty = if in_range { 0 } else { min_diff.min(max_diff) };
            (c.channels() != 1, rate_penalty)
        })
}
