//! # Session
//!
//! Owns every piece of per-learner state: the smoothing history, the
//! segmenter, the time-warp pointer and the take statistics. Several sessions
//! can run side by side without sharing anything.
//!
//! Per frame, the pipeline is:
//! 1. Energy goes to the segmenter, whose open/close events drive the mapper
//! 2. The frame is conditioned (DC removal, pre-emphasis, Hamming window)
//! 3. The estimator proposes a period; the scorer gates it on confidence
//! 4. Accepted frequencies go through the smoother
//! 5. The frame time is mapped onto the reference and compared with the
//!    reference curve when one is set

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::confidence::ConfidenceScorer;
use crate::config::EngineConfig;
use crate::error::{Result, Unvoiced};
use crate::intonation::{self, ReferenceCurve};
use crate::pitch::PitchEstimator;
use crate::preprocess::{ConditionedFrame, Preprocessor};
use crate::segmenter::{self, SegmentEvent, Segmenter};
use crate::smoothing::TrackSmoother;
use crate::time_warp::TimeWarpMapper;
use crate::{AudioFrame, LivePitchPoint, PitchEstimate, ReferenceSyllable, VoiceSegment};

/// Resolution of the pitch histogram behind the median, in cents.
const HISTOGRAM_BIN_CENTS: f32 = 10.0;

/// Descriptive statistics for one take.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TakeSummary {
    pub frames: usize,
    pub voiced_frames: usize,
    pub voiced_ratio: f32,
    /// Median of the smoothed voiced F0, to histogram resolution.
    pub median_hz: Option<f32>,
    /// Span between the lowest and highest voiced F0.
    pub range_semitones: Option<f32>,
    pub segments: usize,
    /// Total length of the closed segments, in seconds.
    pub voiced_secs: f64,
    /// Mean absolute deviation from the reference curve, where one applied.
    pub mean_abs_cents: Option<f32>,
}

/// Running statistics with memory bounded by the frequency range, not the
/// length of the take.
#[derive(Debug, Clone)]
struct TakeStats {
    floor_hz: f32,
    histogram: Vec<u32>,
    frames: usize,
    voiced_frames: usize,
    min_hz: f32,
    max_hz: f32,
    abs_cents_sum: f64,
    compared_frames: usize,
}

impl TakeStats {
    fn new(floor_hz: f32, ceiling_hz: f32) -> Self {
        let bins = (intonation::calculate_cents_deviation(ceiling_hz, floor_hz) / HISTOGRAM_BIN_CENTS)
            .ceil() as usize
            + 1;
        Self {
            floor_hz,
            histogram: vec![0; bins],
            frames: 0,
            voiced_frames: 0,
            min_hz: f32::INFINITY,
            max_hz: 0.0,
            abs_cents_sum: 0.0,
            compared_frames: 0,
        }
    }

    fn record(&mut self, point: &LivePitchPoint) {
        self.frames += 1;
        let hz = point.estimate.frequency_hz;
        if point.estimate.voiced && hz > 0.0 {
            self.voiced_frames += 1;
            self.min_hz = self.min_hz.min(hz);
            self.max_hz = self.max_hz.max(hz);
            let bin = (intonation::calculate_cents_deviation(hz, self.floor_hz) / HISTOGRAM_BIN_CENTS)
                .round()
                .max(0.0) as usize;
            let last = self.histogram.len() - 1;
            self.histogram[bin.min(last)] += 1;
        }
        if let Some(cents) = point.cents_from_reference {
            self.abs_cents_sum += cents.abs() as f64;
            self.compared_frames += 1;
        }
    }

    fn median_hz(&self) -> Option<f32> {
        if self.voiced_frames == 0 {
            return None;
        }
        let half = self.voiced_frames.div_ceil(2);
        let mut seen = 0usize;
        for (bin, &count) in self.histogram.iter().enumerate() {
            seen += count as usize;
            if seen >= half {
                let cents = bin as f32 * HISTOGRAM_BIN_CENTS;
                return Some(self.floor_hz * 2f32.powf(cents / 1200.0));
            }
        }
        None
    }

    fn reset(&mut self) {
        self.histogram.fill(0);
        self.frames = 0;
        self.voiced_frames = 0;
        self.min_hz = f32::INFINITY;
        self.max_hz = 0.0;
        self.abs_cents_sum = 0.0;
        self.compared_frames = 0;
    }
}

/// One learner's live pitch and alignment pipeline.
#[derive(Debug)]
pub struct Session {
    config: EngineConfig,
    preprocessor: Preprocessor,
    estimator: PitchEstimator,
    scorer: ConfidenceScorer,
    smoother: TrackSmoother,
    segmenter: Segmenter,
    mapper: TimeWarpMapper,
    curve: Option<ReferenceCurve>,
    conditioned: ConditionedFrame,
    stats: TakeStats,
}

impl Session {
    /// Validates `config` and builds a session with no reference.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            preprocessor: Preprocessor::new(config.pre_emphasis),
            estimator: PitchEstimator::new(
                config.floor_hz,
                config.ceiling_hz,
                config.yin_threshold,
                config.yin_fallback_threshold,
            ),
            scorer: ConfidenceScorer::new(config.snr_weight, config.periodicity_weight()),
            smoother: TrackSmoother::new(config.smoothing_history, config.max_change_fraction),
            segmenter: Segmenter::new(
                config.vad_onset_db,
                config.vad_offset_db,
                config.vad_min_segment_secs,
            ),
            mapper: TimeWarpMapper::new(config.overrun_cap),
            curve: None,
            conditioned: ConditionedFrame::default(),
            stats: TakeStats::new(config.floor_hz, config.ceiling_hz),
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Replaces the alignment target. Starts a fresh session.
    pub fn set_reference(&mut self, syllables: Vec<ReferenceSyllable>) {
        info!(syllables = syllables.len(), "reference set");
        self.mapper.set_reference(syllables);
        self.reset();
    }

    /// Installs or clears the reference pitch curve. Does not reset the
    /// session.
    pub fn set_reference_curve(&mut self, curve: Option<ReferenceCurve>) {
        self.curve = curve.filter(|c| !c.is_empty());
    }

    /// Drops all per-session state. The reference and curve are kept.
    pub fn reset(&mut self) {
        self.smoother.reset();
        self.segmenter.reset();
        self.mapper.reset();
        self.stats.reset();
        debug!("session reset");
    }

    /// The sole ingress for raw samples.
    pub fn push_samples(&mut self, samples: &[f32], sample_rate: u32, start_time: f64) -> Result<LivePitchPoint> {
        let frame = AudioFrame::new(samples.to_vec(), sample_rate, start_time)?;
        Ok(self.push_frame(&frame))
    }

    /// Runs one frame through the whole pipeline.
    pub fn push_frame(&mut self, frame: &AudioFrame) -> LivePitchPoint {
        let time = frame.start_time();

        let energy_db = segmenter::frame_energy_db(frame.samples());
        if let Some(event) = self.segmenter.push(time, energy_db) {
            self.apply_segment_event(event);
        }

        let estimate = self.estimate(frame);
        let mapped_time = self.mapper.is_active().then(|| self.mapper.map(time));
        let reference_hz = match (&self.curve, mapped_time) {
            (Some(curve), Some(mapped)) => curve.frequency_at(mapped),
            _ => None,
        };
        let cents_from_reference = reference_hz
            .filter(|_| estimate.voiced)
            .and_then(|ref_hz| intonation::compare(estimate.frequency_hz, ref_hz));

        let point = LivePitchPoint {
            estimate,
            mapped_time,
            reference_hz,
            cents_from_reference,
        };
        self.stats.record(&point);
        point
    }

    fn estimate(&mut self, frame: &AudioFrame) -> PitchEstimate {
        let time = frame.start_time();
        self.preprocessor.process_into(frame, &mut self.conditioned);

        let candidate = match self.estimator.estimate(&self.conditioned) {
            Ok(candidate) => candidate,
            Err(reason) => {
                self.smoother.reset();
                return PitchEstimate::unvoiced(time, 0.0, reason);
            }
        };

        let score = self.scorer.score(&self.conditioned, candidate.frequency_hz);
        if score.confidence <= self.config.confidence_threshold {
            self.smoother.reset();
            return PitchEstimate::unvoiced(time, score.confidence, Unvoiced::LowConfidence);
        }

        PitchEstimate {
            time,
            frequency_hz: self.smoother.push(candidate.frequency_hz),
            confidence: score.confidence,
            voiced: true,
            unvoiced_reason: None,
        }
    }

    fn apply_segment_event(&mut self, event: SegmentEvent) {
        match event {
            SegmentEvent::Opened { start, .. } => self.mapper.open_segment(start),
            SegmentEvent::Closed { segment, .. } => self.mapper.close_segment(segment),
        }
    }

    /// Closes the open segment at `end_time` so the last syllable gets
    /// paired. The session is otherwise left intact.
    pub fn finish(&mut self, end_time: f64) {
        if let Some(event) = self.segmenter.finish(end_time) {
            self.apply_segment_event(event);
        }
    }

    /// Maps an arbitrary live timestamp with the current alignment state.
    pub fn map_time(&self, live_time: f64) -> Option<f64> {
        self.mapper.is_active().then(|| self.mapper.map(live_time))
    }

    pub fn segments(&self) -> &[VoiceSegment] {
        self.segmenter.segments()
    }

    pub fn time_warp(&self) -> &TimeWarpMapper {
        &self.mapper
    }

    pub fn reference_curve(&self) -> Option<&ReferenceCurve> {
        self.curve.as_ref()
    }

    pub fn summary(&self) -> TakeSummary {
        let stats = &self.stats;
        let voiced_ratio = if stats.frames > 0 {
            stats.voiced_frames as f32 / stats.frames as f32
        } else {
            0.0
        };
        TakeSummary {
            frames: stats.frames,
            voiced_frames: stats.voiced_frames,
            voiced_ratio,
            median_hz: stats.median_hz(),
            range_semitones: (stats.voiced_frames > 0)
                .then(|| intonation::semitones_between(stats.min_hz, stats.max_hz)),
            segments: self.segmenter.segments().len(),
            voiced_secs: self.segmenter.segments().iter().filter_map(VoiceSegment::duration).sum(),
            mean_abs_cents: (stats.compared_frames > 0)
                .then(|| (stats.abs_cents_sum / stats.compared_frames as f64) as f32),
        }
    }
}
