// intonation-core/src/lib.rs

//! The core logic for live intonation comparison.
//! This crate is responsible for pitch estimation, voicing decisions,
//! syllable-like segmentation and mapping the learner's timeline onto a
//! reference recording. It is completely headless and contains no
//! rendering code.

pub mod audio;
pub mod config;
pub mod confidence;
pub mod error;
pub mod handoff;
pub mod intonation;
pub mod pitch;
pub mod preprocess;
pub mod segmenter;
pub mod session;
pub mod smoothing;
pub mod time_warp;
pub mod worker;

use serde::{Deserialize, Serialize};

pub use config::EngineConfig;
pub use error::{EngineError, Unvoiced};
pub use intonation::ReferenceCurve;
pub use session::{Session, TakeSummary};

/// One fixed-length block of mono samples as delivered by the frame source.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    samples: Vec<f32>,
    sample_rate: u32,
    start_time: f64,
}

impl AudioFrame {
    /// Builds a frame, rejecting a zero sample rate or a non-finite start time.
    pub fn new(samples: Vec<f32>, sample_rate: u32, start_time: f64) -> error::Result<Self> {
        if sample_rate == 0 {
            return Err(EngineError::InvalidConfiguration("sample rate must be positive".into()));
        }
        if !start_time.is_finite() {
            return Err(EngineError::InvalidFrame("start time must be finite".into()));
        }
        Ok(Self {
            samples,
            sample_rate,
            start_time,
        })
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Start of the frame on the live timeline, in seconds.
    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    pub fn duration(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// The per-hop output of the pitch pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PitchEstimate {
    /// Live time of the frame, in seconds.
    pub time: f64,
    /// Smoothed F0 in Hz; 0 when unvoiced.
    pub frequency_hz: f32,
    /// Voicing confidence in [0, 1].
    pub confidence: f32,
    pub voiced: bool,
    /// Set when `voiced` is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unvoiced_reason: Option<Unvoiced>,
}

impl PitchEstimate {
    pub fn unvoiced(time: f64, confidence: f32, reason: Unvoiced) -> Self {
        Self {
            time,
            frequency_hz: 0.0,
            confidence: confidence.clamp(0.0, 1.0),
            voiced: false,
            unvoiced_reason: Some(reason),
        }
    }
}

/// A syllable-like span of voice activity on the live timeline.
/// `end` is `None` while the learner is still speaking.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoiceSegment {
    pub start: f64,
    pub end: Option<f64>,
}

impl VoiceSegment {
    pub fn open(start: f64) -> Self {
        Self { start, end: None }
    }

    pub fn is_open(&self) -> bool {
        self.end.is_none()
    }

    /// Duration of a closed segment.
    pub fn duration(&self) -> Option<f64> {
        self.end.map(|end| end - self.start)
    }
}

/// A labelled span of the reference recording, supplied by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceSyllable {
    pub label: String,
    pub start: f64,
    pub end: f64,
}

impl ReferenceSyllable {
    pub fn new(label: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            label: label.into(),
            start,
            end,
        }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// What the engine hands to the visualization layer for each frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LivePitchPoint {
    #[serde(flatten)]
    pub estimate: PitchEstimate,
    /// Position on the reference timeline; present when a reference is set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mapped_time: Option<f64>,
    /// Reference F0 at `mapped_time`, when a reference curve is set and
    /// voiced there.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_hz: Option<f32>,
    /// Deviation of the live F0 from `reference_hz`, in cents.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cents_from_reference: Option<f32>,
}
