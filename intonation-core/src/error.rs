//! # Error Types
//!
//! Only configuration and frame-construction problems are surfaced as errors.
//! Everything that can go wrong while analysing a single frame is recovered
//! locally and reported through [`Unvoiced`] on the emitted estimate.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors returned by the engine's constructors.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    /// The configuration cannot describe a working pipeline. A frame with a
    /// zero sample rate is rejected with this variant too.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A frame could not be built from the supplied parts, for example a
    /// non-finite start time.
    #[error("invalid frame: {0}")]
    InvalidFrame(String),
}

/// Why a frame was reported as unvoiced.
///
/// These are outcomes, not failures: the frame still produces a
/// `PitchEstimate` with `voiced = false` and a frequency of 0.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unvoiced {
    /// The frame carries no energy.
    #[error("silent frame")]
    Silence,

    /// The frame is shorter than two periods of the frequency floor.
    #[error("frame too short to resolve the frequency floor")]
    InsufficientData,

    /// A period was found but maps outside the floor/ceiling.
    #[error("candidate frequency outside the configured range")]
    OutOfRangeFrequency,

    /// No dip in the normalized difference passed either threshold.
    #[error("no periodic structure found")]
    NoPeriodicity,

    /// A candidate was found but the confidence stayed below the threshold.
    #[error("confidence below the voicing threshold")]
    LowConfidence,
}

pub type Result<T> = std::result::Result<T, EngineError>;
