//! # Engine Configuration
//!
//! A single immutable configuration struct, validated once when a session is
//! built. Every field has a documented default; JSON callers can omit any of
//! them.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Tunables for the whole pitch and alignment pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Lowest reportable F0 in Hz.
    pub floor_hz: f32,
    /// Highest reportable F0 in Hz.
    pub ceiling_hz: f32,
    /// Time between successive analysed frames, in seconds.
    pub hop_secs: f64,
    /// Length of each analysis window, in seconds. Must cover two periods of
    /// the floor frequency for low voices to be resolvable.
    pub window_secs: f64,
    /// First-order pre-emphasis coefficient.
    pub pre_emphasis: f32,
    /// Absolute threshold on the cumulative-mean-normalized difference.
    pub yin_threshold: f32,
    /// Looser threshold applied to the global minimum when no dip passes
    /// `yin_threshold`.
    pub yin_fallback_threshold: f32,
    /// Frames are voiced only when confidence exceeds this value.
    pub confidence_threshold: f32,
    /// Weight of the SNR proxy in the confidence blend. The periodicity score
    /// gets the remainder.
    pub snr_weight: f32,
    /// Number of accepted frequencies kept for the median filter.
    pub smoothing_history: usize,
    /// Maximum relative change of the smoothed track per hop.
    pub max_change_fraction: f32,
    /// Energy (dBFS) that opens a voice segment.
    pub vad_onset_db: f32,
    /// Energy (dBFS) below which an open segment may close.
    pub vad_offset_db: f32,
    /// Segments shorter than this are never closed.
    pub vad_min_segment_secs: f64,
    /// Cap on the relative position inside the currently open syllable.
    pub overrun_cap: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            floor_hz: 60.0,
            ceiling_hz: 1000.0,
            hop_secs: 0.020,
            window_secs: 0.040,
            pre_emphasis: 0.97,
            yin_threshold: 0.15,
            yin_fallback_threshold: 0.35,
            confidence_threshold: 0.55,
            snr_weight: 0.4,
            smoothing_history: 5,
            max_change_fraction: 0.2,
            vad_onset_db: -40.0,
            vad_offset_db: -50.0,
            vad_min_segment_secs: 0.070,
            overrun_cap: 1.5,
        }
    }
}

fn invalid(msg: impl Into<String>) -> EngineError {
    EngineError::InvalidConfiguration(msg.into())
}

fn unit_interval(name: &str, v: f32, allow_zero: bool) -> Result<()> {
    let lower_ok = if allow_zero { v >= 0.0 } else { v > 0.0 };
    if !(lower_ok && v <= 1.0) {
        return Err(invalid(format!("{name} must lie in the unit interval, got {v}")));
    }
    Ok(())
}

impl EngineConfig {
    /// Checks every field. This is the only place where an
    /// [`EngineError::InvalidConfiguration`] is produced.
    pub fn validate(&self) -> Result<()> {
        let finite = [
            ("floor_hz", self.floor_hz as f64),
            ("ceiling_hz", self.ceiling_hz as f64),
            ("hop_secs", self.hop_secs),
            ("window_secs", self.window_secs),
            ("pre_emphasis", self.pre_emphasis as f64),
            ("yin_threshold", self.yin_threshold as f64),
            ("yin_fallback_threshold", self.yin_fallback_threshold as f64),
            ("confidence_threshold", self.confidence_threshold as f64),
            ("snr_weight", self.snr_weight as f64),
            ("max_change_fraction", self.max_change_fraction as f64),
            ("vad_onset_db", self.vad_onset_db as f64),
            ("vad_offset_db", self.vad_offset_db as f64),
            ("vad_min_segment_secs", self.vad_min_segment_secs),
            ("overrun_cap", self.overrun_cap),
        ];
        if let Some((name, _)) = finite.iter().find(|(_, v)| !v.is_finite()) {
            return Err(invalid(format!("{name} must be finite")));
        }

        if self.floor_hz <= 0.0 {
            return Err(invalid("floor_hz must be positive"));
        }
        if self.floor_hz >= self.ceiling_hz {
            return Err(invalid(format!(
                "floor_hz ({}) must be below ceiling_hz ({})",
                self.floor_hz, self.ceiling_hz
            )));
        }
        if self.hop_secs <= 0.0 || self.window_secs <= 0.0 {
            return Err(invalid("hop_secs and window_secs must be positive"));
        }
        if self.hop_secs > self.window_secs {
            return Err(invalid("hop_secs must not exceed window_secs"));
        }
        if !(0.0..1.0).contains(&self.pre_emphasis) {
            return Err(invalid("pre_emphasis must lie in [0, 1)"));
        }

        unit_interval("yin_threshold", self.yin_threshold, false)?;
        unit_interval("yin_fallback_threshold", self.yin_fallback_threshold, false)?;
        if self.yin_fallback_threshold < self.yin_threshold {
            return Err(invalid("yin_fallback_threshold must be at least yin_threshold"));
        }
        unit_interval("confidence_threshold", self.confidence_threshold, false)?;
        unit_interval("snr_weight", self.snr_weight, true)?;

        if self.smoothing_history == 0 {
            return Err(invalid("smoothing_history must be at least 1"));
        }
        if self.max_change_fraction <= 0.0 {
            return Err(invalid("max_change_fraction must be positive"));
        }
        if self.vad_onset_db <= self.vad_offset_db {
            return Err(invalid(format!(
                "vad_onset_db ({}) must be above vad_offset_db ({})",
                self.vad_onset_db, self.vad_offset_db
            )));
        }
        if self.vad_min_segment_secs < 0.0 {
            return Err(invalid("vad_min_segment_secs must not be negative"));
        }
        if self.overrun_cap < 1.0 {
            return Err(invalid("overrun_cap must be at least 1.0"));
        }
        Ok(())
    }

    /// Weight of the periodicity score in the confidence blend.
    pub fn periodicity_weight(&self) -> f32 {
        1.0 - self.snr_weight
    }

    /// Number of samples per hop at `sample_rate`.
    pub fn hop_samples(&self, sample_rate: u32) -> usize {
        ((self.hop_secs * sample_rate as f64).round() as usize).max(1)
    }

    /// Number of samples per analysis window at `sample_rate`.
    pub fn window_samples(&self, sample_rate: u32) -> usize {
        ((self.window_secs * sample_rate as f64).round() as usize).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert_eq!(EngineConfig::default().validate(), Ok(()));
    }

    #[test]
    fn test_floor_above_ceiling_rejected() {
        let cfg = EngineConfig {
            floor_hz: 500.0,
            ceiling_hz: 400.0,
            ..EngineConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(EngineError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_inverted_vad_thresholds_rejected() {
        let cfg = EngineConfig {
            vad_onset_db: -55.0,
            ..EngineConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_non_finite_rejected() {
        let cfg = EngineConfig {
            hop_secs: f64::NAN,
            ..EngineConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_zero_history_rejected() {
        let cfg = EngineConfig {
            smoothing_history: 0,
            ..EngineConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_window_samples() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.window_samples(16000), 640);
        assert_eq!(cfg.hop_samples(16000), 320);
    }
}
