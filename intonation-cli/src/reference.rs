//! JSON loading for engine configuration and reference material.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use intonation_core::intonation::CurvePoint;
use intonation_core::{EngineConfig, ReferenceCurve, ReferenceSyllable};
use serde::de::DeserializeOwned;

fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let mut file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mut data = String::new();
    file.read_to_string(&mut data)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&data).with_context(|| format!("failed to parse {}", path.display()))
}

/// Loads the engine configuration, or the defaults when no file is given.
/// Missing keys take their default values.
pub fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    let config = match path {
        Some(path) => load_json(path)?,
        None => EngineConfig::default(),
    };
    config.validate().context("invalid engine configuration")?;
    Ok(config)
}

/// Loads a syllable list: `[{"label": "a", "start": 0.0, "end": 0.3}, ...]`.
pub fn load_syllables(path: &Path) -> Result<Vec<ReferenceSyllable>> {
    load_json(path)
}

/// Loads a reference F0 curve: `[{"time": 0.0, "frequency_hz": 220.0}, ...]`.
pub fn load_curve(path: &Path) -> Result<ReferenceCurve> {
    let points: Vec<CurvePoint> = load_json(path)?;
    Ok(ReferenceCurve::new(points))
}
