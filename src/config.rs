//! Engine tuning knobs and process configuration.
//!
//! [`EngineConfig`] holds the constants the lap engine works with.
//! [`AppConfig`] is read from the environment (after `.env` is loaded) and
//! [`CircuitConfig`] maps circuit names to track lengths from a JSON file.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::path::PathBuf;

/// Default histogram bin count for chart datasets.
pub const DEFAULT_HISTOGRAM_BINS: NonZeroUsize = match NonZeroUsize::new(20) {
    Some(n) => n,
    None => panic!("bin count must be non-zero"),
};

/// Track length used for speed estimates when no circuit override exists.
pub const DEFAULT_TRACK_LENGTH_KM: f64 = 5.0;

/// Extra seconds of telemetry read past the end of a lap.
pub const DEFAULT_TELEMETRY_SLACK_S: f64 = 10.0;

/// Default number of sessions kept in memory.
pub const DEFAULT_SESSION_CACHE_SIZE: usize = 128;

/// Closed interval of lap times, in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeWindow {
    pub min: f64,
    pub max: f64,
}

impl TimeWindow {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Inclusive on both ends.
    pub fn contains(&self, seconds: f64) -> bool {
        seconds >= self.min && seconds <= self.max
    }

    /// Exclusive on both ends.
    pub fn contains_strict(&self, seconds: f64) -> bool {
        seconds > self.min && seconds < self.max
    }
}

/// Constants used by lap normalization, statistics and charts.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Laps outside this window are dropped during normalization.
    /// `None` keeps every lap with a positive duration.
    pub plausibility_window: Option<TimeWindow>,
    /// Open interval defining the "valid-range" lap set for distribution stats.
    pub valid_range: TimeWindow,
    pub telemetry_slack_s: f64,
    pub track_length_km: f64,
    pub histogram_bins: NonZeroUsize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            plausibility_window: Some(TimeWindow::new(60.0, 300.0)),
            valid_range: TimeWindow::new(60.0, 200.0),
            telemetry_slack_s: DEFAULT_TELEMETRY_SLACK_S,
            track_length_km: DEFAULT_TRACK_LENGTH_KM,
            histogram_bins: DEFAULT_HISTOGRAM_BINS,
        }
    }
}

impl EngineConfig {
    pub fn without_plausibility_window(mut self) -> Self {
        self.plausibility_window = None;
        self
    }

    pub fn with_track_length(mut self, km: f64) -> Self {
        self.track_length_km = km;
        self
    }

    pub fn with_histogram_bins(mut self, bins: NonZeroUsize) -> Self {
        self.histogram_bins = bins;
        self
    }
}

/// Process-level settings read from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub data_url: Option<String>,
    pub session_cache_size: usize,
    pub circuits_file: Option<PathBuf>,
}

impl AppConfig {
    /// Reads `F1_DATA_DIR`, `F1_DATA_URL`, `SESSION_CACHE_SIZE` and `CIRCUITS_FILE`.
    pub fn from_env() -> Result<Self> {
        let data_dir = std::env::var("F1_DATA_DIR").unwrap_or_else(|_| "data".to_string());
        let data_url = std::env::var("F1_DATA_URL").ok().filter(|s| !s.is_empty());
        let session_cache_size = match std::env::var("SESSION_CACHE_SIZE") {
            Ok(raw) => raw
                .parse::<usize>()
                .with_context(|| format!("SESSION_CACHE_SIZE is not a number: '{raw}'"))?,
            Err(_) => DEFAULT_SESSION_CACHE_SIZE,
        };
        let circuits_file = std::env::var("CIRCUITS_FILE").ok().map(PathBuf::from);

        Ok(Self {
            data_dir: PathBuf::from(data_dir),
            data_url,
            session_cache_size,
            circuits_file,
        })
    }
}

/// Maps circuit names to track lengths in kilometres.
///
/// Stored as a plain JSON object on disk:
/// ```json
/// {
///   "Yas Marina Circuit": 5.281,
///   "Monaco": 3.337
/// }
/// ```
#[derive(Debug, Default, Clone)]
pub struct CircuitConfig {
    lengths_km: HashMap<String, f64>,
}

impl CircuitConfig {
    pub fn load(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading circuit config {}", path.display()))?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let lengths_km: HashMap<String, f64> = serde_json::from_str(content)?;
        Ok(Self { lengths_km })
    }

    /// Case-insensitive lookup; only positive finite lengths are returned.
    pub fn track_length_km(&self, circuit: &str) -> Option<f64> {
        self.lengths_km
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(circuit))
            .map(|(_, km)| *km)
            .filter(|km| km.is_finite() && *km > 0.0)
    }

    /// Engine config with the track length swapped in for `circuit`, if known.
    pub fn engine_config_for(&self, base: &EngineConfig, circuit: Option<&str>) -> EngineConfig {
        match circuit.and_then(|c| self.track_length_km(c)) {
            Some(km) => base.clone().with_track_length(km),
            None => base.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_engine_config() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.plausibility_window, Some(TimeWindow::new(60.0, 300.0)));
        assert_eq!(cfg.histogram_bins.get(), 20);
        assert_eq!(cfg.track_length_km, 5.0);
        assert_eq!(cfg.telemetry_slack_s, 10.0);
    }

    #[test]
    fn test_time_window_bounds() {
        let w = TimeWindow::new(60.0, 200.0);
        assert!(w.contains(60.0));
        assert!(!w.contains_strict(60.0));
        assert!(w.contains_strict(60.001));
        assert!(!w.contains_strict(200.0));
    }

    #[test]
    fn test_circuit_lookup_is_case_insensitive() {
        let cfg = CircuitConfig::from_json(r#"{"Yas Marina Circuit": 5.281, "Broken": -1.0}"#)
            .unwrap();
        assert_eq!(cfg.track_length_km("yas marina circuit"), Some(5.281));
        assert_eq!(cfg.track_length_km("Broken"), None);
        assert_eq!(cfg.track_length_km("Monza"), None);
    }

    #[test]
    fn test_engine_config_for_circuit() {
        let cfg = CircuitConfig::from_json(r#"{"Monaco": 3.337}"#).unwrap();
        let base = EngineConfig::default();
        assert_eq!(
            cfg.engine_config_for(&base, Some("Monaco")).track_length_km,
            3.337
        );
        assert_eq!(cfg.engine_config_for(&base, None).track_length_km, 5.0);
    }
}
