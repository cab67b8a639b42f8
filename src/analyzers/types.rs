//! Data types used by the lap aggregation pipeline.
//!
//! Input and per-lap records use the PascalCase column names of the timing
//! data source (`LapTime`, `Sector1Time`, `SpeedI1`, ...). Derived statistics
//! and chart records use snake_case keys.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// One raw lap row as supplied by the session data source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
#[serde(default)]
pub struct RawLap {
    #[serde(deserialize_with = "de_driver_number")]
    pub driver_number: String,
    pub lap_number: Option<f64>,
    /// Seconds.
    pub lap_time: Option<f64>,
    pub sector1_time: Option<f64>,
    pub sector2_time: Option<f64>,
    pub sector3_time: Option<f64>,
    pub compound: Option<String>,
    pub tyre_life: Option<f64>,
    pub stint: Option<f64>,
    #[serde(deserialize_with = "de_opt_flag")]
    pub is_personal_best: Option<bool>,
    #[serde(deserialize_with = "de_opt_text")]
    pub track_status: Option<String>,
    pub position: Option<f64>,
    #[serde(rename = "SpeedI1")]
    pub speed_i1: Option<f64>,
    #[serde(rename = "SpeedI2")]
    pub speed_i2: Option<f64>,
    #[serde(rename = "SpeedFL")]
    pub speed_fl: Option<f64>,
    #[serde(rename = "SpeedST")]
    pub speed_st: Option<f64>,
    /// Session-relative seconds at which the lap started.
    pub lap_start_time: Option<f64>,
}

impl RawLap {
    /// Speed-trap readings in I1, I2, FL, ST order.
    pub fn speed_traps(&self) -> [Option<f64>; 4] {
        [self.speed_i1, self.speed_i2, self.speed_fl, self.speed_st]
    }
}

/// A single car telemetry sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TelemetrySample {
    /// Session-relative seconds.
    pub time: f64,
    #[serde(default)]
    pub speed: Option<f64>,
    #[serde(default, rename = "nGear", alias = "Gear")]
    pub gear: Option<i32>,
}

/// Where a lap's speed figures came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeedSource {
    SpeedTrap,
    Telemetry,
    Estimated,
}

/// A validated lap with canonical units and derived speed/gear figures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NormalizedLap {
    pub driver_number: String,
    pub lap_number: u32,
    pub lap_time: f64,
    pub lap_time_formatted: String,
    pub sector1_time: f64,
    pub sector2_time: f64,
    pub sector3_time: f64,
    pub sector1_formatted: String,
    pub sector2_formatted: String,
    pub sector3_formatted: String,
    pub compound: String,
    pub tyre_life: u32,
    pub stint: u32,
    pub is_personal_best: bool,
    pub lap_start_time: Option<f64>,
    pub track_status: String,
    pub position: u32,
    #[serde(rename = "SpeedI1")]
    pub speed_i1: f64,
    #[serde(rename = "SpeedI2")]
    pub speed_i2: f64,
    #[serde(rename = "SpeedFL")]
    pub speed_fl: f64,
    #[serde(rename = "SpeedST")]
    pub speed_st: f64,
    pub max_speed: f64,
    pub avg_speed: f64,
    pub speed_source: SpeedSource,
    pub gear_changes: u32,
    /// `true` when `gear_changes` comes from the lap-time heuristic rather
    /// than telemetry. The heuristic is an approximation, not a measurement.
    pub gear_changes_estimated: bool,
    pub max_speed_formatted: String,
    pub avg_speed_formatted: String,
}

impl NormalizedLap {
    pub fn has_valid_duration(&self) -> bool {
        self.lap_time.is_finite() && self.lap_time > 0.0
    }

    pub fn sectors(&self) -> [f64; 3] {
        [self.sector1_time, self.sector2_time, self.sector3_time]
    }

    pub fn has_all_sectors(&self) -> bool {
        self.sectors().iter().all(|s| *s > 0.0)
    }
}

/// Aggregate figures for one stint in [`LapStatistics`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StintSummary {
    pub laps: usize,
    pub best_lap: f64,
    pub avg_lap: f64,
    pub compound: String,
}

/// Summary statistics for one driver in one session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LapStatistics {
    pub total_laps: usize,
    pub best_lap_time: f64,
    pub best_lap_time_formatted: String,
    pub best_lap_number: u32,
    pub worst_lap_time: f64,
    pub worst_lap_time_formatted: String,
    pub average_lap_time: f64,
    pub average_lap_time_formatted: String,
    pub median_lap_time: f64,
    pub median_lap_time_formatted: String,
    pub q1_lap_time: f64,
    pub q1_lap_time_formatted: String,
    pub q3_lap_time: f64,
    pub q3_lap_time_formatted: String,
    pub personal_best_count: usize,
    pub stint_count: usize,
    pub compounds_used: Vec<String>,
    pub fastest_sector1: f64,
    pub fastest_sector2: f64,
    pub fastest_sector3: f64,
    pub fastest_sector1_formatted: String,
    pub fastest_sector2_formatted: String,
    pub fastest_sector3_formatted: String,
    pub consistency: f64,
    pub consistency_formatted: String,
    pub theoretical_best: f64,
    pub theoretical_best_formatted: String,
    pub gap_to_theoretical: Option<f64>,
    pub gap_to_theoretical_formatted: String,
    pub lap_time_range: f64,
    pub lap_time_range_formatted: String,
    pub stint_analysis: BTreeMap<u32, StintSummary>,
    pub top_speed: f64,
    pub top_speed_formatted: String,
    pub avg_top_speed: f64,
    pub avg_top_speed_formatted: String,
    pub overall_avg_speed: f64,
    pub overall_avg_speed_formatted: String,
    pub total_gear_changes: u64,
    pub avg_gear_changes_per_lap: f64,
    pub avg_gear_changes_formatted: String,
}

impl LapStatistics {
    /// The canonical value for a session with no usable laps.
    pub fn empty() -> Self {
        let na = || "N/A".to_string();
        Self {
            total_laps: 0,
            best_lap_time: 0.0,
            best_lap_time_formatted: na(),
            best_lap_number: 0,
            worst_lap_time: 0.0,
            worst_lap_time_formatted: na(),
            average_lap_time: 0.0,
            average_lap_time_formatted: na(),
            median_lap_time: 0.0,
            median_lap_time_formatted: na(),
            q1_lap_time: 0.0,
            q1_lap_time_formatted: na(),
            q3_lap_time: 0.0,
            q3_lap_time_formatted: na(),
            personal_best_count: 0,
            stint_count: 0,
            compounds_used: Vec::new(),
            fastest_sector1: 0.0,
            fastest_sector2: 0.0,
            fastest_sector3: 0.0,
            fastest_sector1_formatted: na(),
            fastest_sector2_formatted: na(),
            fastest_sector3_formatted: na(),
            consistency: 0.0,
            consistency_formatted: na(),
            theoretical_best: 0.0,
            theoretical_best_formatted: na(),
            gap_to_theoretical: None,
            gap_to_theoretical_formatted: na(),
            lap_time_range: 0.0,
            lap_time_range_formatted: na(),
            stint_analysis: BTreeMap::new(),
            top_speed: 0.0,
            top_speed_formatted: na(),
            avg_top_speed: 0.0,
            avg_top_speed_formatted: na(),
            overall_avg_speed: 0.0,
            overall_avg_speed_formatted: na(),
            total_gear_changes: 0,
            avg_gear_changes_per_lap: 0.0,
            avg_gear_changes_formatted: na(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.total_laps == 0
    }
}

impl Default for LapStatistics {
    fn default() -> Self {
        Self::empty()
    }
}

/// One point of the lap-time series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LapTimePoint {
    pub lap: u32,
    pub time: f64,
    pub time_formatted: String,
    pub compound: String,
    pub tyre_life: u32,
    pub stint: u32,
    pub is_personal_best: bool,
    pub track_status: String,
    pub position: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectorPoint {
    pub lap: u32,
    pub sector1: f64,
    pub sector2: f64,
    pub sector3: f64,
    pub total: f64,
    pub compound: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DegradationPoint {
    pub tyre_age: u32,
    pub lap_time: f64,
    pub lap_number: u32,
}

/// Per-compound performance and degradation curve.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TyrePerformance {
    pub laps: usize,
    pub best_lap: f64,
    pub avg_lap: f64,
    pub degradation_data: Vec<DegradationPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StintLapPoint {
    pub lap: u32,
    pub time: f64,
}

/// Per-stint lap series for charts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StintSeries {
    pub laps: usize,
    pub compound: String,
    pub start_lap: u32,
    pub end_lap: u32,
    pub best_lap: f64,
    pub avg_lap: f64,
    pub lap_times: Vec<StintLapPoint>,
}

/// Equal-width histogram: `bins.len() == counts.len() + 1` unless both are empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Histogram {
    pub bins: Vec<f64>,
    pub counts: Vec<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Quartiles {
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PerformanceDistribution {
    pub histogram: Histogram,
    pub quartiles: Option<Quartiles>,
}

/// Speed figures for one lap.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeedPoint {
    pub lap: u32,
    pub max_speed: f64,
    pub avg_speed: f64,
    pub source: SpeedSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speedi1: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speedi2: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speedfl: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speedst: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LapTimeRange {
    pub min: f64,
    pub max: f64,
    pub range: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChartSummary {
    pub total_laps: usize,
    pub valid_sectors: usize,
    pub compounds_used: Vec<String>,
    pub stint_count: usize,
    pub lap_time_range: LapTimeRange,
}

/// Everything the dashboard charts need for one driver.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChartDataset {
    pub lap_time_data: Vec<LapTimePoint>,
    pub sector_comparison: Vec<SectorPoint>,
    pub tyre_performance: BTreeMap<String, TyrePerformance>,
    pub stint_analysis: BTreeMap<u32, StintSeries>,
    pub performance_distribution: PerformanceDistribution,
    pub speed_analysis: Vec<SpeedPoint>,
    pub summary: ChartSummary,
}

impl ChartDataset {
    /// The canonical value for a session with no usable laps.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.lap_time_data.is_empty()
    }
}

/// A scalar that may arrive as text, a number or a flag.
#[derive(Deserialize)]
#[serde(untagged)]
pub(crate) enum TextOrNumber {
    Text(String),
    Int(i64),
    Float(f64),
    Flag(bool),
}

impl TextOrNumber {
    pub(crate) fn into_text(self) -> String {
        match self {
            TextOrNumber::Text(s) => s,
            TextOrNumber::Int(n) => n.to_string(),
            // 44.0 -> "44"
            TextOrNumber::Float(f) if f.fract() == 0.0 && f.is_finite() => {
                (f as i64).to_string()
            }
            TextOrNumber::Float(f) => f.to_string(),
            TextOrNumber::Flag(b) => b.to_string(),
        }
    }
}

/// Driver numbers arrive as either strings or numbers; always keep them as text.
pub(crate) fn de_driver_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<TextOrNumber>::deserialize(deserializer)?;
    Ok(value.map(|v| v.into_text().trim().to_string()).unwrap_or_default())
}

fn de_opt_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<TextOrNumber>::deserialize(deserializer)?;
    Ok(value.map(TextOrNumber::into_text).filter(|s| !s.is_empty()))
}

/// Accepts JSON booleans as well as "True"/"False"/"1"/"0" text from CSV exports.
fn de_opt_flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<TextOrNumber>::deserialize(deserializer)?;
    Ok(match value {
        None => None,
        Some(TextOrNumber::Flag(b)) => Some(b),
        Some(TextOrNumber::Int(n)) => Some(n != 0),
        Some(TextOrNumber::Float(f)) => Some(f != 0.0),
        Some(TextOrNumber::Text(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            _ => None,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_lap_accepts_numeric_driver() {
        let lap: RawLap = serde_json::from_str(
            r#"{"DriverNumber": 44, "LapNumber": 3.0, "LapTime": 91.2, "IsPersonalBest": "True"}"#,
        )
        .unwrap();
        assert_eq!(lap.driver_number, "44");
        assert_eq!(lap.lap_number, Some(3.0));
        assert_eq!(lap.is_personal_best, Some(true));
        assert_eq!(lap.sector1_time, None);
    }

    #[test]
    fn test_raw_lap_speed_trap_keys() {
        let lap: RawLap = serde_json::from_str(
            r#"{"DriverNumber": "1", "SpeedI1": 290.0, "SpeedFL": 280.5, "SpeedST": null}"#,
        )
        .unwrap();
        assert_eq!(lap.speed_traps(), [Some(290.0), None, Some(280.5), None]);
    }

    #[test]
    fn test_telemetry_sample_gear_key() {
        let s: TelemetrySample =
            serde_json::from_str(r#"{"Time": 12.5, "Speed": 301.0, "nGear": 8}"#).unwrap();
        assert_eq!(s.gear, Some(8));
        let s: TelemetrySample = serde_json::from_str(r#"{"Time": 1.0, "Gear": 3}"#).unwrap();
        assert_eq!(s.gear, Some(3));
        assert_eq!(s.speed, None);
    }

    #[test]
    fn test_empty_statistics_are_na() {
        let stats = LapStatistics::empty();
        assert!(stats.is_empty());
        assert_eq!(stats.best_lap_time_formatted, "N/A");
        assert_eq!(stats.gap_to_theoretical, None);
        assert!(stats.stint_analysis.is_empty());
    }
}
