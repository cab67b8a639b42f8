//! Turns raw lap rows into [`NormalizedLap`] records.
//!
//! Invalid rows (no lap number, no or non-positive lap time, or a lap time
//! outside the configured plausibility window) are skipped with a
//! [`LapError`]. Every kept lap gets canonical numeric fields, formatted
//! strings, speed figures and a gear-change count.

use tracing::debug;

use crate::analyzers::format::{format_lap_time, format_sector_time, format_speed};
use crate::analyzers::types::{NormalizedLap, RawLap, SpeedSource, TelemetrySample};
use crate::analyzers::utility::{max, mean};
use crate::config::EngineConfig;
use crate::error::LapError;

/// Ratio used to derive a max speed from an estimated average speed.
const ESTIMATED_MAX_TO_AVG: f64 = 1.3;

pub const UNKNOWN_COMPOUND: &str = "UNKNOWN";

/// Normalizes every valid lap in `raw_laps`, keeping input order.
///
/// `telemetry` is the car data of the same driver; each lap reads only the
/// samples inside its own time window.
pub fn normalize_laps(
    raw_laps: &[RawLap],
    telemetry: Option<&[TelemetrySample]>,
    config: &EngineConfig,
) -> Vec<NormalizedLap> {
    let mut laps = Vec::with_capacity(raw_laps.len());
    let mut skipped = 0usize;

    for raw in raw_laps {
        match normalize_lap(raw, telemetry, config) {
            Ok(lap) => laps.push(lap),
            Err(e) => {
                skipped += 1;
                debug!(driver = %raw.driver_number, error = %e, "Skipping lap");
            }
        }
    }

    debug!(kept = laps.len(), skipped, "Normalized laps");
    laps
}

/// Normalizes a single lap, or reports why it is not usable.
pub fn normalize_lap(
    raw: &RawLap,
    telemetry: Option<&[TelemetrySample]>,
    config: &EngineConfig,
) -> Result<NormalizedLap, LapError> {
    let lap_number = match raw.lap_number {
        Some(n) if n.is_finite() && n >= 0.0 => n as u32,
        _ => return Err(LapError::MissingLapNumber),
    };

    let lap_time = match raw.lap_time {
        None => return Err(LapError::MissingDuration { lap: lap_number }),
        Some(t) if t.is_nan() => return Err(LapError::MissingDuration { lap: lap_number }),
        Some(t) if !t.is_finite() || t <= 0.0 => {
            return Err(LapError::NonPositiveDuration {
                lap: lap_number,
                value: t,
            });
        }
        Some(t) => t,
    };

    if let Some(window) = config.plausibility_window {
        if !window.contains(lap_time) {
            return Err(LapError::OutsidePlausibilityWindow {
                lap: lap_number,
                value: lap_time,
                min: window.min,
                max: window.max,
            });
        }
    }

    let sector1_time = positive_or_zero(raw.sector1_time);
    let sector2_time = positive_or_zero(raw.sector2_time);
    let sector3_time = positive_or_zero(raw.sector3_time);

    let metrics = speed_metrics(raw, lap_time, telemetry, config);

    Ok(NormalizedLap {
        driver_number: raw.driver_number.clone(),
        lap_number,
        lap_time,
        lap_time_formatted: format_lap_time(lap_time),
        sector1_time,
        sector2_time,
        sector3_time,
        sector1_formatted: format_sector_time(sector1_time),
        sector2_formatted: format_sector_time(sector2_time),
        sector3_formatted: format_sector_time(sector3_time),
        compound: compound_label(raw.compound.as_deref()),
        tyre_life: count_or(raw.tyre_life, 0),
        stint: count_or(raw.stint, 1),
        is_personal_best: raw.is_personal_best.unwrap_or(false),
        lap_start_time: raw.lap_start_time.filter(|t| t.is_finite()),
        track_status: raw
            .track_status
            .clone()
            .unwrap_or_else(|| "Unknown".to_string()),
        position: count_or(raw.position, 0),
        speed_i1: positive_or_zero(raw.speed_i1),
        speed_i2: positive_or_zero(raw.speed_i2),
        speed_fl: positive_or_zero(raw.speed_fl),
        speed_st: positive_or_zero(raw.speed_st),
        max_speed: metrics.max_speed,
        avg_speed: metrics.avg_speed,
        speed_source: metrics.source,
        gear_changes: metrics.gear_changes,
        gear_changes_estimated: metrics.gear_changes_estimated,
        max_speed_formatted: format_speed(metrics.max_speed),
        avg_speed_formatted: format_speed(metrics.avg_speed),
    })
}

/// Estimated gear changes for a lap of `lap_time` seconds.
///
/// This is a lap-time heuristic used when no gear telemetry exists, not a
/// physical model:
/// - under 90s: `45 + trunc(2 * (90 - t))`
/// - 90s to under 100s: `35 + trunc(100 - t)`
/// - 100s and slower: `25`
pub fn estimate_gear_changes(lap_time: f64) -> u32 {
    if lap_time < 90.0 {
        45 + ((90.0 - lap_time) * 2.0) as u32
    } else if lap_time < 100.0 {
        35 + (100.0 - lap_time) as u32
    } else {
        25
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct SpeedMetrics {
    max_speed: f64,
    avg_speed: f64,
    source: SpeedSource,
    gear_changes: u32,
    gear_changes_estimated: bool,
}

fn speed_metrics(
    raw: &RawLap,
    lap_time: f64,
    telemetry: Option<&[TelemetrySample]>,
    config: &EngineConfig,
) -> SpeedMetrics {
    let mut max_speed = 0.0;
    let mut avg_speed = 0.0;
    let mut source = SpeedSource::Estimated;
    let mut gear_changes = None;

    let traps: Vec<f64> = raw
        .speed_traps()
        .into_iter()
        .flatten()
        .filter(|v| v.is_finite() && *v > 0.0)
        .collect();
    if let Some(top) = max(&traps) {
        max_speed = top;
        avg_speed = mean(&traps);
        source = SpeedSource::SpeedTrap;
    }

    if let (Some(samples), Some(start)) = (telemetry, raw.lap_start_time) {
        let end = start + lap_time + config.telemetry_slack_s;
        let window: Vec<&TelemetrySample> = samples
            .iter()
            .filter(|s| s.time >= start && s.time < end)
            .collect();

        let speeds: Vec<f64> = window
            .iter()
            .filter_map(|s| s.speed)
            .filter(|v| v.is_finite())
            .collect();
        if let Some(top) = max(&speeds) {
            let avg = mean(&speeds);
            if top > max_speed {
                max_speed = top;
                source = SpeedSource::Telemetry;
            }
            if avg > 0.0 {
                avg_speed = avg;
                source = SpeedSource::Telemetry;
            }
        }

        let gears: Vec<i32> = window.iter().filter_map(|s| s.gear).collect();
        gear_changes = count_gear_changes(&gears);
    }

    if max_speed == 0.0 && avg_speed == 0.0 {
        avg_speed = config.track_length_km / (lap_time / 3600.0);
        max_speed = avg_speed * ESTIMATED_MAX_TO_AVG;
        source = SpeedSource::Estimated;
    }

    let (gear_changes, gear_changes_estimated) = match gear_changes {
        Some(n) => (n, false),
        None => (estimate_gear_changes(lap_time), true),
    };

    SpeedMetrics {
        max_speed,
        avg_speed,
        source,
        gear_changes,
        gear_changes_estimated,
    }
}

/// Number of samples whose gear differs from the previous sample.
/// `None` when fewer than two gear samples exist.
fn count_gear_changes(gears: &[i32]) -> Option<u32> {
    if gears.len() < 2 {
        return None;
    }
    Some(gears.windows(2).filter(|w| w[0] != w[1]).count() as u32)
}

fn positive_or_zero(value: Option<f64>) -> f64 {
    value.filter(|v| v.is_finite() && *v > 0.0).unwrap_or(0.0)
}

fn count_or(value: Option<f64>, default: u32) -> u32 {
    match value {
        Some(v) if v.is_finite() && v >= 0.0 => v as u32,
        _ => default,
    }
}

fn compound_label(raw: Option<&str>) -> String {
    match raw.map(str::trim) {
        Some(c) if !c.is_empty() && !c.eq_ignore_ascii_case("nan") => c.to_string(),
        _ => UNKNOWN_COMPOUND.to_string(),
    }
}
