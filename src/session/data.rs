use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

use crate::analyzers::types::{RawLap, TelemetrySample, TextOrNumber, de_driver_number};

/// A fully loaded session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionData {
    pub event_name: String,
    pub circuit: Option<String>,
    #[serde(deserialize_with = "de_driver_list")]
    pub drivers: Vec<String>,
    pub results: Vec<DriverResult>,
    pub laps: Vec<RawLap>,
    /// Car telemetry keyed by driver number.
    pub car_data: HashMap<String, Vec<TelemetrySample>>,
}

impl SessionData {
    /// Driver numbers in session order, without blank or placeholder entries.
    /// Falls back to the classification when the session has no driver list.
    pub fn drivers(&self) -> Vec<String> {
        let listed: Vec<String> = self
            .drivers
            .iter()
            .filter_map(|d| clean_driver(d))
            .collect();
        if !listed.is_empty() {
            return listed;
        }
        self.results
            .iter()
            .filter_map(|r| clean_driver(&r.driver_number))
            .collect()
    }

    pub fn laps_for(&self, driver: &str) -> Vec<RawLap> {
        self.laps
            .iter()
            .filter(|l| l.driver_number == driver)
            .cloned()
            .collect()
    }

    pub fn telemetry_for(&self, driver: &str) -> Option<&[TelemetrySample]> {
        self.car_data
            .get(driver)
            .map(Vec::as_slice)
            .filter(|samples| !samples.is_empty())
    }

    pub fn driver_info(&self, driver: &str) -> DriverInfo {
        self.results
            .iter()
            .find(|r| r.driver_number == driver)
            .map(DriverInfo::from_result)
            .unwrap_or_else(|| DriverInfo::unknown(driver))
    }
}

fn clean_driver(raw: &str) -> Option<String> {
    let d = raw.trim();
    if d.is_empty() || d == "nan" || d.eq_ignore_ascii_case("none") {
        None
    } else {
        Some(d.to_string())
    }
}

fn de_driver_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = Option::<Vec<Option<TextOrNumber>>>::deserialize(deserializer)?;
    Ok(values
        .unwrap_or_default()
        .into_iter()
        .map(|v| v.map(TextOrNumber::into_text).unwrap_or_default())
        .collect())
}

/// One row of the session classification.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DriverResult {
    #[serde(deserialize_with = "de_driver_number")]
    pub driver_number: String,
    pub abbreviation: Option<String>,
    pub full_name: Option<String>,
    pub team_name: Option<String>,
    pub position: Option<f64>,
    pub points: Option<f64>,
    pub grid_position: Option<f64>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriverInfo {
    pub driver_number: String,
    pub abbreviation: String,
    pub full_name: String,
    pub team_name: String,
    pub position: Option<u32>,
    pub points: f64,
    pub grid_position: Option<u32>,
    pub status: String,
}

impl DriverInfo {
    /// Placeholder for a driver missing from the classification.
    pub fn unknown(driver: &str) -> Self {
        Self {
            driver_number: driver.to_string(),
            abbreviation: "UNK".to_string(),
            full_name: format!("Driver #{driver}"),
            team_name: "Unknown Team".to_string(),
            position: None,
            points: 0.0,
            grid_position: None,
            status: "Unknown".to_string(),
        }
    }

    fn from_result(result: &DriverResult) -> Self {
        let text = |v: &Option<String>, fallback: &str| {
            v.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .unwrap_or(fallback)
                .to_string()
        };
        let place = |v: Option<f64>| {
            v.filter(|p| p.is_finite() && *p >= 0.0)
                .map(|p| p as u32)
        };

        Self {
            driver_number: result.driver_number.clone(),
            abbreviation: text(&result.abbreviation, "UNK"),
            full_name: text(&result.full_name, "Unknown Driver"),
            team_name: text(&result.team_name, "Unknown Team"),
            position: place(result.position),
            points: result.points.filter(|p| p.is_finite()).unwrap_or(0.0),
            grid_position: place(result.grid_position),
            status: text(&result.status, "Unknown"),
        }
    }
}

/// One event row of a season schedule, as published by the data source.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ScheduleRow {
    pub round_number: Option<f64>,
    pub event_name: Option<String>,
    pub location: Option<String>,
    pub country: Option<String>,
    pub session1_date: Option<String>,
    pub session2_date: Option<String>,
    pub session3_date: Option<String>,
    pub session4_date: Option<String>,
    pub session5_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventInfo {
    pub round: u32,
    pub name: String,
    pub location: String,
    pub country: String,
    /// Race day, `YYYY-MM-DD`.
    pub date: String,
    pub session1_date: Option<String>,
    pub session2_date: Option<String>,
    pub session3_date: Option<String>,
    pub session4_date: Option<String>,
    pub session5_date: String,
}

impl EventInfo {
    /// Builds an event from a schedule row. Rows without a parseable race
    /// session date (testing events, cancelled rounds) give `None`.
    pub fn from_schedule_row(row: &ScheduleRow) -> Option<Self> {
        let race = row.session5_date.as_deref().and_then(parse_session_date)?;
        let text = |v: &Option<String>, fallback: &str| {
            v.clone()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| fallback.to_string())
        };
        let session = |v: &Option<String>| {
            v.as_deref()
                .and_then(parse_session_date)
                .map(|d| d.format(SESSION_FORMAT).to_string())
        };

        Some(Self {
            round: row
                .round_number
                .filter(|r| r.is_finite() && *r >= 0.0)
                .map_or(0, |r| r as u32),
            name: text(&row.event_name, "Unknown Event"),
            location: text(&row.location, "Unknown Location"),
            country: text(&row.country, "Unknown Country"),
            date: race.format("%Y-%m-%d").to_string(),
            session1_date: session(&row.session1_date),
            session2_date: session(&row.session2_date),
            session3_date: session(&row.session3_date),
            session4_date: session(&row.session4_date),
            session5_date: race.format(SESSION_FORMAT).to_string(),
        })
    }
}

const SESSION_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Keeps the events that have a race session.
pub fn events_from_schedule(rows: &[ScheduleRow]) -> Vec<EventInfo> {
    rows.iter().filter_map(EventInfo::from_schedule_row).collect()
}

/// Accepts RFC 3339 timestamps, `YYYY-MM-DD HH:MM[:SS]` (space or `T`) and
/// bare dates.
fn parse_session_date(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_local());
    }
    for fmt in [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}
