use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::analyzers::types::LapStatistics;
use crate::session::{DriverInfo, SessionKey};

/// One flat row of the all-drivers comparison, suitable for CSV.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DriverSummary {
    pub timestamp: DateTime<Utc>,
    pub year: Option<i32>,
    pub round: Option<u32>,
    pub session_type: Option<String>,
    pub driver_number: String,
    pub abbreviation: Option<String>,
    pub team_name: Option<String>,

    // lap times
    pub total_laps: usize,
    pub best_lap: f64,
    pub best_lap_formatted: String,
    pub avg_lap: f64,
    pub consistency: f64,
    pub theoretical_best: f64,

    // speed
    pub top_speed: f64,

    // error tracking
    pub error_type: Option<String>,
    pub error_message: Option<String>,
}

impl DriverSummary {
    pub fn from_statistics(driver: &str, stats: &LapStatistics) -> Self {
        DriverSummary {
            timestamp: Utc::now(),
            driver_number: driver.to_string(),
            total_laps: stats.total_laps,
            best_lap: stats.best_lap_time,
            best_lap_formatted: stats.best_lap_time_formatted.clone(),
            avg_lap: stats.average_lap_time,
            consistency: stats.consistency,
            theoretical_best: stats.theoretical_best,
            top_speed: stats.top_speed,
            ..Default::default()
        }
    }

    /// Create an error record for a driver whose laps could not be analysed
    pub fn from_error(driver: &str, error_type: &str, error_message: &str) -> Self {
        DriverSummary {
            timestamp: Utc::now(),
            driver_number: driver.to_string(),
            best_lap_formatted: "N/A".to_string(),
            error_type: Some(error_type.to_string()),
            error_message: Some(error_message.to_string()),
            ..Default::default()
        }
    }

    pub fn with_driver_info(mut self, info: &DriverInfo) -> Self {
        self.abbreviation = Some(info.abbreviation.clone());
        self.team_name = Some(info.team_name.clone());
        self
    }

    pub fn with_session(mut self, key: &SessionKey) -> Self {
        self.year = Some(key.year);
        self.round = Some(key.round);
        self.session_type = Some(key.session_type.to_string());
        self
    }

    pub fn is_error(&self) -> bool {
        self.error_type.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionType;

    #[test]
    fn test_from_empty_statistics() {
        let row = DriverSummary::from_statistics("44", &LapStatistics::empty());
        assert_eq!(row.total_laps, 0);
        assert_eq!(row.best_lap_formatted, "N/A");
        assert!(!row.is_error());
    }

    #[test]
    fn test_from_error() {
        let row =
            DriverSummary::from_error("1", "corrupt_data", "lap 3 has a corrupt max_speed value");
        assert!(row.is_error());
        assert_eq!(row.driver_number, "1");
        assert_eq!(row.error_type.as_deref(), Some("corrupt_data"));
    }

    #[test]
    fn test_with_session_and_driver_info() {
        let key = SessionKey::new(2024, 8, SessionType::Q);
        let row = DriverSummary::from_statistics("16", &LapStatistics::empty())
            .with_session(&key)
            .with_driver_info(&DriverInfo::unknown("16"));
        assert_eq!(row.year, Some(2024));
        assert_eq!(row.session_type.as_deref(), Some("Q"));
        assert_eq!(row.abbreviation.as_deref(), Some("UNK"));
        assert_eq!(row.team_name.as_deref(), Some("Unknown Team"));
    }
}
