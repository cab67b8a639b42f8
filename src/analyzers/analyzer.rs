use serde::Serialize;
use tracing::{info, warn};

use crate::analyzers::aggregate::{compute_statistics, try_compute_statistics};
use crate::analyzers::charts::{build_chart_dataset, try_build_chart_dataset};
use crate::analyzers::normalize::normalize_laps;
use crate::analyzers::types::{
    ChartDataset, LapStatistics, NormalizedLap, RawLap, TelemetrySample,
};
use crate::config::{CircuitConfig, EngineConfig};
use crate::error::{LapError, SessionError};
use crate::session::{
    DriverInfo, EventInfo, SessionCache, SessionData, SessionKey, available_seasons,
};
use crate::stats::DriverSummary;

/// Most drivers a single comparison may ask for.
pub const MAX_COMPARED_DRIVERS: usize = 5;

/// Drivers included in a session summary unless told otherwise.
pub const DEFAULT_SUMMARY_LIMIT: usize = 10;

/// Normalized laps plus everything derived from them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LapAnalysis {
    pub lap_data: Vec<NormalizedLap>,
    pub statistics: LapStatistics,
    pub chart_data: ChartDataset,
}

/// Runs the whole lap pipeline. Never fails; corrupt data yields empty
/// statistics and charts.
pub fn analyze_laps(
    raw_laps: &[RawLap],
    telemetry: Option<&[TelemetrySample]>,
    config: &EngineConfig,
) -> LapAnalysis {
    let lap_data = normalize_laps(raw_laps, telemetry, config);
    let statistics = compute_statistics(&lap_data, config.valid_range);
    let chart_data = build_chart_dataset(&lap_data, config.valid_range, config.histogram_bins);
    LapAnalysis {
        lap_data,
        statistics,
        chart_data,
    }
}

/// Like [`analyze_laps`] but reports corrupt numeric fields.
pub fn try_analyze_laps(
    raw_laps: &[RawLap],
    telemetry: Option<&[TelemetrySample]>,
    config: &EngineConfig,
) -> Result<LapAnalysis, LapError> {
    let lap_data = normalize_laps(raw_laps, telemetry, config);
    let statistics = try_compute_statistics(&lap_data, config.valid_range)?;
    let chart_data =
        try_build_chart_dataset(&lap_data, config.valid_range, config.histogram_bins)?;
    Ok(LapAnalysis {
        lap_data,
        statistics,
        chart_data,
    })
}

/// Everything known about one driver in one session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriverReport {
    pub driver_info: DriverInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_info: Option<SessionKey>,
    #[serde(flatten)]
    pub analysis: LapAnalysis,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl DriverReport {
    fn new(
        session: &SessionData,
        driver: &str,
        session_info: Option<SessionKey>,
        analysis: LapAnalysis,
    ) -> Self {
        let message = analysis
            .lap_data
            .is_empty()
            .then(|| format!("No lap data found for driver {driver}"));
        Self {
            driver_info: session.driver_info(driver),
            session_info,
            analysis,
            message,
        }
    }
}

pub fn driver_report(
    session: &SessionData,
    driver: &str,
    session_info: Option<SessionKey>,
    config: &EngineConfig,
) -> DriverReport {
    let analysis = analyze_laps(
        &session.laps_for(driver),
        session.telemetry_for(driver),
        config,
    );
    DriverReport::new(session, driver, session_info, analysis)
}

/// One driver's slot in a comparison: either a report or the reason it failed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriverComparison {
    pub driver_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<Box<DriverReport>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    pub comparison_data: Vec<DriverComparison>,
    pub session_info: Option<SessionKey>,
}

/// Splits a comma separated driver list, dropping blanks.
pub fn parse_driver_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string)
        .collect()
}

/// Compares up to [`MAX_COMPARED_DRIVERS`] drivers. A driver whose laps
/// cannot be analysed gets an error entry; the others are unaffected.
pub fn compare_drivers(
    session: &SessionData,
    drivers: &[String],
    session_info: Option<SessionKey>,
    config: &EngineConfig,
) -> Result<Comparison, SessionError> {
    if drivers.len() > MAX_COMPARED_DRIVERS {
        return Err(SessionError::TooManyDrivers {
            requested: drivers.len(),
            max: MAX_COMPARED_DRIVERS,
        });
    }

    let comparison_data = drivers
        .iter()
        .map(|driver| {
            let analysis = try_analyze_laps(
                &session.laps_for(driver),
                session.telemetry_for(driver),
                config,
            );
            match analysis {
                Ok(analysis) => DriverComparison {
                    driver_number: driver.clone(),
                    report: Some(Box::new(DriverReport::new(
                        session,
                        driver,
                        session_info,
                        analysis,
                    ))),
                    error: None,
                },
                Err(e) => {
                    warn!(driver = %driver, error = %e, "Driver comparison failed");
                    DriverComparison {
                        driver_number: driver.clone(),
                        report: None,
                        error: Some(format!("Failed to load data for driver {driver}: {e}")),
                    }
                }
            }
        })
        .collect();

    Ok(Comparison {
        comparison_data,
        session_info,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub driver_number: String,
    pub driver_info: DriverInfo,
    pub lap_count: usize,
    pub best_lap_time: f64,
    pub best_lap_time_formatted: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FastestLap {
    pub driver_number: String,
    pub driver_info: DriverInfo,
    pub lap_time: f64,
    pub lap_time_formatted: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub drivers: Vec<SummaryRow>,
    pub fastest_lap: Option<FastestLap>,
    pub total_laps: usize,
    pub session_info: Option<SessionKey>,
}

/// Summarizes the first `limit` drivers of the session and picks the
/// fastest lap among them.
pub fn summarize_session(
    session: &SessionData,
    limit: usize,
    session_info: Option<SessionKey>,
    config: &EngineConfig,
) -> SessionSummary {
    let mut rows = Vec::new();
    let mut fastest: Option<FastestLap> = None;
    let mut total_laps = 0;

    for driver in session.drivers().into_iter().take(limit) {
        let laps = normalize_laps(
            &session.laps_for(&driver),
            session.telemetry_for(&driver),
            config,
        );
        let stats = compute_statistics(&laps, config.valid_range);
        let driver_info = session.driver_info(&driver);

        total_laps += laps.len();
        let quicker = fastest
            .as_ref()
            .is_none_or(|f| stats.best_lap_time < f.lap_time);
        if stats.best_lap_time > 0.0 && quicker {
            fastest = Some(FastestLap {
                driver_number: driver.clone(),
                driver_info: driver_info.clone(),
                lap_time: stats.best_lap_time,
                lap_time_formatted: stats.best_lap_time_formatted.clone(),
            });
        }

        rows.push(SummaryRow {
            driver_number: driver,
            driver_info,
            lap_count: laps.len(),
            best_lap_time: stats.best_lap_time,
            best_lap_time_formatted: stats.best_lap_time_formatted,
        });
    }

    SessionSummary {
        drivers: rows,
        fastest_lap: fastest,
        total_laps,
        session_info,
    }
}

/// One summary row per driver that has laps in the session.
pub fn all_drivers_comparison(
    session: &SessionData,
    session_info: Option<SessionKey>,
    config: &EngineConfig,
) -> Vec<DriverSummary> {
    let mut rows = Vec::new();

    for driver in session.drivers() {
        let laps = normalize_laps(
            &session.laps_for(&driver),
            session.telemetry_for(&driver),
            config,
        );
        if laps.is_empty() {
            continue;
        }

        let row = match try_compute_statistics(&laps, config.valid_range) {
            Ok(stats) => DriverSummary::from_statistics(&driver, &stats),
            Err(e) => {
                warn!(driver = %driver, error = %e, "Skipping corrupt driver data");
                DriverSummary::from_error(&driver, "corrupt_data", &e.to_string())
            }
        };
        let row = row.with_driver_info(&session.driver_info(&driver));
        rows.push(match &session_info {
            Some(key) => row.with_session(key),
            None => row,
        });
    }

    rows
}

/// Session-backed entry point used by the CLI: loads sessions through the
/// cache and picks per-circuit engine settings.
pub struct Analyzer {
    cache: SessionCache,
    engine: EngineConfig,
    circuits: CircuitConfig,
}

impl Analyzer {
    pub fn new(cache: SessionCache, engine: EngineConfig, circuits: CircuitConfig) -> Self {
        Self {
            cache,
            engine,
            circuits,
        }
    }

    pub fn cache(&self) -> &SessionCache {
        &self.cache
    }

    pub fn seasons(&self) -> Vec<i32> {
        available_seasons()
    }

    #[tracing::instrument(skip(self))]
    pub async fn events(&self, year: i32) -> Result<Vec<EventInfo>, SessionError> {
        let events = self.cache.schedule(year).await?;
        info!(year, events = events.len(), "Season events loaded");
        Ok(events)
    }

    #[tracing::instrument(skip(self), fields(key = %key))]
    pub async fn drivers(&self, key: SessionKey) -> Result<Vec<String>, SessionError> {
        Ok(self.cache.get(key).await?.drivers())
    }

    #[tracing::instrument(skip(self), fields(key = %key))]
    pub async fn driver_info(
        &self,
        key: SessionKey,
        driver: &str,
    ) -> Result<DriverInfo, SessionError> {
        Ok(self.cache.get(key).await?.driver_info(driver))
    }

    #[tracing::instrument(skip(self), fields(key = %key))]
    pub async fn driver_report(
        &self,
        key: SessionKey,
        driver: &str,
    ) -> Result<DriverReport, SessionError> {
        let session = self.cache.get(key).await?;
        let config = self.config_for(&session);
        let report = driver_report(&session, driver, Some(key), &config);
        info!(
            laps = report.analysis.lap_data.len(),
            best = %report.analysis.statistics.best_lap_time_formatted,
            "Driver report built"
        );
        Ok(report)
    }

    #[tracing::instrument(skip(self), fields(key = %key))]
    pub async fn compare(
        &self,
        key: SessionKey,
        drivers: &[String],
    ) -> Result<Comparison, SessionError> {
        if drivers.len() > MAX_COMPARED_DRIVERS {
            return Err(SessionError::TooManyDrivers {
                requested: drivers.len(),
                max: MAX_COMPARED_DRIVERS,
            });
        }
        let session = self.cache.get(key).await?;
        compare_drivers(&session, drivers, Some(key), &self.config_for(&session))
    }

    #[tracing::instrument(skip(self), fields(key = %key))]
    pub async fn summary(
        &self,
        key: SessionKey,
        limit: usize,
    ) -> Result<SessionSummary, SessionError> {
        let session = self.cache.get(key).await?;
        Ok(summarize_session(
            &session,
            limit,
            Some(key),
            &self.config_for(&session),
        ))
    }

    #[tracing::instrument(skip(self), fields(key = %key))]
    pub async fn all_drivers(&self, key: SessionKey) -> Result<Vec<DriverSummary>, SessionError> {
        let session = self.cache.get(key).await?;
        Ok(all_drivers_comparison(
            &session,
            Some(key),
            &self.config_for(&session),
        ))
    }

    /// Engine settings with the track length of the session's circuit.
    pub fn config_for(&self, session: &SessionData) -> EngineConfig {
        let circuit = session
            .circuit
            .as_deref()
            .or(Some(session.event_name.as_str()))
            .filter(|c| !c.is_empty());
        self.circuits.engine_config_for(&self.engine, circuit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{DriverResult, SessionSource, SessionType};
    use async_trait::async_trait;
    use std::sync::Arc;

    fn raw(driver: &str, lap: u32, time: f64) -> RawLap {
        RawLap {
            driver_number: driver.to_string(),
            lap_number: Some(lap as f64),
            lap_time: Some(time),
            ..Default::default()
        }
    }

    fn session() -> SessionData {
        SessionData {
            event_name: "Italian Grand Prix".to_string(),
            circuit: Some("Monza".to_string()),
            drivers: vec!["16".into(), "55".into(), "4".into()],
            results: vec![DriverResult {
                driver_number: "16".to_string(),
                abbreviation: Some("LEC".to_string()),
                ..Default::default()
            }],
            laps: vec![
                raw("16", 1, 85.2),
                raw("16", 2, 0.0),
                raw("16", 3, 84.1),
                raw("55", 1, 84.9),
                raw("55", 2, 84.6),
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_driver_report() {
        let report = driver_report(&session(), "16", None, &EngineConfig::default());
        assert_eq!(report.driver_info.abbreviation, "LEC");
        assert_eq!(report.analysis.lap_data.len(), 2);
        assert_eq!(report.analysis.statistics.best_lap_number, 3);
        assert_eq!(report.message, None);

        let json = serde_json::to_value(&report).unwrap();
        assert!(json.get("statistics").is_some());
        assert!(json.get("lap_data").is_some());
        assert!(json.get("message").is_none());
    }

    #[test]
    fn test_driver_report_without_laps() {
        let report = driver_report(&session(), "4", None, &EngineConfig::default());
        assert!(report.analysis.statistics.is_empty());
        assert!(report.analysis.chart_data.is_empty());
        assert_eq!(
            report.message.as_deref(),
            Some("No lap data found for driver 4")
        );
    }

    #[test]
    fn test_compare_limits_driver_count() {
        let drivers = parse_driver_list("1, 4,11,16,44,55");
        assert_eq!(drivers.len(), 6);
        assert!(matches!(
            compare_drivers(&session(), &drivers, None, &EngineConfig::default()),
            Err(SessionError::TooManyDrivers {
                requested: 6,
                max: 5
            })
        ));
    }

    #[test]
    fn test_compare_records_per_driver_failures() {
        let mut s = session();
        for lap in s.laps.iter_mut().filter(|l| l.driver_number == "16") {
            lap.speed_st = Some(331.0);
        }
        s.laps.push(raw("4", 1, 86.0));
        // driver 4 has no speed readings, so the broken track length
        // produces a non-finite estimate
        let config = EngineConfig::default().with_track_length(f64::INFINITY);

        let drivers = parse_driver_list("16,4");
        let cmp = compare_drivers(&s, &drivers, None, &config).unwrap();
        assert_eq!(cmp.comparison_data.len(), 2);
        assert!(cmp.comparison_data[0].report.is_some());
        let failed = &cmp.comparison_data[1];
        assert_eq!(failed.driver_number, "4");
        assert!(failed.report.is_none());
        assert!(failed.error.as_deref().unwrap().contains("driver 4"));
    }

    #[test]
    fn test_session_summary_picks_fastest_lap() {
        let summary = summarize_session(&session(), 10, None, &EngineConfig::default());
        assert_eq!(summary.drivers.len(), 3);
        assert_eq!(summary.total_laps, 4);
        let fastest = summary.fastest_lap.unwrap();
        assert_eq!(fastest.driver_number, "16");
        assert_eq!(fastest.lap_time, 84.1);
        assert_eq!(fastest.lap_time_formatted, "1:24.100");

        let limited = summarize_session(&session(), 1, None, &EngineConfig::default());
        assert_eq!(limited.drivers.len(), 1);
    }

    #[test]
    fn test_all_drivers_comparison_skips_drivers_without_laps() {
        let key = SessionKey::new(2024, 16, SessionType::R);
        let rows = all_drivers_comparison(&session(), Some(key), &EngineConfig::default());
        let drivers: Vec<&str> = rows.iter().map(|r| r.driver_number.as_str()).collect();
        assert_eq!(drivers, vec!["16", "55"]);
        assert_eq!(rows[1].best_lap, 84.6);
        assert!((rows[1].avg_lap - 84.75).abs() < 1e-9);
        assert_eq!(rows[0].round, Some(16));
    }

    struct MemorySource(SessionData);

    #[async_trait]
    impl SessionSource for MemorySource {
        async fn load_session(&self, _key: &SessionKey) -> Result<SessionData, SessionError> {
            Ok(self.0.clone())
        }

        async fn load_schedule(&self, _year: i32) -> Result<Vec<EventInfo>, SessionError> {
            Ok(Vec::new())
        }
    }

    fn analyzer() -> Analyzer {
        let circuits = CircuitConfig::from_json(r#"{"Monza": 5.793}"#).unwrap();
        let cache = SessionCache::new(Arc::new(MemorySource(session())), 4);
        Analyzer::new(cache, EngineConfig::default(), circuits)
    }

    #[tokio::test]
    async fn test_analyzer_uses_circuit_length() {
        let analyzer = analyzer();
        let key = SessionKey::new(2024, 16, SessionType::R);

        let report = analyzer.driver_report(key, "55").await.unwrap();
        let lap = &report.analysis.lap_data[0];
        // no speed data, so the estimate uses the Monza length
        assert!((lap.avg_speed - 5.793 / (84.9 / 3600.0)).abs() < 1e-9);
        assert_eq!(report.session_info, Some(key));

        assert_eq!(analyzer.drivers(key).await.unwrap(), vec!["16", "55", "4"]);
        assert_eq!(analyzer.cache().stats().misses, 1);
        assert_eq!(analyzer.cache().stats().hits, 1);
    }

    #[tokio::test]
    async fn test_analyzer_driver_info() {
        let analyzer = analyzer();
        let key = SessionKey::new(2024, 16, SessionType::R);

        let known = analyzer.driver_info(key, "16").await.unwrap();
        assert_eq!(known.abbreviation, "LEC");

        let unknown = analyzer.driver_info(key, "55").await.unwrap();
        assert_eq!(unknown.abbreviation, "UNK");
        assert_eq!(unknown.full_name, "Driver #55");

        let invalid = SessionKey::new(2024, 0, SessionType::R);
        assert!(matches!(
            analyzer.driver_info(invalid, "16").await,
            Err(SessionError::InvalidRound(0))
        ));
    }

    #[tokio::test]
    async fn test_analyzer_rejects_large_comparisons_before_loading() {
        let analyzer = analyzer();
        let key = SessionKey::new(2024, 16, SessionType::R);
        let drivers = parse_driver_list("1,2,3,4,5,6");
        assert!(analyzer.compare(key, &drivers).await.is_err());
        assert!(analyzer.cache().is_empty());
    }
}
