use crate::analyzers::aggregate::{
    check_numeric_fields, compounds_used, distinct_stints, valid_range_subset,
};
use crate::analyzers::types::{
    ChartDataset, ChartSummary, DegradationPoint, LapTimePoint, LapTimeRange, NormalizedLap,
    PerformanceDistribution, Quartiles, SectorPoint, SpeedPoint, StintLapPoint, StintSeries,
    TyrePerformance,
};
use crate::analyzers::utility::{histogram, max, mean, min, quantile_sorted, sorted};
use crate::config::TimeWindow;
use crate::error::LapError;
use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use tracing::warn;

/// Builds every chart series for one driver's laps.
///
/// Never fails: empty input and corrupt records produce
/// [`ChartDataset::empty`].
pub fn build_chart_dataset(
    laps: &[NormalizedLap],
    valid_range: TimeWindow,
    bins: NonZeroUsize,
) -> ChartDataset {
    match try_build_chart_dataset(laps, valid_range, bins) {
        Ok(dataset) => dataset,
        Err(e) => {
            warn!(error = %e, laps = laps.len(), "Chart data failed, returning empty dataset");
            ChartDataset::empty()
        }
    }
}

pub fn try_build_chart_dataset(
    laps: &[NormalizedLap],
    valid_range: TimeWindow,
    bins: NonZeroUsize,
) -> Result<ChartDataset, LapError> {
    let laps: Vec<&NormalizedLap> = laps.iter().filter(|l| l.has_valid_duration()).collect();
    if laps.is_empty() {
        return Ok(ChartDataset::empty());
    }
    for lap in &laps {
        check_numeric_fields(lap)?;
    }

    let sector_comparison: Vec<SectorPoint> = laps
        .iter()
        .filter(|l| l.has_all_sectors())
        .map(|l| SectorPoint {
            lap: l.lap_number,
            sector1: l.sector1_time,
            sector2: l.sector2_time,
            sector3: l.sector3_time,
            total: l.lap_time,
            compound: l.compound.clone(),
        })
        .collect();

    let ranged = valid_range_subset(&laps, valid_range);
    let ranged_times: Vec<f64> = ranged.iter().map(|l| l.lap_time).collect();
    let lap_time_range = match (min(&ranged_times), max(&ranged_times)) {
        (Some(lo), Some(hi)) => LapTimeRange {
            min: lo,
            max: hi,
            range: hi - lo,
        },
        _ => LapTimeRange::default(),
    };

    let summary = ChartSummary {
        total_laps: laps.len(),
        valid_sectors: sector_comparison.len(),
        compounds_used: compounds_used(&laps),
        stint_count: distinct_stints(&laps),
        lap_time_range,
    };

    Ok(ChartDataset {
        lap_time_data: laps.iter().map(|l| lap_time_point(l)).collect(),
        sector_comparison,
        tyre_performance: tyre_performance(&laps),
        stint_analysis: stint_series(&laps),
        performance_distribution: distribution(&ranged_times, bins),
        speed_analysis: laps.iter().map(|l| speed_point(l)).collect(),
        summary,
    })
}

fn lap_time_point(lap: &NormalizedLap) -> LapTimePoint {
    LapTimePoint {
        lap: lap.lap_number,
        time: lap.lap_time,
        time_formatted: lap.lap_time_formatted.clone(),
        compound: lap.compound.clone(),
        tyre_life: lap.tyre_life,
        stint: lap.stint,
        is_personal_best: lap.is_personal_best,
        track_status: lap.track_status.clone(),
        position: lap.position,
    }
}

fn speed_point(lap: &NormalizedLap) -> SpeedPoint {
    let reading = |v: f64| (v > 0.0).then_some(v);
    SpeedPoint {
        lap: lap.lap_number,
        max_speed: lap.max_speed,
        avg_speed: lap.avg_speed,
        source: lap.speed_source,
        speedi1: reading(lap.speed_i1),
        speedi2: reading(lap.speed_i2),
        speedfl: reading(lap.speed_fl),
        speedst: reading(lap.speed_st),
    }
}

/// Groups laps by compound; the degradation list keeps lap order.
fn tyre_performance(laps: &[&NormalizedLap]) -> BTreeMap<String, TyrePerformance> {
    let mut grouped: BTreeMap<String, Vec<&NormalizedLap>> = BTreeMap::new();
    for lap in laps {
        grouped.entry(lap.compound.clone()).or_default().push(lap);
    }

    grouped
        .into_iter()
        .map(|(compound, compound_laps)| {
            let times: Vec<f64> = compound_laps.iter().map(|l| l.lap_time).collect();
            let perf = TyrePerformance {
                laps: compound_laps.len(),
                best_lap: min(&times).unwrap_or(0.0),
                avg_lap: mean(&times),
                degradation_data: compound_laps
                    .iter()
                    .map(|l| DegradationPoint {
                        tyre_age: l.tyre_life,
                        lap_time: l.lap_time,
                        lap_number: l.lap_number,
                    })
                    .collect(),
            };
            (compound, perf)
        })
        .collect()
}

fn stint_series(laps: &[&NormalizedLap]) -> BTreeMap<u32, StintSeries> {
    let mut grouped: BTreeMap<u32, Vec<&NormalizedLap>> = BTreeMap::new();
    for lap in laps {
        grouped.entry(lap.stint).or_default().push(lap);
    }

    grouped
        .into_iter()
        .map(|(stint, stint_laps)| {
            let times: Vec<f64> = stint_laps.iter().map(|l| l.lap_time).collect();
            let numbers = stint_laps.iter().map(|l| l.lap_number);
            let series = StintSeries {
                laps: stint_laps.len(),
                compound: stint_laps[0].compound.clone(),
                start_lap: numbers.clone().min().unwrap_or(0),
                end_lap: numbers.max().unwrap_or(0),
                best_lap: min(&times).unwrap_or(0.0),
                avg_lap: mean(&times),
                lap_times: stint_laps
                    .iter()
                    .map(|l| StintLapPoint {
                        lap: l.lap_number,
                        time: l.lap_time,
                    })
                    .collect(),
            };
            (stint, series)
        })
        .collect()
}

fn distribution(times: &[f64], bins: NonZeroUsize) -> PerformanceDistribution {
    let ordered = sorted(times);
    let quartiles = match (ordered.first(), ordered.last()) {
        (Some(&lo), Some(&hi)) => Some(Quartiles {
            q1: quantile_sorted(&ordered, 0.25).unwrap_or(lo),
            median: quantile_sorted(&ordered, 0.5).unwrap_or(lo),
            q3: quantile_sorted(&ordered, 0.75).unwrap_or(hi),
            min: lo,
            max: hi,
        }),
        _ => None,
    };

    PerformanceDistribution {
        histogram: histogram(times, bins.get()),
        quartiles,
    }
}
