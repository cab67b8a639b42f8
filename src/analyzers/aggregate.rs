use crate::analyzers::format::{
    format_count, format_gap, format_lap_time, format_sector_time, format_speed, format_spread,
};
use crate::analyzers::normalize::UNKNOWN_COMPOUND;
use crate::analyzers::types::{LapStatistics, NormalizedLap, StintSummary};
use crate::analyzers::utility::{max, mean, min, quantile_sorted, sorted, stddev};
use crate::config::TimeWindow;
use crate::error::LapError;
use std::collections::BTreeMap;
use tracing::warn;

/// Stints need more than this many laps to show up in the breakdown.
const MIN_STINT_LAPS: usize = 2;

/// Computes [`LapStatistics`] for one driver's laps.
///
/// Never fails: empty input and corrupt records produce
/// [`LapStatistics::empty`]. Use [`try_compute_statistics`] to see the error.
pub fn compute_statistics(laps: &[NormalizedLap], valid_range: TimeWindow) -> LapStatistics {
    match try_compute_statistics(laps, valid_range) {
        Ok(stats) => stats,
        Err(e) => {
            warn!(error = %e, laps = laps.len(), "Statistics failed, returning empty result");
            LapStatistics::empty()
        }
    }
}

/// Like [`compute_statistics`] but reports corrupt numeric fields.
///
/// Laps with a non-positive or non-finite lap time are ignored. Distribution
/// figures (average, median, quartiles, consistency, range, fastest sectors)
/// use the laps strictly inside `valid_range`, or every lap when none are.
/// Best lap and theoretical best use every valid lap.
pub fn try_compute_statistics(
    laps: &[NormalizedLap],
    valid_range: TimeWindow,
) -> Result<LapStatistics, LapError> {
    let laps: Vec<&NormalizedLap> = laps.iter().filter(|l| l.has_valid_duration()).collect();
    if laps.is_empty() {
        return Ok(LapStatistics::empty());
    }
    for lap in &laps {
        check_numeric_fields(lap)?;
    }

    let ranged = valid_range_subset(&laps, valid_range);
    let ranged_times: Vec<f64> = ranged.iter().map(|l| l.lap_time).collect();
    let ranged_sorted = sorted(&ranged_times);

    // first lap with the lowest time and, on ties, the lowest lap number
    let best = laps
        .iter()
        .copied()
        .min_by(|a, b| {
            a.lap_time
                .total_cmp(&b.lap_time)
                .then(a.lap_number.cmp(&b.lap_number))
        })
        .ok_or(LapError::MissingDuration { lap: 0 })?;
    let all_times: Vec<f64> = laps.iter().map(|l| l.lap_time).collect();
    let worst_lap_time = max(&all_times).unwrap_or(0.0);

    let average_lap_time = mean(&ranged_times);
    let median_lap_time = quantile_sorted(&ranged_sorted, 0.5).unwrap_or(0.0);
    let q1_lap_time = quantile_sorted(&ranged_sorted, 0.25).unwrap_or(0.0);
    let q3_lap_time = quantile_sorted(&ranged_sorted, 0.75).unwrap_or(0.0);
    let consistency = stddev(&ranged_times, average_lap_time);
    let lap_time_range = match (min(&ranged_times), max(&ranged_times)) {
        (Some(lo), Some(hi)) => hi - lo,
        _ => 0.0,
    };

    // same lap set as `best`, so the sum never exceeds a completed lap
    let theoretical_best = match fastest_sectors(&laps) {
        [Some(s1), Some(s2), Some(s3)] => s1 + s2 + s3,
        _ => 0.0,
    };
    let fastest = fastest_sectors(&ranged);
    let gap_to_theoretical =
        (theoretical_best > 0.0).then(|| best.lap_time - theoretical_best);
    let [fastest_sector1, fastest_sector2, fastest_sector3] = fastest.map(|s| s.unwrap_or(0.0));

    let max_speeds: Vec<f64> = positive(laps.iter().map(|l| l.max_speed));
    let avg_speeds: Vec<f64> = positive(laps.iter().map(|l| l.avg_speed));
    let gear_changes: Vec<f64> = positive(laps.iter().map(|l| l.gear_changes as f64));

    let top_speed = max(&max_speeds).unwrap_or(0.0);
    let avg_top_speed = mean(&max_speeds);
    let overall_avg_speed = mean(&avg_speeds);
    let total_gear_changes: u64 = laps.iter().map(|l| l.gear_changes as u64).sum();
    let avg_gear_changes_per_lap = mean(&gear_changes);

    Ok(LapStatistics {
        total_laps: laps.len(),
        best_lap_time: best.lap_time,
        best_lap_time_formatted: format_lap_time(best.lap_time),
        best_lap_number: best.lap_number,
        worst_lap_time,
        worst_lap_time_formatted: format_lap_time(worst_lap_time),
        average_lap_time,
        average_lap_time_formatted: format_lap_time(average_lap_time),
        median_lap_time,
        median_lap_time_formatted: format_lap_time(median_lap_time),
        q1_lap_time,
        q1_lap_time_formatted: format_lap_time(q1_lap_time),
        q3_lap_time,
        q3_lap_time_formatted: format_lap_time(q3_lap_time),
        personal_best_count: laps.iter().filter(|l| l.is_personal_best).count(),
        stint_count: distinct_stints(&laps),
        compounds_used: compounds_used(&laps),
        fastest_sector1,
        fastest_sector2,
        fastest_sector3,
        fastest_sector1_formatted: format_sector_time(fastest_sector1),
        fastest_sector2_formatted: format_sector_time(fastest_sector2),
        fastest_sector3_formatted: format_sector_time(fastest_sector3),
        consistency,
        consistency_formatted: format_spread(consistency),
        theoretical_best,
        theoretical_best_formatted: format_lap_time(theoretical_best),
        gap_to_theoretical,
        gap_to_theoretical_formatted: format_gap(gap_to_theoretical),
        lap_time_range,
        lap_time_range_formatted: format_spread(lap_time_range),
        stint_analysis: stint_breakdown(&laps),
        top_speed,
        top_speed_formatted: format_speed(top_speed),
        avg_top_speed,
        avg_top_speed_formatted: format_speed(avg_top_speed),
        overall_avg_speed,
        overall_avg_speed_formatted: format_speed(overall_avg_speed),
        total_gear_changes,
        avg_gear_changes_per_lap,
        avg_gear_changes_formatted: if gear_changes.is_empty() {
            format_count(f64::NAN)
        } else {
            format_count(avg_gear_changes_per_lap)
        },
    })
}

/// Laps strictly inside `range`; every lap when that leaves nothing.
pub(crate) fn valid_range_subset<'a>(
    laps: &[&'a NormalizedLap],
    range: TimeWindow,
) -> Vec<&'a NormalizedLap> {
    let ranged: Vec<&NormalizedLap> = laps
        .iter()
        .copied()
        .filter(|l| range.contains_strict(l.lap_time))
        .collect();
    if ranged.is_empty() {
        laps.to_vec()
    } else {
        ranged
    }
}

/// Compounds in first-seen order, without the unknown placeholder.
pub(crate) fn compounds_used(laps: &[&NormalizedLap]) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for lap in laps {
        if lap.compound != UNKNOWN_COMPOUND && !seen.contains(&lap.compound) {
            seen.push(lap.compound.clone());
        }
    }
    seen
}

pub(crate) fn distinct_stints(laps: &[&NormalizedLap]) -> usize {
    let mut stints: Vec<u32> = laps.iter().map(|l| l.stint).collect();
    stints.sort_unstable();
    stints.dedup();
    stints.len()
}

fn fastest_sectors(laps: &[&NormalizedLap]) -> [Option<f64>; 3] {
    let mut best = [None; 3];
    for lap in laps {
        for (slot, value) in best.iter_mut().zip(lap.sectors()) {
            if value > 0.0 {
                *slot = Some(slot.map_or(value, |b: f64| b.min(value)));
            }
        }
    }
    best
}

fn stint_breakdown(laps: &[&NormalizedLap]) -> BTreeMap<u32, StintSummary> {
    let mut grouped: BTreeMap<u32, Vec<&NormalizedLap>> = BTreeMap::new();
    for lap in laps {
        grouped.entry(lap.stint).or_default().push(lap);
    }

    grouped
        .into_iter()
        .filter(|(_, stint_laps)| stint_laps.len() > MIN_STINT_LAPS)
        .map(|(stint, stint_laps)| {
            let times: Vec<f64> = stint_laps.iter().map(|l| l.lap_time).collect();
            let summary = StintSummary {
                laps: stint_laps.len(),
                best_lap: min(&times).unwrap_or(0.0),
                avg_lap: mean(&times),
                compound: stint_laps[0].compound.clone(),
            };
            (stint, summary)
        })
        .collect()
}

fn positive(values: impl Iterator<Item = f64>) -> Vec<f64> {
    values.filter(|v| *v > 0.0).collect()
}

pub(crate) fn check_numeric_fields(lap: &NormalizedLap) -> Result<(), LapError> {
    let fields = [
        ("sector1_time", lap.sector1_time),
        ("sector2_time", lap.sector2_time),
        ("sector3_time", lap.sector3_time),
        ("max_speed", lap.max_speed),
        ("avg_speed", lap.avg_speed),
    ];
    for (field, value) in fields {
        if !value.is_finite() {
            return Err(LapError::CorruptField {
                lap: lap.lap_number,
                field,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::testing::lap;

    fn range() -> TimeWindow {
        TimeWindow::new(60.0, 200.0)
    }

    #[test]
    fn test_scenario_with_zero_duration_lap() {
        let laps = vec![
            lap(1, 95.2).sectors(30.0, 31.0, 34.2).build(),
            lap(2, 0.0).build(),
            lap(3, 93.8).sectors(29.5, 30.5, 33.8).build(),
        ];

        let stats = compute_statistics(&laps, range());
        assert_eq!(stats.total_laps, 2);
        assert_eq!(stats.best_lap_time, 93.8);
        assert_eq!(stats.best_lap_number, 3);
        assert!((stats.theoretical_best - 93.8).abs() < 1e-9);
        assert!(stats.gap_to_theoretical.unwrap().abs() < 1e-9);
        assert_eq!(stats.best_lap_time_formatted, "1:33.800");
    }

    #[test]
    fn test_empty_input_is_canonical_empty() {
        assert_eq!(compute_statistics(&[], range()), LapStatistics::empty());
        let invalid = vec![lap(1, 0.0).build(), lap(2, -4.0).build()];
        assert_eq!(compute_statistics(&invalid, range()), LapStatistics::empty());
    }

    #[test]
    fn test_best_lap_tie_goes_to_lowest_lap_number() {
        let laps = vec![
            lap(7, 91.0).build(),
            lap(4, 90.5).build(),
            lap(2, 90.5).build(),
        ];
        let stats = compute_statistics(&laps, range());
        assert_eq!(stats.best_lap_number, 2);
        assert_eq!(stats.worst_lap_time, 91.0);
    }

    #[test]
    fn test_best_lap_uses_full_set() {
        // 55s lap is outside the valid range but still the best lap
        let laps = vec![lap(1, 55.0).build(), lap(2, 90.0).build(), lap(3, 92.0).build()];
        let stats = compute_statistics(&laps, range());
        assert_eq!(stats.best_lap_time, 55.0);
        assert_eq!(stats.average_lap_time, 91.0);
        assert_eq!(stats.consistency, 1.0);
    }

    #[test]
    fn test_consistency_single_lap_is_zero() {
        let stats = compute_statistics(&[lap(1, 90.0).build()], range());
        assert_eq!(stats.consistency, 0.0);
        assert_eq!(stats.consistency_formatted, "0.000s");
    }

    #[test]
    fn test_valid_range_fallback() {
        // every lap is outside 60..200, so the full set is used
        let laps = vec![lap(1, 230.0).build(), lap(2, 250.0).build()];
        let stats = compute_statistics(&laps, range());
        assert_eq!(stats.average_lap_time, 240.0);
        assert_eq!(stats.median_lap_time, 240.0);
        assert_eq!(stats.consistency, 10.0);
        assert_ne!(stats.median_lap_time_formatted, "N/A");
    }

    #[test]
    fn test_quartiles_interpolate() {
        let laps: Vec<_> = [90.0, 91.0, 92.0, 93.0]
            .iter()
            .enumerate()
            .map(|(i, t)| lap(i as u32 + 1, *t).build())
            .collect();
        let stats = compute_statistics(&laps, range());
        assert_eq!(stats.q1_lap_time, 90.75);
        assert_eq!(stats.median_lap_time, 91.5);
        assert_eq!(stats.q3_lap_time, 92.25);
        assert_eq!(stats.lap_time_range, 3.0);
    }

    #[test]
    fn test_theoretical_best_needs_every_sector() {
        let laps = vec![
            lap(1, 95.0).sectors(30.0, 31.0, 0.0).build(),
            lap(2, 94.0).sectors(29.0, 32.0, 0.0).build(),
        ];
        let stats = compute_statistics(&laps, range());
        assert_eq!(stats.theoretical_best, 0.0);
        assert_eq!(stats.gap_to_theoretical, None);
        assert_eq!(stats.gap_to_theoretical_formatted, "N/A");
        assert_eq!(stats.fastest_sector1, 29.0);
        assert_eq!(stats.fastest_sector3_formatted, "N/A");
    }

    #[test]
    fn test_theoretical_best_includes_laps_outside_valid_range() {
        // 60.0s is on the exclusive valid-range boundary but still the best lap
        let laps = vec![
            lap(1, 60.0).sectors(20.0, 20.0, 20.0).build(),
            lap(2, 90.0).sectors(30.0, 30.0, 30.0).build(),
        ];
        let stats = compute_statistics(&laps, range());
        assert_eq!(stats.best_lap_time, 60.0);
        assert_eq!(stats.theoretical_best, 60.0);
        assert_eq!(stats.gap_to_theoretical, Some(0.0));
        assert_eq!(stats.gap_to_theoretical_formatted, "+0.000s");
        // sector display fields stay on the valid-range subset
        assert_eq!(stats.fastest_sector1, 30.0);
    }

    #[test]
    fn test_personal_best_count() {
        let laps = vec![
            lap(1, 95.0).build(),
            lap(2, 94.0).personal_best().build(),
            lap(3, 93.5).personal_best().build(),
            lap(4, 0.0).personal_best().build(),
        ];
        let stats = compute_statistics(&laps, range());
        assert_eq!(stats.personal_best_count, 2);
    }

    #[test]
    fn test_stint_breakdown_skips_short_stints() {
        let laps = vec![
            lap(1, 95.0).stint(1, "SOFT").build(),
            lap(2, 94.0).stint(1, "SOFT").build(),
            lap(3, 93.0).stint(2, "HARD").build(),
            lap(4, 92.0).stint(2, "HARD").build(),
            lap(5, 94.0).stint(2, "HARD").build(),
        ];
        let stats = compute_statistics(&laps, range());
        assert_eq!(stats.stint_count, 2);
        assert!(!stats.stint_analysis.contains_key(&1));
        let hard = &stats.stint_analysis[&2];
        assert_eq!(hard.laps, 3);
        assert_eq!(hard.best_lap, 92.0);
        assert_eq!(hard.avg_lap, 93.0);
        assert_eq!(hard.compound, "HARD");
        assert_eq!(stats.compounds_used, vec!["SOFT", "HARD"]);
    }

    #[test]
    fn test_speed_and_gear_rollups() {
        let laps = vec![
            lap(1, 90.0).speeds(320.0, 210.0).gears(40).build(),
            lap(2, 91.0).speeds(310.0, 200.0).gears(50).build(),
        ];
        let stats = compute_statistics(&laps, range());
        assert_eq!(stats.top_speed, 320.0);
        assert_eq!(stats.avg_top_speed, 315.0);
        assert_eq!(stats.overall_avg_speed, 205.0);
        assert_eq!(stats.total_gear_changes, 90);
        assert_eq!(stats.avg_gear_changes_per_lap, 45.0);
        assert_eq!(stats.top_speed_formatted, "320.0 km/h");
        assert_eq!(stats.avg_gear_changes_formatted, "45.0");
    }

    #[test]
    fn test_corrupt_field_is_reported_and_swallowed() {
        let laps = vec![lap(1, 90.0).sectors(f64::NAN, 30.0, 30.0).build()];
        assert_eq!(
            try_compute_statistics(&laps, range()),
            Err(LapError::CorruptField {
                lap: 1,
                field: "sector1_time"
            })
        );
        assert_eq!(compute_statistics(&laps, range()), LapStatistics::empty());
    }
}
