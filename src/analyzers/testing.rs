//! Builders for normalized laps used across the analyzer tests.

use crate::analyzers::format::{format_lap_time, format_sector_time, format_speed};
use crate::analyzers::types::{NormalizedLap, SpeedSource};

pub struct LapBuilder {
    lap: NormalizedLap,
}

pub fn lap(number: u32, time: f64) -> LapBuilder {
    LapBuilder {
        lap: NormalizedLap {
            driver_number: "44".to_string(),
            lap_number: number,
            lap_time: time,
            lap_time_formatted: format_lap_time(time),
            sector1_time: 0.0,
            sector2_time: 0.0,
            sector3_time: 0.0,
            sector1_formatted: "N/A".to_string(),
            sector2_formatted: "N/A".to_string(),
            sector3_formatted: "N/A".to_string(),
            compound: "UNKNOWN".to_string(),
            tyre_life: 0,
            stint: 1,
            is_personal_best: false,
            lap_start_time: None,
            track_status: "1".to_string(),
            position: 1,
            speed_i1: 0.0,
            speed_i2: 0.0,
            speed_fl: 0.0,
            speed_st: 0.0,
            max_speed: 0.0,
            avg_speed: 0.0,
            speed_source: SpeedSource::Estimated,
            gear_changes: 0,
            gear_changes_estimated: true,
            max_speed_formatted: "N/A".to_string(),
            avg_speed_formatted: "N/A".to_string(),
        },
    }
}

impl LapBuilder {
    pub fn sectors(mut self, s1: f64, s2: f64, s3: f64) -> Self {
        self.lap.sector1_time = s1;
        self.lap.sector2_time = s2;
        self.lap.sector3_time = s3;
        self.lap.sector1_formatted = format_sector_time(s1);
        self.lap.sector2_formatted = format_sector_time(s2);
        self.lap.sector3_formatted = format_sector_time(s3);
        self
    }

    pub fn stint(mut self, stint: u32, compound: &str) -> Self {
        self.lap.stint = stint;
        self.lap.compound = compound.to_string();
        self
    }

    pub fn tyre_life(mut self, laps: u32) -> Self {
        self.lap.tyre_life = laps;
        self
    }

    pub fn speeds(mut self, max: f64, avg: f64) -> Self {
        self.lap.max_speed = max;
        self.lap.avg_speed = avg;
        self.lap.max_speed_formatted = format_speed(max);
        self.lap.avg_speed_formatted = format_speed(avg);
        self
    }

    pub fn traps(mut self, i1: f64, i2: f64, fl: f64, st: f64) -> Self {
        self.lap.speed_i1 = i1;
        self.lap.speed_i2 = i2;
        self.lap.speed_fl = fl;
        self.lap.speed_st = st;
        self.lap.speed_source = SpeedSource::SpeedTrap;
        self
    }

    pub fn gears(mut self, changes: u32) -> Self {
        self.lap.gear_changes = changes;
        self
    }

    pub fn personal_best(mut self) -> Self {
        self.lap.is_personal_best = true;
        self
    }

    pub fn build(self) -> NormalizedLap {
        self.lap
    }
}
