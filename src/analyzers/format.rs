//! Human-readable strings for lap figures.
//!
//! | Value              | Format        | Example      |
//! |--------------------|---------------|--------------|
//! | lap time           | `M:SS.mmm`    | `1:23.456`   |
//! | sector time        | `SS.mmms`     | `28.901s`    |
//! | speed              | `V.v km/h`    | `312.4 km/h` |
//! | spread / deviation | `S.sssS`      | `0.412s`     |
//! | gap                | `+S.sssS`     | `+0.118s`    |
//!
//! Zero, negative or non-finite input formats to `"N/A"` for the time and
//! speed formats. None of these functions can fail.

pub const NOT_AVAILABLE: &str = "N/A";

fn usable(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

/// Formats a lap time in seconds as `M:SS.mmm`.
pub fn format_lap_time(seconds: f64) -> String {
    if !usable(seconds) {
        return NOT_AVAILABLE.into();
    }
    // round once at millisecond precision so 59.9996 becomes 1:00.000
    let total_ms = (seconds * 1000.0).round() as u64;
    let minutes = total_ms / 60_000;
    let secs = (total_ms % 60_000) / 1000;
    let millis = total_ms % 1000;
    format!("{minutes}:{secs:02}.{millis:03}")
}

/// Formats a sector time in seconds as `SS.mmms`.
pub fn format_sector_time(seconds: f64) -> String {
    if !usable(seconds) {
        return NOT_AVAILABLE.into();
    }
    format!("{seconds:.3}s")
}

pub fn format_speed(kph: f64) -> String {
    if !usable(kph) {
        return NOT_AVAILABLE.into();
    }
    format!("{kph:.1} km/h")
}

/// Spread-like values (standard deviation, range) where zero is meaningful.
pub fn format_spread(seconds: f64) -> String {
    if !seconds.is_finite() || seconds < 0.0 {
        return NOT_AVAILABLE.into();
    }
    format!("{seconds:.3}s")
}

pub fn format_gap(seconds: Option<f64>) -> String {
    match seconds {
        Some(s) if s.is_finite() => {
            let s = if s == 0.0 { 0.0 } else { s };
            format!("{s:+.3}s")
        }
        _ => NOT_AVAILABLE.into(),
    }
}

pub fn format_count(value: f64) -> String {
    if !value.is_finite() {
        return NOT_AVAILABLE.into();
    }
    format!("{value:.1}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_lap_time() {
        assert_eq!(format_lap_time(83.456), "1:23.456");
        assert_eq!(format_lap_time(59.5), "0:59.500");
        assert_eq!(format_lap_time(125.0), "2:05.000");
        assert_eq!(format_lap_time(59.9996), "1:00.000");
    }

    #[test]
    fn test_format_lap_time_not_available() {
        assert_eq!(format_lap_time(0.0), "N/A");
        assert_eq!(format_lap_time(-3.0), "N/A");
        assert_eq!(format_lap_time(f64::NAN), "N/A");
        assert_eq!(format_lap_time(f64::INFINITY), "N/A");
    }

    #[test]
    fn test_format_sector_time() {
        assert_eq!(format_sector_time(28.9012), "28.901s");
        assert_eq!(format_sector_time(0.0), "N/A");
    }

    #[test]
    fn test_format_speed() {
        assert_eq!(format_speed(312.44), "312.4 km/h");
        assert_eq!(format_speed(0.0), "N/A");
        assert_eq!(format_speed(-1.0), "N/A");
    }

    #[test]
    fn test_format_spread_and_gap() {
        assert_eq!(format_spread(0.0), "0.000s");
        assert_eq!(format_spread(f64::NAN), "N/A");
        assert_eq!(format_gap(Some(0.0)), "+0.000s");
        assert_eq!(format_gap(Some(0.1184)), "+0.118s");
        assert_eq!(format_gap(Some(-0.0)), "+0.000s");
        assert_eq!(format_gap(Some(-30.0)), "-30.000s");
        assert_eq!(format_gap(None), "N/A");
    }

    #[test]
    fn test_format_count() {
        assert_eq!(format_count(38.26), "38.3");
        assert_eq!(format_count(f64::NAN), "N/A");
    }
}
