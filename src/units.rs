//! Imperial conversions and the human-readable report.

use std::path::Path;
use time::OffsetDateTime;
use time::macros::format_description;

use crate::model::Activity;
use crate::stats::Stats;

pub const FEET_PER_METER: f64 = 3.28084;
pub const MILES_PER_METER: f64 = 0.000621371;
pub const MPH_PER_MPS: f64 = 2.23694;

pub fn meters_to_feet(meters: f64) -> f64 {
    meters * FEET_PER_METER
}

pub fn meters_to_miles(meters: f64) -> f64 {
    meters * MILES_PER_METER
}

pub fn mps_to_mph(mps: f64) -> f64 {
    mps * MPH_PER_MPS
}

/// Miles with two decimals from one mile up, whole feet below.
pub fn format_distance(meters: f64) -> String {
    let miles = meters_to_miles(meters);
    if miles >= 1.0 {
        format!("{miles:.2} mi")
    } else {
        format!("{:.0} ft", meters_to_feet(meters))
    }
}

/// `H:MM:SS`, or `M:SS` under an hour.
pub fn format_duration(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    let (hours, minutes, secs) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes}:{secs:02}")
    }
}

pub fn format_speed(mps: f64) -> String {
    format!("{:.1} mph", mps_to_mph(mps))
}

pub fn format_elevation(meters: f64) -> String {
    format!("{:.0} ft", meters_to_feet(meters))
}

pub fn format_heart_rate(bpm: f64) -> String {
    format!("{bpm:.0} bpm")
}

/// Minutes per mile as `M:SS min/mi`.
pub fn format_pace(minutes_per_mile: f64) -> String {
    let minutes = minutes_per_mile.trunc();
    let seconds = ((minutes_per_mile - minutes) * 60.0) as u32;
    format!("{}:{seconds:02} min/mi", minutes as i64)
}

/// `trail_running` becomes `Trail Running`; absent or blank becomes `Unknown`.
pub fn format_activity_type(activity_type: Option<&str>) -> String {
    let Some(kind) = activity_type.filter(|k| !k.trim().is_empty()) else {
        return "Unknown".to_string();
    };

    let mut titled = String::with_capacity(kind.len());
    let mut word_start = true;
    for c in kind.replace('_', " ").chars() {
        if c.is_alphabetic() {
            if word_start {
                titled.extend(c.to_uppercase());
            } else {
                titled.extend(c.to_lowercase());
            }
            word_start = false;
        } else {
            titled.push(c);
            word_start = true;
        }
    }
    titled
}

/// Date and 12-hour clock time, keeping the recorded UTC offset.
pub fn format_timestamp(time: OffsetDateTime) -> String {
    let format = format_description!(
        "[year]-[month]-[day] [hour repr:12]:[minute]:[second] [period] [offset_hour sign:mandatory]:[offset_minute]"
    );
    time.format(format)
        .unwrap_or_else(|_| time.unix_timestamp().to_string())
}

/// Report lines for `parse`. Metrics the file does not provide are left out.
pub fn format_stats(path: &Path, activity: &Activity, stats: &Stats) -> Vec<String> {
    let mut lines = vec![
        format!("GPX File: {}", path.display()),
        format!("Tracks: {}", activity.track_count()),
        format!("Waypoints: {}", activity.waypoint_count()),
    ];
    if let Some(kind) = stats.activity_type.as_deref() {
        lines.push(format!("Activity: {}", format_activity_type(Some(kind))));
    }
    lines.push(String::new());

    let nonzero = |v: Option<f64>| v.filter(|v| *v != 0.0);

    if stats.total_distance > 0.0 {
        lines.push(format!("Distance: {}", format_distance(stats.total_distance)));
    }
    if let Some(time) = nonzero(stats.total_time) {
        lines.push(format!("Time: {}", format_duration(time)));
    }
    if let Some(speed) = nonzero(stats.avg_speed) {
        lines.push(format!("Average Speed: {}", format_speed(speed)));
    }
    if let Some(speed) = nonzero(stats.max_speed) {
        lines.push(format!("Max Speed: {}", format_speed(speed)));
    }
    if let Some(bpm) = stats.avg_heart_rate {
        lines.push(format!("Average Heart Rate: {}", format_heart_rate(bpm)));
    }
    if let Some(bpm) = stats.max_heart_rate {
        lines.push(format!("Max Heart Rate: {}", format_heart_rate(bpm)));
    }
    if let (Some(lo), Some(hi)) = (stats.min_elevation, stats.max_elevation) {
        lines.push(format!(
            "Elevation: {} - {}",
            format_elevation(lo),
            format_elevation(hi)
        ));
    }
    if let Some(up) = nonzero(stats.total_uphill) {
        lines.push(format!("Uphill: {}", format_elevation(up)));
    }
    if let Some(down) = nonzero(stats.total_downhill) {
        lines.push(format!("Downhill: {}", format_elevation(down)));
    }
    if let Some(start) = stats.start_time {
        lines.push(format!("Start: {}", format_timestamp(start)));
    }
    if let Some(end) = stats.end_time {
        lines.push(format!("End: {}", format_timestamp(end)));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_conversions() {
        assert!((meters_to_feet(1000.0) - 3280.84).abs() < 1e-9);
        assert!((meters_to_miles(1609.344) - 1.0).abs() < 1e-3);
        assert!((mps_to_mph(10.0) - 22.3694).abs() < 1e-9);
    }

    #[test]
    fn test_format_distance() {
        assert_eq!(format_distance(1610.0), "1.00 mi");
        assert_eq!(format_distance(1600.0), "5249 ft");
        assert_eq!(format_distance(16093.44), "10.00 mi");
        assert_eq!(format_distance(100.0), "328 ft");
        assert_eq!(format_distance(0.0), "0 ft");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0.0), "0:00");
        assert_eq!(format_duration(65.0), "1:05");
        assert_eq!(format_duration(3599.9), "59:59");
        assert_eq!(format_duration(3661.0), "1:01:01");
        assert_eq!(format_duration(36000.0), "10:00:00");
    }

    #[test]
    fn test_format_pace_and_speed() {
        assert_eq!(format_pace(8.5), "8:30 min/mi");
        assert_eq!(format_pace(10.0), "10:00 min/mi");
        assert_eq!(format_pace(7.25), "7:15 min/mi");
        assert_eq!(format_speed(4.4704), "10.0 mph");
        assert_eq!(format_elevation(100.0), "328 ft");
        assert_eq!(format_heart_rate(151.6), "152 bpm");
    }

    #[test]
    fn test_format_activity_type() {
        assert_eq!(format_activity_type(Some("cycling")), "Cycling");
        assert_eq!(format_activity_type(Some("trail_running")), "Trail Running");
        assert_eq!(format_activity_type(Some("MOUNTAIN BIKING")), "Mountain Biking");
        assert_eq!(format_activity_type(None), "Unknown");
        assert_eq!(format_activity_type(Some("")), "Unknown");
    }

    #[test]
    fn test_format_timestamp_keeps_offset() {
        assert_eq!(
            format_timestamp(datetime!(2023-06-15 14:30:05 UTC)),
            "2023-06-15 02:30:05 PM +00:00"
        );
        assert_eq!(
            format_timestamp(datetime!(2023-06-15 09:05:00 -07:00)),
            "2023-06-15 09:05:00 AM -07:00"
        );
    }

    #[test]
    fn test_format_stats_omits_absent_metrics() {
        let stats = Stats {
            total_distance: 2000.0,
            total_time: Some(600.0),
            avg_speed: Some(2000.0 / 600.0),
            ..Stats::default()
        };
        let lines = format_stats(Path::new("ride.gpx"), &Activity::default(), &stats);
        assert_eq!(
            lines,
            vec![
                "GPX File: ride.gpx",
                "Tracks: 0",
                "Waypoints: 0",
                "",
                "Distance: 1.24 mi",
                "Time: 10:00",
                "Average Speed: 7.5 mph",
            ]
        );
    }

    #[test]
    fn test_format_stats_full_report() {
        let stats = Stats {
            total_distance: 500.0,
            total_time: Some(100.0),
            max_speed: Some(6.0),
            avg_speed: Some(5.0),
            max_elevation: Some(20.0),
            min_elevation: Some(10.0),
            total_uphill: Some(10.0),
            total_downhill: Some(0.0),
            start_time: Some(datetime!(2023-01-01 10:00:00 UTC)),
            end_time: Some(datetime!(2023-01-01 10:01:40 UTC)),
            avg_heart_rate: Some(150.0),
            max_heart_rate: Some(160.0),
            activity_type: Some("running".into()),
        };
        let lines = format_stats(Path::new("run.gpx"), &Activity::default(), &stats);
        assert_eq!(lines[3], "Activity: Running");
        assert_eq!(lines[4], "");
        assert!(lines.contains(&"Max Speed: 13.4 mph".to_string()));
        assert!(lines.contains(&"Average Heart Rate: 150 bpm".to_string()));
        assert!(lines.contains(&"Elevation: 33 ft - 66 ft".to_string()));
        assert!(lines.contains(&"Uphill: 33 ft".to_string()));
        assert!(!lines.iter().any(|l| l.starts_with("Downhill")));
        assert_eq!(lines.last().unwrap(), "End: 2023-01-01 10:01:40 AM +00:00");
    }
}
