//! Terminal line charts for the `plot` commands.

use crate::config::Thresholds;
use crate::series::{Sample, downsample};
use crate::units::{format_duration, format_heart_rate, format_pace};

/// Death Valley to Everest, in feet.
pub const MIN_ELEVATION_FEET: f64 = -282.0;
pub const MAX_ELEVATION_FEET: f64 = 29_032.0;

/// Renders `series` as a line chart `height` rows tall (plus one), with the
/// y-axis labelled by `label`. The largest value is on the top row.
pub fn plot<L>(series: &[f64], height: usize, label: L) -> String
where
    L: Fn(f64) -> String,
{
    let Some((min, max)) = series.iter().fold(None, |acc: Option<(f64, f64)>, &v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    }) else {
        return String::new();
    };

    let interval = max - min;
    let ratio = if interval > 0.0 { height as f64 / interval } else { 1.0 };
    let min2 = (min * ratio).floor() as i64;
    let max2 = (max * ratio).ceil() as i64;
    let rows = (max2 - min2).max(0) as usize;
    let level = |v: f64| (((v * ratio).round() as i64 - min2).clamp(0, rows as i64)) as usize;

    let labels: Vec<String> = (0..=rows)
        .map(|row| label(max - row as f64 * interval / rows.max(1) as f64))
        .collect();
    let label_width = labels.iter().map(|l| l.chars().count()).max().unwrap_or(0);

    let mut grid = vec![vec![' '; series.len()]; rows + 1];
    for (x, pair) in series.windows(2).enumerate() {
        let (y0, y1) = (level(pair[0]), level(pair[1]));
        if y0 == y1 {
            grid[rows - y0][x] = '─';
            continue;
        }
        grid[rows - y1][x] = if y0 > y1 { '╰' } else { '╭' };
        grid[rows - y0][x] = if y0 > y1 { '╮' } else { '╯' };
        for y in y0.min(y1) + 1..y0.max(y1) {
            grid[rows - y][x] = '│';
        }
    }

    let first_row = rows - level(series[0]);
    grid.iter()
        .zip(&labels)
        .enumerate()
        .map(|(row, (cells, text))| {
            let axis = if row == first_row { '┼' } else { '┤' };
            let line: String = cells.iter().collect();
            format!("{text:>label_width$}{axis}{line}").trim_end().to_string()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn values(series: &[Sample]) -> Vec<f64> {
    series.iter().map(|s| s.value).collect()
}

fn elapsed(series: &[Sample]) -> f64 {
    match (series.first(), series.last()) {
        (Some(first), Some(last)) => (last.time - first.time).as_seconds_f64(),
        _ => 0.0,
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn extremes(values: &[f64]) -> (f64, f64) {
    values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)))
}

fn titled(title: &str, chart: &str, summary: &str) -> String {
    format!("{title}\n\n{chart}\n\n{summary}")
}

pub fn create_heart_rate_chart(series: &[Sample], width: usize, height: usize) -> String {
    if series.is_empty() {
        return "No heart rate data available in the GPX file.".to_string();
    }
    let sampled = downsample(series, width);
    let hr = values(&sampled);
    let (min, max) = extremes(&hr);
    let chart = plot(&hr, height, |v| format!("{v:8.0} "));
    let summary = format!(
        "Duration: {}, Avg HR: {}, Max HR: {}, Min HR: {}",
        format_duration(elapsed(&sampled)),
        format_heart_rate(mean(&hr)),
        format_heart_rate(max),
        format_heart_rate(min)
    );
    titled("Heart Rate (BPM) over Time", &chart, &summary)
}

/// Pace chart with the fastest (lowest) pace drawn on top.
pub fn create_pace_chart(series: &[Sample], width: usize, height: usize) -> String {
    if series.is_empty() {
        return "No pace data available in the GPX file.".to_string();
    }
    let sampled = downsample(series, width);
    let pace = values(&sampled);
    let (fastest, slowest) = extremes(&pace);
    let inverted: Vec<f64> = pace.iter().map(|p| -p).collect();
    let chart = plot(&inverted, height, |v| format!("{:8.1} ", v.abs()));
    let summary = format!(
        "Duration: {}, Avg Pace: {}, Fastest: {}, Slowest: {}",
        format_duration(elapsed(&sampled)),
        format_pace(mean(&pace)),
        format_pace(fastest),
        format_pace(slowest)
    );
    titled("Pace (min/mile) over Time", &chart, &summary)
}

pub fn create_speed_chart(series: &[Sample], width: usize, height: usize) -> String {
    if series.is_empty() {
        return "No speed data available in the GPX file.".to_string();
    }
    let sampled = downsample(series, width);
    let speed = values(&sampled);
    let (min, max) = extremes(&speed);
    let chart = plot(&speed, height, |v| format!("{v:8.1} "));
    let summary = format!(
        "Duration: {}, Avg Speed: {:.1} mph, Max: {max:.1} mph, Min: {min:.1} mph",
        format_duration(elapsed(&sampled)),
        mean(&speed)
    );
    titled("Speed (mph) over Time", &chart, &summary)
}

/// Elevation chart; `series` is in feet.
pub fn create_elevation_chart(series: &[Sample], width: usize, height: usize) -> String {
    if series.is_empty() {
        return "No elevation data available in the GPX file.".to_string();
    }
    let sampled = downsample(series, width);
    let feet = values(&sampled);
    let (min, max) = extremes(&feet);
    let (mut gain, mut loss) = (0.0, 0.0);
    for pair in feet.windows(2) {
        let delta = pair[1] - pair[0];
        if delta > 0.0 {
            gain += delta;
        } else {
            loss -= delta;
        }
    }
    let chart = plot(&feet, height, |v| format!("{v:8.0} "));
    let summary = format!(
        "Duration: {}, Max: {max:.0} ft, Min: {min:.0} ft, Gain: {gain:.0} ft, Loss: {loss:.0} ft",
        format_duration(elapsed(&sampled))
    );
    titled("Elevation (feet) over Time", &chart, &summary)
}

fn check_count(series: &[Sample], what: &str) -> Result<(), String> {
    match series.len() {
        0 => Err(format!("No {what} data found in GPX file")),
        1 => Err(format!("Insufficient {what} data points for visualization")),
        _ => Ok(()),
    }
}

fn check_range(series: &[Sample], lo: f64, hi: f64, message: &str) -> Result<(), String> {
    let (min, max) = extremes(&values(series));
    if min < lo || max > hi {
        return Err(message.to_string());
    }
    Ok(())
}

pub fn validate_heart_rate(series: &[Sample], t: &Thresholds) -> Result<(), String> {
    check_count(series, "heart rate")?;
    check_range(
        series,
        f64::from(t.min_heart_rate),
        f64::from(t.max_heart_rate),
        "Heart rate data appears to be invalid (outside normal range)",
    )
}

pub fn validate_pace(series: &[Sample], t: &Thresholds) -> Result<(), String> {
    check_count(series, "pace")?;
    check_range(
        series,
        t.min_pace_min_per_mile,
        t.max_pace_min_per_mile,
        "Pace data appears to be invalid (outside normal range)",
    )
}

pub fn validate_speed(series: &[Sample]) -> Result<(), String> {
    check_count(series, "speed")
}

pub fn validate_elevation(series: &[Sample]) -> Result<(), String> {
    check_count(series, "elevation")?;
    check_range(
        series,
        MIN_ELEVATION_FEET,
        MAX_ELEVATION_FEET,
        "Elevation data appears to be invalid (outside reasonable range)",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;
    use time::macros::datetime;

    fn samples(values: &[f64]) -> Vec<Sample> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| Sample::new(datetime!(2023-01-01 10:00:00 UTC) + Duration::seconds(30 * i as i64), *v))
            .collect()
    }

    #[test]
    fn test_plot_rising_line() {
        let chart = plot(&[1.0, 2.0, 3.0], 2, |v| format!("{v:3.0} "));
        assert_eq!(chart, "  3 ┤ ╭\n  2 ┤╭╯\n  1 ┼╯");
    }

    #[test]
    fn test_plot_flat_and_empty() {
        let chart = plot(&[5.0, 5.0, 5.0], 4, |v| format!("{v:2.0} "));
        assert_eq!(chart, " 5 ┼──");
        assert_eq!(plot(&[], 10, |v| v.to_string()), "");
    }

    #[test]
    fn test_plot_vertical_runs() {
        let chart = plot(&[0.0, 3.0, 0.0], 3, |v| format!("{v:1.0}"));
        let lines: Vec<&str> = chart.lines().collect();
        assert_eq!(lines, vec!["3┤╭╮", "2┤││", "1┤││", "0┼╯╰"]);
    }

    #[test]
    fn test_heart_rate_chart() {
        let chart = create_heart_rate_chart(&samples(&[120.0, 140.0, 160.0]), 80, 10);
        assert!(chart.starts_with("Heart Rate (BPM) over Time\n\n"));
        assert!(chart.ends_with("Duration: 1:00, Avg HR: 140 bpm, Max HR: 160 bpm, Min HR: 120 bpm"));
        assert_eq!(
            create_heart_rate_chart(&[], 80, 10),
            "No heart rate data available in the GPX file."
        );
    }

    #[test]
    fn test_pace_chart_puts_fastest_on_top() {
        let chart = create_pace_chart(&samples(&[9.0, 8.0, 10.0]), 80, 4);
        let lines: Vec<&str> = chart.lines().collect();
        assert_eq!(lines[0], "Pace (min/mile) over Time");
        assert!(lines[2].trim_start().starts_with("8.0"));
        assert!(!chart.contains('-'));
        assert!(chart.ends_with("Avg Pace: 9:00 min/mi, Fastest: 8:00 min/mi, Slowest: 10:00 min/mi"));
    }

    #[test]
    fn test_speed_and_elevation_summaries() {
        let speed = create_speed_chart(&samples(&[10.0, 12.0, 14.0]), 80, 5);
        assert!(speed.starts_with("Speed (mph) over Time"));
        assert!(speed.ends_with("Avg Speed: 12.0 mph, Max: 14.0 mph, Min: 10.0 mph"));

        let elevation = create_elevation_chart(&samples(&[100.0, 150.0, 120.0, 130.0]), 80, 5);
        assert!(elevation.starts_with("Elevation (feet) over Time"));
        assert!(elevation.ends_with("Duration: 1:30, Max: 150 ft, Min: 100 ft, Gain: 60 ft, Loss: 30 ft"));
    }

    #[test]
    fn test_chart_downsamples_to_width() {
        let long: Vec<f64> = (0..500).map(|i| 100.0 + (i % 50) as f64).collect();
        let chart = create_heart_rate_chart(&samples(&long), 40, 10);
        let widest = chart.lines().map(|l| l.chars().count()).max().unwrap();
        assert!(widest < 120);
        assert!(chart.contains("Duration: 4:09:30"));
    }

    #[test]
    fn test_validators() {
        let t = Thresholds::default();
        assert_eq!(
            validate_heart_rate(&[], &t),
            Err("No heart rate data found in GPX file".to_string())
        );
        assert_eq!(
            validate_pace(&samples(&[8.0]), &t),
            Err("Insufficient pace data points for visualization".to_string())
        );
        assert!(validate_heart_rate(&samples(&[120.0, 221.0]), &t).is_err());
        assert!(validate_pace(&samples(&[1.5, 8.0]), &t).is_err());
        assert!(validate_elevation(&samples(&[-300.0, 100.0])).is_err());
        assert!(validate_speed(&samples(&[0.0, 500.0])).is_ok());
        assert!(validate_elevation(&samples(&[-282.0, 29032.0])).is_ok());
    }

    #[test]
    fn test_validators_follow_configured_limits() {
        let t = Thresholds {
            max_heart_rate: 240,
            max_pace_min_per_mile: 90.0,
            ..Thresholds::default()
        };
        assert!(validate_heart_rate(&samples(&[200.0, 230.0]), &t).is_ok());
        assert!(validate_heart_rate(&samples(&[200.0, 230.0]), &Thresholds::default()).is_err());
        assert!(validate_pace(&samples(&[8.0, 75.0]), &t).is_ok());
    }
}
