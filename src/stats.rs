use time::OffsetDateTime;
use tracing::debug;

use crate::config::Thresholds;
use crate::geo::{distance_2d, seconds_between};
use crate::heart_rate::heart_rates;
use crate::model::{Activity, Segment};

/// Summary of a whole GPX file. Absent metrics are `None`, never zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Stats {
    /// Meters, summed over every segment.
    pub total_distance: f64,
    /// Moving time in seconds.
    pub total_time: Option<f64>,
    /// Meters per second.
    pub max_speed: Option<f64>,
    pub avg_speed: Option<f64>,
    pub max_elevation: Option<f64>,
    pub min_elevation: Option<f64>,
    pub total_uphill: Option<f64>,
    pub total_downhill: Option<f64>,
    pub start_time: Option<OffsetDateTime>,
    pub end_time: Option<OffsetDateTime>,
    pub avg_heart_rate: Option<f64>,
    pub max_heart_rate: Option<f64>,
    pub activity_type: Option<String>,
}

/// Highest plausible speed in a segment, in m/s.
///
/// Only consecutive timestamped pairs whose interval lies within the
/// configured bounds and whose speed is physically plausible take part, so
/// duplicate timestamps, recording gaps and GPS jumps never set the maximum.
pub fn max_speed(segment: &Segment, t: &Thresholds) -> Option<f64> {
    let mut max: Option<f64> = None;
    let (mut accepted, mut rejected) = (0usize, 0usize);

    for pair in segment.points.windows(2) {
        let Some(secs) = seconds_between(&pair[0], &pair[1]) else {
            continue;
        };
        if !t.is_valid_interval(secs) {
            rejected += 1;
            continue;
        }

        let speed = distance_2d(&pair[0], &pair[1]) / secs;
        if !(0.0..=t.max_reasonable_speed_mps).contains(&speed) {
            rejected += 1;
            continue;
        }

        accepted += 1;
        max = Some(max.map_or(speed, |m: f64| m.max(speed)));
    }

    debug!(accepted, rejected, ?max, "max speed pairs");
    max
}

/// Activity label from the first track's `<type>`, falling back to a
/// file-level extension whose tag mentions "sport" or "activity".
pub fn activity_type(activity: &Activity) -> Option<String> {
    if let Some(kind) = activity
        .tracks
        .first()
        .and_then(|track| track.kind.as_deref())
        .map(str::trim)
        .filter(|kind| !kind.is_empty())
    {
        return Some(kind.to_string());
    }

    activity
        .extensions
        .iter()
        .filter(|ext| {
            let name = ext.local_name().to_lowercase();
            name.contains("sport") || name.contains("activity")
        })
        .find_map(|ext| ext.trimmed_text().map(str::to_string))
}

fn add(total: Option<f64>, value: Option<f64>) -> Option<f64> {
    match (total, value) {
        (Some(a), Some(b)) => Some(a + b),
        (a, b) => a.or(b),
    }
}

fn pick<T: Copy>(current: Option<T>, candidate: T, better: impl Fn(T, T) -> bool) -> Option<T> {
    match current {
        Some(value) if !better(candidate, value) => Some(value),
        _ => Some(candidate),
    }
}

/// Computes a fresh [`Stats`] for a parsed file.
pub fn compute_stats(activity: &Activity, t: &Thresholds) -> Stats {
    let mut stats = Stats::default();

    for segment in activity.segments() {
        stats.total_distance += segment.length_2d();
        stats.total_time = add(stats.total_time, segment.moving_time(t.stopped_speed_kmh));

        if let Some(speed) = max_speed(segment, t) {
            stats.max_speed = pick(stats.max_speed, speed, |a, b| a > b);
        }

        if let Some((up, down)) = segment.uphill_downhill() {
            stats.total_uphill = add(stats.total_uphill, Some(up));
            stats.total_downhill = add(stats.total_downhill, Some(down));
        }

        if let Some((lo, hi)) = segment.elevation_extremes() {
            stats.min_elevation = pick(stats.min_elevation, lo, |a, b| a < b);
            stats.max_elevation = pick(stats.max_elevation, hi, |a, b| a > b);
        }

        if let Some((start, end)) = segment.time_bounds() {
            stats.start_time = pick(stats.start_time, start, |a, b| a < b);
            stats.end_time = pick(stats.end_time, end, |a, b| a > b);
        }
    }

    if let Some(time) = stats.total_time
        && stats.total_distance > 0.0
        && time > 0.0
    {
        stats.avg_speed = Some(stats.total_distance / time);
    }

    let rates = heart_rates(activity, t);
    if !rates.is_empty() {
        stats.avg_heart_rate = Some(rates.iter().sum::<f64>() / rates.len() as f64);
        stats.max_heart_rate = rates.iter().copied().reduce(f64::max);
    }

    stats.activity_type = activity_type(activity);
    stats
}
