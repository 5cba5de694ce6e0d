//! Timestamped series for charting.
//!
//! Speed and pace come from a sliding window over each segment's timed
//! points: distance and time are summed across the plausible pairs around a
//! center point, and the whole window is dropped when the resulting estimate
//! is out of range.

use time::OffsetDateTime;
use tracing::debug;

use crate::config::Thresholds;
use crate::geo::{distance_2d, seconds_between};
use crate::heart_rate::point_heart_rate;
use crate::model::{Activity, Segment, TrackPoint};
use crate::units::{meters_to_miles, mps_to_mph};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub time: OffsetDateTime,
    pub value: f64,
}

impl Sample {
    pub fn new(time: OffsetDateTime, value: f64) -> Self {
        Self { time, value }
    }
}

/// Distance (m) and time (s) accumulated over one window.
#[derive(Debug, Clone, Copy)]
struct WindowTotals {
    distance: f64,
    seconds: f64,
}

impl WindowTotals {
    /// Average speed over the window, if it falls in the plausible range.
    fn speed(&self, t: &Thresholds) -> Option<f64> {
        if self.distance <= 0.0 || self.seconds <= 0.0 {
            return None;
        }
        let speed = self.distance / self.seconds;
        (t.min_speed_threshold_mps..=t.max_reasonable_speed_mps)
            .contains(&speed)
            .then_some(speed)
    }

    fn pace(&self, t: &Thresholds) -> Option<f64> {
        self.speed(t)?;
        let minutes_per_mile = self.seconds / meters_to_miles(self.distance) / 60.0;
        (t.min_pace_min_per_mile..=t.max_pace_min_per_mile)
            .contains(&minutes_per_mile)
            .then_some(minutes_per_mile)
    }
}

fn window_totals(points: &[&TrackPoint], t: &Thresholds) -> WindowTotals {
    let mut totals = WindowTotals {
        distance: 0.0,
        seconds: 0.0,
    };
    for pair in points.windows(2) {
        let Some(secs) = seconds_between(pair[0], pair[1]) else {
            continue;
        };
        let distance = distance_2d(pair[0], pair[1]);
        if t.is_valid_interval(secs) && distance > 0.0 {
            totals.distance += distance;
            totals.seconds += secs;
        }
    }
    totals
}

/// Slides a window over the segment's timed points and emits `estimate` for
/// each center that yields a value.
fn windowed<F>(segment: &Segment, window_size: usize, t: &Thresholds, estimate: F) -> Vec<Sample>
where
    F: Fn(&WindowTotals, &Thresholds) -> Option<f64>,
{
    let timed = segment.timed_points();
    let half = window_size / 2;
    let mut samples = Vec::new();

    for (i, point) in timed.iter().enumerate() {
        let start = i.saturating_sub(half);
        let end = (i + half + 1).min(timed.len());
        if end - start < 2 {
            continue;
        }
        let Some(time) = point.time else {
            continue;
        };
        if let Some(value) = estimate(&window_totals(&timed[start..end], t), t) {
            samples.push(Sample::new(time, value));
        }
    }

    debug!(
        timed = timed.len(),
        emitted = samples.len(),
        window_size,
        "windowed series"
    );
    samples
}

fn per_segment<F>(activity: &Activity, f: F) -> Vec<Sample>
where
    F: Fn(&Segment) -> Vec<Sample>,
{
    activity.segments().flat_map(f).collect()
}

/// Smoothed speed in mph.
pub fn speed_series(activity: &Activity, window_size: usize, t: &Thresholds) -> Vec<Sample> {
    per_segment(activity, |segment| {
        windowed(segment, window_size, t, |totals, t| totals.speed(t).map(mps_to_mph))
    })
}

/// Smoothed pace in minutes per mile.
pub fn pace_series(activity: &Activity, window_size: usize, t: &Thresholds) -> Vec<Sample> {
    per_segment(activity, |segment| {
        windowed(segment, window_size, t, WindowTotals::pace)
    })
}

/// First valid heart rate of every timestamped point.
pub fn heart_rate_series(activity: &Activity, t: &Thresholds) -> Vec<Sample> {
    activity
        .points()
        .filter_map(|p| Some(Sample::new(p.time?, point_heart_rate(p, t)?)))
        .collect()
}

/// Elevation in meters of every timestamped point that reports one.
pub fn elevation_series(activity: &Activity) -> Vec<Sample> {
    activity
        .points()
        .filter_map(|p| Some(Sample::new(p.time?, p.elevation?)))
        .collect()
}

/// Evenly picks at most `target` samples, always keeping the final one.
pub fn downsample(series: &[Sample], target: usize) -> Vec<Sample> {
    if series.len() <= target {
        return series.to_vec();
    }
    if target == 0 {
        return Vec::new();
    }

    let step = series.len() as f64 / target as f64;
    let mut sampled: Vec<Sample> = (0..target)
        .map(|i| series[((i as f64 * step) as usize).min(series.len() - 1)])
        .collect();
    if let (Some(last), Some(&final_sample)) = (sampled.last_mut(), series.last()) {
        *last = final_sample;
    }
    sampled
}
