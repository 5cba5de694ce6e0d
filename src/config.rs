use tracing::warn;

/// Plausibility bounds and tunables shared by the statistics, time-series and
/// heart-rate code. Every call site reads its limits from here.
#[derive(Debug, Clone, PartialEq)]
pub struct Thresholds {
    pub min_time_interval_secs: f64,
    pub max_time_interval_secs: f64,
    /// Upper bound for a plausible speed (~200 mph).
    pub max_reasonable_speed_mps: f64,
    /// Lower bound for a windowed speed sample.
    pub min_speed_threshold_mps: f64,
    pub min_pace_min_per_mile: f64,
    pub max_pace_min_per_mile: f64,
    pub min_heart_rate: u32,
    pub max_heart_rate: u32,
    pub default_hr_variation: u32,
    /// Case-insensitive substrings identifying a heart-rate tag.
    pub heart_rate_indicators: Vec<String>,
    pub random_seed: u64,
    /// Pairs at or below this speed count as stopped for moving time.
    pub stopped_speed_kmh: f64,
    pub window_size: usize,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            min_time_interval_secs: 1.0,
            max_time_interval_secs: 60.0,
            max_reasonable_speed_mps: 90.0,
            min_speed_threshold_mps: 0.5,
            min_pace_min_per_mile: 2.0,
            max_pace_min_per_mile: 60.0,
            min_heart_rate: 30,
            max_heart_rate: 220,
            default_hr_variation: 10,
            heart_rate_indicators: vec!["hr".into(), "heartrate".into(), "bpm".into()],
            random_seed: 42,
            stopped_speed_kmh: 1.0,
            window_size: 5,
        }
    }
}

impl Thresholds {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds thresholds from the defaults, overriding any value the lookup
    /// yields under its `GPXTOOLS_*` key. Values that fail to parse are ignored.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        fn set<T: std::str::FromStr>(
            lookup: &impl Fn(&str) -> Option<String>,
            key: &str,
            slot: &mut T,
        ) {
            if let Some(value) = lookup(key).and_then(|s| s.trim().parse().ok()) {
                *slot = value;
            }
        }

        let mut t = Self::default();
        set(&lookup, "GPXTOOLS_MIN_TIME_INTERVAL_SECS", &mut t.min_time_interval_secs);
        set(&lookup, "GPXTOOLS_MAX_TIME_INTERVAL_SECS", &mut t.max_time_interval_secs);
        set(&lookup, "GPXTOOLS_MAX_SPEED_MPS", &mut t.max_reasonable_speed_mps);
        set(&lookup, "GPXTOOLS_MIN_SPEED_MPS", &mut t.min_speed_threshold_mps);
        set(&lookup, "GPXTOOLS_MIN_PACE", &mut t.min_pace_min_per_mile);
        set(&lookup, "GPXTOOLS_MAX_PACE", &mut t.max_pace_min_per_mile);
        set(&lookup, "GPXTOOLS_MIN_HEART_RATE", &mut t.min_heart_rate);
        set(&lookup, "GPXTOOLS_MAX_HEART_RATE", &mut t.max_heart_rate);
        set(&lookup, "GPXTOOLS_HR_VARIATION", &mut t.default_hr_variation);
        set(&lookup, "GPXTOOLS_RANDOM_SEED", &mut t.random_seed);
        set(&lookup, "GPXTOOLS_STOPPED_SPEED_KMH", &mut t.stopped_speed_kmh);
        set(&lookup, "GPXTOOLS_WINDOW_SIZE", &mut t.window_size);

        if t.min_heart_rate > t.max_heart_rate {
            warn!(
                min = t.min_heart_rate,
                max = t.max_heart_rate,
                "inverted heart rate bounds, keeping defaults"
            );
            let defaults = Self::default();
            t.min_heart_rate = defaults.min_heart_rate;
            t.max_heart_rate = defaults.max_heart_rate;
        }

        if let Some(list) = lookup("GPXTOOLS_HR_INDICATORS") {
            let indicators: Vec<String> = list
                .split(',')
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect();
            if !indicators.is_empty() {
                t.heart_rate_indicators = indicators;
            }
        }

        t
    }

    pub fn is_valid_interval(&self, secs: f64) -> bool {
        (self.min_time_interval_secs..=self.max_time_interval_secs).contains(&secs)
    }

    pub fn is_valid_heart_rate(&self, bpm: f64) -> bool {
        (f64::from(self.min_heart_rate)..=f64::from(self.max_heart_rate)).contains(&bpm)
    }

    /// True when a lower-cased tag or text contains a heart-rate indicator.
    pub fn mentions_heart_rate(&self, lowered: &str) -> bool {
        self.heart_rate_indicators
            .iter()
            .any(|indicator| lowered.contains(indicator.as_str()))
    }
}
