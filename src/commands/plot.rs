use gpxtools::chart::{
    create_elevation_chart, create_heart_rate_chart, create_pace_chart, create_speed_chart,
    validate_elevation, validate_heart_rate, validate_pace, validate_speed,
};
use gpxtools::series::{Sample, elevation_series, heart_rate_series, pace_series, speed_series};
use gpxtools::units::meters_to_feet;
use gpxtools::{Thresholds, load_activity};
use std::error::Error;
use std::path::Path;

#[derive(Debug, Clone, Copy)]
pub enum Metric {
    HeartRate,
    Pace { window: usize },
    Speed { window: usize },
    Elevation,
}

pub fn plot_command(
    metric: Metric,
    file: &Path,
    width: usize,
    height: usize,
    thresholds: &Thresholds,
) -> Result<(), Box<dyn Error>> {
    let activity = load_activity(file)?;

    let chart = match metric {
        Metric::HeartRate => {
            let series = heart_rate_series(&activity, thresholds);
            validate_heart_rate(&series, thresholds)?;
            create_heart_rate_chart(&series, width, height)
        }
        Metric::Pace { window } => {
            let series = pace_series(&activity, window, thresholds);
            validate_pace(&series, thresholds)?;
            create_pace_chart(&series, width, height)
        }
        Metric::Speed { window } => {
            let series = speed_series(&activity, window, thresholds);
            validate_speed(&series)?;
            create_speed_chart(&series, width, height)
        }
        Metric::Elevation => {
            let series: Vec<Sample> = elevation_series(&activity)
                .into_iter()
                .map(|s| Sample::new(s.time, meters_to_feet(s.value)))
                .collect();
            validate_elevation(&series)?;
            create_elevation_chart(&series, width, height)
        }
    };

    println!("{chart}");
    Ok(())
}
