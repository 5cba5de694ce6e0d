use gpxtools::units::format_stats;
use gpxtools::{Thresholds, compute_stats, load_activity};
use std::error::Error;
use std::path::Path;

pub fn parse_command(file: &Path, thresholds: &Thresholds) -> Result<(), Box<dyn Error>> {
    let activity = load_activity(file)?;
    let stats = compute_stats(&activity, thresholds);

    for line in format_stats(file, &activity, &stats) {
        println!("{line}");
    }

    Ok(())
}
