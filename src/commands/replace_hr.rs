use gpxtools::{Thresholds, replace_heart_rate_file};
use std::error::Error;
use std::path::Path;

pub fn replace_hr_command(
    input: &Path,
    output: &Path,
    avg_hr: u32,
    variation: u32,
    thresholds: &Thresholds,
) -> Result<(), Box<dyn Error>> {
    replace_heart_rate_file(input, output, avg_hr, variation, thresholds)?;
    println!(
        "Heart rate data replaced with {avg_hr}±{variation} bpm: {}",
        output.display()
    );
    Ok(())
}
