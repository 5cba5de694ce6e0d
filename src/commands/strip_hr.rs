use gpxtools::{Thresholds, strip_heart_rate_file};
use std::error::Error;
use std::path::Path;

pub fn strip_hr_command(input: &Path, output: &Path, thresholds: &Thresholds) -> Result<(), Box<dyn Error>> {
    strip_heart_rate_file(input, output, thresholds)?;
    println!("Heart rate data stripped: {}", output.display());
    Ok(())
}
