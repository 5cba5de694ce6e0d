use gpxtools::{Thresholds, convert_file};
use std::error::Error;
use std::path::Path;

pub fn convert_command(input: &Path, output: &Path, thresholds: &Thresholds) -> Result<(), Box<dyn Error>> {
    convert_file(input, output, thresholds)?;
    println!("Converted {} to {}", input.display(), output.display());
    Ok(())
}
