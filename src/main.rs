mod commands;

use clap::{Parser, Subcommand};
use std::error::Error;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "gpxtools", about = "GPX file tools for processing outdoor activity data")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Parse and display GPX file information")]
    Parse {
        #[arg(help = "GPX file to parse")]
        file: PathBuf,
    },
    #[command(about = "Remove heart rate data from a GPX file")]
    StripHr {
        #[arg(help = "Input GPX file")]
        input: PathBuf,
        #[arg(help = "Output GPX file")]
        output: PathBuf,
    },
    #[command(about = "Replace heart rate data with generated values around an average")]
    ReplaceHr {
        #[arg(help = "Input GPX file")]
        input: PathBuf,
        #[arg(help = "Output GPX file")]
        output: PathBuf,
        #[arg(help = "Target average heart rate in bpm")]
        avg_hr: u32,
        #[arg(long, help = "Maximum deviation from the average in bpm [default: 10]")]
        variation: Option<u32>,
    },
    #[command(about = "Convert a GPX file to TCX format")]
    Convert {
        #[arg(help = "Input GPX file")]
        input: PathBuf,
        #[arg(help = "Output TCX file")]
        output: PathBuf,
    },
    #[command(subcommand, about = "Visualization commands for GPX data")]
    Plot(PlotCommand),
}

#[derive(Subcommand)]
enum PlotCommand {
    #[command(about = "Plot heart rate over time")]
    HeartRate {
        file: PathBuf,
        #[arg(long, default_value_t = 80, help = "Chart width in samples")]
        width: usize,
        #[arg(long, default_value_t = 20, help = "Chart height in rows")]
        height: usize,
    },
    #[command(about = "Plot pace (min/mile) over time")]
    Pace {
        file: PathBuf,
        #[arg(long, default_value_t = 80, help = "Chart width in samples")]
        width: usize,
        #[arg(long, default_value_t = 20, help = "Chart height in rows")]
        height: usize,
        #[arg(long, help = "Points in the smoothing window [default: 5]")]
        window: Option<usize>,
    },
    #[command(about = "Plot speed (mph) over time")]
    Speed {
        file: PathBuf,
        #[arg(long, default_value_t = 80, help = "Chart width in samples")]
        width: usize,
        #[arg(long, default_value_t = 20, help = "Chart height in rows")]
        height: usize,
        #[arg(long, help = "Points in the smoothing window [default: 5]")]
        window: Option<usize>,
    },
    #[command(about = "Plot elevation (feet) over time")]
    Elevation {
        file: PathBuf,
        #[arg(long, default_value_t = 80, help = "Chart width in samples")]
        width: usize,
        #[arg(long, default_value_t = 20, help = "Chart height in rows")]
        height: usize,
    },
}

fn main() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("GPXTOOLS_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let thresholds = gpxtools::Thresholds::from_env();

    match cli.command {
        Commands::Parse { file } => commands::parse::parse_command(&file, &thresholds),
        Commands::StripHr { input, output } => {
            commands::strip_hr::strip_hr_command(&input, &output, &thresholds)
        }
        Commands::ReplaceHr {
            input,
            output,
            avg_hr,
            variation,
        } => {
            let variation = variation.unwrap_or(thresholds.default_hr_variation);
            commands::replace_hr::replace_hr_command(&input, &output, avg_hr, variation, &thresholds)
        }
        Commands::Convert { input, output } => {
            commands::convert::convert_command(&input, &output, &thresholds)
        }
        Commands::Plot(plot) => {
            use commands::plot::Metric;
            let window = |w: Option<usize>| w.unwrap_or(thresholds.window_size);
            let (metric, file, width, height) = match plot {
                PlotCommand::HeartRate { file, width, height } => (Metric::HeartRate, file, width, height),
                PlotCommand::Pace {
                    file,
                    width,
                    height,
                    window: w,
                } => (Metric::Pace { window: window(w) }, file, width, height),
                PlotCommand::Speed {
                    file,
                    width,
                    height,
                    window: w,
                } => (Metric::Speed { window: window(w) }, file, width, height),
                PlotCommand::Elevation { file, width, height } => (Metric::Elevation, file, width, height),
            };
            commands::plot::plot_command(metric, &file, width, height, &thresholds)
        }
    }
}
