//! Headless pupilometry session runner.
//!
//! Opens a video file, plays it to the end through the measurement pipeline,
//! prints the session report as JSON and optionally writes the CSV export.

use anyhow::{bail, Result};
use clap::Parser;
use log::info;
use pupilometer::config::Config;
use pupilometer::session::PupilSession;
use pupilometer::video::VideoFile;
use std::io::Write;
use std::path::PathBuf;
use std::time::{Duration, Instant};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Video file to process
    video: PathBuf,

    /// Path to configuration file (YAML format)
    #[arg(short = 'C', long)]
    config: Option<PathBuf>,

    /// Playback speed multiplier
    #[arg(short, long, default_value = "1.0")]
    speed: f64,

    /// Disable jump rejection filtering
    #[arg(long)]
    no_filter: bool,

    /// Calibration scale override (pixels per millimeter)
    #[arg(long)]
    scale: Option<f64>,

    /// Write the tabular export to this CSV file
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Abort if the session has not ended after this many seconds
    #[arg(long, default_value = "600")]
    timeout: u64,

    /// Enable debug output
    #[arg(short, long)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.debug {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("debug"));
    } else {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    }

    let mut config = if let Some(config_path) = &args.config {
        info!("Loading configuration from: {}", config_path.display());
        Config::from_file(config_path)?
    } else {
        Config::default()
    };
    if args.no_filter {
        config.signal.filter_on = false;
    }
    if let Some(scale) = args.scale {
        config.signal.pixels_per_mm = scale;
    }
    config.validate()?;

    let source = VideoFile::open(&args.video)?;
    let session = PupilSession::open(Box::new(source), config)?;

    session.set_speed(args.speed);
    session.play();

    let deadline = Instant::now() + Duration::from_secs(args.timeout);
    loop {
        let metrics = session.metrics();
        if metrics.ended {
            break;
        }
        if Instant::now() > deadline {
            session.end();
            bail!("session did not finish within {} seconds", args.timeout);
        }
        std::thread::sleep(Duration::from_millis(100));
    }

    let report = session.report();
    info!(
        "Session finished: {} frames, {} blinks, mean {:.2} mm",
        report.stats.count, report.stats.blinks, report.stats.avg
    );
    println!("{}", serde_json::to_string_pretty(&report)?);

    if let Some(csv_path) = &args.csv {
        let mut file = std::fs::File::create(csv_path)?;
        writeln!(file, "Frame Index,Raw (mm),Smooth (mm),Pixels")?;
        for row in session.export_rows() {
            writeln!(file, "{},{:.2},{:.2},{:.1}", row.index, row.raw_mm, row.interp_mm, row.px)?;
        }
        info!("CSV export written to {}", csv_path.display());
    }

    Ok(())
}
