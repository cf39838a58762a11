use std::{
    env,
    path::{Path, PathBuf},
    thread,
    time::Duration,
};

use anyhow::{Result, anyhow};
use clap::Parser;
use jointstream::{
    config::load_params,
    io::{ResilientLink, SerialTransport},
    nav::{MotionRegime, PositionTracker, TrackerConfig},
    utils::CancellationToken,
};
use log::{debug, info};
use nalgebra::Vector3;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    #[arg(short, long)]
    port: String,

    #[arg(short, long, default_value_t = 115200)]
    baud_rate: u32,

    #[arg(short, long, default_value_t = 1000)]
    timeout_ms: u64,

    /// Parameter file with a `tracker` section
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write the trajectory here on exit
    #[arg(long)]
    csv: Option<PathBuf>,
}

fn main() -> Result<()> {
    // Default log level to "info"
    if env::var("RUST_LOG").is_err() {
        unsafe { env::set_var("RUST_LOG", "info") }
    }

    pretty_env_logger::init();

    let args = Args::parse();

    let tracker_config = match &args.config {
        Some(path) => TrackerConfig::from_params(&load_params(path)?)?,
        None => TrackerConfig::default(),
    };

    let token = CancellationToken::new();
    {
        let token = token.clone();
        ctrlc::set_handler(move || {
            info!("Received shutdown signal");
            token.cancel();
        })?;
    }

    let (tx_line, rx_line) = flume::unbounded::<Vec<u8>>();

    let transport = SerialTransport::new(
        args.port.as_str(),
        args.baud_rate,
        Duration::from_millis(args.timeout_ms),
    );
    let mut link = ResilientLink::new("imu", transport, token.clone());
    let reader_token = token.clone();

    let reader = thread::Builder::new()
        .name("imu-reader".to_string())
        .spawn(move || {
            while !reader_token.is_cancelled() {
                if let Some(line) = link.next_line() {
                    if tx_line.send(line).is_err() {
                        break;
                    }
                }
            }
            link.disconnect();
        })?;

    let mut tracker = PositionTracker::new(tracker_config);

    // The reader drops its sender once cancelled, which ends this loop
    for line in rx_line.iter() {
        let line = String::from_utf8_lossy(&line);

        if let Some(step) = tracker.ingest_line(&line) {
            let p = step.position;
            match step.regime {
                MotionRegime::Moving => info!("Position: {:.4} {:.4} {:.4}", p.x, p.y, p.z),
                MotionRegime::Still => debug!("Still, position: {:.4} {:.4} {:.4}", p.x, p.y, p.z),
            }
        }
    }

    reader
        .join()
        .map_err(|_| anyhow!("IMU reader panicked"))?;

    info!(
        "Tracked {} samples, final position {:?}",
        tracker.trajectory().len(),
        tracker.current_position().as_slice()
    );

    if let Some(path) = &args.csv {
        write_trajectory(path, tracker.trajectory())?;
    }

    Ok(())
}

fn write_trajectory(path: &Path, trajectory: &[Vector3<f64>]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;

    writer.write_record(["x", "y", "z"])?;
    for p in trajectory {
        writer.serialize((p.x, p.y, p.z))?;
    }
    writer.flush()?;

    info!("Trajectory written to '{}'", path.display());

    Ok(())
}
