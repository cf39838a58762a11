use std::{env, io, path::PathBuf};

use anyhow::{Result, anyhow, bail};
use clap::Parser;
use jointstream::{
    config::{AppConfig, LinkConfig, TransportConfig},
    fusion::{FrameScheduler, PoseSink, RelativeRotationResolver, RigDriver},
    io::{IngestorHandle, SerialTransport, TcpTransport, TelemetryIngestor},
    math::quaternion::to_wxyz,
    telemetry::SampleStore,
    utils::CancellationToken,
};
use log::{debug, info};
use nalgebra::Quaternion;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "config/params.toml")]
    config: PathBuf,
}

/// Stand-in for the animation host: logs every pose it receives.
struct LogPoseSink;

impl PoseSink for LogPoseSink {
    fn set_bone_rotation(&mut self, bone: &str, rotation: Quaternion<f64>) {
        debug!("{bone}: {:?}", to_wxyz(&rotation));
    }
}

fn main() -> Result<()> {
    // Default log level to "info"
    if env::var("RUST_LOG").is_err() {
        unsafe { env::set_var("RUST_LOG", "info") }
    }

    pretty_env_logger::init();

    let args = Args::parse();
    let config = AppConfig::load(&args.config)?;

    if config.links.is_empty() {
        bail!("No links configured in '{}'", args.config.display());
    }

    let token = CancellationToken::new();
    {
        let token = token.clone();
        ctrlc::set_handler(move || {
            info!("Received shutdown signal");
            token.cancel();
        })?;
    }

    let ingestors = config
        .links
        .iter()
        .map(spawn_ingestor)
        .collect::<io::Result<Vec<_>>>()?;

    let stores: Vec<SampleStore> = ingestors.iter().map(|h| h.store().clone()).collect();

    let driver = RigDriver::new(
        RelativeRotationResolver::new(config.rig.joints.clone()),
        stores,
        LogPoseSink,
    );

    info!(
        "Driving {} joints at {} fps from {} link(s)",
        config.rig.joints.len(),
        config.rig.fps,
        ingestors.len()
    );

    FrameScheduler::from_fps(config.rig.fps, token)
        .spawn(driver)?
        .join()
        .map_err(|_| anyhow!("Frame scheduler panicked"))?;

    for (link, handle) in config.links.iter().zip(ingestors) {
        let stats = handle.stats();
        handle
            .join()
            .map_err(|_| anyhow!("Ingestor '{}' panicked", link.name))?;

        info!(
            "[{}] {} samples applied, {} malformed, {} reconnects",
            link.name,
            stats.applied(),
            stats.malformed(),
            stats.reconnects()
        );
    }

    Ok(())
}

fn spawn_ingestor(link: &LinkConfig) -> io::Result<IngestorHandle> {
    let store = SampleStore::new();

    match &link.transport {
        TransportConfig::Serial { port, baud_rate } => TelemetryIngestor::new(
            &link.name,
            SerialTransport::new(port, *baud_rate, link.read_timeout),
            store,
        )
        .with_retry_interval(link.retry_interval)
        .with_max_line_len(link.max_line_len)
        .spawn(),
        TransportConfig::Tcp { address } => TelemetryIngestor::new(
            &link.name,
            TcpTransport::new(address, link.read_timeout),
            store,
        )
        .with_retry_interval(link.retry_interval)
        .with_max_line_len(link.max_line_len)
        .spawn(),
    }
}
