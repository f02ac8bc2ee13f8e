// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/headsense

//! HeadSense - Headphone and Audio-Device Detection Engine
//!
//! Runs one detection and prints it, or with `--watch` follows device
//! changes until Ctrl+C.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use headsense::hook::{HookSnapshot, StateSetter};
use headsense::{Config, DeviceStatus, Engine, Platform, VERSION};

/// HeadSense - Headphone and Audio-Device Detection Engine
#[derive(Parser, Debug)]
#[command(name = "headsense")]
#[command(author = "HeadSense Project")]
#[command(version = VERSION)]
#[command(about = "Multi-probe headphone detection with confidence scoring")]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Use the simulated platform
    #[arg(long)]
    demo: bool,

    /// Keep running and report every status change
    #[arg(short, long)]
    watch: bool,

    /// Print statuses as JSON
    #[arg(long)]
    json: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Enable trace-level logging
    #[arg(long)]
    trace: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Load or create configuration
    let config_path = args.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load_or_create(&config_path)?;
    if args.demo {
        config.demo_mode = true;
    }

    // Initialize logging; flags override the configured level
    let log_level = if args.trace {
        Level::TRACE
    } else if args.debug {
        Level::DEBUG
    } else {
        config.log_level.parse().unwrap_or(Level::INFO)
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_file(args.debug)
        .with_line_number(args.debug)
        .with_ansi(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("🎧 HeadSense v{}", VERSION);
    info!("Configuration loaded from {:?}", config_path);
    info!("Demo mode: {}", config.demo_mode);

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run(config, args))
}

async fn run(config: Config, args: Args) -> Result<()> {
    let (platform, demo) = build_platform(config.demo_mode);
    let mut engine = Engine::new(config, platform)?;

    if !args.watch {
        let status = engine.backend().current_status().await;
        print_status(&status, args.json)?;
        return Ok(());
    }

    engine.start().await?;

    let json = args.json;
    let setter: StateSetter = Arc::new(move |snapshot: &HookSnapshot| {
        if let Err(e) = print_snapshot(snapshot, json) {
            tracing::error!("Failed to print update: {}", e);
        }
    });
    let hook = engine.mount_hook(setter);

    let demo_task = demo.map(|demo| tokio::spawn(demo));

    info!("🚀 Watching for device changes");
    info!("   Press Ctrl+C to shutdown");
    tokio::signal::ctrl_c().await?;

    info!("Shutdown signal received, cleaning up...");
    if let Some(task) = demo_task {
        task.abort();
    }
    hook.unmount();
    engine.stop().await?;

    let metrics = engine.backend().metrics();
    println!("{}", serde_json::to_string_pretty(&metrics)?);
    let state = engine.state().await;
    info!(
        "HeadSense shutdown complete ({} detections, {} errors, up {}s)",
        state.detections, state.error_count, state.uptime_seconds
    );
    Ok(())
}

type DemoScript = std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>>;

/// Simulated platform plus a script that plugs headphones in and out
#[cfg(feature = "simulator")]
fn build_platform(demo: bool) -> (Platform, Option<DemoScript>) {
    use headsense::platform::{MediaDeviceInfo, PlatformKind, SimulatedPlatform};

    if !demo {
        return (Platform::unsupported(), None);
    }

    let sim = SimulatedPlatform::new();
    let platform = sim.platform(PlatformKind::Web);
    let script: DemoScript = Box::pin(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(4));
        interval.tick().await;
        let mut plugged = false;
        loop {
            interval.tick().await;
            if plugged {
                info!("[demo] Unplugging headphones");
                sim.unplug("hp-demo");
            } else {
                info!("[demo] Connecting Bluetooth headphones");
                sim.plug_in(MediaDeviceInfo::output(
                    "hp-demo",
                    "Sony WH-1000XM5 Bluetooth Headphones",
                    "grp-demo",
                ));
            }
            plugged = !plugged;
        }
    });
    (platform, Some(script))
}

#[cfg(not(feature = "simulator"))]
fn build_platform(demo: bool) -> (Platform, Option<DemoScript>) {
    if demo {
        tracing::warn!("Built without the simulator feature; demo mode unavailable");
    }
    (Platform::unsupported(), None)
}

fn print_status(status: &DeviceStatus, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(status)?);
    } else {
        println!(
            "connected: {}  type: {}  device: '{}'  confidence: {:.2}",
            status.is_connected, status.device_type, status.device_name, status.confidence
        );
    }
    Ok(())
}

fn print_snapshot(snapshot: &HookSnapshot, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(snapshot)?);
        return Ok(());
    }
    print_status(&snapshot.status, false)?;
    if let Some(error) = &snapshot.error {
        println!("  error: {} (after {} retries)", error, snapshot.retry_count);
    }
    Ok(())
}
