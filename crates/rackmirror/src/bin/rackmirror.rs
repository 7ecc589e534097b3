//! rackmirror daemon
//!
//! Runs the sync engine against an in-memory host at a fixed frame rate.
//! The host comes from a JSON patch fixture, or a small demo patch.

use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use rackconf::MirrorConfig;
use rackmirror::{MemoryHost, SyncEngine};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Mirror a patch to a renderer over OSC
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Config file, layered over the system and user config files
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Patch fixture (JSON) to host; the demo patch when omitted
    #[arg(short, long)]
    patch: Option<PathBuf>,

    /// Frames per second for the engine tick
    #[arg(long, default_value = "60")]
    fps: u32,

    /// Stop after this many seconds instead of waiting for the peer
    #[arg(long)]
    duration_secs: Option<u64>,

    /// Print the effective configuration and exit
    #[arg(long)]
    show_config: bool,
}

fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_host(patch: Option<&PathBuf>) -> Result<MemoryHost> {
    let Some(path) = patch else {
        return Ok(MemoryHost::demo());
    };
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read patch {}", path.display()))?;
    MemoryHost::from_json(&json).with_context(|| format!("Failed to parse patch {}", path.display()))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, sources) = MirrorConfig::load_with_sources_from(cli.config.as_deref())
        .context("Failed to load configuration")?;

    if cli.show_config {
        for file in &sources.files {
            println!("# loaded: {}", file.display());
        }
        for var in &sources.env_overrides {
            println!("# env: {}", var);
        }
        print!("{}", config.to_toml());
        return Ok(());
    }

    init_tracing(&config.infra.telemetry.log_level);
    info!("rackmirror {} starting", env!("CARGO_PKG_VERSION"));

    let host = load_host(cli.patch.as_ref())?;
    info!("hosting {} modules, {} cables", host.modules.len(), host.cables.len());

    let mut engine = SyncEngine::new(host, &config).context("Failed to start sync engine")?;

    let frame = Duration::from_secs_f64(1.0 / f64::from(cli.fps.max(1)));
    let deadline = cli
        .duration_secs
        .map(|secs| Instant::now() + Duration::from_secs(secs));

    loop {
        let started = Instant::now();
        engine.tick();

        if engine.exit_requested() {
            info!("peer asked us to exit");
            break;
        }
        if deadline.is_some_and(|d| started >= d) {
            break;
        }
        if let Some(rest) = frame.checked_sub(started.elapsed()) {
            thread::sleep(rest);
        }
    }

    engine.shutdown();
    info!("rackmirror shutdown complete");
    Ok(())
}
