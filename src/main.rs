//! bambukit CLI - offline tools for Bambu Lab printer telemetry
//!
//! Replays captured report traces, inspects the local job cache and
//! previews the print-start command without touching a printer.

use anyhow::{Context, Result};
use bambukit::{
    build_start_command, default_config_path, init_logging, replay_trace, Config, Device,
    DeviceType, FsJobCache, JobCache,
};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "bambukit")]
#[command(version = bambukit::VERSION)]
#[command(about = "Bambu Lab printer telemetry tools", long_about = None)]
struct Cli {
    /// Config file (.toml or .json); defaults to the per-user config
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the configured printer model
    #[arg(long, global = true)]
    device_type: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a JSON-lines report trace and print the resulting state
    Replay {
        /// Trace file, one raw report per line
        trace: PathBuf,
    },
    /// List cached print jobs
    Jobs,
    /// Build the print-start command for a cached job
    StartCommand {
        /// Job name in the cache
        job: String,
        /// Trace to replay first, so the gate sees the printer's state
        #[arg(short, long)]
        trace: Option<PathBuf>,
    },
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => {
            let path = default_config_path()?;
            if path.exists() {
                Config::load_from_file(&path)
                    .with_context(|| format!("Failed to load config from {}", path.display()))
            } else {
                Ok(Config::default())
            }
        }
    }
}

fn new_device(config: &Config, override_type: Option<&str>) -> Device {
    let device_type = match override_type {
        Some(name) => name.parse().unwrap_or(DeviceType::Unknown),
        None => config.connection.device_type,
    };
    let serial = if config.connection.serial.is_empty() {
        "offline"
    } else {
        config.connection.serial.as_str()
    };
    Device::new(device_type, serial)
}

fn replay_file(device: &mut Device, trace: &Path) -> Result<()> {
    let file = File::open(trace).with_context(|| format!("Cannot open {}", trace.display()))?;
    let summary = replay_trace(device, BufReader::new(file))?;
    if summary.rejected > 0 {
        eprintln!(
            "{} of {} lines could not be decoded",
            summary.rejected,
            summary.applied + summary.rejected
        );
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    init_logging(&config.logging)?;

    match cli.command {
        Commands::Replay { trace } => {
            let mut device = new_device(&config, cli.device_type.as_deref());
            replay_file(&mut device, &trace)?;
            println!("{}", serde_json::to_string_pretty(&device.snapshot())?);
        }
        Commands::Jobs => {
            let cache = FsJobCache::new(&config.cache.directory);
            let names = cache
                .cached_job_names()
                .with_context(|| format!("Cannot read {}", config.cache.directory.display()))?;
            for name in names {
                let available = cache.job(&name).is_some_and(|job| job.is_available());
                println!(
                    "{}\t{}",
                    name,
                    if available { "available" } else { "incomplete" }
                );
            }
        }
        Commands::StartCommand { job, trace } => {
            let mut device = new_device(&config, cli.device_type.as_deref());
            if let Some(trace) = trace {
                replay_file(&mut device, &trace)?;
            }
            let cache = FsJobCache::new(&config.cache.directory);
            match build_start_command(&device, &cache, &job) {
                Ok(command) => println!("{}", serde_json::to_string_pretty(&command.to_json())?),
                Err(e) => anyhow::bail!("Print start rejected: {}", e),
            }
        }
    }

    Ok(())
}
