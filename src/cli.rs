use crate::config::{load_config, save_config, validate_threshold, Config};
use crate::daemon::{build_classifier, run_daemon};
use crate::error::Error;
use crate::frame::RawFrame;
use crate::ipc::{send_command, ControlMessage};
use crate::pipeline::FrameStatus;
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "live-label",
    version,
    about = "Live camera frame classifier"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Classify camera frames until stopped
    Daemon,
    /// Classify one raw I420 frame dump
    Classify {
        file: PathBuf,
        #[arg(long)]
        width: u32,
        #[arg(long)]
        height: u32,
    },
    /// Print the status line the daemon is showing
    Status,
    /// Set the minimum confidence for a prediction
    Threshold { value: f32 },
    /// Stop the daemon
    Stop,
}

pub fn run_cli() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    match execute(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

pub fn execute(cli: Cli) -> Result<(), Error> {
    match cli.command {
        Commands::Daemon => run_daemon(load_config())?,
        Commands::Classify {
            file,
            width,
            height,
        } => println!("{}", classify_file(&load_config(), &file, width, height)?),
        Commands::Status => println!("{}", current_status()?),
        Commands::Threshold { value } => set_threshold(value)?,
        Commands::Stop => {
            send_command(ControlMessage::Shutdown)?;
            info!("stop requested");
        }
    }
    Ok(())
}

/// Classifies a raw I420 dump with the configured model.
pub fn classify_file(cfg: &Config, file: &Path, width: u32, height: u32) -> Result<FrameStatus, Error> {
    let data = fs::read(file)?;
    let frame = RawFrame::from_i420(width, height, &data)?;
    let classifier = build_classifier(cfg)?;
    Ok(classifier.process(Some(frame)))
}

pub fn current_status() -> Result<String, Error> {
    match send_command(ControlMessage::Status)? {
        Some(line) if !line.is_empty() => Ok(line),
        _ => Err(Error::NoReply),
    }
}

fn set_threshold(value: f32) -> Result<(), Error> {
    validate_threshold(value)?;
    let mut cfg = load_config();
    cfg.threshold = value;
    save_config(&cfg);
    if let Err(e) = send_command(ControlMessage::SetThreshold(value)) {
        debug!("daemon not reachable: {e}");
    }
    info!("threshold set to {value}");
    Ok(())
}
