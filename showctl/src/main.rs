use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use device_link::{JsonFileConfig, LinkSettings, Ticket};
use show_state::logging::{init_logging, LoggingMode};
use showctl::{ShowCommand, ShowControl};
use tracing::{error, info, warn};

/// Show control bridge
///
/// Reads JSON commands from stdin, one per line, and writes JSON events to
/// stdout, one per line. Device addresses are re-read from the settings file
/// every poll interval.
#[derive(Parser, Debug)]
#[command(name = "showctl")]
#[command(about = "Bridge a control surface to the show's mixer, timer and cue tool")]
#[command(version)]
pub struct Args {
    /// Settings file holding the device addresses
    #[arg(short, long)]
    pub settings: PathBuf,

    /// Logging mode (silent, development, debug); logs go to stderr
    #[arg(long, env = "SHOWCTL_LOG_MODE", default_value = "development")]
    pub log_mode: LoggingMode,

    /// Settings poll interval in milliseconds
    #[arg(long, default_value = "1000")]
    pub poll_interval: u64,

    /// Cue command reply timeout in milliseconds
    #[arg(long, default_value = "2000")]
    pub command_timeout: u64,

    /// Talk to the mixer on the XAir port (10024) instead of the X32 one
    #[arg(long)]
    pub xair: bool,

    /// Print the current state as one JSON line before any events
    #[arg(long)]
    pub snapshot: bool,
}

impl Args {
    fn link_settings(&self) -> LinkSettings {
        let base = if self.xair {
            LinkSettings::xair()
        } else {
            LinkSettings::default()
        };
        base.with_poll_interval(Duration::from_millis(self.poll_interval))
            .with_command_timeout(Duration::from_millis(self.command_timeout))
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.log_mode).context("Failed to initialize logging")?;

    let settings = args.link_settings();
    settings.validate().context("Invalid settings")?;

    info!("Reading device addresses from {}", args.settings.display());
    let source = JsonFileConfig::new(&args.settings);
    let control = ShowControl::start(settings, Arc::new(source))
        .context("Failed to start show control")?;

    if args.snapshot {
        let line = serde_json::to_string(&control.snapshot())?;
        println!("{line}");
    }

    let events = control.events();
    let printer = thread::spawn(move || {
        let stdout = io::stdout();
        for event in events {
            let line = match serde_json::to_string(&event) {
                Ok(line) => line,
                Err(e) => {
                    error!("Cannot serialize {:?}: {}", event, e);
                    continue;
                }
            };
            let mut out = stdout.lock();
            if writeln!(out, "{line}").and_then(|_| out.flush()).is_err() {
                break;
            }
        }
    });

    let (ticket_tx, ticket_rx) = mpsc::channel::<(String, Ticket)>();
    let reporter = thread::spawn(move || {
        for (line, ticket) in ticket_rx {
            if let Err(e) = ticket.blocking_outcome() {
                warn!("Command {} failed: {}", line, e);
            }
        }
    });

    for line in io::stdin().lock().lines() {
        let line = line.context("Failed to read stdin")?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match ShowCommand::from_json(line) {
            Ok(command) => {
                let ticket = control.request(command);
                let _ = ticket_tx.send((line.to_string(), ticket));
            }
            Err(e) => error!("Ignoring `{}`: {}", line, e),
        }
    }

    info!("Input closed, shutting down");
    drop(ticket_tx);
    let _ = reporter.join();
    control.shutdown().context("Failed to stop show control")?;
    let _ = printer.join();
    Ok(())
}
