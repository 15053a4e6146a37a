//! Carillon CLI - The `carillon` command.
//!
//! Plays an additive bell SynthDef on scsynth from a MIDI keyboard.
//!
//! # Architecture
//!
//! The CLI binary wires together the workspace crates:
//!
//! - **carillon-dsp**: bell SynthDef generation and SynthDef v2 encoding
//! - **carillon-core**: MIDI input, note mapping, instance scheduling, OSC transport

use anyhow::{Context, Result};
use carillon_core::{
    Config, FailurePolicy, MidiInputManager, Scsynth, Session, StopReason,
};
use clap::{Parser, Subcommand, ValueEnum};
use crossbeam_channel::{bounded, Receiver};
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use std::path::{Path, PathBuf};

/// Carillon - SuperCollider bells from a MIDI keyboard
#[derive(Parser, Debug)]
#[command(name = "carillon")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Play an additive bell synth on scsynth from a MIDI controller", long_about = None)]
struct Args {
    /// Config file (defaults to the per-user config location)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Listen for notes and play bells until interrupted
    Run {
        /// MIDI input name to match (case-insensitive substring)
        #[arg(short, long)]
        device: Option<String>,

        /// scsynth address, host:port
        #[arg(short, long)]
        server: Option<String>,

        /// What a failed note does to the session
        #[arg(long, value_enum)]
        on_error: Option<OnError>,
    },

    /// List MIDI input devices
    Devices,

    /// Write the bell SynthDef as a .scsyndef file
    DumpSynthdef {
        /// Output path
        #[arg(value_name = "FILE", default_value = "bells.scsyndef")]
        path: PathBuf,
    },

    /// Write a commented default config file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Print the default config file location
    ConfigPath,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OnError {
    /// Log and drop the note
    Log,
    /// Stop the session
    Fatal,
}

impl From<OnError> for FailurePolicy {
    fn from(value: OnError) -> Self {
        match value {
            OnError::Log => FailurePolicy::Log,
            OnError::Fatal => FailurePolicy::Fatal,
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    match args.command {
        Commands::Run {
            device,
            server,
            on_error,
        } => {
            let mut config = load_config(args.config.as_deref())?;
            apply_overrides(&mut config, device, server, on_error);
            run(&config)
        }
        Commands::Devices => list_devices(),
        Commands::DumpSynthdef { path } => {
            let config = load_config(args.config.as_deref())?;
            dump_synthdef(&config, &path)
        }
        Commands::Init { force } => {
            let path = match args.config {
                Some(path) => path,
                None => Config::config_path()?,
            };
            init_config(&path, force)
        }
        Commands::ConfigPath => {
            println!("{}", Config::config_path()?.display());
            Ok(())
        }
    }
}

/// An explicit path must exist; otherwise fall back to the default location.
fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("Failed to load config: {}", path.display())),
        None => Ok(Config::load_or_default()),
    }
}

fn apply_overrides(
    config: &mut Config,
    device: Option<String>,
    server: Option<String>,
    on_error: Option<OnError>,
) {
    if let Some(device) = device {
        config.midi.device = device;
    }
    if let Some(server) = server {
        config.engine.server_addr = server;
    }
    if let Some(on_error) = on_error {
        config.pipeline.on_instantiate_error = on_error.into();
    }
}

fn run(config: &Config) -> Result<()> {
    log::info!("🔔 Carillon - bells for {}", config.engine.server_addr);

    // 1. MIDI input
    let (mut midi, events) = MidiInputManager::new();
    let device = midi
        .open_by_name(&config.midi.device)
        .with_context(|| format!("Failed to open MIDI device matching '{}'", config.midi.device))?;
    log::info!("   ✓ MIDI input: {}", device.name);

    // 2. Server connection
    let scsynth = Scsynth::connect(&config.engine)
        .with_context(|| format!("Failed to connect to scsynth at {}", config.engine.server_addr))?;
    log::info!("   ✓ scsynth reachable");

    // 3. SynthDef + default group
    let mut scheduler =
        Session::start(scsynth, config).context("Failed to prepare the bell instrument")?;
    log::info!(
        "   ✓ '{}' registered, playing into group {}",
        scheduler.def_name(),
        scheduler.group().node_id()
    );

    // 4. Play
    let shutdown = shutdown_channel().context("Failed to install signal handler")?;
    log::info!("Listening for notes... (Press Ctrl+C to exit)");
    let outcome = scheduler.run(&events, &shutdown);

    midi.close();
    let summary = scheduler.summary();
    log::info!(
        "👋 {} notes played, {} dropped{}",
        summary.events - summary.dropped,
        summary.dropped,
        summary
            .last_id
            .map(|id| format!(", last node {}", id))
            .unwrap_or_default()
    );

    match outcome.context("Note pipeline stopped")? {
        StopReason::EndOfStream => log::warn!("MIDI input closed"),
        StopReason::Shutdown => {}
    }
    Ok(())
}

/// A receiver that fires once SIGINT or SIGTERM arrives.
fn shutdown_channel() -> Result<Receiver<()>> {
    let (tx, rx) = bounded(1);
    let mut signals = Signals::new([SIGINT, SIGTERM])?;
    std::thread::Builder::new()
        .name("carillon-signals".to_string())
        .spawn(move || {
            if let Some(signal) = signals.forever().next() {
                log::info!("⚠️  Interrupted by signal {}", signal);
                let _ = tx.send(());
            }
        })?;
    Ok(rx)
}

fn list_devices() -> Result<()> {
    let devices = MidiInputManager::list_devices().context("Failed to enumerate MIDI inputs")?;
    if devices.is_empty() {
        println!("No MIDI input devices found");
        return Ok(());
    }
    println!("MIDI input devices:");
    for device in devices {
        println!("  [{}] {}", device.port_index, device.name);
    }
    Ok(())
}

fn dump_synthdef(config: &Config, path: &Path) -> Result<()> {
    let def = carillon_core::bell_definition(config).context("Failed to build bell SynthDef")?;
    let bytes = carillon_dsp::write_synthdef_file(&def, path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!(
        "Wrote '{}' ({} ugens, {} bytes) to {}",
        def.name,
        def.nodes.len(),
        bytes,
        path.display()
    );
    Ok(())
}

fn init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "Config file already exists: {} (use --force to overwrite)",
            path.display()
        );
    }
    Config::write_default_config_file(path)
        .with_context(|| format!("Failed to write config: {}", path.display()))?;
    println!("Wrote default config to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_run_overrides() {
        let args = Args::try_parse_from([
            "carillon",
            "run",
            "--device",
            "launchkey",
            "--server",
            "10.0.0.2:57110",
            "--on-error",
            "fatal",
        ])
        .unwrap();
        let Commands::Run {
            device,
            server,
            on_error,
        } = args.command
        else {
            panic!("Expected run command");
        };

        let mut config = Config::default();
        apply_overrides(&mut config, device, server, on_error);
        assert_eq!(config.midi.device, "launchkey");
        assert_eq!(config.engine.server_addr, "10.0.0.2:57110");
        assert_eq!(config.pipeline.on_instantiate_error, FailurePolicy::Fatal);
    }

    #[test]
    fn test_no_overrides_keeps_config() {
        let mut config = Config::default();
        apply_overrides(&mut config, None, None, None);
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_dump_synthdef_default_path() {
        let args = Args::try_parse_from(["carillon", "dump-synthdef"]).unwrap();
        match args.command {
            Commands::DumpSynthdef { path } => assert_eq!(path, PathBuf::from("bells.scsyndef")),
            other => panic!("Unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_dump_synthdef_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bells.scsyndef");
        dump_synthdef(&Config::default(), &path).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[..4], b"SCgf");
    }

    #[test]
    fn test_init_config_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        init_config(&path, false).unwrap();
        assert_eq!(load_config(Some(&path)).unwrap(), Config::default());
        assert!(init_config(&path, false).is_err());
        init_config(&path, true).unwrap();
    }

    #[test]
    fn test_missing_explicit_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(Some(&dir.path().join("nope.toml"))).is_err());
    }
}
