//! Command-line entry point.
//!
//! `auris devices` prints the endpoint snapshot, `auris listen` runs the
//! full pipeline until interrupted.

use anyhow::Result;
use auris::cli::{Cli, Commands};
use clap::{CommandFactory, Parser};

fn main() -> Result<()> {
    auris::sys::suppress_audio_warnings();

    let cli = Cli::parse();
    match &cli.command {
        None | Some(Commands::Devices { json: false }) => cmd_devices(false),
        Some(Commands::Devices { json: true }) => cmd_devices(true),
        Some(Commands::Listen) => cmd_listen(&cli),
        Some(Commands::Completions { shell }) => {
            clap_complete::generate(*shell, &mut Cli::command(), "auris", &mut std::io::stdout());
            Ok(())
        }
    }
}

#[cfg(feature = "cpal-audio")]
fn cmd_devices(json: bool) -> Result<()> {
    use auris::device::{DeviceEnumerator, Direction, auto_select, cpal_enumerator};

    let enumerator = cpal_enumerator::CpalDeviceEnumerator::new();
    let devices = enumerator.enumerate_devices()?;

    if json {
        println!("{}", auris::devices_to_json(&devices)?);
        return Ok(());
    }

    if devices.is_empty() {
        println!("No audio endpoints found.");
        return Ok(());
    }

    let selected = auto_select(&devices, &enumerator).map(|d| d.id.clone());
    for device in &devices {
        let direction = match device.direction {
            Direction::Capture => "capture",
            Direction::Render => "render ",
        };
        let default_marker = if device.is_default { "*" } else { " " };
        let selected_marker = if Some(&device.id) == selected.as_ref() {
            " <- auto"
        } else {
            ""
        };
        println!(
            "{} [{}] {} ({} Hz, {} ch){}",
            default_marker, direction, device.name, device.sample_rate, device.channels,
            selected_marker,
        );
    }
    Ok(())
}

#[cfg(not(feature = "cpal-audio"))]
fn cmd_devices(_json: bool) -> Result<()> {
    anyhow::bail!("this binary was built without the cpal-audio feature")
}

#[cfg(feature = "cpal-audio")]
fn cmd_listen(cli: &Cli) -> Result<()> {
    use auris::capture::cpal_engine::CpalCaptureEngine;
    use auris::dispatch::whisper::{WhisperEngine, WhisperEngineConfig};
    use auris::{Config, Listener};
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::Duration;

    let mut config = match (&cli.config, Config::default_path()) {
        (Some(path), _) => Config::load(path)?,
        (None, Some(path)) => Config::load_or_default(&path)?,
        (None, None) => Config::default(),
    }
    .with_env_overrides();

    // CLI flags win over the config file and environment
    if let Some(device) = &cli.device {
        config.audio.device = Some(device.clone());
    }
    if let Some(model) = &cli.model {
        config.dispatch.model = model.clone();
    }
    if let Some(language) = &cli.language {
        config.dispatch.language = language.clone();
    }
    config.validate()?;

    let engine = WhisperEngine::new(WhisperEngineConfig {
        model_path: PathBuf::from(format!("models/ggml-{}.bin", config.dispatch.model)),
        language: config.dispatch.language.clone(),
        threads: None,
    })?;

    let mut handle = Listener::start(
        &config,
        Box::new(CpalCaptureEngine::new()),
        Arc::new(engine),
    )?;

    eprintln!("auris {}: listening (Ctrl-C to stop)", auris::version_string());
    loop {
        if let Some(detection) = handle.check_for_wake_word() {
            eprintln!("auris: wake trigger ({:.0}%)", detection.confidence * 100.0);
        }
        if let Some(result) = handle.check_for_transcription() {
            println!("{}", result.text);
        }
        if let Some(error) = handle.check_for_error() {
            eprintln!("auris: {}", error);
            // Dropped frames and failed cycles are survivable; anything
            // else means the pipeline is no longer listening
            let survivable = error.is_cycle_scoped()
                || matches!(error, auris::AurisError::BufferOverrun { .. });
            if !survivable {
                break;
            }
        }
        std::thread::sleep(Duration::from_millis(50));
    }

    handle.stop()?;
    Ok(())
}

#[cfg(not(feature = "cpal-audio"))]
fn cmd_listen(_cli: &Cli) -> Result<()> {
    anyhow::bail!("this binary was built without the cpal-audio feature")
}
