//! Somnus Player - guided relaxation sessions from the terminal
//!
//! Plays one instructor/soundscape pairing: the instructor's intro once,
//! then a phrase loop whose length follows the intensity setting, under a
//! blended ambient soundscape, until the sleep timer runs out.
//!
//! ## Command line flags
//!
//! - `--session`, `--instructor`, `--soundscape`: what to play
//! - `--blend`, `--timer`, `--intensity`: override saved preferences
//! - `--list-devices`: print audio outputs and exit
//!
//! While running, commands are read from stdin (`help` lists them).

mod audio;
mod commands;
mod config;

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossbeam::channel::{self, Receiver, RecvTimeoutError};

use commands::{parse_command, CliArgs, PlayerCommand, HELP, USAGE};
use config::PlayerConfig;
use somnus_core::config::load_config;
use somnus_core::loader::{AssetCache, AssetLoader, RouterFetcher};
use somnus_core::session::{
    InhibitWakeLock, LogTelemetry, NoWakeLock, NullTelemetry, PlaybackSession, SessionEvent,
    SessionServices, SessionStatus, YamlPreferenceStore,
};

/// How often the session clock advances
const TICK_INTERVAL: Duration = Duration::from_millis(10);

fn main() -> Result<()> {
    // RUST_LOG=debug for verbose output
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = CliArgs::parse(std::env::args().skip(1))?;
    if args.help {
        println!("{}", USAGE);
        return Ok(());
    }
    if args.list_devices {
        return list_devices();
    }

    let selection = args.selection().map_err(|e| anyhow::anyhow!("{}\n\n{}", e, USAGE))?;

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(config::default_player_config_path);
    let config: PlayerConfig = load_config(&config_path);
    log::info!("somnus-player starting up (config {:?})", config_path);

    let (output, engine) = audio::start_output(&config.audio);
    log::info!("Audio output: {}", output.describe());

    let loader = AssetLoader::spawn(Arc::new(RouterFetcher::new()), Arc::new(AssetCache::new()))
        .context("Failed to start asset loader")?;

    let mut session = PlaybackSession::new(
        config.session.clone(),
        config.urls.resolve(&selection),
        loader,
        engine,
        services(&config),
    );

    let now = Instant::now();
    if let Some(blend) = args.blend {
        session.set_blend(blend);
    }
    if let Some(minutes) = args.timer {
        session.set_timer_minutes(minutes)?;
    }
    if let Some(level) = args.intensity {
        session.set_intensity(level, now);
    }

    println!(
        "somnus: {} / {} over {} ({} Hz)",
        selection.session_id,
        selection.instructor_id,
        selection.soundscape_id,
        output.sample_rate()
    );
    println!("Type \"help\" for commands.");

    session.start();
    let result = run(&mut session, spawn_console());
    session.close();

    drop(output);
    println!("somnus stopped.");
    result
}

fn services(config: &PlayerConfig) -> SessionServices {
    let preferences_path: PathBuf = config.preferences_path();
    log::info!("Preferences at {:?}", preferences_path);

    SessionServices {
        telemetry: if config.telemetry {
            Box::new(LogTelemetry)
        } else {
            Box::new(NullTelemetry)
        },
        wake_lock: if config.wake_lock {
            Box::new(InhibitWakeLock::new())
        } else {
            Box::new(NoWakeLock::default())
        },
        preferences: Box::new(YamlPreferenceStore::new(preferences_path)),
    }
}

/// Console input forwarded from the stdin thread
enum ConsoleInput {
    Line(String),
    Closed,
}

fn spawn_console() -> Receiver<ConsoleInput> {
    let (tx, rx) = channel::unbounded();
    let spawned = std::thread::Builder::new()
        .name("console".into())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                match line {
                    Ok(line) => {
                        if tx.send(ConsoleInput::Line(line)).is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        log::warn!("stdin read failed: {}", e);
                        break;
                    }
                }
            }
            let _ = tx.send(ConsoleInput::Closed);
        });
    if let Err(e) = spawned {
        log::error!("Failed to spawn console thread: {}", e);
    }
    rx
}

/// Drive the session until quit, stdin closing, or the timer running out
fn run(session: &mut PlaybackSession, console: Receiver<ConsoleInput>) -> Result<()> {
    let mut console_open = true;

    loop {
        let input = if console_open {
            match console.recv_timeout(TICK_INTERVAL) {
                Ok(input) => Some(input),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => Some(ConsoleInput::Closed),
            }
        } else {
            std::thread::sleep(TICK_INTERVAL);
            None
        };

        match input {
            Some(ConsoleInput::Line(line)) => match parse_command(&line) {
                Ok(Some(PlayerCommand::Quit)) => return Ok(()),
                Ok(Some(command)) => apply(session, command),
                Ok(None) => {}
                Err(e) => println!("{}", e),
            },
            // Keep playing until the timer ends; there is nobody left to type "quit"
            Some(ConsoleInput::Closed) => {
                log::debug!("Console closed");
                console_open = false;
            }
            None => {}
        }

        for event in session.tick(Instant::now()) {
            match event {
                SessionEvent::Started { .. } => println!("Playing intro"),
                SessionEvent::LoopStarted { .. } => println!("Looping"),
                SessionEvent::IntensityApplied { level, .. } => println!("Intensity {}", level),
                SessionEvent::StartFailed { message } => println!("{}", message),
                SessionEvent::TimerExpired => {
                    println!("Timer finished");
                    return Ok(());
                }
            }
        }

        if !console_open && session.state().is_idle() && !session.is_loading() {
            return Ok(());
        }
    }
}

fn apply(session: &mut PlaybackSession, command: PlayerCommand) {
    match command {
        PlayerCommand::Play => {
            if session.start().is_none() {
                println!("Already playing");
            }
        }
        PlayerCommand::Stop => {
            session.stop();
        }
        PlayerCommand::Blend(percent) => {
            println!("Blend {}%", session.set_blend(percent));
        }
        PlayerCommand::Intensity(level) => {
            let applied = session.set_intensity(level, Instant::now());
            if !session.intensity_enabled() && !session.state().is_idle() {
                println!("This instructor has a single loop length");
            } else if applied != level {
                println!("Intensity clamped to {}", applied);
            }
        }
        PlayerCommand::Timer(minutes) => match session.set_timer_minutes(minutes) {
            Ok(()) if minutes == 0 => println!("Timer off"),
            Ok(()) => println!("Timer {} min (starts with playback)", minutes),
            Err(e) => println!("{}", e),
        },
        PlayerCommand::Status => print_status(&session.status()),
        PlayerCommand::Help => println!("{}", HELP),
        PlayerCommand::Quit => {}
    }
}

fn print_status(status: &SessionStatus) {
    let loading = if status.loading { " (loading)" } else { "" };
    println!("state      {}{}", status.state, loading);
    match status.remaining_seconds {
        Some(secs) => println!("remaining  {}:{:02}", secs / 60, secs % 60),
        None => println!("timer      {} min", status.timer_minutes),
    }
    if status.intensity_enabled {
        println!("intensity  {}/{}", status.intensity, status.max_intensity);
    } else {
        println!("intensity  fixed");
    }
    println!("blend      {}%", status.blend_percent);
    if let Some((start, end)) = status.loop_seconds {
        println!("loop       {:.2}s - {:.2}s", start, end);
    }
    if let Some(error) = &status.last_error {
        println!("error      {}", error);
    }
}

fn list_devices() -> Result<()> {
    let devices = somnus_core::audio::get_output_devices()?;
    for device in devices {
        println!("{}  {:?} Hz, {} ch", device, device.sample_rates, device.max_channels);
    }
    Ok(())
}
