// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use clap::{crate_version, Parser, Subcommand};
use std::error::Error;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use soundpad::input::{self, DriverKind, InputHooks};
use soundpad::pool::AudioChannelPool;
use soundpad::shortcut::{Chord, RecordOutcome, ShortcutRecorder};
use soundpad::soundboard::Soundboard;
use soundpad::{audio, config};

/// How long a shortcut recording waits for the next key.
const RECORD_TIMEOUT: Duration = Duration::from_secs(30);

/// How long blocking input threads get to finish once the board has stopped.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(250);

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A hotkey-driven soundboard."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the available audio output devices.
    Devices {},
    /// Parses the settings file and checks that every track's sound can be loaded.
    Verify {
        /// The path to the settings file.
        settings_path: String,
    },
    /// Records a shortcut from the keyboard and prints it.
    Record {
        /// Where key events come from: stdin or evdev.
        #[arg(long, default_value = "evdev")]
        input: DriverKind,
    },
    /// Starts the soundboard and listens for shortcuts until interrupted.
    Start {
        /// The path to the settings file. It is created on exit if it doesn't exist.
        settings_path: String,
        /// Where key events come from: stdin or evdev.
        #[arg(long, default_value = "evdev")]
        input: DriverKind,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(run(cli));
    // Drivers reading stdin or /dev/input block in threads that can't be
    // interrupted, so don't wait on them forever.
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
    result
}

async fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    match cli.command {
        Commands::Devices {} => {
            let devices = audio::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Verify { settings_path } => verify(Path::new(&settings_path))?,
        Commands::Record { input: kind } => {
            // Keys still held from launching the command must not finish the
            // capture, so the recorder only sees this session's keys.
            let hooks = InputHooks::new();
            let session = InputHooks::new();
            let mut recorder = ShortcutRecorder::new(Chord::default());
            recorder.start_capture(&session);
            let _forwarder = input::forward_session(hooks.install(), session);
            let driver = input::driver(kind)?;
            let _driver_handle = driver.monitor_events(hooks.clone());

            eprintln!("Press the shortcut, then release any key (esc clears).");
            let outcome =
                tokio::task::spawn_blocking(move || recorder.wait(RECORD_TIMEOUT)).await?;
            hooks.close();
            match outcome {
                Some(RecordOutcome::Finished(chord)) if !chord.is_empty() => println!("{}", chord),
                Some(RecordOutcome::Finished(_)) | Some(RecordOutcome::Cleared) => println!(),
                _ => return Err("no shortcut recorded".into()),
            }
        }
        Commands::Start {
            settings_path,
            input: kind,
        } => start(PathBuf::from(settings_path), kind).await?,
    }

    Ok(())
}

/// Checks every track in the settings file, printing one line per track.
fn verify(settings_path: &Path) -> Result<(), Box<dyn Error>> {
    let settings = config::load_settings(settings_path)?;
    let sample_rate = settings.audio().sample_rate();
    let mut failures = 0;

    println!(
        "Settings: hold mode {}, stop all '{}', {} tracks",
        settings.global_settings().hold_mode(),
        Chord::parse(settings.global_settings().stop_all_shortcut()),
        settings.tracks().len()
    );
    for (i, track) in settings.tracks().iter().enumerate() {
        let shortcut = Chord::parse(track.shortcut());
        if track.file_path().is_empty() {
            println!("- {}: (no file) [{}] {}", i + 1, shortcut, track.mode());
            continue;
        }

        match audio::decode::decode_file(Path::new(track.file_path()), sample_rate) {
            Ok(sound) => println!(
                "- {}: {} ({:.1}s) [{}] {}",
                i + 1,
                track.file_path(),
                sound.duration().as_secs_f32(),
                shortcut,
                track.mode()
            ),
            Err(e) => {
                failures += 1;
                println!("- {}: {} FAILED: {}", i + 1, track.file_path(), e);
            }
        }
    }

    if failures > 0 {
        return Err(format!("{} track(s) failed to load", failures).into());
    }
    Ok(())
}

/// Runs the board until Ctrl-C or the input closes, then saves the settings.
async fn start(settings_path: PathBuf, kind: DriverKind) -> Result<(), Box<dyn Error>> {
    let settings = config::load_settings(&settings_path)?;
    let audio_config = settings.audio();
    let status_interval = audio_config.status_interval()?;

    let audio_system = audio::init(&audio_config)?;
    let mut board = Soundboard::from_settings(
        &settings,
        AudioChannelPool::new(audio_system.mixer()),
    );

    let hooks = InputHooks::new();
    let hook = hooks.install();
    let driver = input::driver(kind)?;
    let driver_handle = driver.monitor_events(hooks.clone());

    let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(1);
    let mut board_handle = tokio::task::spawn_blocking(move || {
        board.run(hook, shutdown_rx, status_interval);
        board
    });

    let board = tokio::select! {
        result = &mut board_handle => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl-C.");
            let _ = shutdown_tx.send(());
            board_handle.await?
        }
    };
    hooks.close();
    if driver_handle.is_finished() {
        match driver_handle.await {
            Ok(Err(e)) => error!(err = %e, "Input driver failed"),
            Err(e) => error!(err = %e, "Input driver panicked"),
            Ok(Ok(())) => {}
        }
    }

    config::save_settings(&settings_path, &board.to_settings(&settings))?;
    drop(board);
    audio_system.shutdown();
    Ok(())
}
