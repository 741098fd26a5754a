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
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use crossbeam_channel::{select, Receiver};
use tracing::{info, span, warn, Level};

use crate::audio::LoadError;
use crate::config;
use crate::hotkey::{DispatchReport, HotkeyDispatcher};
use crate::input::{Hook, KeyEvent};
use crate::pool::AudioChannelPool;
use crate::registry::{TrackId, TrackRegistry};
use crate::shortcut::Chord;
use crate::track::{PlayMode, Track, TrackState};

#[derive(Debug, thiserror::Error)]
pub enum BoardError {
    #[error("No such track: {0}")]
    UnknownTrack(TrackId),

    #[error(transparent)]
    Load(#[from] LoadError),
}

/// The whole board: the tracks, their bindings, and the global trigger settings.
pub struct Soundboard {
    registry: TrackRegistry,
    dispatcher: HotkeyDispatcher,
}

impl Soundboard {
    /// Creates an empty board in toggle mode with no stop-all binding.
    pub fn new(pool: AudioChannelPool) -> Soundboard {
        Soundboard {
            registry: TrackRegistry::new(pool),
            dispatcher: HotkeyDispatcher::new(false, Chord::default()),
        }
    }

    /// Builds the board described by the settings. Tracks whose file can't be
    /// loaded stay on the board without a sound.
    pub fn from_settings(settings: &config::Settings, pool: AudioChannelPool) -> Soundboard {
        let global = settings.global_settings();
        let mut board = Soundboard::new(pool);
        board.set_hold_mode(global.hold_mode());
        board.set_stop_all_shortcut(global.stop_all_shortcut());

        for track_config in settings.tracks() {
            let id = board.registry.add();
            let Some(track) = board.registry.get_mut(id) else {
                continue;
            };
            track.set_mode(track_config.mode());
            track.set_volume(track_config.volume());
            track.set_loop(track_config.looped());
            track.set_mute_others(track_config.mute_others());
            track.set_shortcut(Chord::parse(track_config.shortcut()));

            if !track_config.file_path().is_empty() {
                if let Err(e) = track.load_file(Path::new(track_config.file_path())) {
                    warn!(
                        track = %id,
                        path = track_config.file_path(),
                        err = %e,
                        "Unable to load track sound"
                    );
                }
            }
        }

        info!(
            tracks = board.registry.len(),
            hold_mode = board.hold_mode(),
            "Soundboard ready"
        );
        board
    }

    /// The persisted form of the board, keeping the audio section of `base`.
    pub fn to_settings(&self, base: &config::Settings) -> config::Settings {
        let tracks = self
            .registry
            .iter()
            .map(|(_, track)| {
                config::Track::new(
                    &track
                        .file_path()
                        .map(|path| path.display().to_string())
                        .unwrap_or_default(),
                    track.volume(),
                    &track.shortcut().to_string(),
                    track.mode(),
                    track.looped(),
                    track.mute_others(),
                )
            })
            .collect();

        base.with_board(
            config::GlobalSettings::new(
                self.dispatcher.hold_mode(),
                &self.dispatcher.stop_all_shortcut().to_string(),
            ),
            tracks,
        )
    }

    fn track_mut(&mut self, id: TrackId) -> Result<&mut Track, BoardError> {
        self.registry.get_mut(id).ok_or(BoardError::UnknownTrack(id))
    }

    pub fn track(&self, id: TrackId) -> Option<&Track> {
        self.registry.get(id)
    }

    /// Track IDs in display order.
    pub fn track_ids(&self) -> Vec<TrackId> {
        self.registry.ids()
    }

    /// Appends an empty track slot.
    pub fn add_track(&mut self) -> TrackId {
        self.registry.add()
    }

    /// Removes a track slot, stopping its playback.
    pub fn remove_track(&mut self, id: TrackId) -> Result<(), BoardError> {
        if self.registry.remove(id) {
            Ok(())
        } else {
            Err(BoardError::UnknownTrack(id))
        }
    }

    pub fn move_track(&mut self, from: usize, to: usize) -> bool {
        self.registry.move_track(from, to)
    }

    /// Loads or replaces a track's sound.
    pub fn load_file(&mut self, id: TrackId, path: &Path) -> Result<(), BoardError> {
        self.track_mut(id)?.load_file(path)?;
        Ok(())
    }

    pub fn track_state(&self, id: TrackId) -> Result<TrackState, BoardError> {
        self.registry
            .get(id)
            .map(|track| track.state())
            .ok_or(BoardError::UnknownTrack(id))
    }

    /// Triggers a track as if its shortcut changed state.
    pub fn trigger(&mut self, id: TrackId, key_down: bool) -> Result<(), BoardError> {
        let hold_mode = self.dispatcher.hold_mode();
        if self.registry.trigger(id, hold_mode, key_down) {
            Ok(())
        } else {
            Err(BoardError::UnknownTrack(id))
        }
    }

    pub fn toggle_stop(&mut self, id: TrackId) -> Result<(), BoardError> {
        self.track_mut(id)?.toggle_stop();
        Ok(())
    }

    pub fn toggle_pause(&mut self, id: TrackId) -> Result<(), BoardError> {
        self.track_mut(id)?.toggle_pause();
        Ok(())
    }

    pub fn stop_track(&mut self, id: TrackId) -> Result<(), BoardError> {
        self.track_mut(id)?.stop();
        Ok(())
    }

    pub fn set_mode(&mut self, id: TrackId, mode: PlayMode) -> Result<(), BoardError> {
        self.track_mut(id)?.set_mode(mode);
        Ok(())
    }

    pub fn set_volume(&mut self, id: TrackId, db: i32) -> Result<(), BoardError> {
        self.track_mut(id)?.set_volume(db);
        Ok(())
    }

    pub fn set_loop(&mut self, id: TrackId, looped: bool) -> Result<(), BoardError> {
        self.track_mut(id)?.set_loop(looped);
        Ok(())
    }

    pub fn set_mute_others(&mut self, id: TrackId, mute_others: bool) -> Result<(), BoardError> {
        self.track_mut(id)?.set_mute_others(mute_others);
        Ok(())
    }

    /// Binds a track to a chord such as "ctrl+A". An empty string unbinds it.
    pub fn bind_track_shortcut(&mut self, id: TrackId, shortcut: &str) -> Result<(), BoardError> {
        self.track_mut(id)?.set_shortcut(Chord::parse(shortcut));
        Ok(())
    }

    pub fn set_hold_mode(&mut self, hold_mode: bool) {
        self.dispatcher.set_hold_mode(hold_mode);
    }

    pub fn hold_mode(&self) -> bool {
        self.dispatcher.hold_mode()
    }

    /// Binds the stop-all action. An empty string unbinds it.
    pub fn set_stop_all_shortcut(&mut self, shortcut: &str) {
        self.dispatcher.set_stop_all_shortcut(Chord::parse(shortcut));
    }

    pub fn stop_all(&mut self) {
        self.registry.stop_all();
    }

    pub fn handle_key_event(&mut self, event: &KeyEvent) -> DispatchReport {
        self.dispatcher.handle_event(event, &mut self.registry)
    }

    /// Reconciles every track and reports its state, in display order.
    pub fn poll_status(&mut self) -> Vec<(TrackId, TrackState)> {
        self.registry.poll_status()
    }

    /// Runs the board until shutdown is signalled or the input closes. Key
    /// events are handled as they arrive; track status is refreshed on every
    /// tick and changes are logged.
    pub fn run(&mut self, hook: Hook, shutdown: Receiver<()>, status_interval: Duration) {
        let span = span!(Level::INFO, "soundboard");
        let _enter = span.enter();

        self.dispatcher.start();
        let ticker = crossbeam_channel::tick(status_interval);
        let mut last: HashMap<TrackId, TrackState> = self.poll_status().into_iter().collect();

        loop {
            select! {
                recv(hook.receiver()) -> event => match event {
                    Ok(event) => {
                        self.handle_key_event(&event);
                    }
                    Err(_) => {
                        info!("Input closed.");
                        break;
                    }
                },
                recv(ticker) -> _ => {
                    let status = self.poll_status();
                    for (id, state) in status.iter() {
                        if last.get(id) != Some(state) {
                            info!(track = %id, state = %state, "Track status changed");
                        }
                    }
                    last = status.into_iter().collect();
                },
                recv(shutdown) -> _ => {
                    info!("Shutting down.");
                    break;
                },
            }
        }

        self.dispatcher.stop();
        self.registry.stop_all();
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;
    use std::thread;

    use super::*;
    use crate::input::InputHooks;
    use crate::testutil::{eventually, TestBoard};

    fn settings(board: &TestBoard) -> Result<config::Settings, Box<dyn Error>> {
        let kick = board.sound("kick", 44100)?;
        let missing = board.missing("missing.wav");
        Ok(config::Settings::new(
            config::GlobalSettings::new(true, "ctrl+shift"),
            Some(config::Audio::new("mock")),
            vec![
                config::Track::new(
                    &kick.display().to_string(),
                    -6,
                    "ctrl+K",
                    PlayMode::Pause,
                    true,
                    false,
                ),
                config::Track::new(
                    &missing.display().to_string(),
                    -100,
                    "M",
                    PlayMode::Single,
                    false,
                    true,
                ),
                config::Track::default(),
            ],
        ))
    }

    #[test]
    fn test_from_settings() -> Result<(), Box<dyn Error>> {
        let test_board = TestBoard::new()?;
        let settings = settings(&test_board)?;
        let board = Soundboard::from_settings(&settings, test_board.pool.clone());

        let ids = board.track_ids();
        assert_eq!(ids.len(), 3);
        assert!(board.hold_mode());

        let kick = board.track(ids[0]).ok_or("kick")?;
        assert!(kick.is_loaded());
        assert_eq!(kick.mode(), PlayMode::Pause);
        assert_eq!(kick.volume(), -6);
        assert!(kick.looped());
        assert_eq!(kick.shortcut().to_string(), "ctrl+K");

        let missing = board.track(ids[1]).ok_or("missing")?;
        assert!(!missing.is_loaded());
        assert_eq!(missing.volume(), -60);
        assert!(missing.mute_others());

        let empty = board.track(ids[2]).ok_or("empty")?;
        assert!(!empty.is_loaded());
        assert_eq!(empty.file_path(), None);
        assert_eq!(empty.mode(), PlayMode::Stop);
        Ok(())
    }

    #[test]
    fn test_to_settings_round_trip() -> Result<(), Box<dyn Error>> {
        let test_board = TestBoard::new()?;
        let settings = settings(&test_board)?;
        let board = Soundboard::from_settings(&settings, test_board.pool.clone());

        let saved = board.to_settings(&settings);
        assert_eq!(saved.global_settings(), settings.global_settings());
        assert_eq!(saved.audio().device(), "mock");
        // The failed track keeps its path, and its volume comes back clamped.
        assert_eq!(saved.tracks()[1].file_path(), settings.tracks()[1].file_path());
        assert_eq!(saved.tracks()[1].volume(), -60);
        assert_eq!(saved.tracks()[0], settings.tracks()[0]);
        assert_eq!(saved.tracks()[2], config::Track::default());
        Ok(())
    }

    #[test]
    fn test_ui_operations() -> Result<(), Box<dyn Error>> {
        let test_board = TestBoard::new()?;
        let mut board = Soundboard::new(test_board.pool.clone());
        let id = board.add_track();
        let other = board.add_track();

        assert!(matches!(
            board.load_file(id, &test_board.missing("nope.wav")),
            Err(BoardError::Load(_))
        ));
        board.load_file(id, &test_board.sound("horn", 44100)?)?;
        board.set_mode(id, PlayMode::Overlap)?;
        board.set_volume(id, -3)?;
        board.set_loop(id, true)?;
        board.set_mute_others(id, true)?;
        board.bind_track_shortcut(id, "H")?;

        board.trigger(id, true)?;
        board.trigger(id, true)?;
        assert_eq!(board.track(id).ok_or("track")?.active_channels().len(), 2);
        board.stop_track(id)?;
        assert_eq!(board.track_state(id)?, TrackState::default());

        board.toggle_pause(id)?;
        board.toggle_pause(id)?;
        assert!(board.track_state(id)?.is_paused);
        board.toggle_stop(id)?;
        assert!(board.track_state(id)?.is_active());

        assert!(board.move_track(1, 0));
        assert_eq!(board.track_ids(), vec![other, id]);
        board.remove_track(other)?;
        assert!(matches!(
            board.remove_track(other),
            Err(BoardError::UnknownTrack(_))
        ));
        assert!(matches!(
            board.set_volume(other, 0),
            Err(BoardError::UnknownTrack(_))
        ));

        board.stop_all();
        assert_eq!(test_board.mixer.busy_channels(), 0);
        Ok(())
    }

    #[test]
    fn test_key_events_ignored_until_running() -> Result<(), Box<dyn Error>> {
        let test_board = TestBoard::new()?;
        let mut board = Soundboard::new(test_board.pool.clone());
        let id = board.add_track();
        board.load_file(id, &test_board.sound("horn", 44100)?)?;
        board.bind_track_shortcut(id, "ctrl+H")?;
        board.set_stop_all_shortcut("esc");

        assert!(board.handle_key_event(&KeyEvent::down("ctrl")).is_empty());
        assert!(board.handle_key_event(&KeyEvent::down("H")).is_empty());
        assert!(!board.track_state(id)?.is_playing);
        Ok(())
    }

    #[test]
    fn test_run_loop() -> Result<(), Box<dyn Error>> {
        let test_board = TestBoard::new()?;
        let mut board = Soundboard::new(test_board.pool.clone());
        let id = board.add_track();
        board.load_file(id, &test_board.sound("horn", 44100)?)?;
        board.bind_track_shortcut(id, "ctrl+H")?;

        let hooks = InputHooks::new();
        let hook = hooks.install();
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(1);
        let handle = thread::spawn(move || {
            board.run(hook, shutdown_rx, Duration::from_millis(5));
            board
        });

        hooks.publish(KeyEvent::down("ctrl"));
        hooks.publish(KeyEvent::down("h"));
        let mixer = test_board.mixer.clone();
        eventually(|| mixer.busy_channels() == 1, "Track never started");

        shutdown_tx.send(())?;
        let board = handle.join().map_err(|_| "board thread panicked")?;
        assert_eq!(board.track_ids(), vec![id]);
        assert_eq!(test_board.mixer.busy_channels(), 0);
        Ok(())
    }

    #[test]
    fn test_run_ends_when_input_closes() -> Result<(), Box<dyn Error>> {
        let test_board = TestBoard::new()?;
        let mut board = Soundboard::new(test_board.pool.clone());
        let hooks = InputHooks::new();
        let hook = hooks.install();
        let (_shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(1);

        let handle = thread::spawn(move || board.run(hook, shutdown_rx, Duration::from_millis(5)));
        hooks.close();
        handle.join().map_err(|_| "board thread panicked")?;
        Ok(())
    }
}
