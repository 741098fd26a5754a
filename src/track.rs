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
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::{debug, warn};

use crate::audio::{ChannelHandle, LoadError, SoundHandle};
use crate::pool::AudioChannelPool;
use crate::shortcut::Chord;

/// The quietest volume a track can be set to, in dB.
pub const MIN_VOLUME_DB: i32 = -60;
/// The loudest volume a track can be set to, in dB.
pub const MAX_VOLUME_DB: i32 = 0;

/// How a track responds to being triggered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PlayMode {
    /// Every key-down starts another playback on top of the ones already playing.
    Overlap,
    /// Every key-down restarts the sound from the beginning.
    Single,
    /// Triggering pauses and resumes a single playback.
    Pause,
    /// Triggering stops the playback, and starts it again when it should be active.
    #[default]
    Stop,
}

impl PlayMode {
    /// The label written to settings files.
    pub fn label(&self) -> &'static str {
        match self {
            PlayMode::Overlap => "overlap",
            PlayMode::Single => "single",
            PlayMode::Pause => "pause",
            PlayMode::Stop => "stop",
        }
    }

    /// Parses a canonical label or one of the labels used by older settings files.
    pub fn from_label(label: &str) -> Option<PlayMode> {
        match label.trim() {
            "overlap" | "重叠模式" => Some(PlayMode::Overlap),
            "single" | "单点模式" => Some(PlayMode::Single),
            "pause" | "暂停模式" => Some(PlayMode::Pause),
            "stop" | "终止模式" => Some(PlayMode::Stop),
            other => match other.to_lowercase().as_str() {
                "overlap" => Some(PlayMode::Overlap),
                "single" => Some(PlayMode::Single),
                "pause" => Some(PlayMode::Pause),
                "stop" => Some(PlayMode::Stop),
                _ => None,
            },
        }
    }
}

impl fmt::Display for PlayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl Serialize for PlayMode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for PlayMode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Ok(PlayMode::from_label(&label).unwrap_or_else(|| {
            warn!(mode = label, "Unknown play mode, using stop");
            PlayMode::default()
        }))
    }
}

/// The playback status of a track as seen by the UI.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TrackState {
    pub is_playing: bool,
    pub is_paused: bool,
}

impl TrackState {
    /// Playing and not paused.
    pub fn is_active(&self) -> bool {
        self.is_playing && !self.is_paused
    }
}

impl fmt::Display for TrackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.is_playing, self.is_paused) {
            (true, true) => write!(f, "paused"),
            (true, false) => write!(f, "playing"),
            _ => write!(f, "idle"),
        }
    }
}

/// Converts a volume in dB to a linear gain, clamping to the supported range.
pub fn gain_from_db(db: i32) -> f32 {
    10f32.powf(db.clamp(MIN_VOLUME_DB, MAX_VOLUME_DB) as f32 / 20.0)
}

/// One step of a trigger transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Step {
    /// Stop every playback of the sound.
    Stop,
    /// Start a new playback.
    Start,
    Pause,
    Resume,
}

/// The steps a trigger takes, given the mode, whether the track should end up
/// active, whether the key went down, and the reconciled state.
pub(crate) fn transition(
    mode: PlayMode,
    should_start: bool,
    key_down: bool,
    state: TrackState,
) -> &'static [Step] {
    match (mode, should_start, key_down) {
        (PlayMode::Overlap, _, true) => &[Step::Start],
        (PlayMode::Single, _, true) => &[Step::Stop, Step::Start],
        (PlayMode::Overlap | PlayMode::Single, _, false) => &[],
        (PlayMode::Pause, true, _) if !state.is_playing => &[Step::Start],
        (PlayMode::Pause, true, _) if state.is_paused => &[Step::Resume],
        (PlayMode::Pause, false, _) if state.is_active() => &[Step::Pause],
        (PlayMode::Pause, _, _) => &[],
        (PlayMode::Stop, true, _) => &[Step::Stop, Step::Start],
        (PlayMode::Stop, false, _) => &[Step::Stop],
    }
}

/// A single triggerable sound and its playback state.
pub struct Track {
    pool: AudioChannelPool,
    sound: Option<SoundHandle>,
    file_path: Option<PathBuf>,
    /// Channels believed to be carrying this track's sound.
    channels: Vec<ChannelHandle>,
    mode: PlayMode,
    volume_db: i32,
    looped: bool,
    mute_others: bool,
    shortcut: Chord,
    is_playing: bool,
    is_paused: bool,
}

impl Track {
    /// Creates an empty track with no sound loaded.
    pub fn new(pool: AudioChannelPool) -> Track {
        Track {
            pool,
            sound: None,
            file_path: None,
            channels: Vec::new(),
            mode: PlayMode::default(),
            volume_db: MAX_VOLUME_DB,
            looped: false,
            mute_others: false,
            shortcut: Chord::default(),
            is_playing: false,
            is_paused: false,
        }
    }

    /// Loads or replaces the track's sound. On failure the track has no sound,
    /// but still remembers the path it was asked to load.
    pub fn load_file(&mut self, path: &Path) -> Result<(), LoadError> {
        self.unload();
        self.file_path = Some(path.to_path_buf());

        let sound = self.pool.load_sound(path)?;
        self.pool.set_volume(sound, gain_from_db(self.volume_db));
        self.sound = Some(sound);
        debug!(path = ?path, sound = %sound, "Track loaded");
        Ok(())
    }

    /// Stops playback and releases the sound.
    pub fn unload(&mut self) {
        self.stop();
        if let Some(sound) = self.sound.take() {
            self.pool.unload_sound(sound);
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.sound.is_some()
    }

    /// The path of the sound file, if one was ever chosen.
    pub fn file_path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }

    /// Reacts to the track's shortcut. In hold mode the track should be active
    /// exactly while the key is down; otherwise each trigger flips it.
    pub fn toggle_play(&mut self, hold_mode: bool, key_down: bool) {
        if self.sound.is_none() {
            return;
        }

        let should_start = if hold_mode { key_down } else { !self.is_active() };
        self.cleanup_channels();

        let steps = transition(self.mode, should_start, key_down, self.state());
        debug!(
            mode = %self.mode,
            hold_mode,
            key_down,
            should_start,
            state = %self.state(),
            steps = ?steps,
            "Track triggered"
        );
        for step in steps {
            match step {
                Step::Stop => self.stop(),
                Step::Start => self.play(),
                Step::Pause => self.pause(),
                Step::Resume => self.unpause(),
            }
        }
    }

    /// Whether a trigger would take the track from inactive to active, given
    /// its current state. Reconcile channels first for an accurate answer.
    pub fn would_activate(&self, hold_mode: bool, key_down: bool) -> bool {
        if self.sound.is_none() || self.is_active() {
            return false;
        }
        let should_start = !hold_mode || key_down;
        transition(self.mode, should_start, key_down, self.state())
            .iter()
            .any(|step| matches!(step, Step::Start | Step::Resume))
    }

    /// Stops the track if it is active, otherwise plays it from the start.
    pub fn toggle_stop(&mut self) {
        if self.sound.is_none() {
            return;
        }
        self.cleanup_channels();
        if self.is_active() {
            self.stop();
        } else {
            if self.is_paused {
                self.stop();
            }
            self.play();
        }
    }

    /// Pauses the track if it is active, resumes it if paused, otherwise plays it.
    pub fn toggle_pause(&mut self) {
        if self.sound.is_none() {
            return;
        }
        self.cleanup_channels();
        if self.is_active() {
            self.pause();
        } else if self.is_paused {
            self.unpause();
        } else {
            self.play();
        }
    }

    /// Starts one more playback of the sound. If no channel is free the track
    /// keeps its previous state.
    pub fn play(&mut self) {
        let Some(sound) = self.sound else {
            return;
        };
        if let Some(channel) = self.pool.play(sound, self.looped) {
            self.channels.push(channel);
            self.is_playing = true;
            self.is_paused = false;
        }
    }

    /// Stops every playback of the sound.
    pub fn stop(&mut self) {
        if let Some(sound) = self.sound {
            self.pool.stop_all(&self.channels);
            self.pool.stop_sound(sound);
        }
        self.channels.clear();
        self.is_playing = false;
        self.is_paused = false;
    }

    pub fn pause(&mut self) {
        self.pool.pause(&self.channels);
        self.is_paused = true;
    }

    pub fn unpause(&mut self) {
        self.pool.resume(&self.channels);
        self.is_paused = false;
        self.is_playing = true;
    }

    /// Drops channels that finished or were reused for another sound. The track
    /// is idle once none are left.
    pub fn cleanup_channels(&mut self) {
        match self.sound {
            Some(sound) => {
                let pool = &self.pool;
                self.channels
                    .retain(|channel| pool.is_active_for(*channel, sound));
            }
            None => self.channels.clear(),
        }

        if self.channels.is_empty() {
            self.is_playing = false;
            self.is_paused = false;
        }
    }

    /// Playing and not paused.
    pub fn is_active(&self) -> bool {
        self.is_playing && !self.is_paused
    }

    pub fn state(&self) -> TrackState {
        TrackState {
            is_playing: self.is_playing,
            is_paused: self.is_paused,
        }
    }

    /// The channels the track is currently tracking.
    pub fn active_channels(&self) -> &[ChannelHandle] {
        &self.channels
    }

    /// Sets the volume in dB, clamped to -60..=0. Applies to playback in progress.
    pub fn set_volume(&mut self, db: i32) {
        self.volume_db = db.clamp(MIN_VOLUME_DB, MAX_VOLUME_DB);
        if let Some(sound) = self.sound {
            self.pool.set_volume(sound, self.gain());
        }
    }

    /// The volume in dB.
    pub fn volume(&self) -> i32 {
        self.volume_db
    }

    /// The linear gain for the current volume.
    pub fn gain(&self) -> f32 {
        gain_from_db(self.volume_db)
    }

    pub fn set_mode(&mut self, mode: PlayMode) {
        self.mode = mode;
    }

    pub fn mode(&self) -> PlayMode {
        self.mode
    }

    /// Sets whether new playbacks repeat until stopped.
    pub fn set_loop(&mut self, looped: bool) {
        self.looped = looped;
    }

    pub fn looped(&self) -> bool {
        self.looped
    }

    pub fn set_mute_others(&mut self, mute_others: bool) {
        self.mute_others = mute_others;
    }

    pub fn mute_others(&self) -> bool {
        self.mute_others
    }

    pub fn set_shortcut(&mut self, shortcut: Chord) {
        self.shortcut = shortcut;
    }

    pub fn shortcut(&self) -> &Chord {
        &self.shortcut
    }
}

impl Drop for Track {
    fn drop(&mut self) {
        self.unload();
    }
}

impl fmt::Debug for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Track")
            .field("file_path", &self.file_path)
            .field("sound", &self.sound)
            .field("mode", &self.mode)
            .field("volume_db", &self.volume_db)
            .field("looped", &self.looped)
            .field("mute_others", &self.mute_others)
            .field("shortcut", &self.shortcut.to_string())
            .field("channels", &self.channels.len())
            .field("state", &self.state())
            .finish()
    }
}
