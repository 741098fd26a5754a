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
use serde::{Deserialize, Serialize};

use crate::track::PlayMode;

/// A YAML representation of a track slot.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct Track {
    /// The sound file for the track. Empty when no file is chosen.
    file_path: String,

    /// Volume in dB, -60 to 0.
    volume: i32,

    /// The chord that triggers the track, e.g. "ctrl+A". Empty when unbound.
    shortcut: String,

    /// How the track responds to being triggered.
    mode: PlayMode,

    /// Whether playback repeats until stopped.
    #[serde(rename = "loop")]
    looped: bool,

    /// Whether starting this track stops every other track.
    mute_others: bool,
}

impl Track {
    /// Creates a new track configuration.
    pub fn new(
        file_path: &str,
        volume: i32,
        shortcut: &str,
        mode: PlayMode,
        looped: bool,
        mute_others: bool,
    ) -> Track {
        Track {
            file_path: file_path.to_string(),
            volume,
            shortcut: shortcut.to_string(),
            mode,
            looped,
            mute_others,
        }
    }

    /// Gets the sound file path.
    pub fn file_path(&self) -> &str {
        &self.file_path
    }

    /// Gets the volume in dB.
    pub fn volume(&self) -> i32 {
        self.volume
    }

    /// Gets the shortcut string.
    pub fn shortcut(&self) -> &str {
        &self.shortcut
    }

    /// Gets the play mode.
    pub fn mode(&self) -> PlayMode {
        self.mode
    }

    /// Gets whether the track loops.
    pub fn looped(&self) -> bool {
        self.looped
    }

    /// Gets whether the track stops the others when it starts.
    pub fn mute_others(&self) -> bool {
        self.mute_others
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_track_defaults() -> Result<(), Box<dyn std::error::Error>> {
        let track: Track = serde_yml::from_str("file_path: kick.wav")?;
        assert_eq!(track.file_path(), "kick.wav");
        assert_eq!(track.volume(), 0);
        assert_eq!(track.shortcut(), "");
        assert_eq!(track.mode(), PlayMode::Stop);
        assert!(!track.looped());
        assert!(!track.mute_others());
        Ok(())
    }

    #[test]
    fn test_full_track() -> Result<(), Box<dyn std::error::Error>> {
        let track: Track = serde_yml::from_str(
            r#"
            file_path: horn.mp3
            volume: -12
            shortcut: ctrl+H
            mode: overlap
            loop: true
            mute_others: true
            "#,
        )?;
        assert_eq!(
            track,
            Track::new("horn.mp3", -12, "ctrl+H", PlayMode::Overlap, true, true)
        );
        Ok(())
    }

    #[test]
    fn test_loop_serializes_as_loop() -> Result<(), Box<dyn std::error::Error>> {
        let track = Track::new("a.wav", 0, "", PlayMode::Pause, true, false);
        let yaml = serde_yml::to_string(&track)?;
        assert!(yaml.contains("loop: true"));
        assert!(yaml.contains("mode: pause"));
        Ok(())
    }
}
