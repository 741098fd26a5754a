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

use super::audio::Audio;
use super::track::Track;

/// Settings that apply to the whole board.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct GlobalSettings {
    /// Whether tracks are active only while their chord is held.
    hold_mode: bool,

    /// The chord that stops every track. Empty when unbound.
    stop_all_shortcut: String,
}

impl GlobalSettings {
    /// Creates new global settings.
    pub fn new(hold_mode: bool, stop_all_shortcut: &str) -> GlobalSettings {
        GlobalSettings {
            hold_mode,
            stop_all_shortcut: stop_all_shortcut.to_string(),
        }
    }

    /// Gets whether hold mode is enabled.
    pub fn hold_mode(&self) -> bool {
        self.hold_mode
    }

    /// Gets the stop-all shortcut string.
    pub fn stop_all_shortcut(&self) -> &str {
        &self.stop_all_shortcut
    }
}

/// The persisted settings document.
#[derive(Deserialize, Serialize, Clone, Debug, Default)]
#[serde(default)]
pub struct Settings {
    global_settings: GlobalSettings,

    #[serde(skip_serializing_if = "Option::is_none")]
    audio: Option<Audio>,

    /// Track slots in display order.
    tracks: Vec<Track>,
}

impl Settings {
    /// Creates a new settings document.
    pub fn new(
        global_settings: GlobalSettings,
        audio: Option<Audio>,
        tracks: Vec<Track>,
    ) -> Settings {
        Settings {
            global_settings,
            audio,
            tracks,
        }
    }

    /// Gets the global settings.
    pub fn global_settings(&self) -> &GlobalSettings {
        &self.global_settings
    }

    /// Gets the audio configuration, falling back to defaults.
    pub fn audio(&self) -> Audio {
        self.audio.clone().unwrap_or_default()
    }

    /// Gets the track slots.
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Replaces the board state while keeping the audio configuration.
    pub fn with_board(&self, global_settings: GlobalSettings, tracks: Vec<Track>) -> Settings {
        Settings {
            global_settings,
            audio: self.audio.clone(),
            tracks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::PlayMode;

    #[test]
    fn test_parse_document() -> Result<(), Box<dyn std::error::Error>> {
        let settings: Settings = serde_yml::from_str(
            r#"
            global_settings:
              hold_mode: true
              stop_all_shortcut: ctrl+shift
            tracks:
              - file_path: a.wav
                volume: -6
                shortcut: A
                mode: single
              - file_path: b.wav
                mode: 暂停模式
            "#,
        )?;
        assert!(settings.global_settings().hold_mode());
        assert_eq!(settings.global_settings().stop_all_shortcut(), "ctrl+shift");
        assert_eq!(settings.tracks().len(), 2);
        assert_eq!(settings.tracks()[0].mode(), PlayMode::Single);
        assert_eq!(settings.tracks()[1].mode(), PlayMode::Pause);
        assert_eq!(settings.audio().device(), "default");
        Ok(())
    }

    #[test]
    fn test_empty_document_defaults() -> Result<(), Box<dyn std::error::Error>> {
        let settings: Settings = serde_yml::from_str("{}")?;
        assert!(!settings.global_settings().hold_mode());
        assert_eq!(settings.global_settings().stop_all_shortcut(), "");
        assert!(settings.tracks().is_empty());
        Ok(())
    }

    #[test]
    fn test_with_board_keeps_audio() {
        let settings = Settings::new(
            GlobalSettings::default(),
            Some(Audio::new("mock-device")),
            Vec::new(),
        );
        let updated = settings.with_board(GlobalSettings::new(true, "F1"), vec![Track::default()]);
        assert_eq!(updated.audio().device(), "mock-device");
        assert!(updated.global_settings().hold_mode());
        assert_eq!(updated.tracks().len(), 1);
    }
}
