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
use std::fs;
use std::path::Path;

use tracing::info;

mod audio;
mod error;
mod settings;
mod track;

pub use self::audio::{Audio, DEFAULT_DEVICE};
pub use self::error::ConfigError;
pub use self::settings::{GlobalSettings, Settings};
pub use self::track::Track;

/// Environment variables with this prefix override settings file values,
/// e.g. SOUNDPAD__AUDIO__DEVICE=mock.
const ENV_PREFIX: &str = "SOUNDPAD";

/// Loads the settings document. A missing file yields the default (empty) board.
pub fn load_settings(path: &Path) -> Result<Settings, ConfigError> {
    let settings: Settings = ::config::Config::builder()
        .add_source(
            ::config::File::from(path)
                .format(::config::FileFormat::Yaml)
                .required(false),
        )
        .add_source(
            ::config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()?;

    info!(
        path = ?path,
        tracks = settings.tracks().len(),
        "Settings loaded"
    );
    Ok(settings)
}

/// Writes the settings document as YAML.
pub fn save_settings(path: &Path, settings: &Settings) -> Result<(), ConfigError> {
    let serialized = serde_yml::to_string(settings)?;
    fs::write(path, serialized)?;
    info!(path = ?path, tracks = settings.tracks().len(), "Settings saved");
    Ok(())
}
