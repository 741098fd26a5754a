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

//! A hotkey-driven soundboard. Each track is bound to a keyboard chord and
//! reacts to it according to its play mode; the [`soundboard::Soundboard`]
//! ties the tracks, the key dispatcher and the settings file together.

pub mod audio;
pub mod config;
pub mod hotkey;
pub mod input;
pub mod pool;
pub mod registry;
pub mod shortcut;
pub mod soundboard;
#[cfg(test)]
mod testutil;
pub mod track;
