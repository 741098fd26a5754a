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

use tracing::info;

/// A mock device. Nothing pulls from the mixer, so playback only advances
/// when the mixer is processed by hand.
pub struct Device {
    name: String,
    closed: bool,
}

impl Device {
    /// Gets the given mock device.
    pub fn new(name: &str) -> Device {
        info!(device = name, "Using mock audio device");
        Device {
            name: name.to_string(),
            closed: false,
        }
    }

    /// Returns true once the device has been closed.
    #[cfg(test)]
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl super::Device for Device {
    fn close(&mut self) {
        self.closed = true;
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name)
    }
}
