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
use std::{error::Error, time::Duration};

use duration_string::DurationString;
use serde::{Deserialize, Serialize};

use crate::audio::mixer::DEFAULT_CHANNEL_CAPACITY;

/// The device name that selects the host's default output.
pub const DEFAULT_DEVICE: &str = "default";
const DEFAULT_SAMPLE_RATE: u32 = 44100;
const DEFAULT_OUTPUT_CHANNELS: u16 = 2;
const DEFAULT_BUFFER_SIZE: u32 = 512;
const DEFAULT_STATUS_INTERVAL: Duration = Duration::from_millis(100);

/// A YAML representation of the audio configuration.
#[derive(Deserialize, Serialize, Clone, Debug, Default)]
pub struct Audio {
    /// The output device: "default", a device name, or "mock".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    device: Option<String>,

    /// Output sample rate in Hz (default: 44100).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sample_rate: Option<u32>,

    /// Number of output channels (default: 2).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    channels: Option<u16>,

    /// Output stream buffer size in frames (default: 512).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    buffer_size: Option<u32>,

    /// Number of sounds that can play at once (default: 32).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    max_channels: Option<usize>,

    /// How often track status is refreshed, e.g. "100ms".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    status_interval: Option<String>,
}

impl Audio {
    /// New will create a new Audio configuration for the given device.
    pub fn new(device: &str) -> Audio {
        Audio {
            device: Some(device.to_string()),
            ..Default::default()
        }
    }

    /// Returns the device from the configuration.
    pub fn device(&self) -> &str {
        self.device.as_deref().unwrap_or(DEFAULT_DEVICE)
    }

    /// Returns the output sample rate (default: 44100).
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE)
    }

    /// Returns the number of output channels (default: 2).
    pub fn channels(&self) -> u16 {
        self.channels.unwrap_or(DEFAULT_OUTPUT_CHANNELS).max(1)
    }

    /// Returns the output buffer size in frames (default: 512).
    pub fn buffer_size(&self) -> u32 {
        self.buffer_size.unwrap_or(DEFAULT_BUFFER_SIZE).max(1)
    }

    /// Returns the number of concurrent playback channels (default: 32).
    pub fn max_channels(&self) -> usize {
        self.max_channels.unwrap_or(DEFAULT_CHANNEL_CAPACITY).max(1)
    }

    /// Returns the status refresh interval (default: 100ms).
    pub fn status_interval(&self) -> Result<Duration, Box<dyn Error>> {
        match &self.status_interval {
            Some(interval) => Ok(DurationString::from_string(interval.clone())?.into()),
            None => Ok(DEFAULT_STATUS_INTERVAL),
        }
    }
}
