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
use std::{error::Error, fmt, path::Path, path::PathBuf, sync::Arc};

use tracing::{info, warn};

use crate::config;

pub mod cpal;
pub mod decode;
pub mod mixer;
pub mod mock;
mod thread_priority;

pub use mixer::ChannelMixer;

/// Identifies a decoded sound held in memory by the mixer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SoundHandle(u64);

impl SoundHandle {
    pub(crate) fn new(id: u64) -> SoundHandle {
        SoundHandle(id)
    }
}

impl fmt::Display for SoundHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sound#{}", self.0)
    }
}

/// Identifies one playback on one mixer channel. The generation distinguishes
/// successive playbacks on the same channel slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChannelHandle {
    index: usize,
    generation: u64,
}

impl ChannelHandle {
    pub(crate) fn new(index: usize, generation: u64) -> ChannelHandle {
        ChannelHandle { index, generation }
    }

    /// The slot index of the channel.
    pub fn index(&self) -> usize {
        self.index
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }
}

impl fmt::Display for ChannelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "channel#{}.{}", self.index, self.generation)
    }
}

/// Raised when a sound file can't be turned into a playable sound.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unable to decode audio: {0}")]
    Decode(#[from] symphonia::core::errors::Error),

    #[error("No audio track found in {0}")]
    NoAudioTrack(String),

    #[error("Unsupported audio: {0}")]
    Unsupported(String),

    #[error("Unable to resample from {0}Hz to {1}Hz")]
    Resample(u32, u32),
}

/// Raised when an output device can't be found or opened.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("No output device named '{0}'")]
    NotFound(String),

    #[error("No default output device available")]
    NoDefault,

    #[error("Failed to open output stream: {0}")]
    Stream(String),
}

/// The playback service consumed by the channel pool: a fixed number of
/// concurrent channels, each carrying one playing sound.
pub trait Output: Send + Sync {
    /// Decodes a sound file into memory.
    fn load_sound(&self, path: &Path) -> Result<SoundHandle, LoadError>;

    /// Releases a sound, stopping every channel that carries it.
    fn unload_sound(&self, sound: SoundHandle);

    /// Changes the number of channels available for playback.
    fn set_channel_capacity(&self, capacity: usize);

    /// Returns the number of channels available for playback.
    fn channel_capacity(&self) -> usize;

    /// Starts the sound on a free channel. Returns None if the sound is unknown
    /// or no channel is free.
    fn play(&self, sound: SoundHandle, looped: bool) -> Option<ChannelHandle>;

    fn stop(&self, channel: ChannelHandle);

    /// Stops every channel carrying the given sound.
    fn stop_sound(&self, sound: SoundHandle);

    fn pause(&self, channel: ChannelHandle);

    fn resume(&self, channel: ChannelHandle);

    /// Sets the linear gain applied to every playback of the sound.
    fn set_volume(&self, sound: SoundHandle, gain: f32);

    /// True while the playback identified by the handle is still on its channel.
    fn is_channel_busy(&self, channel: ChannelHandle) -> bool;

    /// The sound currently carried by the channel slot, if any.
    fn channel_sound(&self, channel: ChannelHandle) -> Option<SoundHandle>;
}

/// The running audio subsystem: the mixer plus whatever is pulling from it.
pub struct AudioSystem {
    mixer: Arc<ChannelMixer>,
    device: Box<dyn Device>,
}

impl AudioSystem {
    /// The mixer that owns all playback channels.
    pub fn mixer(&self) -> Arc<ChannelMixer> {
        self.mixer.clone()
    }

    /// Stops all playback and tears down the output.
    pub fn shutdown(mut self) {
        self.mixer.stop_everything();
        self.device.close();
        info!(device = %self.device, "Audio stopped");
    }
}

/// An output device that drains the mixer.
pub trait Device: fmt::Display + Send {
    /// Stops pulling audio from the mixer and releases the device.
    fn close(&mut self);
}

/// Lists output devices known to cpal.
pub fn list_devices() -> Result<Vec<String>, Box<dyn Error>> {
    cpal::list()
}

/// Starts the audio subsystem described by the config.
pub fn init(config: &config::Audio) -> Result<AudioSystem, Box<dyn Error>> {
    let mixer = Arc::new(ChannelMixer::new(config.channels(), config.sample_rate()));
    mixer.set_channel_capacity(config.max_channels());

    let device: Box<dyn Device> = if config.device().starts_with("mock") {
        Box::new(mock::Device::new(config.device()))
    } else {
        match cpal::Device::open(config.device(), config, mixer.clone()) {
            Ok(device) => Box::new(device),
            Err(e) if config.device() != config::DEFAULT_DEVICE => {
                warn!(
                    device = config.device(),
                    err = %e,
                    "Unable to open audio device, falling back to the default device"
                );
                Box::new(cpal::Device::open(
                    config::DEFAULT_DEVICE,
                    config,
                    mixer.clone(),
                )?)
            }
            Err(e) => return Err(e.into()),
        }
    };

    info!(
        device = %device,
        sample_rate = config.sample_rate(),
        channels = config.channels(),
        max_channels = config.max_channels(),
        "Audio started"
    );

    Ok(AudioSystem { mixer, device })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_mock_device() -> Result<(), Box<dyn Error>> {
        let config = config::Audio::new("mock-device");
        let system = init(&config)?;
        assert_eq!(system.mixer().channel_capacity(), 32);
        system.shutdown();
        Ok(())
    }

    #[test]
    fn test_handle_display() {
        assert_eq!(SoundHandle::new(4).to_string(), "sound#4");
        assert_eq!(ChannelHandle::new(2, 7).to_string(), "channel#2.7");
    }
}
