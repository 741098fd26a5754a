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

//! The channel pool tracks which playback channels carry which sound on
//! behalf of the tracks. It owns no channels itself; the audio output does.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::audio::{ChannelHandle, LoadError, Output, SoundHandle};

/// A cheap, cloneable handle to the shared playback channels.
#[derive(Clone)]
pub struct AudioChannelPool {
    output: Arc<dyn Output>,
}

impl AudioChannelPool {
    /// Creates a pool over the given output.
    pub fn new(output: Arc<dyn Output>) -> AudioChannelPool {
        AudioChannelPool { output }
    }

    /// Decodes a sound file so it can be played.
    pub fn load_sound(&self, path: &Path) -> Result<SoundHandle, LoadError> {
        self.output.load_sound(path)
    }

    /// Releases a sound and any channels still carrying it.
    pub fn unload_sound(&self, sound: SoundHandle) {
        self.output.unload_sound(sound);
    }

    /// Starts one playback of the sound. Best effort: None when every channel is busy.
    pub fn play(&self, sound: SoundHandle, looped: bool) -> Option<ChannelHandle> {
        let channel = self.output.play(sound, looped);
        match channel {
            Some(channel) => debug!(sound = %sound, channel = %channel, looped, "Playback started"),
            None => warn!(sound = %sound, "Playback could not start"),
        }
        channel
    }

    /// Stops every given channel.
    pub fn stop_all(&self, channels: &[ChannelHandle]) {
        channels.iter().for_each(|channel| self.output.stop(*channel));
    }

    /// Stops every channel carrying the sound, tracked or not.
    pub fn stop_sound(&self, sound: SoundHandle) {
        self.output.stop_sound(sound);
    }

    pub fn pause(&self, channels: &[ChannelHandle]) {
        channels.iter().for_each(|channel| self.output.pause(*channel));
    }

    pub fn resume(&self, channels: &[ChannelHandle]) {
        channels.iter().for_each(|channel| self.output.resume(*channel));
    }

    pub fn set_volume(&self, sound: SoundHandle, gain: f32) {
        self.output.set_volume(sound, gain);
    }

    pub fn is_busy(&self, channel: ChannelHandle) -> bool {
        self.output.is_channel_busy(channel)
    }

    pub fn owner_sound(&self, channel: ChannelHandle) -> Option<SoundHandle> {
        self.output.channel_sound(channel)
    }

    /// True only if the channel is still playing and still carries the given sound.
    /// A channel that finished and was reused for something else is not active.
    pub fn is_active_for(&self, channel: ChannelHandle, sound: SoundHandle) -> bool {
        self.is_busy(channel) && self.owner_sound(channel) == Some(sound)
    }

    /// The number of concurrent channels.
    pub fn capacity(&self) -> usize {
        self.output.channel_capacity()
    }
}

impl fmt::Debug for AudioChannelPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioChannelPool")
            .field("capacity", &self.capacity())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::decode::DecodedSound;
    use crate::audio::ChannelMixer;

    fn pool_with_sound(frames: usize) -> (Arc<ChannelMixer>, AudioChannelPool, SoundHandle) {
        let mixer = Arc::new(ChannelMixer::new(1, 44100));
        let sound = mixer.add_sound(DecodedSound {
            samples: vec![0.1; frames],
            channels: 1,
            sample_rate: 44100,
        });
        (mixer.clone(), AudioChannelPool::new(mixer), sound)
    }

    #[test]
    fn test_play_and_ownership() {
        let (_, pool, sound) = pool_with_sound(10);
        let channel = pool.play(sound, false).expect("channel");

        assert!(pool.is_busy(channel));
        assert_eq!(pool.owner_sound(channel), Some(sound));
        assert!(pool.is_active_for(channel, sound));
        assert_eq!(pool.capacity(), 32);
    }

    #[test]
    fn test_finished_channel_not_active() {
        let (mixer, pool, sound) = pool_with_sound(2);
        let channel = pool.play(sound, false).expect("channel");

        mixer.process_frames(4);
        assert!(!pool.is_busy(channel));
        assert!(!pool.is_active_for(channel, sound));
    }

    #[test]
    fn test_pause_resume_stop_all() {
        let (mixer, pool, sound) = pool_with_sound(10);
        let channels: Vec<ChannelHandle> = (0..3).filter_map(|_| pool.play(sound, false)).collect();
        assert_eq!(channels.len(), 3);

        pool.pause(&channels);
        assert_eq!(mixer.process_frames(1), vec![0.0]);
        pool.resume(&channels);
        assert!(mixer.process_frames(1)[0] > 0.0);

        pool.stop_all(&channels);
        assert!(channels.iter().all(|channel| !pool.is_busy(*channel)));
    }
}
