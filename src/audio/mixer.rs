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
// Channel mixing that can be driven by both the cpal output and tests
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use super::decode::{decode_file, DecodedSound};
use super::{ChannelHandle, LoadError, Output, SoundHandle};

/// Default number of concurrent playback channels.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 32;

/// A decoded sound shared between every channel playing it.
struct SoundData {
    /// Interleaved samples.
    samples: Arc<Vec<f32>>,
    /// Number of channels in the samples.
    channels: u16,
    /// Linear gain stored as f32 bits so the mix loop sees changes immediately.
    gain: AtomicU32,
}

impl SoundData {
    fn new(decoded: DecodedSound) -> SoundData {
        SoundData {
            samples: Arc::new(decoded.samples),
            channels: decoded.channels.max(1),
            gain: AtomicU32::new(1.0f32.to_bits()),
        }
    }

    fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    fn gain(&self) -> f32 {
        f32::from_bits(self.gain.load(Ordering::Relaxed))
    }

    fn set_gain(&self, gain: f32) {
        self.gain.store(gain.to_bits(), Ordering::Relaxed);
    }
}

/// One playback occupying a channel slot.
struct Playback {
    sound: SoundHandle,
    data: Arc<SoundData>,
    generation: u64,
    /// Next frame to mix.
    position: usize,
    looped: bool,
    paused: bool,
}

struct State {
    sounds: HashMap<SoundHandle, Arc<SoundData>>,
    slots: Vec<Option<Playback>>,
    next_generation: u64,
}

impl State {
    fn playback(&self, channel: ChannelHandle) -> Option<&Playback> {
        self.slots
            .get(channel.index())
            .and_then(|slot| slot.as_ref())
            .filter(|playback| playback.generation == channel.generation())
    }

    fn playback_mut(&mut self, channel: ChannelHandle) -> Option<&mut Playback> {
        self.slots
            .get_mut(channel.index())
            .and_then(|slot| slot.as_mut())
            .filter(|playback| playback.generation == channel.generation())
    }
}

/// Mixes a fixed number of channel slots into an interleaved output buffer.
pub struct ChannelMixer {
    state: Mutex<State>,
    /// Number of output channels.
    num_channels: u16,
    /// Output sample rate.
    sample_rate: u32,
    next_sound_id: AtomicU64,
}

impl ChannelMixer {
    /// Creates a new mixer with the default channel capacity.
    pub fn new(num_channels: u16, sample_rate: u32) -> Self {
        let mut slots = Vec::with_capacity(DEFAULT_CHANNEL_CAPACITY);
        slots.resize_with(DEFAULT_CHANNEL_CAPACITY, || None);
        Self {
            state: Mutex::new(State {
                sounds: HashMap::new(),
                slots,
                next_generation: 1,
            }),
            num_channels: num_channels.max(1),
            sample_rate,
            next_sound_id: AtomicU64::new(1),
        }
    }

    /// Gets the number of output channels.
    pub fn num_channels(&self) -> u16 {
        self.num_channels
    }

    /// Gets the output sample rate.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Registers an already decoded sound.
    pub fn add_sound(&self, decoded: DecodedSound) -> SoundHandle {
        let handle = SoundHandle::new(self.next_sound_id.fetch_add(1, Ordering::Relaxed));
        self.state
            .lock()
            .sounds
            .insert(handle, Arc::new(SoundData::new(decoded)));
        handle
    }

    /// Returns the number of channels currently carrying a sound.
    pub fn busy_channels(&self) -> usize {
        self.state
            .lock()
            .slots
            .iter()
            .filter(|slot| slot.is_some())
            .count()
    }

    /// Returns the number of sounds held in memory.
    pub fn sound_count(&self) -> usize {
        self.state.lock().sounds.len()
    }

    /// Stops every channel.
    pub fn stop_everything(&self) {
        let mut state = self.state.lock();
        state.slots.iter_mut().for_each(|slot| *slot = None);
    }

    /// Mixes `num_frames` frames into the start of the output buffer, overwriting it.
    pub fn process_into_output(&self, output: &mut [f32], num_frames: usize) {
        let out_channels = self.num_channels as usize;
        let len = (num_frames * out_channels).min(output.len());
        let output = &mut output[..len];
        output.fill(0.0);
        let num_frames = len / out_channels;

        let mut state = self.state.lock();
        for slot in state.slots.iter_mut() {
            let finished = match slot.as_mut() {
                Some(playback) if !playback.paused => {
                    Self::mix_playback(playback, output, num_frames, out_channels)
                }
                _ => false,
            };
            if finished {
                *slot = None;
            }
        }
        drop(state);

        output.iter_mut().for_each(|s| *s = s.clamp(-1.0, 1.0));
    }

    /// Mixes multiple frames and returns them as a new buffer.
    pub fn process_frames(&self, num_frames: usize) -> Vec<f32> {
        let mut frames = vec![0.0f32; num_frames * self.num_channels as usize];
        self.process_into_output(&mut frames, num_frames);
        frames
    }

    /// Adds one playback to the output. Returns true once a non-looping playback has ended.
    fn mix_playback(
        playback: &mut Playback,
        output: &mut [f32],
        num_frames: usize,
        out_channels: usize,
    ) -> bool {
        let data = playback.data.clone();
        let total_frames = data.frames();
        if total_frames == 0 {
            return true;
        }
        let gain = data.gain();
        let src_channels = data.channels as usize;

        for frame in 0..num_frames {
            if playback.position >= total_frames {
                if !playback.looped {
                    return true;
                }
                playback.position = 0;
            }
            let base = playback.position * src_channels;
            for out_channel in 0..out_channels {
                // Mono is duplicated across outputs; extra source channels are dropped.
                let src_channel = out_channel.min(src_channels - 1);
                output[frame * out_channels + out_channel] +=
                    data.samples[base + src_channel] * gain;
            }
            playback.position += 1;
        }

        !playback.looped && playback.position >= total_frames
    }
}

impl Output for ChannelMixer {
    fn load_sound(&self, path: &Path) -> Result<SoundHandle, LoadError> {
        // Decode outside the lock so the output thread never waits on the disk.
        let decoded = decode_file(path, self.sample_rate)?;
        let handle = self.add_sound(decoded);
        debug!(path = ?path, sound = %handle, "Sound loaded into mixer");
        Ok(handle)
    }

    fn unload_sound(&self, sound: SoundHandle) {
        let mut state = self.state.lock();
        state.sounds.remove(&sound);
        for slot in state.slots.iter_mut() {
            if slot.as_ref().is_some_and(|p| p.sound == sound) {
                *slot = None;
            }
        }
    }

    fn set_channel_capacity(&self, capacity: usize) {
        let mut state = self.state.lock();
        state.slots.resize_with(capacity, || None);
        debug!(capacity, "Channel capacity set");
    }

    fn channel_capacity(&self) -> usize {
        self.state.lock().slots.len()
    }

    fn play(&self, sound: SoundHandle, looped: bool) -> Option<ChannelHandle> {
        let mut state = self.state.lock();
        let data = match state.sounds.get(&sound) {
            Some(data) => data.clone(),
            None => {
                warn!(sound = %sound, "Attempted to play an unknown sound");
                return None;
            }
        };
        let index = match state.slots.iter().position(|slot| slot.is_none()) {
            Some(index) => index,
            None => {
                warn!(
                    capacity = state.slots.len(),
                    sound = %sound,
                    "All channels busy, dropping playback"
                );
                return None;
            }
        };

        let generation = state.next_generation;
        state.next_generation += 1;
        state.slots[index] = Some(Playback {
            sound,
            data,
            generation,
            position: 0,
            looped,
            paused: false,
        });
        Some(ChannelHandle::new(index, generation))
    }

    fn stop(&self, channel: ChannelHandle) {
        let mut state = self.state.lock();
        if state.playback(channel).is_some() {
            state.slots[channel.index()] = None;
        }
    }

    fn stop_sound(&self, sound: SoundHandle) {
        let mut state = self.state.lock();
        for slot in state.slots.iter_mut() {
            if slot.as_ref().is_some_and(|p| p.sound == sound) {
                *slot = None;
            }
        }
    }

    fn pause(&self, channel: ChannelHandle) {
        if let Some(playback) = self.state.lock().playback_mut(channel) {
            playback.paused = true;
        }
    }

    fn resume(&self, channel: ChannelHandle) {
        if let Some(playback) = self.state.lock().playback_mut(channel) {
            playback.paused = false;
        }
    }

    fn set_volume(&self, sound: SoundHandle, gain: f32) {
        if let Some(data) = self.state.lock().sounds.get(&sound) {
            data.set_gain(gain);
        }
    }

    fn is_channel_busy(&self, channel: ChannelHandle) -> bool {
        self.state.lock().playback(channel).is_some()
    }

    fn channel_sound(&self, channel: ChannelHandle) -> Option<SoundHandle> {
        self.state
            .lock()
            .slots
            .get(channel.index())
            .and_then(|slot| slot.as_ref())
            .map(|playback| playback.sound)
    }
}

impl std::fmt::Debug for ChannelMixer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelMixer")
            .field("num_channels", &self.num_channels)
            .field("sample_rate", &self.sample_rate)
            .field("capacity", &self.channel_capacity())
            .field("busy_channels", &self.busy_channels())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sound(samples: Vec<f32>, channels: u16) -> DecodedSound {
        DecodedSound {
            samples,
            channels,
            sample_rate: 44100,
        }
    }

    #[test]
    fn test_basic_mixing() {
        let mixer = ChannelMixer::new(2, 44100);
        let handle = mixer.add_sound(sound(vec![0.5, 0.8], 1));

        assert!(mixer.play(handle, false).is_some());
        let frames = mixer.process_frames(3);

        // Mono is duplicated to both outputs, then silence once the sound ends.
        assert_eq!(frames, vec![0.5, 0.5, 0.8, 0.8, 0.0, 0.0]);
        assert_eq!(mixer.busy_channels(), 0);
    }

    #[test]
    fn test_multiple_source_mixing() {
        let mixer = ChannelMixer::new(2, 44100);
        let first = mixer.add_sound(sound(vec![0.5, 0.3], 2));
        let second = mixer.add_sound(sound(vec![0.2, 0.1], 2));
        mixer.play(first, false);
        mixer.play(second, false);

        let frame = mixer.process_frames(1);
        assert!((frame[0] - 0.7).abs() < 1e-6);
        assert!((frame[1] - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_volume_applies_to_playing_channel() {
        let mixer = ChannelMixer::new(1, 44100);
        let handle = mixer.add_sound(sound(vec![1.0; 4], 1));
        mixer.play(handle, false);

        assert_eq!(mixer.process_frames(1), vec![1.0]);
        mixer.set_volume(handle, 0.5);
        assert_eq!(mixer.process_frames(1), vec![0.5]);
    }

    #[test]
    fn test_loop_wraps_until_stopped() {
        let mixer = ChannelMixer::new(1, 44100);
        let handle = mixer.add_sound(sound(vec![0.1, 0.2], 1));
        let channel = mixer.play(handle, true).expect("channel");

        let frames = mixer.process_frames(5);
        assert_eq!(frames, vec![0.1, 0.2, 0.1, 0.2, 0.1]);
        assert!(mixer.is_channel_busy(channel));

        mixer.stop(channel);
        assert!(!mixer.is_channel_busy(channel));
        assert_eq!(mixer.process_frames(1), vec![0.0]);
    }

    #[test]
    fn test_pause_and_resume_hold_position() {
        let mixer = ChannelMixer::new(1, 44100);
        let handle = mixer.add_sound(sound(vec![0.1, 0.2, 0.3], 1));
        let channel = mixer.play(handle, false).expect("channel");

        assert_eq!(mixer.process_frames(1), vec![0.1]);
        mixer.pause(channel);
        assert_eq!(mixer.process_frames(2), vec![0.0, 0.0]);
        assert!(mixer.is_channel_busy(channel));

        mixer.resume(channel);
        assert_eq!(mixer.process_frames(2), vec![0.2, 0.3]);
        assert!(!mixer.is_channel_busy(channel));
    }

    #[test]
    fn test_capacity_exhaustion_fails_play() {
        let mixer = ChannelMixer::new(1, 44100);
        mixer.set_channel_capacity(2);
        let handle = mixer.add_sound(sound(vec![0.1; 100], 1));

        assert!(mixer.play(handle, false).is_some());
        assert!(mixer.play(handle, false).is_some());
        assert!(mixer.play(handle, false).is_none());
        assert_eq!(mixer.busy_channels(), 2);
    }

    #[test]
    fn test_reused_slot_is_not_busy_for_stale_handle() {
        let mixer = ChannelMixer::new(1, 44100);
        let handle = mixer.add_sound(sound(vec![0.1; 2], 1));

        let first = mixer.play(handle, false).expect("channel");
        mixer.process_frames(2);
        assert!(!mixer.is_channel_busy(first));

        // The same slot now carries the same sound again.
        let second = mixer.play(handle, false).expect("channel");
        assert_eq!(first.index(), second.index());
        assert!(!mixer.is_channel_busy(first));
        assert!(mixer.is_channel_busy(second));
        assert_eq!(mixer.channel_sound(first), Some(handle));
    }

    #[test]
    fn test_stop_sound_and_unload() {
        let mixer = ChannelMixer::new(1, 44100);
        let a = mixer.add_sound(sound(vec![0.1; 10], 1));
        let b = mixer.add_sound(sound(vec![0.1; 10], 1));
        mixer.play(a, false);
        mixer.play(a, false);
        let b_channel = mixer.play(b, false).expect("channel");

        mixer.stop_sound(a);
        assert_eq!(mixer.busy_channels(), 1);
        assert!(mixer.is_channel_busy(b_channel));

        mixer.unload_sound(b);
        assert_eq!(mixer.busy_channels(), 0);
        assert_eq!(mixer.sound_count(), 1);
        assert!(mixer.play(b, false).is_none());
    }

    #[test]
    fn test_shrinking_capacity_stops_extra_channels() {
        let mixer = ChannelMixer::new(1, 44100);
        let handle = mixer.add_sound(sound(vec![0.1; 10], 1));
        for _ in 0..4 {
            mixer.play(handle, false);
        }

        mixer.set_channel_capacity(2);
        assert_eq!(mixer.channel_capacity(), 2);
        assert_eq!(mixer.busy_channels(), 2);
    }
}
