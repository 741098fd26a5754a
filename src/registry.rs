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

use tracing::{debug, info};

use crate::pool::AudioChannelPool;
use crate::shortcut::Chord;
use crate::track::{Track, TrackState};

/// Identifies a track slot for as long as it exists. IDs are never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackId(u64);

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "track#{}", self.0)
    }
}

struct Slot {
    id: TrackId,
    track: Track,
}

/// The ordered collection of tracks on the board.
pub struct TrackRegistry {
    pool: AudioChannelPool,
    slots: Vec<Slot>,
    next_id: u64,
}

impl TrackRegistry {
    /// Creates an empty registry whose tracks play through the given pool.
    pub fn new(pool: AudioChannelPool) -> TrackRegistry {
        TrackRegistry {
            pool,
            slots: Vec::new(),
            next_id: 1,
        }
    }

    /// Appends an empty track and returns its ID.
    pub fn add(&mut self) -> TrackId {
        let id = TrackId(self.next_id);
        self.next_id += 1;
        self.slots.push(Slot {
            id,
            track: Track::new(self.pool.clone()),
        });
        debug!(track = %id, position = self.slots.len() - 1, "Track added");
        id
    }

    /// Removes the track, stopping its playback. Returns false if there's no such track.
    pub fn remove(&mut self, id: TrackId) -> bool {
        match self.index_of(id) {
            Some(index) => {
                // Dropping the track stops and releases its sound.
                self.slots.remove(index);
                debug!(track = %id, "Track removed");
                true
            }
            None => false,
        }
    }

    /// Moves the track at one position to another, shifting the ones in between.
    pub fn move_track(&mut self, from: usize, to: usize) -> bool {
        if from >= self.slots.len() || to >= self.slots.len() {
            return false;
        }
        let slot = self.slots.remove(from);
        self.slots.insert(to, slot);
        true
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// The position of the track in display order.
    pub fn index_of(&self, id: TrackId) -> Option<usize> {
        self.slots.iter().position(|slot| slot.id == id)
    }

    pub fn get(&self, id: TrackId) -> Option<&Track> {
        self.slots
            .iter()
            .find(|slot| slot.id == id)
            .map(|slot| &slot.track)
    }

    pub fn get_mut(&mut self, id: TrackId) -> Option<&mut Track> {
        self.slots
            .iter_mut()
            .find(|slot| slot.id == id)
            .map(|slot| &mut slot.track)
    }

    /// Track IDs in display order.
    pub fn ids(&self) -> Vec<TrackId> {
        self.slots.iter().map(|slot| slot.id).collect()
    }

    /// Tracks in display order.
    pub fn iter(&self) -> impl Iterator<Item = (TrackId, &Track)> {
        self.slots.iter().map(|slot| (slot.id, &slot.track))
    }

    /// Tracks whose shortcut includes the given key.
    pub fn tracks_for_key(&self, key: &str) -> Vec<TrackId> {
        self.slots
            .iter()
            .filter(|slot| slot.track.shortcut().contains(key))
            .map(|slot| slot.id)
            .collect()
    }

    /// Tracks bound to the given chord, in any key order. Several tracks may
    /// share a chord; they all fire together.
    pub fn find_by_shortcut(&self, chord: &Chord) -> Vec<TrackId> {
        if chord.is_empty() {
            return Vec::new();
        }
        self.slots
            .iter()
            .filter(|slot| slot.track.shortcut() == chord)
            .map(|slot| slot.id)
            .collect()
    }

    /// Triggers a track. A mute-others track stops every other track before it
    /// goes from inactive to active.
    pub fn trigger(&mut self, id: TrackId, hold_mode: bool, key_down: bool) -> bool {
        let Some(track) = self.get_mut(id) else {
            return false;
        };
        track.cleanup_channels();
        if track.mute_others() && track.would_activate(hold_mode, key_down) {
            self.stop_others(id);
        }

        let Some(track) = self.get_mut(id) else {
            return false;
        };
        track.toggle_play(hold_mode, key_down);
        debug!(track = %id, state = %track.state(), "Track state after trigger");
        true
    }

    /// Stops every track.
    pub fn stop_all(&mut self) {
        self.slots.iter_mut().for_each(|slot| slot.track.stop());
        info!(tracks = self.slots.len(), "Stopped all tracks");
    }

    /// Stops every track except the given one.
    pub fn stop_others(&mut self, id: TrackId) {
        self.slots
            .iter_mut()
            .filter(|slot| slot.id != id)
            .for_each(|slot| slot.track.stop());
        debug!(track = %id, "Stopped other tracks");
    }

    /// Reconciles every track with the mixer and reports its state, in display order.
    pub fn poll_status(&mut self) -> Vec<(TrackId, TrackState)> {
        self.slots
            .iter_mut()
            .map(|slot| {
                slot.track.cleanup_channels();
                (slot.id, slot.track.state())
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::*;
    use crate::testutil::TestBoard;
    use crate::track::PlayMode;

    fn registry_with(
        board: &TestBoard,
        count: usize,
    ) -> Result<(TrackRegistry, Vec<TrackId>), Box<dyn Error>> {
        let mut registry = TrackRegistry::new(board.pool.clone());
        let mut ids = Vec::new();
        for i in 0..count {
            let id = registry.add();
            let path = board.sound(&format!("sound{}", i), 44100)?;
            registry.get_mut(id).ok_or("missing track")?.load_file(&path)?;
            ids.push(id);
        }
        Ok((registry, ids))
    }

    #[test]
    fn test_add_remove() -> Result<(), Box<dyn Error>> {
        let board = TestBoard::new()?;
        let (mut registry, ids) = registry_with(&board, 3)?;
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.ids(), ids);

        registry.trigger(ids[1], false, true);
        assert_eq!(board.mixer.busy_channels(), 1);

        assert!(registry.remove(ids[1]));
        assert!(!registry.remove(ids[1]));
        assert_eq!(registry.ids(), vec![ids[0], ids[2]]);
        assert_eq!(board.mixer.busy_channels(), 0);

        let new_id = registry.add();
        assert!(!ids.contains(&new_id));
        Ok(())
    }

    #[test]
    fn test_move_track() -> Result<(), Box<dyn Error>> {
        let board = TestBoard::new()?;
        let mut registry = TrackRegistry::new(board.pool.clone());
        let ids: Vec<TrackId> = (0..4).map(|_| registry.add()).collect();

        assert!(registry.move_track(0, 2));
        assert_eq!(registry.ids(), vec![ids[1], ids[2], ids[0], ids[3]]);
        assert!(registry.move_track(3, 0));
        assert_eq!(registry.ids(), vec![ids[3], ids[1], ids[2], ids[0]]);
        assert!(!registry.move_track(4, 0));
        assert!(!registry.move_track(0, 4));
        assert_eq!(registry.index_of(ids[0]), Some(3));
        Ok(())
    }

    #[test]
    fn test_shortcut_lookup() -> Result<(), Box<dyn Error>> {
        let board = TestBoard::new()?;
        let mut registry = TrackRegistry::new(board.pool.clone());
        let a = registry.add();
        let b = registry.add();
        let c = registry.add();
        registry.add();
        registry.get_mut(a).ok_or("a")?.set_shortcut(Chord::parse("ctrl+A"));
        registry.get_mut(b).ok_or("b")?.set_shortcut(Chord::parse("A+ctrl"));
        registry.get_mut(c).ok_or("c")?.set_shortcut(Chord::parse("B"));

        assert_eq!(registry.tracks_for_key("A"), vec![a, b]);
        assert_eq!(registry.tracks_for_key("ctrl"), vec![a, b]);
        assert_eq!(registry.tracks_for_key("B"), vec![c]);
        assert!(registry.tracks_for_key("C").is_empty());

        assert_eq!(registry.find_by_shortcut(&Chord::parse("a+CTRL")), vec![a, b]);
        assert!(registry.find_by_shortcut(&Chord::default()).is_empty());
        Ok(())
    }

    #[test]
    fn test_stop_all() -> Result<(), Box<dyn Error>> {
        let board = TestBoard::new()?;
        let (mut registry, ids) = registry_with(&board, 2)?;
        registry.trigger(ids[0], false, true);
        registry.trigger(ids[1], false, true);
        assert!(registry.poll_status().iter().all(|(_, state)| state.is_active()));

        registry.stop_all();
        assert!(registry
            .poll_status()
            .iter()
            .all(|(_, state)| *state == TrackState::default()));
        assert_eq!(board.mixer.busy_channels(), 0);
        Ok(())
    }

    #[test]
    fn test_mute_others() -> Result<(), Box<dyn Error>> {
        let board = TestBoard::new()?;
        let (mut registry, ids) = registry_with(&board, 3)?;
        registry.get_mut(ids[0]).ok_or("a")?.set_mute_others(true);

        registry.trigger(ids[1], false, true);
        registry.trigger(ids[2], false, true);
        registry.trigger(ids[0], false, true);

        let status = registry.poll_status();
        assert!(status[0].1.is_active());
        assert!(!status[1].1.is_playing);
        assert!(!status[2].1.is_playing);
        assert_eq!(board.mixer.busy_channels(), 1);
        Ok(())
    }

    #[test]
    fn test_mute_others_only_when_starting() -> Result<(), Box<dyn Error>> {
        let board = TestBoard::new()?;
        let (mut registry, ids) = registry_with(&board, 2)?;
        let a = registry.get_mut(ids[0]).ok_or("a")?;
        a.set_mute_others(true);
        a.set_mode(PlayMode::Overlap);

        registry.trigger(ids[0], false, true);
        registry.trigger(ids[1], false, true);
        // A is already active, so triggering it again leaves B alone.
        registry.trigger(ids[0], false, true);

        let status = registry.poll_status();
        assert!(status[1].1.is_active());
        assert_eq!(
            registry.get(ids[0]).ok_or("a")?.active_channels().len(),
            2
        );
        Ok(())
    }

    #[test]
    fn test_unloaded_mute_others_track_leaves_others() -> Result<(), Box<dyn Error>> {
        let board = TestBoard::new()?;
        let (mut registry, ids) = registry_with(&board, 1)?;
        let silent = registry.add();
        let track = registry.get_mut(silent).ok_or("silent")?;
        track.set_mute_others(true);
        assert!(track.load_file(&board.missing("gone.wav")).is_err());

        registry.trigger(ids[0], false, true);
        registry.trigger(silent, false, true);

        assert!(registry.get(ids[0]).ok_or("a")?.is_active());
        assert!(!registry.get(silent).ok_or("silent")?.is_active());
        Ok(())
    }

    #[test]
    fn test_mute_others_on_resume() -> Result<(), Box<dyn Error>> {
        let board = TestBoard::new()?;
        let (mut registry, ids) = registry_with(&board, 2)?;
        let a = registry.get_mut(ids[0]).ok_or("a")?;
        a.set_mute_others(true);
        a.set_mode(PlayMode::Pause);

        // Hold mode: press starts A, release pauses it.
        registry.trigger(ids[0], true, true);
        registry.trigger(ids[0], true, false);
        assert!(registry.get(ids[0]).ok_or("a")?.state().is_paused);

        registry.trigger(ids[1], true, true);
        assert!(registry.get(ids[1]).ok_or("b")?.is_active());

        // Resuming A is an inactive to active transition.
        registry.trigger(ids[0], true, true);
        assert!(registry.get(ids[0]).ok_or("a")?.is_active());
        assert!(!registry.get(ids[1]).ok_or("b")?.state().is_playing);
        Ok(())
    }

    #[test]
    fn test_poll_status_reconciles() -> Result<(), Box<dyn Error>> {
        let board = TestBoard::new()?;
        let mut registry = TrackRegistry::new(board.pool.clone());
        let id = registry.add();
        registry
            .get_mut(id)
            .ok_or("track")?
            .load_file(&board.sound("blip", 10)?)?;

        registry.trigger(id, false, true);
        assert_eq!(
            registry.poll_status()[0].1,
            TrackState {
                is_playing: true,
                is_paused: false
            }
        );

        board.mixer.process_frames(20);
        assert_eq!(registry.poll_status(), vec![(id, TrackState::default())]);
        Ok(())
    }

    #[test]
    fn test_trigger_unknown_track() -> Result<(), Box<dyn Error>> {
        let board = TestBoard::new()?;
        let mut registry = TrackRegistry::new(board.pool.clone());
        let id = registry.add();
        registry.remove(id);
        assert!(!registry.trigger(id, false, true));
        Ok(())
    }
}
