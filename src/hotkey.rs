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

//! Turns raw key transitions into track triggers.
//!
//! A binding fires on the key-down that completes its chord. Releasing any key
//! of a chord ends the track's activation, but only in hold mode; in toggle
//! mode key-ups are ignored. The stop-all binding only fires on key-down.

use std::collections::HashSet;

use tracing::{debug, info};

use crate::input::{InputState, KeyEvent};
use crate::registry::{TrackId, TrackRegistry};
use crate::shortcut::Chord;

/// What a key event caused.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Whether the stop-all binding fired.
    pub stopped_all: bool,
    /// Tracks that were triggered, with the key direction they were triggered with.
    pub triggered: Vec<(TrackId, bool)>,
}

impl DispatchReport {
    pub fn is_empty(&self) -> bool {
        !self.stopped_all && self.triggered.is_empty()
    }
}

/// Tracks held keys and fires bindings as chords are completed and broken.
#[derive(Debug)]
pub struct HotkeyDispatcher {
    input: InputState,
    hold_mode: bool,
    stop_all: Chord,
}

impl HotkeyDispatcher {
    /// Creates a stopped dispatcher.
    pub fn new(hold_mode: bool, stop_all: Chord) -> HotkeyDispatcher {
        HotkeyDispatcher {
            input: InputState::new(),
            hold_mode,
            stop_all,
        }
    }

    /// Starts listening with no keys held.
    pub fn start(&mut self) {
        self.input.start();
        info!(
            hold_mode = self.hold_mode,
            stop_all = %self.stop_all,
            "Hotkeys active"
        );
    }

    /// Stops listening and forgets held keys.
    pub fn stop(&mut self) {
        self.input.stop();
        info!("Hotkeys inactive");
    }

    pub fn is_running(&self) -> bool {
        self.input.is_running()
    }

    pub fn set_hold_mode(&mut self, hold_mode: bool) {
        self.hold_mode = hold_mode;
    }

    pub fn hold_mode(&self) -> bool {
        self.hold_mode
    }

    pub fn set_stop_all_shortcut(&mut self, chord: Chord) {
        self.stop_all = chord;
    }

    pub fn stop_all_shortcut(&self) -> &Chord {
        &self.stop_all
    }

    /// The keys currently held.
    pub fn held(&self) -> &HashSet<String> {
        self.input.held()
    }

    /// Handles one key transition against the registry's bindings.
    pub fn handle_event(
        &mut self,
        event: &KeyEvent,
        registry: &mut TrackRegistry,
    ) -> DispatchReport {
        let mut report = DispatchReport::default();
        if !self.input.apply(event) {
            return report;
        }
        let key = event.key();
        let key_down = event.is_down();

        if key_down
            && self.stop_all.contains(key)
            && self.stop_all.is_satisfied_by(self.input.held())
        {
            registry.stop_all();
            report.stopped_all = true;
        }

        for id in registry.tracks_for_key(key) {
            let fire = if key_down {
                registry
                    .get(id)
                    .is_some_and(|track| track.shortcut().is_satisfied_by(self.input.held()))
            } else {
                self.hold_mode
            };
            if fire {
                registry.trigger(id, self.hold_mode, key_down);
                report.triggered.push((id, key_down));
            }
        }

        if !report.is_empty() {
            debug!(event = %event, report = ?report, "Key event dispatched");
        }
        report
    }
}
